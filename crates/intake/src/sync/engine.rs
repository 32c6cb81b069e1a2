//! Pull orchestration shared by every source.
//!
//! A pull validates its spec, refreshes the rate-limit budget, resolves the
//! scope into targets, then fetches each requested resource type in the
//! source's fixed order. Failures are recorded per type and never abort the
//! pull; only an invalid spec is surfaced to the caller.
//!
//! # Example
//!
//! ```ignore
//! use intake::sync::{PullOrchestrator, PullProgress, PullSpec};
//!
//! let puller = PullOrchestrator::new(client);
//! let progress: ProgressCallback = Box::new(|event| println!("{event:?}"));
//! let first = puller.pull(&spec, Some(&progress)).await?;
//! let next = puller.pull(&spec.clone().since(first.next_since), None).await?;
//! ```

mod batch;
mod validate;

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::platform::{
    FetchContext, IngestError, ProgressCallback, ResourceType, SourceClient, Target,
};

use super::progress::{PullProgress, emit};
use super::types::{PullOutcome, PullSpec, ResourceReport, TargetFailure};

use batch::Batch;
use validate::validate_spec;

/// Label recorded for failures that happen before any target is known.
const SCOPE_TARGET: &str = "scope";

/// Whether the type loop may continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    DeadlineReached,
}

/// Drives pulls against one source client.
///
/// Holds the last `next_since` handed out so consecutive pulls never move the
/// cursor backwards, even if the clock does.
pub struct PullOrchestrator<C> {
    client: C,
    last_next_since: Mutex<Option<DateTime<Utc>>>,
}

impl<C: SourceClient> PullOrchestrator<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            last_next_since: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// `next_since` of the most recent pull, if any.
    #[must_use]
    pub fn last_next_since(&self) -> Option<DateTime<Utc>> {
        *self.last_next_since.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one pull.
    ///
    /// # Errors
    ///
    /// Only [`IngestError::InvalidSpec`]. Upstream failures are recorded in
    /// the outcome's per-type reports.
    #[tracing::instrument(skip_all, fields(source = %self.client.source_kind()))]
    pub async fn pull(
        &self,
        spec: &PullSpec,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<PullOutcome, IngestError> {
        let source = self.client.source_kind();
        let since = validate_spec(spec, source, self.client.supported_types())?;
        let clock = self.client.clock();

        let deadline = spec
            .timeout
            .and_then(|timeout| chrono::Duration::from_std(timeout).ok())
            .and_then(|timeout| clock.now().checked_add_signed(timeout));
        let ctx = FetchContext::new(since)
            .with_deadline(deadline)
            .with_progress(on_progress);

        let order: Vec<ResourceType> = source
            .resource_order()
            .iter()
            .copied()
            .filter(|rt| spec.resource_types.contains(rt))
            .collect();
        tracing::info!(types = ?order, since = ?since, "starting pull");
        emit(
            on_progress,
            PullProgress::PullStarted {
                source,
                resource_types: order.clone(),
            },
        );

        let budget = self.client.refresh_rate_limit().await;
        tracing::debug!(remaining = budget.remaining, limit = budget.limit, "rate limit refreshed");
        emit(
            on_progress,
            PullProgress::RateLimitRefreshed {
                remaining: budget.remaining,
                limit: budget.limit,
            },
        );

        let mut reports: Vec<ResourceReport> =
            order.iter().copied().map(ResourceReport::new).collect();
        let mut batch = Batch::default();
        let mut deadline_reached = false;

        match self.client.resolve_targets(&spec.scope, &ctx).await {
            Ok(targets) => {
                tracing::debug!(targets = targets.len(), "scope resolved");
                emit(
                    on_progress,
                    PullProgress::ScopeResolved {
                        targets: targets.len(),
                    },
                );
                deadline_reached = self
                    .fetch_all(&targets, &mut reports, &mut batch, &ctx)
                    .await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "scope resolution failed");
                for report in &mut reports {
                    report.failures.push(TargetFailure::new(SCOPE_TARGET, &e));
                    emit(
                        on_progress,
                        PullProgress::ResourceFailed {
                            resource: report.resource_type,
                            target: SCOPE_TARGET.to_string(),
                            error: e.to_string(),
                        },
                    );
                }
            }
        }

        let next_since = self.advance_next_since(clock.now(), since);
        let outcome = PullOutcome {
            documents: batch.into_documents(),
            next_since,
            rate_limit_remaining: self.client.rate_limit().remaining(),
            resources: reports,
            deadline_reached,
        };

        let failed_types = outcome.failed_types();
        tracing::info!(
            documents = outcome.documents.len(),
            failed = ?failed_types,
            deadline_reached,
            "pull complete"
        );
        emit(
            on_progress,
            PullProgress::PullComplete {
                documents: outcome.documents.len(),
                failed_types,
            },
        );
        Ok(outcome)
    }

    /// Fetch every requested type; true when the deadline cut the pull short.
    async fn fetch_all(
        &self,
        targets: &[Target],
        reports: &mut [ResourceReport],
        batch: &mut Batch,
        ctx: &FetchContext<'_>,
    ) -> bool {
        for index in 0..reports.len() {
            let flow = self
                .fetch_resource(targets, &mut reports[index], batch, ctx)
                .await;
            if flow == Flow::DeadlineReached {
                let resource = reports[index].resource_type;
                for later in &mut reports[index + 1..] {
                    later.skipped = true;
                }
                tracing::warn!(%resource, "pull timeout elapsed, returning partial batch");
                emit(ctx.on_progress, PullProgress::DeadlineReached { resource });
                return true;
            }
        }
        false
    }

    async fn fetch_resource(
        &self,
        targets: &[Target],
        report: &mut ResourceReport,
        batch: &mut Batch,
        ctx: &FetchContext<'_>,
    ) -> Flow {
        let resource = report.resource_type;
        let clock = self.client.clock();
        let mut flow = Flow::Continue;

        for target in targets {
            if ctx.is_expired(clock.now()) {
                report.skipped = true;
                flow = Flow::DeadlineReached;
                break;
            }

            let label = target.label();
            emit(
                ctx.on_progress,
                PullProgress::FetchingResource {
                    resource,
                    target: label.clone(),
                },
            );

            match self.client.fetch(resource, target, ctx).await {
                Ok(fetched) => {
                    report.truncated |= fetched.truncated;
                    let added = batch.extend(resource, fetched.items);
                    report.documents += added;
                    tracing::debug!(%resource, target = %label, added, pages = fetched.pages, "fetched");
                    // Items from pages before the failure are already in the batch.
                    if let Some(e) = fetched.failure {
                        record_failure(report, label, &e, ctx);
                    }
                }
                Err(e) => record_failure(report, label, &e, ctx),
            }
        }

        tracing::info!(
            %resource,
            documents = report.documents,
            truncated = report.truncated,
            failures = report.failures.len(),
            total = batch.len(),
            "resource complete"
        );
        emit(
            ctx.on_progress,
            PullProgress::ResourceComplete {
                resource,
                documents: report.documents,
                truncated: report.truncated,
            },
        );
        flow
    }

    /// Clamp `now` so the cursor never decreases across pulls and never
    /// falls behind the requested `since`.
    fn advance_next_since(
        &self,
        now: DateTime<Utc>,
        since: Option<DateTime<Utc>>,
    ) -> DateTime<Utc> {
        let mut last = self
            .last_next_since
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let next = [Some(now), *last, since]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(now);
        *last = Some(next);
        next
    }
}

fn record_failure(
    report: &mut ResourceReport,
    target: String,
    error: &IngestError,
    ctx: &FetchContext<'_>,
) {
    let resource = report.resource_type;
    tracing::warn!(%resource, target = %target, error = %error, "fetch failed, continuing");
    report.failures.push(TargetFailure::new(target.as_str(), error));
    emit(
        ctx.on_progress,
        PullProgress::ResourceFailed {
            resource,
            target,
            error: error.to_string(),
        },
    );
}
