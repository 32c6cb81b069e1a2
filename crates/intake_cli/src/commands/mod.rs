pub(crate) mod meta;
pub(crate) mod shared;

#[cfg(feature = "github")]
pub(crate) mod github;
#[cfg(feature = "github")]
pub(crate) mod limits;

#[cfg(feature = "confluence")]
pub(crate) mod confluence;
