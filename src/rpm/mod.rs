mod headers;
mod package;

pub(crate) mod signature;

pub use package::*;
