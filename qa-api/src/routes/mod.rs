pub(crate) mod error;
pub(crate) mod indexing;
pub(crate) mod search;

pub(crate) use error::ApiError;
