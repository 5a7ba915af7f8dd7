//! HTTP request handlers.

pub(crate) mod route;
pub(crate) mod script;
