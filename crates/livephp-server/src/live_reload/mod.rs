//! Live reload system.
//!
//! Watches the served tree and pushes reload signals to connected browsers
//! over a server-sent event stream. HTML responses get a small client script
//! that listens on that stream.

mod hub;
mod inject;
mod sse;
mod watcher;

pub(crate) use hub::NotificationHub;
pub(crate) use inject::inject;
pub(crate) use sse::{events, livereload_js};
pub(crate) use watcher::TreeWatcher;
