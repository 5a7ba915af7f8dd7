//! Application state.
//!
//! Shared state for all request handlers.

use livephp_cgi::Interpreter;

use crate::live_reload::NotificationHub;
use crate::path_guard::ServeRoot;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Directory being served.
    pub(crate) root: ServeRoot,
    /// Interpreter used for script requests.
    pub(crate) interpreter: Interpreter,
    /// Live reload subscribers.
    pub(crate) hub: NotificationHub,
}
