//! Request dispatch for everything under the served directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::Uri;
use axum::response::{IntoResponse, Redirect, Response};

use super::script;
use crate::error::ServerError;
use crate::path_guard::ResolvedPath;
use crate::state::AppState;
use crate::static_files;

/// Fallback handler: scripts, injected HTML, directories and plain files.
pub(crate) async fn dispatch(State(state): State<Arc<AppState>>, req: Request) -> Response {
    match route(&state, req).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn route(state: &AppState, req: Request) -> Result<Response, ServerError> {
    let resolved = state.root.resolve(req.uri().path())?;

    if tokio::fs::metadata(&resolved.path)
        .await
        .is_ok_and(|meta| meta.is_dir())
    {
        if !resolved.trailing_slash && !resolved.is_root() {
            return Ok(redirect_to_directory(req.uri()));
        }
        return serve_directory(state, req, resolved).await;
    }

    serve_path(state, req, resolved.path, resolved.route).await
}

async fn serve_path(
    state: &AppState,
    req: Request,
    path: PathBuf,
    route: String,
) -> Result<Response, ServerError> {
    match extension(&path).as_deref() {
        Some("php") => script::execute(state, req, path, route).await,
        Some("html" | "htm") => static_files::serve_html(&path).await,
        _ => Ok(static_files::serve_file(&path, req).await),
    }
}

/// Directory with a trailing slash: index script, index page, or a listing.
async fn serve_directory(
    state: &AppState,
    req: Request,
    resolved: ResolvedPath,
) -> Result<Response, ServerError> {
    let base = resolved.route.trim_end_matches('/');

    for index in ["index.php", "index.html"] {
        let candidate = resolved.path.join(index);
        if tokio::fs::metadata(&candidate)
            .await
            .is_ok_and(|meta| meta.is_file())
        {
            return serve_path(state, req, candidate, format!("{base}/{index}")).await;
        }
    }

    static_files::directory_listing(&resolved.path, &resolved.route).await
}

fn redirect_to_directory(uri: &Uri) -> Response {
    let location = match uri.query() {
        Some(query) => format!("{}/?{query}", uri.path()),
        None => format!("{}/", uri.path()),
    };
    Redirect::permanent(&location).into_response()
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}
