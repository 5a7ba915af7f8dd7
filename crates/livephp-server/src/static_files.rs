//! Static file serving.
//!
//! HTML pages are read whole and get the live-reload client injected. All
//! other files go through `tower-http`'s `ServeFile`, which handles content
//! type inference, conditional requests and ranges.

use std::fmt::Write;
use std::path::Path;

use axum::body::Body;
use axum::extract::Request;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::ServerError;
use crate::live_reload::inject;

/// Characters escaped in a single URL path segment.
const SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'\'')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Serve an HTML file with the live-reload client injected.
pub(crate) async fn serve_html(path: &Path) -> Result<Response, ServerError> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| ServerError::from_io(path.to_path_buf(), e))?;

    Ok(html_response(inject(&content)))
}

/// Serve any other file as-is.
pub(crate) async fn serve_file(path: &Path, req: Request) -> Response {
    match ServeFile::new(path).oneshot(req).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

/// Render a listing of `dir`, reachable at `route`.
pub(crate) async fn directory_listing(dir: &Path, route: &str) -> Result<Response, ServerError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ServerError::from_io(dir.to_path_buf(), e))?;

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();

    let page = render_listing(route, &names);
    Ok(html_response(inject(page.as_bytes())))
}

fn html_response(body: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], body).into_response()
}

fn render_listing(route: &str, names: &[String]) -> String {
    let title = if route == "/" {
        "/".to_owned()
    } else {
        escape_html(&format!("{route}/"))
    };

    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Index of {title}</title>\n</head>\n<body>\n<h1>Index of {title}</h1>\n<ul>\n"
    );
    if route != "/" {
        html.push_str("<li><a href=\"../\">../</a></li>\n");
    }
    for name in names {
        let href = utf8_percent_encode(name, SEGMENT_ENCODE_SET);
        let _ = writeln!(html, "<li><a href=\"{href}\">{}</a></li>", escape_html(name));
    }
    html.push_str("</ul>\n</body>\n</html>\n");
    html
}

/// Escape HTML special characters.
fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}
