//! Script execution through the CGI interpreter.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::Response;
use livephp_cgi::{CgiRequest, CgiResponse};

use crate::error::ServerError;
use crate::live_reload::inject;
use crate::state::AppState;

/// Run `script` for `req` and translate the interpreter output.
///
/// `route` is the URL path of the script as executed, exposed as
/// `SCRIPT_NAME`.
pub(crate) async fn execute(
    state: &AppState,
    req: Request,
    script: PathBuf,
    route: String,
) -> Result<Response, ServerError> {
    let metadata = tokio::fs::metadata(&script)
        .await
        .map_err(|e| ServerError::from_io(script.clone(), e))?;
    if !metadata.is_file() {
        return Err(ServerError::NotFound(script));
    }

    let (parts, body) = req.into_parts();
    let request = cgi_request(&parts, script, route);
    tracing::debug!(
        script = %request.script_filename.display(),
        method = %request.method,
        "Executing script"
    );

    let output = state
        .interpreter
        .run(&request, body.into_data_stream())
        .await?;

    Ok(into_response(output))
}

fn cgi_request(parts: &Parts, script: PathBuf, route: String) -> CgiRequest {
    let headers = &parts.headers;

    CgiRequest {
        protocol: format!("{:?}", parts.version),
        method: parts.method.as_str().to_owned(),
        script_filename: script,
        script_name: route,
        request_uri: parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_owned(), |pq| pq.as_str().to_owned()),
        query_string: parts.uri.query().unwrap_or_default().to_owned(),
        remote_addr: parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr),
        content_type: header_str(headers, &header::CONTENT_TYPE).map(str::to_owned),
        content_length: header_str(headers, &header::CONTENT_LENGTH)
            .and_then(|len| len.trim().parse().ok()),
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect(),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Build the HTTP response, injecting the live-reload client into HTML.
fn into_response(output: CgiResponse) -> Response {
    let html = output.is_html();
    let (status, headers, body) = output.into_parts();
    let body = if html { inject(&body) } else { body };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);

    let map = response.headers_mut();
    for (name, value) in headers {
        // Stale once the body has been rewritten
        if html && name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            _ => tracing::warn!(header = %name, "Skipping invalid header from script"),
        }
    }
    if html && !map.contains_key(header::CONTENT_TYPE) {
        map.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
    }

    response
}
