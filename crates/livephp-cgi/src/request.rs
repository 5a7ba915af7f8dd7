//! Request metadata and CGI environment construction.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Fixed identity of the server as seen by scripts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerIdentity {
    /// `SERVER_SOFTWARE` value.
    pub software: String,
    /// `SERVER_NAME` value.
    pub name: String,
    /// `SERVER_PORT` value.
    pub port: u16,
}

impl ServerIdentity {
    /// Create an identity with the default `livephp/<version>` software string.
    #[must_use]
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            software: concat!("livephp/", env!("CARGO_PKG_VERSION")).to_owned(),
            name: name.into(),
            port,
        }
    }
}

/// Metadata of one inbound request destined for a script.
#[derive(Clone, Debug, Default)]
pub struct CgiRequest {
    /// Protocol version, e.g. `HTTP/1.1`.
    pub protocol: String,
    /// Request method.
    pub method: String,
    /// Absolute filesystem path of the script.
    pub script_filename: PathBuf,
    /// Route path of the script, e.g. `/index.php`.
    pub script_name: String,
    /// Full request URI including the query string.
    pub request_uri: String,
    /// Raw query string without the leading `?`.
    pub query_string: String,
    /// Peer address, when the transport knows it.
    pub remote_addr: Option<SocketAddr>,
    /// Inbound `Content-Type` header.
    pub content_type: Option<String>,
    /// Inbound `Content-Length`, only when positive.
    pub content_length: Option<u64>,
    /// Remaining request headers, forwarded as `HTTP_*` variables.
    pub headers: Vec<(String, String)>,
}

/// Headers that never become `HTTP_*` variables.
///
/// `Content-Type`/`Content-Length` have dedicated variables; `Proxy` would
/// let a client set `HTTP_PROXY` for the script (httpoxy).
const EXCLUDED_HEADERS: [&str; 3] = ["content-type", "content-length", "proxy"];

impl CgiRequest {
    /// Build the CGI/1.1 environment for this request.
    ///
    /// The interpreter process additionally inherits the server's own
    /// environment; these pairs are layered on top of it.
    #[must_use]
    pub fn environment(&self, identity: &ServerIdentity) -> Vec<(String, String)> {
        let mut env = vec![
            pair("GATEWAY_INTERFACE", "CGI/1.1"),
            pair("SERVER_SOFTWARE", &identity.software),
            pair("SERVER_PROTOCOL", &self.protocol),
            pair("REQUEST_METHOD", &self.method),
            pair(
                "SCRIPT_FILENAME",
                &self.script_filename.to_string_lossy(),
            ),
            pair("SCRIPT_NAME", &self.script_name),
            pair("REQUEST_URI", &self.request_uri),
            pair("QUERY_STRING", &self.query_string),
            pair("SERVER_NAME", &identity.name),
            pair("SERVER_PORT", &identity.port.to_string()),
            // php-cgi refuses to run without this when force-cgi-redirect is on
            pair("REDIRECT_STATUS", "200"),
        ];

        match self.remote_addr {
            Some(addr) => {
                env.push(pair("REMOTE_ADDR", &addr.ip().to_string()));
                env.push(pair("REMOTE_PORT", &addr.port().to_string()));
            }
            None => env.push(pair("REMOTE_ADDR", "")),
        }

        if let Some(content_type) = self.content_type.as_deref().filter(|ct| !ct.is_empty()) {
            env.push(pair("CONTENT_TYPE", content_type));
        }
        if let Some(length) = self.content_length.filter(|len| *len > 0) {
            env.push(pair("CONTENT_LENGTH", &length.to_string()));
        }

        env.extend(self.header_variables());
        env
    }

    /// Collapse request headers into `HTTP_*` variables.
    ///
    /// Repeated headers are joined with `, ` (cookies with `; `).
    fn header_variables(&self) -> BTreeMap<String, String> {
        let mut vars: BTreeMap<String, String> = BTreeMap::new();

        for (name, value) in &self.headers {
            let lower = name.to_ascii_lowercase();
            if EXCLUDED_HEADERS.contains(&lower.as_str()) {
                continue;
            }

            let key = format!("HTTP_{}", lower.to_ascii_uppercase().replace('-', "_"));
            let separator = if lower == "cookie" { "; " } else { ", " };
            vars.entry(key)
                .and_modify(|existing| {
                    existing.push_str(separator);
                    existing.push_str(value);
                })
                .or_insert_with(|| value.clone());
        }

        vars
    }
}

fn pair(key: &str, value: &str) -> (String, String) {
    (key.to_owned(), value.to_owned())
}
