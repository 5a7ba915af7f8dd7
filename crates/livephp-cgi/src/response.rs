//! Parsing of interpreter output into a response.
//!
//! CGI output is `<header block>\r\n\r\n<body>`. The header block is split
//! into lines, each line at its first colon. `Status` is consumed to set the
//! status code; every other header passes through in order, duplicates
//! included. Output without the blank-line separator is served as a raw body.

/// Separator between the header block and the body.
const HEADER_SEPARATOR: &[u8] = b"\r\n\r\n";

/// Content type assumed when a header block names none.
const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// Parsed result of one interpreter execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CgiResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    html: bool,
}

impl CgiResponse {
    /// Parse combined interpreter output.
    ///
    /// Never fails: malformed `Status` values are ignored and output without
    /// a header block becomes a plain 200 body.
    #[must_use]
    pub fn parse(mut output: Vec<u8>) -> Self {
        let Some(split) = find_separator(&output) else {
            return Self {
                status: 200,
                headers: Vec::new(),
                body: output,
                html: false,
            };
        };

        let body = output.split_off(split + HEADER_SEPARATOR.len());
        output.truncate(split);

        let mut status = None;
        let mut headers = Vec::new();
        let mut content_type = DEFAULT_CONTENT_TYPE.to_owned();

        for line in output.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.is_empty() {
                continue;
            }
            let Some(colon) = line.iter().position(|&b| b == b':') else {
                continue;
            };

            let name = String::from_utf8_lossy(&line[..colon]).trim().to_owned();
            let value = String::from_utf8_lossy(&line[colon + 1..]).trim().to_owned();

            if name.eq_ignore_ascii_case("status") {
                // First valid status wins
                if status.is_none() {
                    status = parse_status(&value);
                }
                continue;
            }
            if name.eq_ignore_ascii_case("content-type") {
                content_type.clone_from(&value);
            }
            headers.push((name, value));
        }

        Self {
            status: status.unwrap_or(200),
            headers,
            body,
            html: content_type.to_ascii_lowercase().contains("text/html"),
        }
    }

    /// HTTP status code (200 unless a valid `Status` header overrode it).
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Passthrough headers in the order the script emitted them.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of a passthrough header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Response body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Whether the body is HTML and should carry the live-reload client.
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.html
    }

    /// Split into status, headers and body.
    #[must_use]
    pub fn into_parts(self) -> (u16, Vec<(String, String)>, Vec<u8>) {
        (self.status, self.headers, self.body)
    }
}

fn find_separator(output: &[u8]) -> Option<usize> {
    output
        .windows(HEADER_SEPARATOR.len())
        .position(|window| window == HEADER_SEPARATOR)
}

/// First whitespace-delimited token as a status code.
fn parse_status(value: &str) -> Option<u16> {
    value
        .split_whitespace()
        .next()?
        .parse::<u16>()
        .ok()
        .filter(|code| (100..=999).contains(code))
}
