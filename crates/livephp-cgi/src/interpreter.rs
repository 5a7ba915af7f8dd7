//! Interpreter process lifecycle.
//!
//! One process per request. Stdout and stderr share a single pipe so the
//! captured bytes keep the order the script wrote them in.

use std::fmt::Display;
use std::io::Read;
use std::path::PathBuf;
use std::process::Stdio;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};

use crate::error::CgiError;
use crate::request::{CgiRequest, ServerIdentity};
use crate::response::CgiResponse;

/// External CGI interpreter (normally `php-cgi`).
#[derive(Clone, Debug)]
pub struct Interpreter {
    program: PathBuf,
    args: Vec<String>,
    identity: ServerIdentity,
}

impl Interpreter {
    /// Create an interpreter that runs `program` with no extra arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, identity: ServerIdentity) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            identity,
        }
    }

    /// Extra arguments passed to every invocation.
    #[must_use]
    pub fn with_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Run a script and parse its output.
    ///
    /// `body` is streamed to the process stdin, which is closed once the
    /// stream ends. Returns [`CgiError::Exit`] when the process exits
    /// unsuccessfully, whatever it printed.
    pub async fn run<S, E>(&self, request: &CgiRequest, body: S) -> Result<CgiResponse, CgiError>
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let output = self.output(request, body).await?;
        Ok(CgiResponse::parse(output))
    }

    /// Run a script and return its combined stdout and stderr unparsed.
    pub async fn output<S, E>(&self, request: &CgiRequest, body: S) -> Result<Vec<u8>, CgiError>
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let (mut reader, writer) = std::io::pipe()?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(request.environment(&self.identity))
            .stdin(Stdio::piped())
            .stdout(writer.try_clone()?)
            .stderr(writer);

        let mut child = cmd.spawn().map_err(|source| CgiError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;
        // The command holds the parent's copies of the pipe writer; the
        // reader only sees EOF once they are gone.
        drop(cmd);

        if let Some(stdin) = child.stdin.take() {
            tokio::spawn(feed_stdin(stdin, body));
        }

        let output = tokio::task::spawn_blocking(move || {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).map(|_| buf)
        })
        .await
        .map_err(std::io::Error::other)??;

        let status = child.wait().await?;
        tracing::debug!(
            script = %request.script_filename.display(),
            %status,
            bytes = output.len(),
            "Interpreter finished"
        );

        if status.success() {
            Ok(output)
        } else {
            Err(CgiError::Exit { status, output })
        }
    }
}

/// Copy the request body into the process stdin, then close it.
///
/// Write errors are expected when the script exits without reading its input.
async fn feed_stdin<S, E>(mut stdin: ChildStdin, body: S)
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let mut body = std::pin::pin!(body);
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read request body");
                break;
            }
        };
        if let Err(e) = stdin.write_all(&chunk).await {
            tracing::debug!(error = %e, "Interpreter stopped reading stdin");
            break;
        }
    }
    let _ = stdin.shutdown().await;
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use futures_util::stream;
    use pretty_assertions::assert_eq;

    type BodyStream = stream::Iter<std::vec::IntoIter<Result<Bytes, std::io::Error>>>;

    fn shell(script: &str) -> Interpreter {
        Interpreter::new("/bin/sh", ServerIdentity::new("localhost", 9000)).with_args(["-c", script])
    }

    fn empty_body() -> BodyStream {
        stream::iter(Vec::new())
    }

    fn body(parts: &[&str]) -> BodyStream {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    fn request() -> CgiRequest {
        CgiRequest {
            protocol: "HTTP/1.1".to_owned(),
            method: "GET".to_owned(),
            script_filename: PathBuf::from("/srv/index.php"),
            script_name: "/index.php".to_owned(),
            request_uri: "/index.php?a=1".to_owned(),
            query_string: "a=1".to_owned(),
            ..CgiRequest::default()
        }
    }

    #[tokio::test]
    async fn test_run_parses_headers_and_body() {
        let interpreter = shell(
            r#"printf 'Status: 201 Created\r\nContent-Type: application/json\r\n\r\n{"ok":true}'"#,
        );

        let response = interpreter.run(&request(), empty_body()).await.unwrap();

        assert_eq!(response.status(), 201);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.body(), b"{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_run_exposes_environment() {
        let interpreter =
            shell(r#"printf 'Content-Type: text/plain\r\n\r\n%s|%s|%s' "$REQUEST_METHOD" "$QUERY_STRING" "$SCRIPT_NAME""#);

        let response = interpreter.run(&request(), empty_body()).await.unwrap();

        assert_eq!(response.body(), b"GET|a=1|/index.php");
    }

    #[tokio::test]
    async fn test_run_streams_body_to_stdin() {
        let interpreter = shell(r"printf 'Content-Type: text/plain\r\n\r\n'; cat");
        let request = CgiRequest {
            method: "POST".to_owned(),
            content_length: Some(11),
            ..request()
        };

        let response = interpreter
            .run(&request, body(&["hello", " ", "world"]))
            .await
            .unwrap();

        assert_eq!(response.body(), b"hello world");
    }

    #[tokio::test]
    async fn test_output_interleaves_stderr() {
        let interpreter = shell("printf 'one '; printf 'two ' >&2; printf 'three'");

        let output = interpreter.output(&request(), empty_body()).await.unwrap();

        assert_eq!(output, b"one two three");
    }

    #[tokio::test]
    async fn test_run_nonzero_exit_is_error() {
        let interpreter = shell("printf 'PHP Fatal error'; exit 255");

        let err = interpreter.run(&request(), empty_body()).await.unwrap_err();

        assert!(matches!(err, CgiError::Exit { .. }));
        assert_eq!(err.output(), Some(b"PHP Fatal error".as_slice()));
    }

    #[tokio::test]
    async fn test_run_missing_program_is_spawn_error() {
        let interpreter = Interpreter::new(
            "/nonexistent/php-cgi",
            ServerIdentity::new("localhost", 9000),
        );

        let err = interpreter.run(&request(), empty_body()).await.unwrap_err();

        assert!(matches!(err, CgiError::Spawn { .. }));
        assert!(err.to_string().contains("/nonexistent/php-cgi"));
    }

    #[tokio::test]
    async fn test_run_ignores_unread_body() {
        let interpreter = shell(r"printf 'Content-Type: text/plain\r\n\r\ndone'");
        let big = "x".repeat(256 * 1024);

        let response = interpreter
            .run(&request(), body(&[big.as_str()]))
            .await
            .unwrap();

        assert_eq!(response.body(), b"done");
    }
}
