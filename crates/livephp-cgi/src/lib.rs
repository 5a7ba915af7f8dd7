//! CGI/1.1 process bridge for livephp.
//!
//! Executes one script request per interpreter process and translates the
//! process output back into a status, headers and body:
//!
//! - [`CgiRequest`] carries the request metadata and renders the CGI
//!   environment ([`CgiRequest::environment`])
//! - [`Interpreter`] spawns the process, streams the request body to its
//!   stdin and captures stdout and stderr as one byte stream
//! - [`CgiResponse`] parses that byte stream (pure, no process needed)
//!
//! # Example
//!
//! ```ignore
//! use livephp_cgi::{CgiRequest, Interpreter, ServerIdentity};
//!
//! let interpreter = Interpreter::new("php-cgi", ServerIdentity::new("localhost", 9000));
//! let response = interpreter.run(&request, futures_util::stream::empty::<Result<_, std::io::Error>>()).await?;
//! println!("{} {:?}", response.status(), response.headers());
//! ```

mod error;
mod interpreter;
mod request;
mod response;

pub use error::CgiError;
pub use interpreter::Interpreter;
pub use request::{CgiRequest, ServerIdentity};
pub use response::CgiResponse;
