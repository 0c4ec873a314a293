#![forbid(unsafe_code)]
#![warn(clippy::all)]
// new is just more readable than ..Default::default().
#![allow(clippy::new_without_default)]
// the matches! macro is obscure and not widely known.
#![allow(clippy::match_like_matches_macro)]

//! A small, blocking HTTP client with a fluent request builder.
//!
//! simplehttp sends one request at a time on the calling thread. It follows
//! up to [`MAX_REDIRECTS`] redirects, keeps cookies between requests, and
//! reads each response body in full before handing back a [`Response`].
//! For TLS it uses [rustls](https://docs.rs/rustls).
//!
//! ## Usage
//!
//! ```no_run
//! let body: String = simplehttp::get("http://example.com/search")
//!     .query("q", "ferris")
//!     .header("Accept", "text/html")
//!     .as_string()?;
//! # Ok::<(), simplehttp::Error>(())
//! ```
//!
//! POST and DELETE send their query parameters as a form encoded body,
//! unless a raw body is given:
//!
//! ```no_run
//! let resp = simplehttp::post("http://example.com/login")
//!     .query("user", "ferris")
//!     .query("password", "crab")
//!     .call()?;
//!
//! let resp = simplehttp::post("http://example.com/api/items")
//!     .body(r#"{"name": "shell"}"#, "application/json")
//!     .call()?;
//! # Ok::<(), simplehttp::Error>(())
//! ```
//!
//! Builders finish with one of:
//!
//! * [`.call()`][Request::call()] (or `.as_is()`) for the [`Response`].
//! * [`.as_bytes()`][Request::as_bytes()] for the body.
//! * [`.as_string()`][Request::as_string()] for the body as text.
//! * [`.map()`][Request::map()] to run the response through a
//!   [`ResponseMapper`], such as [`JsonMapper`] with the "json" feature.
//!
//! ## Redirects
//!
//! A 3xx response with a `Location` header is followed with a GET to the new
//! location, carrying only the `User-Agent` set with
//! [`Request::user_agent()`]. After [`MAX_REDIRECTS`] hops the request fails
//! with [`ErrorKind::TooManyRedirects`]. Use [`Request::no_redirect()`] to
//! get the 3xx response itself.
//!
//! ## Error handling
//!
//! simplehttp returns errors via `Result<T, simplehttp::Error>`. A response
//! with a 4xx or 5xx status is *not* an error; check
//! [`Response::status()`]. See [`ErrorKind`] for what can go wrong.
//!
//! ## Cookies
//!
//! Cookies received are stored in a [`CookieJar`] and sent back on later
//! requests, including redirect hops. Unless an [`Agent`] is given its own
//! jar, a process-wide jar accepting all cookies is used. See
//! [`cookies`].
//!
//! ## Features
//!
//! * `tls` enables https. This is enabled by default.
//! * `json` enables [`Response::into_json()`] and [`JsonMapper`] via
//!   serde_json. This is enabled by default.

mod agent;
pub mod cookies;
pub mod encode;
mod error;
mod header;
mod mapper;
mod pair;
mod request;
mod response;
mod stream;
mod unit;

pub use crate::agent::{Agent, AgentBuilder};
pub use crate::cookies::{CookieJar, CookiePolicy};
pub use crate::error::{Error, ErrorKind};
pub use crate::header::Headers;
#[cfg(feature = "json")]
pub use crate::mapper::JsonMapper;
pub use crate::mapper::ResponseMapper;
pub use crate::pair::Pair;
pub use crate::request::{Method, Request};
pub use crate::response::Response;
pub use crate::unit::MAX_REDIRECTS;
pub use url::Url;

pub type Result<T> = std::result::Result<T, Error>;

/// Agents are used to hold configuration and keep state between requests.
pub fn agent() -> Agent {
    AgentBuilder::new().build()
}

/// Make a GET request.
pub fn get(url: &str) -> Request {
    agent::default_agent().get(url)
}

/// Make a POST request.
pub fn post(url: &str) -> Request {
    agent::default_agent().post(url)
}

/// Make a DELETE request.
pub fn delete(url: &str) -> Request {
    agent::default_agent().delete(url)
}

/// Make a request with the given method.
pub fn request(method: Method, url: &str) -> Request {
    agent::default_agent().request(method, url)
}
