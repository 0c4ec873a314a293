use std::fmt;

use log::debug;
use url::Url;

use crate::agent::Agent;
use crate::encode::{self, FORM_CONTENT_TYPE};
use crate::error::ErrorKind;
use crate::mapper::ResponseMapper;
use crate::pair::Pair;
use crate::unit::{self, Unit};
use crate::{Response, Result};

/// Headers the client writes itself or that frame the message. User values
/// for these are dropped.
const RESERVED_HEADERS: [&str; 4] = ["host", "connection", "transfer-encoding", "content-length"];

/// The request methods this client speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }

    /// POST and DELETE carry the query parameters in the body.
    fn sends_body(&self) -> bool {
        match self {
            Method::Post | Method::Delete => true,
            Method::Get => false,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request instances are builders that create a request.
///
/// Configure with chained calls, then finish with one of
/// [`call()`](Request::call), [`as_bytes()`](Request::as_bytes),
/// [`as_string()`](Request::as_string) or [`map()`](Request::map). Those
/// consume the request, so each `Request` is executed at most once.
///
/// ```no_run
/// let text = simplehttp::get("http://example.com/search")
///     .query("q", "rust http")
///     .header("Accept", "text/html")
///     .as_string()?;
/// # Ok::<(), simplehttp::Error>(())
/// ```
#[derive(Clone)]
pub struct Request {
    agent: Agent,
    method: Method,
    url: String,
    follow_redirects: bool,
    query_params: Vec<Pair>,
    headers: Vec<Pair>,
    /// Raw body and its declared content type.
    body: Option<(String, String)>,
    user_agent: Option<String>,
    verbose: bool,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Request({} {}, {:?}, {:?})",
            self.method, self.url, self.query_params, self.headers
        )
    }
}

impl Request {
    pub(crate) fn new(agent: Agent, method: Method, url: &str) -> Request {
        Request {
            agent,
            method,
            url: url.to_string(),
            follow_redirects: true,
            query_params: Vec::new(),
            headers: Vec::new(),
            body: None,
            user_agent: None,
            verbose: false,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The url as given, before any query parameters are added.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Add a query parameter. A blank key is ignored.
    ///
    /// For GET the parameters go in the url's query string. For POST and
    /// DELETE without an explicit [`body()`](Request::body), they become
    /// a form encoded body instead.
    pub fn query(self, key: impl AsRef<str>, value: impl fmt::Display) -> Self {
        self.query_pair(Pair::of(key, value))
    }

    /// Add a query parameter from a pair, ignoring `None`.
    pub fn query_pair(mut self, pair: impl Into<Option<Pair>>) -> Self {
        if let Some(pair) = pair.into() {
            self.query_params.push(pair);
        }
        self
    }

    /// Add several query parameters, ignoring `None` entries.
    pub fn query_pairs<I, P>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Option<Pair>>,
    {
        pairs.into_iter().fold(self, |req, p| req.query_pair(p))
    }

    /// Add a request header. A blank name is ignored.
    ///
    /// Headers are sent in the order added. A later header with the same
    /// name replaces the value of an earlier one.
    pub fn header(self, key: impl AsRef<str>, value: impl fmt::Display) -> Self {
        self.header_pair(Pair::of(key, value))
    }

    /// Add a header from a pair, ignoring `None`.
    pub fn header_pair(mut self, pair: impl Into<Option<Pair>>) -> Self {
        if let Some(pair) = pair.into() {
            self.headers.push(pair);
        }
        self
    }

    /// Add several headers, ignoring `None` entries.
    pub fn header_pairs<I, P>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Option<Pair>>,
    {
        pairs.into_iter().fold(self, |req, p| req.header_pair(p))
    }

    /// Set the `User-Agent` header. Unlike other headers it is sent again
    /// on every redirect hop.
    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self.header("User-Agent", user_agent)
    }

    /// Return 3xx responses as they are instead of following them.
    pub fn no_redirect(mut self) -> Self {
        self.follow_redirects = false;
        self
    }

    /// Print the request, each response and each redirect hop to stdout.
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// Send `content` as the body with the given `Content-Type`.
    ///
    /// Only POST and DELETE send a body. When set, query parameters of those
    /// methods are not sent at all.
    pub fn body(mut self, content: &str, content_type: &str) -> Self {
        self.body = Some((content.to_string(), content_type.to_string()));
        self
    }

    /// Sends the request and blocks the caller until done.
    ///
    /// Any status code, including 4xx and 5xx, gives `Ok(Response)`. Errors
    /// are a blank url ([`ErrorKind::InvalidArgument`]), more than
    /// [`MAX_REDIRECTS`](crate::MAX_REDIRECTS) redirects
    /// ([`ErrorKind::TooManyRedirects`]), and transport failures.
    pub fn call(self) -> Result<Response> {
        if self.url.trim().is_empty() {
            return Err(ErrorKind::InvalidArgument.msg("Invalid URL"));
        }
        let unit = self.into_unit()?;
        unit::connect(unit)
    }

    /// Same as [`call()`](Request::call).
    pub fn as_is(self) -> Result<Response> {
        self.call()
    }

    /// Send the request and return the response body.
    pub fn as_bytes(self) -> Result<Vec<u8>> {
        self.call().map(Response::into_body)
    }

    /// Send the request and return the response body as text.
    pub fn as_string(self) -> Result<String> {
        self.call().map(Response::into_string)
    }

    /// Send the request and pass the response through `mapper`.
    ///
    /// ```no_run
    /// let len = simplehttp::get("http://example.com/")
    ///     .map(|resp: simplehttp::Response| Ok::<_, simplehttp::Error>(resp.body().len()))?;
    /// # Ok::<(), simplehttp::Error>(())
    /// ```
    pub fn map<T, M>(self, mapper: M) -> Result<T>
    where
        M: ResponseMapper<T>,
    {
        mapper.map(self.call()?)
    }

    /// Like [`map()`](Request::map) for a mapper that may be missing.
    ///
    /// `None` fails with [`ErrorKind::InvalidArgument`] before anything is
    /// sent.
    pub fn map_with<T>(self, mapper: Option<&dyn ResponseMapper<T>>) -> Result<T> {
        let mapper = mapper
            .ok_or_else(|| ErrorKind::InvalidArgument.msg("ResponseMapper cannot be missing"))?;
        mapper.map(self.call()?)
    }

    /// Send the request and deserialize the JSON response body.
    #[cfg(feature = "json")]
    pub fn into_json<T: serde::de::DeserializeOwned>(self) -> Result<T> {
        self.call()?.into_json()
    }

    /// Resolve the url, body and headers actually sent on the first hop.
    fn into_unit(self) -> Result<Unit> {
        let query = encode::query_string(&self.query_params);

        let (target, body) = if self.method.sends_body() {
            let body = match self.body {
                Some((content, content_type)) => (content.into_bytes(), content_type),
                None => (query.into_bytes(), FORM_CONTENT_TYPE.to_string()),
            };
            (self.url.clone(), Some(body))
        } else {
            (encode::append_query(&self.url, &query), None)
        };

        let url = Url::parse(target.trim()).map_err(|e| {
            ErrorKind::InvalidUrl
                .msg(&format!("failed to parse URL {:?}", target))
                .src(e)
        })?;

        let mut headers: Vec<Pair> = self
            .headers
            .into_iter()
            .filter(|h| {
                let reserved = RESERVED_HEADERS.iter().any(|r| h.is_named(r));
                if reserved {
                    debug!("Dropping reserved header {}", h.key());
                }
                !reserved
            })
            .collect();
        let body = body.map(|(bytes, content_type)| {
            headers.extend(Pair::of("Content-Type", content_type));
            headers.extend(Pair::of("Content-Length", bytes.len()));
            bytes
        });
        let headers = apply_headers(headers)?;
        debug!("{} {} ({} headers)", self.method, url, headers.len());

        Ok(Unit {
            agent: self.agent,
            method: self.method,
            url,
            headers,
            body,
            user_agent: self.user_agent,
            follow_redirects: self.follow_redirects,
            verbose: self.verbose,
        })
    }
}

/// Trim names and values and let a later header replace an earlier one of
/// the same name, keeping the earlier one's position.
pub(crate) fn apply_headers(headers: Vec<Pair>) -> Result<Vec<Pair>> {
    let mut applied: Vec<Pair> = Vec::with_capacity(headers.len());
    for header in headers {
        let value = header.value().trim();
        let bad_value = value.contains(|c: char| c == '\r' || c == '\n');
        let bad_name = header.key().contains(|c: char| c == ':' || c.is_whitespace());
        if bad_value || bad_name {
            return Err(ErrorKind::InvalidArgument.msg(&format!("illegal header {:?}", header)));
        }
        let header = match Pair::of(header.key(), value) {
            Some(h) => h,
            None => continue,
        };
        match applied.iter_mut().find(|h| h.is_named(header.key())) {
            Some(existing) => *existing = header,
            None => applied.push(header),
        }
    }
    Ok(applied)
}
