use std::fmt::Display;
use std::io::{self, Write};

use log::{debug, trace};
use url::{Position, Url};

use crate::agent::Agent;
use crate::cookies::CookieJar;
use crate::error::{Error, ErrorKind};
use crate::pair::Pair;
use crate::request::Method;
use crate::response::HistoryVec;
use crate::stream::{self, Stream};
use crate::Response;

/// Most redirect hops followed for one request.
pub const MAX_REDIRECTS: usize = 5;

/// A request ready to go on the wire: url resolved, body encoded and
/// headers applied.
pub(crate) struct Unit {
    pub agent: Agent,
    pub method: Method,
    pub url: Url,
    pub headers: Vec<Pair>,
    pub body: Option<Vec<u8>>,
    /// Explicitly set user agent, re-sent on redirect hops.
    pub user_agent: Option<String>,
    pub follow_redirects: bool,
    pub verbose: bool,
}

/// Sink for verbose output, silent unless the request asked for it.
struct Trace<'a> {
    out: Option<&'a mut dyn Write>,
}

impl Trace<'_> {
    fn line(&mut self, msg: impl Display) {
        if let Some(out) = self.out.as_mut() {
            // Verbose output never fails the request.
            let _ = writeln!(out, "{}", msg);
        }
    }
}

/// Perform the request, following redirects, and return the final response.
///
/// Verbose output goes to stdout.
pub(crate) fn connect(unit: Unit) -> Result<Response, Error> {
    connect_traced(unit, &mut io::stdout())
}

fn connect_traced(unit: Unit, out: &mut dyn Write) -> Result<Response, Error> {
    let mut trace = Trace {
        out: if unit.verbose { Some(out) } else { None },
    };
    let jar = unit.agent.cookie_jar();

    let mut hop = Hop {
        method: unit.method,
        url: unit.url.clone(),
        headers: unit.headers.clone(),
        body: unit.body.clone(),
    };
    let mut history = HistoryVec::new();

    loop {
        let response = send_hop(&unit, &jar, &hop, &mut trace)?;
        trace.line(&response);

        if !unit.follow_redirects || !response.is_redirect() {
            return Ok(finish(response, history));
        }
        let location = match response.header("location") {
            Some(l) => l,
            None => return Ok(finish(response, history)),
        };

        let next = hop.url.join(location).map_err(|e| {
            ErrorKind::InvalidUrl
                .msg(&format!("bad redirect location {:?}", location))
                .src(e)
                .url(hop.url.clone())
        })?;

        if history.try_push(hop.url.clone()).is_err() {
            return Err(ErrorKind::TooManyRedirects
                .msg(&format!("more than {} redirects", MAX_REDIRECTS))
                .url(hop.url));
        }
        debug!("Redirect #{} {} -> {}", history.len(), response.status(), next);
        trace.line(format_args!("\nRedirect #{} ({})", history.len(), location));

        // Redirects are always followed with a bare GET.
        hop = Hop {
            method: Method::Get,
            url: next,
            headers: unit
                .user_agent
                .as_ref()
                .and_then(|ua| Pair::of("User-Agent", ua))
                .into_iter()
                .collect(),
            body: None,
        };
    }
}

fn finish(mut response: Response, history: HistoryVec) -> Response {
    response.history = history;
    response
}

/// One request/response exchange on its own connection.
struct Hop {
    method: Method,
    url: Url,
    headers: Vec<Pair>,
    body: Option<Vec<u8>>,
}

fn send_hop(unit: &Unit, jar: &CookieJar, hop: &Hop, trace: &mut Trace) -> Result<Response, Error> {
    let config = unit.agent.config();
    trace.line(format_args!("HTTP {} {}", hop.method, hop.url));

    let mut stream = stream::connect(&hop.url, config).map_err(|e| e.url(hop.url.clone()))?;

    let cookie = jar.cookie_header(&hop.url);
    if let Err(e) = send_request(unit, hop, cookie.as_deref(), &mut stream, trace) {
        stream.disconnect();
        return Err(Error::from(e).url(hop.url.clone()));
    }

    let response = Response::do_from_stream(stream, hop.url.clone())?;
    debug!("{} {} -> {}", hop.method, hop.url, response.status());

    jar.store_response_cookies(&hop.url, response.all("set-cookie").iter().map(|s| s.as_str()));
    Ok(response)
}

/// Send request line, headers and body.
fn send_request(
    unit: &Unit,
    hop: &Hop,
    cookie: Option<&str>,
    stream: &mut Stream,
    trace: &mut Trace,
) -> io::Result<()> {
    let config = unit.agent.config();
    let url = &hop.url;

    // request line
    let mut prelude: Vec<u8> = Vec::with_capacity(512);
    write!(
        prelude,
        "{} {} HTTP/1.1\r\n",
        hop.method,
        &url[Position::BeforePath..Position::AfterQuery]
    )?;

    // host header is always ours
    match url.port() {
        Some(port) => write!(prelude, "Host: {}:{}\r\n", url.host_str().unwrap_or(""), port)?,
        None => write!(prelude, "Host: {}\r\n", url.host_str().unwrap_or(""))?,
    }

    let has = |name: &str| hop.headers.iter().any(|h| h.is_named(name));
    if !has("user-agent") {
        write!(prelude, "User-Agent: {}\r\n", config.user_agent)?;
    }
    if !has("accept") {
        write!(prelude, "Accept: */*\r\n")?;
    }

    for header in &hop.headers {
        write!(prelude, "{}: {}\r\n", header.key(), header.value())?;
        trace.line(header);
    }
    if let (Some(cookie), false) = (cookie, has("cookie")) {
        write!(prelude, "Cookie: {}\r\n", cookie)?;
        trace!("Cookie: {}", cookie);
    }
    write!(prelude, "Connection: close\r\n")?;

    // finish
    write!(prelude, "\r\n")?;
    stream.write_all(&prelude)?;

    if let Some(body) = &hop.body {
        trace.line(String::from_utf8_lossy(body));
        stream.write_all(body)?;
    }
    stream.flush()?;

    Ok(())
}
