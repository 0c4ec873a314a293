use std::fmt;
use std::io::{self, Cursor, Read};

use chunked_transfer::Decoder as ChunkDecoder;
use log::{debug, trace};
use url::Url;

use crate::error::{Error, ErrorKind, ErrorKind::BadStatus};
use crate::header::Headers;
use crate::stream::Stream;
use crate::unit::MAX_REDIRECTS;

pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";
pub const DEFAULT_CHARACTER_SET: &str = "utf-8";

/// Largest status line plus header block we accept.
const MAX_HEADER_SIZE: usize = 64 * 1024;

pub(crate) type HistoryVec = arrayvec::ArrayVec<Url, MAX_REDIRECTS>;

/// Response instances are created as results of firing off requests.
///
/// By the time a `Response` exists the body has been read in full and the
/// connection closed. Every status code produces a `Response`: a 404 or a
/// 500 is returned like a 200, with the body the server sent.
///
/// ```no_run
/// let resp = simplehttp::get("http://example.com/").call()?;
/// println!("{} {}", resp.status(), resp.status_text());
/// # Ok::<(), simplehttp::Error>(())
/// ```
#[derive(Clone)]
pub struct Response {
    url: Url,
    http_version: String,
    status: u16,
    status_text: String,
    headers: Headers,
    body: Vec<u8>,
    pub(crate) history: HistoryVec,
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Response[status: {}, status_text: {}, url: {}, body: {} bytes]",
            self.status,
            self.status_text,
            self.url,
            self.body.len(),
        )
    }
}

/// The status line followed by one `Name: [values]` line per header.
impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{} {} {}", self.http_version, self.status, self.status_text)?;
        for (name, values) in self.headers.iter() {
            writeln!(f, "{}: [{}]", name, values.join(", "))?;
        }
        Ok(())
    }
}

impl Response {
    /// Construct a response with a status, status text and a string body.
    ///
    /// This is hopefully useful for unit tests.
    ///
    /// ```
    /// let resp = simplehttp::Response::new(401, "Authorization Required", "Please log in")?;
    /// assert_eq!(resp.status(), 401);
    /// assert_eq!(resp.into_string(), "Please log in");
    /// # Ok::<(), simplehttp::Error>(())
    /// ```
    pub fn new(status: u16, status_text: &str, body: &str) -> Result<Response, Error> {
        let mut headers = Headers::default();
        headers.append("Content-Length", &body.len().to_string());
        Ok(Response {
            url: Url::parse("http://localhost/")?,
            http_version: "HTTP/1.1".to_string(),
            status,
            status_text: status_text.to_string(),
            headers,
            body: body.as_bytes().to_vec(),
            history: HistoryVec::new(),
        })
    }

    /// The URL this response was read from, after any redirects.
    pub fn get_url(&self) -> &str {
        self.url.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The http version: `HTTP/1.1`
    pub fn http_version(&self) -> &str {
        &self.http_version
    }

    /// The status as a u16: `200`
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The status text: `OK`
    ///
    /// The HTTP spec allows for non-utf8 status texts. This uses from_utf8_lossy to
    /// convert such lines to &str.
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// The last header value for the given name, or None if not found.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// All values for the given header name, in the order received.
    pub fn all(&self, name: &str) -> &[String] {
        self.headers.all(name)
    }

    /// A list of the header names in this response, in order first seen.
    pub fn headers_names(&self) -> Vec<String> {
        self.headers.names().map(|s| s.to_string()).collect()
    }

    /// Tells if the response has the named header.
    pub fn has(&self, name: &str) -> bool {
        self.headers.contains(name)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The content type part of the "Content-Type" header without
    /// the charset.
    ///
    /// ```
    /// let resp = simplehttp::Response::new(200, "OK", "")?;
    /// assert_eq!(resp.content_type(), "text/plain");
    /// # Ok::<(), simplehttp::Error>(())
    /// ```
    pub fn content_type(&self) -> &str {
        self.header("content-type")
            .map(|header| {
                header
                    .find(';')
                    .map(|index| header[0..index].trim())
                    .unwrap_or(header)
            })
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    /// The character set part of the "Content-Type".
    pub fn charset(&self) -> &str {
        charset_from_content_type(self.header("content-type"))
    }

    /// Raw body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// The body as text. Invalid utf-8 sequences are replaced with U+FFFD.
    pub fn into_string(self) -> String {
        match String::from_utf8(self.body) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }

    /// Deserialize the body as JSON.
    ///
    /// An empty body is an error here; see [`JsonMapper`](crate::JsonMapper)
    /// for a mapper that treats it as absent.
    #[cfg(feature = "json")]
    pub fn into_json<T: serde::de::DeserializeOwned>(self) -> Result<T, Error> {
        let url = self.url.clone();
        serde_json::from_slice(&self.body).map_err(|e| {
            ErrorKind::Mapping
                .msg("failed to read JSON from response body")
                .src(e)
                .url(url)
        })
    }

    /// The URLs redirected from, in order, before this response was read.
    pub fn history(&self) -> &[Url] {
        &self.history
    }

    /// 3xx
    pub fn is_redirect(&self) -> bool {
        self.status / 100 == 3
    }

    /// 2xx
    pub fn is_success(&self) -> bool {
        self.status / 100 == 2
    }

    /// 4xx
    pub fn is_client_error(&self) -> bool {
        self.status / 100 == 4
    }

    /// 5xx
    pub fn is_server_error(&self) -> bool {
        self.status / 100 == 5
    }

    /// Read a whole response from `stream`, then disconnect it.
    ///
    /// The stream is released whether reading succeeds or not.
    pub(crate) fn do_from_stream(mut stream: Stream, url: Url) -> Result<Response, Error> {
        let result = read_response(&mut stream, url.clone());
        stream.disconnect();
        result.map_err(|e| e.url(url))
    }
}

fn read_response(stream: &mut Stream, url: Url) -> Result<Response, Error> {
    let (head, carryover) = read_status_and_headers(stream)?;

    let i = memchr::memmem::find(&head, b"\r\n").unwrap_or(head.len());
    let (http_version, status, status_text) = parse_status_line(&head[..i])?;
    let headers = Headers::parse(head.get(i + 2..).unwrap_or(&[]))?;
    trace!("{} {} {} {:?}", http_version, status, status_text, headers);

    if status / 100 == 4 {
        debug!("{} returned {}, reading error body", url, status);
    }
    let body = read_body(status, &headers, carryover, stream)?;

    Ok(Response {
        url,
        http_version,
        status,
        status_text,
        headers,
        body,
        history: HistoryVec::new(),
    })
}

/// Body framing: none for 1xx/204/304, chunked when the server says so,
/// `Content-Length` bytes when given, otherwise until the server closes.
fn read_body(
    status: u16,
    headers: &Headers,
    carryover: Vec<u8>,
    stream: &mut Stream,
) -> Result<Vec<u8>, Error> {
    let has_no_body = match status {
        100..=199 | 204 | 304 => true,
        _ => false,
    };
    if has_no_body {
        return Ok(Vec::new());
    }

    let is_chunked = headers
        .get("transfer-encoding")
        .map(|enc| enc.to_ascii_lowercase().contains("chunked"))
        .unwrap_or(false);
    let limit = headers
        .get("content-length")
        .and_then(|l| l.trim().parse::<usize>().ok());

    let mut reader = Cursor::new(carryover).chain(stream);
    let mut body = Vec::new();
    match (is_chunked, limit) {
        (true, _) => {
            ChunkDecoder::new(&mut reader).read_to_end(&mut body)?;
        }
        (false, Some(len)) => {
            body.reserve(len.min(MAX_HEADER_SIZE));
            LimitedRead::new(&mut reader, len).read_to_end(&mut body)?;
        }
        (false, None) => {
            reader.read_to_end(&mut body)?;
        }
    }
    Ok(body)
}

// HTTP/1.1 200 OK
fn parse_status_line(line: &[u8]) -> Result<(String, u16, String), Error> {
    let line = String::from_utf8_lossy(line);
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    let code = parts.next().unwrap_or("");
    let text = parts.next().unwrap_or("").trim();

    if version != "HTTP/1.1" && version != "HTTP/1.0" {
        return Err(BadStatus.msg("HTTP version not formatted correctly"));
    }
    if code.len() != 3 || !code.bytes().all(|c| c.is_ascii_digit()) {
        return Err(BadStatus.msg("HTTP status code must be a 3 digit number"));
    }
    let status: u16 = code.parse().map_err(|_| BadStatus.new())?;

    Ok((version.to_string(), status, text.to_string()))
}

/// Read until the empty line ending the header block. Returns the status
/// line and headers (without the final CRLFCRLF) and whatever body bytes were
/// read past it.
fn read_status_and_headers(reader: &mut impl Read) -> Result<(Vec<u8>, Vec<u8>), Error> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];
    // Where to resume looking for CRLFCRLF, so a terminator split across
    // reads is still found.
    let mut search_from = 0;

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(n) => n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            let msg = if buf.is_empty() {
                "server closed connection without sending a response"
            } else {
                "connection closed before end of response headers"
            };
            return Err(BadStatus.msg(msg));
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(i) = memchr::memmem::find(&buf[search_from..], b"\r\n\r\n") {
            let end = search_from + i;
            let carryover = buf.split_off(end + 4);
            buf.truncate(end);
            return Ok((buf, carryover));
        }
        if buf.len() > MAX_HEADER_SIZE {
            return Err(ErrorKind::BadHeader.msg("response headers larger than supported"));
        }
        search_from = buf.len().saturating_sub(3);
    }
}

/// Limits a `Read` to a content size (as set by a "Content-Length" header).
struct LimitedRead<R> {
    reader: R,
    limit: usize,
    position: usize,
}

impl<R: Read> LimitedRead<R> {
    fn new(reader: R, limit: usize) -> Self {
        LimitedRead {
            reader,
            limit,
            position: 0,
        }
    }
}

impl<R: Read> Read for LimitedRead<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let left = self.limit - self.position;
        if left == 0 {
            return Ok(0);
        }
        let from = if left < buf.len() {
            &mut buf[0..left]
        } else {
            buf
        };
        match self.reader.read(from) {
            // https://tools.ietf.org/html/rfc7230#page-33
            // If the sender closes the connection or
            // the recipient times out before the indicated number of octets are
            // received, the recipient MUST consider the message to be
            // incomplete and close the connection.
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "response body closed before all bytes were read",
            )),
            Ok(amount) => {
                self.position += amount;
                Ok(amount)
            }
            Err(e) => Err(e),
        }
    }
}

/// Extract the charset from a "Content-Type" header.
///
/// "Content-Type: text/plain; charset=iso8859-1" -> "iso8859-1"
///
/// *Internal API*
pub(crate) fn charset_from_content_type(header: Option<&str>) -> &str {
    header
        .and_then(|header| {
            header.find(';').and_then(|semi| {
                header[semi + 1..]
                    .find('=')
                    .map(|equal| header[semi + equal + 2..].trim().trim_matches('"'))
            })
        })
        .unwrap_or(DEFAULT_CHARACTER_SET)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("http://example.com/res").unwrap()
    }

    fn parse(raw: &[u8]) -> Result<Response, Error> {
        Response::do_from_stream(Stream::from_vec(raw.to_vec()), url())
    }

    #[test]
    fn content_length_body() {
        let resp = parse(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nContent-Type: text/plain; charset=iso-8859-1\r\n\r\nhello trailing").unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.status_text(), "OK");
        assert_eq!(resp.http_version(), "HTTP/1.1");
        assert_eq!(resp.content_type(), "text/plain");
        assert_eq!(resp.charset(), "iso-8859-1");
        assert_eq!(resp.body(), b"hello");
        assert_eq!(resp.get_url(), "http://example.com/res");
    }

    #[test]
    fn chunked_body() {
        let resp = parse(
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nContent-Length: 999\r\n\r\n3\r\nhel\r\nb\r\nlo world!!!\r\n0\r\n\r\n",
        )
        .unwrap();
        assert_eq!(resp.into_string(), "hello world!!!");
    }

    #[test]
    fn close_delimited_body() {
        let resp = parse(b"HTTP/1.0 200 OK\r\n\r\nuntil the end").unwrap();
        assert_eq!(resp.http_version(), "HTTP/1.0");
        assert_eq!(resp.into_string(), "until the end");
    }

    #[test]
    fn not_found_keeps_error_body() {
        let resp = parse(b"HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\n\r\nno such x").unwrap();
        assert_eq!(resp.status(), 404);
        assert!(resp.is_client_error());
        assert_eq!(resp.into_string(), "no such x");
    }

    #[test]
    fn no_body_statuses() {
        let resp = parse(b"HTTP/1.1 204 No Content\r\nContent-Length: 10\r\n\r\n").unwrap();
        assert!(resp.body().is_empty());
        let resp = parse(b"HTTP/1.1 304 Not Modified\r\n\r\nignored").unwrap();
        assert!(resp.body().is_empty());
    }

    #[test]
    fn short_content_length_is_io_error() {
        let err = parse(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.get_url().unwrap().as_str(), "http://example.com/res");
    }

    #[test]
    fn status_without_reason() {
        let resp = parse(b"HTTP/1.1 200\r\nContent-Length: 0\r\n\r\n").unwrap();
        assert_eq!(resp.status_text(), "");
    }

    #[test]
    fn reason_with_spaces() {
        let resp = parse(b"HTTP/1.1 301 Moved Permanently\r\nLocation: /x\r\nContent-Length: 0\r\n\r\n").unwrap();
        assert_eq!(resp.status_text(), "Moved Permanently");
        assert!(resp.is_redirect());
        assert_eq!(resp.header("location"), Some("/x"));
    }

    #[test]
    fn bad_status_lines() {
        for raw in &[
            &b"HTTP/2 200 OK\r\n\r\n"[..],
            &b"HTTP/1.1 20 OK\r\n\r\n"[..],
            &b"HTTP/1.1 abc OK\r\n\r\n"[..],
            &b"garbage\r\n\r\n"[..],
        ] {
            let err = parse(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BadStatus, "{:?}", String::from_utf8_lossy(raw));
        }
    }

    #[test]
    fn empty_reply_is_bad_status() {
        let err = parse(b"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadStatus);
        assert!(err.to_string().contains("without sending a response"));
    }

    #[test]
    fn truncated_headers() {
        let err = parse(b"HTTP/1.1 200 OK\r\nContent-Len").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadStatus);
    }

    #[test]
    fn oversized_headers() {
        let mut raw = b"HTTP/1.1 200 OK\r\n".to_vec();
        while raw.len() <= MAX_HEADER_SIZE + 10 {
            raw.extend_from_slice(b"X-Filler: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\r\n");
        }
        let err = parse(&raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadHeader);
    }

    #[test]
    fn terminator_split_across_reads() {
        // Header block long enough that CRLFCRLF straddles the 4096-byte chunk.
        let mut raw = b"HTTP/1.1 200 OK\r\nX-Pad: ".to_vec();
        let pad = 4096 - raw.len() - 2;
        raw.extend(std::iter::repeat(b'a').take(pad));
        raw.extend_from_slice(b"\r\n\r\nbody");
        let resp = parse(&raw).unwrap();
        assert_eq!(resp.header("x-pad").unwrap().len(), pad);
        assert_eq!(resp.into_string(), "body");
    }

    #[test]
    fn display_lists_headers() {
        let resp = parse(b"HTTP/1.1 200 OK\r\nA: 1\r\nA: 2\r\nContent-Length: 0\r\n\r\n").unwrap();
        assert_eq!(
            resp.to_string(),
            "HTTP/1.1 200 OK\nA: [1, 2]\nContent-Length: [0]\n"
        );
    }

    #[test]
    fn lossy_string() {
        let resp = parse(b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\na\xffb").unwrap();
        assert_eq!(resp.into_string(), "a\u{FFFD}b");
    }

    #[test]
    fn charset_parsing() {
        assert_eq!(charset_from_content_type(None), "utf-8");
        assert_eq!(charset_from_content_type(Some("text/html")), "utf-8");
        assert_eq!(
            charset_from_content_type(Some("text/html; charset=\"windows-1252\"")),
            "windows-1252"
        );
    }

    #[cfg(feature = "json")]
    #[test]
    fn into_json() {
        #[derive(Debug, serde::Deserialize)]
        struct Hello {
            hello: String,
        }
        let resp = parse(b"HTTP/1.1 200 OK\r\nContent-Length: 17\r\n\r\n{\"hello\":\"world\"}").unwrap();
        let h: Hello = resp.into_json().unwrap();
        assert_eq!(h.hello, "world");

        let resp = parse(b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nnot").unwrap();
        let err = resp.into_json::<Hello>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Mapping);
    }
}
