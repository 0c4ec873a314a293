use url::{ParseError, Url};

use std::error;
use std::fmt::{self, Display};
use std::io;

/// An error from building, sending or mapping a request.
///
/// Every error carries an [`ErrorKind`]. Errors coming from the network or
/// from a malformed server reply also carry the url being requested and the
/// underlying cause, reachable through [`std::error::Error::source()`].
///
/// ```
/// let err = simplehttp::get("   ").call().unwrap_err();
/// assert_eq!(err.kind(), simplehttp::ErrorKind::InvalidArgument);
/// ```
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    url: Option<Url>,
    source: Option<Box<dyn error::Error + Send + Sync + 'static>>,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("url", &self.url.as_ref().map(|u| u.as_str()))
            .field("source", &self.source)
            .finish()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(url) = &self.url {
            write!(f, "{}: ", url)?;
        }
        write!(f, "{}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn error::Error + 'static))
    }
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, message: Option<String>) -> Self {
        Error {
            kind,
            message,
            url: None,
            source: None,
        }
    }

    /// Attach the url being requested, unless one is already set.
    pub(crate) fn url(mut self, url: Url) -> Self {
        if self.url.is_none() {
            self.url = Some(url);
        }
        self
    }

    pub(crate) fn src(mut self, e: impl error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(e));
        self
    }

    /// The type of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The url that was being requested when the error happened, if known.
    pub fn get_url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// True if the error came from the connection or from the server's reply,
    /// as opposed to the caller's arguments or the redirect limit.
    pub fn is_transport(&self) -> bool {
        self.kind.is_transport()
    }
}

/// One of the types of error that can occur when processing a Request.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    /// A required argument was missing or blank (url, mapper).
    InvalidArgument,
    /// The url could not be understood.
    InvalidUrl,
    /// The url scheme could not be understood.
    UnknownScheme,
    /// DNS lookup failed.
    Dns,
    /// Connection to server failed.
    ConnectionFailed,
    /// Too many redirects.
    TooManyRedirects,
    /// A status line we don't understand `HTTP/1.1 200 OK`.
    BadStatus,
    /// A header line that couldn't be parsed.
    BadHeader,
    /// Some unspecified `std::io::Error`.
    Io,
    /// A response mapper failed to turn the response into its target type.
    Mapping,
}

impl ErrorKind {
    #[allow(clippy::wrong_self_convention)]
    #[allow(clippy::new_ret_no_self)]
    pub(crate) fn new(self) -> Error {
        Error::new(self, None)
    }

    pub(crate) fn msg(self, s: &str) -> Error {
        Error::new(self, Some(s.to_string()))
    }

    /// Kinds raised by the transport: url resolution, connecting, reading
    /// and writing, and parsing what the server sent back.
    pub fn is_transport(&self) -> bool {
        match self {
            ErrorKind::InvalidUrl
            | ErrorKind::UnknownScheme
            | ErrorKind::Dns
            | ErrorKind::ConnectionFailed
            | ErrorKind::BadStatus
            | ErrorKind::BadHeader
            | ErrorKind::Io => true,
            ErrorKind::InvalidArgument | ErrorKind::TooManyRedirects | ErrorKind::Mapping => {
                false
            }
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        ErrorKind::Io.new().src(err)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        ErrorKind::InvalidUrl
            .msg(&format!("failed to parse URL: {:?}", err))
            .src(err)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::InvalidArgument => write!(f, "Invalid Argument"),
            ErrorKind::InvalidUrl => write!(f, "Bad URL"),
            ErrorKind::UnknownScheme => write!(f, "Unknown Scheme"),
            ErrorKind::Dns => write!(f, "Dns Failed"),
            ErrorKind::ConnectionFailed => write!(f, "Connection Failed"),
            ErrorKind::TooManyRedirects => write!(f, "Too Many Redirects"),
            ErrorKind::BadStatus => write!(f, "Bad Status"),
            ErrorKind::BadHeader => write!(f, "Bad Header"),
            ErrorKind::Io => write!(f, "Network Error"),
            ErrorKind::Mapping => write!(f, "Response Mapping Failed"),
        }
    }
}
