use std::fmt;

use crate::error::{Error, ErrorKind};

/// Response headers, keyed by name, each name holding its values in the
/// order the server sent them.
///
/// Names are compared ignoring ASCII case. The first spelling seen for a
/// name is kept for display.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, Vec<String>)>);

impl Headers {
    /// Parse a header block: `Name: value` lines separated by CRLF, without
    /// the status line and without the terminating empty line.
    pub(crate) fn parse(block: &[u8]) -> Result<Headers, Error> {
        let mut headers = Headers::default();
        let mut start = 0;
        let ends = memchr::memmem::find_iter(block, b"\r\n").chain(std::iter::once(block.len()));
        for end in ends {
            if end < start {
                break;
            }
            let line = &block[start..end];
            start = end + 2;
            if line.is_empty() {
                continue;
            }
            let colon = memchr::memchr(b':', line).ok_or_else(|| {
                ErrorKind::BadHeader.msg("HTTP header must be a key-value separated by a colon")
            })?;
            let name = std::str::from_utf8(&line[..colon])
                .map_err(|e| ErrorKind::BadHeader.msg("header name is not utf-8").src(e))?
                .trim();
            if name.is_empty() || !name.bytes().all(is_tchar) {
                return Err(ErrorKind::BadHeader.msg(&format!("invalid header name {:?}", name)));
            }
            // Values outside utf-8 are kept lossily rather than failing the response.
            let value = String::from_utf8_lossy(&line[colon + 1..]);
            headers.append(name, value.trim());
        }
        Ok(headers)
    }

    pub(crate) fn append(&mut self, name: &str, value: &str) {
        match self.0.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some((_, values)) => values.push(value.to_string()),
            None => self.0.push((name.to_string(), vec![value.to_string()])),
        }
    }

    /// Last value for `name`, the one a later header line would override with.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.all(name).last().map(|s| s.as_str())
    }

    /// All values for `name`, in the order received. Empty if absent.
    pub fn all(&self, name: &str) -> &[String] {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name.trim()))
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        !self.all(name).is_empty()
    }

    /// Header names in the order first received.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// RFC 7230 token characters.
fn is_tchar(c: u8) -> bool {
    match c {
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_'
        | b'`' | b'|' | b'~' => true,
        c => c.is_ascii_alphanumeric(),
    }
}
