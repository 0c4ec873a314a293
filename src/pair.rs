use std::fmt;

/// A name/value association used for query parameters and headers.
///
/// A pair never has a blank key. [`Pair::of()`] returns `None` for a key
/// that is empty or only whitespace, and the request builder skips such
/// pairs without complaint.
///
/// ```
/// use simplehttp::Pair;
///
/// let p = Pair::of(" page ", 2).unwrap();
/// assert_eq!(p.key(), "page");
/// assert_eq!(p.value(), "2");
///
/// assert!(Pair::of("  ", "x").is_none());
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Pair {
    key: String,
    value: String,
}

impl Pair {
    /// Create a pair, rendering the value with its `Display` impl.
    pub fn of(key: impl AsRef<str>, value: impl fmt::Display) -> Option<Pair> {
        let key = key.as_ref().trim();
        if key.is_empty() {
            return None;
        }
        Some(Pair {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Is this pair keyed by `name`, ignoring ASCII case.
    pub(crate) fn is_named(&self, name: &str) -> bool {
        self.key.eq_ignore_ascii_case(name)
    }
}

impl fmt::Debug for Pair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}={:?}", self.key, self.value)
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.value)
    }
}
