//! Form encoding of [`Pair`] sequences.
//!
//! Keys and values are encoded with the `application/x-www-form-urlencoded`
//! rules (UTF-8, space as `+`), the same encoding used for a query string
//! and for a synthesized POST body.

use url::form_urlencoded;

use crate::pair::Pair;

/// Content type of a body produced by [`query_string()`].
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Join pairs as `k1=v1&k2=v2`, both sides form-encoded.
///
/// ```
/// use simplehttp::{encode, Pair};
///
/// let pairs = vec![Pair::of("q", "rust lang").unwrap(), Pair::of("page", 2).unwrap()];
/// assert_eq!(encode::query_string(&pairs), "q=rust+lang&page=2");
/// ```
pub fn query_string<'a>(pairs: impl IntoIterator<Item = &'a Pair>) -> String {
    let mut ser = form_urlencoded::Serializer::new(String::new());
    for pair in pairs {
        ser.append_pair(pair.key(), pair.value());
    }
    ser.finish()
}

/// Append an already encoded query to `url`.
///
/// Joins with `&` when the url already has a `?`, otherwise with `?`. An
/// empty query leaves the url as it is.
///
/// ```
/// use simplehttp::encode::append_query;
///
/// assert_eq!(append_query("http://x.test/a", "b=1"), "http://x.test/a?b=1");
/// assert_eq!(append_query("http://x.test/a?z=0", "b=1"), "http://x.test/a?z=0&b=1");
/// ```
pub fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let join = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, join, query)
}
