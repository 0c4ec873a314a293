//! Cookie handling.
//!
//! Every request runs against a [`CookieJar`]. An [`Agent`](crate::Agent)
//! built with [`AgentBuilder::cookie_jar()`](crate::AgentBuilder::cookie_jar)
//! uses that jar. Otherwise the process-wide default jar is used, which is
//! created on first use with [`CookiePolicy::AcceptAll`] unless the caller
//! installed one earlier with [`install_default()`].

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, trace};
use once_cell::sync::OnceCell;
use url::Url;

static DEFAULT_JAR: OnceCell<Arc<CookieJar>> = OnceCell::new();

/// Install `jar` as the process-wide default.
///
/// Returns `true` if this call installed it, `false` if a default was
/// already in place (which is left untouched).
pub fn install_default(jar: Arc<CookieJar>) -> bool {
    let mut installed = false;
    DEFAULT_JAR.get_or_init(|| {
        installed = true;
        jar
    });
    installed
}

/// The process-wide default jar, creating an accept-all jar on first use.
pub fn default_jar() -> Arc<CookieJar> {
    DEFAULT_JAR
        .get_or_init(|| {
            debug!("Installing default cookie jar (accept all)");
            Arc::new(CookieJar::new(CookiePolicy::AcceptAll))
        })
        .clone()
}

/// Which cookies a jar agrees to store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookiePolicy {
    /// Store every cookie the setting host may set.
    AcceptAll,
    /// Store nothing. No `Cookie` header is ever sent.
    AcceptNone,
    /// Like `AcceptAll`, but a `Domain` attribute must name the setting host
    /// itself, so no cookie reaches its sibling or parent domains.
    AcceptOriginalServer,
}

/// A cookie as stored in the jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Lowercase domain without a leading dot.
    pub domain: String,
    /// False when the cookie had no `Domain` attribute and is only sent back
    /// to the exact host that set it.
    pub host_only: bool,
    pub path: String,
    pub secure: bool,
}

impl Cookie {
    fn matches(&self, url: &Url) -> bool {
        let host = match url.host_str() {
            Some(h) => h.to_ascii_lowercase(),
            None => return false,
        };
        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            domain_match(&host, &self.domain)
        };
        domain_ok && path_match(url.path(), &self.path) && (!self.secure || url.scheme() == "https")
    }

    fn same_slot(&self, other: &Cookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// In-memory cookie storage shared by requests.
#[derive(Debug)]
pub struct CookieJar {
    policy: CookiePolicy,
    cookies: Mutex<Vec<Cookie>>,
}

impl CookieJar {
    pub fn new(policy: CookiePolicy) -> Self {
        CookieJar {
            policy,
            cookies: Mutex::new(Vec::new()),
        }
    }

    pub fn policy(&self) -> CookiePolicy {
        self.policy
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Cookie>> {
        // A panic while holding the lock cannot leave the vec half-written.
        match self.cookies.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Store the cookies from `Set-Cookie` header values received from `url`.
    pub fn store_response_cookies<'a>(&self, url: &Url, set_cookies: impl IntoIterator<Item = &'a str>) {
        if self.policy == CookiePolicy::AcceptNone {
            return;
        }
        let mut cookies = self.lock();
        for header in set_cookies {
            let (cookie, expired) = match parse_set_cookie(header, url) {
                Some(c) => c,
                None => {
                    debug!("Ignoring malformed Set-Cookie: {}", header);
                    continue;
                }
            };
            if !cookie.host_only {
                let host = url.host_str().unwrap_or("").to_ascii_lowercase();
                // RFC 6265 5.3 step 6, whatever the policy.
                if !domain_match(&host, &cookie.domain) {
                    debug!("Rejecting cookie {} for foreign domain {}", cookie.name, cookie.domain);
                    continue;
                }
                if self.policy == CookiePolicy::AcceptOriginalServer && host != cookie.domain {
                    debug!("Rejecting cookie {} widened to {}", cookie.name, cookie.domain);
                    continue;
                }
            }
            cookies.retain(|c| !c.same_slot(&cookie));
            if expired {
                trace!("Removed cookie {}", cookie.name);
            } else {
                trace!("Stored cookie {} for {}{}", cookie.name, cookie.domain, cookie.path);
                cookies.push(cookie);
            }
        }
    }

    /// The value of a `Cookie` request header for `url`, if any cookie applies.
    ///
    /// Cookies with longer paths come first.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        let cookies = self.lock();
        let mut matching: Vec<&Cookie> = cookies.iter().filter(|c| c.matches(url)).collect();
        if matching.is_empty() {
            return None;
        }
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        let parts: Vec<String> = matching.iter().map(|c| c.to_string()).collect();
        Some(parts.join("; "))
    }

    /// A snapshot of the stored cookies.
    pub fn cookies(&self) -> Vec<Cookie> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Parse one `Set-Cookie` value. The bool is true when the cookie asks to be
/// removed (`Max-Age` of zero or less).
fn parse_set_cookie(header: &str, url: &Url) -> Option<(Cookie, bool)> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');

    let host = url.host_str()?.to_ascii_lowercase();
    let mut cookie = Cookie {
        name: name.to_string(),
        value: value.to_string(),
        domain: host,
        host_only: true,
        path: default_path(url.path()),
        secure: false,
    };
    let mut expired = false;

    for attr in parts {
        let (key, val) = match attr.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (attr.trim(), ""),
        };
        if key.eq_ignore_ascii_case("domain") {
            let d = val.trim_start_matches('.').to_ascii_lowercase();
            if !d.is_empty() {
                cookie.domain = d;
                cookie.host_only = false;
            }
        } else if key.eq_ignore_ascii_case("path") {
            if val.starts_with('/') {
                cookie.path = val.to_string();
            }
        } else if key.eq_ignore_ascii_case("secure") {
            cookie.secure = true;
        } else if key.eq_ignore_ascii_case("max-age") {
            if let Ok(secs) = val.parse::<i64>() {
                expired = secs <= 0;
            }
        }
    }

    Some((cookie, expired))
}

// RFC 6265 5.1.4 default-path.
fn default_path(path: &str) -> String {
    if !path.starts_with('/') {
        return "/".to_string();
    }
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}

fn domain_match(host: &str, domain: &str) -> bool {
    host == domain || (host.ends_with(domain) && host[..host.len() - domain.len()].ends_with('.'))
}

fn path_match(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn stores_and_returns_cookie() {
        let jar = CookieJar::new(CookiePolicy::AcceptAll);
        let u = url("http://example.com/login");
        jar.store_response_cookies(&u, vec!["session=abc; Path=/; HttpOnly"]);
        assert_eq!(jar.len(), 1);
        assert_eq!(jar.cookie_header(&url("http://example.com/home")).as_deref(), Some("session=abc"));
        assert!(jar.cookie_header(&url("http://other.com/")).is_none());
    }

    #[test]
    fn host_only_cookie_not_sent_to_subdomain() {
        let jar = CookieJar::new(CookiePolicy::AcceptAll);
        jar.store_response_cookies(&url("http://example.com/"), vec!["a=1"]);
        assert!(jar.cookie_header(&url("http://www.example.com/")).is_none());
    }

    #[test]
    fn domain_cookie_sent_to_subdomain() {
        let jar = CookieJar::new(CookiePolicy::AcceptAll);
        jar.store_response_cookies(&url("http://example.com/"), vec!["a=1; Domain=.Example.com"]);
        assert_eq!(jar.cookie_header(&url("http://api.example.com/")).as_deref(), Some("a=1"));
        assert!(jar.cookie_header(&url("http://badexample.com/")).is_none());
    }

    #[test]
    fn default_path_is_request_directory() {
        let jar = CookieJar::new(CookiePolicy::AcceptAll);
        jar.store_response_cookies(&url("http://h.test/app/login"), vec!["a=1"]);
        assert!(jar.cookie_header(&url("http://h.test/app/x")).is_some());
        assert!(jar.cookie_header(&url("http://h.test/app")).is_some());
        assert!(jar.cookie_header(&url("http://h.test/apple")).is_none());
        assert!(jar.cookie_header(&url("http://h.test/")).is_none());
    }

    #[test]
    fn same_slot_replaces_and_max_age_removes() {
        let jar = CookieJar::new(CookiePolicy::AcceptAll);
        let u = url("http://h.test/");
        jar.store_response_cookies(&u, vec!["a=1", "b=2"]);
        jar.store_response_cookies(&u, vec!["a=3"]);
        assert_eq!(jar.len(), 2);
        assert_eq!(jar.cookie_header(&u).as_deref(), Some("b=2; a=3"));
        jar.store_response_cookies(&u, vec!["b=; Max-Age=0"]);
        assert_eq!(jar.cookie_header(&u).as_deref(), Some("a=3"));
    }

    #[test]
    fn secure_cookie_only_over_https() {
        let jar = CookieJar::new(CookiePolicy::AcceptAll);
        jar.store_response_cookies(&url("https://h.test/"), vec!["s=1; Secure"]);
        assert!(jar.cookie_header(&url("http://h.test/")).is_none());
        assert_eq!(jar.cookie_header(&url("https://h.test/")).as_deref(), Some("s=1"));
    }

    #[test]
    fn longer_path_first() {
        let jar = CookieJar::new(CookiePolicy::AcceptAll);
        let u = url("http://h.test/");
        jar.store_response_cookies(&u, vec!["root=1; Path=/", "deep=2; Path=/a/b"]);
        assert_eq!(
            jar.cookie_header(&url("http://h.test/a/b/c")).as_deref(),
            Some("deep=2; root=1")
        );
    }

    #[test]
    fn accept_none_stores_nothing() {
        let jar = CookieJar::new(CookiePolicy::AcceptNone);
        jar.store_response_cookies(&url("http://h.test/"), vec!["a=1"]);
        assert!(jar.is_empty());
    }

    #[test]
    fn foreign_domain_rejected_under_any_policy() {
        for policy in &[CookiePolicy::AcceptAll, CookiePolicy::AcceptOriginalServer] {
            let jar = CookieJar::new(*policy);
            jar.store_response_cookies(
                &url("http://attacker.test/"),
                vec!["session=planted; Domain=bank.example", "sub=1; Domain=www.attacker.test"],
            );
            assert!(jar.is_empty(), "{:?} stored a foreign cookie", policy);
            assert!(jar.cookie_header(&url("http://bank.example/")).is_none());
        }
    }

    #[test]
    fn accept_all_allows_parent_domain() {
        let jar = CookieJar::new(CookiePolicy::AcceptAll);
        jar.store_response_cookies(&url("http://www.h.test/"), vec!["b=2; Domain=h.test"]);
        assert_eq!(jar.cookie_header(&url("http://api.h.test/")).as_deref(), Some("b=2"));
    }

    #[test]
    fn original_server_keeps_cookies_on_setting_host() {
        let jar = CookieJar::new(CookiePolicy::AcceptOriginalServer);
        let u = url("http://www.h.test/");
        jar.store_response_cookies(
            &u,
            vec!["a=1; Domain=other.test", "b=2; Domain=h.test", "c=3", "d=4; Domain=www.h.test"],
        );
        let names: Vec<String> = jar.cookies().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["c".to_string(), "d".to_string()]);
    }

    #[test]
    fn malformed_values_are_skipped() {
        let jar = CookieJar::new(CookiePolicy::AcceptAll);
        jar.store_response_cookies(&url("http://h.test/"), vec!["novalue", "=x", "ok=1"]);
        assert_eq!(jar.len(), 1);
        jar.clear();
        assert!(jar.is_empty());
    }

    #[test]
    fn install_default_is_one_shot() {
        let first = default_jar();
        let other = Arc::new(CookieJar::new(CookiePolicy::AcceptNone));
        assert!(!install_default(other));
        assert!(Arc::ptr_eq(&first, &default_jar()));
        assert_eq!(default_jar().policy(), CookiePolicy::AcceptAll);
    }
}
