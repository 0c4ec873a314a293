use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;

use crate::cookies::{self, CookieJar};
use crate::request::{Method, Request};

const DEFAULT_USER_AGENT: &str = concat!("simplehttp/", env!("CARGO_PKG_VERSION"));

static DEFAULT_AGENT: Lazy<Agent> = Lazy::new(|| AgentBuilder::new().build());

/// The agent behind [`get()`](crate::get), [`post()`](crate::post) and
/// [`delete()`](crate::delete).
pub(crate) fn default_agent() -> Agent {
    DEFAULT_AGENT.clone()
}

#[cfg(feature = "tls")]
fn default_tls_config() -> Arc<rustls::ClientConfig> {
    static TLS_CONF: Lazy<Arc<rustls::ClientConfig>> = Lazy::new(|| {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.add_server_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.0.iter().map(|ta| {
            rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(
                ta.subject,
                ta.spki,
                ta.name_constraints,
            )
        }));

        let config = rustls::ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        Arc::new(config)
    });
    TLS_CONF.clone()
}

/// Config as built by AgentBuilder and then static for the lifetime of the Agent.
pub(crate) struct AgentConfig {
    pub user_agent: String,
    pub timeout_connect: Option<Duration>,
    pub timeout_read: Option<Duration>,
    pub timeout_write: Option<Duration>,
    /// `None` means the process-wide default jar, resolved per request.
    pub cookie_jar: Option<Arc<CookieJar>>,
    #[cfg(feature = "tls")]
    pub tls_config: Arc<rustls::ClientConfig>,
}

/// Agents hold configuration shared by the requests made from them.
///
/// An Agent is cheap to clone; clones share the same configuration and
/// cookie jar. Each request still opens its own connection.
///
/// ```no_run
/// let agent = simplehttp::AgentBuilder::new()
///     .user_agent("my-tool/1.0")
///     .timeout_read(std::time::Duration::from_secs(5))
///     .build();
///
/// let body = agent.get("http://example.com/").as_string()?;
/// # Ok::<(), simplehttp::Error>(())
/// ```
#[derive(Clone)]
pub struct Agent {
    config: Arc<AgentConfig>,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Agent")
            .field("user_agent", &self.config.user_agent)
            .field("timeout_connect", &self.config.timeout_connect)
            .field("timeout_read", &self.config.timeout_read)
            .field("timeout_write", &self.config.timeout_write)
            .finish()
    }
}

impl Agent {
    /// An agent with default settings.
    pub fn new() -> Self {
        AgentBuilder::new().build()
    }

    /// Make a request with this agent.
    pub fn request(&self, method: Method, url: &str) -> Request {
        Request::new(self.clone(), method, url)
    }

    /// Make a GET request from this agent.
    pub fn get(&self, url: &str) -> Request {
        self.request(Method::Get, url)
    }

    /// Make a POST request from this agent.
    pub fn post(&self, url: &str) -> Request {
        self.request(Method::Post, url)
    }

    /// Make a DELETE request from this agent.
    pub fn delete(&self, url: &str) -> Request {
        self.request(Method::Delete, url)
    }

    /// The jar requests from this agent read and write: the one given to
    /// the builder, or else the process-wide default.
    pub fn cookie_jar(&self) -> Arc<CookieJar> {
        match &self.config.cookie_jar {
            Some(jar) => jar.clone(),
            None => cookies::default_jar(),
        }
    }

    pub(crate) fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Accumulates options towards building an [`Agent`].
pub struct AgentBuilder {
    config: AgentConfig,
}

impl AgentBuilder {
    pub fn new() -> Self {
        AgentBuilder {
            config: AgentConfig {
                user_agent: DEFAULT_USER_AGENT.to_string(),
                timeout_connect: Some(Duration::from_secs(30)),
                timeout_read: None,
                timeout_write: None,
                cookie_jar: None,
                #[cfg(feature = "tls")]
                tls_config: default_tls_config(),
            },
        }
    }

    /// Create a new agent.
    pub fn build(self) -> Agent {
        Agent {
            config: Arc::new(self.config),
        }
    }

    /// The `User-Agent` sent when a request doesn't set its own.
    ///
    /// Unlike [`Request::user_agent()`], this one is not re-sent on redirect
    /// hops.
    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.config.user_agent = user_agent.to_string();
        self
    }

    /// Timeout for the TCP connection to each resolved address.
    ///
    /// Defaults to 30 seconds.
    pub fn timeout_connect(mut self, timeout: Duration) -> Self {
        self.config.timeout_connect = Some(timeout);
        self
    }

    /// Timeout for each individual read from the socket.
    pub fn timeout_read(mut self, timeout: Duration) -> Self {
        self.config.timeout_read = Some(timeout);
        self
    }

    /// Timeout for each individual write to the socket.
    pub fn timeout_write(mut self, timeout: Duration) -> Self {
        self.config.timeout_write = Some(timeout);
        self
    }

    /// Set both the read and write timeouts.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.timeout_read(timeout).timeout_write(timeout)
    }

    /// Use `jar` instead of the process-wide default jar.
    pub fn cookie_jar(mut self, jar: Arc<CookieJar>) -> Self {
        self.config.cookie_jar = Some(jar);
        self
    }

    /// Set the TLS client config to use for https connections.
    #[cfg(feature = "tls")]
    pub fn tls_config(mut self, tls_config: Arc<rustls::ClientConfig>) -> Self {
        self.config.tls_config = tls_config;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::CookiePolicy;

    #[test]
    fn agent_implements_send_and_sync() {
        let _agent: Box<dyn Send> = Box::new(AgentBuilder::new().build());
        let _agent: Box<dyn Sync> = Box::new(AgentBuilder::new().build());
    }

    #[test]
    fn builder_options() {
        let agent = AgentBuilder::new()
            .user_agent("tester/2")
            .timeout(Duration::from_secs(3))
            .timeout_connect(Duration::from_millis(500))
            .build();
        let c = agent.config();
        assert_eq!(c.user_agent, "tester/2");
        assert_eq!(c.timeout_read, Some(Duration::from_secs(3)));
        assert_eq!(c.timeout_write, Some(Duration::from_secs(3)));
        assert_eq!(c.timeout_connect, Some(Duration::from_millis(500)));
    }

    #[test]
    fn default_user_agent_has_version() {
        let agent = Agent::new();
        assert!(agent.config().user_agent.starts_with("simplehttp/"));
    }

    #[test]
    fn explicit_jar_is_used() {
        let jar = Arc::new(CookieJar::new(CookiePolicy::AcceptNone));
        let agent = AgentBuilder::new().cookie_jar(jar.clone()).build();
        assert!(Arc::ptr_eq(&agent.cookie_jar(), &jar));
        let clone = agent.clone();
        assert!(Arc::ptr_eq(&clone.cookie_jar(), &jar));
    }

    #[test]
    fn no_jar_falls_back_to_process_default() {
        let agent = Agent::new();
        assert!(Arc::ptr_eq(&agent.cookie_jar(), &cookies::default_jar()));
    }
}
