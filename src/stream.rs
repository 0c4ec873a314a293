use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
#[cfg(test)]
use std::io::Cursor;

use log::debug;
use url::Url;

use crate::agent::AgentConfig;
use crate::error::{Error, ErrorKind};

/// A connection to a server. Dropping it closes the socket.
pub(crate) enum Stream {
    Http(TcpStream),
    #[cfg(feature = "tls")]
    Https(Box<rustls::StreamOwned<rustls::ClientConnection, TcpStream>>),
    /// Scripted server bytes and a sink for what the client writes.
    #[cfg(test)]
    Test(Cursor<Vec<u8>>, Vec<u8>),
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stream::Http(sock) => write!(f, "Stream(http {:?})", sock.peer_addr().ok()),
            #[cfg(feature = "tls")]
            Stream::Https(stream) => write!(f, "Stream(https {:?})", stream.sock.peer_addr().ok()),
            #[cfg(test)]
            Stream::Test(_, _) => write!(f, "Stream(test)"),
        }
    }
}

impl Stream {
    #[cfg(test)]
    pub(crate) fn from_vec(v: Vec<u8>) -> Stream {
        Stream::Test(Cursor::new(v), Vec::new())
    }

    #[cfg(test)]
    pub(crate) fn written(&self) -> &[u8] {
        match self {
            Stream::Test(_, w) => w.as_slice(),
            _ => &[],
        }
    }

    /// Close the connection. The server sees the socket shut down even if
    /// something else still holds a clone of the file descriptor.
    pub(crate) fn disconnect(self) {
        let sock = match &self {
            Stream::Http(sock) => Some(sock),
            #[cfg(feature = "tls")]
            Stream::Https(stream) => Some(&stream.sock),
            #[cfg(test)]
            Stream::Test(_, _) => None,
        };
        if let Some(sock) = sock {
            // Already closed by the peer is fine.
            let _ = sock.shutdown(Shutdown::Both);
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Http(sock) => sock.read(buf),
            #[cfg(feature = "tls")]
            Stream::Https(stream) => match stream.read(buf) {
                Err(ref e) if is_close_notify(e) => Ok(0),
                v => v,
            },
            #[cfg(test)]
            Stream::Test(reader, _) => reader.read(buf),
        }
    }
}

#[allow(deprecated)]
#[cfg(feature = "tls")]
fn is_close_notify(e: &std::io::Error) -> bool {
    if e.kind() != io::ErrorKind::ConnectionAborted {
        return false;
    }
    if let Some(msg) = e.get_ref() {
        return msg.description().contains("CloseNotify");
    }
    false
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Http(sock) => sock.write(buf),
            #[cfg(feature = "tls")]
            Stream::Https(stream) => stream.write(buf),
            #[cfg(test)]
            Stream::Test(_, writer) => writer.write(buf),
        }
    }
    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Http(sock) => sock.flush(),
            #[cfg(feature = "tls")]
            Stream::Https(stream) => stream.flush(),
            #[cfg(test)]
            Stream::Test(_, writer) => writer.flush(),
        }
    }
}

/// Open a connection for `url`, plain or TLS depending on the scheme.
pub(crate) fn connect(url: &Url, config: &AgentConfig) -> Result<Stream, Error> {
    match url.scheme() {
        "http" => connect_http(url, config),
        #[cfg(feature = "tls")]
        "https" => connect_https(url, config),
        scheme => Err(ErrorKind::UnknownScheme.msg(&format!("unsupported scheme '{}'", scheme))),
    }
}

fn connect_http(url: &Url, config: &AgentConfig) -> Result<Stream, Error> {
    let hostname = host_of(url)?;
    let port = url.port_or_known_default().unwrap_or(80);
    connect_host(hostname, port, config).map(Stream::Http)
}

#[cfg(feature = "tls")]
use std::convert::TryFrom;

#[cfg(feature = "tls")]
fn connect_https(url: &Url, config: &AgentConfig) -> Result<Stream, Error> {
    let hostname = host_of(url)?;
    let port = url.port_or_known_default().unwrap_or(443);
    let mut sock = connect_host(hostname, port, config)?;

    let server_name = rustls::ServerName::try_from(hostname)
        .map_err(|_e| ErrorKind::Dns.msg(&format!("invalid TLS server name {}", hostname)))?;
    let mut sess = rustls::ClientConnection::new(config.tls_config.clone(), server_name)
        .map_err(|e| ErrorKind::Io.new().src(e))?;

    sess.complete_io(&mut sock)
        .map_err(|err| ErrorKind::ConnectionFailed.msg("TLS handshake failed").src(err))?;
    let stream = rustls::StreamOwned::new(sess, sock);

    Ok(Stream::Https(Box::new(stream)))
}

fn host_of(url: &Url) -> Result<&str, Error> {
    let host = url
        .host_str()
        .ok_or_else(|| ErrorKind::InvalidUrl.msg("no host in url"))?;
    // IPv6 literals come bracketed from the url crate.
    Ok(host.trim_start_matches('[').trim_end_matches(']'))
}

fn connect_host(hostname: &str, port: u16, config: &AgentConfig) -> Result<TcpStream, Error> {
    let sock_addrs: Vec<SocketAddr> = (hostname, port)
        .to_socket_addrs()
        .map_err(|e| ErrorKind::Dns.msg(&format!("lookup of {} failed", hostname)).src(e))?
        .collect();

    let mut any_err = None;
    let mut any_stream = None;
    // Find the first sock_addr that accepts a connection
    for sock_addr in sock_addrs {
        debug!("connecting to {} at {}", hostname, sock_addr);
        let stream = match config.timeout_connect {
            Some(timeout) => TcpStream::connect_timeout(&sock_addr, timeout),
            None => TcpStream::connect(sock_addr),
        };

        match stream {
            Ok(stream) => {
                any_stream = Some(stream);
                break;
            }
            Err(err) => any_err = Some(err),
        }
    }

    let stream = if let Some(stream) = any_stream {
        stream
    } else if let Some(e) = any_err {
        return Err(ErrorKind::ConnectionFailed.msg("Connect error").src(e));
    } else {
        return Err(ErrorKind::Dns.msg(&format!("No ip address for {}", hostname)));
    };

    stream.set_nodelay(true)?;
    stream.set_read_timeout(config.timeout_read)?;
    stream.set_write_timeout(config.timeout_write)?;

    Ok(stream)
}
