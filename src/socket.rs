use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::transport::{is_timeout, split_records, Transport, TransportError};

/// Connection parameters for [`SocketTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketConfig {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl SocketConfig {
    /// New configuration with the default 1 s read timeout.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Duration::from_secs(1),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Stream-socket transport over TCP.
///
/// `recv` is a single read of at most the requested budget. `read_lines`
/// accumulates chunks until the data ends with the terminator; the timeout
/// bounds each read, not the whole exchange.
pub struct SocketTransport {
    config: SocketConfig,
    stream: Option<TcpStream>,
    terminator: String,
}

impl SocketTransport {
    pub fn new(config: SocketConfig) -> Self {
        Self {
            config,
            stream: None,
            terminator: String::from("\n"),
        }
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }
}

/// Resolve `host:port` and connect with `timeout`, trying each candidate
/// address in resolution order. The address family follows resolution; the
/// socket is always a stream socket.
pub(crate) fn open_stream(
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<TcpStream, TransportError> {
    let endpoint = format!("{host}:{port}");
    let addrs = endpoint
        .to_socket_addrs()
        .map_err(|source| TransportError::Connect {
            endpoint: endpoint.clone(),
            source,
        })?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                return Ok(stream);
            }
            Err(source) => last_err = Some(source),
        }
    }

    Err(TransportError::Connect {
        endpoint,
        source: last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no addresses resolved")
        }),
    })
}

impl Transport for SocketTransport {
    fn kind(&self) -> &'static str {
        "socket"
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn open(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = open_stream(&self.config.host, self.config.port, self.config.timeout)?;
        log::debug!("Connected to {}", self.endpoint());
        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("Closed connection to {}", self.endpoint());
        }
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    fn terminator(&self) -> &str {
        &self.terminator
    }

    fn send(&mut self, payload: &str) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        let framed = format!("{}{}", payload, self.terminator);
        log::trace!("socket send: {:?}", framed);
        stream.write_all(framed.as_bytes())?;
        Ok(())
    }

    fn recv(&mut self, max_bytes: usize) -> Result<Vec<u8>, TransportError> {
        if max_bytes == 0 {
            return Ok(Vec::new());
        }
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        let mut buf = vec![0u8; max_bytes];
        match stream.read(&mut buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => {
                buf.truncate(n);
                log::trace!("socket recv: {:?}", String::from_utf8_lossy(&buf));
                Ok(buf)
            }
            Err(e) if is_timeout(&e) => Err(TransportError::Timeout {
                after: self.config.timeout,
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn read_lines(&mut self) -> Result<Vec<Vec<u8>>, TransportError> {
        let term = self.terminator.as_bytes().to_vec();
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        let mut data = Vec::new();
        let mut chunk = [0u8; 512];

        loop {
            match stream.read(&mut chunk) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => {
                    data.extend_from_slice(&chunk[..n]);
                    if data.ends_with(&term) {
                        break;
                    }
                }
                Err(e) if is_timeout(&e) => {
                    return Err(TransportError::Timeout {
                        after: self.config.timeout,
                    })
                }
                Err(e) => return Err(e.into()),
            }
        }

        log::trace!("socket recv: {:?}", String::from_utf8_lossy(&data));
        Ok(split_records(&data, &term))
    }
}
