use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::socket::open_stream;
use crate::transport::{is_timeout, split_records, Transport, TransportError};

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

/// Connection parameters for [`TelnetTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelnetConfig {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl TelnetConfig {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NvtState {
    Data,
    Iac,
    /// Saw IAC DO/DONT/WILL/WONT; the held byte is our refusal verb.
    Opt(u8),
    Sub,
    SubIac,
}

/// Stateful IAC filter. Carries its state across chunks, so a command
/// sequence split over two reads is still handled.
#[derive(Debug)]
struct NvtFilter {
    state: NvtState,
}

impl NvtFilter {
    fn new() -> Self {
        Self {
            state: NvtState::Data,
        }
    }

    /// Feed one raw chunk. Payload bytes land in `data`, refusal answers
    /// in `replies`.
    fn feed(&mut self, chunk: &[u8], data: &mut Vec<u8>, replies: &mut Vec<u8>) {
        for &byte in chunk {
            match self.state {
                NvtState::Data => match byte {
                    IAC => self.state = NvtState::Iac,
                    _ => data.push(byte),
                },
                NvtState::Iac => match byte {
                    IAC => {
                        data.push(IAC);
                        self.state = NvtState::Data;
                    }
                    DO | DONT => self.state = NvtState::Opt(WONT),
                    WILL | WONT => self.state = NvtState::Opt(DONT),
                    SB => self.state = NvtState::Sub,
                    _ => self.state = NvtState::Data,
                },
                NvtState::Opt(refusal) => {
                    log::debug!("Refusing telnet option {}", byte);
                    replies.extend_from_slice(&[IAC, refusal, byte]);
                    self.state = NvtState::Data;
                }
                NvtState::Sub => {
                    if byte == IAC {
                        self.state = NvtState::SubIac;
                    }
                }
                NvtState::SubIac => match byte {
                    SE => self.state = NvtState::Data,
                    _ => self.state = NvtState::Sub,
                },
            }
        }
    }
}

/// Minimal Telnet NVT client over TCP.
///
/// All option negotiation is refused: `DO x` is answered with `WONT x`,
/// `WILL x` with `DONT x`, and subnegotiation blocks are dropped. An
/// escaped `IAC IAC` comes through as a literal 0xFF. Only the bytes left
/// after filtering count as instrument data, so a read that yields nothing
/// but negotiation is retried until payload or the deadline arrives.
pub struct TelnetTransport {
    config: TelnetConfig,
    stream: Option<TcpStream>,
    terminator: String,
    filter: NvtFilter,
}

impl TelnetTransport {
    pub fn new(config: TelnetConfig) -> Self {
        Self {
            config,
            stream: None,
            terminator: String::from("\n"),
            filter: NvtFilter::new(),
        }
    }

    pub fn config(&self) -> &TelnetConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// One raw read, filtered. Refusals are written back before returning.
    /// `Ok(bytes)` may be empty when the chunk was negotiation only.
    fn read_filtered(&mut self, max_bytes: usize) -> Result<Vec<u8>, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        let mut chunk = vec![0u8; max_bytes];
        let n = match stream.read(&mut chunk) {
            Ok(0) => return Err(TransportError::Closed),
            Ok(n) => n,
            Err(e) if is_timeout(&e) => {
                return Err(TransportError::Timeout {
                    after: self.config.timeout,
                })
            }
            Err(e) => return Err(e.into()),
        };

        let mut data = Vec::with_capacity(n);
        let mut replies = Vec::new();
        self.filter.feed(&chunk[..n], &mut data, &mut replies);

        if !replies.is_empty() {
            stream.write_all(&replies)?;
        }
        Ok(data)
    }
}

impl Transport for TelnetTransport {
    fn kind(&self) -> &'static str {
        "telnet"
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn open(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = open_stream(&self.config.host, self.config.port, self.config.timeout)?;
        log::debug!("Connected to {} (telnet)", self.endpoint());
        self.stream = Some(stream);
        self.filter = NvtFilter::new();
        Ok(())
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("Closed connection to {} (telnet)", self.endpoint());
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
        log::trace!("telnet send: {:?}", framed);
        stream.write_all(framed.as_bytes())?;
        Ok(())
    }

    fn recv(&mut self, max_bytes: usize) -> Result<Vec<u8>, TransportError> {
        if max_bytes == 0 {
            return Ok(Vec::new());
        }
        loop {
            let data = self.read_filtered(max_bytes)?;
            if !data.is_empty() {
                log::trace!("telnet recv: {:?}", String::from_utf8_lossy(&data));
                return Ok(data);
            }
        }
    }

    fn read_lines(&mut self) -> Result<Vec<Vec<u8>>, TransportError> {
        let term = self.terminator.as_bytes().to_vec();
        let mut data = Vec::new();
        loop {
            data.extend(self.read_filtered(512)?);
            if data.ends_with(&term) {
                break;
            }
        }
        log::trace!("telnet recv: {:?}", String::from_utf8_lossy(&data));
        Ok(split_records(&data, &term))
    }
}
