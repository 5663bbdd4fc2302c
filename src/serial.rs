use std::io::{Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::transport::{is_timeout, split_records, Transport, TransportError};

/// Connection parameters for [`SerialTransport`].
///
/// Defaults to 9600 baud, 8 data bits, no parity, one stop bit, no flow
/// control and a 1 s read timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    pub timeout: Duration,
}

impl SerialConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            timeout: Duration::from_secs(1),
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_data_bits(mut self, data_bits: DataBits) -> Self {
        self.data_bits = data_bits;
        self
    }

    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn with_stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    pub fn with_flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = flow_control;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Serial-line transport.
///
/// `read_lines` reads byte by byte and stops once the data ends with the
/// terminator; the timeout bounds each byte wait. Stale input is cleared
/// when the port opens.
pub struct SerialTransport {
    config: SerialConfig,
    handle: Option<Box<dyn SerialPort>>,
    terminator: String,
}

impl SerialTransport {
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            handle: None,
            terminator: String::from("\n"),
        }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

/// Enumerate the serial ports visible to the OS.
pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>, TransportError> {
    Ok(serialport::available_ports()?)
}

impl Transport for SerialTransport {
    fn kind(&self) -> &'static str {
        "serial"
    }

    fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    fn open(&mut self) -> Result<(), TransportError> {
        if self.handle.is_some() {
            return Ok(());
        }
        let handle = serialport::new(&self.config.port, self.config.baud_rate)
            .data_bits(self.config.data_bits)
            .parity(self.config.parity)
            .stop_bits(self.config.stop_bits)
            .flow_control(self.config.flow_control)
            .timeout(self.config.timeout)
            .open()?;
        handle.clear(ClearBuffer::All)?;
        log::debug!("Opened serial port {}", self.config.port);
        self.handle = Some(handle);
        Ok(())
    }

    fn close(&mut self) {
        if self.handle.take().is_some() {
            log::debug!("Closed serial port {}", self.config.port);
        }
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    fn terminator(&self) -> &str {
        &self.terminator
    }

    fn send(&mut self, payload: &str) -> Result<(), TransportError> {
        let handle = self.handle.as_mut().ok_or(TransportError::NotOpen)?;
        let framed = format!("{}{}", payload, self.terminator);
        log::trace!("serial send: {:?}", framed);
        handle.write_all(framed.as_bytes())?;
        Ok(())
    }

    fn recv(&mut self, max_bytes: usize) -> Result<Vec<u8>, TransportError> {
        if max_bytes == 0 {
            return Ok(Vec::new());
        }
        let handle = self.handle.as_mut().ok_or(TransportError::NotOpen)?;
        let mut buf = vec![0u8; max_bytes];
        match handle.read(&mut buf) {
            // A serial line has no peer close; a zero read is the timeout
            // surfacing.
            Ok(0) => Err(TransportError::Timeout {
                after: self.config.timeout,
            }),
            Ok(n) => {
                buf.truncate(n);
                log::trace!("serial recv: {:?}", String::from_utf8_lossy(&buf));
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
        let handle = self.handle.as_mut().ok_or(TransportError::NotOpen)?;
        let mut data = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            match handle.read(&mut byte) {
                Ok(0) => {
                    return Err(TransportError::Timeout {
                        after: self.config.timeout,
                    })
                }
                Ok(_) => {
                    data.push(byte[0]);
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

        log::trace!("serial recv: {:?}", String::from_utf8_lossy(&data));
        Ok(split_records(&data, &term))
    }
}
