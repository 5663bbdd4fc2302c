use crate::decode::RawResponse;
use crate::transport::{Transport, TransportError};

/// How a query collects its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// One read of at most this many bytes.
    Budget(usize),
    /// Read until the terminator, split into records.
    Lines,
}

type OpenHook = Box<dyn FnMut(&mut dyn Transport) -> Result<(), TransportError>>;

/// Uniform request/response wrapper around one transport.
///
/// The communicator owns its transport exclusively; dropping it closes the
/// connection. `query` composes a send with the read dictated by the
/// configured [`ResponseMode`] (default: a 4096 byte budget). Errors pass
/// through untouched, with no retries and no effect on connection state.
///
/// Because every operation takes `&mut self`, a query's send and read
/// cannot interleave with another query on the same instance.
///
/// ```
/// use labwire::{Communicator, MockTransport, RawResponse, Transport};
///
/// let mut mock = MockTransport::new();
/// mock.push_response(b"1000\n".to_vec());
///
/// let mut com = Communicator::new(Box::new(mock));
/// com.open()?;
/// let reply = com.query("FREQ?")?;
/// assert_eq!(reply, RawResponse::Bytes(b"1000\n".to_vec()));
/// # Ok::<(), labwire::TransportError>(())
/// ```
pub struct Communicator {
    link: Box<dyn Transport>,
    mode: ResponseMode,
    on_open: Vec<OpenHook>,
}

impl Communicator {
    pub const DEFAULT_BUDGET: usize = 4096;

    pub fn new(link: Box<dyn Transport>) -> Self {
        Self {
            link,
            mode: ResponseMode::Budget(Self::DEFAULT_BUDGET),
            on_open: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ResponseMode {
        self.mode
    }

    /// Register a hook that runs after every successful open, in
    /// registration order. Device layers use this to reapply their
    /// terminator and session setup on reconnects.
    pub fn on_open<F>(&mut self, hook: F)
    where
        F: FnMut(&mut dyn Transport) -> Result<(), TransportError> + 'static,
    {
        self.on_open.push(Box::new(hook));
    }

    /// Open the transport, then run the registered hooks.
    pub fn open(&mut self) -> Result<(), TransportError> {
        self.link.open()?;
        for hook in &mut self.on_open {
            hook(self.link.as_mut())?;
        }
        Ok(())
    }

    pub fn close(&mut self) {
        self.link.close();
    }

    pub fn is_open(&self) -> bool {
        self.link.is_open()
    }

    pub fn set_terminator(&mut self, terminator: &str) {
        self.link.set_terminator(terminator);
    }

    pub fn terminator(&self) -> &str {
        self.link.terminator()
    }

    pub fn transport_kind(&self) -> &'static str {
        self.link.kind()
    }

    pub fn send(&mut self, msg: &str) -> Result<(), TransportError> {
        self.link.send(msg)
    }

    pub fn recv(&mut self, max_bytes: usize) -> Result<Vec<u8>, TransportError> {
        self.link.recv(max_bytes)
    }

    pub fn read_lines(&mut self) -> Result<Vec<Vec<u8>>, TransportError> {
        self.link.read_lines()
    }

    /// Send `msg`, then read the reply according to the configured mode.
    pub fn query(&mut self, msg: &str) -> Result<RawResponse, TransportError> {
        match self.mode {
            ResponseMode::Budget(budget) => self.query_bytes(msg, budget),
            ResponseMode::Lines => {
                self.link.send(msg)?;
                Ok(RawResponse::Lines(self.link.read_lines()?))
            }
        }
    }

    /// Send `msg`, then read at most `budget` bytes regardless of the
    /// configured mode.
    pub fn query_bytes(&mut self, msg: &str, budget: usize) -> Result<RawResponse, TransportError> {
        self.link.send(msg)?;
        Ok(RawResponse::Bytes(self.link.recv(budget)?))
    }
}

impl Drop for Communicator {
    fn drop(&mut self) {
        self.link.close();
    }
}
