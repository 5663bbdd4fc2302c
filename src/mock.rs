use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::transport::{split_records, Transport, TransportError};

/// Cloneable view of a mock's outbound frames.
///
/// Take a handle with [`MockTransport::journal`] before boxing the mock
/// into a `Communicator`; the handle keeps observing frames after the
/// mock itself is out of reach.
#[derive(Debug, Clone, Default)]
pub struct MockJournal {
    entries: Rc<RefCell<Vec<(Vec<u8>, String)>>>,
}

impl MockJournal {
    fn record(&self, frame: Vec<u8>, terminator: &str) {
        self.entries
            .borrow_mut()
            .push((frame, terminator.to_string()));
    }

    /// Every frame sent so far, terminators included.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.entries
            .borrow()
            .iter()
            .map(|(frame, _)| frame.clone())
            .collect()
    }

    /// Sent frames as text, each stripped of the terminator it was framed
    /// with at send time.
    pub fn lines(&self) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .map(|(frame, term)| {
                let body = frame.strip_suffix(term.as_bytes()).unwrap_or(frame);
                String::from_utf8_lossy(body).into_owned()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Scripted in-memory transport for tests and development without hardware.
///
/// Every outbound frame is recorded verbatim, terminator included. Reads
/// pop canned responses from a FIFO queued with [`push_response`]; an empty
/// queue reads as a timeout. The open/closed contract matches the real
/// transports: nothing moves while the transport is closed.
///
/// [`push_response`]: MockTransport::push_response
///
/// ```
/// use labwire::{MockTransport, Transport};
///
/// let mut mock = MockTransport::new();
/// mock.push_response(b"SINE\n".to_vec());
/// mock.open()?;
/// mock.send("FUNC?")?;
/// assert_eq!(mock.recv(64)?, b"SINE\n");
/// assert_eq!(mock.sent_lines(), vec!["FUNC?"]);
/// # Ok::<(), labwire::TransportError>(())
/// ```
#[derive(Debug)]
pub struct MockTransport {
    open: bool,
    terminator: String,
    journal: MockJournal,
    responses: VecDeque<Vec<u8>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            open: false,
            terminator: String::from("\n"),
            journal: MockJournal::default(),
            responses: VecDeque::new(),
        }
    }

    /// Queue a canned response for a later read.
    pub fn push_response(&mut self, bytes: impl Into<Vec<u8>>) {
        self.responses.push_back(bytes.into());
    }

    /// A handle onto the outbound frame log.
    pub fn journal(&self) -> MockJournal {
        self.journal.clone()
    }

    /// Every frame sent so far, terminators included.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.journal.frames()
    }

    /// Sent frames as text with their terminators stripped.
    pub fn sent_lines(&self) -> Vec<String> {
        self.journal.lines()
    }

    /// Number of canned responses still queued.
    pub fn pending_responses(&self) -> usize {
        self.responses.len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn kind(&self) -> &'static str {
        "mock"
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn open(&mut self) -> Result<(), TransportError> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    fn terminator(&self) -> &str {
        &self.terminator
    }

    fn send(&mut self, payload: &str) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        let frame = format!("{}{}", payload, self.terminator).into_bytes();
        self.journal.record(frame, &self.terminator);
        Ok(())
    }

    fn recv(&mut self, max_bytes: usize) -> Result<Vec<u8>, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        if max_bytes == 0 {
            return Ok(Vec::new());
        }
        let mut response = self.responses.pop_front().ok_or(TransportError::Timeout {
            after: Duration::ZERO,
        })?;
        // Honor the byte budget: the remainder stays queued for the next
        // read, like unread bytes in a socket buffer.
        if response.len() > max_bytes {
            let rest = response.split_off(max_bytes);
            self.responses.push_front(rest);
        }
        Ok(response)
    }

    fn read_lines(&mut self) -> Result<Vec<Vec<u8>>, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        let term = self.terminator.as_bytes().to_vec();
        let mut data = Vec::new();
        loop {
            let chunk = self.responses.pop_front().ok_or(TransportError::Timeout {
                after: Duration::ZERO,
            })?;
            data.extend(chunk);
            if data.ends_with(&term) {
                break;
            }
        }
        Ok(split_records(&data, &term))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_sent_frames_with_terminator() {
        let mut mock = MockTransport::new();
        mock.open().unwrap();
        mock.set_terminator("\r\n");
        mock.send("READ").unwrap();
        assert_eq!(mock.sent(), vec![b"READ\r\n".to_vec()]);
        assert_eq!(mock.sent_lines(), vec!["READ"]);
    }

    #[test]
    fn test_journal_outlives_the_boxed_mock() {
        let mut mock = MockTransport::new();
        let journal = mock.journal();
        mock.open().unwrap();
        mock.send("*RST").unwrap();
        drop(mock);
        assert_eq!(journal.lines(), vec!["*RST"]);
        assert_eq!(journal.frames(), vec![b"*RST\n".to_vec()]);
    }

    #[test]
    fn test_closed_mock_fails_fast() {
        let mut mock = MockTransport::new();
        assert!(matches!(mock.send("*CLS"), Err(TransportError::NotOpen)));
        assert!(matches!(mock.recv(16), Err(TransportError::NotOpen)));
    }

    #[test]
    fn test_open_twice_is_idempotent() {
        let mut mock = MockTransport::new();
        mock.push_response(b"1\n".to_vec());
        mock.open().unwrap();
        mock.open().unwrap();
        assert!(mock.is_open());
        mock.send("*OPC?").unwrap();
        assert_eq!(mock.recv(16).unwrap(), b"1\n");
    }

    #[test]
    fn test_exhausted_script_reads_as_timeout() {
        let mut mock = MockTransport::new();
        mock.open().unwrap();
        assert!(matches!(
            mock.recv(16),
            Err(TransportError::Timeout { .. })
        ));
    }

    #[test]
    fn test_recv_honors_byte_budget() {
        let mut mock = MockTransport::new();
        mock.open().unwrap();
        mock.push_response(b"0123456789".to_vec());
        assert_eq!(mock.recv(4).unwrap(), b"0123");
        assert_eq!(mock.recv(16).unwrap(), b"456789");
    }

    #[test]
    fn test_read_lines_accumulates_until_terminator() {
        let mut mock = MockTransport::new();
        mock.open().unwrap();
        mock.set_terminator(";");
        mock.push_response(b"alpha;be".to_vec());
        mock.push_response(b"ta;".to_vec());
        assert_eq!(
            mock.read_lines().unwrap(),
            vec![b"alpha".to_vec(), b"beta".to_vec()]
        );
    }
}
