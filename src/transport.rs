use std::time::Duration;

/// A line-oriented connection to an instrument.
///
/// The three wire backends ([`SocketTransport`](crate::socket::SocketTransport),
/// [`SerialTransport`](crate::serial::SerialTransport),
/// [`TelnetTransport`](crate::telnet::TelnetTransport)) and the scripted
/// [`MockTransport`](crate::mock::MockTransport) all implement this trait, so
/// device code holds a `Box<dyn Transport>` and never cares which wire is
/// underneath.
///
/// The transport owns the line terminator: `send` appends it to every
/// outbound payload and `read_lines` frames inbound data on it.
pub trait Transport {
    /// Short label of the wire, e.g. `"socket"` or `"serial"`.
    fn kind(&self) -> &'static str;

    /// Whether the connection is currently established.
    fn is_open(&self) -> bool;

    /// Establish the connection. Opening an already open transport is a
    /// no-op; the open state is only set once the handle exists.
    fn open(&mut self) -> Result<(), TransportError>;

    /// Drop the connection and release the handle. Closing a closed
    /// transport is a no-op.
    fn close(&mut self);

    /// Replace the line terminator used for framing.
    fn set_terminator(&mut self, terminator: &str);

    /// The current line terminator.
    fn terminator(&self) -> &str;

    /// Write `payload` followed by the terminator.
    fn send(&mut self, payload: &str) -> Result<(), TransportError>;

    /// One read of at most `max_bytes`, returned raw.
    fn recv(&mut self, max_bytes: usize) -> Result<Vec<u8>, TransportError>;

    /// Read until the accumulated data ends with the terminator, then split
    /// it into records with the terminators stripped.
    fn read_lines(&mut self) -> Result<Vec<Vec<u8>>, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport is not open")]
    NotOpen,

    #[error("Connection closed by the remote end")]
    Closed,

    #[error("No response within {after:?}")]
    Timeout { after: Duration },

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Split data that was framed with `terminator` into records, dropping the
/// terminators themselves. A trailing fragment without a terminator is kept
/// as a final record.
pub(crate) fn split_records(data: &[u8], terminator: &[u8]) -> Vec<Vec<u8>> {
    if terminator.is_empty() {
        return vec![data.to_vec()];
    }

    let mut records = Vec::new();
    let mut rest = data;
    while let Some(pos) = find(rest, terminator) {
        records.push(rest[..pos].to_vec());
        rest = &rest[pos + terminator.len()..];
    }
    if !rest.is_empty() {
        records.push(rest.to_vec());
    }
    records
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

pub(crate) fn is_timeout(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_records_single_line() {
        assert_eq!(split_records(b"1000\n", b"\n"), vec![b"1000".to_vec()]);
    }

    #[test]
    fn test_split_records_multiple_lines() {
        assert_eq!(
            split_records(b"alpha;beta;", b";"),
            vec![b"alpha".to_vec(), b"beta".to_vec()]
        );
    }

    #[test]
    fn test_split_records_multibyte_terminator() {
        assert_eq!(
            split_records(b"OK\r\n+0,\"No error\"\r\n", b"\r\n"),
            vec![b"OK".to_vec(), b"+0,\"No error\"".to_vec()]
        );
    }

    #[test]
    fn test_split_records_keeps_unterminated_tail() {
        assert_eq!(
            split_records(b"one\ntwo", b"\n"),
            vec![b"one".to_vec(), b"two".to_vec()]
        );
    }

    #[test]
    fn test_split_records_empty_line() {
        assert_eq!(split_records(b"\n", b"\n"), vec![Vec::<u8>::new()]);
    }
}
