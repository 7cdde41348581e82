//! # Error Handling

use std::{fmt, time::Duration};

/// Represents all possible errors that can occur in the DumpKeeper system.
pub enum Error {
    /// Represents an underlying I/O error raised by the sink while writing or flushing.
    Io(std::io::Error),

    /// The logger has started shutting down (or has finished) and no longer
    /// accepts records or flush requests.
    LoggerClosed,

    /// The background worker did not exit within the shutdown grace period.
    ///
    /// This is never fatal: shutdown continues with a forced drain.
    WorkerJoinTimeout(Duration),

    /// The background worker thread panicked. Carries the panic payload if it was a string.
    WorkerPanicked(String),

    /// A persisted line could not be parsed back into a record.
    MalformedRecord(String),
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => f.debug_tuple("Io").field(err).finish(),
            Error::LoggerClosed => f.debug_tuple("LoggerClosed").finish(),
            Error::WorkerJoinTimeout(timeout) => {
                f.debug_tuple("WorkerJoinTimeout").field(timeout).finish()
            }
            Error::WorkerPanicked(msg) => f.debug_tuple("WorkerPanicked").field(msg).finish(),
            Error::MalformedRecord(line) => f.debug_tuple("MalformedRecord").field(line).finish(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {err}"),
            Error::LoggerClosed => write!(f, "DumpKeeper closed"),
            Error::WorkerJoinTimeout(timeout) => {
                write!(f, "DumpKeeper worker did not exit within {timeout:?}")
            }
            Error::WorkerPanicked(msg) => write!(f, "DumpKeeper worker panicked: {msg}"),
            Error::MalformedRecord(line) => write!(f, "Malformed record: {line}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn test_io_error_display() {
        let io_err = io::Error::other("disk full");
        let err = Error::Io(io_err);
        let s = format!("{err}");
        assert!(s.contains("IO error: disk full"));
    }

    #[test]
    fn test_io_error_has_source() {
        let err: Error = io::Error::other("boom").into();
        assert!(err.source().is_some());
        assert!(Error::LoggerClosed.source().is_none());
    }

    #[test]
    fn test_logger_closed_display() {
        assert_eq!(format!("{}", Error::LoggerClosed), "DumpKeeper closed");
        assert_eq!(format!("{:?}", Error::LoggerClosed), "LoggerClosed");
    }

    #[test]
    fn test_join_timeout_display() {
        let err = Error::WorkerJoinTimeout(Duration::from_secs(2));
        assert_eq!(format!("{err}"), "DumpKeeper worker did not exit within 2s");
    }

    #[test]
    fn test_worker_panicked_display() {
        let err = Error::WorkerPanicked("oops".to_string());
        assert_eq!(format!("{err}"), "DumpKeeper worker panicked: oops");
    }

    #[test]
    fn test_malformed_record_display() {
        let err = Error::MalformedRecord("abc".to_string());
        assert_eq!(format!("{err}"), "Malformed record: abc");
    }
}
