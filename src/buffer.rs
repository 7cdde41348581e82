//! # Buffered Sink

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

/// The destination log lines are appended to.
///
/// The drainer only needs three things from a sink: append a line, force
/// buffered bytes out, and report how many bytes are still waiting for that
/// force. Any sink is owned by exactly one drainer and is never shared.
pub trait Sink: Send {
    /// Appends one line. The sink adds the line terminator.
    fn append(&mut self, line: &str) -> std::io::Result<()>;

    /// Forces every appended byte to the underlying storage.
    fn flush(&mut self) -> std::io::Result<()>;

    /// Bytes appended since the last successful [`flush`](Sink::flush).
    fn unflushed_len(&self) -> u64;

    /// Total bytes in the destination, flushed or not.
    fn position(&self) -> u64;

    /// Flushes and releases the sink. Appends after `close` are undefined.
    fn close(&mut self) -> std::io::Result<()> {
        self.flush()
    }
}

/// When a drain should force the sink to flush, based on unflushed bytes.
///
/// Built from a signed buffer size: negative never flushes on size, zero
/// flushes after every write, positive `N` flushes once `N` bytes are pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    Never,
    EveryWrite,
    Threshold(u64),
}

impl FlushPolicy {
    pub fn should_flush(&self, unflushed: u64) -> bool {
        match self {
            FlushPolicy::Never => false,
            FlushPolicy::EveryWrite => unflushed > 0,
            FlushPolicy::Threshold(limit) => unflushed >= *limit,
        }
    }
}

impl From<i64> for FlushPolicy {
    fn from(buffer_size: i64) -> Self {
        match buffer_size {
            n if n < 0 => FlushPolicy::Never,
            0 => FlushPolicy::EveryWrite,
            n => FlushPolicy::Threshold(n.unsigned_abs()),
        }
    }
}

/// A buffered line writer over any `Write + Send` destination.
///
/// Lines are written through a [`BufWriter`], so small appends are coalesced
/// in memory until the sink is flushed (or the `BufWriter` fills up). The
/// buffer tracks how many bytes have been appended since the last explicit
/// flush, which drives [`FlushPolicy::Threshold`].
pub struct LogBuffer {
    writer: BufWriter<Box<dyn Write + Send>>,
    unflushed: u64,
    position: u64,
}

impl LogBuffer {
    /// Wraps a writer. `position` is the number of bytes already present in
    /// the destination (zero for a fresh stream).
    pub fn new(writer: Box<dyn Write + Send>, position: u64) -> Self {
        LogBuffer {
            writer: BufWriter::new(writer),
            unflushed: 0,
            position,
        }
    }

    /// Opens `path` in append mode, creating the file if it does not exist.
    ///
    /// Existing content is kept, so successive runs accumulate into one file.
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let existing = file.metadata()?.len();
        Ok(LogBuffer::new(Box::new(file), existing))
    }
}

impl Sink for LogBuffer {
    fn append(&mut self, line: &str) -> std::io::Result<()> {
        writeln!(self.writer, "{line}")?;
        let written = line.len() as u64 + 1;
        self.unflushed += written;
        self.position += written;
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()?;
        self.unflushed = 0;
        Ok(())
    }

    fn unflushed_len(&self) -> u64 {
        self.unflushed
    }

    fn position(&self) -> u64 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct MockWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl MockWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buffer = Arc::new(Mutex::new(Vec::new()));
            (
                MockWriter {
                    buffer: buffer.clone(),
                },
                buffer,
            )
        }
    }

    impl Write for MockWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let mut buffer = self.buffer.lock().unwrap();
            buffer.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn output(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
    }

    mod test_policy {
        use super::*;

        #[test]
        fn test_policy_from_buffer_size() {
            assert_eq!(FlushPolicy::from(-1i64), FlushPolicy::Never);
            assert_eq!(FlushPolicy::from(i64::MIN), FlushPolicy::Never);
            assert_eq!(FlushPolicy::from(0i64), FlushPolicy::EveryWrite);
            assert_eq!(FlushPolicy::from(4096i64), FlushPolicy::Threshold(4096));
        }

        #[test]
        fn test_never_policy() {
            assert!(!FlushPolicy::Never.should_flush(0));
            assert!(!FlushPolicy::Never.should_flush(u64::MAX));
        }

        #[test]
        fn test_every_write_policy() {
            assert!(!FlushPolicy::EveryWrite.should_flush(0));
            assert!(FlushPolicy::EveryWrite.should_flush(1));
        }

        #[test]
        fn test_threshold_policy() {
            let policy = FlushPolicy::Threshold(10);
            assert!(!policy.should_flush(9));
            assert!(policy.should_flush(10));
            assert!(policy.should_flush(11));
        }
    }

    #[test]
    fn test_append_holds_bytes_until_flush() {
        let (writer, out) = MockWriter::new();
        let mut sink = LogBuffer::new(Box::new(writer), 0);

        sink.append("1,evt,a").unwrap();

        assert!(out.lock().unwrap().is_empty());
        assert_eq!(sink.unflushed_len(), 8);
        assert_eq!(sink.position(), 8);
    }

    #[test]
    fn test_flush_writes_lines_in_order() {
        let (writer, out) = MockWriter::new();
        let mut sink = LogBuffer::new(Box::new(writer), 0);

        sink.append("first").unwrap();
        sink.append("second").unwrap();
        sink.append("third").unwrap();
        sink.flush().unwrap();

        assert_eq!(output(&out), "first\nsecond\nthird\n");
        assert_eq!(sink.unflushed_len(), 0);
        assert_eq!(sink.position(), 19);
    }

    #[test]
    fn test_position_starts_at_existing_length() {
        let (writer, _) = MockWriter::new();
        let mut sink = LogBuffer::new(Box::new(writer), 100);
        sink.append("x").unwrap();
        assert_eq!(sink.position(), 102);
        assert_eq!(sink.unflushed_len(), 2);
    }

    #[test]
    fn test_close_flushes() {
        let (writer, out) = MockWriter::new();
        let mut sink = LogBuffer::new(Box::new(writer), 0);
        sink.append("last words").unwrap();
        sink.close().unwrap();
        assert_eq!(output(&out), "last words\n");
    }

    #[test]
    fn test_flush_error_propagation() {
        struct FlushFailingWriter;
        impl Write for FlushFailingWriter {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Err(std::io::Error::other("flush failed"))
            }
        }

        let mut sink = LogBuffer::new(Box::new(FlushFailingWriter), 0);
        sink.append("will be buffered").unwrap();
        assert!(sink.flush().is_err());
        // A failed flush leaves the pending byte count untouched.
        assert_eq!(sink.unflushed_len(), 17);
    }

    #[test]
    fn test_open_appends_to_existing_file() {
        std::fs::create_dir_all("tmp").unwrap();
        let path = "tmp/buffer_open_append.log";
        let _ = std::fs::remove_file(path);

        let mut first = LogBuffer::open(path).unwrap();
        first.append("run one").unwrap();
        first.close().unwrap();

        let mut second = LogBuffer::open(path).unwrap();
        assert_eq!(second.position(), 8);
        second.append("run two").unwrap();
        second.close().unwrap();

        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents, "run one\nrun two\n");
        let _ = std::fs::remove_file(path);
    }
}
