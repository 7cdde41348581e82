//! # Direct Logger
//!
//! A synchronous, write-through counterpart to [`DumpKeeper`](crate::DumpKeeper).
//! Every call formats its record and appends it to the sink on the caller's
//! thread, under the sink lock, then applies the same [`FlushPolicy`] the
//! drainer uses. There is no queue and no worker, so there is nothing to drain:
//! a record is in the sink (or in its write buffer) by the time `log` returns.
//!
//! Suitable for low-volume producers, or as a baseline when measuring what the
//! batched pipeline buys.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    buffer::{FlushPolicy, LogBuffer, Sink},
    error::Error,
    record::LogRecord,
    EventLogger,
};

pub struct DirectLogger {
    /// `None` once closed.
    sink: Mutex<Option<Box<dyn Sink>>>,
    policy: FlushPolicy,
}

impl DirectLogger {
    /// Opens `path` in append mode with the given buffer size.
    pub fn new<P: AsRef<Path>>(path: P, buffer_size: i64) -> Result<Self, Error> {
        let sink = LogBuffer::open(path)?;
        Ok(DirectLogger::with_sink(Box::new(sink), FlushPolicy::from(buffer_size)))
    }

    pub fn with_sink(sink: Box<dyn Sink>, policy: FlushPolicy) -> Self {
        DirectLogger {
            sink: Mutex::new(Some(sink)),
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn Sink>>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Flushes and releases the sink. Calling it again is a no-op.
    pub fn close(&self) -> Result<(), Error> {
        match self.lock().take() {
            Some(mut sink) => sink.close().map_err(Error::Io),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }
}

impl EventLogger for DirectLogger {
    /// Unlike the batched logger, write failures are returned to the caller,
    /// since the write happens on the caller's thread.
    fn log_record(&self, record: LogRecord) -> Result<(), Error> {
        let line = record.to_string();
        let mut guard = self.lock();
        let sink = guard.as_mut().ok_or(Error::LoggerClosed)?;

        sink.append(&line)?;
        if self.policy.should_flush(sink.unflushed_len()) {
            sink.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), Error> {
        let mut guard = self.lock();
        let sink = guard.as_mut().ok_or(Error::LoggerClosed)?;
        sink.flush()?;
        Ok(())
    }
}

impl Drop for DirectLogger {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            eprintln!("DirectLogger failed to close its sink: {err}");
        }
    }
}
