//! # DumpKeeper - Asynchronous Batched Event Dump
//!
//! DumpKeeper is a buffered, append-only event logger. Producers on any number of
//! threads submit structured records; a single background worker writes them to a
//! file in batches, trading a bounded delay for far fewer writes and lock
//! acquisitions.
//!
//! ## Key Features
//!
//! - **Fire-and-forget intake**: [`EventLogger::log`] formats and enqueues; it never does I/O
//! - **Batched drain**: A worker thread writes up to `batch_size` lines per cycle
//! - **Flush policy**: Never, after every batch, or once N unflushed bytes accumulate
//! - **Backlog escalation**: A deep queue forces a flush regardless of the policy
//! - **Lossless shutdown**: [`DumpKeeper::close`] drains everything queued before returning
//!
//! ## Architecture
//!
//! The library uses a producer-consumer pattern:
//! - **Producer**: [`DumpKeeper`] formats records and pushes lines onto an unbounded MPSC channel
//! - **Drainer**: Owns the channel's receiving half and the sink behind one lock
//! - **Consumer**: A worker thread that runs the drainer every poll interval
//! - **Sink**: A [`LogBuffer`] over the append-mode file (or any [`Sink`])
//!
//! ## File Format
//!
//! One record per line, fields joined by commas with no escaping:
//! `timestamp,eventType,arg0,arg1,...`. The file is opened in append mode, so
//! successive runs accumulate into the same file.
//!
//! ## Configuration Reference
//!
//! `DumpKeeper::from_config(Some(config))` accepts a `HashMap<String, String>`.
//! Below is the full list of accepted keys:
//!
//! - `"log_file_path"`: file path (e.g., `"tmp/app_dump.log"`)
//! - `"buffer_size"`: bytes; `-1` never flushes on size, `0` flushes every batch
//! - `"batch_size"`: lines per drain batch (e.g., `"100"`)
//! - `"backlog_factor"`: escalation multiplier (e.g., `"5"`)
//! - `"poll_interval"`: milliseconds between worker cycles (e.g., `"50"`)
//! - `"join_timeout"`: milliseconds shutdown waits for the worker (e.g., `"2000"`)
//! - `"worker_id"`: optional identifier (default is `dump-<pid>`)
//!
//! ## Usage Example
//!
//! ```rust
//! use dump_keeper::{DumpKeeper, EventLogger};
//!
//! std::fs::create_dir_all("tmp").unwrap();
//! let logger = DumpKeeper::new("tmp/doc_example.log", 4096).unwrap();
//!
//! logger.log(1700000000, "login", ["alice", "web"]).unwrap();
//! logger.log(1700000005, "logout", ["alice"]).unwrap();
//!
//! // Everything queued so far is now in the file.
//! logger.flush().unwrap();
//!
//! logger.close();
//! assert!(logger.log(1700000010, "late", ["bob"]).is_err());
//! # std::fs::remove_file("tmp/doc_example.log").unwrap();
//! ```
mod buffer;
mod config;
mod direct;
mod drain;
mod error;
mod processor;
mod record;
mod worker;

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub use crate::buffer::{FlushPolicy, LogBuffer, Sink};
pub use crate::config::Options;
pub use crate::direct::DirectLogger;
pub use crate::drain::DrainStats;
pub use crate::error::Error;
pub use crate::record::LogRecord;

use crate::drain::Drainer;
use crate::processor::Intake;
use crate::worker::Worker;

/// The interface shared by every event logger in this crate.
///
/// # Thread Safety
///
/// Implementors must be `Send + Sync + 'static` so a single logger can be
/// shared across threads (typically behind an `Arc`).
pub trait EventLogger: Send + Sync + 'static {
    /// Submits a prebuilt record.
    fn log_record(&self, record: LogRecord) -> Result<(), Error>;

    /// Makes every record submitted before this call durable in the sink.
    fn flush(&self) -> Result<(), Error>;

    /// Builds a record from its parts and submits it.
    ///
    /// # Arguments
    ///
    /// * `timestamp` - Epoch time in whatever unit the caller uses
    /// * `event_type` - The event name; must not contain commas
    /// * `args` - Ordered arguments; none may contain commas
    fn log<E, I, S>(&self, timestamp: i64, event_type: E, args: I) -> Result<(), Error>
    where
        Self: Sized,
        E: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.log_record(LogRecord::new(timestamp, event_type, args))
    }
}

/// Where a [`DumpKeeper`] is in its one-way lifecycle.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Accepting records.
    Running = 0,
    /// Shutdown has started; queued records are still being written.
    Disposing = 1,
    /// Everything is written and the sink is closed.
    Disposed = 2,
}

impl From<u8> for Lifecycle {
    fn from(value: u8) -> Self {
        match value {
            0 => Lifecycle::Running,
            1 => Lifecycle::Disposing,
            _ => Lifecycle::Disposed,
        }
    }
}

/// The asynchronous logger handle.
///
/// `DumpKeeper` orchestrates the entire pipeline by owning:
/// - An intake that formats records and pushes lines onto the queue
/// - A shared drainer that moves lines from the queue to the sink
/// - A worker thread that runs the drainer every poll interval
///
/// ## Lifecycle
///
/// 1. **Creation**: Open the sink, create the queue, start the worker thread
/// 2. **Logging**: Accept records from any thread; [`flush`](EventLogger::flush) on demand
/// 3. **Shutdown**: [`close`](DumpKeeper::close) stops the worker, drains the
///    queue and closes the sink
///
/// ## Thread Safety
///
/// All methods take `&self`. Share one `DumpKeeper` across threads with an
/// `Arc`; every path that writes the sink goes through the drainer's lock,
/// so lines are never split or reordered.
pub struct DumpKeeper {
    intake: Intake,
    drainer: Arc<Drainer>,
    worker: Mutex<Option<Worker>>,
    state: AtomicU8,
    options: Options,
}

impl DumpKeeper {
    /// Opens (or creates) `path` in append mode and starts the worker.
    ///
    /// `buffer_size` selects the [`FlushPolicy`]: negative never flushes on
    /// size, zero flushes after every batch, positive `N` flushes once `N`
    /// bytes are pending. All other settings take their defaults.
    pub fn new<P: AsRef<Path>>(path: P, buffer_size: i64) -> Result<Self, Error> {
        DumpKeeper::with_options(Options::new(path.as_ref(), buffer_size))
    }

    /// Builds a logger from the process-wide configuration, initialized with
    /// `config` if this is the first initialization in the process.
    pub fn from_config(config: Option<HashMap<String, String>>) -> Result<Self, Error> {
        DumpKeeper::with_options(Options::from_config(config))
    }

    /// Opens `options.path` and starts the worker.
    pub fn with_options(options: Options) -> Result<Self, Error> {
        let sink = LogBuffer::open(&options.path)?;
        DumpKeeper::with_sink(options, Box::new(sink))
    }

    /// Starts a logger writing to an arbitrary sink. `options.path` is ignored.
    pub fn with_sink(options: Options, sink: Box<dyn Sink>) -> Result<Self, Error> {
        let (intake, backlog) = processor::intake();
        let drainer = Arc::new(Drainer::new(backlog, sink, &options));
        let worker = Worker::start(&options.worker_id, drainer.clone(), options.poll_interval)?;

        Ok(DumpKeeper {
            intake,
            drainer,
            worker: Mutex::new(Some(worker)),
            state: AtomicU8::new(Lifecycle::Running as u8),
            options,
        })
    }

    pub fn state(&self) -> Lifecycle {
        Lifecycle::from(self.state.load(Ordering::Acquire))
    }

    fn ensure_running(&self) -> Result<(), Error> {
        match self.state() {
            Lifecycle::Running => Ok(()),
            _ => Err(Error::LoggerClosed),
        }
    }

    /// Lines queued and not yet taken by a drain.
    pub fn backlog(&self) -> usize {
        self.intake.depth()
    }

    pub fn stats(&self) -> DrainStats {
        self.drainer.stats()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Shuts the logger down. Calling it again is a no-op; a concurrent second
    /// call returns immediately without waiting for the first to finish.
    ///
    /// The shutdown sequence:
    /// 1. Stop accepting records (`Running` → `Disposing`)
    /// 2. Signal the worker and wait up to `join_timeout` for it to exit
    /// 3. Close the queue and drain every line still in it
    /// 4. Flush and close the sink (`Disposing` → `Disposed`)
    ///
    /// # Behavior
    ///
    /// - A worker that misses the timeout is left to exit on its own; the
    ///   final drain still empties the queue
    /// - Write and flush failures are reported on stderr, not returned
    pub fn close(&self) {
        if self
            .state
            .compare_exchange(
                Lifecycle::Running as u8,
                Lifecycle::Disposing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut worker) = worker {
            if let Err(err) = worker.shutdown(self.options.join_timeout) {
                eprintln!("Worker {} did not stop cleanly: {err}", worker.worker_id);
            }
        }

        let drained = self.drainer.close_intake_and_drain();
        if drained > 0 {
            eprintln!("Final drain wrote {drained} queued lines after the worker stopped");
        }
        if let Err(err) = self.drainer.close_sink() {
            eprintln!("Failed to flush and close the dump sink: {err}");
        }

        let lost = self.drainer.stats().lost;
        if lost > 0 {
            eprintln!("DumpKeeper lost {lost} lines to write failures");
        }

        self.state.store(Lifecycle::Disposed as u8, Ordering::Release);
    }
}

impl EventLogger for DumpKeeper {
    /// Formats `record` and enqueues it without doing any I/O.
    ///
    /// Fails only with [`Error::LoggerClosed`] once shutdown has started. Write
    /// failures happen later on the worker and are never reported here.
    fn log_record(&self, record: LogRecord) -> Result<(), Error> {
        self.ensure_running()?;
        self.intake.push(&record)
    }

    /// Drains the backlog queued before the call and flushes the sink.
    ///
    /// Blocks until done. If the worker is mid-batch, waits for that batch
    /// first. Unlike [`log`](EventLogger::log), sink failures are returned.
    fn flush(&self) -> Result<(), Error> {
        self.ensure_running()?;
        self.drainer.drain_backlog()?;
        self.drainer.flush()
    }
}

impl Drop for DumpKeeper {
    fn drop(&mut self) {
        if self.state() == Lifecycle::Running {
            eprintln!("DumpKeeper dropped without close(); shutting down from drop");
            self.close();
        }
    }
}
