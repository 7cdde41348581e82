//! # Configuration Module
//!
//! This module defines the global [`Config`] struct using the [`config_generator!`] macro,
//! and the per-instance [`Options`] a [`DumpKeeper`](crate::DumpKeeper) is built from.
//!
//! [`Config`] is a thread-safe, lazily-initialized, process-wide configuration object that
//! can be populated once from a `HashMap<String, String>` (e.g., parsed from CLI, environment
//! variables, or a config file). Its values are read through generated static getters like
//! `Config::buffer_size()` or `Config::poll_interval()`.
//!
//! [`Options`] carries the same settings for one logger instance. It can be built from
//! the compiled-in defaults ([`Options::new`]) or from the global config
//! ([`Options::from_config`]), and then adjusted with builder-style setters.
//!
//! ## Fields
//! - `log_file_path`: Path of the append-only dump file
//! - `buffer_size`: Flush threshold in bytes (`< 0` never, `0` every write, `> 0` at N bytes)
//! - `batch_size`: Max lines the drainer writes per batch
//! - `backlog_factor`: Remaining depth above `backlog_factor * batch_size` forces a flush
//! - `poll_interval`: Idle time in milliseconds between worker drain cycles
//! - `join_timeout`: Milliseconds shutdown waits for the worker before forcing a drain
//! - `worker_id`: A unique identifier for the worker thread (includes process ID)
//!
//! ## Safety
//!
//! Calling `from_hashmap()` multiple times has no effect after the first call.
//! Use it during early initialization or application boot.
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use macro_keeper::config_generator;

use crate::buffer::FlushPolicy;

pub const DEFAULT_LOG_FILE_PATH: &str = "tmp/app_dump.log";
pub const DEFAULT_BUFFER_SIZE: i64 = -1;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_BACKLOG_FACTOR: usize = 5;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 2000;

config_generator!(
    Config,
    CONFIG,
    [
        (log_file_path, String, DEFAULT_LOG_FILE_PATH.to_string()),
        (buffer_size, i64, DEFAULT_BUFFER_SIZE),
        (batch_size, usize, DEFAULT_BATCH_SIZE),
        (backlog_factor, usize, DEFAULT_BACKLOG_FACTOR),
        (poll_interval, u64, DEFAULT_POLL_INTERVAL_MS),
        (join_timeout, u64, DEFAULT_JOIN_TIMEOUT_MS),
        (worker_id, String, format!("dump-{}", std::process::id())),
    ]
);

/// Settings for a single logger instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub path: PathBuf,
    pub flush_policy: FlushPolicy,
    pub batch_size: usize,
    pub backlog_factor: usize,
    pub poll_interval: Duration,
    pub join_timeout: Duration,
    pub worker_id: String,
}

impl Options {
    /// Options for `path` with the given buffer size and every other setting at its default.
    pub fn new<P: Into<PathBuf>>(path: P, buffer_size: i64) -> Self {
        Options {
            path: path.into(),
            flush_policy: FlushPolicy::from(buffer_size),
            batch_size: DEFAULT_BATCH_SIZE,
            backlog_factor: DEFAULT_BACKLOG_FACTOR,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            join_timeout: Duration::from_millis(DEFAULT_JOIN_TIMEOUT_MS),
            worker_id: format!("dump-{}", std::process::id()),
        }
    }

    /// Initializes the global [`Config`] with `overrides` (first call wins) and
    /// copies its values.
    pub fn from_config(overrides: Option<HashMap<String, String>>) -> Self {
        Config::from_hashmap(overrides);

        Options {
            path: PathBuf::from(Config::log_file_path()),
            flush_policy: FlushPolicy::from(*Config::buffer_size()),
            batch_size: (*Config::batch_size()).max(1),
            backlog_factor: *Config::backlog_factor(),
            poll_interval: Duration::from_millis(*Config::poll_interval()),
            join_timeout: Duration::from_millis(*Config::join_timeout()),
            worker_id: Config::worker_id().to_string(),
        }
    }

    /// Zero is clamped to one; a drainer must always make progress.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn backlog_factor(mut self, backlog_factor: usize) -> Self {
        self.backlog_factor = backlog_factor;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn join_timeout(mut self, join_timeout: Duration) -> Self {
        self.join_timeout = join_timeout;
        self
    }

    pub fn worker_id<S: Into<String>>(mut self, worker_id: S) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    /// Remaining queue depth above which a full batch forces a flush.
    pub fn backlog_limit(&self) -> usize {
        self.backlog_factor.saturating_mul(self.batch_size)
    }
}
