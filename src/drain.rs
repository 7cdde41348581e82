//! # Batch Drainer
//!
//! The drainer is the single serialization point for the sink. Its lock guards
//! both the consumer half of the intake queue and the sink, so taking a batch
//! off the queue and writing it happen in one critical section. Whoever drains
//! (the worker's periodic pass, a caller's `flush`, or the final drain during
//! shutdown) therefore commits lines in exactly the order they were queued.
//!
//! Locking is per batch rather than per line. A caller of `flush` that arrives
//! while the worker is mid-batch waits for at most one batch (`batch_size`
//! lines) before taking its turn.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use crate::{
    buffer::{FlushPolicy, Sink},
    config::Options,
    error::Error,
    processor::Backlog,
};

/// Counters describing what the drainer has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Lines appended to the sink.
    pub written: u64,
    /// Lines taken off the queue that never reached the sink.
    pub lost: u64,
    /// Successful sink flushes, forced or not.
    pub flushes: u64,
    /// Flushes triggered by backlog escalation rather than the flush policy.
    pub forced_flushes: u64,
    /// Batches or flushes that ended in an I/O error.
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    written: AtomicU64,
    lost: AtomicU64,
    flushes: AtomicU64,
    forced_flushes: AtomicU64,
    failures: AtomicU64,
}

struct DrainState {
    backlog: Backlog,
    /// `None` once the sink has been closed.
    sink: Option<Box<dyn Sink>>,
}

/// Moves lines from the intake queue into the sink, one batch at a time.
pub struct Drainer {
    state: Mutex<DrainState>,
    policy: FlushPolicy,
    batch_size: usize,
    backlog_limit: usize,
    counters: Counters,
}

impl Drainer {
    pub fn new(backlog: Backlog, sink: Box<dyn Sink>, options: &Options) -> Self {
        Drainer {
            state: Mutex::new(DrainState {
                backlog,
                sink: Some(sink),
            }),
            policy: options.flush_policy,
            batch_size: options.batch_size.max(1),
            backlog_limit: options.backlog_limit(),
            counters: Counters::default(),
        }
    }

    /// A panic while holding the lock leaves the sink in whatever state the
    /// last write produced; draining can still continue from there.
    fn lock(&self) -> MutexGuard<'_, DrainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drains at most one batch and applies the flush policy.
    ///
    /// Returns the number of lines taken off the queue. A write error aborts
    /// the batch: the lines not yet written are counted as lost and are not
    /// put back on the queue.
    pub fn process_batch(&self) -> Result<usize, Error> {
        let mut guard = self.lock();
        let DrainState { backlog, sink } = &mut *guard;
        let Some(sink) = sink.as_mut() else {
            return Ok(0);
        };

        let mut batch = Vec::with_capacity(self.batch_size);
        let taken = backlog.pop_batch(&mut batch, self.batch_size);
        if taken == 0 {
            return Ok(0);
        }

        for (written, line) in batch.iter().enumerate() {
            if let Err(err) = sink.append(line) {
                let lost = (taken - written) as u64;
                self.counters.written.fetch_add(written as u64, Ordering::Relaxed);
                self.counters.lost.fetch_add(lost, Ordering::Relaxed);
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                return Err(Error::Io(err));
            }
        }
        self.counters.written.fetch_add(taken as u64, Ordering::Relaxed);

        let by_policy = self.policy.should_flush(sink.unflushed_len());
        let escalate = taken == self.batch_size && backlog.depth() > self.backlog_limit;
        if by_policy || escalate {
            self.flush_sink(&mut **sink)?;
            if !by_policy {
                self.counters.forced_flushes.fetch_add(1, Ordering::Relaxed);
            }
        }

        Ok(taken)
    }

    /// Drains the backlog that was queued when the call started.
    ///
    /// Lines queued concurrently after entry may or may not be included; the
    /// call never keeps chasing producers. Stops at the first write error.
    pub fn drain_backlog(&self) -> Result<usize, Error> {
        let target = self.lock().backlog.depth();
        let mut drained = 0;
        while drained < target {
            let taken = self.process_batch()?;
            if taken == 0 {
                break;
            }
            drained += taken;
        }
        Ok(drained)
    }

    /// Forces the sink's buffered bytes out. A closed sink is a no-op.
    pub fn flush(&self) -> Result<(), Error> {
        let mut guard = self.lock();
        match guard.sink.as_mut() {
            Some(sink) => self.flush_sink(&mut **sink),
            None => Ok(()),
        }
    }

    fn flush_sink(&self, sink: &mut dyn Sink) -> Result<(), Error> {
        match sink.flush() {
            Ok(()) => {
                self.counters.flushes.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(err) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                Err(Error::Io(err))
            }
        }
    }

    /// Closes the intake so no producer can enqueue again, then drains every
    /// line still queued.
    ///
    /// Write errors are reported on stderr and draining carries on with the
    /// next batch, so the queue always ends up empty.
    ///
    /// An empty pop is not trusted on its own: a producer that was counted
    /// before the close may still be mid-send, so the drain keeps going until
    /// the depth reaches zero (or the sink is gone).
    pub fn close_intake_and_drain(&self) -> usize {
        self.lock().backlog.close();

        let mut drained = 0;
        loop {
            match self.process_batch() {
                Ok(0) => {
                    let settled = {
                        let guard = self.lock();
                        guard.backlog.depth() == 0 || guard.sink.is_none()
                    };
                    if settled {
                        break;
                    }
                    thread::yield_now();
                }
                Ok(taken) => drained += taken,
                Err(err) => eprintln!("Final drain failed to write a batch: {err}"),
            }
        }
        drained
    }

    /// Flushes and releases the sink. Later drains become no-ops.
    pub fn close_sink(&self) -> Result<(), Error> {
        let mut guard = self.lock();
        match guard.sink.take() {
            Some(mut sink) => sink.close().map_err(Error::Io),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().sink.is_none()
    }

    pub fn depth(&self) -> usize {
        self.lock().backlog.depth()
    }

    pub fn stats(&self) -> DrainStats {
        DrainStats {
            written: self.counters.written.load(Ordering::Relaxed),
            lost: self.counters.lost.load(Ordering::Relaxed),
            flushes: self.counters.flushes.load(Ordering::Relaxed),
            forced_flushes: self.counters.forced_flushes.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }
}
