//! # Worker Module
//!
//! This module provides the background worker that periodically drains the
//! intake queue into the sink. The worker runs its own thread with a
//! single-threaded futures executor; between drain cycles it waits for either
//! the poll interval to elapse or the shutdown signal to arrive, whichever
//! comes first.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use futures::channel::oneshot;
use futures::executor::{block_on, LocalPool};
use futures::future::{self, Either};

use crate::{drain::Drainer, error::Error};

/// A draining worker running on its own thread.
///
/// The worker owns nothing but a shared reference to the [`Drainer`]; the
/// sink and queue stay reachable for the synchronous drains performed by the
/// logger handle. Dropping a `Worker` without calling
/// [`shutdown`](Worker::shutdown) detaches the thread, which then exits on
/// its own once the stop signal is observed as dropped.
#[derive(Debug)]
pub struct Worker {
    /// Unique identifier for this worker instance
    pub worker_id: String,
    /// Handle to the worker thread (None once joined or abandoned)
    handle: Option<JoinHandle<()>>,
    /// Stop signal; consumed on shutdown
    stop: Option<oneshot::Sender<()>>,
    /// Fires when the drain loop has returned
    done: Option<oneshot::Receiver<()>>,
}

impl Worker {
    /// Spawns the worker thread and starts the drain loop.
    ///
    /// # Arguments
    ///
    /// * `worker_id` - Unique identifier, also used as the thread name
    /// * `drainer` - The shared drainer invoked once per cycle
    /// * `poll_interval` - Idle time between drain cycles
    pub fn start(
        worker_id: &str,
        drainer: Arc<Drainer>,
        poll_interval: Duration,
    ) -> Result<Worker, Error> {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = oneshot::channel::<()>();

        let handle = thread::Builder::new()
            .name(format!("Worker {worker_id}"))
            .spawn(move || {
                let mut pool = LocalPool::new();
                pool.run_until(Worker::drain_loop(&drainer, stop_rx, poll_interval));
                let _ = done_tx.send(());
            })?;

        Ok(Worker {
            worker_id: worker_id.to_string(),
            handle: Some(handle),
            stop: Some(stop_tx),
            done: Some(done_rx),
        })
    }

    /// The drain loop.
    ///
    /// - Runs one batch per cycle, then sleeps for `poll_interval` unless the
    ///   stop signal arrives first
    /// - Once stopped, keeps draining without sleeping (only yielding between
    ///   batches) until the queue is observed empty or the sink is closed
    /// - Drain errors are reported on stderr and never end the loop
    pub async fn drain_loop(
        drainer: &Drainer,
        mut stop: oneshot::Receiver<()>,
        poll_interval: Duration,
    ) {
        let mut stopping = false;

        loop {
            if let Err(err) = drainer.process_batch() {
                eprintln!("Error in log processing: {err}");
            }

            if stopping {
                if drainer.depth() == 0 || drainer.is_closed() {
                    break;
                }
                // Let in-flight producers and the final drain take the lock.
                thread::yield_now();
                continue;
            }

            let delay = Box::pin(futures_timer::Delay::new(poll_interval));
            let wait = future::select(&mut stop, delay).await;
            // A dropped sender counts as a stop request too.
            if let Either::Left(_) = wait {
                stopping = true;
            }
        }
    }

    /// Signals the worker to stop without waiting for it.
    pub fn signal_stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    /// Waits up to `timeout` for the drain loop to finish, then joins the thread.
    ///
    /// On timeout the thread is left running detached and
    /// [`Error::WorkerJoinTimeout`] is returned. A panicked worker is reported
    /// as [`Error::WorkerPanicked`].
    pub fn join_timeout(&mut self, timeout: Duration) -> Result<(), Error> {
        let Some(done) = self.done.take() else {
            return Ok(());
        };

        let finished = block_on(async {
            match future::select(done, Box::pin(futures_timer::Delay::new(timeout))).await {
                Either::Left(_) => true,
                Either::Right(_) => false,
            }
        });
        if !finished {
            self.handle = None;
            return Err(Error::WorkerJoinTimeout(timeout));
        }

        match self.handle.take() {
            Some(handle) => handle.join().map_err(|payload| {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Error::WorkerPanicked(msg)
            }),
            None => Ok(()),
        }
    }

    /// Signals the worker and waits up to `timeout` for it to exit.
    pub fn shutdown(&mut self, timeout: Duration) -> Result<(), Error> {
        self.signal_stop();
        self.join_timeout(timeout)
    }
}
