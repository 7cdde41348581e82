//! # Intake Queue

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::{error::Error, record::LogRecord};

/// Creates a connected intake pair sharing one depth counter.
pub fn intake() -> (Intake, Backlog) {
    let (sender, receiver) = mpsc::unbounded::<String>();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        Intake {
            sender,
            depth: depth.clone(),
        },
        Backlog { receiver, depth },
    )
}

/// The producer half of the intake queue.
///
/// `Intake` formats records into lines and sends them through an unbounded
/// channel. Sending never blocks and never touches the sink. Cloning it gives
/// another producer on the same queue.
#[derive(Debug, Clone)]
pub struct Intake {
    /// Channel sender for formatted lines
    sender: UnboundedSender<String>,
    /// Lines sent but not yet taken by a drainer
    depth: Arc<AtomicUsize>,
}

impl Intake {
    /// Formats `record` and enqueues the line.
    ///
    /// Fails with [`Error::LoggerClosed`] once the receiving half has been
    /// closed; the line is then discarded and the depth left unchanged.
    pub fn push(&self, record: &LogRecord) -> Result<(), Error> {
        self.push_line(record.to_string())
    }

    /// Enqueues an already formatted line.
    pub fn push_line(&self, line: String) -> Result<(), Error> {
        // Count first so a drainer never sees the line before the increment.
        self.depth.fetch_add(1, Ordering::AcqRel);
        if self.sender.unbounded_send(line).is_err() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::LoggerClosed);
        }
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// The shared depth counter, for tests that stage a send in flight.
    #[cfg(test)]
    pub(crate) fn depth_counter(&self) -> Arc<AtomicUsize> {
        self.depth.clone()
    }
}

/// The consumer half of the intake queue. Owned by the drainer.
#[derive(Debug)]
pub struct Backlog {
    receiver: UnboundedReceiver<String>,
    depth: Arc<AtomicUsize>,
}

impl Backlog {
    /// Takes the next queued line, if one is ready.
    pub fn pop(&mut self) -> Option<String> {
        match self.receiver.try_next() {
            Ok(Some(line)) => {
                self.depth.fetch_sub(1, Ordering::AcqRel);
                Some(line)
            }
            // Ok(None): closed and empty. Err: open but empty.
            Ok(None) | Err(_) => None,
        }
    }

    /// Moves up to `max` lines into `batch`, returning how many were taken.
    pub fn pop_batch(&mut self, batch: &mut Vec<String>, max: usize) -> usize {
        let start = batch.len();
        while batch.len() - start < max {
            match self.pop() {
                Some(line) => batch.push(line),
                None => break,
            }
        }
        batch.len() - start
    }

    /// Stops accepting new lines. Lines already queued can still be popped.
    pub fn close(&mut self) {
        self.receiver.close();
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn drain(backlog: &mut Backlog) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = backlog.pop() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_push_formats_record() {
        let (intake, mut backlog) = intake();
        intake.push(&LogRecord::new(10, "boot", ["fast"])).unwrap();

        assert_eq!(backlog.pop(), Some("10,boot,fast".to_string()));
        assert_eq!(backlog.pop(), None);
    }

    #[test]
    fn test_depth_tracks_push_and_pop() {
        let (intake, mut backlog) = intake();
        assert_eq!(backlog.depth(), 0);

        intake.push_line("a".into()).unwrap();
        intake.push_line("b".into()).unwrap();
        assert_eq!(intake.depth(), 2);
        assert_eq!(backlog.depth(), 2);

        backlog.pop();
        assert_eq!(intake.depth(), 1);
        backlog.pop();
        assert_eq!(backlog.depth(), 0);
    }

    #[test]
    fn test_fifo_order() {
        let (intake, mut backlog) = intake();
        for i in 0..10 {
            intake.push_line(format!("line {i}")).unwrap();
        }

        let lines = drain(&mut backlog);
        let expected: Vec<String> = (0..10).map(|i| format!("line {i}")).collect();
        assert_eq!(lines, expected);
    }

    #[test]
    fn test_pop_batch_respects_max() {
        let (intake, mut backlog) = intake();
        for i in 0..7 {
            intake.push_line(i.to_string()).unwrap();
        }

        let mut batch = Vec::new();
        assert_eq!(backlog.pop_batch(&mut batch, 5), 5);
        assert_eq!(batch, vec!["0", "1", "2", "3", "4"]);
        assert_eq!(backlog.depth(), 2);

        batch.clear();
        assert_eq!(backlog.pop_batch(&mut batch, 5), 2);
        assert_eq!(batch, vec!["5", "6"]);
    }

    #[test]
    fn test_push_after_close_is_rejected() {
        let (intake, mut backlog) = intake();
        intake.push_line("before".into()).unwrap();
        backlog.close();

        let result = intake.push_line("after".into());
        assert!(matches!(result, Err(Error::LoggerClosed)));
        assert_eq!(intake.depth(), 1);

        // Lines queued before the close are still delivered.
        assert_eq!(drain(&mut backlog), vec!["before".to_string()]);
        assert_eq!(backlog.depth(), 0);
    }

    #[test]
    fn test_dropped_backlog_rejects_push() {
        let (intake, backlog) = intake();
        drop(backlog);
        assert!(matches!(
            intake.push_line("nobody listens".into()),
            Err(Error::LoggerClosed)
        ));
    }

    #[test]
    fn test_concurrent_producers() {
        let (intake, mut backlog) = intake();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let intake = intake.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        intake.push_line(format!("{t}-{i}")).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(backlog.depth(), 1000);
        let lines = drain(&mut backlog);
        assert_eq!(lines.len(), 1000);

        // Each producer's lines keep their relative order.
        for t in 0..4 {
            let own: Vec<&String> = lines
                .iter()
                .filter(|l| l.starts_with(&format!("{t}-")))
                .collect();
            let expected: Vec<String> = (0..250).map(|i| format!("{t}-{i}")).collect();
            assert_eq!(own.len(), 250);
            assert!(own.iter().zip(expected.iter()).all(|(a, b)| *a == b));
        }
    }
}
