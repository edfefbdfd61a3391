// src/etw/worker.rs

//! Named OS thread whose join can be bounded.
//!
//! `std` offers no join-with-timeout, so the thread reports completion on a
//! one-slot channel and `join_timeout` waits on that instead. A worker that
//! misses the deadline is detached, never waited on again.

use std::{
    io,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam::channel::{self, Receiver, RecvTimeoutError};

pub struct Worker {
    name: String,
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

impl Worker {
    pub fn spawn<F>(name: &str, body: F) -> io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (done_tx, done) = channel::bounded::<()>(1);
        let handle = thread::Builder::new().name(name.to_owned()).spawn(move || {
            body();
            let _ = done_tx.send(());
        })?;
        Ok(Self { name: name.to_owned(), handle, done })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait up to `timeout` for the thread to finish. Returns `false` (and
    /// detaches the thread) on timeout.
    pub fn join_timeout(self, timeout: Duration) -> bool {
        match self.done.recv_timeout(timeout) {
            // Disconnected: the body panicked before signalling.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    log::warn!("thread '{}' panicked", self.name);
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("thread '{}' still running after {:?}; detaching", self.name, timeout);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_worker_joins() {
        let w = Worker::spawn("quick", || {}).unwrap();
        assert_eq!(w.name(), "quick");
        assert!(w.join_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn stuck_worker_times_out() {
        let (release_tx, release_rx) = channel::bounded::<()>(0);
        let w = Worker::spawn("stuck", move || {
            let _ = release_rx.recv();
        })
        .unwrap();
        assert!(!w.join_timeout(Duration::from_millis(50)));
        drop(release_tx);
    }

    #[test]
    fn panicking_worker_still_joins() {
        let w = Worker::spawn("boom", || panic!("expected")).unwrap();
        assert!(w.join_timeout(Duration::from_secs(5)));
    }
}
