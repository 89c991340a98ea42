//! Background session writer.
//!
//! Autosaves must not stall the caller, so they are queued to a single
//! worker thread. The queue is a plain `Mutex` + `Condvar` pair: callers push
//! and return, the worker drains jobs in order, and [`FileWriter::flush_all()`]
//! blocks until the queue is empty and the worker is idle.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use crate::error::SessionError;
use crate::format::{self, SessionFormat};
use crate::state::SessionState;

struct WriteJob {
    state: SessionState,
    path: PathBuf,
    format: SessionFormat,
}

#[derive(Default)]
struct Queue {
    jobs: VecDeque<WriteJob>,
    busy: bool,
    shutdown: bool,
    errors: Vec<SessionError>,
    written: u64,
}

#[derive(Default)]
struct Inner {
    queue: Mutex<Queue>,
    work: Condvar,
    idle: Condvar,
}

/// A single background thread that writes session files in submission order.
pub struct FileWriter {
    inner: Arc<Inner>,
    thread: Option<JoinHandle<()>>,
}

impl FileWriter {
    /// Starts the writer thread.
    pub fn new() -> Result<Self, SessionError> {
        let inner = Arc::new(Inner::default());
        let worker = Arc::clone(&inner);
        let thread = thread::Builder::new()
            .name("session-writer".into())
            .spawn(move || run(&worker))
            .map_err(SessionError::WriterThread)?;
        Ok(Self {
            inner,
            thread: Some(thread),
        })
    }

    /// Queues `state` to be written to `path` and returns immediately.
    pub fn write_async(&self, state: SessionState, path: impl Into<PathBuf>, format: SessionFormat) {
        let path = path.into();
        tracing::debug!(path = %path.display(), %format, "queueing session write");
        self.inner.queue.lock().jobs.push_back(WriteJob {
            state,
            path,
            format,
        });
        self.inner.work.notify_one();
    }

    /// Blocks until every queued write has finished.
    ///
    /// Returns the first error any of those writes hit; later ones are logged.
    pub fn flush_all(&self) -> Result<(), SessionError> {
        let mut queue = self.inner.queue.lock();
        while !queue.jobs.is_empty() || queue.busy {
            self.inner.idle.wait(&mut queue);
        }
        let mut errors = std::mem::take(&mut queue.errors).into_iter();
        match errors.next() {
            Some(first) => {
                for later in errors {
                    tracing::warn!("additional session write failure: {later}");
                }
                Err(first)
            }
            None => Ok(()),
        }
    }

    /// Returns the number of writes queued or in progress.
    pub fn pending(&self) -> usize {
        let queue = self.inner.queue.lock();
        queue.jobs.len() + usize::from(queue.busy)
    }

    /// Returns the number of files written successfully so far.
    pub fn files_written(&self) -> u64 {
        self.inner.queue.lock().written
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if let Err(e) = self.flush_all() {
            tracing::error!("session write failed during shutdown: {e}");
        }
        self.inner.queue.lock().shutdown = true;
        self.inner.work.notify_all();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!("session writer thread panicked");
        }
    }
}

fn run(inner: &Inner) {
    loop {
        let job = {
            let mut queue = inner.queue.lock();
            loop {
                if let Some(job) = queue.jobs.pop_front() {
                    queue.busy = true;
                    break Some(job);
                }
                if queue.shutdown {
                    break None;
                }
                inner.work.wait(&mut queue);
            }
        };
        let Some(job) = job else {
            return;
        };

        let result = format::write_file(&job.state, &job.path, job.format);

        let mut queue = inner.queue.lock();
        queue.busy = false;
        match result {
            Ok(()) => {
                tracing::debug!(path = %job.path.display(), "session written");
                queue.written += 1;
            }
            Err(e) => {
                tracing::error!("background session write failed: {e}");
                queue.errors.push(e);
            }
        }
        if queue.jobs.is_empty() {
            inner.idle.notify_all();
        }
    }
}
