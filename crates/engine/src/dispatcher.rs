//! Single-writer command dispatcher.
//!
//! LMDB ties a write transaction to the thread that began it. The dispatcher
//! owns one dedicated writer thread for its whole lifetime and funnels every
//! update transaction through it: callers on any thread submit an operation,
//! the writer runs it inside a fresh transaction, commits on `Ok` or aborts on
//! `Err`, and sends the result back over a one-shot channel.
//!
//! Commands run one at a time in submission order (FIFO queue, single
//! consumer). `shutdown` stops intake, lets the writer drain what is already
//! queued, then joins it.

use crate::environment::Environment;
use crate::txn::WriteTxn;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;
use stress_core::{Error, Result};
use tracing::{debug, error};

/// Name of the writer thread.
pub const WRITER_THREAD_NAME: &str = "lmdb-stress-writer";

/// An operation executed inside one update transaction.
pub type TxnOp = Box<dyn FnOnce(&mut WriteTxn<'_>) -> Result<()> + Send + 'static>;

/// Dispatcher counters snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Commands accepted so far.
    pub submitted: u64,
    /// Commands whose transaction committed.
    pub committed: u64,
    /// Commands whose transaction was aborted.
    pub aborted: u64,
    /// Commands waiting in the queue.
    pub queue_depth: usize,
}

struct Command {
    sequence: u64,
    op: TxnOp,
    completion: SyncSender<Result<()>>,
}

struct DispatcherInner {
    queue: Mutex<VecDeque<Command>>,
    work_ready: Condvar,
    shutdown: AtomicBool,
    sequence: AtomicU64,
    committed: AtomicU64,
    aborted: AtomicU64,
}

/// Serializes update transactions onto one writer thread.
pub struct CommandDispatcher {
    inner: Arc<DispatcherInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
    writer_thread: ThreadId,
}

impl CommandDispatcher {
    /// Spawn the writer thread for `env`.
    pub fn start(env: Arc<Environment>) -> Result<Self> {
        let inner = Arc::new(DispatcherInner {
            queue: Mutex::new(VecDeque::new()),
            work_ready: Condvar::new(),
            shutdown: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
            committed: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
        });

        let worker_inner = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name(WRITER_THREAD_NAME.to_string())
            .spawn(move || writer_loop(&worker_inner, &env))?;
        let writer_thread = handle.thread().id();
        debug!(?writer_thread, "writer thread started");

        Ok(Self {
            inner,
            worker: Mutex::new(Some(handle)),
            writer_thread,
        })
    }

    /// Run `op` in an update transaction on the writer thread.
    ///
    /// Blocks until the transaction has committed or aborted and returns the
    /// operation's error, or the engine's commit error. There is no timeout;
    /// see [`submit_with_deadline`](Self::submit_with_deadline).
    pub fn submit<F>(&self, op: F) -> Result<()>
    where
        F: FnOnce(&mut WriteTxn<'_>) -> Result<()> + Send + 'static,
    {
        let completion = self.enqueue(Box::new(op))?;
        completion.recv().map_err(|_| Error::DispatcherClosed)?
    }

    /// Like [`submit`](Self::submit) but gives up waiting after `timeout`.
    ///
    /// The command is not cancelled: it stays queued and still commits or
    /// aborts; only the caller stops waiting for the outcome.
    pub fn submit_with_deadline<F>(&self, op: F, timeout: Duration) -> Result<()>
    where
        F: FnOnce(&mut WriteTxn<'_>) -> Result<()> + Send + 'static,
    {
        let completion = self.enqueue(Box::new(op))?;
        match completion.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(Error::DeadlineExceeded(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(Error::DispatcherClosed),
        }
    }

    fn enqueue(&self, op: TxnOp) -> Result<Receiver<Result<()>>> {
        let (completion, receiver) = sync_channel(1);
        {
            // Intake is checked under the queue lock so a command can never
            // land after the writer decided to exit.
            let mut queue = self.inner.queue.lock();
            if self.inner.shutdown.load(Ordering::Acquire) {
                return Err(Error::DispatcherClosed);
            }
            let sequence = self.inner.sequence.fetch_add(1, Ordering::Relaxed);
            queue.push_back(Command {
                sequence,
                op,
                completion,
            });
        }
        self.inner.work_ready.notify_one();
        Ok(receiver)
    }

    /// Stop accepting commands, drain the queue, and join the writer.
    ///
    /// Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        {
            let _queue = self.inner.queue.lock();
            self.inner.shutdown.store(true, Ordering::Release);
            self.inner.work_ready.notify_all();
        }

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                error!("writer thread terminated abnormally");
            }
            debug!("writer thread joined");
        }
    }

    /// True once `shutdown` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    /// Identity of the writer thread every transaction runs on.
    pub fn writer_thread_id(&self) -> ThreadId {
        self.writer_thread
    }

    /// Return a snapshot of dispatcher counters.
    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            submitted: self.inner.sequence.load(Ordering::Relaxed),
            committed: self.inner.committed.load(Ordering::Relaxed),
            aborted: self.inner.aborted.load(Ordering::Relaxed),
            queue_depth: self.inner.queue.lock().len(),
        }
    }
}

impl Drop for CommandDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn writer_loop(inner: &DispatcherInner, env: &Environment) {
    loop {
        let command = {
            let mut queue = inner.queue.lock();
            loop {
                if let Some(command) = queue.pop_front() {
                    break command;
                }
                if inner.shutdown.load(Ordering::Acquire) {
                    return;
                }
                inner.work_ready.wait(&mut queue);
            }
        };

        let result = execute(env, command.op);
        match &result {
            Ok(()) => {
                inner.committed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                inner.aborted.fetch_add(1, Ordering::Relaxed);
                debug!(sequence = command.sequence, "transaction aborted: {}", e);
            }
        }

        // The submitter may have stopped waiting (deadline); nothing to do then.
        let _ = command.completion.send(result);
    }
}

/// Run one operation as a single transaction attempt.
fn execute(env: &Environment, op: TxnOp) -> Result<()> {
    let mut txn = env.begin_write()?;

    // catch_unwind keeps a panicking operation from killing the writer; the
    // transaction is aborted either way.
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| op(&mut txn))) {
        Ok(Ok(())) => txn.commit(),
        Ok(Err(e)) => {
            txn.abort();
            Err(e)
        }
        Err(panic) => {
            txn.abort();
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "(non-string panic)".to_string());
            error!("operation panicked on writer thread: {}", message);
            Err(Error::OperationPanicked(message))
        }
    }
}
