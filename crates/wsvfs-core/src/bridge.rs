//! Bridge between synchronous host calls and asynchronous remote operations.
//!
//! The host calls into the plugin from plain threads and expects an answer
//! before the call returns, while every remote operation is a future. An
//! [`ExecutionBridge`] owns one dedicated current-thread runtime and one
//! cancellation token, drives exactly one future to completion on the calling
//! thread, and tears the runtime down when [`ExecutionBridge::run`] returns.
//!
//! # Owner context
//!
//! The calling thread is the *owner* of the bridge. Work that touches
//! caller-owned state (host progress callbacks, prompts) can be marshalled
//! back onto it from any thread through [`OwnerContext::run_on_owner`] or
//! [`OwnerContext::run_on_owner_blocking`]; the owner services those requests
//! between polls of the main future.
//!
//! # Cancellation
//!
//! [`BridgeCanceller::cancel`] (or a cancelled parent token, see
//! [`ExecutionBridge::linked`]) stops the run: the unfinished future is
//! dropped and `run` returns [`BridgeError::Cancelled`]. A host progress
//! callback answering [`ProgressAction::Abort`] is turned into the same
//! cancel request by [`CancellableProgress`].

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use crossbeam_channel::bounded;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::remote::TransferProgress;

/// Statistics for bridge runs (for observability).
#[derive(Debug, Default)]
pub struct BridgeStats {
    pub operations_started: AtomicU64,
    pub operations_completed: AtomicU64,
    pub operations_cancelled: AtomicU64,
}

impl BridgeStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_start(&self) {
        self.operations_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_complete(&self) {
        self.operations_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancel(&self) {
        self.operations_cancelled.fetch_add(1, Ordering::Relaxed);
    }
}

/// Error from bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("operation was cancelled")]
    Cancelled,

    #[error("cannot block on an execution bridge from inside an async context")]
    NestedRuntime,

    #[error("failed to build execution context: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("owner context is no longer running")]
    OwnerGone,
}

/// Answer of a host progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressAction {
    Continue,
    Abort,
}

/// Host-side progress sink.
///
/// Reports are percentages in `0..=100`. Returning [`ProgressAction::Abort`]
/// asks for the running operation to be cancelled.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u8) -> ProgressAction;
}

impl<F> ProgressSink for F
where
    F: Fn(u8) -> ProgressAction + Send + Sync,
{
    fn report(&self, percent: u8) -> ProgressAction {
        self(percent)
    }
}

/// A sink that ignores reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: u8) -> ProgressAction {
        ProgressAction::Continue
    }
}

type OwnerTask = Box<dyn FnOnce() + Send + 'static>;

/// Cloneable handle that cancels a bridge from any thread.
#[derive(Debug, Clone)]
pub struct BridgeCanceller(CancellationToken);

impl BridgeCanceller {
    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// One-shot synchronous facade over one asynchronous operation.
pub struct ExecutionBridge {
    runtime: Runtime,
    token: CancellationToken,
    tasks_tx: mpsc::UnboundedSender<OwnerTask>,
    tasks_rx: mpsc::UnboundedReceiver<OwnerTask>,
    stats: Option<Arc<BridgeStats>>,
}

impl ExecutionBridge {
    /// Creates a bridge with its own cancellation token.
    pub fn new() -> Result<Self, BridgeError> {
        Self::with_token(CancellationToken::new())
    }

    /// Creates a bridge whose token is a child of `parent`: cancelling the
    /// parent cancels the bridge, cancelling the bridge leaves the parent alone.
    pub fn linked(parent: &CancellationToken) -> Result<Self, BridgeError> {
        Self::with_token(parent.child_token())
    }

    fn with_token(token: CancellationToken) -> Result<Self, BridgeError> {
        if Handle::try_current().is_ok() {
            return Err(BridgeError::NestedRuntime);
        }

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(BridgeError::Runtime)?;
        let (tasks_tx, tasks_rx) = mpsc::unbounded_channel();

        trace!("execution bridge created");
        Ok(Self {
            runtime,
            token,
            tasks_tx,
            tasks_rx,
            stats: None,
        })
    }

    /// Attaches shared statistics.
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<BridgeStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn canceller(&self) -> BridgeCanceller {
        BridgeCanceller(self.token.clone())
    }

    /// Requests cancellation before or during [`run`](Self::run). Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Drives the future produced by `f` to completion on the calling thread.
    ///
    /// Consumes the bridge: one bridge runs one operation. The runtime is torn
    /// down before this returns, on every path.
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - The output of the future
    /// * `Err(BridgeError::Cancelled)` - Cancellation was requested; the
    ///   future was dropped without completing
    /// * `Err(BridgeError::NestedRuntime)` - Called from an async context
    pub fn run<F, Fut, T>(self, f: F) -> Result<T, BridgeError>
    where
        F: FnOnce(OwnerContext) -> Fut,
        Fut: Future<Output = T>,
    {
        let Self {
            runtime,
            token,
            tasks_tx,
            mut tasks_rx,
            stats,
        } = self;

        if Handle::try_current().is_ok() {
            // Dropping a runtime here would panic; let it wind down on its own.
            runtime.shutdown_background();
            return Err(BridgeError::NestedRuntime);
        }

        if let Some(s) = &stats {
            s.record_start();
        }

        let owner = OwnerContext {
            token: token.clone(),
            tasks: tasks_tx,
            owner: thread::current().id(),
        };
        let future = f(owner);

        let outcome = runtime.block_on(async {
            tokio::pin!(future);
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break None,
                    Some(task) = tasks_rx.recv() => task(),
                    value = &mut future => break Some(value),
                }
            }
        });

        // Callbacks still queued are dropped; their waiters see OwnerGone.
        drop(tasks_rx);
        drop(runtime);
        trace!("execution bridge torn down");

        match outcome {
            Some(value) if !token.is_cancelled() => {
                if let Some(s) = &stats {
                    s.record_complete();
                }
                Ok(value)
            }
            _ => {
                debug!("bridged operation cancelled");
                if let Some(s) = &stats {
                    s.record_cancel();
                }
                Err(BridgeError::Cancelled)
            }
        }
    }
}

/// Handle given to the bridged future.
///
/// Carries the bridge's cancellation token and the channel back to the owner
/// thread. Cheap to clone and safe to send to other threads.
#[derive(Debug, Clone)]
pub struct OwnerContext {
    token: CancellationToken,
    tasks: mpsc::UnboundedSender<OwnerTask>,
    owner: ThreadId,
}

impl OwnerContext {
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Runs `f` on the owner thread and waits for its result.
    ///
    /// Runs inline when already on the owner thread.
    pub async fn run_on_owner<F, R>(&self, f: F) -> Result<R, BridgeError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_owner_thread() {
            return Ok(f());
        }

        let (tx, rx) = oneshot::channel();
        self.tasks
            .send(Box::new(move || {
                // Ignore send error - the waiter may have been dropped
                let _ = tx.send(f());
            }))
            .map_err(|_| BridgeError::OwnerGone)?;
        rx.await.map_err(|_| BridgeError::OwnerGone)
    }

    /// Blocking variant of [`run_on_owner`](Self::run_on_owner) for code
    /// running on foreign threads outside any async context.
    pub fn run_on_owner_blocking<F, R>(&self, f: F) -> Result<R, BridgeError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_owner_thread() {
            return Ok(f());
        }

        let (tx, rx) = bounded(1);
        self.tasks
            .send(Box::new(move || {
                let _ = tx.send(f());
            }))
            .map_err(|_| BridgeError::OwnerGone)?;
        rx.recv().map_err(|_| BridgeError::OwnerGone)
    }
}

/// Remote-facing progress reporter that forwards to a host sink on the owner
/// thread and turns an abort answer into a bridge cancel request.
pub struct CancellableProgress {
    owner: OwnerContext,
    sink: Arc<dyn ProgressSink>,
}

impl CancellableProgress {
    pub fn new(owner: OwnerContext, sink: Arc<dyn ProgressSink>) -> Self {
        Self { owner, sink }
    }
}

impl TransferProgress for CancellableProgress {
    fn report(&self, percent: u8) {
        let sink = Arc::clone(&self.sink);
        let token = self.owner.token.clone();
        let delivered = self.owner.run_on_owner_blocking(move || {
            if sink.report(percent) == ProgressAction::Abort {
                debug!(percent, "host aborted transfer from progress callback");
                token.cancel();
            }
        });
        if let Err(e) = delivered {
            trace!(percent, error = %e, "progress report dropped");
        }
    }
}
