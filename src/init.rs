//! One-time connect/bootstrap gate
//!
//! Adapters are constructed synchronously, but reaching the backend and
//! creating the session table is asynchronous. [`InitGate`] starts that work
//! once, memoizes its outcome and lets every operation await it first. A
//! failed setup is cached: it is reported once and never re-run.

use crate::config::ErrorCallback;
use crate::error::{StorageError, StorageResult};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use tokio::runtime::Handle;
use tracing::{error, info};

type SetupFuture<H> = Shared<BoxFuture<'static, StorageResult<H>>>;

/// Memoized asynchronous setup producing the backend handle `H`
pub struct InitGate<H> {
    ready: SetupFuture<H>,
}

impl<H> Clone for InitGate<H> {
    fn clone(&self) -> Self {
        Self {
            ready: self.ready.clone(),
        }
    }
}

impl<H> InitGate<H>
where
    H: Clone + Send + Sync + 'static,
{
    /// Begin setup immediately
    ///
    /// Inside a tokio runtime the setup is spawned as a background task, so it
    /// makes progress (and reports failures) even if no operation is issued.
    /// Outside a runtime it is driven by the first [`wait`](Self::wait).
    pub fn start<F>(backend: &'static str, setup: F, on_init_error: Option<ErrorCallback>) -> Self
    where
        F: Future<Output = StorageResult<H>> + Send + 'static,
    {
        let guarded = async move {
            match setup.await {
                Ok(handle) => {
                    info!(backend, "Session store ready");
                    Ok(handle)
                }
                Err(err) => {
                    error!(backend, error = %err, "Session store setup failed");
                    if let Some(callback) = on_init_error {
                        callback(&err);
                    }
                    Err(err)
                }
            }
        };

        let ready = match Handle::try_current() {
            Ok(runtime) => {
                let task = runtime.spawn(guarded);
                async move {
                    match task.await {
                        Ok(outcome) => outcome,
                        Err(join_err) => Err(StorageError::Internal(format!(
                            "{} setup task aborted: {}",
                            backend, join_err
                        ))),
                    }
                }
                .boxed()
                .shared()
            }
            Err(_) => guarded.boxed().shared(),
        };

        Self { ready }
    }

    /// A gate that is already open
    pub fn ready(handle: H) -> Self {
        Self {
            ready: futures::future::ready(Ok(handle)).boxed().shared(),
        }
    }

    /// Wait for setup and return the backend handle
    pub async fn wait(&self) -> StorageResult<H> {
        self.ready.clone().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_ready_gate_yields_handle() {
        let gate = InitGate::ready(7u32);
        assert_eq!(gate.wait().await.unwrap(), 7);
        assert_eq!(gate.wait().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_setup_runs_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let gate = InitGate::start(
            "test",
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok("pool".to_string())
            },
            None,
        );

        for _ in 0..5 {
            assert_eq!(gate.clone().wait().await.unwrap(), "pool");
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_waiters_queue_behind_setup() {
        let (release, hold) = oneshot::channel::<()>();
        let gate = InitGate::start(
            "test",
            async move {
                hold.await
                    .map_err(|_| StorageError::Internal("released early".to_string()))?;
                Ok::<_, StorageError>(42u64)
            },
            None,
        );

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        release.send(()).unwrap();
        assert_eq!(waiter.await.unwrap().unwrap(), 42);
    }

    #[tokio::test]
    async fn test_failure_is_cached_and_reported_once() {
        let reported = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));
        let seen = reported.clone();
        let counter = runs.clone();
        let callback: ErrorCallback = Arc::new(move |err: &StorageError| {
            assert!(matches!(err, StorageError::Connection(_)));
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let gate: InitGate<()> = InitGate::start(
            "test",
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(StorageError::Connection("refused".to_string()))
            },
            Some(callback),
        );

        for _ in 0..3 {
            let err = gate.wait().await.unwrap_err();
            assert_eq!(err, StorageError::Connection("refused".to_string()));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(reported.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_reported_without_any_waiter() {
        let (tx, rx) = oneshot::channel::<String>();
        let tx = std::sync::Mutex::new(Some(tx));
        let callback: ErrorCallback = Arc::new(move |err: &StorageError| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(err.to_string());
            }
        });

        let _gate: InitGate<()> = InitGate::start(
            "test",
            async { Err(StorageError::Setup("no table".to_string())) },
            Some(callback),
        );

        let message = rx.await.unwrap();
        assert!(message.contains("no table"));
    }

    #[test]
    fn test_gate_outside_runtime_is_lazy() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let gate = InitGate::start(
            "test",
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(1u8)
            },
            None,
        );
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        let value = tokio_test::block_on(gate.wait()).unwrap();
        assert_eq!(value, 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
