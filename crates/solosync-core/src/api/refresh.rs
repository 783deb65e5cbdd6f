//! Single-flight access token refresh.
//!
//! The first caller to need a refresh performs it; callers arriving while it
//! is in flight queue a oneshot and get the same new token (or the same
//! failure) when it resolves. At most one refresh is ever outstanding.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::ApiError;

type Waiter = oneshot::Sender<Result<String, ()>>;

#[derive(Debug, Default)]
pub struct RefreshGate {
    /// `Some` while a refresh is in flight, holding the queued callers.
    waiters: Mutex<Option<Vec<Waiter>>>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Vec<Waiter>>> {
        self.waiters.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().is_some()
    }

    /// Callers waiting on the refresh in flight.
    pub fn queued(&self) -> usize {
        self.lock().as_ref().map_or(0, Vec::len)
    }

    /// Run `refresh` unless one is already in flight, in which case wait
    /// for that one instead. Queued callers see any failure as
    /// [`ApiError::AuthExpired`].
    pub async fn refresh<F, Fut>(&self, refresh: F) -> Result<String, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, ApiError>>,
    {
        let queued = {
            let mut waiters = self.lock();
            match waiters.as_mut() {
                Some(queue) => {
                    let (tx, rx) = oneshot::channel();
                    queue.push(tx);
                    Some(rx)
                }
                None => {
                    *waiters = Some(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = queued {
            debug!("token refresh in flight, request queued");
            return match rx.await {
                Ok(Ok(token)) => Ok(token),
                _ => Err(ApiError::AuthExpired),
            };
        }

        let in_flight = InFlight {
            gate: self,
            settled: false,
        };
        let result = refresh().await;
        in_flight.finish(&result);
        result
    }
}

/// Clears the in-flight slot even if the refreshing future is dropped, so
/// queued callers are rejected rather than left waiting.
struct InFlight<'a> {
    gate: &'a RefreshGate,
    /// Set once `finish` has emptied the slot; a later refresh may own it.
    settled: bool,
}

impl InFlight<'_> {
    fn finish(mut self, result: &Result<String, ApiError>) {
        let queue = self.gate.lock().take().unwrap_or_default();
        self.settled = true;
        debug!(waiters = queue.len(), ok = result.is_ok(), "token refresh settled");
        for waiter in queue {
            let _ = waiter.send(result.as_ref().cloned().map_err(|_| ()));
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.gate.lock().take();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    async fn settle(mut done: impl FnMut() -> bool) {
        for _ in 0..1000 {
            if done() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition never reached");
    }

    fn spawn_waiter(
        gate: &Arc<RefreshGate>,
        calls: &Arc<AtomicUsize>,
    ) -> tokio::task::JoinHandle<Result<String, ApiError>> {
        let gate = gate.clone();
        let calls = calls.clone();
        tokio::spawn(async move {
            gate.refresh(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("from-waiter".to_string())
            })
            .await
        })
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let gate = Arc::new(RefreshGate::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let (release, hold) = oneshot::channel::<()>();

        let leader = {
            let gate = gate.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                gate.refresh(|| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let _ = hold.await;
                    Ok("new-access".to_string())
                })
                .await
            })
        };
        settle(|| gate.is_refreshing()).await;

        let waiters: Vec<_> = (0..3).map(|_| spawn_waiter(&gate, &calls)).collect();
        settle(|| gate.queued() == 3).await;
        release.send(()).unwrap();

        assert_eq!(leader.await.unwrap().unwrap(), "new-access");
        for waiter in waiters {
            assert_eq!(waiter.await.unwrap().unwrap(), "new-access");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!gate.is_refreshing());
    }

    #[tokio::test]
    async fn failed_refresh_rejects_every_waiter() {
        let gate = Arc::new(RefreshGate::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let (release, hold) = oneshot::channel::<()>();

        let leader = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.refresh(|| async move {
                    let _ = hold.await;
                    Err(ApiError::Status {
                        status: 401,
                        message: "token_not_valid".into(),
                    })
                })
                .await
            })
        };
        settle(|| gate.is_refreshing()).await;
        let waiter = spawn_waiter(&gate, &calls);
        settle(|| gate.queued() == 1).await;
        release.send(()).unwrap();

        assert!(leader.await.unwrap().is_err());
        assert!(matches!(waiter.await.unwrap(), Err(ApiError::AuthExpired)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn abandoned_refresh_frees_the_gate() {
        let gate = Arc::new(RefreshGate::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let leader = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.refresh(|| std::future::pending::<Result<String, ApiError>>())
                    .await
            })
        };
        settle(|| gate.is_refreshing()).await;
        let waiter = spawn_waiter(&gate, &calls);
        settle(|| gate.queued() == 1).await;

        leader.abort();
        assert!(matches!(waiter.await.unwrap(), Err(ApiError::AuthExpired)));
        assert!(!gate.is_refreshing());

        let again = spawn_waiter(&gate, &calls).await.unwrap();
        assert_eq!(again.unwrap(), "from-waiter");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn never_more_than_one_refresh_under_contention() {
        let gate = Arc::new(RefreshGate::new());
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let gate = gate.clone();
                let running = running.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    for _ in 0..20 {
                        let running = running.clone();
                        let peak = peak.clone();
                        let result = gate
                            .refresh(|| async move {
                                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                                peak.fetch_max(now, Ordering::SeqCst);
                                tokio::task::yield_now().await;
                                running.fetch_sub(1, Ordering::SeqCst);
                                Ok("token".to_string())
                            })
                            .await;
                        assert_eq!(result.unwrap(), "token");
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(!gate.is_refreshing());
    }
}
