//! Rotating credential pool.
//!
//! A remote call is attempted with successive credentials until one succeeds,
//! a non-retryable error occurs, or one full rotation has been spent. The
//! rotation cursor is shared by every caller of the pool, so consecutive calls
//! start on different accounts.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use comment_source::{CommentSource, Credential, SourceError, SourceRequest};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::PoolError;

/// Pause between two attempts of the same operation.
pub const DEFAULT_ROTATION_BACKOFF: Duration = Duration::from_millis(500);

/// Ordered, non-empty set of credentials with a cyclic cursor.
pub struct CredentialPool<C = Credential> {
    credentials: Vec<Arc<C>>,
    cursor: AtomicUsize,
    backoff: Duration,
    cancel_token: CancellationToken,
}

impl<C> CredentialPool<C>
where
    C: Send + Sync + 'static,
{
    /// Build a pool. Fails with [`PoolError::NoCredentials`] when `credentials` is empty.
    pub fn new(credentials: Vec<C>) -> Result<Self, PoolError> {
        if credentials.is_empty() {
            return Err(PoolError::NoCredentials);
        }

        Ok(Self {
            credentials: credentials.into_iter().map(Arc::new).collect(),
            cursor: AtomicUsize::new(0),
            backoff: DEFAULT_ROTATION_BACKOFF,
            cancel_token: CancellationToken::new(),
        })
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Abandon pending rotations once `token` is cancelled.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Advance the shared cursor and return the slot it pointed at.
    fn next_credential(&self) -> (usize, Arc<C>) {
        let slot = self.cursor.fetch_add(1, Ordering::Relaxed) % self.credentials.len();
        (slot, Arc::clone(&self.credentials[slot]))
    }

    /// Run `op` against successive credentials.
    ///
    /// - success returns immediately;
    /// - a retryable [`SourceError`] waits for the backoff and moves on to the next credential;
    /// - any other error is returned as [`PoolError::Rejected`] without further attempts;
    /// - after `len()` retryable failures the last one is returned as [`PoolError::Exhausted`].
    ///
    /// At most `len()` attempts are made per call.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        operation: &str,
        mut op: F,
    ) -> Result<T, PoolError>
    where
        F: FnMut(Arc<C>) -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let attempts = self.credentials.len();
        let mut last_error: Option<SourceError> = None;

        for attempt in 1..=attempts {
            if self.cancel_token.is_cancelled() {
                return Err(PoolError::Cancelled);
            }

            let (slot, credential) = self.next_credential();
            match op(credential).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, slot, "succeeded after rotation");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() => {
                    warn!(
                        operation,
                        attempt,
                        attempts,
                        slot,
                        throttled = err.is_throttled(),
                        error = %err,
                        "request failed, switching account"
                    );
                    last_error = Some(err);

                    if attempt < attempts {
                        tokio::select! {
                            _ = self.cancel_token.cancelled() => return Err(PoolError::Cancelled),
                            _ = tokio::time::sleep(self.backoff) => {}
                        }
                    }
                }
                Err(err) => return Err(PoolError::Rejected(err)),
            }
        }

        error!(operation, attempts, "all credentials failed");
        match last_error {
            Some(last) => Err(PoolError::Exhausted { attempts, last }),
            None => Err(PoolError::NoCredentials),
        }
    }
}

impl CredentialPool<Credential> {
    /// Dispatch a typed source request through [`execute_with_retry`](Self::execute_with_retry).
    pub async fn send<R>(
        &self,
        source: &Arc<dyn CommentSource>,
        request: &R,
    ) -> Result<R::Output, PoolError>
    where
        R: SourceRequest,
    {
        self.execute_with_retry(request.operation(), |credential| {
            let source = Arc::clone(source);
            let request = request.clone();
            async move { request.send(source.as_ref(), &credential).await }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn pool(ids: &[u32]) -> CredentialPool<u32> {
        CredentialPool::new(ids.to_vec()).unwrap()
    }

    fn throttled() -> SourceError {
        SourceError::api(SourceError::CODE_THROTTLED, "request was intercepted")
    }

    #[test]
    fn empty_pool_is_configuration_error() {
        let result = CredentialPool::<u32>::new(vec![]);
        assert!(matches!(result, Err(PoolError::NoCredentials)));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_one_full_rotation() {
        let pool = pool(&[1, 2, 3, 4]);
        let seen = Mutex::new(Vec::new());

        let result: Result<(), PoolError> = pool
            .execute_with_retry("op", |credential| {
                seen.lock().unwrap().push(*credential);
                let message = format!("rejected by {}", credential);
                async move { Err(SourceError::api(-412, message)) }
            })
            .await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4]);
        match result {
            Err(PoolError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 4);
                assert_eq!(last.to_string(), "api error -412: rejected by 4");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_success_after_retryable_failures() {
        let pool = pool(&[10, 20, 30, 40]);
        let attempts = Mutex::new(0);

        let result = pool
            .execute_with_retry("op", |credential| {
                *attempts.lock().unwrap() += 1;
                async move {
                    if *credential == 30 {
                        Ok(format!("served by {credential}"))
                    } else {
                        Err(throttled())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "served by 30");
        assert_eq!(*attempts.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_fails_fast() {
        let pool = pool(&[1, 2, 3]);
        let attempts = Mutex::new(0);

        let result: Result<(), PoolError> = pool
            .execute_with_retry("op", |_| {
                *attempts.lock().unwrap() += 1;
                async { Err(SourceError::InvalidResponse("truncated body".into())) }
            })
            .await;

        assert!(matches!(result, Err(PoolError::Rejected(_))));
        assert_eq!(*attempts.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cursor_is_shared_across_calls() {
        let pool = pool(&[1, 2, 3]);

        let mut served = Vec::new();
        for _ in 0..4 {
            let id = pool
                .execute_with_retry("op", |credential| async move {
                    Ok::<_, SourceError>(*credential)
                })
                .await
                .unwrap();
            served.push(id);
        }
        assert_eq!(served, vec![1, 2, 3, 1]);

        // A rotation inside one call also moves the shared cursor.
        let _ = pool
            .execute_with_retry("op", |credential| async move {
                if *credential == 3 { Ok(()) } else { Err(throttled()) }
            })
            .await;
        let next = pool
            .execute_with_retry("op", |credential| async move {
                Ok::<_, SourceError>(*credential)
            })
            .await
            .unwrap();
        assert_eq!(next, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_separates_attempts() {
        let pool = pool(&[1, 2]).with_backoff(Duration::from_millis(500));
        let started = tokio::time::Instant::now();

        let _: Result<(), PoolError> = pool
            .execute_with_retry("op", |_| async { Err(throttled()) })
            .await;

        // One pause between the two attempts, none after the last one.
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_rotation() {
        let token = CancellationToken::new();
        let pool = pool(&[1, 2, 3]).with_cancel_token(token.clone());
        let attempts = Mutex::new(0);

        let result: Result<(), PoolError> = pool
            .execute_with_retry("op", |_| {
                *attempts.lock().unwrap() += 1;
                token.cancel();
                async { Err(throttled()) }
            })
            .await;

        assert!(matches!(result, Err(PoolError::Cancelled)));
        assert_eq!(*attempts.lock().unwrap(), 1);
    }
}
