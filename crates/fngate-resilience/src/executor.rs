//! Resilient Executor
//!
//! Runs one invocation under the circuit breaker, bulkhead and timeout of its
//! isolation group, then substitutes a fallback response when the call did
//! not produce a result and a provider claims the route.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use fngate_kernel::gateway::{FallbackCause, GatewayError, GatewayResponse};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::circuit_breaker::{
    CircuitBreaker, CircuitBreakerMetricsSnapshot, CircuitBreakerSettings, FailureKind, State,
};
use crate::fallback::FallbackRegistry;
use crate::isolation::{Bulkhead, IsolationPolicy, IsolationSettings, IsolationStrategy};

/// Isolation and circuit breaker configuration of an executor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    pub isolation: IsolationSettings,
    pub circuit_breaker: CircuitBreakerSettings,
}

impl ExecutorSettings {
    pub fn validate(&self) -> Result<(), GatewayError> {
        self.isolation.validate()?;
        self.circuit_breaker.validate()
    }
}

/// Why an execution produced no response.
#[derive(Debug, Error)]
pub enum ExecutionError<E>
where
    E: std::error::Error + 'static,
{
    #[error("invocation of '{group}' timed out after {timeout_ms} ms")]
    Timeout { group: String, timeout_ms: u64 },

    #[error("invocation of '{group}' rejected: all {capacity} slots in use")]
    Rejected { group: String, capacity: u32 },

    #[error("circuit for '{group}' is open")]
    CircuitOpen { group: String },

    #[error("invocation of '{group}' ended without a result")]
    Aborted { group: String },

    #[error("isolation group '{group}' unavailable: {message}")]
    Isolation { group: String, message: String },

    #[error("invocation of '{group}' failed: {source}")]
    Failed {
        group: String,
        #[source]
        source: E,
    },
}

impl<E> ExecutionError<E>
where
    E: std::error::Error + 'static,
{
    fn fallback_cause(&self) -> FallbackCause {
        match self {
            ExecutionError::Timeout { .. } => FallbackCause::Timeout,
            ExecutionError::Rejected { .. } => FallbackCause::Rejected,
            ExecutionError::CircuitOpen { .. } => FallbackCause::CircuitOpen,
            other => FallbackCause::Failure(other.to_string()),
        }
    }
}

/// Breaker, bulkhead and resolved policy of one function identifier.
#[derive(Debug)]
struct IsolationGroup {
    key: String,
    policy: IsolationPolicy,
    breaker: CircuitBreaker,
    bulkhead: Bulkhead,
}

/// Point-in-time view of one isolation group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub key: String,
    pub state: State,
    pub strategy: IsolationStrategy,
    pub timeout_ms: u64,
    pub max_concurrent: u32,
    pub available_permits: usize,
    pub metrics: CircuitBreakerMetricsSnapshot,
}

/// Executes invocations with per-group isolation, timeout and fallback.
///
/// Groups are created on first use of a key; their policy is resolved at
/// that moment and never changes afterwards.
#[derive(Debug)]
pub struct ResilientExecutor {
    settings: ExecutorSettings,
    groups: DashMap<String, Arc<IsolationGroup>>,
    fallbacks: FallbackRegistry,
}

impl ResilientExecutor {
    pub fn new(settings: ExecutorSettings, fallbacks: FallbackRegistry) -> Result<Self, GatewayError> {
        settings.validate()?;
        Ok(Self {
            settings,
            groups: DashMap::new(),
            fallbacks,
        })
    }

    /// Run `call` for the group `key`.
    ///
    /// A response returned by `call` is a success for the breaker no matter
    /// its status. Timeouts, rejections, open circuits and errors are handed
    /// to the fallback registered for `key`, if any; otherwise they surface
    /// as [`ExecutionError`].
    pub async fn execute<Fut, E>(
        &self,
        key: &str,
        call: Fut,
    ) -> Result<GatewayResponse, ExecutionError<E>>
    where
        Fut: Future<Output = Result<GatewayResponse, E>> + Send + 'static,
        E: std::error::Error + Send + 'static,
    {
        let outcome = match self.group(key) {
            Ok(group) => self.run(&group, call).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(response) => Ok(response),
            Err(err) => self.recover(key, err).await,
        }
    }

    /// Current breaker state of `key`, if its group exists yet.
    pub fn state(&self, key: &str) -> Option<State> {
        self.groups.get(key).map(|group| group.breaker.state())
    }

    /// Effective policy of `key`, resolving it if the group does not exist.
    pub fn policy(&self, key: &str) -> Result<IsolationPolicy, GatewayError> {
        match self.groups.get(key) {
            Some(group) => Ok(group.policy),
            None => self.settings.isolation.resolve(key),
        }
    }

    /// Snapshots of every group created so far, sorted by key.
    pub fn snapshots(&self) -> Vec<GroupSnapshot> {
        let mut snapshots: Vec<_> = self
            .groups
            .iter()
            .map(|entry| {
                let group = entry.value();
                GroupSnapshot {
                    key: group.key.clone(),
                    state: group.breaker.state(),
                    strategy: group.bulkhead.strategy(),
                    timeout_ms: duration_ms(group.policy.timeout),
                    max_concurrent: group.bulkhead.capacity(),
                    available_permits: group.bulkhead.available_permits(),
                    metrics: group.breaker.metrics().snapshot(),
                }
            })
            .collect();
        snapshots.sort_by(|a, b| a.key.cmp(&b.key));
        snapshots
    }

    pub fn fallbacks(&self) -> &FallbackRegistry {
        &self.fallbacks
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    // =========================================================================
    // Private methods
    // =========================================================================

    fn group<E>(&self, key: &str) -> Result<Arc<IsolationGroup>, ExecutionError<E>>
    where
        E: std::error::Error + 'static,
    {
        if let Some(group) = self.groups.get(key) {
            return Ok(Arc::clone(group.value()));
        }

        let isolation_error = |message: String| ExecutionError::Isolation {
            group: key.to_string(),
            message,
        };
        let entry = self.groups.entry(key.to_string()).or_try_insert_with(|| {
            let policy = self
                .settings
                .isolation
                .resolve(key)
                .map_err(|e| isolation_error(e.to_string()))?;
            let bulkhead =
                Bulkhead::for_policy(key, &policy).map_err(|e| isolation_error(e.to_string()))?;
            let breaker = CircuitBreaker::new(
                key,
                self.settings.circuit_breaker.get_effective_config(key),
            );
            debug!(
                group = %key,
                strategy = ?policy.strategy,
                timeout_ms = duration_ms(policy.timeout),
                max_concurrent = policy.max_concurrent,
                "created isolation group"
            );
            Ok::<_, ExecutionError<E>>(Arc::new(IsolationGroup {
                key: key.to_string(),
                policy,
                breaker,
                bulkhead,
            }))
        })?;
        Ok(Arc::clone(entry.value()))
    }

    async fn run<Fut, E>(
        &self,
        group: &IsolationGroup,
        call: Fut,
    ) -> Result<GatewayResponse, ExecutionError<E>>
    where
        Fut: Future<Output = Result<GatewayResponse, E>> + Send + 'static,
        E: std::error::Error + Send + 'static,
    {
        let key = group.key.as_str();

        if !group.breaker.allow_request() {
            debug!(group = %key, "circuit open, short-circuiting");
            return Err(ExecutionError::CircuitOpen {
                group: key.to_string(),
            });
        }

        let Some(permit) = group.bulkhead.try_acquire() else {
            group.breaker.record_failure(FailureKind::Rejected);
            warn!(group = %key, capacity = group.policy.max_concurrent, "no concurrency slot available");
            return Err(ExecutionError::Rejected {
                group: key.to_string(),
                capacity: group.policy.max_concurrent,
            });
        };

        let receiver = match group.bulkhead.spawn(permit, call) {
            Ok(receiver) => receiver,
            Err(err) => {
                group.breaker.record_failure(FailureKind::Error);
                return Err(ExecutionError::Isolation {
                    group: key.to_string(),
                    message: err.to_string(),
                });
            }
        };

        match tokio::time::timeout(group.policy.timeout, receiver).await {
            Ok(Ok(Ok(response))) => {
                group.breaker.record_success();
                Ok(response)
            }
            Ok(Ok(Err(source))) => {
                group.breaker.record_failure(FailureKind::Error);
                Err(ExecutionError::Failed {
                    group: key.to_string(),
                    source,
                })
            }
            Ok(Err(_)) => {
                group.breaker.record_failure(FailureKind::Error);
                Err(ExecutionError::Aborted {
                    group: key.to_string(),
                })
            }
            Err(_) => {
                group.breaker.record_failure(FailureKind::Timeout);
                // The call keeps running until its transport returns.
                warn!(
                    group = %key,
                    timeout_ms = duration_ms(group.policy.timeout),
                    "invocation timed out, abandoning"
                );
                Err(ExecutionError::Timeout {
                    group: key.to_string(),
                    timeout_ms: duration_ms(group.policy.timeout),
                })
            }
        }
    }

    async fn recover<E>(
        &self,
        key: &str,
        err: ExecutionError<E>,
    ) -> Result<GatewayResponse, ExecutionError<E>>
    where
        E: std::error::Error + 'static,
    {
        let Some(provider) = self.fallbacks.get(key) else {
            return Err(err);
        };

        let cause = err.fallback_cause();
        info!(group = %key, cause = %cause, "serving fallback response");
        if let Some(group) = self.groups.get(key) {
            group.breaker.metrics().record_fallback();
        }
        Ok(provider.fallback_response(&cause).await)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use crate::isolation::IsolationPolicyOverride;
    use async_trait::async_trait;
    use fngate_kernel::gateway::FallbackProvider;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    const FN_A: &str = "arn:aws:lambda:us-east-1:1:function:a";

    #[derive(Debug, Error)]
    #[error("transport down")]
    struct Down;

    struct Recording {
        route: &'static str,
        causes: Mutex<Vec<FallbackCause>>,
    }

    impl Recording {
        fn new(route: &'static str) -> Arc<Self> {
            Arc::new(Self {
                route,
                causes: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl FallbackProvider for Recording {
        fn route(&self) -> &str {
            self.route
        }

        async fn fallback_response(&self, cause: &FallbackCause) -> GatewayResponse {
            self.causes.lock().push(cause.clone());
            GatewayResponse::new(200, self.route).with_body("fallback")
        }
    }

    fn with_timeout(ms: u64) -> ExecutorSettings {
        ExecutorSettings {
            isolation: IsolationSettings::default()
                .with_default(IsolationPolicyOverride::default().with_timeout(Duration::from_millis(ms))),
            ..Default::default()
        }
    }

    fn ok_response() -> Result<GatewayResponse, Down> {
        Ok(GatewayResponse::new(200, FN_A).with_body("hello"))
    }

    #[tokio::test]
    async fn successful_call_passes_through() {
        let executor = ResilientExecutor::new(ExecutorSettings::default(), FallbackRegistry::new()).unwrap();
        let response = executor.execute(FN_A, async { ok_response() }).await.unwrap();
        assert_eq!(response.body.as_ref(), b"hello");
        assert_eq!(executor.state(FN_A), Some(State::Closed));
    }

    #[tokio::test]
    async fn error_status_response_is_not_a_breaker_failure() {
        let executor = ResilientExecutor::new(ExecutorSettings::default(), FallbackRegistry::new()).unwrap();
        let response = executor
            .execute(FN_A, async { Ok::<_, Down>(GatewayResponse::new(502, FN_A)) })
            .await
            .unwrap();
        assert_eq!(response.status, 502);
        let snapshot = &executor.snapshots()[0];
        assert_eq!(snapshot.metrics.total_successes, 1);
        assert_eq!(snapshot.metrics.total_failures, 0);
    }

    #[tokio::test]
    async fn timeout_without_fallback_returns_promptly() {
        let executor = ResilientExecutor::new(with_timeout(50), FallbackRegistry::new()).unwrap();
        let started = Instant::now();

        let err = executor
            .execute(FN_A, async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                ok_response()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutionError::Timeout { timeout_ms: 50, .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(executor.snapshots()[0].metrics.total_timeouts, 1);
    }

    #[tokio::test]
    async fn timeout_with_fallback_serves_substitute() {
        let provider = Recording::new(FN_A);
        let registry =
            FallbackRegistry::from_providers([provider.clone() as Arc<dyn FallbackProvider>]).unwrap();
        let executor = ResilientExecutor::new(with_timeout(30), registry).unwrap();

        let response = executor
            .execute(FN_A, async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                ok_response()
            })
            .await
            .unwrap();

        assert_eq!(response.body.as_ref(), b"fallback");
        assert_eq!(provider.causes.lock().as_slice(), &[FallbackCause::Timeout]);
        assert_eq!(executor.snapshots()[0].metrics.total_fallbacks, 1);
    }

    #[tokio::test]
    async fn failure_is_surfaced_with_source() {
        let executor = ResilientExecutor::new(ExecutorSettings::default(), FallbackRegistry::new()).unwrap();
        let err = executor
            .execute(FN_A, async { Err::<GatewayResponse, _>(Down) })
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Failed { .. }));
        assert!(err.to_string().contains("transport down"));
    }

    #[tokio::test]
    async fn open_circuit_short_circuits_without_calling() {
        let settings = ExecutorSettings {
            circuit_breaker: CircuitBreakerSettings::default().with_default_config(
                CircuitBreakerConfig::default()
                    .with_request_volume_threshold(2)
                    .with_error_threshold_percentage(50)
                    .with_sleep_window(Duration::from_secs(60)),
            ),
            ..Default::default()
        };
        let executor = ResilientExecutor::new(settings, FallbackRegistry::new()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let _ = executor
                .execute(FN_A, async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<GatewayResponse, _>(Down)
                })
                .await;
        }
        assert_eq!(executor.state(FN_A), Some(State::Open));

        let calls_after = calls.clone();
        let err = executor
            .execute(FN_A, async move {
                calls_after.fetch_add(1, Ordering::SeqCst);
                ok_response()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::CircuitOpen { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_slots_reject_immediately() {
        let settings = ExecutorSettings {
            isolation: IsolationSettings::default()
                .with_command(FN_A, IsolationPolicyOverride::default().with_max_concurrent(1)),
            ..Default::default()
        };
        let executor = Arc::new(ResilientExecutor::new(settings, FallbackRegistry::new()).unwrap());
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let first = {
            let executor = executor.clone();
            tokio::spawn(async move {
                executor
                    .execute(FN_A, async move {
                        let _ = release_rx.await;
                        ok_response()
                    })
                    .await
            })
        };
        // Let the first call take the only slot.
        while executor.snapshots().first().map(|s| s.available_permits) != Some(0) {
            tokio::task::yield_now().await;
        }

        let err = executor.execute(FN_A, async { ok_response() }).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Rejected { capacity: 1, .. }));

        release_tx.send(()).unwrap();
        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn open_circuit_serves_fallback_until_sleep_window_elapses() {
        let provider = Recording::new(FN_A);
        let registry =
            FallbackRegistry::from_providers([provider.clone() as Arc<dyn FallbackProvider>]).unwrap();
        let settings = ExecutorSettings {
            circuit_breaker: CircuitBreakerSettings::default().with_default_config(
                CircuitBreakerConfig::default()
                    .with_request_volume_threshold(2)
                    .with_sleep_window(Duration::from_millis(100)),
            ),
            ..Default::default()
        };
        let executor = ResilientExecutor::new(settings, registry).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let response = executor
                .execute(FN_A, async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<GatewayResponse, _>(Down)
                })
                .await
                .unwrap();
            assert_eq!(response.body.as_ref(), b"fallback");
        }
        assert_eq!(executor.state(FN_A), Some(State::Open));

        let short_circuited = calls.clone();
        let response = executor
            .execute(FN_A, async move {
                short_circuited.fetch_add(1, Ordering::SeqCst);
                ok_response()
            })
            .await
            .unwrap();
        assert_eq!(response.body.as_ref(), b"fallback");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(provider.causes.lock().last(), Some(&FallbackCause::CircuitOpen));

        tokio::time::sleep(Duration::from_millis(150)).await;

        let trial = calls.clone();
        let response = executor
            .execute(FN_A, async move {
                trial.fetch_add(1, Ordering::SeqCst);
                ok_response()
            })
            .await
            .unwrap();
        assert_eq!(response.body.as_ref(), b"hello");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(executor.state(FN_A), Some(State::Closed));
    }

    #[tokio::test]
    async fn rejected_call_serves_fallback() {
        let provider = Recording::new(FN_A);
        let registry =
            FallbackRegistry::from_providers([provider.clone() as Arc<dyn FallbackProvider>]).unwrap();
        let settings = ExecutorSettings {
            isolation: IsolationSettings::default()
                .with_command(FN_A, IsolationPolicyOverride::default().with_max_concurrent(1)),
            ..Default::default()
        };
        let executor = Arc::new(ResilientExecutor::new(settings, registry).unwrap());
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let first = {
            let executor = executor.clone();
            tokio::spawn(async move {
                executor
                    .execute(FN_A, async move {
                        let _ = release_rx.await;
                        ok_response()
                    })
                    .await
            })
        };
        while executor.snapshots().first().map(|s| s.available_permits) != Some(0) {
            tokio::task::yield_now().await;
        }

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_inner = ran.clone();
        let response = executor
            .execute(FN_A, async move {
                ran_inner.fetch_add(1, Ordering::SeqCst);
                ok_response()
            })
            .await
            .unwrap();
        assert_eq!(response.body.as_ref(), b"fallback");
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(provider.causes.lock().as_slice(), &[FallbackCause::Rejected]);
        assert_eq!(executor.snapshots()[0].metrics.total_rejected, 1);

        release_tx.send(()).unwrap();
        assert_eq!(first.await.unwrap().unwrap().body.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn command_timeout_override_applies_per_key() {
        let settings = ExecutorSettings {
            isolation: IsolationSettings::default().with_command(
                FN_A,
                IsolationPolicyOverride::default().with_timeout(Duration::from_millis(5_250)),
            ),
            ..Default::default()
        };
        let executor = ResilientExecutor::new(settings, FallbackRegistry::new()).unwrap();
        assert_eq!(executor.policy(FN_A).unwrap().timeout, Duration::from_millis(5_250));
        assert_eq!(executor.policy("other").unwrap().timeout, Duration::from_millis(500));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn thread_pool_groups_run_off_the_runtime() {
        let settings = ExecutorSettings {
            isolation: IsolationSettings::default().with_default(
                IsolationPolicyOverride::default()
                    .with_strategy(IsolationStrategy::ThreadPool)
                    .with_max_concurrent(2),
            ),
            ..Default::default()
        };
        let executor = ResilientExecutor::new(settings, FallbackRegistry::new()).unwrap();

        let response = executor
            .execute(FN_A, async {
                let worker = std::thread::current().name().unwrap_or_default().to_string();
                Ok::<_, Down>(GatewayResponse::new(200, FN_A).with_body(worker))
            })
            .await
            .unwrap();

        let worker = String::from_utf8(response.body.to_vec()).unwrap();
        assert!(worker.starts_with("fngate-a-"), "ran on {worker}");
        assert_eq!(executor.snapshots()[0].strategy, IsolationStrategy::ThreadPool);
    }

    #[test]
    fn invalid_settings_are_rejected_up_front() {
        let settings = ExecutorSettings {
            isolation: IsolationSettings::default()
                .with_default(IsolationPolicyOverride::default().with_max_concurrent(0)),
            ..Default::default()
        };
        assert!(ResilientExecutor::new(settings, FallbackRegistry::new()).is_err());
    }
}
