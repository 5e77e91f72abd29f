use crate::error::{Result, SdkError};
use crate::notify::{self, Notifier};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// What happened to a mutation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome<V> {
    /// Target equals the current value; nothing was sent
    NoOp,
    /// Another mutation on the same entity is still pending; nothing was sent
    Ignored,
    /// The store echoed the target value; local state kept
    Committed(V),
    /// The owner detached while the call was in flight; result discarded
    Stale,
}

impl<V> MutationOutcome<V> {
    pub fn is_committed(&self) -> bool {
        matches!(self, MutationOutcome::Committed(_))
    }
}

struct Inner<K, V> {
    values: HashMap<K, V>,
    /// Entity -> generation that started the pending mutation
    in_flight: HashMap<K, u64>,
}

/// Settles a mutation whose future was dropped before the remote answered:
/// clears the in-flight mark and restores the snapshot.
struct Unsettled<'a, K: Eq + Hash, V: PartialEq> {
    inner: &'a Mutex<Inner<K, V>>,
    generation: &'a AtomicU64,
    started: u64,
    /// Key, target and previous value; `None` once the remote has answered
    patch: Option<(K, V, V)>,
}

impl<K: Eq + Hash, V: PartialEq> Unsettled<'_, K, V> {
    fn disarm(mut self) {
        self.patch = None;
    }
}

impl<K: Eq + Hash, V: PartialEq> Drop for Unsettled<'_, K, V> {
    fn drop(&mut self) {
        let Some((key, target, previous)) = self.patch.take() else {
            return;
        };
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if inner.in_flight.get(&key) == Some(&self.started) {
            inner.in_flight.remove(&key);
        }
        if self.generation.load(Ordering::SeqCst) == self.started
            && inner.values.get(&key) == Some(&target)
        {
            inner.values.insert(key, previous);
            tracing::debug!("mutation dropped before the store answered, patch reverted");
        }
    }
}

/// Local copy of one field per entity, mutated optimistically.
///
/// A mutation patches local state first, calls the remote exactly once, then
/// keeps the value if the store echoes it back or restores the snapshot and
/// notifies the user otherwise. Results that arrive after [`detach`] are
/// dropped without touching state.
///
/// [`detach`]: OptimisticController::detach
pub struct OptimisticController<K, V> {
    entity: &'static str,
    inner: Mutex<Inner<K, V>>,
    generation: AtomicU64,
    notifier: Arc<dyn Notifier>,
}

impl<K, V> OptimisticController<K, V>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync,
    V: Clone + PartialEq + fmt::Debug + Send + Sync,
{
    /// `entity` names the mutated field in logs and verification errors
    pub fn new(entity: &'static str, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            entity,
            inner: Mutex::new(Inner {
                values: HashMap::new(),
                in_flight: HashMap::new(),
            }),
            generation: AtomicU64::new(0),
            notifier,
        }
    }

    /// Replace all local values, e.g. after a reconciliation fetch
    pub fn replace_all(&self, values: impl IntoIterator<Item = (K, V)>) {
        self.lock().values = values.into_iter().collect();
    }

    pub fn insert(&self, key: K, value: V) {
        self.lock().values.insert(key, value);
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().values.remove(key)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().values.get(key).cloned()
    }

    pub fn snapshot(&self) -> HashMap<K, V> {
        self.lock().values.clone()
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.lock().in_flight.contains_key(key)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// The owning view went away. Pending results become stale.
    pub fn detach(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.lock().in_flight.clear();
    }

    /// Optimistically set `key` to `target` and confirm with `remote`.
    ///
    /// `remote` receives the target and must resolve to the value the store
    /// now holds. A transport error, an authorization error or a differing
    /// echo all restore the previous value, notify the user once and return
    /// the error.
    pub async fn mutate<F, Fut>(&self, key: K, target: V, remote: F) -> Result<MutationOutcome<V>>
    where
        F: FnOnce(V) -> Fut + Send,
        Fut: Future<Output = Result<V>> + Send,
    {
        let generation = self.generation();
        let previous = {
            let mut inner = self.lock();
            let current = inner
                .values
                .get(&key)
                .cloned()
                .ok_or_else(|| SdkError::NotFound(format!("{} {}", self.entity, key)))?;
            if current == target {
                return Ok(MutationOutcome::NoOp);
            }
            if inner.in_flight.contains_key(&key) {
                tracing::debug!(entity = self.entity, key = %key, "mutation already in flight, ignoring");
                return Ok(MutationOutcome::Ignored);
            }
            inner.in_flight.insert(key.clone(), generation);
            inner.values.insert(key.clone(), target.clone());
            current
        };

        tracing::debug!(entity = self.entity, key = %key, target = ?target, "optimistic patch applied");
        let unsettled = Unsettled {
            inner: &self.inner,
            generation: &self.generation,
            started: generation,
            patch: Some((key.clone(), target.clone(), previous.clone())),
        };
        let result = remote(target.clone()).await;
        unsettled.disarm();

        let mut inner = self.lock();
        if inner.in_flight.get(&key) == Some(&generation) {
            inner.in_flight.remove(&key);
        }
        if self.generation() != generation {
            tracing::debug!(entity = self.entity, key = %key, "discarding stale mutation result");
            return Ok(MutationOutcome::Stale);
        }

        let error = match result {
            Ok(echo) if echo == target => return Ok(MutationOutcome::Committed(echo)),
            Ok(echo) => SdkError::Verification {
                entity: format!("{} {}", self.entity, key),
                expected: format!("{:?}", target),
                actual: format!("{:?}", echo),
            },
            Err(e) => e,
        };

        // A reconcile that landed meanwhile wins over the snapshot.
        if inner.values.get(&key) == Some(&target) {
            inner.values.insert(key.clone(), previous);
        }
        drop(inner);

        notify::report(self.notifier.as_ref(), self.entity, &error);
        Err(error)
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::oneshot;

    fn controller(notifier: Arc<RecordingNotifier>) -> OptimisticController<String, String> {
        let c = OptimisticController::new("project status", notifier);
        c.insert("p1".to_string(), "upcoming".to_string());
        c
    }

    #[tokio::test]
    async fn test_noop_makes_no_call() {
        let notifier = Arc::new(RecordingNotifier::new());
        let c = controller(notifier.clone());
        let calls = AtomicUsize::new(0);

        let outcome = c
            .mutate("p1".into(), "upcoming".into(), |v| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(v) }
            })
            .await
            .unwrap();

        assert_eq!(outcome, MutationOutcome::NoOp);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn test_commit_keeps_value() {
        let notifier = Arc::new(RecordingNotifier::new());
        let c = controller(notifier.clone());

        let outcome = c
            .mutate("p1".into(), "shoot".into(), |v| async move { Ok(v) })
            .await
            .unwrap();

        assert!(outcome.is_committed());
        assert_eq!(c.get(&"p1".to_string()).as_deref(), Some("shoot"));
        assert!(!c.is_in_flight(&"p1".to_string()));
    }

    #[tokio::test]
    async fn test_failure_rolls_back_and_notifies_once() {
        let notifier = Arc::new(RecordingNotifier::new());
        let c = controller(notifier.clone());

        let err = c
            .mutate("p1".into(), "shoot".into(), |_| async move {
                Err(SdkError::Unauthorized("row-level security".into()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SdkError::Unauthorized(_)));
        assert_eq!(c.get(&"p1".to_string()).as_deref(), Some("upcoming"));
        assert_eq!(notifier.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_mismatched_echo_rolls_back() {
        let notifier = Arc::new(RecordingNotifier::new());
        let c = controller(notifier.clone());

        let err = c
            .mutate("p1".into(), "shoot".into(), |_| async move {
                Ok("delivered".to_string())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SdkError::Verification { .. }));
        assert_eq!(c.get(&"p1".to_string()).as_deref(), Some("upcoming"));
        assert_eq!(notifier.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_entity() {
        let c = controller(Arc::new(RecordingNotifier::new()));
        let err = c
            .mutate("nope".into(), "shoot".into(), |v| async move { Ok(v) })
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_second_gesture_while_pending_is_ignored() {
        let c = controller(Arc::new(RecordingNotifier::new()));
        let (tx, rx) = oneshot::channel::<()>();

        let first = c.mutate("p1".into(), "shoot".into(), |v| async move {
            let _ = rx.await;
            Ok(v)
        });
        let second = async {
            tokio::task::yield_now().await;
            let outcome = c
                .mutate("p1".into(), "delivered".into(), |v| async move { Ok(v) })
                .await;
            let _ = tx.send(());
            outcome
        };

        let (first, second) = tokio::join!(first, second);
        assert!(first.unwrap().is_committed());
        assert_eq!(second.unwrap(), MutationOutcome::Ignored);
        assert_eq!(c.get(&"p1".to_string()).as_deref(), Some("shoot"));
    }

    #[tokio::test]
    async fn test_dropped_mutation_reverts_and_frees_entity() {
        let notifier = Arc::new(RecordingNotifier::new());
        let c = controller(notifier.clone());

        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(10),
            c.mutate("p1".into(), "shoot".into(), |_| {
                std::future::pending::<Result<String>>()
            }),
        )
        .await;
        assert!(timed_out.is_err());
        assert_eq!(c.get(&"p1".to_string()).as_deref(), Some("upcoming"));
        assert!(!c.is_in_flight(&"p1".to_string()));

        let outcome = c
            .mutate("p1".into(), "editing".into(), |v| async move { Ok(v) })
            .await
            .unwrap();
        assert_eq!(outcome, MutationOutcome::Committed("editing".to_string()));
        assert!(notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn test_detach_discards_late_result() {
        let notifier = Arc::new(RecordingNotifier::new());
        let c = controller(notifier.clone());
        let (tx, rx) = oneshot::channel::<()>();

        let pending = c.mutate("p1".into(), "shoot".into(), |_| async move {
            let _ = rx.await;
            Err(SdkError::Network("timeout".into()))
        });
        let owner_leaves = async {
            tokio::task::yield_now().await;
            c.detach();
            c.replace_all([("p1".to_string(), "delivered".to_string())]);
            let _ = tx.send(());
        };

        let (outcome, _) = tokio::join!(pending, owner_leaves);
        assert_eq!(outcome.unwrap(), MutationOutcome::Stale);
        assert_eq!(c.get(&"p1".to_string()).as_deref(), Some("delivered"));
        assert!(notifier.notices().is_empty());
    }
}
