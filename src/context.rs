//! Per-request correlation context.
//!
//! The current correlation id lives in a tokio task-local slot, so it follows
//! the logical flow of a request across `.await` points instead of the OS
//! thread the flow happens to run on. A flow gets its slot from
//! [`CorrelationContext::scope`]; inside that scope `set`/`reset` nest the way
//! a stack does.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Rendered in place of a correlation id when none is active.
pub const NO_REQUEST_ID: &str = "no-request-id";

tokio::task_local! {
    static CURRENT: RefCell<Option<CorrelationId>>;
}

/// Identifier of one logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Creates a fresh random (UUID v4) identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accepts an externally supplied identifier.
    ///
    /// Returns `None` for empty values and values containing anything but
    /// visible ASCII, since those cannot be echoed back in a header.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_graphic()) {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CorrelationId> for String {
    fn from(id: CorrelationId) -> Self {
        id.0
    }
}

/// Captures the value that was visible before a [`CorrelationContext::set`].
#[derive(Debug)]
#[must_use = "hand the token back to CorrelationContext::reset"]
pub struct ContextToken {
    previous: Option<CorrelationId>,
    attached: bool,
}

impl ContextToken {
    /// False when the token was issued outside of any flow scope.
    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

/// Access point for the correlation id of the running logical flow.
pub struct CorrelationContext;

impl CorrelationContext {
    /// Runs `fut` as a logical flow whose correlation id is `id`.
    ///
    /// The slot is released when the future completes, panics or is dropped.
    pub async fn scope<F>(id: CorrelationId, fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT.scope(RefCell::new(Some(id)), fut).await
    }

    /// Synchronous counterpart of [`CorrelationContext::scope`].
    pub fn sync_scope<F, R>(id: CorrelationId, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        CURRENT.sync_scope(RefCell::new(Some(id)), f)
    }

    /// Makes `id` the visible value for the calling flow.
    pub fn set(id: CorrelationId) -> ContextToken {
        match CURRENT.try_with(|cell| cell.replace(Some(id))) {
            Ok(previous) => ContextToken {
                previous,
                attached: true,
            },
            Err(_) => {
                tracing::debug!("correlation id set outside of a request scope, value is not visible");
                ContextToken {
                    previous: None,
                    attached: false,
                }
            }
        }
    }

    /// Restores the value that was visible before the matching `set`.
    pub fn reset(token: ContextToken) {
        if !token.attached {
            return;
        }
        // Outside of the issuing scope there is nothing left to restore.
        let _ = CURRENT.try_with(|cell| cell.replace(token.previous));
    }

    /// Returns the id visible to the calling flow, if any.
    pub fn get() -> Option<CorrelationId> {
        CURRENT
            .try_with(|cell| cell.borrow().clone())
            .ok()
            .flatten()
    }

    /// Returns the current id or the [`NO_REQUEST_ID`] sentinel.
    pub fn get_or_sentinel() -> String {
        Self::get()
            .map(String::from)
            .unwrap_or_else(|| NO_REQUEST_ID.to_string())
    }

    /// True when called from within a flow scope.
    pub fn is_active() -> bool {
        CURRENT.try_with(|_| ()).is_ok()
    }

    /// Wraps `fut` so that it runs under the caller's current correlation id.
    pub fn propagate<F>(fut: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        let id = Self::get();
        async move {
            match id {
                Some(id) => Self::scope(id, fut).await,
                None => fut.await,
            }
        }
    }

    /// Spawns a subtask that inherits the caller's correlation id.
    pub fn spawn<F>(fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(Self::propagate(fut))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> CorrelationId {
        CorrelationId::parse(value).unwrap()
    }

    #[test]
    fn test_parse_rejects_empty_and_non_ascii() {
        assert!(CorrelationId::parse("").is_none());
        assert!(CorrelationId::parse("   ").is_none());
        assert!(CorrelationId::parse("caf\u{e9}").is_none());
        assert!(CorrelationId::parse("a b").is_none());
        assert_eq!(CorrelationId::parse(" abc-123 ").unwrap().as_str(), "abc-123");
    }

    #[test]
    fn test_generate_is_unique() {
        let a = CorrelationId::generate();
        let b = CorrelationId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_get_outside_scope_is_absent() {
        assert!(CorrelationContext::get().is_none());
        assert!(!CorrelationContext::is_active());
        assert_eq!(CorrelationContext::get_or_sentinel(), NO_REQUEST_ID);
    }

    #[test]
    fn test_set_outside_scope_is_inert() {
        let token = CorrelationContext::set(id("orphan"));
        assert!(!token.is_attached());
        assert!(CorrelationContext::get().is_none());
        CorrelationContext::reset(token);
    }

    #[tokio::test]
    async fn test_nested_set_and_reset_unwind() {
        CorrelationContext::scope(id("outer"), async {
            let first = CorrelationContext::set(id("inner-1"));
            let second = CorrelationContext::set(id("inner-2"));
            assert_eq!(CorrelationContext::get(), Some(id("inner-2")));

            CorrelationContext::reset(second);
            assert_eq!(CorrelationContext::get(), Some(id("inner-1")));

            CorrelationContext::reset(first);
            assert_eq!(CorrelationContext::get(), Some(id("outer")));
        })
        .await;

        assert!(CorrelationContext::get().is_none());
    }

    #[tokio::test]
    async fn test_value_survives_await_points() {
        CorrelationContext::scope(id("flow-a"), async {
            tokio::task::yield_now().await;
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            assert_eq!(CorrelationContext::get(), Some(id("flow-a")));
        })
        .await;
    }

    #[tokio::test]
    async fn test_spawned_subtask_inherits_id() {
        let seen = CorrelationContext::scope(id("parent"), async {
            CorrelationContext::spawn(async { CorrelationContext::get() })
                .await
                .unwrap()
        })
        .await;
        assert_eq!(seen, Some(id("parent")));
    }

    #[tokio::test]
    async fn test_plain_spawn_does_not_leak() {
        let seen = CorrelationContext::scope(id("parent"), async {
            tokio::spawn(async { CorrelationContext::get() }).await.unwrap()
        })
        .await;
        assert!(seen.is_none());
    }
}
