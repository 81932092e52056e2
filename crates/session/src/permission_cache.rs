use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use tracker_api::AuthApi;
use tracker_auth::{Authorizer, PermissionCode, PermissionSet, RoleName};
use tracker_core::ApiResult;

/// Notified with the new grants after every change to the cache.
pub trait PermissionObserver: Send + Sync {
    fn permissions_changed(&self, permissions: &PermissionSet);
}

/// The caller's permission codes and role names.
///
/// Fail-closed: a failed fetch leaves zero codes, never stale ones.
pub struct PermissionCache {
    api: Arc<dyn AuthApi>,
    state: RwLock<PermissionSet>,
    /// Bumped by `clear`; loads that straddle a clear are dropped.
    epoch: AtomicU64,
    observers: Mutex<Vec<Weak<dyn PermissionObserver>>>,
}

impl std::fmt::Debug for PermissionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionCache")
            .field("state", &*self.state.read())
            .field("epoch", &self.epoch.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl PermissionCache {
    pub fn new(api: Arc<dyn AuthApi>) -> Self {
        Self {
            api,
            state: RwLock::new(PermissionSet::new()),
            epoch: AtomicU64::new(0),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Replace the codes with the server's current list.
    pub async fn load(&self) -> ApiResult<()> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let result = self.api.caller_permissions().await;

        if self.epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!("discarding permission load that raced a clear");
            return result.map(|_| ());
        }

        match result {
            Ok(codes) => {
                tracing::debug!(count = codes.len(), "permissions loaded");
                self.mutate(|set| set.replace_codes(codes));
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "permission load failed; no codes granted");
                self.mutate(PermissionSet::clear_codes);
                Err(err)
            }
        }
    }

    pub fn set_roles<I, R>(&self, roles: I)
    where
        I: IntoIterator<Item = R>,
        R: Into<RoleName>,
    {
        self.mutate(|set| set.replace_roles(roles));
    }

    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.mutate(PermissionSet::clear);
    }

    pub fn has(&self, code: &str) -> bool {
        self.state.read().has(code)
    }

    pub fn has_any<S: AsRef<str>>(&self, codes: &[S]) -> bool {
        self.state.read().has_any(codes)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.state.read().has_role(role)
    }

    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        self.state.read().has_any_role(roles)
    }

    pub fn snapshot(&self) -> PermissionSet {
        self.state.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }

    /// Register an observer. Dropped observers are pruned on the next change.
    pub fn subscribe(&self, observer: Weak<dyn PermissionObserver>) {
        self.observers.lock().push(observer);
    }

    fn mutate(&self, change: impl FnOnce(&mut PermissionSet)) {
        let snapshot = {
            let mut state = self.state.write();
            change(&mut state);
            state.clone()
        };

        let live: Vec<Arc<dyn PermissionObserver>> = {
            let mut observers = self.observers.lock();
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };

        // no locks held: observers may read the cache
        for observer in live {
            observer.permissions_changed(&snapshot);
        }
    }
}

impl Authorizer for PermissionCache {
    fn has(&self, code: &str) -> bool {
        PermissionCache::has(self, code)
    }

    fn has_role(&self, role: &str) -> bool {
        PermissionCache::has_role(self, role)
    }

    fn has_any(&self, codes: &[PermissionCode]) -> bool {
        PermissionCache::has_any(self, codes)
    }

    fn has_any_role(&self, roles: &[RoleName]) -> bool {
        PermissionCache::has_any_role(self, roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tracker_api::{Endpoint, InMemoryAuthApi, RemoteAccount, SessionHooks};
    use tracker_core::ApiError;

    struct Token(String);

    impl SessionHooks for Token {
        fn bearer_token(&self) -> Option<String> {
            Some(self.0.clone())
        }

        fn unauthenticated(&self) {}
    }

    fn signed_in_remote(codes: &[&'static str]) -> Arc<InMemoryAuthApi> {
        let remote = Arc::new(
            InMemoryAuthApi::new()
                .with_account(RemoteAccount::new(1, "dev").with_permissions(codes.iter().copied())),
        );
        let token = remote.issue_token(1u64);
        remote.attach(Arc::new(Token(token)));
        remote
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<PermissionSet>>);

    impl PermissionObserver for Recorder {
        fn permissions_changed(&self, permissions: &PermissionSet) {
            self.0.lock().push(permissions.clone());
        }
    }

    #[tokio::test]
    async fn load_replaces_codes() {
        let remote = signed_in_remote(&["task:read", "bug:read"]);
        let cache = PermissionCache::new(remote.clone());

        cache.load().await.unwrap();
        assert!(cache.has("task:read"));
        assert!(cache.has_any(&["nope", "bug:read"]));
        assert!(!cache.has("user:read"));

        remote.set_permissions(1u64, ["user:read"]);
        cache.load().await.unwrap();
        assert!(!cache.has("task:read"));
        assert!(cache.has("user:read"));
    }

    #[tokio::test]
    async fn failed_load_fails_closed() {
        let remote = signed_in_remote(&["task:read"]);
        let cache = PermissionCache::new(remote.clone());
        cache.load().await.unwrap();
        cache.set_roles(["developer"]);

        remote.fail(Endpoint::CallerPermissions, ApiError::Server);
        assert!(cache.load().await.is_err());

        assert!(!cache.has("task:read"));
        // roles come from the profile, not this endpoint
        assert!(cache.has_role("developer"));
    }

    #[tokio::test]
    async fn admin_role_grants_without_codes() {
        let cache = PermissionCache::new(signed_in_remote(&[]));
        cache.set_roles([RoleName::ADMIN]);

        assert!(cache.has("anything:at-all"));
        assert!(cache.has_any_role(&["admin"]));

        cache.set_roles(Vec::<RoleName>::new());
        assert!(!cache.has("anything:at-all"));
    }

    #[tokio::test]
    async fn observers_see_every_change_until_dropped() {
        let cache = PermissionCache::new(signed_in_remote(&["task:read"]));
        let recorder = Arc::new(Recorder::default());
        let weak: Weak<dyn PermissionObserver> = Arc::downgrade(&recorder) as Weak<dyn PermissionObserver>;
        cache.subscribe(weak);

        cache.load().await.unwrap();
        cache.set_roles(["qa"]);
        cache.clear();

        let seen = recorder.0.lock().clone();
        assert_eq!(seen.len(), 3);
        assert!(seen[0].has("task:read"));
        assert!(seen[1].has_role("qa"));
        assert!(seen[2].is_empty());

        drop(recorder);
        cache.set_roles(["qa"]);
        assert!(cache.observers.lock().is_empty());
    }
}
