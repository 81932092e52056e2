use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;

use tracker_api::{AuthApi, UserProfile};
use tracker_auth::RoleName;
use tracker_core::UserId;

use crate::credential::CredentialStore;
use crate::error::SessionError;
use crate::permission_cache::PermissionCache;

/// The signed-in user as the client sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    /// Role names only; richer role objects stay in `profile`.
    pub roles: BTreeSet<RoleName>,
    pub profile: UserProfile,
}

impl Identity {
    pub fn from_profile(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            username: profile.username.clone(),
            roles: profile.role_names().cloned().collect(),
            profile,
        }
    }
}

/// What [`IdentityStore::hydrate`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hydration {
    /// No token; nothing to fetch.
    Skipped,
    Loaded,
    /// A login or logout happened while the profile was in flight; the result
    /// was dropped.
    Superseded,
}

#[derive(Debug, Default)]
struct IdentityState {
    identity: Option<Identity>,
    /// First value seen in this session wins until explicitly cleared.
    must_change_password: Option<bool>,
}

pub struct IdentityStore {
    api: Arc<dyn AuthApi>,
    credentials: Arc<CredentialStore>,
    permissions: Arc<PermissionCache>,
    state: RwLock<IdentityState>,
}

impl std::fmt::Debug for IdentityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityStore")
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

impl IdentityStore {
    pub fn new(
        api: Arc<dyn AuthApi>,
        credentials: Arc<CredentialStore>,
        permissions: Arc<PermissionCache>,
    ) -> Self {
        Self {
            api,
            credentials,
            permissions,
            state: RwLock::new(IdentityState::default()),
        }
    }

    /// Adopt `profile`, pushing its roles into the permission cache first.
    pub fn set_identity(&self, profile: UserProfile) {
        self.apply(profile, None);
    }

    fn apply(&self, profile: UserProfile, first_login: Option<bool>) {
        let identity = Identity::from_profile(profile);
        self.permissions.set_roles(identity.roles.iter().cloned());

        let flag = first_login
            .or(identity.profile.is_first_login)
            .unwrap_or(false);

        let mut state = self.state.write();
        state.must_change_password.get_or_insert(flag);
        state.identity = Some(identity);
    }

    /// Fetch the profile for the stored token, then the permissions.
    ///
    /// On failure the session is dropped locally, unless a newer login or
    /// logout already replaced it.
    pub async fn hydrate(&self) -> Result<Hydration, SessionError> {
        if !self.credentials.is_authenticated() {
            return Ok(Hydration::Skipped);
        }
        let generation = self.credentials.generation();

        match self.api.current_user().await {
            Ok(profile) => {
                if self.credentials.generation() != generation {
                    tracing::debug!("profile arrived for a replaced session; dropped");
                    return Ok(Hydration::Superseded);
                }
                tracing::debug!(user_id = %profile.id, "identity hydrated");
                self.set_identity(profile);

                // failures already leave zero codes
                let _ = self.permissions.load().await;

                // a 401 on the permission fetch resets the session underneath us
                if self.credentials.generation() != generation || self.is_empty() {
                    tracing::debug!("session replaced while permissions loaded");
                    return Ok(Hydration::Superseded);
                }
                Ok(Hydration::Loaded)
            }
            Err(err) => {
                if self.credentials.generation() == generation {
                    tracing::warn!(error = %err, "hydration failed; signing out locally");
                    self.reset();
                }
                Err(err.into())
            }
        }
    }

    /// Tell the server (best effort), then clear everything locally.
    pub async fn logout(&self) {
        if self.credentials.is_authenticated() {
            if let Err(err) = self.api.logout().await {
                tracing::warn!(error = %err, "remote logout failed; clearing local session anyway");
            }
        }
        self.reset();
    }

    /// Clear token, identity and permissions without a server round trip.
    pub fn reset(&self) {
        if let Err(err) = self.credentials.clear() {
            tracing::error!(error = %err, "token could not be removed from storage");
        }
        *self.state.write() = IdentityState::default();
        self.permissions.clear();
    }

    /// Start a fresh session from a login or initialisation response.
    pub async fn establish(
        &self,
        token: String,
        profile: UserProfile,
        first_login: bool,
    ) -> Result<(), SessionError> {
        self.reset();
        self.credentials.set_token(token)?;
        self.apply(profile, Some(first_login));

        let _ = self.permissions.load().await;
        Ok(())
    }

    pub fn clear_must_change_password(&self) {
        self.state.write().must_change_password = Some(false);
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.read().identity.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().identity.is_none()
    }

    pub fn must_change_password(&self) -> bool {
        self.state.read().must_change_password.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tracker_api::{Endpoint, InMemoryAuthApi, RemoteAccount};
    use tracker_core::ApiError;

    use crate::link::SessionLink;
    use crate::storage::MemoryTokenStorage;

    struct Fixture {
        remote: Arc<InMemoryAuthApi>,
        storage: Arc<MemoryTokenStorage>,
        credentials: Arc<CredentialStore>,
        permissions: Arc<PermissionCache>,
        identity: Arc<IdentityStore>,
    }

    fn fixture(remote: InMemoryAuthApi, stored: Option<String>) -> Fixture {
        let remote = Arc::new(remote);
        let storage = Arc::new(match stored {
            Some(t) => MemoryTokenStorage::with_token(t),
            None => MemoryTokenStorage::new(),
        });
        let credentials = Arc::new(CredentialStore::open(storage.clone()).unwrap());
        let link = SessionLink::new(credentials.clone());
        remote.attach(link.clone());

        let permissions = Arc::new(PermissionCache::new(remote.clone()));
        let identity = Arc::new(IdentityStore::new(remote.clone(), credentials.clone(), permissions.clone()));
        link.bind(&identity);

        Fixture {
            remote,
            storage,
            credentials,
            permissions,
            identity,
        }
    }

    fn dev() -> RemoteAccount {
        RemoteAccount::new(5, "dev")
            .with_password("Secret1")
            .with_roles(["developer"])
            .with_permissions(["task:read"])
            .with_login_count(3)
    }

    #[tokio::test]
    async fn hydrate_without_token_is_a_no_op() {
        let f = fixture(InMemoryAuthApi::new().with_account(dev()), None);

        assert_eq!(f.identity.hydrate().await.unwrap(), Hydration::Skipped);
        assert!(f.remote.calls().is_empty());
    }

    #[tokio::test]
    async fn hydrate_loads_identity_then_permissions() {
        let remote = InMemoryAuthApi::new().with_account(dev());
        let token = remote.issue_token(5u64);
        let f = fixture(remote, Some(token));

        assert_eq!(f.identity.hydrate().await.unwrap(), Hydration::Loaded);

        let identity = f.identity.identity().unwrap();
        assert_eq!(identity.username, "dev");
        assert!(identity.roles.contains("developer"));
        assert!(f.permissions.has_role("developer"));
        assert!(f.permissions.has("task:read"));
        assert!(!f.identity.must_change_password());
        assert_eq!(f.remote.calls(), vec![Endpoint::CurrentUser, Endpoint::CallerPermissions]);
    }

    #[tokio::test]
    async fn failed_hydration_signs_out_locally() {
        let f = fixture(InMemoryAuthApi::new().with_account(dev()), Some("revoked".into()));

        let err = f.identity.hydrate().await.unwrap_err();
        assert_eq!(err.api(), Some(&ApiError::Unauthenticated));

        assert!(!f.credentials.is_authenticated());
        assert_eq!(f.storage.peek(), None);
        assert!(f.identity.is_empty());
        assert!(f.permissions.is_empty());
    }

    #[tokio::test]
    async fn network_failure_during_hydration_also_resets() {
        let remote = InMemoryAuthApi::new().with_account(dev());
        let token = remote.issue_token(5u64);
        remote.fail(Endpoint::CurrentUser, ApiError::network("offline"));
        let f = fixture(remote, Some(token));

        assert!(f.identity.hydrate().await.is_err());
        assert!(!f.credentials.is_authenticated());
        // no remote logout for a failed hydration
        assert_eq!(f.remote.call_count(Endpoint::Logout), 0);
    }

    #[tokio::test]
    async fn expiry_during_the_permission_load_is_not_a_success() {
        let remote = InMemoryAuthApi::new().with_account(dev());
        let token = remote.issue_token(5u64);
        remote.fail(Endpoint::CallerPermissions, ApiError::Unauthenticated);
        let f = fixture(remote, Some(token));

        assert_eq!(f.identity.hydrate().await.unwrap(), Hydration::Superseded);
        assert!(!f.credentials.is_authenticated());
        assert!(f.identity.is_empty());
        assert_eq!(f.storage.peek(), None);
    }

    #[tokio::test]
    async fn must_change_password_is_sticky_within_a_session() {
        let f = fixture(InMemoryAuthApi::new().with_account(dev()), None);

        let token = f.remote.issue_token(5u64);
        f.identity
            .establish(token, UserProfile::new(5u64, "dev"), true)
            .await
            .unwrap();
        assert!(f.identity.must_change_password());

        // a later profile saying otherwise does not lower it
        let mut profile = UserProfile::new(5u64, "dev");
        profile.is_first_login = Some(false);
        f.identity.set_identity(profile.clone());
        assert!(f.identity.must_change_password());

        f.identity.clear_must_change_password();
        profile.is_first_login = Some(true);
        f.identity.set_identity(profile);
        assert!(!f.identity.must_change_password());

        f.identity.reset();
        assert!(!f.identity.must_change_password());
    }

    #[tokio::test]
    async fn logout_clears_everything_even_when_the_server_fails() {
        let remote = InMemoryAuthApi::new().with_account(dev());
        let token = remote.issue_token(5u64);
        remote.fail(Endpoint::Logout, ApiError::Server);
        let f = fixture(remote, Some(token));
        f.identity.hydrate().await.unwrap();

        f.identity.logout().await;

        assert!(!f.credentials.is_authenticated());
        assert!(f.identity.is_empty());
        assert!(f.permissions.is_empty());
        assert_eq!(f.storage.peek(), None);
        assert_eq!(f.remote.call_count(Endpoint::Logout), 1);
    }

    #[tokio::test]
    async fn logout_without_token_skips_the_server() {
        let f = fixture(InMemoryAuthApi::new(), None);
        f.identity.logout().await;
        assert_eq!(f.remote.call_count(Endpoint::Logout), 0);
    }
}
