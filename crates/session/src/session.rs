use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use tracker_api::{
    AuthApi, ChangePasswordRequest, ClientConfig, HttpAuthApi, InitPasswordRequest, Notice, Notifier,
    OAuthLoginRequest, PasswordLoginRequest, QrTicket, UserProfile,
};
use tracker_auth::{MenuItem, default_menu, filter_menu, validate_password_strength};
use tracker_core::{ApiError, Subscription, UserId};

use crate::credential::CredentialStore;
use crate::error::SessionError;
use crate::events::SessionEvent;
use crate::guard::NavigationGuard;
use crate::identity::IdentityStore;
use crate::link::SessionLink;
use crate::navigator::{NavigationOutcome, Navigator};
use crate::permission_cache::PermissionCache;
use crate::storage::TokenStorage;

/// Result of a successful sign-in or system initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoginOutcome {
    pub user_id: UserId,
    /// The next navigation will be sent to the password page.
    pub must_change_password: bool,
}

/// The wired-up session: stores, remote API and the sign-in flows.
pub struct Session {
    api: Arc<dyn AuthApi>,
    link: Arc<SessionLink>,
    permissions: Arc<PermissionCache>,
    identity: Arc<IdentityStore>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<Navigator>,
    /// Private feed used to notice a 401 after the fact.
    expiries: Mutex<Subscription<SessionEvent>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("credentials", self.credentials())
            .field("identity", &self.identity)
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Wire the stores around `api`. The API must already report to `link`.
    pub fn new(api: Arc<dyn AuthApi>, link: Arc<SessionLink>, notifier: Arc<dyn Notifier>) -> Self {
        let permissions = Arc::new(PermissionCache::new(api.clone()));
        let identity = Arc::new(IdentityStore::new(
            api.clone(),
            link.credentials().clone(),
            permissions.clone(),
        ));
        link.bind(&identity);

        let navigator = Arc::new(Navigator::new(NavigationGuard::standard(
            api.clone(),
            link.credentials().clone(),
            identity.clone(),
        )));
        let expiries = Mutex::new(link.subscribe());

        Self {
            api,
            link,
            permissions,
            identity,
            notifier,
            navigator,
            expiries,
        }
    }

    /// Restore the persisted token and talk to the server over HTTP.
    pub fn connect(
        config: ClientConfig,
        storage: Arc<dyn TokenStorage>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, SessionError> {
        let credentials = Arc::new(CredentialStore::open(storage)?);
        let link = SessionLink::new(credentials);
        let api = Arc::new(HttpAuthApi::new(config, link.clone(), notifier.clone())?);

        tracing::info!(base_url = %api.config().base_url, "session connected");
        Ok(Self::new(api, link, notifier))
    }

    pub fn api(&self) -> &Arc<dyn AuthApi> {
        &self.api
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        self.link.credentials()
    }

    pub fn identity(&self) -> &Arc<IdentityStore> {
        &self.identity
    }

    pub fn permissions(&self) -> &Arc<PermissionCache> {
        &self.permissions
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials().is_authenticated()
    }

    /// The session's single navigator, running the standard guard.
    pub fn navigator(&self) -> &Arc<Navigator> {
        &self.navigator
    }

    /// Send the user to Login if the server expired the session while they
    /// were on a protected page. The intended path rides along as `redirect`.
    ///
    /// The session's own requests call this on a 401; call it after any
    /// other request made through the same API client.
    pub async fn follow_expiry(&self) -> Option<NavigationOutcome> {
        let expired = self.expiries.lock().drain().contains(&SessionEvent::Expired);
        if !expired || self.is_authenticated() {
            return None;
        }

        // the guard already redirected when the 401 came from a navigation
        let on_protected_page = self.navigator.current().is_some_and(|t| t.requires_auth());
        if !on_protected_page {
            return None;
        }
        Some(self.navigator.redirect_to_login().await)
    }

    async fn settle<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(err) = &result {
            if err.is_unauthenticated() {
                self.follow_expiry().await;
            }
        }
        result
    }

    /// Refetch the caller's permission codes.
    pub async fn reload_permissions(&self) -> Result<(), SessionError> {
        let result = self.permissions.load().await;
        Ok(self.settle(result).await?)
    }

    pub fn events(&self) -> Subscription<SessionEvent> {
        self.link.subscribe()
    }

    /// The built-in menu, reduced to what the caller may see.
    pub fn menu(&self) -> Vec<MenuItem> {
        filter_menu(&default_menu(), &self.permissions.snapshot())
    }

    pub async fn login_with_password(&self, username: &str, password: &str) -> Result<LoginOutcome, SessionError> {
        let response = self
            .api
            .password_login(&PasswordLoginRequest::new(username, password))
            .await?;
        let first_login = response.first_login();
        self.start(response.token, response.user, first_login).await
    }

    /// Ticket for the scan-to-sign-in page.
    pub async fn qr_ticket(&self) -> Result<QrTicket, SessionError> {
        let result = self.api.oauth_qr_ticket().await;
        Ok(self.settle(result).await?)
    }

    /// Exchange an authorization code from the OAuth callback for a session.
    pub async fn login_with_oauth(&self, code: &str, state: Option<&str>) -> Result<LoginOutcome, SessionError> {
        let response = self
            .api
            .oauth_login(&OAuthLoginRequest::new(code, state.map(str::to_string)))
            .await?;
        let first_login = response.first_login();
        self.start(response.token, response.user, first_login).await
    }

    /// First-run setup with an OAuth identity; signs the new admin in.
    pub async fn initialize(&self, code: &str, state: Option<&str>) -> Result<LoginOutcome, SessionError> {
        let response = self
            .api
            .initialize(&OAuthLoginRequest::new(code, state.map(str::to_string)))
            .await?;
        let first_login = response.user.is_first_login.unwrap_or(false);
        self.start(response.token, response.user, first_login).await
    }

    /// First-run setup with a local admin account.
    pub async fn initialize_with_password(
        &self,
        username: &str,
        password: &str,
        nickname: Option<&str>,
    ) -> Result<LoginOutcome, SessionError> {
        validate_password_strength(password)?;

        let response = self
            .api
            .initialize_with_password(&InitPasswordRequest {
                username: username.to_string(),
                password: password.to_string(),
                nickname: nickname.map(str::to_string),
            })
            .await?;
        let first_login = response.user.is_first_login.unwrap_or(false);
        self.start(response.token, response.user, first_login).await
    }

    async fn start(&self, token: String, user: UserProfile, first_login: bool) -> Result<LoginOutcome, SessionError> {
        let user_id = user.id;
        self.identity.establish(token, user, first_login).await?;

        tracing::info!(user_id = %user_id, "signed in");
        self.link.publish(SessionEvent::LoggedIn { user_id });

        Ok(LoginOutcome {
            user_id,
            must_change_password: self.identity.must_change_password(),
        })
    }

    /// Change the caller's password. `old_password` is `None` for accounts that
    /// never had one.
    pub async fn change_password(&self, old_password: Option<&str>, new_password: &str) -> Result<(), SessionError> {
        validate_password_strength(new_password)?;

        let result = self
            .api
            .change_password(&ChangePasswordRequest {
                old_password: old_password.map(str::to_string),
                new_password: new_password.to_string(),
            })
            .await;
        let response = self.settle(result).await?;

        self.identity.clear_must_change_password();
        self.link.publish(SessionEvent::PasswordChanged);

        let message = if response.message.is_empty() {
            "Password changed".to_string()
        } else {
            response.message
        };
        self.notifier.notify(Notice::info(message));
        Ok(())
    }

    /// Sign out remotely (best effort) and clear all local state.
    pub async fn logout(&self) {
        self.identity.logout().await;
        tracing::info!("signed out");
        self.link.publish(SessionEvent::LoggedOut);
    }
}
