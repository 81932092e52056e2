//! Scripted remote authority for tests and offline development.
//!
//! Behaves like the real server for the endpoints the session core uses:
//! issues opaque tokens, tracks login counts for the first-login flag,
//! enforces the password policy and can be told to fail any endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use tracker_auth::{PermissionCode, RoleName, validate_password_strength};
use tracker_core::{ApiError, ApiResult, UserId};

use crate::client::{AuthApi, SessionHooks, report_failure};
use crate::dto::{
    ChangePasswordRequest, InitPasswordRequest, InitResponse, InitStatus, LoginResponse,
    MessageResponse, OAuthLoginRequest, PasswordLoginRequest, QrTicket, UserProfile,
};
use crate::notice::{Notifier, TracingNotifier};

/// One remote endpoint, for call accounting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    CurrentUser,
    PasswordLogin,
    OAuthLogin,
    OAuthQrTicket,
    Logout,
    ChangePassword,
    CallerPermissions,
    InitStatus,
    Initialize,
    InitializeWithPassword,
}

/// A server-side account.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAccount {
    pub profile: UserProfile,
    pub permissions: Vec<PermissionCode>,
    pub login_count: u32,
    password: Option<String>,
}

impl RemoteAccount {
    pub fn new(id: u64, username: impl Into<String>) -> Self {
        Self {
            profile: UserProfile::new(id, username),
            permissions: Vec::new(),
            login_count: 0,
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RoleName>,
    {
        self.profile = self.profile.with_roles(roles);
        self
    }

    pub fn with_permissions<I, C>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<PermissionCode>,
    {
        self.permissions = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_login_count(mut self, count: u32) -> Self {
        self.login_count = count;
        self
    }

    pub fn id(&self) -> UserId {
        self.profile.id
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// Server rule: first login is the first password-backed sign-in.
    fn is_first_login(&self) -> bool {
        self.login_count == 1 && self.has_password()
    }

    fn profile_view(&self) -> UserProfile {
        UserProfile {
            is_first_login: Some(self.is_first_login()),
            ..self.profile.clone()
        }
    }
}

#[derive(Debug)]
struct RemoteState {
    initialized: bool,
    accounts: Vec<RemoteAccount>,
    oauth_codes: HashMap<String, UserId>,
    tokens: HashMap<String, UserId>,
    issued: u64,
    failures: HashMap<Endpoint, ApiError>,
    calls: Vec<Endpoint>,
}

impl RemoteState {
    fn account_mut(&mut self, id: UserId) -> ApiResult<&mut RemoteAccount> {
        self.accounts
            .iter_mut()
            .find(|a| a.id() == id)
            .ok_or(ApiError::Unauthenticated)
    }

    fn authenticate(&self, token: Option<&str>) -> ApiResult<UserId> {
        token
            .and_then(|t| self.tokens.get(t))
            .copied()
            .ok_or(ApiError::Unauthenticated)
    }

    fn issue_token(&mut self, user: UserId) -> String {
        self.issued += 1;
        let token = format!("token-{}", self.issued);
        self.tokens.insert(token.clone(), user);
        token
    }

    fn sign_in(&mut self, id: UserId) -> ApiResult<LoginResponse> {
        let account = self.account_mut(id)?;
        account.login_count += 1;
        let first = account.is_first_login();
        let user = account.profile_view();
        let token = self.issue_token(id);
        Ok(LoginResponse {
            token,
            user,
            is_first_login: Some(first),
        })
    }

    fn bootstrap(&mut self, account: RemoteAccount) -> ApiResult<InitResponse> {
        if self.initialized {
            return Err(ApiError::rejected(400, "system already initialized"));
        }
        let id = account.id();
        self.accounts.retain(|a| a.id() != id);
        self.accounts.push(account.with_roles([RoleName::ADMIN]));
        self.initialized = true;

        // setup is not a login; the admin's own password is not first-login
        let user = self.account_mut(id)?.profile_view();
        let token = self.issue_token(id);
        Ok(InitResponse {
            message: "system initialized".to_string(),
            token,
            user,
        })
    }

    fn next_user_id(&self) -> u64 {
        self.accounts.iter().map(|a| a.id().get()).max().unwrap_or(0) + 1
    }
}

pub struct InMemoryAuthApi {
    state: Mutex<RemoteState>,
    hooks: RwLock<Option<Arc<dyn SessionHooks>>>,
    notifier: RwLock<Arc<dyn Notifier>>,
}

impl std::fmt::Debug for InMemoryAuthApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAuthApi")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryAuthApi {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuthApi {
    /// An initialized system with no accounts.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RemoteState {
                initialized: true,
                accounts: Vec::new(),
                oauth_codes: HashMap::new(),
                tokens: HashMap::new(),
                issued: 0,
                failures: HashMap::new(),
                calls: Vec::new(),
            }),
            hooks: RwLock::new(None),
            notifier: RwLock::new(Arc::new(TracingNotifier)),
        }
    }

    pub fn with_account(self, account: RemoteAccount) -> Self {
        self.insert_account(account);
        self
    }

    pub fn insert_account(&self, account: RemoteAccount) {
        let mut state = self.state.lock();
        state.accounts.retain(|a| a.id() != account.id());
        state.accounts.push(account);
    }

    pub fn account(&self, id: impl Into<UserId>) -> Option<RemoteAccount> {
        let id = id.into();
        self.state.lock().accounts.iter().find(|a| a.id() == id).cloned()
    }

    pub fn set_permissions<I, C>(&self, id: impl Into<UserId>, codes: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<PermissionCode>,
    {
        let id = id.into();
        if let Ok(account) = self.state.lock().account_mut(id) {
            account.permissions = codes.into_iter().map(Into::into).collect();
        }
    }

    pub fn set_initialized(&self, initialized: bool) {
        self.state.lock().initialized = initialized;
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Make `code` exchangeable once for a session of `user`.
    pub fn register_oauth_code(&self, code: impl Into<String>, user: impl Into<UserId>) {
        self.state.lock().oauth_codes.insert(code.into(), user.into());
    }

    /// Mint a valid token out of band, e.g. to seed durable storage.
    pub fn issue_token(&self, user: impl Into<UserId>) -> String {
        self.state.lock().issue_token(user.into())
    }

    /// Invalidate every outstanding token, as a server-side sign-out would.
    pub fn revoke_all_tokens(&self) {
        self.state.lock().tokens.clear();
    }

    pub fn live_tokens(&self) -> usize {
        self.state.lock().tokens.len()
    }

    /// Fail every call to `endpoint` with `err` until [`Self::recover`].
    pub fn fail(&self, endpoint: Endpoint, err: ApiError) {
        self.state.lock().failures.insert(endpoint, err);
    }

    pub fn recover(&self, endpoint: Endpoint) {
        self.state.lock().failures.remove(&endpoint);
    }

    pub fn calls(&self) -> Vec<Endpoint> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, endpoint: Endpoint) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == endpoint).count()
    }

    /// Connect the request layer to a session. Until then requests carry no
    /// token.
    pub fn attach(&self, hooks: Arc<dyn SessionHooks>) {
        *self.hooks.write() = Some(hooks);
    }

    pub fn set_notifier(&self, notifier: Arc<dyn Notifier>) {
        *self.notifier.write() = notifier;
    }

    fn respond<T>(
        &self,
        endpoint: Endpoint,
        handler: impl FnOnce(&mut RemoteState, Option<&str>) -> ApiResult<T>,
    ) -> ApiResult<T> {
        let hooks = self.hooks.read().clone();
        let token = hooks.as_ref().and_then(|h| h.bearer_token());

        // lock released before hooks run; they re-enter session state
        let result = {
            let mut state = self.state.lock();
            state.calls.push(endpoint);
            match state.failures.get(&endpoint).cloned() {
                Some(err) => Err(err),
                None => handler(&mut state, token.as_deref()),
            }
        };

        if let Err(err) = &result {
            let notifier = self.notifier.read().clone();
            report_failure(err, hooks.as_deref(), notifier.as_ref());
        }
        result
    }
}

#[async_trait(?Send)]
impl AuthApi for InMemoryAuthApi {
    async fn current_user(&self) -> ApiResult<UserProfile> {
        self.respond(Endpoint::CurrentUser, |state, token| {
            let id = state.authenticate(token)?;
            Ok(state.account_mut(id)?.profile_view())
        })
    }

    async fn password_login(&self, request: &PasswordLoginRequest) -> ApiResult<LoginResponse> {
        self.respond(Endpoint::PasswordLogin, |state, _| {
            let id = state
                .accounts
                .iter()
                .find(|a| {
                    a.profile.username == request.username
                        && a.password.as_deref() == Some(request.password.as_str())
                })
                .map(RemoteAccount::id)
                .ok_or_else(|| ApiError::rejected(401, "invalid username or password"))?;
            state.sign_in(id)
        })
    }

    async fn oauth_login(&self, request: &OAuthLoginRequest) -> ApiResult<LoginResponse> {
        self.respond(Endpoint::OAuthLogin, |state, _| {
            let id = state
                .oauth_codes
                .remove(&request.code)
                .ok_or_else(|| ApiError::rejected(400, "invalid authorization code"))?;
            state.sign_in(id)
        })
    }

    async fn oauth_qr_ticket(&self) -> ApiResult<QrTicket> {
        self.respond(Endpoint::OAuthQrTicket, |state, _| {
            state.issued += 1;
            let ticket = format!("qr-{}", state.issued);
            let url = format!("https://open.weixin.qq.com/connect/qrconnect?state={ticket}");
            Ok(QrTicket::new(ticket, url, crate::dto::DEFAULT_QR_EXPIRY_SECS))
        })
    }

    async fn logout(&self) -> ApiResult<()> {
        self.respond(Endpoint::Logout, |state, token| {
            state.authenticate(token)?;
            if let Some(token) = token {
                state.tokens.remove(token);
            }
            Ok(())
        })
    }

    async fn change_password(&self, request: &ChangePasswordRequest) -> ApiResult<MessageResponse> {
        self.respond(Endpoint::ChangePassword, |state, token| {
            let id = state.authenticate(token)?;
            let account = state.account_mut(id)?;

            if let Some(current) = &account.password {
                if request.old_password.as_deref() != Some(current.as_str()) {
                    return Err(ApiError::rejected(400, "old password is incorrect"));
                }
            }
            validate_password_strength(&request.new_password)
                .map_err(|e| ApiError::rejected(400, e.to_string()))?;

            account.password = Some(request.new_password.clone());
            if account.login_count == 1 {
                account.login_count = 2;
            }
            Ok(MessageResponse {
                message: "password changed".to_string(),
            })
        })
    }

    async fn caller_permissions(&self) -> ApiResult<Vec<PermissionCode>> {
        self.respond(Endpoint::CallerPermissions, |state, token| {
            let id = state.authenticate(token)?;
            Ok(state.account_mut(id)?.permissions.clone())
        })
    }

    async fn init_status(&self) -> ApiResult<InitStatus> {
        self.respond(Endpoint::InitStatus, |state, _| {
            Ok(InitStatus {
                initialized: state.initialized,
            })
        })
    }

    async fn initialize(&self, request: &OAuthLoginRequest) -> ApiResult<InitResponse> {
        self.respond(Endpoint::Initialize, |state, _| {
            if state.initialized {
                return Err(ApiError::rejected(400, "system already initialized"));
            }
            let id = state
                .oauth_codes
                .remove(&request.code)
                .ok_or_else(|| ApiError::rejected(400, "invalid authorization code"))?;
            let account = state
                .accounts
                .iter()
                .find(|a| a.id() == id)
                .cloned()
                .unwrap_or_else(|| RemoteAccount::new(id.get(), format!("wechat_{id}")));
            state.bootstrap(account)
        })
    }

    async fn initialize_with_password(&self, request: &InitPasswordRequest) -> ApiResult<InitResponse> {
        self.respond(Endpoint::InitializeWithPassword, |state, _| {
            validate_password_strength(&request.password)
                .map_err(|e| ApiError::rejected(400, e.to_string()))?;

            let mut account = RemoteAccount::new(state.next_user_id(), request.username.clone())
                .with_password(request.password.clone());
            account.profile.nickname = request.nickname.clone();
            state.bootstrap(account)
        })
    }
}
