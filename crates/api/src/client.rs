use async_trait::async_trait;

use tracker_core::{ApiError, ApiResult};

use crate::dto::{
    ChangePasswordRequest, InitPasswordRequest, InitResponse, InitStatus, LoginResponse,
    MessageResponse, OAuthLoginRequest, PasswordLoginRequest, QrTicket, UserProfile,
};
use crate::notice::{Notice, Notifier};
use tracker_auth::PermissionCode;

/// Endpoints the session core consumes.
///
/// Futures are not required to be `Send` so the same trait can be backed by
/// the browser's fetch on `wasm32`.
#[async_trait(?Send)]
pub trait AuthApi: Send + Sync {
    /// `GET /auth/user/info`
    async fn current_user(&self) -> ApiResult<UserProfile>;

    /// `POST /auth/login`
    async fn password_login(&self, request: &PasswordLoginRequest) -> ApiResult<LoginResponse>;

    /// `POST /auth/wechat/login`
    async fn oauth_login(&self, request: &OAuthLoginRequest) -> ApiResult<LoginResponse>;

    /// `GET /auth/wechat/qrcode`
    async fn oauth_qr_ticket(&self) -> ApiResult<QrTicket>;

    /// `POST /auth/logout`
    async fn logout(&self) -> ApiResult<()>;

    /// `POST /auth/change-password`
    async fn change_password(&self, request: &ChangePasswordRequest) -> ApiResult<MessageResponse>;

    /// `GET /permissions/me`
    async fn caller_permissions(&self) -> ApiResult<Vec<PermissionCode>>;

    /// `GET /init/status`
    async fn init_status(&self) -> ApiResult<InitStatus>;

    /// `POST /init`
    async fn initialize(&self, request: &OAuthLoginRequest) -> ApiResult<InitResponse>;

    /// `POST /init/password`
    async fn initialize_with_password(&self, request: &InitPasswordRequest) -> ApiResult<InitResponse>;
}

/// Callbacks from the request layer into session state.
pub trait SessionHooks: Send + Sync {
    /// Token to send as `Authorization: Bearer ..`, if any.
    fn bearer_token(&self) -> Option<String>;

    /// The server rejected the token. Drop the session locally.
    fn unauthenticated(&self);
}

/// Shared failure side effects of every request.
pub fn report_failure(err: &ApiError, hooks: Option<&dyn SessionHooks>, notifier: &dyn Notifier) {
    notifier.notify(Notice::from_error(err));

    if err.is_unauthenticated() {
        if let Some(hooks) = hooks {
            hooks.unauthenticated();
        }
    }
}
