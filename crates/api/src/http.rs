use std::sync::Arc;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde_json::Value;

use tracker_auth::PermissionCode;
use tracker_core::{ApiError, ApiResult, decode_payload};

use crate::client::{AuthApi, SessionHooks, report_failure};
use crate::config::ClientConfig;
use crate::dto::{
    ChangePasswordRequest, InitPasswordRequest, InitResponse, InitStatus, LoginResponse,
    MessageResponse, OAuthLoginRequest, PasswordLoginRequest, PermissionList, QrTicket, UserProfile,
};
use crate::notice::Notifier;
use crate::response::classify_response;

/// [`AuthApi`] over HTTP.
///
/// Every request carries the session's bearer token, if there is one. Every
/// failure is reported through [`report_failure`] before it is returned.
pub struct HttpAuthApi {
    http: reqwest::Client,
    config: ClientConfig,
    hooks: Arc<dyn SessionHooks>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for HttpAuthApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAuthApi")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HttpAuthApi {
    pub fn new(
        config: ClientConfig,
        hooks: Arc<dyn SessionHooks>,
        notifier: Arc<dyn Notifier>,
    ) -> ApiResult<Self> {
        let builder = reqwest::Client::builder();

        // fetch has no client-side timeout knob
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(config.timeout);

        let http = builder
            .build()
            .map_err(|e| ApiError::network(format!("failed to build http client: {e}")))?;

        Ok(Self {
            http,
            config,
            hooks,
            notifier,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(self.config.endpoint(path))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(self.config.endpoint(path))
    }

    async fn round_trip(&self, request: RequestBuilder) -> ApiResult<Value> {
        let request = match self.hooks.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;

        classify_response(status, &body)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let result = self.round_trip(request).await.and_then(decode_payload::<T>);

        if let Err(err) = &result {
            tracing::debug!(error = %err, "request failed");
            report_failure(err, Some(self.hooks.as_ref()), self.notifier.as_ref());
        }
        result
    }
}

#[async_trait(?Send)]
impl AuthApi for HttpAuthApi {
    async fn current_user(&self) -> ApiResult<UserProfile> {
        self.execute(self.get("/auth/user/info")).await
    }

    async fn password_login(&self, request: &PasswordLoginRequest) -> ApiResult<LoginResponse> {
        self.execute(self.post("/auth/login").json(request)).await
    }

    async fn oauth_login(&self, request: &OAuthLoginRequest) -> ApiResult<LoginResponse> {
        self.execute(self.post("/auth/wechat/login").json(request)).await
    }

    async fn oauth_qr_ticket(&self) -> ApiResult<QrTicket> {
        self.execute(self.get("/auth/wechat/qrcode")).await
    }

    async fn logout(&self) -> ApiResult<()> {
        self.execute::<Value>(self.post("/auth/logout")).await.map(|_| ())
    }

    async fn change_password(&self, request: &ChangePasswordRequest) -> ApiResult<MessageResponse> {
        self.execute::<Option<MessageResponse>>(self.post("/auth/change-password").json(request))
            .await
            .map(Option::unwrap_or_default)
    }

    async fn caller_permissions(&self) -> ApiResult<Vec<PermissionCode>> {
        self.execute::<PermissionList>(self.get("/permissions/me"))
            .await
            .map(|list| list.0)
    }

    async fn init_status(&self) -> ApiResult<InitStatus> {
        self.execute(self.get("/init/status")).await
    }

    async fn initialize(&self, request: &OAuthLoginRequest) -> ApiResult<InitResponse> {
        self.execute(self.post("/init").json(request)).await
    }

    async fn initialize_with_password(&self, request: &InitPasswordRequest) -> ApiResult<InitResponse> {
        self.execute(self.post("/init/password").json(request)).await
    }
}
