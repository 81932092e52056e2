//! Wire shapes of the consumed endpoints.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use tracker_auth::{PermissionCode, RoleName};
use tracker_core::UserId;

/// QR tickets without an explicit lifetime live this long.
pub const DEFAULT_QR_EXPIRY_SECS: u64 = 600;

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A role as the profile endpoint reports it: a bare name or a richer object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleRef {
    Name(RoleName),
    Detailed(RoleDetail),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDetail {
    pub code: RoleName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RoleRef {
    /// The name used for authorization.
    pub fn role_name(&self) -> &RoleName {
        match self {
            Self::Name(name) => name,
            Self::Detailed(detail) => &detail.code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wechat_open_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub roles: Vec<RoleRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_first_login: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Value>,
}

impl UserProfile {
    pub fn new(id: impl Into<UserId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            nickname: None,
            email: None,
            avatar: None,
            phone: None,
            wechat_open_id: None,
            roles: Vec::new(),
            is_first_login: None,
            department: None,
        }
    }

    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RoleName>,
    {
        self.roles = roles.into_iter().map(|r| RoleRef::Name(r.into())).collect();
        self
    }

    pub fn role_names(&self) -> impl Iterator<Item = &RoleName> {
        self.roles.iter().map(RoleRef::role_name)
    }

    /// Nickname when set, username otherwise.
    pub fn display_name(&self) -> &str {
        self.nickname
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_first_login: Option<bool>,
}

impl LoginResponse {
    /// Response flag, falling back to the profile's own flag.
    pub fn first_login(&self) -> bool {
        self.is_first_login
            .or(self.user.is_first_login)
            .unwrap_or(false)
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordLoginRequest {
    pub username: String,
    pub password: String,
}

impl PasswordLoginRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for PasswordLoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordLoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Authorization code handed back by the OAuth provider's redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthLoginRequest {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl OAuthLoginRequest {
    pub fn new(code: impl Into<String>, state: Option<String>) -> Self {
        Self {
            code: code.into(),
            state,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawQrTicket {
    #[serde(default)]
    ticket: Option<String>,
    #[serde(default)]
    qr_code_url: Option<String>,
    #[serde(default)]
    auth_url: Option<String>,
    #[serde(default)]
    expire_seconds: Option<u64>,
}

/// A scannable login ticket.
///
/// Either URL falls back to the other and a missing or zero lifetime becomes
/// [`DEFAULT_QR_EXPIRY_SECS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawQrTicket")]
pub struct QrTicket {
    pub ticket: String,
    pub qr_code_url: String,
    pub auth_url: String,
    pub expire_seconds: u64,
    /// When this client received the ticket.
    #[serde(skip)]
    pub received_at: DateTime<Utc>,
}

impl From<RawQrTicket> for QrTicket {
    fn from(raw: RawQrTicket) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        let qr = non_empty(raw.qr_code_url);
        let auth = non_empty(raw.auth_url);

        Self {
            ticket: raw.ticket.unwrap_or_default(),
            qr_code_url: qr.clone().or_else(|| auth.clone()).unwrap_or_default(),
            auth_url: auth.or(qr).unwrap_or_default(),
            expire_seconds: raw
                .expire_seconds
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_QR_EXPIRY_SECS),
            received_at: Utc::now(),
        }
    }
}

impl QrTicket {
    pub fn new(ticket: impl Into<String>, url: impl Into<String>, expire_seconds: u64) -> Self {
        let url = url.into();
        Self {
            ticket: ticket.into(),
            qr_code_url: url.clone(),
            auth_url: url,
            expire_seconds,
            received_at: Utc::now(),
        }
    }

    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        i64::try_from(self.expire_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at(self.received_at)
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    /// Absent for accounts that never had a password (OAuth sign-up).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_password: Option<String>,
    pub new_password: String,
}

impl std::fmt::Debug for ChangePasswordRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangePasswordRequest")
            .field("old_password", &self.old_password.as_ref().map(|_| "<redacted>"))
            .field("new_password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitStatus {
    pub initialized: bool,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitPasswordRequest {
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

impl std::fmt::Debug for InitPasswordRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitPasswordRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("nickname", &self.nickname)
            .finish()
    }
}

/// Result of bootstrapping the system: the first admin is signed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitResponse {
    #[serde(default)]
    pub message: String,
    pub token: String,
    pub user: UserProfile,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PermissionEntry {
    Code(PermissionCode),
    Detailed { code: PermissionCode },
}

/// Body of `GET /permissions/me`: codes as strings or `{code, ..}` objects,
/// `null` meaning none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Option<Vec<PermissionEntry>>")]
pub struct PermissionList(pub Vec<PermissionCode>);

impl From<Option<Vec<PermissionEntry>>> for PermissionList {
    fn from(entries: Option<Vec<PermissionEntry>>) -> Self {
        Self(
            entries
                .unwrap_or_default()
                .into_iter()
                .map(|e| match e {
                    PermissionEntry::Code(code) | PermissionEntry::Detailed { code } => code,
                })
                .collect(),
        )
    }
}
