use std::borrow::{Borrow, Cow};

use serde::{Deserialize, Serialize};

/// Permission code, e.g. `"project:read"`.
///
/// Codes are opaque strings issued by the server; the client never parses
/// them, it only tests membership.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionCode(Cow<'static, str>);

impl PermissionCode {
    pub const fn from_static(code: &'static str) -> Self {
        Self(Cow::Borrowed(code))
    }

    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PermissionCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PermissionCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for PermissionCode {
    fn from(code: &'static str) -> Self {
        Self::from_static(code)
    }
}

impl From<String> for PermissionCode {
    fn from(code: String) -> Self {
        Self(Cow::Owned(code))
    }
}

impl core::fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
