use std::borrow::{Borrow, Cow};

use serde::{Deserialize, Serialize};

/// Role name as carried on the user profile.
///
/// Only [`RoleName::ADMIN`] has meaning to the client: it bypasses every
/// permission check.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(Cow<'static, str>);

impl RoleName {
    pub const ADMIN: RoleName = RoleName(Cow::Borrowed("admin"));

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        self.as_str() == Self::ADMIN.as_str()
    }
}

impl AsRef<str> for RoleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RoleName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for RoleName {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for RoleName {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_is_matched_by_name() {
        assert!(RoleName::new(String::from("admin")).is_admin());
        assert!(!RoleName::from("Admin").is_admin());
        assert!(!RoleName::from("developer").is_admin());
    }
}
