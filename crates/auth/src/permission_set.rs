use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{PermissionCode, RoleName};

/// The caller's effective grants: permission codes plus role names.
///
/// Both halves are replaced wholesale, never merged. Holding the `admin` role
/// grants every code regardless of `codes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    codes: BTreeSet<PermissionCode>,
    roles: BTreeSet<RoleName>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_codes<I, C>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<PermissionCode>,
    {
        self.replace_codes(codes);
        self
    }

    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RoleName>,
    {
        self.replace_roles(roles);
        self
    }

    pub fn codes(&self) -> &BTreeSet<PermissionCode> {
        &self.codes
    }

    pub fn roles(&self) -> &BTreeSet<RoleName> {
        &self.roles
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(RoleName::is_admin)
    }

    pub fn has(&self, code: &str) -> bool {
        self.is_admin() || self.codes.contains(code)
    }

    pub fn has_any<S: AsRef<str>>(&self, codes: &[S]) -> bool {
        codes.iter().any(|c| self.has(c.as_ref()))
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|r| self.has_role(r.as_ref()))
    }

    pub fn replace_codes<I, C>(&mut self, codes: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<PermissionCode>,
    {
        self.codes = codes.into_iter().map(Into::into).collect();
    }

    pub fn replace_roles<I, R>(&mut self, roles: I)
    where
        I: IntoIterator<Item = R>,
        R: Into<RoleName>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
    }

    pub fn clear_codes(&mut self) {
        self.codes.clear();
    }

    pub fn clear(&mut self) {
        self.codes.clear();
        self.roles.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty() && self.roles.is_empty()
    }
}
