//! The authorization predicate evaluator.
//!
//! Menu filtering, visibility bindings and callers that need a hard check all
//! go through [`explain`], so the admin bypass and the "any of" semantics live
//! in exactly one place.

use serde::Serialize;
use thiserror::Error;

use crate::{PermissionCode, PermissionSet, Requirement, RoleName};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(Requirement),
}

/// Read access to the caller's grants.
///
/// Implemented by the plain [`PermissionSet`] and by stateful caches that
/// wrap one.
pub trait Authorizer {
    /// True for admins, otherwise membership of `code`.
    fn has(&self, code: &str) -> bool;

    fn has_role(&self, role: &str) -> bool;

    fn has_any(&self, codes: &[PermissionCode]) -> bool {
        codes.iter().any(|c| self.has(c.as_str()))
    }

    fn has_any_role(&self, roles: &[RoleName]) -> bool {
        roles.iter().any(|r| self.has_role(r.as_str()))
    }
}

impl Authorizer for PermissionSet {
    fn has(&self, code: &str) -> bool {
        PermissionSet::has(self, code)
    }

    fn has_role(&self, role: &str) -> bool {
        PermissionSet::has_role(self, role)
    }
}

impl<A: Authorizer + ?Sized> Authorizer for &A {
    fn has(&self, code: &str) -> bool {
        (**self).has(code)
    }

    fn has_role(&self, role: &str) -> bool {
        (**self).has_role(role)
    }
}

/// Why a requirement was (or was not) met.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// The caller holds the `admin` role.
    AdminBypass,
    /// First code of the requirement the caller holds.
    Granted { code: PermissionCode },
    Denied { required: Requirement },
}

impl Decision {
    pub fn is_granted(&self) -> bool {
        !matches!(self, Self::Denied { .. })
    }
}

pub fn explain<A: Authorizer + ?Sized>(authz: &A, required: &Requirement) -> Decision {
    if authz.has_role(RoleName::ADMIN.as_str()) {
        return Decision::AdminBypass;
    }

    match required.codes().iter().find(|c| authz.has(c.as_str())) {
        Some(code) => Decision::Granted { code: code.clone() },
        None => {
            tracing::debug!(required = %required, "permission denied");
            Decision::Denied {
                required: required.clone(),
            }
        }
    }
}

pub fn is_granted<A: Authorizer + ?Sized>(authz: &A, required: &Requirement) -> bool {
    explain(authz, required).is_granted()
}

/// Hard check for callers that want a `Result`.
pub fn authorize<A: Authorizer + ?Sized>(authz: &A, required: &Requirement) -> Result<(), AuthzError> {
    match explain(authz, required) {
        Decision::Denied { required } => Err(AuthzError::Forbidden(required)),
        _ => Ok(()),
    }
}
