//! `tracker-auth`: pure authorization for the tracker client.
//!
//! No IO, no async. Everything here is a function of a [`PermissionSet`] (or
//! anything implementing [`Authorizer`]) and a [`Requirement`].

pub mod authorize;
pub mod menu;
pub mod password;
pub mod permission_set;
pub mod permissions;
pub mod requirement;
pub mod roles;

pub use authorize::{AuthzError, Authorizer, Decision, authorize, explain, is_granted};
pub use menu::{MenuItem, default_menu, filter_menu};
pub use password::{MIN_PASSWORD_LEN, PasswordPolicyError, validate_password_strength};
pub use permission_set::PermissionSet;
pub use permissions::PermissionCode;
pub use requirement::Requirement;
pub use roles::RoleName;
