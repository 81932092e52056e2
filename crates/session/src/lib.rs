//! `tracker-session`: the stateful session & authorization core.
//!
//! Dependency order, leaves first:
//!
//! - [`CredentialStore`] owns the bearer token and its durable copy.
//! - [`PermissionCache`] owns the caller's codes and roles.
//! - [`IdentityStore`] owns the profile and drives the two above.
//! - [`NavigationGuard`] reads all three to accept or redirect a transition;
//!   [`Navigator`] runs it and commits only the newest transition.
//! - [`VisibilityBinding`] observes the permission cache to show or hide an
//!   element.
//! - [`Session`] wires them to an [`tracker_api::AuthApi`] and exposes the
//!   login flows.

pub mod binding;
pub mod credential;
pub mod error;
pub mod events;
pub mod guard;
pub mod identity;
pub mod link;
pub mod navigator;
pub mod permission_cache;
pub mod route;
pub mod session;
pub mod storage;

pub use binding::{InlineStyle, StyledElement, VisibilityBinding};
#[cfg(target_arch = "wasm32")]
pub use binding::DomElement;
pub use credential::CredentialStore;
pub use error::SessionError;
pub use events::SessionEvent;
pub use guard::{
    GuardDecision, GuardStep, HydrationStep, InitStatusStep, LoginPageStep, NavigationGuard,
    PasswordChangeStep, RequiresAuthStep, StepOutcome,
};
pub use identity::{Hydration, Identity, IdentityStore};
pub use link::SessionLink;
pub use navigator::{MAX_REDIRECTS, NavigationOutcome, Navigator};
pub use permission_cache::{PermissionCache, PermissionObserver};
pub use route::{Location, NavigationTarget, ROUTES, RouteDef, RouteError, RouteName, resolve};
pub use session::{LoginOutcome, Session};
#[cfg(target_arch = "wasm32")]
pub use storage::BrowserTokenStorage;
pub use storage::{FileTokenStorage, MemoryTokenStorage, TOKEN_KEY, TokenStorage};
