//! Navigation guard: an ordered list of steps evaluated per route transition.
//!
//! Each step looks at the target and either lets the next step run, accepts
//! the transition outright, or redirects. The first non-`Continue` outcome
//! decides; a pipeline that runs out of steps allows.

use std::sync::Arc;

use async_trait::async_trait;

use tracker_api::AuthApi;

use crate::credential::CredentialStore;
use crate::identity::IdentityStore;
use crate::route::{Location, NavigationTarget, RouteName};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// Accept without running the remaining steps.
    Allow,
    Redirect(Location),
}

#[async_trait(?Send)]
pub trait GuardStep: Send + Sync {
    fn name(&self) -> &'static str;

    /// Must not fail: every error path maps to an outcome.
    async fn check(&self, target: &NavigationTarget) -> StepOutcome;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect { to: Location, step: &'static str },
}

/// Routes reachable while the system is not initialized.
fn exempt_from_init(target: &NavigationTarget) -> bool {
    match target.name {
        RouteName::InitCallback | RouteName::WeChatCallback | RouteName::WeChatAddUserCallback => true,
        RouteName::WeChatSettings => target.location.query_value("from") == Some("init"),
        _ => false,
    }
}

/// Routes let through unconditionally when the status check fails.
fn allowed_without_status(name: RouteName) -> bool {
    matches!(
        name,
        RouteName::Init
            | RouteName::InitCallback
            | RouteName::WeChatCallback
            | RouteName::WeChatAddUserCallback
            | RouteName::WeChatSettings
    )
}

/// Outcome of the init-status step given the status check; `None` means the
/// check failed and the system is assumed initialized.
pub fn init_decision(target: &NavigationTarget, initialized: Option<bool>) -> StepOutcome {
    match initialized {
        None if allowed_without_status(target.name) => StepOutcome::Allow,
        None => StepOutcome::Continue,
        Some(true) if target.name == RouteName::Init => StepOutcome::Redirect(Location::login()),
        Some(true) => StepOutcome::Continue,
        Some(false) if target.name == RouteName::Init || exempt_from_init(target) => StepOutcome::Continue,
        Some(false) => StepOutcome::Redirect(Location::init()),
    }
}

/// Asks the server whether first-run setup is done.
pub struct InitStatusStep {
    api: Arc<dyn AuthApi>,
}

impl InitStatusStep {
    pub fn new(api: Arc<dyn AuthApi>) -> Self {
        Self { api }
    }
}

#[async_trait(?Send)]
impl GuardStep for InitStatusStep {
    fn name(&self) -> &'static str {
        "init-status"
    }

    async fn check(&self, target: &NavigationTarget) -> StepOutcome {
        let initialized = match self.api.init_status().await {
            Ok(status) => Some(status.initialized),
            Err(err) => {
                tracing::warn!(error = %err, route = %target.name, "init status check failed; assuming initialized");
                None
            }
        };
        init_decision(target, initialized)
    }
}

/// Signed-in users skip the login page.
pub struct LoginPageStep {
    credentials: Arc<CredentialStore>,
}

impl LoginPageStep {
    pub fn new(credentials: Arc<CredentialStore>) -> Self {
        Self { credentials }
    }
}

#[async_trait(?Send)]
impl GuardStep for LoginPageStep {
    fn name(&self) -> &'static str {
        "login-page"
    }

    async fn check(&self, target: &NavigationTarget) -> StepOutcome {
        if target.name == RouteName::Login && self.credentials.is_authenticated() {
            StepOutcome::Redirect(Location::dashboard())
        } else {
            StepOutcome::Continue
        }
    }
}

pub struct RequiresAuthStep {
    credentials: Arc<CredentialStore>,
}

impl RequiresAuthStep {
    pub fn new(credentials: Arc<CredentialStore>) -> Self {
        Self { credentials }
    }
}

#[async_trait(?Send)]
impl GuardStep for RequiresAuthStep {
    fn name(&self) -> &'static str {
        "requires-auth"
    }

    async fn check(&self, target: &NavigationTarget) -> StepOutcome {
        if target.requires_auth() && !self.credentials.is_authenticated() {
            StepOutcome::Redirect(Location::login_redirect(&target.location))
        } else {
            StepOutcome::Continue
        }
    }
}

/// Loads the profile for a restored token before the first protected page.
pub struct HydrationStep {
    credentials: Arc<CredentialStore>,
    identity: Arc<IdentityStore>,
}

impl HydrationStep {
    pub fn new(credentials: Arc<CredentialStore>, identity: Arc<IdentityStore>) -> Self {
        Self { credentials, identity }
    }
}

#[async_trait(?Send)]
impl GuardStep for HydrationStep {
    fn name(&self) -> &'static str {
        "hydration"
    }

    async fn check(&self, target: &NavigationTarget) -> StepOutcome {
        if !(target.requires_auth() && self.credentials.is_authenticated() && self.identity.is_empty()) {
            return StepOutcome::Continue;
        }

        match self.identity.hydrate().await {
            Ok(_) if self.credentials.is_authenticated() && !self.identity.is_empty() => StepOutcome::Continue,
            Ok(outcome) => {
                tracing::info!(?outcome, route = %target.name, "session gone after hydration");
                StepOutcome::Redirect(Location::login_redirect(&target.location))
            }
            Err(err) => {
                tracing::warn!(error = %err, route = %target.name, "could not load the signed-in user");
                StepOutcome::Redirect(Location::login_redirect(&target.location))
            }
        }
    }
}

/// Holds a user on the password page until the first-login change is done.
pub struct PasswordChangeStep {
    credentials: Arc<CredentialStore>,
    identity: Arc<IdentityStore>,
}

impl PasswordChangeStep {
    pub fn new(credentials: Arc<CredentialStore>, identity: Arc<IdentityStore>) -> Self {
        Self { credentials, identity }
    }
}

#[async_trait(?Send)]
impl GuardStep for PasswordChangeStep {
    fn name(&self) -> &'static str {
        "password-change"
    }

    async fn check(&self, target: &NavigationTarget) -> StepOutcome {
        if self.credentials.is_authenticated()
            && self.identity.must_change_password()
            && target.name != RouteName::ChangePassword
        {
            StepOutcome::Redirect(Location::change_password())
        } else {
            StepOutcome::Continue
        }
    }
}

pub struct NavigationGuard {
    steps: Vec<Box<dyn GuardStep>>,
}

impl std::fmt::Debug for NavigationGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.steps.iter().map(|s| s.name())).finish()
    }
}

impl NavigationGuard {
    /// Init status, login page, auth requirement, hydration, password change.
    pub fn standard(
        api: Arc<dyn AuthApi>,
        credentials: Arc<CredentialStore>,
        identity: Arc<IdentityStore>,
    ) -> Self {
        Self::with_steps(vec![
            Box::new(InitStatusStep::new(api)),
            Box::new(LoginPageStep::new(credentials.clone())),
            Box::new(RequiresAuthStep::new(credentials.clone())),
            Box::new(HydrationStep::new(credentials.clone(), identity.clone())),
            Box::new(PasswordChangeStep::new(credentials, identity)),
        ])
    }

    pub fn with_steps(steps: Vec<Box<dyn GuardStep>>) -> Self {
        Self { steps }
    }

    pub async fn evaluate(&self, target: &NavigationTarget) -> GuardDecision {
        for step in &self.steps {
            match step.check(target).await {
                StepOutcome::Continue => {}
                StepOutcome::Allow => {
                    tracing::debug!(route = %target.name, step = step.name(), "navigation allowed early");
                    return GuardDecision::Allow;
                }
                StepOutcome::Redirect(to) => {
                    tracing::info!(
                        route = %target.name,
                        step = step.name(),
                        to = %to,
                        "navigation redirected"
                    );
                    return GuardDecision::Redirect { to, step: step.name() };
                }
            }
        }

        tracing::debug!(route = %target.name, "navigation allowed");
        GuardDecision::Allow
    }
}
