use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::guard::{GuardDecision, NavigationGuard};
use crate::route::{Location, NavigationTarget, RouteError, RouteName, resolve};

/// Longest redirect chain followed before giving up.
pub const MAX_REDIRECTS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Committed {
        target: NavigationTarget,
        /// The guard sent us somewhere other than the requested location.
        redirected: bool,
    },
    /// A newer navigation started while this one was being evaluated.
    Superseded,
    NotFound(String),
    RedirectLoop(Location),
}

impl NavigationOutcome {
    pub fn committed(&self) -> Option<&NavigationTarget> {
        match self {
            Self::Committed { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// Runs the guard for each transition and commits only the newest one.
#[derive(Debug)]
pub struct Navigator {
    guard: NavigationGuard,
    ticket: AtomicU64,
    current: RwLock<Option<NavigationTarget>>,
}

impl Navigator {
    pub fn new(guard: NavigationGuard) -> Self {
        Self {
            guard,
            ticket: AtomicU64::new(0),
            current: RwLock::new(None),
        }
    }

    pub async fn navigate(&self, to: impl Into<Location>) -> NavigationOutcome {
        let ticket = self.ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let mut location = to.into();
        let mut redirected = false;

        for _ in 0..=MAX_REDIRECTS {
            let target = match resolve(&location) {
                Ok(target) => target,
                Err(RouteError::NotFound(path)) => return NavigationOutcome::NotFound(path),
            };

            let decision = self.guard.evaluate(&target).await;

            match decision {
                GuardDecision::Allow => {
                    let mut current = self.current.write();
                    if self.ticket.load(Ordering::SeqCst) != ticket {
                        tracing::debug!(route = %target.name, "stale navigation dropped");
                        return NavigationOutcome::Superseded;
                    }
                    *current = Some(target.clone());
                    return NavigationOutcome::Committed { target, redirected };
                }
                GuardDecision::Redirect { to, .. } => {
                    if self.ticket.load(Ordering::SeqCst) != ticket {
                        tracing::debug!(route = %target.name, "stale redirect dropped");
                        return NavigationOutcome::Superseded;
                    }
                    location = to;
                    redirected = true;
                }
            }
        }

        tracing::error!(to = %location, "redirect loop detected");
        NavigationOutcome::RedirectLoop(location)
    }

    pub fn current(&self) -> Option<NavigationTarget> {
        self.current.read().clone()
    }

    /// Go to the login page, remembering where the user was.
    pub async fn redirect_to_login(&self) -> NavigationOutcome {
        let to = match self.current() {
            Some(current) if current.name != RouteName::Login => Location::login_redirect(&current.location),
            _ => Location::login(),
        };
        self.navigate(to).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::guard::{GuardStep, StepOutcome};

    /// Parks transitions to `/task` until released.
    struct Gate(Arc<Notify>);

    #[async_trait(?Send)]
    impl GuardStep for Gate {
        fn name(&self) -> &'static str {
            "gate"
        }

        async fn check(&self, target: &NavigationTarget) -> StepOutcome {
            if target.name == RouteName::Task {
                self.0.notified().await;
            }
            StepOutcome::Continue
        }
    }

    struct Bounce;

    #[async_trait(?Send)]
    impl GuardStep for Bounce {
        fn name(&self) -> &'static str {
            "bounce"
        }

        async fn check(&self, target: &NavigationTarget) -> StepOutcome {
            match target.name {
                RouteName::Bug => StepOutcome::Redirect(Location::parse("/task")),
                RouteName::Task => StepOutcome::Redirect(Location::parse("/bug")),
                RouteName::Project => StepOutcome::Redirect(Location::dashboard()),
                _ => StepOutcome::Continue,
            }
        }
    }

    #[tokio::test]
    async fn last_navigation_wins() {
        let gate = Arc::new(Notify::new());
        let navigator = Navigator::new(NavigationGuard::with_steps(vec![Box::new(Gate(gate.clone()))]));

        let (slow, fast) = tokio::join!(navigator.navigate("/task"), async {
            let outcome = navigator.navigate("/bug").await;
            gate.notify_one();
            outcome
        });

        assert_eq!(slow, NavigationOutcome::Superseded);
        assert_eq!(fast.committed().map(|t| t.name), Some(RouteName::Bug));
        assert_eq!(navigator.current().map(|t| t.name), Some(RouteName::Bug));
    }

    #[tokio::test]
    async fn follows_redirects_and_flags_them() {
        let navigator = Navigator::new(NavigationGuard::with_steps(vec![Box::new(Bounce)]));

        let outcome = navigator.navigate("/project").await;
        assert!(matches!(
            outcome,
            NavigationOutcome::Committed { ref target, redirected: true } if target.name == RouteName::Dashboard
        ));

        assert!(matches!(navigator.navigate("/bug").await, NavigationOutcome::RedirectLoop(_)));
        assert_eq!(
            navigator.navigate("/nowhere").await,
            NavigationOutcome::NotFound("/nowhere".into())
        );
        // failed navigations leave the committed route alone
        assert_eq!(navigator.current().map(|t| t.name), Some(RouteName::Dashboard));
    }

    #[tokio::test]
    async fn redirect_to_login_keeps_the_current_path() {
        let navigator = Navigator::new(NavigationGuard::with_steps(Vec::new()));
        navigator.navigate("/project/7/gantt?tab=deps").await;

        let outcome = navigator.redirect_to_login().await;
        let target = outcome.committed().unwrap();
        assert_eq!(target.name, RouteName::Login);
        assert_eq!(target.location.query_value("redirect"), Some("/project/7/gantt?tab=deps"));

        let again = navigator.redirect_to_login().await;
        assert_eq!(again.committed().unwrap().location, Location::login());
    }
}
