use std::sync::{Arc, OnceLock, Weak};

use tracker_api::SessionHooks;
use tracker_core::{EventBus, Subscription};

use crate::credential::CredentialStore;
use crate::events::SessionEvent;
use crate::identity::IdentityStore;

/// The request layer's handle on session state.
///
/// Built before the API client (which needs the hooks) and bound to the
/// identity store afterwards (which needs the API client).
pub struct SessionLink {
    credentials: Arc<CredentialStore>,
    identity: OnceLock<Weak<IdentityStore>>,
    events: EventBus<SessionEvent>,
}

impl std::fmt::Debug for SessionLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLink")
            .field("credentials", &self.credentials)
            .field("bound", &self.identity.get().is_some())
            .finish_non_exhaustive()
    }
}

impl SessionLink {
    pub fn new(credentials: Arc<CredentialStore>) -> Arc<Self> {
        Arc::new(Self {
            credentials,
            identity: OnceLock::new(),
            events: EventBus::new(),
        })
    }

    /// First binding wins.
    pub fn bind(&self, identity: &Arc<IdentityStore>) {
        if self.identity.set(Arc::downgrade(identity)).is_err() {
            tracing::warn!("session link already bound; ignoring rebind");
        }
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn publish(&self, event: SessionEvent) {
        self.events.publish(event);
    }

    pub fn subscribe(&self) -> Subscription<SessionEvent> {
        self.events.subscribe()
    }
}

impl SessionHooks for SessionLink {
    fn bearer_token(&self) -> Option<String> {
        self.credentials.current()
    }

    fn unauthenticated(&self) {
        let was_authenticated = self.credentials.is_authenticated();

        match self.identity.get().and_then(Weak::upgrade) {
            Some(identity) => identity.reset(),
            None => {
                if let Err(err) = self.credentials.clear() {
                    tracing::error!(error = %err, "token could not be removed from storage");
                }
            }
        }

        if was_authenticated {
            tracing::info!("session expired; signed out");
            self.events.publish(SessionEvent::Expired);
        }
    }
}
