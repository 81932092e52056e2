use serde::Serialize;

use tracker_core::UserId;

/// Session lifecycle notifications, published on the session's bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    LoggedIn { user_id: UserId },
    LoggedOut,
    /// The server rejected the token; local state is already cleared.
    Expired,
    PasswordChanged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_an_event_tag() {
        let json = serde_json::to_value(SessionEvent::LoggedIn { user_id: UserId::new(3) }).unwrap();
        assert_eq!(json, serde_json::json!({ "event": "logged_in", "user_id": 3 }));

        let json = serde_json::to_value(SessionEvent::Expired).unwrap();
        assert_eq!(json, serde_json::json!({ "event": "expired" }));
    }
}
