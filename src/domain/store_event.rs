//! Lifecycle events emitted by the relational store client.
//!
//! Every connection state change publishes a [`StoreEvent`] through the
//! [`super::EventBus`]. [`StoreEvent::Disabled`] is how the host learns
//! that persistence is unavailable and should be switched off.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Connection lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// A new connection was opened.
    Connected {
        /// Time the connection was established.
        timestamp: DateTime<Utc>,
    },

    /// The connection was closed on request.
    Disconnected {
        /// Time the connection was closed.
        timestamp: DateTime<Utc>,
    },

    /// Connecting failed; the host should treat the store as unavailable.
    Disabled {
        /// Human-readable cause.
        reason: String,
        /// Time of the failure.
        timestamp: DateTime<Utc>,
    },
}

impl StoreEvent {
    /// Returns the event type as a static string.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::Disabled { .. } => "disabled",
        }
    }

    /// Returns the event timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Connected { timestamp }
            | Self::Disconnected { timestamp }
            | Self::Disabled { timestamp, .. } => *timestamp,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_event_type_tag() {
        let event = StoreEvent::Disabled {
            reason: "refused".to_string(),
            timestamp: Utc::now(),
        };
        let Ok(value) = serde_json::to_value(&event) else {
            panic!("serialization failed");
        };
        assert_eq!(value["event_type"], "disabled");
        assert_eq!(value["reason"], "refused");
        assert_eq!(event.event_type_str(), "disabled");
    }
}
