//! Membership update and balancer event type definitions

use serde::{Deserialize, Serialize};

use crate::LbError;

/// Operation carried by a membership update
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UpdateOp {
    /// A backend address joined the target
    Add,
    /// A backend address left the target
    Delete,
    /// An operation name the balancer does not understand
    Other(String),
}

impl From<String> for UpdateOp {
    fn from(op: String) -> Self {
        match op.to_ascii_uppercase().as_str() {
            "ADD" => UpdateOp::Add,
            "DEL" | "DELETE" => UpdateOp::Delete,
            _ => UpdateOp::Other(op),
        }
    }
}

impl From<UpdateOp> for String {
    fn from(op: UpdateOp) -> Self {
        op.to_string()
    }
}

impl std::fmt::Display for UpdateOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateOp::Add => write!(f, "ADD"),
            UpdateOp::Delete => write!(f, "DEL"),
            UpdateOp::Other(op) => write!(f, "{}", op),
        }
    }
}

/// A single membership change for one backend address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// Backend address
    pub addr: String,
    /// What happened to it
    pub op: UpdateOp,
}

impl Update {
    /// An ADD update for `addr`
    pub fn add(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            op: UpdateOp::Add,
        }
    }

    /// A DEL update for `addr`
    pub fn delete(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            op: UpdateOp::Delete,
        }
    }
}

/// Kind of notification a balancer emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// First membership batch processed
    Ready,
    /// A membership batch was processed
    Change,
    /// Something went wrong while tracking membership
    Error,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Ready => write!(f, "ready"),
            EventKind::Change => write!(f, "change"),
            EventKind::Error => write!(f, "error"),
        }
    }
}

/// Notification emitted by a balancer's update loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalancerEvent {
    /// Emitted once, after the first batch
    Ready,
    /// Pool addresses in pool order, after every batch
    Change(Vec<String>),
    /// Unknown operations, failed client creation, resolver failures
    Error(LbError),
}

impl BalancerEvent {
    /// The kind listeners register for to receive this event
    pub fn kind(&self) -> EventKind {
        match self {
            BalancerEvent::Ready => EventKind::Ready,
            BalancerEvent::Change(_) => EventKind::Change,
            BalancerEvent::Error(_) => EventKind::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_op_parse() {
        assert_eq!(UpdateOp::from("add".to_string()), UpdateOp::Add);
        assert_eq!(UpdateOp::from("DEL".to_string()), UpdateOp::Delete);
        assert_eq!(UpdateOp::from("delete".to_string()), UpdateOp::Delete);
        assert_eq!(
            UpdateOp::from("MODIFY".to_string()),
            UpdateOp::Other("MODIFY".to_string())
        );
    }

    #[test]
    fn test_update_json() {
        let batch: Vec<Update> = serde_json::from_str(
            r#"[{"addr": "10.0.0.1:50051", "op": "ADD"}, {"addr": "10.0.0.2:50051", "op": "noop"}]"#,
        )
        .unwrap();
        assert_eq!(batch[0], Update::add("10.0.0.1:50051"));
        assert_eq!(batch[1].op, UpdateOp::Other("noop".to_string()));

        let json = serde_json::to_string(&Update::delete("10.0.0.1:50051")).unwrap();
        assert_eq!(json, r#"{"addr":"10.0.0.1:50051","op":"DEL"}"#);
    }

    #[test]
    fn test_event_kind() {
        assert_eq!(BalancerEvent::Ready.kind(), EventKind::Ready);
        assert_eq!(BalancerEvent::Change(vec![]).kind(), EventKind::Change);
        assert_eq!(
            BalancerEvent::Error(LbError::NoBackendAvailable).kind(),
            EventKind::Error
        );
        assert_eq!(EventKind::Change.to_string(), "change");
    }
}
