//! Canonical attendant model.
//!
//! Attendants (agents) come from the upstream `/usuario` list. Their
//! active flag varies by upstream version: a letter code (`"A"`) in
//! older payloads, a boolean in newer ones.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::reconcile::lookup::{record_id, value_as_string};

/// Presence state of an attendant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendantStatus {
    /// Logged in and available.
    Online,
    /// Not logged in.
    Offline,
    /// Logged in but at capacity.
    Busy,
}

/// A normalized agent record.
///
/// `active_chats` is computed by the reconciliation engine's closing pass,
/// never supplied by the upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendant {
    /// Stable identifier derived from the upstream id.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Presence state.
    pub status: AttendantStatus,

    /// Number of tickets currently in service with this agent.
    pub active_chats: u32,
}

impl Attendant {
    /// Builds an attendant from a raw upstream user record.
    ///
    /// Returns `None` when the record carries no usable id.
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let id = record_id(raw)?;
        let name = value_as_string(raw.get("nome"))
            .or_else(|| value_as_string(raw.get("name")))
            .unwrap_or_else(|| "Agente".to_string());

        Some(Attendant {
            id,
            name,
            status: presence_from_flag(raw.get("status")),
            active_chats: 0,
        })
    }
}

/// Maps the upstream active flag onto a presence state.
///
/// `"A"` (ativo) and boolean `true` mean the agent is logged in; every
/// other value, including a missing flag, maps to offline.
fn presence_from_flag(flag: Option<&Value>) -> AttendantStatus {
    match flag {
        Some(Value::Bool(true)) => AttendantStatus::Online,
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("a") || s.eq_ignore_ascii_case("online") {
                AttendantStatus::Online
            } else {
                AttendantStatus::Offline
            }
        }
        _ => AttendantStatus::Offline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_raw_letter_code() {
        let raw = json!({"_id": "42", "nome": "Ana", "status": "A"});
        let a = Attendant::from_raw(&raw).unwrap();
        assert_eq!(a.id, "42");
        assert_eq!(a.name, "Ana");
        assert_eq!(a.status, AttendantStatus::Online);
        assert_eq!(a.active_chats, 0);
    }

    #[test]
    fn test_from_raw_boolean_flag() {
        let raw = json!({"id": 7, "name": "Bruno", "status": true});
        let a = Attendant::from_raw(&raw).unwrap();
        assert_eq!(a.id, "7");
        assert_eq!(a.name, "Bruno");
        assert_eq!(a.status, AttendantStatus::Online);
    }

    #[test]
    fn test_from_raw_inactive_and_missing_flag() {
        let raw = json!({"_id": "1", "nome": "Carla", "status": "I"});
        assert_eq!(
            Attendant::from_raw(&raw).unwrap().status,
            AttendantStatus::Offline
        );

        let raw = json!({"_id": "2", "nome": "Davi"});
        assert_eq!(
            Attendant::from_raw(&raw).unwrap().status,
            AttendantStatus::Offline
        );
    }

    #[test]
    fn test_from_raw_without_id_is_skipped() {
        let raw = json!({"nome": "Fantasma"});
        assert!(Attendant::from_raw(&raw).is_none());
    }

    #[test]
    fn test_from_raw_name_fallback() {
        let raw = json!({"_id": "9"});
        assert_eq!(Attendant::from_raw(&raw).unwrap().name, "Agente");
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&AttendantStatus::Online).unwrap(),
            "\"online\""
        );
    }
}
