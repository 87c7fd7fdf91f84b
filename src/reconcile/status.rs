//! Status classification for inconsistently-encoded ticket states.
//!
//! Upstream status vocabularies are not stable across API versions: the same
//! lifecycle state arrives as a letter code, a spelled-out word, or a legacy
//! numeric code depending on which backend produced the record. Codes are
//! treated as a best-effort hint and corroborated with the presence of a
//! department or agent, so bot-held conversations are not misclassified as
//! human queue entries.

use serde_json::Value;

use crate::models::TicketStatus;
use crate::reconcile::lookup::{first_field, value_as_string};
use crate::reconcile::AGENT_FIELDS;

/// Codes meaning the ticket is closed.
const FINISHED_CODES: &[&str] = &["F", "FINALIZADO", "CONCLUIDO", "3", "4"];

/// Codes meaning an agent is actively serving the ticket.
const IN_SERVICE_CODES: &[&str] = &["EA", "EM ATENDIMENTO", "2"];

/// Code for the bot/triage flow.
const BOT_CODE: &str = "PS";

/// Codes meaning the ticket sits in a queue (human or bot).
const QUEUE_CODES: &[&str] = &[
    "AG",
    "AGUARDANDO",
    "BOT",
    "E",
    "EE",
    "EM ESPERA",
    "1",
    "T",
    "",
];

/// Aliased fields that may carry the status value.
const STATUS_FIELDS: &[&str] = &["status", "situacao", "estado"];

/// Classifies a raw ticket into one of the four canonical states.
///
/// `department` is the already-resolved department name (before the
/// sentinel default is applied); `generic_departments` is the configurable
/// list of placeholder names that do not count as a real human queue.
///
/// Total function: every input yields exactly one state.
pub fn classify(
    raw: &Value,
    department: Option<&str>,
    generic_departments: &[String],
) -> TicketStatus {
    let code = first_field(raw, STATUS_FIELDS)
        .map(|s| s.to_uppercase())
        .unwrap_or_default();
    let code = code.trim();

    if FINISHED_CODES.contains(&code) {
        return TicketStatus::Finished;
    }
    if IN_SERVICE_CODES.contains(&code) {
        return TicketStatus::InService;
    }
    if code == BOT_CODE {
        return TicketStatus::Bot;
    }
    if QUEUE_CODES.contains(&code) {
        // Queued, but only a real department means a human queue.
        return if is_real_department(department, generic_departments) {
            TicketStatus::Waiting
        } else {
            TicketStatus::Bot
        };
    }

    // Unknown vocabulary: corroborate with the agent reference.
    if has_agent_ref(raw) {
        TicketStatus::InService
    } else {
        TicketStatus::Bot
    }
}

/// Returns true when the resolved department names an actual human queue.
fn is_real_department(department: Option<&str>, generic_departments: &[String]) -> bool {
    let Some(name) = department else {
        return false;
    };
    let name = name.trim();
    if name.is_empty() {
        return false;
    }
    !generic_departments
        .iter()
        .any(|g| g.trim().eq_ignore_ascii_case(name))
}

/// Returns true when the raw record carries any usable agent reference.
fn has_agent_ref(raw: &Value) -> bool {
    AGENT_FIELDS.iter().any(|field| match raw.get(*field) {
        Some(v) if v.is_object() => true,
        other => value_as_string(other).is_some(),
    })
}
