//! The reconciliation engine.
//!
//! Turns an arbitrary batch of heterogeneous raw ticket and agent records
//! into the canonical domain model. This is a pure, synchronous
//! transformation over already-fetched in-memory arrays: no I/O, no locks,
//! no state across invocations beyond per-call lookup maps, so it is safe
//! to invoke concurrently once per poll cycle.
//!
//! A malformed individual record never aborts the batch - it falls through
//! to the safest defaults (`bot` status, zero durations, synthetic name).

pub mod clock;
pub mod datetime;
pub mod identity;
pub mod lookup;
pub mod status;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Attendant, AttendantStatus, Ticket, TicketStatus};
use self::clock::Clock;
use self::lookup::{record_id, resolve_ref_name, value_as_string, Lookups};

/// Sentinel department label used when no department resolves.
const DEFAULT_DEPARTMENT: &str = "Suporte";

/// Aliased fields that may carry the creation timestamp.
const CREATED_FIELDS: &[&str] = &[
    "data_criacao",
    "data_abertura",
    "createdAt",
    "dt_criacao",
    "date",
];

/// Aliased fields that may carry the service-start timestamp.
const STARTED_FIELDS: &[&str] = &[
    "data_inicio",
    "data_atendimento",
    "dt_inicio",
    "data_hora_inicio",
];

/// Aliased fields that may carry the closing timestamp.
const ENDED_FIELDS: &[&str] = &["data_fechamento", "data_fim", "updatedAt", "dt_fechamento"];

/// Aliased fields that may carry the department reference.
const DEPARTMENT_FIELDS: &[&str] = &["setor", "id_departamento", "departamento"];

/// Aliased fields that may carry the agent reference. Shared between the
/// status classifier and attendant-name resolution so a ticket classified
/// `in_service` by any of these fields is also attributable to its agent.
pub(crate) const AGENT_FIELDS: &[&str] = &["id_atendente", "atendente", "id_usuario"];

/// Tuning knobs for the reconciliation engine.
///
/// The department exclusion list and the duration ceiling are configurable
/// because historical upstream variants disagree on both (see DESIGN.md).
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Department names that do not count as a real human queue.
    pub generic_departments: Vec<String>,

    /// Optional ceiling for reported durations, in hours. `None` reports
    /// durations unclamped, leaving any bounding to the presentation layer.
    pub max_duration_hours: Option<u32>,

    /// Whether to synthesize attendant entries for agent names that appear
    /// on in-service tickets but not in the raw agent list.
    pub synthesize_attendants: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        ReconcileOptions {
            generic_departments: vec!["Geral".to_string(), "Sem Setor".to_string()],
            max_duration_hours: None,
            synthesize_attendants: true,
        }
    }
}

/// The raw record lists of one fetch cycle, as returned by the upstream.
///
/// Every list is optional on the wire; a missing or failed list is simply
/// empty, and the engine degrades to partial output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSnapshot {
    /// Raw ticket records, schema-unstable.
    #[serde(default)]
    pub tickets: Vec<Value>,

    /// Raw agent/user records.
    #[serde(default)]
    pub attendants: Vec<Value>,

    /// Side-loaded department records, for name lookups.
    #[serde(default)]
    pub departments: Vec<Value>,

    /// Side-loaded client records, for name/phone lookups.
    #[serde(default)]
    pub clients: Vec<Value>,

    /// Side-loaded contact records, for name/phone lookups.
    #[serde(default)]
    pub contacts: Vec<Value>,
}

/// The canonical output of one reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutput {
    /// Normalized tickets.
    pub tickets: Vec<Ticket>,

    /// Normalized attendants, with computed `activeChats`.
    pub attendants: Vec<Attendant>,
}

/// Reconciles one raw snapshot into the canonical model.
///
/// Steps: build lookup maps, map agents, map tickets (department -> status
/// -> durations -> client name -> agent name), then the closing pass
/// incrementing each agent's `activeChats` for in-service tickets, matched
/// by name since raw tickets may only carry an agent name.
pub fn reconcile(
    snapshot: &RawSnapshot,
    options: &ReconcileOptions,
    clock: &dyn Clock,
) -> ReconcileOutput {
    let lookups = Lookups::build(
        &snapshot.attendants,
        &snapshot.departments,
        &snapshot.clients,
        &snapshot.contacts,
    );

    let mut attendants: Vec<Attendant> = snapshot
        .attendants
        .iter()
        .filter_map(Attendant::from_raw)
        .collect();

    let tickets: Vec<Ticket> = snapshot
        .tickets
        .iter()
        .enumerate()
        .map(|(index, raw)| reconcile_ticket(raw, index, &lookups, options, clock))
        .collect();

    // Closing pass: concurrent-ticket counts per agent.
    for ticket in &tickets {
        if ticket.status != TicketStatus::InService {
            continue;
        }
        let Some(name) = &ticket.attendant_name else {
            continue;
        };
        if let Some(attendant) = attendants.iter_mut().find(|a| &a.name == name) {
            attendant.active_chats += 1;
        } else if options.synthesize_attendants {
            attendants.push(Attendant {
                id: synthetic_attendant_id(name),
                name: name.clone(),
                status: AttendantStatus::Online,
                active_chats: 1,
            });
        }
    }

    ReconcileOutput {
        tickets,
        attendants,
    }
}

/// Maps one raw ticket record to the canonical form.
fn reconcile_ticket(
    raw: &Value,
    index: usize,
    lookups: &Lookups,
    options: &ReconcileOptions,
    clock: &dyn Clock,
) -> Ticket {
    let protocol = value_as_string(raw.get("protocolo"))
        .or_else(|| value_as_string(raw.get("protocol")))
        .unwrap_or_default();

    let id = record_id(raw)
        .or_else(|| {
            if protocol.is_empty() {
                None
            } else {
                Some(protocol.clone())
            }
        })
        .unwrap_or_else(|| format!("ticket-{}", index));

    let department = DEPARTMENT_FIELDS.iter().find_map(|field| {
        resolve_ref_name(raw.get(*field), &lookups.departments, &["nome", "name"])
    });

    let status = status::classify(raw, department.as_deref(), &options.generic_departments);

    let created = first_present(raw, CREATED_FIELDS);
    let started = first_present(raw, STARTED_FIELDS);
    let ended = first_present(raw, ENDED_FIELDS);

    // Waiting measures creation to service start (or now while still
    // queued); service measures start to end (or now while in service).
    let wait_time_seconds = match created {
        Some(created) => datetime::duration_secs(created, started, clock),
        None => 0,
    };
    let duration_seconds = started.map(|started| {
        let end = if status == TicketStatus::Finished {
            ended
        } else {
            None
        };
        datetime::duration_secs(started, end, clock)
    });

    let ceiling = options.max_duration_hours.map(|h| u64::from(h) * 3600);
    let wait_time_seconds = apply_ceiling(wait_time_seconds, ceiling);
    let duration_seconds = duration_seconds.map(|d| apply_ceiling(d, ceiling));

    let client_name = identity::resolve_client_name(raw, &id, &protocol, lookups);

    let attendant_name = AGENT_FIELDS.iter().find_map(|field| {
        resolve_ref_name(raw.get(*field), &lookups.agents, &["nome", "name"])
    });

    Ticket {
        id,
        protocol: if protocol.is_empty() {
            "N/A".to_string()
        } else {
            protocol
        },
        client_name,
        status,
        wait_time_seconds,
        duration_seconds,
        attendant_name,
        department: department.unwrap_or_else(|| DEFAULT_DEPARTMENT.to_string()),
        created_at: created.and_then(|v| value_as_string(Some(v))),
        closed_at: ended.and_then(|v| value_as_string(Some(v))),
    }
}

/// Returns the first aliased field present and non-null on the record.
fn first_present<'a>(raw: &'a Value, fields: &[&str]) -> Option<&'a Value> {
    fields
        .iter()
        .find_map(|f| raw.get(*f).filter(|v| !v.is_null()))
}

/// Caps a duration at the configured ceiling, when one is set.
fn apply_ceiling(seconds: u64, ceiling: Option<u64>) -> u64 {
    match ceiling {
        Some(max) => seconds.min(max),
        None => seconds,
    }
}

/// Deterministic id for an attendant synthesized from a ticket's agent name.
fn synthetic_attendant_id(name: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    format!("atendente-{}", slug)
}
