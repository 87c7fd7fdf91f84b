//! Canonical ticket model.
//!
//! This module defines the normalized ticket record produced by the
//! reconciliation engine, independent of the upstream's many legacy shapes.

use serde::{Deserialize, Serialize};

/// Canonical lifecycle state of a ticket.
///
/// The upstream encodes status inconsistently across API versions; the
/// classifier in [`crate::reconcile::status`] collapses every known
/// vocabulary onto these four states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Queued for a human agent.
    Waiting,
    /// Actively being served by an agent.
    InService,
    /// Held by the bot/triage flow, not yet routed to a human queue.
    Bot,
    /// Closed.
    Finished,
}

impl TicketStatus {
    /// Returns the wire representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Waiting => "waiting",
            TicketStatus::InService => "in_service",
            TicketStatus::Bot => "bot",
            TicketStatus::Finished => "finished",
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized ticket, recomputed from scratch on every fetch cycle.
///
/// Value object: no identity beyond `id`, replaced wholesale by the
/// consuming dashboard on each refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Stable identifier derived from the upstream id.
    pub id: String,

    /// Human-facing reference code. Never used as a display name.
    pub protocol: String,

    /// Resolved display label for the customer. Never empty.
    pub client_name: String,

    /// Canonical lifecycle state.
    pub status: TicketStatus,

    /// Elapsed time in queue, in seconds. Never negative; parse failures
    /// resolve to 0.
    pub wait_time_seconds: u64,

    /// Elapsed time being served, in seconds. Absent when service has
    /// not started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,

    /// Resolved agent label. Absent if unassigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendant_name: Option<String>,

    /// Resolved department label, or the sentinel default when unresolved.
    pub department: String,

    /// Raw creation timestamp, passed through for downstream aggregation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// Raw closing timestamp, passed through for downstream aggregation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<String>,
}
