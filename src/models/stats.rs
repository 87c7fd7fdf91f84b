//! Aggregated dashboard statistics.
//!
//! Computed from the canonical model after each reconciliation pass:
//! per-status counts, running averages, daily and monthly completion
//! counts, and the monthly top-5 attendant ranking.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;

use crate::models::{Attendant, Ticket, TicketStatus};
use crate::reconcile::clock::Clock;
use crate::reconcile::datetime::parse_timestamp_str;

/// Service durations at or above this are treated as outliers and excluded
/// from the average (24 hours).
const SERVICE_OUTLIER_SECS: u64 = 86_400;

/// How many attendants the monthly ranking keeps.
const RANKING_SIZE: usize = 5;

/// One entry of the monthly attendant ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendantRanking {
    /// Attendant display name.
    pub name: String,
    /// Tickets finished by this attendant in the current month.
    pub count: u32,
}

/// Aggregate statistics over one reconciled snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Tickets waiting in a human queue.
    pub waiting_count: u32,

    /// Tickets held by the bot flow.
    pub bot_count: u32,

    /// Tickets actively being served.
    pub in_service_count: u32,

    /// Attendants in the snapshot.
    pub attendant_count: u32,

    /// Average wait of currently-waiting tickets, in seconds.
    pub avg_wait_time_seconds: u64,

    /// Average service time of finished tickets, in seconds,
    /// excluding outliers of a day or more.
    pub avg_service_time_seconds: u64,

    /// Tickets finished today.
    pub finished_today: u32,

    /// Tickets finished in the current month.
    pub finished_month: u32,

    /// Top attendants by tickets finished this month.
    pub ranking: Vec<AttendantRanking>,
}

impl DashboardStats {
    /// Computes statistics for one snapshot.
    ///
    /// "Today" and "this month" are taken from the supplied clock so that
    /// tests can pin the calendar.
    pub fn compute(tickets: &[Ticket], attendants: &[Attendant], clock: &dyn Clock) -> Self {
        let now: DateTime<Utc> =
            DateTime::from_timestamp_millis(clock.now_ms()).unwrap_or_default();
        let today = now.date_naive();

        let mut waiting_count = 0u32;
        let mut bot_count = 0u32;
        let mut in_service_count = 0u32;
        let mut wait_total = 0u64;
        let mut service_total = 0u64;
        let mut service_samples = 0u64;
        let mut finished_today = 0u32;
        let mut finished_month = 0u32;
        let mut per_attendant: HashMap<&str, u32> = HashMap::new();

        for ticket in tickets {
            match ticket.status {
                TicketStatus::Waiting => {
                    waiting_count += 1;
                    wait_total += ticket.wait_time_seconds;
                }
                TicketStatus::Bot => bot_count += 1,
                TicketStatus::InService => in_service_count += 1,
                TicketStatus::Finished => {
                    if let Some(d) = ticket.duration_seconds {
                        if d > 0 && d < SERVICE_OUTLIER_SECS {
                            service_total += d;
                            service_samples += 1;
                        }
                    }
                    if let Some(date) = closing_date(ticket) {
                        if date == today {
                            finished_today += 1;
                        }
                        if date.year() == today.year() && date.month() == today.month() {
                            finished_month += 1;
                            if let Some(name) = &ticket.attendant_name {
                                *per_attendant.entry(name.as_str()).or_default() += 1;
                            }
                        }
                    }
                }
            }
        }

        let mut ranking: Vec<AttendantRanking> = per_attendant
            .into_iter()
            .map(|(name, count)| AttendantRanking {
                name: name.to_string(),
                count,
            })
            .collect();
        // Deterministic order: count descending, then name.
        ranking.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        ranking.truncate(RANKING_SIZE);

        DashboardStats {
            waiting_count,
            bot_count,
            in_service_count,
            attendant_count: attendants.len() as u32,
            avg_wait_time_seconds: average(wait_total, u64::from(waiting_count)),
            avg_service_time_seconds: average(service_total, service_samples),
            finished_today,
            finished_month,
            ranking,
        }
    }
}

/// Returns the calendar date a ticket closed on, preferring `closedAt`
/// and falling back to `createdAt`.
fn closing_date(ticket: &Ticket) -> Option<NaiveDate> {
    let raw = ticket
        .closed_at
        .as_deref()
        .or(ticket.created_at.as_deref())?;
    let ms = parse_timestamp_str(raw);
    if ms == 0 {
        return None;
    }
    DateTime::from_timestamp_millis(ms).map(|dt| dt.date_naive())
}

/// Integer average, zero when there are no samples.
fn average(total: u64, samples: u64) -> u64 {
    if samples == 0 {
        0
    } else {
        total / samples
    }
}
