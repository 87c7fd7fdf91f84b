//! # Mirante
//!
//! Mirante mirrors the live queue state of an Opa Suite helpdesk instance
//! as a normalized, typed dashboard feed.
//!
//! The upstream's record formats are inconsistent across its own API
//! versions: field names, status codes, and date formats vary per record,
//! and a ticket's real identity (the client name) is frequently missing or
//! replaced by protocol numbers. The heart of this crate is the
//! reconciliation engine that takes an arbitrary batch of heterogeneous raw
//! records and produces a canonical domain model suitable for aggregation
//! and display.
//!
//! ## Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`config`] - Configuration loading from environment variables
//! - [`error`] - Error types with security-conscious message sanitization
//! - [`opa_client`] - HTTP client for the Opa Suite API
//! - [`models`] - Canonical ticket, attendant, and statistics types
//! - [`reconcile`] - The reconciliation/normalization engine
//!
//! The engine itself is pure and synchronous: it performs no I/O, holds no
//! state across invocations, and never retries. Fetching, retrying, and
//! token handling live in [`opa_client`]; everything downstream of the raw
//! arrays is deterministic given an injected [`reconcile::clock::Clock`].
//!
//! ## Usage
//!
//! Mirante is primarily used as a binary. To run:
//!
//! ```bash
//! # Set required environment variables
//! export OPA_BASE_URL=https://example.opasuite.com.br
//! export OPA_API_TOKEN=your-api-token
//!
//! # Print one reconciled snapshot as JSON
//! ./mirante
//!
//! # Or poll continuously
//! MIRANTE_POLL_SECS=15 ./mirante
//! ```
//!
//! ## Configuration
//!
//! Required:
//!
//! - `OPA_BASE_URL`: Base URL of the Opa Suite instance
//! - `OPA_API_TOKEN`: API token for authentication
//!
//! Optional:
//!
//! - `MIRANTE_GENERIC_DEPARTMENTS`: Comma-separated department names that do
//!   not count as a real human queue (default `Geral,Sem Setor`)
//! - `MIRANTE_MAX_DURATION_HOURS`: Ceiling for reported durations
//! - `MIRANTE_POLL_SECS`: Refresh interval for continuous polling
//! - `RUST_LOG`: Log level (e.g., `mirante=debug`)
//!
//! ## Security Considerations
//!
//! The API token is stored only in memory and is:
//! - Never logged at any log level
//! - Sanitized from all error messages
//!
//! ## Example
//!
//! Using the engine directly on already-fetched data:
//!
//! ```ignore
//! use mirante::reconcile::{reconcile, RawSnapshot, ReconcileOptions};
//! use mirante::reconcile::clock::SystemClock;
//!
//! let snapshot: RawSnapshot = serde_json::from_str(payload)?;
//! let output = reconcile(&snapshot, &ReconcileOptions::default(), &SystemClock);
//! for ticket in &output.tickets {
//!     println!("{} [{}] {}", ticket.protocol, ticket.status, ticket.client_name);
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod models;
pub mod opa_client;
pub mod reconcile;
