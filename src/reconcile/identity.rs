//! Client identity resolution.
//!
//! The upstream frequently fails to populate a real customer name: the name
//! slot may hold a protocol code, an internal id, or a placeholder word.
//! Without the waterfall below, the dashboard would show operators raw
//! protocol strings instead of actionable identifiers.
//!
//! Candidate sources are consulted in priority order: embedded customer and
//! contact objects, foreign-key lookups against the side-loaded client and
//! contact tables, then flat legacy fields on the ticket itself. Junk
//! candidates are rejected; if no name survives, a formatted phone number is
//! used, then the protocol, then a synthetic label from the ticket id.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::reconcile::lookup::{value_as_string, Lookups};

/// Protocol-shaped strings: two to four leading letters followed by six or
/// more digits (e.g. `ITL20250101xxxx`).
static PROTOCOL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{2,4}\d{6,}").expect("valid protocol pattern"));

/// Placeholder words the upstream uses instead of a real name.
const PLACEHOLDER_NAMES: &[&str] = &["cliente", "anonimo"];

/// Resolves the best available display label for the customer on a ticket.
///
/// Never returns an empty string: the final fallbacks are the protocol and
/// a synthetic label derived from the ticket id.
pub fn resolve_client_name(
    raw: &Value,
    ticket_id: &str,
    protocol: &str,
    lookups: &Lookups,
) -> String {
    for candidate in name_candidates(raw, lookups) {
        if !is_junk(&candidate, protocol) {
            return candidate;
        }
    }

    if let Some(phone) = phone_candidate(raw, lookups) {
        return format_phone(&phone);
    }

    if !protocol.is_empty() {
        return protocol.to_string();
    }

    format!("Atendimento {}", ticket_id)
}

/// Collects name candidates in waterfall priority order.
fn name_candidates(raw: &Value, lookups: &Lookups) -> Vec<String> {
    let mut candidates = Vec::new();
    let mut push = |v: Option<String>| {
        if let Some(v) = v {
            candidates.push(v);
        }
    };

    // 1. Embedded customer object
    if let Some(client) = raw.get("id_cliente").filter(|v| v.is_object()) {
        push(value_as_string(client.get("nome")));
        push(value_as_string(client.get("razao_social")));
    }

    // 2. Embedded contact object
    if let Some(contact) = raw.get("id_contato").filter(|v| v.is_object()) {
        push(value_as_string(contact.get("nome")));
    }

    // 3. Foreign-key lookups against side-loaded tables
    if let Some(id) = scalar_ref(raw, "id_cliente") {
        push(lookups.clients.get(&id).and_then(|c| c.name.clone()));
    }
    if let Some(id) = scalar_ref(raw, "id_contato") {
        push(lookups.contacts.get(&id).and_then(|c| c.name.clone()));
    }

    // 4. Flat legacy fields on the ticket itself
    push(value_as_string(raw.get("cliente_nome")));
    push(value_as_string(raw.get("contato_nome")));
    push(value_as_string(raw.get("nome")));

    candidates
}

/// Rejects candidates that are placeholders, protocol codes, or raw ids.
fn is_junk(candidate: &str, protocol: &str) -> bool {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return true;
    }
    if PLACEHOLDER_NAMES
        .iter()
        .any(|p| candidate.eq_ignore_ascii_case(p))
    {
        return true;
    }
    if !protocol.is_empty() && (candidate == protocol || candidate.contains(protocol)) {
        return true;
    }
    if PROTOCOL_PATTERN.is_match(candidate) {
        return true;
    }
    // A long purely-numeric string is an internal id, not a name.
    if candidate.len() >= 10 && candidate.bytes().all(|b| b.is_ascii_digit()) {
        return true;
    }
    false
}

/// Picks the first available phone number for the ticket.
///
/// Chat-channel identifiers (`5573988887777@c.us`) have their transport
/// suffix stripped.
fn phone_candidate(raw: &Value, lookups: &Lookups) -> Option<String> {
    if let Some(id) = scalar_ref(raw, "id_cliente") {
        if let Some(phone) = lookups.clients.get(&id).and_then(|c| c.phone.clone()) {
            return Some(phone);
        }
    }
    if let Some(id) = scalar_ref(raw, "id_contato") {
        if let Some(phone) = lookups.contacts.get(&id).and_then(|c| c.phone.clone()) {
            return Some(phone);
        }
    }
    if let Some(contact) = raw.get("id_contato").filter(|v| v.is_object()) {
        if let Some(phone) = value_as_string(contact.get("fone")) {
            return Some(phone);
        }
    }
    if let Some(client) = raw.get("id_cliente").filter(|v| v.is_object()) {
        if let Some(phone) = value_as_string(client.get("fone")) {
            return Some(phone);
        }
    }
    if let Some(phone) = value_as_string(raw.get("contato_fone"))
        .or_else(|| value_as_string(raw.get("fone")))
        .or_else(|| value_as_string(raw.get("telefone")))
    {
        return Some(phone);
    }
    // Chat channel id, e.g. "5573988887777@c.us"
    value_as_string(raw.get("canal_cliente"))
        .map(|c| c.split('@').next().unwrap_or("").to_string())
        .filter(|c| !c.is_empty())
}

/// Formats a purely numeric phone of eight or more digits into the national
/// `(DD) NNNNN-NNNN` / `(DD) NNNN-NNNN` form; everything else passes
/// through unchanged.
fn format_phone(raw: &str) -> String {
    if raw.len() < 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.to_string();
    }

    // Strip the country code when what remains is a full national number.
    let local = match raw.strip_prefix("55") {
        Some(rest) if rest.len() == 10 || rest.len() == 11 => rest,
        _ => raw,
    };

    match local.len() {
        11 => format!("({}) {}-{}", &local[..2], &local[2..7], &local[7..]),
        10 => format!("({}) {}-{}", &local[..2], &local[2..6], &local[6..]),
        _ => raw.to_string(),
    }
}

/// Returns the field's value as a foreign-key id when it is a scalar.
fn scalar_ref(raw: &Value, field: &str) -> Option<String> {
    raw.get(field)
        .filter(|v| !v.is_object())
        .and_then(|v| value_as_string(Some(v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::lookup::ContactInfo;
    use serde_json::json;

    fn empty_lookups() -> Lookups {
        Lookups::default()
    }

    #[test]
    fn test_embedded_client_name_wins() {
        let raw = json!({"id_cliente": {"nome": "Maria Souza"}, "nome": "ignored"});
        let name = resolve_client_name(&raw, "t1", "ITL202401010001", &empty_lookups());
        assert_eq!(name, "Maria Souza");
    }

    #[test]
    fn test_razao_social_fallback() {
        let raw = json!({"id_cliente": {"razao_social": "ACME Ltda"}});
        assert_eq!(
            resolve_client_name(&raw, "t1", "", &empty_lookups()),
            "ACME Ltda"
        );
    }

    #[test]
    fn test_foreign_key_lookup() {
        let mut lookups = empty_lookups();
        lookups.clients.insert(
            "c9".to_string(),
            ContactInfo {
                name: Some("Pedro Lima".to_string()),
                phone: None,
            },
        );
        let raw = json!({"id_cliente": "c9"});
        assert_eq!(
            resolve_client_name(&raw, "t1", "", &lookups),
            "Pedro Lima"
        );
    }

    #[test]
    fn test_protocol_shaped_name_rejected_falls_to_phone() {
        // Spec scenario: protocol-looking name plus chat-channel phone.
        let raw = json!({
            "id_cliente": {"nome": "ITL202401010001"},
            "canal_cliente": "5573988887777@c.us"
        });
        let name = resolve_client_name(&raw, "t1", "PROTO1", &empty_lookups());
        assert_eq!(name, "(73) 98888-7777");
    }

    #[test]
    fn test_placeholder_names_rejected() {
        for junk in ["Cliente", "ANONIMO", "  cliente "] {
            assert!(is_junk(junk, ""), "{junk:?} should be junk");
        }
        assert!(!is_junk("Clientela SA", ""));
    }

    #[test]
    fn test_candidate_equal_or_containing_protocol_rejected() {
        assert!(is_junk("AB123456", "AB123456"));
        assert!(is_junk("ref AB123456 cliente", "AB123456"));
        assert!(!is_junk("Alberto", "AB123456"));
    }

    #[test]
    fn test_long_numeric_id_rejected() {
        assert!(is_junk("5573988887777", ""));
        assert!(is_junk("1234567890", ""));
        // Nine digits could be a legitimate short label; keep it.
        assert!(!is_junk("123456789", ""));
    }

    #[test]
    fn test_protocol_pattern_shapes() {
        assert!(is_junk("ITL20250101xxxx", ""));
        assert!(is_junk("AB123456", ""));
        assert!(!is_junk("A123456", ""));
        assert!(!is_junk("ABCDE123456", ""));
        assert!(!is_junk("AB12345", ""));
    }

    #[test]
    fn test_phone_formatting_11_digit_local() {
        assert_eq!(format_phone("73988887777"), "(73) 98888-7777");
    }

    #[test]
    fn test_phone_formatting_10_digit_local() {
        assert_eq!(format_phone("7388887777"), "(73) 8888-7777");
    }

    #[test]
    fn test_phone_formatting_strips_country_code() {
        assert_eq!(format_phone("5573988887777"), "(73) 98888-7777");
        assert_eq!(format_phone("557388887777"), "(73) 8888-7777");
    }

    #[test]
    fn test_phone_odd_lengths_pass_through() {
        assert_eq!(format_phone("12345678"), "12345678");
        assert_eq!(format_phone("+55 73 98888-7777"), "+55 73 98888-7777");
    }

    #[test]
    fn test_flat_phone_fields() {
        let raw = json!({"nome": "Cliente", "contato_fone": "73988887777"});
        assert_eq!(
            resolve_client_name(&raw, "t1", "", &empty_lookups()),
            "(73) 98888-7777"
        );
    }

    #[test]
    fn test_protocol_fallback() {
        let raw = json!({});
        assert_eq!(
            resolve_client_name(&raw, "t1", "AB123456", &empty_lookups()),
            "AB123456"
        );
    }

    #[test]
    fn test_synthetic_last_resort() {
        let raw = json!({});
        assert_eq!(
            resolve_client_name(&raw, "abc123", "", &empty_lookups()),
            "Atendimento abc123"
        );
    }

    #[test]
    fn test_result_never_matches_protocol_pattern_as_name() {
        // Even when every candidate is protocol-shaped, the output is the
        // protocol fallback, reported as such, never adopted as a name.
        let raw = json!({"nome": "XY9999999"});
        let resolved = resolve_client_name(&raw, "t1", "AB123456", &empty_lookups());
        assert_eq!(resolved, "AB123456");
    }
}
