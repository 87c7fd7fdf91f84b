//! Lookup tables built from side-loaded reference lists.
//!
//! Agent, department, client, and contact lists arrive alongside the ticket
//! batch. Each `reconcile` call builds its lookup maps locally from those
//! lists - never module-level state - so concurrent invocations cannot
//! interfere.

use std::collections::HashMap;

use serde_json::Value;

/// Name and phone extracted from a client or contact record.
#[derive(Debug, Clone, Default)]
pub struct ContactInfo {
    /// Display name, if the record carries one.
    pub name: Option<String>,
    /// Phone number, if the record carries one.
    pub phone: Option<String>,
}

/// Per-call lookup maps, built once at the start of each reconciliation.
#[derive(Debug, Default)]
pub struct Lookups {
    /// Agent id to display name.
    pub agents: HashMap<String, String>,
    /// Department id to display name.
    pub departments: HashMap<String, String>,
    /// Client id to name/phone.
    pub clients: HashMap<String, ContactInfo>,
    /// Contact id to name/phone.
    pub contacts: HashMap<String, ContactInfo>,
}

impl Lookups {
    /// Builds all lookup maps in a single pass over each reference list.
    pub fn build(
        agents: &[Value],
        departments: &[Value],
        clients: &[Value],
        contacts: &[Value],
    ) -> Self {
        Lookups {
            agents: build_name_map(agents, &["nome", "name"]),
            departments: build_name_map(departments, &["nome", "name"]),
            clients: build_contact_map(clients),
            contacts: build_contact_map(contacts),
        }
    }
}

/// Extracts the record id, accepting `_id` or `id`, string or numeric.
pub fn record_id(raw: &Value) -> Option<String> {
    value_as_string(raw.get("_id")).or_else(|| value_as_string(raw.get("id")))
}

/// Coerces a scalar JSON value to a trimmed, non-empty string.
///
/// Strings and numbers qualify; objects, arrays, booleans, and null do not.
pub fn value_as_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Builds an id-to-name map from a raw record list.
fn build_name_map(records: &[Value], name_fields: &[&str]) -> HashMap<String, String> {
    let mut map = HashMap::with_capacity(records.len());
    for record in records {
        let Some(id) = record_id(record) else {
            continue;
        };
        if let Some(name) = first_field(record, name_fields) {
            map.insert(id, name);
        }
    }
    map
}

/// Builds an id-to-{name, phone} map from a raw client/contact list.
fn build_contact_map(records: &[Value]) -> HashMap<String, ContactInfo> {
    let mut map = HashMap::with_capacity(records.len());
    for record in records {
        let Some(id) = record_id(record) else {
            continue;
        };
        map.insert(
            id,
            ContactInfo {
                name: first_field(record, &["nome", "razao_social", "name"]),
                phone: first_field(record, &["fone", "telefone", "celular"]),
            },
        );
    }
    map
}

/// Returns the first aliased field that coerces to a usable string.
pub fn first_field(record: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|f| value_as_string(record.get(*f)))
}

/// Resolves an agent or department reference to a display name.
///
/// An embedded object wins if it carries one of the name fields directly;
/// otherwise the reference is treated as a foreign key and looked up in
/// the per-call map. Unresolvable references yield `None`.
pub fn resolve_ref_name(
    reference: Option<&Value>,
    map: &HashMap<String, String>,
    name_fields: &[&str],
) -> Option<String> {
    let reference = reference?;
    if reference.is_object() {
        if let Some(name) = first_field(reference, name_fields) {
            return Some(name);
        }
        // Populated object without a name field: fall back to its id.
        return record_id(reference).and_then(|id| map.get(&id).cloned());
    }
    value_as_string(Some(reference)).and_then(|id| map.get(&id).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_id_variants() {
        assert_eq!(record_id(&json!({"_id": "abc"})), Some("abc".to_string()));
        assert_eq!(record_id(&json!({"id": 42})), Some("42".to_string()));
        assert_eq!(record_id(&json!({"nome": "x"})), None);
    }

    #[test]
    fn test_value_as_string_rejects_non_scalars() {
        assert_eq!(value_as_string(Some(&json!("  ok  "))), Some("ok".to_string()));
        assert_eq!(value_as_string(Some(&json!(7))), Some("7".to_string()));
        assert_eq!(value_as_string(Some(&json!(""))), None);
        assert_eq!(value_as_string(Some(&json!(null))), None);
        assert_eq!(value_as_string(Some(&json!({"a": 1}))), None);
        assert_eq!(value_as_string(None), None);
    }

    #[test]
    fn test_build_lookups() {
        let agents = vec![json!({"_id": "1", "nome": "Ana"}), json!({"id": 2, "name": "Bruno"})];
        let departments = vec![json!({"_id": "d1", "nome": "Financeiro"})];
        let clients = vec![json!({"_id": "c1", "razao_social": "ACME SA", "fone": "7399990000"})];
        let contacts = vec![json!({"_id": "ct1", "nome": "Davi", "telefone": "7398880000"})];

        let lookups = Lookups::build(&agents, &departments, &clients, &contacts);

        assert_eq!(lookups.agents.get("1"), Some(&"Ana".to_string()));
        assert_eq!(lookups.agents.get("2"), Some(&"Bruno".to_string()));
        assert_eq!(lookups.departments.get("d1"), Some(&"Financeiro".to_string()));
        assert_eq!(
            lookups.clients.get("c1").unwrap().name.as_deref(),
            Some("ACME SA")
        );
        assert_eq!(
            lookups.contacts.get("ct1").unwrap().phone.as_deref(),
            Some("7398880000")
        );
    }

    #[test]
    fn test_records_without_id_are_skipped() {
        let agents = vec![json!({"nome": "SemId"})];
        let lookups = Lookups::build(&agents, &[], &[], &[]);
        assert!(lookups.agents.is_empty());
    }

    #[test]
    fn test_resolve_ref_embedded_object() {
        let map = HashMap::new();
        let reference = json!({"_id": "9", "nome": "Suporte N2"});
        assert_eq!(
            resolve_ref_name(Some(&reference), &map, &["nome"]),
            Some("Suporte N2".to_string())
        );
    }

    #[test]
    fn test_resolve_ref_foreign_key() {
        let mut map = HashMap::new();
        map.insert("9".to_string(), "Suporte N2".to_string());
        assert_eq!(
            resolve_ref_name(Some(&json!("9")), &map, &["nome"]),
            Some("Suporte N2".to_string())
        );
        assert_eq!(
            resolve_ref_name(Some(&json!(9)), &map, &["nome"]),
            Some("Suporte N2".to_string())
        );
    }

    #[test]
    fn test_resolve_ref_object_without_name_falls_back_to_id() {
        let mut map = HashMap::new();
        map.insert("9".to_string(), "Suporte N2".to_string());
        let reference = json!({"_id": "9"});
        assert_eq!(
            resolve_ref_name(Some(&reference), &map, &["nome"]),
            Some("Suporte N2".to_string())
        );
    }

    #[test]
    fn test_resolve_ref_unresolvable() {
        let map = HashMap::new();
        assert_eq!(resolve_ref_name(None, &map, &["nome"]), None);
        assert_eq!(resolve_ref_name(Some(&json!("missing")), &map, &["nome"]), None);
        assert_eq!(resolve_ref_name(Some(&json!(null)), &map, &["nome"]), None);
    }
}
