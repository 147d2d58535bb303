//! Mapping engine
//!
//! Pure value/record transformation: resolves an external field/value pair to
//! an internal field/value using ordered, app-scoped substitution rules.
//! Unmapped values pass through unchanged; unmapped input is a valid, common
//! case, never an error.

use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::models::remote_field;

/// Internal target entity types a remote application can map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    People,
    Visas,
    Meetings,
    SupportRecords,
}

#[derive(Debug, Clone, Error)]
#[error("unknown target type '{0}'")]
pub struct UnknownTargetType(pub String);

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::People => "people",
            TargetType::Visas => "visas",
            TargetType::Meetings => "meetings",
            TargetType::SupportRecords => "support_records",
        }
    }

    pub fn all() -> &'static [TargetType] {
        &[
            TargetType::People,
            TargetType::Visas,
            TargetType::Meetings,
            TargetType::SupportRecords,
        ]
    }
}

impl std::fmt::Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TargetType {
    type Err = UnknownTargetType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "people" => Ok(TargetType::People),
            "visas" => Ok(TargetType::Visas),
            "meetings" => Ok(TargetType::Meetings),
            "support_records" => Ok(TargetType::SupportRecords),
            other => Err(UnknownTargetType(other.to_string())),
        }
    }
}

/// Known remote field kinds, resolved once from the schema cache.
///
/// Unrecognized provider types are carried explicitly instead of failing
/// mapping creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFieldKind {
    SingleLineText,
    MultiLineText,
    Number,
    Date,
    DateTime,
    DropDown,
    RadioButton,
    CheckBox,
    UserSelect,
    Unknown { code: String },
}

impl RemoteFieldKind {
    /// Resolve a provider-reported type string.
    pub fn from_remote(type_str: &str) -> Self {
        match type_str {
            "SINGLE_LINE_TEXT" => RemoteFieldKind::SingleLineText,
            "MULTI_LINE_TEXT" => RemoteFieldKind::MultiLineText,
            "NUMBER" => RemoteFieldKind::Number,
            "DATE" => RemoteFieldKind::Date,
            "DATETIME" => RemoteFieldKind::DateTime,
            "DROP_DOWN" => RemoteFieldKind::DropDown,
            "RADIO_BUTTON" => RemoteFieldKind::RadioButton,
            "CHECK_BOX" => RemoteFieldKind::CheckBox,
            "USER_SELECT" => RemoteFieldKind::UserSelect,
            other => RemoteFieldKind::Unknown {
                code: other.to_string(),
            },
        }
    }

    /// Stored form of the kind; `Unknown` keeps the raw provider code.
    pub fn as_stored(&self) -> &str {
        match self {
            RemoteFieldKind::SingleLineText => "SINGLE_LINE_TEXT",
            RemoteFieldKind::MultiLineText => "MULTI_LINE_TEXT",
            RemoteFieldKind::Number => "NUMBER",
            RemoteFieldKind::Date => "DATE",
            RemoteFieldKind::DateTime => "DATETIME",
            RemoteFieldKind::DropDown => "DROP_DOWN",
            RemoteFieldKind::RadioButton => "RADIO_BUTTON",
            RemoteFieldKind::CheckBox => "CHECK_BOX",
            RemoteFieldKind::UserSelect => "USER_SELECT",
            RemoteFieldKind::Unknown { code } => code,
        }
    }
}

/// One value substitution rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRule {
    pub source: String,
    pub target: String,
    pub is_active: bool,
    pub sort_order: i32,
}

/// One field mapping with its value rules, ready for record transformation.
#[derive(Debug, Clone)]
pub struct FieldMappingSpec {
    pub field_code: String,
    pub target_field: String,
    pub kind: RemoteFieldKind,
    pub is_update_key: bool,
    /// Rules pre-sorted by sort order; may contain inactive entries
    pub rules: Vec<ValueRule>,
}

/// Stringify a raw value the way rule sources are compared.
pub fn stringify(raw: &JsonValue) -> String {
    match raw {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Map one raw value through an ordered rule list.
///
/// Inactive rules are excluded before the scan; the first active rule whose
/// source equals the stringified raw value wins. No match returns the raw
/// value unchanged.
pub fn map_value(raw: &JsonValue, rules: &[ValueRule]) -> JsonValue {
    let needle = stringify(raw);

    rules
        .iter()
        .filter(|rule| rule.is_active)
        .find(|rule| rule.source == needle)
        .map(|rule| JsonValue::String(rule.target.clone()))
        .unwrap_or_else(|| raw.clone())
}

/// Map a whole raw record through the declared field mappings.
///
/// Declared fields are renamed to their internal target field and value
/// mapped; fields without a declaration pass through untouched.
pub fn map_record(
    raw: &Map<String, JsonValue>,
    mappings: &[FieldMappingSpec],
) -> Map<String, JsonValue> {
    let mut out = Map::with_capacity(raw.len());

    for (code, value) in raw {
        match mappings.iter().find(|m| &m.field_code == code) {
            Some(mapping) => {
                out.insert(
                    mapping.target_field.clone(),
                    map_value(value, &mapping.rules),
                );
            }
            None => {
                out.insert(code.clone(), value.clone());
            }
        }
    }

    out
}

/// Look up a field's kind in the schema cache, falling back to `Unknown`
/// rather than failing mapping creation.
pub fn infer_field_kind(
    schema: &[remote_field::Model],
    app_id: &str,
    field_code: &str,
) -> RemoteFieldKind {
    schema
        .iter()
        .find(|field| field.app_id == app_id && field.field_code == field_code)
        .map(|field| RemoteFieldKind::from_remote(&field.field_type))
        .unwrap_or(RemoteFieldKind::Unknown {
            code: String::new(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(source: &str, target: &str, is_active: bool, sort_order: i32) -> ValueRule {
        ValueRule {
            source: source.to_string(),
            target: target.to_string(),
            is_active,
            sort_order,
        }
    }

    #[test]
    fn first_active_match_wins() {
        let rules = vec![
            rule("a", "first", true, 0),
            rule("a", "second", true, 1),
        ];

        assert_eq!(map_value(&json!("a"), &rules), json!("first"));
    }

    #[test]
    fn inactive_rules_excluded_even_when_interleaved() {
        let rules = vec![
            rule("a", "inactive-winner", false, 0),
            rule("b", "unrelated", true, 1),
            rule("a", "active-winner", true, 2),
        ];

        assert_eq!(map_value(&json!("a"), &rules), json!("active-winner"));
    }

    #[test]
    fn unmapped_value_passes_through_unchanged() {
        let rules = vec![rule("known", "mapped", true, 0)];

        assert_eq!(map_value(&json!("未知の値"), &rules), json!("未知の値"));
        assert_eq!(map_value(&json!(42), &rules), json!(42));
        assert_eq!(map_value(&JsonValue::Null, &rules), JsonValue::Null);
    }

    #[test]
    fn status_substitution_scenario() {
        let rules = vec![
            rule("営業_企業情報待ち", "書類準備中", true, 0),
            rule("申請中", "申請中", true, 1),
        ];

        assert_eq!(map_value(&json!("営業_企業情報待ち"), &rules), json!("書類準備中"));
        assert_eq!(map_value(&json!("申請中"), &rules), json!("申請中"));
        assert_eq!(map_value(&json!("未知の値"), &rules), json!("未知の値"));
    }

    #[test]
    fn numbers_match_rules_by_stringified_form() {
        let rules = vec![rule("1", "active", true, 0)];

        assert_eq!(map_value(&json!(1), &rules), json!("active"));
        assert_eq!(map_value(&json!("1"), &rules), json!("active"));
    }

    #[test]
    fn map_record_transforms_declared_and_keeps_rest() {
        let mappings = vec![FieldMappingSpec {
            field_code: "ステータス".to_string(),
            target_field: "status".to_string(),
            kind: RemoteFieldKind::DropDown,
            is_update_key: false,
            rules: vec![rule("営業_企業情報待ち", "書類準備中", true, 0)],
        }];

        let mut raw = Map::new();
        raw.insert("ステータス".to_string(), json!("営業_企業情報待ち"));
        raw.insert("備考".to_string(), json!("keep me"));

        let mapped = map_record(&raw, &mappings);

        assert_eq!(mapped.get("status"), Some(&json!("書類準備中")));
        assert_eq!(mapped.get("備考"), Some(&json!("keep me")));
        assert!(!mapped.contains_key("ステータス"));
    }

    #[test]
    fn field_kind_resolution_keeps_unknown_code() {
        assert_eq!(
            RemoteFieldKind::from_remote("DROP_DOWN"),
            RemoteFieldKind::DropDown
        );

        let unknown = RemoteFieldKind::from_remote("SUBTABLE");
        assert_eq!(
            unknown,
            RemoteFieldKind::Unknown {
                code: "SUBTABLE".to_string()
            }
        );
        assert_eq!(unknown.as_stored(), "SUBTABLE");
    }

    #[test]
    fn target_type_parsing() {
        use std::str::FromStr;

        assert_eq!(TargetType::from_str("people").unwrap(), TargetType::People);
        assert_eq!(TargetType::from_str("visas").unwrap(), TargetType::Visas);
        assert!(TargetType::from_str("invoices").is_err());
    }
}
