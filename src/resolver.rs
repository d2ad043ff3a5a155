//! Numeric identity column resolution.
//!
//! Picks which column of a table holds its numeric row id. The default
//! strategy is a fixed ordering of heuristics; per-table hints can override
//! it for tables whose id column is known up front.

use ahash::AHashMap;

/// Identity columns known for legacy tables whose naming predates the
/// `<table>_id` convention.
const TABLE_ID_HINTS: &[(&str, &str)] = &[
    ("tbl_schedule", "id"),
    ("tbl_schedtime", "id"),
    ("tbl_closedscheds", "id"),
    ("tbl_trouble", "id"),
    ("tbl_machinerequest", "id"),
    ("tbl_newmachinerepair", "id"),
    ("tbl_newmachinehistory", "id"),
    ("tbl_companylist", "id"),
    ("tbl_branchinfo", "id"),
    ("tbl_machine", "id"),
    ("tbl_contractmain", "id"),
    ("tbl_billinfo", "id"),
];

/// Identity names that show up across the legacy schema without following
/// any derivable pattern.
const LEGACY_ID_NAMES: &[&str] = &["request_id", "collection_id", "billing_id", "bill_id"];

const TABLE_NAME_PREFIX: &str = "tbl_";

pub struct IdResolver {
    hints: AHashMap<String, String>,
}

impl Default for IdResolver {
    fn default() -> Self {
        let hints = TABLE_ID_HINTS
            .iter()
            .map(|(table, column)| (table.to_string(), column.to_string()))
            .collect();
        Self { hints }
    }
}

impl IdResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or overrides a per-table hint.
    pub fn with_hint(mut self, table: &str, column: &str) -> Self {
        self.hints.insert(table.to_string(), column.to_string());
        self
    }

    /// Resolves the id column for `table` given its known columns, or `None`
    /// when the column list is empty.
    pub fn resolve(
        &self,
        table: &str,
        columns: &[String],
        auto_increment: Option<&str>,
    ) -> Option<String> {
        if columns.is_empty() {
            return None;
        }

        let contains = |name: &str| columns.iter().any(|c| c == name);

        if let Some(hinted) = self.hints.get(table) {
            if contains(hinted) {
                return Some(hinted.clone());
            }
        }

        if let Some(auto) = auto_increment {
            if contains(auto) {
                return Some(auto.to_string());
            }
        }

        let stripped = table.strip_prefix(TABLE_NAME_PREFIX).unwrap_or(table);
        let derived = [format!("{table}_id"), format!("{stripped}_id")];
        let candidates = std::iter::once("id")
            .chain(derived.iter().map(String::as_str))
            .chain(LEGACY_ID_NAMES.iter().copied());

        for candidate in candidates {
            if contains(candidate) {
                return Some(candidate.to_string());
            }
        }

        if let Some(suffixed) = columns.iter().find(|c| c.to_lowercase().ends_with("_id")) {
            return Some(suffixed.clone());
        }

        columns.first().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn hint_wins_over_everything() {
        let resolver = IdResolver::new();
        let columns = cols(&["billinfo_id", "id"]);
        assert_eq!(
            resolver.resolve("tbl_billinfo", &columns, Some("billinfo_id")),
            Some("id".to_string())
        );
    }

    #[test]
    fn auto_increment_beats_name_candidates() {
        let resolver = IdResolver::new();
        let columns = cols(&["id", "seq"]);
        assert_eq!(
            resolver.resolve("tbl_unknown", &columns, Some("seq")),
            Some("seq".to_string())
        );
    }

    #[test]
    fn plain_id_candidate() {
        let resolver = IdResolver::new();
        assert_eq!(
            resolver.resolve("tbl_delivery", &cols(&["id", "name"]), None),
            Some("id".to_string())
        );
    }

    #[test]
    fn prefix_stripped_candidate() {
        let resolver = IdResolver::new();
        assert_eq!(
            resolver.resolve("tbl_delivery", &cols(&["delivery_id", "name"]), None),
            Some("delivery_id".to_string())
        );
    }

    #[test]
    fn legacy_name_candidate() {
        let resolver = IdResolver::new();
        assert_eq!(
            resolver.resolve("tbl_or", &cols(&["amount", "collection_id"]), None),
            Some("collection_id".to_string())
        );
    }

    #[test]
    fn any_id_suffix_then_first_column() {
        let resolver = IdResolver::new();
        assert_eq!(
            resolver.resolve("tbl_x", &cols(&["name", "ref_id"]), None),
            Some("ref_id".to_string())
        );
        assert_eq!(
            resolver.resolve("tbl_x", &cols(&["name", "value"]), None),
            Some("name".to_string())
        );
    }

    #[test]
    fn empty_columns_resolve_to_none() {
        let resolver = IdResolver::new();
        assert_eq!(resolver.resolve("tbl_x", &[], None), None);
    }

    #[test]
    fn custom_hint_overrides_default() {
        let resolver = IdResolver::new().with_hint("tbl_x", "serial_no");
        assert_eq!(
            resolver.resolve("tbl_x", &cols(&["id", "serial_no"]), None),
            Some("serial_no".to_string())
        );
    }
}
