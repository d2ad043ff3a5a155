//! Business-module table presets.
//!
//! Named groupings of operational tables used for run scoping and for
//! reporting which modules a smart-scope discovery touches.

use crate::parser::statement::normalize_table_name;

pub struct Preset {
    pub key: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub default_on: bool,
    pub tables: &'static [&'static str],
}

pub const PRESETS: &[Preset] = &[
    Preset {
        key: "billing",
        label: "Billing",
        description: "Billing and invoice related tables",
        default_on: true,
        tables: &[
            "tbl_billinfo",
            "tbl_billout",
            "tbl_billoutparticular",
            "tbl_billoutparticulars",
            "tbl_billing",
        ],
    },
    Preset {
        key: "collections",
        label: "Collections",
        description: "Collections and payment related tables",
        default_on: true,
        tables: &[
            "tbl_collection",
            "tbl_collectiondetails",
            "tbl_paymentinfo",
            "tbl_or",
            "tbl_check",
        ],
    },
    Preset {
        key: "service",
        label: "Service / Dispatch",
        description: "Dispatch schedules, execution logs, requests, and service history",
        default_on: true,
        tables: &[
            "tbl_schedule",
            "tbl_schedtime",
            "tbl_closedscheds",
            "tbl_trouble",
            "tbl_mstatus",
            "tbl_machinerequest",
            "tbl_newmachinerepair",
            "tbl_newmachinehistory",
        ],
    },
    Preset {
        key: "deliveries",
        label: "Deliveries",
        description: "Dispatch and delivery operations",
        default_on: true,
        tables: &["tbl_dispatchment", "tbl_delivery", "tbl_pullout"],
    },
    Preset {
        key: "core",
        label: "Core Master Data",
        description: "Companies, branches, contracts, machines",
        default_on: false,
        tables: &["tbl_companylist", "tbl_branchinfo", "tbl_contractmain", "tbl_machine"],
    },
];

pub fn find(key: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.key == key)
}

/// Tables of all default-on presets, sorted and deduplicated.
pub fn default_tables() -> Vec<String> {
    let mut tables: Vec<String> = PRESETS
        .iter()
        .filter(|p| p.default_on)
        .flat_map(|p| p.tables.iter().map(|t| normalize_table_name(t)))
        .collect();
    tables.sort();
    tables.dedup();
    tables
}

/// Labels of the presets that contain any of the given tables.
pub fn modules_for_tables(tables: &[String]) -> Vec<String> {
    let mut labels: Vec<String> = PRESETS
        .iter()
        .filter(|p| {
            p.tables
                .iter()
                .any(|t| tables.iter().any(|x| x == &normalize_table_name(t)))
        })
        .map(|p| p.label.to_string())
        .collect();
    labels.sort();
    labels
}

/// Expands a set of changed tables to full module scope: every preset with a
/// changed member contributes all of its tables. Tables outside any preset
/// stay in the scope as-is.
pub fn expand_to_module_scope(changed: &[String]) -> Vec<String> {
    let mut scope: Vec<String> = changed.iter().map(|t| normalize_table_name(t)).collect();

    for preset in PRESETS {
        let touched = preset
            .tables
            .iter()
            .any(|t| scope.iter().any(|x| x == &normalize_table_name(t)));
        if touched {
            scope.extend(preset.tables.iter().map(|t| normalize_table_name(t)));
        }
    }

    scope.sort();
    scope.dedup();
    scope
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tables_cover_default_on_presets_only() {
        let tables = default_tables();
        assert!(tables.contains(&"tbl_billing".to_string()));
        assert!(tables.contains(&"tbl_delivery".to_string()));
        // core is default-off
        assert!(!tables.contains(&"tbl_machine".to_string()));
    }

    #[test]
    fn module_labels_for_changed_tables() {
        let changed = vec!["tbl_collection".to_string(), "tbl_delivery".to_string()];
        assert_eq!(modules_for_tables(&changed), vec!["Collections", "Deliveries"]);
    }

    #[test]
    fn scope_expansion_pulls_in_whole_preset() {
        let changed = vec!["tbl_pullout".to_string(), "tbl_custom".to_string()];
        let scope = expand_to_module_scope(&changed);
        assert!(scope.contains(&"tbl_dispatchment".to_string()));
        assert!(scope.contains(&"tbl_delivery".to_string()));
        assert!(scope.contains(&"tbl_custom".to_string()));
    }
}
