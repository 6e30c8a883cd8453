//! Configuration-store row types and the [`ConfigStore`] trait.
//!
//! The core never binds directly to a particular configuration transport;
//! it consumes rows shaped like these three tables and writes a handful of
//! them back. `ConfigStore` is the seam: a real deployment backs it with an
//! OVSDB client, tests back it with [`FixtureConfigStore`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IotRuleConfigRow {
    pub name: String,
    pub event: String,
    pub filter_keys: Vec<String>,
    pub filter: Vec<String>,
    pub params_keys: Vec<String>,
    pub params: Vec<String>,
    pub actions_keys: Vec<String>,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IotManagerConfigRow {
    pub handler: String,
    pub plugin: Option<String>,
    pub other_config_keys: Vec<String>,
    pub other_config: Vec<String>,
}

impl IotManagerConfigRow {
    pub fn other_config_map(&self) -> std::collections::HashMap<String, String> {
        self.other_config_keys
            .iter()
            .cloned()
            .zip(self.other_config.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpenflowTagRow {
    pub name: String,
    pub device_value: Vec<String>,
    pub cloud_value: Vec<String>,
}

/// MQTT header strings cached on the manager and referenced by every
/// session, per §6's "copied by reference into every Session."
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AwlanNodeRow {
    pub location_id: String,
    pub node_id: String,
}

/// What changed when a row monitor fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowChangeKind {
    Inserted,
    Modified,
    Deleted,
}

/// The external configuration store's read surface plus the write-backs
/// the core issues. A real implementation talks to OVSDB; tests use
/// [`FixtureConfigStore`].
pub trait ConfigStore: Send + Sync {
    fn rule_rows(&self) -> Vec<IotRuleConfigRow>;
    fn manager_rows(&self) -> Vec<IotManagerConfigRow>;
    fn tag_rows(&self) -> Vec<OpenflowTagRow>;
    fn awlan_node(&self) -> Option<AwlanNodeRow>;

    /// Upsert a tag row by `name`.
    fn upsert_tag(&self, row: OpenflowTagRow);
    /// Mark-all-present upsert keyed by `name`.
    fn upsert_rules(&self, rows: Vec<IotRuleConfigRow>);
    /// Delete by `name`.
    fn remove_rules(&self, rows: Vec<IotRuleConfigRow>);
}

/// In-memory [`ConfigStore`] used by tests and the example binary. Carries
/// no persistence of its own — restarting the process loses everything, as
/// §6 says every real backing store should expect of the core.
#[derive(Default)]
pub struct FixtureConfigStore {
    inner: parking_lot::Mutex<FixtureState>,
}

#[derive(Default)]
struct FixtureState {
    rules: Vec<IotRuleConfigRow>,
    managers: Vec<IotManagerConfigRow>,
    tags: Vec<OpenflowTagRow>,
    awlan: Option<AwlanNodeRow>,
}

impl FixtureConfigStore {
    pub fn new() -> Self {
        FixtureConfigStore::default()
    }

    pub fn with_rule(self, row: IotRuleConfigRow) -> Self {
        self.inner.lock().rules.push(row);
        self
    }

    pub fn with_manager(self, row: IotManagerConfigRow) -> Self {
        self.inner.lock().managers.push(row);
        self
    }

    pub fn with_tag(self, row: OpenflowTagRow) -> Self {
        self.inner.lock().tags.push(row);
        self
    }

    pub fn with_awlan(self, row: AwlanNodeRow) -> Self {
        self.inner.lock().awlan = Some(row);
        self
    }
}

impl ConfigStore for FixtureConfigStore {
    fn rule_rows(&self) -> Vec<IotRuleConfigRow> {
        self.inner.lock().rules.clone()
    }

    fn manager_rows(&self) -> Vec<IotManagerConfigRow> {
        self.inner.lock().managers.clone()
    }

    fn tag_rows(&self) -> Vec<OpenflowTagRow> {
        self.inner.lock().tags.clone()
    }

    fn awlan_node(&self) -> Option<AwlanNodeRow> {
        self.inner.lock().awlan.clone()
    }

    fn upsert_tag(&self, row: OpenflowTagRow) {
        let mut state = self.inner.lock();
        state.tags.retain(|t| t.name != row.name);
        state.tags.push(row);
    }

    fn upsert_rules(&self, rows: Vec<IotRuleConfigRow>) {
        let mut state = self.inner.lock();
        for row in rows {
            state.rules.retain(|r| r.name != row.name);
            state.rules.push(row);
        }
    }

    fn remove_rules(&self, rows: Vec<IotRuleConfigRow>) {
        let mut state = self.inner.lock();
        let names: std::collections::HashSet<_> = rows.into_iter().map(|r| r.name).collect();
        state.rules.retain(|r| !names.contains(&r.name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_tag_replaces_existing_by_name() {
        let store = FixtureConfigStore::new();
        store.upsert_tag(OpenflowTagRow {
            name: "t".into(),
            device_value: vec!["a".into()],
            cloud_value: vec![],
        });
        store.upsert_tag(OpenflowTagRow {
            name: "t".into(),
            device_value: vec!["b".into()],
            cloud_value: vec![],
        });
        let rows = store.tag_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].device_value, vec!["b".to_string()]);
    }

    #[test]
    fn remove_rules_filters_by_name() {
        let store = FixtureConfigStore::new().with_rule(IotRuleConfigRow {
            name: "r1".into(),
            event: "ev".into(),
            ..Default::default()
        });
        store.remove_rules(vec![IotRuleConfigRow {
            name: "r1".into(),
            ..Default::default()
        }]);
        assert!(store.rule_rows().is_empty());
    }
}
