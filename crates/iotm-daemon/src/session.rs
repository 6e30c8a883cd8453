//! Session registry and the core-supplied half of the capability vector
//! (§4.5).
//!
//! [`Manager`] owns the Event index, Tag store, Session registry, and
//! Target-layer context registry (§5: "owned by the core and mutated only
//! from code paths that originate in the external configuration store or
//! in an adapter capability call"). [`CoreHandle`] is the thing an adapter
//! actually holds: a cheap, cloneable reference to the manager plus the
//! name of the session it speaks for.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use iotm_core::{Event, PluginEvent, Rule, RuleIndex, TagStore};

use crate::callbacks::{AdapterCallbacks, NullCallbacks, RowChangeKind};
use crate::config::{AwlanNodeRow, IotManagerConfigRow, IotRuleConfigRow, OpenflowTagRow};
use crate::context_registry::ContextRegistry;

/// One adapter binding. `other_config` is an owned copy of the manager-row
/// columns (§4.5 step 3); `awlan` is a cheap clone-on-refresh snapshot
/// standing in for the source's "replaced atomically on refresh by
/// resetting each Session's pointer."
pub struct Session {
    pub name: String,
    other_config: RwLock<HashMap<String, String>>,
    topic: RwLock<String>,
    pub family: String,
    awlan: RwLock<Arc<AwlanNodeRow>>,
    report_count: AtomicI64,
    callbacks: Box<dyn AdapterCallbacks>,
}

impl Session {
    pub fn report_count(&self) -> i64 {
        self.report_count.load(Ordering::Relaxed)
    }

    pub fn awlan(&self) -> Arc<AwlanNodeRow> {
        self.awlan.read().clone()
    }

    pub fn topic(&self) -> String {
        self.topic.read().clone()
    }

    pub fn other_config(&self, key: &str) -> Option<String> {
        self.other_config.read().get(key).cloned()
    }
}

/// Everything an adapter's `init` function receives instead of a raw
/// pointer back into the core. Cloning is cheap; every clone refers to the
/// same manager and the same session.
#[derive(Clone)]
pub struct CoreHandle {
    manager: Arc<Manager>,
    session_name: String,
}

impl CoreHandle {
    /// Hand a built PluginEvent to the router.
    pub fn emit(&self, event: PluginEvent) {
        self.manager.emit(event);
    }

    /// Forward a textual report on the session's configured topic,
    /// incrementing its report counter. The core does not itself speak any
    /// wire protocol (transport is out of the core's scope); this logs the
    /// report at `info` so the contract is still observable end to end.
    pub fn send_report(&self, json: &str) {
        if let Err(err) = serde_json::from_str::<serde_json::Value>(json) {
            log::warn!("session `{}`: send_report payload is not valid JSON: {err}", self.session_name);
        }
        if let Some(session) = self.manager.get_session(&self.session_name) {
            log::info!(
                "[{}] session `{}` report on `{}`: {json}",
                chrono::Utc::now().to_rfc3339(),
                self.session_name,
                session.topic()
            );
            session.report_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// As `send_report`, with a caller-supplied topic and an opaque byte
    /// payload.
    pub fn send_pb_report(&self, topic: &str, bytes: &[u8]) {
        if let Some(session) = self.manager.get_session(&self.session_name) {
            log::info!("session `{}` binary report on `{topic}`: {} bytes", self.session_name, bytes.len());
            session.report_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn plugin_event_new(&self, name: impl Into<String>) -> PluginEvent {
        PluginEvent::new(name)
    }

    /// Run `f` against the named Event node (its rules, their filters,
    /// params, and actions) under the Rule/Event index's read lock, or
    /// against `None` if no such Event exists. This is §4.5's
    /// `get_event(session, name)` capability ("return a borrowed reference
    /// to the Event node or null") — `f` stands in for the borrow, since a
    /// real reference can't outlive the read guard it comes from.
    pub fn with_event<R>(&self, event_name: &str, f: impl FnOnce(Option<&Event>) -> R) -> R {
        let rules = self.manager.rules.read();
        f(rules.get_event(event_name))
    }

    /// Walk every rule's filter on the named Event, expanding templates,
    /// and call back once per distinct `(key, value)` pair.
    pub fn foreach_unique_filter_value(&self, event_name: &str, mut cb: impl FnMut(&str, &str)) {
        let rules = self.manager.rules.read();
        let tags = self.manager.tags.read();
        if let Some(event) = rules.get_event(event_name) {
            event.foreach_unique_filter_value(&tags, &mut cb);
        }
    }

    pub fn get_config(&self, key: &str) -> Option<String> {
        self.manager
            .get_session(&self.session_name)
            .and_then(|s| s.other_config(key))
    }

    pub fn foreach_tag(&self, name: Option<&str>, mut cb: impl FnMut(&str, &str)) {
        let tags = self.manager.tags.read();
        match name {
            Some(name) => {
                for v in tags.values(name) {
                    cb(name, v);
                }
            }
            None => {
                for (name, values) in tags.foreach_tag() {
                    for v in values {
                        cb(name, v);
                    }
                }
            }
        }
    }

    pub fn update_tag(&self, row: OpenflowTagRow) {
        self.manager.upsert_tag(row);
    }

    /// The target-layer context slot shared by every session of this
    /// session's adapter family.
    pub fn context_slot(&self) -> crate::context_registry::ContextSlot {
        let family = self
            .manager
            .get_session(&self.session_name)
            .map(|s| s.family.clone())
            .unwrap_or_else(|| self.session_name.clone());
        self.manager.context_registry.write().get(&family)
    }

    pub fn update_rules(&self, rows: Vec<IotRuleConfigRow>) {
        self.manager.config_store.upsert_rules(rows.clone());
        for row in rows {
            self.manager.insert_rule_row(&row);
        }
    }

    pub fn remove_rules(&self, rows: Vec<IotRuleConfigRow>) {
        self.manager.config_store.remove_rules(rows.clone());
        for row in rows {
            self.manager.delete_rule_row(&row.name, &row.event);
        }
    }
}

/// The core: Event index, Tag store, Session registry, Target-layer
/// context registry, and the configuration-store handle everything else
/// reads rows from.
pub struct Manager {
    rules: RwLock<RuleIndex>,
    tags: RwLock<TagStore>,
    context_registry: RwLock<ContextRegistry>,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    config_store: Arc<dyn crate::config::ConfigStore>,
}

impl Manager {
    pub fn new(config_store: Arc<dyn crate::config::ConfigStore>) -> Arc<Self> {
        Arc::new(Manager {
            rules: RwLock::new(RuleIndex::new()),
            tags: RwLock::new(TagStore::new()),
            context_registry: RwLock::new(ContextRegistry::new()),
            sessions: RwLock::new(HashMap::new()),
            config_store,
        })
    }

    pub fn get_session(&self, name: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(name).cloned()
    }

    /// Create a session from a manager-config row (§4.5 Create). `init`
    /// stands in for the external plugin loader invoking the adapter's
    /// init symbol: it receives a [`CoreHandle`] bound to this session and
    /// returns the callbacks the adapter wants wired up.
    pub fn create_session(
        self: &Arc<Self>,
        row: IotManagerConfigRow,
        init: impl FnOnce(CoreHandle) -> Box<dyn AdapterCallbacks>,
    ) -> Arc<Session> {
        let other_config = row.other_config_map();
        let topic = other_config.get("mqtt_v").cloned().unwrap_or_default();
        let family = other_config.get("family").cloned().unwrap_or_else(|| row.handler.clone());
        let awlan = self.awlan_snapshot();

        let placeholder = Arc::new(Session {
            name: row.handler.clone(),
            other_config: RwLock::new(other_config.clone()),
            topic: RwLock::new(topic.clone()),
            family: family.clone(),
            awlan: RwLock::new(awlan.clone()),
            report_count: AtomicI64::new(0),
            callbacks: Box::new(NullCallbacks),
        });
        self.sessions.write().insert(row.handler.clone(), placeholder);

        let handle = CoreHandle {
            manager: self.clone(),
            session_name: row.handler.clone(),
        };
        let callbacks = init(handle);

        let session = Arc::new(Session {
            name: row.handler.clone(),
            other_config: RwLock::new(other_config),
            topic: RwLock::new(topic),
            family,
            awlan: RwLock::new(awlan),
            report_count: AtomicI64::new(0),
            callbacks,
        });
        self.sessions.write().insert(row.handler.clone(), session.clone());
        log::info!("session `{}` created", session.name);
        session
    }

    /// Re-marshal a config row and fire `update` if the adapter supplied
    /// it.
    pub fn modify_session(&self, row: IotManagerConfigRow) {
        let sessions = self.sessions.read();
        let Some(session) = sessions.get(&row.handler) else {
            log::debug!("modify_session: no such session `{}`", row.handler);
            return;
        };
        let other_config = row.other_config_map();
        *session.topic.write() = other_config.get("mqtt_v").cloned().unwrap_or_default();
        *session.other_config.write() = other_config;
        session.callbacks.update();
    }

    pub fn delete_session(&self, name: &str) {
        if let Some(session) = self.sessions.write().remove(name) {
            session.callbacks.exit();
            log::info!("session `{name}` deleted");
        }
    }

    pub fn awlan_snapshot(&self) -> Arc<AwlanNodeRow> {
        self.config_store
            .awlan_node()
            .map(Arc::new)
            .unwrap_or_default()
    }

    /// Refresh the MQTT header snapshot held by every session, atomically
    /// per session (§5: "replaced atomically... by resetting each
    /// Session's pointer").
    pub fn refresh_awlan(&self) {
        let snapshot = self.awlan_snapshot();
        for session in self.sessions.read().values() {
            *session.awlan.write() = snapshot.clone();
        }
    }

    /// Emit-time matching (§4.6): look up the event, run the router, and
    /// dispatch each produced Command to the session it targets.
    pub fn emit(&self, plugin_event: PluginEvent) {
        let rules = self.rules.read();
        let tags = self.tags.read();
        let event = rules.get_event(&plugin_event.name);
        let routed = iotm_core::route_event(event, &plugin_event, &tags);
        drop(rules);
        drop(tags);
        for r in routed {
            match self.get_session(&r.adapter_name) {
                Some(session) => session.callbacks.handle(r.command),
                None => log::error!("emit: no session for adapter `{}`, dropping command", r.adapter_name),
            }
        }
    }

    fn insert_rule_row(&self, row: &IotRuleConfigRow) {
        let Some(filter) = iotm_core::KeyedMultimap::from_rows(&row.filter_keys, &row.filter) else {
            log::debug!("insert_rule_row: empty filter for `{}`, still inserting", row.name);
            self.insert_rule_inner(Rule {
                name: row.name.clone(),
                event_name: row.event.clone(),
                filter: iotm_core::KeyedMultimap::new(),
                params: iotm_core::KeyedMultimap::from_rows(&row.params_keys, &row.params).unwrap_or_default(),
                actions: iotm_core::KeyedMultimap::from_rows(&row.actions_keys, &row.actions).unwrap_or_default(),
            });
            return;
        };
        let params = iotm_core::KeyedMultimap::from_rows(&row.params_keys, &row.params).unwrap_or_default();
        let actions = iotm_core::KeyedMultimap::from_rows(&row.actions_keys, &row.actions).unwrap_or_default();
        self.insert_rule_inner(Rule {
            name: row.name.clone(),
            event_name: row.event.clone(),
            filter,
            params,
            actions,
        });
    }

    /// Insert or modify, via `RuleIndex::update_rule`'s delete-then-insert.
    /// Whether the row is reported to adapters as `Inserted` or `Modified`
    /// is decided by whether a rule of this name already existed under this
    /// event before the write (§4.5: "Fired on every rule insert/modify/
    /// delete").
    fn insert_rule_inner(&self, rule: Rule) {
        let rule_name = rule.name.clone();
        let event_name = rule.event_name.clone();
        let existed = self.rules.read().get_rule(&rule_name, &event_name).is_some();

        let tags = self.tags.read();
        let catch_up = self.rules.write().update_rule(&rule_name, &event_name, rule, &tags);
        drop(tags);
        if let Some(routed) = catch_up {
            for r in routed {
                match self.get_session(&r.adapter_name) {
                    Some(session) => session.callbacks.handle(r.command),
                    None => log::error!("catch-up routing: no session for adapter `{}`", r.adapter_name),
                }
            }
        }
        let change_kind = if existed { RowChangeKind::Modified } else { RowChangeKind::Inserted };
        self.notify_rule_update(change_kind, &rule_name);
    }

    fn delete_rule_row(&self, name: &str, event_name: &str) {
        self.rules.write().delete_rule(name, event_name);
        self.notify_rule_update(RowChangeKind::Deleted, name);
    }

    /// Dispatch `rule_update` to every session before the next loop
    /// iteration (§5 ordering guarantee).
    fn notify_rule_update(&self, change_kind: RowChangeKind, rule_name: &str) {
        for session in self.sessions.read().values() {
            session.callbacks.rule_update(change_kind, rule_name);
        }
    }

    pub fn upsert_tag(&self, row: OpenflowTagRow) {
        self.config_store.upsert_tag(row.clone());
        self.tags.write().update_row(&row.name, &row.device_value, &row.cloud_value);
        for session in self.sessions.read().values() {
            session.callbacks.tag_update();
        }
    }

    pub fn context_registry(&self) -> &RwLock<ContextRegistry> {
        &self.context_registry
    }

    /// Fire `periodic` on every session, serially, in registry order.
    pub fn periodic_tick(&self) {
        for session in self.sessions.read().values() {
            session.callbacks.periodic();
        }
    }

    /// Load every row currently in the configuration store: tags first,
    /// then rules (a rule's catch-up routing depends on the tag store
    /// already reflecting `iot_connected_devices`).
    pub fn bootstrap(&self) {
        for row in self.config_store.tag_rows() {
            self.tags.write().update_row(&row.name, &row.device_value, &row.cloud_value);
        }
        let rule_rows = self.config_store.rule_rows();
        for row in rule_rows {
            self.insert_rule_row(&row);
        }
    }

    /// Ordered teardown (§6): sessions first (each adapter's `exit`), then
    /// the index/store/registry the sessions were reading.
    pub fn shutdown(&self) {
        let names: Vec<String> = self.sessions.read().keys().cloned().collect();
        for name in names {
            self.delete_session(&name);
        }
        *self.rules.write() = RuleIndex::new();
        *self.tags.write() = TagStore::new();
        *self.context_registry.write() = ContextRegistry::new();
        log::info!("manager teardown complete");
    }
}
