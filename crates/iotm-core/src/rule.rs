//! Rule and Event index.
//!
//! Rules are grouped into [`Event`] nodes keyed by the event name they bind
//! to. The index supports idempotent insert, delete-then-insert update, and
//! lookup; insert additionally runs the narrow "catch-up routing" path
//! described in `spec.md` §4.4 step 5.

use std::collections::{BTreeMap, HashMap};

use crate::multimap::KeyedMultimap;
use crate::router::{self, RoutedCommand};
use crate::tagstore::{TagStore, CONNECT_TAG};

/// The reserved filter key that triggers catch-up routing.
const MAC_KEY: &str = "mac";

#[derive(Debug)]
pub struct Rule {
    pub name: String,
    pub event_name: String,
    pub filter: KeyedMultimap,
    pub params: KeyedMultimap,
    pub actions: KeyedMultimap,
}

impl Rule {
    pub fn new(name: impl Into<String>, event_name: impl Into<String>) -> Self {
        Rule {
            name: name.into(),
            event_name: event_name.into(),
            filter: KeyedMultimap::new(),
            params: KeyedMultimap::new(),
            actions: KeyedMultimap::new(),
        }
    }
}

/// A grouping node in the rule index, keyed by the event name rules bind to.
/// Invariant: an `Event` exists in the [`RuleIndex`] iff it has at least one
/// rule; the last rule's removal removes the node.
///
/// Rules are kept in a `BTreeMap`, iterated in lexicographic name order —
/// mirroring the source's `ds_tree`-keyed-by-name storage
/// (`iotm_rule.h`'s `iotm_rule_node`). This makes the emit-time dedup
/// tie-break ("first matching rule's params win," `spec.md` §4.6)
/// deterministic instead of depending on hash-map iteration order.
#[derive(Debug, Default)]
pub struct Event {
    pub event_name: String,
    rules: BTreeMap<String, Rule>,
}

impl Event {
    fn new(event_name: impl Into<String>) -> Self {
        Event {
            event_name: event_name.into(),
            rules: BTreeMap::new(),
        }
    }

    pub fn num_rules(&self) -> usize {
        self.rules.len()
    }

    pub fn get_rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn foreach_rule(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    /// Walk every rule's filter, expanding templates on the fly, and call
    /// back exactly once per distinct `(key, value)` pair observed across
    /// the whole event. This is the primitive adapters use to program
    /// their hardware filters.
    pub fn foreach_unique_filter_value(&self, tag_store: &TagStore, mut cb: impl FnMut(&str, &str)) {
        let mut seen = std::collections::HashSet::new();
        for rule in self.rules.values() {
            for list in rule.filter.foreach_list() {
                for raw in list.iter() {
                    for candidate in crate::tagstore::expand_keyed(&raw.key, &raw.value, tag_store) {
                        let pair = (candidate.key.clone(), candidate.value.clone());
                        if seen.insert(pair) {
                            cb(&candidate.key, &candidate.value);
                        }
                    }
                }
            }
        }
    }
}

/// In-memory representation of rules, grouped by the event name each rule
/// binds to.
#[derive(Debug, Default)]
pub struct RuleIndex {
    events: HashMap<String, Event>,
}

impl RuleIndex {
    pub fn new() -> Self {
        RuleIndex::default()
    }

    pub fn get_event(&self, event_name: &str) -> Option<&Event> {
        self.events.get(event_name)
    }

    pub fn get_rule(&self, name: &str, event_name: &str) -> Option<&Rule> {
        self.events.get(event_name).and_then(|e| e.get_rule(name))
    }

    /// Insert `rule`. A name collision under the same event is a no-op
    /// (inserts are idempotent on name). On a genuine insert, runs catch-up
    /// routing (§4.4 step 5) and returns any Commands it produced; `None`
    /// if no catch-up fired, `Some(vec![])` is never produced by this path
    /// (catch-up either does not trigger, or triggers and yields one
    /// Command per action).
    pub fn insert_rule(&mut self, rule: Rule, tag_store: &TagStore) -> Option<Vec<RoutedCommand>> {
        let event_name = rule.event_name.clone();
        let event = self
            .events
            .entry(event_name.clone())
            .or_insert_with(|| Event::new(event_name));

        if event.rules.contains_key(&rule.name) {
            return None;
        }

        let catch_up = catch_up_commands(&rule, tag_store);
        event.rules.insert(rule.name.clone(), rule);
        catch_up
    }

    /// Delete-then-insert.
    pub fn update_rule(&mut self, name: &str, event_name: &str, rule: Rule, tag_store: &TagStore) -> Option<Vec<RoutedCommand>> {
        self.delete_rule(name, event_name);
        self.insert_rule(rule, tag_store)
    }

    /// Find the event, find the rule, unlink and drop it; if the event
    /// reaches zero rules, remove the event node too.
    pub fn delete_rule(&mut self, name: &str, event_name: &str) -> bool {
        let Some(event) = self.events.get_mut(event_name) else {
            return false;
        };
        let removed = event.rules.remove(name).is_some();
        if removed && event.rules.is_empty() {
            self.events.remove(event_name);
        }
        removed
    }
}

/// If `rule`'s filter contains a `mac` key whose head-string value is
/// already present in the tag store's connect-tag list, synthesize a
/// PluginEvent carrying just that mac and map the rule's actions directly
/// to Commands, bypassing the general filter walk (the mac match is
/// already known to hold). Returns `None` if catch-up does not apply.
fn catch_up_commands(rule: &Rule, tag_store: &TagStore) -> Option<Vec<RoutedCommand>> {
    let mac = rule.filter.get_single(MAC_KEY)?;
    let connected = tag_store.values(CONNECT_TAG);
    if !connected.iter().any(|v| v == mac) {
        return None;
    }
    Some(router::commands_for_actions(&rule.actions, mac, rule))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent_on_name() {
        let mut index = RuleIndex::new();
        let tags = TagStore::new();
        index.insert_rule(Rule::new("r1", "ev"), &tags);
        index.insert_rule(Rule::new("r1", "ev"), &tags);
        assert_eq!(index.get_event("ev").unwrap().num_rules(), 1);
    }

    #[test]
    fn event_node_is_removed_when_last_rule_goes() {
        let mut index = RuleIndex::new();
        let tags = TagStore::new();
        index.insert_rule(Rule::new("r1", "ev"), &tags);
        assert!(index.get_event("ev").is_some());
        index.delete_rule("r1", "ev");
        assert!(index.get_event("ev").is_none());
    }

    #[test]
    fn update_is_delete_then_insert() {
        let mut index = RuleIndex::new();
        let tags = TagStore::new();
        let mut r1 = Rule::new("r1", "ev");
        r1.params.add_str("x", "1");
        index.insert_rule(r1, &tags);

        let mut r1_new = Rule::new("r1", "ev");
        r1_new.params.add_str("x", "2");
        index.update_rule("r1", "ev", r1_new, &tags);

        let rule = index.get_rule("r1", "ev").unwrap();
        assert_eq!(rule.params.get_single("x"), Some("2"));
    }

    #[test]
    fn scenario_5_catch_up_on_rule_insert() {
        let mut tags = TagStore::new();
        tags.add(CONNECT_TAG, "connectedmac");

        let mut rule = Rule::new("r1", "ble_advertised");
        rule.filter.add_str("mac", "connectedmac");
        rule.actions.add_str("first_plugin", "some_action");
        rule.actions.add_str("second_plugin", "another_action");

        let mut index = RuleIndex::new();
        let commands = index.insert_rule(rule, &tags).expect("catch-up should fire");
        assert_eq!(commands.len(), 2);
        for routed in &commands {
            assert_eq!(routed.command.params.get_single("mac"), Some("connectedmac"));
        }
    }

    #[test]
    fn scenario_2_multi_rule_unique_iteration() {
        let mut tags = TagStore::new();
        tags.add("test_tag", "sometestvalue");

        let mut index = RuleIndex::new();

        let mut r1 = Rule::new("r1", "ble_advertise");
        r1.filter.add_str("mac", "*");
        r1.filter.add_str("mac", "AA:BB:CC:DD:EE:FF");
        r1.filter.add_str("serv_uuid", "12345");
        index.insert_rule(r1, &tags);

        let mut r2 = Rule::new("r2", "ble_advertise");
        r2.filter.add_str("mac", "different");
        r2.filter.add_str("mac", "AA:BB:CC:DD:EE:FF");
        r2.filter.add_str("serv_uuid", "12345");
        index.insert_rule(r2, &tags);

        let event = index.get_event("ble_advertise").unwrap();
        let mut seen = Vec::new();
        event.foreach_unique_filter_value(&tags, |k, v| seen.push((k.to_string(), v.to_string())));

        assert_eq!(seen.len(), 4);
        assert!(seen.contains(&("mac".to_string(), "*".to_string())));
        assert!(seen.contains(&("mac".to_string(), "AA:BB:CC:DD:EE:FF".to_string())));
        assert!(seen.contains(&("mac".to_string(), "different".to_string())));
        assert!(seen.contains(&("serv_uuid".to_string(), "12345".to_string())));
    }

    #[test]
    fn no_catch_up_when_mac_not_connected() {
        let tags = TagStore::new();
        let mut rule = Rule::new("r1", "ble_advertised");
        rule.filter.add_str("mac", "not-connected");
        let mut index = RuleIndex::new();
        assert!(index.insert_rule(rule, &tags).is_none());
    }
}
