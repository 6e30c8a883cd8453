//! Router: emit-time matching of a plugin event against all rules of its
//! event name, producing a set of Commands.
//!
//! This module is a pure, synchronous, bounded walk over in-memory
//! structures (`spec.md` §5: "no suspension points within the router").
//! Dispatching a produced [`Command`] to the adapter session it targets is
//! a daemon-level concern, not this module's — `route_event` returns the
//! output set; the caller looks up sessions and calls their `handle`
//! capability.

use crate::multimap::KeyedMultimap;
use crate::rule::{Event, Rule};
use crate::tagstore::TagStore;

/// The wildcard literal. Only meaningful on the event-param side; see the
/// asymmetry note on [`event_param_matches`].
const WILDCARD: &str = "*";

/// `{ name, params }`: the runtime value an adapter passes to `emit`.
#[derive(Debug, Clone)]
pub struct PluginEvent {
    pub name: String,
    pub params: KeyedMultimap,
}

impl PluginEvent {
    pub fn new(name: impl Into<String>) -> Self {
        PluginEvent {
            name: name.into(),
            params: KeyedMultimap::new(),
        }
    }
}

/// `{ action, params }`: constructed by the router, handed to exactly one
/// adapter, dropped after the handler returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub action: String,
    pub params: KeyedMultimap,
}

/// One produced Command, tagged with the adapter it should be routed to.
#[derive(Debug, Clone)]
pub struct RoutedCommand {
    pub adapter_name: String,
    pub command: Command,
}

/// Run the emit-time matching algorithm described in `spec.md` §4.6.
///
/// Looking up a missing event is a no-op (`spec.md` §7: "missing lookup...
/// logged at debug level"). Within a matched event, every rule's filter is
/// walked: each filter key must have at least one candidate (after tag
/// expansion) present among the event's params under that same key, or
/// equal to the wildcard literal on the *event* side (see
/// [`event_param_matches`]'s doc for the asymmetry). A rule with zero
/// filter keys never matches.
pub fn route_event(event: Option<&Event>, plugin_event: &PluginEvent, tag_store: &TagStore) -> Vec<RoutedCommand> {
    let Some(event) = event else {
        log::debug!("emit: no such event `{}`, no-op", plugin_event.name);
        return Vec::new();
    };

    let mut seen_adapter_action = std::collections::HashSet::new();
    let mut output = Vec::new();

    for rule in event.foreach_rule() {
        if rule_matches(rule, plugin_event, tag_store) {
            for routed in commands_for_matched_rule(&rule.actions, plugin_event, rule) {
                let dedup_key = (routed.adapter_name.clone(), routed.command.action.clone());
                if seen_adapter_action.insert(dedup_key) {
                    output.push(routed);
                }
                // else: later duplicate (adapter, action) pair discarded;
                // the first matching rule's params win (`spec.md` §4.6,
                // explicit open question — preserved, not changed).
            }
        }
    }

    output
}

fn rule_matches(rule: &Rule, plugin_event: &PluginEvent, tag_store: &TagStore) -> bool {
    if rule.filter.key_count() == 0 {
        return false;
    }
    for filter_list in rule.filter.foreach_list() {
        let filter_key = filter_list.key();
        let mut match_this_key = false;
        for raw in filter_list.iter() {
            for candidate in crate::tagstore::expand(&raw.value, tag_store) {
                if event_param_matches(plugin_event, filter_key, &candidate) {
                    match_this_key = true;
                }
            }
        }
        if !match_this_key {
            return false;
        }
    }
    true
}

/// A filter candidate matches an event param list if the list contains an
/// entry equal to the candidate text, or equal to the wildcard literal
/// `"*"`.
///
/// Wildcard asymmetry (`spec.md` §4.6, §8): the `"*"` literal only matches
/// on the *event-param* side. A filter value of `"*"` is a literal string
/// with no special meaning. Concretely: if the event carries `mac="*"`,
/// that matches any filter candidate for `mac`; but a filter candidate of
/// literal `"*"` only matches an event param whose value is literally
/// `"*"`. This is the opposite of what a superficial reading of the
/// original C comparison helper suggests, because that helper is called
/// with its arguments swapped relative to which side is "filter" and which
/// is "event" at each call site — `spec.md`'s invariant is authoritative
/// here and is what this function implements.
fn event_param_matches(plugin_event: &PluginEvent, filter_key: &str, candidate: &str) -> bool {
    let Some(list) = plugin_event.params.find_list(filter_key) else {
        return false;
    };
    list.iter().any(|v| v.value == candidate || v.value == WILDCARD)
}

/// For each `(adapter_name, action_name)` entry in `actions`, construct a
/// Command whose params are `concat(event_params) then concat(rule_params)`
/// (event params copied first, so a key present in both ends up with two
/// entries under that key in the command's params — concat is plain
/// append, never overwrite).
pub(crate) fn commands_for_actions_from_event(
    actions: &KeyedMultimap,
    plugin_event: &PluginEvent,
    rule: &Rule,
) -> Vec<RoutedCommand> {
    let mut out = Vec::new();
    for list in actions.foreach_list() {
        let adapter_name = list.key().to_string();
        for action_value in list.iter() {
            let mut params = KeyedMultimap::new();
            params.concat_from(&plugin_event.params);
            params.concat_from(&rule.params);
            out.push(RoutedCommand {
                adapter_name: adapter_name.clone(),
                command: Command {
                    action: action_value.value.clone(),
                    params,
                },
            });
        }
    }
    out
}

fn commands_for_matched_rule(actions: &KeyedMultimap, plugin_event: &PluginEvent, rule: &Rule) -> Vec<RoutedCommand> {
    commands_for_actions_from_event(actions, plugin_event, rule)
}

/// Catch-up routing entry point used by [`crate::rule::RuleIndex::insert_rule`]:
/// builds a synthetic single-param PluginEvent (`mac` only) and maps the
/// rule's actions directly to Commands, without re-running the general
/// filter walk (the mac match is already known to hold). Adapter-name
/// tagging is preserved so the caller can dispatch exactly as it would
/// router output.
pub(crate) fn commands_for_actions_synthetic(actions: &KeyedMultimap, mac: &str, rule: &Rule) -> Vec<RoutedCommand> {
    let mut synthetic = PluginEvent::new(rule.event_name.clone());
    synthetic.params.add_str("mac", mac.to_string());
    commands_for_actions_from_event(actions, &synthetic, rule)
}

pub fn commands_for_actions(actions: &KeyedMultimap, mac: &str, rule: &Rule) -> Vec<RoutedCommand> {
    commands_for_actions_synthetic(actions, mac, rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Rule, RuleIndex};

    fn event_with_rule(rule: Rule) -> RuleIndex {
        let mut index = RuleIndex::new();
        let tags = TagStore::new();
        index.insert_rule(rule, &tags);
        index
    }

    #[test]
    fn scenario_3_router_with_tag_expanded_filter() {
        let mut tags = TagStore::new();
        tags.add("mytag", "testval");
        tags.add("mytag", "cloudval");
        tags.add("mytag", "anothercloudval");
        tags.add("othertag", "matchthistag");

        let mut rule = Rule::new("r1", "ble_advertised");
        rule.filter.add_str("mac", "${othertag}");
        rule.actions.add_str("ble_default", "connect");
        rule.actions.add_str("ble_sniff", "advertisement");

        let index = event_with_rule(rule);
        let event = index.get_event("ble_advertised");

        let mut plugin_event = PluginEvent::new("ble_advertised");
        plugin_event.params.add_str("mac", "matchthistag");
        plugin_event.params.add_str("serv_uuid", "testservuuid");

        let out = route_event(event, &plugin_event, &tags);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn scenario_4_no_match_because_of_unrelated_filter() {
        let mut rule = Rule::new("r1", "ble_advertised");
        rule.filter.add_str("mac", "18:93:D7:76:1D:AD");
        rule.filter.add_str("char_uuid", "00002A35-...");
        rule.actions.add_str("ble_default", "connect");
        rule.actions.add_str("ble_sniff", "advertisement");

        let tags = TagStore::new();
        let index = event_with_rule(rule);
        let event = index.get_event("ble_advertised");

        let mut plugin_event = PluginEvent::new("ble_advertised");
        plugin_event.params.add_str("mac", "18:93:D7:76:1D:AD");
        plugin_event.params.add_str("char_uuid", "0000FFF1-...");
        plugin_event.params.add_str("serv_uuid", "00001810-...");

        let out = route_event(event, &plugin_event, &tags);
        assert!(out.is_empty());
    }

    #[test]
    fn wildcard_on_event_side_matches_any_candidate() {
        let mut rule = Rule::new("r1", "ev");
        rule.filter.add_str("mac", "AA:BB:CC:DD:EE:FF");
        rule.actions.add_str("adapter", "go");

        let tags = TagStore::new();
        let index = event_with_rule(rule);
        let event = index.get_event("ev");

        let mut plugin_event = PluginEvent::new("ev");
        plugin_event.params.add_str("mac", "*");

        let out = route_event(event, &plugin_event, &tags);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn wildcard_on_filter_side_is_literal() {
        let mut rule = Rule::new("r1", "ev");
        rule.filter.add_str("mac", "*");
        rule.actions.add_str("adapter", "go");

        let tags = TagStore::new();
        let index = event_with_rule(rule);
        let event = index.get_event("ev");

        let mut plugin_event = PluginEvent::new("ev");
        plugin_event.params.add_str("mac", "AA:BB:CC:DD:EE:FF");
        let out = route_event(event, &plugin_event, &tags);
        assert!(out.is_empty(), "filter-side `*` must not match an unrelated mac");

        let mut plugin_event2 = PluginEvent::new("ev");
        plugin_event2.params.add_str("mac", "*");
        let out2 = route_event(event, &plugin_event2, &tags);
        assert_eq!(out2.len(), 1, "filter-side `*` only matches literal event value `*`");
    }

    #[test]
    fn empty_filter_never_matches() {
        let rule = Rule::new("r1", "ev");
        let tags = TagStore::new();
        let index = event_with_rule(rule);
        let event = index.get_event("ev");
        let plugin_event = PluginEvent::new("ev");
        assert!(route_event(event, &plugin_event, &tags).is_empty());
    }

    #[test]
    fn missing_event_is_a_no_op() {
        let tags = TagStore::new();
        let plugin_event = PluginEvent::new("nothing_registered");
        assert!(route_event(None, &plugin_event, &tags).is_empty());
    }

    #[test]
    fn router_output_is_a_set_on_adapter_action_pair() {
        let mut index = RuleIndex::new();
        let tags = TagStore::new();

        let mut r1 = Rule::new("r1", "ev");
        r1.filter.add_str("mac", "m");
        r1.actions.add_str("adapter", "go");
        r1.params.add_str("extra", "from-r1");
        index.insert_rule(r1, &tags);

        let mut r2 = Rule::new("r2", "ev");
        r2.filter.add_str("mac", "m");
        r2.actions.add_str("adapter", "go");
        r2.params.add_str("extra", "from-r2");
        index.insert_rule(r2, &tags);

        let event = index.get_event("ev");
        let mut plugin_event = PluginEvent::new("ev");
        plugin_event.params.add_str("mac", "m");

        let out = route_event(event, &plugin_event, &tags);
        assert_eq!(out.len(), 1, "duplicate (adapter, action) pairs collapse to one Command");
        // First rule's params win.
        assert_eq!(out[0].command.params.get_single("extra"), Some("from-r1"));
    }
}
