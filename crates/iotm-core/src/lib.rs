//! Event-routing engine for the IoT manager.
//!
//! This crate is the part of the system described as "the core": the
//! in-memory data model of events/rules/tags, the tag-expansion algorithm,
//! and the filter-matching algorithm that turns an incoming event into a
//! set of outgoing commands. It does not speak any wire protocol, persist
//! state across restarts, or interpret the semantics of rule actions — it
//! only routes.

pub mod codec;
pub mod multimap;
pub mod router;
pub mod rule;
pub mod tagstore;
pub mod value;

pub use codec::{allocate_buffer, decode, encode, CodecError, TypedValue, ValueType};
pub use multimap::KeyedMultimap;
pub use router::{route_event, Command, PluginEvent, RoutedCommand};
pub use rule::{Event, Rule, RuleIndex};
pub use tagstore::{has_template, TagStore, CONNECT_TAG};
pub use value::{Value, ValueList};
