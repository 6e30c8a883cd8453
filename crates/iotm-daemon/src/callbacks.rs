//! [`AdapterCallbacks`]: the core-calls-adapter half of the capability
//! vector (§4.5). Every method is optional — the default implementation is
//! a no-op — because "the core MUST treat every core-→-adapter entry as
//! fallible-to-null."

use iotm_core::Command;

pub use crate::config::RowChangeKind;

/// Adapter-supplied callbacks. Implement only the methods a given adapter
/// actually cares about; the rest fall back to the no-op default.
pub trait AdapterCallbacks: Send + Sync {
    /// The adapter's command entry; called by the router for every
    /// Command addressed to this session.
    fn handle(&self, _command: Command) {}

    /// Fired after a config modify.
    fn update(&self) {}

    /// Fired after any tag-store mutation.
    fn tag_update(&self) {}

    /// Fired on every rule insert/modify/delete.
    fn rule_update(&self, _change_kind: RowChangeKind, _rule_name: &str) {}

    /// Fired at the core's periodic cadence.
    fn periodic(&self) {}

    /// Fired during session teardown.
    fn exit(&self) {}
}

/// A session with no adapter wired up yet; every callback is a no-op. Used
/// as the placeholder while a session is under construction.
pub struct NullCallbacks;

impl AdapterCallbacks for NullCallbacks {}
