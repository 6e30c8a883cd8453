//! Daemon-level plumbing for the IoT manager: the session registry and
//! capability vector, the target-layer context registry, the
//! configuration-store seam, and the periodic-tick scheduler.
//!
//! The event-routing algorithm itself lives in `iotm-core`; this crate
//! owns everything that turns that pure algorithm into a running,
//! adapter-hosting process.

pub mod adapters;
pub mod callbacks;
pub mod config;
pub mod context_registry;
pub mod scheduler;
pub mod session;

pub use callbacks::{AdapterCallbacks, NullCallbacks, RowChangeKind};
pub use config::{AwlanNodeRow, ConfigStore, FixtureConfigStore, IotManagerConfigRow, IotRuleConfigRow, OpenflowTagRow};
pub use context_registry::{ContextRegistry, ContextSlot};
pub use session::{CoreHandle, Manager, Session};
