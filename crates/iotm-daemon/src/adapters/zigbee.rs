//! Illustrative Zigbee adapter.
//!
//! Mirrors [`crate::adapters::ble`]'s shape against a different event name
//! and a context-slot example: two Zigbee sessions (e.g. a 2.4 GHz and a
//! sub-GHz radio) sharing one coordinator-state slot through the
//! target-layer context registry.

use iotm_core::Command;

use crate::callbacks::AdapterCallbacks;
use crate::session::CoreHandle;

pub const EVENT_NAME: &str = "zigbee_joined";

struct CoordinatorState {
    join_count: u64,
}

pub struct ZigbeeAdapter {
    core: CoreHandle,
}

impl ZigbeeAdapter {
    pub fn init(core: CoreHandle) -> Box<dyn AdapterCallbacks> {
        let slot = core.context_slot();
        let mut guard = slot.lock();
        if guard.is_none() {
            *guard = Some(Box::new(CoordinatorState { join_count: 0 }));
        }
        drop(guard);
        Box::new(ZigbeeAdapter { core })
    }

    pub fn on_device_joined(&self, mac: &str, short_addr: &str) {
        let slot = self.core.context_slot();
        if let Some(state) = slot.lock().as_mut().and_then(|s| s.downcast_mut::<CoordinatorState>()) {
            state.join_count += 1;
        }
        let mut event = self.core.plugin_event_new(EVENT_NAME);
        event.params.add_str("mac", mac);
        event.params.add_str("short_addr", short_addr);
        self.core.emit(event);
    }
}

impl AdapterCallbacks for ZigbeeAdapter {
    fn handle(&self, command: Command) {
        log::info!("zigbee: handling command `{}`", command.action);
    }

    fn exit(&self) {
        log::info!("zigbee: session tearing down");
    }
}
