//! Illustrative BLE adapter.
//!
//! Advertises hardware filter changes, translates a scan hit into a
//! `ble_advertised` PluginEvent, and dispatches router-issued Commands to
//! a stand-in for the BLE stack.

use iotm_core::Command;

use crate::callbacks::{AdapterCallbacks, RowChangeKind};
use crate::session::CoreHandle;

pub const EVENT_NAME: &str = "ble_advertised";

pub struct BleAdapter {
    core: CoreHandle,
}

impl BleAdapter {
    /// Called by the manager's `init` closure when this session is
    /// created.
    pub fn init(core: CoreHandle) -> Box<dyn AdapterCallbacks> {
        Box::new(BleAdapter { core })
    }

    /// What a real scan-result callback would call: build a PluginEvent
    /// from an observed advertisement and hand it to the router.
    pub fn on_advertisement(&self, mac: &str, serv_uuid: &str) {
        let mut event = self.core.plugin_event_new(EVENT_NAME);
        event.params.add_str("mac", mac);
        event.params.add_str("serv_uuid", serv_uuid);
        self.core.emit(event);
    }

    /// Re-program the radio's hardware filter list from every rule
    /// currently bound to this adapter's event.
    pub fn refresh_hardware_filter(&self) {
        let mut macs = Vec::new();
        self.core.foreach_unique_filter_value(EVENT_NAME, |key, value| {
            if key == "mac" {
                macs.push(value.to_string());
            }
        });
        log::debug!("ble: hardware filter now tracks {} mac(s)", macs.len());
    }
}

impl AdapterCallbacks for BleAdapter {
    fn handle(&self, command: Command) {
        log::info!("ble: handling command `{}`", command.action);
    }

    fn tag_update(&self) {
        self.refresh_hardware_filter();
    }

    fn rule_update(&self, change_kind: RowChangeKind, rule_name: &str) {
        log::debug!("ble: rule `{rule_name}` changed ({change_kind:?})");
        self.refresh_hardware_filter();
    }

    fn periodic(&self) {
        log::debug!("ble: periodic tick");
    }
}
