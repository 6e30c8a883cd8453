//! `iotmd`: wires a configuration-store fixture, a small set of
//! illustrative adapters, and the periodic-tick scheduler together and
//! runs until SIGINT.

use std::sync::Arc;

use iotm_daemon::config::{ConfigStore, FixtureConfigStore, IotManagerConfigRow, IotRuleConfigRow, OpenflowTagRow};
use iotm_daemon::session::Manager;
use iotm_daemon::{adapters, scheduler};

fn example_config_store() -> FixtureConfigStore {
    FixtureConfigStore::new()
        .with_manager(IotManagerConfigRow {
            handler: "ble_default".to_string(),
            plugin: None,
            other_config_keys: vec!["family".to_string(), "mqtt_v".to_string()],
            other_config: vec!["ble".to_string(), "IoT/BLE".to_string()],
        })
        .with_manager(IotManagerConfigRow {
            handler: "zigbee_default".to_string(),
            plugin: None,
            other_config_keys: vec!["family".to_string(), "mqtt_v".to_string()],
            other_config: vec!["zigbee".to_string(), "IoT/Zigbee".to_string()],
        })
        .with_tag(OpenflowTagRow {
            name: "known_macs".to_string(),
            device_value: vec!["AA:BB:CC:DD:EE:FF".to_string()],
            cloud_value: vec![],
        })
        .with_rule(IotRuleConfigRow {
            name: "advertise_known".to_string(),
            event: "ble_advertised".to_string(),
            filter_keys: vec!["mac".to_string()],
            filter: vec!["${known_macs}".to_string()],
            params_keys: vec![],
            params: vec![],
            actions_keys: vec!["ble_default".to_string()],
            actions: vec!["connect".to_string()],
        })
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let store = Arc::new(example_config_store());
    let manager_rows = store.manager_rows();
    let manager = Manager::new(store);
    manager.bootstrap();

    // The external plugin loader (§6) resolves a session's dso and calls
    // its init symbol; dynamic library loading is out of the core's scope,
    // so here the two illustrative adapters are matched by session name.
    for row in manager_rows {
        match row.handler.as_str() {
            "ble_default" => {
                manager.create_session(row, adapters::ble::BleAdapter::init);
            }
            "zigbee_default" => {
                manager.create_session(row, adapters::zigbee::ZigbeeAdapter::init);
            }
            other => log::warn!("no adapter registered for session `{other}`"),
        }
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler_manager = manager.clone();
    let scheduler_task = tokio::spawn(scheduler::run(scheduler_manager, scheduler::DEFAULT_PERIOD, shutdown_rx));

    log::info!("iotmd running; press Ctrl-C to stop");
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("failed to install SIGINT handler: {err}");
    }

    log::info!("SIGINT received, tearing down");
    let _ = shutdown_tx.send(true);
    let _ = scheduler_task.await;

    // §6 ordered teardown: sessions (each adapter's `exit`), then the
    // Event index, Tag store, and target-layer registry.
    manager.shutdown();
}
