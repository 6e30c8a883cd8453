//! Illustrative adapter stubs.
//!
//! Their public contract — the [`crate::callbacks::AdapterCallbacks`] trait
//! and the [`crate::session::CoreHandle`] they're handed at init — is what
//! this crate specifies. What a real BLE or Zigbee stack does with a
//! `handle` call is not; these two modules exist to show the contract
//! actually being implemented end to end, not to model real radio
//! behaviour.

pub mod ble;
pub mod zigbee;
