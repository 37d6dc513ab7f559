//! # shipment-lifecycle
//!
//! Shipment orders from creation to delivery: a status state machine with an
//! append-only history, OTP-gated delivery confirmation, per-shipment chat and
//! a sled-backed store behind the [`store::ShipmentStore`] and
//! [`store::Directory`] traits.

pub mod config;
pub mod directory;
pub mod error;
pub mod gate;
pub mod history;
pub mod lifecycle;
pub mod message;
pub mod service;
pub mod shipment;
pub mod stats;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod utils;

pub use error::{Result, ShipmentError};
pub use service::ShipmentService;
