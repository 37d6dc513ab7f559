//! Identifier, code and OTP generation

use crate::error::{Result, ShipmentError};
use bech32::Bech32m;
use rand::Rng;
use uuid7::uuid7;

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> Result<String> {
    let hrp = bech32::Hrp::parse(hrp).map_err(|e| ShipmentError::Codec(e.to_string()))?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .map_err(|e| ShipmentError::Codec(e.to_string()))?;
    Ok(encode)
}

/// Four digit delivery code, `1000..=9999`.
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

/// Human readable shipment code such as `CL-0042`. Not unique.
pub fn generate_code(prefix: &str) -> String {
    format!("{prefix}-{:04}", rand::thread_rng().gen_range(0..10_000))
}

/// `"São Paulo - SP"` style label from a city and its state.
pub fn place_label(city: &str, state: &str) -> String {
    format!("{} - {}", city.trim(), state.trim())
}
