//! Delivery confirmation gate.
//!
//! The stored code and the candidate are compared byte for byte. No trimming,
//! no case folding, no normalisation of any kind. Failed attempts are neither
//! counted nor recorded.
use crate::error::{Result, ShipmentError};

pub fn verify_otp(stored: &str, supplied: &str) -> Result<()> {
    let (a, b) = (stored.as_bytes(), supplied.as_bytes());
    if a.len() != b.len() {
        return Err(ShipmentError::OtpMismatch);
    }
    // compare every byte so the time taken does not depend on the first mismatch
    let diff = a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    if diff == 0 {
        Ok(())
    } else {
        Err(ShipmentError::OtpMismatch)
    }
}
