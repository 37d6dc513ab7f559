//! Shipment entity and the descriptive details it is created from
use crate::error::ValidationError;
use crate::history::HistoryLog;
use crate::types::{TimeStamp, UserId};
use crate::utils::place_label;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Safety checks every new shipment starts with, all unchecked.
pub const DEFAULT_CHECKLIST: [&str; 4] = ["pneus", "oleo", "carga_presa", "documentacao"];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, minicbor::Encode, minicbor::Decode, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[n(0)]
    Pending,
    #[n(1)]
    EnRoute,
    #[n(2)]
    Delivered,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Pending => "pending",
            Status::EnRoute => "en_route",
            Status::Delivered => "delivered",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, minicbor::Encode, minicbor::Decode, Serialize)]
pub struct GeoPoint {
    #[n(0)]
    pub lat: f64,
    #[n(1)]
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Named boolean safety checks confirmed by the driver before departure.
#[derive(Debug, Clone, Default, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Serialize)]
#[serde(transparent)]
pub struct Checklist(#[n(0)] BTreeMap<String, bool>);

impl Checklist {
    pub fn standard() -> Self {
        DEFAULT_CHECKLIST.iter().map(|item| (item.to_string(), false)).collect()
    }
    pub fn get(&self, item: &str) -> Option<bool> {
        self.0.get(item).copied()
    }
    pub fn set(&mut self, item: impl Into<String>, checked: bool) {
        self.0.insert(item.into(), checked);
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn is_complete(&self) -> bool {
        self.0.values().all(|checked| *checked)
    }
    /// Names of the items still `false`, in key order.
    pub fn unchecked(&self) -> Vec<String> {
        self.0
            .iter()
            .filter(|(_, checked)| !**checked)
            .map(|(item, _)| item.clone())
            .collect()
    }
    /// Entries of `other` override entries of `self`.
    pub fn merged_with(&self, other: &Checklist) -> Checklist {
        let mut merged = self.clone();
        for (item, checked) in other.iter() {
            merged.set(item, checked);
        }
        merged
    }
}

impl FromIterator<(String, bool)> for Checklist {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Checklist(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[(&str, bool); N]> for Checklist {
    fn from(items: [(&str, bool); N]) -> Self {
        items
            .into_iter()
            .map(|(item, checked)| (item.to_string(), checked))
            .collect()
    }
}

/// Descriptive fields supplied when a shipment is ordered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShipmentDetails {
    description: Option<String>,
    value: Option<f64>,
    client_id: Option<UserId>,
    origin: Option<String>,
    destination: Option<String>,
    origin_coords: Option<GeoPoint>,
    destination_coords: Option<GeoPoint>,
    weight: Option<String>,
}

/// Output of [`ShipmentDetails::validate`]; everything a new shipment needs
/// besides its generated identity.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ValidDetails {
    pub description: String,
    pub value_cents: u64,
    pub client_id: UserId,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub origin_coords: Option<GeoPoint>,
    pub destination_coords: Option<GeoPoint>,
    pub weight: Option<String>,
}

impl ShipmentDetails {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
    /// Monetary value in currency units, e.g. `45000.0`.
    pub fn set_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }
    pub fn set_client(mut self, client_id: UserId) -> Self {
        self.client_id = Some(client_id);
        self
    }
    pub fn set_origin(mut self, label: &str) -> Self {
        self.origin = Some(label.to_string());
        self
    }
    pub fn set_destination(mut self, label: &str) -> Self {
        self.destination = Some(label.to_string());
        self
    }
    /// Origin label built from a city and its state, e.g. `"São Paulo - SP"`.
    pub fn set_origin_place(self, city: &str, state: &str) -> Self {
        self.set_origin(&place_label(city, state))
    }
    pub fn set_destination_place(self, city: &str, state: &str) -> Self {
        self.set_destination(&place_label(city, state))
    }
    pub fn set_origin_coords(mut self, point: GeoPoint) -> Self {
        self.origin_coords = Some(point);
        self
    }
    pub fn set_destination_coords(mut self, point: GeoPoint) -> Self {
        self.destination_coords = Some(point);
        self
    }
    pub fn set_weight(mut self, weight: &str) -> Self {
        self.weight = Some(weight.to_string());
        self
    }
    pub fn client_id(&self) -> Option<UserId> {
        self.client_id
    }

    pub(crate) fn validate(&self) -> Result<ValidDetails, ValidationError> {
        let description = match self.description.as_deref().map(str::trim) {
            Some(d) if !d.is_empty() => d.to_string(),
            _ => return Err(ValidationError::MissingDescription),
        };
        let value_cents = match self.value {
            Some(v) if v.is_finite() && v >= 0.0 => {
                let cents = (v * 100.0).round();
                if cents > u64::MAX as f64 {
                    return Err(ValidationError::InvalidValue);
                }
                cents as u64
            }
            _ => return Err(ValidationError::InvalidValue),
        };
        let client_id = self.client_id.ok_or(ValidationError::MissingClient)?;

        Ok(ValidDetails {
            description,
            value_cents,
            client_id,
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            origin_coords: self.origin_coords,
            destination_coords: self.destination_coords,
            weight: self.weight.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    #[n(0)]
    pub(crate) id: String, // bech32 encoded uuid7, hrp "ship_"
    #[n(1)]
    pub(crate) code: String,
    #[n(2)]
    pub(crate) description: String,
    #[n(3)]
    pub(crate) value_cents: u64,
    #[n(4)]
    pub(crate) origin: Option<String>,
    #[n(5)]
    pub(crate) destination: Option<String>,
    #[n(6)]
    pub(crate) origin_coords: Option<GeoPoint>,
    #[n(7)]
    pub(crate) destination_coords: Option<GeoPoint>,
    #[n(8)]
    pub(crate) weight: Option<String>,
    #[n(9)]
    pub(crate) status: Status,
    #[n(10)]
    pub(crate) canceled: bool,
    #[n(11)]
    pub(crate) cancel_reason: Option<String>,
    #[n(12)]
    #[serde(skip)]
    pub(crate) otp: String,
    #[n(13)]
    pub(crate) checklist: Checklist,
    #[n(14)]
    pub(crate) history: HistoryLog,
    #[n(15)]
    pub(crate) rating: Option<u8>,
    #[n(16)]
    pub(crate) feedback: Option<String>,
    #[n(17)]
    pub(crate) feedback_date: Option<TimeStamp>,
    #[n(18)]
    pub(crate) client_id: UserId,
    #[n(19)]
    pub(crate) driver_id: Option<UserId>,
    #[n(20)]
    pub(crate) vehicle_id: Option<String>, // plate
    #[n(21)]
    pub(crate) signature_digest: Option<String>,
    #[n(22)]
    pub(crate) created_at: TimeStamp,
    #[n(23)]
    pub(crate) updated_at: TimeStamp,
}

impl Shipment {
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn code(&self) -> &str {
        &self.code
    }
    pub fn description(&self) -> &str {
        &self.description
    }
    pub fn value_cents(&self) -> u64 {
        self.value_cents
    }
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }
    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }
    pub fn origin_coords(&self) -> Option<GeoPoint> {
        self.origin_coords
    }
    pub fn destination_coords(&self) -> Option<GeoPoint> {
        self.destination_coords
    }
    pub fn weight(&self) -> Option<&str> {
        self.weight.as_deref()
    }
    pub fn status(&self) -> Status {
        self.status
    }
    pub fn is_canceled(&self) -> bool {
        self.canceled
    }
    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }
    /// The delivery code, `None` on copies handed to drivers.
    pub fn otp(&self) -> Option<&str> {
        (!self.otp.is_empty()).then_some(self.otp.as_str())
    }
    /// The same shipment with the delivery code removed.
    pub fn without_otp(mut self) -> Self {
        self.otp.clear();
        self
    }
    pub fn checklist(&self) -> &Checklist {
        &self.checklist
    }
    pub fn history(&self) -> &HistoryLog {
        &self.history
    }
    pub fn rating(&self) -> Option<u8> {
        self.rating
    }
    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }
    pub fn feedback_date(&self) -> Option<TimeStamp> {
        self.feedback_date
    }
    pub fn client_id(&self) -> UserId {
        self.client_id
    }
    pub fn driver_id(&self) -> Option<UserId> {
        self.driver_id
    }
    pub fn vehicle_id(&self) -> Option<&str> {
        self.vehicle_id.as_deref()
    }
    pub fn signature_digest(&self) -> Option<&str> {
        self.signature_digest.as_deref()
    }
    pub fn created_at(&self) -> TimeStamp {
        self.created_at
    }
    pub fn updated_at(&self) -> TimeStamp {
        self.updated_at
    }
    /// Delivered or canceled; no further status change is possible.
    pub fn is_terminal(&self) -> bool {
        self.canceled || self.status == Status::Delivered
    }
    /// Current state as shown to users, e.g. `"en_route"` or `"canceled"`.
    pub fn state_label(&self) -> String {
        if self.canceled {
            format!("canceled (while {})", self.status)
        } else {
            self.status.to_string()
        }
    }
    pub fn is_participant(&self, user: UserId) -> bool {
        self.client_id == user || self.driver_id == Some(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_checklist_starts_unchecked() {
        let checklist = Checklist::standard();
        assert_eq!(checklist.len(), 4);
        assert!(!checklist.is_complete());
        assert_eq!(checklist.unchecked().len(), 4);
    }

    #[test]
    fn merge_overrides_stored_items() {
        let stored = Checklist::standard();
        let supplied = Checklist::from([("pneus", true), ("oleo", true)]);
        let merged = stored.merged_with(&supplied);

        assert_eq!(merged.get("pneus"), Some(true));
        assert_eq!(merged.unchecked(), vec!["carga_presa", "documentacao"]);
    }

    #[test]
    fn value_is_converted_to_cents() {
        let details = ShipmentDetails::new()
            .set_description("Pallets")
            .set_value(1234.5)
            .set_client(7)
            .validate()
            .unwrap();
        assert_eq!(details.value_cents, 123_450);
    }

    #[test]
    fn negative_and_nan_values_are_rejected() {
        for value in [-0.01, f64::NAN, f64::INFINITY] {
            let err = ShipmentDetails::new()
                .set_description("Pallets")
                .set_value(value)
                .set_client(7)
                .validate()
                .unwrap_err();
            assert_eq!(err, ValidationError::InvalidValue);
        }
    }

    #[test]
    fn blank_description_is_rejected() {
        let err = ShipmentDetails::new()
            .set_description("   ")
            .set_value(10.0)
            .set_client(7)
            .validate()
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingDescription);
    }

    #[test]
    fn places_are_labelled_from_city_and_state() {
        let details = ShipmentDetails::new()
            .set_description("Pallets")
            .set_value(1.0)
            .set_client(7)
            .set_origin_place("São Paulo", "SP")
            .set_destination_place(" Curitiba", "PR ")
            .validate()
            .unwrap();
        assert_eq!(details.origin.as_deref(), Some("São Paulo - SP"));
        assert_eq!(details.destination.as_deref(), Some("Curitiba - PR"));
    }

    #[test]
    fn copy_without_otp_hides_only_the_code() {
        let details = ShipmentDetails::new()
            .set_description("Pallets")
            .set_value(1.0)
            .set_client(7);
        let shipment =
            Shipment::create("ship_x".into(), "CL-0001".into(), "9988".into(), &details, TimeStamp::now())
                .unwrap();
        assert_eq!(shipment.otp(), Some("9988"));

        let hidden = shipment.clone().without_otp();
        assert_eq!(hidden.otp(), None);
        assert_eq!(hidden.id(), shipment.id());
        assert_eq!(hidden.history(), shipment.history());
    }
}
