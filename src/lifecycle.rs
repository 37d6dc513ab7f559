//! Lifecycle transitions of a [`Shipment`].
//!
//! ```text
//!   pending ──start_route──▶ en_route ──confirm_delivery──▶ delivered
//!      │                        │
//!      └────────cancel──────────┴──▶ canceled (flag, status frozen)
//! ```
//!
//! Every transition checks all of its preconditions before touching the
//! shipment, so a failed call leaves it exactly as it was. Status, history,
//! cancellation fields and `updated_at` change together or not at all.
use crate::error::{Precondition, Result, ShipmentError, ValidationError};
use crate::gate;
use crate::history::{HistoryEntry, HistoryLog, Milestone};
use crate::shipment::{Checklist, Shipment, ShipmentDetails, Status};
use crate::types::{TimeStamp, UserId};

pub const CREATED: &str = "Created";
pub const ROUTE_STARTED: &str = "Route started";
pub const DELIVERY_CONFIRMED: &str = "Delivery confirmed";

impl Shipment {
    /// Build a new pending shipment. The first history entry records creation.
    pub fn create(
        id: String,
        code: String,
        otp: String,
        details: &ShipmentDetails,
        now: TimeStamp,
    ) -> Result<Shipment> {
        let details = details.validate()?;

        let mut history = HistoryLog::default();
        history.append(HistoryEntry::new(Milestone::Pending, now, CREATED));

        Ok(Shipment {
            id,
            code,
            description: details.description,
            value_cents: details.value_cents,
            origin: details.origin,
            destination: details.destination,
            origin_coords: details.origin_coords,
            destination_coords: details.destination_coords,
            weight: details.weight,
            status: Status::Pending,
            canceled: false,
            cancel_reason: None,
            otp,
            checklist: Checklist::standard(),
            history,
            rating: None,
            feedback: None,
            feedback_date: None,
            client_id: details.client_id,
            driver_id: None,
            vehicle_id: None,
            signature_digest: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn require_open(&self, action: &'static str, expected: Status) -> Result<()> {
        if self.canceled || self.status != expected {
            return Err(ShipmentError::InvalidState {
                action,
                state: self.state_label(),
            });
        }
        Ok(())
    }

    /// Assignment is metadata: no history entry.
    pub fn assign(&mut self, driver: UserId, vehicle: Option<String>, now: TimeStamp) -> Result<()> {
        self.require_open("assign", Status::Pending)?;

        self.driver_id = Some(driver);
        self.vehicle_id = vehicle;
        self.updated_at = now;
        Ok(())
    }

    /// Independent per-item write, allowed until the route starts.
    pub fn set_checklist_item(&mut self, item: &str, checked: bool, now: TimeStamp) -> Result<()> {
        self.require_open("edit the checklist of", Status::Pending)?;
        let item = item.trim();
        if item.is_empty() {
            return Err(ValidationError::EmptyChecklistItem.into());
        }

        self.checklist.set(item, checked);
        self.updated_at = now;
        Ok(())
    }

    /// `supplied` is merged over the stored checklist and every entry of the
    /// result has to be `true`.
    pub fn start_route(&mut self, supplied: &Checklist, now: TimeStamp) -> Result<()> {
        self.require_open("start the route of", Status::Pending)?;
        if self.driver_id.is_none() {
            return Err(Precondition::NoDriverAssigned.into());
        }
        let checklist = self.checklist.merged_with(supplied);
        if !checklist.is_complete() {
            return Err(Precondition::ChecklistIncomplete(checklist.unchecked()).into());
        }

        self.checklist = checklist;
        self.status = Status::EnRoute;
        self.history
            .append(HistoryEntry::new(Milestone::EnRoute, now, ROUTE_STARTED));
        self.updated_at = now;
        Ok(())
    }

    pub fn confirm_delivery(
        &mut self,
        supplied_otp: &str,
        signature_digest: Option<String>,
        now: TimeStamp,
    ) -> Result<()> {
        self.require_open("confirm delivery of", Status::EnRoute)?;
        gate::verify_otp(&self.otp, supplied_otp)?;

        self.status = Status::Delivered;
        self.signature_digest = signature_digest;
        self.history
            .append(HistoryEntry::new(Milestone::Delivered, now, DELIVERY_CONFIRMED));
        self.updated_at = now;
        Ok(())
    }

    /// Status stays where it was; `canceled` marks the shipment terminal.
    pub fn cancel(&mut self, reason: &str, now: TimeStamp) -> Result<()> {
        if self.is_terminal() {
            return Err(ShipmentError::InvalidState {
                action: "cancel",
                state: self.state_label(),
            });
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::EmptyReason.into());
        }

        self.canceled = true;
        self.cancel_reason = Some(reason.to_string());
        self.history
            .append(HistoryEntry::new(Milestone::Canceled, now, reason));
        self.updated_at = now;
        Ok(())
    }

    pub fn rate(&mut self, stars: u8, feedback: Option<&str>, now: TimeStamp) -> Result<()> {
        if !(1..=5).contains(&stars) {
            return Err(ValidationError::RatingOutOfRange(stars).into());
        }
        self.require_open("rate", Status::Delivered)?;
        if self.rating.is_some() {
            return Err(Precondition::AlreadyRated.into());
        }

        self.rating = Some(stars);
        self.feedback = feedback
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string);
        self.feedback_date = Some(now);
        self.updated_at = now;
        Ok(())
    }
}
