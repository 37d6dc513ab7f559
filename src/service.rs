//! Service layer API for shipment workflow operations
//!
//! Every mutating call authorises the actor, applies one lifecycle transition
//! through [`ShipmentStore::update_shipment`] and returns the shipment as it
//! was stored, so callers never need to re-read their own writes.
//!
//! Shipments handed to drivers never carry the delivery code.
use crate::config::Config;
use crate::directory::{NewUser, User, Vehicle};
use crate::error::{Result, ShipmentError, ValidationError};
use crate::message::{self, DEFAULT_MAX_MESSAGE_BYTES, Message, NewMessage};
use crate::shipment::{Checklist, Shipment, ShipmentDetails};
use crate::stats::FleetStats;
use crate::store::{
    DEFAULT_MAX_SIGNATURE_BYTES, Directory, SledStore, ShipmentStore, ShipmentWatch,
};
use crate::telemetry::operation_span;
use crate::types::{Actor, Role, TimeStamp, UserId};
use crate::utils;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ShipmentService<S = SledStore> {
    store: S,
    max_message_bytes: usize,
    max_signature_bytes: usize,
    code_prefix: String,
}

fn require(allowed: bool, actor: &Actor, action: &'static str) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(ShipmentError::Forbidden {
            actor: actor.id,
            action,
        })
    }
}

// drivers lose sight of a shipment once it is canceled
fn can_view(actor: &Actor, shipment: &Shipment) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Client => shipment.client_id() == actor.id,
        Role::Driver => shipment.driver_id() == Some(actor.id) && !shipment.is_canceled(),
    }
}

// chat stays open to every participant in any state
fn can_chat(actor: &Actor, shipment: &Shipment) -> bool {
    actor.is_admin() || shipment.is_participant(actor.id)
}

fn is_assigned_driver(actor: &Actor, shipment: &Shipment) -> bool {
    actor.role == Role::Driver && shipment.driver_id() == Some(actor.id)
}

fn is_owner(actor: &Actor, shipment: &Shipment) -> bool {
    actor.role == Role::Client && shipment.client_id() == actor.id
}

// the client hands the code over at the door; the driver only types it in
fn shown_to(actor: &Actor, shipment: Shipment) -> Shipment {
    if actor.role == Role::Driver {
        shipment.without_otp()
    } else {
        shipment
    }
}

fn confirm_as(
    actor: &Actor,
    shipment: &mut Shipment,
    supplied_otp: &str,
    signature_digest: Option<&str>,
) -> Result<()> {
    require(is_assigned_driver(actor, shipment), actor, "confirm this delivery")?;
    shipment.confirm_delivery(
        supplied_otp,
        signature_digest.map(str::to_string),
        TimeStamp::now(),
    )
}

// log a rejected call once, at the service boundary
fn logged<T>(result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        warn!(error.kind = e.kind(), error = %e, "operation rejected");
    }
    result
}

impl ShipmentService<SledStore> {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self> {
        Ok(Self::with_store(SledStore::new(instance)?))
    }

    /// Open the database named by the configuration.
    pub fn open(config: &Config) -> Result<Self> {
        let store = SledStore::open(&config.db_path)?;
        info!(path = %config.db_path.display(), "shipment store opened");

        Ok(Self::with_store(store)
            .max_message_bytes(config.max_message_bytes)
            .max_signature_bytes(config.max_signature_bytes)
            .code_prefix(&config.code_prefix))
    }

    /// Push notifications for one shipment, as an alternative to polling.
    pub fn watch(&self, actor: &Actor, shipment_id: &str) -> Result<ShipmentWatch> {
        let shipment = self.get_shipment(actor, shipment_id)?;
        let watch = self.store.watch(shipment.id());
        Ok(if actor.role == Role::Driver {
            watch.without_otp()
        } else {
            watch
        })
    }
}

impl<S: ShipmentStore + Directory> ShipmentService<S> {
    pub fn with_store(store: S) -> Self {
        Self {
            store,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            max_signature_bytes: DEFAULT_MAX_SIGNATURE_BYTES,
            code_prefix: "CL".to_string(),
        }
    }
    pub fn max_message_bytes(mut self, bytes: usize) -> Self {
        self.max_message_bytes = bytes;
        self
    }
    pub fn max_signature_bytes(mut self, bytes: usize) -> Self {
        self.max_signature_bytes = bytes;
        self
    }
    pub fn code_prefix(mut self, prefix: &str) -> Self {
        self.code_prefix = prefix.to_string();
        self
    }
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Register a user. Emails are unique, compared case-insensitively.
    pub fn register_user(&self, actor: &Actor, user: NewUser) -> Result<User> {
        logged(self.do_register_user(actor, user))
    }

    fn do_register_user(&self, actor: &Actor, user: NewUser) -> Result<User> {
        require(actor.is_admin(), actor, "register users")?;
        let user = self.store.insert_user(user.normalise()?)?;
        info!(user.id = user.id, user.role = %user.role, "user registered");
        Ok(user)
    }

    /// Register a vehicle. Plates are unique and stored upper case.
    pub fn register_vehicle(&self, actor: &Actor, vehicle: Vehicle) -> Result<Vehicle> {
        logged(self.do_register_vehicle(actor, vehicle))
    }

    fn do_register_vehicle(&self, actor: &Actor, vehicle: Vehicle) -> Result<Vehicle> {
        require(actor.is_admin(), actor, "register vehicles")?;
        let vehicle = self.store.insert_vehicle(vehicle.normalise()?)?;
        info!(vehicle.plate = %vehicle.plate, "vehicle registered");
        Ok(vehicle)
    }

    pub fn list_users(&self, actor: &Actor, role: Option<Role>) -> Result<Vec<User>> {
        require(actor.is_admin(), actor, "list users")?;
        let mut users = self.store.users()?;
        if let Some(role) = role {
            users.retain(|u| u.role == role);
        }
        Ok(users)
    }

    pub fn list_vehicles(&self, actor: &Actor) -> Result<Vec<Vehicle>> {
        require(actor.is_admin(), actor, "list vehicles")?;
        self.store.vehicles()
    }

    /// Look up a user who has to exist with `role`. An unknown id is a
    /// validation failure of the caller's input, not a missing resource.
    fn user_with_role(&self, id: UserId, role: Role) -> Result<User> {
        let mismatch = || -> ShipmentError {
            match role {
                Role::Driver => ValidationError::NotADriver(id).into(),
                _ => ValidationError::NotAClient(id).into(),
            }
        };
        match self.store.user(id) {
            Ok(user) if user.role == role => Ok(user),
            Ok(_) | Err(ShipmentError::NotFound(_)) => Err(mismatch()),
            Err(e) => Err(e),
        }
    }

    /// Create a new pending shipment for the client named in `details`.
    ///
    /// Admins may order on behalf of any client; clients only for themselves.
    pub fn create_shipment(&self, actor: &Actor, details: ShipmentDetails) -> Result<Shipment> {
        let span = operation_span("create", "-", actor);
        let _enter = span.enter();

        logged(self.do_create_shipment(actor, details))
    }

    fn do_create_shipment(&self, actor: &Actor, details: ShipmentDetails) -> Result<Shipment> {
        let client_id = details.client_id().ok_or(ValidationError::MissingClient)?;
        require(
            actor.is_admin() || (actor.role == Role::Client && actor.id == client_id),
            actor,
            "create shipments for this client",
        )?;
        self.user_with_role(client_id, Role::Client)?;

        let shipment = Shipment::create(
            utils::new_uuid_to_bech32("ship_")?,
            utils::generate_code(&self.code_prefix),
            utils::generate_otp(),
            &details,
            TimeStamp::now(),
        )?;
        self.store.insert_shipment(&shipment)?;

        info!(
            shipment.id = %shipment.id(),
            shipment.code = %shipment.code(),
            client.id = client_id,
            "shipment created"
        );
        Ok(shipment)
    }

    pub fn get_shipment(&self, actor: &Actor, shipment_id: &str) -> Result<Shipment> {
        let shipment = self.store.shipment(shipment_id)?;
        require(can_view(actor, &shipment), actor, "view this shipment")?;
        debug!(shipment.id = %shipment_id, actor.id = actor.id, "shipment read");
        Ok(shown_to(actor, shipment))
    }

    /// Shipments visible to the actor, most recently updated first.
    ///
    /// Drivers do not see canceled shipments.
    pub fn list_shipments(&self, actor: &Actor) -> Result<Vec<Shipment>> {
        let mut shipments: Vec<Shipment> = self
            .store
            .shipments()?
            .into_iter()
            .filter(|s| can_view(actor, s))
            .map(|s| shown_to(actor, s))
            .collect();
        shipments.sort_by(|a, b| b.updated_at().cmp(&a.updated_at()));
        Ok(shipments)
    }

    /// Assign a driver and optionally a vehicle while the shipment is pending.
    pub fn assign_driver_and_vehicle(
        &self,
        actor: &Actor,
        shipment_id: &str,
        driver_id: UserId,
        vehicle: Option<&str>,
    ) -> Result<Shipment> {
        let span = operation_span("assign", shipment_id, actor);
        let _enter = span.enter();

        logged(self.do_assign(actor, shipment_id, driver_id, vehicle))
    }

    fn do_assign(
        &self,
        actor: &Actor,
        shipment_id: &str,
        driver_id: UserId,
        vehicle: Option<&str>,
    ) -> Result<Shipment> {
        require(actor.is_admin(), actor, "assign drivers")?;
        self.user_with_role(driver_id, Role::Driver)?;
        let plate = match vehicle {
            Some(plate) => Some(self.store.vehicle(&plate.trim().to_uppercase())?.plate),
            None => None,
        };

        let shipment = self.store.update_shipment(shipment_id, |s| {
            s.assign(driver_id, plate.clone(), TimeStamp::now())
        })?;

        info!(driver.id = driver_id, vehicle = ?plate, "driver assigned");
        Ok(shipment)
    }

    /// Set one checklist item. Items are written independently, so two
    /// people ticking different items never overwrite each other.
    pub fn update_checklist(
        &self,
        actor: &Actor,
        shipment_id: &str,
        item: &str,
        checked: bool,
    ) -> Result<Shipment> {
        let span = operation_span("checklist", shipment_id, actor);
        let _enter = span.enter();

        let shipment = logged(self.store.update_shipment(shipment_id, |s| {
            require(
                actor.is_admin() || is_assigned_driver(actor, s),
                actor,
                "edit the checklist",
            )?;
            s.set_checklist_item(item, checked, TimeStamp::now())
        }))?;
        Ok(shown_to(actor, shipment))
    }

    /// Move a pending shipment on the road once every safety check is confirmed.
    pub fn start_route(
        &self,
        actor: &Actor,
        shipment_id: &str,
        checklist: &Checklist,
    ) -> Result<Shipment> {
        let span = operation_span("start_route", shipment_id, actor);
        let _enter = span.enter();

        let shipment = logged(self.store.update_shipment(shipment_id, |s| {
            require(
                actor.is_admin() || is_assigned_driver(actor, s),
                actor,
                "start this route",
            )?;
            s.start_route(checklist, TimeStamp::now())
        }))?;

        info!(from = "pending", to = "en_route", "state_transition");
        Ok(shown_to(actor, shipment))
    }

    /// Confirm delivery with the client's code and an optional signature
    /// image. A notice is posted to the shipment's chat on success.
    ///
    /// The signature is stored in the same atomic step as the transition, so
    /// a rejected call leaves nothing behind.
    pub fn confirm_delivery(
        &self,
        actor: &Actor,
        shipment_id: &str,
        supplied_otp: &str,
        signature: Option<&[u8]>,
    ) -> Result<Shipment> {
        let span = operation_span("confirm_delivery", shipment_id, actor);
        let _enter = span.enter();

        let shipment = logged(self.do_confirm_delivery(actor, shipment_id, supplied_otp, signature))?;

        info!(from = "en_route", to = "delivered", "state_transition");

        let notice = format!(
            "Delivery completed: shipment {} was delivered.",
            shipment.code()
        );
        if let Err(e) = self.append_message(actor, &shipment, &notice) {
            warn!(error = %e, "delivery notice could not be posted");
        }
        Ok(shown_to(actor, shipment))
    }

    fn do_confirm_delivery(
        &self,
        actor: &Actor,
        shipment_id: &str,
        supplied_otp: &str,
        signature: Option<&[u8]>,
    ) -> Result<Shipment> {
        match signature {
            Some(payload) if !payload.is_empty() => {
                if payload.len() > self.max_signature_bytes {
                    return Err(ValidationError::SignatureTooLarge {
                        len: payload.len(),
                        max: self.max_signature_bytes,
                    }
                    .into());
                }
                self.store
                    .update_shipment_with_signature(shipment_id, payload, |s, digest| {
                        confirm_as(actor, s, supplied_otp, Some(digest))
                    })
            }
            _ => self
                .store
                .update_shipment(shipment_id, |s| confirm_as(actor, s, supplied_otp, None)),
        }
    }

    /// Cancel a pending or en-route shipment. Its status is left untouched.
    pub fn cancel(&self, actor: &Actor, shipment_id: &str, reason: &str) -> Result<Shipment> {
        let span = operation_span("cancel", shipment_id, actor);
        let _enter = span.enter();

        let shipment = logged(self.store.update_shipment(shipment_id, |s| {
            require(
                actor.is_admin() || is_owner(actor, s),
                actor,
                "cancel this shipment",
            )?;
            s.cancel(reason, TimeStamp::now())
        }))?;

        info!(status = %shipment.status(), "shipment canceled");
        Ok(shipment)
    }

    /// Rate a delivered shipment. Only the owning client may rate, once.
    pub fn rate(
        &self,
        actor: &Actor,
        shipment_id: &str,
        stars: u8,
        feedback: Option<&str>,
    ) -> Result<Shipment> {
        let span = operation_span("rate", shipment_id, actor);
        let _enter = span.enter();

        let shipment = logged(self.store.update_shipment(shipment_id, |s| {
            require(is_owner(actor, s), actor, "rate this shipment")?;
            s.rate(stars, feedback, TimeStamp::now())
        }))?;

        info!(stars, "shipment rated");
        Ok(shipment)
    }

    /// The signature captured at delivery, if any.
    pub fn signature(&self, actor: &Actor, shipment_id: &str) -> Result<Option<Vec<u8>>> {
        let shipment = self.get_shipment(actor, shipment_id)?;
        shipment
            .signature_digest()
            .map(|digest| self.store.signature(digest))
            .transpose()
    }

    /// Post to a shipment's chat. Allowed in any state, including after
    /// delivery or cancellation.
    pub fn post_message(&self, actor: &Actor, shipment_id: &str, text: &str) -> Result<Message> {
        let span = operation_span("post_message", shipment_id, actor);
        let _enter = span.enter();

        logged(self.do_post_message(actor, shipment_id, text))
    }

    fn do_post_message(&self, actor: &Actor, shipment_id: &str, text: &str) -> Result<Message> {
        let text = message::validate_text(text, self.max_message_bytes)?;
        let shipment = self.store.shipment(shipment_id)?;
        require(can_chat(actor, &shipment), actor, "post to this shipment")?;
        self.append_message(actor, &shipment, &text)
    }

    /// All messages of a shipment, oldest first.
    pub fn list_messages(&self, actor: &Actor, shipment_id: &str) -> Result<Vec<Message>> {
        let shipment = self.store.shipment(shipment_id)?;
        require(can_chat(actor, &shipment), actor, "read this chat")?;
        self.store.messages(shipment.id())
    }

    pub fn stats(&self, actor: &Actor) -> Result<FleetStats> {
        require(actor.is_admin(), actor, "view statistics")?;
        let shipments = self.store.shipments()?;
        Ok(FleetStats::collect(&shipments))
    }

    fn append_message(&self, actor: &Actor, shipment: &Shipment, text: &str) -> Result<Message> {
        let sender = self.store.user(actor.id)?;
        let message = self.store.append_message(NewMessage {
            shipment_id: shipment.id().to_string(),
            sender_id: sender.id,
            sender_name: sender.name,
            text: text.to_string(),
            timestamp: TimeStamp::now(),
        })?;
        debug!(message.id = message.id, "message appended");
        Ok(message)
    }
}
