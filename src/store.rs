//! Persistence for shipments, messages and the user/vehicle directory.
//!
//! [`SledStore`] keeps every record CBOR-encoded in its own sled tree:
//!
//! | tree          | key                                   | value       |
//! |---------------|---------------------------------------|-------------|
//! | `shipments`   | shipment id                           | `Shipment`  |
//! | `messages`    | shipment id, `/`, u64 sequence (BE)   | `Message`   |
//! | `users`       | user id (BE)                          | `User`      |
//! | `user_emails` | email                                 | user id     |
//! | `vehicles`    | plate                                 | `Vehicle`   |
//! | `signatures`  | sha256 hex digest of the payload      | payload     |
use crate::directory::{NewUser, User, Vehicle};
use crate::error::{Result, ShipmentError};
use crate::message::{Message, NewMessage};
use crate::shipment::Shipment;
use crate::types::UserId;
use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionError};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default bound on a delivery signature payload.
pub const DEFAULT_MAX_SIGNATURE_BYTES: usize = 256 * 1024;

pub trait ShipmentStore {
    fn insert_shipment(&self, shipment: &Shipment) -> Result<()>;
    fn shipment(&self, id: &str) -> Result<Shipment>;
    fn shipments(&self) -> Result<Vec<Shipment>>;
    /// Read, apply and write back as one atomic step. When `apply` fails
    /// nothing is written and its error is returned. `apply` may be called
    /// more than once if a concurrent writer forces a retry.
    fn update_shipment<F>(&self, id: &str, apply: F) -> Result<Shipment>
    where
        F: Fn(&mut Shipment) -> Result<()>;
    fn append_message(&self, message: NewMessage) -> Result<Message>;
    /// Oldest first.
    fn messages(&self, shipment_id: &str) -> Result<Vec<Message>>;
    /// Like [`ShipmentStore::update_shipment`], storing `signature` under its
    /// digest in the same atomic step. `apply` receives the digest. When
    /// `apply` fails neither the shipment nor the signature is written.
    fn update_shipment_with_signature<F>(
        &self,
        id: &str,
        signature: &[u8],
        apply: F,
    ) -> Result<Shipment>
    where
        F: Fn(&mut Shipment, &str) -> Result<()>;
    fn signature(&self, digest: &str) -> Result<Vec<u8>>;
}

pub trait Directory {
    fn insert_user(&self, user: NewUser) -> Result<User>;
    fn user(&self, id: UserId) -> Result<User>;
    fn users(&self) -> Result<Vec<User>>;
    fn insert_vehicle(&self, vehicle: Vehicle) -> Result<Vehicle>;
    fn vehicle(&self, plate: &str) -> Result<Vehicle>;
    fn vehicles(&self) -> Result<Vec<Vehicle>>;
}

#[derive(Clone)]
pub struct SledStore {
    db: Arc<sled::Db>,
    shipments: sled::Tree,
    messages: sled::Tree,
    users: sled::Tree,
    user_emails: sled::Tree,
    vehicles: sled::Tree,
    signatures: sled::Tree,
}

fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>> {
    Ok(minicbor::to_vec(value)?)
}

fn decode<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    Ok(minicbor::decode(bytes)?)
}

fn message_prefix(shipment_id: &str) -> Vec<u8> {
    let mut prefix = shipment_id.as_bytes().to_vec();
    prefix.push(b'/');
    prefix
}

fn abort(e: ShipmentError) -> ConflictableTransactionError<ShipmentError> {
    ConflictableTransactionError::Abort(e)
}

fn flatten<T>(result: std::result::Result<T, TransactionError<ShipmentError>>) -> Result<T> {
    result.map_err(|e| match e {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => ShipmentError::Storage(e),
    })
}

impl SledStore {
    pub fn new(db: Arc<sled::Db>) -> Result<Self> {
        Ok(Self {
            shipments: db.open_tree("shipments")?,
            messages: db.open_tree("messages")?,
            users: db.open_tree("users")?,
            user_emails: db.open_tree("user_emails")?,
            vehicles: db.open_tree("vehicles")?,
            signatures: db.open_tree("signatures")?,
            db,
        })
    }

    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::new(Arc::new(sled::open(path)?))
    }

    /// Block until everything written so far is durable.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Subscribe to writes of one shipment.
    pub fn watch(&self, shipment_id: &str) -> ShipmentWatch {
        ShipmentWatch {
            id: shipment_id.to_string(),
            subscriber: self.shipments.watch_prefix(shipment_id.as_bytes()),
            hide_otp: false,
        }
    }

    fn scan<T>(tree: &sled::Tree, prefix: &[u8]) -> Result<Vec<T>>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        tree.scan_prefix(prefix)
            .map(|entry| {
                let (_, value) = entry?;
                decode(&value)
            })
            .collect()
    }
}

impl ShipmentStore for SledStore {
    fn insert_shipment(&self, shipment: &Shipment) -> Result<()> {
        let encoded = encode(shipment)?;
        self.shipments
            .compare_and_swap(shipment.id(), None as Option<&[u8]>, Some(encoded))?
            .map_err(|_| ShipmentError::Conflict(format!("shipment {}", shipment.id())))
    }

    fn shipment(&self, id: &str) -> Result<Shipment> {
        match self.shipments.get(id)? {
            Some(bytes) => decode(&bytes),
            None => Err(ShipmentError::NotFound(format!("shipment {id}"))),
        }
    }

    fn shipments(&self) -> Result<Vec<Shipment>> {
        Self::scan(&self.shipments, &[])
    }

    fn update_shipment<F>(&self, id: &str, apply: F) -> Result<Shipment>
    where
        F: Fn(&mut Shipment) -> Result<()>,
    {
        flatten(self.shipments.transaction(
            |tx| -> ConflictableTransactionResult<Shipment, ShipmentError> {
                let bytes = tx
                    .get(id)?
                    .ok_or_else(|| abort(ShipmentError::NotFound(format!("shipment {id}"))))?;
                let mut shipment: Shipment = decode(&bytes).map_err(abort)?;
                apply(&mut shipment).map_err(abort)?;
                tx.insert(id.as_bytes(), encode(&shipment).map_err(abort)?)?;
                Ok(shipment)
            },
        ))
    }

    fn append_message(&self, message: NewMessage) -> Result<Message> {
        let message = message.into_message(self.db.generate_id()?);
        let mut key = message_prefix(&message.shipment_id);
        key.extend_from_slice(&message.id.to_be_bytes());

        self.messages.insert(key, encode(&message)?)?;
        Ok(message)
    }

    fn messages(&self, shipment_id: &str) -> Result<Vec<Message>> {
        Self::scan(&self.messages, &message_prefix(shipment_id))
    }

    fn update_shipment_with_signature<F>(
        &self,
        id: &str,
        signature: &[u8],
        apply: F,
    ) -> Result<Shipment>
    where
        F: Fn(&mut Shipment, &str) -> Result<()>,
    {
        let digest = sha256::digest(signature.to_vec());

        flatten((&self.shipments, &self.signatures).transaction(
            |(shipments, signatures)| -> ConflictableTransactionResult<Shipment, ShipmentError> {
                let bytes = shipments
                    .get(id)?
                    .ok_or_else(|| abort(ShipmentError::NotFound(format!("shipment {id}"))))?;
                let mut shipment: Shipment = decode(&bytes).map_err(abort)?;
                apply(&mut shipment, &digest).map_err(abort)?;
                signatures.insert(digest.as_bytes(), signature)?;
                shipments.insert(id.as_bytes(), encode(&shipment).map_err(abort)?)?;
                Ok(shipment)
            },
        ))
    }

    fn signature(&self, digest: &str) -> Result<Vec<u8>> {
        match self.signatures.get(digest)? {
            Some(bytes) => Ok(bytes.to_vec()),
            None => Err(ShipmentError::NotFound(format!("signature {digest}"))),
        }
    }
}

impl Directory for SledStore {
    fn insert_user(&self, user: NewUser) -> Result<User> {
        // ids start at 1
        let user = user.into_user(self.db.generate_id()? + 1);
        let key = user.id.to_be_bytes();
        let encoded = encode(&user)?;

        flatten((&self.users, &self.user_emails).transaction(
            |(users, emails)| -> ConflictableTransactionResult<(), ShipmentError> {
                if emails.get(user.email.as_bytes())?.is_some() {
                    return Err(abort(ShipmentError::Conflict(format!(
                        "user with email {}",
                        user.email
                    ))));
                }
                emails.insert(user.email.as_bytes(), &key[..])?;
                users.insert(&key[..], encoded.clone())?;
                Ok(())
            },
        ))?;
        Ok(user)
    }

    fn user(&self, id: UserId) -> Result<User> {
        match self.users.get(id.to_be_bytes())? {
            Some(bytes) => decode(&bytes),
            None => Err(ShipmentError::NotFound(format!("user {id}"))),
        }
    }

    fn users(&self) -> Result<Vec<User>> {
        Self::scan(&self.users, &[])
    }

    fn insert_vehicle(&self, vehicle: Vehicle) -> Result<Vehicle> {
        let encoded = encode(&vehicle)?;
        self.vehicles
            .compare_and_swap(vehicle.plate.as_bytes(), None as Option<&[u8]>, Some(encoded))?
            .map_err(|_| ShipmentError::Conflict(format!("vehicle {}", vehicle.plate)))?;
        Ok(vehicle)
    }

    fn vehicle(&self, plate: &str) -> Result<Vehicle> {
        match self.vehicles.get(plate.as_bytes())? {
            Some(bytes) => decode(&bytes),
            None => Err(ShipmentError::NotFound(format!("vehicle {plate}"))),
        }
    }

    fn vehicles(&self) -> Result<Vec<Vehicle>> {
        Self::scan(&self.vehicles, &[])
    }
}

/// Yields the stored state of a shipment after each write to it.
pub struct ShipmentWatch {
    id: String,
    subscriber: sled::Subscriber,
    hide_otp: bool,
}

impl std::fmt::Debug for ShipmentWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShipmentWatch")
            .field("id", &self.id)
            .field("hide_otp", &self.hide_otp)
            .finish_non_exhaustive()
    }
}

impl ShipmentWatch {
    /// Yield copies without the delivery code.
    pub fn without_otp(mut self) -> Self {
        self.hide_otp = true;
        self
    }

    fn decode_event(&self, event: sled::Event) -> Option<Result<Shipment>> {
        match event {
            sled::Event::Insert { key, value } if key.as_ref() == self.id.as_bytes() => {
                let shipment = decode::<Shipment>(&value);
                Some(if self.hide_otp {
                    shipment.map(Shipment::without_otp)
                } else {
                    shipment
                })
            }
            _ => None,
        }
    }

    /// Waits at most `timeout` for the next write; `None` if none arrived.
    pub fn next_timeout(&mut self, timeout: Duration) -> Option<Result<Shipment>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let event = self.subscriber.next_timeout(remaining).ok()?;
            if let Some(update) = self.decode_event(event) {
                return Some(update);
            }
        }
    }
}

impl Iterator for ShipmentWatch {
    type Item = Result<Shipment>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let event = self.subscriber.next()?;
            if let Some(update) = self.decode_event(event) {
                return Some(update);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Role, TimeStamp};

    fn temp_store() -> (tempfile::TempDir, SledStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path().join("store.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn messages_are_scoped_and_ordered() {
        let (_dir, store) = temp_store();
        for (shipment, text) in [("ship_a", "one"), ("ship_b", "other"), ("ship_a", "two")] {
            store
                .append_message(NewMessage {
                    shipment_id: shipment.into(),
                    sender_id: 1,
                    sender_name: "Admin".into(),
                    text: text.into(),
                    timestamp: TimeStamp::now(),
                })
                .unwrap();
        }

        let texts: Vec<_> = store
            .messages("ship_a")
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[test]
    fn duplicate_email_is_a_conflict() {
        let (_dir, store) = temp_store();
        store
            .insert_user(NewUser::new("Carlos", "carlos@example.com", Role::Driver))
            .unwrap();
        let err = store
            .insert_user(NewUser::new("Other", "carlos@example.com", Role::Client))
            .unwrap_err();
        assert!(matches!(err, ShipmentError::Conflict(_)));
        assert_eq!(store.users().unwrap().len(), 1);
    }

    fn stored_shipment(store: &SledStore) -> Shipment {
        let details = crate::shipment::ShipmentDetails::new()
            .set_description("Pallets")
            .set_value(10.0)
            .set_client(1);
        let shipment = Shipment::create(
            "ship_sig".into(),
            "CL-0001".into(),
            "9988".into(),
            &details,
            TimeStamp::now(),
        )
        .unwrap();
        store.insert_shipment(&shipment).unwrap();
        shipment
    }

    #[test]
    fn signature_is_content_addressed() {
        let (_dir, store) = temp_store();
        let shipment = stored_shipment(&store);

        let updated = store
            .update_shipment_with_signature(shipment.id(), b"<svg/>", |s, digest| {
                s.signature_digest = Some(digest.to_string());
                Ok(())
            })
            .unwrap();

        let digest = updated.signature_digest().unwrap();
        assert_eq!(digest, sha256::digest(b"<svg/>".to_vec()));
        assert_eq!(store.signature(digest).unwrap(), b"<svg/>".to_vec());
    }

    #[test]
    fn rejected_update_keeps_no_signature() {
        let (_dir, store) = temp_store();
        let shipment = stored_shipment(&store);

        let err = store
            .update_shipment_with_signature(shipment.id(), b"<svg/>", |_, _| {
                Err(ShipmentError::OtpMismatch)
            })
            .unwrap_err();
        assert!(matches!(err, ShipmentError::OtpMismatch));
        assert!(store.signatures.is_empty());
        assert_eq!(store.shipment(shipment.id()).unwrap(), shipment);

        let err = store
            .update_shipment_with_signature("ship_missing", b"<svg/>", |_, _| Ok(()))
            .unwrap_err();
        assert!(matches!(err, ShipmentError::NotFound(_)));
        assert!(store.signatures.is_empty());
    }

    #[test]
    fn missing_shipment_is_not_found() {
        let (_dir, store) = temp_store();
        let err = store.update_shipment("ship_missing", |_| Ok(())).unwrap_err();
        assert!(matches!(err, ShipmentError::NotFound(_)));
    }
}
