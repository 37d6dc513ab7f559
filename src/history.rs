//! Append-only audit trail of lifecycle events.
use crate::shipment::Status;
use crate::types::TimeStamp;
use serde::Serialize;

/// What a history entry records. Unlike [`Status`] this includes cancellation,
/// which is a flag on the shipment rather than a status of its own.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    #[n(0)]
    Pending,
    #[n(1)]
    EnRoute,
    #[n(2)]
    Delivered,
    #[n(3)]
    Canceled,
}

impl From<Status> for Milestone {
    fn from(value: Status) -> Self {
        match value {
            Status::Pending => Milestone::Pending,
            Status::EnRoute => Milestone::EnRoute,
            Status::Delivered => Milestone::Delivered,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Serialize)]
pub struct HistoryEntry {
    #[n(0)]
    status: Milestone,
    #[n(1)]
    date: TimeStamp,
    #[n(2)]
    description: String,
}

impl HistoryEntry {
    pub(crate) fn new(status: Milestone, date: TimeStamp, description: impl Into<String>) -> Self {
        Self {
            status,
            date,
            description: description.into(),
        }
    }
    pub fn status(&self) -> Milestone {
        self.status
    }
    pub fn date(&self) -> TimeStamp {
        self.date
    }
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Ordered oldest first. There is no way to remove or edit an entry once it
/// has been appended.
#[derive(Debug, Clone, Default, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Serialize)]
#[serde(transparent)]
pub struct HistoryLog(#[n(0)] Vec<HistoryEntry>);

impl HistoryLog {
    pub(crate) fn append(&mut self, entry: HistoryEntry) {
        self.0.push(entry);
    }
    pub fn read(&self) -> &[HistoryEntry] {
        &self.0
    }
    /// Display order used by timelines.
    pub fn newest_first(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.0.iter().rev()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn first(&self) -> Option<&HistoryEntry> {
        self.0.first()
    }
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.0.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_keeps_insertion_order() {
        let mut log = HistoryLog::default();
        log.append(HistoryEntry::new(Milestone::Pending, TimeStamp::now(), "Created"));
        log.append(HistoryEntry::new(Milestone::EnRoute, TimeStamp::now(), "Route started"));

        let statuses: Vec<_> = log.read().iter().map(|e| e.status()).collect();
        assert_eq!(statuses, vec![Milestone::Pending, Milestone::EnRoute]);

        let newest = log.newest_first().next().unwrap();
        assert_eq!(newest.description(), "Route started");
    }

    #[test]
    fn log_survives_cbor() {
        let mut log = HistoryLog::default();
        log.append(HistoryEntry::new(Milestone::Canceled, TimeStamp::now(), "Client request"));

        let bytes = minicbor::to_vec(&log).unwrap();
        let decoded: HistoryLog = minicbor::decode(&bytes).unwrap();
        assert_eq!(log, decoded);
    }
}
