//! Append-only record of accepted lifecycle mutations.
use crate::error::{EngineError, Result};
use crate::purchase::PurchaseStatus;
use crate::reconcile::DeliveryStatus;
use crate::request::Availability;
use crate::status::Status;
use crate::timestamp::TimeStamp;

/// Which path moved a request's status.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOrigin {
    #[n(0)]
    Validated,
    #[n(1)]
    Consolidation,
    #[n(2)]
    Reconciled,
    #[n(3)]
    PurchasePropagation,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    #[n(0)]
    RequestCreated {
        #[n(0)]
        resource_name: String,
        #[n(1)]
        quantity: f64,
    },
    #[n(1)]
    StatusChanged {
        #[n(0)]
        from: Status,
        #[n(1)]
        to: Status,
        #[n(2)]
        origin: TransitionOrigin,
    },
    #[n(2)]
    QuantityChanged {
        #[n(0)]
        from: f64,
        #[n(1)]
        to: f64,
    },
    #[n(3)]
    FulfillmentRecorded {
        #[n(0)]
        fulfilled: f64,
        #[n(1)]
        delivery_status: DeliveryStatus,
    },
    #[n(4)]
    AvailabilitySet {
        #[n(0)]
        availability: Availability,
    },
    #[n(5)]
    PurchaseCreated {
        #[n(0)]
        vendor_id: String,
        #[n(1)]
        request_ids: Vec<String>,
    },
    #[n(6)]
    PurchaseStatusChanged {
        #[n(0)]
        from: PurchaseStatus,
        #[n(1)]
        to: PurchaseStatus,
    },
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct JournalEntry {
    #[n(0)]
    pub seq: u64,
    #[n(1)]
    pub subject_id: String, // request or purchase id
    #[n(2)]
    pub at: TimeStamp,
    #[n(3)]
    pub event: LifecycleEvent,
}

impl JournalEntry {
    /// Encodes the entry and returns the sha256 digest of the encoding with it.
    pub fn build(&self) -> Result<(String, Vec<u8>)> {
        let cbor = minicbor::to_vec(self).map_err(|e| EngineError::Codec(e.to_string()))?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}

#[derive(Debug, Default, Clone)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_entries(mut entries: Vec<JournalEntry>) -> Self {
        entries.sort_by_key(|e| e.seq);
        Self { entries }
    }

    pub fn record(
        &mut self,
        subject_id: impl Into<String>,
        event: LifecycleEvent,
    ) -> &JournalEntry {
        let seq = self.entries.last().map_or(0, |e| e.seq + 1);
        self.entries.push(JournalEntry {
            seq,
            subject_id: subject_id.into(),
            at: TimeStamp::now(),
            event,
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Entries recorded at or after `seq`.
    pub fn since(&self, seq: u64) -> &[JournalEntry] {
        let start = self.entries.partition_point(|e| e.seq < seq);
        &self.entries[start..]
    }

    /// Drops every entry at or after `seq`.
    pub(crate) fn truncate(&mut self, seq: u64) {
        let keep = self.entries.partition_point(|e| e.seq < seq);
        self.entries.truncate(keep);
    }

    pub fn next_seq(&self) -> u64 {
        self.entries.last().map_or(0, |e| e.seq + 1)
    }

    pub fn history<'a>(&'a self, subject_id: &'a str) -> impl Iterator<Item = &'a JournalEntry> {
        self.entries.iter().filter(move |e| e.subject_id == subject_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let mut journal = Journal::new();
        journal.record("req_a", LifecycleEvent::AvailabilitySet {
            availability: Availability::Limited,
        });
        journal.record("req_b", LifecycleEvent::QuantityChanged { from: 1.0, to: 2.0 });
        let seqs: Vec<u64> = journal.entries().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1]);
        assert_eq!(journal.since(1).len(), 1);
        assert_eq!(journal.history("req_a").count(), 1);

        journal.truncate(1);
        assert_eq!(journal.len(), 1);
        assert_eq!(journal.next_seq(), 1);
    }

    #[test]
    fn entry_digest_covers_its_encoding() {
        let mut journal = Journal::new();
        let entry = journal
            .record("req_a", LifecycleEvent::StatusChanged {
                from: Status::Pending,
                to: Status::Selected,
                origin: TransitionOrigin::Validated,
            })
            .clone();

        let (hash, cbor) = entry.build().unwrap();
        assert_eq!(hash, sha256::digest(&cbor));

        let decoded: JournalEntry = minicbor::decode(&cbor).unwrap();
        assert_eq!(decoded, entry);
    }
}
