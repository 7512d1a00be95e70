//! Service layer API for request and purchase workflow operations
use crate::config::EngineConfig;
use crate::consolidation::{self, MemberChange};
use crate::error::{EngineError, Result};
use crate::journal::{Journal, LifecycleEvent, TransitionOrigin};
use crate::persist::{self, WriteSet};
use crate::purchase::{Purchase, PurchaseStatus};
use crate::reconcile::{self, DeliveryStatus};
use crate::request::{Availability, NewRequest, ResourceRequest};
use crate::status::Status;
use crate::store::{PurchaseStore, RequestStore};
use crate::timestamp::CalendarDate;
use crate::utils;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns the request and purchase stores and is the only way collaborators
/// mutate them. Mutations return owned snapshots.
#[derive(Debug)]
pub struct ProcurementService {
    requests: RequestStore,
    purchases: PurchaseStore,
    journal: Journal,
    config: EngineConfig,
    db: Option<Arc<sled::Db>>,
}

impl Default for ProcurementService {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcurementService {
    /// In-memory service with default id prefixes.
    pub fn new() -> Self {
        Self {
            requests: RequestStore::new(),
            purchases: PurchaseStore::new(),
            journal: Journal::new(),
            config: EngineConfig::default(),
            db: None,
        }
    }

    /// Opens a service backed by `db`, reloading anything already stored there.
    pub fn open(db: Arc<sled::Db>) -> Result<Self> {
        Self::open_with(db, EngineConfig::default())
    }

    fn open_with(db: Arc<sled::Db>, config: EngineConfig) -> Result<Self> {
        let (requests, purchases, journal) = persist::load(&db)?;
        info!(
            requests = requests.len(),
            purchases = purchases.len(),
            journal = journal.len(),
            "opened procurement store"
        );
        Ok(Self {
            requests,
            purchases,
            journal,
            config,
            db: Some(db),
        })
    }

    /// Builds a service from configuration, opening the sled database when a
    /// storage path is set.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        match config.storage_path.clone() {
            Some(path) => {
                let db = sled::open(path)?;
                Self::open_with(Arc::new(db), config)
            }
            None => Ok(Self {
                config,
                ..Self::new()
            }),
        }
    }

    /// Blocks until every persisted write has reached disk. No-op in memory.
    pub fn flush(&self) -> Result<()> {
        if let Some(db) = &self.db {
            db.flush()?;
        }
        Ok(())
    }

    pub fn requests(&self) -> &RequestStore {
        &self.requests
    }

    pub fn purchases(&self) -> &PurchaseStore {
        &self.purchases
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn request(&self, id: &str) -> Result<&ResourceRequest> {
        self.requests
            .get(id)
            .ok_or_else(|| EngineError::request_not_found(id))
    }

    pub fn purchase(&self, id: &str) -> Result<&Purchase> {
        self.purchases
            .get(id)
            .ok_or_else(|| EngineError::purchase_not_found(id))
    }

    /// Create a new request in `pending`
    pub fn create_request(&mut self, draft: NewRequest) -> Result<ResourceRequest> {
        if let Err(e) = draft.validate() {
            warn!(error = %e, "rejected request draft");
            return Err(e.into());
        }
        let id = new_id(&self.config.request_prefix)?;
        let checkpoint = self.checkpoint(&[id.as_str()], &[]);
        let request = self.requests.create(id, draft)?.clone();

        self.journal.record(request.id(), LifecycleEvent::RequestCreated {
            resource_name: request.resource_name().to_string(),
            quantity: request.quantity(),
        });
        info!(id = request.id(), resource = request.resource_name(), "created request");

        self.commit(checkpoint)?;
        Ok(request)
    }

    /// Direct status change, gated by the transition rules.
    pub fn set_status(
        &mut self,
        id: &str,
        status: Status,
        delivery_notes: Option<String>,
    ) -> Result<ResourceRequest> {
        let from = self.request(id)?.status();
        let checkpoint = self.checkpoint(&[id], &[]);
        let request = match self.requests.set_status(id, status, delivery_notes) {
            Ok(request) => request.clone(),
            Err(e) => {
                warn!(id, %from, to = %status, "rejected status change");
                return Err(e);
            }
        };

        self.journal.record(id, LifecycleEvent::StatusChanged {
            from,
            to: status,
            origin: TransitionOrigin::Validated,
        });
        debug!(id, %from, to = %status, "status changed");

        self.commit(checkpoint)?;
        Ok(request)
    }

    /// Changes the requested quantity. Rejected when it would fall below what
    /// has already been fulfilled; otherwise delivery status is re-derived.
    pub fn set_quantity(&mut self, id: &str, quantity: f64) -> Result<ResourceRequest> {
        let before = self.request(id)?.clone();
        let checkpoint = self.checkpoint(&[id], &[]);
        let request = self.requests.set_quantity(id, quantity)?.clone();

        self.journal.record(id, LifecycleEvent::QuantityChanged {
            from: before.quantity(),
            to: quantity,
        });
        self.record_reconciled_status(&before, &request);
        debug!(id, from = before.quantity(), to = quantity, "quantity changed");

        self.commit(checkpoint)?;
        Ok(request)
    }

    /// Records the delivered quantity and reconciles delivery status. A full
    /// delivery forces the request to `delivered`.
    pub fn set_fulfilled_quantity(&mut self, id: &str, fulfilled: f64) -> Result<ResourceRequest> {
        let before = self.request(id)?.clone();
        let checkpoint = self.checkpoint(&[id], &[]);
        let request = match self.requests.set_fulfilled_quantity(id, fulfilled) {
            Ok(request) => request.clone(),
            Err(e) => {
                warn!(id, fulfilled, quantity = before.quantity(), "rejected fulfillment");
                return Err(e);
            }
        };

        if let Some(delivery_status) = request.delivery_status() {
            self.journal.record(id, LifecycleEvent::FulfillmentRecorded {
                fulfilled,
                delivery_status,
            });
        }
        self.record_reconciled_status(&before, &request);
        debug!(id, fulfilled, "fulfillment recorded");

        self.commit(checkpoint)?;
        Ok(request)
    }

    pub fn set_availability(
        &mut self,
        id: &str,
        availability: Availability,
    ) -> Result<ResourceRequest> {
        let checkpoint = self.checkpoint(&[id], &[]);
        let request = self.requests.set_availability(id, availability)?.clone();

        self.journal
            .record(id, LifecycleEvent::AvailabilitySet { availability });

        self.commit(checkpoint)?;
        Ok(request)
    }

    /// Consolidates `selected` requests into one purchase with one vendor.
    /// Either every member is stamped or nothing changes.
    pub fn create_purchase(
        &mut self,
        request_ids: Vec<String>,
        vendor_id: &str,
        estimated_delivery: CalendarDate,
        notes: Option<String>,
    ) -> Result<Purchase> {
        if let Err(e) =
            consolidation::check_consolidation(&self.requests, &request_ids, vendor_id)
        {
            warn!(error = %e, "rejected consolidation");
            return Err(e.into());
        }
        let purchase_id = new_id(&self.config.purchase_prefix)?;
        let members: Vec<&str> = request_ids.iter().map(String::as_str).collect();
        let checkpoint = self.checkpoint(&members, &[purchase_id.as_str()]);

        let changes = consolidation::consolidate(
            &mut self.requests,
            &mut self.purchases,
            purchase_id.clone(),
            request_ids.clone(),
            vendor_id.to_string(),
            estimated_delivery,
            notes,
        )?;
        let purchase = self.purchase(&purchase_id)?.clone();

        self.journal.record(&purchase_id, LifecycleEvent::PurchaseCreated {
            vendor_id: purchase.vendor_id().to_string(),
            request_ids: request_ids.clone(),
        });
        self.record_member_changes(&changes, TransitionOrigin::Consolidation);
        info!(
            id = %purchase_id,
            vendor = purchase.vendor_id(),
            members = request_ids.len(),
            "created purchase"
        );

        self.commit(checkpoint)?;
        Ok(purchase)
    }

    /// Moves a purchase and overwrites every member request's status to match.
    pub fn set_purchase_status(
        &mut self,
        purchase_id: &str,
        status: PurchaseStatus,
    ) -> Result<Purchase> {
        let members = self.purchase(purchase_id)?.request_ids().to_vec();
        let members: Vec<&str> = members.iter().map(String::as_str).collect();
        let checkpoint = self.checkpoint(&members, &[purchase_id]);

        let (from, changes) = consolidation::propagate_status(
            &mut self.requests,
            &mut self.purchases,
            purchase_id,
            status,
        )?;
        let purchase = self.purchase(purchase_id)?.clone();

        self.journal.record(purchase_id, LifecycleEvent::PurchaseStatusChanged {
            from,
            to: status,
        });
        self.record_member_changes(&changes, TransitionOrigin::PurchasePropagation);
        debug!(
            purchase_id,
            %from,
            to = %status,
            members = changes.len(),
            "purchase status changed"
        );

        self.commit(checkpoint)?;
        Ok(purchase)
    }

    /// Delivery progress of a purchase rolled up from its members.
    pub fn purchase_progress(&self, purchase_id: &str) -> Result<DeliveryStatus> {
        let purchase = self.purchase(purchase_id)?;
        Ok(reconcile::aggregate(
            purchase
                .request_ids()
                .iter()
                .map(|id| self.requests.get(id).and_then(ResourceRequest::delivery_status)),
        ))
    }

    fn record_reconciled_status(&mut self, before: &ResourceRequest, after: &ResourceRequest) {
        if before.status() != after.status() {
            self.journal.record(after.id(), LifecycleEvent::StatusChanged {
                from: before.status(),
                to: after.status(),
                origin: TransitionOrigin::Reconciled,
            });
            info!(id = after.id(), to = %after.status(), "status forced by fulfillment");
        }
    }

    fn record_member_changes(&mut self, changes: &[MemberChange], origin: TransitionOrigin) {
        for change in changes {
            self.journal.record(&change.request_id, LifecycleEvent::StatusChanged {
                from: change.from,
                to: change.to,
                origin,
            });
        }
    }

    fn checkpoint(&self, request_ids: &[&str], purchase_ids: &[&str]) -> Checkpoint {
        Checkpoint {
            requests: request_ids
                .iter()
                .map(|id| (id.to_string(), self.requests.get(id).cloned()))
                .collect(),
            purchases: purchase_ids
                .iter()
                .map(|id| (id.to_string(), self.purchases.get(id).cloned()))
                .collect(),
            seq: self.journal.next_seq(),
        }
    }

    // memory only counts as committed once the write-through lands
    fn commit(&mut self, checkpoint: Checkpoint) -> Result<()> {
        let outcome = self.persist(&checkpoint);
        self.settle(checkpoint, outcome)
    }

    fn settle(&mut self, checkpoint: Checkpoint, outcome: Result<()>) -> Result<()> {
        if let Err(e) = outcome {
            warn!(error = %e, seq = checkpoint.seq, "write-through failed, rolling back");
            self.rollback(checkpoint);
            return Err(e);
        }
        Ok(())
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        for (id, before) in checkpoint.requests {
            match before {
                Some(request) => {
                    self.requests.insert(request);
                }
                None => {
                    self.requests.remove(&id);
                }
            }
        }
        for (id, before) in checkpoint.purchases {
            match before {
                Some(purchase) => {
                    self.purchases.insert(purchase);
                }
                None => {
                    self.purchases.remove(&id);
                }
            }
        }
        self.journal.truncate(checkpoint.seq);
    }

    // write-through of the touched entities and every journal entry since the checkpoint
    fn persist(&self, checkpoint: &Checkpoint) -> Result<()> {
        let Some(db) = &self.db else {
            return Ok(());
        };

        let mut writes = WriteSet::new();
        for (id, _) in &checkpoint.requests {
            writes.request(self.request(id)?)?;
        }
        for (id, _) in &checkpoint.purchases {
            writes.purchase(self.purchase(id)?)?;
        }
        writes.journal(self.journal.since(checkpoint.seq))?;
        writes.apply(db)
    }
}

/// Entities touched by one mutation as they were before it ran, plus the
/// journal position it started at.
#[derive(Debug)]
struct Checkpoint {
    requests: Vec<(String, Option<ResourceRequest>)>,
    purchases: Vec<(String, Option<Purchase>)>,
    seq: u64,
}

fn new_id(prefix: &str) -> Result<String> {
    utils::new_uuid_to_bech32(prefix).map_err(|e| EngineError::Identifier(e.to_string()))
}
