//! In-memory owners of the request and purchase collections.
//!
//! Readers get shared references; every write goes through a method here so
//! the quantity, fulfillment and transition rules cannot be skipped.
use crate::error::{EngineError, Result};
use crate::purchase::{Purchase, PurchaseStatus};
use crate::request::{Availability, NewRequest, ResourceRequest};
use crate::status::{Status, validate_transition};
use crate::timestamp::TimeStamp;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct RequestStore {
    requests: Vec<ResourceRequest>,
    index: HashMap<String, usize>,
}

impl RequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ResourceRequest> {
        self.index.get(id).map(|&i| &self.requests[i])
    }

    /// All requests in creation order.
    pub fn all(&self) -> &[ResourceRequest] {
        &self.requests
    }

    pub fn by_status(&self, status: Status) -> impl Iterator<Item = &ResourceRequest> {
        self.requests.iter().filter(move |r| r.status() == status)
    }

    pub fn by_purchase<'a>(
        &'a self,
        purchase_id: &'a str,
    ) -> impl Iterator<Item = &'a ResourceRequest> {
        self.requests
            .iter()
            .filter(move |r| r.purchase_id() == Some(purchase_id))
    }

    /// Most urgent first: priority, then needed-by date, then age.
    pub fn by_urgency(&self) -> Vec<&ResourceRequest> {
        let mut sorted: Vec<&ResourceRequest> = self.requests.iter().collect();
        sorted.sort_by_key(|r| (r.priority(), r.needed_date(), r.created_at()));
        sorted
    }

    pub fn create(&mut self, id: String, draft: NewRequest) -> Result<&ResourceRequest> {
        let request = ResourceRequest::from_draft(id, draft, TimeStamp::now())?;
        Ok(self.insert(request))
    }

    /// Validated status change, optionally recording delivery notes.
    pub fn set_status(
        &mut self,
        id: &str,
        status: Status,
        delivery_notes: Option<String>,
    ) -> Result<&ResourceRequest> {
        let request = self.get_mut(id)?;
        validate_transition(request.status(), status)?;
        request.set_status_unchecked(status);
        if let Some(notes) = delivery_notes {
            request.set_delivery_notes(notes);
        }
        Ok(&*request)
    }

    pub fn set_quantity(&mut self, id: &str, quantity: f64) -> Result<&ResourceRequest> {
        let request = self.get_mut(id)?;
        request.set_quantity(quantity)?;
        Ok(&*request)
    }

    pub fn set_fulfilled_quantity(&mut self, id: &str, fulfilled: f64) -> Result<&ResourceRequest> {
        let request = self.get_mut(id)?;
        request.record_fulfillment(fulfilled)?;
        Ok(&*request)
    }

    pub fn set_availability(
        &mut self,
        id: &str,
        availability: Availability,
    ) -> Result<&ResourceRequest> {
        let request = self.get_mut(id)?;
        request.set_availability(availability);
        Ok(&*request)
    }

    /// Authoritative override: writes `status` without consulting the
    /// transition rules. Only purchase propagation calls this.
    pub(crate) fn override_status(&mut self, id: &str, status: Status) -> Result<&ResourceRequest> {
        let request = self.get_mut(id)?;
        request.set_status_unchecked(status);
        Ok(&*request)
    }

    pub(crate) fn stamp_ordered(&mut self, id: &str, purchase_id: &str) -> Result<()> {
        self.get_mut(id)?.stamp_ordered(purchase_id.to_string());
        Ok(())
    }

    pub(crate) fn insert(&mut self, request: ResourceRequest) -> &ResourceRequest {
        let slot = match self.index.get(request.id()) {
            Some(&i) => {
                self.requests[i] = request;
                i
            }
            None => {
                self.index.insert(request.id().to_string(), self.requests.len());
                self.requests.push(request);
                self.requests.len() - 1
            }
        };
        &self.requests[slot]
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<ResourceRequest> {
        let slot = self.index.remove(id)?;
        let removed = self.requests.remove(slot);
        for i in self.index.values_mut() {
            if *i > slot {
                *i -= 1;
            }
        }
        Some(removed)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut ResourceRequest> {
        match self.index.get(id) {
            Some(&i) => Ok(&mut self.requests[i]),
            None => Err(EngineError::request_not_found(id)),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct PurchaseStore {
    purchases: Vec<Purchase>,
    index: HashMap<String, usize>,
}

impl PurchaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.purchases.len()
    }
    pub fn is_empty(&self) -> bool {
        self.purchases.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Purchase> {
        self.index.get(id).map(|&i| &self.purchases[i])
    }

    pub fn all(&self) -> &[Purchase] {
        &self.purchases
    }

    pub fn by_vendor<'a>(&'a self, vendor_id: &'a str) -> impl Iterator<Item = &'a Purchase> {
        self.purchases
            .iter()
            .filter(move |p| p.vendor_id() == vendor_id)
    }

    /// Purchase status write only. Member propagation lives in consolidation.
    pub(crate) fn set_status(&mut self, id: &str, status: PurchaseStatus) -> Result<&Purchase> {
        let purchase = match self.index.get(id) {
            Some(&i) => &mut self.purchases[i],
            None => return Err(EngineError::purchase_not_found(id)),
        };
        purchase.set_status(status);
        Ok(&*purchase)
    }

    pub(crate) fn insert(&mut self, purchase: Purchase) -> &Purchase {
        let slot = match self.index.get(purchase.id()) {
            Some(&i) => {
                self.purchases[i] = purchase;
                i
            }
            None => {
                self.index.insert(purchase.id().to_string(), self.purchases.len());
                self.purchases.push(purchase);
                self.purchases.len() - 1
            }
        };
        &self.purchases[slot]
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Purchase> {
        let slot = self.index.remove(id)?;
        let removed = self.purchases.remove(slot);
        for i in self.index.values_mut() {
            if *i > slot {
                *i -= 1;
            }
        }
        Some(removed)
    }
}
