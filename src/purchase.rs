//! Purchase orders placed with a single vendor.
use crate::status::Status;
use crate::timestamp::{CalendarDate, TimeStamp};
use std::fmt;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PurchaseStatus {
    #[n(0)]
    #[default]
    Ordered,
    #[n(1)]
    InDelivery,
    #[n(2)]
    Delivered,
}

impl PurchaseStatus {
    /// The status every member request takes when the purchase moves here.
    pub const fn member_status(self) -> Status {
        match self {
            Self::InDelivery => Status::InDelivery,
            Self::Delivered => Status::Delivered,
            Self::Ordered => Status::Ordered,
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.member_status().as_str())
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    #[n(0)]
    id: String,
    #[n(1)]
    request_ids: Vec<String>, // fixed once created
    #[n(2)]
    vendor_id: String,
    #[n(3)]
    created_at: TimeStamp,
    #[n(4)]
    estimated_delivery: CalendarDate,
    #[n(5)]
    notes: Option<String>,
    #[n(6)]
    status: PurchaseStatus,
}

impl Purchase {
    pub(crate) fn new(
        id: String,
        request_ids: Vec<String>,
        vendor_id: String,
        estimated_delivery: CalendarDate,
        notes: Option<String>,
    ) -> Self {
        Self {
            id,
            request_ids,
            vendor_id,
            created_at: TimeStamp::now(),
            estimated_delivery,
            notes,
            status: PurchaseStatus::Ordered,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn request_ids(&self) -> &[String] {
        &self.request_ids
    }
    pub fn contains(&self, request_id: &str) -> bool {
        self.request_ids.iter().any(|id| id == request_id)
    }
    pub fn vendor_id(&self) -> &str {
        &self.vendor_id
    }
    pub fn created_at(&self) -> TimeStamp {
        self.created_at
    }
    pub fn estimated_delivery(&self) -> CalendarDate {
        self.estimated_delivery
    }
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
    pub fn status(&self) -> PurchaseStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: PurchaseStatus) {
        self.status = status;
    }
}
