//! Resource requests: a single demand line from a site manager.
use crate::error::ValidationError;
use crate::reconcile::{DeliveryStatus, reconcile};
use crate::status::Status;
use crate::timestamp::{CalendarDate, TimeStamp};
use std::fmt;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceType {
    #[n(0)]
    #[default]
    Materials,
    #[n(1)]
    Equipment,
    #[n(2)]
    Services,
}

/// Ordered most urgent first, so sorting ascending puts critical work on top.
#[derive(
    minicbor::Encode,
    minicbor::Decode,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
)]
pub enum Priority {
    #[n(0)]
    Critical,
    #[n(1)]
    High,
    #[n(2)]
    #[default]
    Medium,
    #[n(3)]
    Low,
}

/// Supplier's note on stock before accepting. Advisory only.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Availability {
    #[n(0)]
    Available,
    #[n(1)]
    Limited,
    #[n(2)]
    NotAvailable,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => f.write_str("critical"),
            Self::High => f.write_str("high"),
            Self::Medium => f.write_str("medium"),
            Self::Low => f.write_str("low"),
        }
    }
}

// Inbound fields from the request form, also used as a draft.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NewRequest {
    resource_type: ResourceType,
    resource_name: Option<String>,
    quantity: Option<f64>,
    unit: Option<String>,
    needed_date: Option<CalendarDate>,
    priority: Priority,
    manager_name: String,
    project_name: Option<String>,
    notes: Option<String>,
}

impl NewRequest {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = resource_type;
        self
    }
    pub fn set_resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }
    pub fn set_quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self
    }
    pub fn set_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
    pub fn set_needed_date(mut self, date: CalendarDate) -> Self {
        self.needed_date = Some(date);
        self
    }
    pub fn set_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
    pub fn set_manager_name(mut self, name: impl Into<String>) -> Self {
        self.manager_name = name.into();
        self
    }
    pub fn set_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }
    pub fn set_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Checks the required fields. Blank strings count as missing.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if is_blank(self.resource_name.as_deref()) {
            return Err(ValidationError::MissingField("resource_name"));
        }
        let Some(quantity) = self.quantity else {
            return Err(ValidationError::MissingField("quantity"));
        };
        validate_quantity(quantity)?;
        if is_blank(self.unit.as_deref()) {
            return Err(ValidationError::MissingField("unit"));
        }
        if self.needed_date.is_none() {
            return Err(ValidationError::MissingField("needed_date"));
        }
        Ok(())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

pub(crate) fn validate_quantity(quantity: f64) -> Result<(), ValidationError> {
    if quantity.is_finite() && quantity > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::NonPositiveQuantity(quantity))
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct ResourceRequest {
    #[n(0)]
    id: String,
    #[n(1)]
    resource_type: ResourceType,
    #[n(2)]
    resource_name: String,
    #[n(3)]
    quantity: f64,
    #[n(4)]
    unit: String,
    #[n(5)]
    needed_date: CalendarDate,
    #[n(6)]
    priority: Priority,
    #[n(7)]
    status: Status,
    #[n(8)]
    created_at: TimeStamp,
    #[n(9)]
    manager_name: String,
    #[n(10)]
    project_name: Option<String>,
    #[n(11)]
    fulfilled_quantity: Option<f64>,
    #[n(12)]
    delivery_status: Option<DeliveryStatus>,
    #[n(13)]
    purchase_id: Option<String>,
    #[n(14)]
    notes: Option<String>,
    #[n(15)]
    delivery_notes: Option<String>,
    #[n(16)]
    availability: Option<Availability>,
}

impl ResourceRequest {
    /// Builds a pending request from a draft, rejecting incomplete drafts.
    pub(crate) fn from_draft(
        id: String,
        draft: NewRequest,
        created_at: TimeStamp,
    ) -> Result<Self, ValidationError> {
        draft.validate()?;
        let NewRequest {
            resource_type,
            resource_name,
            quantity,
            unit,
            needed_date,
            priority,
            manager_name,
            project_name,
            notes,
        } = draft;

        Ok(Self {
            id,
            resource_type,
            resource_name: resource_name
                .map(|n| n.trim().to_string())
                .ok_or(ValidationError::MissingField("resource_name"))?,
            quantity: quantity.ok_or(ValidationError::MissingField("quantity"))?,
            unit: unit
                .map(|u| u.trim().to_string())
                .ok_or(ValidationError::MissingField("unit"))?,
            needed_date: needed_date.ok_or(ValidationError::MissingField("needed_date"))?,
            priority,
            status: Status::Pending,
            created_at,
            manager_name,
            project_name,
            fulfilled_quantity: None,
            delivery_status: None,
            purchase_id: None,
            notes,
            delivery_notes: None,
            availability: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }
    pub fn quantity(&self) -> f64 {
        self.quantity
    }
    pub fn unit(&self) -> &str {
        &self.unit
    }
    pub fn needed_date(&self) -> CalendarDate {
        self.needed_date
    }
    pub fn priority(&self) -> Priority {
        self.priority
    }
    pub fn status(&self) -> Status {
        self.status
    }
    pub fn created_at(&self) -> TimeStamp {
        self.created_at
    }
    pub fn manager_name(&self) -> &str {
        &self.manager_name
    }
    pub fn project_name(&self) -> Option<&str> {
        self.project_name.as_deref()
    }
    pub fn fulfilled_quantity(&self) -> Option<f64> {
        self.fulfilled_quantity
    }
    pub fn delivery_status(&self) -> Option<DeliveryStatus> {
        self.delivery_status
    }
    pub fn purchase_id(&self) -> Option<&str> {
        self.purchase_id.as_deref()
    }
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
    pub fn delivery_notes(&self) -> Option<&str> {
        self.delivery_notes.as_deref()
    }
    pub fn availability(&self) -> Option<Availability> {
        self.availability
    }

    pub(crate) fn set_status_unchecked(&mut self, status: Status) {
        self.status = status;
    }
    pub(crate) fn set_delivery_notes(&mut self, notes: String) {
        self.delivery_notes = Some(notes);
    }
    pub(crate) fn set_availability(&mut self, availability: Availability) {
        self.availability = Some(availability);
    }

    pub(crate) fn set_quantity(&mut self, quantity: f64) -> Result<(), ValidationError> {
        validate_quantity(quantity)?;
        if let Some(fulfilled) = self.fulfilled_quantity {
            if fulfilled > quantity {
                return Err(ValidationError::QuantityBelowFulfilled { quantity, fulfilled });
            }
            self.quantity = quantity;
            self.apply_reconciliation(fulfilled);
        } else {
            self.quantity = quantity;
        }
        Ok(())
    }

    pub(crate) fn record_fulfillment(&mut self, fulfilled: f64) -> Result<(), ValidationError> {
        if !fulfilled.is_finite() || fulfilled < 0.0 || fulfilled > self.quantity {
            return Err(ValidationError::FulfilledOutOfRange {
                fulfilled,
                quantity: self.quantity,
            });
        }
        self.apply_reconciliation(fulfilled);
        Ok(())
    }

    fn apply_reconciliation(&mut self, fulfilled: f64) {
        let outcome = reconcile(self.quantity, fulfilled);
        self.fulfilled_quantity = Some(fulfilled);
        self.delivery_status = Some(outcome.delivery_status);
        if let Some(status) = outcome.status_override {
            self.status = status;
        }
    }

    // consolidation stamp: the only way into `ordered`
    pub(crate) fn stamp_ordered(&mut self, purchase_id: String) {
        self.status = Status::Ordered;
        self.purchase_id = Some(purchase_id);
        self.fulfilled_quantity = Some(0.0);
        self.delivery_status = Some(DeliveryStatus::Pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> NewRequest {
        NewRequest::new()
            .set_resource_name("Cement")
            .set_quantity(50.0)
            .set_unit("bags")
            .set_needed_date(CalendarDate::from_ymd(2025, 11, 1).unwrap())
    }

    fn request() -> ResourceRequest {
        ResourceRequest::from_draft("req_1".into(), draft(), TimeStamp::now()).unwrap()
    }

    #[test]
    fn priorities_sort_most_urgent_first() {
        let mut p = vec![Priority::Low, Priority::Critical, Priority::Medium, Priority::High];
        p.sort();
        assert_eq!(
            p,
            vec![Priority::Critical, Priority::High, Priority::Medium, Priority::Low]
        );
    }

    #[test]
    fn blank_name_is_missing() {
        let err = draft().set_resource_name("   ").validate().unwrap_err();
        assert_eq!(err, ValidationError::MissingField("resource_name"));
    }

    #[test]
    fn missing_needed_date_is_rejected() {
        let d = NewRequest::new()
            .set_resource_name("Rebar")
            .set_quantity(3.0)
            .set_unit("t");
        assert_eq!(d.validate(), Err(ValidationError::MissingField("needed_date")));
    }

    #[test]
    fn new_requests_start_pending_without_fulfillment() {
        let r = request();
        assert_eq!(r.status(), Status::Pending);
        assert_eq!(r.fulfilled_quantity(), None);
        assert_eq!(r.delivery_status(), None);
        assert_eq!(r.priority(), Priority::Medium);
    }

    #[test]
    fn lowering_quantity_below_fulfilled_is_rejected() {
        let mut r = request();
        r.record_fulfillment(30.0).unwrap();
        let err = r.set_quantity(20.0).unwrap_err();
        assert!(matches!(err, ValidationError::QuantityBelowFulfilled { .. }));
        assert_eq!(r.quantity(), 50.0);
    }

    #[test]
    fn lowering_quantity_to_fulfilled_completes() {
        let mut r = request();
        r.record_fulfillment(30.0).unwrap();
        r.set_quantity(30.0).unwrap();
        assert_eq!(r.delivery_status(), Some(DeliveryStatus::Complete));
        assert_eq!(r.status(), Status::Delivered);
    }

    #[test]
    fn request_encoding() {
        let original = request();
        let encoding = minicbor::to_vec(&original).unwrap();
        let decoded: ResourceRequest = minicbor::decode(&encoding).unwrap();
        assert_eq!(original, decoded);
    }
}
