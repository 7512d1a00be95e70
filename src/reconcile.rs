//! Fulfillment reconciliation: delivered quantity against requested quantity.
use crate::status::Status;
use std::fmt;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Partial,
    #[n(2)]
    Complete,
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Partial => f.write_str("partial"),
            Self::Complete => f.write_str("complete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub delivery_status: DeliveryStatus,
    /// Set when the request must be forced into a new status. This bypasses
    /// the transition rules: a complete delivery is authoritative.
    pub status_override: Option<Status>,
}

pub fn reconcile(quantity: f64, fulfilled: f64) -> Reconciliation {
    if fulfilled >= quantity {
        Reconciliation {
            delivery_status: DeliveryStatus::Complete,
            status_override: Some(Status::Delivered),
        }
    } else if fulfilled > 0.0 {
        Reconciliation {
            delivery_status: DeliveryStatus::Partial,
            status_override: None,
        }
    } else {
        Reconciliation {
            delivery_status: DeliveryStatus::Pending,
            status_override: None,
        }
    }
}

/// Rolls member delivery states up to a single state for a purchase.
/// Members without a recorded delivery count as pending.
pub fn aggregate<I>(states: I) -> DeliveryStatus
where
    I: IntoIterator<Item = Option<DeliveryStatus>>,
{
    let mut any = false;
    let mut all_complete = true;
    let mut all_pending = true;

    for state in states {
        any = true;
        match state.unwrap_or(DeliveryStatus::Pending) {
            DeliveryStatus::Complete => all_pending = false,
            DeliveryStatus::Partial => {
                all_pending = false;
                all_complete = false;
            }
            DeliveryStatus::Pending => all_complete = false,
        }
    }

    if !any || all_pending {
        DeliveryStatus::Pending
    } else if all_complete {
        DeliveryStatus::Complete
    } else {
        DeliveryStatus::Partial
    }
}
