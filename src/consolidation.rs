//! Turning selected requests into a purchase, and fanning purchase status
//! changes back out to the member requests.
use crate::error::{EngineError, Result, ValidationError};
use crate::purchase::{Purchase, PurchaseStatus};
use crate::status::Status;
use crate::store::{PurchaseStore, RequestStore};
use crate::timestamp::CalendarDate;
use std::collections::HashSet;

/// A member request whose status moved as a result of a purchase action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberChange {
    pub request_id: String,
    pub from: Status,
    pub to: Status,
}

/// Checks every precondition of a consolidation without touching either store.
pub fn check_consolidation(
    requests: &RequestStore,
    request_ids: &[String],
    vendor_id: &str,
) -> std::result::Result<(), ValidationError> {
    if request_ids.is_empty() {
        return Err(ValidationError::EmptyPurchase);
    }
    if vendor_id.trim().is_empty() {
        return Err(ValidationError::MissingVendor);
    }

    let mut seen = HashSet::with_capacity(request_ids.len());
    for id in request_ids {
        if !seen.insert(id.as_str()) {
            return Err(ValidationError::DuplicateRequest(id.clone()));
        }
        let request = requests
            .get(id)
            .ok_or_else(|| ValidationError::UnknownRequest(id.clone()))?;
        if request.status() != Status::Selected {
            return Err(ValidationError::NotSelected {
                id: id.clone(),
                status: request.status(),
            });
        }
    }
    Ok(())
}

/// Records a purchase and stamps every member as ordered against it.
///
/// All preconditions are checked up front, so a rejected consolidation leaves
/// both stores exactly as they were.
pub(crate) fn consolidate(
    requests: &mut RequestStore,
    purchases: &mut PurchaseStore,
    purchase_id: String,
    request_ids: Vec<String>,
    vendor_id: String,
    estimated_delivery: CalendarDate,
    notes: Option<String>,
) -> Result<Vec<MemberChange>> {
    check_consolidation(requests, &request_ids, &vendor_id)?;
    if purchases.get(&purchase_id).is_some() {
        return Err(ValidationError::DuplicatePurchase(purchase_id).into());
    }

    let mut changes = Vec::with_capacity(request_ids.len());
    for id in &request_ids {
        requests.stamp_ordered(id, &purchase_id)?;
        changes.push(MemberChange {
            request_id: id.clone(),
            from: Status::Selected,
            to: Status::Ordered,
        });
    }

    let purchase = Purchase::new(
        purchase_id,
        request_ids,
        vendor_id.trim().to_string(),
        estimated_delivery,
        notes,
    );
    purchases.insert(purchase);

    Ok(changes)
}

/// Moves a purchase to `status` and overwrites every member's status with the
/// matching request status.
///
/// This is the authoritative override path: member transitions are not run
/// through the validator because they follow from the purchase's own state.
pub fn propagate_status(
    requests: &mut RequestStore,
    purchases: &mut PurchaseStore,
    purchase_id: &str,
    status: PurchaseStatus,
) -> Result<(PurchaseStatus, Vec<MemberChange>)> {
    let previous = purchases
        .get(purchase_id)
        .map(Purchase::status)
        .ok_or_else(|| EngineError::purchase_not_found(purchase_id))?;
    let members = purchases.set_status(purchase_id, status)?.request_ids().to_vec();

    let target = status.member_status();
    let mut changes = Vec::new();
    for id in members {
        let Some(from) = requests.get(&id).map(|r| r.status()) else {
            tracing::warn!(
                purchase_id,
                request_id = %id,
                "purchase member missing from request store"
            );
            continue;
        };
        requests.override_status(&id, target)?;
        if from != target {
            changes.push(MemberChange {
                request_id: id,
                from,
                to: target,
            });
        }
    }

    Ok((previous, changes))
}
