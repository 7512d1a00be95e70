use anyhow::Context;
use sled::open;
use std::sync::Arc;
use site_procurement::{
    CalendarDate, DeliveryStatus, EngineConfig, EngineError, NewRequest, Priority,
    ProcurementService, PurchaseStatus, ResourceType, Status, ValidationError,
    journal::{LifecycleEvent, TransitionOrigin},
};

use tempfile::tempdir; // Use for test db cleanup.

fn cement(quantity: f64) -> NewRequest {
    NewRequest::new()
        .set_resource_type(ResourceType::Materials)
        .set_resource_name("Portland cement")
        .set_quantity(quantity)
        .set_unit("bags")
        .set_needed_date(CalendarDate::from_ymd(2025, 11, 15).unwrap())
        .set_priority(Priority::High)
        .set_manager_name("Dana")
        .set_project_name("Block C")
}

fn selected(service: &mut ProcurementService, quantity: f64) -> anyhow::Result<String> {
    let request = service.create_request(cement(quantity))?;
    service.set_status(request.id(), Status::Selected, None)?;
    Ok(request.id().to_string())
}

fn estimated() -> CalendarDate {
    "2025-12-30".parse().unwrap()
}

#[test]
fn full_delivery_completes_request() -> anyhow::Result<()> {
    let mut service = ProcurementService::new();
    let request = service.create_request(cement(50.0))?;

    let request = service
        .set_fulfilled_quantity(request.id(), 50.0)
        .context("Fulfillment Failed: ")?;

    assert_eq!(request.delivery_status(), Some(DeliveryStatus::Complete));
    assert_eq!(request.status(), Status::Delivered);
    Ok(())
}

#[test]
fn partial_delivery_keeps_status() -> anyhow::Result<()> {
    let mut service = ProcurementService::new();
    let id = selected(&mut service, 50.0)?;
    service.create_purchase(vec![id.clone()], "v1", estimated(), None)?;
    let before = service.request(&id)?.status();

    let request = service.set_fulfilled_quantity(&id, 20.0)?;

    assert_eq!(request.delivery_status(), Some(DeliveryStatus::Partial));
    assert_eq!(request.status(), before);
    assert_eq!(request.fulfilled_quantity(), Some(20.0));
    Ok(())
}

#[test]
fn consolidation_stamps_every_member() -> anyhow::Result<()> {
    let mut service = ProcurementService::new();
    let id1 = selected(&mut service, 50.0)?;
    let id2 = selected(&mut service, 12.0)?;

    let purchase = service
        .create_purchase(vec![id1.clone(), id2.clone()], "v1", estimated(), None)
        .context("Consolidation Failed: ")?;

    assert_eq!(purchase.status(), PurchaseStatus::Ordered);
    assert_eq!(purchase.vendor_id(), "v1");
    for id in [&id1, &id2] {
        let request = service.request(id)?;
        assert_eq!(request.status(), Status::Ordered);
        assert_eq!(request.purchase_id(), Some(purchase.id()));
        assert_eq!(request.fulfilled_quantity(), Some(0.0));
        assert_eq!(request.delivery_status(), Some(DeliveryStatus::Pending));
    }
    // quantities are not merged
    assert_eq!(service.request(&id1)?.quantity(), 50.0);
    assert_eq!(service.request(&id2)?.quantity(), 12.0);
    Ok(())
}

#[test]
fn pending_cannot_jump_to_ordered() -> anyhow::Result<()> {
    let mut service = ProcurementService::new();
    let request = service.create_request(cement(5.0))?;

    let err = service
        .set_status(request.id(), Status::Ordered, None)
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::InvalidTransition {
            from: Status::Pending,
            to: Status::Ordered
        }
    ));
    assert_eq!(service.request(request.id())?.status(), Status::Pending);
    Ok(())
}

#[test]
fn declined_request_can_be_restored_and_reselected() -> anyhow::Result<()> {
    let mut service = ProcurementService::new();
    let request = service.create_request(cement(5.0))?;
    service.set_status(request.id(), Status::Declined, None)?;

    service.set_status(request.id(), Status::Pending, None)?;
    let request = service.set_status(request.id(), Status::Selected, None)?;

    assert_eq!(request.status(), Status::Selected);
    Ok(())
}

#[test]
fn consolidating_a_pending_request_changes_nothing() -> anyhow::Result<()> {
    let mut service = ProcurementService::new();
    let ready = selected(&mut service, 5.0)?;
    let waiting = service.create_request(cement(8.0))?;

    let err = service
        .create_purchase(
            vec![ready.clone(), waiting.id().to_string()],
            "v1",
            estimated(),
            None,
        )
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::NotSelected { .. })
    ));
    assert_eq!(service.request(waiting.id())?, &waiting);
    assert_eq!(service.request(&ready)?.status(), Status::Selected);
    assert_eq!(service.request(&ready)?.purchase_id(), None);
    assert!(service.purchases().is_empty());
    Ok(())
}

#[test]
fn purchase_status_fans_out_to_members() -> anyhow::Result<()> {
    let mut service = ProcurementService::new();
    let id1 = selected(&mut service, 50.0)?;
    let id2 = selected(&mut service, 10.0)?;
    let purchase =
        service.create_purchase(vec![id1.clone(), id2.clone()], "v1", estimated(), None)?;

    service.set_purchase_status(purchase.id(), PurchaseStatus::InDelivery)?;
    assert_eq!(service.request(&id1)?.status(), Status::InDelivery);
    assert_eq!(service.request(&id2)?.status(), Status::InDelivery);

    // the override path also moves members backwards, which the validator
    // would only allow one step at a time
    service.set_fulfilled_quantity(&id1, 50.0)?;
    assert_eq!(service.request(&id1)?.status(), Status::Delivered);
    service.set_purchase_status(purchase.id(), PurchaseStatus::Ordered)?;
    assert_eq!(service.request(&id1)?.status(), Status::Ordered);
    assert_eq!(service.request(&id2)?.status(), Status::Ordered);

    let purchase = service.set_purchase_status(purchase.id(), PurchaseStatus::Delivered)?;
    assert_eq!(purchase.status(), PurchaseStatus::Delivered);
    assert_eq!(service.request(&id1)?.status(), Status::Delivered);
    assert_eq!(service.request(&id2)?.status(), Status::Delivered);
    Ok(())
}

#[test]
fn unknown_purchase_is_not_found() {
    let mut service = ProcurementService::new();
    let err = service
        .set_purchase_status("po_1nothing", PurchaseStatus::Delivered)
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

#[test]
fn ordered_requests_follow_the_delivery_edges() -> anyhow::Result<()> {
    let mut service = ProcurementService::new();
    let id = selected(&mut service, 3.0)?;
    service.create_purchase(vec![id.clone()], "v1", estimated(), None)?;

    service.set_status(&id, Status::InDelivery, None)?;
    service.set_status(&id, Status::Ordered, None)?;
    service.set_status(&id, Status::InDelivery, None)?;
    let request = service.set_status(&id, Status::Delivered, Some("left at gate 2".into()))?;

    assert_eq!(request.status(), Status::Delivered);
    assert_eq!(request.delivery_notes(), Some("left at gate 2"));
    assert!(service.set_status(&id, Status::InDelivery, None).is_err());
    Ok(())
}

#[test]
fn reopened_store_restores_state() -> anyhow::Result<()> {
    // Sled uses file-based locking to prevent concurrent access, so only one test
    // can hold the lock at a time. Each test gets its own database on temp for
    // simplified cleanup.
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("test_reopen.db");

    let (request_id, purchase_id, journal_len) = {
        let db = Arc::new(open(&db_path)?);
        let mut service = ProcurementService::open(db)?;

        let id = selected(&mut service, 40.0)?;
        let purchase = service.create_purchase(
            vec![id.clone()],
            "v9",
            estimated(),
            Some("crane slot".into()),
        )?;
        service.set_purchase_status(purchase.id(), PurchaseStatus::InDelivery)?;
        service.set_fulfilled_quantity(&id, 15.0)?;
        service.flush()?;

        (id, purchase.id().to_string(), service.journal().len())
    };

    let db = Arc::new(open(&db_path)?);
    let service = ProcurementService::open(db)?;

    let request = service.request(&request_id)?;
    assert_eq!(request.status(), Status::InDelivery);
    assert_eq!(request.fulfilled_quantity(), Some(15.0));
    assert_eq!(request.delivery_status(), Some(DeliveryStatus::Partial));
    assert_eq!(request.purchase_id(), Some(purchase_id.as_str()));

    let purchase = service.purchase(&purchase_id)?;
    assert_eq!(purchase.status(), PurchaseStatus::InDelivery);
    assert_eq!(purchase.notes(), Some("crane slot"));
    assert_eq!(purchase.estimated_delivery(), estimated());

    assert_eq!(service.journal().len(), journal_len);
    let origins: Vec<TransitionOrigin> = service
        .journal()
        .history(&request_id)
        .filter_map(|e| match e.event {
            LifecycleEvent::StatusChanged { origin, .. } => Some(origin),
            _ => None,
        })
        .collect();
    assert_eq!(
        origins,
        vec![
            TransitionOrigin::Validated,
            TransitionOrigin::Consolidation,
            TransitionOrigin::PurchasePropagation,
        ]
    );
    Ok(())
}

#[test]
fn config_file_selects_storage() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("configured.db");
    let config_path = temp_dir.path().join("engine.toml");
    std::fs::write(
        &config_path,
        format!(
            "request_prefix = \"site_\"\nstorage_path = {:?}\n",
            db_path.display().to_string()
        ),
    )?;

    let config = EngineConfig::load(&config_path)?;
    let id = {
        let mut service = ProcurementService::from_config(config.clone())?;
        let id = service.create_request(cement(2.0))?.id().to_string();
        service.flush()?;
        id
    };
    assert!(id.starts_with("site_1"));

    let service = ProcurementService::from_config(config)?;
    assert_eq!(service.requests().len(), 1);
    assert!(service.request(&id).is_ok());
    Ok(())
}
