//! Resource request lifecycle and purchase consolidation for construction sites.
//!
//! Site managers raise [`ResourceRequest`]s, suppliers triage them, batch the
//! selected ones into a [`Purchase`] with a single vendor, and record
//! deliveries against each request. [`ProcurementService`] is the entry point.

pub mod config;
pub mod consolidation;
pub mod error;
pub mod journal;
mod persist;
pub mod purchase;
pub mod reconcile;
pub mod request;
pub mod service;
pub mod status;
pub mod store;
pub mod timestamp;
pub mod utils;

pub use config::EngineConfig;
pub use error::{EngineError, Result, ValidationError};
pub use purchase::{Purchase, PurchaseStatus};
pub use reconcile::{DeliveryStatus, reconcile};
pub use request::{Availability, NewRequest, Priority, ResourceRequest, ResourceType};
pub use service::ProcurementService;
pub use status::Status;
pub use timestamp::{CalendarDate, TimeStamp};
