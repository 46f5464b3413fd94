//! Service layer for zp-records
//!
//! Services sit between the HTTP handlers and the repository functions in
//! `db/`. They resolve project keys, turn missing rows into `NotFound`,
//! hold the transaction boundaries and emit events for the audit log.
//!
//! ```text
//! HTTP Handlers (thin)
//!     ↓
//! Service Layer
//!     ↓
//! Repository Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod response;
pub mod events;
pub mod project_service;
pub mod scholarship_service;
pub mod humanitarian_service;

pub use response::*;
pub use events::{EventBus, EventListener, RecordsEvent, Register};
pub use project_service::ProjectService;
pub use scholarship_service::ScholarshipService;
pub use humanitarian_service::HumanitarianService;

use crate::auth::Principal;
use crate::db::{ListQuery, Page, RecordsDb};
use crate::error::RecordsError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Operations shared by the beneficiary registers.
///
/// Records are addressed by numeric id only. Missing records surface as
/// `NotFound`; writes emit a beneficiary event after commit.
pub trait BeneficiaryService {
    type Row: Serialize;
    type Input: DeserializeOwned;
    type Stats: Serialize;

    fn get(&self, id: i64) -> Result<Self::Row, RecordsError>;
    fn list(&self, query: &ListQuery) -> Result<Page<Self::Row>, RecordsError>;
    /// Up to 10 records ranked by keyword relevance
    fn search(&self, query: &str, year: Option<&str>) -> Result<Vec<Self::Row>, RecordsError>;
    fn years(&self) -> Result<Vec<String>, RecordsError>;
    fn stats(&self) -> Result<Self::Stats, RecordsError>;
    fn create(&self, input: &Self::Input, principal: &Principal) -> Result<i64, RecordsError>;
    fn update(&self, id: i64, input: &Self::Input) -> Result<(), RecordsError>;
    fn delete(&self, id: i64) -> Result<(), RecordsError>;
}

/// Service container handed to the HTTP server
pub struct Services {
    pub projects: Arc<ProjectService>,
    pub scholarships: Arc<ScholarshipService>,
    pub humanitarian: Arc<HumanitarianService>,
    pub events: Arc<EventBus>,
    db: Arc<RecordsDb>,
}

impl Services {
    pub fn new(db: Arc<RecordsDb>) -> Self {
        let events = Arc::new(EventBus::new());

        Self {
            projects: Arc::new(ProjectService::new(db.clone(), events.clone())),
            scholarships: Arc::new(ScholarshipService::new(db.clone(), events.clone())),
            humanitarian: Arc::new(HumanitarianService::new(db.clone(), events.clone())),
            events,
            db,
        }
    }

    pub fn db(&self) -> &Arc<RecordsDb> {
        &self.db
    }
}
