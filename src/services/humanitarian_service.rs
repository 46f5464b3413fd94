//! Humanitarian aid service

use std::sync::Arc;

use crate::auth::Principal;
use crate::db::{self, humanitarian, RecordsDb};
use crate::error::RecordsError;

use super::events::{EventBus, RecordsEvent, Register};
use super::BeneficiaryService;

pub struct HumanitarianService {
    db: Arc<RecordsDb>,
    events: Arc<EventBus>,
}

impl HumanitarianService {
    pub fn new(db: Arc<RecordsDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }
}

impl BeneficiaryService for HumanitarianService {
    type Row = db::HumanitarianRow;
    type Input = db::HumanitarianInput;
    type Stats = db::HumanitarianStats;

    fn get(&self, id: i64) -> Result<Self::Row, RecordsError> {
        self.db
            .with_conn(|conn| humanitarian::get_aid(conn, id))?
            .ok_or_else(|| RecordsError::NotFound("Humanitarian aid record not found".into()))
    }

    fn list(&self, query: &db::ListQuery) -> Result<db::Page<Self::Row>, RecordsError> {
        self.db.with_conn(|conn| humanitarian::list_aid(conn, query))
    }

    fn search(&self, query: &str, year: Option<&str>) -> Result<Vec<Self::Row>, RecordsError> {
        self.db.with_conn(|conn| humanitarian::search_aid(conn, query, year))
    }

    fn years(&self) -> Result<Vec<String>, RecordsError> {
        self.db.with_conn(humanitarian::aid_years)
    }

    fn stats(&self) -> Result<Self::Stats, RecordsError> {
        self.db.with_conn(humanitarian::aid_stats)
    }

    fn create(&self, input: &Self::Input, principal: &Principal) -> Result<i64, RecordsError> {
        let id = self.db.with_conn(|conn| humanitarian::create_aid(conn, input))?;

        self.events.emit(RecordsEvent::BeneficiaryCreated {
            register: Register::Humanitarian,
            id,
            created_by: principal.id,
        });
        Ok(id)
    }

    fn update(&self, id: i64, input: &Self::Input) -> Result<(), RecordsError> {
        let updated = self.db.with_conn(|conn| humanitarian::update_aid(conn, id, input))?;
        if !updated {
            return Err(RecordsError::NotFound("Record not found".into()));
        }

        self.events.emit(RecordsEvent::BeneficiaryUpdated { register: Register::Humanitarian, id });
        Ok(())
    }

    fn delete(&self, id: i64) -> Result<(), RecordsError> {
        let deleted = self.db.with_conn(|conn| humanitarian::delete_aid(conn, id))?;
        if !deleted {
            return Err(RecordsError::NotFound("Record not found".into()));
        }

        self.events.emit(RecordsEvent::BeneficiaryDeleted { register: Register::Humanitarian, id });
        Ok(())
    }
}
