//! Scholarship service - scholarship register reads and admin edits

use std::sync::Arc;

use crate::auth::Principal;
use crate::db::{self, scholarships, RecordsDb};
use crate::error::RecordsError;

use super::events::{EventBus, RecordsEvent, Register};
use super::BeneficiaryService;

pub struct ScholarshipService {
    db: Arc<RecordsDb>,
    events: Arc<EventBus>,
}

impl ScholarshipService {
    pub fn new(db: Arc<RecordsDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }
}

impl BeneficiaryService for ScholarshipService {
    type Row = db::ScholarshipRow;
    type Input = db::ScholarshipInput;
    type Stats = db::ScholarshipStats;

    fn get(&self, id: i64) -> Result<Self::Row, RecordsError> {
        self.db
            .with_conn(|conn| scholarships::get_scholarship(conn, id))?
            .ok_or_else(|| RecordsError::NotFound("Scholarship beneficiary not found".into()))
    }

    fn list(&self, query: &db::ListQuery) -> Result<db::Page<Self::Row>, RecordsError> {
        self.db.with_conn(|conn| scholarships::list_scholarships(conn, query))
    }

    fn search(&self, query: &str, year: Option<&str>) -> Result<Vec<Self::Row>, RecordsError> {
        self.db.with_conn(|conn| scholarships::search_scholarships(conn, query, year))
    }

    fn years(&self) -> Result<Vec<String>, RecordsError> {
        self.db.with_conn(scholarships::scholarship_years)
    }

    fn stats(&self) -> Result<Self::Stats, RecordsError> {
        self.db.with_conn(scholarships::scholarship_stats)
    }

    fn create(&self, input: &Self::Input, principal: &Principal) -> Result<i64, RecordsError> {
        let id = self.db.with_conn(|conn| scholarships::create_scholarship(conn, input))?;

        self.events.emit(RecordsEvent::BeneficiaryCreated {
            register: Register::Scholarship,
            id,
            created_by: principal.id,
        });
        Ok(id)
    }

    fn update(&self, id: i64, input: &Self::Input) -> Result<(), RecordsError> {
        let updated = self.db.with_conn(|conn| scholarships::update_scholarship(conn, id, input))?;
        if !updated {
            return Err(RecordsError::NotFound("Record not found".into()));
        }

        self.events.emit(RecordsEvent::BeneficiaryUpdated { register: Register::Scholarship, id });
        Ok(())
    }

    fn delete(&self, id: i64) -> Result<(), RecordsError> {
        let deleted = self.db.with_conn(|conn| scholarships::delete_scholarship(conn, id))?;
        if !deleted {
            return Err(RecordsError::NotFound("Record not found".into()));
        }

        self.events.emit(RecordsEvent::BeneficiaryDeleted { register: Register::Scholarship, id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ADMIN_ROLE;

    fn admin() -> Principal {
        Principal { id: 3, username: "admin".into(), role: ADMIN_ROLE.into() }
    }

    #[test]
    fn test_lifecycle_emits_events() {
        let store = Arc::new(RecordsDb::open_in_memory().unwrap());
        let events = Arc::new(EventBus::new());
        let mut receiver = events.subscribe();
        let service = ScholarshipService::new(store, events);

        let input = db::ScholarshipInput {
            name: Some("Mitu".into()),
            ..Default::default()
        };
        let id = service.create(&input, &admin()).unwrap();
        assert_eq!(
            receiver.try_recv().unwrap(),
            RecordsEvent::BeneficiaryCreated { register: Register::Scholarship, id, created_by: 3 }
        );
        assert_eq!(service.get(id).unwrap().name, "Mitu");

        service.delete(id).unwrap();
        receiver.try_recv().unwrap();

        assert!(matches!(service.get(id), Err(RecordsError::NotFound(_))));
        assert!(matches!(service.delete(id), Err(RecordsError::NotFound(_))));
        assert!(matches!(service.update(id, &input), Err(RecordsError::NotFound(_))));
        assert!(receiver.try_recv().is_err());
    }
}
