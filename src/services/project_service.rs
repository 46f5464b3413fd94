//! Project service - business logic for project records
//!
//! Resolves project keys, gates nothing itself (authorization happens in
//! the HTTP layer), and emits events after committed writes.

use std::sync::Arc;

use crate::auth::Principal;
use crate::db::{self, progress_log, projects, RecordsDb};
use crate::error::RecordsError;

use super::events::{EventBus, RecordsEvent};

/// Project service for business logic
pub struct ProjectService {
    db: Arc<RecordsDb>,
    events: Arc<EventBus>,
}

impl ProjectService {
    pub fn new(db: Arc<RecordsDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Get project by id or code
    pub fn get(&self, key: &db::ProjectKey) -> Result<Option<db::ProjectRow>, RecordsError> {
        self.db.with_conn(|conn| projects::find_project(conn, key))
    }

    /// Resolve a key to the internal id, or NotFound
    pub fn resolve_id(&self, key: &db::ProjectKey) -> Result<i64, RecordsError> {
        self.get(key)?
            .map(|project| project.id)
            .ok_or_else(|| RecordsError::NotFound(format!("Project not found: {}", key)))
    }

    pub fn list(&self, query: &db::ListQuery) -> Result<db::Page<db::ProjectRow>, RecordsError> {
        self.db.with_conn(|conn| projects::list_projects(conn, query))
    }

    pub fn search(&self, query: &str, year: Option<&str>) -> Result<Vec<db::ProjectRow>, RecordsError> {
        self.db.with_conn(|conn| projects::search_projects(conn, query, year))
    }

    pub fn years(&self) -> Result<Vec<String>, RecordsError> {
        self.db.with_conn(projects::financial_years)
    }

    pub fn stats(&self) -> Result<db::ProjectStats, RecordsError> {
        self.db.with_conn(projects::project_stats)
    }

    /// Progress history, oldest first
    pub fn progress_log(
        &self,
        key: &db::ProjectKey,
    ) -> Result<Vec<db::ProgressLogEntry>, RecordsError> {
        let id = self.resolve_id(key)?;
        self.db.with_conn(|conn| progress_log::get_progress_log(conn, id))
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Create a project and return its id
    pub fn create(
        &self,
        input: &db::CreateProjectInput,
        principal: &Principal,
    ) -> Result<i64, RecordsError> {
        let id = self
            .db
            .with_conn(|conn| projects::create_project(conn, input, Some(principal.id)))?;

        self.events.emit(RecordsEvent::ProjectCreated {
            id,
            project_name: input.project_name.trim().to_string(),
            created_by: Some(principal.id),
        });

        Ok(id)
    }

    /// Apply a general edit. Snapshot fields are not editable here.
    pub fn update(
        &self,
        key: &db::ProjectKey,
        input: &db::UpdateProjectInput,
    ) -> Result<(), RecordsError> {
        let id = self.resolve_id(key)?;

        let updated = self
            .db
            .with_conn(|conn| projects::update_project(conn, id, input))?;
        if !updated {
            return Err(RecordsError::NotFound(format!("Project not found: {}", key)));
        }

        self.events.emit(RecordsEvent::ProjectUpdated { id });
        Ok(())
    }

    pub fn delete(&self, key: &db::ProjectKey) -> Result<(), RecordsError> {
        let id = self.resolve_id(key)?;

        let deleted = self.db.with_conn(|conn| projects::delete_project(conn, id))?;
        if !deleted {
            return Err(RecordsError::NotFound(format!("Project not found: {}", key)));
        }

        self.events.emit(RecordsEvent::ProjectDeleted { id });
        Ok(())
    }

    /// Record a progress submission on behalf of `principal`
    pub fn record_progress(
        &self,
        key: &db::ProjectKey,
        submission: &db::ProgressSubmission,
        principal: &Principal,
    ) -> Result<u8, RecordsError> {
        let id = self.resolve_id(key)?;

        let pct = self.db.with_conn_mut(|conn| {
            progress_log::record_progress(conn, id, submission, principal.id)
        })?;

        self.events.emit(RecordsEvent::ProgressRecorded {
            project_id: id,
            progress_percentage: pct,
            logged_by: principal.id,
        });

        Ok(pct)
    }
}
