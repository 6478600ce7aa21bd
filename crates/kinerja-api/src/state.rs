//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor. Every resource lives in its own in-memory
//! [`Store`]; writes are recorded in the [`AuditTrail`].

use std::collections::HashMap;
use std::sync::Arc;

use kinerja_core::{Identity, PageRequest};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditEvent, AuditTrail};
use crate::config::AppConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::models::{
    AcademicPeriod, Course, CourseOffering, Evidence, EvidenceLink, EvidenceType, Faculty,
    Institution, KpiSnapshot, Lecturer, Note, ResearchOutput, ResearchProject, Review,
    ServiceImpact, ServiceProgram, StudyProgram, TeachingActivity, User,
};

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// All operations are synchronous (the RwLock is `parking_lot`, not `tokio::sync`)
/// because the lock is never held across `.await` points.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: Uuid, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Insert unless an existing record conflicts with the new one.
    ///
    /// The scan and the insert run under one write lock, so two concurrent
    /// creates with the same unique key cannot both succeed.
    pub fn insert_unique(&self, id: Uuid, value: T, conflicts: impl Fn(&T) -> bool) -> bool {
        let mut guard = self.data.write();
        if guard.values().any(conflicts) {
            return false;
        }
        guard.insert(id, value);
        true
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// List all records, in no particular order.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// List the records matching `pred`.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data.read().values().filter(|v| pred(v)).cloned().collect()
    }

    /// First record matching `pred`.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.data.read().values().find(|v| pred(v)).cloned()
    }

    /// Whether any record matches `pred`.
    pub fn any(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.data.read().values().any(pred)
    }

    /// Number of records matching `pred`.
    pub fn count(&self, pred: impl Fn(&T) -> bool) -> usize {
        self.data.read().values().filter(|v| pred(v)).count()
    }

    /// Update a record in place. Returns the updated record, or `None` if not found.
    pub fn update(&self, id: &Uuid, f: impl FnOnce(&mut T)) -> Option<T> {
        let mut guard = self.data.write();
        let entry = guard.get_mut(id)?;
        f(entry);
        Some(entry.clone())
    }

    /// Atomically read-validate-update a record.
    ///
    /// The closure may inspect the current state, reject the change, or
    /// mutate the record, all under a single write lock. Returns `None` if
    /// the record doesn't exist.
    pub fn try_update<R, E>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(id).map(f)
    }

    /// Update a record unless another record conflicts with the result.
    ///
    /// `f` mutates a copy; `conflicts(other, updated)` is checked against
    /// every other record before the copy is written back.
    pub fn update_unique(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut T),
        conflicts: impl Fn(&T, &T) -> bool,
    ) -> Option<Result<T, ()>> {
        let mut guard = self.data.write();
        let mut updated = guard.get(id)?.clone();
        f(&mut updated);
        if guard
            .iter()
            .any(|(other_id, other)| other_id != id && conflicts(other, &updated))
        {
            return Some(Err(()));
        }
        guard.insert(*id, updated.clone());
        Some(Ok(updated))
    }

    /// Remove a record by ID.
    pub fn remove(&self, id: &Uuid) -> Option<T> {
        self.data.write().remove(id)
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &Uuid) -> bool {
        self.data.read().contains_key(id)
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Application State --------------------------------------------------------

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub institutions: Store<Institution>,
    pub faculties: Store<Faculty>,
    pub study_programs: Store<StudyProgram>,
    pub users: Store<User>,
    pub lecturers: Store<Lecturer>,
    pub academic_periods: Store<AcademicPeriod>,
    pub courses: Store<Course>,
    pub course_offerings: Store<CourseOffering>,
    pub teaching_activities: Store<TeachingActivity>,
    pub research_projects: Store<ResearchProject>,
    pub research_outputs: Store<ResearchOutput>,
    pub service_programs: Store<ServiceProgram>,
    pub service_impacts: Store<ServiceImpact>,
    pub evidence_types: Store<EvidenceType>,
    pub evidences: Store<Evidence>,
    pub evidence_links: Store<EvidenceLink>,
    pub reviews: Store<Review>,
    pub notes: Store<Note>,
    pub kpi_snapshots: Store<KpiSnapshot>,

    /// Hash-chained log of every write.
    pub audit: AuditTrail,
    /// Request counters backing `GET /metrics`.
    pub metrics: ApiMetrics,
    pub config: AppConfig,
}

impl AppState {
    /// Create an empty state with default configuration (auth disabled).
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// Create an empty state with the given configuration.
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            institutions: Store::new(),
            faculties: Store::new(),
            study_programs: Store::new(),
            users: Store::new(),
            lecturers: Store::new(),
            academic_periods: Store::new(),
            courses: Store::new(),
            course_offerings: Store::new(),
            teaching_activities: Store::new(),
            research_projects: Store::new(),
            research_outputs: Store::new(),
            service_programs: Store::new(),
            service_impacts: Store::new(),
            evidence_types: Store::new(),
            evidences: Store::new(),
            evidence_links: Store::new(),
            reviews: Store::new(),
            notes: Store::new(),
            kpi_snapshots: Store::new(),
            audit: AuditTrail::new(),
            metrics: ApiMetrics::new(),
            config,
        }
    }

    /// Parse `page`/`limit` from a query, applying the configured cap.
    pub fn page_request(&self, query: &HashMap<String, String>) -> PageRequest {
        let request = PageRequest::from_query(query);
        match self.config.max_page_limit {
            Some(max) => request.with_max_limit(max),
            None => request,
        }
    }

    /// Append a write to the audit trail.
    pub fn record<T: Serialize>(
        &self,
        actor: &Identity,
        action: AuditAction,
        entity_type: &'static str,
        entity_id: Uuid,
        before: Option<&T>,
        after: Option<&T>,
    ) {
        let record = self.audit.append(AuditEvent {
            actor: actor.id,
            action,
            entity_type,
            entity_id,
            before: before.and_then(|v| serde_json::to_value(v).ok()),
            after: after.and_then(|v| serde_json::to_value(v).ok()),
        });
        tracing::info!(
            action = action.as_str(),
            entity_type,
            %entity_id,
            actor = %actor.id,
            event_hash = %record.event_hash,
            "audit event recorded"
        );
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::system_identity;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Item {
        code: String,
    }

    fn item(code: &str) -> Item {
        Item { code: code.into() }
    }

    // ── Store ────────────────────────────────────────────────────

    #[test]
    fn store_insert_get_remove() {
        let store = Store::new();
        let id = Uuid::new_v4();
        assert!(store.insert(id, item("A")).is_none());
        assert_eq!(store.get(&id), Some(item("A")));
        assert!(store.contains(&id));
        assert_eq!(store.remove(&id), Some(item("A")));
        assert!(store.is_empty());
    }

    #[test]
    fn store_insert_unique_rejects_conflict() {
        let store = Store::new();
        assert!(store.insert_unique(Uuid::new_v4(), item("A"), |e| e.code == "A"));
        assert!(!store.insert_unique(Uuid::new_v4(), item("A"), |e| e.code == "A"));
        assert!(store.insert_unique(Uuid::new_v4(), item("B"), |e| e.code == "B"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn store_update_unique_ignores_self() {
        let store = Store::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.insert(a, item("A"));
        store.insert(b, item("B"));

        let same = store.update_unique(&a, |e| e.code = "A".into(), |o, u| o.code == u.code);
        assert_eq!(same, Some(Ok(item("A"))));

        let clash = store.update_unique(&a, |e| e.code = "B".into(), |o, u| o.code == u.code);
        assert_eq!(clash, Some(Err(())));
        assert_eq!(store.get(&a), Some(item("A")));

        assert!(store
            .update_unique(&Uuid::new_v4(), |_| {}, |_, _| false)
            .is_none());
    }

    #[test]
    fn store_try_update_can_reject() {
        let store = Store::new();
        let id = Uuid::new_v4();
        store.insert(id, item("A"));
        let result: Option<Result<(), &str>> = store.try_update(&id, |_| Err("locked"));
        assert_eq!(result, Some(Err("locked")));
        assert!(store.try_update::<(), ()>(&Uuid::new_v4(), |_| Ok(())).is_none());
    }

    #[test]
    fn store_queries() {
        let store = Store::new();
        for code in ["A", "B", "B"] {
            store.insert(Uuid::new_v4(), item(code));
        }
        assert_eq!(store.count(|e| e.code == "B"), 2);
        assert_eq!(store.filter(|e| e.code == "A").len(), 1);
        assert!(store.any(|e| e.code == "A"));
        assert!(store.find(|e| e.code == "C").is_none());
    }

    #[test]
    fn store_clones_share_data() {
        let store = Store::new();
        let other = store.clone();
        other.insert(Uuid::new_v4(), item("A"));
        assert_eq!(store.len(), 1);
    }

    // ── AppState ─────────────────────────────────────────────────

    #[test]
    fn page_request_applies_configured_cap() {
        let query: HashMap<String, String> = [("limit".to_string(), "500".to_string())].into();
        assert_eq!(AppState::new().page_request(&query).limit, 500);

        let capped = AppState::with_config(AppConfig {
            max_page_limit: Some(100),
            ..AppConfig::default()
        });
        assert_eq!(capped.page_request(&query).limit, 100);
    }

    #[test]
    fn record_appends_to_audit_trail() {
        let state = AppState::new();
        let id = Uuid::new_v4();
        state.record(
            &system_identity(),
            AuditAction::Create,
            "institution",
            id,
            None,
            Some(&item("A")),
        );
        let records = state.audit.list();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entity_id, id);
        assert_eq!(records[0].after, Some(serde_json::json!({"code": "A"})));
    }
}
