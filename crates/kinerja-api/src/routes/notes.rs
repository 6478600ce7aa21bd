//! # Notes
//!
//! Free-text notes an overseer writes about a lecturer. Only the author
//! (or ADMIN) may change or remove a note.
//!
//! - `GET    /api/v1/notes` — list, filters `academicPeriodId`, `lecturerId`, `role`
//! - `GET    /api/v1/notes/lecturer/:lecturerId` — one lecturer's notes (owner, or overseers)
//! - `POST   /api/v1/notes` — create
//! - `GET    /api/v1/notes/:id` — get (overseers and DOSEN)
//! - `PUT    /api/v1/notes/:id` — update (author)
//! - `DELETE /api/v1/notes/:id` — delete (author)

use std::collections::HashMap;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use kinerja_core::{Identity, RoleName};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::AuditAction;
use crate::auth::Caller;
use crate::authorize::{authorize, authorize_lecturer_path, OVERSIGHT, OVERSIGHT_AND_DOSEN};
use crate::envelope::{success, Paginated, Success};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json, is_blank, Validate};
use crate::models::Note;
use crate::routes::{ensure_lecturer_and_period, not_found, Filters};
use crate::state::AppState;

const ENTITY: &str = "note";

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteRequest {
    #[serde(default)]
    pub academic_period_id: Uuid,
    #[serde(default)]
    pub lecturer_id: Uuid,
    /// Role the author writes under, e.g. `DEKAN`.
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub note_text: String,
}

impl Validate for CreateNoteRequest {
    fn validate(&self) -> Result<(), String> {
        if self.academic_period_id.is_nil()
            || self.lecturer_id.is_nil()
            || is_blank(&self.role)
            || is_blank(&self.note_text)
        {
            return Err(
                "Academic period ID, lecturer ID, role, and note text are required".to_string(),
            );
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteRequest {
    pub role: Option<String>,
    pub note_text: Option<String>,
}

impl Validate for UpdateNoteRequest {
    fn validate(&self) -> Result<(), String> {
        if self.note_text.as_deref().is_some_and(is_blank) {
            return Err("Note text must not be empty".to_string());
        }
        Ok(())
    }
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notes).post(create_note))
        .route("/lecturer/:lecturer_id", get(list_lecturer_notes))
        .route("/:id", get(get_note).put(update_note).delete(delete_note))
}

fn newest_first(mut items: Vec<Note>) -> Vec<Note> {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items
}

fn is_author_or_admin(actor: &Identity, note: &Note) -> bool {
    actor.is_admin() || note.created_by_user_id == *actor.id.as_uuid()
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/notes — List notes, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/notes",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 10)"),
        ("academicPeriodId" = Option<Uuid>, Query, description = "Academic period"),
        ("lecturerId" = Option<Uuid>, Query, description = "Lecturer"),
        ("role" = Option<String>, Query, description = "Author role label"),
    ),
    responses((status = 200, description = "Notes retrieved")),
    security(("bearer_auth" = [])),
    tag = "notes"
)]
pub(crate) async fn list_notes(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<Note>, AppError> {
    authorize(&caller, OVERSIGHT)?;
    let filters = Filters(&query);
    let items = state.notes.filter(|n| {
        filters.id("academicPeriodId", &n.academic_period_id)
            && filters.id("lecturerId", &n.lecturer_id)
            && filters.eq("role", n.role.as_str())
    });
    let page = state.page_request(&query).slice(newest_first(items));
    Ok(Paginated::from(page).message("Notes retrieved successfully"))
}

/// GET /api/v1/notes/lecturer/:lecturerId — One lecturer's notes.
#[utoipa::path(
    get,
    path = "/api/v1/notes/lecturer/{lecturerId}",
    params(
        ("lecturerId" = Uuid, Path, description = "Lecturer ID"),
        ("academicPeriodId" = Option<Uuid>, Query, description = "Academic period"),
    ),
    responses(
        (status = 200, description = "Notes retrieved"),
        (status = 403, description = "Neither owner nor overseer", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "notes"
)]
pub(crate) async fn list_lecturer_notes(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<String>, PathRejection>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Paginated<Note>, AppError> {
    let lecturer_id = authorize_lecturer_path(&caller, OVERSIGHT, path)?;
    if !state.lecturers.contains(&lecturer_id) {
        return Err(not_found("Lecturer"));
    }
    let filters = Filters(&query);
    let items = state.notes.filter(|n| {
        n.lecturer_id == lecturer_id && filters.id("academicPeriodId", &n.academic_period_id)
    });
    let page = state.page_request(&query).slice(newest_first(items));
    Ok(Paginated::from(page).message("Notes retrieved successfully"))
}

/// GET /api/v1/notes/:id — Get one note.
#[utoipa::path(
    get,
    path = "/api/v1/notes/{id}",
    params(("id" = Uuid, Path, description = "Note ID")),
    responses(
        (status = 200, description = "Note retrieved", body = Note),
        (status = 404, description = "Note not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "notes"
)]
pub(crate) async fn get_note(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<Note>, AppError> {
    authorize(&caller, OVERSIGHT_AND_DOSEN)?;
    let id = extract_path(path)?;
    let note = state.notes.get(&id).ok_or_else(|| not_found("Note"))?;
    Ok(success(note).message("Note retrieved successfully"))
}

/// POST /api/v1/notes — Write a note. The caller becomes its author.
#[utoipa::path(
    post,
    path = "/api/v1/notes",
    request_body = CreateNoteRequest,
    responses(
        (status = 201, description = "Note created", body = Note),
        (status = 400, description = "Missing fields or unknown role", body = crate::envelope::ErrorBody),
        (status = 404, description = "Lecturer or academic period not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "notes"
)]
pub(crate) async fn create_note(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateNoteRequest>, JsonRejection>,
) -> Result<Success<Note>, AppError> {
    let actor = authorize(&caller, OVERSIGHT)?;
    let req = extract_validated_json(body)?;
    let role: RoleName = req.role.parse()?;
    ensure_lecturer_and_period(&state, &req.lecturer_id, &req.academic_period_id)?;

    let now = Utc::now();
    let id = Uuid::new_v4();
    let note = Note {
        id,
        academic_period_id: req.academic_period_id,
        lecturer_id: req.lecturer_id,
        role,
        note_text: req.note_text,
        created_by_user_id: *actor.id.as_uuid(),
        created_at: now,
        updated_at: now,
    };
    state.notes.insert(id, note.clone());
    state.record(actor, AuditAction::Create, ENTITY, id, None, Some(&note));

    Ok(success(note)
        .message("Note created successfully")
        .status(StatusCode::CREATED))
}

/// PUT /api/v1/notes/:id — Update a note (author or ADMIN).
#[utoipa::path(
    put,
    path = "/api/v1/notes/{id}",
    params(("id" = Uuid, Path, description = "Note ID")),
    request_body = UpdateNoteRequest,
    responses(
        (status = 200, description = "Note updated", body = Note),
        (status = 403, description = "Not the author", body = crate::envelope::ErrorBody),
        (status = 404, description = "Note not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "notes"
)]
pub(crate) async fn update_note(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateNoteRequest>, JsonRejection>,
) -> Result<Success<Note>, AppError> {
    let actor = authorize(&caller, OVERSIGHT)?;
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    let role = req.role.as_deref().map(str::parse::<RoleName>).transpose()?;

    let (before, updated) = state
        .notes
        .try_update(&id, |n| {
            if !is_author_or_admin(actor, n) {
                return Err(AppError::Forbidden(
                    "You can only update your own notes".into(),
                ));
            }
            let before = n.clone();
            if let Some(role) = role {
                n.role = role;
            }
            if let Some(text) = req.note_text {
                n.note_text = text;
            }
            n.updated_at = Utc::now();
            Ok((before, n.clone()))
        })
        .ok_or_else(|| not_found("Note"))??;
    state.record(actor, AuditAction::Update, ENTITY, id, Some(&before), Some(&updated));

    Ok(success(updated).message("Note updated successfully"))
}

/// DELETE /api/v1/notes/:id — Delete a note (author or ADMIN).
#[utoipa::path(
    delete,
    path = "/api/v1/notes/{id}",
    params(("id" = Uuid, Path, description = "Note ID")),
    responses(
        (status = 200, description = "Note deleted"),
        (status = 403, description = "Not the author", body = crate::envelope::ErrorBody),
        (status = 404, description = "Note not found", body = crate::envelope::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "notes"
)]
pub(crate) async fn delete_note(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Success<()>, AppError> {
    let actor = authorize(&caller, OVERSIGHT)?;
    let id = extract_path(path)?;
    let note = state.notes.get(&id).ok_or_else(|| not_found("Note"))?;
    if !is_author_or_admin(actor, &note) {
        return Err(AppError::Forbidden(
            "You can only delete your own notes".into(),
        ));
    }
    let removed = state.notes.remove(&id).ok_or_else(|| not_found("Note"))?;
    state.record(actor, AuditAction::Delete, ENTITY, id, Some(&removed), None);

    Ok(success(()).message("Note deleted successfully"))
}
