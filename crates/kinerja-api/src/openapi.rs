//! # OpenAPI Specification Assembly
//!
//! Assembles every utoipa-documented route into a single OpenAPI document,
//! served at `/api/v1/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the bearer token security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "`Authorization: Bearer {userId}:{secret}`. Secret set via KINERJA_AUTH_SECRET.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Kinerja API",
        version = "0.3.0",
        description = "Academic performance backend: organisation tree, lecturers, academic periods, teaching, research, community service, evidences, reviews, notes and KPI snapshots.\n\nEvery response uses the envelope `{ success, message, data }`; lists add `pagination`. All `/api/v1/*` endpoints except `/api/v1/health` require a bearer token.",
        license(name = "MIT")
    ),
    paths(
        // Auth
        crate::routes::auth::get_profile,
        crate::routes::auth::update_profile,
        // Institutions
        crate::routes::institutions::list_institutions,
        crate::routes::institutions::get_institution,
        crate::routes::institutions::create_institution,
        crate::routes::institutions::update_institution,
        crate::routes::institutions::delete_institution,
        // Faculties
        crate::routes::faculties::list_faculties,
        crate::routes::faculties::get_faculty,
        crate::routes::faculties::create_faculty,
        crate::routes::faculties::update_faculty,
        crate::routes::faculties::delete_faculty,
        // Study programs
        crate::routes::study_programs::list_study_programs,
        crate::routes::study_programs::get_study_program,
        crate::routes::study_programs::create_study_program,
        crate::routes::study_programs::update_study_program,
        crate::routes::study_programs::delete_study_program,
        // Users
        crate::routes::users::list_users,
        crate::routes::users::get_user,
        crate::routes::users::create_user,
        crate::routes::users::update_user,
        crate::routes::users::delete_user,
        // Lecturers
        crate::routes::lecturers::list_lecturers,
        crate::routes::lecturers::get_lecturer,
        crate::routes::lecturers::lecturer_dashboard,
        crate::routes::lecturers::create_lecturer,
        crate::routes::lecturers::update_lecturer,
        crate::routes::lecturers::delete_lecturer,
        // Roles
        crate::routes::roles::list_roles,
        // Academic periods
        crate::routes::academic_periods::list_periods,
        crate::routes::academic_periods::get_current_period,
        crate::routes::academic_periods::get_period,
        crate::routes::academic_periods::create_period,
        crate::routes::academic_periods::update_period,
        crate::routes::academic_periods::delete_period,
        // Courses
        crate::routes::courses::list_courses,
        crate::routes::courses::get_course,
        crate::routes::courses::create_course,
        crate::routes::courses::update_course,
        crate::routes::courses::delete_course,
        // Course offerings
        crate::routes::course_offerings::list_offerings,
        crate::routes::course_offerings::list_lecturer_offerings,
        crate::routes::course_offerings::get_offering,
        crate::routes::course_offerings::create_offering,
        crate::routes::course_offerings::update_offering,
        crate::routes::course_offerings::delete_offering,
        // Teaching activities
        crate::routes::teaching_activities::list_activities,
        crate::routes::teaching_activities::get_activity,
        crate::routes::teaching_activities::get_offering_activity,
        crate::routes::teaching_activities::save_offering_activity,
        crate::routes::teaching_activities::update_activity,
        crate::routes::teaching_activities::delete_activity,
        // Research projects
        crate::routes::research_projects::list_projects,
        crate::routes::research_projects::list_lecturer_projects,
        crate::routes::research_projects::get_project,
        crate::routes::research_projects::create_project,
        crate::routes::research_projects::update_project,
        crate::routes::research_projects::delete_project,
        // Research outputs
        crate::routes::research_outputs::list_outputs,
        crate::routes::research_outputs::list_project_outputs,
        crate::routes::research_outputs::get_output,
        crate::routes::research_outputs::create_output,
        crate::routes::research_outputs::update_output,
        crate::routes::research_outputs::delete_output,
        // Service programs
        crate::routes::service_programs::list_programs,
        crate::routes::service_programs::list_lecturer_programs,
        crate::routes::service_programs::get_program,
        crate::routes::service_programs::create_program,
        crate::routes::service_programs::update_program,
        crate::routes::service_programs::delete_program,
        // Service impacts
        crate::routes::service_impacts::get_impact,
        crate::routes::service_impacts::get_program_impact,
        crate::routes::service_impacts::save_program_impact,
        crate::routes::service_impacts::update_impact,
        crate::routes::service_impacts::delete_impact,
        // Evidence types
        crate::routes::evidence_types::list_evidence_types,
        crate::routes::evidence_types::get_evidence_type,
        crate::routes::evidence_types::create_evidence_type,
        crate::routes::evidence_types::update_evidence_type,
        crate::routes::evidence_types::delete_evidence_type,
        // Evidences
        crate::routes::evidences::list_evidences,
        crate::routes::evidences::list_lecturer_evidences,
        crate::routes::evidences::get_evidence,
        crate::routes::evidences::create_evidence,
        crate::routes::evidences::update_evidence,
        crate::routes::evidences::update_evidence_status,
        crate::routes::evidences::delete_evidence,
        crate::routes::evidences::create_link,
        crate::routes::evidences::delete_link,
        // Reviews
        crate::routes::reviews::list_reviews,
        crate::routes::reviews::list_my_reviews,
        crate::routes::reviews::list_lecturer_reviews,
        crate::routes::reviews::get_review,
        crate::routes::reviews::create_review,
        crate::routes::reviews::update_review,
        crate::routes::reviews::complete_review,
        crate::routes::reviews::delete_review,
        // Notes
        crate::routes::notes::list_notes,
        crate::routes::notes::list_lecturer_notes,
        crate::routes::notes::get_note,
        crate::routes::notes::create_note,
        crate::routes::notes::update_note,
        crate::routes::notes::delete_note,
        // KPI snapshots
        crate::routes::kpi_snapshots::list_snapshots,
        crate::routes::kpi_snapshots::list_lecturer_snapshots,
        crate::routes::kpi_snapshots::latest_lecturer_snapshot,
        crate::routes::kpi_snapshots::get_snapshot,
        crate::routes::kpi_snapshots::create_snapshot,
        crate::routes::kpi_snapshots::update_snapshot,
        crate::routes::kpi_snapshots::delete_snapshot,
        // Audit logs
        crate::routes::audit_logs::list_audit_logs,
        crate::routes::audit_logs::verify_chain,
        crate::routes::audit_logs::list_entity_history,
        crate::routes::audit_logs::list_user_activity,
        crate::routes::audit_logs::get_audit_log,
    ),
    components(schemas(
        // Records
        crate::models::Institution,
        crate::models::Faculty,
        crate::models::StudyProgram,
        crate::models::User,
        crate::models::UserSummary,
        crate::models::Lecturer,
        crate::models::Term,
        crate::models::AcademicPeriod,
        crate::models::Course,
        crate::models::CourseOffering,
        crate::models::TeachingActivity,
        crate::models::ResearchProject,
        crate::models::ResearchOutput,
        crate::models::ServiceProgram,
        crate::models::ServiceImpact,
        crate::models::EvidenceType,
        crate::models::Evidence,
        crate::models::EvidenceLink,
        crate::models::ReviewStatus,
        crate::models::Review,
        crate::models::Note,
        crate::models::KpiSnapshot,
        crate::audit::AuditAction,
        crate::audit::AuditRecord,
        crate::audit::ChainIntegrity,
        // Envelope
        crate::envelope::ErrorBody,
        // DTOs
        crate::routes::auth::Profile,
        crate::routes::auth::UpdateProfileRequest,
        crate::routes::institutions::CreateInstitutionRequest,
        crate::routes::institutions::UpdateInstitutionRequest,
        crate::routes::faculties::CreateFacultyRequest,
        crate::routes::faculties::UpdateFacultyRequest,
        crate::routes::study_programs::CreateStudyProgramRequest,
        crate::routes::study_programs::UpdateStudyProgramRequest,
        crate::routes::users::CreateUserRequest,
        crate::routes::users::UpdateUserRequest,
        crate::routes::lecturers::CreateLecturerRequest,
        crate::routes::lecturers::UpdateLecturerRequest,
        crate::routes::lecturers::DashboardCounts,
        crate::routes::lecturers::LecturerDashboard,
        crate::routes::roles::RoleView,
        crate::routes::academic_periods::CreateAcademicPeriodRequest,
        crate::routes::academic_periods::UpdateAcademicPeriodRequest,
        crate::routes::courses::CreateCourseRequest,
        crate::routes::courses::UpdateCourseRequest,
        crate::routes::course_offerings::CreateCourseOfferingRequest,
        crate::routes::course_offerings::UpdateCourseOfferingRequest,
        crate::routes::teaching_activities::TeachingActivityRequest,
        crate::routes::research_projects::CreateResearchProjectRequest,
        crate::routes::research_projects::UpdateResearchProjectRequest,
        crate::routes::research_outputs::CreateResearchOutputRequest,
        crate::routes::research_outputs::UpdateResearchOutputRequest,
        crate::routes::service_programs::CreateServiceProgramRequest,
        crate::routes::service_programs::UpdateServiceProgramRequest,
        crate::routes::service_impacts::ServiceImpactRequest,
        crate::routes::evidence_types::CreateEvidenceTypeRequest,
        crate::routes::evidence_types::UpdateEvidenceTypeRequest,
        crate::routes::evidences::CreateEvidenceRequest,
        crate::routes::evidences::UpdateEvidenceRequest,
        crate::routes::evidences::UpdateEvidenceStatusRequest,
        crate::routes::evidences::CreateEvidenceLinkRequest,
        crate::routes::evidences::EvidenceDetail,
        crate::routes::reviews::CreateReviewRequest,
        crate::routes::reviews::UpdateReviewRequest,
        crate::routes::reviews::CompleteReviewRequest,
        crate::routes::notes::CreateNoteRequest,
        crate::routes::notes::UpdateNoteRequest,
        crate::routes::kpi_snapshots::KpiScores,
        crate::routes::kpi_snapshots::CreateKpiSnapshotRequest,
        crate::routes::kpi_snapshots::UpdateKpiSnapshotRequest,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "The authenticated caller's own account"),
        (name = "institutions", description = "Universities and colleges"),
        (name = "faculties", description = "Faculties of an institution"),
        (name = "study-programs", description = "Study programs of a faculty"),
        (name = "users", description = "User accounts and their roles"),
        (name = "lecturers", description = "Lecturer profiles and dashboards"),
        (name = "roles", description = "Institutional roles"),
        (name = "academic-periods", description = "Academic years and terms"),
        (name = "courses", description = "Curriculum of a study program"),
        (name = "course-offerings", description = "Classes taught in a period"),
        (name = "teaching-activities", description = "Teaching quality indicators per class"),
        (name = "research-projects", description = "Lecturer research"),
        (name = "research-outputs", description = "Publications and other research products"),
        (name = "service-programs", description = "Lecturer community service"),
        (name = "service-impacts", description = "Measured effect of service programs"),
        (name = "evidence-types", description = "Catalogue of evidence kinds"),
        (name = "evidences", description = "Supporting documents, their verification and links"),
        (name = "reviews", description = "Performance reviews"),
        (name = "notes", description = "Overseer notes about lecturers"),
        (name = "kpi-snapshots", description = "Computed performance indicators"),
        (name = "audit-logs", description = "Hash-chained audit trail (ADMIN)"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/v1/openapi.json", get(openapi_json))
}

/// GET /api/v1/openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
