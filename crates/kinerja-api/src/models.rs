//! # Resource Records
//!
//! The in-memory representation of every resource the API manages. All
//! records serialize with camelCase keys and are stored by UUID in
//! [`crate::state::Store`]s.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use kinerja_core::{RoleName, RoleSet};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// ── Organisation ────────────────────────────────────────────────────

/// A university or college.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Institution {
    pub id: Uuid,
    pub name: String,
    /// Unique across institutions.
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A faculty inside an institution.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Faculty {
    pub id: Uuid,
    pub institution_id: Uuid,
    pub name: String,
    /// Unique across faculties.
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A study program (program studi) inside a faculty.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudyProgram {
    pub id: Uuid,
    pub faculty_id: Uuid,
    pub name: String,
    /// Unique across study programs.
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── People ──────────────────────────────────────────────────────────

/// A user account. Credentials are issued externally and never stored here.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub institution_id: Option<Uuid>,
    /// Unique across users.
    pub email: String,
    pub full_name: String,
    #[schema(value_type = Vec<String>)]
    pub roles: RoleSet,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The slice of a user that is safe to embed in other resources.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
        }
    }
}

/// A lecturer profile. Each user owns at most one.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lecturer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub study_program_id: Uuid,
    /// National lecturer number. Unique across lecturers.
    pub nidn: String,
    pub academic_rank: Option<String>,
    pub expertise_focus: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── Academic calendar ───────────────────────────────────────────────

/// Semester of an academic year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Term {
    /// Odd semester, starting in August.
    Ganjil,
    /// Even semester, February through July.
    Genap,
}

impl Term {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ganjil => "GANJIL",
            Self::Genap => "GENAP",
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Term {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GANJIL" => Ok(Self::Ganjil),
            "GENAP" => Ok(Self::Genap),
            _ => Err("Term must be GANJIL or GENAP".to_string()),
        }
    }
}

/// One semester. `(year_start, term)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AcademicPeriod {
    pub id: Uuid,
    /// First calendar year of the academic year (2024 for 2024/2025).
    pub year_start: i32,
    pub term: Term,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bkd_deadline: Option<NaiveDate>,
    pub research_deadline: Option<NaiveDate>,
    pub service_deadline: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AcademicPeriod {
    /// Whether `day` falls inside the period's date range. Periods without
    /// both bounds contain no day.
    pub fn contains(&self, day: NaiveDate) -> bool {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => start <= day && day <= end,
            _ => false,
        }
    }
}

// ── Teaching ────────────────────────────────────────────────────────

/// A course in a study program's curriculum. `(study_program_id, code)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub study_program_id: Uuid,
    pub code: String,
    pub name: String,
    /// Semester credit units (SKS).
    pub credits: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One class of a course taught in a period.
///
/// `(course_id, academic_period_id, class_name, lecturer_id)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseOffering {
    pub id: Uuid,
    pub course_id: Uuid,
    pub academic_period_id: Uuid,
    pub class_name: String,
    pub lecturer_id: Uuid,
    pub co_lecturer_id: Option<Uuid>,
    pub student_count: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CourseOffering {
    /// Whether `lecturer_id` teaches this class, alone or as co-lecturer.
    pub fn taught_by(&self, lecturer_id: &Uuid) -> bool {
        self.lecturer_id == *lecturer_id || self.co_lecturer_id.as_ref() == Some(lecturer_id)
    }
}

/// Default status of a course's semester plan (RPS).
pub const DEFAULT_RPS_STATUS: &str = "DRAFT";

/// Teaching quality indicators of one course offering. At most one per offering.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeachingActivity {
    pub id: Uuid,
    pub course_offering_id: Uuid,
    pub rps_status: String,
    pub lms_health_score: Option<f64>,
    pub assessment_ontime_score: Option<f64>,
    pub progress_score: Option<f64>,
    pub student_feedback_score: Option<f64>,
    pub attendance_rate: Option<f64>,
    pub updated_by_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── Activities ──────────────────────────────────────────────────────

/// Default status of new research projects and service programs.
pub const DEFAULT_ACTIVITY_STATUS: &str = "PLANNED";

/// A research project run by a lecturer in a period.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResearchProject {
    pub id: Uuid,
    pub lecturer_id: Uuid,
    pub academic_period_id: Uuid,
    pub title: String,
    pub theme: Option<String>,
    pub status: String,
    pub funding_source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A community service program run by a lecturer in a period.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProgram {
    pub id: Uuid,
    pub lecturer_id: Uuid,
    pub academic_period_id: Uuid,
    pub title: String,
    pub location: Option<String>,
    pub partner: Option<String>,
    pub beneficiaries_count: Option<u32>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Default index target of a research output.
pub const DEFAULT_TARGET_INDEX: &str = "NONE";

/// Default status of a research output.
pub const DEFAULT_OUTPUT_STATUS: &str = "DRAFT";

/// A publication, patent or other product of a research project.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResearchOutput {
    pub id: Uuid,
    pub research_project_id: Uuid,
    #[serde(rename = "type")]
    pub output_type: String,
    pub title: String,
    /// Indexing target, e.g. `"SINTA_2"` or `"SCOPUS_Q1"`.
    pub target_index: String,
    pub status: String,
    pub doi: Option<String>,
    pub publish_date: Option<NaiveDate>,
    pub citation_count_ytd: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Measured effect of a service program. At most one per program.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceImpact {
    pub id: Uuid,
    pub service_program_id: Uuid,
    pub impact_score: Option<f64>,
    pub baseline_value: Option<f64>,
    pub endline_value: Option<f64>,
    pub outcome_summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── Evidence ────────────────────────────────────────────────────────

/// A catalogued kind of evidence document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceType {
    pub id: Uuid,
    /// Unique across evidence types.
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    /// Whether the workload report (BKD) requires this kind of document.
    pub required_for_bkd: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Default verification status of uploaded evidence.
pub const DEFAULT_EVIDENCE_STATUS: &str = "DRAFT";

/// A supporting document filed for a lecturer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub id: Uuid,
    pub lecturer_id: Uuid,
    pub academic_period_id: Uuid,
    /// Free-form category, e.g. `"SK_MENGAJAR"` or `"SERTIFIKAT"`.
    pub evidence_type: String,
    /// Catalogue entry, when the category is a registered [`EvidenceType`].
    pub evidence_type_id: Option<Uuid>,
    pub title: String,
    pub file_url: Option<String>,
    pub mime_type: Option<String>,
    pub issued_at: Option<NaiveDate>,
    pub verified_status: String,
    pub uploaded_by_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Attaches an evidence to another resource, e.g. a research output.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceLink {
    pub id: Uuid,
    pub evidence_id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// ── Evaluation ──────────────────────────────────────────────────────

/// Review lifecycle. A completed review is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewStatus {
    Open,
    Completed,
}

/// A performance review of a lecturer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub academic_period_id: Uuid,
    pub lecturer_id: Uuid,
    pub reviewer_user_id: Uuid,
    #[schema(value_type = String)]
    pub reviewer_role: RoleName,
    #[serde(rename = "type")]
    pub review_type: String,
    pub status: ReviewStatus,
    pub summary: Option<String>,
    pub decision: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A free-text note about a lecturer, written under one of the author's roles.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Uuid,
    pub academic_period_id: Uuid,
    pub lecturer_id: Uuid,
    #[schema(value_type = String)]
    pub role: RoleName,
    pub note_text: String,
    pub created_by_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Computed performance indicators for a lecturer in a period.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KpiSnapshot {
    pub id: Uuid,
    pub academic_period_id: Uuid,
    pub lecturer_id: Uuid,
    pub teaching_score: Option<f64>,
    pub research_score: Option<f64>,
    pub service_score: Option<f64>,
    pub support_score: Option<f64>,
    pub tridharma_index: Option<f64>,
    pub evidence_score: Option<f64>,
    pub bkd_compliance_score: Option<f64>,
    pub risk_score: f64,
    pub calculated_by_user_id: Uuid,
    pub calculated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_parses_exact_labels() {
        assert_eq!("GANJIL".parse::<Term>().unwrap(), Term::Ganjil);
        assert_eq!("GENAP".parse::<Term>().unwrap(), Term::Genap);
        assert_eq!(
            "ganjil".parse::<Term>().unwrap_err(),
            "Term must be GANJIL or GENAP"
        );
    }

    #[test]
    fn period_contains_is_inclusive() {
        let now = Utc::now();
        let period = AcademicPeriod {
            id: Uuid::new_v4(),
            year_start: 2024,
            term: Term::Ganjil,
            start_date: NaiveDate::from_ymd_opt(2024, 8, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 1, 31),
            bkd_deadline: None,
            research_deadline: None,
            service_deadline: None,
            created_at: now,
            updated_at: now,
        };
        assert!(period.contains(NaiveDate::from_ymd_opt(2024, 8, 1).unwrap()));
        assert!(period.contains(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()));
        assert!(!period.contains(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()));

        let open_ended = AcademicPeriod {
            end_date: None,
            ..period
        };
        assert!(!open_ended.contains(NaiveDate::from_ymd_opt(2024, 9, 1).unwrap()));
    }

    #[test]
    fn review_type_serializes_as_type() {
        let now = Utc::now();
        let review = Review {
            id: Uuid::new_v4(),
            academic_period_id: Uuid::new_v4(),
            lecturer_id: Uuid::new_v4(),
            reviewer_user_id: Uuid::new_v4(),
            reviewer_role: RoleName::Kaprodi,
            review_type: "BKD".into(),
            status: ReviewStatus::Open,
            summary: None,
            decision: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&review).unwrap();
        assert_eq!(json["type"], "BKD");
        assert_eq!(json["reviewerRole"], "KAPRODI");
        assert_eq!(json["status"], "OPEN");
    }

    #[test]
    fn offering_is_taught_by_either_lecturer() {
        let now = Utc::now();
        let (main, co) = (Uuid::new_v4(), Uuid::new_v4());
        let offering = CourseOffering {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            academic_period_id: Uuid::new_v4(),
            class_name: "A".into(),
            lecturer_id: main,
            co_lecturer_id: Some(co),
            student_count: Some(40),
            created_at: now,
            updated_at: now,
        };
        assert!(offering.taught_by(&main));
        assert!(offering.taught_by(&co));
        assert!(!offering.taught_by(&Uuid::new_v4()));
    }

    #[test]
    fn output_type_serializes_as_type() {
        let now = Utc::now();
        let output = ResearchOutput {
            id: Uuid::new_v4(),
            research_project_id: Uuid::new_v4(),
            output_type: "JOURNAL".into(),
            title: "t".into(),
            target_index: DEFAULT_TARGET_INDEX.into(),
            status: DEFAULT_OUTPUT_STATUS.into(),
            doi: None,
            publish_date: None,
            citation_count_ytd: 0,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["type"], "JOURNAL");
        assert_eq!(json["citationCountYtd"], 0);
        assert!(json.get("outputType").is_none());
    }

    #[test]
    fn user_roles_serialize_as_labels() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            institution_id: None,
            email: "a@kampus.ac.id".into(),
            full_name: "A".into(),
            roles: RoleSet::of(&[RoleName::Dosen, RoleName::Kaprodi]),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["roles"], serde_json::json!(["DOSEN", "KAPRODI"]));
        assert_eq!(json["isActive"], true);
    }
}
