use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ScoreRecord {
    pub student_id: Uuid,
    pub course_id: String,
    pub term_id: String,
    pub academic_year_id: String,
    pub ca_score: Option<String>,
    pub exam_score: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CourseWeight {
    pub course_id: String,
    pub course_name: String,
    pub coefficient: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub average: Option<f64>,
    pub weighted: Option<f64>,
    pub grade: Option<String>,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermAverage {
    pub student_id: Uuid,
    pub term_id: String,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnualAverage {
    pub student_id: Uuid,
    pub academic_year_id: String,
    pub average: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromotionStatus {
    Pending,
    Promoted,
    Repeated,
}

impl PromotionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionStatus::Pending => "pending",
            PromotionStatus::Promoted => "promoted",
            PromotionStatus::Repeated => "repeated",
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, PromotionStatus::Pending)
    }
}

impl fmt::Display for PromotionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromotionStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(PromotionStatus::Pending),
            "promoted" => Ok(PromotionStatus::Promoted),
            "repeated" => Ok(PromotionStatus::Repeated),
            other => anyhow::bail!("unknown promotion status '{other}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentRecord {
    pub student_id: Uuid,
    pub academic_year_id: String,
    pub level: i32,
    pub promoted: bool,
    pub promotion_status: PromotionStatus,
    pub is_repeater: bool,
    pub previous_level: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct CohortMember {
    pub student_id: Uuid,
    pub student_name: String,
    pub matricule: String,
    pub department_id: String,
    pub level: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub academic_year_id: String,
    #[serde(default)]
    pub term_id: Option<String>,
    #[serde(default)]
    pub student_id: Option<Uuid>,
    #[serde(default)]
    pub level_id: Option<i32>,
    #[serde(default)]
    pub department_id: Option<String>,
    #[serde(default)]
    pub next_academic_year_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total_students: usize,
    pub eligible_or_promoted_count: usize,
    pub rate: f64,
    pub class_average: f64,
    pub at_risk_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentOutcome {
    pub student_id: Uuid,
    pub student_name: String,
    pub matricule: String,
    pub department_id: String,
    pub current_level: i32,
    pub average: f64,
    pub grade: Option<String>,
    pub remark: Option<String>,
    pub position: usize,
    pub cohort_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_status: Option<PromotionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_repeater: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeater_corrected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_enrollment_created: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentError {
    pub student_id: Uuid,
    pub student_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub success: bool,
    pub summary: BatchSummary,
    pub students: Vec<StudentOutcome>,
    pub errors: Vec<StudentError>,
}
