use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{CohortMember, CourseWeight, EnrollmentRecord, ScoreRecord};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CohortScope {
    pub academic_year_id: String,
    pub student_id: Option<Uuid>,
    pub level: Option<i32>,
    pub department_id: Option<String>,
}

/// Source of the raw rows the scoring pipeline runs over.
#[async_trait]
pub trait ScoringStore: Send + Sync {
    /// Students enrolled in the scope's academic year, in a stable order.
    async fn fetch_cohort(&self, scope: &CohortScope) -> anyhow::Result<Vec<CohortMember>>;

    async fn fetch_course_weights(&self) -> anyhow::Result<Vec<CourseWeight>>;

    async fn fetch_scores(
        &self,
        student_id: Uuid,
        academic_year_id: &str,
    ) -> anyhow::Result<Vec<ScoreRecord>>;

    /// Every enrollment the student has, across all academic years.
    async fn fetch_enrollments(&self, student_id: Uuid) -> anyhow::Result<Vec<EnrollmentRecord>>;

    /// Writes the reconciled current record and, if given, upserts the next
    /// year's record. An existing next-year record is only overwritten while
    /// it is still `pending`. Returns whether a new record was inserted.
    async fn save_promotion(
        &self,
        current: &EnrollmentRecord,
        next: Option<&EnrollmentRecord>,
    ) -> anyhow::Result<bool>;
}
