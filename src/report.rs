use std::fmt::Write;

use chrono::NaiveDate;

use crate::config::ScoringConfig;
use crate::models::{BatchRequest, BatchResponse, StudentOutcome};

fn scope_label(request: &BatchRequest) -> String {
    let mut parts = vec![format!("academic year {}", request.academic_year_id)];
    if let Some(term_id) = &request.term_id {
        parts.push(format!("term {term_id}"));
    }
    if let Some(level) = request.level_id {
        parts.push(format!("level {level}"));
    }
    if let Some(department_id) = &request.department_id {
        parts.push(format!("department {department_id}"));
    }
    parts.join(", ")
}

pub fn at_risk_students<'a>(
    response: &'a BatchResponse,
    config: &ScoringConfig,
) -> Vec<&'a StudentOutcome> {
    response
        .students
        .iter()
        .filter(|student| student.average <= config.reporting.at_risk_threshold)
        .collect()
}

pub fn build_report(
    request: &BatchRequest,
    response: &BatchResponse,
    config: &ScoringConfig,
    generated_on: NaiveDate,
) -> String {
    let mut output = String::new();
    let summary = &response.summary;

    let _ = writeln!(output, "# Cohort Results Report");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        scope_label(request),
        generated_on
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Students: {}", summary.total_students);
    let _ = writeln!(
        output,
        "- At or above {:.2}: {} ({:.2}%)",
        config.promotion.pass_threshold, summary.eligible_or_promoted_count, summary.rate
    );
    let _ = writeln!(output, "- Class average: {:.2}", summary.class_average);
    let _ = writeln!(
        output,
        "- At or below {:.2}: {}",
        config.reporting.at_risk_threshold, summary.at_risk_count
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Ranking");

    if response.students.is_empty() {
        let _ = writeln!(output, "No students scored for this scope.");
    } else {
        let _ = writeln!(output, "| # | Student | Matricule | Level | Average | Grade | Remark |");
        let _ = writeln!(output, "|---|---------|-----------|-------|---------|-------|--------|");
        for student in response.students.iter() {
            let _ = writeln!(
                output,
                "| {}/{} | {} | {} | {} | {:.2} | {} | {} |",
                student.position,
                student.cohort_size,
                student.student_name,
                student.matricule,
                student.current_level,
                student.average,
                student.grade.as_deref().unwrap_or("-"),
                student.remark.as_deref().unwrap_or("-")
            );
        }
    }

    let at_risk = at_risk_students(response, config);
    let _ = writeln!(output);
    let _ = writeln!(output, "## At Risk");

    if at_risk.is_empty() {
        let _ = writeln!(output, "No students at or below the at-risk threshold.");
    } else {
        for student in at_risk {
            let _ = writeln!(
                output,
                "- {} ({}) average {:.2}",
                student.student_name, student.matricule, student.average
            );
        }
    }

    if !response.errors.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Skipped Students");
        for error in response.errors.iter() {
            let _ = writeln!(output, "- {}: {}", error.student_name, error.message);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchSummary, StudentError};
    use uuid::Uuid;

    fn outcome(name: &str, average: f64, position: usize) -> StudentOutcome {
        StudentOutcome {
            student_id: Uuid::new_v4(),
            student_name: name.to_string(),
            matricule: format!("MAT-{position:03}"),
            department_id: "SCI".to_string(),
            current_level: 1,
            average,
            grade: None,
            remark: None,
            position,
            cohort_size: 2,
            promotion_status: None,
            next_level: None,
            is_repeater: None,
            repeater_corrected: None,
            next_enrollment_created: None,
        }
    }

    fn request() -> BatchRequest {
        BatchRequest {
            academic_year_id: "2025-2026".to_string(),
            level_id: Some(2),
            ..BatchRequest::default()
        }
    }

    #[test]
    fn report_lists_ranking_and_at_risk() {
        let response = BatchResponse {
            success: true,
            summary: BatchSummary {
                total_students: 2,
                eligible_or_promoted_count: 1,
                rate: 50.0,
                class_average: 9.5,
                at_risk_count: 1,
            },
            students: vec![outcome("Amina Njoya", 15.0, 1), outcome("Bruno Etoa", 4.0, 2)],
            errors: vec![],
        };
        let config = ScoringConfig::default();
        let date = NaiveDate::from_ymd_opt(2026, 6, 30).unwrap();
        let report = build_report(&request(), &response, &config, date);

        assert!(report.contains("Generated for academic year 2025-2026, level 2 on 2026-06-30"));
        assert!(report.contains("| 1/2 | Amina Njoya | MAT-001 | 1 | 15.00 | - | - |"));
        assert!(report.contains("- Bruno Etoa (MAT-002) average 4.00"));
        assert!(!report.contains("## Skipped Students"));
    }

    #[test]
    fn empty_report_says_so_and_lists_errors() {
        let response = BatchResponse {
            success: true,
            summary: BatchSummary::default(),
            students: vec![],
            errors: vec![StudentError {
                student_id: Uuid::new_v4(),
                student_name: "Chloe Mbarga".to_string(),
                message: "failed to fetch scores".to_string(),
            }],
        };
        let date = NaiveDate::from_ymd_opt(2026, 6, 30).unwrap();
        let report = build_report(&request(), &response, &ScoringConfig::default(), date);

        assert!(report.contains("No students scored for this scope."));
        assert!(report.contains("No students at or below the at-risk threshold."));
        assert!(report.contains("- Chloe Mbarga: failed to fetch scores"));
    }
}
