use std::collections::HashMap;

use anyhow::Context;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::aggregate::{unusable_courses, usable_coefficients, Gradebook};
use crate::config::ScoringConfig;
use crate::error::{validate_promotion, validate_ranking};
use crate::evaluate::grade_for;
use crate::models::{
    BatchRequest, BatchResponse, BatchSummary, CohortMember, PromotionStatus, StudentError,
    StudentOutcome,
};
use crate::numeric::round_2;
use crate::promotion::{resolve, PromotionOutcome};
use crate::ranking::{position_of, rank, CohortEntry};
use crate::store::{CohortScope, ScoringStore};

struct ScoredStudent {
    member: CohortMember,
    average: f64,
    promotion: Option<PromotionResult>,
}

struct PromotionResult {
    outcome: PromotionOutcome,
    next_created: bool,
}

impl From<&BatchRequest> for CohortScope {
    fn from(request: &BatchRequest) -> Self {
        CohortScope {
            academic_year_id: request.academic_year_id.trim().to_string(),
            student_id: request.student_id,
            level: request.level_id,
            department_id: request.department_id.clone(),
        }
    }
}

async fn load_inputs<S: ScoringStore>(
    store: &S,
    request: &BatchRequest,
) -> anyhow::Result<(Vec<CohortMember>, HashMap<String, f64>)> {
    let cohort = store
        .fetch_cohort(&CohortScope::from(request))
        .await
        .context("failed to fetch cohort")?;
    let weights = store
        .fetch_course_weights()
        .await
        .context("failed to fetch course weights")?;
    for course in unusable_courses(&weights) {
        warn!(course, "coefficient unusable, course left out of weighted averages");
    }
    Ok((cohort, usable_coefficients(&weights)))
}

async fn student_average<S: ScoringStore>(
    store: &S,
    member: &CohortMember,
    request: &BatchRequest,
    coefficients: &HashMap<String, f64>,
    config: &ScoringConfig,
) -> anyhow::Result<f64> {
    let academic_year_id = request.academic_year_id.trim();
    let records = store
        .fetch_scores(member.student_id, academic_year_id)
        .await
        .with_context(|| format!("failed to fetch scores for {}", member.matricule))?;
    let gradebook = Gradebook::from_records(&records, &config.grading);
    if gradebook.is_empty() {
        debug!(student_id = %member.student_id, "no scores recorded, ranking at 0");
    }

    let average = match request.term_id.as_deref() {
        Some(term_id) => gradebook.term_average(member.student_id, term_id.trim(), coefficients).average,
        None => gradebook.annual_average(member.student_id, academic_year_id, coefficients).average,
    };
    Ok(average)
}

async fn promote_student<S: ScoringStore>(
    store: &S,
    member: &CohortMember,
    request: &BatchRequest,
    next_academic_year_id: &str,
    coefficients: &HashMap<String, f64>,
    config: &ScoringConfig,
) -> anyhow::Result<(f64, PromotionResult)> {
    let academic_year_id = request.academic_year_id.trim();
    let records = store
        .fetch_scores(member.student_id, academic_year_id)
        .await
        .with_context(|| format!("failed to fetch scores for {}", member.matricule))?;
    let annual = Gradebook::from_records(&records, &config.grading)
        .annual_average(member.student_id, academic_year_id, coefficients);

    let history = store
        .fetch_enrollments(member.student_id)
        .await
        .with_context(|| format!("failed to fetch enrollments for {}", member.matricule))?;
    let current = history
        .iter()
        .find(|record| record.academic_year_id == academic_year_id)
        .with_context(|| format!("{} has no enrollment for {academic_year_id}", member.matricule))?;

    let outcome = resolve(current, &history, annual.average, next_academic_year_id, &config.promotion);
    debug!(
        student_id = %member.student_id,
        average = annual.average,
        status = %outcome.decision.status,
        next_level = outcome.decision.next_level,
        locked = outcome.locked,
        "promotion resolved"
    );

    let next_created = if outcome.locked && !outcome.repeater_corrected {
        false
    } else {
        store
            .save_promotion(&outcome.current, outcome.next.as_ref())
            .await
            .with_context(|| format!("failed to save promotion for {}", member.matricule))?
    };

    Ok((annual.average, PromotionResult { outcome, next_created }))
}

pub async fn run_ranking<S: ScoringStore>(
    store: &S,
    request: &BatchRequest,
    config: &ScoringConfig,
) -> anyhow::Result<BatchResponse> {
    validate_ranking(request)?;
    let (cohort, coefficients) = load_inputs(store, request).await?;
    info!(
        academic_year = %request.academic_year_id,
        term = request.term_id.as_deref().unwrap_or("annual"),
        students = cohort.len(),
        "starting ranking batch"
    );

    let coefficients = &coefficients;
    let results: Vec<(CohortMember, anyhow::Result<f64>)> = stream::iter(cohort)
        .map(|member| async move {
            let average = student_average(store, &member, request, coefficients, config).await;
            (member, average)
        })
        .buffered(config.batch.concurrency.max(1))
        .collect()
        .await;

    let mut scored = Vec::new();
    let mut errors = Vec::new();
    for (member, result) in results {
        match result {
            Ok(average) => scored.push(ScoredStudent {
                member,
                average,
                promotion: None,
            }),
            Err(err) => errors.push(student_error(member, err)),
        }
    }

    Ok(build_response(scored, errors, config))
}

pub async fn run_promotion<S: ScoringStore>(
    store: &S,
    request: &BatchRequest,
    config: &ScoringConfig,
) -> anyhow::Result<BatchResponse> {
    validate_promotion(request)?;
    let next_academic_year_id = request
        .next_academic_year_id
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    let (cohort, coefficients) = load_inputs(store, request).await?;
    info!(
        academic_year = %request.academic_year_id,
        next_academic_year = next_academic_year_id,
        students = cohort.len(),
        "starting promotion batch"
    );

    let coefficients = &coefficients;
    let results: Vec<(CohortMember, anyhow::Result<(f64, PromotionResult)>)> = stream::iter(cohort)
        .map(|member| async move {
            let result = promote_student(
                store,
                &member,
                request,
                next_academic_year_id,
                coefficients,
                config,
            )
            .await;
            (member, result)
        })
        .buffered(config.batch.concurrency.max(1))
        .collect()
        .await;

    let mut scored = Vec::new();
    let mut errors = Vec::new();
    for (member, result) in results {
        match result {
            Ok((average, promotion)) => scored.push(ScoredStudent {
                member,
                average,
                promotion: Some(promotion),
            }),
            Err(err) => errors.push(student_error(member, err)),
        }
    }

    Ok(build_response(scored, errors, config))
}

fn student_error(member: CohortMember, err: anyhow::Error) -> StudentError {
    let message = format!("{err:#}");
    warn!(
        student_id = %member.student_id,
        matricule = %member.matricule,
        error = %message,
        "skipping student"
    );
    StudentError {
        student_id: member.student_id,
        student_name: member.student_name,
        message,
    }
}

fn is_eligible(student: &ScoredStudent, config: &ScoringConfig) -> bool {
    match &student.promotion {
        Some(promotion) => promotion.outcome.decision.status == PromotionStatus::Promoted,
        None => student.average >= config.promotion.pass_threshold,
    }
}

pub fn summarize(averages_and_eligibility: &[(f64, bool)], config: &ScoringConfig) -> BatchSummary {
    let total_students = averages_and_eligibility.len();
    if total_students == 0 {
        return BatchSummary::default();
    }

    let eligible = averages_and_eligibility.iter().filter(|(_, ok)| *ok).count();
    let total: f64 = averages_and_eligibility.iter().map(|(avg, _)| avg).sum();
    let at_risk = averages_and_eligibility
        .iter()
        .filter(|(avg, _)| *avg <= config.reporting.at_risk_threshold)
        .count();

    BatchSummary {
        total_students,
        eligible_or_promoted_count: eligible,
        rate: round_2(eligible as f64 / total_students as f64 * 100.0),
        class_average: round_2(total / total_students as f64),
        at_risk_count: at_risk,
    }
}

fn build_response(
    scored: Vec<ScoredStudent>,
    errors: Vec<StudentError>,
    config: &ScoringConfig,
) -> BatchResponse {
    let entries: Vec<CohortEntry> = scored
        .iter()
        .map(|student| CohortEntry {
            student_id: student.member.student_id,
            average: student.average,
        })
        .collect();
    let rankings = rank(&entries);

    let stats: Vec<(f64, bool)> = scored
        .iter()
        .map(|student| (student.average, is_eligible(student, config)))
        .collect();
    let summary = summarize(&stats, config);

    let mut students: Vec<StudentOutcome> = scored
        .into_iter()
        .map(|student| {
            let place = position_of(&rankings, student.member.student_id);
            let band = config.grading.band_for(student.average);
            let grade = grade_for(student.average, &config.grading);
            let promotion = student.promotion.as_ref();

            StudentOutcome {
                student_id: student.member.student_id,
                student_name: student.member.student_name,
                matricule: student.member.matricule,
                department_id: student.member.department_id,
                current_level: promotion
                    .map(|p| p.outcome.current.level)
                    .unwrap_or(student.member.level),
                average: round_2(student.average),
                grade,
                remark: band.map(|b| b.remark.clone()),
                position: place.map(|p| p.position).unwrap_or(0),
                cohort_size: place.map(|p| p.cohort_size).unwrap_or(0),
                promotion_status: promotion.map(|p| p.outcome.decision.status),
                next_level: promotion.map(|p| p.outcome.decision.next_level),
                is_repeater: promotion.map(|p| p.outcome.current.is_repeater),
                repeater_corrected: promotion.map(|p| p.outcome.repeater_corrected),
                next_enrollment_created: promotion.map(|p| p.next_created),
            }
        })
        .collect();
    students.sort_by_key(|student| student.position);

    info!(
        students = summary.total_students,
        failed = errors.len(),
        class_average = summary.class_average,
        "batch complete"
    );

    BatchResponse {
        success: true,
        summary,
        students,
        errors,
    }
}
