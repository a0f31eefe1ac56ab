use crate::config::GradingScale;
use crate::models::EvaluationResult;
use crate::numeric::parse_or_null;

pub fn evaluate(
    ca_score: Option<&str>,
    exam_score: Option<&str>,
    coefficient: Option<&str>,
    scale: &GradingScale,
) -> EvaluationResult {
    let average = course_average(parse_or_null(ca_score), parse_or_null(exam_score));
    let weighted = average.zip(parse_or_null(coefficient)).map(|(avg, coef)| avg * coef);
    let band = average.and_then(|avg| scale.band_for(avg));

    EvaluationResult {
        average,
        weighted,
        grade: band.map(|b| b.grade.clone()),
        remark: band.map(|b| b.remark.clone()),
    }
}

/// A single present score stands on its own rather than being halved.
pub fn course_average(ca: Option<f64>, exam: Option<f64>) -> Option<f64> {
    match (ca, exam) {
        (Some(ca), Some(exam)) => Some((ca + exam) / 2.0),
        (Some(score), None) | (None, Some(score)) => Some(score),
        (None, None) => None,
    }
}

pub fn grade_for(average: f64, scale: &GradingScale) -> Option<String> {
    scale.band_for(average).map(|band| band.grade.clone())
}
