use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use crate::config::GradingScale;
use crate::evaluate::evaluate;
use crate::models::{AnnualAverage, CourseWeight, ScoreRecord, TermAverage};
use crate::numeric::usable_coefficient;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CourseEvaluation {
    pub average: Option<f64>,
    pub coefficient: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct WeightedAccumulator {
    weighted_sum: f64,
    total_coefficient: f64,
}

impl WeightedAccumulator {
    fn add(&mut self, value: f64, coefficient: f64) {
        self.weighted_sum += value * coefficient;
        self.total_coefficient += coefficient;
    }

    fn average(&self) -> f64 {
        if self.total_coefficient == 0.0 {
            0.0
        } else {
            self.weighted_sum / self.total_coefficient
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct MeanAccumulator {
    total: f64,
    count: usize,
}

impl MeanAccumulator {
    fn push(&mut self, value: f64) {
        self.total += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.total / self.count as f64)
        }
    }
}

/// Coefficient-weighted mean of course averages for one term. Courses without
/// an average or a usable coefficient are left out of both sums.
pub fn aggregate_term(evaluations: &[CourseEvaluation]) -> f64 {
    let mut acc = WeightedAccumulator::default();

    for evaluation in evaluations {
        let coefficient = evaluation.coefficient.filter(|c| *c > 0.0);
        if let (Some(average), Some(coefficient)) = (evaluation.average, coefficient) {
            acc.add(average, coefficient);
        }
    }

    acc.average()
}

/// Each course's annual figure is the plain mean of its term averages; the
/// figures are then weighted by coefficient.
pub fn aggregate_annual(
    per_course_term_averages: &BTreeMap<String, Vec<f64>>,
    coefficients: &HashMap<String, f64>,
) -> f64 {
    let mut acc = WeightedAccumulator::default();

    for (course_id, term_averages) in per_course_term_averages {
        let Some(coefficient) = coefficients.get(course_id).copied().filter(|c| *c > 0.0) else {
            continue;
        };

        let mut subject = MeanAccumulator::default();
        term_averages.iter().for_each(|value| subject.push(*value));

        if let Some(figure) = subject.mean() {
            acc.add(figure, coefficient);
        }
    }

    acc.average()
}

pub fn usable_coefficients(weights: &[CourseWeight]) -> HashMap<String, f64> {
    weights
        .iter()
        .filter_map(|weight| {
            usable_coefficient(Some(weight.coefficient.as_str())).map(|c| (weight.course_id.clone(), c))
        })
        .collect()
}

/// Names of courses whose coefficient cannot weight an average.
pub fn unusable_courses(weights: &[CourseWeight]) -> Vec<&str> {
    weights
        .iter()
        .filter(|weight| usable_coefficient(Some(weight.coefficient.as_str())).is_none())
        .map(|weight| weight.course_name.as_str())
        .collect()
}

/// One student's evaluated score rows for an academic year, grouped as
/// course -> term -> mean of the rows' averages.
#[derive(Debug, Clone, Default)]
pub struct Gradebook {
    courses: BTreeMap<String, BTreeMap<String, MeanAccumulator>>,
}

impl Gradebook {
    pub fn from_records(records: &[ScoreRecord], scale: &GradingScale) -> Self {
        let mut gradebook = Gradebook::default();

        for record in records {
            let result = evaluate(
                record.ca_score.as_deref(),
                record.exam_score.as_deref(),
                None,
                scale,
            );
            let Some(average) = result.average else {
                continue;
            };

            gradebook
                .courses
                .entry(record.course_id.clone())
                .or_default()
                .entry(record.term_id.clone())
                .or_default()
                .push(average);
        }

        gradebook
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    pub fn course_term_average(&self, course_id: &str, term_id: &str) -> Option<f64> {
        self.courses
            .get(course_id)
            .and_then(|terms| terms.get(term_id))
            .and_then(MeanAccumulator::mean)
    }

    pub fn term_evaluations(
        &self,
        term_id: &str,
        coefficients: &HashMap<String, f64>,
    ) -> Vec<CourseEvaluation> {
        self.courses
            .keys()
            .map(|course_id| CourseEvaluation {
                average: self.course_term_average(course_id, term_id),
                coefficient: coefficients.get(course_id).copied(),
            })
            .collect()
    }

    pub fn per_course_term_averages(&self) -> BTreeMap<String, Vec<f64>> {
        self.courses
            .iter()
            .map(|(course_id, terms)| {
                let averages = terms.values().filter_map(MeanAccumulator::mean).collect();
                (course_id.clone(), averages)
            })
            .collect()
    }

    pub fn term_average(
        &self,
        student_id: Uuid,
        term_id: &str,
        coefficients: &HashMap<String, f64>,
    ) -> TermAverage {
        TermAverage {
            student_id,
            term_id: term_id.to_string(),
            average: aggregate_term(&self.term_evaluations(term_id, coefficients)),
        }
    }

    pub fn annual_average(
        &self,
        student_id: Uuid,
        academic_year_id: &str,
        coefficients: &HashMap<String, f64>,
    ) -> AnnualAverage {
        AnnualAverage {
            student_id,
            academic_year_id: academic_year_id.to_string(),
            average: aggregate_annual(&self.per_course_term_averages(), coefficients),
        }
    }
}
