use std::cmp::Ordering;

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CohortEntry {
    pub student_id: Uuid,
    pub average: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ranking {
    pub student_id: Uuid,
    pub position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankPosition {
    pub position: usize,
    pub cohort_size: usize,
}

/// Descending by average. Ties keep their input order and still receive
/// distinct, sequential positions.
pub fn rank(cohort: &[CohortEntry]) -> Vec<Ranking> {
    let mut ordered: Vec<&CohortEntry> = cohort.iter().collect();
    ordered.sort_by(|a, b| b.average.partial_cmp(&a.average).unwrap_or(Ordering::Equal));

    ordered
        .into_iter()
        .enumerate()
        .map(|(index, entry)| Ranking {
            student_id: entry.student_id,
            position: index + 1,
        })
        .collect()
}

/// An empty ranking reports the "1 of 1" sentinel; a student missing from a
/// non-empty ranking has no position.
pub fn position_of(rankings: &[Ranking], student_id: Uuid) -> Option<RankPosition> {
    if rankings.is_empty() {
        return Some(RankPosition {
            position: 1,
            cohort_size: 1,
        });
    }

    rankings
        .iter()
        .find(|ranking| ranking.student_id == student_id)
        .map(|ranking| RankPosition {
            position: ranking.position,
            cohort_size: rankings.len(),
        })
}
