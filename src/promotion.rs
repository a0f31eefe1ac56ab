use crate::config::PromotionPolicy;
use crate::models::{EnrollmentRecord, PromotionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromotionDecision {
    pub status: PromotionStatus,
    pub next_level: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromotionOutcome {
    pub decision: PromotionDecision,
    /// Current year's record after reconciliation.
    pub current: EnrollmentRecord,
    /// Next year's pending record, to be inserted or refreshed. `None` when
    /// the decision is locked.
    pub next: Option<EnrollmentRecord>,
    pub repeater_corrected: bool,
    /// The following year has already moved past `pending`, so the stored
    /// decision stands.
    pub locked: bool,
}

pub fn decide(annual_average: f64, current_level: i32, policy: &PromotionPolicy) -> PromotionDecision {
    if annual_average >= policy.pass_threshold && current_level <= policy.max_promotable_level {
        PromotionDecision {
            status: PromotionStatus::Promoted,
            next_level: current_level + 1,
        }
    } else {
        PromotionDecision {
            status: PromotionStatus::Repeated,
            next_level: current_level,
        }
    }
}

/// True when the student sat the same level in an earlier academic year.
/// Year ids order lexically (`2024-2025` < `2025-2026`), so records for later
/// years, including the pending one this engine creates, never count.
pub fn detect_repeater(history: &[EnrollmentRecord], current: &EnrollmentRecord) -> bool {
    history.iter().any(|record| {
        record.student_id == current.student_id
            && record.level == current.level
            && record.academic_year_id < current.academic_year_id
    })
}

pub fn resolve(
    current: &EnrollmentRecord,
    history: &[EnrollmentRecord],
    annual_average: f64,
    next_academic_year_id: &str,
    policy: &PromotionPolicy,
) -> PromotionOutcome {
    let is_repeater = detect_repeater(history, current);
    let repeater_corrected = is_repeater != current.is_repeater;

    let existing_next = history.iter().find(|record| {
        record.student_id == current.student_id && record.academic_year_id == next_academic_year_id
    });

    let mut updated = current.clone();
    updated.is_repeater = is_repeater;

    if let Some(next) = existing_next.filter(|next| next.promotion_status.is_final()) {
        return PromotionOutcome {
            decision: PromotionDecision {
                status: current.promotion_status,
                next_level: next.level,
            },
            current: updated,
            next: None,
            repeater_corrected,
            locked: true,
        };
    }

    let decision = decide(annual_average, current.level, policy);
    updated.promotion_status = decision.status;
    updated.promoted = decision.status == PromotionStatus::Promoted;

    let next = EnrollmentRecord {
        student_id: current.student_id,
        academic_year_id: next_academic_year_id.to_string(),
        level: decision.next_level,
        promoted: false,
        promotion_status: PromotionStatus::Pending,
        is_repeater: decision.status == PromotionStatus::Repeated,
        previous_level: Some(current.level),
    };

    PromotionOutcome {
        decision,
        current: updated,
        next: Some(next),
        repeater_corrected,
        locked: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn enrollment(student_id: Uuid, year: &str, level: i32) -> EnrollmentRecord {
        EnrollmentRecord {
            student_id,
            academic_year_id: year.to_string(),
            level,
            promoted: false,
            promotion_status: PromotionStatus::Pending,
            is_repeater: false,
            previous_level: None,
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        let policy = PromotionPolicy::default();
        assert_eq!(
            decide(12.0, 2, &policy),
            PromotionDecision { status: PromotionStatus::Promoted, next_level: 3 }
        );
        assert_eq!(
            decide(11.9, 2, &policy),
            PromotionDecision { status: PromotionStatus::Repeated, next_level: 2 }
        );
    }

    #[test]
    fn level_cap_blocks_promotion_regardless_of_score() {
        let policy = PromotionPolicy::default();
        assert_eq!(
            decide(15.0, 3, &policy),
            PromotionDecision { status: PromotionStatus::Repeated, next_level: 3 }
        );
    }

    #[test]
    fn cap_is_configurable() {
        let policy = PromotionPolicy {
            pass_threshold: 10.0,
            max_promotable_level: 5,
        };
        assert_eq!(decide(10.0, 5, &policy).next_level, 6);
    }

    #[test]
    fn repeater_means_same_level_in_another_year() {
        let id = Uuid::new_v4();
        let current = enrollment(id, "2025-2026", 2);
        let history = vec![enrollment(id, "2023-2024", 1), enrollment(id, "2024-2025", 2), current.clone()];
        assert!(detect_repeater(&history, &current));

        let fresh = vec![enrollment(id, "2024-2025", 1), current.clone()];
        assert!(!detect_repeater(&fresh, &current));

        let other_student = vec![enrollment(Uuid::new_v4(), "2024-2025", 2)];
        assert!(!detect_repeater(&other_student, &current));
    }

    #[test]
    fn promoted_student_gets_pending_next_year_record() {
        let id = Uuid::new_v4();
        let current = enrollment(id, "2025-2026", 1);
        let outcome = resolve(&current, &[current.clone()], 14.2, "2026-2027", &PromotionPolicy::default());

        assert_eq!(outcome.current.promotion_status, PromotionStatus::Promoted);
        assert!(outcome.current.promoted);
        let next = outcome.next.unwrap();
        assert_eq!(next.level, 2);
        assert_eq!(next.academic_year_id, "2026-2027");
        assert_eq!(next.promotion_status, PromotionStatus::Pending);
        assert!(!next.is_repeater);
        assert_eq!(next.previous_level, Some(1));
    }

    #[test]
    fn repeated_student_is_flagged_for_next_year() {
        let id = Uuid::new_v4();
        let current = enrollment(id, "2025-2026", 2);
        let outcome = resolve(&current, &[], 9.0, "2026-2027", &PromotionPolicy::default());

        assert_eq!(outcome.current.promotion_status, PromotionStatus::Repeated);
        assert!(!outcome.current.promoted);
        let next = outcome.next.unwrap();
        assert_eq!(next.level, 2);
        assert!(next.is_repeater);
    }

    #[test]
    fn stored_repeater_flag_is_corrected_both_ways() {
        let id = Uuid::new_v4();
        let mut current = enrollment(id, "2025-2026", 2);
        current.is_repeater = true;
        let outcome = resolve(&current, &[], 13.0, "2026-2027", &PromotionPolicy::default());
        assert!(!outcome.current.is_repeater);
        assert!(outcome.repeater_corrected);

        let mut current = enrollment(id, "2025-2026", 2);
        current.is_repeater = false;
        let history = vec![enrollment(id, "2024-2025", 2)];
        let outcome = resolve(&current, &history, 13.0, "2026-2027", &PromotionPolicy::default());
        assert!(outcome.current.is_repeater);
        assert!(outcome.repeater_corrected);
    }

    #[test]
    fn rerun_reproduces_the_same_records() {
        let id = Uuid::new_v4();
        let current = enrollment(id, "2025-2026", 1);
        let first = resolve(&current, &[], 15.0, "2026-2027", &PromotionPolicy::default());
        let history = vec![first.current.clone(), first.next.clone().unwrap()];

        let second = resolve(&first.current, &history, 15.0, "2026-2027", &PromotionPolicy::default());
        assert_eq!(second.next, first.next);
        assert_eq!(second.decision, first.decision);
        assert_eq!(second.current, first.current);
        assert!(!second.repeater_corrected);
    }

    #[test]
    fn own_pending_next_year_record_does_not_make_a_repeater() {
        let id = Uuid::new_v4();
        let current = enrollment(id, "2025-2026", 3);
        let first = resolve(&current, &[current.clone()], 17.0, "2026-2027", &PromotionPolicy::default());
        assert_eq!(first.decision.status, PromotionStatus::Repeated);
        assert!(!first.current.is_repeater);

        let history = vec![first.current.clone(), first.next.clone().unwrap()];
        let second = resolve(&first.current, &history, 17.0, "2026-2027", &PromotionPolicy::default());
        assert!(!second.current.is_repeater);
        assert!(!second.repeater_corrected);
    }

    #[test]
    fn later_years_at_same_level_are_ignored() {
        let id = Uuid::new_v4();
        let current = enrollment(id, "2025-2026", 2);
        let history = vec![enrollment(id, "2027-2028", 2)];
        assert!(!detect_repeater(&history, &current));
    }

    #[test]
    fn pending_next_year_record_follows_a_changed_decision() {
        let id = Uuid::new_v4();
        let current = enrollment(id, "2025-2026", 1);
        let first = resolve(&current, &[], 15.0, "2026-2027", &PromotionPolicy::default());
        let history = vec![first.current.clone(), first.next.clone().unwrap()];

        let second = resolve(&first.current, &history, 4.0, "2026-2027", &PromotionPolicy::default());
        assert_eq!(second.current.promotion_status, PromotionStatus::Repeated);
        let next = second.next.unwrap();
        assert_eq!(next.level, 1);
        assert!(next.is_repeater);
        assert_eq!(next.previous_level, Some(1));
    }

    #[test]
    fn finalized_following_year_locks_the_decision() {
        let id = Uuid::new_v4();
        let mut current = enrollment(id, "2025-2026", 1);
        current.promotion_status = PromotionStatus::Promoted;
        current.promoted = true;
        let mut next = enrollment(id, "2026-2027", 2);
        next.promotion_status = PromotionStatus::Repeated;

        let outcome = resolve(&current, &[current.clone(), next], 3.0, "2026-2027", &PromotionPolicy::default());
        assert!(outcome.locked);
        assert!(outcome.next.is_none());
        assert_eq!(outcome.decision.status, PromotionStatus::Promoted);
        assert_eq!(outcome.decision.next_level, 2);
        assert_eq!(outcome.current.promotion_status, PromotionStatus::Promoted);
    }
}
