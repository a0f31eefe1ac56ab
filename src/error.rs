use thiserror::Error;

use crate::models::BatchRequest;

/// Rejections raised before any record is fetched. These fail the whole batch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("academicYearId is required")]
    MissingAcademicYear,
    #[error("nextAcademicYearId is required for a promotion run")]
    MissingNextAcademicYear,
    #[error("nextAcademicYearId must differ from academicYearId ({0})")]
    SameAcademicYear(String),
    #[error("termId must not be blank when provided")]
    BlankTerm,
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

pub fn validate_ranking(request: &BatchRequest) -> Result<(), RequestError> {
    if request.academic_year_id.trim().is_empty() {
        return Err(RequestError::MissingAcademicYear);
    }
    if request.term_id.is_some() && is_blank(request.term_id.as_deref()) {
        return Err(RequestError::BlankTerm);
    }
    Ok(())
}

pub fn validate_promotion(request: &BatchRequest) -> Result<(), RequestError> {
    if request.academic_year_id.trim().is_empty() {
        return Err(RequestError::MissingAcademicYear);
    }
    if is_blank(request.next_academic_year_id.as_deref()) {
        return Err(RequestError::MissingNextAcademicYear);
    }
    if request.next_academic_year_id.as_deref().map(str::trim) == Some(request.academic_year_id.trim()) {
        return Err(RequestError::SameAcademicYear(request.academic_year_id.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(year: &str) -> BatchRequest {
        BatchRequest {
            academic_year_id: year.to_string(),
            ..BatchRequest::default()
        }
    }

    #[test]
    fn ranking_needs_academic_year() {
        assert_eq!(validate_ranking(&request("  ")), Err(RequestError::MissingAcademicYear));
        assert_eq!(validate_ranking(&request("2025-2026")), Ok(()));
    }

    #[test]
    fn ranking_rejects_blank_term() {
        let mut req = request("2025-2026");
        req.term_id = Some(String::new());
        assert_eq!(validate_ranking(&req), Err(RequestError::BlankTerm));
    }

    #[test]
    fn promotion_needs_distinct_next_year() {
        let mut req = request("2025-2026");
        assert_eq!(validate_promotion(&req), Err(RequestError::MissingNextAcademicYear));

        req.next_academic_year_id = Some("2025-2026".to_string());
        assert!(matches!(validate_promotion(&req), Err(RequestError::SameAcademicYear(_))));

        req.next_academic_year_id = Some("2026-2027".to_string());
        assert_eq!(validate_promotion(&req), Ok(()));
    }

    #[test]
    fn messages_name_the_missing_field() {
        assert_eq!(
            RequestError::MissingNextAcademicYear.to_string(),
            "nextAcademicYearId is required for a promotion run"
        );
    }
}
