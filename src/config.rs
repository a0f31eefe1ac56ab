use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Scoring configuration. Every field has a default, so an absent or partial
/// TOML file is valid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub grading: GradingScale,
    pub promotion: PromotionPolicy,
    pub reporting: ReportingPolicy,
    pub batch: BatchSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GradeBand {
    /// Inclusive lower bound of the band.
    pub min: f64,
    pub grade: String,
    pub remark: String,
}

impl GradeBand {
    fn new(min: f64, grade: &str, remark: &str) -> Self {
        Self {
            min,
            grade: grade.to_string(),
            remark: remark.to_string(),
        }
    }
}

/// Letter grade bands over a fixed maximum. Bands are matched as descending
/// lower bounds; the lowest band also covers everything beneath it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GradingScale {
    pub max_score: f64,
    pub bands: Vec<GradeBand>,
}

impl Default for GradingScale {
    fn default() -> Self {
        Self {
            max_score: 20.0,
            bands: vec![
                GradeBand::new(18.5, "A", "Excellent"),
                GradeBand::new(16.5, "B", "Very Good"),
                GradeBand::new(15.5, "C", "Good"),
                GradeBand::new(13.5, "D", "Fair"),
                GradeBand::new(12.0, "E", "Pass"),
                GradeBand::new(0.0, "F", "Fail"),
            ],
        }
    }
}

impl GradingScale {
    pub fn band_for(&self, average: f64) -> Option<&GradeBand> {
        if !average.is_finite() || average > self.max_score {
            return None;
        }

        let mut ordered: Vec<&GradeBand> = self.bands.iter().collect();
        ordered.sort_by(|a, b| b.min.total_cmp(&a.min));

        ordered
            .iter()
            .find(|band| average >= band.min)
            .or_else(|| ordered.last())
            .copied()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PromotionPolicy {
    pub pass_threshold: f64,
    /// Highest level from which a student can still move up.
    pub max_promotable_level: i32,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self {
            pass_threshold: 12.0,
            max_promotable_level: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportingPolicy {
    /// Averages at or below this value are counted as at risk. Independent
    /// of the grade bands.
    pub at_risk_threshold: f64,
}

impl Default for ReportingPolicy {
    fn default() -> Self {
        Self {
            at_risk_threshold: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub concurrency: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

impl ScoringConfig {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let config: ScoringConfig = toml::from_str(raw).context("invalid scoring config")?;
        if config.grading.bands.is_empty() {
            anyhow::bail!("scoring config must define at least one grade band");
        }
        Ok(config)
    }

    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                Self::from_toml_str(&raw)
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_twenty_point_scale() {
        let config = ScoringConfig::default();
        assert_eq!(config.grading.max_score, 20.0);
        assert_eq!(config.grading.bands.len(), 6);
        assert_eq!(config.promotion.pass_threshold, 12.0);
        assert_eq!(config.promotion.max_promotable_level, 2);
        assert_eq!(config.reporting.at_risk_threshold, 5.0);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let config = ScoringConfig::from_toml_str(
            r#"
            [promotion]
            max_promotable_level = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.promotion.max_promotable_level, 4);
        assert_eq!(config.promotion.pass_threshold, 12.0);
        assert_eq!(config.grading, GradingScale::default());
    }

    #[test]
    fn custom_bands_replace_defaults() {
        let config = ScoringConfig::from_toml_str(
            r#"
            [grading]
            max_score = 100.0
            bands = [
                { min = 50.0, grade = "P", remark = "Pass" },
                { min = 0.0, grade = "N", remark = "Not yet" },
            ]
            "#,
        )
        .unwrap();
        assert_eq!(config.grading.band_for(72.0).unwrap().grade, "P");
        assert_eq!(config.grading.band_for(12.0).unwrap().grade, "N");
        assert!(config.grading.band_for(101.0).is_none());
    }

    #[test]
    fn empty_band_list_is_rejected() {
        let result = ScoringConfig::from_toml_str(
            r#"
            [grading]
            bands = []
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn lowest_band_covers_values_beneath_it() {
        let scale = GradingScale::default();
        assert_eq!(scale.band_for(-1.0).unwrap().grade, "F");
        assert!(scale.band_for(f64::NAN).is_none());
    }
}
