use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// VB6-style 1-decimal rounding: `Int(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// One subject's marks for one student in a grading session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectScore {
    pub subject_id: String,
    pub student_id: String,
    pub total_awarded: f64,
    pub total_possible: f64,
}

impl SubjectScore {
    pub fn new(
        subject_id: impl Into<String>,
        student_id: impl Into<String>,
        total_awarded: f64,
        total_possible: f64,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            student_id: student_id.into(),
            total_awarded,
            total_possible,
        }
    }

    /// Checks `0 <= awarded <= possible`. Rows that fail this must not reach
    /// the aggregator.
    pub fn validate(&self) -> Result<()> {
        let finite = self.total_awarded.is_finite() && self.total_possible.is_finite();
        if !finite
            || self.total_awarded < 0.0
            || self.total_possible < 0.0
            || self.total_awarded > self.total_possible
        {
            return Err(EngineError::InvalidScore {
                subject_id: self.subject_id.clone(),
                student_id: self.student_id.clone(),
                awarded: self.total_awarded,
                possible: self.total_possible,
            });
        }
        Ok(())
    }

    pub fn percentage(&self) -> f64 {
        if self.total_possible > 0.0 {
            self.total_awarded * 100.0 / self.total_possible
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBand {
    pub lower_bound: f64,
    pub symbol: String,
    pub label: String,
    pub weight: u32,
}

impl GradeBand {
    pub fn new(lower_bound: f64, symbol: &str, label: &str, weight: u32) -> Self {
        Self {
            lower_bound,
            symbol: symbol.to_string(),
            label: label.to_string(),
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeResolution {
    pub symbol: String,
    pub label: String,
    pub weight: u32,
}

/// Ordered partition of `[0, 100]` into grade bands, highest bound first.
///
/// The last band always starts at 0 and acts as the terminal fail band, so
/// every clamped percentage resolves to exactly one band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeScale {
    bands: Vec<GradeBand>,
}

impl GradeScale {
    pub fn new(bands: Vec<GradeBand>) -> Result<Self> {
        if bands.is_empty() {
            return Err(EngineError::InvalidBandTable(
                "grade bands must not be empty".to_string(),
            ));
        }
        for (i, band) in bands.iter().enumerate() {
            if !band.lower_bound.is_finite() || !(0.0..=100.0).contains(&band.lower_bound) {
                return Err(EngineError::InvalidBandTable(format!(
                    "grade band {} lower bound must be within 0..=100",
                    band.symbol
                )));
            }
            if band.symbol.trim().is_empty() {
                return Err(EngineError::InvalidBandTable(format!(
                    "grade band {} has an empty symbol",
                    i
                )));
            }
            if i > 0 && band.lower_bound >= bands[i - 1].lower_bound {
                return Err(EngineError::InvalidBandTable(
                    "grade bands must be strictly descending by lower bound".to_string(),
                ));
            }
        }
        if bands.last().map(|b| b.lower_bound) != Some(0.0) {
            return Err(EngineError::InvalidBandTable(
                "last grade band must start at 0".to_string(),
            ));
        }
        Ok(Self { bands })
    }

    /// UNEB O-level distinction/credit/pass/fail bands.
    pub fn uneb() -> Self {
        Self {
            bands: vec![
                GradeBand::new(80.0, "D1", "Distinction 1", 1),
                GradeBand::new(75.0, "D2", "Distinction 2", 2),
                GradeBand::new(70.0, "C3", "Credit 3", 3),
                GradeBand::new(65.0, "C4", "Credit 4", 4),
                GradeBand::new(60.0, "C5", "Credit 5", 5),
                GradeBand::new(55.0, "C6", "Credit 6", 6),
                GradeBand::new(50.0, "P7", "Pass 7", 7),
                GradeBand::new(45.0, "P8", "Pass 8", 8),
                GradeBand::new(0.0, "F9", "Fail 9", 9),
            ],
        }
    }

    pub fn bands(&self) -> &[GradeBand] {
        &self.bands
    }

    pub fn resolve(&self, percentage: f64) -> Result<GradeResolution> {
        if !percentage.is_finite() {
            return Err(EngineError::NonFinitePercentage(percentage));
        }
        let p = percentage.clamp(0.0, 100.0);
        let band = self
            .bands
            .iter()
            .find(|b| p >= b.lower_bound)
            .or_else(|| self.bands.last())
            .ok_or_else(|| EngineError::InvalidBandTable("no grade bands".to_string()))?;
        Ok(GradeResolution {
            symbol: band.symbol.clone(),
            label: band.label.clone(),
            weight: band.weight,
        })
    }
}

impl Default for GradeScale {
    fn default() -> Self {
        Self::uneb()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_off_matches_vb6() {
        assert_eq!(round_off_1_decimal(0.0), 0.0);
        assert_eq!(round_off_1_decimal(3.54), 3.5);
        assert_eq!(round_off_1_decimal(3.55), 3.6);
        assert_eq!(round_off_1_decimal(79.96), 80.0);
    }

    #[test]
    fn uneb_boundaries_resolve_unambiguously() {
        let scale = GradeScale::uneb();
        assert_eq!(scale.resolve(0.0).unwrap().symbol, "F9");
        assert_eq!(scale.resolve(100.0).unwrap().symbol, "D1");
        for band in scale.bands() {
            let r = scale.resolve(band.lower_bound).unwrap();
            assert_eq!(r.symbol, band.symbol);
            assert_eq!(r.weight, band.weight);
        }
        assert_eq!(scale.resolve(79.99).unwrap().symbol, "D2");
        assert_eq!(scale.resolve(44.9).unwrap().symbol, "F9");
    }

    #[test]
    fn every_integer_percentage_hits_one_band() {
        let scale = GradeScale::uneb();
        for p in 0..=100 {
            let r = scale.resolve(p as f64).unwrap();
            let matching: Vec<_> = scale
                .bands()
                .iter()
                .filter(|b| b.symbol == r.symbol)
                .collect();
            assert_eq!(matching.len(), 1, "percentage {}", p);
        }
    }

    #[test]
    fn out_of_range_percentages_are_clamped() {
        let scale = GradeScale::uneb();
        assert_eq!(scale.resolve(-5.0).unwrap().symbol, "F9");
        assert_eq!(scale.resolve(140.0).unwrap().symbol, "D1");
        assert!(matches!(
            scale.resolve(f64::NAN),
            Err(EngineError::NonFinitePercentage(_))
        ));
    }

    #[test]
    fn forty_five_of_fifty_is_top_band() {
        let score = SubjectScore::new("math", "s1", 45.0, 50.0);
        score.validate().unwrap();
        assert!((score.percentage() - 90.0).abs() < 1e-9);
        assert_eq!(
            GradeScale::uneb().resolve(score.percentage()).unwrap().symbol,
            "D1"
        );
    }

    #[test]
    fn zero_possible_gives_zero_percent() {
        let score = SubjectScore::new("art", "s1", 0.0, 0.0);
        score.validate().unwrap();
        assert_eq!(score.percentage(), 0.0);
    }

    #[test]
    fn validate_rejects_out_of_range_totals() {
        assert!(SubjectScore::new("m", "s", -1.0, 10.0).validate().is_err());
        assert!(SubjectScore::new("m", "s", 11.0, 10.0).validate().is_err());
        assert!(SubjectScore::new("m", "s", f64::NAN, 10.0).validate().is_err());
        let err = SubjectScore::new("m", "s", 11.0, 10.0)
            .validate()
            .unwrap_err();
        assert_eq!(err.code(), "invalid_score");
    }

    #[test]
    fn scale_rejects_bad_tables() {
        assert!(GradeScale::new(vec![]).is_err());
        assert!(GradeScale::new(vec![
            GradeBand::new(50.0, "P", "Pass", 1),
            GradeBand::new(60.0, "C", "Credit", 2),
            GradeBand::new(0.0, "F", "Fail", 3),
        ])
        .is_err());
        assert!(GradeScale::new(vec![GradeBand::new(40.0, "P", "Pass", 1)]).is_err());
        assert!(GradeScale::new(vec![
            GradeBand::new(50.0, "P", "Pass", 1),
            GradeBand::new(0.0, "F", "Fail", 2),
        ])
        .is_ok());
    }
}
