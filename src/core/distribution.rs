//! State frequency tallies and goodness-of-fit checks.
//!
//! Used to confirm that the simulator's output actually follows the weights
//! it was configured with.

use crate::detection::{DetectionSample, FocusState};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Count of samples per state, in [`FocusState::ALL`] order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTally {
    pub counts: [u64; 4],
}

impl StateTally {
    pub fn record(&mut self, state: FocusState) {
        self.counts[state.index()] += 1;
    }

    pub fn from_samples<'a>(samples: impl IntoIterator<Item = &'a DetectionSample>) -> Self {
        let mut tally = Self::default();
        for sample in samples {
            tally.record(sample.state);
        }
        tally
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn count(&self, state: FocusState) -> u64 {
        self.counts[state.index()]
    }

    /// Observed proportion of each state.
    pub fn proportions(&self) -> [f64; 4] {
        let total = self.total();
        if total == 0 {
            return [0.0; 4];
        }
        self.counts.map(|c| c as f64 / total as f64)
    }
}

/// Result of a chi-squared goodness-of-fit test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub statistic: f64,
    pub degrees_of_freedom: u32,
    pub p_value: f64,
}

impl FitReport {
    /// Whether the fit is acceptable at significance `alpha`.
    pub fn accepts(&self, alpha: f64) -> bool {
        self.p_value >= alpha
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("no observations to test")]
    NoObservations,
    #[error("expected probabilities must be positive and sum to 1, got {0:?}")]
    InvalidExpected([f64; 4]),
    #[error("chi-squared distribution error: {0}")]
    Distribution(String),
}

/// Pearson's chi-squared test of `tally` against `expected` probabilities.
pub fn chi_squared_fit(tally: &StateTally, expected: &[f64; 4]) -> Result<FitReport, FitError> {
    let total = tally.total();
    if total == 0 {
        return Err(FitError::NoObservations);
    }
    let sum: f64 = expected.iter().sum();
    if expected.iter().any(|p| *p <= 0.0) || (sum - 1.0).abs() > 1e-6 {
        return Err(FitError::InvalidExpected(*expected));
    }

    let statistic: f64 = tally
        .counts
        .iter()
        .zip(expected)
        .map(|(&observed, &p)| {
            let expected_count = p * total as f64;
            (observed as f64 - expected_count).powi(2) / expected_count
        })
        .sum();

    let degrees_of_freedom = (expected.len() - 1) as u32;
    let distribution = ChiSquared::new(f64::from(degrees_of_freedom))
        .map_err(|e| FitError::Distribution(e.to_string()))?;
    let p_value = (1.0 - distribution.cdf(statistic)).clamp(0.0, 1.0);

    Ok(FitReport {
        statistic,
        degrees_of_freedom,
        p_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_fit_has_zero_statistic() {
        let tally = StateTally {
            counts: [300, 300, 300, 100],
        };
        let report = chi_squared_fit(&tally, &[0.3, 0.3, 0.3, 0.1]).unwrap();
        assert!(report.statistic.abs() < 1e-9);
        assert!(report.p_value > 0.99);
        assert!(report.accepts(0.05));
    }

    #[test]
    fn test_skewed_counts_are_rejected() {
        let tally = StateTally {
            counts: [700, 100, 100, 100],
        };
        let report = chi_squared_fit(&tally, &[0.3, 0.3, 0.3, 0.1]).unwrap();
        assert_eq!(report.degrees_of_freedom, 3);
        assert!(report.p_value < 1e-6);
        assert!(!report.accepts(0.01));
    }

    #[test]
    fn test_invalid_inputs() {
        let empty = StateTally::default();
        assert_eq!(
            chi_squared_fit(&empty, &[0.25; 4]),
            Err(FitError::NoObservations)
        );

        let tally = StateTally {
            counts: [1, 1, 1, 1],
        };
        assert!(matches!(
            chi_squared_fit(&tally, &[0.5, 0.5, 0.5, 0.5]),
            Err(FitError::InvalidExpected(_))
        ));
    }

    #[test]
    fn test_proportions() {
        let mut tally = StateTally::default();
        tally.record(FocusState::Focused);
        tally.record(FocusState::Focused);
        tally.record(FocusState::Stressed);
        tally.record(FocusState::Drowsy);

        assert_eq!(tally.total(), 4);
        assert_eq!(tally.count(FocusState::Focused), 2);
        assert_eq!(tally.proportions(), [0.5, 0.25, 0.0, 0.25]);
        assert_eq!(StateTally::default().proportions(), [0.0; 4]);
    }
}
