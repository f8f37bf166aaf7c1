use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read analytics config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse analytics config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid analytics config: {0}")]
    Invalid(String),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanLabel {
    Critical,
    Fragile,
    Solid,
    Strong,
    Excellent,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreWeights {
    pub success_rate: f64,
    pub spend_rate: f64,
    pub liquidity: f64,
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.success_rate + self.spend_rate + self.liquidity
    }
}

/// Closed interval `[low, high]` on the 0-100 score scale. Adjacent bands
/// share their boundary; a score on it belongs to the higher band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelBand {
    pub label: PlanLabel,
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsConfig {
    pub score_weights: ScoreWeights,
    pub label_bands: Vec<LabelBand>,
    pub cash_bucket_years: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            score_weights: ScoreWeights {
                success_rate: 0.6,
                spend_rate: 0.25,
                liquidity: 0.15,
            },
            label_bands: vec![
                LabelBand {
                    label: PlanLabel::Critical,
                    low: 0.0,
                    high: 40.0,
                },
                LabelBand {
                    label: PlanLabel::Fragile,
                    low: 40.0,
                    high: 60.0,
                },
                LabelBand {
                    label: PlanLabel::Solid,
                    low: 60.0,
                    high: 75.0,
                },
                LabelBand {
                    label: PlanLabel::Strong,
                    low: 75.0,
                    high: 90.0,
                },
                LabelBand {
                    label: PlanLabel::Excellent,
                    low: 90.0,
                    high: 100.0,
                },
            ],
            cash_bucket_years: 3,
        }
    }
}

impl AnalyticsConfig {
    pub fn from_json(json: &str, source: &str) -> Result<Self, ConfigError> {
        let config = serde_json::from_str::<Self>(json).map_err(|e| ConfigError::Parse {
            path: source.to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: display.clone(),
            source: e,
        })?;
        Self::from_json(&json, &display)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.score_weights;
        for (name, weight) in [
            ("successRate", w.success_rate),
            ("spendRate", w.spend_rate),
            ("liquidity", w.liquidity),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "score weight {name} must be finite and >= 0"
                )));
            }
        }
        if (w.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::Invalid(format!(
                "score weights must sum to 1, got {}",
                w.sum()
            )));
        }

        let (Some(first), Some(last)) = (self.label_bands.first(), self.label_bands.last()) else {
            return Err(ConfigError::Invalid("label bands must not be empty".to_string()));
        };
        if first.low != 0.0 || last.high != 100.0 {
            return Err(ConfigError::Invalid(
                "label bands must cover [0, 100]".to_string(),
            ));
        }
        for band in &self.label_bands {
            if !band.low.is_finite() || !band.high.is_finite() || band.high <= band.low {
                return Err(ConfigError::Invalid(format!(
                    "label band {:?} must have finite low < high",
                    band.label
                )));
            }
        }
        for pair in self.label_bands.windows(2) {
            if pair[1].low != pair[0].high {
                return Err(ConfigError::Invalid(format!(
                    "label bands {:?} and {:?} must share a boundary",
                    pair[0].label, pair[1].label
                )));
            }
        }

        if self.cash_bucket_years == 0 {
            return Err(ConfigError::Invalid(
                "cashBucketYears must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
