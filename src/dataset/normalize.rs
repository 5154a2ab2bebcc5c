//! Window scaling applied before inference on the acquisition device

use serde::{Deserialize, Serialize};

/// Scaling of one signal window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaling {
    /// Pass values through
    None,
    /// `factor * (x - min) / (max - min)` with fixed bounds
    MinMax { min: f32, max: f32, factor: f32 },
    /// `factor * (x - mean) / std` with the window's population std
    ZScore { factor: f32 },
}

impl Default for Scaling {
    fn default() -> Self {
        Scaling::None
    }
}

impl Scaling {
    /// Bounds used by the sensor firmware
    pub fn device_min_max() -> Self {
        Scaling::MinMax {
            min: -0.2,
            max: 0.2,
            factor: 1.0,
        }
    }

    /// Scale `values`; a degenerate range or zero spread yields zeros
    pub fn apply(&self, values: &[f32]) -> Vec<f32> {
        match *self {
            Scaling::None => values.to_vec(),
            Scaling::MinMax { min, max, factor } => {
                if max == min {
                    return vec![0.0; values.len()];
                }
                values
                    .iter()
                    .map(|&v| (v - min) / (max - min) * factor)
                    .collect()
            }
            Scaling::ZScore { factor } => {
                if values.is_empty() {
                    return Vec::new();
                }
                let n = values.len() as f64;
                let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
                let variance = values
                    .iter()
                    .map(|&v| (v as f64 - mean).powi(2))
                    .sum::<f64>()
                    / n;
                let std = variance.sqrt();
                if std == 0.0 {
                    return vec![0.0; values.len()];
                }
                values
                    .iter()
                    .map(|&v| (factor as f64 * (v as f64 - mean) / std) as f32)
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_max_device_bounds() {
        let out = Scaling::device_min_max().apply(&[-0.2, 0.0, 0.2]);
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
        assert!((out[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_min_max_degenerate_range() {
        let scaling = Scaling::MinMax {
            min: 1.0,
            max: 1.0,
            factor: 1.0,
        };
        assert_eq!(scaling.apply(&[3.0, 4.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_z_score() {
        let out = Scaling::ZScore { factor: 1.0 }.apply(&[1.0, 3.0]);
        assert!((out[0] + 1.0).abs() < 1e-6);
        assert!((out[1] - 1.0).abs() < 1e-6);
        assert_eq!(Scaling::ZScore { factor: 2.0 }.apply(&[5.0, 5.0]), vec![0.0, 0.0]);
        assert!(Scaling::ZScore { factor: 1.0 }.apply(&[]).is_empty());
    }

    #[test]
    fn test_serde_tagged() {
        let json = serde_json::to_string(&Scaling::device_min_max()).unwrap();
        assert!(json.contains("\"kind\":\"min_max\""));
        let back: Scaling = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Scaling::device_min_max());
    }
}
