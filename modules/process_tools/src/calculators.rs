use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ToolError {
    #[error("calculator '{0}' is not enabled")]
    NotEnabled(Calculator),
    #[error("process tools are not initialized")]
    NotInitialized,
    #[error("{calculator} needs at least {needed} samples, got {got}")]
    TooFewSamples {
        calculator: Calculator,
        needed: usize,
        got: usize,
    },
    #[error("samples must be finite")]
    NonFinite,
}

/// Reductions over a sampled curve `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Calculator {
    /// Trapezoidal area under the curve.
    Integrate,
    /// Mean of `y`.
    Mean,
    /// `x` at the maximum `y` (first one on ties).
    Peak,
}

impl std::fmt::Display for Calculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Calculator::Integrate => "integrate",
            Calculator::Mean => "mean",
            Calculator::Peak => "peak",
        })
    }
}

impl Calculator {
    fn min_samples(self) -> usize {
        match self {
            Calculator::Integrate => 2,
            Calculator::Mean | Calculator::Peak => 1,
        }
    }

    pub fn apply(self, samples: &[(f64, f64)]) -> Result<f64, ToolError> {
        if samples.len() < self.min_samples() {
            return Err(ToolError::TooFewSamples {
                calculator: self,
                needed: self.min_samples(),
                got: samples.len(),
            });
        }
        if samples.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(ToolError::NonFinite);
        }

        Ok(match self {
            Calculator::Integrate => samples
                .windows(2)
                .map(|w| (w[1].0 - w[0].0) * (w[0].1 + w[1].1) / 2.0)
                .sum(),
            Calculator::Mean => samples.iter().map(|(_, y)| y).sum::<f64>() / samples.len() as f64,
            Calculator::Peak => {
                let mut best = samples[0];
                for &s in &samples[1..] {
                    if s.1 > best.1 {
                        best = s;
                    }
                }
                best.0
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: [(f64, f64); 3] = [(0.0, 0.0), (1.0, 2.0), (2.0, 4.0)];

    #[test]
    fn reductions() {
        assert_eq!(Calculator::Integrate.apply(&LINE), Ok(4.0));
        assert_eq!(Calculator::Mean.apply(&LINE), Ok(2.0));
        assert_eq!(Calculator::Peak.apply(&LINE), Ok(2.0));
        assert_eq!(Calculator::Peak.apply(&[(0.0, 1.0), (5.0, 1.0)]), Ok(0.0));
    }

    #[test]
    fn rejects_short_or_non_finite_input() {
        assert_eq!(
            Calculator::Integrate.apply(&[(0.0, 1.0)]),
            Err(ToolError::TooFewSamples {
                calculator: Calculator::Integrate,
                needed: 2,
                got: 1
            })
        );
        assert_eq!(Calculator::Mean.apply(&[(0.0, f64::NAN)]), Err(ToolError::NonFinite));
    }

    #[test]
    fn names_round_trip_through_serde() {
        let parsed: Vec<Calculator> = serde_json::from_str(r#"["integrate", "peak"]"#).unwrap();
        assert_eq!(parsed, [Calculator::Integrate, Calculator::Peak]);
        assert_eq!(Calculator::Mean.to_string(), "mean");
    }
}
