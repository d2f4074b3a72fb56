//! Min-max scaling of feature vectors.
//!
//! Bounds are fitted on the examples of one training run and stored with the
//! run, so scoring and evaluation scale live vectors exactly the way the model
//! saw them during training.

use serde::{Deserialize, Serialize};

use crate::error::{PrefnetError, Result};

/// Per-feature bounds fitted on training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureNormalization {
    pub min_values: Vec<f64>,
    pub max_values: Vec<f64>,
}

impl FeatureNormalization {
    /// Bounds that leave vectors of `dimension` values in [0, 1] unchanged.
    pub fn identity(dimension: usize) -> Self {
        Self {
            min_values: vec![0.0; dimension],
            max_values: vec![1.0; dimension],
        }
    }

    /// Fit bounds over a set of vectors of equal length.
    pub fn fit<'a, I>(vectors: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a [f64]>,
    {
        let mut iter = vectors.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| PrefnetError::insufficient_data(0, 1))?;

        let mut min_values = first.to_vec();
        let mut max_values = first.to_vec();
        for vector in iter {
            if vector.len() != min_values.len() {
                return Err(PrefnetError::dimension_mismatch(min_values.len(), vector.len()));
            }
            for (i, &value) in vector.iter().enumerate() {
                min_values[i] = min_values[i].min(value);
                max_values[i] = max_values[i].max(value);
            }
        }

        Ok(Self {
            min_values,
            max_values,
        })
    }

    /// Number of features these bounds cover.
    pub fn dimension(&self) -> usize {
        self.min_values.len()
    }

    /// Scale a vector into [0, 1]. Constant features map to 0.0; values outside
    /// the fitted range are clamped.
    pub fn apply(&self, vector: &[f64]) -> Result<Vec<f64>> {
        if vector.len() != self.dimension() {
            return Err(PrefnetError::dimension_mismatch(self.dimension(), vector.len()));
        }

        Ok(vector
            .iter()
            .zip(self.min_values.iter().zip(&self.max_values))
            .map(|(&value, (&min, &max))| {
                let range = max - min;
                if range <= f64::EPSILON {
                    0.0
                } else {
                    ((value - min) / range).clamp(0.0, 1.0)
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_and_apply() {
        let data = [vec![0.0, 5.0, 1.0], vec![2.0, 5.0, 3.0]];
        let norm = FeatureNormalization::fit(data.iter().map(Vec::as_slice)).unwrap();

        assert_eq!(norm.min_values, vec![0.0, 5.0, 1.0]);
        assert_eq!(norm.max_values, vec![2.0, 5.0, 3.0]);
        assert_eq!(norm.apply(&[1.0, 5.0, 3.0]).unwrap(), vec![0.5, 0.0, 1.0]);
        // Out of range values are clamped.
        assert_eq!(norm.apply(&[4.0, 5.0, -1.0]).unwrap(), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let norm = FeatureNormalization::identity(3);
        let err = norm.apply(&[0.1, 0.2]).unwrap_err();
        assert!(matches!(
            err,
            PrefnetError::ModelDimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_fit_requires_data() {
        let empty: Vec<Vec<f64>> = Vec::new();
        assert!(FeatureNormalization::fit(empty.iter().map(Vec::as_slice)).is_err());
    }
}
