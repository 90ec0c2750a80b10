//! Ridge regression over standardized features.
//!
//! Each feature is centered and scaled by its training mean and standard
//! deviation, the target is centered, and the coefficients solve
//!
//! ```text
//! (ZᵀZ + αI) w = Zᵀ(y - ȳ)
//! ```
//!
//! by Gaussian elimination with partial pivoting. Constant features get a
//! unit scale and contribute nothing. Fitting is closed-form and
//! deterministic.

use serde::{Deserialize, Serialize};

use super::regressor::Regressor;
use super::trainer::TrainingError;

const PIVOT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegressor {
    alpha: f64,
    means: Vec<f64>,
    scales: Vec<f64>,
    weights: Vec<f64>,
    intercept: f64,
    fitted: bool,
}

impl Default for RidgeRegressor {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeRegressor {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            means: Vec::new(),
            scales: Vec::new(),
            weights: Vec::new(),
            intercept: 0.0,
            fitted: false,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Coefficients in standardized feature space.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Regressor for RidgeRegressor {
    fn name(&self) -> &str {
        "ridge"
    }

    fn fit(&mut self, feature_names: &[String], x: &[Vec<f64>], y: &[f64]) -> Result<(), TrainingError> {
        let p = feature_names.len();
        let n = x.len();
        if p == 0 {
            return Err(TrainingError::NoFeatures);
        }
        if n == 0 || n != y.len() {
            return Err(TrainingError::DimensionMismatch { expected: n, got: y.len() });
        }
        if let Some(bad) = x.iter().find(|row| row.len() != p) {
            return Err(TrainingError::DimensionMismatch { expected: p, got: bad.len() });
        }
        if !(self.alpha >= 0.0 && self.alpha.is_finite()) {
            return Err(TrainingError::InvalidParameter(format!("ridge alpha {}", self.alpha)));
        }

        let nf = n as f64;
        let means: Vec<f64> = (0..p).map(|j| x.iter().map(|r| r[j]).sum::<f64>() / nf).collect();
        let scales: Vec<f64> = (0..p)
            .map(|j| {
                let var = x.iter().map(|r| (r[j] - means[j]).powi(2)).sum::<f64>() / nf;
                let sd = var.sqrt();
                if sd > PIVOT_EPSILON {
                    sd
                } else {
                    1.0
                }
            })
            .collect();
        let z: Vec<Vec<f64>> = x
            .iter()
            .map(|r| (0..p).map(|j| (r[j] - means[j]) / scales[j]).collect())
            .collect();

        let y_mean = y.iter().sum::<f64>() / nf;
        let yc: Vec<f64> = y.iter().map(|v| v - y_mean).collect();

        let mut gram = vec![vec![0.0; p]; p];
        let mut rhs = vec![0.0; p];
        for (row, target) in z.iter().zip(&yc) {
            for i in 0..p {
                rhs[i] += row[i] * target;
                for j in i..p {
                    gram[i][j] += row[i] * row[j];
                }
            }
        }
        for i in 0..p {
            for j in 0..i {
                gram[i][j] = gram[j][i];
            }
            gram[i][i] += self.alpha;
        }

        let weights = solve(gram, rhs).ok_or(TrainingError::Singular)?;

        self.means = means;
        self.scales = scales;
        self.weights = weights;
        self.intercept = y_mean;
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, row: &[f64]) -> Result<f64, TrainingError> {
        if !self.fitted {
            return Err(TrainingError::NotFitted);
        }
        if row.len() != self.weights.len() {
            return Err(TrainingError::DimensionMismatch {
                expected: self.weights.len(),
                got: row.len(),
            });
        }
        let value = row
            .iter()
            .zip(&self.means)
            .zip(&self.scales)
            .zip(&self.weights)
            .map(|(((x, m), s), w)| w * (x - m) / s)
            .sum::<f64>()
            + self.intercept;
        Ok(value)
    }
}

/// Solve `a · x = b` in place. `None` when `a` is singular.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        let pivot_row = a[col].clone();
        let pivot_b = b[col];
        for row in col + 1..n {
            let factor = a[row][col] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            for (k, pivot_value) in pivot_row.iter().enumerate().skip(col) {
                a[row][k] -= factor * pivot_value;
            }
            b[row] -= factor * pivot_b;
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}
