//! Ordinary least squares with intercept

use super::Regressor;
use crate::error::{MeterError, Result};

/// Relative ridge term keeping the normal equations solvable when the
/// design matrix is rank deficient (fewer pairs than features, collinear
/// windows). Small enough to approximate the minimum-norm solution.
const RIDGE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct LinearRegression {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegression {
    /// Fit `y ≈ X·β + c` over rows of equal width
    pub fn fit(x: &[Vec<f64>], y: &[f64]) -> Result<Self> {
        if x.is_empty() {
            return Err(MeterError::Fit("no training rows".into()));
        }
        if x.len() != y.len() {
            return Err(MeterError::Fit(format!(
                "{} feature rows but {} targets",
                x.len(),
                y.len()
            )));
        }
        let width = x[0].len();
        if width == 0 || x.iter().any(|row| row.len() != width) {
            return Err(MeterError::Fit("feature rows have inconsistent width".into()));
        }
        if x.iter().flatten().chain(y).any(|v| !v.is_finite()) {
            return Err(MeterError::Fit("training data contains non-finite values".into()));
        }

        let n = x.len() as f64;
        let mut x_mean = vec![0.0; width];
        for row in x {
            for (m, v) in x_mean.iter_mut().zip(row) {
                *m += v / n;
            }
        }
        let y_mean = y.iter().sum::<f64>() / n;

        // Centered normal equations
        let mut gram = vec![vec![0.0; width]; width];
        let mut rhs = vec![0.0; width];
        for (row, target) in x.iter().zip(y) {
            let centered: Vec<f64> = row.iter().zip(&x_mean).map(|(v, m)| v - m).collect();
            let dy = target - y_mean;
            for i in 0..width {
                rhs[i] += centered[i] * dy;
                for j in 0..width {
                    gram[i][j] += centered[i] * centered[j];
                }
            }
        }

        let trace: f64 = (0..width).map(|i| gram[i][i]).sum();
        let ridge = (trace / width as f64 * RIDGE_EPSILON).max(f64::MIN_POSITIVE);
        for (i, row) in gram.iter_mut().enumerate() {
            row[i] += ridge;
        }

        let coefficients = solve(gram, rhs)?;
        let intercept = y_mean - dot(&coefficients, &x_mean);
        Ok(Self {
            coefficients,
            intercept,
        })
    }
}

impl Regressor for LinearRegression {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.coefficients.len() {
            return Err(MeterError::Inference(format!(
                "expected {} features, got {}",
                self.coefficients.len(),
                features.len()
            )));
        }
        Ok(self.intercept + dot(&self.coefficients, features))
    }

    fn name(&self) -> &str {
        "linear_regression"
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < f64::MIN_POSITIVE {
            return Err(MeterError::Fit("singular normal equations".into()));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * solution[k]).sum();
        solution[row] = (b[row] - tail) / a[row][row];
    }
    Ok(solution)
}
