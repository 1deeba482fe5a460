// Weighted Ridge Surrogate
// Local linear model fitted to perturbation samples

use ndarray::{Array1, Array2, Axis};

use crate::error::ExplanationError;

#[derive(Debug, Clone, PartialEq)]
pub struct RidgeFit {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
}

/// Weighted ridge regression with an unpenalized intercept.
///
/// Features and targets are centered on their weighted means, then
/// `(XᵀWX + αI) β = XᵀWy` is solved by Cholesky decomposition. When there are
/// more features than rows the equivalent `n × n` system is solved instead.
pub fn fit_weighted_ridge(
    features: &Array2<f64>,
    targets: &Array1<f64>,
    weights: &Array1<f64>,
    alpha: f64,
) -> Result<RidgeFit, ExplanationError> {
    let (n, d) = features.dim();
    if n == 0 || d == 0 {
        return Err(ExplanationError::Numerical("empty design matrix".to_string()));
    }
    if targets.len() != n || weights.len() != n {
        return Err(ExplanationError::Numerical(format!(
            "{} rows but {} targets and {} weights",
            n,
            targets.len(),
            weights.len()
        )));
    }
    let weight_sum = weights.sum();
    if !(weight_sum > 0.0) || !weight_sum.is_finite() {
        return Err(ExplanationError::Numerical("sample weights sum to zero".to_string()));
    }

    let x_mean = features.t().dot(weights) / weight_sum;
    let y_mean = targets.dot(weights) / weight_sum;

    let x_centered = features - &x_mean.view().insert_axis(Axis(0));
    let y_centered = targets - y_mean;

    // Scale rows by sqrt(w) so the normal equations pick up W.
    let sqrt_w = weights.mapv(f64::sqrt);
    let xw = &x_centered * &sqrt_w.view().insert_axis(Axis(1));
    let yw = &y_centered * &sqrt_w;

    let coefficients = if d > n {
        solve_dual(&xw, &yw, alpha)?
    } else {
        solve_primal(&xw, &yw, alpha)?
    };
    let intercept = y_mean - x_mean.dot(&coefficients);

    Ok(RidgeFit {
        coefficients,
        intercept,
    })
}

fn solve_primal(xw: &Array2<f64>, yw: &Array1<f64>, alpha: f64) -> Result<Array1<f64>, ExplanationError> {
    let mut gram = xw.t().dot(xw);
    for i in 0..gram.nrows() {
        gram[[i, i]] += alpha;
    }
    cholesky_solve(&gram, &xw.t().dot(yw))
}

// β = Xᵀ (XXᵀ + αI)⁻¹ y
fn solve_dual(xw: &Array2<f64>, yw: &Array1<f64>, alpha: f64) -> Result<Array1<f64>, ExplanationError> {
    let mut kernel = xw.dot(&xw.t());
    for i in 0..kernel.nrows() {
        kernel[[i, i]] += alpha;
    }
    let dual = cholesky_solve(&kernel, yw)?;
    Ok(xw.t().dot(&dual))
}

/// Solve `A x = b` for symmetric positive-definite `A`.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, ExplanationError> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if !(sum > 0.0) {
                    return Err(ExplanationError::Numerical(format!(
                        "matrix is not positive definite at pivot {}",
                        i
                    )));
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    // L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * z[k];
        }
        z[i] = sum / l[[i, i]];
    }

    // Lᵀ x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = z[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(ExplanationError::Numerical("non-finite coefficients".to_string()));
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_recovers_linear_relationship() {
        // y = 0.5 + 2*x0 - 1*x1
        let x = array![
            [0.0, 0.0],
            [1.0, 0.0],
            [0.0, 1.0],
            [1.0, 1.0],
            [1.0, 0.0],
            [0.0, 1.0],
        ];
        let y = x.map_axis(Axis(1), |row| 0.5 + 2.0 * row[0] - row[1]);
        let w = Array1::ones(6);

        let fit = fit_weighted_ridge(&x, &y, &w, 1e-9).unwrap();
        assert!((fit.coefficients[0] - 2.0).abs() < 1e-6);
        assert!((fit.coefficients[1] + 1.0).abs() < 1e-6);
        assert!((fit.intercept - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_wide_design_matches_primal_solution() {
        // 3 rows, 5 features
        let xw = array![
            [1.0, 0.0, 1.0, 0.5, -1.0],
            [0.0, 1.0, 1.0, -0.5, 2.0],
            [1.0, 1.0, 0.0, 1.5, 0.0],
        ];
        let yw = array![0.3, -0.7, 1.1];
        let primal = solve_primal(&xw, &yw, 1.0).unwrap();
        let dual = solve_dual(&xw, &yw, 1.0).unwrap();
        for (p, q) in primal.iter().zip(dual.iter()) {
            assert!((p - q).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fits_more_features_than_rows() {
        let x = array![[1.0, 1.0, 0.0, 1.0], [0.0, 1.0, 1.0, 1.0], [1.0, 0.0, 1.0, 0.0]];
        let y = array![1.0, 0.0, 1.0];
        let w = array![1.0, 0.5, 0.25];
        let fit = fit_weighted_ridge(&x, &y, &w, 1.0).unwrap();
        assert_eq!(fit.coefficients.len(), 4);
        assert!(fit.coefficients[0] > 0.0);
        assert!(fit.intercept.is_finite());
    }

    #[test]
    fn test_penalty_shrinks_coefficients() {
        let x = array![[0.0], [1.0], [0.0], [1.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];
        let w = Array1::ones(4);

        let loose = fit_weighted_ridge(&x, &y, &w, 1e-9).unwrap();
        let tight = fit_weighted_ridge(&x, &y, &w, 10.0).unwrap();
        assert!(tight.coefficients[0].abs() < loose.coefficients[0].abs());
        assert!(tight.coefficients[0] > 0.0);
    }

    #[test]
    fn test_zero_weight_rows_are_ignored() {
        let x = array![[0.0], [1.0], [1.0]];
        let y = array![0.0, 1.0, 100.0];
        let w = array![1.0, 1.0, 0.0];
        let fit = fit_weighted_ridge(&x, &y, &w, 1e-9).unwrap();
        assert!((fit.coefficients[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0];
        let w = array![1.0, 1.0];
        assert!(fit_weighted_ridge(&x, &y, &w, 1.0).is_err());
    }
}
