//! Scalar polynomials in ascending-power form

use nalgebra::{DMatrix, DVector, RowDVector};

/// n! / (n - k)!, the factor a power `t^n` picks up after `k` derivatives
pub fn falling_factorial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    ((n - k + 1)..=n).fold(1.0, |acc, i| acc * i as f64)
}

/// Row `[d^k/dt^k t^0, d^k/dt^k t^1, ...]` evaluated at `t`
pub fn basis_row(coefficient_count: usize, t: f64, derivative: usize) -> RowDVector<f64> {
    RowDVector::from_fn(coefficient_count, |_, power| {
        if power < derivative {
            0.0
        } else {
            falling_factorial(power, derivative) * t.powi((power - derivative) as i32)
        }
    })
}

/// Hessian of `∫_0^duration (d^k/dt^k p(t))^2 dt` with respect to the
/// coefficients of `p`, halved.
pub fn cost_matrix(coefficient_count: usize, duration: f64, derivative: usize) -> DMatrix<f64> {
    DMatrix::from_fn(coefficient_count, coefficient_count, |i, j| {
        if i < derivative || j < derivative {
            return 0.0;
        }
        let exponent = (i + j + 1 - 2 * derivative) as i32;
        falling_factorial(i, derivative) * falling_factorial(j, derivative)
            * duration.powi(exponent)
            / exponent as f64
    })
}

/// A polynomial `c0 + c1 t + c2 t^2 + ...`
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coefficients: DVector<f64>,
}

impl Polynomial {
    pub fn new(coefficients: DVector<f64>) -> Self {
        Polynomial { coefficients }
    }

    pub fn coefficient_count(&self) -> usize {
        self.coefficients.len()
    }

    /// Value of the `derivative`-th derivative at `t` (Horner form)
    pub fn evaluate(&self, t: f64, derivative: usize) -> f64 {
        let n = self.coefficients.len();
        if derivative >= n {
            return 0.0;
        }
        (derivative..n).rev().fold(0.0, |acc, power| {
            acc * t + self.coefficients[power] * falling_factorial(power, derivative)
        })
    }

    /// `∫_0^duration (d^k/dt^k p(t))^2 dt`
    pub fn integral_squared_derivative(&self, duration: f64, derivative: usize) -> f64 {
        let q = cost_matrix(self.coefficients.len(), duration, derivative);
        self.coefficients.dot(&(q * &self.coefficients))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factorials() {
        assert_eq!(falling_factorial(5, 0), 1.0);
        assert_eq!(falling_factorial(5, 2), 20.0);
        assert_eq!(falling_factorial(3, 3), 6.0);
        assert_eq!(falling_factorial(2, 3), 0.0);
    }

    #[test]
    fn evaluate_value_and_derivatives() {
        // 7 - 2t + 3t^2
        let poly = Polynomial::new(DVector::from_vec(vec![7.0, -2.0, 3.0]));
        assert_eq!(poly.evaluate(2.0, 0), 15.0);
        assert_eq!(poly.evaluate(2.0, 1), 10.0);
        assert_eq!(poly.evaluate(2.0, 2), 6.0);
        assert_eq!(poly.evaluate(2.0, 3), 0.0);
    }

    #[test]
    fn basis_row_matches_evaluate() {
        let coefficients = DVector::from_vec(vec![1.0, 0.5, -0.25, 2.0, 0.1]);
        let poly = Polynomial::new(coefficients.clone());
        for derivative in 0..5 {
            let row = basis_row(5, 1.3, derivative);
            let via_row = (row * &coefficients)[0];
            assert!((via_row - poly.evaluate(1.3, derivative)).abs() < 1e-12);
        }
    }

    #[test]
    fn squared_integral() {
        // p = t^2, p'' = 2, ∫_0^3 4 dt = 12
        let poly = Polynomial::new(DVector::from_vec(vec![0.0, 0.0, 1.0]));
        assert!((poly.integral_squared_derivative(3.0, 2) - 12.0).abs() < 1e-12);
        // p' = 2t, ∫_0^3 4t^2 dt = 36
        assert!((poly.integral_squared_derivative(3.0, 1) - 36.0).abs() < 1e-12);
    }
}
