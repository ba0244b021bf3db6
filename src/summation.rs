//! Summation helpers: naive vs compensated accumulation

use crate::float_trait::Float;

use num_complex::Complex;
use serde::{Deserialize, Serialize};

/// Summation algorithm used for chi-square aggregation
///
/// [SumMode::Compensated] is the default: it makes the aggregate value insensitive to
/// dataset ordering at the cost of a few extra flops per term.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SumMode {
    Naive,
    #[default]
    Compensated,
}

impl SumMode {
    pub fn sum<T: Float>(self, values: impl IntoIterator<Item = T>) -> T {
        match self {
            Self::Naive => values.into_iter().sum(),
            Self::Compensated => compensated_sum(values),
        }
    }
}

/// Kahan–Babuška–Neumaier compensated sum
pub fn compensated_sum<T: Float>(values: impl IntoIterator<Item = T>) -> T {
    let mut sum = T::zero();
    let mut compensation = T::zero();
    for x in values {
        let t = sum + x;
        if sum.abs() >= x.abs() {
            compensation += (sum - t) + x;
        } else {
            compensation += (x - t) + sum;
        }
        sum = t;
    }
    sum + compensation
}

/// Compensated sum of complex values, each component accumulated separately
pub fn complex_compensated_sum<T: Float>(
    values: impl IntoIterator<Item = Complex<T>> + Clone,
) -> Complex<T> {
    let re = compensated_sum(values.clone().into_iter().map(|z| z.re));
    let im = compensated_sum(values.into_iter().map(|z| z.im));
    Complex::new(re, im)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compensated_sum_recovers_cancelled_term() {
        let values = [1e16_f64, 1.0, -1e16];
        assert_eq!(compensated_sum(values.iter().copied()), 1.0);
        assert_eq!(SumMode::Compensated.sum(values.iter().copied()), 1.0);
        // the naive sum loses the middle term
        assert_eq!(SumMode::Naive.sum(values.iter().copied()), 0.0);
    }

    #[test]
    fn compensated_sum_of_empty_is_zero() {
        assert_eq!(compensated_sum(std::iter::empty::<f64>()), 0.0);
    }

    #[test]
    fn compensated_sum_is_order_insensitive() {
        let values = [1e12_f64, 3.25, -1e12, 1e-3, 7.5, -2.25];
        let forward = compensated_sum(values.iter().copied());
        let backward = compensated_sum(values.iter().rev().copied());
        assert_eq!(forward, backward);
    }

    #[test]
    fn complex_compensated_sum_componentwise() {
        let values = [
            Complex::new(1e15_f64, -1e15),
            Complex::new(0.5, 0.25),
            Complex::new(-1e15, 1e15),
        ];
        let sum = complex_compensated_sum(values.iter().copied());
        assert_eq!(sum, Complex::new(0.5, 0.25));
    }

    #[test]
    fn sum_mode_serde_round_trip() {
        let json = serde_json::to_string(&SumMode::Compensated).unwrap();
        let back: SumMode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SumMode::Compensated);
    }
}
