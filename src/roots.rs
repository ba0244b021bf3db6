//! Complex polynomial root finder used by the critical-curve solver

use crate::float_trait::Float;

use conv::prelude::*;
use num_complex::Complex;
use num_traits::{One, Zero};

const MAX_ITERATIONS: usize = 256;

/// Roots of a complex polynomial given by its coefficients in low-to-high order
///
/// Durand–Kerner iteration on the monic polynomial with fixed deterministic seeds.
/// The caller must pass a non-zero leading coefficient; the number of returned roots
/// equals the polynomial degree. The iteration is deterministic, so repeated calls
/// with the same input give bit-identical output.
pub fn polynomial_roots<T: Float>(coefficients: &[Complex<T>]) -> Vec<Complex<T>> {
    assert!(
        coefficients.len() >= 2,
        "polynomial must have a positive degree"
    );
    let degree = coefficients.len() - 1;
    let leading = coefficients[degree];
    assert!(
        leading.norm() > T::zero(),
        "leading coefficient must be non-zero"
    );
    let monic: Vec<_> = coefficients.iter().map(|&c| c / leading).collect();

    // Horner evaluation, high to low
    let eval = |z: Complex<T>| {
        monic
            .iter()
            .rev()
            .fold(Complex::<T>::zero(), |acc, &c| acc * z + c)
    };

    // Standard non-real seed avoiding symmetry traps
    let seed = Complex::new(
        0.4_f64.approx_as::<T>().unwrap(),
        0.9_f64.approx_as::<T>().unwrap(),
    );
    let mut roots: Vec<_> = (1..=degree)
        .map(|power| seed.powu(power as u32))
        .collect();

    let scale = monic
        .iter()
        .map(|c| c.norm())
        .fold(T::one(), |max, x| if x > max { x } else { max });
    let tolerance = T::epsilon() * scale * T::four() * T::four();

    for _ in 0..MAX_ITERATIONS {
        let mut max_correction = T::zero();
        for k in 0..degree {
            let numerator = eval(roots[k]);
            let mut denominator = Complex::<T>::one();
            for j in 0..degree {
                if j != k {
                    denominator *= roots[k] - roots[j];
                }
            }
            if denominator.is_zero() {
                // coincident estimates, nudge apart and retry on the next sweep
                roots[k] += Complex::new(tolerance + T::epsilon(), T::zero());
                max_correction = T::infinity();
                continue;
            }
            let correction = numerator / denominator;
            roots[k] -= correction;
            let norm = correction.norm();
            if norm > max_correction {
                max_correction = norm;
            }
        }
        if max_correction <= tolerance {
            break;
        }
    }
    roots
}
