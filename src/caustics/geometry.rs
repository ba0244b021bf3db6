use crate::error::CausticsError;
use crate::float_trait::Float;
use crate::lens::{LensConfiguration, MassRatioInput, Topology};
use crate::roots::polynomial_roots;
use crate::summation::complex_compensated_sum;

use conv::prelude::*;
use num_complex::Complex;
use rayon::prelude::*;

/// Caustic structure corresponding to a given (q, s)
///
/// Solves the critical-curve polynomial (Eq. 6 of Cassan 2008, with the origin moved to
/// the center of mass and the larger mass on the left) over a uniform grid of angles and
/// maps every critical point through the lens equation into the source plane.
#[derive(Clone, Debug)]
pub struct Caustics<T: Float> {
    config: LensConfiguration<T>,
    critical_curve: Vec<Complex<T>>,
    caustic: Vec<Complex<T>>,
}

impl<T: Float> Caustics<T> {
    /// Compute the critical curve and caustic for the given lens
    ///
    /// The angle grid has `round(n_points / 4)` nodes, so the total number of stored
    /// points is the multiple of four closest to `n_points`. Four critical (and caustic)
    /// points are stored per angle, in angle-major order.
    pub fn new(
        q: impl Into<MassRatioInput<T>>,
        s: T,
        n_points: usize,
    ) -> Result<Self, CausticsError> {
        let config = LensConfiguration::new(q, s)?;
        let q = config.q();
        let s = config.s();
        let n_angles = (n_points + 2) / 4;
        let d_phi = T::two() * T::PI() / n_angles.approx_as::<T>().unwrap();
        let xcm_offset = config.center_of_mass_offset();

        // Every angle is independent; collect preserves the angle order.
        let points: Vec<_> = (0..n_angles)
            .into_par_iter()
            .map(|i| {
                let phi = d_phi * i.approx_as::<T>().unwrap();
                let eiphi = Complex::from_polar(T::one(), phi);
                let roots = polynomial_roots(&critical_curve_coefficients(q, s, eiphi));
                roots
                    .into_iter()
                    .map(|root| {
                        let critical = root - xcm_offset;
                        let caustic = lens_equation(q, s, root) - xcm_offset;
                        (critical, caustic)
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        let (critical_curve, caustic) = points.into_iter().flatten().unzip();
        Ok(Self {
            config,
            critical_curve,
            caustic,
        })
    }

    /// Critical-curve points, four per sampled angle, center-of-mass frame
    pub fn critical_curve(&self) -> &[Complex<T>] {
        &self.critical_curve
    }

    /// Caustic points, images of [Self::critical_curve] under the lens equation
    pub fn caustic(&self) -> &[Complex<T>] {
        &self.caustic
    }

    pub fn topology(&self) -> Topology {
        self.config.topology()
    }

    pub fn q(&self) -> T {
        self.config.q()
    }

    pub fn s(&self) -> T {
        self.config.s()
    }
}

/// Coefficients of the degree-4 critical-curve polynomial, low-to-high
///
/// Primary mass at the origin, secondary at +s.
fn critical_curve_coefficients<T: Float>(q: T, s: T, eiphi: Complex<T>) -> [Complex<T>; 5] {
    let one_plus_q = T::one() + q;
    [
        -eiphi * (s * s / one_plus_q),
        eiphi * (T::two() * s / one_plus_q),
        // s^2 and e^{i phi} nearly cancel close to phi = 0 for s ~ 1
        complex_compensated_sum([Complex::new(s * s, T::zero()), -eiphi]),
        Complex::new(-T::two() * s, T::zero()),
        Complex::new(T::one(), T::zero()),
    ]
}

/// Source-plane image of a lens-plane point
fn lens_equation<T: Float>(q: T, s: T, z: Complex<T>) -> Complex<T> {
    let z_bar = z.conj();
    let one = Complex::new(T::one(), T::zero());
    z - (one / z_bar + (z_bar - s).inv() * q) / (T::one() + q)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use num_complex::Complex64;

    fn polynomial_residual(q: f64, s: f64, phi: f64, z: Complex64) -> f64 {
        let eiphi = Complex64::from_polar(1.0, phi);
        let coefficients = critical_curve_coefficients(q, s, eiphi);
        coefficients
            .iter()
            .rev()
            .fold(Complex64::ZERO, |acc, &c| acc * z + c)
            .norm()
    }

    #[test]
    fn critical_points_satisfy_the_polynomial() {
        let q = 0.1;
        let s = 1.1;
        let caustics = Caustics::new(q, s, 400).unwrap();
        let xcm = q * s / (1.0 + q);
        let n_angles = caustics.critical_curve().len() / 4;
        let d_phi = 2.0 * std::f64::consts::PI / n_angles as f64;
        for (i, &z) in caustics.critical_curve().iter().enumerate() {
            let phi = d_phi * (i / 4) as f64;
            assert!(
                polynomial_residual(q, s, phi, z + xcm) < 1e-9,
                "root {i} residual too large"
            );
        }
    }

    #[test]
    fn point_counts_and_topology() {
        let caustics = Caustics::new(0.5, 1.0, 1000).unwrap();
        assert_eq!(caustics.critical_curve().len(), 1000);
        assert_eq!(caustics.caustic().len(), 1000);
        assert_eq!(caustics.topology(), Topology::Resonant);
    }

    #[test]
    fn caustic_is_symmetric_about_the_real_axis() {
        let caustics = Caustics::new(0.01, 1.5, 200).unwrap();
        for &zeta in caustics.caustic() {
            let mirrored = zeta.conj();
            let closest = caustics
                .caustic()
                .iter()
                .map(|&w| (w - mirrored).norm())
                .fold(f64::INFINITY, f64::min);
            assert!(closest < 1e-3, "no mirror partner for {zeta}");
        }
    }

    #[test]
    fn equal_masses_give_symmetric_caustic_center() {
        // for q = 1 the center of mass is the symmetry point of the caustic,
        // so caustic points must come in +/- pairs
        let caustics = Caustics::new(1.0, 0.8, 200).unwrap();
        let mean: Complex64 =
            caustics.caustic().iter().sum::<Complex64>() / caustics.caustic().len() as f64;
        assert_relative_eq!(mean.re, 0.0, epsilon = 1e-10);
        assert_relative_eq!(mean.im, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn multi_body_input_is_rejected() {
        assert!(matches!(
            Caustics::new(vec![0.5, 0.25], 1.0, 100).unwrap_err(),
            CausticsError::Configuration(_),
        ));
    }
}
