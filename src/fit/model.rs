use crate::error::FitError;
use crate::float_trait::Float;
use crate::types::ArrayRef1;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Model parameter a chi-square gradient can be taken over
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FitParameter {
    T0,
    U0,
    TE,
    PiEN,
    PiEE,
}

impl FitParameter {
    pub fn name(self) -> &'static str {
        match self {
            Self::T0 => "t_0",
            Self::U0 => "u_0",
            Self::TE => "t_E",
            Self::PiEN => "pi_E_N",
            Self::PiEE => "pi_E_E",
        }
    }
}

impl fmt::Display for FitParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for FitParameter {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "t_0" => Ok(Self::T0),
            "u_0" => Ok(Self::U0),
            "t_E" => Ok(Self::TE),
            "pi_E_N" => Ok(Self::PiEN),
            "pi_E_E" => Ok(Self::PiEE),
            _ => Err(FitError::UnsupportedParameter(s.to_owned())),
        }
    }
}

/// Magnification model of a microlensing event
///
/// `magnification` returns one row per source; `magnification_gradient` returns one row
/// per requested parameter. Models reject parameters they have no derivatives for with
/// [FitError::UnsupportedParameter].
pub trait MicrolensModel<T: Float>: Send + Sync {
    fn n_lenses(&self) -> usize;

    fn n_sources(&self) -> usize;

    /// Magnification matrix of shape `(n_sources, times.len())`
    fn magnification(&self, times: &ArrayRef1<T>) -> Array2<T>;

    /// dA/d(parameter) matrix of shape `(parameters.len(), times.len())`
    fn magnification_gradient(
        &self,
        times: &ArrayRef1<T>,
        parameters: &[FitParameter],
    ) -> Result<Array2<T>, FitError>;
}

/// Point-source point-lens (Paczynski) model
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct PointSourcePointLens<T: Float> {
    pub t_0: T,
    pub u_0: T,
    pub t_e: T,
}

impl<T: Float> PointSourcePointLens<T> {
    pub fn new(t_0: T, u_0: T, t_e: T) -> Self {
        assert!(t_e > T::zero(), "t_E must be positive");
        Self { t_0, u_0, t_e }
    }

    /// (tau, u) of the source at the given epoch
    fn trajectory(&self, t: T) -> (T, T) {
        let tau = (t - self.t_0) / self.t_e;
        let u = (self.u_0 * self.u_0 + tau * tau).sqrt();
        (tau, u)
    }

    fn point_magnification(u: T) -> T {
        let u2 = u * u;
        (u2 + T::two()) / (u * (u2 + T::four()).sqrt())
    }
}

impl<T: Float> MicrolensModel<T> for PointSourcePointLens<T> {
    fn n_lenses(&self) -> usize {
        1
    }

    fn n_sources(&self) -> usize {
        1
    }

    fn magnification(&self, times: &ArrayRef1<T>) -> Array2<T> {
        Array2::from_shape_fn((1, times.len()), |(_, i)| {
            let (_, u) = self.trajectory(times[i]);
            Self::point_magnification(u)
        })
    }

    fn magnification_gradient(
        &self,
        times: &ArrayRef1<T>,
        parameters: &[FitParameter],
    ) -> Result<Array2<T>, FitError> {
        for &parameter in parameters {
            if matches!(parameter, FitParameter::PiEN | FitParameter::PiEE) {
                return Err(FitError::UnsupportedParameter(parameter.name().to_owned()));
            }
        }
        let eight = T::four() * T::two();
        let mut gradient = Array2::zeros((parameters.len(), times.len()));
        for (i, &t) in times.iter().enumerate() {
            let (tau, u) = self.trajectory(t);
            let u2 = u * u;
            let da_du = -eight / (u2 * (u2 + T::four()).powi(3).sqrt());
            for (row, &parameter) in parameters.iter().enumerate() {
                let du_dp = match parameter {
                    FitParameter::T0 => -tau / (u * self.t_e),
                    FitParameter::U0 => self.u_0 / u,
                    FitParameter::TE => -tau * tau / (u * self.t_e),
                    FitParameter::PiEN | FitParameter::PiEE => unreachable!(),
                };
                gradient[(row, i)] = da_du * du_dp;
            }
        }
        Ok(gradient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use light_curve_common::linspace;
    use ndarray::arr1;

    #[test]
    fn parameter_names_round_trip() {
        for parameter in [
            FitParameter::T0,
            FitParameter::U0,
            FitParameter::TE,
            FitParameter::PiEN,
            FitParameter::PiEE,
        ] {
            assert_eq!(parameter.name().parse::<FitParameter>().unwrap(), parameter);
        }
        assert_eq!(
            "rho".parse::<FitParameter>().unwrap_err(),
            FitError::UnsupportedParameter("rho".to_owned()),
        );
    }

    #[test]
    fn paczynski_known_values() {
        let model = PointSourcePointLens::new(0.0_f64, 1.0, 10.0);
        // A(u = 1) = 3 / sqrt(5)
        let a = model.magnification(&arr1(&[0.0]));
        assert_relative_eq!(a[(0, 0)], 3.0 / 5.0_f64.sqrt(), epsilon = 1e-14);

        // far from the peak the magnification approaches unity
        let far = model.magnification(&arr1(&[1e4]));
        assert_relative_eq!(far[(0, 0)], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let t_0 = 2455000.0_f64;
        let u_0 = 0.3;
        let t_e = 25.0;
        let model = PointSourcePointLens::new(t_0, u_0, t_e);
        let times = arr1(&linspace(t_0 - 50.0, t_0 + 50.0, 41));
        let parameters = [FitParameter::T0, FitParameter::U0, FitParameter::TE];
        let gradient = model.magnification_gradient(&times, &parameters).unwrap();

        // the step must stay well above the round-off of t ~ 2.455e6
        let h = 1e-3;
        let perturbed = |row: usize, sign: f64| {
            let mut m = model;
            match parameters[row] {
                FitParameter::T0 => m.t_0 += sign * h,
                FitParameter::U0 => m.u_0 += sign * h,
                FitParameter::TE => m.t_e += sign * h,
                _ => unreachable!(),
            }
            m.magnification(&times)
        };
        for row in 0..parameters.len() {
            let plus = perturbed(row, 1.0);
            let minus = perturbed(row, -1.0);
            for i in 0..times.len() {
                let numeric = (plus[(0, i)] - minus[(0, i)]) / (2.0 * h);
                assert_relative_eq!(
                    gradient[(row, i)],
                    numeric,
                    epsilon = 1e-9,
                    max_relative = 1e-6,
                );
            }
        }
    }

    #[test]
    fn parallax_gradient_is_rejected() {
        let model = PointSourcePointLens::new(0.0_f64, 0.1, 10.0);
        let times = arr1(&[0.0, 1.0]);
        assert_eq!(
            model
                .magnification_gradient(&times, &[FitParameter::PiEN])
                .unwrap_err(),
            FitError::UnsupportedParameter("pi_E_N".to_owned()),
        );
    }

    #[test]
    fn model_serde_round_trip() {
        let model = PointSourcePointLens::new(2455000.0_f64, -0.2, 30.0);
        let json = serde_json::to_string(&model).unwrap();
        let back: PointSourcePointLens<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, model);
    }
}
