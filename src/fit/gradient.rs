use crate::error::FitError;
use crate::fit::dataset::Dataset;
use crate::fit::flux::FluxSolution;
use crate::fit::model::{FitParameter, MicrolensModel};
use crate::float_trait::Float;
use crate::summation::compensated_sum;

use ndarray::Array1;

/// Gradient of the chi-square over model parameters for one dataset
///
/// Chain rule over the flux model `f = f_s A(t) + f_b`:
/// d(chi2)/dp = -2 f_s sum_good (f_obs - f) dA/dp / sigma^2.
/// Only single-lens single-source models are supported; the flux solution must come
/// from a fit of the same dataset against the same model.
pub fn chi2_gradient<T, M>(
    model: &M,
    dataset: &Dataset<'_, T>,
    solution: &FluxSolution<T>,
    parameters: &[FitParameter],
) -> Result<Array1<T>, FitError>
where
    T: Float,
    M: MicrolensModel<T>,
{
    if model.n_lenses() != 1 || model.n_sources() != 1 {
        return Err(FitError::UnsupportedModel {
            n_lenses: model.n_lenses(),
            n_sources: model.n_sources(),
        });
    }
    let magnification = model.magnification(dataset.times());
    let gradient_matrix = model.magnification_gradient(dataset.times(), parameters)?;
    let f_s = solution.source_fluxes[0];
    let f_b = solution.blend_flux;

    let gradient: Vec<T> = (0..parameters.len())
        .map(|row| {
            let sum = compensated_sum(dataset.good_indices().map(|i| {
                let sigma = dataset.flux_err()[i];
                let residual = dataset.flux()[i] - (f_s * magnification[(0, i)] + f_b);
                residual * gradient_matrix[(row, i)] / (sigma * sigma)
            }));
            -T::two() * f_s * sum
        })
        .collect();
    Ok(Array1::from(gradient))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::fit::flux::FluxFitter;
    use crate::fit::model::PointSourcePointLens;
    use crate::types::ArrayRef1;

    use approx::assert_relative_eq;
    use light_curve_common::linspace;
    use ndarray::{arr1, Array2};

    const T_0: f64 = 2455000.0;
    const U_0: f64 = 0.3;
    const T_E: f64 = 25.0;
    const F_S: f64 = 5.0;
    const F_B: f64 = 3.0;

    /// Dataset generated from the true model, fitted with a slightly off t_0
    fn dataset() -> Dataset<'static, f64> {
        let truth = PointSourcePointLens::new(T_0, U_0, T_E);
        let times = arr1(&linspace(T_0 - 50.0, T_0 + 50.0, 61));
        let magnification = truth.magnification(&times);
        let flux = Array1::from_shape_fn(times.len(), |i| F_S * magnification[(0, i)] + F_B);
        let flux_err = Array1::from_elem(times.len(), 0.01);
        Dataset::new("synthetic", times, flux, flux_err)
    }

    fn chi2_at(dataset: &Dataset<'static, f64>, model: &PointSourcePointLens<f64>) -> f64 {
        let magnification = model.magnification(dataset.times());
        FluxFitter::new(dataset, &magnification)
            .fix_source_fluxes(vec![F_S])
            .fix_blend_flux(F_B)
            .fit()
            .unwrap()
            .chi2
    }

    #[test]
    fn gradient_matches_finite_differences_of_chi2() {
        let dataset = dataset();
        // off-truth model, so the gradient is non-zero
        let model = PointSourcePointLens::new(T_0 + 0.7, U_0 - 0.02, T_E + 1.5);
        let magnification = model.magnification(dataset.times());
        let solution = FluxFitter::new(&dataset, &magnification)
            .fix_source_fluxes(vec![F_S])
            .fix_blend_flux(F_B)
            .fit()
            .unwrap();
        let parameters = [FitParameter::T0, FitParameter::U0, FitParameter::TE];
        let gradient = chi2_gradient(&model, &dataset, &solution, &parameters).unwrap();

        let h = 1e-5;
        for (row, &parameter) in parameters.iter().enumerate() {
            let perturbed = |sign: f64| {
                let mut m = model;
                match parameter {
                    FitParameter::T0 => m.t_0 += sign * h,
                    FitParameter::U0 => m.u_0 += sign * h,
                    FitParameter::TE => m.t_e += sign * h,
                    _ => unreachable!(),
                }
                chi2_at(&dataset, &m)
            };
            let numeric = (perturbed(1.0) - perturbed(-1.0)) / (2.0 * h);
            assert_relative_eq!(gradient[row], numeric, max_relative = 1e-4);
        }
    }

    #[test]
    fn parallax_parameters_are_rejected() {
        let dataset = dataset();
        let model = PointSourcePointLens::new(T_0, U_0, T_E);
        let magnification = model.magnification(dataset.times());
        let solution = FluxFitter::new(&dataset, &magnification).fit().unwrap();
        assert_eq!(
            chi2_gradient(&model, &dataset, &solution, &[FitParameter::PiEE]).unwrap_err(),
            FitError::UnsupportedParameter("pi_E_E".to_owned()),
        );
    }

    #[test]
    fn multi_source_models_are_rejected() {
        struct TwoSources;
        impl MicrolensModel<f64> for TwoSources {
            fn n_lenses(&self) -> usize {
                1
            }
            fn n_sources(&self) -> usize {
                2
            }
            fn magnification(&self, times: &ArrayRef1<f64>) -> Array2<f64> {
                Array2::ones((2, times.len()))
            }
            fn magnification_gradient(
                &self,
                times: &ArrayRef1<f64>,
                parameters: &[FitParameter],
            ) -> Result<Array2<f64>, FitError> {
                Ok(Array2::zeros((parameters.len(), times.len())))
            }
        }

        let dataset = dataset();
        let solution = FluxSolution {
            source_fluxes: vec![1.0, 1.0],
            blend_flux: 0.0,
            chi2: 0.0,
            chi2_per_point: Array1::zeros(dataset.len()),
        };
        assert_eq!(
            chi2_gradient(&TwoSources, &dataset, &solution, &[FitParameter::T0]).unwrap_err(),
            FitError::UnsupportedModel {
                n_lenses: 1,
                n_sources: 2,
            },
        );
    }
}
