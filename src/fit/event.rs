use crate::error::FitError;
use crate::fit::dataset::Dataset;
use crate::fit::flux::{FluxFitter, FluxSolution};
use crate::fit::gradient;
use crate::fit::model::{FitParameter, MicrolensModel};
use crate::float_trait::Float;
use crate::summation::SumMode;

use ndarray::Array1;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// A microlensing event: one model plus any number of datasets
///
/// Owns the flux-fixing rules (keyed by dataset label) and a cache of per-dataset flux
/// solutions. Every setter replaces its state wholesale and clears the cache; `chi2` and
/// `chi2_gradient` refit transparently when the cache is empty.
pub struct Event<T, M>
where
    T: Float,
    M: MicrolensModel<T>,
{
    model: M,
    datasets: Vec<Dataset<'static, T>>,
    fix_source_fluxes: BTreeMap<String, Vec<T>>,
    fix_blend_flux: BTreeMap<String, T>,
    fix_source_flux_ratio: BTreeMap<String, T>,
    sum_mode: SumMode,
    solutions: Option<Vec<FluxSolution<T>>>,
}

impl<T, M> Event<T, M>
where
    T: Float,
    M: MicrolensModel<T>,
{
    pub fn new(model: M, datasets: Vec<Dataset<'static, T>>, sum_mode: SumMode) -> Self {
        Self {
            model,
            datasets,
            fix_source_fluxes: BTreeMap::new(),
            fix_blend_flux: BTreeMap::new(),
            fix_source_flux_ratio: BTreeMap::new(),
            sum_mode,
            solutions: None,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn datasets(&self) -> &[Dataset<'static, T>] {
        &self.datasets
    }

    pub fn sum_mode(&self) -> SumMode {
        self.sum_mode
    }

    /// Per-dataset solutions of the last fit, `None` after any state change
    pub fn solutions(&self) -> Option<&[FluxSolution<T>]> {
        self.solutions.as_deref()
    }

    pub fn set_model(&mut self, model: M) {
        self.model = model;
        self.solutions = None;
    }

    pub fn set_datasets(&mut self, datasets: Vec<Dataset<'static, T>>) {
        self.datasets = datasets;
        self.solutions = None;
    }

    /// Fix all source fluxes for the datasets carrying the given label
    pub fn fix_source_fluxes(&mut self, label: impl Into<String>, fluxes: Vec<T>) {
        self.fix_source_fluxes.insert(label.into(), fluxes);
        self.solutions = None;
    }

    pub fn fix_blend_flux(&mut self, label: impl Into<String>, blend_flux: T) {
        self.fix_blend_flux.insert(label.into(), blend_flux);
        self.solutions = None;
    }

    pub fn fix_source_flux_ratio(&mut self, label: impl Into<String>, ratio: T) {
        self.fix_source_flux_ratio.insert(label.into(), ratio);
        self.solutions = None;
    }

    /// Fit fluxes of every dataset, reusing the cache when nothing changed
    ///
    /// Datasets are fitted in parallel; the returned slice follows the dataset order.
    pub fn fit_fluxes(&mut self) -> Result<&[FluxSolution<T>], FitError> {
        if self.solutions.is_none() {
            let model = &self.model;
            let sum_mode = self.sum_mode;
            let fix_source_fluxes = &self.fix_source_fluxes;
            let fix_blend_flux = &self.fix_blend_flux;
            let fix_source_flux_ratio = &self.fix_source_flux_ratio;
            let solutions = self
                .datasets
                .par_iter()
                .map(|dataset| {
                    let magnification = model.magnification(dataset.times());
                    let mut fitter =
                        FluxFitter::new(dataset, &magnification).sum_mode(sum_mode);
                    if let Some(fluxes) = fix_source_fluxes.get(dataset.label()) {
                        fitter = fitter.fix_source_fluxes(fluxes.clone());
                    }
                    if let Some(&blend) = fix_blend_flux.get(dataset.label()) {
                        fitter = fitter.fix_blend_flux(blend);
                    }
                    if let Some(&ratio) = fix_source_flux_ratio.get(dataset.label()) {
                        fitter = fitter.fix_source_flux_ratio(ratio);
                    }
                    fitter.fit()
                })
                .collect::<Result<Vec<_>, _>>()?;
            self.solutions = Some(solutions);
        }
        Ok(self.solutions.as_deref().unwrap())
    }

    /// Aggregate chi-square over all datasets, good points only
    pub fn chi2(&mut self) -> Result<T, FitError> {
        let sum_mode = self.sum_mode;
        let solutions = self.fit_fluxes()?;
        Ok(sum_mode.sum(solutions.iter().map(|solution| solution.chi2)))
    }

    /// Sum of per-dataset chi-square gradients over the given parameters
    pub fn chi2_gradient(&mut self, parameters: &[FitParameter]) -> Result<Array1<T>, FitError> {
        self.fit_fluxes()?;
        let solutions = self.solutions.as_ref().unwrap();
        let mut total = Array1::zeros(parameters.len());
        for (dataset, solution) in self.datasets.iter().zip(solutions) {
            total = total + gradient::chi2_gradient(&self.model, dataset, solution, parameters)?;
        }
        Ok(total)
    }
}
