use crate::error::FitError;
use crate::fit::dataset::Dataset;
use crate::float_trait::Float;
use crate::summation::SumMode;

use conv::prelude::*;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Result of a linear flux fit, immutable once computed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct FluxSolution<T: Float> {
    /// Source flux per model source
    pub source_fluxes: Vec<T>,
    pub blend_flux: T,
    /// Aggregate over good points only
    pub chi2: T,
    /// Per-point contributions, bad points included
    pub chi2_per_point: Array1<T>,
}

/// Linear least-squares fit of source and blend fluxes for one dataset
///
/// Given a magnification matrix (row per source), the observed flux is modeled as
/// `sum_j f_s_j A_j(t) + f_b`. All free fluxes are solved from the weighted normal
/// equations over the good points; fixed components are subtracted from the observed
/// flux before the solve. Fixing the source fluxes and fixing their ratio are mutually
/// exclusive, setting one clears the other.
pub struct FluxFitter<'a, 'd, T>
where
    T: Float,
{
    dataset: &'a Dataset<'d, T>,
    magnification: &'a Array2<T>,
    fix_source_fluxes: Option<Vec<T>>,
    fix_blend_flux: Option<T>,
    fix_source_flux_ratio: Option<T>,
    sum_mode: SumMode,
}

#[derive(Clone, Copy)]
enum Column {
    Source(usize),
    /// Combined column of two sources with a fixed flux ratio
    RatioPair,
    Blend,
}

impl<'a, 'd, T> FluxFitter<'a, 'd, T>
where
    T: Float,
{
    /// Panics if the magnification matrix does not match the dataset length
    pub fn new(dataset: &'a Dataset<'d, T>, magnification: &'a Array2<T>) -> Self {
        assert_eq!(
            magnification.ncols(),
            dataset.len(),
            "magnification must have one column per dataset point"
        );
        Self {
            dataset,
            magnification,
            fix_source_fluxes: None,
            fix_blend_flux: None,
            fix_source_flux_ratio: None,
            sum_mode: SumMode::default(),
        }
    }

    /// Fix every source flux, panics on length mismatch
    pub fn fix_source_fluxes(mut self, fluxes: Vec<T>) -> Self {
        assert_eq!(
            fluxes.len(),
            self.magnification.nrows(),
            "one fixed flux per source is required"
        );
        self.fix_source_flux_ratio = None;
        self.fix_source_fluxes = Some(fluxes);
        self
    }

    pub fn fix_blend_flux(mut self, blend_flux: T) -> Self {
        self.fix_blend_flux = Some(blend_flux);
        self
    }

    pub fn fix_source_flux_ratio(mut self, ratio: T) -> Self {
        self.fix_source_fluxes = None;
        self.fix_source_flux_ratio = Some(ratio);
        self
    }

    pub fn sum_mode(mut self, sum_mode: SumMode) -> Self {
        self.sum_mode = sum_mode;
        self
    }

    pub fn fit(&self) -> Result<FluxSolution<T>, FitError> {
        let n_sources = self.magnification.nrows();
        if self.fix_source_flux_ratio.is_some() && n_sources != 2 {
            return Err(FitError::WrongNumberOfSources(n_sources));
        }

        let mut columns = Vec::with_capacity(n_sources + 1);
        if self.fix_source_fluxes.is_none() {
            if self.fix_source_flux_ratio.is_some() {
                columns.push(Column::RatioPair);
            } else {
                columns.extend((0..n_sources).map(Column::Source));
            }
        }
        if self.fix_blend_flux.is_none() {
            columns.push(Column::Blend);
        }

        let column_value = |column: Column, i: usize| match column {
            Column::Source(j) => self.magnification[(j, i)],
            Column::RatioPair => {
                self.magnification[(0, i)]
                    + self.fix_source_flux_ratio.unwrap() * self.magnification[(1, i)]
            }
            Column::Blend => T::one(),
        };
        let target = |i: usize| {
            let mut y = self.dataset.flux()[i];
            if let Some(fluxes) = &self.fix_source_fluxes {
                for (j, &f) in fluxes.iter().enumerate() {
                    y -= f * self.magnification[(j, i)];
                }
            }
            if let Some(f) = self.fix_blend_flux {
                y -= f;
            }
            y
        };

        let k = columns.len();
        let mut normal = vec![vec![T::zero(); k]; k];
        let mut rhs = vec![T::zero(); k];
        for i in self.dataset.good_indices() {
            let sigma = self.dataset.flux_err()[i];
            let weight = (sigma * sigma).recip();
            for a in 0..k {
                let x_a = column_value(columns[a], i);
                rhs[a] += weight * x_a * target(i);
                for b in a..k {
                    normal[a][b] += weight * x_a * column_value(columns[b], i);
                }
            }
        }
        for a in 0..k {
            for b in 0..a {
                normal[a][b] = normal[b][a];
            }
        }
        let free = if k > 0 {
            solve_linear_system(normal, rhs)?
        } else {
            vec![]
        };

        let source_fluxes = if let Some(fluxes) = &self.fix_source_fluxes {
            fluxes.clone()
        } else if let Some(ratio) = self.fix_source_flux_ratio {
            vec![free[0], ratio * free[0]]
        } else {
            free[..n_sources].to_vec()
        };
        let blend_flux = match self.fix_blend_flux {
            Some(f) => f,
            None => *free.last().unwrap(),
        };

        let model_flux = |i: usize| {
            let mut f = blend_flux;
            for (j, &f_s) in source_fluxes.iter().enumerate() {
                f += f_s * self.magnification[(j, i)];
            }
            f
        };
        let chi2_per_point = Array1::from_shape_fn(self.dataset.len(), |i| {
            let residual = (self.dataset.flux()[i] - model_flux(i)) / self.dataset.flux_err()[i];
            residual * residual
        });
        let chi2 = self
            .sum_mode
            .sum(self.dataset.good_indices().map(|i| chi2_per_point[i]));

        Ok(FluxSolution {
            source_fluxes,
            blend_flux,
            chi2,
            chi2_per_point,
        })
    }
}

/// Gaussian elimination with partial pivoting, for the few-unknown normal equations
fn solve_linear_system<T: Float>(
    mut matrix: Vec<Vec<T>>,
    mut rhs: Vec<T>,
) -> Result<Vec<T>, FitError> {
    let n = rhs.len();
    let scale = matrix
        .iter()
        .flatten()
        .fold(T::zero(), |max, &x| max.max(x.abs()));
    if !(scale > T::zero()) {
        return Err(FitError::SingularSystem("all-zero normal matrix"));
    }
    let threshold = scale * T::epsilon() * n.approx_as::<T>().unwrap();

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&r1, &r2| {
                matrix[r1][col]
                    .abs()
                    .partial_cmp(&matrix[r2][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap();
        if matrix[pivot_row][col].abs() <= threshold {
            return Err(FitError::SingularSystem("zero pivot in the normal equations"));
        }
        matrix.swap(col, pivot_row);
        rhs.swap(col, pivot_row);

        let pivot_values = matrix[col].clone();
        let pivot = pivot_values[col];
        for row in col + 1..n {
            let factor = matrix[row][col] / pivot;
            for j in col..n {
                matrix[row][j] -= factor * pivot_values[j];
            }
            let rhs_col = rhs[col];
            rhs[row] -= factor * rhs_col;
        }
    }

    let mut solution = vec![T::zero(); n];
    for row in (0..n).rev() {
        let mut value = rhs[row];
        for j in row + 1..n {
            value -= matrix[row][j] * solution[j];
        }
        solution[row] = value / matrix[row][row];
    }
    Ok(solution)
}
