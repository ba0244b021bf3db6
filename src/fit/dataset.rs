use crate::float_trait::Float;
use crate::types::{ArrayRef1, CowArray1};

use ndarray::Array1;

/// A single photometric dataset: epochs, fluxes and flux uncertainties
///
/// Arrays are either borrowed or owned, so a caller-held buffer can be fitted without
/// copying. The `bad` mask excludes points from chi-square aggregation and regression
/// while keeping them addressable; the `label` ties the dataset to flux-fixing rules of
/// an [crate::Event].
pub struct Dataset<'a, T>
where
    T: Float,
{
    label: String,
    times: CowArray1<'a, T>,
    flux: CowArray1<'a, T>,
    flux_err: CowArray1<'a, T>,
    bad: Array1<bool>,
}

impl<'a, T> Dataset<'a, T>
where
    T: Float,
{
    /// Construct a dataset, all points initially good
    ///
    /// Panics if the three arrays differ in length.
    pub fn new(
        label: impl Into<String>,
        times: impl Into<CowArray1<'a, T>>,
        flux: impl Into<CowArray1<'a, T>>,
        flux_err: impl Into<CowArray1<'a, T>>,
    ) -> Self {
        let times = times.into();
        let flux = flux.into();
        let flux_err = flux_err.into();
        assert_eq!(
            times.len(),
            flux.len(),
            "times and flux must have the same length"
        );
        assert_eq!(
            times.len(),
            flux_err.len(),
            "times and flux_err must have the same length"
        );
        let bad = Array1::from_elem(times.len(), false);
        Self {
            label: label.into(),
            times,
            flux,
            flux_err,
            bad,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn n_good(&self) -> usize {
        self.bad.iter().filter(|&&b| !b).count()
    }

    pub fn times(&self) -> &ArrayRef1<T> {
        &self.times
    }

    pub fn flux(&self) -> &ArrayRef1<T> {
        &self.flux
    }

    pub fn flux_err(&self) -> &ArrayRef1<T> {
        &self.flux_err
    }

    pub fn bad(&self) -> &Array1<bool> {
        &self.bad
    }

    pub fn set_bad(&mut self, index: usize, bad: bool) {
        self.bad[index] = bad;
    }

    /// Replace the whole mask, panics on length mismatch
    pub fn set_bad_mask(&mut self, bad: Array1<bool>) {
        assert_eq!(bad.len(), self.len(), "mask length mismatch");
        self.bad = bad;
    }

    /// Indices of points not marked bad
    pub fn good_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.bad
            .iter()
            .enumerate()
            .filter_map(|(i, &bad)| (!bad).then_some(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::arr1;

    #[test]
    fn mask_manipulation() {
        let mut dataset = Dataset::new(
            "ogle",
            arr1(&[1.0_f64, 2.0, 3.0]),
            arr1(&[10.0, 11.0, 12.0]),
            arr1(&[0.1, 0.1, 0.1]),
        );
        assert_eq!(dataset.label(), "ogle");
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.n_good(), 3);

        dataset.set_bad(1, true);
        assert_eq!(dataset.n_good(), 2);
        assert_eq!(dataset.good_indices().collect::<Vec<_>>(), [0, 2]);

        dataset.set_bad(1, false);
        assert_eq!(dataset.n_good(), 3);
    }

    #[test]
    fn borrowed_arrays_are_accepted() {
        let times = arr1(&[1.0_f64, 2.0]);
        let flux = arr1(&[5.0, 6.0]);
        let flux_err = arr1(&[0.5, 0.5]);
        let dataset = Dataset::new("moa", times.view(), flux.view(), flux_err.view());
        assert_eq!(dataset.times()[1], 2.0);
        assert_eq!(dataset.flux()[0], 5.0);
    }

    #[test]
    #[should_panic(expected = "same length")]
    fn length_mismatch_panics() {
        Dataset::new(
            "bad",
            arr1(&[1.0_f64, 2.0]),
            arr1(&[5.0]),
            arr1(&[0.5, 0.5]),
        );
    }
}
