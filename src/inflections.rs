use crate::float_trait::Float;
use crate::types::ArrayRef1;

use itertools::Itertools;

/// Find inflection points of a tabulated cumulative function
///
/// Returns the indices where the discrete derivative has a local minimum; for a
/// cumulative arc-length table these are the caustic cusps, where the boundary speed
/// |dζ/dφ| drops to its local minimum. The first-difference sequence is padded with its
/// two trailing values so that a minimum at the very beginning of a cyclic table is
/// still detected.
pub fn inflection_indices<T>(values: &ArrayRef1<T>) -> Vec<usize>
where
    T: Float,
{
    let n = values.len();
    if n < 4 {
        return vec![];
    }
    let first_diff: Vec<T> = values
        .iter()
        .tuple_windows()
        .map(|(&a, &b)| b - a)
        .collect();
    let mut diff = Vec::with_capacity(n + 1);
    diff.push(first_diff[n - 3]);
    diff.push(first_diff[n - 2]);
    diff.extend_from_slice(&first_diff);

    (1..diff.len() - 1)
        .filter(|&i| diff[i - 1] > diff[i] && diff[i + 1] > diff[i])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! inflection_indices {
        ($name: ident, $desired: expr, $values: expr $(,)?) => {
            #[test]
            fn $name() {
                let arr = ndarray::arr1(&$values);
                assert_eq!(inflection_indices(&arr), $desired);
            }
        };
    }

    inflection_indices!(too_short, [] as [usize; 0], [0.0_f64, 1.0, 2.0]);

    inflection_indices!(
        linear_has_no_inflections,
        [] as [usize; 0],
        (0..64).map(|i| i as f64).collect::<Vec<_>>(),
    );

    inflection_indices!(
        single_speed_minimum,
        // speed minimum at index 32, shifted by the two-sample padding
        [34_usize],
        // cumulative sum of a speed with a single dip at the middle
        {
            let speed: Vec<f64> = (0..64)
                .map(|i| 1.0 + ((i as f64 - 32.0) / 16.0).powi(2))
                .collect();
            let mut cumulative = vec![0.0];
            for v in speed {
                cumulative.push(cumulative.last().unwrap() + v);
            }
            cumulative
        },
    );

    #[test]
    fn cusps_of_cyclic_speed() {
        // |cos| - like speed has minima at the quarter points of the cycle
        let n = 400_usize;
        let speed: Vec<f64> = (0..n)
            .map(|i| {
                let phase = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
                0.1 + phase.cos().abs()
            })
            .collect();
        let mut cumulative = vec![0.0_f64];
        for v in speed {
            cumulative.push(cumulative.last().unwrap() + v);
        }
        let arr = ndarray::arr1(&cumulative);
        let indices = inflection_indices(&arr);
        assert_eq!(indices.len(), 2);
        // minima of |cos(2 pi i / n)| are near i = n/4 and i = 3n/4
        assert!((indices[0] as i64 - (n as i64) / 4).abs() <= 2);
        assert!((indices[1] as i64 - 3 * (n as i64) / 4).abs() <= 2);
    }
}
