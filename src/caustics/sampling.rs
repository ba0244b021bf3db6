use crate::error::CausticsError;
use crate::float_trait::Float;
use crate::inflections::inflection_indices;
use crate::lens::{LensConfiguration, Topology};
use crate::roots::polynomial_roots;
use crate::summation::complex_compensated_sum;

use conv::prelude::*;
use itertools::Itertools;
use ndarray::Array1;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

/// Standard binary-lens trajectory parameters
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct StandardParameters<T: Float> {
    /// Time of the closest approach to the coordinate origin
    pub t_0: T,
    /// Impact parameter, signed
    pub u_0: T,
    /// Einstein crossing time
    pub t_e: T,
    /// Trajectory angle in degrees, normalized to [0, 360)
    pub alpha: T,
}

/// Cumulative arc length along one caustic branch together with the critical-curve
/// points that produced it
struct ArcLengthTable<T: Float> {
    cumulative: Vec<T>,
    z: Vec<Complex<T>>,
}

impl<T: Float> ArcLengthTable<T> {
    fn with_capacity(n: usize) -> Self {
        Self {
            cumulative: Vec::with_capacity(n),
            z: Vec::with_capacity(n),
        }
    }

    fn total(&self) -> T {
        *self.cumulative.last().unwrap()
    }
}

/// Uniform curvilinear parameterization of binary-lens caustics
///
/// Implements the Cassan (2008) caustic-boundary parameterization: every point of every
/// caustic of the lens corresponds to a single coordinate in [0, 1], sub-caustics are
/// assigned sub-ranges proportional to their arc length. Construction integrates the
/// caustic boundary once; the forward ([Self::caustic_point]) and inverse
/// ([Self::get_standard_parameters]) mappings are then cheap interpolation queries.
///
/// Construction takes some time for large `n_points` and is the place where all
/// root-branch bookkeeping happens; queries never fail with
/// [CausticsError::NumericalInstability].
pub struct UniformCausticSampling<T: Float> {
    config: LensConfiguration<T>,
    topology: Topology,
    n_points: usize,
    phi: Vec<T>,
    central: ArcLengthTable<T>,
    planetary: Option<ArcLengthTable<T>>,
    partition: Vec<T>,
    cusp_fractions: [Vec<T>; 2],
}

impl<T: Float> UniformCausticSampling<T> {
    /// Build the parameterization for a given lens
    ///
    /// `n_points` is the number of angle samples used for the arc-length integration;
    /// it controls both the accuracy of the parameterization and the construction time.
    pub fn new(config: LensConfiguration<T>, n_points: usize) -> Result<Self, CausticsError> {
        assert!(n_points >= 16, "n_points is too small for integration");
        let topology = config.topology();
        let q = config.q();
        let s = config.s();

        // The resonant curve needs two turns of phi to close.
        let full_range = match topology {
            Topology::Resonant => T::four() * T::PI(),
            _ => T::two() * T::PI(),
        };
        let d_phi = full_range / n_points.approx_as::<T>().unwrap();

        let mut phi_grid = Vec::with_capacity(n_points);
        let mut central = ArcLengthTable::with_capacity(n_points);
        let mut planetary = match topology {
            Topology::Resonant => None,
            _ => Some(ArcLengthTable::with_capacity(n_points)),
        };

        let mut tracks: [Complex<T>; 4] = [Complex::new(T::zero(), T::zero()); 4];
        for i in 0..n_points {
            let phi = d_phi * i.approx_as::<T>().unwrap();
            let eiphi = Complex::from_polar(T::one(), phi);
            let roots = polynomial_roots(&critical_curve_coefficients(q, s, eiphi));
            tracks = if i == 0 {
                seed_branches(&roots, topology, s).ok_or_else(|| {
                    CausticsError::NumericalInstability {
                        phi: phi.as_f64(),
                        q: q.as_f64(),
                        s: s.as_f64(),
                    }
                })?
            } else {
                match_to_previous(&tracks, &roots)
            };

            let central_z = tracks[0];
            let planetary_z = match topology {
                Topology::Resonant => None,
                Topology::Wide => Some(tracks[2]),
                Topology::Close => {
                    // The off-axis roots must straddle the real axis; the positive
                    // side is caustic 2, its conjugate mirror is caustic 3.
                    let upper = branch_sign(tracks[2]);
                    let lower = branch_sign(tracks[3]);
                    if upper * lower >= T::zero() {
                        return Err(CausticsError::NumericalInstability {
                            phi: phi.as_f64(),
                            q: q.as_f64(),
                            s: s.as_f64(),
                        });
                    }
                    Some(if upper > T::zero() {
                        tracks[2]
                    } else {
                        tracks[3]
                    })
                }
            };

            if i == 0 {
                central.cumulative.push(T::zero());
            } else {
                let step = dzeta_dphi(q, s, central_z, phi).norm() * d_phi;
                central.cumulative.push(central.total() + step);
            }
            central.z.push(central_z);
            if let (Some(table), Some(z)) = (planetary.as_mut(), planetary_z) {
                if i == 0 {
                    table.cumulative.push(T::zero());
                } else {
                    let step = dzeta_dphi(q, s, z, phi).norm() * d_phi;
                    table.cumulative.push(table.total() + step);
                }
                table.z.push(z);
            }
            phi_grid.push(phi);
        }

        let n_points_float = n_points.approx_as::<T>().unwrap();
        let fraction_of = |indices: Vec<usize>| -> Vec<T> {
            indices
                .into_iter()
                .map(|i| i.approx_as::<T>().unwrap() / n_points_float)
                .collect()
        };
        // TODO: for close configurations the planetary branch starts mid-arc, so its
        // first inflection fraction is offset from zero; rolling the arc-length table
        // to put a cusp at the origin would align it.
        let central_cusps = fraction_of(inflection_indices(&Array1::from(
            central.cumulative.clone(),
        )));
        let planetary_cusps = planetary
            .as_ref()
            .map(|table| fraction_of(inflection_indices(&Array1::from(table.cumulative.clone()))))
            .unwrap_or_default();

        // The central branch (and the planetary one in the wide case) covers only one
        // of the two mirror-symmetric halves of its boundary, hence the doubling.
        let lengths = match topology {
            Topology::Resonant => vec![T::two() * central.total()],
            Topology::Wide => vec![
                T::two() * central.total(),
                T::two() * planetary.as_ref().unwrap().total(),
            ],
            Topology::Close => {
                let planetary_total = planetary.as_ref().unwrap().total();
                vec![T::two() * central.total(), planetary_total, planetary_total]
            }
        };
        let total: T = lengths.iter().copied().sum();
        let mut partition = Vec::with_capacity(lengths.len() + 1);
        partition.push(T::zero());
        let mut running = T::zero();
        for &length in &lengths {
            running += length;
            partition.push(running / total);
        }
        *partition.last_mut().unwrap() = T::one();

        Ok(Self {
            config,
            topology,
            n_points,
            phi: phi_grid,
            central,
            planetary,
            partition,
            cusp_fractions: [central_cusps, planetary_cusps],
        })
    }

    pub fn config(&self) -> &LensConfiguration<T> {
        &self.config
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn n_caustics(&self) -> usize {
        self.topology.n_caustics()
    }

    pub fn n_points(&self) -> usize {
        self.n_points
    }

    /// Curvilinear-coordinate boundaries between caustics: strictly increasing,
    /// starting at 0 and ending at 1, one sub-range per caustic
    pub fn partition(&self) -> &[T] {
        &self.partition
    }

    /// Curvilinear fractions of the cusp (inflection) points of the given caustic
    ///
    /// Available for the central caustic and the (upper) planetary one; the lower
    /// planetary caustic of the close topology is a mirror image of the upper.
    pub fn cusp_fractions(&self, caustic: usize) -> Option<&[T]> {
        match caustic {
            1 => Some(&self.cusp_fractions[0]),
            2 if self.topology != Topology::Resonant => Some(&self.cusp_fractions[1]),
            _ => None,
        }
    }

    /// Which caustic the given curvilinear coordinate lies on
    ///
    /// `1` is the central caustic, `2` the planetary one (the upper of the two for the
    /// close topology), `3` the lower planetary caustic.
    pub fn which_caustic(&self, x_caustic: T) -> Result<usize, CausticsError> {
        if !(x_caustic >= T::zero() && x_caustic <= T::one()) {
            return Err(CausticsError::OutOfRange(x_caustic.as_f64()));
        }
        if self.topology == Topology::Resonant {
            return Ok(1);
        }
        let inner = &self.partition[1..self.partition.len() - 1];
        Ok(inner.iter().take_while(|&&boundary| boundary < x_caustic).count() + 1)
    }

    /// Caustic position corresponding to the given curvilinear coordinate
    pub fn caustic_point(&self, x_caustic: T) -> Result<Complex<T>, CausticsError> {
        let caustic = self.which_caustic(x_caustic)?;
        let low = self.partition[caustic - 1];
        let high = self.partition[caustic];

        // Mirror-symmetric boundaries are stored as a half-curve: normalize around the
        // sub-range midpoint and conjugate the reflected half. The off-axis caustics of
        // the close topology are stored whole.
        let (fraction, flip) = if self.topology != Topology::Close || caustic == 1 {
            let middle = (low + high) * T::half();
            if x_caustic < middle {
                ((x_caustic - low) / (middle - low), false)
            } else {
                ((high - x_caustic) / (high - middle), true)
            }
        } else {
            ((x_caustic - low) / (high - low), false)
        };

        let table = if caustic == 1 {
            &self.central
        } else {
            self.planetary.as_ref().unwrap()
        };
        let target = fraction * table.total();
        let phi = interp(&table.cumulative, &self.phi, target);
        let z = interp_complex(&self.phi, &table.z, phi);
        let mut zeta = lens_equation(self.config.q(), self.config.s(), z);
        if flip || caustic == 3 {
            zeta = zeta.conj();
        }
        Ok(zeta)
    }

    /// Standard binary-lens parameters (t_0, u_0, t_E, alpha) of the straight-line
    /// trajectory entering the caustic at (`x_caustic_in`, `t_caustic_in`) and leaving
    /// it at (`x_caustic_out`, `t_caustic_out`)
    ///
    /// Both curvilinear coordinates must lie on the same caustic. This function fails
    /// with [CausticsError::NoRealTrajectory] for inputs that do not correspond to a
    /// real trajectory, which is common in bulk sampling and must be expected by the
    /// caller.
    pub fn get_standard_parameters(
        &self,
        x_caustic_in: T,
        x_caustic_out: T,
        t_caustic_in: T,
        t_caustic_out: T,
    ) -> Result<StandardParameters<T>, CausticsError> {
        let caustic_in = self.which_caustic(x_caustic_in)?;
        let caustic_out = self.which_caustic(x_caustic_out)?;
        if caustic_in != caustic_out {
            return Err(CausticsError::InconsistentCaustics {
                x_in: x_caustic_in.as_f64(),
                x_out: x_caustic_out.as_f64(),
                caustic_in,
                caustic_out,
            });
        }
        if !(t_caustic_out > t_caustic_in) {
            return Err(CausticsError::NoRealTrajectory);
        }
        let zeta_in = self.caustic_point(x_caustic_in)?;
        let zeta_out = self.caustic_point(x_caustic_out)?;
        let chord = zeta_out - zeta_in;
        let chord_norm = chord.norm();
        if chord_norm < T::epsilon().sqrt() {
            return Err(CausticsError::NoRealTrajectory);
        }

        let u_0 = (zeta_out.re * zeta_in.im - zeta_out.im * zeta_in.re) / chord_norm;
        let mut alpha = chord.im.atan2(chord.re).to_degrees();
        let full_turn = 360.0_f64.approx_as::<T>().unwrap();
        if alpha < T::zero() {
            alpha += full_turn;
        }
        let t_e = (t_caustic_out - t_caustic_in) / chord_norm;
        let t_0 = ((zeta_out + zeta_in) / chord).re
            * T::half()
            * (t_caustic_in - t_caustic_out)
            + T::half() * (t_caustic_in + t_caustic_out);

        Ok(StandardParameters {
            t_0,
            u_0,
            t_e,
            alpha,
        })
    }
}

/// Coefficients of the critical-curve polynomial, low-to-high (Eq. 6, Cassan 2008)
///
/// Primary mass at the origin, secondary at -s; this is the frame the arc-length
/// derivative (Eq. 9 and 11) is written in.
fn critical_curve_coefficients<T: Float>(q: T, s: T, eiphi: Complex<T>) -> [Complex<T>; 5] {
    let one_plus_q = T::one() + q;
    [
        -eiphi * (s * s / one_plus_q),
        -eiphi * (T::two() * s / one_plus_q),
        complex_compensated_sum([Complex::new(s * s, T::zero()), -eiphi]),
        Complex::new(T::two() * s, T::zero()),
        Complex::new(T::one(), T::zero()),
    ]
}

/// Lens equation in complex coordinates, shifted to the center-of-mass frame
fn lens_equation<T: Float>(q: T, s: T, z: Complex<T>) -> Complex<T> {
    let z_bar = z.conj();
    let one = Complex::new(T::one(), T::zero());
    let zeta = -z + (one / z_bar + (z_bar + s).inv() * q) / (T::one() + q);
    zeta - s * q / (T::one() + q)
}

/// dz/dphi along the critical curve (Eq. 11, Cassan 2008)
fn dz_dphi<T: Float>(q: T, s: T, z: Complex<T>) -> Complex<T> {
    let z_plus_d = z + s;
    let z_plus_d_2 = z_plus_d * z_plus_d;
    let z_plus_d_3 = z_plus_d_2 * z_plus_d;
    let q_z_2 = z * z * q;
    let value = (z_plus_d_2 + q_z_2) * z_plus_d * z / (z_plus_d_3 + z * q_z_2);
    value * Complex::new(T::zero(), T::half())
}

/// dzeta/dphi along the caustic (Eq. 9 and 11, Cassan 2008)
fn dzeta_dphi<T: Float>(q: T, s: T, z: Complex<T>, phi: T) -> Complex<T> {
    dz_dphi(q, s, z) - Complex::from_polar(T::one(), phi) * dz_dphi(q, s, z.conj())
}

/// Sign discriminator of the off-axis critical-curve branches: Im(1/conj(z) - z)
fn branch_sign<T: Float>(z: Complex<T>) -> T {
    let one = Complex::new(T::one(), T::zero());
    (one / z.conj() - z).im
}

/// Assign the four roots at phi = 0 to labeled branches
///
/// Branch 0 is integrated as the central caustic; branch 2 (and 3 for the close
/// topology) holds the planetary boundary. Returns `None` when the roots do not show
/// the structure the topology guarantees.
fn seed_branches<T: Float>(
    roots: &[Complex<T>],
    topology: Topology,
    s: T,
) -> Option<[Complex<T>; 4]> {
    if roots.len() != 4 {
        return None;
    }
    let sorted_deterministic = |mut group: Vec<Complex<T>>| {
        group.sort_by(|a, b| {
            (b.re, b.im)
                .partial_cmp(&(a.re, a.im))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        group
    };
    match topology {
        Topology::Wide => {
            // two roots around each lens
            let (central, planetary): (Vec<_>, Vec<_>) = roots
                .iter()
                .copied()
                .partition(|&z| z.norm() <= (z + s).norm());
            if central.len() != 2 || planetary.len() != 2 {
                return None;
            }
            let central = sorted_deterministic(central);
            let planetary = sorted_deterministic(planetary);
            Some([central[0], central[1], planetary[0], planetary[1]])
        }
        Topology::Close => {
            // two real roots on the central curve, an off-axis conjugate pair on the
            // planetary curves
            let mut by_im_magnitude = roots.to_vec();
            by_im_magnitude.sort_by(|a, b| {
                a.im.abs()
                    .partial_cmp(&b.im.abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let central = sorted_deterministic(by_im_magnitude[..2].to_vec());
            let (upper, lower) = if by_im_magnitude[2].im > T::zero() {
                (by_im_magnitude[2], by_im_magnitude[3])
            } else {
                (by_im_magnitude[3], by_im_magnitude[2])
            };
            if !(upper.im > T::zero() && lower.im < T::zero()) {
                return None;
            }
            Some([central[0], central[1], upper, lower])
        }
        Topology::Resonant => {
            // all four roots lie on the single curve; start on a real one
            let mut by_im_magnitude = roots.to_vec();
            by_im_magnitude.sort_by(|a, b| {
                a.im.abs()
                    .partial_cmp(&b.im.abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            Some([
                by_im_magnitude[0],
                by_im_magnitude[1],
                by_im_magnitude[2],
                by_im_magnitude[3],
            ])
        }
    }
}

/// Re-label freshly solved roots to continue the branches from the previous angle
///
/// Chooses the assignment minimizing the total displacement over all permutations of
/// the four roots.
fn match_to_previous<T: Float>(previous: &[Complex<T>; 4], roots: &[Complex<T>]) -> [Complex<T>; 4] {
    let mut best: Option<(Vec<usize>, T)> = None;
    for permutation in (0..4).permutations(4) {
        let cost: T = permutation
            .iter()
            .enumerate()
            .map(|(track, &root)| (previous[track] - roots[root]).norm())
            .sum();
        if best.as_ref().is_none_or(|(_, best_cost)| cost < *best_cost) {
            best = Some((permutation, cost));
        }
    }
    let (permutation, _) = best.unwrap();
    [
        roots[permutation[0]],
        roots[permutation[1]],
        roots[permutation[2]],
        roots[permutation[3]],
    ]
}

/// Piecewise-linear interpolation with clamping, `xs` must be non-decreasing
fn interp<T: Float>(xs: &[T], ys: &[T], x: T) -> T {
    let i = xs.partition_point(|&v| v < x);
    if i == 0 {
        return ys[0];
    }
    if i == xs.len() {
        return ys[ys.len() - 1];
    }
    let (x0, x1) = (xs[i - 1], xs[i]);
    if x1 == x0 {
        return ys[i - 1];
    }
    let weight = (x - x0) / (x1 - x0);
    ys[i - 1] + (ys[i] - ys[i - 1]) * weight
}

fn interp_complex<T: Float>(xs: &[T], ys: &[Complex<T>], x: T) -> Complex<T> {
    let i = xs.partition_point(|&v| v < x);
    if i == 0 {
        return ys[0];
    }
    if i == xs.len() {
        return ys[ys.len() - 1];
    }
    let (x0, x1) = (xs[i - 1], xs[i]);
    if x1 == x0 {
        return ys[i - 1];
    }
    let weight = (x - x0) / (x1 - x0);
    ys[i - 1] + (ys[i] - ys[i - 1]) * weight
}
