use crate::error::ConfigurationError;
use crate::float_trait::Float;

use serde::{Deserialize, Serialize};

/// Mass-ratio argument accepted by [LensConfiguration::new]
///
/// Callers holding a collection of ratios (e.g. parsed from a table row) pass it as-is;
/// the variant is resolved exactly once at construction. Anything but a single ratio is
/// a configuration error, since only 2-body lenses are supported.
#[derive(Clone, Debug, PartialEq)]
pub enum MassRatioInput<T: Float> {
    Single(T),
    Many(Vec<T>),
}

impl<T: Float> MassRatioInput<T> {
    fn into_single(self) -> Result<T, ConfigurationError> {
        match self {
            Self::Single(q) => Ok(q),
            Self::Many(ratios) if ratios.len() == 1 => Ok(ratios[0]),
            Self::Many(ratios) => Err(ConfigurationError::WrongNumberOfMassRatios(ratios.len())),
        }
    }
}

impl<T: Float> From<T> for MassRatioInput<T> {
    fn from(q: T) -> Self {
        Self::Single(q)
    }
}

impl<T: Float> From<Vec<T>> for MassRatioInput<T> {
    fn from(ratios: Vec<T>) -> Self {
        Self::Many(ratios)
    }
}

impl<T: Float> From<&[T]> for MassRatioInput<T> {
    fn from(ratios: &[T]) -> Self {
        Self::Many(ratios.to_vec())
    }
}

/// Qualitative caustic structure regime of a binary lens
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    /// Central caustic plus two off-axis planetary caustics
    Close,
    /// Single caustic
    Resonant,
    /// Central and planetary caustics
    Wide,
}

impl Topology {
    /// Closed-form classification from mass ratio and separation
    pub fn for_lens<T: Float>(q: T, s: T) -> Self {
        let limit = (T::one() + q) / (T::one() + q.cbrt()).powi(3);
        if s > limit.sqrt().recip() {
            Self::Wide
        } else if s < limit.sqrt().sqrt() {
            Self::Close
        } else {
            Self::Resonant
        }
    }

    pub fn n_caustics(self) -> usize {
        match self {
            Self::Close => 3,
            Self::Resonant => 1,
            Self::Wide => 2,
        }
    }
}

/// Binary lens parameters: mass ratio and separation
///
/// `q` is the mass ratio of the two bodies, `q <= 1`; `s` is their separation as a
/// fraction of the Einstein ring radius. Immutable once constructed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct LensConfiguration<T: Float> {
    q: T,
    s: T,
}

impl<T: Float> LensConfiguration<T> {
    pub fn new(q: impl Into<MassRatioInput<T>>, s: T) -> Result<Self, ConfigurationError> {
        let q = q.into().into_single()?;
        if !(q > T::zero() && q <= T::one()) {
            return Err(ConfigurationError::MassRatioOutOfRange(q.as_f64()));
        }
        if !(s > T::zero()) {
            return Err(ConfigurationError::NonPositiveSeparation(s.as_f64()));
        }
        Ok(Self { q, s })
    }

    pub fn q(&self) -> T {
        self.q
    }

    pub fn s(&self) -> T {
        self.s
    }

    /// Distance between the primary mass and the center of mass
    pub fn center_of_mass_offset(&self) -> T {
        self.q * self.s / (T::one() + self.q)
    }

    pub fn topology(&self) -> Topology {
        Topology::for_lens(self.q, self.s)
    }
}
