#![doc = include_str!("../README.md")]

pub mod caustics;
pub use caustics::{Caustics, StandardParameters, UniformCausticSampling};

mod error;
pub use error::{CausticsError, ConfigurationError, FitError};

pub mod fit;
pub use fit::{
    chi2_gradient, Dataset, Event, FitParameter, FluxFitter, FluxSolution, MicrolensModel,
    PointSourcePointLens,
};

mod float_trait;
pub use float_trait::Float;

mod inflections;
pub use inflections::inflection_indices;

mod lens;
pub use lens::{LensConfiguration, MassRatioInput, Topology};

pub use ndarray;

mod roots;
pub use roots::polynomial_roots;

mod summation;
pub use summation::{compensated_sum, complex_compensated_sum, SumMode};

mod types;
pub use types::{ArrayRef1, CowArray1};
