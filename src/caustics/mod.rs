//! Binary-lens caustic structures
//!
//! [Caustics] gives the point-cloud geometry of the critical curve and caustic of a
//! given lens; [UniformCausticSampling] builds the curvilinear parameterization of the
//! caustic boundary and converts caustic-crossing coordinates into standard trajectory
//! parameters.

mod geometry;
pub use geometry::Caustics;

mod sampling;
pub use sampling::{StandardParameters, UniformCausticSampling};
