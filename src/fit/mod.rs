//! Linear flux fitting and chi-square aggregation for microlensing light curves

mod dataset;
pub use dataset::Dataset;

mod model;
pub use model::{FitParameter, MicrolensModel, PointSourcePointLens};

mod flux;
pub use flux::{FluxFitter, FluxSolution};

mod gradient;
pub use gradient::chi2_gradient;

mod event;
pub use event::Event;
