/// Error returned from [crate::LensConfiguration] construction
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigurationError {
    #[error("expected exactly one mass ratio, got {0}; only 2-body lenses are supported")]
    WrongNumberOfMassRatios(usize),

    #[error("mass ratio must be in (0, 1], got {0}")]
    MassRatioOutOfRange(f64),

    #[error("lens separation must be positive, got {0}")]
    NonPositiveSeparation(f64),
}

/// Error returned from caustic geometry and curvilinear sampling
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CausticsError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("curvilinear coordinate {0} is outside the [0, 1] range")]
    OutOfRange(f64),

    #[error(
        "caustic entrance x = {x_in} lies on caustic {caustic_in} while \
         exit x = {x_out} lies on caustic {caustic_out}"
    )]
    InconsistentCaustics {
        x_in: f64,
        x_out: f64,
        caustic_in: usize,
        caustic_out: usize,
    },

    #[error("curvilinear parameters do not correspond to a real source trajectory")]
    NoRealTrajectory,

    #[error("root-branch sign invariant violated at phi = {phi} for q = {q}, s = {s}")]
    NumericalInstability { phi: f64, q: f64, s: f64 },
}

/// Error returned from flux fitting and chi-square gradients
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FitError {
    #[error("chi2 gradient is not supported for parameter \"{0}\"")]
    UnsupportedParameter(String),

    #[error(
        "operation supports single-lens single-source models only, \
         got {n_lenses} lenses and {n_sources} sources"
    )]
    UnsupportedModel { n_lenses: usize, n_sources: usize },

    #[error("source flux ratio can be fixed for exactly two sources, got {0}")]
    WrongNumberOfSources(usize),

    #[error("flux regression is degenerate: {0}")]
    SingularSystem(&'static str),
}
