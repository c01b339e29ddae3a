pub mod convergence;
pub mod extrema;
pub mod gaussian_smooth;
pub mod savgol;

pub use convergence::{
    check_convergence, convergence_search, convergence_search_batch, fit_trend,
    ConvergenceBuilder, ConvergenceCheck, ConvergenceError, ConvergenceInput, ConvergenceOutput,
    ConvergenceParams, ConvergenceSegment, TrendFit, TrendLine,
};
pub use extrema::{
    extrema, ExtremaBuilder, ExtremaError, ExtremaInput, ExtremaOutput, ExtremaParams,
    ExtremaTracker, LatestExtrema,
};
pub use gaussian_smooth::{
    gaussian_smooth, GaussianSmoothBuilder, GaussianSmoothError, GaussianSmoothInput,
    GaussianSmoothOutput, GaussianSmoothParams,
};
pub use savgol::{
    savgol, SavgolBuilder, SavgolError, SavgolInput, SavgolOutput, SavgolParams,
};
