//! # extremata
//!
//! Streaming local-extrema tracking and convergence pattern search over
//! in-memory price series.
//!
//! The crate is organised as a set of indicator modules, each exposing the
//! same surface: a `Data`/`Params`/`Input`/`Output` family, a `thiserror`
//! error enum, a builder, and a top-level entry function.
//!
//! - [`indicators::savgol`] — Savitzky-Golay local-polynomial smoothing.
//! - [`indicators::gaussian_smooth`] — Gaussian kernel smoothing.
//! - [`indicators::extrema`] — one-shot extrema detection plus the stateful
//!   [`indicators::extrema::ExtremaTracker`] for incremental series.
//! - [`indicators::convergence`] — trend fitting and the backward
//!   sliding-window convergence search.

pub mod indicators;
pub mod utilities;
