pub mod convolver;
pub mod resampler;

pub use convolver::ConvolutionEngine;

use thiserror::Error;

/// Bad geometry handed to a DSP configure/load call. Fatal to that call
/// only; never raised from the real-time path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration: {0}")]
pub struct InvalidConfiguration(pub &'static str);

#[inline]
pub(crate) fn zap_denormal(x: f32) -> f32 {
    if x.abs() < 1.0e-30 { 0.0 } else { x }
}
