pub mod params;
pub mod pipeline;
pub mod tube;

pub use params::{ParamChange, ParamId, ParameterSet};
pub use pipeline::{AmpPipeline, PipelineState, ProfileHandle};
