/// Compiler bridge - shader modules and the pipeline cache

pub mod pipeline_cache;

pub use pipeline_cache::{PipelineCache, PipelineCacheStats, PipelineInfo};
