/*!
# rafx

Backend-agnostic core of the rafx GPU command and resource abstraction.

A caller describes resources, compiles shaders once, builds pipelines from
descriptions, and records each frame as a linear sequence of commands. The
core validates every command, inserts the synchronization the device needs,
paces frames in flight and defers destruction until the GPU is done.

## Architecture

- **RenderContext**: owned root object, generic over the device
- **GraphicsDevice**: trait implemented by native backends (Vulkan, headless)
- **ResourceRegistry**: buffers and textures behind generational handles
- **PipelineCache**: shader modules and pipelines, cached by description
- **CommandList**: per-frame recording API with validation
- **FrameOrchestrator**: serials, frame slots and swapchain pacing
*/

// Internal modules
mod error;
mod context;
pub mod log;
pub mod utils;
pub mod gpu;
pub mod resource;
pub mod compiler;
pub mod command;
pub mod frame;
pub mod headless;
pub mod shadow;

// Main rafx namespace module
pub mod rafx {
    // Error types
    pub use crate::error::{
        CompileError, DeviceError, Error, HandleKind, ResourceError, Result, SourceLocation,
        StateError,
    };

    // Context
    pub use crate::context::{ContextConfig, RenderContext};
    pub use crate::command::CommandList;
    pub use crate::frame::FrameState;

    // GPU types and the device contract
    pub use crate::gpu::*;

    // Logging sub-module (types and sink control; macros live at the crate root)
    pub mod log {
        pub use crate::log::{
            min_severity, reset_logger, set_logger, set_min_severity, DefaultLogger, LogEntry,
            LogSeverity, Logger,
        };
    }

    // Headless device sub-module
    pub mod headless {
        pub use crate::headless::*;
    }

    // Shadow reference sub-module
    pub mod shadow {
        pub use crate::shadow::*;
    }
}

// Re-export math library at crate root
pub use glam;
