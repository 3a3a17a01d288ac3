/// GPU module - backend-agnostic resource descriptions, commands and the device contract

// Module declarations
pub mod handle;
pub mod format;
pub mod state;
pub mod buffer;
pub mod texture;
pub mod shader;
pub mod pipeline;
pub mod command;
pub mod graphics_device;

// Re-export everything
pub use handle::*;
pub use format::*;
pub use state::*;
pub use buffer::*;
pub use texture::*;
pub use shader::*;
pub use pipeline::*;
pub use command::*;
pub use graphics_device::*;
