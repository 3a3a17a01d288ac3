/// Resource module - lifetime and identity of buffers and textures

pub mod registry;

pub use registry::ResourceRegistry;
