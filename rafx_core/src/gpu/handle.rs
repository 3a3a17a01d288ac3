/// Opaque resource handles
///
/// Handles are generational keys: a handle to a destroyed resource never
/// aliases a resource created later in the same slot.

use slotmap::new_key_type;

new_key_type! {
    /// Buffer handle issued by the resource registry
    pub struct BufferHandle;

    /// Texture handle issued by the resource registry
    pub struct TextureHandle;

    /// Shader module handle issued by the compiler bridge
    pub struct ShaderHandle;

    /// Pipeline handle issued by the compiler bridge
    pub struct PipelineHandle;
}
