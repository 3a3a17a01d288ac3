/// Headless module - a GPU-less `GraphicsDevice` and `ShaderCompiler`
///
/// Used by the test suites and by tools that need the full recording and
/// lifetime contract without a window or a driver.

pub mod headless_device;
pub mod headless_compiler;

pub use headless_device::{
    CompletionMode, HeadlessBuffer, HeadlessConfig, HeadlessDevice, HeadlessEvent,
    HeadlessPipeline, HeadlessShaderModule, HeadlessTexture, SubmittedFrame,
};
pub use headless_compiler::HeadlessCompiler;
