/// Frame module - frames in flight, serials and pacing

pub mod orchestrator;

pub use orchestrator::{FrameContext, FrameOrchestrator, FrameState, FrameTicket};
