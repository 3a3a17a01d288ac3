/// Command module - state tracking, recording and the public command list

pub mod state_tracker;
pub mod recorder;
pub mod command_list;

pub use state_tracker::StateTracker;
pub use recorder::{CommandRecorder, FinishedRecording};
pub use command_list::CommandList;
