/// CommandRecorder - validation state and command stream of one frame
///
/// Created at `begin_frame`, consumed at `end_frame`. The public recording
/// API lives on [`crate::command::CommandList`], which borrows the recorder
/// together with the registry and the pipeline cache.

use crate::compiler::PipelineInfo;
use crate::error::StateError;
use crate::gpu::{
    Command, IndexType, PipelineHandle, RenderTargetFormats, ResourceState, SyncModel,
    TextureAspect, TextureTarget,
};
use crate::command::StateTracker;

/// Render pass currently open
#[derive(Debug, Clone)]
pub(crate) struct ActivePass {
    pub formats: RenderTargetFormats,
}

/// Pipeline bound since the pass began
#[derive(Debug, Clone)]
pub(crate) struct BoundPipeline {
    pub handle: PipelineHandle,
    pub info: PipelineInfo,
}

/// Output of a finished recording, ready for submission
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedRecording {
    pub serial: u64,
    pub commands: Vec<Command>,
    /// State of every touched texture at the end of the stream
    pub final_states: Vec<(TextureTarget, ResourceState)>,
    /// Highest upload ticket referenced by the stream
    pub wait_transfer: Option<u64>,
}

pub struct CommandRecorder {
    serial: u64,
    commands: Vec<Command>,
    pub(crate) tracker: StateTracker,
    pub(crate) pass: Option<ActivePass>,
    pub(crate) pipeline: Option<BoundPipeline>,
    pub(crate) vertex_buffer_bound: bool,
    pub(crate) index_buffer: Option<IndexType>,
    event_depth: u32,
    wait_transfer: Option<u64>,
}

impl CommandRecorder {
    pub fn new(serial: u64, sync_model: SyncModel) -> Self {
        Self {
            serial,
            commands: Vec::new(),
            tracker: StateTracker::new(sync_model),
            pass: None,
            pipeline: None,
            vertex_buffer_bound: false,
            index_buffer: None,
            event_depth: 0,
            wait_transfer: None,
        }
    }

    /// Serial of the frame being recorded
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Commands recorded so far
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub(crate) fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Remember that the stream depends on an upload
    pub(crate) fn note_upload(&mut self, ticket: Option<u64>) {
        if let Some(ticket) = ticket {
            self.wait_transfer = Some(self.wait_transfer.map_or(ticket, |t| t.max(ticket)));
        }
    }

    pub(crate) fn begin_event(&mut self) {
        self.event_depth += 1;
    }

    pub(crate) fn end_event(&mut self) -> Result<(), StateError> {
        if self.event_depth == 0 {
            return Err(StateError::UnbalancedEvent);
        }
        self.event_depth -= 1;
        Ok(())
    }

    /// Open a pass and forget the bindings of the previous one
    pub(crate) fn open_pass(&mut self, pass: ActivePass) {
        self.pass = Some(pass);
        self.pipeline = None;
        self.vertex_buffer_bound = false;
        self.index_buffer = None;
    }

    pub(crate) fn close_pass(&mut self) -> Result<(), StateError> {
        if self.pass.take().is_none() {
            return Err(StateError::NoActivePass);
        }
        self.pipeline = None;
        self.vertex_buffer_bound = false;
        self.index_buffer = None;
        Ok(())
    }

    /// Close the stream
    ///
    /// On success the swapchain image is moved to `Present`. When a pass or an
    /// event scope is still open, the recorded commands are discarded and the
    /// returned recording only presents the image, so the frame can still be
    /// submitted; the error is returned alongside.
    pub fn finish(mut self) -> Result<FinishedRecording, (StateError, FinishedRecording)> {
        let error = if self.pass.is_some() {
            Some(StateError::PassStillActive)
        } else if self.event_depth > 0 {
            Some(StateError::UnbalancedEvent)
        } else {
            None
        };

        if let Some(error) = error {
            let mut tracker = StateTracker::new(self.tracker.sync_model());
            let commands = tracker
                .transition(TextureTarget::Swapchain, ResourceState::Undefined, ResourceState::Present, TextureAspect::Color)
                .into_iter()
                .collect();
            return Err((
                error,
                FinishedRecording {
                    serial: self.serial,
                    commands,
                    final_states: Vec::new(),
                    wait_transfer: None,
                },
            ));
        }

        if let Some(cmd) = self.tracker.transition(
            TextureTarget::Swapchain,
            ResourceState::Undefined,
            ResourceState::Present,
            TextureAspect::Color,
        ) {
            self.commands.push(cmd);
        }
        let final_states = self.tracker.final_states().collect();
        Ok(FinishedRecording {
            serial: self.serial,
            commands: self.commands,
            final_states,
            wait_transfer: self.wait_transfer,
        })
    }
}
