/// FrameOrchestrator - ring of frame contexts and the serial counter
///
/// Every submitted frame receives a strictly increasing serial, starting at
/// 1. Before a slot is reused its previous serial must have completed, which
/// bounds the CPU to `frames_in_flight` frames ahead of the GPU.

use std::time::{Duration, Instant};

use crate::error::{DeviceError, Error, Result, StateError};
use crate::gpu::GraphicsDevice;
use crate::{rafx_debug, rafx_error, rafx_trace};

const SOURCE: &str = "rafx::frame";

/// Lifecycle of one frame context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Acquired,
    Recording,
    Submitted,
    Presented,
}

/// One slot of the frames-in-flight ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameContext {
    pub index: usize,
    /// Serial of the last frame submitted from this slot (0 = never)
    pub submitted_serial: u64,
    pub state: FrameState,
    pub image_index: u32,
}

/// Identity of the frame being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTicket {
    pub serial: u64,
    pub frame_index: usize,
    pub image_index: u32,
}

pub struct FrameOrchestrator {
    frames: Vec<FrameContext>,
    current: usize,
    next_serial: u64,
    active: Option<FrameTicket>,
    timeout: Duration,
    last_frame: Option<Instant>,
    delta_time: f32,
}

impl FrameOrchestrator {
    /// Ring of `frames_in_flight` contexts. `timeout` bounds the wait for a slot.
    pub fn new(frames_in_flight: usize, timeout: Duration) -> Self {
        let frames = (0..frames_in_flight)
            .map(|index| FrameContext {
                index,
                submitted_serial: 0,
                state: FrameState::Idle,
                image_index: 0,
            })
            .collect();
        Self {
            frames,
            current: 0,
            next_serial: 1,
            active: None,
            timeout,
            last_frame: None,
            delta_time: 0.0,
        }
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    /// Frame being recorded, if any
    pub fn active(&self) -> Option<FrameTicket> {
        self.active
    }

    /// Serial the next frame will receive
    pub fn next_serial(&self) -> u64 {
        self.next_serial
    }

    /// Serial of the last submitted frame (0 before the first submit)
    pub fn last_submitted_serial(&self) -> u64 {
        self.next_serial - 1
    }

    pub fn frame(&self, index: usize) -> Option<&FrameContext> {
        self.frames.get(index)
    }

    /// State of the slot the next (or current) frame uses
    pub fn current_state(&self) -> FrameState {
        self.frames[self.current].state
    }

    /// Seconds between the two last `begin_frame` calls
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Wait until the next slot is free and measure the frame delta
    ///
    /// Returns the device's completed serial so the caller can reclaim
    /// retired resources before acquiring.
    ///
    /// # Errors
    ///
    /// - `FrameAlreadyActive` when the previous frame was not ended
    /// - `DeviceLost` when the slot does not free up within the timeout
    pub fn wait_for_slot<D: GraphicsDevice>(&mut self, device: &mut D) -> Result<u64> {
        if self.active.is_some() {
            return Err(StateError::FrameAlreadyActive.into());
        }

        let slot = self.current;
        let pending = self.frames[slot].submitted_serial;
        if pending > 0 && !device.wait_for_serial(pending, self.timeout)? {
            rafx_error!(
                SOURCE,
                "Frame slot {} still busy with serial {} after {:?}",
                slot,
                pending,
                self.timeout
            );
            return Err(DeviceError::DeviceLost(format!(
                "frame serial {} did not complete within {:?}",
                pending, self.timeout
            ))
            .into());
        }
        let completed = device.completed_serial()?;
        self.frames[slot].state = FrameState::Idle;

        let now = Instant::now();
        self.delta_time = self
            .last_frame
            .map(|last| now.duration_since(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last_frame = Some(now);
        Ok(completed)
    }

    /// Acquire a swapchain image for the free slot and open the frame
    ///
    /// # Errors
    ///
    /// `SwapchainOutOfDate` from image acquisition; the slot stays idle.
    pub fn acquire<D: GraphicsDevice>(&mut self, device: &mut D) -> Result<FrameTicket> {
        if self.active.is_some() {
            return Err(StateError::FrameAlreadyActive.into());
        }
        let slot = self.current;
        let image_index = match device.acquire_next_image(slot) {
            Ok(index) => index,
            Err(e) => {
                self.frames[slot].state = FrameState::Idle;
                if matches!(e, Error::Device(DeviceError::SwapchainOutOfDate)) {
                    rafx_debug!(SOURCE, "Swapchain out of date at acquire");
                }
                return Err(e);
            }
        };

        let frame = &mut self.frames[slot];
        frame.state = FrameState::Acquired;
        frame.image_index = image_index;

        let ticket = FrameTicket {
            serial: self.next_serial,
            frame_index: slot,
            image_index,
        };
        self.active = Some(ticket);
        rafx_trace!(SOURCE, "Begin frame {} (slot {}, image {})", ticket.serial, slot, image_index);
        Ok(ticket)
    }

    /// Record that commands are being recorded for the active frame
    pub fn mark_recording(&mut self) {
        if let Some(ticket) = self.active {
            self.frames[ticket.frame_index].state = FrameState::Recording;
        }
    }

    /// Record that the active frame was handed to the device
    pub fn mark_submitted(&mut self) -> Result<FrameTicket> {
        let ticket = self.active.take().ok_or(StateError::NoActiveFrame)?;
        let frame = &mut self.frames[ticket.frame_index];
        frame.submitted_serial = ticket.serial;
        frame.state = FrameState::Submitted;
        self.next_serial += 1;
        self.current = (self.current + 1) % self.frames.len();
        Ok(ticket)
    }

    /// Drop the active frame without consuming its serial (failed submit)
    pub fn abandon(&mut self) {
        if let Some(ticket) = self.active.take() {
            self.frames[ticket.frame_index].state = FrameState::Idle;
        }
    }

    /// Record that the frame of `ticket` was presented
    pub fn mark_presented(&mut self, ticket: FrameTicket) {
        if let Some(frame) = self.frames.get_mut(ticket.frame_index) {
            if frame.submitted_serial == ticket.serial {
                frame.state = FrameState::Presented;
            }
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
