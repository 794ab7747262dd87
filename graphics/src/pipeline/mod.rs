//! Frame pipeline for managing multiple frames in flight.
//!
//! This module provides [`FramePipeline`], a ring of [`FrameExecutor`]s that
//! coordinates CPU-GPU synchronization across frames, enabling frame overlap
//! (the CPU prepares frame N+1 while the GPU renders frame N).
//!
//! # Rendering Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          FramePipeline                                  │
//! │  N frame executors used round-robin. Waits on a slot's fence before     │
//! │  handing its executor out again.                                        │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                          FrameExecutor                                  │
//! │  One command pool, command buffer and fence per slot. Destroys the     │
//! │  transient resources of the slot's previous frame.                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                           RenderGraph                                   │
//! │  Passes, resources and their dependencies. Compiled, recorded into an   │
//! │  executor, submitted and reset every frame.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Synchronization Model
//!
//! | Level | Primitive | Purpose |
//! |-------|-----------|---------|
//! | Pass → Pass | Barriers | Resource state transitions within a graph |
//! | Queue → Queue | `waits_on` | Advisory cross-queue plan |
//! | Frame → Frame | Fences | CPU-GPU sync across frames |
//!
//! # Frame Overlap (Pipelining)
//!
//! ```text
//! frames_in_flight = 2
//!
//! Slot 0: [Frame 0] ──► [Frame 2] ──► [Frame 4] ──►
//! Slot 1: [Frame 1] ──► [Frame 3] ──► [Frame 5] ──►
//! ```
//!
//! Resources retired by a frame are destroyed when its slot comes around
//! again, after the slot's fence has signaled.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ember_graphics::{DummyDevice, FramePipeline, GpuDevice, QueueType};
//!
//! let device = DummyDevice::new();
//! let queue = Arc::new(device.create_queue(QueueType::Graphics));
//! let device: Arc<dyn GpuDevice> = Arc::new(device);
//!
//! let mut pipeline = FramePipeline::new(&device, queue, 2).unwrap();
//! for _ in 0..4 {
//!     let executor = pipeline.begin_frame();
//!     executor.begin().unwrap();
//!     executor.end().unwrap();
//!     executor.submit().unwrap();
//!     pipeline.end_frame();
//! }
//! pipeline.wait_idle().unwrap();
//! assert_eq!(pipeline.total_frames(), 4);
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::backend::{GpuDevice, GpuQueue};
use crate::error::GraphError;
use crate::executor::FrameExecutor;

/// Manages multiple frames in flight for CPU-GPU parallelism.
///
/// The executor for a frame is `executors[total_frames % frames_in_flight]`.
///
/// # Thread Safety
///
/// `FramePipeline` is **not thread-safe**. It should be owned by a single
/// thread (typically the main/render thread).
pub struct FramePipeline {
    executors: Vec<FrameExecutor>,
    queue: Arc<dyn GpuQueue>,
    /// Frames ended so far.
    total_frames: u64,
}

impl FramePipeline {
    /// Frames in flight when the caller has no preference.
    pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 3;

    /// Create `frames_in_flight` executors, all recording for `queue`.
    pub fn new(
        device: &Arc<dyn GpuDevice>,
        queue: Arc<dyn GpuQueue>,
        frames_in_flight: usize,
    ) -> Result<Self, GraphError> {
        if frames_in_flight == 0 {
            return Err(GraphError::InvalidArguments(
                "frames_in_flight must be at least 1".into(),
            ));
        }
        let executors = (0..frames_in_flight)
            .map(|slot| {
                let mut executor = FrameExecutor::new(slot);
                executor.initialize(Arc::clone(&queue), device)?;
                Ok(executor)
            })
            .collect::<Result<Vec<_>, GraphError>>()?;
        log::debug!("Frame pipeline created with {frames_in_flight} frames in flight");
        Ok(Self {
            executors,
            queue,
            total_frames: 0,
        })
    }

    /// Wait for the current slot to become available and return its executor.
    ///
    /// Blocks if the GPU is still processing the slot's previous frame.
    pub fn begin_frame(&mut self) -> &mut FrameExecutor {
        let slot = self.current_slot();
        self.executors[slot].fence().wait();
        log::trace!("Begin frame {} (slot {})", self.total_frames, slot);
        &mut self.executors[slot]
    }

    /// Like [`begin_frame`](Self::begin_frame), but gives up after `timeout`.
    pub fn begin_frame_timeout(&mut self, timeout: Duration) -> Option<&mut FrameExecutor> {
        let slot = self.current_slot();
        if !self.executors[slot].fence().wait_timeout(timeout) {
            log::warn!("Frame slot {slot} still busy after {timeout:?}");
            return None;
        }
        Some(&mut self.executors[slot])
    }

    /// Advance to the next frame slot.
    pub fn end_frame(&mut self) {
        log::trace!(
            "End frame {} (slot {})",
            self.total_frames,
            self.current_slot()
        );
        self.total_frames += 1;
    }

    /// Block until every slot's submission has completed.
    pub fn wait_idle(&self) -> Result<(), GraphError> {
        self.queue.wait_idle()?;
        for executor in &self.executors {
            executor.fence().wait();
        }
        log::trace!("GPU idle");
        Ok(())
    }

    /// Like [`wait_idle`](Self::wait_idle), but gives up after `timeout` in total.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        self.executors.iter().all(|executor| {
            let remaining = timeout.saturating_sub(start.elapsed());
            executor.fence().wait_timeout(remaining)
        })
    }

    pub fn frames_in_flight(&self) -> usize {
        self.executors.len()
    }

    /// Slot of the frame being prepared.
    pub fn current_slot(&self) -> usize {
        (self.total_frames % self.executors.len() as u64) as usize
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn executor(&self, slot: usize) -> Option<&FrameExecutor> {
        self.executors.get(slot)
    }

    /// Whether a slot's last submission has completed. Out-of-range slots are
    /// never ready.
    pub fn is_slot_ready(&self, slot: usize) -> bool {
        self.executors
            .get(slot)
            .is_some_and(|executor| executor.fence().is_signaled())
    }

    pub fn is_idle(&self) -> bool {
        self.executors
            .iter()
            .all(|executor| executor.fence().is_signaled())
    }

    /// Wait for the GPU, then release every executor's pool and retired resources.
    pub fn finalize(&mut self) -> Result<(), GraphError> {
        self.wait_idle()?;
        for executor in &mut self.executors {
            executor.finalize();
        }
        Ok(())
    }
}

impl std::fmt::Debug for FramePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePipeline")
            .field("executors", &self.executors)
            .field("queue", &self.queue.queue_type())
            .field("total_frames", &self.total_frames)
            .finish()
    }
}
