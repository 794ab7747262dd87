//! Per-frame command recording state.
//!
//! A [`FrameExecutor`] owns one command pool and one primary command buffer
//! bound to a queue, plus the fence signaled when its last submission finishes.
//! [`FramePipeline`](crate::pipeline::FramePipeline) keeps N of them and hands
//! out slot `total_frames % N` each frame.
//!
//! # Slot reuse contract
//!
//! Before an executor is begun again, the GPU must have finished the work it
//! submitted last time. The executor does not wait on its own fence; the
//! caller does (the pipeline's `begin_frame` is the standard wait strategy).
//! Transient resources retired by a submission are destroyed when the slot is
//! next begun, at which point that guarantee holds.

mod sync;

pub use sync::{Fence, FenceStatus};

use std::any::Any;
use std::sync::Arc;

use crate::backend::{
    CommandEncoder, GpuCommandBuffer, GpuCommandPool, GpuDevice, GpuQueue, NativeResource,
};
use crate::error::GraphError;

/// Command pool, command buffer and fence for one frame slot.
pub struct FrameExecutor {
    slot: usize,
    /// Held until `finalize`.
    device: Option<Arc<dyn GpuDevice>>,
    queue: Option<Arc<dyn GpuQueue>>,
    pool: Option<GpuCommandPool>,
    command_buffer: Option<GpuCommandBuffer>,
    encoder: Option<Box<dyn CommandEncoder>>,
    fence: Fence,
    /// Destroyed on the next `begin`.
    retired: Vec<NativeResource>,
    user_context: Option<Box<dyn Any + Send>>,
    submissions: u64,
}

impl FrameExecutor {
    /// An uninitialized executor for the given slot.
    pub fn new(slot: usize) -> Self {
        Self {
            slot,
            device: None,
            queue: None,
            pool: None,
            command_buffer: None,
            encoder: None,
            fence: Fence::new_signaled(),
            retired: Vec::new(),
            user_context: None,
            submissions: 0,
        }
    }

    /// Acquire a command pool and a primary command buffer for `queue`.
    ///
    /// The executor keeps the device alive until [`finalize`](Self::finalize).
    pub fn initialize(
        &mut self,
        queue: Arc<dyn GpuQueue>,
        device: &Arc<dyn GpuDevice>,
    ) -> Result<(), GraphError> {
        if self.pool.is_some() {
            return Err(GraphError::InvalidState(format!(
                "frame executor {} is already initialized",
                self.slot
            )));
        }
        let pool = device.create_command_pool(queue.queue_type())?;
        let command_buffer = match device.allocate_command_buffer(pool) {
            Ok(command_buffer) => command_buffer,
            Err(err) => {
                device.destroy_command_pool(pool);
                return Err(err.into());
            }
        };
        log::debug!(
            "Frame executor {} initialized on {:?} queue",
            self.slot,
            queue.queue_type()
        );
        self.device = Some(Arc::clone(device));
        self.queue = Some(queue);
        self.pool = Some(pool);
        self.command_buffer = Some(command_buffer);
        Ok(())
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.is_some()
    }

    /// Whether commands are currently being recorded.
    pub fn is_recording(&self) -> bool {
        self.encoder.is_some()
    }

    /// Fence signaled when this slot's last submission completes.
    pub fn fence(&self) -> &Fence {
        &self.fence
    }

    /// Number of command buffers submitted from this slot.
    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    pub fn queue(&self) -> Option<&Arc<dyn GpuQueue>> {
        self.queue.as_ref()
    }

    /// Attach an application value visible to pass callbacks through
    /// [`RenderPassContext::user_context`](crate::graph::RenderPassContext::user_context).
    pub fn set_user_context<T: Any + Send>(&mut self, context: T) {
        self.user_context = Some(Box::new(context));
    }

    pub fn clear_user_context(&mut self) {
        self.user_context = None;
    }

    fn device_handle(&self) -> Result<Arc<dyn GpuDevice>, GraphError> {
        self.device
            .clone()
            .ok_or(GraphError::ExecutorNotInitialized(self.slot))
    }

    /// Start recording: destroy last use's retired resources, recycle the pool
    /// and open the command buffer.
    pub fn begin(&mut self) -> Result<(), GraphError> {
        let device = self.device_handle()?;
        let (Some(pool), Some(command_buffer)) = (self.pool, self.command_buffer) else {
            return Err(GraphError::ExecutorNotInitialized(self.slot));
        };
        if self.encoder.is_some() {
            return Err(GraphError::InvalidState(format!(
                "frame executor {} is already recording",
                self.slot
            )));
        }
        if !self.fence.is_signaled() {
            log::warn!(
                "Frame executor {} begun while its previous submission is still pending",
                self.slot
            );
        }

        if !self.retired.is_empty() {
            log::trace!(
                "Frame executor {}: destroying {} retired resources",
                self.slot,
                self.retired.len()
            );
        }
        for resource in self.retired.drain(..) {
            device.destroy(resource);
        }
        device.reset_command_pool(pool)?;
        self.encoder = Some(device.begin_command_buffer(command_buffer)?);
        Ok(())
    }

    /// The open encoder.
    pub fn encoder(&mut self) -> Result<&mut dyn CommandEncoder, GraphError> {
        let slot = self.slot;
        match self.encoder.as_mut() {
            Some(encoder) => Ok(encoder.as_mut()),
            None => Err(GraphError::InvalidState(format!(
                "frame executor {slot} is not recording"
            ))),
        }
    }

    /// The open encoder and the user context, borrowed together.
    pub(crate) fn recording_parts(
        &mut self,
    ) -> Result<
        (
            &mut (dyn CommandEncoder + 'static),
            Option<&mut (dyn Any + Send + 'static)>,
        ),
        GraphError,
    > {
        let slot = self.slot;
        let encoder = match self.encoder.as_deref_mut() {
            Some(encoder) => encoder,
            None => {
                return Err(GraphError::InvalidState(format!(
                    "frame executor {slot} is not recording"
                )));
            }
        };
        Ok((encoder, self.user_context.as_deref_mut()))
    }

    /// Close the command buffer.
    pub fn end(&mut self) -> Result<(), GraphError> {
        let encoder = self.encoder.take().ok_or_else(|| {
            GraphError::InvalidState(format!("frame executor {} is not recording", self.slot))
        })?;
        encoder.finish()?;
        Ok(())
    }

    /// Drop the open command buffer without submitting it.
    ///
    /// The slot can be begun again; `begin` resets the pool.
    pub fn abandon(&mut self) {
        if self.encoder.take().is_some() {
            log::debug!("Frame executor {}: recording abandoned", self.slot);
        }
    }

    /// Submit the closed command buffer, signaling this slot's fence.
    pub fn submit(&mut self) -> Result<(), GraphError> {
        if self.encoder.is_some() {
            return Err(GraphError::InvalidState(format!(
                "frame executor {} must end recording before submit",
                self.slot
            )));
        }
        let (Some(queue), Some(command_buffer)) = (self.queue.as_ref(), self.command_buffer) else {
            return Err(GraphError::ExecutorNotInitialized(self.slot));
        };
        self.fence.reset();
        if let Err(err) = queue.submit(command_buffer, Some(&self.fence)) {
            // Nothing reached the GPU; the slot is immediately reusable.
            self.fence.signal();
            return Err(err.into());
        }
        self.submissions += 1;
        Ok(())
    }

    /// Queue resources for destruction once this slot's submission completes.
    pub fn retire(&mut self, resources: impl IntoIterator<Item = NativeResource>) {
        self.retired.extend(resources);
    }

    /// Number of resources waiting for deferred destruction.
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    /// Release retired resources, the command buffer and the pool.
    ///
    /// Idempotent. The caller must ensure the slot's fence has signaled.
    pub fn finalize(&mut self) {
        self.encoder = None;
        self.user_context = None;
        if self.pool.is_none() && self.retired.is_empty() {
            return;
        }
        match self.device.as_ref() {
            Some(device) => {
                for resource in self.retired.drain(..) {
                    device.destroy(resource);
                }
                if let Some(pool) = self.pool.take() {
                    device.destroy_command_pool(pool);
                }
                log::debug!("Frame executor {} finalized", self.slot);
            }
            None => {
                log::warn!(
                    "Frame executor {}: finalized without a device, leaking {} resources",
                    self.slot,
                    self.retired.len()
                );
                self.retired.clear();
                self.pool = None;
            }
        }
        self.command_buffer = None;
        self.queue = None;
        self.device = None;
    }
}

impl std::fmt::Debug for FrameExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameExecutor")
            .field("slot", &self.slot)
            .field("initialized", &self.is_initialized())
            .field("recording", &self.is_recording())
            .field("retired", &self.retired.len())
            .field("submissions", &self.submissions)
            .finish_non_exhaustive()
    }
}

impl Drop for FrameExecutor {
    fn drop(&mut self) {
        self.finalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyCall, DummyDevice, GpuBuffer, QueueType};

    fn setup() -> (DummyDevice, Arc<dyn GpuDevice>, Arc<dyn GpuQueue>) {
        let dummy = DummyDevice::new();
        let device: Arc<dyn GpuDevice> = Arc::new(dummy.clone());
        let queue: Arc<dyn GpuQueue> = Arc::new(dummy.create_queue(QueueType::Graphics));
        (dummy, device, queue)
    }

    #[test]
    fn test_initialize_acquires_pool_and_buffer() {
        let (dummy, device, queue) = setup();
        let mut executor = FrameExecutor::new(0);
        executor.initialize(queue, &device).unwrap();

        assert!(executor.is_initialized());
        let calls = dummy.calls();
        assert!(matches!(calls[0], DummyCall::CreateCommandPool(_)));
        assert!(matches!(calls[1], DummyCall::AllocateCommandBuffer(_)));
    }

    #[test]
    fn test_initialize_twice_fails() {
        let (_dummy, device, queue) = setup();
        let mut executor = FrameExecutor::new(0);
        executor.initialize(Arc::clone(&queue), &device).unwrap();
        let err = executor.initialize(queue, &device).unwrap_err();
        assert!(matches!(err, GraphError::InvalidState(_)));
    }

    #[test]
    fn test_begin_requires_initialize() {
        let mut executor = FrameExecutor::new(2);
        assert_eq!(executor.begin(), Err(GraphError::ExecutorNotInitialized(2)));
    }

    #[test]
    fn test_record_and_submit_cycle() {
        let (dummy, device, queue) = setup();
        let mut executor = FrameExecutor::new(0);
        executor.initialize(queue, &device).unwrap();

        executor.begin().unwrap();
        assert!(executor.is_recording());
        executor.encoder().unwrap().draw(3, 1);
        executor.end().unwrap();
        executor.submit().unwrap();

        assert_eq!(dummy.submit_count(), 1);
        assert!(executor.fence().is_signaled());
        assert_eq!(executor.submissions(), 1);
    }

    #[test]
    fn test_submit_while_recording_fails() {
        let (_dummy, device, queue) = setup();
        let mut executor = FrameExecutor::new(0);
        executor.initialize(queue, &device).unwrap();
        executor.begin().unwrap();
        assert!(matches!(executor.submit(), Err(GraphError::InvalidState(_))));
    }

    #[test]
    fn test_abandon_allows_begin_again() {
        let (dummy, device, queue) = setup();
        let mut executor = FrameExecutor::new(0);
        executor.initialize(queue, &device).unwrap();

        executor.begin().unwrap();
        executor.abandon();
        assert!(!executor.is_recording());
        executor.abandon();

        executor.begin().unwrap();
        executor.end().unwrap();
        executor.submit().unwrap();
        assert_eq!(dummy.submit_count(), 1);
    }

    #[test]
    fn test_retired_resources_destroyed_on_next_begin() {
        let (dummy, device, queue) = setup();
        let mut executor = FrameExecutor::new(0);
        executor.initialize(queue, &device).unwrap();

        let buffer = device
            .create_buffer(&crate::types::BufferDescriptor::new(
                16,
                crate::types::BufferUsage::STORAGE,
            ))
            .unwrap();
        executor.retire([NativeResource::Buffer(buffer)]);
        assert_eq!(executor.retired_count(), 1);
        assert_eq!(dummy.live_resource_count(), 1);

        executor.begin().unwrap();
        assert_eq!(executor.retired_count(), 0);
        assert_eq!(dummy.live_resource_count(), 0);
        assert!(dummy
            .calls()
            .contains(&DummyCall::DestroyBuffer(buffer.raw())));
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let (dummy, device, queue) = setup();
        let mut executor = FrameExecutor::new(0);
        executor.initialize(queue, &device).unwrap();
        executor.retire([NativeResource::Buffer(GpuBuffer::from_raw(999))]);

        executor.finalize();
        executor.finalize();
        let pool_destroys = dummy
            .calls()
            .iter()
            .filter(|call| matches!(call, DummyCall::DestroyCommandPool(_)))
            .count();
        assert_eq!(pool_destroys, 1);
        assert!(!executor.is_initialized());
    }

    #[test]
    fn test_executor_keeps_device_alive() {
        let (dummy, device, queue) = setup();
        let mut executor = FrameExecutor::new(1);
        executor.initialize(queue, &device).unwrap();
        drop(device);

        executor.begin().unwrap();
        executor.end().unwrap();
        executor.submit().unwrap();
        executor.retire([NativeResource::Buffer(GpuBuffer::from_raw(7))]);
        executor.finalize();

        assert!(!executor.is_initialized());
        assert!(dummy.calls().contains(&DummyCall::DestroyBuffer(7)));
        assert_eq!(executor.begin(), Err(GraphError::ExecutorNotInitialized(1)));
    }
}
