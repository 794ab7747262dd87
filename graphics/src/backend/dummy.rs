//! Dummy GPU backend for testing and development.
//!
//! No GPU work happens. Every call is appended to a shared log that tests
//! inspect, and handles are plain increasing integers. Queues signal
//! submission fences immediately unless told otherwise.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::executor::Fence;
use crate::types::{BufferDescriptor, TextureDescriptor, TextureViewDescriptor};

use super::{
    BackendError, BackendResult, CommandEncoder, GpuBuffer, GpuCommandBuffer, GpuCommandPool,
    GpuDevice, GpuQueue, GpuTexture, GpuTextureView, PipelineHandle, QueueType, RenderPassBeginInfo,
    ResourceBarrier,
};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum DummyCall {
    CreateTexture { id: u64, label: String },
    CreateTextureView { id: u64, texture: u64, label: String },
    CreateBuffer { id: u64, label: String },
    DestroyTexture(u64),
    DestroyTextureView(u64),
    DestroyBuffer(u64),
    CreateCommandPool(u64),
    ResetCommandPool(u64),
    DestroyCommandPool(u64),
    AllocateCommandBuffer(u64),
    BeginCommandBuffer(u64),
    EndCommandBuffer(u64),
    PushDebugGroup(String),
    PopDebugGroup,
    Barrier(ResourceBarrier),
    BeginRenderPass {
        label: String,
        color_attachments: usize,
        has_depth: bool,
    },
    EndRenderPass,
    BeginComputePass(String),
    EndComputePass,
    BindPipeline(PipelineHandle),
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    Dispatch(u32, u32, u32),
    Submit {
        queue: QueueType,
        command_buffer: u64,
    },
    Present(u64),
}

#[derive(Debug, Default)]
struct DummyState {
    next_id: u64,
    calls: Vec<DummyCall>,
    live: HashMap<u64, String>,
    fail_next_allocation: bool,
}

impl DummyState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn create(&mut self, label: &str) -> BackendResult<u64> {
        if std::mem::take(&mut self.fail_next_allocation) {
            log::trace!("DummyBackend: injected allocation failure for {label}");
            return Err(BackendError::OutOfMemory);
        }
        let id = self.allocate_id();
        self.live.insert(id, label.to_owned());
        Ok(id)
    }
}

/// Dummy device. Cloning shares the call log.
#[derive(Debug, Clone, Default)]
pub struct DummyDevice {
    state: Arc<Mutex<DummyState>>,
    device_lost: Arc<AtomicBool>,
}

impl DummyDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue sharing this device's call log.
    pub fn create_queue(&self, queue_type: QueueType) -> DummyQueue {
        DummyQueue {
            queue_type,
            state: Arc::clone(&self.state),
            device_lost: Arc::clone(&self.device_lost),
            auto_signal: Arc::new(AtomicBool::new(true)),
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Snapshot of every call so far.
    pub fn calls(&self) -> Vec<DummyCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Number of texture and buffer creations carrying `label`.
    pub fn allocation_count(&self, label: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| match call {
                DummyCall::CreateTexture { label: l, .. } | DummyCall::CreateBuffer { label: l, .. } => {
                    l == label
                }
                _ => false,
            })
            .count()
    }

    /// Number of texture and buffer creations of any label.
    pub fn total_allocations(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    DummyCall::CreateTexture { .. } | DummyCall::CreateBuffer { .. }
                )
            })
            .count()
    }

    /// Number of textures, views and buffers created but not yet destroyed.
    pub fn live_resource_count(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Whether a native object with this label is still alive.
    pub fn is_live(&self, label: &str) -> bool {
        self.state.lock().live.values().any(|l| l == label)
    }

    /// Every barrier recorded so far, in order.
    pub fn barriers(&self) -> Vec<ResourceBarrier> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                DummyCall::Barrier(barrier) => Some(*barrier),
                _ => None,
            })
            .collect()
    }

    /// Debug group labels in recording order. The graph opens one per pass.
    pub fn debug_groups(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                DummyCall::PushDebugGroup(label) => Some(label.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn submit_count(&self) -> usize {
        self.count(|call| matches!(call, DummyCall::Submit { .. }))
    }

    pub fn present_count(&self) -> usize {
        self.count(|call| matches!(call, DummyCall::Present(_)))
    }

    /// Number of destroyed textures, views and buffers.
    pub fn destroy_count(&self) -> usize {
        self.count(|call| {
            matches!(
                call,
                DummyCall::DestroyTexture(_)
                    | DummyCall::DestroyTextureView(_)
                    | DummyCall::DestroyBuffer(_)
            )
        })
    }

    fn count(&self, predicate: impl Fn(&DummyCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Make the next texture or buffer creation fail with `OutOfMemory`.
    pub fn fail_next_allocation(&self) {
        self.state.lock().fail_next_allocation = true;
    }

    /// Simulate device loss: submissions fail with `DeviceLost`.
    pub fn set_device_lost(&self, lost: bool) {
        self.device_lost.store(lost, Ordering::Release);
    }

    fn record(&self, call: DummyCall) {
        self.state.lock().calls.push(call);
    }

    fn release(&self, id: u64, call: DummyCall) {
        let mut state = self.state.lock();
        if state.live.remove(&id).is_none() {
            log::warn!("DummyBackend: destroying unknown or already destroyed object {id}");
        }
        state.calls.push(call);
    }
}

impl GpuDevice for DummyDevice {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> BackendResult<GpuTexture> {
        let label = descriptor.label.clone().unwrap_or_default();
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}x{})",
            label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth
        );
        let mut state = self.state.lock();
        let id = state.create(&label)?;
        state.calls.push(DummyCall::CreateTexture { id, label });
        Ok(GpuTexture::from_raw(id))
    }

    fn create_texture_view(
        &self,
        texture: GpuTexture,
        descriptor: &TextureViewDescriptor,
    ) -> BackendResult<GpuTextureView> {
        let label = descriptor.label.clone().unwrap_or_default();
        log::trace!("DummyBackend: creating view {:?} of texture {}", label, texture.raw());
        let mut state = self.state.lock();
        let id = state.allocate_id();
        state.live.insert(id, label.clone());
        state.calls.push(DummyCall::CreateTextureView {
            id,
            texture: texture.raw(),
            label,
        });
        Ok(GpuTextureView::from_raw(id))
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> BackendResult<GpuBuffer> {
        let label = descriptor.label.clone().unwrap_or_default();
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            label,
            descriptor.size
        );
        let mut state = self.state.lock();
        let id = state.create(&label)?;
        state.calls.push(DummyCall::CreateBuffer { id, label });
        Ok(GpuBuffer::from_raw(id))
    }

    fn destroy_texture(&self, texture: GpuTexture) {
        log::trace!("DummyBackend: destroying texture {}", texture.raw());
        self.release(texture.raw(), DummyCall::DestroyTexture(texture.raw()));
    }

    fn destroy_texture_view(&self, view: GpuTextureView) {
        self.release(view.raw(), DummyCall::DestroyTextureView(view.raw()));
    }

    fn destroy_buffer(&self, buffer: GpuBuffer) {
        log::trace!("DummyBackend: destroying buffer {}", buffer.raw());
        self.release(buffer.raw(), DummyCall::DestroyBuffer(buffer.raw()));
    }

    fn create_command_pool(&self, queue_type: QueueType) -> BackendResult<GpuCommandPool> {
        let mut state = self.state.lock();
        let id = state.allocate_id();
        log::trace!("DummyBackend: creating {queue_type:?} command pool {id}");
        state.calls.push(DummyCall::CreateCommandPool(id));
        Ok(GpuCommandPool::from_raw(id))
    }

    fn reset_command_pool(&self, pool: GpuCommandPool) -> BackendResult<()> {
        self.record(DummyCall::ResetCommandPool(pool.raw()));
        Ok(())
    }

    fn destroy_command_pool(&self, pool: GpuCommandPool) {
        self.record(DummyCall::DestroyCommandPool(pool.raw()));
    }

    fn allocate_command_buffer(&self, _pool: GpuCommandPool) -> BackendResult<GpuCommandBuffer> {
        let mut state = self.state.lock();
        let id = state.allocate_id();
        state.calls.push(DummyCall::AllocateCommandBuffer(id));
        Ok(GpuCommandBuffer::from_raw(id))
    }

    fn begin_command_buffer(
        &self,
        command_buffer: GpuCommandBuffer,
    ) -> BackendResult<Box<dyn CommandEncoder>> {
        if self.device_lost.load(Ordering::Acquire) {
            return Err(BackendError::DeviceLost);
        }
        self.record(DummyCall::BeginCommandBuffer(command_buffer.raw()));
        Ok(Box::new(DummyEncoder {
            command_buffer,
            state: Arc::clone(&self.state),
        }))
    }
}

/// Dummy queue sharing its device's call log.
#[derive(Debug, Clone)]
pub struct DummyQueue {
    queue_type: QueueType,
    state: Arc<Mutex<DummyState>>,
    device_lost: Arc<AtomicBool>,
    auto_signal: Arc<AtomicBool>,
    pending: Arc<Mutex<Vec<Fence>>>,
}

impl DummyQueue {
    /// When disabled, submission fences stay unsignaled until
    /// [`complete_pending`](Self::complete_pending) is called.
    pub fn set_auto_signal(&self, enabled: bool) {
        self.auto_signal.store(enabled, Ordering::Release);
    }

    /// Signal every fence held back while auto-signal was off.
    pub fn complete_pending(&self) {
        for fence in self.pending.lock().drain(..) {
            fence.signal();
        }
    }
}

impl GpuQueue for DummyQueue {
    fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    fn submit(&self, command_buffer: GpuCommandBuffer, signal: Option<&Fence>) -> BackendResult<()> {
        if self.device_lost.load(Ordering::Acquire) {
            return Err(BackendError::DeviceLost);
        }
        log::trace!(
            "DummyBackend: submitting command buffer {} on {:?} queue",
            command_buffer.raw(),
            self.queue_type
        );
        self.state.lock().calls.push(DummyCall::Submit {
            queue: self.queue_type,
            command_buffer: command_buffer.raw(),
        });
        if let Some(fence) = signal {
            if self.auto_signal.load(Ordering::Acquire) {
                fence.signal();
            } else {
                self.pending.lock().push(fence.clone());
            }
        }
        Ok(())
    }

    fn present(&self, texture: GpuTexture) -> BackendResult<()> {
        if self.device_lost.load(Ordering::Acquire) {
            return Err(BackendError::DeviceLost);
        }
        self.state.lock().calls.push(DummyCall::Present(texture.raw()));
        Ok(())
    }

    fn wait_idle(&self) -> BackendResult<()> {
        self.complete_pending();
        Ok(())
    }
}

struct DummyEncoder {
    command_buffer: GpuCommandBuffer,
    state: Arc<Mutex<DummyState>>,
}

impl DummyEncoder {
    fn record(&self, call: DummyCall) {
        self.state.lock().calls.push(call);
    }
}

impl CommandEncoder for DummyEncoder {
    fn push_debug_group(&mut self, label: &str) {
        self.record(DummyCall::PushDebugGroup(label.to_owned()));
    }

    fn pop_debug_group(&mut self) {
        self.record(DummyCall::PopDebugGroup);
    }

    fn resource_barrier(&mut self, barriers: &[ResourceBarrier]) {
        let mut state = self.state.lock();
        state
            .calls
            .extend(barriers.iter().copied().map(DummyCall::Barrier));
    }

    fn begin_render_pass(&mut self, info: &RenderPassBeginInfo<'_>) -> BackendResult<()> {
        if info.color_attachments.is_empty() && info.depth_stencil.is_none() {
            return Err(BackendError::InvalidParameter(format!(
                "render pass '{}' has no attachments",
                info.label
            )));
        }
        self.record(DummyCall::BeginRenderPass {
            label: info.label.to_owned(),
            color_attachments: info.color_attachments.len(),
            has_depth: info.depth_stencil.is_some(),
        });
        Ok(())
    }

    fn end_render_pass(&mut self) {
        self.record(DummyCall::EndRenderPass);
    }

    fn begin_compute_pass(&mut self, label: &str) {
        self.record(DummyCall::BeginComputePass(label.to_owned()));
    }

    fn end_compute_pass(&mut self) {
        self.record(DummyCall::EndComputePass);
    }

    fn bind_pipeline(&mut self, pipeline: PipelineHandle) {
        self.record(DummyCall::BindPipeline(pipeline));
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.record(DummyCall::Draw {
            vertex_count,
            instance_count,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.record(DummyCall::Dispatch(x, y, z));
    }

    fn finish(self: Box<Self>) -> BackendResult<()> {
        self.record(DummyCall::EndCommandBuffer(self.command_buffer.raw()));
        Ok(())
    }
}

static_assertions::assert_impl_all!(DummyDevice: Send, Sync);
static_assertions::assert_impl_all!(DummyQueue: Send, Sync);
