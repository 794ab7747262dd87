//! GPU backend abstraction layer.
//!
//! The render graph never talks to a graphics API directly. It consumes three
//! capability traits:
//!
//! - [`GpuDevice`] - resource and command pool creation/destruction
//! - [`GpuQueue`] - submission and presentation
//! - [`CommandEncoder`] - recording of barriers, pass scopes and draws
//!
//! Native objects cross the boundary as opaque `u64` handles. One
//! implementation per graphics API is selected at startup; this crate ships
//! [`dummy`], which records every call and is used by tests and demos.

pub mod dummy;
mod error;

pub use dummy::{DummyCall, DummyDevice, DummyQueue};
pub use error::{BackendError, BackendResult};

use crate::executor::Fence;
use crate::graph::{LoadAction, StoreAction};
use crate::types::{
    BufferDescriptor, ClearValue, ResourceState, SubresourceRange, TextureDescriptor,
    TextureViewDescriptor,
};

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a backend-specific handle value.
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// The backend-specific handle value.
            pub fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

native_handle!(
    /// Handle to a native texture.
    GpuTexture
);
native_handle!(
    /// Handle to a native texture view.
    GpuTextureView
);
native_handle!(
    /// Handle to a native buffer.
    GpuBuffer
);
native_handle!(
    /// Handle to a native command pool.
    GpuCommandPool
);
native_handle!(
    /// Handle to a primary command buffer allocated from a pool.
    GpuCommandBuffer
);
native_handle!(
    /// Handle to a compiled pipeline state object, owned by the application.
    PipelineHandle
);

/// Kind of hardware queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueueType {
    #[default]
    Graphics,
    Compute,
    Transfer,
}

/// A native object backing a graph resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeResource {
    Texture(GpuTexture),
    TextureView(GpuTextureView),
    Buffer(GpuBuffer),
}

impl NativeResource {
    pub fn as_texture(&self) -> Option<GpuTexture> {
        match self {
            Self::Texture(texture) => Some(*texture),
            _ => None,
        }
    }

    pub fn as_buffer(&self) -> Option<GpuBuffer> {
        match self {
            Self::Buffer(buffer) => Some(*buffer),
            _ => None,
        }
    }

    pub fn as_view(&self) -> Option<GpuTextureView> {
        match self {
            Self::TextureView(view) => Some(*view),
            _ => None,
        }
    }
}

/// A state transition recorded into a command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceBarrier {
    pub resource: NativeResource,
    pub src_state: ResourceState,
    pub dst_state: ResourceState,
    pub range: SubresourceRange,
}

/// One color attachment of a render pass scope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAttachmentInfo {
    pub slot: u32,
    /// Texture or texture view rendered into.
    pub target: NativeResource,
    pub load: LoadAction,
    pub store: StoreAction,
    pub clear: ClearValue,
    /// State the render pass transitions from on entry.
    pub initial_state: ResourceState,
    /// State the attachment is left in on exit.
    pub final_state: ResourceState,
}

/// The depth-stencil attachment of a render pass scope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilAttachmentInfo {
    pub target: NativeResource,
    pub depth_load: LoadAction,
    pub depth_store: StoreAction,
    pub stencil_load: LoadAction,
    pub stencil_store: StoreAction,
    pub clear_depth: f32,
    pub clear_stencil: u32,
    pub read_only: bool,
    pub initial_state: ResourceState,
    pub final_state: ResourceState,
}

/// Everything a backend needs to open a render pass scope.
#[derive(Debug, Clone)]
pub struct RenderPassBeginInfo<'a> {
    pub label: &'a str,
    pub color_attachments: &'a [ColorAttachmentInfo],
    pub depth_stencil: Option<DepthStencilAttachmentInfo>,
}

/// Device-level capabilities: creating and destroying native objects.
pub trait GpuDevice: Send + Sync + 'static {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    fn create_texture(&self, descriptor: &TextureDescriptor) -> BackendResult<GpuTexture>;

    fn create_texture_view(
        &self,
        texture: GpuTexture,
        descriptor: &TextureViewDescriptor,
    ) -> BackendResult<GpuTextureView>;

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> BackendResult<GpuBuffer>;

    fn destroy_texture(&self, texture: GpuTexture);

    fn destroy_texture_view(&self, view: GpuTextureView);

    fn destroy_buffer(&self, buffer: GpuBuffer);

    /// Destroy any native resource.
    fn destroy(&self, resource: NativeResource) {
        match resource {
            NativeResource::Texture(texture) => self.destroy_texture(texture),
            NativeResource::TextureView(view) => self.destroy_texture_view(view),
            NativeResource::Buffer(buffer) => self.destroy_buffer(buffer),
        }
    }

    fn create_command_pool(&self, queue_type: QueueType) -> BackendResult<GpuCommandPool>;

    /// Recycle every command buffer allocated from the pool.
    fn reset_command_pool(&self, pool: GpuCommandPool) -> BackendResult<()>;

    fn destroy_command_pool(&self, pool: GpuCommandPool);

    fn allocate_command_buffer(&self, pool: GpuCommandPool) -> BackendResult<GpuCommandBuffer>;

    /// Open a command buffer for recording.
    fn begin_command_buffer(
        &self,
        command_buffer: GpuCommandBuffer,
    ) -> BackendResult<Box<dyn CommandEncoder>>;
}

/// Queue-level capabilities: submission and presentation.
pub trait GpuQueue: Send + Sync + 'static {
    fn queue_type(&self) -> QueueType;

    /// Submit a closed command buffer. The fence, if any, is signaled when the
    /// GPU finishes the work.
    fn submit(&self, command_buffer: GpuCommandBuffer, signal: Option<&Fence>)
    -> BackendResult<()>;

    fn present(&self, texture: GpuTexture) -> BackendResult<()>;

    /// Block until every submission on this queue has completed.
    fn wait_idle(&self) -> BackendResult<()>;
}

/// Records commands into an open command buffer.
pub trait CommandEncoder: Send {
    fn push_debug_group(&mut self, label: &str);

    fn pop_debug_group(&mut self);

    fn resource_barrier(&mut self, barriers: &[ResourceBarrier]);

    fn begin_render_pass(&mut self, info: &RenderPassBeginInfo<'_>) -> BackendResult<()>;

    fn end_render_pass(&mut self);

    fn begin_compute_pass(&mut self, label: &str);

    fn end_compute_pass(&mut self);

    fn bind_pipeline(&mut self, pipeline: PipelineHandle);

    fn draw(&mut self, vertex_count: u32, instance_count: u32);

    fn dispatch(&mut self, x: u32, y: u32, z: u32);

    /// Close the command buffer.
    fn finish(self: Box<Self>) -> BackendResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_handle_roundtrip() {
        let texture = GpuTexture::from_raw(42);
        assert_eq!(texture.raw(), 42);
        let native = NativeResource::Texture(texture);
        assert_eq!(native.as_texture(), Some(texture));
        assert_eq!(native.as_buffer(), None);
    }

    #[test]
    fn test_default_queue_type() {
        assert_eq!(QueueType::default(), QueueType::Graphics);
    }
}
