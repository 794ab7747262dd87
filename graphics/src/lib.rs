//! # Ember Graphics
//!
//! Render graph for Ember: frame work declared as passes over virtual
//! resources, compiled into an ordered, synchronized plan and recorded
//! through an abstract GPU backend.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`RenderGraph`] - Declarative description of render passes and dependencies
//! - [`compiler`] - Culling, scheduling, barrier planning and memory aliasing
//! - [`FrameExecutor`] / [`FramePipeline`] - Per-frame command recording and frames in flight
//! - [`GpuDevice`] / [`GpuQueue`] / [`CommandEncoder`] - Backend capability traits
//! - [`DummyDevice`] - Call-recording backend for tests and demos
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use ember_graphics::*;
//!
//! let dummy = DummyDevice::new();
//! let device: Arc<dyn GpuDevice> = Arc::new(dummy.clone());
//! let queue = Arc::new(dummy.create_queue(QueueType::Graphics));
//! let mut pipeline = FramePipeline::new(&device, queue, 2).unwrap();
//! let mut graph = RenderGraph::new(device, RenderGraphCreateInfo::default()).unwrap();
//!
//! for _ in 0..3 {
//!     graph
//!         .create_buffer(BufferDescriptor::new(256, BufferUsage::STORAGE), "Particles")
//!         .unwrap();
//!     graph
//!         .add_compute_pass(
//!             "Simulate",
//!             |pass| {
//!                 pass.add_storage("particles", "Particles")?.never_cull();
//!                 Ok(())
//!             },
//!             |_, ctx| {
//!                 ctx.dispatch(64, 1, 1);
//!                 Ok(())
//!             },
//!         )
//!         .unwrap();
//!
//!     let executor = pipeline.begin_frame();
//!     graph.execute(executor).unwrap();
//!     pipeline.end_frame();
//!     graph.reset().unwrap();
//! }
//! pipeline.wait_idle().unwrap();
//! ```

pub mod backend;
pub mod compiler;
pub mod config;
pub mod error;
pub mod executor;
pub mod graph;
pub mod phase;
pub mod pipeline;
pub mod types;

// Re-export main types for convenience
pub use backend::{
    BackendError, CommandEncoder, DummyCall, DummyDevice, DummyQueue, GpuBuffer, GpuDevice,
    GpuQueue, GpuTexture, GpuTextureView, NativeResource, PipelineHandle, QueueType,
    ResourceBarrier,
};
pub use compiler::{CompiledGraph, CompiledPass, Transition};
pub use config::{QueueInfo, RenderGraphCreateInfo, ScheduleFlags};
pub use error::{GraphError, ResultCode};
pub use executor::{Fence, FenceStatus, FrameExecutor};
pub use graph::{
    BufferHandle, ComputePassBuilder, DepthStencilTarget, GraphState, LoadAction, PassHandle,
    PassKind, PresentPassBuilder, RenderGraph, RenderPassBuilder, RenderPassContext,
    ResourceHandle, ResourceKey, StoreAction, SurfaceResized, TextureHandle, TextureViewHandle,
};
pub use phase::{CompilePhase, FnPhase, PhaseChain, RecordPhase, RenderGraphPhase, SubmitPhase};
pub use pipeline::FramePipeline;
pub use types::{
    BufferDescriptor, BufferUsage, ClearValue, Extent3d, ResourceState, ShaderStages,
    SubresourceRange, TextureDescriptor, TextureDimension, TextureFormat, TextureUsage,
    TextureViewDescriptor,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// Only logs the version; call once at startup after the logger is set up.
pub fn init() {
    log::info!("Ember Graphics v{} initialized", VERSION);
}
