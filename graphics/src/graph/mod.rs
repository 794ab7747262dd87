//! Render graph infrastructure.
//!
//! The render graph provides a declarative way to describe rendering operations
//! and their dependencies. The graph compiler automatically handles:
//!
//! - Dead pass and resource elimination
//! - Pass ordering via topological sort
//! - Resource lifetime analysis and memory aliasing
//! - Synchronization and barrier insertion
//!
//! # Architecture
//!
//! | Layer | Type | Purpose |
//! |-------|------|---------|
//! | Pipeline | [`FramePipeline`](crate::pipeline::FramePipeline) | Multiple frames in flight |
//! | Executor | [`FrameExecutor`](crate::executor::FrameExecutor) | One command buffer per frame slot |
//! | **Graph** | [`RenderGraph`] | Passes, resources and their dependencies (this module) |
//! | Pass | [`Pass`] | Single unit of GPU work |
//!
//! A graph moves through [`GraphState`]s: passes and resources are declared
//! while `Building`, [`compile`](RenderGraph::compile) plans the frame,
//! recording and submission run on a [`FrameExecutor`](crate::executor::FrameExecutor),
//! and [`reset`](RenderGraph::reset) starts the next frame.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ember_graphics::*;
//!
//! let device = DummyDevice::new();
//! let queue = device.create_queue(QueueType::Graphics);
//! let device: Arc<dyn GpuDevice> = Arc::new(device);
//! let mut executor = FrameExecutor::new(0);
//! executor.initialize(Arc::new(queue), &device).unwrap();
//!
//! let mut graph = RenderGraph::new(device, RenderGraphCreateInfo::default()).unwrap();
//! let desc = TextureDescriptor::new_2d(
//!     1920,
//!     1080,
//!     TextureFormat::Rgba8Unorm,
//!     TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
//! );
//! graph.create_texture(desc.clone(), "Color").unwrap();
//! graph
//!     .import_texture("Swapchain", GpuTexture::from_raw(1), desc, ResourceState::UNDEFINED)
//!     .unwrap();
//!
//! graph
//!     .add_render_pass(
//!         "Opaque",
//!         |builder| {
//!             builder.add_render_target(0, "Color", LoadAction::Clear, ClearValue::BLACK, StoreAction::Store)?;
//!             Ok(())
//!         },
//!         |_, ctx| {
//!             ctx.draw(3, 1);
//!             Ok(())
//!         },
//!     )
//!     .unwrap();
//! graph
//!     .add_present_pass(
//!         "Present",
//!         |builder| {
//!             builder.add_input("scene", "Color")?.set_present_target("Swapchain")?;
//!             Ok(())
//!         },
//!         |_, _| Ok(()),
//!     )
//!     .unwrap();
//!
//! graph.execute(&mut executor).unwrap();
//! assert_eq!(graph.state(), GraphState::Submitted);
//! graph.reset().unwrap();
//! ```

mod builder;
mod context;
mod node;
mod pass;
mod record;
mod resource;
mod target;

use std::collections::HashMap;
use std::sync::Arc;

use ember_core::event::{Event, EventDispatcher};
use ember_core::pool::Pooled;

use crate::backend::{GpuBuffer, GpuDevice, GpuTexture, GpuTextureView, NativeResource};
use crate::compiler::{self, CompiledGraph};
use crate::config::RenderGraphCreateInfo;
use crate::error::GraphError;
use crate::types::{BufferDescriptor, ResourceState, TextureDescriptor, TextureViewDescriptor};

pub use builder::{ComputePassBuilder, PresentPassBuilder, RenderPassBuilder};
pub use context::RenderPassContext;
pub use node::{DependencyGraph, Edge, EdgeFlags, EdgeId, EdgeKind, Node, NodeId, NodeKind};
pub use pass::{Binding, ExecuteFn, Pass, PassHandle, PassKind, RenderPassDesc};
pub use resource::{
    BufferHandle, ResourceDesc, ResourceFlags, ResourceHandle, ResourceKey, ResourceKind,
    ResourceRegistry, TextureHandle, TextureViewHandle, VirtualResource,
};
pub use target::{
    DepthStencilAttachment, DepthStencilTarget, LoadAction, MAX_COLOR_ATTACHMENTS, RenderTarget,
    StoreAction,
};

use builder::PassDeclaration;

/// Lifecycle state of a [`RenderGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphState {
    /// Accepting resource and pass declarations.
    Building,
    /// Planned; ready to record.
    Compiled,
    /// Passes are being recorded into an executor.
    Recording,
    /// Every pass recorded; ready to submit.
    Recorded,
    /// Handed to the queue. Reset before the next frame.
    Submitted,
    /// A build, compile or record error occurred. Reset to recover.
    Failed,
}

/// The presentation surface changed size.
///
/// Persistent textures whose extent no longer matches are dropped at the next
/// [`reset`](RenderGraph::reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceResized {
    pub width: u32,
    pub height: u32,
}

impl Event for SurfaceResized {
    fn name(&self) -> &'static str {
        "SurfaceResized"
    }
}

/// A render graph describing one frame of GPU work.
///
/// See the [module documentation](self) for an overview.
pub struct RenderGraph {
    device: Arc<dyn GpuDevice>,
    info: RenderGraphCreateInfo,
    state: GraphState,
    error: Option<GraphError>,
    nodes: DependencyGraph,
    resources: ResourceRegistry,
    passes: Vec<Pass>,
    pass_names: HashMap<String, PassHandle>,
    compiled: Pooled<CompiledGraph>,
    /// Next step of the compiled order to record.
    next_step: usize,
    /// Native object per physical allocation, created while recording.
    allocation_natives: Vec<Option<NativeResource>>,
    /// Views created by the graph during this build.
    view_natives: Vec<NativeResource>,
    /// Natives released by the graph, handed to the next submitting executor.
    pending_destroy: Vec<NativeResource>,
    pending_resize: Option<SurfaceResized>,
}

impl RenderGraph {
    /// Create an empty graph.
    pub fn new(
        device: Arc<dyn GpuDevice>,
        info: RenderGraphCreateInfo,
    ) -> Result<Self, GraphError> {
        info.validate()?;
        log::info!(
            "Render graph created on {} backend (schedule {:?}, {} queues)",
            device.name(),
            info.schedule_flags,
            info.queue_infos.len()
        );
        Ok(Self {
            device,
            info,
            state: GraphState::Building,
            error: None,
            nodes: DependencyGraph::new(),
            resources: ResourceRegistry::new(),
            passes: Vec::new(),
            pass_names: HashMap::new(),
            compiled: Pooled::default(),
            next_step: 0,
            allocation_natives: Vec::new(),
            view_natives: Vec::new(),
            pending_destroy: Vec::new(),
            pending_resize: None,
        })
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    /// The error that moved the graph to [`GraphState::Failed`].
    pub fn error(&self) -> Option<&GraphError> {
        self.error.as_ref()
    }

    pub fn info(&self) -> &RenderGraphCreateInfo {
        &self.info
    }

    pub fn device(&self) -> &Arc<dyn GpuDevice> {
        &self.device
    }

    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub fn nodes(&self) -> &DependencyGraph {
        &self.nodes
    }

    /// Passes in declaration order.
    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    pub fn pass(&self, handle: PassHandle) -> Option<&Pass> {
        self.passes.get(handle.index())
    }

    pub fn find_pass(&self, name: &str) -> Option<PassHandle> {
        self.pass_names.get(name).copied()
    }

    /// The current plan, once compiled.
    pub fn compiled(&self) -> Option<&CompiledGraph> {
        self.compiled.get()
    }

    /// Schedule position of a pass; `None` before compiling and for culled passes.
    pub fn order_of(&self, pass: PassHandle) -> Option<u32> {
        self.passes
            .get(pass.index())
            .and_then(|pass| self.nodes.node(pass.node()).order())
    }

    /// Position of the first pass using a resource; `None` before compiling
    /// and for unused resources.
    pub fn resource_order(
        &self,
        resource: impl Into<ResourceHandle>,
    ) -> Result<Option<u32>, GraphError> {
        let index = self.resources.validate(resource.into())?;
        Ok(self.nodes.node(self.resources.get(index).node()).order())
    }

    // ------------------------------------------------------------------
    // State handling
    // ------------------------------------------------------------------

    fn stored_error(&self) -> GraphError {
        self.error
            .clone()
            .unwrap_or_else(|| GraphError::InvalidState("graph has failed".into()))
    }

    /// Move to `Failed`, keeping the first error.
    fn fail(&mut self, err: GraphError) -> GraphError {
        log::error!("Render graph failed: {err}");
        self.state = GraphState::Failed;
        if self.error.is_none() {
            self.error = Some(err.clone());
        }
        err
    }

    fn check_building(&self) -> Result<(), GraphError> {
        match self.state {
            GraphState::Building => Ok(()),
            GraphState::Compiled | GraphState::Recorded | GraphState::Submitted => {
                Err(GraphError::AlreadyCompiled)
            }
            GraphState::Recording => Err(GraphError::ReentrantBuild),
            GraphState::Failed => Err(GraphError::InvalidState(format!(
                "graph has failed: {}",
                self.stored_error()
            ))),
        }
    }

    fn expect_state(&self, expected: GraphState, operation: &str) -> Result<(), GraphError> {
        if self.state == expected {
            Ok(())
        } else if self.state == GraphState::Failed {
            Err(self.stored_error())
        } else {
            Err(GraphError::InvalidState(format!(
                "{operation} requires a {expected:?} graph, it is {:?}",
                self.state
            )))
        }
    }

    /// Run a build operation; its errors poison the graph.
    fn build<T>(
        &mut self,
        operation: impl FnOnce(&mut Self) -> Result<T, GraphError>,
    ) -> Result<T, GraphError> {
        self.check_building()?;
        operation(self).map_err(|err| self.fail(err))
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    pub fn create_texture(
        &mut self,
        desc: TextureDescriptor,
        name: &str,
    ) -> Result<TextureHandle, GraphError> {
        self.build(|graph| graph.resources.create_texture(&mut graph.nodes, desc, name))
    }

    pub fn create_buffer(
        &mut self,
        desc: BufferDescriptor,
        name: &str,
    ) -> Result<BufferHandle, GraphError> {
        self.build(|graph| graph.resources.create_buffer(&mut graph.nodes, desc, name))
    }

    /// A constant buffer of `size` bytes.
    pub fn create_uniform_buffer(
        &mut self,
        size: u64,
        name: &str,
    ) -> Result<BufferHandle, GraphError> {
        self.build(|graph| {
            graph
                .resources
                .create_uniform_buffer(&mut graph.nodes, size, name)
        })
    }

    pub fn create_texture_view(
        &mut self,
        texture: TextureHandle,
        desc: TextureViewDescriptor,
        name: &str,
    ) -> Result<TextureViewHandle, GraphError> {
        self.build(|graph| {
            graph
                .resources
                .create_texture_view(&mut graph.nodes, texture, desc, name)
        })
    }

    /// Register a texture owned outside the graph.
    ///
    /// External resources are sinks: passes writing them are never culled.
    /// They must be imported again after every reset.
    pub fn import_texture(
        &mut self,
        name: &str,
        native: GpuTexture,
        desc: TextureDescriptor,
        initial_state: ResourceState,
    ) -> Result<TextureHandle, GraphError> {
        self.build(|graph| {
            graph
                .resources
                .import_texture(&mut graph.nodes, name, native, desc, initial_state)
        })
    }

    pub fn import_buffer(
        &mut self,
        name: &str,
        native: GpuBuffer,
        desc: BufferDescriptor,
        initial_state: ResourceState,
    ) -> Result<BufferHandle, GraphError> {
        self.build(|graph| {
            graph
                .resources
                .import_buffer(&mut graph.nodes, name, native, desc, initial_state)
        })
    }

    /// State an external or persistent resource is left in after the frame.
    pub fn set_final_state(
        &mut self,
        resource: impl Into<ResourceKey>,
        state: ResourceState,
    ) -> Result<(), GraphError> {
        let key = resource.into();
        self.build(|graph| {
            let index = graph.resources.lookup(&key)?;
            graph.resources.set_final_state(index, state)
        })
    }

    /// Keep a texture or buffer, with its contents, across resets.
    pub fn mark_persistent(&mut self, resource: impl Into<ResourceKey>) -> Result<(), GraphError> {
        let key = resource.into();
        self.build(|graph| {
            let index = graph.resources.lookup(&key)?;
            graph.resources.mark_persistent(index)
        })
    }

    pub fn get_texture(&self, name: &str) -> Result<TextureHandle, GraphError> {
        self.resources.get_texture(name)
    }

    pub fn get_texture_view(&self, name: &str) -> Result<TextureViewHandle, GraphError> {
        self.resources.get_texture_view(name)
    }

    pub fn get_buffer(&self, name: &str) -> Result<BufferHandle, GraphError> {
        self.resources.get_buffer(name)
    }

    fn native_of(&self, handle: ResourceHandle) -> Result<NativeResource, GraphError> {
        let index = self.resources.validate(handle)?;
        let resource = self.resources.get(index);
        resource
            .native()
            .ok_or_else(|| GraphError::NotMaterialized(resource.name().to_owned()))
    }

    /// The backing texture, once materialized.
    pub fn native_texture(&self, texture: TextureHandle) -> Result<GpuTexture, GraphError> {
        self.native_of(texture.handle())?
            .as_texture()
            .ok_or_else(|| GraphError::InvalidState("texture backed by a non-texture".into()))
    }

    pub fn native_buffer(&self, buffer: BufferHandle) -> Result<GpuBuffer, GraphError> {
        self.native_of(buffer.handle())?
            .as_buffer()
            .ok_or_else(|| GraphError::InvalidState("buffer backed by a non-buffer".into()))
    }

    pub fn native_view(&self, view: TextureViewHandle) -> Result<GpuTextureView, GraphError> {
        self.native_of(view.handle())?
            .as_view()
            .ok_or_else(|| GraphError::InvalidState("view backed by a non-view".into()))
    }

    // ------------------------------------------------------------------
    // Passes
    // ------------------------------------------------------------------

    /// Declare a render pass.
    ///
    /// `setup` runs immediately; `execute` runs once when the pass is recorded.
    pub fn add_render_pass<S, E>(
        &mut self,
        name: &str,
        setup: S,
        execute: E,
    ) -> Result<PassHandle, GraphError>
    where
        S: FnOnce(&mut RenderPassBuilder<'_>) -> Result<(), GraphError>,
        E: FnOnce(&mut RenderGraph, &mut RenderPassContext<'_>) -> Result<(), GraphError> + 'static,
    {
        self.build(|graph| {
            graph.check_pass_name(name)?;
            let mut builder = RenderPassBuilder::new(&graph.resources, name);
            setup(&mut builder)?;
            let declaration = builder.finish();
            Ok(graph.commit_pass(name, PassKind::Render, declaration, Box::new(execute)))
        })
    }

    /// Declare a compute pass.
    pub fn add_compute_pass<S, E>(
        &mut self,
        name: &str,
        setup: S,
        execute: E,
    ) -> Result<PassHandle, GraphError>
    where
        S: FnOnce(&mut ComputePassBuilder<'_>) -> Result<(), GraphError>,
        E: FnOnce(&mut RenderGraph, &mut RenderPassContext<'_>) -> Result<(), GraphError> + 'static,
    {
        self.build(|graph| {
            graph.check_pass_name(name)?;
            let mut builder = ComputePassBuilder::new(&graph.resources, name);
            setup(&mut builder)?;
            let declaration = builder.finish();
            Ok(graph.commit_pass(name, PassKind::Compute, declaration, Box::new(execute)))
        })
    }

    /// Declare the pass rendering into an external surface.
    ///
    /// The present target is transitioned to `PRESENT` after the last pass and
    /// handed to the queue at submit. Present passes are never culled.
    pub fn add_present_pass<S, E>(
        &mut self,
        name: &str,
        setup: S,
        execute: E,
    ) -> Result<PassHandle, GraphError>
    where
        S: FnOnce(&mut PresentPassBuilder<'_>) -> Result<(), GraphError>,
        E: FnOnce(&mut RenderGraph, &mut RenderPassContext<'_>) -> Result<(), GraphError> + 'static,
    {
        self.build(|graph| {
            graph.check_pass_name(name)?;
            let mut builder = PresentPassBuilder::new(&graph.resources, name);
            setup(&mut builder)?;
            let declaration = builder.finish()?;
            if let Some(target) = declaration.desc.present_target {
                graph
                    .resources
                    .set_final_state(target.index(), ResourceState::PRESENT)?;
            }
            Ok(graph.commit_pass(name, PassKind::Present, declaration, Box::new(execute)))
        })
    }

    fn check_pass_name(&self, name: &str) -> Result<(), GraphError> {
        if self.pass_names.contains_key(name) {
            return Err(GraphError::DuplicateName(name.to_owned()));
        }
        Ok(())
    }

    fn commit_pass(
        &mut self,
        name: &str,
        kind: PassKind,
        declaration: PassDeclaration,
        execute: ExecuteFn,
    ) -> PassHandle {
        let handle = PassHandle(self.passes.len() as u32);
        let node = self.nodes.add_node(kind.node_kind(), handle.0);
        for access in &declaration.accesses {
            let resource = self.resources.get(access.resource).node();
            self.nodes.connect(
                node,
                resource,
                access.kind,
                access.state,
                access.range,
                access.flags,
            );
        }
        log::trace!(
            "Declared {:?} pass '{}' with {} accesses",
            kind,
            name,
            declaration.accesses.len()
        );
        self.passes.push(Pass::new(
            name.to_owned(),
            kind,
            declaration.desc,
            node,
            declaration.never_cull,
            execute,
        ));
        self.pass_names.insert(name.to_owned(), handle);
        handle
    }

    // ------------------------------------------------------------------
    // Compilation
    // ------------------------------------------------------------------

    /// Cull, order and plan the declared passes.
    pub fn compile(&mut self) -> Result<(), GraphError> {
        match self.state {
            GraphState::Building => {}
            GraphState::Failed => return Err(self.stored_error()),
            _ => return Err(GraphError::AlreadyCompiled),
        }

        let compiled = self.compiled.activate();
        let result = compiler::compile(
            &mut self.nodes,
            &self.resources,
            &self.passes,
            &self.info,
            compiled,
        );
        match result {
            Ok(()) => {
                let allocations = compiled.allocations().len();
                self.allocation_natives.clear();
                self.allocation_natives.resize(allocations, None);
                self.next_step = 0;
                self.state = GraphState::Compiled;
                Ok(())
            }
            Err(err) => {
                self.compiled.release();
                Err(self.fail(err))
            }
        }
    }

    // ------------------------------------------------------------------
    // Reset and events
    // ------------------------------------------------------------------

    /// Drop every pass and non-persistent resource and start a new build.
    ///
    /// Persistent resources are re-registered under new handles; look them up
    /// by name. Transient natives that were never submitted are destroyed
    /// immediately.
    pub fn reset(&mut self) -> Result<(), GraphError> {
        if self.state == GraphState::Recording {
            return Err(GraphError::InvalidState(
                "cannot reset a graph while it is recording".into(),
            ));
        }
        self.destroy_transients();

        self.passes.clear();
        self.pass_names.clear();
        self.nodes.clear();
        self.compiled.release();
        self.next_step = 0;

        let resize = self.pending_resize.take();
        let dropped = self.resources.reset(&mut self.nodes, |desc| match (resize, desc) {
            (Some(size), ResourceDesc::Texture(texture)) => {
                texture.size.width == size.width && texture.size.height == size.height
            }
            _ => true,
        });
        self.pending_destroy.extend(dropped);

        self.state = GraphState::Building;
        self.error = None;
        log::trace!(
            "Render graph reset (generation {}, {} persistent resources)",
            self.resources.generation(),
            self.resources.len()
        );
        Ok(())
    }

    /// React to an application event. Returns whether the event was handled.
    pub fn handle_event(&mut self, event: &mut dyn Event) -> bool {
        let mut dispatcher = EventDispatcher::new(event);
        dispatcher.dispatch::<SurfaceResized, _>(|resized| {
            log::debug!(
                "Surface resized to {}x{}; size-dependent persistent textures drop at reset",
                resized.width,
                resized.height
            );
            self.pending_resize = Some(*resized);
            true
        })
    }

    /// Destroy transient natives that were never handed to an executor.
    fn destroy_transients(&mut self) {
        let natives: Vec<_> = self
            .allocation_natives
            .drain(..)
            .flatten()
            .chain(self.view_natives.drain(..))
            .collect();
        if !natives.is_empty() {
            log::trace!("Destroying {} unsubmitted transient resources", natives.len());
        }
        for native in natives {
            self.device.destroy(native);
        }
    }
}

impl Drop for RenderGraph {
    fn drop(&mut self) {
        self.destroy_transients();
        let natives: Vec<_> = self
            .pending_destroy
            .drain(..)
            .chain(self.resources.take_persistent_natives())
            .collect();
        for native in natives {
            self.device.destroy(native);
        }
    }
}

impl std::fmt::Debug for RenderGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderGraph")
            .field("backend", &self.device.name())
            .field("state", &self.state)
            .field("passes", &self.passes.len())
            .field("resources", &self.resources.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDevice;
    use crate::types::{ClearValue, TextureFormat, TextureUsage};

    fn graph() -> (DummyDevice, RenderGraph) {
        let device = DummyDevice::new();
        let graph = RenderGraph::new(Arc::new(device.clone()), RenderGraphCreateInfo::default())
            .unwrap();
        (device, graph)
    }

    fn color() -> TextureDescriptor {
        TextureDescriptor::new_2d(
            128,
            128,
            TextureFormat::Rgba8Unorm,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        )
    }

    #[test]
    fn test_rejects_invalid_info() {
        let info = RenderGraphCreateInfo::default().with_heap_budget_mib(0);
        assert!(RenderGraph::new(Arc::new(DummyDevice::new()), info).is_err());
    }

    #[test]
    fn test_failed_setup_adds_nothing() {
        let (_, mut graph) = graph();
        graph.create_texture(color(), "Color").unwrap();
        let nodes = graph.nodes().node_count();

        let err = graph
            .add_render_pass(
                "Opaque",
                |builder| {
                    builder.add_render_target(
                        0,
                        "Color",
                        LoadAction::Clear,
                        ClearValue::BLACK,
                        StoreAction::Store,
                    )?;
                    builder.add_input("albedo", "Missing")?;
                    Ok(())
                },
                |_, _| Ok(()),
            )
            .unwrap_err();

        assert!(matches!(err, GraphError::UnknownResource { .. }));
        assert_eq!(graph.nodes().node_count(), nodes);
        assert_eq!(graph.nodes().edge_count(), 0);
        assert!(graph.passes().is_empty());
        assert_eq!(graph.state(), GraphState::Failed);
    }

    #[test]
    fn test_failed_graph_keeps_lookups() {
        let (_, mut graph) = graph();
        graph.create_texture(color(), "Color").unwrap();
        assert!(graph.create_texture(color(), "Color").is_err());

        assert_eq!(graph.state(), GraphState::Failed);
        assert!(graph.get_texture("Color").is_ok());
        assert_eq!(
            graph.compile(),
            Err(GraphError::DuplicateName("Color".into()))
        );
        assert!(matches!(
            graph.create_buffer(BufferDescriptor::uniform(16), "Other"),
            Err(GraphError::InvalidState(_))
        ));

        graph.reset().unwrap();
        assert_eq!(graph.state(), GraphState::Building);
        assert!(graph.error().is_none());
    }

    #[test]
    fn test_build_after_compile_rejected() {
        let (_, mut graph) = graph();
        graph.compile().unwrap();
        assert_eq!(
            graph.create_texture(color(), "Late"),
            Err(GraphError::AlreadyCompiled)
        );
        assert_eq!(graph.compile(), Err(GraphError::AlreadyCompiled));
        // Rejected builder calls do not poison a compiled graph.
        assert_eq!(graph.state(), GraphState::Compiled);
    }

    #[test]
    fn test_duplicate_pass_name() {
        let (_, mut graph) = graph();
        graph
            .add_compute_pass("Cull", |_| Ok(()), |_, _| Ok(()))
            .unwrap();
        assert_eq!(
            graph.add_compute_pass("Cull", |_| Ok(()), |_, _| Ok(())),
            Err(GraphError::DuplicateName("Cull".into()))
        );
    }

    #[test]
    fn test_native_lookup_before_materialization() {
        let (_, mut graph) = graph();
        let texture = graph.create_texture(color(), "Color").unwrap();
        assert_eq!(
            graph.native_texture(texture),
            Err(GraphError::NotMaterialized("Color".into()))
        );
    }

    #[test]
    fn test_handle_event_resize() {
        let (_, mut graph) = graph();
        let mut resized = SurfaceResized {
            width: 640,
            height: 480,
        };
        assert!(graph.handle_event(&mut resized));
    }

    #[test]
    fn test_handle_event_ignores_other_events() {
        #[derive(Debug)]
        struct KeyPressed;
        impl Event for KeyPressed {
            fn name(&self) -> &'static str {
                "KeyPressed"
            }
        }

        let (_, mut graph) = graph();
        assert!(!graph.handle_event(&mut KeyPressed));
    }
}
