//! Pass declaration builders.
//!
//! A setup closure receives one of [`RenderPassBuilder`], [`ComputePassBuilder`]
//! or [`PresentPassBuilder`] and declares what the pass touches. Nothing is
//! added to the graph until setup returns `Ok`; on error the graph is left
//! without the pass, its node or any of its edges.

use std::collections::HashSet;

use crate::backend::PipelineHandle;
use crate::error::GraphError;
use crate::types::{ClearValue, ResourceState, ShaderStages};

use super::node::{EdgeFlags, EdgeKind};
use super::pass::{Access, Binding, RenderPassDesc};
use super::resource::{ResourceKey, ResourceKind, ResourceRegistry};
use super::target::{
    DepthStencilAttachment, DepthStencilTarget, LoadAction, MAX_COLOR_ATTACHMENTS, RenderTarget,
    StoreAction,
};

/// What a finished setup hands back to the graph.
#[derive(Debug)]
pub(crate) struct PassDeclaration {
    pub desc: RenderPassDesc,
    pub accesses: Vec<Access>,
    pub never_cull: bool,
}

/// Shared state of the pass builders.
struct PassBuilderCore<'a> {
    registry: &'a ResourceRegistry,
    pass: &'a str,
    desc: RenderPassDesc,
    accesses: Vec<Access>,
    binding_names: HashSet<String>,
    never_cull: bool,
}

impl<'a> PassBuilderCore<'a> {
    fn new(registry: &'a ResourceRegistry, pass: &'a str) -> Self {
        Self {
            registry,
            pass,
            desc: RenderPassDesc::default(),
            accesses: Vec::new(),
            binding_names: HashSet::new(),
            never_cull: false,
        }
    }

    fn resolve(&self, key: &ResourceKey) -> Result<u32, GraphError> {
        self.registry
            .lookup(key)
            .map_err(|_| GraphError::UnknownResource {
                pass: self.pass.to_owned(),
                resource: key.to_string(),
            })
    }

    fn expect_kind(&self, index: u32, allowed: &[ResourceKind]) -> Result<(), GraphError> {
        let resource = self.registry.get(index);
        if allowed.contains(&resource.kind()) {
            Ok(())
        } else {
            Err(GraphError::ResourceKindMismatch {
                name: resource.name().to_owned(),
                expected: allowed[0].name(),
                actual: resource.kind().name(),
            })
        }
    }

    fn claim_binding_name(&mut self, name: &str) -> Result<(), GraphError> {
        if !self.binding_names.insert(name.to_owned()) {
            return Err(GraphError::DuplicateName(format!("{}.{}", self.pass, name)));
        }
        Ok(())
    }

    fn access(&mut self, resource: u32, kind: EdgeKind, state: ResourceState, flags: EdgeFlags) {
        self.accesses.push(Access {
            resource,
            kind,
            state,
            range: self.registry.range_of(resource),
            flags,
        });
    }

    fn input(
        &mut self,
        name: &str,
        key: ResourceKey,
        stages: ShaderStages,
        prior: bool,
    ) -> Result<(), GraphError> {
        let index = self.resolve(&key)?;
        self.claim_binding_name(name)?;
        let state = match self.registry.get(index).kind() {
            ResourceKind::UniformBuffer => ResourceState::VERTEX_AND_CONSTANT_BUFFER,
            _ => ResourceState::SHADER_RESOURCE,
        };
        let flags = if prior {
            EdgeFlags::PRIOR_STATE
        } else {
            EdgeFlags::empty()
        };
        self.access(index, EdgeKind::Read, state, flags);
        self.desc.bindings.push(Binding {
            name: name.to_owned(),
            resource: self.registry.handle(index),
            stages,
            prior,
        });
        Ok(())
    }

    fn storage(&mut self, name: &str, key: ResourceKey, read: bool) -> Result<(), GraphError> {
        let index = self.resolve(&key)?;
        self.expect_kind(
            index,
            &[
                ResourceKind::Buffer,
                ResourceKind::Texture,
                ResourceKind::TextureView,
            ],
        )?;
        self.claim_binding_name(name)?;
        if read {
            self.access(
                index,
                EdgeKind::Read,
                ResourceState::UNORDERED_ACCESS,
                EdgeFlags::empty(),
            );
        }
        self.access(
            index,
            EdgeKind::Write,
            ResourceState::UNORDERED_ACCESS,
            EdgeFlags::empty(),
        );
        self.desc.bindings.push(Binding {
            name: name.to_owned(),
            resource: self.registry.handle(index),
            stages: ShaderStages::COMPUTE,
            prior: false,
        });
        Ok(())
    }

    fn color_target(
        &mut self,
        slot: u32,
        key: ResourceKey,
        load: LoadAction,
        clear: ClearValue,
        store: StoreAction,
    ) -> Result<(), GraphError> {
        let index = self.resolve(&key)?;
        self.expect_kind(index, &[ResourceKind::Texture, ResourceKind::TextureView])?;
        if slot >= MAX_COLOR_ATTACHMENTS {
            return Err(GraphError::InvalidArguments(format!(
                "pass '{}' uses color slot {slot}, the limit is {MAX_COLOR_ATTACHMENTS}",
                self.pass
            )));
        }
        if self
            .registry
            .texture_format(index)
            .is_some_and(|format| format.is_depth_stencil())
        {
            return Err(GraphError::InvalidArguments(format!(
                "'{}' has a depth format and cannot be a color target",
                self.registry.get(index).name()
            )));
        }
        if self.desc.color_targets.iter().any(|target| target.slot == slot) {
            return Err(GraphError::SlotOccupied {
                pass: self.pass.to_owned(),
                slot,
            });
        }

        if load.reads_contents() {
            self.access(
                index,
                EdgeKind::Read,
                ResourceState::RENDER_TARGET,
                EdgeFlags::ATTACHMENT,
            );
        }
        self.access(
            index,
            EdgeKind::Write,
            ResourceState::RENDER_TARGET,
            EdgeFlags::ATTACHMENT,
        );
        self.desc.color_targets.push(RenderTarget {
            slot,
            resource: self.registry.handle(index),
            load,
            clear,
            store,
        });
        Ok(())
    }

    fn depth_stencil(&mut self, target: DepthStencilTarget) -> Result<(), GraphError> {
        let index = self.resolve(&target.resource)?;
        self.expect_kind(index, &[ResourceKind::Texture, ResourceKind::TextureView])?;
        if !self
            .registry
            .texture_format(index)
            .is_some_and(|format| format.is_depth_stencil())
        {
            return Err(GraphError::InvalidArguments(format!(
                "'{}' is not a depth-stencil texture",
                self.registry.get(index).name()
            )));
        }
        if self.desc.depth_stencil.is_some() {
            return Err(GraphError::InvalidArguments(format!(
                "pass '{}' already has a depth-stencil target",
                self.pass
            )));
        }

        if target.read_only {
            self.access(
                index,
                EdgeKind::Read,
                ResourceState::DEPTH_READ,
                EdgeFlags::ATTACHMENT,
            );
        } else {
            if target.loads_contents() {
                self.access(
                    index,
                    EdgeKind::Read,
                    ResourceState::DEPTH_WRITE,
                    EdgeFlags::ATTACHMENT,
                );
            }
            self.access(
                index,
                EdgeKind::Write,
                ResourceState::DEPTH_WRITE,
                EdgeFlags::ATTACHMENT,
            );
        }
        self.desc.depth_stencil = Some(DepthStencilAttachment {
            resource: self.registry.handle(index),
            depth_load: target.depth_load,
            depth_store: target.depth_store,
            stencil_load: target.stencil_load,
            stencil_store: target.stencil_store,
            clear_depth: target.clear_depth,
            clear_stencil: target.clear_stencil,
            read_only: target.read_only,
        });
        Ok(())
    }

    fn finish(mut self) -> PassDeclaration {
        self.desc.color_targets.sort_by_key(|target| target.slot);
        PassDeclaration {
            desc: self.desc,
            accesses: self.accesses,
            never_cull: self.never_cull,
        }
    }
}

// ============================================================================
// Render passes
// ============================================================================

/// Declares the attachments and inputs of a render pass.
///
/// # Example
///
/// ```
/// # use std::sync::Arc;
/// # use ember_graphics::*;
/// # let device = Arc::new(DummyDevice::new());
/// # let mut graph = RenderGraph::new(device, RenderGraphCreateInfo::default()).unwrap();
/// # let desc = TextureDescriptor::new_2d(64, 64, TextureFormat::Rgba8Unorm, TextureUsage::RENDER_ATTACHMENT);
/// # graph.create_texture(desc, "Color").unwrap();
/// graph
///     .add_render_pass(
///         "Opaque",
///         |builder| {
///             builder
///                 .add_render_target(0, "Color", LoadAction::Clear, ClearValue::BLACK, StoreAction::Store)?
///                 .never_cull();
///             Ok(())
///         },
///         |_, ctx| {
///             ctx.draw(3, 1);
///             Ok(())
///         },
///     )
///     .unwrap();
/// ```
pub struct RenderPassBuilder<'a> {
    core: PassBuilderCore<'a>,
}

impl<'a> RenderPassBuilder<'a> {
    pub(crate) fn new(registry: &'a ResourceRegistry, pass: &'a str) -> Self {
        Self {
            core: PassBuilderCore::new(registry, pass),
        }
    }

    pub fn pass_name(&self) -> &str {
        self.core.pass
    }

    /// Bind a texture or view as the color attachment at `slot`.
    ///
    /// `LoadAction::Load` reads the previous contents, so it adds a read edge
    /// next to the write.
    pub fn add_render_target(
        &mut self,
        slot: u32,
        texture: impl Into<ResourceKey>,
        load: LoadAction,
        clear: ClearValue,
        store: StoreAction,
    ) -> Result<&mut Self, GraphError> {
        self.core
            .color_target(slot, texture.into(), load, clear, store)?;
        Ok(self)
    }

    pub fn set_depthstencil(&mut self, target: DepthStencilTarget) -> Result<&mut Self, GraphError> {
        self.core.depth_stencil(target)?;
        Ok(self)
    }

    pub fn set_pipeline(&mut self, pipeline: PipelineHandle) -> &mut Self {
        self.core.desc.pipeline = Some(pipeline);
        self
    }

    /// Sample a resource from every graphics stage.
    pub fn add_input(
        &mut self,
        name: &str,
        resource: impl Into<ResourceKey>,
    ) -> Result<&mut Self, GraphError> {
        self.add_input_with(name, resource, ShaderStages::ALL_GRAPHICS)
    }

    pub fn add_input_with(
        &mut self,
        name: &str,
        resource: impl Into<ResourceKey>,
        stages: ShaderStages,
    ) -> Result<&mut Self, GraphError> {
        self.core.input(name, resource.into(), stages, false)?;
        Ok(self)
    }

    /// Read the contents a resource had before this frame's writes.
    pub fn add_history_input(
        &mut self,
        name: &str,
        resource: impl Into<ResourceKey>,
    ) -> Result<&mut Self, GraphError> {
        self.core
            .input(name, resource.into(), ShaderStages::ALL_GRAPHICS, true)?;
        Ok(self)
    }

    /// Keep the pass even when nothing consumes its outputs.
    pub fn never_cull(&mut self) -> &mut Self {
        self.core.never_cull = true;
        self
    }

    pub(crate) fn finish(self) -> PassDeclaration {
        self.core.finish()
    }
}

// ============================================================================
// Compute passes
// ============================================================================

/// Declares the inputs and unordered-access outputs of a compute pass.
pub struct ComputePassBuilder<'a> {
    core: PassBuilderCore<'a>,
}

impl<'a> ComputePassBuilder<'a> {
    pub(crate) fn new(registry: &'a ResourceRegistry, pass: &'a str) -> Self {
        Self {
            core: PassBuilderCore::new(registry, pass),
        }
    }

    pub fn pass_name(&self) -> &str {
        self.core.pass
    }

    pub fn add_input(
        &mut self,
        name: &str,
        resource: impl Into<ResourceKey>,
    ) -> Result<&mut Self, GraphError> {
        self.core
            .input(name, resource.into(), ShaderStages::COMPUTE, false)?;
        Ok(self)
    }

    pub fn add_history_input(
        &mut self,
        name: &str,
        resource: impl Into<ResourceKey>,
    ) -> Result<&mut Self, GraphError> {
        self.core
            .input(name, resource.into(), ShaderStages::COMPUTE, true)?;
        Ok(self)
    }

    /// Write-only unordered access.
    pub fn add_output(
        &mut self,
        name: &str,
        resource: impl Into<ResourceKey>,
    ) -> Result<&mut Self, GraphError> {
        self.core.storage(name, resource.into(), false)?;
        Ok(self)
    }

    /// Read-write unordered access.
    pub fn add_storage(
        &mut self,
        name: &str,
        resource: impl Into<ResourceKey>,
    ) -> Result<&mut Self, GraphError> {
        self.core.storage(name, resource.into(), true)?;
        Ok(self)
    }

    pub fn set_pipeline(&mut self, pipeline: PipelineHandle) -> &mut Self {
        self.core.desc.pipeline = Some(pipeline);
        self
    }

    pub fn never_cull(&mut self) -> &mut Self {
        self.core.never_cull = true;
        self
    }

    pub(crate) fn finish(self) -> PassDeclaration {
        self.core.finish()
    }
}

// ============================================================================
// Present passes
// ============================================================================

/// Declares the final blit into an external surface.
pub struct PresentPassBuilder<'a> {
    core: PassBuilderCore<'a>,
}

impl<'a> PresentPassBuilder<'a> {
    pub(crate) fn new(registry: &'a ResourceRegistry, pass: &'a str) -> Self {
        Self {
            core: PassBuilderCore::new(registry, pass),
        }
    }

    pub fn pass_name(&self) -> &str {
        self.core.pass
    }

    pub fn add_input(
        &mut self,
        name: &str,
        resource: impl Into<ResourceKey>,
    ) -> Result<&mut Self, GraphError> {
        self.core
            .input(name, resource.into(), ShaderStages::ALL_GRAPHICS, false)?;
        Ok(self)
    }

    /// Render into an imported texture and present it at submit.
    pub fn set_present_target(
        &mut self,
        texture: impl Into<ResourceKey>,
    ) -> Result<&mut Self, GraphError> {
        let key = texture.into();
        let index = self.core.resolve(&key)?;
        self.core.expect_kind(index, &[ResourceKind::Texture])?;
        let resource = self.core.registry.get(index);
        if !resource.is_external() {
            return Err(GraphError::InvalidArguments(format!(
                "present target '{}' must be an imported texture",
                resource.name()
            )));
        }
        if self.core.desc.present_target.is_some() {
            return Err(GraphError::InvalidArguments(format!(
                "pass '{}' already has a present target",
                self.core.pass
            )));
        }
        self.core.color_target(
            0,
            key,
            LoadAction::DontCare,
            ClearValue::BLACK,
            StoreAction::Store,
        )?;
        self.core.desc.present_target = Some(self.core.registry.handle(index));
        Ok(self)
    }

    pub(crate) fn finish(self) -> Result<PassDeclaration, GraphError> {
        if self.core.desc.present_target.is_none() {
            return Err(GraphError::InvalidArguments(format!(
                "present pass '{}' has no present target",
                self.core.pass
            )));
        }
        Ok(self.core.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::GpuTexture;
    use crate::graph::node::DependencyGraph;
    use crate::types::{BufferDescriptor, BufferUsage, TextureDescriptor, TextureFormat, TextureUsage};

    fn registry() -> (DependencyGraph, ResourceRegistry) {
        let mut nodes = DependencyGraph::new();
        let mut registry = ResourceRegistry::new();
        let color = TextureDescriptor::new_2d(
            64,
            64,
            TextureFormat::Rgba8Unorm,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        );
        let depth = TextureDescriptor::new_2d(
            64,
            64,
            TextureFormat::Depth32Float,
            TextureUsage::RENDER_ATTACHMENT,
        );
        registry.create_texture(&mut nodes, color.clone(), "Color").unwrap();
        registry.create_texture(&mut nodes, depth, "Depth").unwrap();
        registry.create_uniform_buffer(&mut nodes, 256, "Camera").unwrap();
        registry
            .create_buffer(&mut nodes, BufferDescriptor::new(1024, BufferUsage::STORAGE), "Particles")
            .unwrap();
        registry
            .import_texture(
                &mut nodes,
                "Swapchain",
                GpuTexture::from_raw(99),
                color,
                ResourceState::UNDEFINED,
            )
            .unwrap();
        (nodes, registry)
    }

    #[test]
    fn test_clear_target_writes_once() {
        let (_, registry) = registry();
        let mut builder = RenderPassBuilder::new(&registry, "Opaque");
        builder
            .add_render_target(0, "Color", LoadAction::Clear, ClearValue::BLACK, StoreAction::Store)
            .unwrap();
        let decl = builder.finish();

        assert_eq!(decl.accesses.len(), 1);
        assert_eq!(decl.accesses[0].kind, EdgeKind::Write);
        assert_eq!(decl.accesses[0].state, ResourceState::RENDER_TARGET);
        assert!(decl.accesses[0].flags.contains(EdgeFlags::ATTACHMENT));
    }

    #[test]
    fn test_load_target_reads_and_writes() {
        let (_, registry) = registry();
        let mut builder = RenderPassBuilder::new(&registry, "Decals");
        builder
            .add_render_target(0, "Color", LoadAction::Load, ClearValue::BLACK, StoreAction::Store)
            .unwrap();
        let kinds: Vec<_> = builder.finish().accesses.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![EdgeKind::Read, EdgeKind::Write]);
    }

    #[test]
    fn test_slot_errors() {
        let (_, registry) = registry();
        let mut builder = RenderPassBuilder::new(&registry, "Opaque");
        builder
            .add_render_target(1, "Color", LoadAction::Clear, ClearValue::BLACK, StoreAction::Store)
            .unwrap();

        let err = builder
            .add_render_target(1, "Color", LoadAction::Clear, ClearValue::BLACK, StoreAction::Store)
            .err();
        assert_eq!(
            err,
            Some(GraphError::SlotOccupied {
                pass: "Opaque".into(),
                slot: 1
            })
        );

        let err = builder
            .add_render_target(8, "Color", LoadAction::Clear, ClearValue::BLACK, StoreAction::Store)
            .err();
        assert!(matches!(err, Some(GraphError::InvalidArguments(_))));
    }

    #[test]
    fn test_depth_format_rules() {
        let (_, registry) = registry();
        let mut builder = RenderPassBuilder::new(&registry, "Opaque");
        assert!(matches!(
            builder
                .add_render_target(0, "Depth", LoadAction::Clear, ClearValue::BLACK, StoreAction::Store)
                .err(),
            Some(GraphError::InvalidArguments(_))
        ));
        assert!(matches!(
            builder.set_depthstencil(DepthStencilTarget::new("Color")).err(),
            Some(GraphError::InvalidArguments(_))
        ));
        builder
            .set_depthstencil(DepthStencilTarget::new("Depth"))
            .unwrap();
        let decl = builder.finish();
        assert_eq!(decl.accesses.len(), 1);
        assert_eq!(decl.accesses[0].state, ResourceState::DEPTH_WRITE);
    }

    #[test]
    fn test_read_only_depth_is_single_read() {
        let (_, registry) = registry();
        let mut builder = RenderPassBuilder::new(&registry, "Transparent");
        builder
            .set_depthstencil(DepthStencilTarget::new("Depth").read_only())
            .unwrap();
        let decl = builder.finish();
        assert_eq!(decl.accesses.len(), 1);
        assert_eq!(decl.accesses[0].kind, EdgeKind::Read);
        assert_eq!(decl.accesses[0].state, ResourceState::DEPTH_READ);
    }

    #[test]
    fn test_uniform_input_state() {
        let (_, registry) = registry();
        let mut builder = RenderPassBuilder::new(&registry, "Opaque");
        builder.add_input("camera", "Camera").unwrap();
        let decl = builder.finish();
        assert_eq!(
            decl.accesses[0].state,
            ResourceState::VERTEX_AND_CONSTANT_BUFFER
        );
        assert_eq!(decl.desc.bindings[0].stages, ShaderStages::ALL_GRAPHICS);
    }

    #[test]
    fn test_duplicate_binding_and_unknown_resource() {
        let (_, registry) = registry();
        let mut builder = ComputePassBuilder::new(&registry, "Simulate");
        builder.add_storage("particles", "Particles").unwrap();
        assert!(matches!(
            builder.add_input("particles", "Camera").err(),
            Some(GraphError::DuplicateName(_))
        ));
        assert_eq!(
            builder.add_input("noise", "Noise").err(),
            Some(GraphError::UnknownResource {
                pass: "Simulate".into(),
                resource: "Noise".into()
            })
        );
    }

    #[test]
    fn test_storage_is_read_write() {
        let (_, registry) = registry();
        let mut builder = ComputePassBuilder::new(&registry, "Simulate");
        builder.add_storage("particles", "Particles").unwrap();
        builder.add_history_input("history", "Color").unwrap();
        let decl = builder.finish();
        assert_eq!(decl.accesses.len(), 3);
        assert!(decl.accesses[2].flags.contains(EdgeFlags::PRIOR_STATE));
        assert!(matches!(
            ComputePassBuilder::new(&registry, "Bad")
                .add_output("camera", "Camera")
                .err(),
            Some(GraphError::ResourceKindMismatch { .. })
        ));
    }

    #[test]
    fn test_present_target_must_be_external() {
        let (_, registry) = registry();
        let mut builder = PresentPassBuilder::new(&registry, "Present");
        assert!(matches!(
            builder.set_present_target("Color").err(),
            Some(GraphError::InvalidArguments(_))
        ));
        builder.add_input("scene", "Color").unwrap();
        builder.set_present_target("Swapchain").unwrap();
        let decl = builder.finish().unwrap();
        assert!(decl.desc.present_target.is_some());
        assert_eq!(decl.desc.color_targets.len(), 1);
    }

    #[test]
    fn test_present_without_target_fails() {
        let (_, registry) = registry();
        let builder = PresentPassBuilder::new(&registry, "Present");
        assert!(builder.finish().is_err());
    }
}
