//! Render pass types.

use crate::backend::PipelineHandle;
use crate::error::GraphError;
use crate::types::{ResourceState, ShaderStages, SubresourceRange};

use super::context::RenderPassContext;
use super::node::{EdgeFlags, EdgeKind, NodeId, NodeKind};
use super::resource::ResourceHandle;
use super::target::{DepthStencilAttachment, RenderTarget};
use super::RenderGraph;

/// Handle to a pass, indexing passes in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassHandle(pub(crate) u32);

impl PassHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kind of GPU work a pass records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Rasterization into color/depth attachments.
    Render,
    /// Compute dispatches.
    Compute,
    /// Final blit into an external surface, which is then presented.
    Present,
}

impl PassKind {
    pub(crate) fn node_kind(self) -> NodeKind {
        match self {
            Self::Render => NodeKind::RenderPass,
            Self::Compute => NodeKind::ComputePass,
            Self::Present => NodeKind::PresentPass,
        }
    }

    /// Whether the pass opens a render pass scope.
    pub fn is_graphics(self) -> bool {
        matches!(self, Self::Render | Self::Present)
    }
}

/// A named shader binding of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub resource: ResourceHandle,
    pub stages: ShaderStages,
    /// Reads contents from before this frame's writes.
    pub prior: bool,
}

/// Everything a pass declared during setup.
#[derive(Debug, Clone, Default)]
pub struct RenderPassDesc {
    /// Color attachments, sorted by slot.
    pub color_targets: Vec<RenderTarget>,
    pub depth_stencil: Option<DepthStencilAttachment>,
    pub pipeline: Option<PipelineHandle>,
    pub bindings: Vec<Binding>,
    /// External texture handed to the queue for presentation.
    pub present_target: Option<ResourceHandle>,
}

impl RenderPassDesc {
    pub fn has_attachments(&self) -> bool {
        !self.color_targets.is_empty() || self.depth_stencil.is_some()
    }
}

/// Callback recording a pass's commands. Runs once, when the pass is recorded.
pub type ExecuteFn =
    Box<dyn FnOnce(&mut RenderGraph, &mut RenderPassContext<'_>) -> Result<(), GraphError>>;

/// One access declared by a pass builder, turned into an edge on commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Access {
    /// Registry index of the resource named in the declaration.
    pub resource: u32,
    pub kind: EdgeKind,
    pub state: ResourceState,
    pub range: SubresourceRange,
    pub flags: EdgeFlags,
}

/// A pass in the render graph.
pub struct Pass {
    name: String,
    kind: PassKind,
    desc: RenderPassDesc,
    node: NodeId,
    never_cull: bool,
    execute: Option<ExecuteFn>,
}

impl Pass {
    pub(crate) fn new(
        name: String,
        kind: PassKind,
        desc: RenderPassDesc,
        node: NodeId,
        never_cull: bool,
        execute: ExecuteFn,
    ) -> Self {
        Self {
            name,
            kind,
            desc,
            node,
            never_cull,
            execute: Some(execute),
        }
    }

    /// Get the pass name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PassKind {
        self.kind
    }

    pub fn desc(&self) -> &RenderPassDesc {
        &self.desc
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Whether the pass is kept regardless of its outputs.
    pub fn is_sink(&self) -> bool {
        self.never_cull || self.kind == PassKind::Present
    }

    /// Whether the execute callback has already run.
    pub fn is_executed(&self) -> bool {
        self.execute.is_none()
    }

    pub(crate) fn take_execute(&mut self) -> Option<ExecuteFn> {
        self.execute.take()
    }
}

impl std::fmt::Debug for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pass")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("desc", &self.desc)
            .field("node", &self.node)
            .field("never_cull", &self.never_cull)
            .field("executed", &self.is_executed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::DependencyGraph;

    #[test]
    fn test_present_pass_is_sink() {
        let mut nodes = DependencyGraph::new();
        let node = nodes.add_node(NodeKind::PresentPass, 0);
        let pass = Pass::new(
            "Present".into(),
            PassKind::Present,
            RenderPassDesc::default(),
            node,
            false,
            Box::new(|_, _| Ok(())),
        );
        assert!(pass.is_sink());
        assert!(!pass.is_executed());
    }

    #[test]
    fn test_take_execute_once() {
        let mut nodes = DependencyGraph::new();
        let node = nodes.add_node(NodeKind::ComputePass, 0);
        let mut pass = Pass::new(
            "Cull".into(),
            PassKind::Compute,
            RenderPassDesc::default(),
            node,
            false,
            Box::new(|_, _| Ok(())),
        );
        assert!(!pass.is_sink());
        assert!(pass.take_execute().is_some());
        assert!(pass.take_execute().is_none());
        assert!(pass.is_executed());
    }

    #[test]
    fn test_pass_kind_nodes() {
        assert_eq!(PassKind::Render.node_kind(), NodeKind::RenderPass);
        assert!(PassKind::Present.is_graphics());
        assert!(!PassKind::Compute.is_graphics());
    }
}
