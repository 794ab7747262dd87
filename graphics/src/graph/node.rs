//! Arena-indexed node and edge storage.
//!
//! The [`DependencyGraph`] owns every node and edge of one build. Cross
//! references are plain indices, so clearing the arena at reset invalidates
//! all of them at once.
//!
//! The graph is bipartite by construction: an edge always starts at a pass
//! node and ends at a resource node. Each edge is registered on both of its
//! endpoints, in the read list or the write list according to its kind.

use bitflags::bitflags;

use crate::types::{ResourceState, SubresourceRange};

/// Index of a node in the [`DependencyGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of an edge in the [`DependencyGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(u32);

impl EdgeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Object-type tag of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    RenderPass,
    ComputePass,
    PresentPass,
    Texture,
    TextureView,
    Buffer,
    UniformBuffer,
}

impl NodeKind {
    pub fn is_pass(self) -> bool {
        matches!(
            self,
            Self::RenderPass | Self::ComputePass | Self::PresentPass
        )
    }

    pub fn is_resource(self) -> bool {
        !self.is_pass()
    }
}

/// Direction of a pass's access to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Read,
    Write,
}

bitflags! {
    /// Extra information carried by an edge.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EdgeFlags: u8 {
        /// Reads contents from before this frame's writes. Adds no ordering
        /// constraint and keeps no writer alive.
        const PRIOR_STATE = 1 << 0;
        /// Color or depth-stencil attachment; the render pass performs the
        /// state transition itself.
        const ATTACHMENT = 1 << 1;
    }
}

/// One vertex of the dependency graph.
#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    /// Pass index for pass nodes, registry index for resource nodes.
    payload: u32,
    reads: Vec<EdgeId>,
    writes: Vec<EdgeId>,
    order: Option<u32>,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn payload(&self) -> u32 {
        self.payload
    }

    /// Read edges touching this node, in declaration order.
    pub fn reads(&self) -> &[EdgeId] {
        &self.reads
    }

    /// Write edges touching this node, in declaration order.
    pub fn writes(&self) -> &[EdgeId] {
        &self.writes
    }

    /// Topological position for passes, first-use position for resources.
    /// `None` until compiled, and for culled nodes.
    pub fn order(&self) -> Option<u32> {
        self.order
    }
}

/// A pass's access to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
    pub state: ResourceState,
    pub range: SubresourceRange,
    pub flags: EdgeFlags,
}

impl Edge {
    pub fn is_prior_read(&self) -> bool {
        self.kind == EdgeKind::Read && self.flags.contains(EdgeFlags::PRIOR_STATE)
    }
}

/// Nodes and edges of one build.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_node(&mut self, kind: NodeKind, payload: u32) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            payload,
            reads: Vec::new(),
            writes: Vec::new(),
            order: None,
        });
        id
    }

    /// Add an edge from a pass node to a resource node.
    pub(crate) fn connect(
        &mut self,
        pass: NodeId,
        resource: NodeId,
        kind: EdgeKind,
        state: ResourceState,
        range: SubresourceRange,
        flags: EdgeFlags,
    ) -> EdgeId {
        assert!(
            self.nodes[pass.index()].kind.is_pass(),
            "Edges must start at a pass node"
        );
        assert!(
            self.nodes[resource.index()].kind.is_resource(),
            "Edges must end at a resource node"
        );

        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge {
            from: pass,
            to: resource,
            kind,
            state,
            range,
            flags,
        });
        for node in [pass, resource] {
            let node = &mut self.nodes[node.index()];
            match kind {
                EdgeKind::Read => node.reads.push(id),
                EdgeKind::Write => node.writes.push(id),
            }
        }
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Read edges followed by write edges of a node.
    pub fn edges_of(&self, id: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        let node = &self.nodes[id.index()];
        node.reads
            .iter()
            .chain(node.writes.iter())
            .map(move |edge| &self.edges[edge.index()])
    }

    pub(crate) fn set_order(&mut self, id: NodeId, order: Option<u32>) {
        self.nodes[id.index()].order = order;
    }

    pub(crate) fn clear_orders(&mut self) {
        for node in &mut self.nodes {
            node.order = None;
        }
    }

    /// Drop every node and edge, keeping capacity.
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(graph: &mut DependencyGraph, pass: NodeId, resource: NodeId, kind: EdgeKind) {
        graph.connect(
            pass,
            resource,
            kind,
            ResourceState::SHADER_RESOURCE,
            SubresourceRange::WHOLE_BUFFER,
            EdgeFlags::empty(),
        );
    }

    #[test]
    fn test_edges_registered_on_both_ends() {
        let mut graph = DependencyGraph::new();
        let pass = graph.add_node(NodeKind::ComputePass, 0);
        let buffer = graph.add_node(NodeKind::Buffer, 0);
        connect(&mut graph, pass, buffer, EdgeKind::Write);

        assert_eq!(graph.node(pass).writes().len(), 1);
        assert_eq!(graph.node(buffer).writes().len(), 1);
        assert!(graph.node(pass).reads().is_empty());
        assert_eq!(graph.edge(graph.node(pass).writes()[0]).to, buffer);
    }

    #[test]
    fn test_read_write_registers_two_edges() {
        let mut graph = DependencyGraph::new();
        let pass = graph.add_node(NodeKind::ComputePass, 0);
        let texture = graph.add_node(NodeKind::Texture, 0);
        connect(&mut graph, pass, texture, EdgeKind::Read);
        connect(&mut graph, pass, texture, EdgeKind::Write);

        assert_eq!(graph.edge_count(), 2);
        let kinds: Vec<_> = graph.edges_of(texture).map(|edge| edge.kind).collect();
        assert_eq!(kinds, vec![EdgeKind::Read, EdgeKind::Write]);
    }

    #[test]
    fn test_edge_lists_keep_declaration_order() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node(NodeKind::RenderPass, 0);
        let b = graph.add_node(NodeKind::RenderPass, 1);
        let texture = graph.add_node(NodeKind::Texture, 0);
        connect(&mut graph, b, texture, EdgeKind::Read);
        connect(&mut graph, a, texture, EdgeKind::Read);

        let readers: Vec<_> = graph
            .node(texture)
            .reads()
            .iter()
            .map(|&edge| graph.edge(edge).from)
            .collect();
        assert_eq!(readers, vec![b, a]);
    }

    #[test]
    #[should_panic(expected = "Edges must start at a pass node")]
    fn test_resource_to_resource_edge_rejected() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node(NodeKind::Texture, 0);
        let b = graph.add_node(NodeKind::Texture, 1);
        connect(&mut graph, a, b, EdgeKind::Write);
    }

    #[test]
    fn test_clear_and_order() {
        let mut graph = DependencyGraph::new();
        let pass = graph.add_node(NodeKind::PresentPass, 0);
        graph.set_order(pass, Some(3));
        assert_eq!(graph.node(pass).order(), Some(3));
        graph.clear_orders();
        assert_eq!(graph.node(pass).order(), None);
        graph.clear();
        assert_eq!(graph.node_count(), 0);
    }
}
