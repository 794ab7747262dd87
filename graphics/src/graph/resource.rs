//! Virtual resources and their registry.
//!
//! Every resource a graph knows about is a [`VirtualResource`]: a unique name,
//! a descriptor, and, once materialized, a native backing. Registration adds
//! a resource node to the [`DependencyGraph`] with no edges. Native objects are
//! created lazily while recording, right before the first live pass that
//! touches the resource, so culled resources are never allocated.
//!
//! Handles carry the generation of the build that issued them. Every reset
//! draws a new generation, which invalidates all outstanding handles at once.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;

use crate::backend::{GpuBuffer, GpuTexture, NativeResource};
use crate::error::GraphError;
use crate::types::{
    BufferDescriptor, ResourceState, SubresourceRange, TextureDescriptor, TextureFormat,
    TextureViewDescriptor,
};

use super::node::{DependencyGraph, NodeId, NodeKind};

/// A fresh generation, unique across every graph in the process.
fn next_generation() -> u32 {
    static GENERATION: AtomicU32 = AtomicU32::new(1);
    GENERATION.fetch_add(1, Ordering::Relaxed)
}

// ============================================================================
// Handles
// ============================================================================

/// Untyped handle to a resource in the render graph.
///
/// Handles use a generation counter to detect stale references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    index: u32,
    generation: u32,
}

impl ResourceHandle {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(ResourceHandle);

        impl $name {
            pub fn handle(self) -> ResourceHandle {
                self.0
            }
        }

        impl From<$name> for ResourceHandle {
            fn from(handle: $name) -> Self {
                handle.0
            }
        }
    };
}

typed_handle!(
    /// Handle to a texture resource.
    TextureHandle
);
typed_handle!(
    /// Handle to a texture view resource.
    TextureViewHandle
);
typed_handle!(
    /// Handle to a buffer or uniform buffer resource.
    BufferHandle
);

/// A reference to a resource by name or by handle.
///
/// Builder methods accept anything convertible into a key, so passes can name
/// resources declared elsewhere without threading handles through.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    Name(String),
    Handle(ResourceHandle),
}

impl From<&str> for ResourceKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for ResourceKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&String> for ResourceKey {
    fn from(name: &String) -> Self {
        Self::Name(name.clone())
    }
}

impl From<ResourceHandle> for ResourceKey {
    fn from(handle: ResourceHandle) -> Self {
        Self::Handle(handle)
    }
}

impl From<TextureHandle> for ResourceKey {
    fn from(handle: TextureHandle) -> Self {
        Self::Handle(handle.0)
    }
}

impl From<TextureViewHandle> for ResourceKey {
    fn from(handle: TextureViewHandle) -> Self {
        Self::Handle(handle.0)
    }
}

impl From<BufferHandle> for ResourceKey {
    fn from(handle: BufferHandle) -> Self {
        Self::Handle(handle.0)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Handle(handle) => write!(f, "#{}@{}", handle.index, handle.generation),
        }
    }
}

// ============================================================================
// Resources
// ============================================================================

/// Kind of a virtual resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Texture,
    TextureView,
    Buffer,
    UniformBuffer,
}

impl ResourceKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Texture => "texture",
            Self::TextureView => "texture view",
            Self::Buffer => "buffer",
            Self::UniformBuffer => "uniform buffer",
        }
    }

    pub fn is_texture_like(self) -> bool {
        matches!(self, Self::Texture | Self::TextureView)
    }

    pub fn is_buffer_like(self) -> bool {
        matches!(self, Self::Buffer | Self::UniformBuffer)
    }

    fn node_kind(self) -> NodeKind {
        match self {
            Self::Texture => NodeKind::Texture,
            Self::TextureView => NodeKind::TextureView,
            Self::Buffer => NodeKind::Buffer,
            Self::UniformBuffer => NodeKind::UniformBuffer,
        }
    }
}

/// Creation descriptor of a virtual resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceDesc {
    Texture(TextureDescriptor),
    TextureView {
        /// Registry index of the viewed texture.
        parent: u32,
        desc: TextureViewDescriptor,
    },
    Buffer(BufferDescriptor),
}

bitflags! {
    /// Lifetime flags of a virtual resource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceFlags: u8 {
        /// Imported; owned outside the graph and never destroyed by it.
        const EXTERNAL = 1 << 0;
        /// Survives reset together with its backing and last state.
        const PERSISTENT = 1 << 1;
    }
}

/// A named resource declared in the graph.
#[derive(Debug, Clone)]
pub struct VirtualResource {
    name: String,
    kind: ResourceKind,
    desc: ResourceDesc,
    flags: ResourceFlags,
    node: NodeId,
    /// Per-subresource state at the start of the graph, layer-major.
    initial_states: Vec<ResourceState>,
    final_state: Option<ResourceState>,
    native: Option<NativeResource>,
    persistent_slot: Option<usize>,
}

impl VirtualResource {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn desc(&self) -> &ResourceDesc {
        &self.desc
    }

    pub fn flags(&self) -> ResourceFlags {
        self.flags
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn is_external(&self) -> bool {
        self.flags.contains(ResourceFlags::EXTERNAL)
    }

    pub fn is_persistent(&self) -> bool {
        self.flags.contains(ResourceFlags::PERSISTENT)
    }

    /// External or persistent: its effect outlives the graph.
    pub fn is_sink(&self) -> bool {
        self.flags
            .intersects(ResourceFlags::EXTERNAL | ResourceFlags::PERSISTENT)
    }

    pub fn native(&self) -> Option<NativeResource> {
        self.native
    }

    pub fn final_state(&self) -> Option<ResourceState> {
        self.final_state
    }

    pub fn initial_states(&self) -> &[ResourceState] {
        &self.initial_states
    }

    pub fn texture_descriptor(&self) -> Option<&TextureDescriptor> {
        match &self.desc {
            ResourceDesc::Texture(desc) => Some(desc),
            _ => None,
        }
    }

    pub fn buffer_descriptor(&self) -> Option<&BufferDescriptor> {
        match &self.desc {
            ResourceDesc::Buffer(desc) => Some(desc),
            _ => None,
        }
    }

    /// Registry index of the viewed texture, for views.
    pub fn parent(&self) -> Option<u32> {
        match &self.desc {
            ResourceDesc::TextureView { parent, .. } => Some(*parent),
            _ => None,
        }
    }

    /// Approximate bytes needed to back this resource. Zero for views.
    pub fn estimated_size(&self) -> u64 {
        match &self.desc {
            ResourceDesc::Texture(desc) => desc.estimated_size(),
            ResourceDesc::Buffer(desc) => desc.size,
            ResourceDesc::TextureView { .. } => 0,
        }
    }
}

/// Backing kept alive across resets for a persistent resource.
#[derive(Debug, Clone)]
struct PersistentEntry {
    name: String,
    kind: ResourceKind,
    desc: ResourceDesc,
    native: Option<NativeResource>,
    states: Vec<ResourceState>,
    final_state: Option<ResourceState>,
}

/// Owns the virtual resources of one graph instance.
#[derive(Debug)]
pub struct ResourceRegistry {
    generation: u32,
    resources: Vec<VirtualResource>,
    by_name: HashMap<String, u32>,
    persistent: Vec<PersistentEntry>,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self {
            generation: next_generation(),
            resources: Vec::new(),
            by_name: HashMap::new(),
            persistent: Vec::new(),
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, index: u32) -> &VirtualResource {
        &self.resources[index as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &VirtualResource)> + '_ {
        self.resources
            .iter()
            .enumerate()
            .map(|(index, resource)| (index as u32, resource))
    }

    pub fn handle(&self, index: u32) -> ResourceHandle {
        ResourceHandle {
            index,
            generation: self.generation,
        }
    }

    fn insert(
        &mut self,
        nodes: &mut DependencyGraph,
        name: &str,
        kind: ResourceKind,
        desc: ResourceDesc,
        flags: ResourceFlags,
        initial_states: Vec<ResourceState>,
        native: Option<NativeResource>,
    ) -> Result<ResourceHandle, GraphError> {
        if self.by_name.contains_key(name) {
            return Err(GraphError::DuplicateName(name.to_owned()));
        }
        let index = self.resources.len() as u32;
        let node = nodes.add_node(kind.node_kind(), index);
        self.resources.push(VirtualResource {
            name: name.to_owned(),
            kind,
            desc,
            flags,
            node,
            initial_states,
            final_state: None,
            native,
            persistent_slot: None,
        });
        self.by_name.insert(name.to_owned(), index);
        log::trace!("Registered {} '{}' as #{}", kind.name(), name, index);
        Ok(self.handle(index))
    }

    pub fn create_texture(
        &mut self,
        nodes: &mut DependencyGraph,
        mut desc: TextureDescriptor,
        name: &str,
    ) -> Result<TextureHandle, GraphError> {
        if !desc.is_valid() {
            return Err(GraphError::InvalidArguments(format!(
                "texture '{name}' has a zero extent, mip, layer or sample count"
            )));
        }
        desc.label.get_or_insert_with(|| name.to_owned());
        let states = vec![ResourceState::UNDEFINED; desc.full_range().subresource_count() as usize];
        self.insert(
            nodes,
            name,
            ResourceKind::Texture,
            ResourceDesc::Texture(desc),
            ResourceFlags::empty(),
            states,
            None,
        )
        .map(TextureHandle)
    }

    pub fn create_buffer(
        &mut self,
        nodes: &mut DependencyGraph,
        desc: BufferDescriptor,
        name: &str,
    ) -> Result<BufferHandle, GraphError> {
        self.insert_buffer(nodes, desc, name, ResourceKind::Buffer)
    }

    /// A buffer read as shader constants, refreshed every frame.
    pub fn create_uniform_buffer(
        &mut self,
        nodes: &mut DependencyGraph,
        size: u64,
        name: &str,
    ) -> Result<BufferHandle, GraphError> {
        self.insert_buffer(
            nodes,
            BufferDescriptor::uniform(size),
            name,
            ResourceKind::UniformBuffer,
        )
    }

    fn insert_buffer(
        &mut self,
        nodes: &mut DependencyGraph,
        mut desc: BufferDescriptor,
        name: &str,
        kind: ResourceKind,
    ) -> Result<BufferHandle, GraphError> {
        if desc.size == 0 {
            return Err(GraphError::InvalidArguments(format!(
                "buffer '{name}' has zero size"
            )));
        }
        desc.label.get_or_insert_with(|| name.to_owned());
        self.insert(
            nodes,
            name,
            kind,
            ResourceDesc::Buffer(desc),
            ResourceFlags::empty(),
            vec![ResourceState::UNDEFINED],
            None,
        )
        .map(BufferHandle)
    }

    pub fn create_texture_view(
        &mut self,
        nodes: &mut DependencyGraph,
        texture: TextureHandle,
        mut desc: TextureViewDescriptor,
        name: &str,
    ) -> Result<TextureViewHandle, GraphError> {
        let parent = self.validate(texture.0)?;
        let parent_desc = self
            .get(parent)
            .texture_descriptor()
            .ok_or_else(|| GraphError::ResourceKindMismatch {
                name: self.get(parent).name.clone(),
                expected: ResourceKind::Texture.name(),
                actual: self.get(parent).kind.name(),
            })?;
        if desc.range.subresource_count() == 0 || !parent_desc.full_range().contains(&desc.range) {
            return Err(GraphError::InvalidArguments(format!(
                "view '{name}' range {:?} lies outside its texture",
                desc.range
            )));
        }
        desc.label.get_or_insert_with(|| name.to_owned());
        self.insert(
            nodes,
            name,
            ResourceKind::TextureView,
            ResourceDesc::TextureView { parent, desc },
            ResourceFlags::empty(),
            Vec::new(),
            None,
        )
        .map(TextureViewHandle)
    }

    /// Register a texture owned outside the graph, such as a swapchain image.
    pub fn import_texture(
        &mut self,
        nodes: &mut DependencyGraph,
        name: &str,
        native: GpuTexture,
        mut desc: TextureDescriptor,
        initial_state: ResourceState,
    ) -> Result<TextureHandle, GraphError> {
        desc.label.get_or_insert_with(|| name.to_owned());
        let states = vec![initial_state; desc.full_range().subresource_count() as usize];
        self.insert(
            nodes,
            name,
            ResourceKind::Texture,
            ResourceDesc::Texture(desc),
            ResourceFlags::EXTERNAL,
            states,
            Some(NativeResource::Texture(native)),
        )
        .map(TextureHandle)
    }

    /// Register a buffer owned outside the graph.
    pub fn import_buffer(
        &mut self,
        nodes: &mut DependencyGraph,
        name: &str,
        native: GpuBuffer,
        mut desc: BufferDescriptor,
        initial_state: ResourceState,
    ) -> Result<BufferHandle, GraphError> {
        desc.label.get_or_insert_with(|| name.to_owned());
        self.insert(
            nodes,
            name,
            ResourceKind::Buffer,
            ResourceDesc::Buffer(desc),
            ResourceFlags::EXTERNAL,
            vec![initial_state],
            Some(NativeResource::Buffer(native)),
        )
        .map(BufferHandle)
    }

    fn find(&self, name: &str, expected: &[ResourceKind]) -> Result<ResourceHandle, GraphError> {
        let index = *self
            .by_name
            .get(name)
            .ok_or_else(|| GraphError::NotFound(name.to_owned()))?;
        let actual = self.get(index).kind;
        if !expected.contains(&actual) {
            return Err(GraphError::ResourceKindMismatch {
                name: name.to_owned(),
                expected: expected[0].name(),
                actual: actual.name(),
            });
        }
        Ok(self.handle(index))
    }

    pub fn get_texture(&self, name: &str) -> Result<TextureHandle, GraphError> {
        self.find(name, &[ResourceKind::Texture]).map(TextureHandle)
    }

    pub fn get_texture_view(&self, name: &str) -> Result<TextureViewHandle, GraphError> {
        self.find(name, &[ResourceKind::TextureView])
            .map(TextureViewHandle)
    }

    /// Finds plain and uniform buffers alike.
    pub fn get_buffer(&self, name: &str) -> Result<BufferHandle, GraphError> {
        self.find(name, &[ResourceKind::Buffer, ResourceKind::UniformBuffer])
            .map(BufferHandle)
    }

    /// Registry index of a handle issued by this build.
    pub fn validate(&self, handle: ResourceHandle) -> Result<u32, GraphError> {
        if handle.generation != self.generation || handle.index as usize >= self.resources.len() {
            return Err(GraphError::StaleHandle);
        }
        Ok(handle.index)
    }

    /// Registry index of a key.
    pub fn lookup(&self, key: &ResourceKey) -> Result<u32, GraphError> {
        match key {
            ResourceKey::Name(name) => self
                .by_name
                .get(name.as_str())
                .copied()
                .ok_or_else(|| GraphError::NotFound(name.clone())),
            ResourceKey::Handle(handle) => self.validate(*handle),
        }
    }

    /// The texture a view looks into, or the resource itself.
    pub fn root_of(&self, index: u32) -> u32 {
        self.get(index).parent().unwrap_or(index)
    }

    /// Subresources covered by an access through this resource.
    pub fn range_of(&self, index: u32) -> SubresourceRange {
        match &self.get(index).desc {
            ResourceDesc::Texture(desc) => desc.full_range(),
            ResourceDesc::TextureView { desc, .. } => desc.range,
            ResourceDesc::Buffer(_) => SubresourceRange::WHOLE_BUFFER,
        }
    }

    /// Every subresource of the root resource.
    pub fn full_range(&self, root: u32) -> SubresourceRange {
        self.range_of(self.root_of(root))
    }

    /// Format seen through a texture or view. `None` for buffers.
    pub fn texture_format(&self, index: u32) -> Option<TextureFormat> {
        match &self.get(index).desc {
            ResourceDesc::Texture(desc) => Some(desc.format),
            ResourceDesc::TextureView { parent, desc } => desc
                .format
                .or_else(|| self.get(*parent).texture_descriptor().map(|d| d.format)),
            ResourceDesc::Buffer(_) => None,
        }
    }

    pub(crate) fn set_final_state(
        &mut self,
        index: u32,
        state: ResourceState,
    ) -> Result<(), GraphError> {
        let resource = &mut self.resources[index as usize];
        if !resource.is_sink() {
            return Err(GraphError::InvalidArguments(format!(
                "final state requested for transient resource '{}'",
                resource.name
            )));
        }
        resource.final_state = Some(state);
        if let Some(slot) = resource.persistent_slot {
            self.persistent[slot].final_state = Some(state);
        }
        Ok(())
    }

    /// Keep a graph-created texture or buffer alive across resets.
    pub(crate) fn mark_persistent(&mut self, index: u32) -> Result<(), GraphError> {
        let resource = &mut self.resources[index as usize];
        if resource.is_external() || resource.kind == ResourceKind::TextureView {
            return Err(GraphError::InvalidArguments(format!(
                "{} '{}' cannot be persistent",
                resource.kind.name(),
                resource.name
            )));
        }
        if resource.persistent_slot.is_some() {
            return Ok(());
        }
        resource.flags |= ResourceFlags::PERSISTENT;
        resource.persistent_slot = Some(self.persistent.len());
        self.persistent.push(PersistentEntry {
            name: resource.name.clone(),
            kind: resource.kind,
            desc: resource.desc.clone(),
            native: None,
            states: resource.initial_states.clone(),
            final_state: resource.final_state,
        });
        Ok(())
    }

    pub(crate) fn set_native(&mut self, index: u32, native: NativeResource) {
        let resource = &mut self.resources[index as usize];
        resource.native = Some(native);
        if let Some(slot) = resource.persistent_slot {
            self.persistent[slot].native = Some(native);
        }
    }

    /// Remember where a persistent resource ended the frame.
    pub(crate) fn store_end_states(&mut self, index: u32, states: &[ResourceState]) {
        if let Some(slot) = self.resources[index as usize].persistent_slot {
            self.persistent[slot].states.clear();
            self.persistent[slot].states.extend_from_slice(states);
        }
    }

    /// Clear every non-persistent resource and re-register persistent ones
    /// under a new generation.
    ///
    /// Persistent entries rejected by `keep` are dropped; their natives are
    /// returned for destruction.
    pub(crate) fn reset(
        &mut self,
        nodes: &mut DependencyGraph,
        mut keep: impl FnMut(&ResourceDesc) -> bool,
    ) -> Vec<NativeResource> {
        self.generation = next_generation();
        self.resources.clear();
        self.by_name.clear();

        let mut dropped = Vec::new();
        let entries = std::mem::take(&mut self.persistent);
        for entry in entries {
            if !keep(&entry.desc) {
                log::debug!("Dropping persistent {} '{}'", entry.kind.name(), entry.name);
                dropped.extend(entry.native);
                continue;
            }
            let index = self.resources.len() as u32;
            let node = nodes.add_node(entry.kind.node_kind(), index);
            self.resources.push(VirtualResource {
                name: entry.name.clone(),
                kind: entry.kind,
                desc: entry.desc.clone(),
                flags: ResourceFlags::PERSISTENT,
                node,
                initial_states: entry.states.clone(),
                final_state: entry.final_state,
                native: entry.native,
                persistent_slot: Some(self.persistent.len()),
            });
            self.by_name.insert(entry.name.clone(), index);
            self.persistent.push(entry);
        }
        dropped
    }

    /// Natives of every persistent resource, emptying the persistent set.
    pub(crate) fn take_persistent_natives(&mut self) -> Vec<NativeResource> {
        self.persistent
            .drain(..)
            .filter_map(|entry| entry.native)
            .collect()
    }
}
