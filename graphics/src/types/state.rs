//! Resource access states and subresource ranges.

use bitflags::bitflags;

bitflags! {
    /// The state a resource must be in for an access.
    ///
    /// Read states may be combined. A write state is exclusive: a subresource
    /// holding a write state holds nothing else.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceState: u32 {
        /// Vertex or uniform buffer reads.
        const VERTEX_AND_CONSTANT_BUFFER = 1 << 0;
        /// Index buffer reads.
        const INDEX_BUFFER = 1 << 1;
        /// Color attachment writes.
        const RENDER_TARGET = 1 << 2;
        /// Storage (UAV) reads and writes.
        const UNORDERED_ACCESS = 1 << 3;
        /// Depth-stencil attachment writes.
        const DEPTH_WRITE = 1 << 4;
        /// Read-only depth-stencil attachment.
        const DEPTH_READ = 1 << 5;
        /// Sampled or read-only storage access from shaders.
        const SHADER_RESOURCE = 1 << 6;
        /// Indirect draw/dispatch arguments.
        const INDIRECT_ARGUMENT = 1 << 7;
        /// Copy destination.
        const COPY_DEST = 1 << 8;
        /// Copy source.
        const COPY_SOURCE = 1 << 9;
        /// Ready for presentation.
        const PRESENT = 1 << 10;
    }
}

impl ResourceState {
    /// Contents are undefined; the resource has not been used yet.
    pub const UNDEFINED: Self = Self::empty();

    const WRITE_STATES: Self = Self::RENDER_TARGET
        .union(Self::UNORDERED_ACCESS)
        .union(Self::DEPTH_WRITE)
        .union(Self::COPY_DEST);

    /// Whether the state includes a write.
    pub fn is_write(self) -> bool {
        self.intersects(Self::WRITE_STATES)
    }

    /// Whether the state is a non-empty set of read states.
    pub fn is_read_only(self) -> bool {
        !self.is_empty() && !self.is_write()
    }

    /// Whether two states may be held at the same time by one subresource.
    pub fn is_compatible_with(self, other: Self) -> bool {
        self == other || (!self.is_write() && !other.is_write())
    }
}

impl Default for ResourceState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

bitflags! {
    /// Shader stages that see a bound resource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
        const ALL_GRAPHICS = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

/// A rectangle of mip levels and array layers within a resource.
///
/// Buffers always use [`SubresourceRange::WHOLE_BUFFER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubresourceRange {
    pub base_mip_level: u32,
    pub mip_level_count: u32,
    pub base_array_layer: u32,
    pub array_layer_count: u32,
}

impl SubresourceRange {
    /// The single subresource of a buffer.
    pub const WHOLE_BUFFER: Self = Self::full(1, 1);

    /// Every mip and layer of a resource.
    pub const fn full(mip_level_count: u32, array_layer_count: u32) -> Self {
        Self {
            base_mip_level: 0,
            mip_level_count,
            base_array_layer: 0,
            array_layer_count,
        }
    }

    /// A single mip level of a single layer.
    pub const fn single(mip_level: u32, array_layer: u32) -> Self {
        Self {
            base_mip_level: mip_level,
            mip_level_count: 1,
            base_array_layer: array_layer,
            array_layer_count: 1,
        }
    }

    fn mip_end(&self) -> u32 {
        self.base_mip_level + self.mip_level_count
    }

    fn layer_end(&self) -> u32 {
        self.base_array_layer + self.array_layer_count
    }

    /// Whether the two ranges share at least one subresource.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.base_mip_level < other.mip_end()
            && other.base_mip_level < self.mip_end()
            && self.base_array_layer < other.layer_end()
            && other.base_array_layer < self.layer_end()
    }

    /// Whether `other` lies entirely within this range.
    pub fn contains(&self, other: &Self) -> bool {
        other.base_mip_level >= self.base_mip_level
            && other.mip_end() <= self.mip_end()
            && other.base_array_layer >= self.base_array_layer
            && other.layer_end() <= self.layer_end()
    }

    /// Iterate `(mip_level, array_layer)` pairs, layer-major.
    pub fn subresources(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.base_array_layer..self.layer_end())
            .flat_map(move |layer| (self.base_mip_level..self.mip_end()).map(move |mip| (mip, layer)))
    }

    pub fn subresource_count(&self) -> u32 {
        self.mip_level_count * self.array_layer_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_states() {
        assert!(ResourceState::RENDER_TARGET.is_write());
        assert!(ResourceState::UNORDERED_ACCESS.is_write());
        assert!(!ResourceState::SHADER_RESOURCE.is_write());
        assert!(!ResourceState::UNDEFINED.is_read_only());
        assert!((ResourceState::SHADER_RESOURCE | ResourceState::COPY_SOURCE).is_read_only());
    }

    #[test]
    fn test_state_compatibility() {
        let srv = ResourceState::SHADER_RESOURCE;
        let rt = ResourceState::RENDER_TARGET;
        assert!(srv.is_compatible_with(ResourceState::COPY_SOURCE));
        assert!(rt.is_compatible_with(rt));
        assert!(!rt.is_compatible_with(srv));
        assert!(!rt.is_compatible_with(ResourceState::DEPTH_WRITE));
    }

    #[test]
    fn test_range_overlap() {
        let all = SubresourceRange::full(4, 2);
        let mip0 = SubresourceRange::single(0, 0);
        let mip3_layer1 = SubresourceRange::single(3, 1);
        assert!(all.overlaps(&mip0));
        assert!(all.contains(&mip3_layer1));
        assert!(!mip0.overlaps(&mip3_layer1));
        assert!(!SubresourceRange::single(4, 0).overlaps(&all));
    }

    #[test]
    fn test_range_iteration() {
        let range = SubresourceRange {
            base_mip_level: 1,
            mip_level_count: 2,
            base_array_layer: 0,
            array_layer_count: 2,
        };
        let items: Vec<_> = range.subresources().collect();
        assert_eq!(items, vec![(1, 0), (2, 0), (1, 1), (2, 1)]);
        assert_eq!(range.subresource_count(), 4);
    }
}
