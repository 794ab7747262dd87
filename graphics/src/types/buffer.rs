//! Buffer types and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be used as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Buffer can be used as a storage buffer.
        const STORAGE = 1 << 3;
        /// Buffer can be used as an indirect buffer.
        const INDIRECT = 1 << 4;
        /// Buffer can be copied from.
        const COPY_SRC = 1 << 5;
        /// Buffer can be copied to.
        const COPY_DST = 1 << 6;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label. The graph fills it with the resource name when unset.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// A uniform buffer that the CPU refreshes every frame.
    pub fn uniform(size: u64) -> Self {
        Self::new(size, BufferUsage::UNIFORM | BufferUsage::COPY_DST)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Whether two descriptors describe interchangeable allocations.
    pub fn is_alias_compatible(&self, other: &Self) -> bool {
        self.size == other.size && self.usage == other.usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_descriptor() {
        let desc = BufferDescriptor::uniform(256).with_label("camera");
        assert_eq!(desc.size, 256);
        assert!(desc.usage.contains(BufferUsage::UNIFORM | BufferUsage::COPY_DST));
        assert_eq!(desc.label.as_deref(), Some("camera"));
    }

    #[test]
    fn test_alias_compatibility() {
        let a = BufferDescriptor::new(1024, BufferUsage::STORAGE).with_label("a");
        let b = BufferDescriptor::new(1024, BufferUsage::STORAGE).with_label("b");
        let c = BufferDescriptor::new(2048, BufferUsage::STORAGE);
        assert!(a.is_alias_compatible(&b));
        assert!(!a.is_alias_compatible(&c));
    }
}
