//! Texture types and descriptors.

use super::{Extent3d, SubresourceRange};
use bitflags::bitflags;

/// Texture format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 16-bit red channel, float.
    R16Float,
    /// 32-bit red channel, float.
    R32Float,
    /// 32-bit red channel, unsigned integer.
    R32Uint,
    /// 16-bit RG channels, float.
    Rg16Float,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 8-bit BGRA channels, sRGB.
    Bgra8UnormSrgb,
    /// 10-bit RGB, 2-bit alpha.
    Rgb10a2Unorm,
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RGBA channels, float.
    Rgba32Float,
    /// 16-bit depth.
    Depth16Unorm,
    /// 32-bit depth, float.
    Depth32Float,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// 32-bit depth float with 8-bit stencil.
    Depth32FloatStencil8,
}

impl TextureFormat {
    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm
                | Self::Depth32Float
                | Self::Depth24PlusStencil8
                | Self::Depth32FloatStencil8
        )
    }

    /// Returns true if this format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8 | Self::Depth32FloatStencil8)
    }

    /// Bytes per texel.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::R16Float | Self::Depth16Unorm => 2,
            Self::R32Float
            | Self::R32Uint
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Bgra8UnormSrgb
            | Self::Rgb10a2Unorm
            | Self::Depth32Float
            | Self::Depth24PlusStencil8 => 4,
            Self::Rgba16Float | Self::Depth32FloatStencil8 => 8,
            Self::Rgba32Float => 16,
        }
    }
}

/// Dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    D1,
    #[default]
    D2,
    D3,
}

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be copied from.
        const COPY_SRC = 1 << 0;
        /// Texture can be copied to.
        const COPY_DST = 1 << 1;
        /// Texture can be sampled in a shader.
        const TEXTURE_BINDING = 1 << 2;
        /// Texture can be used as a storage texture.
        const STORAGE_BINDING = 1 << 3;
        /// Texture can be used as a color or depth attachment.
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label. The graph fills it with the resource name when unset.
    pub label: Option<String>,
    pub size: Extent3d,
    pub dimension: TextureDimension,
    pub mip_level_count: u32,
    pub array_layer_count: u32,
    pub sample_count: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Create a 2D texture descriptor with one mip, one layer and no MSAA.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: None,
            size: Extent3d::new_2d(width, height),
            dimension: TextureDimension::D2,
            mip_level_count: 1,
            array_layer_count: 1,
            sample_count: 1,
            format,
            usage,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_mip_levels(mut self, count: u32) -> Self {
        self.mip_level_count = count;
        self
    }

    pub fn with_array_layers(mut self, count: u32) -> Self {
        self.array_layer_count = count;
        self
    }

    pub fn with_sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }

    /// Range covering every mip and layer.
    pub fn full_range(&self) -> SubresourceRange {
        SubresourceRange::full(self.mip_level_count, self.array_layer_count)
    }

    /// Whether every count and dimension is non-zero.
    pub fn is_valid(&self) -> bool {
        !self.size.is_empty()
            && self.mip_level_count > 0
            && self.array_layer_count > 0
            && self.sample_count > 0
    }

    /// Approximate memory footprint, summed over the mip chain.
    pub fn estimated_size(&self) -> u64 {
        let per_layer: u64 = (0..self.mip_level_count)
            .map(|level| self.size.mip_level(level).texel_count())
            .sum();
        per_layer
            * self.array_layer_count as u64
            * self.sample_count as u64
            * self.format.block_size() as u64
    }

    /// Whether two descriptors describe interchangeable allocations.
    ///
    /// Labels are ignored.
    pub fn is_alias_compatible(&self, other: &Self) -> bool {
        self.size == other.size
            && self.dimension == other.dimension
            && self.mip_level_count == other.mip_level_count
            && self.array_layer_count == other.array_layer_count
            && self.sample_count == other.sample_count
            && self.format == other.format
            && self.usage == other.usage
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self::new_2d(1, 1, TextureFormat::default(), TextureUsage::empty())
    }
}

/// Descriptor for a view onto part of a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureViewDescriptor {
    pub label: Option<String>,
    /// Reinterpretation format, or the parent's format when `None`.
    pub format: Option<TextureFormat>,
    pub range: SubresourceRange,
}

impl TextureViewDescriptor {
    /// View of a single mip level of the first layer.
    pub fn mip(level: u32) -> Self {
        Self {
            label: None,
            format: None,
            range: SubresourceRange::single(level, 0),
        }
    }

    /// View of a single array layer with all of its mips.
    pub fn layer(layer: u32, mip_level_count: u32) -> Self {
        Self {
            label: None,
            format: None,
            range: SubresourceRange {
                base_mip_level: 0,
                mip_level_count,
                base_array_layer: layer,
                array_layer_count: 1,
            },
        }
    }

    pub fn with_range(range: SubresourceRange) -> Self {
        Self {
            label: None,
            format: None,
            range,
        }
    }

    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = Some(format);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_formats() {
        assert!(TextureFormat::Depth32Float.is_depth_stencil());
        assert!(!TextureFormat::Depth32Float.has_stencil());
        assert!(TextureFormat::Depth24PlusStencil8.has_stencil());
        assert!(!TextureFormat::Rgba8Unorm.is_depth_stencil());
    }

    #[test]
    fn test_estimated_size() {
        let desc = TextureDescriptor::new_2d(
            1920,
            1080,
            TextureFormat::Rgba8Unorm,
            TextureUsage::RENDER_ATTACHMENT,
        );
        assert_eq!(desc.estimated_size(), 1920 * 1080 * 4);

        let mipped = TextureDescriptor::new_2d(4, 4, TextureFormat::R8Unorm, TextureUsage::empty())
            .with_mip_levels(3);
        assert_eq!(mipped.estimated_size(), 16 + 4 + 1);
    }

    #[test]
    fn test_alias_compatibility_ignores_label() {
        let a = TextureDescriptor::new_2d(
            64,
            64,
            TextureFormat::Rgba16Float,
            TextureUsage::RENDER_ATTACHMENT,
        )
        .with_label("a");
        let b = a.clone().with_label("b");
        let c = a.clone().with_mip_levels(2);
        assert!(a.is_alias_compatible(&b));
        assert!(!a.is_alias_compatible(&c));
    }

    #[test]
    fn test_validity() {
        assert!(TextureDescriptor::default().is_valid());
        assert!(!TextureDescriptor::default().with_mip_levels(0).is_valid());
        assert!(
            !TextureDescriptor::new_2d(0, 16, TextureFormat::R8Unorm, TextureUsage::empty())
                .is_valid()
        );
    }
}
