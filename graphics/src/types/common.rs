//! Common types shared across the graphics system.

// ============================================================================
// Extent
// ============================================================================

/// Size of a texture in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    /// Depth for 3D textures, 1 otherwise.
    pub depth: u32,
}

impl Extent3d {
    pub fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    pub fn new_2d(width: u32, height: u32) -> Self {
        Self::new(width, height, 1)
    }

    /// Whether any dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.depth == 0
    }

    /// Number of texels covered by this extent.
    pub fn texel_count(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth as u64
    }

    /// Extent of the given mip level, clamped to 1 texel.
    pub fn mip_level(&self, level: u32) -> Self {
        Self {
            width: (self.width >> level).max(1),
            height: (self.height >> level).max(1),
            depth: (self.depth >> level).max(1),
        }
    }
}

impl Default for Extent3d {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

// ============================================================================
// Clear values
// ============================================================================

/// Value written to an attachment when its load action is `Clear`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// RGBA color.
    Color { r: f32, g: f32, b: f32, a: f32 },
    /// Depth and stencil pair.
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    pub fn color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Color { r, g, b, a }
    }

    pub fn depth_stencil(depth: f32, stencil: u32) -> Self {
        Self::DepthStencil { depth, stencil }
    }

    /// Opaque black.
    pub const BLACK: Self = Self::Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };

    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    /// Depth 1.0 (far plane), stencil 0.
    pub const DEPTH_ONE: Self = Self::DepthStencil {
        depth: 1.0,
        stencil: 0,
    };

    pub fn is_color(&self) -> bool {
        matches!(self, Self::Color { .. })
    }
}

impl Default for ClearValue {
    fn default() -> Self {
        Self::BLACK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_mip_levels() {
        let extent = Extent3d::new_2d(1920, 1080);
        assert_eq!(extent.mip_level(1), Extent3d::new_2d(960, 540));
        assert_eq!(extent.mip_level(20), Extent3d::new_2d(1, 1));
    }

    #[test]
    fn test_extent_empty() {
        assert!(Extent3d::new(0, 4, 1).is_empty());
        assert!(!Extent3d::new_2d(4, 4).is_empty());
        assert_eq!(Extent3d::new(2, 3, 4).texel_count(), 24);
    }

    #[test]
    fn test_clear_value_kinds() {
        assert!(ClearValue::BLACK.is_color());
        assert!(!ClearValue::DEPTH_ONE.is_color());
        assert_eq!(
            ClearValue::color(0.0, 0.0, 0.0, 1.0),
            ClearValue::default()
        );
    }
}
