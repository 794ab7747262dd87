//! Render target types for render passes.
//!
//! This module defines the types used to configure render targets (color and depth/stencil
//! attachments) for graphics passes.

use static_assertions::const_assert;

use crate::types::ClearValue;

use super::resource::{ResourceHandle, ResourceKey};

/// Maximum number of color attachments a render pass may bind.
pub const MAX_COLOR_ATTACHMENTS: u32 = 8;

const_assert!(MAX_COLOR_ATTACHMENTS > 0 && MAX_COLOR_ATTACHMENTS <= 8);

/// Operation to perform when loading an attachment at the start of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadAction {
    /// Clear the attachment with the pass's clear value.
    Clear,
    /// Load the existing contents of the attachment.
    Load,
    /// Don't care about the existing contents (may be undefined).
    #[default]
    DontCare,
}

impl LoadAction {
    /// Whether the previous contents are read.
    pub fn reads_contents(self) -> bool {
        self == Self::Load
    }
}

/// Operation to perform when storing an attachment at the end of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreAction {
    /// Store the attachment contents for later use.
    #[default]
    Store,
    /// Don't care about the contents after the pass (may be discarded).
    DontCare,
}

/// A color attachment as resolved by the pass builder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTarget {
    pub slot: u32,
    /// Texture or texture view rendered into.
    pub resource: ResourceHandle,
    pub load: LoadAction,
    pub clear: ClearValue,
    pub store: StoreAction,
}

/// Depth/stencil attachment configuration for a render pass.
///
/// # Example
///
/// ```
/// use ember_graphics::{DepthStencilTarget, LoadAction, StoreAction};
///
/// let depth = DepthStencilTarget::new("Depth")
///     .with_depth(LoadAction::Clear, StoreAction::Store)
///     .with_clear_depth(1.0);
/// assert!(!depth.read_only);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DepthStencilTarget {
    pub resource: ResourceKey,
    pub depth_load: LoadAction,
    pub depth_store: StoreAction,
    pub stencil_load: LoadAction,
    pub stencil_store: StoreAction,
    pub clear_depth: f32,
    pub clear_stencil: u32,
    /// Depth test without depth writes. The attachment is read in `DEPTH_READ`.
    pub read_only: bool,
}

impl DepthStencilTarget {
    /// Depth target that clears to 1.0 and stores, with stencil ignored.
    pub fn new(resource: impl Into<ResourceKey>) -> Self {
        Self {
            resource: resource.into(),
            depth_load: LoadAction::Clear,
            depth_store: StoreAction::Store,
            stencil_load: LoadAction::DontCare,
            stencil_store: StoreAction::DontCare,
            clear_depth: 1.0,
            clear_stencil: 0,
            read_only: false,
        }
    }

    pub fn with_depth(mut self, load: LoadAction, store: StoreAction) -> Self {
        self.depth_load = load;
        self.depth_store = store;
        self
    }

    pub fn with_stencil(mut self, load: LoadAction, store: StoreAction) -> Self {
        self.stencil_load = load;
        self.stencil_store = store;
        self
    }

    pub fn with_clear_depth(mut self, depth: f32) -> Self {
        self.clear_depth = depth;
        self
    }

    pub fn with_clear_stencil(mut self, stencil: u32) -> Self {
        self.clear_stencil = stencil;
        self
    }

    /// Bind for depth testing only; previous contents are loaded.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self.depth_load = LoadAction::Load;
        self.depth_store = StoreAction::Store;
        self
    }

    /// Whether either aspect reads previous contents.
    pub fn loads_contents(&self) -> bool {
        self.read_only || self.depth_load.reads_contents() || self.stencil_load.reads_contents()
    }
}

/// A depth/stencil attachment as resolved by the pass builder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilAttachment {
    pub resource: ResourceHandle,
    pub depth_load: LoadAction,
    pub depth_store: StoreAction,
    pub stencil_load: LoadAction,
    pub stencil_store: StoreAction,
    pub clear_depth: f32,
    pub clear_stencil: u32,
    pub read_only: bool,
}

impl DepthStencilAttachment {
    pub fn loads_contents(&self) -> bool {
        self.read_only || self.depth_load.reads_contents() || self.stencil_load.reads_contents()
    }

    /// Whether any aspect throws away what the pass rendered.
    pub fn discards(&self) -> bool {
        !self.read_only && self.depth_store == StoreAction::DontCare
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_action_default() {
        assert_eq!(LoadAction::default(), LoadAction::DontCare);
        assert_eq!(StoreAction::default(), StoreAction::Store);
        assert!(LoadAction::Load.reads_contents());
        assert!(!LoadAction::Clear.reads_contents());
    }

    #[test]
    fn test_depth_target_builder() {
        let depth = DepthStencilTarget::new("Depth")
            .with_stencil(LoadAction::Load, StoreAction::Store)
            .with_clear_stencil(3);
        assert_eq!(depth.resource, ResourceKey::Name("Depth".into()));
        assert_eq!(depth.clear_stencil, 3);
        assert!(depth.loads_contents());
    }

    #[test]
    fn test_read_only_loads() {
        let depth = DepthStencilTarget::new("Depth").read_only();
        assert!(depth.read_only);
        assert_eq!(depth.depth_load, LoadAction::Load);
        assert!(depth.loads_contents());
    }
}
