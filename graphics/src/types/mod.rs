//! Common types and descriptors for graph resources.
//!
//! Formats, usage flags, descriptors and the resource state model shared by
//! the builder, the compiler and the backend boundary.

mod buffer;
mod common;
mod state;
mod texture;

pub use buffer::{BufferDescriptor, BufferUsage};
pub use common::{ClearValue, Extent3d};
pub use state::{ResourceState, ShaderStages, SubresourceRange};
pub use texture::{
    TextureDescriptor, TextureDimension, TextureFormat, TextureUsage, TextureViewDescriptor,
};
