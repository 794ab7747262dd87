//! Recording context handed to pass callbacks.

use std::any::Any;

use crate::backend::{CommandEncoder, PipelineHandle};

use super::pass::PassHandle;

/// Access to the open command buffer while a pass is recorded.
///
/// The render or compute pass scope is already open and the pass's pipeline,
/// if any, is bound.
pub struct RenderPassContext<'a> {
    pass: PassHandle,
    name: &'a str,
    frame_slot: usize,
    encoder: &'a mut (dyn CommandEncoder + 'static),
    user: Option<&'a mut (dyn Any + Send + 'static)>,
}

impl<'a> RenderPassContext<'a> {
    pub(crate) fn new(
        pass: PassHandle,
        name: &'a str,
        frame_slot: usize,
        encoder: &'a mut (dyn CommandEncoder + 'static),
        user: Option<&'a mut (dyn Any + Send + 'static)>,
    ) -> Self {
        Self {
            pass,
            name,
            frame_slot,
            encoder,
            user,
        }
    }

    pub fn pass(&self) -> PassHandle {
        self.pass
    }

    pub fn pass_name(&self) -> &str {
        self.name
    }

    /// Slot of the frame executor recording this pass.
    pub fn frame_slot(&self) -> usize {
        self.frame_slot
    }

    pub fn encoder(&mut self) -> &mut dyn CommandEncoder {
        &mut *self.encoder
    }

    pub fn bind_pipeline(&mut self, pipeline: PipelineHandle) {
        self.encoder.bind_pipeline(pipeline);
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.encoder.draw(vertex_count, instance_count);
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.encoder.dispatch(x, y, z);
    }

    /// The executor's user context, if one of type `T` is set.
    pub fn user_context<T: Any>(&mut self) -> Option<&mut T> {
        self.user.as_mut()?.downcast_mut::<T>()
    }
}
