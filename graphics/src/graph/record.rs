//! Recording and submission of a compiled graph.

use crate::backend::{
    ColorAttachmentInfo, DepthStencilAttachmentInfo, NativeResource, RenderPassBeginInfo,
    ResourceBarrier,
};
use crate::compiler::{CompiledPass, Transition};
use crate::error::GraphError;
use crate::executor::FrameExecutor;
use crate::types::ResourceState;

use super::context::RenderPassContext;
use super::pass::{PassHandle, PassKind, RenderPassDesc};
use super::resource::ResourceDesc;
use super::{GraphState, RenderGraph};

/// Pass scope opened on the encoder around the execute callback.
enum Scope {
    Render,
    Compute,
    None,
}

impl RenderGraph {
    /// Open the executor's command buffer. Compiled → Recording.
    pub fn begin_recording(&mut self, executor: &mut FrameExecutor) -> Result<(), GraphError> {
        self.expect_state(GraphState::Compiled, "begin_recording")?;
        executor.begin().map_err(|err| self.fail(err))?;
        self.next_step = 0;
        self.state = GraphState::Recording;
        Ok(())
    }

    /// Record the next pass of the compiled order.
    ///
    /// Materializes the resources first used by the pass, records its
    /// barriers and pass scope, and runs its execute callback.
    pub fn execute_pass(
        &mut self,
        pass: PassHandle,
        executor: &mut FrameExecutor,
    ) -> Result<(), GraphError> {
        self.expect_state(GraphState::Recording, "execute_pass")?;
        let step = self
            .compiled
            .get()
            .and_then(|compiled| compiled.steps().get(self.next_step))
            .cloned();
        let Some(step) = step else {
            return Err(GraphError::InvalidArguments(
                "every scheduled pass is already recorded".into(),
            ));
        };
        if step.pass != pass {
            let name = self.pass(pass).map_or("<unknown>", |pass| pass.name());
            return Err(GraphError::InvalidArguments(format!(
                "pass '{name}' is culled or not next in the compiled order"
            )));
        }

        if let Err(err) = self.record_step(&step, executor) {
            executor.abandon();
            return Err(self.fail(err));
        }
        self.next_step += 1;
        Ok(())
    }

    /// Record the final transitions and close the command buffer.
    /// Recording → Recorded.
    pub fn end_recording(&mut self, executor: &mut FrameExecutor) -> Result<(), GraphError> {
        self.expect_state(GraphState::Recording, "end_recording")?;
        let scheduled = self.compiled.get().map_or(0, |compiled| compiled.steps().len());
        if self.next_step < scheduled {
            return Err(GraphError::InvalidState(format!(
                "only {} of {} passes recorded",
                self.next_step, scheduled
            )));
        }

        let result = (|| {
            let barriers = match self.compiled.get() {
                Some(compiled) => self.barriers(compiled.final_transitions())?,
                None => Vec::new(),
            };
            if !barriers.is_empty() {
                executor.encoder()?.resource_barrier(&barriers);
            }
            executor.end()
        })();
        if let Err(err) = result {
            executor.abandon();
            return Err(self.fail(err));
        }
        self.state = GraphState::Recorded;
        Ok(())
    }

    /// Record every scheduled pass: begin, each pass in order, end.
    pub fn record(&mut self, executor: &mut FrameExecutor) -> Result<(), GraphError> {
        self.begin_recording(executor)?;
        let order = self
            .compiled
            .get()
            .map(|compiled| compiled.pass_order().to_vec())
            .unwrap_or_default();
        for pass in order {
            self.execute_pass(pass, executor)?;
        }
        self.end_recording(executor)
    }

    /// Submit the recorded work, present, and hand transient natives to the
    /// executor for deferred destruction. Recorded → Submitted.
    pub fn submit(&mut self, executor: &mut FrameExecutor) -> Result<(), GraphError> {
        self.expect_state(GraphState::Recorded, "submit")?;
        self.submit_inner(executor).map_err(|err| self.fail(err))?;

        let retired: Vec<NativeResource> = self
            .allocation_natives
            .drain(..)
            .flatten()
            .chain(self.view_natives.drain(..))
            .chain(self.pending_destroy.drain(..))
            .collect();
        log::trace!(
            "Submitted frame on executor {}, retiring {} transient resources",
            executor.slot(),
            retired.len()
        );
        executor.retire(retired);

        if let Some(compiled) = self.compiled.get() {
            for (root, states) in compiled.end_states() {
                self.resources.store_end_states(*root, states);
            }
        }
        self.state = GraphState::Submitted;
        Ok(())
    }

    /// Compile if still building, then record and submit.
    pub fn execute(&mut self, executor: &mut FrameExecutor) -> Result<(), GraphError> {
        if self.state == GraphState::Building {
            self.compile()?;
        }
        self.record(executor)?;
        self.submit(executor)
    }

    fn submit_inner(&self, executor: &mut FrameExecutor) -> Result<(), GraphError> {
        executor.submit()?;
        let queue = executor
            .queue()
            .ok_or(GraphError::ExecutorNotInitialized(executor.slot()))?;
        let Some(compiled) = self.compiled.get() else {
            return Ok(());
        };
        for step in compiled.steps() {
            let pass = &self.passes[step.pass.index()];
            if let Some(target) = pass.desc().present_target {
                let native = self.native_of(target)?;
                if let Some(texture) = native.as_texture() {
                    queue.present(texture)?;
                }
            }
        }
        Ok(())
    }

    fn record_step(
        &mut self,
        step: &CompiledPass,
        executor: &mut FrameExecutor,
    ) -> Result<(), GraphError> {
        self.materialize(step)?;
        let barriers = self.barriers(&step.transitions)?;

        let pass = &mut self.passes[step.pass.index()];
        let name = pass.name().to_owned();
        let kind = pass.kind();
        let desc = pass.desc().clone();
        let execute = pass.take_execute();
        let render_pass = if kind.is_graphics() && desc.has_attachments() {
            Some(self.attachment_infos(step, &desc)?)
        } else {
            None
        };

        log::trace!(
            "Recording pass '{}' ({} barriers, {} first uses)",
            name,
            barriers.len(),
            step.first_uses.len()
        );
        // Every queue records into this executor's single command buffer, so
        // cross-queue waits are already satisfied by submission order.
        if !step.waits_on.is_empty() {
            log::trace!(
                "Pass '{}' on queue {} follows {} passes from other queues",
                name,
                step.queue,
                step.waits_on.len()
            );
        }
        let slot = executor.slot();
        let (encoder, user) = executor.recording_parts()?;
        encoder.push_debug_group(&name);
        if !barriers.is_empty() {
            encoder.resource_barrier(&barriers);
        }
        let scope = match (kind, render_pass) {
            (PassKind::Compute, _) => {
                encoder.begin_compute_pass(&name);
                Scope::Compute
            }
            (_, Some((colors, depth_stencil))) => {
                encoder.begin_render_pass(&RenderPassBeginInfo {
                    label: &name,
                    color_attachments: &colors,
                    depth_stencil,
                })?;
                Scope::Render
            }
            (_, None) => Scope::None,
        };
        if let Some(pipeline) = desc.pipeline {
            encoder.bind_pipeline(pipeline);
        }

        let result = match execute {
            Some(execute) => {
                let mut ctx = RenderPassContext::new(step.pass, &name, slot, &mut *encoder, user);
                execute(self, &mut ctx)
            }
            None => Ok(()),
        };

        match scope {
            Scope::Render => encoder.end_render_pass(),
            Scope::Compute => encoder.end_compute_pass(),
            Scope::None => {}
        }
        encoder.pop_debug_group();
        result
    }

    /// Create natives for the resources first used by a step.
    fn materialize(&mut self, step: &CompiledPass) -> Result<(), GraphError> {
        for handle in &step.first_uses {
            let index = handle.index();
            let resource = self.resources.get(index);
            if resource.native().is_some() {
                continue;
            }

            let native = match resource.desc() {
                ResourceDesc::TextureView { parent, desc } => {
                    let parent = self.resources.get(*parent);
                    let texture = parent
                        .native()
                        .and_then(|native| native.as_texture())
                        .ok_or_else(|| GraphError::NotMaterialized(parent.name().to_owned()))?;
                    let native =
                        NativeResource::TextureView(self.device.create_texture_view(texture, desc)?);
                    self.view_natives.push(native);
                    native
                }
                desc => {
                    let allocation = self
                        .compiled
                        .get()
                        .and_then(|compiled| compiled.allocation_for(index));
                    match allocation {
                        Some(allocation) => match self.allocation_natives[allocation] {
                            Some(native) => native,
                            None => {
                                let native = create_native(self.device.as_ref(), desc)?;
                                self.allocation_natives[allocation] = Some(native);
                                native
                            }
                        },
                        // Persistent: created once, owned by the registry.
                        None => create_native(self.device.as_ref(), desc)?,
                    }
                }
            };
            log::trace!(
                "Materialized {} '{}'",
                resource.kind().name(),
                resource.name()
            );
            self.resources.set_native(index, native);
        }
        Ok(())
    }

    fn barriers(&self, transitions: &[Transition]) -> Result<Vec<ResourceBarrier>, GraphError> {
        transitions
            .iter()
            .map(|transition| {
                Ok(ResourceBarrier {
                    resource: self.native_of(transition.resource)?,
                    src_state: transition.src_state,
                    dst_state: transition.dst_state,
                    range: transition.range,
                })
            })
            .collect()
    }

    fn attachment_infos(
        &self,
        step: &CompiledPass,
        desc: &RenderPassDesc,
    ) -> Result<(Vec<ColorAttachmentInfo>, Option<DepthStencilAttachmentInfo>), GraphError> {
        let transition_of = |slot: Option<u32>| {
            step.attachments
                .iter()
                .find(|attachment| attachment.slot == slot)
        };

        let colors = desc
            .color_targets
            .iter()
            .map(|target| {
                let transition = transition_of(Some(target.slot));
                Ok(ColorAttachmentInfo {
                    slot: target.slot,
                    target: self.native_of(target.resource)?,
                    load: target.load,
                    store: target.store,
                    clear: target.clear,
                    initial_state: transition
                        .map_or(ResourceState::UNDEFINED, |t| t.initial_state),
                    final_state: transition
                        .map_or(ResourceState::RENDER_TARGET, |t| t.final_state),
                })
            })
            .collect::<Result<Vec<_>, GraphError>>()?;

        let depth_stencil = match &desc.depth_stencil {
            Some(depth) => {
                let transition = transition_of(None);
                Some(DepthStencilAttachmentInfo {
                    target: self.native_of(depth.resource)?,
                    depth_load: depth.depth_load,
                    depth_store: depth.depth_store,
                    stencil_load: depth.stencil_load,
                    stencil_store: depth.stencil_store,
                    clear_depth: depth.clear_depth,
                    clear_stencil: depth.clear_stencil,
                    read_only: depth.read_only,
                    initial_state: transition
                        .map_or(ResourceState::UNDEFINED, |t| t.initial_state),
                    final_state: transition
                        .map_or(ResourceState::DEPTH_WRITE, |t| t.final_state),
                })
            }
            None => None,
        };
        Ok((colors, depth_stencil))
    }
}

fn create_native(
    device: &dyn crate::backend::GpuDevice,
    desc: &ResourceDesc,
) -> Result<NativeResource, GraphError> {
    match desc {
        ResourceDesc::Texture(desc) => Ok(NativeResource::Texture(device.create_texture(desc)?)),
        ResourceDesc::Buffer(desc) => Ok(NativeResource::Buffer(device.create_buffer(desc)?)),
        ResourceDesc::TextureView { .. } => Err(GraphError::InvalidArguments(
            "views are created from their parent texture".into(),
        )),
    }
}
