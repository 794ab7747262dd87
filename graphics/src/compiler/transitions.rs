//! Per-subresource state tracking and barrier planning.

use fixedbitset::FixedBitSet;

use crate::graph::{DependencyGraph, Edge, EdgeFlags, EdgeKind, Pass, ResourceHandle, ResourceRegistry, StoreAction};
use crate::types::{ResourceState, SubresourceRange};

use super::{AttachmentTransition, CompiledPass, Transition};

/// Flat index of a subresource within its root, layer-major.
fn flat(full: &SubresourceRange, mip: u32, layer: u32) -> usize {
    (layer * full.mip_level_count + mip) as usize
}

/// Accesses of one pass to one root resource.
struct RootAccess {
    root: u32,
    edges: Vec<Edge>,
    /// Combined state per subresource, `None` where untouched.
    desired: Vec<Option<ResourceState>>,
    /// Whether every access to the subresource is an attachment.
    attachment_only: Vec<bool>,
}

/// Walks the schedule tracking the state of every subresource.
pub(super) struct StateTracker {
    /// Current states by registry index; empty for views.
    states: Vec<Vec<ResourceState>>,
    /// Roots touched by a scheduled pass.
    touched: FixedBitSet,
    /// Roots whose latest contents were written with `StoreAction::DontCare`.
    discarded: FixedBitSet,
}

impl StateTracker {
    pub(super) fn new(registry: &ResourceRegistry) -> Self {
        Self {
            states: registry
                .iter()
                .map(|(_, resource)| resource.initial_states().to_vec())
                .collect(),
            touched: FixedBitSet::with_capacity(registry.len()),
            discarded: FixedBitSet::with_capacity(registry.len()),
        }
    }

    /// Fill the transitions and attachment transitions of one step.
    pub(super) fn plan_pass(
        &mut self,
        nodes: &DependencyGraph,
        registry: &ResourceRegistry,
        pass: &Pass,
        step: &mut CompiledPass,
    ) {
        let accesses = self.group(nodes, registry, pass);

        for access in &accesses {
            let full = registry.full_range(access.root);
            let reads = access
                .edges
                .iter()
                .any(|edge| edge.kind == EdgeKind::Read && !edge.is_prior_read());
            if reads && self.discarded.contains(access.root as usize) {
                log::warn!(
                    "Pass '{}' reads '{}' after it was stored with StoreAction::DontCare",
                    pass.name(),
                    registry.get(access.root).name()
                );
            }

            let mut handled = vec![false; access.desired.len()];
            for edge in access
                .edges
                .iter()
                .filter(|edge| !edge.flags.contains(EdgeFlags::ATTACHMENT))
            {
                self.emit(
                    registry.handle(access.root),
                    &full,
                    edge.range,
                    |index| access.desired[index],
                    &mut handled,
                    &mut step.transitions,
                );
            }
        }

        // Attachments see the state before this pass's own updates.
        let desc = pass.desc();
        for target in &desc.color_targets {
            step.attachments.push(self.attachment(
                registry,
                &accesses,
                Some(target.slot),
                target.resource,
                target.load.reads_contents(),
                ResourceState::RENDER_TARGET,
            ));
        }
        if let Some(depth) = &desc.depth_stencil {
            let state = if depth.read_only {
                ResourceState::DEPTH_READ
            } else {
                ResourceState::DEPTH_WRITE
            };
            step.attachments.push(self.attachment(
                registry,
                &accesses,
                None,
                depth.resource,
                depth.loads_contents(),
                state,
            ));
        }

        for access in &accesses {
            let root = access.root as usize;
            self.touched.insert(root);
            if access
                .edges
                .iter()
                .any(|edge| edge.kind == EdgeKind::Write && !edge.flags.contains(EdgeFlags::ATTACHMENT))
            {
                self.discarded.set(root, false);
            }
            for (index, desired) in access.desired.iter().enumerate() {
                if let Some(state) = desired {
                    self.states[root][index] = *state;
                }
            }
        }
        for target in &desc.color_targets {
            let root = registry.root_of(target.resource.index()) as usize;
            self.discarded.set(root, target.store == StoreAction::DontCare);
        }
        if let Some(depth) = desc.depth_stencil.as_ref().filter(|depth| !depth.read_only) {
            let root = registry.root_of(depth.resource.index()) as usize;
            self.discarded.set(root, depth.discards());
        }
    }

    /// Final transitions for sinks and the end states of persistent roots.
    pub(super) fn finish(
        &mut self,
        registry: &ResourceRegistry,
        final_transitions: &mut Vec<Transition>,
        end_states: &mut Vec<(u32, Vec<ResourceState>)>,
    ) {
        for (index, resource) in registry.iter() {
            if resource.parent().is_some() || !resource.is_sink() {
                continue;
            }
            // A persistent resource nothing used yet has no backing to transition.
            if !self.touched.contains(index as usize) && resource.native().is_none() {
                continue;
            }
            let full = registry.range_of(index);
            if let Some(state) = resource.final_state() {
                let mut handled = vec![false; full.subresource_count() as usize];
                self.emit(
                    registry.handle(index),
                    &full,
                    full,
                    |_| Some(state),
                    &mut handled,
                    final_transitions,
                );
                self.states[index as usize].fill(state);
            }
            if resource.is_persistent() {
                end_states.push((index, self.states[index as usize].clone()));
            }
        }
    }

    fn group(
        &self,
        nodes: &DependencyGraph,
        registry: &ResourceRegistry,
        pass: &Pass,
    ) -> Vec<RootAccess> {
        let mut accesses: Vec<RootAccess> = Vec::new();
        for edge in nodes.edges_of(pass.node()) {
            let root = registry.root_of(nodes.node(edge.to).payload());
            let position = match accesses.iter().position(|access| access.root == root) {
                Some(position) => position,
                None => {
                    let count = registry.full_range(root).subresource_count() as usize;
                    accesses.push(RootAccess {
                        root,
                        edges: Vec::new(),
                        desired: vec![None; count],
                        attachment_only: vec![true; count],
                    });
                    accesses.len() - 1
                }
            };
            let access = &mut accesses[position];
            let full = registry.full_range(root);
            for (mip, layer) in edge.range.subresources() {
                let index = flat(&full, mip, layer);
                access.desired[index] =
                    Some(access.desired[index].unwrap_or(ResourceState::UNDEFINED) | edge.state);
                if !edge.flags.contains(EdgeFlags::ATTACHMENT) {
                    access.attachment_only[index] = false;
                }
            }
            access.edges.push(*edge);
        }
        accesses
    }

    fn attachment(
        &self,
        registry: &ResourceRegistry,
        accesses: &[RootAccess],
        slot: Option<u32>,
        resource: ResourceHandle,
        loads: bool,
        attachment_state: ResourceState,
    ) -> AttachmentTransition {
        let root = registry.root_of(resource.index());
        let full = registry.full_range(root);
        let range = registry.range_of(resource.index());
        let index = flat(&full, range.base_mip_level, range.base_array_layer);
        let access = accesses.iter().find(|access| access.root == root);
        let desired = access
            .and_then(|access| access.desired[index])
            .unwrap_or(attachment_state);
        let attachment_only = access.is_none_or(|access| access.attachment_only[index]);

        let initial_state = if !attachment_only {
            // An explicit barrier already moved it into the combined state.
            desired
        } else if loads {
            self.states[root as usize][index]
        } else {
            ResourceState::UNDEFINED
        };
        AttachmentTransition {
            slot,
            resource,
            initial_state,
            final_state: desired,
        }
    }

    /// Transitions moving `range` of a root into the desired states.
    ///
    /// One record covers the range when every subresource moves between the
    /// same pair of states; otherwise each changing subresource gets its own.
    fn emit(
        &self,
        resource: ResourceHandle,
        full: &SubresourceRange,
        range: SubresourceRange,
        desired: impl Fn(usize) -> Option<ResourceState>,
        handled: &mut [bool],
        out: &mut Vec<Transition>,
    ) {
        let states = &self.states[resource.index() as usize];
        let mut changes = Vec::new();
        let mut pending = 0;
        for (mip, layer) in range.subresources() {
            let index = flat(full, mip, layer);
            if handled[index] {
                continue;
            }
            handled[index] = true;
            pending += 1;
            if let Some(dst) = desired(index) {
                if states[index] != dst {
                    changes.push((mip, layer, states[index], dst));
                }
            }
        }
        let Some(&(_, _, src, dst)) = changes.first() else {
            return;
        };

        let uniform = pending == range.subresource_count() as usize
            && changes.len() == pending
            && changes.iter().all(|change| change.2 == src && change.3 == dst);
        if uniform {
            out.push(Transition {
                resource,
                src_state: src,
                dst_state: dst,
                range,
            });
        } else {
            out.extend(changes.into_iter().map(|(mip, layer, src, dst)| Transition {
                resource,
                src_state: src,
                dst_state: dst,
                range: SubresourceRange::single(mip, layer),
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_is_layer_major() {
        let full = SubresourceRange::full(4, 2);
        assert_eq!(flat(&full, 0, 0), 0);
        assert_eq!(flat(&full, 3, 0), 3);
        assert_eq!(flat(&full, 0, 1), 4);
        assert_eq!(flat(&full, 2, 1), 6);
    }
}
