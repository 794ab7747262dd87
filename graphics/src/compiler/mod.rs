//! Render graph compilation.
//!
//! This module handles the compilation of a [`RenderGraph`](crate::graph::RenderGraph)
//! into an execution plan ([`CompiledGraph`]). It performs:
//!
//! 1. **Validation** - conflicting states within one pass
//! 2. **Dead code elimination** - passes with no path to a sink are culled
//! 3. **Dependencies** - writers before readers, per root resource
//! 4. **Topological sort** - Kahn's algorithm, ties broken by declaration order
//! 5. **Queue assignment** - graphics or compute, with cross-queue waits
//! 6. **Transition planning** - per-subresource state tracking
//! 7. **Lifetimes and aliasing** - transient allocations
//!
//! Compilation is deterministic: the same declarations and flags always yield
//! the same plan.

mod aliasing;
mod transitions;

use std::collections::BTreeSet;

use ember_core::pool::Poolable;
use fixedbitset::FixedBitSet;

use crate::config::{RenderGraphCreateInfo, ScheduleFlags};
use crate::error::GraphError;
use crate::graph::{DependencyGraph, EdgeKind, Pass, PassHandle, PassKind, ResourceHandle, ResourceRegistry};
use crate::types::{ResourceState, SubresourceRange};

use transitions::StateTracker;

/// An explicit state change recorded as a barrier before a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Root texture or buffer.
    pub resource: ResourceHandle,
    pub src_state: ResourceState,
    pub dst_state: ResourceState,
    pub range: SubresourceRange,
}

/// A state change performed by the render pass itself on an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentTransition {
    /// Color slot, or `None` for the depth-stencil attachment.
    pub slot: Option<u32>,
    /// Texture or view bound as the attachment.
    pub resource: ResourceHandle,
    pub initial_state: ResourceState,
    pub final_state: ResourceState,
}

/// One scheduled pass with everything needed to record it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPass {
    pub pass: PassHandle,
    /// Index into [`RenderGraphCreateInfo::queue_infos`].
    pub queue: usize,
    /// Barriers recorded before the pass.
    pub transitions: Vec<Transition>,
    pub attachments: Vec<AttachmentTransition>,
    /// Resources to materialize right before this pass, roots before views.
    pub first_uses: Vec<ResourceHandle>,
    /// Predecessors scheduled on a different queue.
    pub waits_on: Vec<PassHandle>,
}

/// First and last use of a transient resource, in schedule positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLifetime {
    pub resource: ResourceHandle,
    pub first: u32,
    pub last: u32,
    /// Queue of every pass using the resource, `None` when several queues do.
    pub queue: Option<usize>,
    /// Index into [`CompiledGraph::allocations`].
    pub allocation: usize,
}

/// One native object backing one or more transient resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalAllocation {
    /// Resources sharing the allocation, in lifetime order.
    pub resources: Vec<ResourceHandle>,
    pub size: u64,
}

/// A compiled render graph ready for recording.
///
/// Cleared and refilled in place on every compile.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CompiledGraph {
    pass_order: Vec<PassHandle>,
    steps: Vec<CompiledPass>,
    final_transitions: Vec<Transition>,
    culled_passes: Vec<String>,
    culled_resources: Vec<String>,
    lifetimes: Vec<ResourceLifetime>,
    allocations: Vec<PhysicalAllocation>,
    /// Allocation index per registry index.
    allocation_of: Vec<Option<usize>>,
    /// Per-subresource end state of each persistent root.
    end_states: Vec<(u32, Vec<ResourceState>)>,
    transient_memory_bytes: u64,
}

impl CompiledGraph {
    /// Get the pass execution order as handles.
    pub fn pass_order(&self) -> &[PassHandle] {
        &self.pass_order
    }

    pub fn steps(&self) -> &[CompiledPass] {
        &self.steps
    }

    /// The scheduled step of a pass, or `None` if it was culled.
    pub fn step_of(&self, pass: PassHandle) -> Option<&CompiledPass> {
        self.steps.iter().find(|step| step.pass == pass)
    }

    /// Transitions recorded after the last pass.
    pub fn final_transitions(&self) -> &[Transition] {
        &self.final_transitions
    }

    pub fn culled_passes(&self) -> &[String] {
        &self.culled_passes
    }

    pub fn culled_resources(&self) -> &[String] {
        &self.culled_resources
    }

    pub fn lifetimes(&self) -> &[ResourceLifetime] {
        &self.lifetimes
    }

    pub fn allocations(&self) -> &[PhysicalAllocation] {
        &self.allocations
    }

    /// Estimated bytes of all transient allocations.
    pub fn transient_memory_bytes(&self) -> u64 {
        self.transient_memory_bytes
    }

    /// Get the number of passes in the compiled graph.
    pub fn pass_count(&self) -> usize {
        self.pass_order.len()
    }

    /// Every explicit transition, in recording order.
    pub fn transitions(&self) -> impl Iterator<Item = &Transition> + '_ {
        self.steps
            .iter()
            .flat_map(|step| step.transitions.iter())
            .chain(self.final_transitions.iter())
    }

    pub(crate) fn allocation_for(&self, resource: u32) -> Option<usize> {
        self.allocation_of.get(resource as usize).copied().flatten()
    }

    pub(crate) fn end_states(&self) -> &[(u32, Vec<ResourceState>)] {
        &self.end_states
    }
}

impl Poolable for CompiledGraph {
    fn new_empty() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.pass_order.clear();
        self.steps.clear();
        self.final_transitions.clear();
        self.culled_passes.clear();
        self.culled_resources.clear();
        self.lifetimes.clear();
        self.allocations.clear();
        self.allocation_of.clear();
        self.end_states.clear();
        self.transient_memory_bytes = 0;
    }
}

/// Declared writers and readers of every root resource.
struct ResourceUsage {
    /// Passes writing each root, declaration order, by registry index.
    writers: Vec<Vec<usize>>,
    /// Passes reading each root without `PRIOR_STATE`.
    readers: Vec<Vec<usize>>,
    /// Passes writing an external or persistent resource.
    writes_sink: FixedBitSet,
}

impl ResourceUsage {
    fn collect(nodes: &DependencyGraph, registry: &ResourceRegistry, passes: &[Pass]) -> Self {
        let mut usage = Self {
            writers: vec![Vec::new(); registry.len()],
            readers: vec![Vec::new(); registry.len()],
            writes_sink: FixedBitSet::with_capacity(passes.len()),
        };
        for (index, pass) in passes.iter().enumerate() {
            for edge in nodes.edges_of(pass.node()) {
                let root = registry.root_of(nodes.node(edge.to).payload());
                let list = match edge.kind {
                    EdgeKind::Write => {
                        if registry.get(root).is_sink() {
                            usage.writes_sink.insert(index);
                        }
                        &mut usage.writers[root as usize]
                    }
                    EdgeKind::Read if edge.is_prior_read() => continue,
                    EdgeKind::Read => &mut usage.readers[root as usize],
                };
                if list.last() != Some(&index) {
                    list.push(index);
                }
            }
        }
        usage
    }
}

/// Ordering constraints between live passes.
struct Dependencies {
    succs: Vec<BTreeSet<usize>>,
    preds: Vec<BTreeSet<usize>>,
}

impl Dependencies {
    fn build(usage: &ResourceUsage, live: &FixedBitSet, pass_count: usize) -> Self {
        let mut deps = Self {
            succs: vec![BTreeSet::new(); pass_count],
            preds: vec![BTreeSet::new(); pass_count],
        };
        for (writers, readers) in usage.writers.iter().zip(&usage.readers) {
            for &writer in writers.iter().filter(|&&w| live.contains(w)) {
                for &reader in readers.iter().filter(|&&r| live.contains(r)) {
                    if writer == reader {
                        continue;
                    }
                    let rmw = readers.contains(&writer) && writers.contains(&reader);
                    let (before, after) = if rmw {
                        (writer.min(reader), writer.max(reader))
                    } else {
                        (writer, reader)
                    };
                    deps.succs[before].insert(after);
                    deps.preds[after].insert(before);
                }
            }
            // Passes that overwrite without reading keep declaration order.
            let mut blind = writers
                .iter()
                .copied()
                .filter(|&w| live.contains(w) && !readers.contains(&w));
            if let Some(mut previous) = blind.next() {
                for next in blind {
                    deps.succs[previous].insert(next);
                    deps.preds[next].insert(previous);
                    previous = next;
                }
            }
        }
        deps
    }
}

/// Small deterministic generator for [`ScheduleFlags::RANDOM_ORDER`].
struct XorShift64(u64);

impl XorShift64 {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

/// Compile the declared passes into `out`.
///
/// Pass and resource nodes get their `order` stamped. On error `out` is left
/// cleared.
pub(crate) fn compile(
    nodes: &mut DependencyGraph,
    registry: &ResourceRegistry,
    passes: &[Pass],
    info: &RenderGraphCreateInfo,
    out: &mut CompiledGraph,
) -> Result<(), GraphError> {
    out.reset();
    nodes.clear_orders();
    let flags = info.schedule_flags;

    validate_states(nodes, registry, passes)?;

    let usage = ResourceUsage::collect(nodes, registry, passes);
    let live = mark_live(nodes, registry, passes, &usage, flags);
    check_read_before_write(nodes, registry, passes, &live, &usage)?;

    let deps = Dependencies::build(&usage, &live, passes.len());
    let order = schedule(passes, &live, &deps, info)?;

    for (index, pass) in passes.iter().enumerate() {
        if !live.contains(index) {
            log::debug!("Culled pass '{}'", pass.name());
            out.culled_passes.push(pass.name().to_owned());
        }
    }

    let queue_of = |pass: usize| match passes[pass].kind() {
        PassKind::Compute => info.compute_queue(),
        PassKind::Render | PassKind::Present => info.graphics_queue(),
    };

    // Steps, first uses and resource positions.
    let mut first_use: Vec<Option<u32>> = vec![None; registry.len()];
    let mut last_use: Vec<u32> = vec![0; registry.len()];
    let mut user_queue: Vec<Option<usize>> = vec![None; registry.len()];
    let mut multi_queue = FixedBitSet::with_capacity(registry.len());
    for (position, &pass) in order.iter().enumerate() {
        let position = position as u32;
        let queue = queue_of(pass);
        let mut first_uses = Vec::new();
        for edge in nodes.edges_of(passes[pass].node()) {
            let index = nodes.node(edge.to).payload();
            let root = registry.root_of(index);
            for resource in [root, index] {
                let slot = &mut first_use[resource as usize];
                if slot.is_none() {
                    *slot = Some(position);
                    let needs_native =
                        resource != root || registry.get(resource).native().is_none();
                    if needs_native {
                        first_uses.push(registry.handle(resource));
                    }
                }
                last_use[resource as usize] = position;
                match user_queue[resource as usize] {
                    Some(used) if used != queue => multi_queue.insert(resource as usize),
                    _ => user_queue[resource as usize] = Some(queue),
                }
            }
        }
        let waits_on = deps.preds[pass]
            .iter()
            .filter(|&&pred| queue_of(pred) != queue)
            .map(|&pred| PassHandle(pred as u32))
            .collect();
        out.pass_order.push(PassHandle(pass as u32));
        out.steps.push(CompiledPass {
            pass: PassHandle(pass as u32),
            queue,
            transitions: Vec::new(),
            attachments: Vec::new(),
            first_uses,
            waits_on,
        });
    }

    for (index, resource) in registry.iter() {
        if first_use[index as usize].is_none() && !resource.is_sink() {
            log::debug!("Culled {} '{}'", resource.kind().name(), resource.name());
            out.culled_resources.push(resource.name().to_owned());
        }
    }

    // Transitions.
    let mut tracker = StateTracker::new(registry);
    for step in &mut out.steps {
        tracker.plan_pass(nodes, registry, &passes[step.pass.index()], step);
    }
    tracker.finish(registry, &mut out.final_transitions, &mut out.end_states);

    // Lifetimes and aliasing.
    for (index, resource) in registry.iter() {
        if resource.parent().is_some() || resource.is_sink() {
            continue;
        }
        if let Some(first) = first_use[index as usize] {
            out.lifetimes.push(ResourceLifetime {
                resource: registry.handle(index),
                first,
                last: last_use[index as usize],
                queue: user_queue[index as usize].filter(|_| !multi_queue.contains(index as usize)),
                allocation: 0,
            });
        }
    }
    out.transient_memory_bytes = aliasing::assign(
        registry,
        &mut out.lifetimes,
        flags.contains(ScheduleFlags::MEMORY_SAVING),
        &mut out.allocations,
    );
    out.allocation_of.resize(registry.len(), None);
    for lifetime in &out.lifetimes {
        out.allocation_of[lifetime.resource.index() as usize] = Some(lifetime.allocation);
    }
    if let Some(budget) = info.heap_budget_bytes() {
        if out.transient_memory_bytes > budget {
            log::warn!(
                "Transient memory {} bytes exceeds the heap budget of {} bytes",
                out.transient_memory_bytes,
                budget
            );
        }
    }

    // Stamp orders.
    for (position, &pass) in order.iter().enumerate() {
        nodes.set_order(passes[pass].node(), Some(position as u32));
    }
    for (index, resource) in registry.iter() {
        nodes.set_order(resource.node(), first_use[index as usize]);
    }

    log::debug!(
        "Compiled render graph: {} passes ({} culled), {} transitions, {} allocations, {} transient bytes",
        out.pass_order.len(),
        out.culled_passes.len(),
        out.transitions().count(),
        out.allocations.len(),
        out.transient_memory_bytes
    );
    Ok(())
}

/// Within one pass, overlapping accesses must agree unless all of them read.
fn validate_states(
    nodes: &DependencyGraph,
    registry: &ResourceRegistry,
    passes: &[Pass],
) -> Result<(), GraphError> {
    for pass in passes {
        let edges: Vec<_> = nodes.edges_of(pass.node()).collect();
        for (i, a) in edges.iter().enumerate() {
            let root_a = registry.root_of(nodes.node(a.to).payload());
            for b in &edges[i + 1..] {
                let root_b = registry.root_of(nodes.node(b.to).payload());
                if root_a != root_b || !a.range.overlaps(&b.range) {
                    continue;
                }
                if a.state != b.state && (a.state.is_write() || b.state.is_write()) {
                    return Err(GraphError::StateConflict {
                        pass: pass.name().to_owned(),
                        resource: registry.get(root_a).name().to_owned(),
                        first: a.state,
                        second: b.state,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Passes reachable backwards from a sink.
fn mark_live(
    nodes: &DependencyGraph,
    registry: &ResourceRegistry,
    passes: &[Pass],
    usage: &ResourceUsage,
    flags: ScheduleFlags,
) -> FixedBitSet {
    let mut live = FixedBitSet::with_capacity(passes.len());
    if flags.contains(ScheduleFlags::DISABLE_DEAD_CODE_ELIMINATION) {
        live.insert_range(..);
        return live;
    }

    let mut stack: Vec<usize> = (0..passes.len())
        .filter(|&index| passes[index].is_sink() || usage.writes_sink.contains(index))
        .collect();
    if stack.is_empty() && !passes.is_empty() {
        log::warn!("Render graph has no sinks; every pass will be culled");
    }
    for &index in &stack {
        live.insert(index);
    }

    while let Some(index) = stack.pop() {
        for edge in nodes.edges_of(passes[index].node()) {
            if edge.kind != EdgeKind::Read || edge.is_prior_read() {
                continue;
            }
            let root = registry.root_of(nodes.node(edge.to).payload());
            for &writer in &usage.writers[root as usize] {
                if !live.put(writer) {
                    stack.push(writer);
                }
            }
        }
    }
    live
}

fn check_read_before_write(
    nodes: &DependencyGraph,
    registry: &ResourceRegistry,
    passes: &[Pass],
    live: &FixedBitSet,
    usage: &ResourceUsage,
) -> Result<(), GraphError> {
    for index in live.ones() {
        let pass = &passes[index];
        for edge in nodes.edges_of(pass.node()) {
            if edge.kind != EdgeKind::Read || edge.is_prior_read() {
                continue;
            }
            let root = registry.root_of(nodes.node(edge.to).payload());
            if !registry.get(root).is_sink() && usage.writers[root as usize].is_empty() {
                return Err(GraphError::ReadBeforeWrite {
                    pass: pass.name().to_owned(),
                    resource: registry.get(root).name().to_owned(),
                });
            }
        }
    }
    Ok(())
}

/// Kahn's algorithm over the live passes.
fn schedule(
    passes: &[Pass],
    live: &FixedBitSet,
    deps: &Dependencies,
    info: &RenderGraphCreateInfo,
) -> Result<Vec<usize>, GraphError> {
    let flags = info.schedule_flags;
    let mut indegree: Vec<usize> = deps.preds.iter().map(BTreeSet::len).collect();
    let mut ready: BTreeSet<usize> = live.ones().filter(|&pass| indegree[pass] == 0).collect();
    let mut order = Vec::with_capacity(live.count_ones(..));
    let mut rng = XorShift64(info.random_seed);

    while !ready.is_empty() {
        let next = if flags.contains(ScheduleFlags::RANDOM_ORDER) {
            let pick = (rng.next() % ready.len() as u64) as usize;
            ready.iter().nth(pick).copied()
        } else if flags.contains(ScheduleFlags::MEMORY_SAVING) {
            // Depth-first: the newest scheduled pass with a ready successor wins.
            order
                .iter()
                .rev()
                .find_map(|&done: &usize| {
                    deps.succs[done]
                        .iter()
                        .find(|succ| ready.contains(*succ))
                        .copied()
                })
                .or_else(|| ready.first().copied())
        } else {
            ready.first().copied()
        };
        let Some(next) = next else { break };

        ready.remove(&next);
        order.push(next);
        for &succ in &deps.succs[next] {
            indegree[succ] -= 1;
            if indegree[succ] == 0 {
                ready.insert(succ);
            }
        }
    }

    if order.len() < live.count_ones(..) {
        let mut scheduled = FixedBitSet::with_capacity(passes.len());
        for &pass in &order {
            scheduled.insert(pass);
        }
        let stuck = live
            .ones()
            .filter(|&pass| !scheduled.contains(pass))
            .map(|pass| passes[pass].name().to_owned())
            .collect();
        return Err(GraphError::CyclicDependency { passes: stuck });
    }

    if flags.contains(ScheduleFlags::PROGRAM_ORDER) {
        if let Some((_, expected)) = order
            .iter()
            .zip(live.ones())
            .find(|(scheduled, expected)| **scheduled != *expected)
        {
            return Err(GraphError::ProgramOrderViolation {
                pass: passes[expected].name().to_owned(),
            });
        }
    }

    Ok(order)
}
