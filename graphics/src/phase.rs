//! Frame phases chained around a render graph.
//!
//! A phase is one step of getting a graph onto the GPU. The built-in phases
//! wrap the graph lifecycle; applications slot their own in between through
//! [`FnPhase`] or a custom [`RenderGraphPhase`] implementation.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ember_graphics::{
//!     DummyDevice, FrameExecutor, GpuDevice, PhaseChain, QueueType, RenderGraph,
//!     RenderGraphCreateInfo, ResourceState,
//! };
//!
//! let dummy = DummyDevice::new();
//! let device: Arc<dyn GpuDevice> = Arc::new(dummy.clone());
//! let mut executor = FrameExecutor::new(0);
//! executor
//!     .initialize(Arc::new(dummy.create_queue(QueueType::Graphics)), &device)
//!     .unwrap();
//!
//! let mut graph = RenderGraph::new(Arc::clone(&device), RenderGraphCreateInfo::default()).unwrap();
//! graph
//!     .add_compute_pass("Simulate", |pass| {
//!         pass.never_cull();
//!         Ok(())
//!     }, |_, _| Ok(()))
//!     .unwrap();
//!
//! let mut chain = PhaseChain::standard();
//! chain.run(&mut graph, &mut executor).unwrap();
//! assert_eq!(dummy.submit_count(), 1);
//! ```

use crate::error::GraphError;
use crate::executor::FrameExecutor;
use crate::graph::{GraphState, RenderGraph};

/// One step of a frame, run against a graph and the frame's executor.
pub trait RenderGraphPhase {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn run(
        &mut self,
        graph: &mut RenderGraph,
        executor: &mut FrameExecutor,
    ) -> Result<(), GraphError>;
}

/// Compiles a graph that is still being built.
///
/// A graph compiled earlier in the frame is left as is.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompilePhase;

impl RenderGraphPhase for CompilePhase {
    fn name(&self) -> &str {
        "Compile"
    }

    fn run(&mut self, graph: &mut RenderGraph, _: &mut FrameExecutor) -> Result<(), GraphError> {
        if graph.state() == GraphState::Compiled {
            return Ok(());
        }
        graph.compile()
    }
}

/// Records every scheduled pass into the executor.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordPhase;

impl RenderGraphPhase for RecordPhase {
    fn name(&self) -> &str {
        "Record"
    }

    fn run(
        &mut self,
        graph: &mut RenderGraph,
        executor: &mut FrameExecutor,
    ) -> Result<(), GraphError> {
        graph.record(executor)
    }
}

/// Submits the recorded work.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubmitPhase;

impl RenderGraphPhase for SubmitPhase {
    fn name(&self) -> &str {
        "Submit"
    }

    fn run(
        &mut self,
        graph: &mut RenderGraph,
        executor: &mut FrameExecutor,
    ) -> Result<(), GraphError> {
        graph.submit(executor)
    }
}

/// A phase backed by a closure.
pub struct FnPhase<F> {
    name: String,
    func: F,
}

impl<F> FnPhase<F>
where
    F: FnMut(&mut RenderGraph, &mut FrameExecutor) -> Result<(), GraphError>,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> RenderGraphPhase for FnPhase<F>
where
    F: FnMut(&mut RenderGraph, &mut FrameExecutor) -> Result<(), GraphError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(
        &mut self,
        graph: &mut RenderGraph,
        executor: &mut FrameExecutor,
    ) -> Result<(), GraphError> {
        (self.func)(graph, executor)
    }
}

/// Phases run in insertion order, stopping at the first error.
#[derive(Default)]
pub struct PhaseChain {
    phases: Vec<Box<dyn RenderGraphPhase>>,
}

impl PhaseChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile, record, submit.
    pub fn standard() -> Self {
        Self::new()
            .with(CompilePhase)
            .with(RecordPhase)
            .with(SubmitPhase)
    }

    pub fn with(mut self, phase: impl RenderGraphPhase + 'static) -> Self {
        self.push(phase);
        self
    }

    pub fn push(&mut self, phase: impl RenderGraphPhase + 'static) {
        self.phases.push(Box::new(phase));
    }

    /// Insert a phase before the first phase called `before`, or at the end.
    pub fn insert_before(&mut self, before: &str, phase: impl RenderGraphPhase + 'static) {
        let position = self
            .phases
            .iter()
            .position(|existing| existing.name() == before)
            .unwrap_or(self.phases.len());
        self.phases.insert(position, Box::new(phase));
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.phases.iter().map(|phase| phase.name())
    }

    pub fn run(
        &mut self,
        graph: &mut RenderGraph,
        executor: &mut FrameExecutor,
    ) -> Result<(), GraphError> {
        for phase in &mut self.phases {
            log::trace!("Running phase '{}'", phase.name());
            if let Err(err) = phase.run(graph, executor) {
                log::error!("Phase '{}' failed: {}", phase.name(), err);
                return Err(err);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PhaseChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    use super::*;
    use crate::backend::{DummyDevice, GpuDevice, QueueType};
    use crate::config::RenderGraphCreateInfo;

    fn setup() -> (DummyDevice, RenderGraph, FrameExecutor) {
        let dummy = DummyDevice::new();
        let device: Arc<dyn GpuDevice> = Arc::new(dummy.clone());
        let mut executor = FrameExecutor::new(0);
        executor
            .initialize(Arc::new(dummy.create_queue(QueueType::Graphics)), &device)
            .unwrap();
        let mut graph = RenderGraph::new(device, RenderGraphCreateInfo::default()).unwrap();
        graph
            .add_compute_pass(
                "Work",
                |pass| {
                    pass.never_cull();
                    Ok(())
                },
                |_, _| Ok(()),
            )
            .unwrap();
        (dummy, graph, executor)
    }

    #[test]
    fn test_standard_chain() {
        let (dummy, mut graph, mut executor) = setup();
        let mut chain = PhaseChain::standard();
        assert_eq!(
            chain.names().collect::<Vec<_>>(),
            vec!["Compile", "Record", "Submit"]
        );
        chain.run(&mut graph, &mut executor).unwrap();
        assert_eq!(graph.state(), GraphState::Submitted);
        assert_eq!(dummy.submit_count(), 1);
    }

    #[test]
    fn test_compile_phase_skips_compiled_graph() {
        let (_dummy, mut graph, mut executor) = setup();
        graph.compile().unwrap();
        CompilePhase.run(&mut graph, &mut executor).unwrap();
        assert_eq!(graph.state(), GraphState::Compiled);
    }

    #[test]
    fn test_insert_before() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let (_dummy, mut graph, mut executor) = setup();

        let mut chain = PhaseChain::standard();
        chain.insert_before(
            "Submit",
            FnPhase::new("Inspect", move |graph: &mut RenderGraph, _: &mut FrameExecutor| {
                log.borrow_mut().push(graph.state());
                Ok(())
            }),
        );
        assert_eq!(
            chain.names().collect::<Vec<_>>(),
            vec!["Compile", "Record", "Inspect", "Submit"]
        );
        chain.run(&mut graph, &mut executor).unwrap();
        assert_eq!(*seen.borrow(), vec![GraphState::Recorded]);
    }

    #[test]
    fn test_stops_at_first_error() {
        let (dummy, mut graph, mut executor) = setup();
        let mut chain = PhaseChain::new()
            .with(CompilePhase)
            .with(FnPhase::new("Fail", |_: &mut RenderGraph, _: &mut FrameExecutor| {
                Err(GraphError::InvalidArguments("stop".into()))
            }))
            .with(RecordPhase);

        let err = chain.run(&mut graph, &mut executor).unwrap_err();
        assert_eq!(err, GraphError::InvalidArguments("stop".into()));
        assert_eq!(graph.state(), GraphState::Compiled);
        assert!(dummy.debug_groups().is_empty());
    }
}
