//! Render graph configuration.

use bitflags::bitflags;

use crate::backend::QueueType;
use crate::error::GraphError;

bitflags! {
    /// Scheduling policy for [`compile`](crate::graph::RenderGraph::compile).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ScheduleFlags: u32 {
        /// Passes must run in declaration order; a dependency pointing
        /// backwards is an error instead of a reordering.
        const PROGRAM_ORDER = 1 << 0;
        /// Prefer orders that shorten resource lifetimes, and alias
        /// transient allocations with disjoint lifetimes.
        const MEMORY_SAVING = 1 << 1;
        /// Pick randomly among ready passes. For fuzzing dependency bugs.
        const RANDOM_ORDER = 1 << 2;
        /// Keep every pass, even ones with no path to a sink.
        const DISABLE_DEAD_CODE_ELIMINATION = 1 << 3;
    }
}

/// One hardware queue available to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueInfo {
    pub queue_type: QueueType,
}

impl QueueInfo {
    pub fn new(queue_type: QueueType) -> Self {
        Self { queue_type }
    }
}

/// Scheduler policy and queue/heap topology for a [`RenderGraph`](crate::graph::RenderGraph).
///
/// # Example
///
/// ```
/// use ember_graphics::{QueueInfo, QueueType, RenderGraphCreateInfo, ScheduleFlags};
///
/// let info = RenderGraphCreateInfo::default()
///     .with_schedule_flags(ScheduleFlags::MEMORY_SAVING)
///     .with_queue(QueueInfo::new(QueueType::Compute))
///     .with_heap_budget_mib(256);
/// assert!(info.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderGraphCreateInfo {
    pub schedule_flags: ScheduleFlags,
    /// Queues passes may be assigned to. The first graphics queue records
    /// render and present passes.
    pub queue_infos: Vec<QueueInfo>,
    /// Budget per memory heap in MiB. Empty means unbounded.
    pub heap_budget_mibs: Vec<u32>,
    /// Seed for [`ScheduleFlags::RANDOM_ORDER`].
    pub random_seed: u64,
}

impl Default for RenderGraphCreateInfo {
    fn default() -> Self {
        Self {
            schedule_flags: ScheduleFlags::empty(),
            queue_infos: vec![QueueInfo::new(QueueType::Graphics)],
            heap_budget_mibs: Vec::new(),
            random_seed: 0x9E37_79B9_7F4A_7C15,
        }
    }
}

impl RenderGraphCreateInfo {
    pub fn with_schedule_flags(mut self, flags: ScheduleFlags) -> Self {
        self.schedule_flags = flags;
        self
    }

    pub fn with_queue(mut self, queue: QueueInfo) -> Self {
        self.queue_infos.push(queue);
        self
    }

    pub fn with_heap_budget_mib(mut self, mib: u32) -> Self {
        self.heap_budget_mibs.push(mib);
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Check the configuration for contradictions.
    pub fn validate(&self) -> Result<(), GraphError> {
        if !self
            .queue_infos
            .iter()
            .any(|queue| queue.queue_type == QueueType::Graphics)
        {
            return Err(GraphError::InvalidArguments(
                "at least one graphics queue is required".into(),
            ));
        }
        if self.heap_budget_mibs.contains(&0) {
            return Err(GraphError::InvalidArguments(
                "heap budgets must be non-zero".into(),
            ));
        }
        let flags = self.schedule_flags;
        if flags.contains(ScheduleFlags::RANDOM_ORDER) {
            if flags.intersects(ScheduleFlags::PROGRAM_ORDER | ScheduleFlags::MEMORY_SAVING) {
                return Err(GraphError::InvalidArguments(
                    "RANDOM_ORDER cannot be combined with another ordering policy".into(),
                ));
            }
            if self.random_seed == 0 {
                return Err(GraphError::InvalidArguments(
                    "RANDOM_ORDER requires a non-zero seed".into(),
                ));
            }
        }
        Ok(())
    }

    /// Index of the queue recording render and present passes.
    pub(crate) fn graphics_queue(&self) -> usize {
        self.queue_infos
            .iter()
            .position(|queue| queue.queue_type == QueueType::Graphics)
            .unwrap_or(0)
    }

    /// Index of the queue compute passes are assigned to.
    pub(crate) fn compute_queue(&self) -> usize {
        self.queue_infos
            .iter()
            .position(|queue| queue.queue_type == QueueType::Compute)
            .unwrap_or_else(|| self.graphics_queue())
    }

    /// Sum of heap budgets in bytes, if any are configured.
    pub(crate) fn heap_budget_bytes(&self) -> Option<u64> {
        if self.heap_budget_mibs.is_empty() {
            None
        } else {
            Some(
                self.heap_budget_mibs
                    .iter()
                    .map(|&mib| mib as u64 * 1024 * 1024)
                    .sum(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let info = RenderGraphCreateInfo::default();
        assert!(info.validate().is_ok());
        assert_eq!(info.graphics_queue(), 0);
        assert_eq!(info.compute_queue(), 0);
        assert_eq!(info.heap_budget_bytes(), None);
    }

    #[test]
    fn test_requires_graphics_queue() {
        let info = RenderGraphCreateInfo {
            queue_infos: vec![QueueInfo::new(QueueType::Compute)],
            ..Default::default()
        };
        assert!(matches!(
            info.validate(),
            Err(GraphError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_rejects_zero_heap() {
        let info = RenderGraphCreateInfo::default().with_heap_budget_mib(0);
        assert!(info.validate().is_err());
    }

    #[test]
    fn test_random_order_is_exclusive() {
        let info = RenderGraphCreateInfo::default()
            .with_schedule_flags(ScheduleFlags::RANDOM_ORDER | ScheduleFlags::PROGRAM_ORDER);
        assert!(info.validate().is_err());

        let info = RenderGraphCreateInfo::default()
            .with_schedule_flags(ScheduleFlags::RANDOM_ORDER)
            .with_random_seed(0);
        assert!(info.validate().is_err());

        let info = RenderGraphCreateInfo::default()
            .with_schedule_flags(ScheduleFlags::RANDOM_ORDER | ScheduleFlags::DISABLE_DEAD_CODE_ELIMINATION);
        assert!(info.validate().is_ok());
    }

    #[test]
    fn test_queue_selection() {
        let info = RenderGraphCreateInfo::default()
            .with_queue(QueueInfo::new(QueueType::Transfer))
            .with_queue(QueueInfo::new(QueueType::Compute));
        assert_eq!(info.graphics_queue(), 0);
        assert_eq!(info.compute_queue(), 2);
    }

    #[test]
    fn test_heap_budget_sum() {
        let info = RenderGraphCreateInfo::default()
            .with_heap_budget_mib(1)
            .with_heap_budget_mib(2);
        assert_eq!(info.heap_budget_bytes(), Some(3 * 1024 * 1024));
    }
}
