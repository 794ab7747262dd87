//! Physical allocation assignment for transient resources.

use crate::graph::{ResourceDesc, ResourceRegistry};

use super::{PhysicalAllocation, ResourceLifetime};

fn alias_compatible(a: &ResourceDesc, b: &ResourceDesc) -> bool {
    match (a, b) {
        (ResourceDesc::Texture(a), ResourceDesc::Texture(b)) => a.is_alias_compatible(b),
        (ResourceDesc::Buffer(a), ResourceDesc::Buffer(b)) => a.is_alias_compatible(b),
        _ => false,
    }
}

/// Assign every lifetime to an allocation and return the total estimated size.
///
/// With `share` set, a lifetime reuses the first allocation with a compatible
/// descriptor whose previous user ended strictly before it starts. Positions
/// only order passes within one queue, so sharing is limited to allocations
/// whose users all run on the lifetime's queue; resources touched by several
/// queues get their own allocation. Lifetimes are sorted by first use, then
/// registry index.
pub(super) fn assign(
    registry: &ResourceRegistry,
    lifetimes: &mut [ResourceLifetime],
    share: bool,
    allocations: &mut Vec<PhysicalAllocation>,
) -> u64 {
    lifetimes.sort_by_key(|lifetime| (lifetime.first, lifetime.resource.index()));
    let mut busy_until: Vec<u32> = Vec::new();
    let mut slot_queue: Vec<Option<usize>> = Vec::new();

    for lifetime in lifetimes.iter_mut() {
        let resource = registry.get(lifetime.resource.index());
        let reusable = if share && lifetime.queue.is_some() {
            (0..allocations.len()).find(|&slot| {
                busy_until[slot] < lifetime.first
                    && slot_queue[slot] == lifetime.queue
                    && alias_compatible(
                        registry.get(allocations[slot].resources[0].index()).desc(),
                        resource.desc(),
                    )
            })
        } else {
            None
        };
        let slot = reusable.unwrap_or_else(|| {
            allocations.push(PhysicalAllocation {
                resources: Vec::new(),
                size: resource.estimated_size(),
            });
            busy_until.push(0);
            slot_queue.push(lifetime.queue);
            allocations.len() - 1
        });
        allocations[slot].resources.push(lifetime.resource);
        busy_until[slot] = lifetime.last;
        lifetime.allocation = slot;
    }

    if share {
        let aliased = lifetimes.len() - allocations.len();
        if aliased > 0 {
            log::debug!(
                "Aliased {} of {} transient resources",
                aliased,
                lifetimes.len()
            );
        }
    }
    allocations.iter().map(|allocation| allocation.size).sum()
}
