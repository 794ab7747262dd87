//! Allocation reuse for structures rebuilt every frame.
//!
//! A render graph compiles a fresh plan each frame. Dropping last frame's plan
//! and allocating a new one churns the allocator for no benefit, since the
//! shape of consecutive frames is almost always the same. [`Pooled<T>`] keeps
//! the previous value around in a cleared state so its vectors and maps keep
//! their capacity.
//!
//! ```
//! use ember_core::pool::{Poolable, Pooled};
//!
//! #[derive(Debug, Default)]
//! struct Plan {
//!     order: Vec<u32>,
//! }
//!
//! impl Poolable for Plan {
//!     fn new_empty() -> Self {
//!         Self::default()
//!     }
//!     fn reset(&mut self) {
//!         self.order.clear();
//!     }
//! }
//!
//! let mut slot = Pooled::<Plan>::default();
//! slot.activate().order.extend([0, 1, 2]);
//! assert_eq!(slot.get().map(|p| p.order.len()), Some(3));
//!
//! slot.release();
//! assert!(slot.get().is_none());
//! assert!(slot.inner().order.capacity() >= 3);
//! ```

/// A value that can be cleared in place and reused.
pub trait Poolable {
    /// An empty value, used to seed a fresh pool slot.
    fn new_empty() -> Self;

    /// Clear the value while keeping its allocations.
    fn reset(&mut self);
}

/// Either a live value or a cleared value waiting to be reused.
#[derive(Debug)]
pub enum Pooled<T: Poolable> {
    /// Holds valid data.
    Active(T),
    /// Cleared; the allocation is kept for the next [`activate`](Pooled::activate).
    Pooled(T),
}

impl<T: Poolable> Pooled<T> {
    /// Wrap a live value.
    pub fn new(value: T) -> Self {
        Self::Active(value)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    pub fn is_pooled(&self) -> bool {
        matches!(self, Self::Pooled(_))
    }

    /// The live value, or `None` while pooled.
    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Active(value) => Some(value),
            Self::Pooled(_) => None,
        }
    }

    /// Mutable access to the live value, or `None` while pooled.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Active(value) => Some(value),
            Self::Pooled(_) => None,
        }
    }

    /// Clear the value and mark it pooled. No-op when already pooled.
    pub fn release(&mut self) {
        if let Self::Active(value) = self {
            value.reset();
            let value = std::mem::replace(value, T::new_empty());
            *self = Self::Pooled(value);
        }
    }

    /// Mark the value live and hand it out for filling.
    ///
    /// A pooled value comes back cleared; an active one is returned as is.
    pub fn activate(&mut self) -> &mut T {
        if let Self::Pooled(value) = self {
            let value = std::mem::replace(value, T::new_empty());
            *self = Self::Active(value);
        }
        self.inner_mut()
    }

    /// The stored value regardless of state.
    pub fn inner(&self) -> &T {
        match self {
            Self::Active(value) | Self::Pooled(value) => value,
        }
    }

    pub fn inner_mut(&mut self) -> &mut T {
        match self {
            Self::Active(value) | Self::Pooled(value) => value,
        }
    }
}

impl<T: Poolable> Default for Pooled<T> {
    fn default() -> Self {
        Self::Pooled(T::new_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Order {
        passes: Vec<u32>,
    }

    impl Poolable for Order {
        fn new_empty() -> Self {
            Self::default()
        }
        fn reset(&mut self) {
            self.passes.clear();
        }
    }

    #[test]
    fn test_default_slot_is_pooled() {
        let slot = Pooled::<Order>::default();
        assert!(slot.is_pooled());
        assert!(slot.get().is_none());
    }

    #[test]
    fn test_release_keeps_capacity() {
        let mut slot = Pooled::new(Order {
            passes: (0..16).collect(),
        });
        slot.release();
        assert!(slot.is_pooled());
        assert!(slot.inner().passes.is_empty());
        assert!(slot.inner().passes.capacity() >= 16);
    }

    #[test]
    fn test_activate_after_release_reuses_buffer() {
        let mut slot = Pooled::new(Order {
            passes: vec![1, 2, 3, 4],
        });
        slot.release();
        let capacity = slot.inner().passes.capacity();

        let order = slot.activate();
        assert!(order.passes.is_empty());
        assert_eq!(order.passes.capacity(), capacity);
        order.passes.push(7);
        assert_eq!(slot.get(), Some(&Order { passes: vec![7] }));
    }

    #[test]
    fn test_activate_on_active_keeps_contents() {
        let mut slot = Pooled::new(Order { passes: vec![5] });
        assert_eq!(slot.activate().passes, vec![5]);
    }

    #[test]
    fn test_get_mut_only_when_active() {
        let mut slot = Pooled::<Order>::default();
        assert!(slot.get_mut().is_none());
        slot.activate();
        slot.get_mut().unwrap().passes.push(1);
        assert_eq!(slot.inner().passes, vec![1]);
    }

    #[test]
    fn test_frame_cycle() {
        let mut slot = Pooled::<Order>::default();
        for frame in 0..4u32 {
            let order = slot.activate();
            order.passes.extend(frame..frame + 8);
            assert_eq!(slot.get().unwrap().passes.len(), 8);
            slot.release();
            assert!(slot.inner().passes.capacity() >= 8);
        }
    }
}
