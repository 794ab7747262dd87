//! Typed event dispatch.
//!
//! Events are plain structs implementing [`Event`]. A receiver wraps an
//! incoming `&mut dyn Event` in an [`EventDispatcher`] and offers one handler
//! per concrete type it cares about; only the handler whose type matches runs.
//!
//! ```
//! use ember_core::event::{Event, EventDispatcher};
//!
//! #[derive(Debug)]
//! struct Resized {
//!     width: u32,
//! }
//!
//! impl Event for Resized {
//!     fn name(&self) -> &'static str {
//!         "Resized"
//!     }
//! }
//!
//! let mut event = Resized { width: 800 };
//! let mut dispatcher = EventDispatcher::new(&mut event);
//! assert!(dispatcher.dispatch(|e: &mut Resized| e.width == 800));
//! assert!(dispatcher.is_handled());
//! ```

use std::any::Any;
use std::fmt::Debug;

/// Type-erased access to a concrete event value.
///
/// Implemented for every `'static` type; event types never implement it by hand.
pub trait AsAny {
    /// The value as `&mut dyn Any`, for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An event that can be routed through an [`EventDispatcher`].
pub trait Event: AsAny + Debug {
    /// Human readable event name, used for logging.
    fn name(&self) -> &'static str;
}

/// Routes one event to the handler matching its concrete type.
pub struct EventDispatcher<'a> {
    event: &'a mut dyn Event,
    handled: bool,
}

impl<'a> EventDispatcher<'a> {
    /// Wrap an event for dispatch.
    pub fn new(event: &'a mut dyn Event) -> Self {
        Self {
            event,
            handled: false,
        }
    }

    /// Run `handler` if the wrapped event is an `E`.
    ///
    /// Returns `false` without calling the handler when the type does not
    /// match. Otherwise returns the handler's result, which also marks the
    /// event as handled when `true`.
    pub fn dispatch<E, F>(&mut self, handler: F) -> bool
    where
        E: Event + 'static,
        F: FnOnce(&mut E) -> bool,
    {
        let Some(event) = (*self.event).as_any_mut().downcast_mut::<E>() else {
            return false;
        };
        let result = handler(event);
        if result {
            log::trace!("Event {} handled", event.name());
            self.handled = true;
        }
        result
    }

    /// Whether any handler reported the event as handled.
    pub fn is_handled(&self) -> bool {
        self.handled
    }

    /// Name of the wrapped event.
    pub fn event_name(&self) -> &'static str {
        self.event.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Resized {
        width: u32,
        height: u32,
    }

    impl Event for Resized {
        fn name(&self) -> &'static str {
            "Resized"
        }
    }

    #[derive(Debug)]
    struct Closed;

    impl Event for Closed {
        fn name(&self) -> &'static str {
            "Closed"
        }
    }

    #[test]
    fn test_dispatch_matching_type() {
        let mut event = Resized {
            width: 640,
            height: 480,
        };
        let mut dispatcher = EventDispatcher::new(&mut event);
        let mut seen = (0, 0);
        let handled = dispatcher.dispatch(|e: &mut Resized| {
            seen = (e.width, e.height);
            true
        });
        assert!(handled);
        assert!(dispatcher.is_handled());
        assert_eq!(seen, (640, 480));
    }

    #[test]
    fn test_dispatch_without_match_returns_false() {
        let mut event = Closed;
        let mut dispatcher = EventDispatcher::new(&mut event);
        let mut called = false;
        let handled = dispatcher.dispatch(|_: &mut Resized| {
            called = true;
            true
        });
        assert!(!handled);
        assert!(!called);
        assert!(!dispatcher.is_handled());
    }

    #[test]
    fn test_handler_may_decline() {
        let mut event = Closed;
        let mut dispatcher = EventDispatcher::new(&mut event);
        assert!(!dispatcher.dispatch(|_: &mut Closed| false));
        assert!(!dispatcher.is_handled());
        assert_eq!(dispatcher.event_name(), "Closed");
    }

    #[test]
    fn test_handler_can_mutate_event() {
        let mut event = Resized {
            width: 1,
            height: 1,
        };
        {
            let mut dispatcher = EventDispatcher::new(&mut event);
            dispatcher.dispatch(|e: &mut Resized| {
                e.width = 2;
                true
            });
        }
        assert_eq!(event.width, 2);
    }
}
