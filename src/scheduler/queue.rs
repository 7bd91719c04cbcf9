//! Dispatch queue
//!
//! A plain FIFO of context handles. Order is insertion order; the ticker
//! rescans every entry per tick, so the queue itself stays trivial.

use std::collections::VecDeque;

use super::context::ContextHandle;

/// FIFO of live schedule contexts eligible for firing.
#[derive(Default)]
pub struct DispatchQueue {
    entries: VecDeque<ContextHandle>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a context at the back.
    pub fn enqueue(&mut self, context: ContextHandle) {
        context.set_in_queue(true);
        self.entries.push_back(context);
    }

    /// Remove and return the front context.
    pub fn dequeue_front(&mut self) -> Option<ContextHandle> {
        let context = self.entries.pop_front();
        if let Some(context) = &context {
            context.set_in_queue(false);
        }
        context
    }

    /// Look at the front context without removing it.
    pub fn peek_front(&self) -> Option<&ContextHandle> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        for context in self.entries.drain(..) {
            context.set_in_queue(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Schedule;
    use crate::scheduler::context::ScheduleContext;
    use chrono::Utc;
    use std::sync::Arc;

    fn context(name: &str) -> ContextHandle {
        let schedule = Schedule {
            id: format!("id-{}", name),
            name: name.to_string(),
            frequency: Some("PT5S".to_string()),
            ..Default::default()
        };
        Arc::new(ScheduleContext::new(schedule, Utc::now()).unwrap())
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = DispatchQueue::new();
        queue.enqueue(context("a"));
        queue.enqueue(context("b"));
        queue.enqueue(context("c"));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.peek_front().unwrap().schedule_name(), "a");
        assert_eq!(queue.dequeue_front().unwrap().schedule_name(), "a");
        assert_eq!(queue.dequeue_front().unwrap().schedule_name(), "b");
        assert_eq!(queue.dequeue_front().unwrap().schedule_name(), "c");
        assert!(queue.dequeue_front().is_none());
    }

    #[test]
    fn test_membership_flag_tracks_queue() {
        let mut queue = DispatchQueue::new();
        let ctx = context("a");

        queue.enqueue(ctx.clone());
        assert!(ctx.is_scheduled());

        let popped = queue.dequeue_front().unwrap();
        assert!(!popped.is_scheduled());
    }

    #[test]
    fn test_clear() {
        let mut queue = DispatchQueue::new();
        let ctx = context("a");
        queue.enqueue(ctx.clone());
        queue.enqueue(context("b"));

        queue.clear();

        assert!(queue.is_empty());
        assert!(!ctx.is_scheduled());
    }
}
