//! Deferred destruction of GPU resources
//!
//! Resources whose teardown must happen at a specific synchronization point
//! (end of frame, shutdown) push a cleanup closure here instead of relying on
//! lexical scope. Flushing runs the closures newest-first, so a resource is always
//! destroyed before the resources it was created from.
//!
//! The queue is `!Send`: closures are not required to be `Send`, and all pushes
//! and the flush happen on the render thread.
//!
//! # Example
//!
//! ```
//! use lumen_engine::lumen::DeletionQueue;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let order = Rc::new(RefCell::new(Vec::new()));
//! let mut queue = DeletionQueue::new();
//!
//! let o = Rc::clone(&order);
//! queue.push(move || o.borrow_mut().push("pool"));
//! let o = Rc::clone(&order);
//! queue.push(move || o.borrow_mut().push("set layout"));
//!
//! queue.flush();
//! assert_eq!(*order.borrow(), vec!["set layout", "pool"]);
//! ```

use crate::engine_warn;

/// Stack of deferred cleanup closures
pub struct DeletionQueue {
    deletors: Vec<Box<dyn FnOnce()>>,
}

impl DeletionQueue {
    pub fn new() -> Self {
        Self {
            deletors: Vec::new(),
        }
    }

    /// Queue a cleanup closure
    pub fn push<F: FnOnce() + 'static>(&mut self, deletor: F) {
        self.deletors.push(Box::new(deletor));
    }

    /// Run every queued closure in reverse insertion order, leaving the queue empty
    pub fn flush(&mut self) {
        // Entries leave the queue before any of them runs.
        let deletors = std::mem::take(&mut self.deletors);
        for deletor in deletors.into_iter().rev() {
            deletor();
        }
    }

    /// Number of pending closures
    pub fn len(&self) -> usize {
        self.deletors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deletors.is_empty()
    }
}

impl Default for DeletionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeletionQueue {
    fn drop(&mut self) {
        if !self.deletors.is_empty() {
            engine_warn!("lumen::DeletionQueue",
                "Dropped with {} pending deletors, flushing now", self.deletors.len());
            self.flush();
        }
    }
}

#[cfg(test)]
#[path = "deletion_queue_tests.rs"]
mod tests;
