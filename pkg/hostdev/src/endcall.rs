//! The per-guest teardown queue.
//!
//! Every host mutation that must be undone on stop (a PCI rebind, a
//! module unload) enqueues a matching restore action here. The queue is
//! drained in FIFO order, so the oldest mutation is undone first.

use std::collections::VecDeque;
use std::sync::Mutex;

pub type RestoreAction = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub struct EndCallQueue {
    actions: Mutex<VecDeque<RestoreAction>>,
}

impl EndCallQueue {
    pub fn new() -> Self {
        EndCallQueue {
            actions: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, action: RestoreAction) {
        self.actions.lock().expect("end-call queue mutex poisoned").push_back(action);
    }

    pub fn len(&self) -> usize {
        self.actions.lock().expect("end-call queue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every queued action in FIFO order, removing each as it runs.
    pub fn drain(&self) {
        loop {
            let next = self.actions.lock().expect("end-call queue mutex poisoned").pop_front();
            match next {
                Some(action) => action(),
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn drains_in_fifo_order() {
        let queue = EndCallQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            queue.push(Box::new(move || order.lock().unwrap().push(i)));
        }
        queue.drain();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn draining_an_empty_queue_is_a_no_op() {
        let queue = EndCallQueue::new();
        queue.drain();
        assert!(queue.is_empty());
    }

    #[test]
    fn counts_reflect_pushes_and_drains() {
        let queue = EndCallQueue::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        queue.push(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(queue.len(), 1);
        queue.drain();
        assert_eq!(queue.len(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
