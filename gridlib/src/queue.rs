//! Event containers: a FIFO queue of events to apply and a severity-ordered min-heap of
//! outstanding alerts.
use crate::events::Event;
use crate::types::Severity;

use std::collections::VecDeque;

/// Events in arrival order.
#[derive(Debug, Clone, Default)]
pub struct FifoQueue {
    queue: VecDeque<Event>,
}

impl FifoQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, event: Event) {
        self.queue.push_back(event);
    }

    pub fn dequeue(&mut self) -> Option<Event> {
        self.queue.pop_front()
    }

    pub fn peek(&self) -> Option<&Event> {
        self.queue.front()
    }

    pub fn size(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Copies of all queued events, oldest first.
    pub fn get_all(&self) -> Vec<Event> {
        self.queue.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

/// Binary min-heap of events stored in an array, ordered by ascending severity.
///
/// Events with equal severity come out in heap order, not in arrival order.
#[derive(Debug, Clone, Default)]
pub struct MinHeap {
    heap: Vec<Event>,
}

impl MinHeap {
    pub fn new() -> Self {
        Self::default()
    }

    fn severity(&self, index: usize) -> Severity {
        self.heap[index].severity
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.severity(parent) <= self.severity(index) {
                break;
            }
            self.heap.swap(parent, index);
            index = parent;
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            if left >= self.heap.len() {
                break;
            }
            let smaller = if right < self.heap.len() && self.severity(right) < self.severity(left)
            {
                right
            } else {
                left
            };
            if self.severity(index) < self.severity(smaller) {
                break;
            }
            self.heap.swap(index, smaller);
            index = smaller;
        }
    }

    pub fn insert(&mut self, event: Event) {
        self.heap.push(event);
        self.sift_up(self.heap.len() - 1);
    }

    /// Removes and returns the event with the lowest severity.
    pub fn extract_min(&mut self) -> Option<Event> {
        if self.heap.is_empty() {
            return None;
        }
        let min = self.heap.swap_remove(0);
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Some(min)
    }

    pub fn peek(&self) -> Option<&Event> {
        self.heap.first()
    }

    pub fn size(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Copies of all events sorted by severity. The heap itself is not modified.
    pub fn get_all(&self) -> Vec<Event> {
        let mut events = self.heap.clone();
        events.sort_by_key(|e| e.severity);
        events
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

/// The queue pair shared by a simulation.
#[derive(Debug, Clone, Default)]
pub struct EventQueues {
    pub fifo: FifoQueue,
    pub heap: MinHeap,
}

impl EventQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an event for application and records it as an outstanding alert.
    pub fn add_event(&mut self, event: Event) {
        log::debug!(
            "Queued {} event with severity {}",
            event.type_name(),
            event.severity
        );
        self.heap.insert(event.clone());
        self.fifo.enqueue(event);
    }

    pub fn reset(&mut self) {
        self.fifo.clear();
        self.heap.clear();
    }
}
