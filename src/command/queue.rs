//! Bounded FIFO of pending commands

use std::collections::VecDeque;

/// Fixed-capacity FIFO queue
///
/// A push onto a full queue is refused; nothing already queued is ever
/// overwritten or dropped.
#[derive(Debug)]
pub struct CommandQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> CommandQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an item; returns false if the queue is full
    pub fn push(&mut self, item: T) -> bool {
        if self.items.len() >= self.capacity {
            return false;
        }
        self.items.push_back(item);
        true
    }

    /// Remove the oldest item
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Remove every queued item, oldest first
    pub fn drain(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }
}
