//! Fixed-capacity FIFO ring buffer.

use std::collections::VecDeque;

use crate::error::QueueError;

/// Circular buffer that never grows past the capacity it was created with.
///
/// Job workers push their results here and the owning thread drains them.
#[derive(Debug)]
pub struct RingQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    /// Appends `value` at the tail. A full queue hands the value back.
    pub fn enqueue(&mut self, value: T) -> Result<(), (QueueError, T)> {
        if self.is_full() {
            return Err((
                QueueError::Full {
                    capacity: self.capacity,
                },
                value,
            ));
        }
        self.items.push_back(value);
        Ok(())
    }

    pub fn dequeue(&mut self) -> Result<T, QueueError> {
        self.items.pop_front().ok_or(QueueError::Empty)
    }

    pub fn peek(&self) -> Result<&T, QueueError> {
        self.items.front().ok_or(QueueError::Empty)
    }
}
