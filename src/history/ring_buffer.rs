use std::collections::VecDeque;

/// Fixed-capacity, newest-first buffer.
///
/// New items go to the front; once `capacity` items are held, each push drops the oldest item
/// from the back.
#[derive(Clone, Debug)]
pub(crate) struct RingBuffer<T> {
    inner: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Creates an empty [`RingBuffer`] holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self { inner: VecDeque::with_capacity(capacity), capacity }
    }

    /// Adds a new element as the newest entry.
    ///
    /// If the buffer is full, the oldest element is removed to make space.
    pub fn push_front(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.inner.len() == self.capacity {
            self.inner.pop_back();
        }
        self.inner.push_front(item);
    }

    /// Iterates newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn front(&self) -> Option<&T> {
        self.inner.front()
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copies the contents out, newest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.iter().cloned().collect()
    }
}
