//! Growable ring buffer
//!
//! A contiguous circular buffer that doubles its capacity when a push would
//! overflow and halves it again once the contents drop well below half.
//! Not thread safe: callers synchronize access (see `BlockingQueue`).

/// Smallest capacity a buffer may be created with
const MIN_CAPACITY: usize = 2;

/// Auto-resizing FIFO ring buffer
///
/// Items are stored in logical order from `head` to `tail`, wrapping around
/// the physical end of the slot vector. Resizing always re-packs the items
/// starting at slot 0, so logical order survives every reallocation.
#[derive(Debug)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    head: usize,
    tail: usize,
    len: usize,
    initial_capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Create a buffer with the given initial capacity
    ///
    /// Capacities below 2 are raised to 2. The capacity never shrinks
    /// below this value.
    pub fn new(initial_capacity: usize) -> Self {
        let initial_capacity = initial_capacity.max(MIN_CAPACITY);
        Self {
            slots: empty_slots(initial_capacity),
            head: 0,
            tail: 0,
            len: 0,
            initial_capacity,
        }
    }

    /// Number of items currently stored
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer holds no items
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current slot capacity
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Capacity the buffer was created with (lower bound for shrinking)
    pub fn initial_capacity(&self) -> usize {
        self.initial_capacity
    }

    /// Append an item at the tail, doubling capacity first if full
    pub fn push(&mut self, item: T) {
        if self.len == self.capacity() {
            self.resize(self.capacity() * 2);
        }
        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.capacity();
        self.len += 1;
    }

    /// Remove and return the oldest item
    ///
    /// Halves the capacity afterwards when fewer than half the slots are in
    /// use and the item count is still above the initial capacity.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }

        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;

        if self.len < self.capacity() / 2 && self.len > self.initial_capacity {
            self.resize(self.capacity() / 2);
        }
        item
    }

    /// Item at logical position `index` (0 is the oldest)
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        self.slots[(self.head + index) % self.capacity()].as_ref()
    }

    /// Drop every item, keeping the current capacity
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }

    /// Take every item out in FIFO order, keeping the current capacity
    pub fn drain(&mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.len);
        let capacity = self.capacity();
        for offset in 0..self.len {
            if let Some(item) = self.slots[(self.head + offset) % capacity].take() {
                items.push(item);
            }
        }
        self.head = 0;
        self.tail = 0;
        self.len = 0;
        items
    }

    /// Reallocate to `capacity` slots, re-packing items from slot 0
    fn resize(&mut self, capacity: usize) {
        let old_capacity = self.capacity();
        let mut slots = empty_slots(capacity);
        for (offset, slot) in slots.iter_mut().take(self.len).enumerate() {
            *slot = self.slots[(self.head + offset) % old_capacity].take();
        }
        self.slots = slots;
        self.head = 0;
        self.tail = self.len % capacity;
    }
}

fn empty_slots<T>(capacity: usize) -> Vec<Option<T>> {
    std::iter::repeat_with(|| None).take(capacity).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer() {
        let buf: RingBuffer<i32> = RingBuffer::new(32);
        assert_eq!(buf.len(), 0);
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 32);
        assert_eq!(buf.initial_capacity(), 32);
    }

    #[test]
    fn test_minimum_capacity() {
        let buf: RingBuffer<i32> = RingBuffer::new(0);
        assert_eq!(buf.capacity(), 2);
        assert_eq!(buf.initial_capacity(), 2);
    }

    #[test]
    fn test_push_fills_without_resize() {
        let mut buf = RingBuffer::new(32);
        for i in 0..32 {
            buf.push(i);
            assert_eq!(buf.len(), i + 1);
        }
        assert_eq!(buf.capacity(), 32);
        for i in 0..32 {
            assert_eq!(buf.get(i), Some(&i));
        }
        assert_eq!(buf.get(32), None);
    }

    #[test]
    fn test_pop_fifo_then_empty() {
        let mut buf = RingBuffer::new(32);
        for i in 0..32 {
            buf.push(i);
        }
        for i in 0..32 {
            assert_eq!(buf.pop(), Some(i));
        }
        assert_eq!(buf.pop(), None);
        assert_eq!(buf.pop(), None);
    }

    #[test]
    fn test_grows_only_on_overflowing_push() {
        let mut buf = RingBuffer::new(4);
        for i in 0..4 {
            buf.push(i);
        }
        assert_eq!(buf.capacity(), 4);

        buf.push(4);
        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_grow_preserves_order_across_wraparound() {
        let mut buf = RingBuffer::new(4);
        for i in 0..4 {
            buf.push(i);
        }
        // head now sits mid-buffer with the tail wrapped behind it
        assert_eq!(buf.pop(), Some(0));
        assert_eq!(buf.pop(), Some(1));
        buf.push(4);
        buf.push(5);
        assert_eq!(buf.capacity(), 4);

        buf.push(6);
        assert_eq!(buf.capacity(), 8);
        let drained: Vec<_> = std::iter::from_fn(|| buf.pop()).collect();
        assert_eq!(drained, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_shrinks_after_underflowing_pop() {
        let mut buf = RingBuffer::new(2);
        for i in 0..9 {
            buf.push(i);
        }
        assert_eq!(buf.capacity(), 16);

        // 9 -> 8 items: 8 is not below 16 / 2
        buf.pop();
        assert_eq!(buf.capacity(), 16);

        // 8 -> 7 items: below half and still above the initial capacity
        buf.pop();
        assert_eq!(buf.capacity(), 8);

        for expected in 2..9 {
            assert_eq!(buf.pop(), Some(expected));
        }
        assert!(buf.capacity() >= buf.initial_capacity());
    }

    #[test]
    fn test_never_shrinks_below_initial_capacity() {
        let mut buf = RingBuffer::new(8);
        for i in 0..100 {
            buf.push(i);
        }
        while buf.pop().is_some() {
            assert!(buf.capacity() >= 8);
        }
        assert!(buf.capacity() >= 8);
    }

    #[test]
    fn test_interleaved_operations_keep_fifo() {
        let mut buf = RingBuffer::new(3);
        let mut expected = std::collections::VecDeque::new();
        let mut next = 0;
        for round in 0..200 {
            let pushes = (round % 7) + 1;
            let pops = round % 5;
            for _ in 0..pushes {
                buf.push(next);
                expected.push_back(next);
                next += 1;
            }
            for _ in 0..pops {
                assert_eq!(buf.pop(), expected.pop_front());
            }
            assert_eq!(buf.len(), expected.len());
            assert!(buf.len() <= buf.capacity());
        }
        for (index, value) in expected.iter().enumerate() {
            assert_eq!(buf.get(index), Some(value));
        }
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut buf = RingBuffer::new(4);
        for i in 0..10 {
            buf.push(i);
        }
        let capacity = buf.capacity();
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.get(0), None);
        assert_eq!(buf.capacity(), capacity);

        buf.push(42);
        assert_eq!(buf.pop(), Some(42));
    }

    #[test]
    fn test_drain_returns_items_in_order() {
        let mut buf = RingBuffer::new(4);
        for i in 0..4 {
            buf.push(i);
        }
        buf.pop();
        buf.push(4);
        assert_eq!(buf.drain(), vec![1, 2, 3, 4]);
        assert!(buf.is_empty());
        assert_eq!(buf.pop(), None);
    }
}
