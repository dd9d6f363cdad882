use std::collections::VecDeque;

/// FIFO push that keeps a buffer at or below `max_size`.
pub trait BoundedPush<T> {
    /// Returns the evicted element, if any.
    fn push_bounded(&mut self, value: T, max_size: usize) -> Option<T>;
}

impl<T> BoundedPush<T> for VecDeque<T> {
    #[inline]
    fn push_bounded(&mut self, value: T, max_size: usize) -> Option<T> {
        let mut evicted = None;
        while self.len() >= max_size.max(1) {
            evicted = self.pop_front();
        }
        self.push_back(value);
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_first() {
        let mut buf = VecDeque::new();
        for i in 0..5 {
            buf.push_bounded(i, 3);
        }
        assert_eq!(buf, VecDeque::from(vec![2, 3, 4]));
    }

    #[test]
    fn test_shrinks_an_oversized_buffer() {
        let mut buf: VecDeque<u32> = (0..10).collect();
        let evicted = buf.push_bounded(10, 4);
        assert_eq!(evicted, Some(6));
        assert_eq!(buf, VecDeque::from(vec![7, 8, 9, 10]));
    }
}
