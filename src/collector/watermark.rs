use std::sync::atomic::{AtomicU64, Ordering};

const NONE: u64 = u64::MAX;

/// Highest timeline sequence a collector has consumed, kept across restarts.
#[derive(Debug)]
pub struct Watermark(AtomicU64);

impl Default for Watermark {
    fn default() -> Self {
        Self(AtomicU64::new(NONE))
    }
}

impl Watermark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<u64> {
        match self.0.load(Ordering::Acquire) {
            NONE => None,
            seen => Some(seen),
        }
    }

    /// Records `sequence` as consumed. Returns `false` if it was seen before.
    pub fn advance(&self, sequence: u64) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if current != NONE && sequence <= current {
                return false;
            }
            match self
                .0
                .compare_exchange(current, sequence, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_moves_forward() {
        let mark = Watermark::new();
        assert_eq!(mark.get(), None);
        assert!(mark.advance(0));
        assert!(mark.advance(4));
        assert!(!mark.advance(4));
        assert!(!mark.advance(2));
        assert_eq!(mark.get(), Some(4));
    }
}
