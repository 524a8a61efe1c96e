use serde::{Deserialize, Serialize};

/// Tag captured when an asynchronous request is issued.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(pub u64);

/// Monotonically increasing generation counter.
///
/// Results tagged with anything but the latest generation are stale and must
/// be discarded. In-flight work is never aborted, only ignored.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerationCounter {
    current: u64,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new generation, invalidating every earlier tag.
    pub fn advance(&mut self) -> Generation {
        self.current += 1;
        Generation(self.current)
    }

    pub fn current(&self) -> Generation {
        Generation(self.current)
    }

    pub fn is_current(&self, tag: Generation) -> bool {
        tag.0 == self.current
    }
}

#[cfg(test)]
mod tests {
    use super::GenerationCounter;

    #[test]
    fn only_latest_generation_is_current() {
        let mut g = GenerationCounter::new();
        let a = g.advance();
        let b = g.advance();
        assert!(a < b);
        assert!(!g.is_current(a));
        assert!(g.is_current(b));
        assert_eq!(g.current(), b);
    }
}
