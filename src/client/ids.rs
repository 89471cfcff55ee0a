//! Call id generation shared by both client variants

use std::sync::atomic::{AtomicU32, Ordering};

/// Ids stay at or below this value; the counter wraps back to 1 after it
pub const ID_WRAP: u32 = 1_000_000;

/// Monotonic call id counter starting at 1
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicU32,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next call id. Wraps to 1 after [`ID_WRAP`] instead of overflowing.
    pub fn next_id(&self) -> u32 {
        let advance = |id: u32| if id >= ID_WRAP { 1 } else { id + 1 };
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| Some(advance(id)))
            .unwrap_or_else(|id| id);
        advance(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_ids_wrap_after_limit() {
        let ids = IdGenerator::new();
        for expected in 1..=ID_WRAP {
            assert_eq!(ids.next_id(), expected);
        }
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let ids = Arc::new(IdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..1000).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 4000);
    }
}
