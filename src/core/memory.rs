//! Bounded window of recently recommended cuisines/venues.

use crate::models::normalize_tag;
use std::collections::VecDeque;

/// Number of recent selections remembered by default
pub const DEFAULT_MEMORY_CAPACITY: usize = 3;

/// Ring buffer of the last few accepted selections, oldest first.
///
/// Owned by the pipeline invocation context and passed explicitly to the
/// scorer, so every test can start from a fresh instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMemory {
    entries: VecDeque<String>,
    capacity: usize,
}

impl SessionMemory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Rebuild from persisted entries, keeping only the newest `capacity`
    pub fn from_entries<I, S>(entries: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut memory = Self::with_capacity(capacity);
        for entry in entries {
            memory.record(entry.as_ref());
        }
        memory
    }

    /// Append a selection, evicting the oldest once the window is full
    pub fn record(&mut self, selection: &str) {
        if self.capacity == 0 {
            return;
        }
        let key = normalize_tag(selection);
        if key.is_empty() {
            return;
        }
        self.entries.push_back(key);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Current window, most recent last
    pub fn recent(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SessionMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourth_record_evicts_first() {
        let mut memory = SessionMemory::new();
        memory.record("thai");
        memory.record("pizza");
        memory.record("sushi");
        memory.record("tacos");

        assert_eq!(memory.len(), 3);
        assert_eq!(memory.recent(), vec!["pizza", "sushi", "tacos"]);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut memory = SessionMemory::new();
        for i in 0..50 {
            memory.record(&format!("cuisine {}", i));
            assert!(memory.len() <= DEFAULT_MEMORY_CAPACITY);
        }
        assert_eq!(memory.recent().last().map(String::as_str), Some("cuisine-49"));
    }

    #[test]
    fn test_repeats_occupy_separate_slots() {
        let mut memory = SessionMemory::new();
        memory.record("Thai");
        memory.record("thai");
        assert_eq!(memory.recent(), vec!["thai", "thai"]);
    }

    #[test]
    fn test_from_entries_keeps_newest() {
        let memory = SessionMemory::from_entries(["a", "b", "c", "d", "e"], 3);
        assert_eq!(memory.recent(), vec!["c", "d", "e"]);
    }

    #[test]
    fn test_blank_selection_ignored() {
        let mut memory = SessionMemory::new();
        memory.record("   ");
        assert!(memory.is_empty());
    }
}
