//! Round-robin load balancing strategy.

use crate::health::state::NodeDescriptor;
use crate::load_balancer::Strategy;

/// Round-robin selector.
/// Stores an internal cursor that advances on every call and wraps modulo
/// the number of candidates.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for RoundRobin {
    fn next_index(&mut self, candidates: &[&NodeDescriptor]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let index = self.cursor % candidates.len();
        self.cursor = self.cursor.wrapping_add(1);
        Some(index)
    }
}
