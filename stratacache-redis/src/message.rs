//! # Hash-Key Eviction Message Module
//!
//! The wire message broadcast when individual hash elements are mutated or
//! evicted: the hash-table key plus the affected element keys.
//!
//! Element-key order is preserved on the wire and in the decoded message,
//! but equality and hashing are order-independent — two messages naming the
//! same elements in any order land in the same flag-set slot, which is what
//! the echo-suppression scheme relies on.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Pub/sub payload describing an element-grain cache mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashKeyEvictionMessage {
    /// The affected hash-table key.
    pub hash_key: String,
    /// The affected element keys, in publication order.
    pub element_keys: Vec<String>,
}

impl HashKeyEvictionMessage {
    /// Create a message for the given hash key and element keys.
    pub fn new(hash_key: impl Into<String>, element_keys: impl Into<Vec<String>>) -> Self {
        Self {
            hash_key: hash_key.into(),
            element_keys: element_keys.into(),
        }
    }

    fn sorted_elements(&self) -> Vec<&str> {
        let mut elements: Vec<&str> = self.element_keys.iter().map(String::as_str).collect();
        elements.sort_unstable();
        elements
    }
}

impl PartialEq for HashKeyEvictionMessage {
    fn eq(&self, other: &Self) -> bool {
        self.hash_key == other.hash_key && self.sorted_elements() == other.sorted_elements()
    }
}

impl Eq for HashKeyEvictionMessage {}

impl Hash for HashKeyEvictionMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_key.hash(state);
        // Wrapping sum keeps the element contribution order-independent
        // while staying consistent with the multiset equality above.
        let combined = self
            .element_keys
            .iter()
            .map(|element| {
                let mut hasher = DefaultHasher::new();
                element.hash(&mut hasher);
                hasher.finish()
            })
            .fold(0u64, u64::wrapping_add);
        state.write_u64(combined);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn keys(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn hash_of(message: &HashKeyEvictionMessage) -> u64 {
        let mut hasher = DefaultHasher::new();
        message.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn equality_ignores_element_order() {
        let left = HashKeyEvictionMessage::new("k", keys(&["a", "b", "c"]));
        let right = HashKeyEvictionMessage::new("k", keys(&["c", "a", "b"]));

        assert_eq!(left, right);
        assert_eq!(hash_of(&left), hash_of(&right));
    }

    #[test]
    fn differing_keys_or_elements_are_unequal() {
        let base = HashKeyEvictionMessage::new("k", keys(&["a", "b"]));

        assert_ne!(base, HashKeyEvictionMessage::new("other", keys(&["a", "b"])));
        assert_ne!(base, HashKeyEvictionMessage::new("k", keys(&["a"])));
        assert_ne!(base, HashKeyEvictionMessage::new("k", keys(&["a", "a"])));
    }

    #[test]
    fn set_membership_deduplicates_permutations() {
        let mut flags = HashSet::new();
        flags.insert(HashKeyEvictionMessage::new("k", keys(&["a", "b"])));

        assert!(flags.remove(&HashKeyEvictionMessage::new("k", keys(&["b", "a"]))));
        assert!(flags.is_empty());
    }

    #[test]
    fn wire_format_preserves_element_order() {
        let message = HashKeyEvictionMessage::new("k", keys(&["z", "a", "m"]));
        let encoded = serde_json::to_vec(&message).unwrap();
        let decoded: HashKeyEvictionMessage = serde_json::from_slice(&encoded).unwrap();

        assert_eq!(decoded.element_keys, keys(&["z", "a", "m"]));
        assert_eq!(decoded, message);
    }
}
