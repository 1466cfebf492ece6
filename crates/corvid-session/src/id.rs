use std::collections::HashSet;

use uuid::Uuid;

/// Generate a unique 8-hex-char entry id, checking `existing` for collisions.
///
/// Mirrors `session_manager.py`'s `generate_id`: truncate a fresh UUIDv4 to
/// its first 8 hex characters and retry on collision, falling back to a full
/// UUID (still hex, just longer) if 100 attempts all collide.
pub fn generate_id(existing: &HashSet<String>) -> String {
    for _ in 0..100 {
        let candidate = short_hex();
        if !existing.contains(&candidate) {
            return candidate;
        }
    }
    Uuid::new_v4().simple().to_string()
}

fn short_hex() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_eight_hex_chars() {
        let id = generate_id(&HashSet::new());
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn avoids_existing_ids() {
        let mut existing = HashSet::new();
        for _ in 0..50 {
            existing.insert(generate_id(&existing.clone()));
        }
        assert_eq!(existing.len(), 50);
    }
}
