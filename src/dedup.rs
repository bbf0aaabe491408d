// src/dedup.rs
use dashmap::DashSet;

/// Names already claimed by a worker during one scan.
///
/// `DashSet::insert` performs the membership check and the insertion under
/// the same shard lock, so two workers can never both win the claim for one
/// name. The guard is created per scan and dropped with it.
#[derive(Debug, Default)]
pub struct DedupGuard {
    claimed: DashSet<String>,
}

impl DedupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` exactly once per distinct name.
    pub fn try_claim(&self, name: &str) -> bool {
        if self.claimed.contains(name) {
            return false;
        }
        self.claimed.insert(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_claims_once() {
        let guard = DedupGuard::new();
        assert!(guard.try_claim("www.example.com"));
        assert!(!guard.try_claim("www.example.com"));
        assert!(guard.try_claim("mail.example.com"));
        assert!(!guard.try_claim("mail.example.com"));
    }

    #[test]
    fn test_single_winner_under_contention() {
        let guard = Arc::new(DedupGuard::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let guard = guard.clone();
                let winners = winners.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        if guard.try_claim(&format!("host{}.example.com", i)) {
                            winners.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 100);
    }
}
