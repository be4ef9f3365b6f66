//! Cross-run deduplication by title fingerprint.
//!
//! A fingerprint is the SHA-256 of the whitespace-normalized title. Titles
//! differing only in case are distinct unless case folding is enabled.

use std::collections::HashSet;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use crate::models::Posting;
use crate::utils::normalize_whitespace;

/// Compute the fingerprint of a title.
pub fn fingerprint(title: &str, case_insensitive: bool) -> String {
    let mut normalized = normalize_whitespace(title);
    if case_insensitive {
        normalized = normalized.to_lowercase();
    }
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

/// Set of fingerprints already delivered during this session.
///
/// Only grows. Insertion is atomic, so concurrent callers with the same
/// fingerprint never both see a posting as novel.
#[derive(Debug, Default)]
pub struct FingerprintSet {
    seen: Mutex<HashSet<String>>,
    case_insensitive: bool,
}

impl FingerprintSet {
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
            case_insensitive,
        }
    }

    /// Seed a set from a persisted snapshot.
    pub fn from_fingerprints<I>(fingerprints: I, case_insensitive: bool) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            seen: Mutex::new(fingerprints.into_iter().collect()),
            case_insensitive,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the posting and report whether it was new.
    pub fn is_novel(&self, posting: &Posting) -> bool {
        let fp = fingerprint(posting.title(), self.case_insensitive);
        self.lock().insert(fp)
    }

    /// Check without recording.
    pub fn contains(&self, posting: &Posting) -> bool {
        let fp = fingerprint(posting.title(), self.case_insensitive);
        self.lock().contains(&fp)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Sorted copy of all fingerprints, for persistence.
    pub fn snapshot(&self) -> Vec<String> {
        let mut all: Vec<String> = self.lock().iter().cloned().collect();
        all.sort();
        all
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::models::{RawCandidate, SourceId};

    fn posting(title: &str) -> Posting {
        Posting::from_candidate(
            &RawCandidate::new(title, "https://x/1", SourceId::from("test")),
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_fingerprint_normalizes_whitespace() {
        assert_eq!(
            fingerprint("Analista  de\tTI ", false),
            fingerprint("Analista de TI", false)
        );
        assert_eq!(fingerprint("x", false).len(), 64);
    }

    #[test]
    fn test_case_sensitivity() {
        assert_ne!(
            fingerprint("Analista de TI", false),
            fingerprint("ANALISTA DE TI", false)
        );
        assert_eq!(
            fingerprint("Analista de TI", true),
            fingerprint("ANALISTA DE TI", true)
        );
    }

    #[test]
    fn test_novel_exactly_once() {
        let set = FingerprintSet::new(false);
        assert!(set.is_novel(&posting("Desenvolvedor Rust")));
        assert!(!set.is_novel(&posting("Desenvolvedor Rust")));
        assert!(!set.is_novel(&posting("Desenvolvedor   Rust")));
        assert!(set.is_novel(&posting("desenvolvedor rust")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_contains_does_not_record() {
        let set = FingerprintSet::new(false);
        let p = posting("Suporte Técnico");
        assert!(!set.contains(&p));
        assert!(set.is_empty());
        assert!(set.is_novel(&p));
        assert!(set.contains(&p));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let set = FingerprintSet::new(false);
        set.is_novel(&posting("B vaga"));
        set.is_novel(&posting("A vaga"));

        let snap = set.snapshot();
        assert_eq!(snap.len(), 2);
        assert!(snap.windows(2).all(|w| w[0] <= w[1]));

        let restored = FingerprintSet::from_fingerprints(snap, false);
        assert!(!restored.is_novel(&posting("A vaga")));
        assert!(!restored.is_novel(&posting("B vaga")));
    }

    #[test]
    fn test_concurrent_callers_see_one_novel() {
        let set = Arc::new(FingerprintSet::new(false));
        let novel = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let set = Arc::clone(&set);
                let novel = Arc::clone(&novel);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if set.is_novel(&posting("Estágio em TI")) {
                            novel.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(novel.load(Ordering::SeqCst), 1);
    }
}
