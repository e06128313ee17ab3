use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// One recorded substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Usage {
    pub chosen: String,
    pub at: u64,
}

/// Short-term record of which synonym replaced each word, used to avoid
/// picking the same replacement again within the window. In memory only.
///
/// Choosing and recording happen under one lock, so concurrent passes over
/// the same word cannot both take the same fresh candidate.
#[derive(Debug)]
pub struct UsageHistory {
    entries: Mutex<HashMap<String, VecDeque<Usage>>>,
    cap: usize,
    window_secs: u64,
}

impl UsageHistory {
    pub fn new(cap: usize, window_secs: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            cap: cap.max(1),
            window_secs,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<Usage>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pick from `candidates` (best first) for `word` and record the choice.
    /// The first candidate not used within the window wins; if all were,
    /// the one used longest ago.
    pub fn choose(&self, word: &str, candidates: &[String], now: u64) -> Option<String> {
        if candidates.is_empty() {
            return None;
        }
        let mut entries = self.lock();
        let list = entries.entry(word.to_string()).or_default();
        let last_used = |c: &str| list.iter().rev().find(|u| u.chosen == c).map(|u| u.at);
        let fresh = candidates.iter().find(|c| {
            last_used(c.as_str()).map_or(true, |at| now.saturating_sub(at) >= self.window_secs)
        });
        let chosen = match fresh {
            Some(c) => c.clone(),
            None => candidates
                .iter()
                .min_by_key(|c| last_used(c.as_str()).unwrap_or(0))?
                .clone(),
        };
        list.push_back(Usage {
            chosen: chosen.clone(),
            at: now,
        });
        while list.len() > self.cap {
            list.pop_front();
        }
        Some(chosen)
    }

    /// Recorded usages of `word`, oldest first.
    pub fn recent(&self, word: &str) -> Vec<Usage> {
        self.lock()
            .get(word)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn avoids_recent_choice() {
        let h = UsageHistory::new(10, 1800);
        let cands = c(&["重要", "大事"]);
        assert_eq!(h.choose("大切", &cands, 0).as_deref(), Some("重要"));
        assert_eq!(h.choose("大切", &cands, 10).as_deref(), Some("大事"));
        // both used: least recently used comes back
        assert_eq!(h.choose("大切", &cands, 20).as_deref(), Some("重要"));
        // window elapsed for everything: best first again
        assert_eq!(h.choose("大切", &cands, 5000).as_deref(), Some("重要"));
    }

    #[test]
    fn words_are_tracked_separately() {
        let h = UsageHistory::new(10, 1800);
        let cands = c(&["a", "b"]);
        assert_eq!(h.choose("x", &cands, 0).as_deref(), Some("a"));
        assert_eq!(h.choose("y", &cands, 0).as_deref(), Some("a"));
        assert!(h.choose("x", &[], 0).is_none());
    }

    #[test]
    fn history_is_bounded() {
        let h = UsageHistory::new(3, 1800);
        for t in 0..10 {
            h.choose("w", &c(&["a"]), t);
        }
        let recent = h.recent("w");
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].at, 7);
        h.clear();
        assert!(h.recent("w").is_empty());
    }
}
