//! OCR context store.
//!
//! Held inline in [`crate::session::Session`] and guarded by the session's
//! mutex; this module only owns the data shape and the update/snapshot
//! logic, not the locking.

/// A `(recent, first, last)` defensive-copy snapshot handed to the hint
/// service and to tests. Mutating the returned vectors never affects the
/// store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrSnapshot {
    pub recent: Vec<String>,
    pub first: Vec<String>,
    pub last: Vec<String>,
}

impl OcrSnapshot {
    /// Order-preserving, deduplicated, lowercased-and-trimmed concatenation
    /// of `recent`, `first`, `last` — the fourth list the hint prompt uses.
    #[must_use]
    pub fn unique(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for token in self.recent.iter().chain(self.first.iter()).chain(self.last.iter()) {
            let normalized = token.trim().to_lowercase();
            if normalized.is_empty() {
                continue;
            }
            if seen.insert(normalized.clone()) {
                out.push(normalized);
            }
        }
        out
    }
}

/// Mutable OCR state: latest/first/last token lists, created empty and
/// overwritten per `frame_meta` arrival.
#[derive(Debug, Clone, Default)]
pub struct OcrStore {
    recent: Vec<String>,
    first: Vec<String>,
    last: Vec<String>,
}

impl OcrStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an inbound `frame_meta`: `tokens` always replaces `recent`;
    /// replaces `first`/`last` too when the corresponding flag is set.
    /// Neither list is ever cleared implicitly — a `stop` message never
    /// calls this, so the last-seen `first`/`last` values persist for the
    /// life of the session.
    pub fn update(&mut self, tokens: Vec<String>, first: bool, last: bool) {
        if first {
            self.first = tokens.clone();
        }
        if last {
            self.last = tokens.clone();
        }
        self.recent = tokens;
    }

    /// Defensive-copy snapshot of the current state.
    #[must_use]
    pub fn snapshot(&self) -> OcrSnapshot {
        OcrSnapshot {
            recent: self.recent.clone(),
            first: self.first.clone(),
            last: self.last.clone(),
        }
    }
}
