//! Linear document history with destructive undo

/// Ordered markup snapshots; the last one is the displayed document.
///
/// History is never empty: it is seeded with the initial document and
/// [`undo`](DocumentHistory::undo) refuses to pop the last snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHistory {
    snapshots: Vec<String>,
}

impl DocumentHistory {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            snapshots: vec![initial.into()],
        }
    }

    /// The displayed snapshot
    pub fn current(&self) -> &str {
        // Non-empty by construction
        self.snapshots.last().map(String::as_str).unwrap_or_default()
    }

    /// Append `markup`; it becomes the displayed snapshot
    pub fn push(&mut self, markup: impl Into<String>) {
        self.snapshots.push(markup.into());
    }

    /// Drop the displayed snapshot. Returns false (and does nothing) when only
    /// the initial snapshot is left.
    pub fn undo(&mut self) -> bool {
        if self.snapshots.len() > 1 {
            self.snapshots.pop();
            true
        } else {
            false
        }
    }

    pub fn can_undo(&self) -> bool {
        self.snapshots.len() > 1
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Never true; the initial snapshot is always kept
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn snapshots(&self) -> &[String] {
        &self.snapshots
    }
}
