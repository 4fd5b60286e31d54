//! Per-mode selection indices
//!
//! Each mode remembers its own position so switching modes and back returns
//! to the same item.

use mirp_common::PlaybackMode;

/// Selected index for each playback mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    local: usize,
    remote: usize,
}

impl Selection {
    pub fn index(&self, mode: PlaybackMode) -> usize {
        match mode {
            PlaybackMode::LocalCatalog => self.local,
            PlaybackMode::RemoteStream => self.remote,
        }
    }

    pub fn set(&mut self, mode: PlaybackMode, index: usize) {
        match mode {
            PlaybackMode::LocalCatalog => self.local = index,
            PlaybackMode::RemoteStream => self.remote = index,
        }
    }

    /// Move one position with wraparound
    ///
    /// Returns the new index, or `None` (selection untouched) when the
    /// catalog is empty.
    pub fn step(&mut self, mode: PlaybackMode, count: usize, forward: bool) -> Option<usize> {
        if count == 0 {
            return None;
        }
        let current = self.index(mode) % count;
        let next = if forward {
            (current + 1) % count
        } else {
            (current + count - 1) % count
        };
        self.set(mode, next);
        Some(next)
    }

    /// Keep the index inside a catalog of `count` items
    ///
    /// An empty catalog parks the index at 0. Returns whether it changed.
    pub fn clamp(&mut self, mode: PlaybackMode, count: usize) -> bool {
        let current = self.index(mode);
        let clamped = if count == 0 { 0 } else { current.min(count - 1) };
        self.set(mode, clamped);
        clamped != current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL: PlaybackMode = PlaybackMode::LocalCatalog;
    const REMOTE: PlaybackMode = PlaybackMode::RemoteStream;

    #[test]
    fn test_modes_are_independent() {
        let mut selection = Selection::default();
        selection.set(LOCAL, 4);
        assert_eq!(selection.index(LOCAL), 4);
        assert_eq!(selection.index(REMOTE), 0);
    }

    #[test]
    fn test_step_wraps_both_directions() {
        let mut selection = Selection::default();
        assert_eq!(selection.step(LOCAL, 3, false), Some(2));
        assert_eq!(selection.step(LOCAL, 3, true), Some(0));
        assert_eq!(selection.step(LOCAL, 3, true), Some(1));
        assert_eq!(selection.step(LOCAL, 3, true), Some(2));
        assert_eq!(selection.step(LOCAL, 3, true), Some(0));
    }

    #[test]
    fn test_step_count_times_returns_to_start() {
        let mut selection = Selection::default();
        selection.set(REMOTE, 5);
        for _ in 0..9 {
            selection.step(REMOTE, 9, true);
        }
        assert_eq!(selection.index(REMOTE), 5);
    }

    #[test]
    fn test_step_on_empty_catalog_is_none() {
        let mut selection = Selection::default();
        selection.set(LOCAL, 2);
        assert_eq!(selection.step(LOCAL, 0, true), None);
        assert_eq!(selection.index(LOCAL), 2);
    }

    #[test]
    fn test_clamp() {
        let mut selection = Selection::default();
        selection.set(LOCAL, 10);
        assert!(selection.clamp(LOCAL, 4));
        assert_eq!(selection.index(LOCAL), 3);
        assert!(!selection.clamp(LOCAL, 4));
        assert!(selection.clamp(LOCAL, 0));
        assert_eq!(selection.index(LOCAL), 0);
    }
}
