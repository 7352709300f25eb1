/// Navigation state of one reveal viewer: either the intro slide or one of
/// the ranking's items. Items are presented worst-to-best, so index 0 is the
/// lowest-ranked item of the descending fetch.
///
/// Every transition clamps the target index into `[0, max(0, N-1)]`, even for
/// remote payloads that should already be in range.
#[derive(Debug, Clone)]
pub struct RevealState {
    item_count: usize,
    current_index: usize,
    show_intro: bool,
}

impl RevealState {
    /// Viewers always start on the intro slide.
    pub fn new(item_count: usize) -> Self {
        Self {
            item_count,
            current_index: 0,
            show_intro: true,
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn show_intro(&self) -> bool {
        self.show_intro
    }

    fn clamp(&self, index: usize) -> usize {
        index.min(self.item_count.saturating_sub(1))
    }

    /// Advance one slide. Returns false when the transition is a no-op
    /// (empty ranking, or already on the last item).
    pub fn next(&mut self) -> bool {
        if self.item_count == 0 {
            return false;
        }
        if self.show_intro {
            self.current_index = 0;
            self.show_intro = false;
            return true;
        }
        if self.current_index < self.item_count - 1 {
            self.current_index += 1;
            return true;
        }
        false
    }

    /// Step back one slide. From the first item this returns to the intro;
    /// from the intro it is a no-op.
    pub fn prev(&mut self) -> bool {
        if self.show_intro {
            return false;
        }
        if self.current_index == 0 {
            self.show_intro = true;
            return true;
        }
        self.current_index -= 1;
        true
    }

    /// Jump to an explicit navigation state, clamping the index.
    pub fn navigate(&mut self, index: usize, show_intro: bool) {
        self.current_index = self.clamp(index);
        self.show_intro = show_intro;
    }

    /// Apply a remote viewer's navigation. Same clamping as local jumps;
    /// last message wins.
    pub fn apply_remote(&mut self, index: usize, show_intro: bool) {
        self.navigate(index, show_intro);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_intro() {
        let state = RevealState::new(3);
        assert!(state.show_intro());
        assert_eq!(state.current_index(), 0);
    }

    #[test]
    fn next_from_intro_reaches_first_item() {
        let mut state = RevealState::new(3);
        assert!(state.next());
        assert!(!state.show_intro());
        assert_eq!(state.current_index(), 0);
    }

    #[test]
    fn prev_from_first_item_returns_to_intro() {
        let mut state = RevealState::new(3);
        state.next();
        assert!(state.prev());
        assert!(state.show_intro());
        // Prev from the intro is a no-op.
        assert!(!state.prev());
    }

    #[test]
    fn two_item_walkthrough_stops_at_last() {
        let mut state = RevealState::new(2);
        assert!(state.next());
        assert_eq!((state.current_index(), state.show_intro()), (0, false));
        assert!(state.next());
        assert_eq!((state.current_index(), state.show_intro()), (1, false));
        // Terminal forward edge: third next is a no-op.
        assert!(!state.next());
        assert_eq!((state.current_index(), state.show_intro()), (1, false));
    }

    #[test]
    fn next_on_empty_ranking_is_noop() {
        let mut state = RevealState::new(0);
        assert!(!state.next());
        assert!(state.show_intro());
    }

    #[test]
    fn remote_index_is_clamped() {
        let mut state = RevealState::new(3);
        state.apply_remote(99, false);
        assert_eq!(state.current_index(), 2);

        let mut empty = RevealState::new(0);
        empty.apply_remote(7, false);
        assert_eq!(empty.current_index(), 0);
    }

    #[test]
    fn index_never_leaves_bounds_under_random_walk() {
        let mut state = RevealState::new(4);
        for step in 0..50 {
            if step % 3 == 0 {
                state.prev();
            } else {
                state.next();
            }
            assert!(state.current_index() < 4);
        }
    }
}
