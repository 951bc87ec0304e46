//! Pagination window over a list of items.

/// A `[first, last)` window of item indices that fits in `capacity` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListRange {
    pub first: usize,
    pub last: usize,
    capacity: usize,
}

impl ListRange {
    pub fn new(first: usize, last: usize, capacity: usize) -> Self {
        Self {
            first,
            last,
            capacity,
        }
    }

    /// Window showing `cursor` among `len` items.
    ///
    /// `previous` is kept as long as it was computed for the same capacity and item count
    /// and still contains the cursor, so moving inside a page never scrolls it. Otherwise
    /// the cursor ends up on the last row of the new window (or the window starts at 0 when
    /// the cursor is on the first page).
    pub fn fit(previous: Option<ListRange>, cursor: usize, len: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        if let Some(prev) = previous {
            if prev.capacity == capacity && prev.last <= len && prev.contains(cursor) {
                return prev;
            }
        }
        if len <= capacity {
            return Self::new(0, len, capacity);
        }
        if cursor < capacity {
            Self::new(0, capacity, capacity)
        } else {
            let last = (cursor + 1).min(len);
            Self::new(last - capacity, last, capacity)
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.first <= index && index < self.last
    }

    pub fn len(&self) -> usize {
        self.last - self.first
    }

    pub fn is_empty(&self) -> bool {
        self.first == self.last
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> std::ops::Range<usize> {
        self.first..self.last
    }
}

#[cfg(test)]
mod tests {
    use super::ListRange;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_lists_show_everything() {
        let range = ListRange::fit(None, 2, 4, 10);
        assert_eq!((range.first, range.last), (0, 4));
        assert_eq!(range.len(), 4);
    }

    #[test]
    fn window_is_stable_while_cursor_stays_inside() {
        let first = ListRange::fit(None, 0, 50, 10);
        assert_eq!((first.first, first.last), (0, 10));
        for cursor in 0..10 {
            assert_eq!(ListRange::fit(Some(first), cursor, 50, 10), first);
        }
    }

    #[test]
    fn leaving_the_window_pins_cursor_to_the_edge() {
        let first = ListRange::fit(None, 0, 50, 10);
        let next = ListRange::fit(Some(first), 10, 50, 10);
        assert_eq!((next.first, next.last), (1, 11));

        let wrapped = ListRange::fit(Some(next), 49, 50, 10);
        assert_eq!((wrapped.first, wrapped.last), (40, 50));

        let back = ListRange::fit(Some(wrapped), 0, 50, 10);
        assert_eq!((back.first, back.last), (0, 10));
    }

    #[test]
    fn capacity_change_recomputes() {
        let first = ListRange::fit(None, 5, 50, 10);
        let smaller = ListRange::fit(Some(first), 5, 50, 4);
        assert_eq!((smaller.first, smaller.last), (2, 6));
        assert!(smaller.contains(5));
    }

    #[test]
    fn zero_capacity_still_shows_the_cursor() {
        let range = ListRange::fit(None, 3, 5, 0);
        assert_eq!((range.first, range.last), (3, 4));
        assert_eq!(range.capacity(), 1);
    }
}
