//! Trie of key sequences to bindings.
//!
//! Each node has a fixed [`KEYMAP_LENGTH`]-wide table indexed by codepoint plus a sparse
//! branch for wider codepoints. A sequence that is both bound and the prefix of a longer
//! bound sequence keeps its binding as the *overflow* of the interior node it ends on.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::core::keys::{compare_key_sequences, expand_range};
use crate::error::KeyMapError;

/// Width of the fixed per-node table.
pub const KEYMAP_LENGTH: usize = 256;

/// Default wait for a continuation before an ambiguous prefix is committed.
pub const DEFAULT_AMBIGUOUS_TIMEOUT: Duration = Duration::from_millis(150);

/// How much of a looked-up sequence a [`Match`] left unconsumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    /// The whole sequence was consumed and ends on an interior node: longer bindings
    /// continue from here, so more input may extend the match.
    Ambiguous,
    /// The match stopped with this many trailing codepoints unused. `Unconsumed(0)` with a
    /// binding is an exact match that no longer binding extends.
    Unconsumed(usize),
}

/// Result of [`KeyMap::get_bound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'a, B> {
    pub binding: Option<&'a B>,
    pub remaining: Remaining,
}

impl<'a, B> Match<'a, B> {
    fn new(binding: Option<&'a B>, remaining: Remaining) -> Self {
        Self { binding, remaining }
    }

    /// A bound sequence that no longer binding extends.
    pub fn is_exact(&self) -> bool {
        self.binding.is_some() && self.remaining == Remaining::Unconsumed(0)
    }
}

#[derive(Debug, Clone)]
enum Slot<B> {
    Empty,
    Bound(B),
    Node(Box<Node<B>>),
}

impl<B> Slot<B> {
    fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }
}

#[derive(Debug, Clone)]
struct Node<B> {
    slots: Box<[Slot<B>]>,
    wide: BTreeMap<char, Slot<B>>,
    overflow: Option<B>,
}

impl<B> Node<B> {
    fn new() -> Self {
        Self {
            slots: (0..KEYMAP_LENGTH).map(|_| Slot::Empty).collect(),
            wide: BTreeMap::new(),
            overflow: None,
        }
    }

    fn with_overflow(overflow: Option<B>) -> Self {
        let mut node = Self::new();
        node.overflow = overflow;
        node
    }

    fn slot(&self, ch: char) -> Option<&Slot<B>> {
        let idx = ch as usize;
        if idx < KEYMAP_LENGTH {
            Some(&self.slots[idx])
        } else {
            self.wide.get(&ch)
        }
    }

    fn slot_mut(&mut self, ch: char) -> &mut Slot<B> {
        let idx = ch as usize;
        if idx < KEYMAP_LENGTH {
            &mut self.slots[idx]
        } else {
            self.wide.entry(ch).or_insert(Slot::Empty)
        }
    }

    fn clear_slot(&mut self, ch: char) {
        let idx = ch as usize;
        if idx < KEYMAP_LENGTH {
            self.slots[idx] = Slot::Empty;
        } else {
            self.wide.remove(&ch);
        }
    }

    fn has_children(&self) -> bool {
        !self.wide.is_empty() || self.slots.iter().any(|slot| !slot.is_empty())
    }

    fn get_bound<'a>(&'a self, seq: &[char]) -> Match<'a, B> {
        let Some((&first, rest)) = seq.split_first() else {
            return Match::new(self.overflow.as_ref(), Remaining::Ambiguous);
        };
        match self.slot(first) {
            Some(Slot::Node(child)) => child.get_bound(rest),
            Some(Slot::Bound(binding)) => {
                Match::new(Some(binding), Remaining::Unconsumed(rest.len()))
            }
            Some(Slot::Empty) | None => {
                Match::new(self.overflow.as_ref(), Remaining::Unconsumed(seq.len()))
            }
        }
    }

    fn bind(&mut self, seq: &[char], binding: B, only_if_empty: bool) -> bool {
        let Some((&first, rest)) = seq.split_first() else {
            return false;
        };
        let slot = self.slot_mut(first);
        if rest.is_empty() {
            if let Slot::Node(child) = slot {
                if only_if_empty && child.overflow.is_some() {
                    return false;
                }
                child.overflow = Some(binding);
                return true;
            }
            if only_if_empty && matches!(slot, Slot::Bound(_)) {
                return false;
            }
            *slot = Slot::Bound(binding);
            return true;
        }

        if !matches!(slot, Slot::Node(_)) {
            let overflow = match std::mem::replace(slot, Slot::Empty) {
                Slot::Bound(existing) => Some(existing),
                _ => None,
            };
            *slot = Slot::Node(Box::new(Node::with_overflow(overflow)));
        }
        match slot {
            Slot::Node(child) => child.bind(rest, binding, only_if_empty),
            _ => false,
        }
    }

    fn unbind(&mut self, seq: &[char]) -> Option<B> {
        let (&first, rest) = seq.split_first()?;
        let slot = self.slot_mut(first);
        let removed = if rest.is_empty() {
            match std::mem::replace(slot, Slot::Empty) {
                Slot::Bound(binding) => Some(binding),
                Slot::Node(mut child) => {
                    let removed = child.overflow.take();
                    *slot = Slot::Node(child);
                    removed
                }
                Slot::Empty => None,
            }
        } else {
            match slot {
                Slot::Node(child) => child.unbind(rest),
                _ => None,
            }
        };

        // An emptied sub-trie collapses back into a plain slot.
        if let Slot::Node(child) = slot {
            if !child.has_children() {
                *slot = match child.overflow.take() {
                    Some(overflow) => Slot::Bound(overflow),
                    None => Slot::Empty,
                };
            }
        }
        if slot.is_empty() {
            self.clear_slot(first);
        }
        removed
    }

    fn collect<'a>(&'a self, prefix: &mut String, out: &mut Vec<(String, &'a B)>) {
        let narrow = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| char::from_u32(idx as u32).map(|ch| (ch, slot)));
        let wide = self.wide.iter().map(|(ch, slot)| (*ch, slot));
        for (ch, slot) in narrow.chain(wide) {
            match slot {
                Slot::Empty => {}
                Slot::Bound(binding) => {
                    prefix.push(ch);
                    out.push((prefix.clone(), binding));
                    prefix.pop();
                }
                Slot::Node(child) => {
                    prefix.push(ch);
                    if let Some(overflow) = child.overflow.as_ref() {
                        out.push((prefix.clone(), overflow));
                    }
                    child.collect(prefix, out);
                    prefix.pop();
                }
            }
        }
    }
}

/// Key sequences mapped to bindings of type `B`, plus the fallbacks the decoder uses when
/// nothing matches.
#[derive(Debug, Clone)]
pub struct KeyMap<B> {
    root: Node<B>,
    unicode: Option<B>,
    nomatch: Option<B>,
    ambiguous_timeout: Duration,
}

impl<B> Default for KeyMap<B> {
    fn default() -> Self {
        Self {
            root: Node::new(),
            unicode: None,
            nomatch: None,
            ambiguous_timeout: DEFAULT_AMBIGUOUS_TIMEOUT,
        }
    }
}

impl<B> KeyMap<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Longest-prefix lookup of `seq`; see [`Remaining`] for the remainder marker.
    pub fn get_bound(&self, seq: &[char]) -> Match<'_, B> {
        self.root.get_bound(seq)
    }

    /// Binding for exactly `seq`, ignoring fallbacks.
    pub fn get(&self, seq: &str) -> Option<&B> {
        let chars: Vec<char> = seq.chars().collect();
        if chars.is_empty() {
            return None;
        }
        let found = self.get_bound(&chars);
        match found.remaining {
            Remaining::Ambiguous | Remaining::Unconsumed(0) => found.binding,
            Remaining::Unconsumed(_) => None,
        }
    }

    /// Bind `seq` to `binding`, replacing any previous binding of exactly `seq`.
    ///
    /// Empty sequences are ignored.
    pub fn bind(&mut self, seq: &str, binding: B) {
        let chars: Vec<char> = seq.chars().collect();
        self.root.bind(&chars, binding, false);
    }

    /// Bind `seq` unless it already has a binding. Returns whether it was bound.
    pub fn bind_if_not_bound(&mut self, seq: &str, binding: B) -> bool {
        let chars: Vec<char> = seq.chars().collect();
        self.root.bind(&chars, binding, true)
    }

    /// Remove the binding of exactly `seq`, collapsing sub-tries it leaves empty.
    pub fn unbind(&mut self, seq: &str) -> Option<B> {
        let chars: Vec<char> = seq.chars().collect();
        self.root.unbind(&chars)
    }

    /// Every bound sequence with its binding, shortest sequences first.
    pub fn bound_keys(&self) -> Vec<(String, &B)> {
        let mut out = Vec::new();
        self.root.collect(&mut String::new(), &mut out);
        out.sort_by(|(a, _), (b, _)| compare_key_sequences(a, b));
        out
    }

    /// Binding returned for an unbound codepoint at or above [`KEYMAP_LENGTH`].
    pub fn unicode(&self) -> Option<&B> {
        self.unicode.as_ref()
    }

    pub fn set_unicode(&mut self, binding: B) {
        self.unicode = Some(binding);
    }

    /// Binding returned when the first pending codepoint matches nothing.
    pub fn nomatch(&self) -> Option<&B> {
        self.nomatch.as_ref()
    }

    pub fn set_nomatch(&mut self, binding: B) {
        self.nomatch = Some(binding);
    }

    pub fn ambiguous_timeout(&self) -> Duration {
        self.ambiguous_timeout
    }

    pub fn set_ambiguous_timeout(&mut self, timeout: Duration) {
        self.ambiguous_timeout = timeout;
    }
}

impl<B: Clone> KeyMap<B> {
    /// Bind every sequence of `seqs` to a clone of `binding`.
    pub fn bind_all<I, S>(&mut self, seqs: I, binding: B)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for seq in seqs {
            self.bind(seq.as_ref(), binding.clone());
        }
    }

    /// Bind every sequence from `start` to `end` inclusive. Both bounds must have the same
    /// length and differ only in their last codepoint.
    pub fn bind_range(&mut self, start: &str, end: &str, binding: B) -> Result<(), KeyMapError> {
        let seqs = expand_range(start, end)?;
        self.bind_all(seqs, binding);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{KeyMap, Match, Remaining};
    use crate::error::KeyMapError;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Forward,
        Backward,
        Cancel,
        Up,
        Insert,
    }

    fn chars(seq: &str) -> Vec<char> {
        seq.chars().collect()
    }

    #[test]
    fn bound_sequence_is_an_exact_match() {
        let mut map = KeyMap::new();
        map.bind("\x1b[A", Op::Up);
        let found = map.get_bound(&chars("\x1b[A"));
        assert_eq!(found, Match { binding: Some(&Op::Up), remaining: Remaining::Unconsumed(0) });
        assert!(found.is_exact());
    }

    #[test]
    fn prefix_and_longer_sequence_keep_their_own_bindings() {
        let mut map = KeyMap::new();
        map.bind("a", Op::Forward);
        map.bind("ab", Op::Backward);

        let short = map.get_bound(&chars("a"));
        assert_eq!(short.binding, Some(&Op::Forward));
        assert_eq!(short.remaining, Remaining::Ambiguous);

        let long = map.get_bound(&chars("ab"));
        assert!(long.is_exact());
        assert_eq!(long.binding, Some(&Op::Backward));

        // Binding the shorter one afterwards lands in the overflow slot.
        let mut map = KeyMap::new();
        map.bind("ab", Op::Backward);
        map.bind("a", Op::Forward);
        assert_eq!(map.get("a"), Some(&Op::Forward));
        assert_eq!(map.get("ab"), Some(&Op::Backward));
    }

    #[test]
    fn unmatched_tail_is_reported_as_unconsumed() {
        let mut map = KeyMap::new();
        map.bind("\x1b", Op::Cancel);
        map.bind("\x1b[A", Op::Up);

        let found = map.get_bound(&chars("\x1bx"));
        assert_eq!(found.binding, Some(&Op::Cancel));
        assert_eq!(found.remaining, Remaining::Unconsumed(1));

        let found = map.get_bound(&chars("\x1b["));
        assert_eq!(found.binding, None);
        assert_eq!(found.remaining, Remaining::Ambiguous);

        let found = map.get_bound(&chars("q"));
        assert_eq!(found.binding, None);
        assert_eq!(found.remaining, Remaining::Unconsumed(1));

        let found = map.get_bound(&chars("\x1b[Axy"));
        assert_eq!(found.binding, Some(&Op::Up));
        assert_eq!(found.remaining, Remaining::Unconsumed(2));
    }

    #[test]
    fn wide_codepoints_can_be_bound_explicitly() {
        let mut map = KeyMap::new();
        map.set_unicode(Op::Insert);
        map.bind("中", Op::Forward);

        assert_eq!(map.get("中"), Some(&Op::Forward));
        let other = map.get_bound(&chars("文"));
        assert_eq!(other.binding, None);
        assert_eq!(other.remaining, Remaining::Unconsumed(1));
        assert_eq!(map.unicode(), Some(&Op::Insert));
    }

    #[test]
    fn unbind_restores_never_bound_state() {
        let mut map = KeyMap::new();
        map.bind("ab", Op::Forward);
        assert_eq!(map.unbind("ab"), Some(Op::Forward));
        assert_eq!(map.get_bound(&chars("a")).remaining, Remaining::Unconsumed(1));
        assert!(map.bound_keys().is_empty());

        let mut map = KeyMap::new();
        map.bind("a", Op::Forward);
        map.bind("ab", Op::Backward);
        map.bind("ac", Op::Cancel);
        assert_eq!(map.unbind("ab"), Some(Op::Backward));
        assert_eq!(map.get("ac"), Some(&Op::Cancel));
        assert_eq!(map.unbind("ac"), Some(Op::Cancel));

        // The emptied node collapsed back into a terminal binding for "a".
        assert!(map.get_bound(&chars("a")).is_exact());
        assert_eq!(map.get("a"), Some(&Op::Forward));
    }

    #[test]
    fn unbind_collapses_nested_empty_nodes() {
        let mut map = KeyMap::new();
        map.bind("\x1b[1;5A", Op::Up);
        assert_eq!(map.unbind("\x1b[1;5A"), Some(Op::Up));
        let found = map.get_bound(&chars("\x1b"));
        assert_eq!(found.binding, None);
        assert_eq!(found.remaining, Remaining::Unconsumed(1));
        assert_eq!(map.unbind("\x1b[1;5A"), None);
    }

    #[test]
    fn unbinding_a_prefix_keeps_longer_sequences() {
        let mut map = KeyMap::new();
        map.bind("\x1b", Op::Cancel);
        map.bind("\x1b[A", Op::Up);
        assert_eq!(map.unbind("\x1b"), Some(Op::Cancel));
        assert_eq!(map.get("\x1b"), None);
        assert_eq!(map.get("\x1b[A"), Some(&Op::Up));
    }

    #[test]
    fn bind_if_not_bound_keeps_existing_bindings() {
        let mut map = KeyMap::new();
        map.bind("x", Op::Forward);
        assert!(!map.bind_if_not_bound("x", Op::Backward));
        assert!(map.bind_if_not_bound("y", Op::Backward));
        assert_eq!(map.get("x"), Some(&Op::Forward));
        assert_eq!(map.get("y"), Some(&Op::Backward));
    }

    #[test]
    fn bind_range_binds_every_key_or_fails_up_front() {
        let mut map = KeyMap::new();
        map.bind_range("a", "e", Op::Insert).unwrap();
        for key in ["a", "b", "c", "d", "e"] {
            assert_eq!(map.get(key), Some(&Op::Insert), "{key}");
        }
        assert_eq!(map.get("f"), None);

        assert_eq!(
            map.bind_range("z", "a", Op::Insert),
            Err(KeyMapError::Misordered { start: 'z', end: 'a' })
        );
        assert_eq!(map.get("m"), None);
    }

    #[test]
    fn bound_keys_are_sorted_shortest_first() {
        let mut map = KeyMap::new();
        map.bind("\x1b[A", Op::Up);
        map.bind("y", Op::Backward);
        map.bind("\x1b", Op::Cancel);
        map.bind("e", Op::Forward);
        let keys: Vec<(String, Op)> = map
            .bound_keys()
            .into_iter()
            .map(|(seq, op)| (seq, *op))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("\x1b".to_string(), Op::Cancel),
                ("e".to_string(), Op::Forward),
                ("y".to_string(), Op::Backward),
                ("\x1b[A".to_string(), Op::Up),
            ]
        );
    }
}
