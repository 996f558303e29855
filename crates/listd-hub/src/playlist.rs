//! Playlist with optimistic concurrency
//!
//! Every mutation names the index *and* the hash the caller believes lives
//! there, so a client acting on a stale view is refused instead of silently
//! removing or selecting the wrong item.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Playlist operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaylistError {
    #[error("index {index} out of bounds (playlist has {len} items)")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("hash mismatch at index {index}: expected {expected}, found {actual}")]
    HashMismatch {
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("no selection to remove")]
    NoSelection,
}

/// What an item's data refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// A path the playout service can load
    File,
    /// Inline text (e.g. a presenter note)
    Text,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::File => "file",
            ItemKind::Text => "text",
        }
    }
}

impl FromStr for ItemKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(ItemKind::File),
            "text" => Ok(ItemKind::Text),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistItem {
    pub data: String,
    pub hash: String,
    pub kind: ItemKind,
}

impl PlaylistItem {
    pub fn new(kind: ItemKind, hash: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            hash: hash.into(),
            kind,
        }
    }

    pub fn file(hash: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(ItemKind::File, hash, path)
    }

    pub fn text(hash: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(ItemKind::Text, hash, text)
    }

    pub fn is_file(&self) -> bool {
        self.kind == ItemKind::File
    }
}

/// Ordered items plus an optional selection cursor
///
/// The selection is always `None` or a valid index into `items`.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    items: Vec<PlaylistItem>,
    selection: Option<usize>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[PlaylistItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PlaylistItem> {
        self.items.get(index)
    }

    pub fn selection(&self) -> Option<usize> {
        self.selection
    }

    pub fn has_selection(&self) -> bool {
        self.selection.is_some()
    }

    /// The selected index together with its item
    pub fn selected(&self) -> Option<(usize, &PlaylistItem)> {
        let index = self.selection?;
        self.items.get(index).map(|item| (index, item))
    }

    /// Insert `item` at `index`; `index == len` appends
    ///
    /// A selection at or after `index` moves up by one so that it keeps
    /// pointing at the same item.
    pub fn enqueue(&mut self, index: usize, item: PlaylistItem) -> Result<usize, PlaylistError> {
        if index > self.items.len() {
            return Err(PlaylistError::IndexOutOfBounds {
                index,
                len: self.items.len(),
            });
        }

        self.items.insert(index, item);
        if let Some(sel) = self.selection {
            if sel >= index {
                self.selection = Some(sel + 1);
            }
        }
        Ok(index)
    }

    /// Remove the item at `index` if it carries `hash`
    pub fn dequeue(&mut self, index: usize, hash: &str) -> Result<(usize, String), PlaylistError> {
        self.check(index, hash)?;

        let removed = self.items.remove(index);
        self.selection = match self.selection {
            Some(sel) if sel == index => None,
            Some(sel) if sel > index => Some(sel - 1),
            other => other,
        };
        Ok((index, removed.hash))
    }

    /// Select the item at `index` if it carries `hash`
    pub fn select(&mut self, index: usize, hash: &str) -> Result<(usize, String), PlaylistError> {
        self.check(index, hash)?;
        self.selection = Some(index);
        Ok((index, hash.to_string()))
    }

    /// Drop the selection
    pub fn clear_selection(&mut self) -> Result<(), PlaylistError> {
        self.selection.take().map(|_| ()).ok_or(PlaylistError::NoSelection)
    }

    /// Move the selection to the next item
    ///
    /// Returns whether the selection changed: past the last item the
    /// selection is cleared, and with no selection nothing happens.
    pub fn advance(&mut self) -> bool {
        match self.selection {
            None => false,
            Some(sel) if sel + 1 < self.items.len() => {
                self.selection = Some(sel + 1);
                true
            }
            Some(_) => {
                self.selection = None;
                true
            }
        }
    }

    fn check(&self, index: usize, hash: &str) -> Result<(), PlaylistError> {
        let item = self.items.get(index).ok_or(PlaylistError::IndexOutOfBounds {
            index,
            len: self.items.len(),
        })?;
        if item.hash != hash {
            return Err(PlaylistError::HashMismatch {
                index,
                expected: hash.to_string(),
                actual: item.hash.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn playlist(hashes: &[&str]) -> Playlist {
        let mut pl = Playlist::new();
        for (i, h) in hashes.iter().enumerate() {
            pl.enqueue(i, PlaylistItem::file(*h, format!("/music/{}.mp3", h)))
                .unwrap();
        }
        pl
    }

    fn assert_selection_valid(pl: &Playlist) {
        if let Some(sel) = pl.selection() {
            assert!(sel < pl.len(), "selection {} out of range {}", sel, pl.len());
        }
    }

    #[test]
    fn test_enqueue_appends_and_inserts() {
        let mut pl = playlist(&["a", "c"]);
        assert_eq!(pl.enqueue(1, PlaylistItem::text("b", "hello")), Ok(1));
        assert_eq!(pl.enqueue(3, PlaylistItem::file("d", "/d.mp3")), Ok(3));

        let hashes: Vec<_> = pl.items().iter().map(|i| i.hash.as_str()).collect();
        assert_eq!(hashes, vec!["a", "b", "c", "d"]);
        assert!(!pl.get(1).unwrap().is_file());
    }

    #[test]
    fn test_enqueue_out_of_bounds() {
        let mut pl = playlist(&["a"]);
        assert_eq!(
            pl.enqueue(2, PlaylistItem::text("x", "x")),
            Err(PlaylistError::IndexOutOfBounds { index: 2, len: 1 })
        );
        assert_eq!(pl.len(), 1);
    }

    #[test]
    fn test_enqueue_shifts_selection() {
        let mut pl = playlist(&["a", "b", "c"]);
        pl.select(1, "b").unwrap();

        // At the selection: shifts
        pl.enqueue(1, PlaylistItem::text("x", "x")).unwrap();
        assert_eq!(pl.selection(), Some(2));

        // Before the selection: shifts
        pl.enqueue(0, PlaylistItem::text("y", "y")).unwrap();
        assert_eq!(pl.selection(), Some(3));

        // After the selection: unchanged
        pl.enqueue(4, PlaylistItem::text("z", "z")).unwrap();
        assert_eq!(pl.selection(), Some(3));
        assert_eq!(pl.selected().unwrap().1.hash, "b");
    }

    #[test]
    fn test_dequeue_shifts_selection() {
        let mut pl = playlist(&["a", "b", "c", "d"]);
        pl.select(2, "c").unwrap();

        // After the selection: unchanged
        assert_eq!(pl.dequeue(3, "d"), Ok((3, "d".to_string())));
        assert_eq!(pl.selection(), Some(2));

        // Before the selection: decremented
        assert_eq!(pl.dequeue(0, "a"), Ok((0, "a".to_string())));
        assert_eq!(pl.selection(), Some(1));
        assert_eq!(pl.selected().unwrap().1.hash, "c");

        // The selection itself: cleared
        assert_eq!(pl.dequeue(1, "c"), Ok((1, "c".to_string())));
        assert_eq!(pl.selection(), None);
    }

    #[test]
    fn test_guard_rejects_stale_views() {
        let mut pl = playlist(&["a", "b"]);
        pl.select(0, "a").unwrap();

        assert!(matches!(
            pl.dequeue(1, "a"),
            Err(PlaylistError::HashMismatch { index: 1, .. })
        ));
        assert!(matches!(
            pl.select(1, "wrong-hash"),
            Err(PlaylistError::HashMismatch { .. })
        ));
        assert_eq!(
            pl.dequeue(5, "a"),
            Err(PlaylistError::IndexOutOfBounds { index: 5, len: 2 })
        );
        assert_eq!(
            pl.select(2, "b"),
            Err(PlaylistError::IndexOutOfBounds { index: 2, len: 2 })
        );

        // Nothing moved
        assert_eq!(pl.len(), 2);
        assert_eq!(pl.selection(), Some(0));
    }

    #[test]
    fn test_clear_selection() {
        let mut pl = playlist(&["a"]);
        assert_eq!(pl.clear_selection(), Err(PlaylistError::NoSelection));
        pl.select(0, "a").unwrap();
        assert_eq!(pl.clear_selection(), Ok(()));
        assert!(!pl.has_selection());
    }

    #[test]
    fn test_advance() {
        let mut pl = playlist(&["a", "b"]);

        // No selection: no-op
        assert!(!pl.advance());
        assert_eq!(pl.selection(), None);

        pl.select(0, "a").unwrap();
        assert!(pl.advance());
        assert_eq!(pl.selection(), Some(1));

        // Past the end: cleared
        assert!(pl.advance());
        assert_eq!(pl.selection(), None);
        assert!(!pl.advance());
    }

    #[test]
    fn test_advance_on_empty_playlist() {
        let mut pl = Playlist::new();
        assert!(!pl.advance());
        assert!(pl.is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Enqueue(usize),
        Dequeue(usize),
        Select(usize),
        Clear,
        Advance,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0..32usize).prop_map(Op::Enqueue),
            2 => (0..32usize).prop_map(Op::Dequeue),
            2 => (0..32usize).prop_map(Op::Select),
            1 => Just(Op::Clear),
            2 => Just(Op::Advance),
        ]
    }

    proptest! {
        #[test]
        fn test_selection_stays_valid_under_mixed_operations(
            ops in prop::collection::vec(op(), 1..200)
        ) {
            let mut pl = Playlist::new();
            for (step, op) in ops.into_iter().enumerate() {
                let len = pl.len();
                match op {
                    Op::Enqueue(i) => {
                        let item = PlaylistItem::text(format!("h{}", step), "x");
                        prop_assert_eq!(pl.enqueue(i % (len + 1), item), Ok(i % (len + 1)));
                    }
                    Op::Dequeue(i) if len > 0 => {
                        let hash = pl.get(i % len).unwrap().hash.clone();
                        prop_assert!(pl.dequeue(i % len, &hash).is_ok());
                    }
                    Op::Select(i) if len > 0 => {
                        let hash = pl.get(i % len).unwrap().hash.clone();
                        prop_assert!(pl.select(i % len, &hash).is_ok());
                    }
                    Op::Clear => {
                        let _ = pl.clear_selection();
                    }
                    Op::Advance => {
                        pl.advance();
                    }
                    _ => {}
                }
                assert_selection_valid(&pl);
            }
        }
    }
}
