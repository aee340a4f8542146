use std::collections::BTreeMap;

use crate::error::{PdfError, Result};

/// Old identifier -> new identifier for document B's objects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Renumbering {
    map: BTreeMap<u32, u32>,
}

impl Renumbering {
    /// Assign `[max_a + 1, max_a + count]` to B's identifiers in ascending
    /// order of their original value.
    pub fn new(max_a: u32, ids_b: impl IntoIterator<Item = u32>) -> Result<Self> {
        let mut ids: Vec<u32> = ids_b.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();

        let mut map = BTreeMap::new();
        for (i, old) in ids.into_iter().enumerate() {
            let new = u32::try_from(i)
                .ok()
                .and_then(|i| max_a.checked_add(i)?.checked_add(1))
                .ok_or_else(|| {
                    PdfError::UnsupportedStructure("object identifiers exhausted".into())
                })?;
            map.insert(old, new);
        }

        Ok(Self { map })
    }

    pub fn get(&self, old: u32) -> Option<u32> {
        self.map.get(&old).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// `(old, new)` pairs in ascending order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.map.iter().map(|(&old, &new)| (old, new))
    }

    /// Smallest identifier handed out, if any
    pub fn first_new(&self) -> Option<u32> {
        self.map.values().next().copied()
    }

    pub fn last_new(&self) -> Option<u32> {
        self.map.values().next_back().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contiguous_above_max_a() {
        let r = Renumbering::new(3, [2, 1]).unwrap();
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![(1, 4), (2, 5)]);
        assert_eq!(r.first_new(), Some(4));
        assert_eq!(r.last_new(), Some(5));
    }

    #[test]
    fn test_sparse_ids_close_gaps() {
        let r = Renumbering::new(10, [7, 3, 40]).unwrap();
        assert_eq!(r.get(3), Some(11));
        assert_eq!(r.get(7), Some(12));
        assert_eq!(r.get(40), Some(13));
        assert_eq!(r.get(4), None);
    }

    #[test]
    fn test_strictly_increasing() {
        let r = Renumbering::new(0, [9, 5, 5, 1, 30]).unwrap();
        let news: Vec<u32> = r.iter().map(|(_, new)| new).collect();
        assert_eq!(news, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_empty() {
        let r = Renumbering::new(12, []).unwrap();
        assert!(r.is_empty());
        assert_eq!(r.first_new(), None);
    }

    #[test]
    fn test_overflow() {
        let err = Renumbering::new(u32::MAX - 1, [1, 2]).unwrap_err();
        assert!(matches!(err, PdfError::UnsupportedStructure(_)));
    }
}
