use indexmap::IndexMap;
use std::hash::Hash;

/// Group the items of an iterator under the key `f` derives from each. Groups are ordered by the
/// first item seen for each key; items keep their iteration order within a group.
pub trait GroupInOrder: Iterator + Sized {
    fn group_in_order<K, F>(self, f: F) -> IndexMap<K, Vec<Self::Item>>
    where
        K: Hash + Eq,
        F: Fn(&Self::Item) -> K,
    {
        let mut groups: IndexMap<K, Vec<Self::Item>> = IndexMap::new();
        for item in self {
            groups.entry(f(&item)).or_default().push(item);
        }
        groups
    }
}

impl<I: Iterator> GroupInOrder for I {}
