//! Keyed map-reduce shared by every aggregation stage.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Groups `items` by `key`, seeding each group with `init` and folding the
/// remaining members in with `combine`. Groups come back ordered by key.
pub(crate) fn group_reduce<'a, T, K, A>(
    items: impl IntoIterator<Item = &'a T>,
    key: impl Fn(&'a T) -> K,
    init: impl Fn(&'a T) -> A,
    combine: impl Fn(&mut A, &'a T),
) -> BTreeMap<K, A>
where
    T: 'a,
    K: Ord,
{
    let mut groups: BTreeMap<K, A> = BTreeMap::new();
    for item in items {
        match groups.entry(key(item)) {
            Entry::Occupied(mut slot) => combine(slot.get_mut(), item),
            Entry::Vacant(slot) => {
                slot.insert(init(item));
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_are_ordered_and_folded() {
        let items = [("b", 2), ("a", 1), ("b", 3), ("a", 4)];
        let groups = group_reduce(
            items.iter(),
            |(k, _)| *k,
            |(_, v)| *v,
            |acc, (_, v)| *acc += *v,
        );

        let collected: Vec<_> = groups.into_iter().collect();
        assert_eq!(collected, vec![("a", 5), ("b", 5)]);
    }

    #[test]
    fn empty_input_yields_no_groups() {
        let items: [(u8, u8); 0] = [];
        let groups = group_reduce(items.iter(), |(k, _)| *k, |(_, v)| *v, |_, _| {});
        assert!(groups.is_empty());
    }
}
