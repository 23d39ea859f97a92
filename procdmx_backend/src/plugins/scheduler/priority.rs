use std::collections::BTreeMap;

/// Orders items by their priority path.
///
/// Items are grouped by the value at each depth (a missing value counts as 0) and groups are
/// visited in ascending order. A group is only re-sorted at the next depth when its first member
/// has a value there. Ties keep their original order.
pub fn hierarchical_sort<T, F>(items: Vec<T>, priority: F) -> Vec<T>
where
	F: Fn(&T) -> &[i64],
{
	return sort_at_depth(items, 0, &priority);
}

fn sort_at_depth<T, F>(items: Vec<T>, depth: usize, priority: &F) -> Vec<T>
where
	F: Fn(&T) -> &[i64],
{
	let mut groups: BTreeMap<i64, Vec<T>> = BTreeMap::new();
	for item in items {
		let key = priority(&item).get(depth).copied().unwrap_or(0);
		groups.entry(key).or_default().push(item);
	}

	let mut sorted = Vec::new();
	for (_, group) in groups {
		let goes_deeper = group.first().map_or(false, |first| priority(first).len() > depth + 1);
		if goes_deeper && group.len() > 1 {
			sorted.extend(sort_at_depth(group, depth + 1, priority));
		} else {
			sorted.extend(group);
		}
	}
	return sorted;
}

/// The priority a new top-level task should use to run after everything that exists
pub fn next_top_level<'a>(priorities: impl Iterator<Item = &'a [i64]>) -> i64 {
	return priorities
		.map(|priority| priority.first().copied().unwrap_or(0))
		.max()
		.map_or(0, |highest| highest + 1);
}
