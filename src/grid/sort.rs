//! Single-column sort state.
//!
//! Sorting is purely client-side and applies only to the rows currently
//! loaded, even when pagination is server-driven. That mirrors the
//! backend's web console and is deliberate: a page-local sort is cheap and
//! predictable, a full-dataset sort would need server support.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// At most one column is sorted at a time. Toggling the active column
/// cycles ascending → descending → unsorted; toggling a different column
/// restarts at ascending.
#[derive(Debug, Clone, Default)]
pub struct SortState {
    active: Option<(&'static str, SortDirection)>,
}

impl SortState {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn active(&self) -> Option<(&'static str, SortDirection)> {
        self.active
    }

    pub fn direction_of(&self, column: &str) -> Option<SortDirection> {
        match self.active {
            Some((id, direction)) if id == column => Some(direction),
            _ => None,
        }
    }

    pub fn toggle(&mut self, column: &'static str) {
        self.active = match self.active {
            Some((id, SortDirection::Ascending)) if id == column => {
                Some((column, SortDirection::Descending))
            }
            Some((id, SortDirection::Descending)) if id == column => None,
            _ => Some((column, SortDirection::Ascending)),
        };
    }

    pub fn clear(&mut self) {
        self.active = None;
    }
}

/// Display order for `rows` under the given key. The sort is stable, so
/// equal keys keep their original relative order; rows without a key sort
/// last. Comparison is case-insensitive.
pub fn sort_indices<T>(
    rows: &[T],
    key: impl Fn(&T) -> Option<String>,
    direction: SortDirection,
) -> Vec<usize> {
    let keys: Vec<Option<String>> = rows
        .iter()
        .map(|row| key(row).map(|k| k.to_lowercase()))
        .collect();
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| compare_keys(&keys[a], &keys[b], direction));
    order
}

fn compare_keys(
    a: &Option<String>,
    b: &Option<String>,
    direction: SortDirection,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match direction {
            SortDirection::Ascending => a.cmp(b),
            SortDirection::Descending => b.cmp(a),
        },
        // Missing keys always sink to the bottom.
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_cycles_through_directions() {
        let mut sort = SortState::new();
        sort.toggle("name");
        assert_eq!(sort.direction_of("name"), Some(SortDirection::Ascending));
        sort.toggle("name");
        assert_eq!(sort.direction_of("name"), Some(SortDirection::Descending));
        sort.toggle("name");
        assert_eq!(sort.active(), None);
    }

    #[test]
    fn toggling_another_column_restarts_ascending() {
        let mut sort = SortState::new();
        sort.toggle("name");
        sort.toggle("name");
        sort.toggle("group");
        assert_eq!(sort.direction_of("group"), Some(SortDirection::Ascending));
        assert_eq!(sort.direction_of("name"), None);
    }

    #[test]
    fn full_cycle_restores_original_order() {
        let rows = ["b", "a", "c"];
        let key = |r: &&str| Some((*r).to_string());

        let asc = sort_indices(&rows, key, SortDirection::Ascending);
        assert_eq!(asc, vec![1, 0, 2]);
        let desc = sort_indices(&rows, key, SortDirection::Descending);
        assert_eq!(desc, vec![2, 0, 1]);

        // Third toggle clears the sort; callers fall back to identity
        // order, i.e. the rows exactly as fetched.
        let mut sort = SortState::new();
        sort.toggle("col");
        sort.toggle("col");
        sort.toggle("col");
        assert!(sort.active().is_none());
    }

    #[test]
    fn equal_keys_keep_fetch_order() {
        struct Row {
            group: &'static str,
            id: u32,
        }
        let rows = [
            Row { group: "a", id: 1 },
            Row { group: "b", id: 2 },
            Row { group: "a", id: 3 },
            Row { group: "a", id: 4 },
        ];
        let order = sort_indices(
            &rows,
            |r| Some(r.group.to_string()),
            SortDirection::Ascending,
        );
        let ids: Vec<u32> = order.iter().map(|&i| rows[i].id).collect();
        assert_eq!(ids, vec![1, 3, 4, 2]);
    }

    #[test]
    fn missing_keys_sort_last_in_both_directions() {
        let rows = [Some("b"), None, Some("a")];
        let key = |r: &Option<&str>| r.map(str::to_string);

        let asc = sort_indices(&rows, key, SortDirection::Ascending);
        assert_eq!(asc, vec![2, 0, 1]);
        let desc = sort_indices(&rows, key, SortDirection::Descending);
        assert_eq!(desc, vec![0, 2, 1]);
    }

    #[test]
    fn comparison_is_case_insensitive() {
        let rows = ["Banana", "apple", "Cherry"];
        let order = sort_indices(
            &rows,
            |r| Some((*r).to_string()),
            SortDirection::Ascending,
        );
        assert_eq!(order, vec![1, 0, 2]);
    }
}
