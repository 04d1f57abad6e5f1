//! Pure reconciliation of an observed file set against the catalog.

use std::collections::{HashMap, HashSet};

use crate::error::Error;
use crate::model::{LibraryTrack, ObservedFile};

/// What it takes to make the catalog match the observed files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    /// Files with no catalog entry
    pub to_insert: Vec<ObservedFile>,
    /// Entries whose file changed since the last scan
    pub to_update: Vec<(LibraryTrack, ObservedFile)>,
    /// Entries whose file is gone, ascending
    pub to_delete: Vec<i64>,
    /// Entries whose file is untouched
    pub unchanged: Vec<i64>,
    /// Observed URIs seen more than once (later copies were dropped)
    pub duplicates: Vec<String>,
    /// New files whose tags could not be read; not inserted this time
    pub unreadable: Vec<String>,
}

impl ReconcilePlan {
    /// Nothing to write.
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// Partition `observed` and `persisted` by `external_uri`.
///
/// - observed, not persisted: insert
/// - both, `last_modified` differs: update
/// - both, same `last_modified`: unchanged
/// - persisted, not observed: delete
///
/// Duplicate observed URIs keep their first occurrence. A file with
/// unreadable tags keeps its existing entry as is and is never inserted.
pub fn reconcile(observed: Vec<ObservedFile>, persisted: Vec<LibraryTrack>) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();

    let mut by_uri: HashMap<String, LibraryTrack> = HashMap::with_capacity(persisted.len());
    for track in persisted {
        if let Some(previous) = by_uri.insert(track.external_uri.clone(), track) {
            // The schema forbids this; drop the extra row if it ever happens
            plan.to_delete.push(previous.id);
        }
    }

    let mut seen: HashSet<String> = HashSet::with_capacity(observed.len());
    for file in observed {
        if !seen.insert(file.external_uri.clone()) {
            let err = Error::data_integrity(format!("duplicate observed uri {}", file.external_uri));
            tracing::warn!(target: "scan", error = %err, "Skipping duplicate");
            plan.duplicates.push(file.external_uri);
            continue;
        }

        match by_uri.remove(&file.external_uri) {
            Some(track) if file.unreadable => plan.unchanged.push(track.id),
            None if file.unreadable => plan.unreadable.push(file.external_uri),
            None => plan.to_insert.push(file),
            Some(track) if track.last_modified != file.last_modified => {
                plan.to_update.push((track, file));
            }
            Some(track) => plan.unchanged.push(track.id),
        }
    }

    plan.to_delete.extend(by_uri.into_values().map(|t| t.id));
    plan.to_delete.sort_unstable();
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{library_track, observed_file};

    #[test]
    fn test_new_file_is_inserted() {
        let plan = reconcile(
            vec![observed_file("a", "Queen - Bohemian Rhapsody (Official Video)", 1)],
            vec![],
        );
        assert_eq!(plan.to_insert.len(), 1);
        assert!(plan.to_update.is_empty());
        assert!(plan.to_delete.is_empty());
    }

    #[test]
    fn test_modified_file_is_updated() {
        let plan = reconcile(
            vec![observed_file("a", "Song", 200)],
            vec![library_track(1, "a", 100)],
        );
        assert_eq!(plan.to_update.len(), 1);
        assert_eq!(plan.to_update[0].0.id, 1);
        assert_eq!(plan.to_update[0].1.last_modified, 200);
        assert!(plan.to_insert.is_empty());
        assert!(plan.to_delete.is_empty());
    }

    #[test]
    fn test_missing_file_is_deleted() {
        let plan = reconcile(
            vec![observed_file("a", "Song", 100)],
            vec![library_track(1, "a", 100), library_track(2, "b", 100)],
        );
        assert_eq!(plan.to_delete, vec![2]);
        assert_eq!(plan.unchanged, vec![1]);
    }

    #[test]
    fn test_unchanged_file_untouched() {
        let plan = reconcile(
            vec![observed_file("a", "Song", 100)],
            vec![library_track(1, "a", 100)],
        );
        assert!(plan.is_empty());
        assert_eq!(plan.unchanged, vec![1]);
    }

    #[test]
    fn test_duplicate_observed_first_wins() {
        let plan = reconcile(
            vec![observed_file("a", "First", 1), observed_file("a", "Second", 2)],
            vec![],
        );
        assert_eq!(plan.to_insert.len(), 1);
        assert_eq!(plan.to_insert[0].raw_title, "First");
        assert_eq!(plan.duplicates, vec!["a".to_string()]);
    }

    #[test]
    fn test_unreadable_file_keeps_its_entry() {
        let unreadable = |uri: &str, modified| ObservedFile {
            unreadable: true,
            ..observed_file(uri, "", modified)
        };
        let plan = reconcile(
            vec![unreadable("a", 200), unreadable("new", 1)],
            vec![library_track(1, "a", 100)],
        );
        assert!(plan.is_empty());
        assert_eq!(plan.unchanged, vec![1]);
        assert_eq!(plan.unreadable, vec!["new".to_string()]);
    }

    #[test]
    fn test_empty_inputs() {
        let plan = reconcile(vec![], vec![]);
        assert!(plan.is_empty());
        assert!(plan.unchanged.is_empty());
    }
}

/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use crate::test_utils::{library_track, observed_file};
    use proptest::prelude::*;

    /// URIs drawn from a small pool so observed and persisted overlap
    fn observed_set() -> impl Strategy<Value = Vec<ObservedFile>> {
        prop::collection::vec((0u8..20, 0i64..3), 0..25).prop_map(|items| {
            items
                .into_iter()
                .map(|(uri, modified)| observed_file(&format!("uri-{uri}"), "Song", modified))
                .collect()
        })
    }

    fn persisted_set() -> impl Strategy<Value = Vec<LibraryTrack>> {
        prop::collection::btree_map(0u8..20, 0i64..3, 0..20).prop_map(|items| {
            items
                .into_iter()
                .enumerate()
                .map(|(i, (uri, modified))| {
                    library_track(i as i64 + 1, &format!("uri-{uri}"), modified)
                })
                .collect()
        })
    }

    /// Apply a plan to the persisted list the way the catalog would.
    fn apply(plan: &ReconcilePlan, persisted: &[LibraryTrack]) -> Vec<LibraryTrack> {
        let mut next: Vec<LibraryTrack> = persisted
            .iter()
            .filter(|t| !plan.to_delete.contains(&t.id))
            .cloned()
            .collect();
        for (track, file) in &plan.to_update {
            if let Some(t) = next.iter_mut().find(|t| t.id == track.id) {
                t.last_modified = file.last_modified;
            }
        }
        let mut next_id = 1000;
        for file in &plan.to_insert {
            next.push(library_track(next_id, &file.external_uri, file.last_modified));
            next_id += 1;
        }
        next
    }

    proptest! {
        /// Every URI lands in exactly one bucket
        #[test]
        fn plan_partitions_by_uri(observed in observed_set(), persisted in persisted_set()) {
            let observed_uris: HashSet<String> =
                observed.iter().map(|f| f.external_uri.clone()).collect();
            let persisted_by_id: HashMap<i64, String> =
                persisted.iter().map(|t| (t.id, t.external_uri.clone())).collect();

            let plan = reconcile(observed, persisted.clone());

            let inserted: HashSet<String> =
                plan.to_insert.iter().map(|f| f.external_uri.clone()).collect();
            let updated: HashSet<String> =
                plan.to_update.iter().map(|(t, _)| t.external_uri.clone()).collect();
            let unchanged: HashSet<String> =
                plan.unchanged.iter().map(|id| persisted_by_id[id].clone()).collect();
            let deleted: HashSet<String> =
                plan.to_delete.iter().map(|id| persisted_by_id[id].clone()).collect();

            prop_assert_eq!(inserted.len(), plan.to_insert.len());
            prop_assert!(inserted.is_disjoint(&updated));
            prop_assert!(inserted.is_disjoint(&unchanged));
            prop_assert!(updated.is_disjoint(&unchanged));
            prop_assert!(deleted.is_disjoint(&observed_uris));

            let kept: HashSet<String> = inserted
                .union(&updated)
                .cloned()
                .collect::<HashSet<_>>()
                .union(&unchanged)
                .cloned()
                .collect();
            prop_assert_eq!(&kept, &observed_uris);
            prop_assert_eq!(
                deleted.len() + updated.len() + unchanged.len(),
                persisted.len()
            );
        }

        /// Reconciling again after applying the plan finds nothing to do
        #[test]
        fn reapplying_is_empty(observed in observed_set(), persisted in persisted_set()) {
            let plan = reconcile(observed.clone(), persisted.clone());
            let next = apply(&plan, &persisted);
            let again = reconcile(observed, next);
            prop_assert!(again.is_empty(), "second plan: {:?}", again);
        }
    }
}
