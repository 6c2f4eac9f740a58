//! Regional reconciliation
//!
//! Three-way classification of the external list against the local mirror,
//! keyed by `external_id`:
//!
//! | External | Active local row | Outcome |
//! |---|---|---|
//! | present | none | **new**: insert |
//! | present | same fingerprint | **unchanged**: nothing |
//! | present | different fingerprint | **changed**: deactivate old row, insert |
//! | absent | present | **removed upstream**: deactivate |
//!
//! Inactive rows are history and take no part in the comparison.
//!
//! The function is pure. It never reads the clock and never touches storage.
//! An empty external list deactivates every active row. Guarding against a
//! source outage that looks like "everything was deleted" is the caller's
//! responsibility.

use super::history::{DataIntegrityViolation, MirrorIndex};
use super::model::{LocalRegional, ReconciliationPlan, RegionalRecord};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// Compute the plan that brings `local` into agreement with `external`
///
/// # Errors
/// Returns [`DataIntegrityViolation`] when `local` holds more than one
/// active row for an external id. No partial plan is produced.
pub fn reconcile(
    external: &[RegionalRecord],
    local: &[LocalRegional],
) -> Result<ReconciliationPlan, DataIntegrityViolation> {
    let mirror = MirrorIndex::build(local)?;
    let latest = dedupe_last_wins(external);

    let mut plan = ReconciliationPlan::default();
    let mut seen: BTreeSet<&str> = BTreeSet::new();

    for record in latest {
        seen.insert(record.external_id.as_str());

        match mirror.current(&record.external_id) {
            None => {
                debug!(external_id = %record.external_id, "Regional is new");
                plan.to_insert.push(record.clone());
            }
            Some(current) if current.fingerprint() == record.fingerprint() => {}
            Some(current) => {
                debug!(
                    external_id = %record.external_id,
                    local_id = current.id,
                    "Regional changed upstream"
                );
                plan.to_deactivate.insert(current.id);
                plan.to_insert.push(record.clone());
            }
        }
    }

    for current in mirror.active_rows() {
        if !seen.contains(current.external_id.as_str()) {
            debug!(
                external_id = %current.external_id,
                local_id = current.id,
                "Regional removed upstream"
            );
            plan.to_deactivate.insert(current.id);
        }
    }

    Ok(plan)
}

/// Collapse duplicate external ids: the last occurrence's attributes win and
/// the record keeps the position of the first occurrence
fn dedupe_last_wins(external: &[RegionalRecord]) -> Vec<&RegionalRecord> {
    let mut position: HashMap<&str, usize> = HashMap::with_capacity(external.len());
    let mut records: Vec<&RegionalRecord> = Vec::with_capacity(external.len());

    for record in external {
        match position.get(record.external_id.as_str()) {
            Some(&idx) => {
                warn!(
                    external_id = %record.external_id,
                    "Duplicate external_id in source list; last occurrence wins"
                );
                records[idx] = record;
            }
            None => {
                position.insert(record.external_id.as_str(), records.len());
                records.push(record);
            }
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn local(id: i64, external_id: &str, name: &str, active: bool) -> LocalRegional {
        let now = Utc::now();
        LocalRegional {
            id,
            external_id: external_id.to_string(),
            name: name.to_string(),
            attributes: Default::default(),
            active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a plan the way the store does: flip, then append
    fn apply(mirror: &mut Vec<LocalRegional>, plan: &ReconciliationPlan) {
        for row in mirror.iter_mut() {
            if plan.to_deactivate.contains(&row.id) {
                assert!(row.active, "plan deactivates an inactive row {}", row.id);
                row.active = false;
            }
        }
        let mut next_id = mirror.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        for record in &plan.to_insert {
            let now = Utc::now();
            mirror.push(LocalRegional {
                id: next_id,
                external_id: record.external_id.clone(),
                name: record.name.clone(),
                attributes: record.attributes.clone(),
                active: true,
                created_at: now,
                updated_at: now,
            });
            next_id += 1;
        }
    }

    fn assert_one_active_per_external_id(mirror: &[LocalRegional]) {
        let mut active = BTreeSet::new();
        for row in mirror.iter().filter(|r| r.active) {
            assert!(
                active.insert(row.external_id.clone()),
                "two active rows for {}",
                row.external_id
            );
        }
    }

    #[test]
    fn test_new_record_inserted() {
        let external = vec![RegionalRecord::new("R1", "North")];

        let plan = reconcile(&external, &[]).unwrap();

        assert_eq!(plan.to_insert, vec![RegionalRecord::new("R1", "North")]);
        assert!(plan.to_deactivate.is_empty());
    }

    #[test]
    fn test_unchanged_record_ignored() {
        let external = vec![RegionalRecord::new("R1", "North")];
        let mirror = vec![local(1, "R1", "North", true)];

        let plan = reconcile(&external, &mirror).unwrap();

        assert!(plan.is_empty());
    }

    #[test]
    fn test_changed_name_replaces_row() {
        let external = vec![RegionalRecord::new("R1", "North Region")];
        let mirror = vec![local(1, "R1", "North", true)];

        let plan = reconcile(&external, &mirror).unwrap();

        assert_eq!(plan.to_insert, vec![RegionalRecord::new("R1", "North Region")]);
        assert_eq!(plan.to_deactivate, BTreeSet::from([1]));
    }

    #[test]
    fn test_removed_upstream_deactivated() {
        let mirror = vec![local(1, "R1", "North", true)];

        let plan = reconcile(&[], &mirror).unwrap();

        assert!(plan.to_insert.is_empty());
        assert_eq!(plan.to_deactivate, BTreeSet::from([1]));
    }

    #[test]
    fn test_attribute_change_counts_as_change() {
        let external = vec![RegionalRecord::new("R1", "North").with_attribute("code", "N-02")];
        let mut row = local(7, "R1", "North", true);
        row.attributes.insert("code".to_string(), "N-01".to_string());

        let plan = reconcile(&external, &[row]).unwrap();

        assert_eq!(plan.to_deactivate, BTreeSet::from([7]));
        assert_eq!(plan.to_insert.len(), 1);
        assert_eq!(plan.to_insert[0].attributes["code"], "N-02");
    }

    #[test]
    fn test_added_attribute_counts_as_change() {
        let external = vec![RegionalRecord::new("R1", "North").with_attribute("code", "N")];
        let plan = reconcile(&external, &[local(1, "R1", "North", true)]).unwrap();

        assert_eq!(plan.to_deactivate, BTreeSet::from([1]));
    }

    #[test]
    fn test_inactive_history_ignored() {
        // R1 was removed earlier and now comes back with its old name
        let external = vec![RegionalRecord::new("R1", "North")];
        let mirror = vec![local(1, "R1", "North", false)];

        let plan = reconcile(&external, &mirror).unwrap();

        assert_eq!(plan.to_insert, vec![RegionalRecord::new("R1", "North")]);
        assert!(plan.to_deactivate.is_empty());
    }

    #[test]
    fn test_duplicate_external_id_last_wins() {
        let external = vec![
            RegionalRecord::new("R1", "North"),
            RegionalRecord::new("R2", "South"),
            RegionalRecord::new("R1", "North Region"),
        ];

        let plan = reconcile(&external, &[]).unwrap();

        assert_eq!(
            plan.to_insert,
            vec![
                RegionalRecord::new("R1", "North Region"),
                RegionalRecord::new("R2", "South"),
            ]
        );
    }

    #[test]
    fn test_duplicate_matching_active_row_is_unchanged() {
        let external = vec![
            RegionalRecord::new("R1", "Stale"),
            RegionalRecord::new("R1", "North"),
        ];
        let plan = reconcile(&external, &[local(1, "R1", "North", true)]).unwrap();

        assert!(plan.is_empty());
    }

    #[test]
    fn test_integrity_violation_aborts() {
        let external = vec![RegionalRecord::new("R2", "South")];
        let mirror = vec![
            local(1, "R1", "North", true),
            local(2, "R1", "North Region", true),
        ];

        let err = reconcile(&external, &mirror).unwrap_err();

        assert_eq!(err.external_id, "R1");
        assert_eq!(err.active_ids, vec![1, 2]);
    }

    #[test]
    fn test_empty_external_deactivates_all_active() {
        let mirror = vec![
            local(1, "R1", "North", true),
            local(2, "R2", "South", false),
            local(3, "R2", "South Region", true),
        ];

        let plan = reconcile(&[], &mirror).unwrap();

        assert!(plan.to_insert.is_empty());
        assert_eq!(plan.to_deactivate, BTreeSet::from([1, 3]));
    }

    #[test]
    fn test_second_run_is_empty() {
        let mut mirror = vec![
            local(1, "R1", "North", true),
            local(2, "R2", "South", true),
            local(3, "R3", "East", false),
        ];
        let external = vec![
            RegionalRecord::new("R1", "North Region"),
            RegionalRecord::new("R3", "East"),
            RegionalRecord::new("R4", "West"),
        ];

        let first = reconcile(&external, &mirror).unwrap();
        assert!(!first.is_empty());
        apply(&mut mirror, &first);

        let second = reconcile(&external, &mirror).unwrap();
        assert!(second.is_empty(), "second plan not empty: {:?}", second);
    }

    #[test]
    fn test_invariants_hold_across_successive_feeds() {
        let feeds: Vec<Vec<RegionalRecord>> = vec![
            vec![RegionalRecord::new("R1", "North"), RegionalRecord::new("R2", "South")],
            vec![RegionalRecord::new("R1", "North Region"), RegionalRecord::new("R3", "East")],
            vec![],
            vec![
                RegionalRecord::new("R2", "South"),
                RegionalRecord::new("R2", "South Coast"),
                RegionalRecord::new("R1", "North Region").with_attribute("tier", "1"),
            ],
            vec![RegionalRecord::new("R1", "North Region").with_attribute("tier", "1")],
        ];

        let mut mirror: Vec<LocalRegional> = Vec::new();
        for feed in &feeds {
            let before = mirror.len();

            let plan = reconcile(feed, &mirror).unwrap();
            apply(&mut mirror, &plan);

            assert!(mirror.len() >= before, "rows were removed");
            assert_one_active_per_external_id(&mirror);

            // Mirror now reflects the feed exactly
            let index = MirrorIndex::build(&mirror).unwrap();
            let live: Vec<(&str, &str)> = index
                .active_rows()
                .map(|r| (r.external_id.as_str(), r.name.as_str()))
                .collect();
            let mut expected: Vec<(&str, &str)> = dedupe_last_wins(feed)
                .into_iter()
                .map(|r| (r.external_id.as_str(), r.name.as_str()))
                .collect();
            expected.sort();
            assert_eq!(live, expected);
        }
    }
}
