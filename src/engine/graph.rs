//! Template Graph Validator
//!
//! Templates form a directed graph through their "contains" edges. This
//! module keeps that graph acyclic: every template-type item insert or
//! retarget must pass [`ensure_no_cycle`] first, so no cycle is ever
//! persisted, even transiently.

use std::collections::HashSet;

use rusqlite::Connection;

use crate::models::TemplateItem;

use super::error::{EngineError, EngineResult};

/// Check whether linking `child_id` into `parent_id` would create a cycle.
///
/// Self-reference is always a cycle. Otherwise walk the "contains" edges
/// from the candidate child with a visited set; a cycle exists iff the
/// parent is reachable (the child already contains the parent, directly or
/// indirectly).
pub fn would_create_cycle(
    conn: &Connection,
    parent_id: i64,
    child_id: i64,
) -> EngineResult<bool> {
    if parent_id == child_id {
        return Ok(true);
    }

    let mut visited = HashSet::new();
    let mut to_check = vec![child_id];

    while let Some(current) = to_check.pop() {
        if current == parent_id {
            return Ok(true);
        }

        if !visited.insert(current) {
            continue;
        }

        to_check.extend(TemplateItem::child_template_ids(conn, current)?);
    }

    Ok(false)
}

/// Validate a candidate link, raising CircularReference when it would close
/// a cycle
pub fn ensure_no_cycle(conn: &Connection, parent_id: i64, child_id: i64) -> EngineResult<()> {
    if would_create_cycle(conn, parent_id, child_id)? {
        return Err(EngineError::CircularReference {
            parent: parent_id,
            child: child_id,
        });
    }
    Ok(())
}

/// Collect every template that transitively contains `template_id`.
///
/// Used by the cascade refresh after a structural edit: a change three
/// levels deep must refresh all enclosing templates up to the roots.
pub fn ancestor_ids(conn: &Connection, template_id: i64) -> EngineResult<Vec<i64>> {
    let mut ancestors = Vec::new();
    let mut visited = HashSet::new();
    let mut to_check = TemplateItem::parent_template_ids(conn, template_id)?;

    while let Some(current) = to_check.pop() {
        if !visited.insert(current) {
            continue;
        }
        ancestors.push(current);
        to_check.extend(TemplateItem::parent_template_ids(conn, current)?);
    }

    Ok(ancestors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testutil::{link_template, seed_template, test_conn};

    #[test]
    fn test_self_reference_is_a_cycle() {
        let conn = test_conn();
        let t = seed_template(&conn, "Breakfast");
        assert!(would_create_cycle(&conn, t, t).unwrap());
    }

    #[test]
    fn test_direct_cycle_detected() {
        let conn = test_conn();
        let a = seed_template(&conn, "A");
        let b = seed_template(&conn, "B");
        link_template(&conn, a, b, 1.0);

        assert!(would_create_cycle(&conn, b, a).unwrap());
        assert!(!would_create_cycle(&conn, a, b).unwrap());
    }

    #[test]
    fn test_indirect_cycle_detected() {
        let conn = test_conn();
        let a = seed_template(&conn, "A");
        let b = seed_template(&conn, "B");
        let c = seed_template(&conn, "C");
        link_template(&conn, a, b, 1.0);
        link_template(&conn, b, c, 1.0);

        // C transitively sits inside A, so A cannot become a child of C
        assert!(would_create_cycle(&conn, c, a).unwrap());
    }

    #[test]
    fn test_shared_subtemplate_is_not_a_cycle() {
        let conn = test_conn();
        let a = seed_template(&conn, "A");
        let b = seed_template(&conn, "B");
        let shared = seed_template(&conn, "Shared");
        link_template(&conn, a, shared, 1.0);
        link_template(&conn, b, shared, 1.0);

        // Diamond shapes are fine, only back edges are rejected
        assert!(!would_create_cycle(&conn, a, b).unwrap());
    }

    #[test]
    fn test_ensure_no_cycle_error() {
        let conn = test_conn();
        let a = seed_template(&conn, "A");
        let b = seed_template(&conn, "B");
        link_template(&conn, a, b, 1.0);

        let err = ensure_no_cycle(&conn, b, a).unwrap_err();
        assert!(matches!(
            err,
            EngineError::CircularReference { parent, child } if parent == b && child == a
        ));
    }

    #[test]
    fn test_valid_link_sequence_stays_acyclic() {
        let conn = test_conn();
        let mut templates = Vec::new();
        for i in 0..5 {
            templates.push(seed_template(&conn, &format!("T{}", i)));
        }

        // Build a chain, validating each link the way the write path does
        for w in templates.windows(2) {
            ensure_no_cycle(&conn, w[0], w[1]).unwrap();
            link_template(&conn, w[0], w[1], 1.0);
        }

        // Every back edge into an ancestor is rejected
        for (i, &anc) in templates.iter().enumerate() {
            for &desc in &templates[i + 1..] {
                assert!(would_create_cycle(&conn, desc, anc).unwrap());
            }
        }
    }

    #[test]
    fn test_ancestor_ids_transitive() {
        let conn = test_conn();
        let root = seed_template(&conn, "Root");
        let mid = seed_template(&conn, "Mid");
        let leaf = seed_template(&conn, "Leaf");
        link_template(&conn, root, mid, 1.0);
        link_template(&conn, mid, leaf, 1.0);

        let mut ancestors = ancestor_ids(&conn, leaf).unwrap();
        ancestors.sort();
        assert_eq!(ancestors, vec![root, mid]);
    }
}
