//! 基于 proptest 的不变量测试

use campus_rbac::models::{
    attribution::{AttributionStatus, ScopeType},
    unit::{UnitType, UpdateUnitRequest},
};
use campus_rbac::repository::{AttributionLedger, NewAttribution, UnitTree};
use chrono::{Duration, Utc};
use proptest::prelude::*;
use std::collections::HashSet;

mod common;
use common::unit_request;

/// `parents[i]` 对 i+1 取模后作为节点 i+1 的父节点，保证生成的是一棵树
fn build_tree(parents: &[usize]) -> UnitTree {
    let mut tree = UnitTree::new(true);
    let now = Utc::now();
    tree.insert(unit_request("u0", UnitType::University, None), now)
        .unwrap();
    for (i, p) in parents.iter().enumerate() {
        let id = format!("u{}", i + 1);
        let parent = format!("u{}", p % (i + 1));
        tree.insert(unit_request(&id, UnitType::Department, Some(&parent)), now)
            .unwrap();
    }
    tree
}

fn assert_tree_consistent(tree: &UnitTree) {
    for unit in tree.iter() {
        let chain = tree.ancestors(&unit.id).unwrap();
        assert_eq!(chain.len() as u32, unit.level);

        let mut seen = HashSet::new();
        for (depth, ancestor) in chain.iter().enumerate() {
            assert_eq!(ancestor.level, depth as u32);
            assert!(seen.insert(ancestor.id.clone()), "repeated ancestor {}", ancestor.id);
        }
        assert!(!seen.contains(&unit.id));

        match unit.parent_id.as_deref() {
            Some(parent_id) => {
                let parent = tree.get(parent_id).unwrap();
                assert_eq!(unit.level, parent.level + 1);
                assert!(parent.child_ids.contains(&unit.id));
            }
            None => assert_eq!(unit.level, 0),
        }
    }
}

proptest! {
    #[test]
    fn ancestors_are_strictly_leveled(parents in prop::collection::vec(0usize..64, 0..40)) {
        let tree = build_tree(&parents);
        assert_tree_consistent(&tree);
    }

    #[test]
    fn moves_never_break_the_tree(
        parents in prop::collection::vec(0usize..64, 1..30),
        moves in prop::collection::vec((0usize..64, 0usize..64), 0..20),
    ) {
        let mut tree = build_tree(&parents);
        let size = parents.len() + 1;

        for (node, target) in moves {
            // 根节点不参与移动
            let id = format!("u{}", 1 + node % (size - 1));
            let new_parent = format!("u{}", target % size);
            let version = tree.get(&id).unwrap().version;

            let result = tree.update(
                &id,
                UpdateUnitRequest {
                    parent_id: Some(new_parent.clone()),
                    version,
                    ..Default::default()
                },
                Utc::now(),
            );

            match result {
                Ok(moved) => prop_assert_eq!(moved.parent_id.as_deref(), Some(new_parent.as_str())),
                Err(e) => {
                    prop_assert_eq!(e.error_code(), "CYCLE_DETECTED");
                    prop_assert!(tree.is_ancestor_or_self(&id, &new_parent));
                }
            }
            assert_tree_consistent(&tree);
        }
    }

    #[test]
    fn sweep_is_idempotent(ends in prop::collection::vec(prop::option::of(-48i64..48), 1..30), at in 0i64..72) {
        let mut ledger = AttributionLedger::new();
        let origin = Utc::now();

        for (i, end) in ends.iter().enumerate() {
            // 入账时所有窗口都尚未结束
            let inserted_at = origin - Duration::hours(100);
            ledger
                .insert(
                    NewAttribution {
                        user_id: format!("user-{}", i),
                        user_name: format!("user-{}", i),
                        role_id: "role-x".to_string(),
                        role_name: "X".to_string(),
                        scope_type: ScopeType::Global,
                        scope_id: None,
                        scope_name: "Global".to_string(),
                        start_date: inserted_at,
                        end_date: end.map(|h| origin + Duration::hours(h)),
                        requested_by: "admin".to_string(),
                    },
                    inserted_at,
                )
                .unwrap();
        }

        let sweep_at = origin + Duration::hours(at - 24);
        let first = ledger.sweep_expirations(sweep_at);
        let second = ledger.sweep_expirations(sweep_at);
        prop_assert!(second.expired.is_empty());

        for a in ledger.iter() {
            let lapsed = a.end_date.is_some_and(|end| end < sweep_at);
            prop_assert_eq!(a.status == AttributionStatus::Expired, lapsed);
            prop_assert_eq!(first.expired.contains(&a.id), lapsed);
        }
    }
}
