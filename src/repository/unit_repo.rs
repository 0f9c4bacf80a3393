//! Unit tree store (组织单元树)
//!
//! 单元以扁平 map 保存，父子关系通过 `parent_id` / `child_ids` 显式维护；
//! 祖先和后代查询都是迭代遍历，只访问涉及到的节点。

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use super::collection::{Collection, Keyed};
use crate::error::{AppError, Result};
use crate::models::unit::*;

impl Keyed for Unit {
    fn key(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone)]
pub struct UnitTree {
    units: Collection<Unit>,
    cascade_deactivation: bool,
}

impl UnitTree {
    pub fn new(cascade_deactivation: bool) -> Self {
        Self {
            units: Collection::new(),
            cascade_deactivation,
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn cascade_deactivation(&self) -> bool {
        self.cascade_deactivation
    }

    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    pub fn find(&self, id: &str) -> Option<&Unit> {
        self.units.get(id)
    }

    /// 获取单元
    pub fn get(&self, id: &str) -> Result<&Unit> {
        self.units.get(id).ok_or_else(|| AppError::not_found("unit", id))
    }

    /// 列出单元（插入顺序）
    pub fn list(&self, filters: &UnitListFilters) -> Vec<Unit> {
        self.units
            .iter()
            .filter(|u| filters.matches(u))
            .cloned()
            .collect()
    }

    /// 直接子单元（按 child_ids 顺序）
    pub fn children(&self, id: &str) -> Result<Vec<&Unit>> {
        let unit = self.get(id)?;
        Ok(unit
            .child_ids
            .iter()
            .filter_map(|c| self.units.get(c))
            .collect())
    }

    /// 祖先链：根 → 父，不含自身
    pub fn ancestors(&self, id: &str) -> Result<Vec<&Unit>> {
        let unit = self.get(id)?;
        let mut chain = Vec::with_capacity(unit.level as usize);
        let mut seen = HashSet::new();
        seen.insert(unit.id.as_str());

        let mut cursor = unit.parent_id.as_deref();
        while let Some(parent_id) = cursor {
            if !seen.insert(parent_id) {
                return Err(AppError::CycleDetected {
                    unit_id: id.to_string(),
                    parent_id: parent_id.to_string(),
                });
            }
            let parent = self.get(parent_id)?;
            chain.push(parent);
            cursor = parent.parent_id.as_deref();
        }

        chain.reverse();
        Ok(chain)
    }

    /// 所有后代（先序遍历，不含自身）
    pub fn descendants(&self, id: &str) -> Result<Vec<&Unit>> {
        let unit = self.get(id)?;
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<&str> = unit.child_ids.iter().rev().map(String::as_str).collect();

        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                return Err(AppError::CycleDetected {
                    unit_id: next.to_string(),
                    parent_id: id.to_string(),
                });
            }
            let child = self.get(next)?;
            out.push(child);
            stack.extend(child.child_ids.iter().rev().map(String::as_str));
        }

        Ok(out)
    }

    /// `ancestor_id` 是否为 `unit_id` 本身或其祖先
    pub fn is_ancestor_or_self(&self, ancestor_id: &str, unit_id: &str) -> bool {
        let mut cursor = Some(unit_id);
        let mut steps = 0;
        while let Some(current) = cursor {
            if current == ancestor_id {
                return true;
            }
            steps += 1;
            if steps > self.units.len() {
                return false;
            }
            cursor = self.units.get(current).and_then(|u| u.parent_id.as_deref());
        }
        false
    }

    /// 单元是否参与权限解析：自身启用，且在级联策略下所有祖先都启用
    pub fn is_live(&self, id: &str) -> bool {
        match self.units.get(id) {
            Some(unit) if unit.active => {
                !self.cascade_deactivation
                    || self
                        .ancestors(&unit.id)
                        .map(|chain| chain.iter().all(|a| a.active))
                        .unwrap_or(false)
            }
            _ => false,
        }
    }

    /// 从候选父节点走到根，途中出现 `unit_id` 即成环
    fn ensure_acyclic(&self, unit_id: &str, proposed_parent: &str) -> Result<()> {
        let cycle = || AppError::CycleDetected {
            unit_id: unit_id.to_string(),
            parent_id: proposed_parent.to_string(),
        };

        let mut cursor = Some(proposed_parent);
        let mut steps = 0;
        while let Some(current) = cursor {
            if current == unit_id {
                return Err(cycle());
            }
            steps += 1;
            if steps > self.units.len() {
                return Err(cycle());
            }
            cursor = self.units.get(current).and_then(|u| u.parent_id.as_deref());
        }
        Ok(())
    }

    /// 插入单元
    pub fn insert(&mut self, req: CreateUnitRequest, now: DateTime<Utc>) -> Result<Unit> {
        let id = req.id.clone().unwrap_or_else(|| super::new_id("unit"));
        if self.units.contains(&id) {
            return Err(AppError::validation(format!("unit id already exists: {}", id)));
        }

        let level = match req.parent_id.as_deref() {
            Some(parent_id) => {
                let parent = self.get(parent_id)?;
                if !parent.active {
                    return Err(AppError::validation(format!(
                        "parent unit {} is deactivated",
                        parent_id
                    )));
                }
                self.ensure_acyclic(&id, parent_id)?;
                parent.level + 1
            }
            None => 0,
        };

        let unit = Unit {
            id: id.clone(),
            unit_type: req.unit_type,
            name: req.name,
            code: req.code,
            parent_id: req.parent_id,
            level,
            active: true,
            head: req.head,
            location: req.location,
            email: req.email,
            phone: req.phone,
            child_ids: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        self.units
            .insert(unit.clone())
            .map_err(|_| AppError::internal_error("unit insert raced with itself"))?;

        if let Some(parent) = unit.parent_id.as_deref().and_then(|p| self.units.get_mut(p)) {
            parent.child_ids.push(id);
            parent.version += 1;
            parent.updated_at = now;
        }

        Ok(unit)
    }

    /// 更新单元（可选移动到新的父节点）
    pub fn update(&mut self, id: &str, req: UpdateUnitRequest, now: DateTime<Utc>) -> Result<Unit> {
        let current = self.get(id)?;
        if current.version != req.version {
            return Err(AppError::VersionConflict {
                entity: "unit",
                id: id.to_string(),
                expected: req.version,
                actual: current.version,
            });
        }

        // 先完成所有校验，再做修改
        let old_parent = current.parent_id.clone();
        let reparent = match req.parent_id.as_deref() {
            Some(new_parent) if old_parent.as_deref() != Some(new_parent) => {
                let parent = self.get(new_parent)?;
                if !parent.active {
                    return Err(AppError::validation(format!(
                        "parent unit {} is deactivated",
                        new_parent
                    )));
                }
                self.ensure_acyclic(id, new_parent)?;
                Some((new_parent.to_string(), parent.level + 1))
            }
            _ => None,
        };

        {
            let unit = self
                .units
                .get_mut(id)
                .ok_or_else(|| AppError::not_found("unit", id))?;
            if let Some(name) = req.name {
                unit.name = name;
            }
            if let Some(code) = req.code {
                unit.code = code;
            }
            if req.head.is_some() {
                unit.head = req.head;
            }
            if req.location.is_some() {
                unit.location = req.location;
            }
            if req.email.is_some() {
                unit.email = req.email;
            }
            if req.phone.is_some() {
                unit.phone = req.phone;
            }
            unit.version += 1;
            unit.updated_at = now;
        }

        if let Some((new_parent, level)) = reparent {
            if let Some(parent) = old_parent.as_deref().and_then(|p| self.units.get_mut(p)) {
                parent.child_ids.retain(|c| c != id);
                parent.version += 1;
                parent.updated_at = now;
            }
            if let Some(parent) = self.units.get_mut(&new_parent) {
                parent.child_ids.push(id.to_string());
                parent.version += 1;
                parent.updated_at = now;
            }
            if let Some(unit) = self.units.get_mut(id) {
                unit.parent_id = Some(new_parent);
            }
            self.relevel(id, level, now);
        }

        Ok(self.get(id)?.clone())
    }

    /// 重新计算子树的 level
    fn relevel(&mut self, root_id: &str, root_level: u32, now: DateTime<Utc>) {
        let mut stack = vec![(root_id.to_string(), root_level)];
        while let Some((id, level)) = stack.pop() {
            if let Some(unit) = self.units.get_mut(&id) {
                if unit.level != level {
                    unit.level = level;
                    unit.updated_at = now;
                    if id != root_id {
                        unit.version += 1;
                    }
                }
                stack.extend(unit.child_ids.iter().map(|c| (c.clone(), level + 1)));
            }
        }
    }

    /// 停用单元（软删除）；对已停用的单元是幂等的
    pub fn deactivate(&mut self, id: &str, version: Option<u64>, now: DateTime<Utc>) -> Result<Unit> {
        let unit = self
            .units
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("unit", id))?;

        if let Some(expected) = version {
            if unit.version != expected {
                return Err(AppError::VersionConflict {
                    entity: "unit",
                    id: id.to_string(),
                    expected,
                    actual: unit.version,
                });
            }
        }

        if unit.active {
            unit.active = false;
            unit.version += 1;
            unit.updated_at = now;
        }

        Ok(unit.clone())
    }

    /// 嵌套树：指定根，或者整片森林
    pub fn tree(&self, root_id: Option<&str>) -> Result<Vec<UnitTreeNode>> {
        let roots: Vec<&Unit> = match root_id {
            Some(id) => vec![self.get(id)?],
            None => self.units.iter().filter(|u| u.is_root()).collect(),
        };
        roots.into_iter().map(|root| self.build_subtree(root)).collect()
    }

    fn build_subtree(&self, root: &Unit) -> Result<UnitTreeNode> {
        let mut order = vec![root];
        order.extend(self.descendants(&root.id)?);

        // 先序的逆序保证子节点先于父节点组装
        let mut built: HashMap<&str, UnitTreeNode> = HashMap::with_capacity(order.len());
        for unit in order.iter().rev() {
            let children = unit
                .child_ids
                .iter()
                .filter_map(|c| built.remove(c.as_str()))
                .collect();
            built.insert(
                unit.id.as_str(),
                UnitTreeNode {
                    unit: (*unit).clone(),
                    children,
                },
            );
        }

        built
            .remove(root.id.as_str())
            .ok_or_else(|| AppError::internal_error("unit tree assembly lost its root"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(id: &str, unit_type: UnitType, parent: Option<&str>) -> CreateUnitRequest {
        CreateUnitRequest {
            id: Some(id.to_string()),
            unit_type,
            name: id.to_uppercase(),
            code: id.to_uppercase(),
            parent_id: parent.map(str::to_string),
            head: None,
            location: None,
            email: None,
            phone: None,
        }
    }

    /// univ-1 → univ-1-fac-1 → univ-1-fac-1-dep-1, univ-1 → univ-1-fac-2
    fn sample_tree(cascade: bool) -> UnitTree {
        let now = Utc::now();
        let mut tree = UnitTree::new(cascade);
        tree.insert(req("univ-1", UnitType::University, None), now).unwrap();
        tree.insert(req("univ-1-fac-1", UnitType::Faculty, Some("univ-1")), now).unwrap();
        tree.insert(req("univ-1-fac-1-dep-1", UnitType::Department, Some("univ-1-fac-1")), now)
            .unwrap();
        tree.insert(req("univ-1-fac-2", UnitType::Faculty, Some("univ-1")), now).unwrap();
        tree
    }

    fn ids(units: Vec<&Unit>) -> Vec<&str> {
        units.into_iter().map(|u| u.id.as_str()).collect()
    }

    #[test]
    fn test_insert_computes_level_and_children() {
        let tree = sample_tree(true);
        assert_eq!(tree.get("univ-1").unwrap().level, 0);
        assert_eq!(tree.get("univ-1-fac-1-dep-1").unwrap().level, 2);
        assert_eq!(
            tree.get("univ-1").unwrap().child_ids,
            vec!["univ-1-fac-1".to_string(), "univ-1-fac-2".to_string()]
        );
    }

    #[test]
    fn test_ancestors_are_root_first() {
        let tree = sample_tree(true);
        let chain = tree.ancestors("univ-1-fac-1-dep-1").unwrap();
        assert_eq!(ids(chain), vec!["univ-1", "univ-1-fac-1"]);
        assert!(tree.ancestors("univ-1").unwrap().is_empty());
    }

    #[test]
    fn test_descendants_preorder() {
        let tree = sample_tree(true);
        let all = tree.descendants("univ-1").unwrap();
        assert_eq!(ids(all), vec!["univ-1-fac-1", "univ-1-fac-1-dep-1", "univ-1-fac-2"]);
    }

    #[test]
    fn test_missing_unit_is_not_found() {
        let tree = sample_tree(true);
        assert!(matches!(tree.ancestors("nope"), Err(AppError::NotFound { .. })));
        assert!(matches!(
            tree.children("nope"),
            Err(AppError::NotFound { entity: "unit", .. })
        ));
    }

    #[test]
    fn test_insert_duplicate_id_rejected() {
        let mut tree = sample_tree(true);
        let err = tree
            .insert(req("univ-1-fac-1", UnitType::Faculty, Some("univ-1")), Utc::now())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_reparent_under_descendant_is_cycle() {
        let mut tree = sample_tree(true);
        let version = tree.get("univ-1-fac-1").unwrap().version;
        let err = tree
            .update(
                "univ-1-fac-1",
                UpdateUnitRequest {
                    parent_id: Some("univ-1-fac-1-dep-1".to_string()),
                    version,
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, AppError::CycleDetected { .. }));

        // 没有任何部分修改
        let unit = tree.get("univ-1-fac-1").unwrap();
        assert_eq!(unit.version, version);
        assert_eq!(unit.parent_id.as_deref(), Some("univ-1"));
    }

    #[test]
    fn test_reparent_recomputes_subtree_levels() {
        let mut tree = sample_tree(true);
        let version = tree.get("univ-1-fac-1").unwrap().version;
        tree.update(
            "univ-1-fac-1",
            UpdateUnitRequest {
                parent_id: Some("univ-1-fac-2".to_string()),
                version,
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();

        assert_eq!(tree.get("univ-1-fac-1").unwrap().level, 2);
        assert_eq!(tree.get("univ-1-fac-1-dep-1").unwrap().level, 3);
        assert_eq!(tree.get("univ-1").unwrap().child_ids, vec!["univ-1-fac-2".to_string()]);
        assert_eq!(
            tree.get("univ-1-fac-2").unwrap().child_ids,
            vec!["univ-1-fac-1".to_string()]
        );
    }

    #[test]
    fn test_update_with_stale_version_conflicts() {
        let mut tree = sample_tree(true);
        let err = tree
            .update(
                "univ-1",
                UpdateUnitRequest {
                    name: Some("Université".to_string()),
                    version: 0,
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, AppError::VersionConflict { .. }));
    }

    #[test]
    fn test_deactivation_cascades_when_configured() {
        let mut tree = sample_tree(true);
        tree.deactivate("univ-1-fac-1", None, Utc::now()).unwrap();
        assert!(!tree.is_live("univ-1-fac-1"));
        assert!(!tree.is_live("univ-1-fac-1-dep-1"));
        assert!(tree.is_live("univ-1-fac-2"));

        let mut flat = sample_tree(false);
        flat.deactivate("univ-1-fac-1", None, Utc::now()).unwrap();
        assert!(flat.is_live("univ-1-fac-1-dep-1"));
    }

    #[test]
    fn test_deactivate_is_idempotent() {
        let mut tree = sample_tree(true);
        let first = tree.deactivate("univ-1-fac-2", None, Utc::now()).unwrap();
        let second = tree.deactivate("univ-1-fac-2", None, Utc::now()).unwrap();
        assert_eq!(first.version, second.version);
        assert!(!second.active);
    }

    #[test]
    fn test_tree_nests_children_in_order() {
        let tree = sample_tree(true);
        let forest = tree.tree(None).unwrap();
        assert_eq!(forest.len(), 1);
        let root = &forest[0];
        assert_eq!(root.unit.id, "univ-1");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].unit.id, "univ-1-fac-1");
        assert_eq!(root.children[0].children[0].unit.id, "univ-1-fac-1-dep-1");
    }
}
