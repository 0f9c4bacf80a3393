//! Permission catalog (static reference data)

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Permission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: String,
    /// 界面显示的动作名
    pub action: String,
    pub description: String,
}

/// Permission category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionCategory {
    pub id: String,
    pub name: String,
    pub description: String,
    pub permissions: Vec<Permission>,
}

/// 权限目录：分类列表 + 按 id 的索引
#[derive(Debug, Clone)]
pub struct PermissionCatalog {
    categories: Vec<PermissionCategory>,
    index: HashMap<String, (usize, usize)>,
}

impl PermissionCatalog {
    pub fn new(categories: Vec<PermissionCategory>) -> Self {
        let mut index = HashMap::new();
        for (ci, category) in categories.iter().enumerate() {
            for (pi, permission) in category.permissions.iter().enumerate() {
                index.insert(permission.id.clone(), (ci, pi));
            }
        }
        Self { categories, index }
    }

    pub fn categories(&self) -> &[PermissionCategory] {
        &self.categories
    }

    pub fn contains(&self, permission_id: &str) -> bool {
        self.index.contains_key(permission_id)
    }

    pub fn get(&self, permission_id: &str) -> Option<&Permission> {
        self.index
            .get(permission_id)
            .map(|&(ci, pi)| &self.categories[ci].permissions[pi])
    }

    /// 目录中的全部权限 id（按分类顺序）
    pub fn all_ids(&self) -> Vec<String> {
        self.categories
            .iter()
            .flat_map(|c| c.permissions.iter().map(|p| p.id.clone()))
            .collect()
    }

    /// 返回目录中不存在的权限 id
    pub fn unknown<'a, I>(&self, ids: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        ids.into_iter()
            .filter(|id| !self.contains(id))
            .cloned()
            .collect()
    }
}

impl Default for PermissionCatalog {
    fn default() -> Self {
        DEFAULT_CATALOG.clone()
    }
}

fn perm(id: &str, action: &str, description: &str) -> Permission {
    Permission {
        id: id.to_string(),
        action: action.to_string(),
        description: description.to_string(),
    }
}

fn category(id: &str, name: &str, description: &str, permissions: Vec<Permission>) -> PermissionCategory {
    PermissionCategory {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        permissions,
    }
}

/// 内置权限目录
pub static DEFAULT_CATALOG: Lazy<PermissionCatalog> = Lazy::new(|| {
    PermissionCatalog::new(vec![
        category(
            "unite",
            "Unités",
            "Structure organisationnelle",
            vec![
                perm("unite.view", "Consulter", "Voir la fiche d'une unité"),
                perm("unite.view_children", "Consulter les sous-unités", "Parcourir les unités rattachées"),
                perm("unite.create", "Créer", "Créer une unité"),
                perm("unite.edit", "Modifier", "Modifier une unité"),
                perm("unite.deactivate", "Désactiver", "Désactiver une unité"),
            ],
        ),
        category(
            "role",
            "Rôles",
            "Catalogue des rôles et permissions",
            vec![
                perm("role.view", "Consulter", "Voir les rôles"),
                perm("role.create", "Créer", "Créer un rôle"),
                perm("role.edit", "Modifier", "Modifier un rôle et ses permissions"),
                perm("role.delete", "Supprimer", "Supprimer un rôle inutilisé"),
            ],
        ),
        category(
            "attribution",
            "Attributions",
            "Affectation des rôles aux utilisateurs",
            vec![
                perm("attribution.view", "Consulter", "Voir les attributions"),
                perm("attribution.create", "Attribuer", "Attribuer un rôle"),
                perm("attribution.approve", "Approuver", "Approuver ou rejeter une demande"),
                perm("attribution.revoke", "Révoquer", "Suspendre ou révoquer une attribution"),
            ],
        ),
        category(
            "eleve",
            "Élèves",
            "Dossiers des élèves et étudiants",
            vec![
                perm("eleve.view", "Consulter", "Voir les dossiers élèves"),
                perm("eleve.edit", "Modifier", "Modifier les dossiers élèves"),
            ],
        ),
        category(
            "note",
            "Notes",
            "Évaluations et bulletins",
            vec![
                perm("note.view", "Consulter", "Voir les notes"),
                perm("note.edit", "Saisir", "Saisir ou corriger des notes"),
                perm("note.publish", "Publier", "Publier les bulletins"),
            ],
        ),
        category(
            "devoir",
            "Devoirs",
            "Devoirs et travaux",
            vec![
                perm("devoir.view", "Consulter", "Voir les devoirs"),
                perm("devoir.create", "Créer", "Publier un devoir"),
                perm("devoir.grade", "Corriger", "Corriger les rendus"),
            ],
        ),
        category(
            "absence",
            "Présences",
            "Suivi des absences",
            vec![
                perm("absence.view", "Consulter", "Voir les absences"),
                perm("absence.record", "Saisir", "Saisir les absences"),
            ],
        ),
    ])
});

/// 用户在某个单元上的有效权限集（计算结果，不存储）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivePermissions {
    pub user_id: String,
    pub unit_id: String,
    pub permissions: BTreeSet<String>,
}
