//! Search/filter query models and the per-entity field registry
//!
//! Every searchable entity declares a fixed table of named field extractors.
//! `text` fields take part in free-text matching, `filter` fields accept
//! exact-match filters; any declared field can be used as a sort key.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::{attribution::Attribution, element::Element, role::Role, unit::Unit};

/// 可检索的实体集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Unit,
    Role,
    Attribution,
    Element,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Unit => "unit",
            EntityKind::Role => "role",
            EntityKind::Attribution => "attribution",
            EntityKind::Element => "element",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unit" | "units" => Ok(EntityKind::Unit),
            "role" | "roles" => Ok(EntityKind::Role),
            "attribution" | "attributions" => Ok(EntityKind::Attribution),
            "element" | "elements" => Ok(EntityKind::Element),
            other => Err(format!("unknown entity type: {}", other)),
        }
    }
}

/// 排序条件
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub descending: bool,
}

/// 检索请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(rename = "entityType")]
    pub entity: EntityKind,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
    #[serde(default = "default_page")]
    pub page: usize,
    /// 省略时使用配置的默认分页大小
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub sort: Option<SortSpec>,
}

fn default_page() -> usize {
    1
}

impl SearchQuery {
    pub fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            text: None,
            filters: BTreeMap::new(),
            page: 1,
            page_size: None,
            sort: None,
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn page(mut self, page: usize, page_size: usize) -> Self {
        self.page = page;
        self.page_size = Some(page_size);
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.sort = Some(SortSpec {
            field: field.into(),
            descending,
        });
        self
    }
}

/// 分页结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
}

impl<T> PagedResult<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            page_count: self.page_count,
        }
    }
}

/// 跨实体检索结果的条目
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchItem {
    Unit(Unit),
    Role(Role),
    Attribution(Attribution),
    Element(Element),
}

/// 字段取值函数
pub type Extractor<T> = for<'a> fn(&'a T) -> Option<Cow<'a, str>>;

/// 一个已声明的字段
pub struct Field<T: 'static> {
    pub name: &'static str,
    /// 参与全文匹配
    pub text: bool,
    /// 可用于精确过滤
    pub filter: bool,
    pub extract: Extractor<T>,
}

/// 可被检索引擎处理的实体
pub trait Searchable: Clone + Sized + 'static {
    const KIND: EntityKind;

    fn fields() -> &'static [Field<Self>];

    fn field(name: &str) -> Option<&'static Field<Self>> {
        Self::fields().iter().find(|f| f.name == name)
    }

    fn into_item(self) -> SearchItem;
}

fn flag(value: bool) -> Cow<'static, str> {
    Cow::Borrowed(if value { "true" } else { "false" })
}

impl Searchable for Unit {
    const KIND: EntityKind = EntityKind::Unit;

    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<Unit>] = &[
            Field { name: "name", text: true, filter: false, extract: |u| Some(Cow::Borrowed(u.name.as_str())) },
            Field { name: "code", text: true, filter: true, extract: |u| Some(Cow::Borrowed(u.code.as_str())) },
            Field { name: "head", text: true, filter: false, extract: |u| u.head.as_deref().map(Cow::Borrowed) },
            Field { name: "type", text: false, filter: true, extract: |u| Some(Cow::Borrowed(u.unit_type.as_str())) },
            Field { name: "active", text: false, filter: true, extract: |u| Some(flag(u.active)) },
            Field { name: "parentId", text: false, filter: true, extract: |u| u.parent_id.as_deref().map(Cow::Borrowed) },
            Field { name: "level", text: false, filter: true, extract: |u| Some(Cow::Owned(u.level.to_string())) },
        ];
        FIELDS
    }

    fn into_item(self) -> SearchItem {
        SearchItem::Unit(self)
    }
}

impl Searchable for Role {
    const KIND: EntityKind = EntityKind::Role;

    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<Role>] = &[
            Field { name: "name", text: true, filter: true, extract: |r| Some(Cow::Borrowed(r.name.as_str())) },
            Field { name: "description", text: true, filter: false, extract: |r| r.description.as_deref().map(Cow::Borrowed) },
            Field { name: "isSystem", text: false, filter: true, extract: |r| Some(flag(r.is_system)) },
            Field { name: "unitId", text: false, filter: true, extract: |r| r.unit_id.as_deref().map(Cow::Borrowed) },
            Field { name: "userCount", text: false, filter: false, extract: |r| Some(Cow::Owned(r.user_count.to_string())) },
        ];
        FIELDS
    }

    fn into_item(self) -> SearchItem {
        SearchItem::Role(self)
    }
}

impl Searchable for Attribution {
    const KIND: EntityKind = EntityKind::Attribution;

    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<Attribution>] = &[
            Field { name: "userName", text: true, filter: false, extract: |a| Some(Cow::Borrowed(a.user_name.as_str())) },
            Field { name: "roleName", text: true, filter: false, extract: |a| Some(Cow::Borrowed(a.role_name.as_str())) },
            Field { name: "scopeName", text: true, filter: false, extract: |a| Some(Cow::Borrowed(a.scope_name.as_str())) },
            Field { name: "userId", text: false, filter: true, extract: |a| Some(Cow::Borrowed(a.user_id.as_str())) },
            Field { name: "roleId", text: false, filter: true, extract: |a| Some(Cow::Borrowed(a.role_id.as_str())) },
            Field { name: "status", text: false, filter: true, extract: |a| Some(Cow::Borrowed(a.status.as_str())) },
            Field { name: "scopeType", text: false, filter: true, extract: |a| Some(Cow::Borrowed(a.scope_type.as_str())) },
            Field { name: "scopeId", text: false, filter: true, extract: |a| a.scope_id.as_deref().map(Cow::Borrowed) },
            Field { name: "startDate", text: false, filter: false, extract: |a| Some(Cow::Owned(a.start_date.to_rfc3339())) },
        ];
        FIELDS
    }

    fn into_item(self) -> SearchItem {
        SearchItem::Attribution(self)
    }
}

impl Searchable for Element {
    const KIND: EntityKind = EntityKind::Element;

    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<Element>] = &[
            Field { name: "name", text: true, filter: false, extract: |e| Some(Cow::Borrowed(e.name.as_str())) },
            Field { name: "kind", text: true, filter: true, extract: |e| Some(Cow::Borrowed(e.kind.as_str())) },
            Field { name: "unitId", text: false, filter: true, extract: |e| e.unit_id.as_deref().map(Cow::Borrowed) },
            Field { name: "active", text: false, filter: true, extract: |e| Some(flag(e.active)) },
        ];
        FIELDS
    }

    fn into_item(self) -> SearchItem {
        SearchItem::Element(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_parsing() {
        assert_eq!("role".parse::<EntityKind>().unwrap(), EntityKind::Role);
        assert_eq!("Attributions".parse::<EntityKind>().unwrap(), EntityKind::Attribution);
        assert!("user".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_registry_declares_text_fields() {
        let text: Vec<_> = Role::fields().iter().filter(|f| f.text).map(|f| f.name).collect();
        assert_eq!(text, vec!["name", "description"]);

        let text: Vec<_> = Attribution::fields().iter().filter(|f| f.text).map(|f| f.name).collect();
        assert_eq!(text, vec!["userName", "roleName", "scopeName"]);

        assert!(Unit::field("head").is_some_and(|f| f.text));
        assert!(Unit::field("nickname").is_none());
    }

    #[test]
    fn test_search_query_defaults() {
        let query: SearchQuery = serde_json::from_str(r#"{"entityType":"role","text":"admin"}"#).unwrap();
        assert_eq!(query.entity, EntityKind::Role);
        assert_eq!(query.page, 1);
        assert!(query.page_size.is_none());
        assert!(query.filters.is_empty());
    }
}
