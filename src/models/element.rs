//! Domain elements (courses, subjects, rooms, assignments)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    pub name: String,
    /// 元素种类，如 course / subject / room / assignment
    pub kind: String,
    pub unit_id: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateElementRequest {
    #[validate(length(min = 1, max = 128))]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub kind: String,
    pub unit_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementListFilters {
    pub kind: Option<String>,
    pub unit_id: Option<String>,
    pub active: Option<bool>,
}

impl ElementListFilters {
    pub fn matches(&self, element: &Element) -> bool {
        self.kind.as_ref().map_or(true, |k| &element.kind == k)
            && self
                .unit_id
                .as_ref()
                .map_or(true, |u| element.unit_id.as_ref() == Some(u))
            && self.active.map_or(true, |a| element.active == a)
    }
}
