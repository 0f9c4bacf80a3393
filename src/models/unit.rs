//! Organizational unit domain models

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// 单元编码格式：字母数字开头，允许 `_ . -`
pub static UNIT_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").expect("static regex is valid"));

/// 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    University,
    Faculty,
    Department,
    Service,
    Laboratory,
    Center,
    School,
    Cycle,
    Level,
    Class,
}

impl UnitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::University => "university",
            UnitType::Faculty => "faculty",
            UnitType::Department => "department",
            UnitType::Service => "service",
            UnitType::Laboratory => "laboratory",
            UnitType::Center => "center",
            UnitType::School => "school",
            UnitType::Cycle => "cycle",
            UnitType::Level => "level",
            UnitType::Class => "class",
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "university" => Ok(UnitType::University),
            "faculty" => Ok(UnitType::Faculty),
            "department" => Ok(UnitType::Department),
            "service" => Ok(UnitType::Service),
            "laboratory" => Ok(UnitType::Laboratory),
            "center" => Ok(UnitType::Center),
            "school" => Ok(UnitType::School),
            "cycle" => Ok(UnitType::Cycle),
            "level" => Ok(UnitType::Level),
            "class" => Ok(UnitType::Class),
            other => Err(format!("unknown unit type: {}", other)),
        }
    }
}

/// 组织单元（树节点）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: String,
    #[serde(rename = "type")]
    pub unit_type: UnitType,
    pub name: String,
    pub code: String,
    pub parent_id: Option<String>,
    /// 深度，根节点为 0
    pub level: u32,
    pub active: bool,
    pub head: Option<String>,
    pub location: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// 有序子节点 id
    pub child_ids: Vec<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Unit {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Create unit request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUnitRequest {
    /// 省略时自动生成
    #[validate(length(min = 1, max = 128))]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub unit_type: UnitType,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(regex(path = *UNIT_CODE_RE))]
    pub code: String,
    pub parent_id: Option<String>,
    pub head: Option<String>,
    pub location: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Update unit request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUnitRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(regex(path = *UNIT_CODE_RE))]
    pub code: Option<String>,
    pub head: Option<String>,
    pub location: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    /// 移动到新的父单元下
    pub parent_id: Option<String>,
    pub version: u64, // For optimistic locking
}

/// Deactivate unit request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeactivateUnitRequest {
    pub version: Option<u64>,
}

/// Unit list filters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitListFilters {
    #[serde(rename = "type")]
    pub unit_type: Option<UnitType>,
    pub active: Option<bool>,
    pub parent_id: Option<String>,
}

impl UnitListFilters {
    pub fn matches(&self, unit: &Unit) -> bool {
        self.unit_type.is_none_or_eq(&unit.unit_type)
            && self.active.is_none_or_eq(&unit.active)
            && self
                .parent_id
                .as_ref()
                .map_or(true, |p| unit.parent_id.as_ref() == Some(p))
    }
}

/// 嵌套的单元树（用于 getUnitTree 响应）
#[derive(Debug, Clone, Serialize)]
pub struct UnitTreeNode {
    #[serde(flatten)]
    pub unit: Unit,
    pub children: Vec<UnitTreeNode>,
}

/// `Option` 过滤条件的小工具：None 表示不过滤
pub(crate) trait OptionFilterExt<T> {
    fn is_none_or_eq(&self, value: &T) -> bool;
}

impl<T: PartialEq> OptionFilterExt<T> for Option<T> {
    fn is_none_or_eq(&self, value: &T) -> bool {
        self.as_ref().map_or(true, |v| v == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_type_from_str_case_insensitive() {
        assert_eq!("Faculty".parse::<UnitType>().unwrap(), UnitType::Faculty);
        assert_eq!("class".parse::<UnitType>().unwrap(), UnitType::Class);
        assert!("campus".parse::<UnitType>().is_err());
    }

    #[test]
    fn test_unit_code_pattern() {
        assert!(UNIT_CODE_RE.is_match("FST-INFO"));
        assert!(UNIT_CODE_RE.is_match("6e.A"));
        assert!(!UNIT_CODE_RE.is_match("-lead"));
        assert!(!UNIT_CODE_RE.is_match("with space"));
    }

    #[test]
    fn test_create_unit_request_uses_type_key() {
        let json = r#"{"type":"department","name":"Informatique","code":"INFO","parentId":"fac-1"}"#;
        let req: CreateUnitRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.unit_type, UnitType::Department);
        assert_eq!(req.parent_id.as_deref(), Some("fac-1"));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_unit_request_rejects_bad_email() {
        let req = CreateUnitRequest {
            id: None,
            unit_type: UnitType::School,
            name: "Lycée".to_string(),
            code: "LYC".to_string(),
            parent_id: None,
            head: None,
            location: None,
            email: Some("not-an-email".to_string()),
            phone: None,
        };
        assert!(req.validate().is_err());
    }
}
