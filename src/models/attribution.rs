//! Attribution domain models and the status state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// 授权范围类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeType {
    /// 单个元素（不向下继承）
    Element,
    /// 单元及其所有后代
    Unit,
    /// 全局
    Global,
}

impl ScopeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::Element => "element",
            ScopeType::Unit => "unit",
            ScopeType::Global => "global",
        }
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "element" => Ok(ScopeType::Element),
            "unit" => Ok(ScopeType::Unit),
            "global" => Ok(ScopeType::Global),
            other => Err(format!("unknown scope type: {}", other)),
        }
    }
}

/// Attribution 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionStatus {
    Pending,
    Active,
    Suspended,
    Expired,
    Cancelled,
}

impl AttributionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributionStatus::Pending => "pending",
            AttributionStatus::Active => "active",
            AttributionStatus::Suspended => "suspended",
            AttributionStatus::Expired => "expired",
            AttributionStatus::Cancelled => "cancelled",
        }
    }

    /// 终态不可再变更
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttributionStatus::Expired | AttributionStatus::Cancelled)
    }

    /// 计入角色 userCount 的状态
    pub fn counts_toward_role(&self) -> bool {
        matches!(self, AttributionStatus::Active | AttributionStatus::Pending)
    }

    /// 手动状态变更表；未列出的边返回 None
    pub fn apply(self, action: StatusAction) -> Option<AttributionStatus> {
        use AttributionStatus::*;
        use StatusAction::*;

        match (self, action) {
            (Pending, Approve) => Some(Active),
            (Pending, Reject) => Some(Cancelled),
            (Active, Suspend) => Some(Suspended),
            (Active, Revoke) => Some(Cancelled),
            (Suspended, Resume) => Some(Active),
            (Suspended, Revoke) => Some(Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for AttributionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(AttributionStatus::Pending),
            "active" => Ok(AttributionStatus::Active),
            "suspended" => Ok(AttributionStatus::Suspended),
            "expired" => Ok(AttributionStatus::Expired),
            "cancelled" => Ok(AttributionStatus::Cancelled),
            other => Err(format!("unknown attribution status: {}", other)),
        }
    }
}

/// 手动状态动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusAction {
    Approve,
    Reject,
    Suspend,
    Resume,
    Revoke,
}

impl StatusAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusAction::Approve => "approve",
            StatusAction::Reject => "reject",
            StatusAction::Suspend => "suspend",
            StatusAction::Resume => "resume",
            StatusAction::Revoke => "revoke",
        }
    }
}

impl fmt::Display for StatusAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribution: 在某个范围内、某段时间内把角色授予用户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribution {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub role_id: String,
    pub role_name: String,
    pub scope_type: ScopeType,
    /// Global 时为 None
    pub scope_id: Option<String>,
    pub scope_name: String,
    pub status: AttributionStatus,
    pub start_date: DateTime<Utc>,
    /// None 表示无截止日期
    pub end_date: Option<DateTime<Utc>>,
    pub requested_by: String,
    pub requested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Attribution {
    /// 截止日期已过
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_date.is_some_and(|end| end < now)
    }

    /// 当前是否实际生效（active 且处于有效期内）
    pub fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        self.status == AttributionStatus::Active && self.start_date <= now && !self.has_ended(now)
    }

    /// 与另一条记录是否指向同一个 (user, role, scope) 元组
    pub fn same_tuple(&self, user_id: &str, role_id: &str, scope_type: ScopeType, scope_id: Option<&str>) -> bool {
        self.user_id == user_id
            && self.role_id == role_id
            && self.scope_type == scope_type
            && self.scope_id.as_deref() == scope_id
    }
}

/// Create attribution request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAttributionRequest {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    /// 省略时使用 user_id
    pub user_name: Option<String>,
    #[validate(length(min = 1))]
    pub role_id: String,
    pub scope_type: ScopeType,
    pub scope_id: Option<String>,
    /// 省略时为当前时间
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Change attribution status request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatusRequest {
    pub action: StatusAction,
    pub version: Option<u64>,
}

/// Attribution list filters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionListFilters {
    pub user_id: Option<String>,
    pub role_id: Option<String>,
    pub status: Option<AttributionStatus>,
    pub scope_type: Option<ScopeType>,
    pub scope_id: Option<String>,
}

impl AttributionListFilters {
    pub fn matches(&self, a: &Attribution) -> bool {
        self.user_id.as_ref().map_or(true, |v| &a.user_id == v)
            && self.role_id.as_ref().map_or(true, |v| &a.role_id == v)
            && self.status.map_or(true, |v| a.status == v)
            && self.scope_type.map_or(true, |v| a.scope_type == v)
            && self
                .scope_id
                .as_ref()
                .map_or(true, |v| a.scope_id.as_ref() == Some(v))
    }
}

/// 过期扫描结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub swept_at: DateTime<Utc>,
    /// 检查过的非终态记录数
    pub scanned: usize,
    /// 本次转为 expired 的记录
    pub expired: Vec<String>,
}
