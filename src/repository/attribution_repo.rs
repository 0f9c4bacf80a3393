//! Attribution ledger (授权记录台账)
//!
//! 只负责台账内部的约束：同一 (user, role, scope) 元组至多一条非终态记录、
//! 状态机、过期扫描。角色/范围是否存在由 [`super::Directory`] 校验。

use chrono::{DateTime, Utc};

use super::collection::{Collection, Keyed};
use crate::error::{AppError, Result};
use crate::models::attribution::*;

impl Keyed for Attribution {
    fn key(&self) -> &str {
        &self.id
    }
}

/// 已完成引用校验、等待入账的新记录
#[derive(Debug, Clone)]
pub struct NewAttribution {
    pub user_id: String,
    pub user_name: String,
    pub role_id: String,
    pub role_name: String,
    pub scope_type: ScopeType,
    pub scope_id: Option<String>,
    pub scope_name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub requested_by: String,
}

#[derive(Debug, Clone, Default)]
pub struct AttributionLedger {
    attributions: Collection<Attribution>,
}

impl AttributionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.attributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribution> {
        self.attributions.iter()
    }

    pub fn get(&self, id: &str) -> Result<&Attribution> {
        self.attributions
            .get(id)
            .ok_or_else(|| AppError::not_found("attribution", id))
    }

    pub fn list(&self, filters: &AttributionListFilters) -> Vec<Attribution> {
        self.attributions
            .iter()
            .filter(|a| filters.matches(a))
            .cloned()
            .collect()
    }

    /// 用户的全部 attribution
    pub fn for_user<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a Attribution> + 'a {
        self.attributions.iter().filter(move |a| a.user_id == user_id)
    }

    /// 计入 userCount 的记录数（active + pending）
    pub fn count_for_role(&self, role_id: &str) -> u32 {
        let count = self
            .attributions
            .iter()
            .filter(|a| a.role_id == role_id && a.status.counts_toward_role())
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// 引用该角色的非终态记录数（含 suspended）
    pub fn open_for_role(&self, role_id: &str) -> usize {
        self.attributions
            .iter()
            .filter(|a| a.role_id == role_id && !a.status.is_terminal())
            .count()
    }

    fn find_open(&self, user_id: &str, role_id: &str, scope_type: ScopeType, scope_id: Option<&str>) -> Option<&Attribution> {
        self.attributions
            .iter()
            .find(|a| !a.status.is_terminal() && a.same_tuple(user_id, role_id, scope_type, scope_id))
    }

    /// 入账：校验时间窗与重叠约束，按 start_date 决定初始状态
    pub fn insert(&mut self, new: NewAttribution, now: DateTime<Utc>) -> Result<Attribution> {
        if let Some(end) = new.end_date {
            if end < new.start_date {
                return Err(AppError::validation("endDate must not precede startDate"));
            }
            if end < now {
                return Err(AppError::validation("attribution window has already ended"));
            }
        }
        if let Some(existing) = self.find_open(&new.user_id, &new.role_id, new.scope_type, new.scope_id.as_deref()) {
            return Err(AppError::Overlap {
                existing_id: existing.id.clone(),
            });
        }

        let status = if new.start_date > now {
            AttributionStatus::Pending
        } else {
            AttributionStatus::Active
        };

        let attribution = Attribution {
            id: super::new_id("attr"),
            user_id: new.user_id,
            user_name: new.user_name,
            role_id: new.role_id,
            role_name: new.role_name,
            scope_type: new.scope_type,
            scope_id: new.scope_id,
            scope_name: new.scope_name,
            status,
            start_date: new.start_date,
            end_date: new.end_date,
            requested_by: new.requested_by,
            requested_at: now,
            updated_at: now,
            version: 1,
        };

        self.attributions
            .insert(attribution.clone())
            .map_err(|_| AppError::internal_error("attribution insert raced with itself"))?;
        Ok(attribution)
    }

    /// 按状态表执行手动状态变更
    pub fn change_status(
        &mut self,
        id: &str,
        action: StatusAction,
        version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<Attribution> {
        let current = self.get(id)?;

        if let Some(expected) = version {
            if current.version != expected {
                return Err(AppError::VersionConflict {
                    entity: "attribution",
                    id: id.to_string(),
                    expected,
                    actual: current.version,
                });
            }
        }

        let next = current.status.apply(action).ok_or_else(|| AppError::StateTransition {
            from: current.status.as_str().to_string(),
            action: action.as_str().to_string(),
        })?;

        // 进入 active 时必须处于有效期内
        if next == AttributionStatus::Active {
            if current.start_date > now {
                return Err(AppError::validation(format!(
                    "attribution {} cannot become active before its start date",
                    id
                )));
            }
            if current.has_ended(now) {
                return Err(AppError::validation(format!(
                    "attribution {} cannot become active after its end date",
                    id
                )));
            }
        }

        let attribution = self
            .attributions
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("attribution", id))?;
        attribution.status = next;
        attribution.version += 1;
        attribution.updated_at = now;

        Ok(attribution.clone())
    }

    /// 将截止日期早于 now 的非终态记录转为 expired；对已合规的记录无副作用
    pub fn sweep_expirations(&mut self, now: DateTime<Utc>) -> SweepReport {
        let mut scanned = 0;
        let mut expired = Vec::new();

        for attribution in self.attributions.iter_mut() {
            if attribution.status.is_terminal() {
                continue;
            }
            scanned += 1;
            if attribution.has_ended(now) {
                attribution.status = AttributionStatus::Expired;
                attribution.version += 1;
                attribution.updated_at = now;
                expired.push(attribution.id.clone());
            }
        }

        SweepReport {
            swept_at: now,
            scanned,
            expired,
        }
    }

    /// 刷新反规范化的角色名
    pub fn rename_role(&mut self, role_id: &str, role_name: &str, now: DateTime<Utc>) -> usize {
        let mut touched = 0;
        for attribution in self.attributions.iter_mut() {
            if attribution.role_id == role_id && attribution.role_name != role_name {
                attribution.role_name = role_name.to_string();
                attribution.version += 1;
                attribution.updated_at = now;
                touched += 1;
            }
        }
        touched
    }
}
