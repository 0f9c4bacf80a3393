//! Unit tree service

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::models::unit::*;
use crate::repository::SharedDirectory;

/// 组织单元服务
pub struct UnitService {
    directory: SharedDirectory,
}

impl UnitService {
    pub fn new(directory: SharedDirectory) -> Self {
        Self { directory }
    }

    #[instrument(skip(self))]
    pub async fn get_unit(&self, id: &str) -> Result<Unit> {
        let dir = self.directory.read().await;
        dir.units().get(id).cloned()
    }

    #[instrument(skip(self))]
    pub async fn list_units(&self, filters: UnitListFilters) -> Vec<Unit> {
        self.directory.read().await.units().list(&filters)
    }

    #[instrument(skip(self))]
    pub async fn get_children(&self, id: &str) -> Result<Vec<Unit>> {
        let dir = self.directory.read().await;
        Ok(dir.units().children(id)?.into_iter().cloned().collect())
    }

    /// 祖先链（根在前，不含自身）
    #[instrument(skip(self))]
    pub async fn get_ancestors(&self, id: &str) -> Result<Vec<Unit>> {
        let dir = self.directory.read().await;
        Ok(dir.units().ancestors(id)?.into_iter().cloned().collect())
    }

    #[instrument(skip(self))]
    pub async fn get_descendants(&self, id: &str) -> Result<Vec<Unit>> {
        let dir = self.directory.read().await;
        Ok(dir.units().descendants(id)?.into_iter().cloned().collect())
    }

    #[instrument(skip(self))]
    pub async fn get_unit_tree(&self, root_id: Option<&str>) -> Result<Vec<UnitTreeNode>> {
        self.directory.read().await.units().tree(root_id)
    }

    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn insert_unit(&self, request: CreateUnitRequest) -> Result<Unit> {
        let mut dir = self.directory.write().await;
        let unit = dir.insert_unit(request, Utc::now()).map_err(|e| {
            warn!(error = %e, "Unit insert rejected");
            e
        })?;

        info!(unit_id = %unit.id, level = unit.level, "Unit created");
        Ok(unit)
    }

    #[instrument(skip(self, request))]
    pub async fn update_unit(&self, id: &str, request: UpdateUnitRequest) -> Result<Unit> {
        let mut dir = self.directory.write().await;
        let unit = dir.update_unit(id, request, Utc::now()).map_err(|e| {
            warn!(error = %e, "Unit update rejected");
            e
        })?;

        info!(unit_id = %unit.id, version = unit.version, "Unit updated");
        Ok(unit)
    }

    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: &str, version: Option<u64>) -> Result<Unit> {
        let mut dir = self.directory.write().await;
        let unit = dir.deactivate_unit(id, version, Utc::now())?;

        info!(unit_id = %unit.id, "Unit deactivated");
        Ok(unit)
    }
}
