//! Attribution service
//! 授权的创建、状态流转以及定期过期扫描

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::models::attribution::*;
use crate::repository::SharedDirectory;

/// 授权服务
pub struct AttributionService {
    directory: SharedDirectory,
}

impl AttributionService {
    pub fn new(directory: SharedDirectory) -> Self {
        Self { directory }
    }

    #[instrument(skip(self))]
    pub async fn get_attribution(&self, id: &str) -> Result<Attribution> {
        self.directory.read().await.attributions().get(id).cloned()
    }

    #[instrument(skip(self))]
    pub async fn list_attributions(&self, filters: AttributionListFilters) -> Vec<Attribution> {
        self.directory.read().await.attributions().list(&filters)
    }

    /// 授予角色
    #[instrument(skip(self, request), fields(user_id = %request.user_id, role_id = %request.role_id))]
    pub async fn create_attribution(
        &self,
        request: CreateAttributionRequest,
        requested_by: &str,
    ) -> Result<Attribution> {
        let mut dir = self.directory.write().await;
        let attribution = dir
            .create_attribution(request, requested_by, Utc::now())
            .map_err(|e| {
                warn!(error = %e, "Attribution rejected");
                e
            })?;

        info!(
            attribution_id = %attribution.id,
            scope_type = %attribution.scope_type,
            status = %attribution.status,
            "Attribution created"
        );
        Ok(attribution)
    }

    /// 手动状态变更
    #[instrument(skip(self))]
    pub async fn change_status(
        &self,
        id: &str,
        action: StatusAction,
        version: Option<u64>,
    ) -> Result<Attribution> {
        let mut dir = self.directory.write().await;
        let attribution = dir
            .change_attribution_status(id, action, version, Utc::now())
            .map_err(|e| {
                warn!(error = %e, action = %action, "Status change rejected");
                e
            })?;

        metrics::counter!("attribution_transitions_total", "action" => action.as_str()).increment(1);
        info!(attribution_id = %attribution.id, status = %attribution.status, "Attribution status changed");
        Ok(attribution)
    }

    /// 执行一次过期扫描
    #[instrument(skip(self))]
    pub async fn sweep_expirations(&self, now: DateTime<Utc>) -> SweepReport {
        let mut dir = self.directory.write().await;
        let report = dir.sweep_expirations(now);

        if report.expired.is_empty() {
            debug!(scanned = report.scanned, "Expiration sweep found nothing to expire");
        } else {
            metrics::counter!("attributions_expired_total").increment(report.expired.len() as u64);
            info!(
                scanned = report.scanned,
                expired = report.expired.len(),
                "Expired attributions swept"
            );
        }
        report
    }

    /// 启动后台过期扫描任务，`shutdown` 置为 true 时退出
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!(interval_secs = interval.as_secs(), "Expiration sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_expirations(Utc::now()).await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Expiration sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::permission::PermissionCatalog;
    use crate::repository::Directory;

    fn service() -> Arc<AttributionService> {
        let mut dir = Directory::new(true, PermissionCatalog::default());
        dir.seed_system_roles(Utc::now()).unwrap();
        Arc::new(AttributionService::new(dir.into_shared()))
    }

    #[tokio::test]
    async fn test_sweeper_expires_lapsed_attributions() {
        let service = service();
        let now = Utc::now();
        let created = service
            .create_attribution(
                CreateAttributionRequest {
                    user_id: "user-1".to_string(),
                    user_name: None,
                    role_id: "role-observateur".to_string(),
                    scope_type: ScopeType::Global,
                    scope_id: None,
                    start_date: Some(now - chrono::Duration::days(1)),
                    end_date: Some(now + chrono::Duration::milliseconds(20)),
                },
                "admin",
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let (tx, rx) = watch::channel(false);
        let handle = service.clone().spawn_sweeper(Duration::from_millis(10), rx);
        tokio::time::sleep(Duration::from_millis(60)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        let swept = service.get_attribution(&created.id).await.unwrap();
        assert_eq!(swept.status, AttributionStatus::Expired);
    }
}
