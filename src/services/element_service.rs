//! Element registry service

use chrono::Utc;
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::element::*;
use crate::repository::SharedDirectory;

pub struct ElementService {
    directory: SharedDirectory,
}

impl ElementService {
    pub fn new(directory: SharedDirectory) -> Self {
        Self { directory }
    }

    #[instrument(skip(self))]
    pub async fn get_element(&self, id: &str) -> Result<Element> {
        self.directory.read().await.elements().get(id).cloned()
    }

    #[instrument(skip(self))]
    pub async fn list_elements(&self, filters: ElementListFilters) -> Vec<Element> {
        self.directory.read().await.elements().list(&filters)
    }

    #[instrument(skip(self, request), fields(kind = %request.kind))]
    pub async fn create_element(&self, request: CreateElementRequest) -> Result<Element> {
        let mut dir = self.directory.write().await;
        let element = dir.create_element(request, Utc::now())?;

        info!(element_id = %element.id, "Element registered");
        Ok(element)
    }

    /// 停用后，指向该元素的授权不再生效，也不能再新建
    #[instrument(skip(self))]
    pub async fn deactivate_element(&self, id: &str) -> Result<Element> {
        let element = self.directory.write().await.deactivate_element(id)?;
        info!(element_id = %element.id, "Element deactivated");
        Ok(element)
    }
}
