//! Element registry

use chrono::{DateTime, Utc};

use super::collection::{Collection, Keyed};
use crate::error::{AppError, Result};
use crate::models::element::*;

impl Keyed for Element {
    fn key(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default)]
pub struct ElementRegistry {
    elements: Collection<Element>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    pub fn find(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn get(&self, id: &str) -> Result<&Element> {
        self.elements
            .get(id)
            .ok_or_else(|| AppError::not_found("element", id))
    }

    pub fn list(&self, filters: &ElementListFilters) -> Vec<Element> {
        self.elements
            .iter()
            .filter(|e| filters.matches(e))
            .cloned()
            .collect()
    }

    /// 登记元素；unit_id 的存在性由调用方校验
    pub fn insert(&mut self, req: CreateElementRequest, now: DateTime<Utc>) -> Result<Element> {
        let element = Element {
            id: req.id.unwrap_or_else(|| super::new_id("elem")),
            name: req.name.trim().to_string(),
            kind: req.kind.trim().to_lowercase(),
            unit_id: req.unit_id,
            active: true,
            created_at: now,
        };
        if element.name.is_empty() {
            return Err(AppError::validation("element name must not be blank"));
        }

        self.elements.insert(element.clone()).map_err(|e| {
            AppError::validation(format!("element id already exists: {}", e.id))
        })?;
        Ok(element)
    }

    pub fn deactivate(&mut self, id: &str) -> Result<Element> {
        let element = self
            .elements
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("element", id))?;
        element.active = false;
        Ok(element.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_normalizes_kind_and_rejects_duplicates() {
        let mut registry = ElementRegistry::new();
        let req = CreateElementRequest {
            id: Some("cours-algo".to_string()),
            name: "Algorithmique".to_string(),
            kind: " Course ".to_string(),
            unit_id: None,
        };
        let element = registry.insert(req.clone(), Utc::now()).unwrap();
        assert_eq!(element.kind, "course");
        assert!(element.active);

        assert!(matches!(registry.insert(req, Utc::now()), Err(AppError::Validation(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_deactivate_is_idempotent() {
        let mut registry = ElementRegistry::new();
        let element = registry
            .insert(
                CreateElementRequest {
                    id: Some("salle-b12".to_string()),
                    name: "Salle B12".to_string(),
                    kind: "room".to_string(),
                    unit_id: None,
                },
                Utc::now(),
            )
            .unwrap();

        assert!(!registry.deactivate(&element.id).unwrap().active);
        assert!(!registry.deactivate(&element.id).unwrap().active);
        assert!(!registry.get("salle-b12").unwrap().active);

        let inactive = registry.list(&ElementListFilters {
            active: Some(false),
            ..Default::default()
        });
        assert_eq!(inactive.len(), 1);

        assert!(matches!(registry.deactivate("nope"), Err(AppError::NotFound { .. })));
    }
}
