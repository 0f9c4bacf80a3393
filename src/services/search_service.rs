//! 通用检索服务：全文匹配 + 字段过滤 + 确定性分页

use std::borrow::Cow;
use std::cmp::Ordering;
use tracing::{debug, instrument};

use crate::config::SearchConfig;
use crate::error::{AppError, Result};
use crate::models::search::*;
use crate::repository::{Directory, SharedDirectory};

/// 在一个集合上执行检索；集合按插入顺序给出
pub fn search_collection<T, I>(items: I, query: &SearchQuery, page_size: usize) -> Result<PagedResult<T>>
where
    T: Searchable,
    I: IntoIterator<Item = T>,
{
    if query.page < 1 {
        return Err(AppError::validation("page must be >= 1"));
    }
    if page_size < 1 {
        return Err(AppError::validation("pageSize must be >= 1"));
    }

    let mut filters = Vec::with_capacity(query.filters.len());
    for (name, expected) in &query.filters {
        match T::field(name) {
            Some(field) if field.filter => filters.push((field, expected.as_str())),
            _ => {
                return Err(AppError::validation(format!(
                    "{} cannot be filtered on '{}'",
                    T::KIND,
                    name
                )))
            }
        }
    }

    let sort = match &query.sort {
        Some(spec) => {
            let field = T::field(&spec.field).ok_or_else(|| {
                AppError::validation(format!("{} cannot be sorted on '{}'", T::KIND, spec.field))
            })?;
            Some((field, spec.descending))
        }
        None => None,
    };

    let needle = query
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase);

    let mut matched: Vec<T> = items
        .into_iter()
        .filter(|item| {
            filters
                .iter()
                .all(|(field, expected)| (field.extract)(item).is_some_and(|v| v == *expected))
        })
        .filter(|item| match &needle {
            Some(needle) => T::fields()
                .iter()
                .filter(|f| f.text)
                .any(|f| (f.extract)(item).is_some_and(|v| v.to_lowercase().contains(needle.as_str()))),
            None => true,
        })
        .collect();

    if let Some((field, descending)) = sort {
        // 稳定排序，相等的元素保持插入顺序
        matched.sort_by(|a, b| {
            let ordering = compare_values((field.extract)(a), (field.extract)(b));
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }

    let total = matched.len();
    let page_count = total.div_ceil(page_size);
    let items = matched
        .into_iter()
        .skip((query.page - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();

    Ok(PagedResult {
        items,
        total,
        page: query.page,
        page_size,
        page_count,
    })
}

/// 两边都是整数时按数值比较，否则按字符串；缺失值排在最前
fn compare_values(a: Option<Cow<'_, str>>, b: Option<Cow<'_, str>>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a.parse::<i64>(), b.parse::<i64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => a.cmp(&b),
        },
    }
}

/// 检索服务
pub struct SearchService {
    directory: SharedDirectory,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(directory: SharedDirectory, config: SearchConfig) -> Self {
        Self { directory, config }
    }

    fn page_size(&self, requested: Option<usize>) -> Result<usize> {
        let size = requested.unwrap_or(self.config.default_page_size);
        if size < 1 || size > self.config.max_page_size {
            return Err(AppError::validation(format!(
                "pageSize must be between 1 and {}",
                self.config.max_page_size
            )));
        }
        Ok(size)
    }

    #[instrument(skip(self, query), fields(entity = %query.entity))]
    pub async fn search(&self, query: SearchQuery) -> Result<PagedResult<SearchItem>> {
        let page_size = self.page_size(query.page_size)?;
        let dir = self.directory.read().await;

        let result = search_directory(&dir, &query, page_size)?;
        metrics::counter!("search_queries_total", "entity" => query.entity.as_str()).increment(1);
        debug!(total = result.total, page = result.page, "Search completed");
        Ok(result)
    }
}

/// 按实体类型分派到对应的集合
pub fn search_directory(dir: &Directory, query: &SearchQuery, page_size: usize) -> Result<PagedResult<SearchItem>> {
    fn run<'a, T: Searchable>(
        items: impl Iterator<Item = &'a T>,
        query: &SearchQuery,
        page_size: usize,
    ) -> Result<PagedResult<SearchItem>> {
        Ok(search_collection(items.cloned(), query, page_size)?.map(T::into_item))
    }

    match query.entity {
        EntityKind::Unit => run(dir.units().iter(), query, page_size),
        EntityKind::Role => run(dir.roles().iter(), query, page_size),
        EntityKind::Attribution => run(dir.attributions().iter(), query, page_size),
        EntityKind::Element => run(dir.elements().iter(), query, page_size),
    }
}
