use super::Base;
use crate::db::models::Category;
use crate::error::AppResult;

#[derive(Clone)]
pub struct CategoryRepository {
    base: Base,
}

impl CategoryRepository {
    pub(crate) fn new(base: Base) -> Self {
        Self { base }
    }

    pub async fn find_all(&self) -> AppResult<Vec<Category>> {
        let conn = self.base.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM categories ORDER BY name",
            Category::COLUMNS
        ))?;
        let categories = stmt
            .query_map([], Category::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Category>> {
        Ok(self.base.loaders.categories.load_one(id.to_string()).await?)
    }
}
