use crate::{
    db::DbPool,
    entities::{
        category::{self, Entity as Category},
        product,
    },
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Service for managing product categories
#[derive(Clone)]
pub struct CategoryService {
    db_pool: Arc<DbPool>,
}

impl CategoryService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_categories(
        &self,
        search: Option<String>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<category::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = Category::find();
        if let Some(term) = search.filter(|s| !s.trim().is_empty()) {
            query = query.filter(category::Column::Name.contains(term.trim()));
        }

        let paginator = query.order_by_asc(category::Column::Name).paginate(db, limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let categories = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;
        Ok((categories, total))
    }

    #[instrument(skip(self))]
    pub async fn get_category(&self, id: Uuid) -> Result<category::Model, ServiceError> {
        Category::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Category", id))
    }

    async fn ensure_unique_name(&self, name: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = Category::find().filter(category::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(category::Column::Id.ne(id));
        }
        let existing = query
            .count(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category '{}' already exists",
                name
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn create_category(
        &self,
        name: String,
        description: Option<String>,
    ) -> Result<category::Model, ServiceError> {
        self.ensure_unique_name(&name, None).await?;

        let now = Utc::now();
        let created = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            description: Set(description),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(ServiceError::db_error)?;

        info!(category_id = %created.id, "category created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update_category(
        &self,
        id: Uuid,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<category::Model, ServiceError> {
        let existing = self.get_category(id).await?;
        if let Some(name) = &name {
            self.ensure_unique_name(name, Some(id)).await?;
        }

        let mut active: category::ActiveModel = existing.into();
        if let Some(name) = name {
            active.name = Set(name);
        }
        if description.is_some() {
            active.description = Set(description);
        }
        active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Refuses to delete a category that still has products.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        self.get_category(id).await?;

        let products = product::Entity::find()
            .filter(product::Column::CategoryId.eq(id))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        if products > 0 {
            warn!(category_id = %id, products, "refusing to delete category in use");
            return Err(ServiceError::Conflict(format!(
                "Category has {} product(s) and cannot be deleted",
                products
            )));
        }

        Category::delete_by_id(id)
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;
        info!(category_id = %id, "category deleted");
        Ok(())
    }
}
