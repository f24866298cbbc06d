use crate::{
    db::DbPool,
    entities::store::{self, DeliveryDay, Entity as Store},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct StoreFilter {
    pub archived: Option<bool>,
    pub day: Option<DeliveryDay>,
    pub search: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoreInput {
    pub name: String,
    pub location: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub owner_name: String,
    pub email: Option<String>,
    pub number: String,
    pub day: DeliveryDay,
}

#[derive(Debug, Clone, Default)]
pub struct StoreChanges {
    pub name: Option<String>,
    pub location: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub owner_name: Option<String>,
    pub email: Option<String>,
    pub number: Option<String>,
    pub day: Option<DeliveryDay>,
    pub is_archived: Option<bool>,
}

/// Service for managing retail stores
#[derive(Clone)]
pub struct StoreService {
    db_pool: Arc<DbPool>,
}

impl StoreService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_stores(
        &self,
        filter: StoreFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<store::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = Store::find();

        if let Some(archived) = filter.archived {
            query = query.filter(store::Column::IsArchived.eq(archived));
        }
        if let Some(day) = filter.day {
            query = query.filter(store::Column::Day.eq(day));
        }
        if let Some(term) = filter.search.filter(|s| !s.trim().is_empty()) {
            let term = term.trim().to_string();
            query = query.filter(
                Condition::any()
                    .add(store::Column::Name.contains(&term))
                    .add(store::Column::Location.contains(&term))
                    .add(store::Column::OwnerName.contains(&term)),
            );
        }

        let paginator = query.order_by_asc(store::Column::Name).paginate(db, limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let stores = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((stores, total))
    }

    #[instrument(skip(self))]
    pub async fn get_store(&self, id: Uuid) -> Result<store::Model, ServiceError> {
        Store::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Store", id))
    }

    #[instrument(skip(self))]
    pub async fn create_store(&self, input: StoreInput) -> Result<store::Model, ServiceError> {
        let now = Utc::now();
        let created = store::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            location: Set(input.location),
            lat: Set(input.lat),
            lng: Set(input.lng),
            owner_name: Set(input.owner_name),
            email: Set(input.email),
            number: Set(input.number),
            day: Set(input.day),
            is_archived: Set(false),
            archived_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(ServiceError::db_error)?;

        info!(store_id = %created.id, name = %created.name, "store created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update_store(
        &self,
        id: Uuid,
        changes: StoreChanges,
    ) -> Result<store::Model, ServiceError> {
        let existing = self.get_store(id).await?;
        let was_archived = existing.is_archived;
        let mut active: store::ActiveModel = existing.into();

        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(location) = changes.location {
            active.location = Set(location);
        }
        if changes.lat.is_some() {
            active.lat = Set(changes.lat);
        }
        if changes.lng.is_some() {
            active.lng = Set(changes.lng);
        }
        if let Some(owner_name) = changes.owner_name {
            active.owner_name = Set(owner_name);
        }
        if changes.email.is_some() {
            active.email = Set(changes.email);
        }
        if let Some(number) = changes.number {
            active.number = Set(number);
        }
        if let Some(day) = changes.day {
            active.day = Set(day);
        }
        if let Some(is_archived) = changes.is_archived {
            active.is_archived = Set(is_archived);
            // re-archiving keeps the original stamp
            if is_archived != was_archived {
                active.archived_at = Set(is_archived.then(Utc::now));
            }
        }

        active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Sets or clears the archived flag.
    #[instrument(skip(self))]
    pub async fn set_archived(&self, id: Uuid, archive: bool) -> Result<store::Model, ServiceError> {
        let updated = self
            .update_store(
                id,
                StoreChanges {
                    is_archived: Some(archive),
                    ..Default::default()
                },
            )
            .await?;
        info!(store_id = %id, archived = archive, "store archive flag changed");
        Ok(updated)
    }

    /// Hard delete; orders of the store cascade.
    #[instrument(skip(self))]
    pub async fn delete_store(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = Store::delete_by_id(id)
            .exec(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Store", id));
        }
        info!(store_id = %id, "store deleted");
        Ok(())
    }
}
