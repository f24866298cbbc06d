use crate::{
    db::DbPool,
    entities::supplier::{self, Entity as Supplier},
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
pub struct SupplierInput {
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct SupplierChanges {
    pub name: Option<String>,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

/// Service for managing suppliers
#[derive(Clone)]
pub struct SupplierService {
    db_pool: Arc<DbPool>,
}

impl SupplierService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_suppliers(
        &self,
        search: Option<String>,
        is_active: Option<bool>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<supplier::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = Supplier::find();

        if let Some(is_active) = is_active {
            query = query.filter(supplier::Column::IsActive.eq(is_active));
        }
        if let Some(term) = search.filter(|s| !s.trim().is_empty()) {
            let term = term.trim().to_string();
            query = query.filter(
                Condition::any()
                    .add(supplier::Column::Name.contains(&term))
                    .add(supplier::Column::ContactPerson.contains(&term)),
            );
        }

        let paginator = query.order_by_asc(supplier::Column::Name).paginate(db, limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let suppliers = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;
        Ok((suppliers, total))
    }

    #[instrument(skip(self))]
    pub async fn get_supplier(&self, id: Uuid) -> Result<supplier::Model, ServiceError> {
        Supplier::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Supplier", id))
    }

    #[instrument(skip(self))]
    pub async fn create_supplier(
        &self,
        input: SupplierInput,
    ) -> Result<supplier::Model, ServiceError> {
        let now = Utc::now();
        let created = supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            contact_person: Set(input.contact_person),
            email: Set(input.email),
            phone_number: Set(input.phone_number),
            address: Set(input.address),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(ServiceError::db_error)?;

        info!(supplier_id = %created.id, "supplier created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update_supplier(
        &self,
        id: Uuid,
        changes: SupplierChanges,
    ) -> Result<supplier::Model, ServiceError> {
        let existing = self.get_supplier(id).await?;
        let mut active: supplier::ActiveModel = existing.into();

        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if changes.contact_person.is_some() {
            active.contact_person = Set(changes.contact_person);
        }
        if changes.email.is_some() {
            active.email = Set(changes.email);
        }
        if changes.phone_number.is_some() {
            active.phone_number = Set(changes.phone_number);
        }
        if changes.address.is_some() {
            active.address = Set(changes.address);
        }
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }

        active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Products of a deleted supplier keep existing with no supplier.
    #[instrument(skip(self))]
    pub async fn delete_supplier(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = Supplier::delete_by_id(id)
            .exec(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Supplier", id));
        }
        info!(supplier_id = %id, "supplier deleted");
        Ok(())
    }
}
