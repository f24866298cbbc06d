use crate::{
    db::DbPool,
    entities::{
        product::{self, Entity as Product},
        product_expiry::{self, Entity as ProductExpiry},
    },
    errors::ServiceError,
};
use chrono::{Days, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub const DEFAULT_EXPIRY_WINDOW_DAYS: u64 = 30;

#[derive(Debug, Clone, Default)]
pub struct ExpiryFilter {
    pub product_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExpiryInput {
    pub product_id: Uuid,
    pub batch_number: String,
    pub quantity: i32,
    pub production_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ExpiryChanges {
    pub batch_number: Option<String>,
    pub quantity: Option<i32>,
    pub production_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

pub type ExpiryRecord = (product_expiry::Model, Option<product::Model>);

fn check_dates(production: NaiveDate, expiry: NaiveDate) -> Result<(), ServiceError> {
    if expiry < production {
        return Err(ServiceError::ValidationError(
            "expiry_date cannot be before production_date".to_string(),
        ));
    }
    Ok(())
}

/// Inclusive window `[today, today + days]`.
pub fn expiry_window(today: NaiveDate, days: u64) -> (NaiveDate, NaiveDate) {
    let end = today.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX);
    (today, end)
}

/// Service for product batches and their expiry dates
#[derive(Clone)]
pub struct ExpiryService {
    db_pool: Arc<DbPool>,
}

impl ExpiryService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_expiries(
        &self,
        filter: ExpiryFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<ExpiryRecord>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = ProductExpiry::find().find_also_related(Product);

        if let Some(product_id) = filter.product_id {
            query = query.filter(product_expiry::Column::ProductId.eq(product_id));
        }
        if let Some(is_active) = filter.is_active {
            query = query.filter(product_expiry::Column::IsActive.eq(is_active));
        }
        if let Some(term) = filter.search.filter(|s| !s.trim().is_empty()) {
            let term = term.trim().to_string();
            query = query.filter(
                Condition::any()
                    .add(product::Column::Name.contains(&term))
                    .add(product_expiry::Column::BatchNumber.contains(&term)),
            );
        }

        let paginator = query
            .order_by_asc(product_expiry::Column::ExpiryDate)
            .paginate(db, limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let rows = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;
        Ok((rows, total))
    }

    #[instrument(skip(self))]
    pub async fn get_expiry(&self, id: Uuid) -> Result<ExpiryRecord, ServiceError> {
        ProductExpiry::find_by_id(id)
            .find_also_related(Product)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Product expiry", id))
    }

    /// Active batches expiring between today and `days` from now.
    #[instrument(skip(self))]
    pub async fn expiring_soon(&self, days: u64) -> Result<Vec<ExpiryRecord>, ServiceError> {
        let (start, end) = expiry_window(Utc::now().date_naive(), days);
        ProductExpiry::find()
            .find_also_related(Product)
            .filter(product_expiry::Column::IsActive.eq(true))
            .filter(product_expiry::Column::ExpiryDate.gte(start))
            .filter(product_expiry::Column::ExpiryDate.lte(end))
            .order_by_asc(product_expiry::Column::ExpiryDate)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn create_expiry(&self, input: ExpiryInput) -> Result<ExpiryRecord, ServiceError> {
        check_dates(input.production_date, input.expiry_date)?;

        let db = &*self.db_pool;
        if Product::find_by_id(input.product_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .is_none()
        {
            return Err(ServiceError::BadRequest(format!(
                "Product {} does not exist",
                input.product_id
            )));
        }

        let now = Utc::now();
        let created = product_expiry::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(input.product_id),
            batch_number: Set(input.batch_number),
            quantity: Set(input.quantity),
            production_date: Set(input.production_date),
            expiry_date: Set(input.expiry_date),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(expiry_id = %created.id, batch = %created.batch_number, "expiry batch recorded");
        self.get_expiry(created.id).await
    }

    #[instrument(skip(self))]
    pub async fn update_expiry(
        &self,
        id: Uuid,
        changes: ExpiryChanges,
    ) -> Result<ExpiryRecord, ServiceError> {
        let (existing, _) = self.get_expiry(id).await?;
        check_dates(
            changes.production_date.unwrap_or(existing.production_date),
            changes.expiry_date.unwrap_or(existing.expiry_date),
        )?;

        let mut active: product_expiry::ActiveModel = existing.into();
        if let Some(batch) = changes.batch_number {
            active.batch_number = Set(batch);
        }
        if let Some(quantity) = changes.quantity {
            active.quantity = Set(quantity);
        }
        if let Some(date) = changes.production_date {
            active.production_date = Set(date);
        }
        if let Some(date) = changes.expiry_date {
            active.expiry_date = Set(date);
        }
        if let Some(flag) = changes.is_active {
            active.is_active = Set(flag);
        }

        active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        self.get_expiry(id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_expiry(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = ProductExpiry::delete_by_id(id)
            .exec(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Product expiry", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_inclusive_of_both_ends() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 20).unwrap();
        let (start, end) = expiry_window(today, 10);
        assert_eq!(start, today);
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn expiry_before_production_is_rejected() {
        let production = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert!(check_dates(production, production).is_ok());
        assert!(check_dates(production, production.pred_opt().unwrap()).is_err());
    }
}
