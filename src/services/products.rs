use crate::{
    db::DbPool,
    entities::{
        category::{self, Entity as Category},
        inventory,
        product::{self, Entity as Product, DEFAULT_REORDER_LEVEL},
        supplier::Entity as Supplier,
    },
    errors::ServiceError,
    services::inventory::ensure_inventory_row,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub active: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProductInput {
    pub product_id: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Uuid,
    pub supplier_id: Option<Uuid>,
    pub unit_price: Decimal,
    pub cost_price: Decimal,
    pub size: String,
    pub barcode: Option<String>,
    pub reorder_level: Option<i32>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub product_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub unit_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub size: Option<String>,
    pub barcode: Option<String>,
    pub reorder_level: Option<i32>,
    pub active: Option<bool>,
}

/// A product with its category and current stock level.
#[derive(Debug, Clone)]
pub struct ProductRecord {
    pub product: product::Model,
    pub category: Option<category::Model>,
    pub current_stock: i32,
}

impl ProductRecord {
    pub fn low_stock(&self) -> bool {
        self.product.is_low_stock(self.current_stock)
    }
}

/// Service for managing the product catalogue
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    async fn stock_levels<C: ConnectionTrait>(
        db: &C,
        product_ids: Vec<Uuid>,
    ) -> Result<HashMap<Uuid, i32>, ServiceError> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = inventory::Entity::find()
            .filter(inventory::Column::ProductId.is_in(product_ids))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(rows
            .into_iter()
            .map(|row| (row.product_id, row.current_stock))
            .collect())
    }

    async fn check_references<C: ConnectionTrait>(
        db: &C,
        category_id: Option<Uuid>,
        supplier_id: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        if let Some(category_id) = category_id {
            let found = Category::find_by_id(category_id)
                .one(db)
                .await
                .map_err(ServiceError::db_error)?;
            if found.is_none() {
                return Err(ServiceError::BadRequest(format!(
                    "Category {} does not exist",
                    category_id
                )));
            }
        }
        if let Some(supplier_id) = supplier_id {
            let found = Supplier::find_by_id(supplier_id)
                .one(db)
                .await
                .map_err(ServiceError::db_error)?;
            if found.is_none() {
                return Err(ServiceError::BadRequest(format!(
                    "Supplier {} does not exist",
                    supplier_id
                )));
            }
        }
        Ok(())
    }

    async fn ensure_unique_code<C: ConnectionTrait>(
        db: &C,
        code: &str,
        except: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut query = Product::find().filter(product::Column::ProductId.eq(code));
        if let Some(id) = except {
            query = query.filter(product::Column::Id.ne(id));
        }
        let existing = query.count(db).await.map_err(ServiceError::db_error)?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "Product with code '{}' already exists",
                code
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<ProductRecord>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = Product::find().find_also_related(Category);

        if let Some(category_id) = filter.category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }
        if let Some(supplier_id) = filter.supplier_id {
            query = query.filter(product::Column::SupplierId.eq(supplier_id));
        }
        if let Some(active) = filter.active {
            query = query.filter(product::Column::Active.eq(active));
        }
        if let Some(term) = filter.search.filter(|s| !s.trim().is_empty()) {
            let term = term.trim().to_string();
            query = query.filter(
                Condition::any()
                    .add(product::Column::Name.contains(&term))
                    .add(product::Column::ProductId.contains(&term))
                    .add(product::Column::Barcode.contains(&term)),
            );
        }

        let paginator = query
            .order_by_asc(product::Column::Name)
            .paginate(db, limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let rows = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        let stock = Self::stock_levels(db, rows.iter().map(|(p, _)| p.id).collect()).await?;
        let records = rows
            .into_iter()
            .map(|(product, category)| ProductRecord {
                current_stock: stock.get(&product.id).copied().unwrap_or(0),
                product,
                category,
            })
            .collect();

        Ok((records, total))
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: Uuid) -> Result<ProductRecord, ServiceError> {
        let db = &*self.db_pool;
        let (product, category) = Product::find_by_id(id)
            .find_also_related(Category)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Product", id))?;

        let stock = Self::stock_levels(db, vec![product.id]).await?;
        Ok(ProductRecord {
            current_stock: stock.get(&product.id).copied().unwrap_or(0),
            product,
            category,
        })
    }

    /// Creates the product together with its zero-stock inventory row.
    #[instrument(skip(self))]
    pub async fn create_product(&self, input: ProductInput) -> Result<ProductRecord, ServiceError> {
        let txn = self.db_pool.begin().await.map_err(ServiceError::db_error)?;

        Self::ensure_unique_code(&txn, &input.product_id, None).await?;
        Self::check_references(&txn, Some(input.category_id), input.supplier_id).await?;

        let now = Utc::now();
        let created = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(input.product_id),
            name: Set(input.name),
            description: Set(input.description),
            category_id: Set(input.category_id),
            supplier_id: Set(input.supplier_id),
            unit_price: Set(input.unit_price),
            cost_price: Set(input.cost_price),
            size: Set(input.size),
            barcode: Set(input.barcode),
            reorder_level: Set(input.reorder_level.unwrap_or(DEFAULT_REORDER_LEVEL)),
            active: Set(input.active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        ensure_inventory_row(&txn, created.id).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(product_id = %created.id, code = %created.product_id, "product created");
        self.get_product(created.id).await
    }

    #[instrument(skip(self))]
    pub async fn update_product(
        &self,
        id: Uuid,
        changes: ProductChanges,
    ) -> Result<ProductRecord, ServiceError> {
        let db = &*self.db_pool;
        let existing = Product::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Product", id))?;

        if let Some(code) = &changes.product_id {
            Self::ensure_unique_code(db, code, Some(id)).await?;
        }
        Self::check_references(db, changes.category_id, changes.supplier_id).await?;

        let mut active: product::ActiveModel = existing.into();
        if let Some(code) = changes.product_id {
            active.product_id = Set(code);
        }
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if changes.description.is_some() {
            active.description = Set(changes.description);
        }
        if let Some(category_id) = changes.category_id {
            active.category_id = Set(category_id);
        }
        if changes.supplier_id.is_some() {
            active.supplier_id = Set(changes.supplier_id);
        }
        if let Some(price) = changes.unit_price {
            active.unit_price = Set(price);
        }
        if let Some(cost) = changes.cost_price {
            active.cost_price = Set(cost);
        }
        if let Some(size) = changes.size {
            active.size = Set(size);
        }
        if changes.barcode.is_some() {
            active.barcode = Set(changes.barcode);
        }
        if let Some(level) = changes.reorder_level {
            active.reorder_level = Set(level);
        }
        if let Some(flag) = changes.active {
            active.active = Set(flag);
        }

        active.update(db).await.map_err(ServiceError::db_error)?;
        self.get_product(id).await
    }

    /// Deletes the product; its inventory, transactions, expiry batches and
    /// order lines go with it.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let result = Product::delete_by_id(id)
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Product", id));
        }
        info!(product_id = %id, "product deleted");
        Ok(())
    }
}
