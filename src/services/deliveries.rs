use crate::{
    db::DbPool,
    entities::{
        delivery::{self, DeliveryStatus, Entity as Delivery},
        delivery_status_update::{self, Entity as DeliveryStatusUpdate},
        order::{self, Entity as Order},
        recent_activity::ActivityType,
        store::{self, Entity as Store},
        user::{self, Entity as User, UserRole},
    },
    errors::ServiceError,
    services::{
        activity::{record_activity, NewActivity},
        short_reference,
    },
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{NaiveDate, NaiveTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::{collections::HashMap, path::PathBuf, sync::Arc};
use tracing::{info, instrument};
use uuid::Uuid;

/// Directory below the media root that holds captured signatures.
pub const SIGNATURE_DIR: &str = "signatures";

#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub order_id: Uuid,
    pub employee_id: Option<Uuid>,
    pub status: Option<DeliveryStatus>,
    pub delivery_date: NaiveDate,
    pub delivery_time: NaiveTime,
    pub notes: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct DeliveryChanges {
    pub employee_id: Option<Uuid>,
    pub status: Option<DeliveryStatus>,
    pub delivery_date: Option<NaiveDate>,
    pub delivery_time: Option<NaiveTime>,
    pub notes: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct DeliveryFilter {
    pub status: Option<DeliveryStatus>,
    pub employee_id: Option<Uuid>,
    pub delivery_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// A delivery with the order, store and driver it refers to.
#[derive(Debug, Clone)]
pub struct DeliveryDetails {
    pub delivery: delivery::Model,
    pub order: Option<order::Model>,
    pub store: Option<store::Model>,
    pub employee: Option<user::Model>,
}

/// One stop of a driver's route for a day.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteStop {
    pub id: Uuid,
    pub delivery_id: String,
    pub order_id: String,
    pub store_name: String,
    pub address: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub status: DeliveryStatus,
    pub delivery_time: String,
}

/// Strips an optional `data:...;base64,` prefix and decodes the payload.
pub fn decode_signature(signature_data: &str) -> Result<Vec<u8>, ServiceError> {
    let encoded = signature_data
        .split_once(',')
        .map_or(signature_data, |(_, data)| data)
        .trim();
    if encoded.is_empty() {
        return Err(ServiceError::BadRequest("No signature provided.".to_string()));
    }
    STANDARD
        .decode(encoded)
        .map_err(|e| ServiceError::BadRequest(format!("Error processing signature: {}", e)))
}

async fn latest_status<C>(db: &C, delivery_id: Uuid) -> Result<Option<DeliveryStatus>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(DeliveryStatusUpdate::find()
        .filter(delivery_status_update::Column::DeliveryId.eq(delivery_id))
        .order_by_desc(delivery_status_update::Column::UpdateTime)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .map(|update| update.status))
}

/// Appends a status update unless it repeats the latest recorded one.
/// Returns whether a row was written.
async fn record_status<C>(
    db: &C,
    delivery: &delivery::Model,
    notes: Option<String>,
    updated_by: Option<Uuid>,
) -> Result<bool, ServiceError>
where
    C: ConnectionTrait,
{
    if latest_status(db, delivery.id).await? == Some(delivery.status) {
        return Ok(false);
    }
    delivery_status_update::ActiveModel {
        id: Set(Uuid::new_v4()),
        delivery_id: Set(delivery.id),
        status: Set(delivery.status),
        notes: Set(notes),
        update_time: Set(Utc::now()),
        updated_by: Set(updated_by),
    }
    .insert(db)
    .await
    .map_err(ServiceError::db_error)?;
    Ok(true)
}

/// Service for deliveries, their status trail and signatures
#[derive(Clone)]
pub struct DeliveryService {
    db_pool: Arc<DbPool>,
    media_root: PathBuf,
}

impl DeliveryService {
    pub fn new(db_pool: Arc<DbPool>, media_root: impl Into<PathBuf>) -> Self {
        Self {
            db_pool,
            media_root: media_root.into(),
        }
    }

    async fn find_delivery(&self, id: Uuid) -> Result<delivery::Model, ServiceError> {
        Delivery::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Delivery", id))
    }

    async fn ensure_driver(&self, employee_id: Uuid) -> Result<(), ServiceError> {
        let employee = User::find_by_id(employee_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        match employee {
            Some(user) if user.role == UserRole::DeliveryDriver && user.can_login() => Ok(()),
            _ => Err(ServiceError::BadRequest(format!(
                "Employee {} is not an active delivery driver",
                employee_id
            ))),
        }
    }

    /// Loads orders, stores and drivers for a batch of deliveries.
    async fn attach(
        &self,
        deliveries: Vec<delivery::Model>,
    ) -> Result<Vec<DeliveryDetails>, ServiceError> {
        let db = &*self.db_pool;
        let order_ids: Vec<Uuid> = deliveries.iter().map(|d| d.order_id).collect();
        let orders: HashMap<Uuid, order::Model> = Order::find()
            .filter(order::Column::Id.is_in(order_ids))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|o| (o.id, o))
            .collect();

        let store_ids: Vec<Uuid> = orders.values().map(|o| o.store_id).collect();
        let stores: HashMap<Uuid, store::Model> = Store::find()
            .filter(store::Column::Id.is_in(store_ids))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        let employee_ids: Vec<Uuid> = deliveries.iter().filter_map(|d| d.employee_id).collect();
        let employees: HashMap<Uuid, user::Model> = if employee_ids.is_empty() {
            HashMap::new()
        } else {
            User::find()
                .filter(user::Column::Id.is_in(employee_ids))
                .all(db)
                .await
                .map_err(ServiceError::db_error)?
                .into_iter()
                .map(|u| (u.id, u))
                .collect()
        };

        Ok(deliveries
            .into_iter()
            .map(|delivery| {
                let order = orders.get(&delivery.order_id).cloned();
                let store = order
                    .as_ref()
                    .and_then(|o| stores.get(&o.store_id))
                    .cloned();
                let employee = delivery.employee_id.and_then(|id| employees.get(&id).cloned());
                DeliveryDetails {
                    delivery,
                    order,
                    store,
                    employee,
                }
            })
            .collect())
    }

    async fn details(&self, delivery: delivery::Model) -> Result<DeliveryDetails, ServiceError> {
        self.attach(vec![delivery])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::InternalError("delivery lookup returned nothing".into()))
    }

    /// One delivery per order. Writes the first status update and an
    /// activity entry.
    #[instrument(skip(self, input), fields(order_id = %input.order_id))]
    pub async fn create_delivery(&self, input: NewDelivery) -> Result<DeliveryDetails, ServiceError> {
        let db = &*self.db_pool;
        let order = Order::find_by_id(input.order_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::BadRequest(format!("Order {} does not exist", input.order_id))
            })?;

        let existing = Delivery::find()
            .filter(delivery::Column::OrderId.eq(order.id))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "Order {} already has a delivery",
                order.order_id
            )));
        }
        if let Some(employee_id) = input.employee_id {
            self.ensure_driver(employee_id).await?;
        }

        let now = Utc::now();
        let delivery = delivery::ActiveModel {
            id: Set(Uuid::new_v4()),
            delivery_id: Set(short_reference("DEL")),
            order_id: Set(order.id),
            employee_id: Set(input.employee_id),
            status: Set(input.status.unwrap_or_default()),
            delivery_date: Set(input.delivery_date),
            delivery_time: Set(input.delivery_time),
            notes: Set(input.notes),
            has_signature: Set(false),
            signature_path: Set(None),
            lat: Set(input.lat),
            lng: Set(input.lng),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        record_status(
            db,
            &delivery,
            Some("Delivery created".to_string()),
            input.created_by,
        )
        .await?;
        record_activity(
            db,
            NewActivity::new(
                ActivityType::Delivery,
                format!("New delivery {}", delivery.delivery_id),
                format!("Delivery scheduled for order {}", order.order_id),
            )
            .reference(delivery.delivery_id.clone())
            .by(input.created_by),
        )
        .await?;

        info!(delivery_id = %delivery.delivery_id, "delivery created");
        self.details(delivery).await
    }

    #[instrument(skip(self))]
    pub async fn list_deliveries(
        &self,
        filter: DeliveryFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<DeliveryDetails>, u64), ServiceError> {
        let mut query = Delivery::find();
        if let Some(status) = filter.status {
            query = query.filter(delivery::Column::Status.eq(status));
        }
        if let Some(employee_id) = filter.employee_id {
            query = query.filter(delivery::Column::EmployeeId.eq(employee_id));
        }
        if let Some(date) = filter.delivery_date {
            query = query.filter(delivery::Column::DeliveryDate.eq(date));
        }
        if let Some(start) = filter.start_date {
            query = query.filter(delivery::Column::DeliveryDate.gte(start));
        }
        if let Some(end) = filter.end_date {
            query = query.filter(delivery::Column::DeliveryDate.lte(end));
        }

        let paginator = query
            .order_by_desc(delivery::Column::CreatedAt)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let rows = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;
        Ok((self.attach(rows).await?, total))
    }

    #[instrument(skip(self))]
    pub async fn get_delivery(&self, id: Uuid) -> Result<DeliveryDetails, ServiceError> {
        let delivery = self.find_delivery(id).await?;
        self.details(delivery).await
    }

    #[instrument(skip(self, changes))]
    pub async fn update_delivery(
        &self,
        id: Uuid,
        changes: DeliveryChanges,
        user_id: Option<Uuid>,
    ) -> Result<DeliveryDetails, ServiceError> {
        let existing = self.find_delivery(id).await?;
        if let Some(employee_id) = changes.employee_id {
            self.ensure_driver(employee_id).await?;
        }
        let previous_status = existing.status;

        let mut active: delivery::ActiveModel = existing.into();
        if changes.employee_id.is_some() {
            active.employee_id = Set(changes.employee_id);
        }
        if let Some(status) = changes.status {
            active.status = Set(status);
        }
        if let Some(date) = changes.delivery_date {
            active.delivery_date = Set(date);
        }
        if let Some(time) = changes.delivery_time {
            active.delivery_time = Set(time);
        }
        if changes.notes.is_some() {
            active.notes = Set(changes.notes);
        }
        if changes.lat.is_some() {
            active.lat = Set(changes.lat);
        }
        if changes.lng.is_some() {
            active.lng = Set(changes.lng);
        }
        let delivery = active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        self.after_status_change(&delivery, previous_status, None, user_id)
            .await?;
        self.details(delivery).await
    }

    /// Assigns any status. The trail and the completion entry follow.
    #[instrument(skip(self, notes))]
    pub async fn update_status(
        &self,
        id: Uuid,
        status: DeliveryStatus,
        notes: Option<String>,
        user_id: Option<Uuid>,
    ) -> Result<DeliveryDetails, ServiceError> {
        let existing = self.find_delivery(id).await?;
        let previous_status = existing.status;

        let delivery = if previous_status == status {
            existing
        } else {
            let mut active: delivery::ActiveModel = existing.into();
            active.status = Set(status);
            active
                .update(&*self.db_pool)
                .await
                .map_err(ServiceError::db_error)?
        };

        self.after_status_change(&delivery, previous_status, notes, user_id)
            .await?;
        self.details(delivery).await
    }

    async fn after_status_change(
        &self,
        delivery: &delivery::Model,
        previous_status: DeliveryStatus,
        notes: Option<String>,
        user_id: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        if record_status(db, delivery, notes, user_id).await? {
            info!(
                delivery_id = %delivery.delivery_id,
                from = %previous_status,
                to = %delivery.status,
                "delivery status changed"
            );
        }

        if delivery.status == DeliveryStatus::Delivered
            && previous_status != DeliveryStatus::Delivered
        {
            record_activity(
                db,
                NewActivity::new(
                    ActivityType::Delivery,
                    format!("Delivery {} completed", delivery.delivery_id),
                    format!("Delivery {} has been delivered", delivery.delivery_id),
                )
                .reference(delivery.delivery_id.clone())
                .by(user_id),
            )
            .await?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_delivery(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = Delivery::delete_by_id(id)
            .exec(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Delivery", id));
        }
        info!(delivery = %id, "delivery deleted");
        Ok(())
    }

    /// Newest first
    #[instrument(skip(self))]
    pub async fn status_updates(
        &self,
        id: Uuid,
    ) -> Result<Vec<delivery_status_update::Model>, ServiceError> {
        let delivery = self.find_delivery(id).await?;
        DeliveryStatusUpdate::find()
            .filter(delivery_status_update::Column::DeliveryId.eq(delivery.id))
            .order_by_desc(delivery_status_update::Column::UpdateTime)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Stores a PNG signature for a delivered delivery under the media root.
    #[instrument(skip(self, signature_data))]
    pub async fn upload_signature(
        &self,
        id: Uuid,
        signature_data: &str,
    ) -> Result<DeliveryDetails, ServiceError> {
        let existing = self.find_delivery(id).await?;
        if existing.status != DeliveryStatus::Delivered {
            return Err(ServiceError::BadRequest(
                "Signature can only be uploaded for delivered deliveries.".to_string(),
            ));
        }
        if signature_data.trim().is_empty() {
            return Err(ServiceError::BadRequest("No signature provided.".to_string()));
        }
        let bytes = decode_signature(signature_data)?;

        let dir = self.media_root.join(SIGNATURE_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ServiceError::StorageError(e.to_string()))?;
        let file_name = format!("signature_{}.png", Uuid::new_v4().simple());
        tokio::fs::write(dir.join(&file_name), &bytes)
            .await
            .map_err(|e| ServiceError::StorageError(e.to_string()))?;

        let mut active: delivery::ActiveModel = existing.into();
        active.has_signature = Set(true);
        active.signature_path = Set(Some(format!("{}/{}", SIGNATURE_DIR, file_name)));
        let delivery = active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        info!(delivery_id = %delivery.delivery_id, bytes = bytes.len(), "signature stored");
        self.details(delivery).await
    }

    /// Stops for one day in delivery-time order. Coordinates fall back to
    /// the store's when the delivery has none.
    #[instrument(skip(self))]
    pub async fn routes(
        &self,
        delivery_date: NaiveDate,
        employee_id: Option<Uuid>,
    ) -> Result<Vec<RouteStop>, ServiceError> {
        let mut query = Delivery::find().filter(delivery::Column::DeliveryDate.eq(delivery_date));
        if let Some(employee_id) = employee_id {
            query = query.filter(delivery::Column::EmployeeId.eq(employee_id));
        }
        let deliveries = query
            .order_by_asc(delivery::Column::DeliveryTime)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(self
            .attach(deliveries)
            .await?
            .into_iter()
            .map(|details| {
                let DeliveryDetails {
                    delivery,
                    order,
                    store,
                    ..
                } = details;
                RouteStop {
                    id: delivery.id,
                    delivery_id: delivery.delivery_id,
                    order_id: order.map(|o| o.order_id).unwrap_or_default(),
                    store_name: store.as_ref().map(|s| s.name.clone()).unwrap_or_default(),
                    address: store.as_ref().map(|s| s.location.clone()).unwrap_or_default(),
                    lat: delivery.lat.or_else(|| store.as_ref().and_then(|s| s.lat)),
                    lng: delivery.lng.or_else(|| store.as_ref().and_then(|s| s.lng)),
                    status: delivery.status,
                    delivery_time: delivery.delivery_time.format("%H:%M").to_string(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn signature_accepts_data_url_prefix() {
        let bytes = decode_signature("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn signature_accepts_bare_base64() {
        assert_eq!(decode_signature("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn empty_payload_after_prefix_is_rejected() {
        assert_matches!(
            decode_signature("data:image/png;base64,"),
            Err(ServiceError::BadRequest(msg)) if msg == "No signature provided."
        );
    }

    #[test]
    fn garbage_is_reported_as_processing_error() {
        assert_matches!(
            decode_signature("not base64!!"),
            Err(ServiceError::BadRequest(msg)) if msg.starts_with("Error processing signature:")
        );
    }
}
