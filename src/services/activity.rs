use crate::{
    db::DbPool,
    entities::recent_activity::{self, ActivityType, Entity as RecentActivity},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, QueryOrder, QuerySelect, Set};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Entry to append to the activity feed.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub activity_type: ActivityType,
    pub title: String,
    pub description: String,
    pub reference_id: Option<String>,
    pub user_id: Option<Uuid>,
}

impl NewActivity {
    pub fn new(
        activity_type: ActivityType,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            activity_type,
            title: title.into(),
            description: description.into(),
            reference_id: None,
            user_id: None,
        }
    }

    pub fn reference(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn by(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }
}

/// Appends to the feed on any connection, so callers inside a transaction
/// record the activity atomically with their own writes.
pub async fn record_activity<C>(
    db: &C,
    activity: NewActivity,
) -> Result<recent_activity::Model, ServiceError>
where
    C: ConnectionTrait,
{
    debug!(title = %activity.title, "recording activity");
    recent_activity::ActiveModel {
        id: Set(Uuid::new_v4()),
        activity_type: Set(activity.activity_type),
        title: Set(activity.title),
        description: Set(activity.description),
        reference_id: Set(activity.reference_id),
        user_id: Set(activity.user_id),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .map_err(ServiceError::db_error)
}

/// Read side of the activity feed
#[derive(Clone)]
pub struct ActivityService {
    db_pool: Arc<DbPool>,
}

impl ActivityService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Most recent entries first
    #[instrument(skip(self))]
    pub async fn recent(&self, limit: u64) -> Result<Vec<recent_activity::Model>, ServiceError> {
        RecentActivity::find()
            .order_by_desc(recent_activity::Column::CreatedAt)
            .limit(limit)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}
