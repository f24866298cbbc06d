use crate::{
    auth::{hash_password, verify_password},
    db::DbPool,
    entities::{
        recent_activity::ActivityType,
        user::{self, Entity as User, UserRole, UserStatus},
        user_profile::{self, Entity as UserProfile},
    },
    errors::ServiceError,
    services::activity::{record_activity, NewActivity},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// The authenticated user a write is performed on behalf of.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub is_admin: bool,
}

impl Actor {
    fn ensure_self_or_admin(&self, target: Uuid) -> Result<(), ServiceError> {
        if self.is_admin || self.id == target {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "You can only modify your own account".to_string(),
            ))
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub status: Option<UserStatus>,
    pub role: Option<UserRole>,
    pub search: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

pub type UserRecord = (user::Model, Option<user_profile::Model>);

async fn create_profile<C>(db: &C, user_id: Uuid) -> Result<user_profile::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    user_profile::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        avatar: Set(None),
        bio: Set(None),
        address: Set(None),
        birth_date: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .map_err(ServiceError::db_error)
}

fn status_fields(status: UserStatus) -> (UserStatus, bool) {
    (status, status == UserStatus::Active)
}

/// Accounts and their profiles
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    async fn find_user(&self, id: Uuid) -> Result<user::Model, ServiceError> {
        User::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("User", id))
    }

    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        filter: UserFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<user::Model>, u64), ServiceError> {
        let mut query = User::find();
        if let Some(status) = filter.status {
            query = query.filter(user::Column::Status.eq(status));
        }
        if let Some(role) = filter.role {
            query = query.filter(user::Column::Role.eq(role));
        }
        if let Some(term) = filter.search.filter(|s| !s.trim().is_empty()) {
            let term = term.trim().to_string();
            query = query.filter(
                Condition::any()
                    .add(user::Column::Username.contains(&term))
                    .add(user::Column::FirstName.contains(&term))
                    .add(user::Column::LastName.contains(&term))
                    .add(user::Column::Email.contains(&term)),
            );
        }

        let paginator = query
            .order_by_asc(user::Column::Username)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let users = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;
        Ok((users, total))
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: Uuid) -> Result<UserRecord, ServiceError> {
        User::find_by_id(id)
            .find_also_related(UserProfile)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("User", id))
    }

    /// Creates the account with an empty profile.
    #[instrument(skip(self, new_user), fields(username = %new_user.username))]
    pub async fn create_user(
        &self,
        new_user: NewUser,
        created_by: Option<Uuid>,
    ) -> Result<UserRecord, ServiceError> {
        let db = &*self.db_pool;
        let taken = User::find()
            .filter(user::Column::Username.eq(new_user.username.as_str()))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!(
                "Username {} is already taken",
                new_user.username
            )));
        }

        let password_hash = hash_password(&new_user.password)
            .map_err(|e| ServiceError::HashError(e.to_string()))?;
        let now = Utc::now();
        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(new_user.username),
            email: Set(new_user.email),
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            phone_number: Set(new_user.phone_number),
            role: Set(new_user.role),
            status: Set(UserStatus::Active),
            password_hash: Set(password_hash),
            is_active: Set(true),
            date_joined: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;
        let profile = create_profile(db, user.id).await?;

        record_activity(
            db,
            NewActivity::new(
                ActivityType::User,
                format!("New user {}", user.username),
                format!("{} joined as {}", user.full_name(), user.role),
            )
            .reference(user.id.to_string())
            .by(created_by),
        )
        .await?;

        info!(user = %user.id, role = %user.role, "user created");
        Ok((user, Some(profile)))
    }

    /// Role and status changes are reserved to admins.
    #[instrument(skip(self, changes))]
    pub async fn update_user(
        &self,
        id: Uuid,
        changes: UserChanges,
        actor: Actor,
    ) -> Result<UserRecord, ServiceError> {
        actor.ensure_self_or_admin(id)?;
        if !actor.is_admin && (changes.role.is_some() || changes.status.is_some()) {
            return Err(ServiceError::Forbidden(
                "Only administrators can change role or status".to_string(),
            ));
        }

        let mut active: user::ActiveModel = self.find_user(id).await?.into();
        if let Some(first_name) = changes.first_name {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = changes.last_name {
            active.last_name = Set(last_name);
        }
        if let Some(email) = changes.email {
            active.email = Set(email);
        }
        if changes.phone_number.is_some() {
            active.phone_number = Set(changes.phone_number);
        }
        if let Some(role) = changes.role {
            active.role = Set(role);
        }
        if let Some(status) = changes.status {
            let (status, is_active) = status_fields(status);
            active.status = Set(status);
            active.is_active = Set(is_active);
        }
        active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        self.get_user(id).await
    }

    /// Soft delete: the account is archived and can no longer sign in.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: Uuid, actor: Actor) -> Result<(), ServiceError> {
        actor.ensure_self_or_admin(id)?;
        self.set_archived(id, true).await?;
        warn!(user = %id, by = %actor.id, "user deactivated");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_archived(&self, id: Uuid, archive: bool) -> Result<UserRecord, ServiceError> {
        let (status, is_active) = status_fields(if archive {
            UserStatus::Archived
        } else {
            UserStatus::Active
        });
        let mut active: user::ActiveModel = self.find_user(id).await?.into();
        active.status = Set(status);
        active.is_active = Set(is_active);
        active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        info!(user = %id, archived = archive, "user archive state changed");
        self.get_user(id).await
    }

    /// The caller's account; a missing profile is created on first access.
    #[instrument(skip(self))]
    pub async fn profile(&self, user_id: Uuid) -> Result<(user::Model, user_profile::Model), ServiceError> {
        let (user, profile) = self.get_user(user_id).await?;
        let profile = match profile {
            Some(profile) => profile,
            None => create_profile(&*self.db_pool, user.id).await?,
        };
        Ok((user, profile))
    }

    #[instrument(skip(self, changes))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        changes: ProfileChanges,
    ) -> Result<(user::Model, user_profile::Model), ServiceError> {
        let (user, profile) = self.profile(user_id).await?;

        let mut active: user_profile::ActiveModel = profile.into();
        if changes.avatar.is_some() {
            active.avatar = Set(changes.avatar);
        }
        if changes.bio.is_some() {
            active.bio = Set(changes.bio);
        }
        if changes.address.is_some() {
            active.address = Set(changes.address);
        }
        if changes.birth_date.is_some() {
            active.birth_date = Set(changes.birth_date);
        }
        let profile = active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        Ok((user, profile))
    }

    #[instrument(skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let user = self.find_user(user_id).await?;
        if !verify_password(old_password, &user.password_hash) {
            return Err(ServiceError::BadRequest("Old password is incorrect".to_string()));
        }

        let password_hash =
            hash_password(new_password).map_err(|e| ServiceError::HashError(e.to_string()))?;
        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(password_hash);
        active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        info!(user = %user_id, "password changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn non_admin_cannot_touch_other_accounts() {
        let me = Uuid::new_v4();
        let actor = Actor {
            id: me,
            is_admin: false,
        };
        assert!(actor.ensure_self_or_admin(me).is_ok());
        assert_matches!(
            actor.ensure_self_or_admin(Uuid::new_v4()),
            Err(ServiceError::Forbidden(_))
        );
    }

    #[test]
    fn admin_can_touch_any_account() {
        let actor = Actor {
            id: Uuid::new_v4(),
            is_admin: true,
        };
        assert!(actor.ensure_self_or_admin(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn archived_status_deactivates() {
        assert_eq!(status_fields(UserStatus::Archived), (UserStatus::Archived, false));
        assert_eq!(status_fields(UserStatus::Active), (UserStatus::Active, true));
    }
}
