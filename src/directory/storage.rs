use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::core::shared::schema::users;
use crate::core::shared::utils::DbPool;
use crate::security::Role;

use super::error::DirectoryError;
use super::types::User;

/// Account persistence. `insert` and `save` reject a username or email
/// that already belongs to another account.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_all(&self) -> Result<Vec<User>, DirectoryError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError>;
    async fn find_by_role(&self, role: Role) -> Result<Vec<User>, DirectoryError>;
    async fn insert(&self, user: User) -> Result<User, DirectoryError>;
    async fn save(&self, user: User) -> Result<User, DirectoryError>;
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, DirectoryError>;
}

#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_unique(map: &HashMap<Uuid, User>, user: &User) -> Result<(), DirectoryError> {
        for other in map.values().filter(|u| u.id != user.id) {
            if other.email == user.email {
                return Err(DirectoryError::Duplicate("Email".into()));
            }
            if other.username == user.username {
                return Err(DirectoryError::Duplicate("Username".into()));
            }
        }
        Ok(())
    }
}

fn sorted_by_creation(mut users: Vec<User>) -> Vec<User> {
    users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    users
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_all(&self) -> Result<Vec<User>, DirectoryError> {
        let users = self.users.read().await;
        Ok(sorted_by_creation(users.values().cloned().collect()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_role(&self, role: Role) -> Result<Vec<User>, DirectoryError> {
        let users = self.users.read().await;
        Ok(sorted_by_creation(
            users.values().filter(|u| u.role == role).cloned().collect(),
        ))
    }

    async fn insert(&self, user: User) -> Result<User, DirectoryError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(DirectoryError::Duplicate("User id".into()));
        }
        Self::check_unique(&users, &user)?;
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn save(&self, user: User) -> Result<User, DirectoryError> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(DirectoryError::NotFound("User not found".into()));
        }
        Self::check_unique(&users, &user)?;
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, DirectoryError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = users)]
pub struct DbUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for DbUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role.as_str().to_string(),
            is_active: user.is_active,
            last_login: user.last_login,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl TryFrom<DbUser> for User {
    type Error = DirectoryError;

    fn try_from(row: DbUser) -> Result<Self, Self::Error> {
        let role = row.role.parse::<Role>().map_err(|e| {
            warn!("User {} has unreadable role: {e}", row.id);
            DirectoryError::Storage(e)
        })?;
        Ok(Self {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role,
            is_active: row.is_active,
            last_login: row.last_login,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn map_db_error(err: DieselError) -> DirectoryError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            let field = match info.constraint_name() {
                Some(name) if name.contains("username") => "Username",
                Some(name) if name.contains("email") => "Email",
                _ => "Value",
            };
            DirectoryError::Duplicate(field.into())
        }
        other => DirectoryError::Storage(other.to_string()),
    }
}

fn rows_to_users(rows: Vec<DbUser>) -> Result<Vec<User>, DirectoryError> {
    rows.into_iter().map(User::try_from).collect()
}

pub struct PgUserStore {
    pool: DbPool,
}

impl PgUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, f: F) -> Result<T, DirectoryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> Result<T, DirectoryError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| DirectoryError::Storage(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e: tokio::task::JoinError| DirectoryError::Storage(e.to_string()))?
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_all(&self) -> Result<Vec<User>, DirectoryError> {
        self.run(|conn| {
            let rows: Vec<DbUser> = users::table
                .order(users::created_at.asc())
                .select(DbUser::as_select())
                .load(conn)
                .map_err(map_db_error)?;
            rows_to_users(rows)
        })
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError> {
        self.run(move |conn| {
            users::table
                .find(id)
                .select(DbUser::as_select())
                .first::<DbUser>(conn)
                .optional()
                .map_err(map_db_error)?
                .map(User::try_from)
                .transpose()
        })
        .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        let email = email.to_string();
        self.run(move |conn| {
            users::table
                .filter(users::email.eq(email))
                .select(DbUser::as_select())
                .first::<DbUser>(conn)
                .optional()
                .map_err(map_db_error)?
                .map(User::try_from)
                .transpose()
        })
        .await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError> {
        let username = username.to_string();
        self.run(move |conn| {
            users::table
                .filter(users::username.eq(username))
                .select(DbUser::as_select())
                .first::<DbUser>(conn)
                .optional()
                .map_err(map_db_error)?
                .map(User::try_from)
                .transpose()
        })
        .await
    }

    async fn find_by_role(&self, role: Role) -> Result<Vec<User>, DirectoryError> {
        self.run(move |conn| {
            let rows: Vec<DbUser> = users::table
                .filter(users::role.eq(role.as_str()))
                .order(users::created_at.asc())
                .select(DbUser::as_select())
                .load(conn)
                .map_err(map_db_error)?;
            rows_to_users(rows)
        })
        .await
    }

    async fn insert(&self, user: User) -> Result<User, DirectoryError> {
        let row = DbUser::from(&user);
        self.run(move |conn| {
            diesel::insert_into(users::table)
                .values(&row)
                .execute(conn)
                .map_err(map_db_error)?;
            Ok(user)
        })
        .await
    }

    async fn save(&self, user: User) -> Result<User, DirectoryError> {
        let row = DbUser::from(&user);
        self.run(move |conn| {
            let updated = diesel::update(users::table.find(row.id))
                .set(&row)
                .execute(conn)
                .map_err(map_db_error)?;
            if updated == 0 {
                return Err(DirectoryError::NotFound("User not found".into()));
            }
            Ok(user)
        })
        .await
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, DirectoryError> {
        self.run(move |conn| {
            let deleted = diesel::delete(users::table.find(id))
                .execute(conn)
                .map_err(map_db_error)?;
            Ok(deleted > 0)
        })
        .await
    }
}
