//! PostgreSQL principal store.
//!
//! Sessions are embedded in the principal row as JSONB so one statement saves
//! the whole document. The `version` column carries the optimistic check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool};

use crate::models::session::SessionList;
use crate::models::user::{LoginKey, Principal, PrincipalUpdate, UserRole};
use crate::repositories::principal::{PrincipalStore, StoreError, StoreResult};
use crate::types::UserId;

const PRINCIPAL_COLUMNS: &str = "id, email, mobile, password_hash, full_name, role, sessions, \
     version, created_at, updated_at";

#[derive(Debug, FromRow)]
struct PrincipalRow {
    id: UserId,
    email: Option<String>,
    mobile: Option<String>,
    password_hash: Option<String>,
    full_name: String,
    role: String,
    sessions: Json<SessionList>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PrincipalRow> for Principal {
    type Error = StoreError;

    fn try_from(row: PrincipalRow) -> Result<Self, Self::Error> {
        let role = UserRole::parse(&row.role).ok_or_else(|| {
            StoreError::Backend(anyhow::anyhow!("Unknown role stored for principal {}", row.id))
        })?;
        Ok(Principal {
            id: row.id,
            email: row.email,
            mobile: row.mobile,
            password_hash: row.password_hash,
            full_name: row.full_name,
            role,
            sessions: row.sessions.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct PgPrincipalStore {
    pool: PgPool,
}

impl PgPrincipalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some(constraint) if constraint.contains("mobile") => "mobile",
                Some(constraint) if constraint.contains("email") => "email",
                _ => "unique key",
            };
            return StoreError::Duplicate(field.to_string());
        }
    }
    StoreError::Backend(err.into())
}

#[async_trait]
impl PrincipalStore for PgPrincipalStore {
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<Principal>> {
        let query = format!("SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE id = $1");
        sqlx::query_as::<_, PrincipalRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .map(Principal::try_from)
            .transpose()
    }

    async fn find_by_unique_key(&self, key: &LoginKey) -> StoreResult<Option<Principal>> {
        let (column, value) = match key {
            LoginKey::Email(email) => ("email", email),
            LoginKey::Mobile(mobile) => ("mobile", mobile),
        };
        let query = format!("SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE {column} = $1");
        sqlx::query_as::<_, PrincipalRow>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .map(Principal::try_from)
            .transpose()
    }

    async fn save(&self, principal: &Principal) -> StoreResult<Principal> {
        // Version 0 is a first write; anything else must match the stored row.
        let (query, first_write) = if principal.version == 0 {
            let query = format!(
                r#"
                INSERT INTO principals
                    (id, email, mobile, password_hash, full_name, role, sessions, version, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8 + 1, $9, NOW())
                ON CONFLICT (id) DO NOTHING
                RETURNING {PRINCIPAL_COLUMNS}
                "#
            );
            (query, true)
        } else {
            let query = format!(
                r#"
                UPDATE principals
                SET email = $2,
                    mobile = $3,
                    password_hash = $4,
                    full_name = $5,
                    role = $6,
                    sessions = $7,
                    version = version + 1,
                    updated_at = NOW()
                WHERE id = $1 AND version = $8
                RETURNING {PRINCIPAL_COLUMNS}
                "#
            );
            (query, false)
        };

        let mut statement = sqlx::query_as::<_, PrincipalRow>(&query)
            .bind(principal.id)
            .bind(&principal.email)
            .bind(&principal.mobile)
            .bind(&principal.password_hash)
            .bind(&principal.full_name)
            .bind(principal.role.as_str())
            .bind(Json(&principal.sessions))
            .bind(principal.version);
        if first_write {
            statement = statement.bind(principal.created_at);
        }

        // No row back means the id is taken, missing, or at another version.
        let row = statement
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(StoreError::Conflict)?;

        Principal::try_from(row)
    }

    async fn update_fields(
        &self,
        id: UserId,
        update: PrincipalUpdate,
    ) -> StoreResult<Option<Principal>> {
        let query = format!(
            r#"
            UPDATE principals
            SET full_name = COALESCE($2, full_name),
                role = COALESCE($3, role),
                password_hash = COALESCE($4, password_hash),
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRINCIPAL_COLUMNS}
            "#
        );
        sqlx::query_as::<_, PrincipalRow>(&query)
            .bind(id)
            .bind(update.full_name)
            .bind(update.role.map(|role| role.as_str()))
            .bind(update.password_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .map(Principal::try_from)
            .transpose()
    }

    async fn list(&self, limit: i64, offset: i64) -> StoreResult<(Vec<Principal>, i64)> {
        let query = format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM principals ORDER BY created_at, id LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, PrincipalRow>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM principals")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let principals = rows
            .into_iter()
            .map(Principal::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((principals, total))
    }
}
