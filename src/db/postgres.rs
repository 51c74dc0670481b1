use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{Bool, Text};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use super::models::{
    relationship::{NewRelationship, Relationship},
    user::{NewUser, User},
};
use super::store::{EdgeFilter, EdgeStore, EdgeTx, InsertOutcome, PairKey, UserLookup};
use crate::db_config::Pool;
use crate::errors::{ConfigError, RelationshipError, StoreError};
use crate::relationships::model::{EdgeKey, RelationshipEdge, SignIn, UserId, UserProfile};
use crate::schema::{relationships, users};

use log::*;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

type EdgePredicate = Box<dyn BoxableExpression<relationships::table, Pg, SqlType = Bool>>;

/// PostgreSQL store on top of an r2d2 pool. Diesel is blocking, so every
/// call is moved onto tokio's blocking threads.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        PgStore { pool }
    }

    pub fn run_migrations(&self) -> Result<usize, ConfigError> {
        let mut pooled = self.pool.get()?;
        let connection: &mut PgConnection = &mut pooled;
        let applied = connection
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| ConfigError::Migration(e.to_string()))?;
        for version in &applied {
            info!("Applied migration {}", version);
        }
        Ok(applied.len())
    }

    pub async fn test_connection(&self) -> Result<(), StoreError> {
        self.with_connection(|connection| {
            diesel::sql_query("SELECT 1;").execute(connection)?;
            Ok(())
        })
        .await
    }

    async fn with_connection<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut pooled = pool.get()?;
            let connection: &mut PgConnection = &mut pooled;
            f(connection)
        })
        .await?
    }
}

fn predicate(filter: &EdgeFilter) -> EdgePredicate {
    use crate::schema::relationships::dsl as r;

    match filter {
        EdgeFilter::Exact(key) => Box::new(
            r::sender_id
                .eq(key.sender_id.to_string())
                .and(r::receiver_id.eq(key.receiver_id.to_string()))
                .and(r::relationship_type.eq(key.edge_type.as_str())),
        ),
        EdgeFilter::Between { a, b, edge_type } => {
            let (a, b) = (a.to_string(), b.to_string());
            let pair = r::sender_id
                .eq(a.clone())
                .and(r::receiver_id.eq(b.clone()))
                .or(r::sender_id.eq(b).and(r::receiver_id.eq(a)));
            match edge_type {
                Some(edge_type) => Box::new(pair.and(r::relationship_type.eq(edge_type.as_str()))),
                None => Box::new(pair),
            }
        }
        EdgeFilter::Touching(user) => {
            let user = user.to_string();
            Box::new(r::sender_id.eq(user.clone()).or(r::receiver_id.eq(user)))
        }
    }
}

fn load_edges(connection: &mut PgConnection, filter: &EdgeFilter) -> Result<Vec<RelationshipEdge>, StoreError> {
    relationships::table
        .filter(predicate(filter))
        .select(Relationship::as_select())
        .load::<Relationship>(connection)?
        .into_iter()
        .map(RelationshipEdge::try_from)
        .collect()
}

/// Serializes every transaction on the same pair until commit or rollback.
fn lock_pair(connection: &mut PgConnection, pair: &PairKey) -> QueryResult<()> {
    diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1));")
        .bind::<Text, _>(pair.lock_name())
        .execute(connection)?;
    Ok(())
}

struct PgTx<'a> {
    connection: &'a mut PgConnection,
}

impl EdgeTx for PgTx<'_> {
    fn insert_edge(&mut self, key: &EdgeKey) -> Result<InsertOutcome, StoreError> {
        let new_relationship = NewRelationship::from(key);
        let inserted = diesel::insert_into(relationships::table)
            .values(&new_relationship)
            .on_conflict_do_nothing()
            .execute(self.connection);
        match inserted {
            Ok(0) => Ok(InsertOutcome::AlreadyExists),
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Ok(InsertOutcome::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_edges(&mut self, filter: &EdgeFilter) -> Result<usize, StoreError> {
        Ok(diesel::delete(relationships::table)
            .filter(predicate(filter))
            .execute(self.connection)?)
    }

    fn select_edges(&mut self, filter: &EdgeFilter) -> Result<Vec<RelationshipEdge>, StoreError> {
        load_edges(self.connection, filter)
    }
}

#[async_trait]
impl EdgeStore for PgStore {
    async fn select_edges(&self, filter: EdgeFilter) -> Result<Vec<RelationshipEdge>, StoreError> {
        self.with_connection(move |connection| load_edges(connection, &filter)).await
    }

    async fn transaction<T, F>(&self, pair: PairKey, body: F) -> Result<T, RelationshipError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn EdgeTx) -> Result<T, RelationshipError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut pooled = pool.get().map_err(StoreError::from)?;
            let connection: &mut PgConnection = &mut pooled;
            connection.transaction::<T, RelationshipError, _>(|connection| {
                lock_pair(connection, &pair)?;
                let tx: &mut dyn EdgeTx = &mut PgTx { connection };
                body(tx)
            })
        })
        .await
        .map_err(StoreError::from)?
    }
}

#[async_trait]
impl UserLookup for PgStore {
    async fn get_user(&self, id: &UserId) -> Result<Option<UserProfile>, StoreError> {
        let id = id.to_string();
        self.with_connection(move |connection| {
            Ok(users::table
                .find(id)
                .select(User::as_select())
                .first::<User>(connection)
                .optional()?
                .map(UserProfile::from))
        })
        .await
    }

    async fn find_user(&self, id_or_email: &str) -> Result<Option<UserProfile>, StoreError> {
        let key = id_or_email.to_owned();
        self.with_connection(move |connection| {
            Ok(users::table
                .filter(users::id.eq(&key).or(users::email.eq(&key)))
                .select(User::as_select())
                .first::<User>(connection)
                .optional()?
                .map(UserProfile::from))
        })
        .await
    }

    async fn users_by_ids(&self, ids: &[UserId]) -> Result<Vec<UserProfile>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = ids.iter().map(UserId::to_string).collect();
        self.with_connection(move |connection| {
            Ok(users::table
                .filter(users::id.eq_any(ids))
                .select(User::as_select())
                .load::<User>(connection)?
                .into_iter()
                .map(UserProfile::from)
                .collect())
        })
        .await
    }

    async fn save_user(&self, sign_in: SignIn) -> Result<UserProfile, StoreError> {
        self.with_connection(move |connection| {
            let now = Utc::now();
            let new_user = NewUser {
                id: sign_in.id.to_string(),
                email: sign_in.email,
                username: sign_in.username,
                last_login_at: Some(now),
            };
            let user = diesel::insert_into(users::table)
                .values(&new_user)
                .on_conflict(users::id)
                .do_update()
                .set((users::email.eq(&new_user.email), users::last_login_at.eq(Some(now))))
                .returning(User::as_returning())
                .get_result::<User>(connection)?;
            debug!("Synced user {}", user.id);
            Ok(user.into())
        })
        .await
    }
}
