//! # PostgreSQL Backend
//!
//! Class records live in `classes`; feedback entries in `emotions`, keyed by
//! a `BIGSERIAL` id that fixes insertion order. Schema lives in `migrations/`
//! and is applied on connect.
//!
//! ## Two-phase create
//!
//! `create_class` first reserves a code by inserting a row with `{}` metadata,
//! retrying on unique violation, then writes the real metadata with an
//! `UPDATE`. The primary key settles races between concurrent creators without
//! holding a lock across the sampling loop.
//!
//! If the process dies between the phases, or the `UPDATE` fails, the code
//! stays allocated with empty metadata. Nothing cleans it up; it is simply
//! never handed out again. A failed second phase is reported to the caller as
//! a creation failure.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::code::{ClassCode, CodeGenerator};
use super::config::PostgresConfig;
use super::errors::{StoreError, StoreResult};
use super::record::{ClassState, EmotionEntry, Payload};
use super::ClassStore;

/// Socket directory used when neither the URL nor the settings name a host
pub const DEFAULT_SOCKET_DIR: &str = "/var/run/postgresql";

/// Class store backed by PostgreSQL
#[derive(Debug)]
pub struct PostgresClassStore {
    pool: PgPool,
    generator: CodeGenerator,
    emotion_limit: usize,
    clock: Arc<dyn Clock>,
}

/// Row shape for `classes`
#[derive(Debug, FromRow)]
struct DbClass {
    pin: String,
    created_at: DateTime<Utc>,
    metadata: Json<Payload>,
    last_sensor: Option<Json<Payload>>,
    last_sensor_at: Option<DateTime<Utc>>,
}

/// Row shape for `emotions`
#[derive(Debug, FromRow)]
struct DbEmotion {
    received_at: DateTime<Utc>,
    payload: Json<Payload>,
}

impl PostgresClassStore {
    /// Connect, apply migrations and return a ready store.
    pub async fn connect(pg: &PostgresConfig, emotion_limit: usize) -> StoreResult<Self> {
        let pool = Self::open_pool(pg).await?;
        let store = Self::from_pool(pool, emotion_limit, Arc::new(SystemClock));
        store.run_migrations().await?;

        info!(
            max_connections = pg.max_connections,
            emotion_limit, "connected to postgres"
        );
        Ok(store)
    }

    /// Wrap an existing pool without touching the schema
    pub fn from_pool(pool: PgPool, emotion_limit: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            generator: CodeGenerator::for_postgres(),
            emotion_limit: emotion_limit.max(1),
            clock,
        }
    }

    /// Build the connection pool. The URL is never logged.
    pub async fn open_pool(pg: &PostgresConfig) -> StoreResult<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .acquire_timeout(Duration::from_millis(pg.acquire_timeout_ms))
            .connect_with(Self::connect_options(pg)?)
            .await?;
        Ok(pool)
    }

    /// Translate settings into driver options.
    ///
    /// A host in the URL always wins. Only a host-less URL such as
    /// `postgres://user@:5432/db` picks up `pg.host`, falling back to
    /// [`DEFAULT_SOCKET_DIR`]. A value starting with `/` is a socket directory.
    pub fn connect_options(pg: &PostgresConfig) -> StoreResult<PgConnectOptions> {
        let mut options = match with_placeholder_host(&pg.url) {
            None => {
                if pg.host.is_some() {
                    debug!("connection URL names a host, ignoring host setting");
                }
                PgConnectOptions::from_str(&pg.url)?
            }
            Some(url) => {
                let options = PgConnectOptions::from_str(&url)?;
                if has_host_param(&url) {
                    options
                } else {
                    let host = pg.host.as_deref().unwrap_or(DEFAULT_SOCKET_DIR);
                    if host.starts_with('/') {
                        options.socket(host)
                    } else {
                        options.host(host)
                    }
                }
            }
        };

        if let Some(ssl) = pg.ssl {
            options = options.ssl_mode(if ssl {
                PgSslMode::Require
            } else {
                PgSslMode::Disable
            });
        }

        Ok(options)
    }

    /// Apply pending schema migrations
    pub async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn emotion_limit(&self) -> usize {
        self.emotion_limit
    }

    /// Phase one: claim `code` with placeholder metadata.
    /// Returns `false` when another class already holds it.
    async fn try_reserve(&self, code: &ClassCode) -> StoreResult<bool> {
        let insert = sqlx::query("INSERT INTO classes (pin, created_at, metadata) VALUES ($1, $2, $3)")
            .bind(code.as_str())
            .bind(self.clock.now())
            .bind(Json(Payload::empty()))
            .execute(&self.pool)
            .await;

        match insert {
            Ok(_) => Ok(true),
            Err(err) if is_unique_violation(&err) => {
                debug!(code = %code, "class code already taken");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl ClassStore for PostgresClassStore {
    async fn create_class(&self, metadata: Payload) -> StoreResult<ClassCode> {
        let code = self
            .generator
            .reserve_with(|code| async move { self.try_reserve(&code).await })
            .await?;

        // Phase two
        if !metadata.is_empty_object() {
            let update = sqlx::query("UPDATE classes SET metadata = $1 WHERE pin = $2")
                .bind(Json(&metadata))
                .bind(code.as_str())
                .execute(&self.pool)
                .await;

            if let Err(err) = update {
                warn!(code = %code, error = %err, "class code reserved but metadata write failed");
                return Err(err.into());
            }
        }

        info!(code = %code, "class created");
        Ok(code)
    }

    async fn upsert_sensor(&self, code: &ClassCode, payload: Payload) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE classes SET last_sensor = $1, last_sensor_at = $2 WHERE pin = $3")
                .bind(Json(&payload))
                .bind(self.clock.now())
                .bind(code.as_str())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ClassNotFound(code.to_string()));
        }

        debug!(code = %code, "sensor reading stored");
        Ok(())
    }

    async fn add_emotion(&self, code: &ClassCode, payload: Payload) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let insert = sqlx::query("INSERT INTO emotions (pin, received_at, payload) VALUES ($1, $2, $3)")
            .bind(code.as_str())
            .bind(self.clock.now())
            .bind(Json(&payload))
            .execute(&mut *tx)
            .await;
        if let Err(err) = insert {
            if is_foreign_key_violation(&err) {
                return Err(StoreError::ClassNotFound(code.to_string()));
            }
            return Err(err.into());
        }

        // Drop everything older than the newest `emotion_limit` rows. The row
        // just inserted has the highest id, so it always survives.
        let trimmed = sqlx::query(
            r#"
            DELETE FROM emotions
            WHERE pin = $1
              AND id <= (
                  SELECT id FROM emotions
                  WHERE pin = $1
                  ORDER BY id DESC
                  OFFSET $2 LIMIT 1
              )
            "#,
        )
        .bind(code.as_str())
        .bind(sql_limit(self.emotion_limit))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(code = %code, evicted = trimmed.rows_affected(), "emotion recorded");
        Ok(())
    }

    async fn get_state(&self, code: &ClassCode) -> StoreResult<ClassState> {
        let row = sqlx::query_as::<_, DbClass>(
            "SELECT pin, created_at, metadata, last_sensor, last_sensor_at FROM classes WHERE pin = $1",
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::ClassNotFound(code.to_string()))?;

        let mut emotions = sqlx::query_as::<_, DbEmotion>(
            "SELECT received_at, payload FROM emotions WHERE pin = $1 ORDER BY id DESC LIMIT $2",
        )
        .bind(code.as_str())
        .bind(sql_limit(self.emotion_limit))
        .fetch_all(&self.pool)
        .await?;
        emotions.reverse();

        let code = ClassCode::parse(&row.pin)
            .map_err(|e| StoreError::Backend(format!("corrupt class row: {}", e)))?;

        Ok(ClassState {
            code,
            created_at: row.created_at,
            metadata: row.metadata.0,
            last_sensor: row.last_sensor.map(|j| j.0),
            last_sensor_at: row.last_sensor_at,
            emotion_log: emotions
                .into_iter()
                .map(|e| EmotionEntry {
                    received_at: e.received_at,
                    payload: e.payload.0,
                })
                .collect(),
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

/// For a URL whose authority has no host, the same URL with `localhost`
/// spliced in so the driver can parse it. `None` when the URL has a host or
/// is not in `scheme://` form.
fn with_placeholder_host(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let authority_end = rest.find(|c: char| matches!(c, '/' | '?' | '#')).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);

    let (userinfo, host_port) = match authority.rfind('@') {
        Some(at) => authority.split_at(at + 1),
        None => ("", authority),
    };
    if !host_port.split(':').next().unwrap_or_default().is_empty() {
        return None;
    }

    Some(format!("{}://{}localhost{}{}", scheme, userinfo, host_port, tail))
}

/// Row count as a SQL `LIMIT`/`OFFSET` parameter
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Whether the query string sets `host` itself
fn has_host_param(url: &str) -> bool {
    url.split_once('?')
        .map(|(_, query)| query.split('&').any(|pair| pair.starts_with("host=")))
        .unwrap_or(false)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    has_sqlstate(err, "23505")
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    has_sqlstate(err, "23503")
}

fn has_sqlstate(err: &sqlx::Error, state: &str) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|code| code == state).unwrap_or(false);
    }
    false
}
