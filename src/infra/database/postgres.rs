//! PostgreSQL-backed `PaymentRepository` (§6 "Payment repository").

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use tracing::{info, instrument};

use crate::domain::{Payment, PaymentError, PaymentKind, PaymentRepository, PaymentStatus};

/// PostgreSQL connection pool configuration.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub async fn new(database_url: &str, config: PostgresConfig) -> Result<Self, PaymentError> {
        info!("connecting to postgres");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| PaymentError::DatabaseError {
                message: e.to_string(),
            })?;
        info!("connected to postgres");
        Ok(Self { pool })
    }

    pub async fn with_defaults(database_url: &str) -> Result<Self, PaymentError> {
        Self::new(database_url, PostgresConfig::default()).await
    }

    pub async fn run_migrations(&self) -> Result<(), PaymentError> {
        info!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PaymentError::DatabaseError {
                message: e.to_string(),
            })?;
        info!("database migrations completed");
        Ok(())
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_payment(row: &sqlx::postgres::PgRow) -> Result<Payment, PaymentError> {
        let reference: String = row.get("reference");
        let recipient: String = row.get("recipient");
        let token_mint: Option<String> = row.get("token_mint");
        let kind_str: String = row.get("kind");
        let status_str: String = row.get("status");
        let email: Option<String> = row.get("customer_email");

        Ok(Payment {
            reference: reference.parse().map_err(|_| PaymentError::DatabaseError {
                message: format!("malformed reference pubkey in row: {reference}"),
            })?,
            merchant_id: row.get("merchant_id"),
            customer: crate::domain::CustomerContact { email },
            kind: kind_str.parse().map_err(|e: String| PaymentError::DatabaseError { message: e })?,
            token_mint: token_mint
                .map(|s| s.parse())
                .transpose()
                .map_err(|_| PaymentError::DatabaseError {
                    message: "malformed token_mint pubkey in row".into(),
                })?,
            amount: row.get("amount"),
            recipient: recipient.parse().map_err(|_| PaymentError::DatabaseError {
                message: format!("malformed recipient pubkey in row: {recipient}"),
            })?,
            status: status_str.parse().map_err(|e: String| PaymentError::DatabaseError { message: e })?,
            signature: row.get("signature"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    #[instrument(skip(self))]
    async fn list_pending(&self, limit: i64) -> Result<Vec<Payment>, PaymentError> {
        let rows = sqlx::query(
            r#"
            SELECT reference, merchant_id, customer_email, kind, token_mint, amount,
                   recipient, status, signature, created_at, updated_at
            FROM payments
            WHERE status = 'pending'
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PaymentError::DatabaseError {
            message: e.to_string(),
        })?;

        rows.iter().map(Self::row_to_payment).collect()
    }

    /// The sole concurrency primitive for the confirm step (§4.8, §5): the
    /// `WHERE status = 'pending'` clause is what makes two concurrent
    /// monitor instances race safely — only one `UPDATE` matches a row.
    #[instrument(skip(self))]
    async fn confirm_if_pending(
        &self,
        reference: &solana_sdk::pubkey::Pubkey,
        signature: &str,
    ) -> Result<Option<Payment>, PaymentError> {
        let row = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'confirmed', signature = $1, updated_at = NOW()
            WHERE reference = $2 AND status = 'pending'
            RETURNING reference, merchant_id, customer_email, kind, token_mint, amount,
                      recipient, status, signature, created_at, updated_at
            "#,
        )
        .bind(signature)
        .bind(reference.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PaymentError::DatabaseError {
            message: e.to_string(),
        })?;

        row.as_ref().map(Self::row_to_payment).transpose()
    }

    #[instrument(skip(self))]
    async fn mark_failed(&self, reference: &solana_sdk::pubkey::Pubkey) -> Result<Payment, PaymentError> {
        let row = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'failed', updated_at = NOW()
            WHERE reference = $1
            RETURNING reference, merchant_id, customer_email, kind, token_mint, amount,
                      recipient, status, signature, created_at, updated_at
            "#,
        )
        .bind(reference.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PaymentError::DatabaseError {
            message: e.to_string(),
        })?;

        Self::row_to_payment(&row)
    }

    #[instrument(skip(self))]
    async fn get(&self, reference: &solana_sdk::pubkey::Pubkey) -> Result<Option<Payment>, PaymentError> {
        let row = sqlx::query(
            r#"
            SELECT reference, merchant_id, customer_email, kind, token_mint, amount,
                   recipient, status, signature, created_at, updated_at
            FROM payments
            WHERE reference = $1
            "#,
        )
        .bind(reference.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PaymentError::DatabaseError {
            message: e.to_string(),
        })?;

        row.as_ref().map(Self::row_to_payment).transpose()
    }

    #[instrument(skip(self))]
    async fn record_transaction(
        &self,
        reference: &solana_sdk::pubkey::Pubkey,
        signature: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), PaymentError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (reference, signature, confirmed_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (reference, signature) DO NOTHING
            "#,
        )
        .bind(reference.to_string())
        .bind(signature)
        .bind(timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| PaymentError::DatabaseError {
            message: e.to_string(),
        })?;

        Ok(())
    }
}
