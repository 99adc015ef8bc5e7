//! tokio-postgres implementation of the session seam.
//!
//! # Responsibilities
//! - Open connections with a bounded end-to-end deadline
//! - Drive the connection task in the background
//! - Map driver errors into the crate's session error taxonomy

use async_trait::async_trait;
use std::time::Duration;
use tokio_postgres::NoTls;

use crate::connect::{Connect, DbSession, RowObject};
use crate::error::SessionError;
use crate::pool::ConnectionDescriptor;

/// Production connector backed by tokio-postgres.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgConnector;

#[async_trait]
impl Connect for PgConnector {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        timeout: Duration,
    ) -> Result<Box<dyn DbSession>, SessionError> {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&descriptor.host)
            .port(descriptor.port)
            .dbname(&descriptor.database)
            .user(&descriptor.user)
            .password(&descriptor.password)
            .connect_timeout(timeout);

        let (client, connection) = tokio::time::timeout(timeout, pg.connect(NoTls))
            .await
            .map_err(|_| SessionError::Timeout(timeout))?
            .map_err(|e| SessionError::Unreachable {
                addr: descriptor.addr(),
                message: e.to_string(),
            })?;

        // The connection future performs the actual socket I/O; it resolves
        // once the client is dropped.
        let addr = descriptor.addr();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(addr = %addr, error = %e, "connection task ended with error");
            }
        });

        Ok(Box::new(PgSession { client }))
    }
}

/// A single live PostgreSQL session.
pub struct PgSession {
    client: tokio_postgres::Client,
}

#[async_trait]
impl DbSession for PgSession {
    async fn ping(&mut self) -> Result<(), SessionError> {
        self.client
            .batch_execute("SELECT 1")
            .await
            .map_err(|e| map_query_error(&self.client, e))
    }

    async fn fetch_table(
        &mut self,
        table: &str,
        order_by: &str,
    ) -> Result<Vec<RowObject>, SessionError> {
        // Tables carry different column sets, so the row is read back as a
        // single json value instead of per-column typed gets.
        let statement = format!(
            "SELECT row_to_json(t) FROM {} t ORDER BY {} ASC",
            quote_ident(table)?,
            quote_ident(order_by)?
        );

        let rows = self
            .client
            .query(&statement, &[])
            .await
            .map_err(|e| map_query_error(&self.client, e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let value: serde_json::Value = row
                .try_get(0)
                .map_err(|e| SessionError::Query(e.to_string()))?;
            match value {
                serde_json::Value::Object(object) => out.push(object),
                other => {
                    return Err(SessionError::Query(format!(
                        "expected a json object per row, got {}",
                        other
                    )))
                }
            }
        }
        Ok(out)
    }
}

fn map_query_error(client: &tokio_postgres::Client, e: tokio_postgres::Error) -> SessionError {
    if client.is_closed() {
        SessionError::Broken(e.to_string())
    } else {
        SessionError::Query(e.to_string())
    }
}

/// Quote an SQL identifier. Table and order-key names come from configuration,
/// never from request input, but they are still quoted rather than spliced.
fn quote_ident(name: &str) -> Result<String, SessionError> {
    if name.is_empty() {
        return Err(SessionError::Query("empty identifier".to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}
