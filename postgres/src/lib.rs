//! `PostgreSQL` record store for the Boxoffice ticket desk.
//!
//! [`PostgresRecordStore`] implements the `RecordStore` port from
//! `boxoffice-core` over sqlx. Every call is request-scoped: it opens its own
//! connection, runs its statements and closes the connection again. There is
//! no pool and no transaction outlives a call, so nothing is held open while a
//! conversation waits for the user's next message.
//!
//! # Example
//!
//! ```ignore
//! use boxoffice_postgres::PostgresRecordStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let records = PostgresRecordStore::new("postgres://localhost/boxoffice", Duration::from_secs(5));
//!     records.ensure_schema().await?;
//!     Ok(())
//! }
//! ```

use boxoffice_core::error::{DeskError, Result};
use boxoffice_core::ports::{PortFuture, RecordStore};
use boxoffice_core::types::{
    DiscountCode, DiscountCodeId, DiscountPercent, Money, NewTicket, Product, ProductId, Ticket,
    TicketId,
};
use sqlx::{Connection, PgConnection};
use std::sync::Arc;
use std::time::Duration;

mod queries;

/// Record store that opens one connection per call.
#[derive(Clone)]
pub struct PostgresRecordStore {
    url: Arc<str>,
    connect_timeout: Duration,
}

impl PostgresRecordStore {
    /// Creates a store for `url`; no connection is made until the first call.
    #[must_use]
    pub fn new(url: &str, connect_timeout: Duration) -> Self {
        Self {
            url: Arc::from(url),
            connect_timeout,
        }
    }

    async fn connect(&self) -> Result<PgConnection> {
        match tokio::time::timeout(self.connect_timeout, PgConnection::connect(&self.url)).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => {
                metrics::counter!("record_store.connections.failed").increment(1);
                tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                Err(DeskError::Persistence(format!("Failed to connect: {e}")))
            },
            Err(_) => {
                metrics::counter!("record_store.connections.failed").increment(1);
                tracing::error!(
                    timeout_secs = self.connect_timeout.as_secs(),
                    "Timed out connecting to PostgreSQL"
                );
                Err(DeskError::Persistence("Timed out connecting".into()))
            },
        }
    }

    async fn close(conn: PgConnection) {
        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "Failed to close connection cleanly");
        }
    }
}

/// Opens a connection, runs one query function against it and closes it.
macro_rules! per_call {
    ($store:expr, $conn:ident => $body:expr) => {{
        let store = $store.clone();
        Box::pin(async move {
            let mut $conn = store.connect().await?;
            let result = $body.await;
            PostgresRecordStore::close($conn).await;
            result
        })
    }};
}

impl RecordStore for PostgresRecordStore {
    fn ensure_schema(&self) -> PortFuture<()> {
        per_call!(self, conn => queries::ensure_schema(&mut conn))
    }

    fn active_products(&self) -> PortFuture<Vec<Product>> {
        per_call!(self, conn => queries::active_products(&mut conn))
    }

    fn product_by_name(&self, name: String) -> PortFuture<Option<Product>> {
        per_call!(self, conn => queries::product_by_name(&mut conn, &name))
    }

    fn product_by_id(&self, id: ProductId) -> PortFuture<Option<Product>> {
        per_call!(self, conn => queries::product_by_id(&mut conn, id))
    }

    fn update_product_price(&self, name: String, price: Money) -> PortFuture<bool> {
        per_call!(self, conn => queries::update_product_price(&mut conn, &name, price))
    }

    fn find_discount_code(&self, code: String) -> PortFuture<Option<DiscountCode>> {
        per_call!(self, conn => queries::find_discount_code(&mut conn, &code))
    }

    fn list_discount_codes(&self) -> PortFuture<Vec<DiscountCode>> {
        per_call!(self, conn => queries::list_discount_codes(&mut conn))
    }

    fn insert_discount_code(&self, code: String, percent: DiscountPercent) -> PortFuture<DiscountCode> {
        per_call!(self, conn => queries::insert_discount_code(&mut conn, &code, percent))
    }

    fn set_discount_code_active(&self, id: DiscountCodeId, active: bool) -> PortFuture<bool> {
        per_call!(self, conn => queries::set_discount_code_active(&mut conn, id, active))
    }

    fn discount_code_products(&self, id: DiscountCodeId) -> PortFuture<Vec<ProductId>> {
        per_call!(self, conn => queries::discount_code_products(&mut conn, id))
    }

    fn add_discount_code_product(&self, id: DiscountCodeId, product: ProductId) -> PortFuture<()> {
        per_call!(self, conn => queries::add_discount_code_product(&mut conn, id, product))
    }

    fn remove_discount_code_product(&self, id: DiscountCodeId, product: ProductId) -> PortFuture<()> {
        per_call!(self, conn => queries::remove_discount_code_product(&mut conn, id, product))
    }

    fn insert_ticket(&self, ticket: NewTicket) -> PortFuture<Ticket> {
        per_call!(self, conn => queries::insert_ticket(&mut conn, ticket))
    }

    fn find_ticket(&self, id: TicketId) -> PortFuture<Option<Ticket>> {
        per_call!(self, conn => queries::find_ticket(&mut conn, &id))
    }

    fn activate_ticket(&self, id: TicketId) -> PortFuture<bool> {
        per_call!(self, conn => queries::activate_ticket(&mut conn, &id))
    }
}
