//! SQL statements, one function per record store operation.

use boxoffice_core::error::{DeskError, Result};
use boxoffice_core::types::{
    ChatId, DEFAULT_PRODUCTS, DiscountCode, DiscountCodeId, DiscountPercent, Money, NewTicket,
    Product, ProductId, Ticket, TicketId,
};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

const CREATE_PRODUCTS: &str = r"
    CREATE TABLE IF NOT EXISTS products (
        id SERIAL PRIMARY KEY,
        name VARCHAR(50) UNIQUE NOT NULL,
        description TEXT,
        price INTEGER NOT NULL CHECK (price >= 0),
        is_active BOOLEAN NOT NULL DEFAULT TRUE
    )
";

const CREATE_TICKETS: &str = r"
    CREATE TABLE IF NOT EXISTS tickets (
        ticket_id VARCHAR(50) PRIMARY KEY,
        product_name VARCHAR(50) NOT NULL,
        buyer_name VARCHAR(100) NOT NULL,
        buyer_email VARCHAR(100) NOT NULL,
        buyer_chat_id BIGINT NOT NULL,
        final_price INTEGER NOT NULL CHECK (final_price >= 0),
        is_active BOOLEAN NOT NULL DEFAULT FALSE,
        purchase_date TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
";

const CREATE_PROMOCODES: &str = r"
    CREATE TABLE IF NOT EXISTS promocodes (
        id SERIAL PRIMARY KEY,
        code VARCHAR(50) UNIQUE NOT NULL,
        discount_percent INTEGER NOT NULL CHECK (discount_percent BETWEEN 1 AND 99),
        is_active BOOLEAN NOT NULL DEFAULT TRUE
    )
";

const CREATE_PROMOCODE_PRODUCTS: &str = r"
    CREATE TABLE IF NOT EXISTS promocode_products (
        promocode_id INTEGER NOT NULL REFERENCES promocodes(id) ON DELETE CASCADE,
        product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        PRIMARY KEY (promocode_id, product_id)
    )
";

type ProductRow = (i32, String, Option<String>, i32, bool);
type CodeRow = (i32, String, i32, bool);
type TicketRow = (String, String, String, String, Option<i64>, i32, bool, DateTime<Utc>);

fn storage(context: &str) -> impl FnOnce(sqlx::Error) -> DeskError + '_ {
    move |e| DeskError::Persistence(format!("Failed to {context}: {e}"))
}

fn money_from_column(value: i32) -> Result<Money> {
    u64::try_from(value)
        .map(Money::new)
        .map_err(|_| DeskError::Persistence(format!("negative amount in storage: {value}")))
}

fn money_to_column(value: Money) -> Result<i32> {
    i32::try_from(value.amount())
        .map_err(|_| DeskError::Validation(format!("amount too large: {}", value.amount())))
}

fn product_from_row((id, name, description, price, active): ProductRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(id),
        name,
        description: description.unwrap_or_default(),
        price: money_from_column(price)?,
        active,
    })
}

fn code_from_row((id, code, percent, active): CodeRow, products: Vec<String>) -> Result<DiscountCode> {
    let percent = DiscountPercent::new(i64::from(percent))
        .map_err(|_| DeskError::Persistence(format!("invalid percent stored for {code}: {percent}")))?;
    Ok(DiscountCode {
        id: DiscountCodeId::new(id),
        code,
        percent,
        active,
        products,
    })
}

fn ticket_from_row(row: TicketRow) -> Result<Ticket> {
    let (id, product_name, buyer_name, buyer_email, buyer_chat, final_price, active, purchased_at) = row;
    Ok(Ticket {
        id: TicketId::from_stored(id),
        product_name,
        buyer_name,
        buyer_email,
        buyer_chat: buyer_chat.map(ChatId::new),
        final_price: money_from_column(final_price)?,
        active,
        purchased_at,
    })
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub async fn ensure_schema(conn: &mut PgConnection) -> Result<()> {
    for statement in [CREATE_PRODUCTS, CREATE_TICKETS, CREATE_PROMOCODES, CREATE_PROMOCODE_PRODUCTS] {
        sqlx::query(statement)
            .execute(&mut *conn)
            .await
            .map_err(storage("create tables"))?;
    }

    for seed in DEFAULT_PRODUCTS {
        let inserted = sqlx::query(
            "INSERT INTO products (name, description, price) VALUES ($1, $2, $3)
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(seed.name)
        .bind(seed.description)
        .bind(money_to_column(seed.price)?)
        .execute(&mut *conn)
        .await
        .map_err(storage("seed products"))?;

        if inserted.rows_affected() > 0 {
            tracing::info!(product = seed.name, "Seeded product");
        }
    }

    Ok(())
}

pub async fn active_products(conn: &mut PgConnection) -> Result<Vec<Product>> {
    let rows: Vec<ProductRow> = sqlx::query_as(
        "SELECT id, name, description, price, is_active FROM products
         WHERE is_active = TRUE ORDER BY price DESC",
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(storage("list products"))?;

    rows.into_iter().map(product_from_row).collect()
}

pub async fn product_by_name(conn: &mut PgConnection, name: &str) -> Result<Option<Product>> {
    let row: Option<ProductRow> = sqlx::query_as(
        "SELECT id, name, description, price, is_active FROM products WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(&mut *conn)
    .await
    .map_err(storage("query product"))?;

    row.map(product_from_row).transpose()
}

pub async fn product_by_id(conn: &mut PgConnection, id: ProductId) -> Result<Option<Product>> {
    let row: Option<ProductRow> = sqlx::query_as(
        "SELECT id, name, description, price, is_active FROM products WHERE id = $1",
    )
    .bind(id.get())
    .fetch_optional(&mut *conn)
    .await
    .map_err(storage("query product"))?;

    row.map(product_from_row).transpose()
}

pub async fn update_product_price(conn: &mut PgConnection, name: &str, price: Money) -> Result<bool> {
    let updated = sqlx::query("UPDATE products SET price = $1 WHERE name = $2")
        .bind(money_to_column(price)?)
        .bind(name)
        .execute(&mut *conn)
        .await
        .map_err(storage("update price"))?;

    Ok(updated.rows_affected() > 0)
}

pub async fn find_discount_code(conn: &mut PgConnection, code: &str) -> Result<Option<DiscountCode>> {
    let row: Option<CodeRow> = sqlx::query_as(
        "SELECT id, code, discount_percent, is_active FROM promocodes WHERE code = $1",
    )
    .bind(code)
    .fetch_optional(&mut *conn)
    .await
    .map_err(storage("query discount code"))?;

    let Some(row) = row else {
        return Ok(None);
    };

    let products: Vec<(String,)> = sqlx::query_as(
        "SELECT p.name FROM promocode_products pp
         JOIN products p ON p.id = pp.product_id
         WHERE pp.promocode_id = $1 ORDER BY p.name",
    )
    .bind(row.0)
    .fetch_all(&mut *conn)
    .await
    .map_err(storage("query discount code products"))?;

    code_from_row(row, products.into_iter().map(|(name,)| name).collect()).map(Some)
}

pub async fn list_discount_codes(conn: &mut PgConnection) -> Result<Vec<DiscountCode>> {
    let rows: Vec<CodeRow> = sqlx::query_as(
        "SELECT id, code, discount_percent, is_active FROM promocodes ORDER BY id DESC",
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(storage("list discount codes"))?;

    rows.into_iter().map(|row| code_from_row(row, Vec::new())).collect()
}

pub async fn insert_discount_code(
    conn: &mut PgConnection,
    code: &str,
    percent: DiscountPercent,
) -> Result<DiscountCode> {
    let row: CodeRow = sqlx::query_as(
        "INSERT INTO promocodes (code, discount_percent) VALUES ($1, $2)
         RETURNING id, code, discount_percent, is_active",
    )
    .bind(code)
    .bind(i32::from(percent.get()))
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            DeskError::AlreadyExists(format!("discount code {code}"))
        } else {
            DeskError::Persistence(format!("Failed to insert discount code: {e}"))
        }
    })?;

    code_from_row(row, Vec::new())
}

pub async fn set_discount_code_active(
    conn: &mut PgConnection,
    id: DiscountCodeId,
    active: bool,
) -> Result<bool> {
    let updated = sqlx::query("UPDATE promocodes SET is_active = $1 WHERE id = $2")
        .bind(active)
        .bind(id.get())
        .execute(&mut *conn)
        .await
        .map_err(storage("update discount code"))?;

    Ok(updated.rows_affected() > 0)
}

pub async fn discount_code_products(conn: &mut PgConnection, id: DiscountCodeId) -> Result<Vec<ProductId>> {
    let rows: Vec<(i32,)> =
        sqlx::query_as("SELECT product_id FROM promocode_products WHERE promocode_id = $1")
            .bind(id.get())
            .fetch_all(&mut *conn)
            .await
            .map_err(storage("query discount code products"))?;

    Ok(rows.into_iter().map(|(product,)| ProductId::new(product)).collect())
}

pub async fn add_discount_code_product(
    conn: &mut PgConnection,
    id: DiscountCodeId,
    product: ProductId,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO promocode_products (promocode_id, product_id) VALUES ($1, $2)
         ON CONFLICT DO NOTHING",
    )
    .bind(id.get())
    .bind(product.get())
    .execute(&mut *conn)
    .await
    .map_err(storage("link product"))?;

    Ok(())
}

pub async fn remove_discount_code_product(
    conn: &mut PgConnection,
    id: DiscountCodeId,
    product: ProductId,
) -> Result<()> {
    sqlx::query("DELETE FROM promocode_products WHERE promocode_id = $1 AND product_id = $2")
        .bind(id.get())
        .bind(product.get())
        .execute(&mut *conn)
        .await
        .map_err(storage("unlink product"))?;

    Ok(())
}

pub async fn insert_ticket(conn: &mut PgConnection, ticket: NewTicket) -> Result<Ticket> {
    let (purchased_at,): (DateTime<Utc>,) = sqlx::query_as(
        "INSERT INTO tickets
            (ticket_id, product_name, buyer_name, buyer_email, buyer_chat_id, final_price, is_active)
         VALUES ($1, $2, $3, $4, $5, $6, FALSE)
         RETURNING purchase_date",
    )
    .bind(ticket.id.as_str())
    .bind(&ticket.product_name)
    .bind(&ticket.buyer_name)
    .bind(&ticket.buyer_email)
    .bind(ticket.buyer_chat.get())
    .bind(money_to_column(ticket.final_price)?)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            DeskError::AlreadyExists(format!("ticket {}", ticket.id))
        } else {
            DeskError::Persistence(format!("Failed to insert ticket: {e}"))
        }
    })?;

    Ok(Ticket {
        id: ticket.id,
        product_name: ticket.product_name,
        buyer_name: ticket.buyer_name,
        buyer_email: ticket.buyer_email,
        buyer_chat: Some(ticket.buyer_chat),
        final_price: ticket.final_price,
        active: false,
        purchased_at,
    })
}

pub async fn find_ticket(conn: &mut PgConnection, id: &TicketId) -> Result<Option<Ticket>> {
    let row: Option<TicketRow> = sqlx::query_as(
        "SELECT ticket_id, product_name, buyer_name, buyer_email, buyer_chat_id,
                final_price, is_active, purchase_date
         FROM tickets WHERE ticket_id = $1",
    )
    .bind(id.as_str())
    .fetch_optional(&mut *conn)
    .await
    .map_err(storage("query ticket"))?;

    row.map(ticket_from_row).transpose()
}

pub async fn activate_ticket(conn: &mut PgConnection, id: &TicketId) -> Result<bool> {
    let updated =
        sqlx::query("UPDATE tickets SET is_active = TRUE WHERE ticket_id = $1 AND is_active = FALSE")
            .bind(id.as_str())
            .execute(&mut *conn)
            .await
            .map_err(storage("activate ticket"))?;

    Ok(updated.rows_affected() == 1)
}
