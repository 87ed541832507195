//! In-memory record store
//!
//! [`InMemoryRecordStore`] keeps the four relations in plain collections and
//! reproduces the behaviour tests rely on: unique ticket ids and codes,
//! conditional activation, `ON CONFLICT DO NOTHING` links, price-descending
//! product listing and newest-first code listing.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only follows a panicking test

use boxoffice_core::environment::Clock;
use boxoffice_core::error::DeskError;
use boxoffice_core::ports::{PortFuture, RecordStore};
use boxoffice_core::types::{
    DEFAULT_PRODUCTS, DiscountCode, DiscountCodeId, DiscountPercent, Money, NewTicket, Product,
    ProductId, Ticket, TicketId,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct Tables {
    products: Vec<Product>,
    codes: Vec<DiscountCode>,
    links: BTreeSet<(DiscountCodeId, ProductId)>,
    tickets: HashMap<TicketId, Ticket>,
    next_product_id: i32,
    next_code_id: i32,
}

impl Tables {
    fn insert_product(&mut self, name: &str, description: &str, price: Money, active: bool) -> Product {
        self.next_product_id += 1;
        let product = Product {
            id: ProductId::new(self.next_product_id),
            name: name.to_owned(),
            description: description.to_owned(),
            price,
            active,
        };
        self.products.push(product.clone());
        product
    }

    fn seed(&mut self) {
        for seed in DEFAULT_PRODUCTS {
            if !self.products.iter().any(|p| p.name == seed.name) {
                self.insert_product(seed.name, seed.description, seed.price, true);
            }
        }
    }

    fn code_products(&self, id: DiscountCodeId) -> Vec<String> {
        self.links
            .iter()
            .filter(|(code, _)| *code == id)
            .filter_map(|(_, product)| self.products.iter().find(|p| p.id == *product))
            .map(|p| p.name.clone())
            .collect()
    }
}

/// Record store backed by in-process collections.
///
/// Cloning shares the same tables, so a test can keep a handle for
/// inspection while the dispatcher owns another.
#[derive(Clone)]
pub struct InMemoryRecordStore {
    tables: Arc<RwLock<Tables>>,
    clock: Arc<dyn Clock>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryRecordStore {
    /// Empty store (no products)
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            clock,
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Store holding the default tiers (`VIP`, `STANDART`, `1+1`)
    #[must_use]
    pub fn seeded(clock: Arc<dyn Clock>) -> Self {
        let store = Self::new(clock);
        store.tables.write().unwrap().seed();
        store
    }

    /// Adds a product directly
    pub fn add_product(&self, name: &str, description: &str, price: Money, active: bool) -> Product {
        self.tables
            .write()
            .unwrap()
            .insert_product(name, description, price, active)
    }

    /// Adds a discount code directly
    pub fn add_discount_code(&self, code: &str, percent: DiscountPercent, active: bool) -> DiscountCode {
        let mut tables = self.tables.write().unwrap();
        tables.next_code_id += 1;
        let created = DiscountCode {
            id: DiscountCodeId::new(tables.next_code_id),
            code: code.to_owned(),
            percent,
            active,
            products: Vec::new(),
        };
        tables.codes.push(created.clone());
        created
    }

    /// Inserts a ticket row as-is (for lookup and activation tests)
    pub fn put_ticket(&self, ticket: Ticket) {
        self.tables
            .write()
            .unwrap()
            .tickets
            .insert(ticket.id.clone(), ticket);
    }

    /// Makes every subsequent call fail with a persistence error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Product by name (synchronous, for assertions)
    #[must_use]
    pub fn product(&self, name: &str) -> Option<Product> {
        self.tables
            .read()
            .unwrap()
            .products
            .iter()
            .find(|p| p.name == name)
            .cloned()
    }

    /// Discount code by code (synchronous, for assertions)
    #[must_use]
    pub fn discount_code(&self, code: &str) -> Option<DiscountCode> {
        let tables = self.tables.read().unwrap();
        tables.codes.iter().find(|c| c.code == code).map(|c| DiscountCode {
            products: tables.code_products(c.id),
            ..c.clone()
        })
    }

    /// Number of association rows for a code
    #[must_use]
    pub fn link_count(&self, id: DiscountCodeId) -> usize {
        self.tables
            .read()
            .unwrap()
            .links
            .iter()
            .filter(|(code, _)| *code == id)
            .count()
    }

    /// Ticket by id (synchronous, for assertions)
    #[must_use]
    pub fn ticket(&self, id: &str) -> Option<Ticket> {
        self.tables
            .read()
            .unwrap()
            .tickets
            .get(&TicketId::from_stored(id.to_owned()))
            .cloned()
    }

    /// All tickets
    #[must_use]
    pub fn tickets(&self) -> Vec<Ticket> {
        self.tables.read().unwrap().tickets.values().cloned().collect()
    }

    fn check(&self) -> Result<(), DeskError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(DeskError::Persistence("record store unavailable".into()))
        } else {
            Ok(())
        }
    }

    /// Runs `f` against the tables inside a boxed future
    fn with_tables<T, F>(&self, f: F) -> PortFuture<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Tables, &dyn Clock) -> Result<T, DeskError> + Send + 'static,
    {
        let store = self.clone();
        Box::pin(async move {
            store.check()?;
            let mut tables = store.tables.write().unwrap();
            f(&mut tables, store.clock.as_ref())
        })
    }
}

impl RecordStore for InMemoryRecordStore {
    fn ensure_schema(&self) -> PortFuture<()> {
        self.with_tables(|tables, _| {
            tables.seed();
            Ok(())
        })
    }

    fn active_products(&self) -> PortFuture<Vec<Product>> {
        self.with_tables(|tables, _| {
            let mut products: Vec<Product> =
                tables.products.iter().filter(|p| p.active).cloned().collect();
            products.sort_by(|a, b| b.price.cmp(&a.price));
            Ok(products)
        })
    }

    fn product_by_name(&self, name: String) -> PortFuture<Option<Product>> {
        self.with_tables(move |tables, _| Ok(tables.products.iter().find(|p| p.name == name).cloned()))
    }

    fn product_by_id(&self, id: ProductId) -> PortFuture<Option<Product>> {
        self.with_tables(move |tables, _| Ok(tables.products.iter().find(|p| p.id == id).cloned()))
    }

    fn update_product_price(&self, name: String, price: Money) -> PortFuture<bool> {
        self.with_tables(move |tables, _| {
            Ok(tables
                .products
                .iter_mut()
                .find(|p| p.name == name)
                .map(|p| p.price = price)
                .is_some())
        })
    }

    fn find_discount_code(&self, code: String) -> PortFuture<Option<DiscountCode>> {
        self.with_tables(move |tables, _| {
            Ok(tables.codes.iter().find(|c| c.code == code).map(|c| DiscountCode {
                products: tables.code_products(c.id),
                ..c.clone()
            }))
        })
    }

    fn list_discount_codes(&self) -> PortFuture<Vec<DiscountCode>> {
        self.with_tables(|tables, _| {
            let mut codes = tables.codes.clone();
            codes.sort_by(|a, b| b.id.cmp(&a.id));
            Ok(codes)
        })
    }

    fn insert_discount_code(&self, code: String, percent: DiscountPercent) -> PortFuture<DiscountCode> {
        self.with_tables(move |tables, _| {
            if tables.codes.iter().any(|c| c.code == code) {
                return Err(DeskError::AlreadyExists(format!("discount code {code}")));
            }
            tables.next_code_id += 1;
            let created = DiscountCode {
                id: DiscountCodeId::new(tables.next_code_id),
                code,
                percent,
                active: true,
                products: Vec::new(),
            };
            tables.codes.push(created.clone());
            Ok(created)
        })
    }

    fn set_discount_code_active(&self, id: DiscountCodeId, active: bool) -> PortFuture<bool> {
        self.with_tables(move |tables, _| {
            Ok(tables
                .codes
                .iter_mut()
                .find(|c| c.id == id)
                .map(|c| c.active = active)
                .is_some())
        })
    }

    fn discount_code_products(&self, id: DiscountCodeId) -> PortFuture<Vec<ProductId>> {
        self.with_tables(move |tables, _| {
            Ok(tables
                .links
                .iter()
                .filter(|(code, _)| *code == id)
                .map(|(_, product)| *product)
                .collect())
        })
    }

    fn add_discount_code_product(&self, id: DiscountCodeId, product: ProductId) -> PortFuture<()> {
        self.with_tables(move |tables, _| {
            tables.links.insert((id, product));
            Ok(())
        })
    }

    fn remove_discount_code_product(&self, id: DiscountCodeId, product: ProductId) -> PortFuture<()> {
        self.with_tables(move |tables, _| {
            tables.links.remove(&(id, product));
            Ok(())
        })
    }

    fn insert_ticket(&self, ticket: NewTicket) -> PortFuture<Ticket> {
        self.with_tables(move |tables, clock| {
            if tables.tickets.contains_key(&ticket.id) {
                return Err(DeskError::AlreadyExists(format!("ticket {}", ticket.id)));
            }
            let stored = Ticket {
                id: ticket.id,
                product_name: ticket.product_name,
                buyer_name: ticket.buyer_name,
                buyer_email: ticket.buyer_email,
                buyer_chat: Some(ticket.buyer_chat),
                final_price: ticket.final_price,
                active: false,
                purchased_at: clock.now(),
            };
            tables.tickets.insert(stored.id.clone(), stored.clone());
            Ok(stored)
        })
    }

    fn find_ticket(&self, id: TicketId) -> PortFuture<Option<Ticket>> {
        self.with_tables(move |tables, _| Ok(tables.tickets.get(&id).cloned()))
    }

    fn activate_ticket(&self, id: TicketId) -> PortFuture<bool> {
        self.with_tables(move |tables, _| match tables.tickets.get_mut(&id) {
            Some(ticket) if !ticket.active => {
                ticket.active = true;
                Ok(true)
            },
            _ => Ok(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_clock;
    use boxoffice_core::types::ChatId;

    fn store() -> InMemoryRecordStore {
        InMemoryRecordStore::seeded(Arc::new(test_clock()))
    }

    fn new_ticket(id: &str) -> NewTicket {
        NewTicket {
            id: TicketId::from_stored(id.to_owned()),
            product_name: "VIP".into(),
            buyer_name: "Alex Ivanov".into(),
            buyer_email: "alex@example.com".into(),
            buyer_chat: ChatId::new(42),
            final_price: Money::new(15000),
        }
    }

    #[tokio::test]
    async fn products_are_listed_by_price_descending() {
        let store = store();
        store.add_product("HIDDEN", "", Money::new(99_999), false);

        let names: Vec<String> = store
            .active_products()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();

        assert_eq!(names, vec!["VIP", "1+1", "STANDART"]);
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let store = store();
        store.ensure_schema().await.unwrap();
        store.ensure_schema().await.unwrap();

        assert_eq!(store.active_products().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn duplicate_ticket_ids_are_rejected() {
        let store = store();
        store.insert_ticket(new_ticket("AAAAAAAAAAAA")).await.unwrap();

        let second = store.insert_ticket(new_ticket("AAAAAAAAAAAA")).await;

        assert!(matches!(second, Err(DeskError::AlreadyExists(_))));
        assert_eq!(store.tickets().len(), 1);
    }

    #[tokio::test]
    async fn activation_is_monotonic() {
        let store = store();
        let ticket = store.insert_ticket(new_ticket("BBBBBBBBBBBB")).await.unwrap();
        assert!(!ticket.active);

        assert!(store.activate_ticket(ticket.id.clone()).await.unwrap());
        assert!(!store.activate_ticket(ticket.id.clone()).await.unwrap());
        assert!(store.ticket("BBBBBBBBBBBB").unwrap().active);
    }

    #[tokio::test]
    async fn links_never_duplicate() {
        let store = store();
        let code = store
            .insert_discount_code("SALE15".into(), DiscountPercent::new(15).unwrap())
            .await
            .unwrap();
        let vip = store.product("VIP").unwrap().id;

        store.add_discount_code_product(code.id, vip).await.unwrap();
        store.add_discount_code_product(code.id, vip).await.unwrap();
        assert_eq!(store.link_count(code.id), 1);
        assert_eq!(store.discount_code("SALE15").unwrap().products, vec!["VIP"]);

        store.remove_discount_code_product(code.id, vip).await.unwrap();
        store.remove_discount_code_product(code.id, vip).await.unwrap();
        assert_eq!(store.link_count(code.id), 0);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = store();
        store.set_unavailable(true);

        let result = store.active_products().await;

        assert!(matches!(result, Err(DeskError::Persistence(_))));
    }
}
