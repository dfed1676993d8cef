//! In-process store.
//!
//! All tables sit behind one async mutex, so every operation (including the
//! multi-step ones) is trivially atomic. Intended for tests and local runs
//! without `PostgreSQL`; the API contract is identical to [`super::PgStore`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use storekeep_core::{
    AddressId, Email, OrderId, OrderLineId, OrderStatus, ProductId, SessionId, UserId,
};

use super::{
    AddressStore, OrderStore, ProductStore, RepositoryError, SessionStore, Store, UserStore,
};
use crate::models::{
    Address, NewAddress, NewOrder, NewProduct, NewUser, Order, OrderLine, Product, Session, User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, (User, String)>,
    products: HashMap<ProductId, Product>,
    addresses: HashMap<AddressId, Address>,
    orders: HashMap<OrderId, Order>,
    // Insertion order doubles as line position.
    lines: Vec<OrderLine>,
    sessions: HashMap<SessionId, Session>,
}

impl Tables {
    fn email_taken(&self, email: &Email, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|(u, _)| &u.email == email && Some(u.id) != except)
    }

    fn sku_taken(&self, sku: &str, except: Option<ProductId>) -> bool {
        self.products
            .values()
            .any(|p| p.sku == sku && Some(p.id) != except)
    }
}

/// Mutex-guarded in-memory implementation of every store trait.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut t = self.tables.lock().await;
        if t.email_taken(&user.email, None) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let created = User {
            id: UserId::new_v4(),
            email: user.email,
            name: user.name,
            is_admin: user.is_admin,
            created_at: Utc::now(),
        };
        t.users
            .insert(created.id, (created.clone(), user.password_hash));
        Ok(created)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let t = self.tables.lock().await;
        Ok(t.users.get(&id).map(|(u, _)| u.clone()))
    }

    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let t = self.tables.lock().await;
        Ok(t.users
            .values()
            .find(|(u, _)| &u.email == email)
            .map(|(u, _)| u.clone()))
    }

    async fn get_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let t = self.tables.lock().await;
        Ok(t.users.values().find(|(u, _)| &u.email == email).cloned())
    }

    async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let t = self.tables.lock().await;
        Ok(t.users.get(&id).map(|(_, hash)| hash.clone()))
    }

    async fn set_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let mut t = self.tables.lock().await;
        let (_, hash) = t.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        password_hash.clone_into(hash);
        Ok(())
    }

    async fn update_user(
        &self,
        id: UserId,
        name: &str,
        email: &Email,
    ) -> Result<User, RepositoryError> {
        let mut t = self.tables.lock().await;
        if t.email_taken(email, Some(id)) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let (user, _) = t.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        name.clone_into(&mut user.name);
        user.email = email.clone();
        Ok(user.clone())
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, RepositoryError> {
        let mut t = self.tables.lock().await;
        let Some((user, _)) = t.users.remove(&id) else {
            return Ok(false);
        };
        for session in t.sessions.values_mut().filter(|s| s.email == user.email) {
            session.is_revoked = true;
        }
        let owned: Vec<OrderId> = t
            .orders
            .values()
            .filter(|o| o.user_id == id)
            .map(|o| o.id)
            .collect();
        t.orders.retain(|_, o| o.user_id != id);
        t.lines.retain(|l| !owned.contains(&l.order_id));
        t.addresses.retain(|_, a| a.user_id != id);
        Ok(true)
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        let t = self.tables.lock().await;
        let mut users: Vec<User> = t.users.values().map(|(u, _)| u.clone()).collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }
}

impl ProductStore for MemoryStore {
    async fn create_product(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let mut t = self.tables.lock().await;
        if t.sku_taken(&product.sku, None) {
            return Err(RepositoryError::Conflict("sku already exists".to_owned()));
        }
        let created = Product {
            id: ProductId::new_v4(),
            sku: product.sku,
            name: product.name,
            description: product.description,
            price: product.price,
            stock_quantity: product.stock_quantity,
            active: product.active,
            created_at: Utc::now(),
        };
        t.products.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let t = self.tables.lock().await;
        Ok(t.products.get(&id).cloned())
    }

    async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>, RepositoryError> {
        let t = self.tables.lock().await;
        Ok(t.products.values().find(|p| p.sku == sku).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let t = self.tables.lock().await;
        Ok(ids.iter().filter_map(|id| t.products.get(id).cloned()).collect())
    }

    async fn list_products(&self, active_only: bool) -> Result<Vec<Product>, RepositoryError> {
        let t = self.tables.lock().await;
        let mut products: Vec<Product> = t
            .products
            .values()
            .filter(|p| p.active || !active_only)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn update_product(
        &self,
        id: ProductId,
        product: NewProduct,
    ) -> Result<Product, RepositoryError> {
        let mut t = self.tables.lock().await;
        if t.sku_taken(&product.sku, Some(id)) {
            return Err(RepositoryError::Conflict("sku already exists".to_owned()));
        }
        let existing = t.products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        existing.sku = product.sku;
        existing.name = product.name;
        existing.description = product.description;
        existing.price = product.price;
        existing.stock_quantity = product.stock_quantity;
        existing.active = product.active;
        Ok(existing.clone())
    }

    async fn update_stock(
        &self,
        id: ProductId,
        stock_quantity: i32,
    ) -> Result<(), RepositoryError> {
        let mut t = self.tables.lock().await;
        let product = t.products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        product.stock_quantity = stock_quantity;
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut t = self.tables.lock().await;
        if t.lines.iter().any(|l| l.product_id == id) {
            return Err(RepositoryError::Conflict(
                "product is referenced by orders".to_owned(),
            ));
        }
        Ok(t.products.remove(&id).is_some())
    }
}

impl AddressStore for MemoryStore {
    async fn create_address(&self, address: NewAddress) -> Result<Address, RepositoryError> {
        let mut t = self.tables.lock().await;
        if !t.users.contains_key(&address.user_id) {
            return Err(RepositoryError::NotFound);
        }
        let created = Address {
            id: AddressId::new_v4(),
            user_id: address.user_id,
            line1: address.line1,
            city: address.city,
            province: address.province,
            postal_code: address.postal_code,
            country: address.country,
            is_default: false,
        };
        t.addresses.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_address(&self, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        let t = self.tables.lock().await;
        Ok(t.addresses.get(&id).cloned())
    }

    async fn list_addresses(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let t = self.tables.lock().await;
        let mut addresses: Vec<Address> = t
            .addresses
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        addresses.sort_by(|a, b| b.is_default.cmp(&a.is_default).then(a.id.cmp(&b.id)));
        Ok(addresses)
    }

    async fn get_default_address(
        &self,
        user_id: UserId,
    ) -> Result<Option<Address>, RepositoryError> {
        let t = self.tables.lock().await;
        Ok(t.addresses
            .values()
            .find(|a| a.user_id == user_id && a.is_default)
            .cloned())
    }

    async fn set_default_address(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Address, RepositoryError> {
        let mut t = self.tables.lock().await;
        if !t
            .addresses
            .get(&id)
            .is_some_and(|a| a.user_id == user_id)
        {
            return Err(RepositoryError::NotFound);
        }
        let mut target = None;
        for address in t.addresses.values_mut().filter(|a| a.user_id == user_id) {
            address.is_default = address.id == id;
            if address.is_default {
                target = Some(address.clone());
            }
        }
        target.ok_or(RepositoryError::NotFound)
    }

    async fn delete_address(&self, id: AddressId) -> Result<bool, RepositoryError> {
        let mut t = self.tables.lock().await;
        if t.orders.values().any(|o| o.address_id == id) {
            return Err(RepositoryError::Conflict(
                "address is referenced by orders".to_owned(),
            ));
        }
        Ok(t.addresses.remove(&id).is_some())
    }
}

impl OrderStore for MemoryStore {
    async fn place_order(
        &self,
        order: NewOrder) -> Result<(Order,
        Vec<OrderLine>,
    ), RepositoryError> {
        let mut t = self.tables.lock().await;
        if !t.addresses.contains_key(&order.address_id) {
            return Err(RepositoryError::NotFound);
        }

        // Check every guard before touching anything.
        let mut decrements = Vec::new();
        for (product_id, requested) in order.quantities_by_product() {
            let product = t
                .products
                .get(&product_id)
                .ok_or(RepositoryError::StockExhausted(product_id))?;
            let requested = i32::try_from(requested)
                .map_err(|_| RepositoryError::StockExhausted(product_id))?;
            if product.stock_quantity < requested {
                return Err(RepositoryError::StockExhausted(product_id));
            }
            decrements.push((product_id, requested));
        }
        for (product_id, requested) in decrements {
            if let Some(product) = t.products.get_mut(&product_id) {
                product.stock_quantity -= requested;
            }
        }

        let created = Order {
            id: OrderId::new_v4(),
            user_id: order.user_id,
            address_id: order.address_id,
            status: OrderStatus::Pending,
            total_amount: order.total_amount,
            created_at: Utc::now(),
        };
        let lines: Vec<OrderLine> = order
            .lines
            .iter()
            .map(|line| OrderLine {
                id: OrderLineId::new_v4(),
                order_id: created.id,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();

        t.orders.insert(created.id, created.clone());
        t.lines.extend(lines.iter().cloned());
        Ok((created, lines))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let t = self.tables.lock().await;
        Ok(t.orders.get(&id).cloned())
    }

    async fn list_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let t = self.tables.lock().await;
        let mut orders: Vec<Order> = t
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(orders)
    }

    async fn transition_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut t = self.tables.lock().await;
        let Some(order) = t.orders.get_mut(&id) else {
            return Ok(None);
        };
        if order.status != from {
            return Ok(None);
        }
        order.status = to;
        let updated = order.clone();

        if to == OrderStatus::Cancelled {
            let restock: Vec<(ProductId, u32)> = t
                .lines
                .iter()
                .filter(|l| l.order_id == id)
                .map(|l| (l.product_id, l.quantity))
                .collect();
            for (product_id, quantity) in restock {
                if let Some(product) = t.products.get_mut(&product_id) {
                    let quantity = i32::try_from(quantity).map_err(|_| {
                        RepositoryError::DataCorruption("line quantity out of range".to_owned())
                    })?;
                    product.stock_quantity = product.stock_quantity.saturating_add(quantity);
                }
            }
        }
        Ok(Some(updated))
    }

    async fn list_lines_by_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<OrderLine>, RepositoryError> {
        let t = self.tables.lock().await;
        Ok(t.lines
            .iter()
            .filter(|l| l.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_lines_by_user(&self, user_id: UserId) -> Result<Vec<OrderLine>, RepositoryError> {
        let t = self.tables.lock().await;
        Ok(t.lines
            .iter()
            .filter(|l| t.orders.get(&l.order_id).is_some_and(|o| o.user_id == user_id))
            .cloned()
            .collect())
    }

    async fn get_line(&self, id: OrderLineId) -> Result<Option<OrderLine>, RepositoryError> {
        let t = self.tables.lock().await;
        Ok(t.lines.iter().find(|l| l.id == id).cloned())
    }
}

impl SessionStore for MemoryStore {
    async fn create_session(&self, session: &Session) -> Result<(), RepositoryError> {
        let mut t = self.tables.lock().await;
        if t.sessions.contains_key(&session.id) {
            return Err(RepositoryError::Conflict("session already exists".to_owned()));
        }
        t.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, RepositoryError> {
        let t = self.tables.lock().await;
        Ok(t.sessions.get(&id).cloned())
    }

    async fn revoke_session(&self, id: SessionId) -> Result<bool, RepositoryError> {
        let mut t = self.tables.lock().await;
        Ok(t.sessions
            .get_mut(&id)
            .map(|s| s.is_revoked = true)
            .is_some())
    }

    async fn delete_session(&self, id: SessionId) -> Result<bool, RepositoryError> {
        let mut t = self.tables.lock().await;
        Ok(t.sessions.remove(&id).is_some())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut t = self.tables.lock().await;
        let before = t.sessions.len();
        t.sessions.retain(|_, s| !s.is_expired_at(now));
        Ok(u64::try_from(before - t.sessions.len()).unwrap_or(u64::MAX))
    }
}

impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
