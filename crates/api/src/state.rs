//! Application state shared across handlers.

use std::sync::Arc;

use crate::db::{PgStore, Store};
use crate::services::auth::{SessionSettings, TokenCodec};
use crate::services::{AddressService, AuthService, CatalogService, OrderService};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// store, the token codec and per-request service handles. It is generic
/// over the store so the router can run on [`crate::db::MemoryStore`] in tests.
pub struct AppState<S = PgStore> {
    inner: Arc<AppStateInner<S>>,
}

struct AppStateInner<S> {
    store: S,
    tokens: TokenCodec,
    sessions: SessionSettings,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Store> AppState<S> {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: S, tokens: TokenCodec, sessions: SessionSettings) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store,
                tokens,
                sessions,
            }),
        }
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    #[must_use]
    pub fn auth(&self) -> AuthService<'_, S> {
        AuthService::new(&self.inner.store, &self.inner.tokens, self.inner.sessions)
    }

    #[must_use]
    pub fn orders(&self) -> OrderService<'_, S> {
        OrderService::new(&self.inner.store)
    }

    #[must_use]
    pub fn catalog(&self) -> CatalogService<'_, S> {
        CatalogService::new(&self.inner.store)
    }

    #[must_use]
    pub fn addresses(&self) -> AddressService<'_, S> {
        AddressService::new(&self.inner.store)
    }
}
