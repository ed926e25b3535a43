use std::sync::Arc;

use crate::{
    api::email::Mailer,
    checkout::CheckoutService,
    core::config::Config,
    events::EventBus,
    store::{FeedStore, Store},
};

#[derive(Clone)]
pub struct AppState {
    /// Change-feed-publishing store; every write through it reaches the bus.
    pub store: Arc<dyn Store>,
    pub bus: EventBus,
    pub checkout: Arc<CheckoutService>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wraps `store` so its writes are published on a fresh bus.
    pub fn new(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>, config: Config) -> Self {
        let bus = EventBus::default();
        let store: Arc<dyn Store> = Arc::new(FeedStore::new(store, bus.clone()));
        let checkout = Arc::new(CheckoutService::new(
            store.clone(),
            mailer,
            config.checkout.clone(),
        ));
        Self {
            store,
            bus,
            checkout,
            config: Arc::new(config),
        }
    }
}
