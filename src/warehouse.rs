//! A small inventory built from actors: a warehouse keeping product
//! quantities and an auditor collecting the warehouse's change notifications.

use anyhow::anyhow;
use async_trait::async_trait;
use mailroom::{
    batch::Batcher,
    runtime::{Message, Registry, StateProcessor},
    subscriber::Subscriptions,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub code: String,
    pub quantity: i64,
}

impl Product {
    pub fn new(code: &str, quantity: i64) -> Product {
        Product {
            code: code.to_owned(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryMessage {
    AddProduct(Product),
    AddQuantity(Product),
    RemoveQuantity(Product),
    GetProduct(String),
    ProductInfo(Product),
    Audit(String),
}

impl TryFrom<InventoryMessage> for Product {
    type Error = InventoryMessage;

    fn try_from(message: InventoryMessage) -> Result<Self, Self::Error> {
        match message {
            InventoryMessage::ProductInfo(product) => Ok(product),
            other => Err(other),
        }
    }
}

/// Keeps the stock and notifies its subscribers of every change.
pub struct Warehouse {
    products: Vec<Product>,
    subscriptions: Subscriptions,
    registry: Registry<InventoryMessage>,
}

impl Warehouse {
    pub fn new(registry: Registry<InventoryMessage>) -> Warehouse {
        Warehouse {
            products: vec![],
            subscriptions: Subscriptions::new(),
            registry,
        }
    }

    fn product_mut(&mut self, code: &str) -> Option<&mut Product> {
        self.products.iter_mut().find(|p| p.code == code)
    }

    fn adjust(&mut self, code: &str, delta: i64) -> Option<String> {
        match self.product_mut(code) {
            Some(product) => {
                product.quantity += delta;
                log::info!("{} quantity is now {}", code, product.quantity);
                Some(format!("{} adjusted by {}", code, delta))
            }
            None => {
                log::warn!("Can't adjust unknown product {}", code);
                None
            }
        }
    }
}

#[async_trait]
impl StateProcessor<InventoryMessage> for Warehouse {
    type State = Vec<Product>;

    async fn process(&mut self, message: Message<InventoryMessage>) {
        if self.subscriptions.handle_control(&message) {
            return;
        }
        let change = match message.payload() {
            Some(InventoryMessage::AddProduct(product)) => {
                if self.product_mut(&product.code).is_some() {
                    log::warn!("Product {} already stocked", product.code);
                    None
                } else {
                    self.products.push(product.clone());
                    Some(format!("{} stocked with {}", product.code, product.quantity))
                }
            }
            Some(InventoryMessage::AddQuantity(product)) => {
                self.adjust(&product.code, product.quantity)
            }
            Some(InventoryMessage::RemoveQuantity(product)) => {
                self.adjust(&product.code, -product.quantity)
            }
            Some(InventoryMessage::GetProduct(code)) => {
                match self.products.iter().find(|p| &p.code == code) {
                    Some(product) => message.reply(InventoryMessage::ProductInfo(product.clone())),
                    None => message.reply_error(anyhow!("Product {} not found", code)),
                };
                None
            }
            _ => {
                log::warn!("Warehouse doesn't handle {}", message);
                None
            }
        };
        if let (Some(change), Some(me)) = (change, message.to.clone()) {
            let notification = Message::subscribers(me, InventoryMessage::Audit(change));
            self.subscriptions
                .notify_subscribers(&self.registry, notification)
                .await;
        }
    }

    async fn shutdown(&mut self) {
        log::info!("Clearing {} products", self.products.len());
        self.products.clear();
    }

    fn get_state(&self) -> Self::State {
        self.products.clone()
    }
}

/// Batches the audit notifications it receives.
pub struct Auditor {
    batcher: Batcher<InventoryMessage>,
    received: usize,
}

impl Auditor {
    pub fn new(batcher: Batcher<InventoryMessage>) -> Auditor {
        Auditor {
            batcher,
            received: 0,
        }
    }
}

#[async_trait]
impl StateProcessor<InventoryMessage> for Auditor {
    type State = usize;

    async fn process(&mut self, message: Message<InventoryMessage>) {
        if let Some(InventoryMessage::Audit(_)) = message.payload() {
            self.received += 1;
            self.batcher.add(message);
        }
    }

    async fn shutdown(&mut self) {
        if self.batcher.pending() > 0 {
            log::warn!("Auditor stopped with {} unflushed entries", self.batcher.pending());
        }
        self.batcher.stop();
    }

    fn get_state(&self) -> Self::State {
        self.received
    }
}
