//! Demonstrates the mailroom runtime with a small inventory system.

mod warehouse;

use anyhow::{Context, Result};
use clap::Parser;
use mailroom::{
    batch::Batcher,
    config::RuntimeConfig,
    logging,
    runtime::{Address, Message, Registry},
};
use std::{path::PathBuf, time::Duration};
use warehouse::{Auditor, InventoryMessage, Product, Warehouse};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// TOML configuration file
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Log specification, overrides the configured one
    #[clap(short, long)]
    log: Option<String>,
    /// Shut down after the demo instead of waiting for a signal
    #[clap(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    let _logger = logging::init(args.log.as_deref().unwrap_or(&config.logging.spec))?;

    let registry: Registry<InventoryMessage> = Registry::new(config.clone());
    if config.runtime.handle_signals {
        registry.install_signal_handler();
    }
    let mut shutdown = registry.shutdown_signal();

    run_demo(&registry, &config).await?;

    if args.once || !config.runtime.handle_signals {
        registry.shutdown_all().await;
    } else {
        log::info!("Demo finished, press Ctrl-C to exit");
        shutdown.wait().await;
    }
    log::info!("Bye");
    Ok(())
}

async fn run_demo(registry: &Registry<InventoryMessage>, config: &RuntimeConfig) -> Result<()> {
    let warehouse_address = Address::new("local", "warehouse");
    let auditor_address = Address::new("local", "auditor");

    let warehouse = registry
        .register(warehouse_address.clone(), Warehouse::new(registry.clone()))
        .await
        .context("Couldn't register the warehouse")?;
    let batcher = Batcher::from_config(&config.batch, |entry: Message<InventoryMessage>| {
        if let Some(InventoryMessage::Audit(change)) = entry.payload() {
            log::info!("Audit log: {}", change);
        }
    });
    registry
        .register(auditor_address.clone(), Auditor::new(batcher))
        .await
        .context("Couldn't register the auditor")?;
    registry
        .subscribe(Message::add_subscription(
            auditor_address,
            warehouse_address.clone(),
        ))
        .await?;

    for change in [
        InventoryMessage::AddProduct(Product::new("ABC", 5)),
        InventoryMessage::AddQuantity(Product::new("ABC", 10)),
        InventoryMessage::RemoveQuantity(Product::new("ABC", 2)),
    ] {
        registry
            .send(Message::new(warehouse_address.clone(), None, change))
            .await?;
    }

    let product: Product = registry
        .send_and_await_response(Message::with_response(
            warehouse_address.clone(),
            None,
            InventoryMessage::GetProduct("ABC".to_owned()),
        ))
        .await?;
    log::info!("Retrieved {:?}", product);

    if let Err(e) = registry
        .send_and_await_response::<Product>(Message::with_response(
            warehouse_address,
            None,
            InventoryMessage::GetProduct("XYZ".to_owned()),
        ))
        .await
    {
        log::warn!("Lookup failed: {}", e);
    }

    let reached = registry
        .broadcast(
            Message::subscribers(
                Address::new("local", "demo"),
                InventoryMessage::Audit("inventory check".to_owned()),
            ),
            Some("local"),
        )
        .await;
    log::info!("Inventory check sent to {} actors", reached);

    // Give the auditor's batch window time to close
    tokio::time::sleep(Duration::from_millis(config.batch.flush_interval_ms + 100)).await;
    log::info!("Final stock: {:?}", warehouse.get_state().await);
    Ok(())
}
