//! Shared fixtures for the integration suite.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use chrono::Utc;
use docflow_core::{
    Actor, Client, InventoryItem, Invoice, Order, ProductVariant, Quotation, Role, Salesperson,
};
use docflow_db::{Database, DbConfig};
use docflow_engine::telemetry::init_test_tracing;
use docflow_engine::{
    AlertHandle, CreateQuotation, EngineConfig, PaymentProcessor, QuotationLine, WorkflowContext,
    WorkflowService,
};

pub const WHOLESALE_CLIENT: &str = "0912345678";
pub const RETAIL_CLIENT: &str = "1790012345001";
pub const SALESPERSON: &str = "u-ana";

static TRACING: Once = Once::new();

pub struct Harness {
    pub db: Database,
    pub config: Arc<EngineConfig>,
    pub workflow: WorkflowService,
    pub payments: PaymentProcessor,
    pub ctx: WorkflowContext,
}

pub async fn harness() -> Harness {
    harness_with(EngineConfig::default(), AlertHandle::disabled()).await
}

/// Fresh in-memory database with one wholesale client, one retail client
/// and one salesperson.
pub async fn harness_with(config: EngineConfig, alerts: AlertHandle) -> Harness {
    harness_on(DbConfig::in_memory(), config, alerts).await
}

/// Same seed data on a caller-chosen database, e.g. a file-backed pool.
pub async fn harness_on(
    db_config: DbConfig,
    config: EngineConfig,
    alerts: AlertHandle,
) -> Harness {
    TRACING.call_once(init_test_tracing);

    let db = Database::new(db_config).await.unwrap();
    let now = Utc::now();

    for (id, name, wholesale) in [
        (WHOLESALE_CLIENT, "Distribuidora Central", true),
        (RETAIL_CLIENT, "Maria Torres", false),
    ] {
        db.clients()
            .insert(&Client {
                id: id.to_string(),
                name: name.to_string(),
                email: None,
                phone: None,
                address: None,
                wholesale,
                credit_limit_cents: 0,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    db.salespeople()
        .insert(&Salesperson {
            id: SALESPERSON.to_string(),
            name: "Ana Lopez".to_string(),
            role: Role::Salesperson,
            is_active: true,
        })
        .await
        .unwrap();

    let config = Arc::new(config);
    Harness {
        workflow: WorkflowService::new(db.clone(), config.clone()),
        payments: PaymentProcessor::new(db.clone(), config.clone()),
        ctx: WorkflowContext::new(Actor::new(SALESPERSON, "Ana Lopez"), alerts),
        config,
        db,
    }
}

impl Harness {
    /// Routes this harness's alerts through `alerts`, e.g. a worker spawned
    /// over `self.db.inventory()`.
    pub fn with_alerts(mut self, alerts: AlertHandle) -> Self {
        self.ctx = WorkflowContext::new(self.ctx.actor.clone(), alerts);
        self
    }
}

pub async fn add_product(db: &Database, code: &str, price_cents: i64, stock: i64) -> InventoryItem {
    let now = Utc::now();
    let item = InventoryItem {
        code: code.to_string(),
        description: format!("{code} test item"),
        unit_price_cents: price_cents,
        stock,
        serial_number: None,
        is_active: true,
        variant: ProductVariant::OfficeSupply {
            brand: Some("Norma".to_string()),
            pack_size: None,
        },
        created_at: now,
        updated_at: now,
    };
    db.products().insert(&item).await.unwrap();
    item
}

pub async fn add_serialized(db: &Database, code: &str, serial: &str) -> InventoryItem {
    let now = Utc::now();
    let item = InventoryItem {
        code: code.to_string(),
        description: format!("{code} laptop"),
        unit_price_cents: 85_000,
        stock: 1,
        serial_number: Some(serial.to_string()),
        is_active: true,
        variant: ProductVariant::Technology {
            brand: Some("Lenovo".to_string()),
            model: Some("T14".to_string()),
            warranty_months: 12,
        },
        created_at: now,
        updated_at: now,
    };
    db.products().insert(&item).await.unwrap();
    item
}

pub fn request(client_id: &str, lines: &[(&str, i64)]) -> CreateQuotation {
    CreateQuotation {
        client_id: client_id.to_string(),
        salesperson_id: SALESPERSON.to_string(),
        lines: lines
            .iter()
            .map(|(code, qty)| QuotationLine::new(*code, *qty))
            .collect(),
        manual_discount: Default::default(),
    }
}

pub async fn quote(h: &Harness, lines: &[(&str, i64)]) -> Quotation {
    h.workflow
        .create_quotation(&h.ctx, request(WHOLESALE_CLIENT, lines))
        .await
        .unwrap()
}

pub async fn order_for(h: &Harness, lines: &[(&str, i64)]) -> Order {
    let quotation = quote(h, lines).await;
    h.workflow
        .convert_quotation_to_order(&h.ctx, &quotation.id)
        .await
        .unwrap()
}

/// Quotation → order → invoice for the wholesale client.
pub async fn invoice_for(h: &Harness, lines: &[(&str, i64)]) -> Invoice {
    let order = order_for(h, lines).await;
    h.workflow
        .convert_order_to_invoice(&h.ctx, &order.id)
        .await
        .unwrap()
}
