//! # Seed Data Generator
//!
//! Populates a development database with clients, salespeople and a
//! catalog covering all three product categories.
//!
//! ## Usage
//! ```bash
//! # Seed ./docflow_dev.db with 30 products per category (default)
//! cargo run -p docflow-db --bin seed
//!
//! # Custom amount and path
//! cargo run -p docflow-db --bin seed -- --per-category 100 --db ./data/docflow.db
//! ```
//!
//! ## Generated Data
//! - 4 clients, half of them wholesale
//! - 1 admin, 2 salespeople, 1 cashier
//! - Products coded `{OFI|MUE|TEC}-{NNNN}`; every fifth technology
//!   product is serialized with stock 1

use chrono::Utc;
use std::env;

use docflow_core::{Client, InventoryItem, ProductVariant, Role, Salesperson};
use docflow_db::{Database, DbConfig};

const OFFICE: &[&str] = &[
    "Bond Paper A4",
    "Ballpoint Pen Blue",
    "Stapler",
    "Folder Manila",
    "Sticky Notes",
    "Highlighter Set",
];

const FURNITURE: &[&str] = &[
    "Office Chair",
    "Standing Desk",
    "Filing Cabinet",
    "Bookshelf",
    "Meeting Table",
];

const TECHNOLOGY: &[&str] = &[
    "Laptop 14in",
    "Monitor 24in",
    "Laser Printer",
    "Wireless Mouse",
    "Docking Station",
];

const BRANDS: &[&str] = &["Acme", "Norte", "Lumen", "Vertex"];

const CLIENTS: &[(&str, &str, bool)] = &[
    ("0912345678", "Comercial Central", true),
    ("1798765432001", "Oficinas del Sur", false),
    ("0102030405", "Distribuidora Andina", true),
    ("AB-55310", "Estudio Lopez", false),
];

const STAFF: &[(&str, &str, Role)] = &[
    ("admin", "Administrador", Role::Admin),
    ("u-100", "Ana Torres", Role::Salesperson),
    ("u-101", "Luis Vera", Role::Salesperson),
    ("u-200", "Caja 1", Role::Cashier),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut per_category: usize = 30;
    let mut db_path = String::from("./docflow_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--per-category" | "-n" => {
                if i + 1 < args.len() {
                    per_category = args[i + 1].parse().unwrap_or(30);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Docflow Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --per-category <N>  Products per category (default: 30)");
                println!("  -d, --db <PATH>         Database file path (default: ./docflow_dev.db)");
                println!("  -h, --help              Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Docflow Seed Data Generator");
    println!("===========================");
    println!("Database: {}", db_path);
    println!("Products per category: {}", per_category);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let now = Utc::now();
    for (id, name, wholesale) in CLIENTS {
        db.clients()
            .insert(&Client {
                id: id.to_string(),
                name: name.to_string(),
                email: Some(format!("{}@example.com", id.to_lowercase())),
                phone: None,
                address: None,
                wholesale: *wholesale,
                credit_limit_cents: if *wholesale { 5_000_000 } else { 0 },
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await?;
    }
    println!("✓ {} clients", CLIENTS.len());

    for (id, name, role) in STAFF {
        db.salespeople()
            .insert(&Salesperson {
                id: id.to_string(),
                name: name.to_string(),
                role: *role,
                is_active: true,
            })
            .await?;
    }
    println!("✓ {} users", STAFF.len());

    let start = std::time::Instant::now();
    let mut generated = 0;

    for seed in 0..per_category {
        for product in [office(seed), furniture(seed), technology(seed)] {
            if let Err(e) = db.products().insert(&product).await {
                eprintln!("Failed to insert {}: {}", product.code, e);
                continue;
            }
            generated += 1;
        }
    }

    println!(
        "✓ Generated {} products in {:?}",
        generated,
        start.elapsed()
    );

    let low = db.inventory().low_stock_scan(5).await?;
    println!("  Low stock (< 5): {} products", low.len());

    println!();
    println!("✓ Seed complete!");
    Ok(())
}

fn base(code: String, name: &str, price_cents: i64, stock: i64, variant: ProductVariant) -> InventoryItem {
    let now = Utc::now();
    InventoryItem {
        code,
        description: name.to_string(),
        unit_price_cents: price_cents,
        stock,
        serial_number: None,
        is_active: true,
        variant,
        created_at: now,
        updated_at: now,
    }
}

fn office(seed: usize) -> InventoryItem {
    let name = OFFICE[seed % OFFICE.len()];
    base(
        format!("OFI-{:04}", seed),
        name,
        99 + ((seed * 37) % 2_000) as i64,
        (seed % 120) as i64,
        ProductVariant::OfficeSupply {
            brand: Some(BRANDS[seed % BRANDS.len()].to_string()),
            pack_size: Some([1, 12, 100, 500][seed % 4]),
        },
    )
}

fn furniture(seed: usize) -> InventoryItem {
    let name = FURNITURE[seed % FURNITURE.len()];
    base(
        format!("MUE-{:04}", seed),
        name,
        8_000 + ((seed * 911) % 60_000) as i64,
        (seed % 15) as i64,
        ProductVariant::Furniture {
            material: Some(["oak", "steel", "melamine"][seed % 3].to_string()),
            dimensions: Some(format!("{}x60x75", 80 + (seed % 5) * 20)),
            assembly_required: seed % 2 == 0,
        },
    )
}

fn technology(seed: usize) -> InventoryItem {
    let name = TECHNOLOGY[seed % TECHNOLOGY.len()];
    let mut item = base(
        format!("TEC-{:04}", seed),
        name,
        2_500 + ((seed * 4_391) % 150_000) as i64,
        (seed % 25) as i64,
        ProductVariant::Technology {
            brand: Some(BRANDS[(seed + 1) % BRANDS.len()].to_string()),
            model: Some(format!("M{}", 100 + seed)),
            warranty_months: [6, 12, 24][seed % 3],
        },
    );

    if seed % 5 == 0 {
        item.serial_number = Some(format!("SN-{:08}", seed));
        item.stock = 1;
    }
    item
}
