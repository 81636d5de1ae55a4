use std::error::Error;
use std::sync::Arc;
use std::{env, fs, process};

use bson::{Document, doc};
use flint_client::{Client, ClientConfig, MemoryDriver, Namespace};
use flint_query::{FacetPage, Limit, LookupStage, MatchStage, ProjectStage, Stage};
use tracing::{error, info};

const ACCOUNTS: u32 = 45;

fn main() {
    tracing_subscriber::fmt::init();

    let config = load_config().unwrap_or_else(|e| {
        error!(error = %e, "invalid configuration");
        process::exit(1);
    });

    let driver = Arc::new(MemoryDriver::new());
    if let Err(e) = seed(&driver, &config) {
        error!(error = %e, "failed to seed the memory store");
        process::exit(1);
    }

    let client = Client::builder()
        .shared_driver(driver)
        .config(config)
        .build()
        .unwrap_or_else(|e| {
            error!(error = %e, "failed to build client");
            process::exit(1);
        });

    if let Err(e) = run(&client) {
        error!(error = %e, "demo failed");
        process::exit(1);
    }
}

/// `FLINT_CONFIG` names a JSON file; otherwise the `FLINT_*` variables apply.
fn load_config() -> Result<ClientConfig, Box<dyn Error>> {
    let config = match env::var("FLINT_CONFIG") {
        Ok(path) => ClientConfig::from_json(&fs::read_to_string(&path)?)?,
        Err(_) => ClientConfig::from_env()?,
    };
    Ok(with_fallbacks(config))
}

fn with_fallbacks(mut config: ClientConfig) -> ClientConfig {
    if config.database.is_empty() {
        config.database = "demo".into();
    }
    if config.collection.is_empty() {
        config.collection = "accounts".into();
    }
    config
}

fn seed(driver: &MemoryDriver, config: &ClientConfig) -> Result<(), Box<dyn Error>> {
    let accounts = Namespace::new(&config.database, &config.collection);
    let ids = driver.seed(
        &accounts,
        (1..=ACCOUNTS).map(|n| {
            let region = ["north", "south", "east"][n as usize % 3];
            doc! {
                "name": format!("account-{n:02}"),
                "region": region,
                "score": (n * 7 % 50) as i32,
                "active": n % 4 != 0,
            }
        }),
    )?;

    let orders = Namespace::new(&config.database, "orders");
    driver.seed(
        &orders,
        ids.iter().enumerate().flat_map(|(i, id)| {
            (0..i % 3).map(move |k| doc! { "account": id.clone(), "total": (k as i32 + 1) * 10 })
        }),
    )?;
    Ok(())
}

fn run(client: &Client<MemoryDriver>) -> Result<(), Box<dyn Error>> {
    // ── Offset pagination ───────────────────────────────────────
    let mut names = Vec::new();
    let pagination = client
        .query()
        .where_eq("active", true)
        .where_gte("score", 10)
        .with_sort("score", "desc")
        .with_limit(Limit::new(2, 8))
        .select(["name", "score"])
        .list_with_pagination(|d| {
            names.push(d.get_str("name")?.to_string());
            Ok(())
        })?;
    info!(
        page = pagination.current_page,
        pages = pagination.total_pages,
        total = pagination.total_count,
        ?names,
        "active accounts by score"
    );

    // ── Last-id pagination ──────────────────────────────────────
    let mut token = String::new();
    let mut page = 0;
    loop {
        let mut count = 0;
        token = client
            .query()
            .in_where("region", vec!["north", "east"])
            .with_size(10)
            .with_last_id(token)
            .list_with_last_id(|_| {
                count += 1;
                Ok(())
            })?;
        page += 1;
        info!(page, count, next = %token, "region page");
        if token.is_empty() {
            break;
        }
    }

    // ── Aggregation ─────────────────────────────────────────────
    let mut south = MatchStage::new();
    south.add_condition("region", "south");
    let mut report = FacetPage::default();
    let pagination = client
        .query()
        .fill_pipeline([
            Some(Stage::from(south)),
            Some(Stage::from(LookupStage::new("orders", "_id", "account", "orders"))),
            Some(Stage::from(ProjectStage::new(doc! { "name": 1, "orders": 1 }))),
        ])
        .with_sort("name", "asc")
        .with_size(5)
        .aggregate_with_pagination(|rows| {
            if let Some(first) = rows.next() {
                report = FacetPage::from_document(&first?);
            }
            Ok(report.total)
        })?;
    for item in &report.items {
        info!(
            name = item.get_str("name").unwrap_or_default(),
            orders = order_count(item),
            "southern account"
        );
    }
    info!(
        pages = pagination.total_pages,
        total = pagination.total_count,
        "southern accounts with orders"
    );
    Ok(())
}

fn order_count(item: &Document) -> usize {
    item.get_array("orders").map(Vec::len).unwrap_or(0)
}
