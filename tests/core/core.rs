use shopfront::core::assets::get_asset;
use shopfront::core::broker::DbBroker;
use shopfront::core::config::{load_config, parse_config, ShopConfig};
use shopfront::core::db::{db_connect, initialize_db};
use shopfront::core::error::ShopError;
use shopfront::core::migration::{all_migrations, current_version};
use shopfront::core::output::{format_money, parse_money};
use shopfront::core::schemas::AUDIT_LOG_NAME;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_missing_config_file_means_defaults() {
    let tmp = tempdir().unwrap();
    let config = load_config(&tmp.path().join("absent.toml")).unwrap();
    assert_eq!(config.shop_name, ShopConfig::default().shop_name);
    assert_eq!(config.page_size, 12);
    assert_eq!(config.shipping_flat_cents, 599);
}

#[test]
fn test_config_file_overrides_and_resolves_database() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("shopfront.toml");
    fs::write(
        &path,
        "shop_name = \"Bean There\"\ndatabase = \"data/shop.db\"\ntax_rate_bps = 825\n",
    )
    .unwrap();
    let config = load_config(&path).unwrap();
    assert_eq!(config.shop_name, "Bean There");
    assert_eq!(config.tax_rate_bps, 825);
    assert_eq!(config.database, tmp.path().join("data/shop.db"));
    // Unset keys keep their defaults.
    assert_eq!(config.currency, "USD");
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("shopfront.toml");
    fs::write(&path, "page_size = 0\n").unwrap();
    assert!(matches!(load_config(&path), Err(ShopError::Config(_))));

    fs::write(&path, "bind = \"not an address\"\n").unwrap();
    assert!(matches!(load_config(&path), Err(ShopError::Config(_))));

    assert!(matches!(parse_config("page_size = ["), Err(ShopError::Config(_))));
}

#[test]
fn test_default_config_round_trips_through_toml() {
    let text = ShopConfig::default().to_toml().unwrap();
    assert_eq!(parse_config(&text).unwrap(), ShopConfig::default());
}

#[test]
fn test_initialize_db_creates_parent_and_schema() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("nested/dir/shop.db");
    let applied = initialize_db(&path).unwrap();
    assert_eq!(applied.len(), all_migrations().len());
    assert!(path.exists());

    let conn = db_connect(&path).unwrap();
    let latest = all_migrations().last().map(|m| m.version).unwrap();
    assert_eq!(current_version(&conn).unwrap(), latest);

    // Second run is a no-op.
    assert!(initialize_db(&path).unwrap().is_empty());
}

#[test]
fn test_broker_audits_writes_only() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("shop.db");
    initialize_db(&path).unwrap();
    let broker = DbBroker::new(&path);
    assert_eq!(broker.audit_log_path(), tmp.path().join(AUDIT_LOG_NAME));

    let n: i64 = broker
        .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
        .unwrap();
    assert_eq!(n, 0);
    assert!(broker.recent_events(10).unwrap().is_empty());

    broker
        .with_conn("tester", "test.ok", |_conn| Ok(()))
        .unwrap();
    let failed: Result<(), ShopError> = broker.with_conn("tester", "test.fail", |_conn| {
        Err(ShopError::Validation("nope".into()))
    });
    assert!(failed.is_err());

    let events = broker.recent_events(10).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].op, "test.ok");
    assert_eq!(events[0].status, "success");
    assert_eq!(events[1].op, "test.fail");
    assert_eq!(events[1].status, "error");
    assert_eq!(events[1].actor, "tester");

    assert_eq!(broker.recent_events(1).unwrap()[0].op, "test.fail");
}

#[test]
fn test_committed_write_survives_unwritable_audit_log() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("shop.db");
    initialize_db(&path).unwrap();
    let broker = DbBroker::new(&path);
    // A directory where the log file should be makes every append fail.
    fs::create_dir(broker.audit_log_path()).unwrap();

    let id = broker
        .with_conn("tester", "test.insert", |conn| {
            conn.execute(
                "INSERT INTO categories(name, slug) VALUES('Tea', 'tea')",
                [],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .unwrap();

    let conn = db_connect(&path).unwrap();
    let name: String = conn
        .query_row("SELECT name FROM categories WHERE id = ?1", [id], |r| r.get(0))
        .unwrap();
    assert_eq!(name, "Tea");
}

#[test]
fn test_money_helpers() {
    assert_eq!(format_money(1999, "USD"), "$19.99");
    assert_eq!(format_money(-250, "EUR"), "-€2.50");
    assert_eq!(format_money(500, "CHF"), "5.00 CHF");
    assert_eq!(parse_money("19.9"), Some(1990));
    assert_eq!(parse_money("$4"), Some(400));
    assert_eq!(parse_money("1.234"), None);
    assert_eq!(parse_money("abc"), None);
}

#[test]
fn test_stylesheet_is_embedded() {
    let (bytes, content_type) = get_asset("style.css").unwrap();
    assert!(content_type.starts_with("text/css"));
    assert!(!bytes.is_empty());
}
