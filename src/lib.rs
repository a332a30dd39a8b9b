//! Shopfront: a server-rendered storefront over SQLite.
//!
//! Shoppers browse a catalog, fill a cart (anonymous or signed in), check out
//! against saved addresses and follow their order history. Administrators run
//! the shop from a back-office: products, categories, orders, users, coupons
//! and a sales dashboard.
//!
//! # Architecture
//!
//! ## The Thin Waist
//!
//! Every database operation goes through [`core::broker::DbBroker`]:
//! - Serialization (in-process lock, one connection per operation)
//! - Audit logging (`audit.events.jsonl` next to the database)
//!
//! The web layer reaches the broker through `web::AppState`, which ships
//! each closure to tokio's blocking pool.
//!
//! ## Subsystems
//!
//! - `accounts`: users, password hashing, addresses
//! - `sessions`: cookie sessions, anonymous carts, flash messages
//! - `catalog`: categories, products, search and paging
//! - `reviews`: one rating per customer per product
//! - `cart`: cart lines and the merge performed at sign-in
//! - `coupons`: percentage and fixed discounts
//! - `checkout`: pricing and the order transaction
//! - `orders`: history and the status lifecycle
//! - `analytics`: dashboard figures
//!
//! # Quick Start
//!
//! ```bash
//! shopfront init
//! shopfront seed
//! shopfront admin create --email admin@example.com --name Admin --password 'change me now'
//! shopfront serve
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: config, errors, schema, migrations, broker, helpers
//! - [`shop`]: domain subsystems
//! - [`web`]: axum router, session middleware, HTML views

pub mod core;
pub mod shop;
pub mod web;

use core::{broker::DbBroker, config, db, error, migration};
use shop::{accounts, seed};

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(
    name = "shopfront",
    version = env!("CARGO_PKG_VERSION"),
    about = "A server-rendered storefront over SQLite"
)]
struct Cli {
    /// Config file (defaults to $SHOPFRONT_CONFIG, then ./shopfront.toml).
    #[clap(long, global = true)]
    config: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default config and create the database
    #[clap(name = "init")]
    Init {
        /// Directory to initialize (defaults to the current directory).
        #[clap(short, long)]
        dir: Option<PathBuf>,
        /// Overwrite an existing config file.
        #[clap(long)]
        force: bool,
    },

    /// Apply pending schema migrations
    #[clap(name = "migrate")]
    Migrate,

    /// Run the HTTP server
    #[clap(name = "serve", visible_alias = "s")]
    Serve,

    /// Insert demo categories, products and a coupon
    #[clap(name = "seed")]
    Seed,

    /// Manage administrator accounts
    #[clap(name = "admin")]
    Admin(AdminCli),

    /// Show recent audit events
    #[clap(name = "audit")]
    Audit {
        /// Number of events to show.
        #[clap(long, default_value_t = 20)]
        limit: usize,
    },

    /// Show version information
    #[clap(name = "version")]
    Version,
}

#[derive(clap::Args, Debug)]
struct AdminCli {
    #[clap(subcommand)]
    command: AdminCommand,
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    /// Create an administrator, or promote and re-password an existing user
    Create {
        #[clap(long)]
        email: String,
        #[clap(long)]
        name: String,
        #[clap(long)]
        password: String,
    },
    /// Grant admin to an existing user
    Promote {
        #[clap(long)]
        email: String,
    },
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn cli_actor() -> String {
    format!("cli:{}", std::env::var("USER").unwrap_or_else(|_| "unknown".into()))
}

fn run_init(dir: Option<PathBuf>, force: bool) -> Result<(), error::ShopError> {
    let target = match dir {
        Some(d) => d,
        None => std::env::current_dir()?,
    };
    fs::create_dir_all(&target)?;
    let config_file = target.join(config::CONFIG_FILE_NAME);

    if config_file.exists() && !force {
        println!(
            "  {} {} already exists (use {} to overwrite)",
            "▸".bright_yellow(),
            config_file.display(),
            "--force".bright_cyan().bold()
        );
    } else {
        let defaults = config::ShopConfig::default();
        fs::write(&config_file, defaults.to_toml()?)?;
        println!("  {} wrote {}", "✓".bright_green(), config_file.display());
    }

    let cfg = config::load_config(&config_file)?;
    let applied = db::initialize_db(&cfg.database)?;
    println!(
        "  {} database {} ({} migration(s) applied)",
        "✓".bright_green(),
        cfg.database.display(),
        applied.len()
    );
    println!();
    println!(
        "  Next: {} then {}",
        "shopfront seed".bright_cyan(),
        "shopfront serve".bright_cyan()
    );
    Ok(())
}

fn run_migrate(database: &Path) -> Result<(), error::ShopError> {
    let applied = db::initialize_db(database)?;
    if applied.is_empty() {
        println!(
            "Schema is current (version {}).",
            migration::all_migrations()
                .last()
                .map(|m| m.version)
                .unwrap_or(0)
        );
    }
    for version in applied {
        println!("  {} applied migration {}", "✓".bright_green(), version);
    }
    Ok(())
}

fn run_admin(broker: &DbBroker, cmd: AdminCommand) -> Result<(), error::ShopError> {
    match cmd {
        AdminCommand::Create {
            email,
            name,
            password,
        } => {
            let user = broker.with_conn(&cli_actor(), "accounts.upsert_admin", |conn| {
                accounts::upsert_admin(conn, &email, &name, &password)
            })?;
            println!(
                "  {} {} <{}> is an administrator",
                "✓".bright_green(),
                user.name,
                user.email
            );
        }
        AdminCommand::Promote { email } => {
            let user = broker.with_conn(&cli_actor(), "accounts.promote", |conn| {
                let user = accounts::find_by_email(conn, &email)?.ok_or_else(|| {
                    error::ShopError::NotFound(format!("user {}", email))
                })?;
                // Acting id 0 is the CLI; it never matches a real user.
                accounts::set_admin(conn, 0, user.id, true)
            })?;
            println!("  {} {} is an administrator", "✓".bright_green(), user.email);
        }
    }
    Ok(())
}

fn run_audit(broker: &DbBroker, limit: usize) -> Result<(), error::ShopError> {
    let events = broker.recent_events(limit)?;
    if events.is_empty() {
        println!("No audit events in {}", broker.audit_log_path().display());
        return Ok(());
    }
    for ev in events {
        let status = if ev.status == "success" {
            ev.status.bright_green()
        } else {
            ev.status.bright_red()
        };
        println!(
            "{} {:<28} {:<32} {}",
            ev.ts.dimmed(),
            ev.op,
            ev.actor,
            status
        );
    }
    Ok(())
}

pub fn run() -> Result<(), error::ShopError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Version => {
            println!("v{}", migration::SHOP_VERSION);
            return Ok(());
        }
        Command::Init { dir, force } => return run_init(dir, force),
        _ => {}
    }

    let cfg = config::load_config(&config::config_path(cli.config.as_deref()))?;
    init_tracing(&cfg.log_level);

    match cli.command {
        Command::Migrate => run_migrate(&cfg.database),
        Command::Serve => {
            db::initialize_db(&cfg.database)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(web::serve(cfg))
        }
        Command::Seed => {
            db::initialize_db(&cfg.database)?;
            let broker = DbBroker::new(&cfg.database);
            let report = broker.with_conn(&cli_actor(), "seed.demo", seed::seed_demo)?;
            println!(
                "  {} seeded {} categories, {} products, {} coupons",
                "✓".bright_green(),
                report.categories,
                report.products,
                report.coupons
            );
            Ok(())
        }
        Command::Admin(admin) => {
            db::initialize_db(&cfg.database)?;
            run_admin(&DbBroker::new(&cfg.database), admin.command)
        }
        Command::Audit { limit } => run_audit(&DbBroker::new(&cfg.database), limit),
        Command::Init { .. } | Command::Version => Ok(()),
    }
}
