//! SkyBlock Crafting Calculator
//!
//! Command line front end: import recipes, build crafting trees, track
//! progress in snapshot files and price what is still missing.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

use craft_calculator::calculator::{NetNeeds, format_tree};
use craft_calculator::config::Config;
use craft_calculator::db::{self, SqliteRecipeSource};
use craft_calculator::extract;
use craft_calculator::models::NodeId;
use craft_calculator::names::{DisplayNames, SEARCH_LIMIT};
use craft_calculator::pricing::{HttpMarketFeeds, MarketData, PriceMode};
use craft_calculator::recipe::RecipeResolver;
use craft_calculator::session::{Session, parse_quantity};
use craft_calculator::snapshot::Snapshot;
use craft_calculator::source::HttpRecipeSource;
use craft_calculator::{CalcError, RecipeSource};

#[derive(Parser)]
#[command(name = "craft-calculator")]
#[command(about = "Crafting requirement and cost calculator for SkyBlock items")]
struct Cli {
    /// Path to the SQLite recipe database
    #[arg(short, long, default_value = "craft_data.db")]
    database: PathBuf,

    /// Optional TOML config file
    #[arg(short, long, default_value = "craft.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Import item records from a recipe repository checkout
    Import {
        /// Directory holding per-item JSON records
        repo_dir: PathBuf,

        /// Clear existing items before import
        #[arg(long)]
        clear: bool,
    },

    /// Load a small built-in recipe set for testing
    LoadSample,

    /// List all items in the database
    ListItems,

    /// Export the display name -> id map of craftable items
    DisplayNames {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Search display names
    Search {
        text: String,

        /// Print the longest common completion instead of matches
        #[arg(long)]
        complete: bool,
    },

    /// Build the crafting tree for an item and list what it needs
    Calc {
        /// Display name or internal id (e.g. "Enchanted Iron Block")
        item: String,

        #[arg(short, long, default_value = "1", value_parser = parse_quantity)]
        quantity: u64,

        /// Look recipes up over HTTP instead of the local database
        #[arg(long)]
        online: bool,

        /// Fetch market prices and show a cost report
        #[arg(long)]
        price: bool,

        #[arg(long, value_enum)]
        mode: Option<PriceMode>,

        /// Show the full crafting tree
        #[arg(short, long)]
        verbose: bool,

        /// Write a snapshot of the result
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Reopen a snapshot, apply progress and list what is still needed
    Resume {
        snapshot: PathBuf,

        /// Mark a node and its subtree completed
        #[arg(long)]
        complete: Vec<NodeId>,

        /// Clear completion of a node and its subtree
        #[arg(long)]
        reopen: Vec<NodeId>,

        /// Owned units, as NODE_ID=N
        #[arg(long, value_parser = parse_assignment)]
        owned: Vec<(NodeId, i64)>,

        /// Owned bulk packs, as NODE_ID=N
        #[arg(long, value_parser = parse_assignment)]
        packs: Vec<(NodeId, i64)>,

        /// Toggle collapsed display of a node
        #[arg(long)]
        collapse: Vec<NodeId>,

        /// Only count what this node still needs
        #[arg(long)]
        focus: Option<NodeId>,

        #[arg(long)]
        price: bool,

        #[arg(long, value_enum)]
        mode: Option<PriceMode>,

        /// Write the updated snapshot
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

fn parse_assignment(input: &str) -> Result<(NodeId, i64), String> {
    let (id, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected NODE_ID=N, got {input:?}"))?;
    let id = id.parse::<NodeId>().map_err(|e| e.to_string())?;
    let value = value.trim().parse::<i64>().map_err(|e| e.to_string())?;
    Ok((id, value))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("craft_calculator=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(Some(cli.config.as_path()))?;

    let conn = Connection::open(&cli.database)
        .with_context(|| format!("Failed to open {}", cli.database.display()))?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::Import { repo_dir, clear } => {
            if clear {
                println!("Clearing existing items...");
                db::clear_items(&conn)?;
            }

            let stats = extract::import_to_database(&conn, &repo_dir)?;
            println!("\n{}", stats);
        }

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }

        Commands::ListItems => {
            let items = db::list_items(&conn)?;
            if items.is_empty() {
                println!("No items in database. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:<36} {:<36} {:>9}", "Item", "ID", "Craftable");
                println!("{}", "-".repeat(83));
                for item in items {
                    let kind = match (item.craftable, item.vanilla) {
                        (true, _) => "yes",
                        (false, true) => "vanilla",
                        (false, false) => "no",
                    };
                    println!("{:<36} {:<36} {:>9}", item.display_name, item.id, kind);
                }
            }
        }

        Commands::DisplayNames { output } => {
            let map = db::display_name_map(&conn)?;
            let json = serde_json::to_string_pretty(&map)?;
            match output {
                Some(path) => {
                    fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Wrote {} display names to {}", map.len(), path.display());
                }
                None => println!("{}", json),
            }
        }

        Commands::Search { text, complete } => {
            let names = load_display_names(&config, &conn)?;
            if complete {
                match names.complete(&text) {
                    Some(completion) => println!("{}", completion),
                    None => println!("No items start with '{}'", text),
                }
            } else {
                let hits = names.search(&text, SEARCH_LIMIT);
                if hits.is_empty() {
                    println!("No items match '{}'", text);
                }
                for name in hits {
                    println!("  {}", name);
                }
            }
        }

        Commands::Calc {
            item,
            quantity,
            online,
            price,
            mode,
            verbose,
            save,
        } => {
            let names = load_display_names(&config, &conn)?;
            let mut session = Session::new();
            session.price_mode = mode.unwrap_or(config.price_mode);

            if online {
                let source = HttpRecipeSource::new(reqwest::Client::new(), config.recipes_url.clone());
                calculate(&mut session, RecipeResolver::new(source, names), &item, quantity).await?;
            } else {
                let source = SqliteRecipeSource::new(&conn);
                calculate(&mut session, RecipeResolver::new(source, names), &item, quantity).await?;
            }

            report(&session, &config, verbose, price).await?;
            if let Some(path) = save {
                save_snapshot(&session, &path)?;
            }
        }

        Commands::Resume {
            snapshot,
            complete,
            reopen,
            owned,
            packs,
            collapse,
            focus,
            price,
            mode,
            save,
        } => {
            let mut session = Session::new();
            session.price_mode = mode.unwrap_or(config.price_mode);
            session.load_snapshot(Snapshot::load(&snapshot)?);

            for id in complete {
                session.set_completion(id, true)?;
            }
            for id in reopen {
                session.set_completion(id, false)?;
            }
            for (id, units) in owned {
                session.set_owned(id, units)?;
            }
            for (id, count) in packs {
                session.set_bulk_packs(id, count)?;
            }
            for id in collapse {
                session.toggle_collapsed(id)?;
            }
            if let Some(id) = focus {
                session.toggle_focus(id)?;
            }

            report(&session, &config, true, price).await?;
            if let Some(path) = save {
                save_snapshot(&session, &path)?;
            }
        }
    }

    Ok(())
}

async fn calculate<S: RecipeSource>(
    session: &mut Session,
    resolver: RecipeResolver<S>,
    item: &str,
    quantity: u64,
) -> Result<()> {
    session.calculate(&resolver, item, quantity).await?;
    Ok(())
}

/// Display names from the configured file, else from the local database.
fn load_display_names(config: &Config, conn: &Connection) -> Result<DisplayNames> {
    match &config.display_names {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            DisplayNames::from_json(&text)
                .with_context(|| format!("Invalid display name map in {}", path.display()))
        }
        None => Ok(DisplayNames::from_map(db::display_name_map(conn)?)),
    }
}

async fn report(session: &Session, config: &Config, show_tree: bool, with_prices: bool) -> Result<()> {
    let root = session.root().ok_or(CalcError::NoTree)?;
    if show_tree {
        println!("Crafting tree:\n");
        println!("{}", format_tree(root, 0));
    }
    if let Some(node) = session.focus().and_then(|id| session.node(id).ok()) {
        println!("Focused on {} ({})\n", node.display_name, node.id);
    }

    let needs = session.net_needs()?;
    print_needs(&needs, config.buy_order_max);

    if with_prices && !needs.is_empty() {
        let feeds = HttpMarketFeeds::new(
            reqwest::Client::new(),
            config.flat_feed_url.clone(),
            config.listings_url.clone(),
        );
        let market = MarketData::fetch(&feeds, &feeds).await;
        println!("\n{}", session.price(&market)?);
    }
    Ok(())
}

fn print_needs(needs: &NetNeeds, buy_order_max: u64) {
    if needs.is_empty() {
        println!("Nothing left to gather.");
    } else {
        println!("{:<36} {:>12}  {}", "Raw material", "Quantity", "Buy orders");
        println!("{}", "-".repeat(70));
        for need in needs.items.values() {
            let (full, rest) = need.buy_orders(buy_order_max);
            let orders = match (full, rest) {
                (0, rest) => format!("{}", rest),
                (full, 0) => format!("{} x {}", full, buy_order_max),
                (full, rest) => format!("{} x {} + {}", full, buy_order_max, rest),
            };
            println!("{:<36} {:>12}  {}", need.display_name, need.quantity, orders);
        }
    }

    for gap in &needs.gaps {
        println!(
            "warning: {} lists {} x{} but has no matching child; not counted",
            gap.parent_item, gap.ingredient, gap.quantity
        );
    }
}

fn save_snapshot(session: &Session, path: &Path) -> Result<()> {
    session.export_snapshot()?.save(path)?;
    println!("\nSaved snapshot to {}", path.display());
    Ok(())
}

/// Sample records in the recipe repository format
const SAMPLE_RECORDS: &[&str] = &[
    r#"{"internalname": "IRON_INGOT", "displayname": "§fIron Ingot", "vanilla": true}"#,
    r#"{"internalname": "DIAMOND", "displayname": "§fDiamond", "vanilla": true}"#,
    r#"{"internalname": "COAL", "displayname": "§fCoal", "vanilla": true}"#,
    r#"{"internalname": "ENCHANTED_IRON", "displayname": "§aEnchanted Iron",
        "recipe": {"A1": "", "A2": "IRON_INGOT:32", "A3": "",
                   "B1": "IRON_INGOT:32", "B2": "IRON_INGOT:32", "B3": "IRON_INGOT:32",
                   "C1": "", "C2": "IRON_INGOT:32", "C3": ""}}"#,
    r#"{"internalname": "ENCHANTED_IRON_BLOCK", "displayname": "§9Enchanted Iron Block",
        "recipe": {"A1": "", "A2": "ENCHANTED_IRON:32", "A3": "",
                   "B1": "ENCHANTED_IRON:32", "B2": "ENCHANTED_IRON:32", "B3": "ENCHANTED_IRON:32",
                   "C1": "", "C2": "ENCHANTED_IRON:32", "C3": ""}}"#,
    r#"{"internalname": "ENCHANTED_DIAMOND", "displayname": "§aEnchanted Diamond",
        "recipe": {"A2": "DIAMOND:32", "B1": "DIAMOND:32", "B2": "DIAMOND:32",
                   "B3": "DIAMOND:32", "C2": "DIAMOND:32"}}"#,
    r#"{"internalname": "ENCHANTED_COAL", "displayname": "§aEnchanted Coal",
        "recipe": {"A2": "COAL:32", "B1": "COAL:32", "B2": "COAL:32",
                   "B3": "COAL:32", "C2": "COAL:32"}}"#,
    r#"{"internalname": "REFINED_DIAMOND", "displayname": "§9Refined Diamond",
        "recipes": [{"type": "forge", "inputs": ["ENCHANTED_DIAMOND:160", "ENCHANTED_COAL:2"],
                     "count": 1, "duration": 28800}]}"#,
    r#"{"internalname": "IRON_MINION_UPGRADE", "displayname": "§9Iron Minion Upgrade",
        "recipes": [{"type": "crafting", "A1": "ENCHANTED_IRON_BLOCK:1", "A2": "REFINED_DIAMOND:1",
                     "B1": "SKYBLOCK_COIN:250000", "count": 2}]}"#,
];

/// Load sample records for testing without a repository checkout
fn load_sample_data(conn: &Connection) -> Result<()> {
    db::clear_items(conn)?;

    for record in SAMPLE_RECORDS {
        let entry = extract::parse_record(record).context("Invalid sample record")?;
        db::upsert_item(conn, &entry, record)?;
    }
    Ok(())
}
