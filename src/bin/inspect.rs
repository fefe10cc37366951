//! AreaDB Inspector
//!
//! Dumps the contents of a FileStore directory.

use std::path::PathBuf;
use std::process;

use areadb::{tag, BackingStore, Config, FileStore, IntervalIndex, Node, NodeIndex};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// AreaDB Inspector
#[derive(Parser, Debug)]
#[command(name = "areadb-inspect")]
#[command(about = "Inspect an AreaDB data directory")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./areadb_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every node with its name
    Nodes,

    /// Dump one node
    Node {
        /// Node id (decimal or 0x-prefixed hex) or node name
        node: String,
    },

    /// List the entries of an interval category
    Index {
        /// Category name
        category: String,

        /// Size of the per-entry metadata the category was created with
        #[arg(short, long)]
        record_size: usize,
    },

    /// Print key count and file sizes
    Stats,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,areadb=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();
    tracing::debug!("AreaDB Inspector v{}", areadb::VERSION);

    let config = Config::builder().data_dir(&args.data_dir).build();
    let store = match FileStore::open(config) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open {}: {}", args.data_dir.display(), e);
            process::exit(1);
        }
    };

    let outcome = match args.command {
        Commands::Nodes => list_nodes(&store),
        Commands::Node { node } => dump_node(&store, &node),
        Commands::Index {
            category,
            record_size,
        } => dump_index(&store, &category, record_size),
        Commands::Stats => print_stats(&store),
    };

    if let Err(e) = outcome {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn list_nodes(store: &FileStore) -> areadb::Result<()> {
    for node in Node::all(store) {
        let node = node?;
        match node.name()? {
            Some(name) => println!("{:#018x}  {}", node.id(), name),
            None => println!("{:#018x}", node.id()),
        }
    }
    Ok(())
}

fn parse_id(text: &str) -> Option<NodeIndex> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => NodeIndex::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// A node name wins over an id spelled the same way
fn resolve_node<'s, S: BackingStore + ?Sized>(
    store: &'s S,
    which: &str,
) -> areadb::Result<Option<Node<'s, S>>> {
    if let Some(node) = Node::find(store, which)? {
        return Ok(Some(node));
    }
    Ok(parse_id(which).map(|id| Node::open(store, id)))
}

fn dump_node(store: &FileStore, which: &str) -> areadb::Result<()> {
    let Some(node) = resolve_node(store, which)? else {
        println!("no node named {:?}", which);
        return Ok(());
    };
    if !node.exists()? {
        println!("node {:#x} does not exist", node.id());
        return Ok(());
    }

    println!("id:    {:#x}", node.id());
    println!("name:  {}", node.name()?.unwrap_or_default());
    if let Some(value) = node.value()? {
        println!("value: {}", preview(&value));
    }

    for entry in node.alt_entries(tag::ALT) {
        let (index, value) = entry?;
        println!("A[{:#x}] = {:#x}", index, value);
    }
    for entry in node.sup_entries(tag::SUP) {
        let (index, value) = entry?;
        println!("S[{:#x}] = {}", index, preview(&value));
    }
    for entry in node.hash_entries(tag::HASH) {
        let (key, value) = entry?;
        println!("H[{:?}] = {}", key, preview(&value));
    }
    Ok(())
}

fn dump_index(store: &FileStore, category: &str, record_size: usize) -> areadb::Result<()> {
    let mut index = IntervalIndex::new(store);
    if !index.link(category, record_size)? {
        println!("no category {:?} with record size {}", category, record_size);
        return Ok(());
    }

    println!("{} entries", index.len());
    for entry in index.iter() {
        let owner = entry
            .owner
            .map(|o| format!(" tail of {:#x}", o))
            .unwrap_or_default();
        println!("{}{}  info: {}", entry.interval, owner, preview(&entry.info));
        if let Some(text) = index.comment(entry.start(), false)? {
            println!("    ; {}", text);
        }
        if let Some(text) = index.comment(entry.start(), true)? {
            println!("    ;; {}", text);
        }
    }

    // Read-only: leave without the flush a terminate would do.
    index.zeroise();
    Ok(())
}

fn print_stats(store: &FileStore) -> areadb::Result<()> {
    println!("keys:          {}", store.key_count());
    println!("memory bytes:  {}", store.memory_size());
    println!("wal bytes:     {}", store.wal_size());
    println!("last lsn:      {}", store.current_lsn());

    let snapshot = store.data_dir().join("snapshot.adb");
    if let Ok(meta) = std::fs::metadata(&snapshot) {
        println!("snapshot bytes: {}", meta.len());
    }
    Ok(())
}

/// Hex dump, with the text alongside when it is printable
fn preview(bytes: &[u8]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    match std::str::from_utf8(bytes) {
        Ok(text) if !text.is_empty() && text.chars().all(|c| !c.is_control()) => {
            format!("{} ({:?})", hex, text)
        }
        _ => hex,
    }
}
