use anyhow::Context;
use clap::{Parser, Subcommand};
use regsync_common::SyncConfig;
use regsync_kernel::{RegistryDirectory, SimpleRegistry, remap};
use regsync_persist::{BackupChain, SnapshotCodec};
use regsync_transport::{SyncChannel, SyncPacket, spawn_simulation};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "regsync-cli", about = "CLI tool for registry id synchronization")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON configuration file (exclusions, backup chain, sync timeout)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Decode a registry backup generation from a world directory
    Inspect {
        /// World directory containing the backup chain
        world: PathBuf,
        /// Generation to decode (0 is newest)
        #[arg(short, long, default_value = "0")]
        generation: usize,
        /// Print the full snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a server-to-client sync round and a backup save/load cycle
    Demo {
        /// Override the sync timeout, in seconds
        #[arg(short, long)]
        timeout_secs: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info => {
            println!("regsync-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("kernel: {}", regsync_kernel::crate_info());
            println!("persist: {}", regsync_persist::crate_info());
            println!("transport: {}", regsync_transport::crate_info());
            println!(
                "backup chain: depth={}, file={}/{}",
                config.backup.depth, config.backup.directory, config.backup.file_name
            );
            println!("sync timeout: {}s", config.sync_timeout_secs);
            println!("max sync payload: {} bytes", config.max_payload_bytes);
        }
        Commands::Inspect {
            world,
            generation,
            json,
        } => inspect(&config, &world, generation, json)?,
        Commands::Demo { timeout_secs } => {
            let mut config = config;
            if let Some(secs) = timeout_secs {
                config.sync_timeout_secs = secs;
            }
            demo(&config)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SyncConfig> {
    let Some(path) = path else {
        return Ok(SyncConfig::default());
    };
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening config {}", path.display()))?;
    let config = serde_json::from_reader(file)
        .with_context(|| format!("parsing config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "config loaded");
    Ok(config)
}

fn inspect(config: &SyncConfig, world: &Path, generation: usize, json: bool) -> anyhow::Result<()> {
    let chain = BackupChain::new(
        world,
        config.backup.clone(),
        SnapshotCodec::new(config.exclusions.clone()),
    );
    let existing = chain.existing_generations();
    if existing.is_empty() {
        anyhow::bail!("no registry backups under {}", chain.root().display());
    }
    println!("generations on disk: {existing:?}");

    let snapshot = chain
        .read_generation(generation)
        .with_context(|| format!("reading generation {generation}"))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!(
        "generation {generation}: format v{}, {} registries, {} entries",
        snapshot.version,
        snapshot.registries.len(),
        snapshot.entry_count()
    );
    for (name, table) in &snapshot.registries {
        let max = table.values().max().copied().unwrap_or(0);
        println!("  {name}: {} entries, max id {max}", table.len());
    }
    Ok(())
}

fn demo_directory(blocks: &[&str], items: &[&str]) -> anyhow::Result<RegistryDirectory> {
    let mut dir = RegistryDirectory::new();
    for (registry, names) in [("block", blocks), ("item", items)] {
        let mut reg = SimpleRegistry::new();
        for name in names {
            reg.register(*name, ())?;
        }
        dir.register_remappable(registry, reg)?;
    }
    Ok(dir)
}

fn print_ids(label: &str, dir: &RegistryDirectory, registry: &str) {
    let mut ids = dir.ids_of(registry).unwrap_or_default();
    ids.sort_by_key(|(_, id)| *id);
    let rendered: Vec<String> = ids.iter().map(|(name, id)| format!("{id}={name}")).collect();
    println!("{label} {registry}: {}", rendered.join(" "));
}

fn demo(config: &SyncConfig) -> anyhow::Result<()> {
    // The server loaded an extension before vanilla content; the client did not,
    // and also carries one client-side item the server has never heard of.
    let server = demo_directory(
        &["mod:ruby_ore", "stone", "dirt", "grass"],
        &["stick", "mod:ruby"],
    )?;
    let client = demo_directory(
        &["stone", "dirt", "grass", "mod:ruby_ore"],
        &["stick", "mod:ruby", "client:camera"],
    )?;
    print_ids("server", &server, "block");
    print_ids("client", &client, "block");

    let (handle, simulation) = spawn_simulation(client)?;
    let channel = SyncChannel::from_config(config, handle);

    let wire = channel.build_packet(&server)?.to_bytes()?;
    println!("sync packet: {} bytes", wire.len());

    let packet = SyncPacket::from_bytes(&wire)?;
    channel.on_packet(&packet, true, |e| println!("sync reported: {e}"));

    drop(channel);
    let mut client = simulation
        .join()
        .map_err(|_| anyhow::anyhow!("simulation thread panicked"))?;
    print_ids("client", &client, "block");
    print_ids("client", &client, "item");

    let world = tempfile::tempdir()?;
    let mut chain = BackupChain::new(
        world.path(),
        config.backup.clone(),
        SnapshotCodec::new(config.exclusions.clone()),
    );
    chain.on_world_load(&mut client)?;
    println!("saved generations: {:?}", chain.existing_generations());

    let reset = remap::unmap(&mut client)?;
    println!("unmapped {reset} registries");
    print_ids("client", &client, "block");

    let restored = chain.load(&mut client)?;
    println!("restored from generation {}", restored.generation);
    print_ids("client", &client, "block");
    Ok(())
}
