use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};

use fleetname::config::Config;
use fleetname::hostinfo::HostInfo;
use fleetname::hostname::SystemHostname;
use fleetname::hosts::HostsUpdater;
use fleetname::identity::{Identity, IdentitySource, MetadataClient, OfflineIdentity};
use fleetname::reconcile::{read_live_ids, Reconciler};
use fleetname::{FileRegistry, Registrar, Registration, Registry, SlotKey};

#[derive(Parser)]
#[command(name = "fleetname", version, about = "Stable hostnames for cloud instances")]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Registry directory, overrides the config
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `fleetname=trace`
    #[arg(long = "log-level", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pick a hostname for this instance, apply it and record it
    Register {
        #[arg(long = "dry-run")]
        dry_run: bool,
        /// Use the configured fixed identity instead of the metadata service
        #[arg(long)]
        offline: bool,
    },
    /// Make this instance the master of its service
    ChangeMaster {
        #[arg(long)]
        offline: bool,
    },
    /// Set the hostname of a record selected by instance id or hostname
    Rename {
        #[arg(long)]
        instance: Option<String>,
        #[arg(long)]
        hostname: Option<String>,
        new_hostname: String,
    },
    /// Rewrite the hosts file from the registry
    UpdateHosts {
        #[arg(long = "dry-run")]
        dry_run: bool,
        #[arg(long)]
        daemon: bool,
        /// Program to run before each update
        #[arg(long = "legacy-updater")]
        legacy_updater: Option<PathBuf>,
    },
    /// Vacate records of instances missing from a live instance list
    Reconcile {
        /// File with one live instance id per line
        #[arg(long)]
        live: PathBuf,
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// Print all registry records as JSON
    Dump,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let mut config = Config::load(cli.config.as_deref()).context("load config")?;
    if let Some(dir) = cli.registry {
        config.registry_dir = dir;
    }
    let registry = FileRegistry::open(&config.registry_dir)
        .with_context(|| format!("open registry {}", config.registry_dir.display()))?;

    match cli.command {
        Commands::Register { dry_run, offline } => {
            cmd_register(&config, &registry, dry_run, offline)
        }
        Commands::ChangeMaster { offline } => cmd_change_master(&config, &registry, offline),
        Commands::Rename {
            instance,
            hostname,
            new_hostname,
        } => {
            let key = SlotKey::from_parts(instance, hostname)?;
            let local = SystemHostname::new(&config.hostname_file);
            let changed = Registrar::new(&registry, &local).rename(&key, &new_hostname)?;
            println!("{changed} record(s) renamed");
            Ok(())
        }
        Commands::UpdateHosts {
            dry_run,
            daemon,
            legacy_updater,
        } => cmd_update_hosts(&config, &registry, dry_run, daemon, legacy_updater),
        Commands::Reconcile { live, dry_run } => {
            let live = read_live_ids(&live).with_context(|| format!("read {}", live.display()))?;
            let reconciler = Reconciler::new(&registry);
            if dry_run {
                for id in reconciler.stale(&live)? {
                    println!("{id}");
                }
            } else {
                let vacated = reconciler.run(&live)?;
                println!("{vacated} record(s) vacated");
            }
            Ok(())
        }
        Commands::Dump => {
            let records = registry.snapshot()?;
            let mut out = std::io::stdout().lock();
            serde_json::to_writer_pretty(&mut out, &records)?;
            writeln!(out)?;
            Ok(())
        }
    }
}

fn init_logging(filter: Option<&str>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(filter) = filter {
        builder.parse_filters(filter);
    }
    builder.init();
}

fn identity(config: &Config, offline: bool) -> Result<Identity> {
    if offline {
        let source = OfflineIdentity::new(&config.offline_instance_id, &config.offline_local_ip);
        return Ok(source.fetch()?);
    }
    let source = MetadataClient::new(&config.metadata_url)?
        .with_poll_interval(Duration::from_millis(config.metadata_poll_ms));
    source.fetch().context("fetch instance identity")
}

fn cmd_register(
    config: &Config,
    registry: &FileRegistry,
    dry_run: bool,
    offline: bool,
) -> Result<()> {
    let info = HostInfo::load(&config.host_info_path)
        .with_context(|| format!("read {}", config.host_info_path.display()))?;
    let identity = identity(config, offline)?;
    let local = SystemHostname::new(&config.hostname_file);
    let registrar = Registrar::new(registry, &local);

    if dry_run {
        match registrar.plan(&info.service, info.service_type, &identity.instance_id)? {
            Some(hostname) => println!("would register {} as {hostname}", identity.instance_id),
            None => println!("{} is already registered", identity.instance_id),
        }
        return Ok(());
    }

    let outcome = registrar.register(
        &info.service,
        info.service_type,
        &identity.instance_id,
        &identity.local_ip,
        info.aliases,
    )?;
    match outcome {
        Registration::Registered { hostname } => println!("{hostname}"),
        Registration::Refused => println!("{} is already registered", identity.instance_id),
    }
    Ok(())
}

fn cmd_change_master(config: &Config, registry: &FileRegistry, offline: bool) -> Result<()> {
    let info = HostInfo::load(&config.host_info_path)
        .with_context(|| format!("read {}", config.host_info_path.display()))?;
    let identity = identity(config, offline)?;
    let local = SystemHostname::new(&config.hostname_file);
    let changed = Registrar::new(registry, &local).request_master_failover(
        &info.service,
        info.service_type,
        &identity.instance_id,
    )?;
    if changed {
        println!("{} is now master of {}", identity.instance_id, info.service);
    } else {
        println!("nothing to do");
    }
    Ok(())
}

fn cmd_update_hosts(
    config: &Config,
    registry: &FileRegistry,
    dry_run: bool,
    daemon: bool,
    legacy_updater: Option<PathBuf>,
) -> Result<()> {
    let mut updater = HostsUpdater::new(&config.hosts_path, &config.legacy_hosts_path);
    if let Some(program) = legacy_updater {
        updater = updater.with_legacy_updater(program);
    }
    if !daemon {
        let contents = updater.update(registry, dry_run)?;
        if dry_run {
            print!("{contents}");
        }
        return Ok(());
    }

    let interval = Duration::from_secs(config.update_interval_secs.max(1));
    info!("updating {} every {:?}", config.hosts_path.display(), interval);
    loop {
        if let Err(err) = updater.update(registry, dry_run) {
            error!("hosts update failed: {err}");
        }
        std::thread::sleep(interval);
    }
}
