//! Command handlers.
//!
//! One-shot runtime per invocation: open the state file, run the
//! command, exit. Background tasks are never started here -- the CLI
//! is a diagnostic surface, not a daemon.

use std::sync::Arc;

use owo_colors::OwoColorize;

use medlink_core::connectivity::{self, ConnectivityState};
use medlink_core::{
    DiscoverOptions, EdgeRuntime, JsonFileStore, SweepSkipReason, TranslationJob,
};

use crate::cli::{Cli, Command, DeviceCommand, DiscoverArgs, GlobalOpts, ProbeArgs, TranslateArgs};
use crate::error::CliError;

pub async fn dispatch(cli: Cli) -> Result<(), CliError> {
    tracing::debug!(command = ?cli.command, "dispatching command");

    match cli.command {
        // A bare probe needs no state file or runtime.
        Command::Probe(args) => probe(args).await,

        command => {
            let full_sweep =
                matches!(&command, Command::Discover(args) if args.full_sweep);
            let runtime = build_runtime(&cli.global, full_sweep).await?;

            match command {
                Command::Discover(args) => discover(args, &runtime).await,
                Command::Status => status(&runtime).await,
                Command::Sync => sync(&runtime).await,
                Command::Translate(args) => translate(args, &runtime).await,
                Command::Device(cmd) => device(cmd, &runtime).await,
                Command::Probe(_) => unreachable!("handled above"),
            }
        }
    }
}

/// Build a one-shot runtime from config + CLI overrides.
async fn build_runtime(global: &GlobalOpts, full_sweep: bool) -> Result<EdgeRuntime, CliError> {
    let mut config = medlink_config::load_config_or_default();
    if let Some(ref url) = global.cloud_url {
        config.cloud.url.clone_from(url);
    }
    if full_sweep {
        config.sweep.full_range = true;
    }

    let runtime_config = medlink_config::to_runtime_config(&config)?;
    let state_path = medlink_config::state_path(&config);
    let kv = JsonFileStore::open(&state_path).map_err(|e| CliError::Config {
        message: format!("cannot open state file: {e}"),
    })?;

    // The CLI runs interactively on a connected machine and never
    // starts the background reaction tasks, so a static "online"
    // report is all the engine needs.
    let (_tx, handle) = connectivity::channel(ConnectivityState::online_wifi());

    EdgeRuntime::with_defaults(runtime_config, Arc::new(kv), handle)
        .await
        .map_err(CliError::from)
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn discover(args: DiscoverArgs, runtime: &EdgeRuntime) -> Result<(), CliError> {
    let options = DiscoverOptions {
        background: false,
        merge: args.merge,
    };
    let report = runtime.discover(options).await?;

    if let Some(reason) = report.sweep_skipped {
        let label = match reason {
            SweepSkipReason::NotWifi => "subnet sweep skipped: not on WiFi",
            SweepSkipReason::Disabled => "subnet sweep disabled by config",
            SweepSkipReason::NoLocalAddress => "subnet sweep skipped: no local address",
        };
        println!("{}", label.yellow());
    }

    if report.devices.is_empty() {
        println!("{}", "no edge devices found".red());
        return Ok(());
    }

    let snapshot = runtime.discovery_snapshot().await;
    for device in &report.devices {
        let preferred = snapshot.preferred == Some(device.ip_address);
        let marker = if preferred { "*" } else { " " };
        println!(
            "{marker} {}:{}  {:<24}  quality {:.2}  {}ms  v{}",
            device.ip_address.green(),
            device.port,
            device.name,
            device.quality,
            device.response_time_ms,
            device.version.as_deref().unwrap_or("?"),
        );
    }
    Ok(())
}

async fn probe(args: ProbeArgs) -> Result<(), CliError> {
    let prober =
        medlink_api::Prober::with_defaults().map_err(|e| CliError::Engine(e.to_string()))?;

    match prober.probe(args.ip, args.port).await {
        Some(success) => {
            println!(
                "{} {}:{} answered in {}ms",
                "ok".green().bold(),
                args.ip,
                args.port,
                success.elapsed_ms
            );
            if let Some(name) = success.health.name {
                println!("  name:    {name}");
            }
            if let Some(version) = success.health.version {
                println!("  version: {version}");
            }
            for (flag, enabled) in &success.health.capabilities {
                if *enabled {
                    println!("  capability: {flag}");
                }
            }
            Ok(())
        }
        None => Err(CliError::ProbeNegative {
            ip: args.ip.to_string(),
            port: args.port,
        }),
    }
}

async fn status(runtime: &EdgeRuntime) -> Result<(), CliError> {
    let state = runtime.endpoint_state();
    let snapshot = runtime.discovery_snapshot().await;
    let queue_len = runtime.store().queue_len().await;
    let cache_len = runtime.store().cache_len().await;
    let last_sync = runtime.store().last_sync().await;

    println!("transport:  {}", state.transport.bold());
    println!("endpoint:   {}", state.endpoint);
    println!("devices:    {}", snapshot.devices.len());
    if let Some(device) = snapshot.preferred_device() {
        let pin = if snapshot.preferred_pinned { " (pinned)" } else { "" };
        println!(
            "preferred:  {}:{} quality {:.2}{pin}",
            device.ip_address, device.port, device.quality
        );
    }
    if let Some(at) = snapshot.last_discovery {
        println!("discovered: {at}");
    }
    println!("queued:     {queue_len}");
    println!("cached:     {cache_len}");
    match last_sync {
        Some(at) => println!("last sync:  {at}"),
        None => println!("last sync:  never"),
    }
    Ok(())
}

async fn sync(runtime: &EdgeRuntime) -> Result<(), CliError> {
    let outcome = runtime.sync().await?;
    if outcome.attempted == 0 {
        println!("{}", "queue empty -- nothing to sync".dimmed());
    } else {
        println!(
            "synced {} of {} queued requests ({} failed)",
            outcome.synced.green(),
            outcome.attempted,
            outcome.failed
        );
    }
    Ok(())
}

async fn translate(args: TranslateArgs, runtime: &EdgeRuntime) -> Result<(), CliError> {
    let job = TranslationJob::text(args.text, args.source, args.target, args.context);
    let result = runtime.translate(job).await?;

    if let Some(text) = result.translated_text {
        println!("{text}");
    }
    let confidence = result
        .confidence
        .map_or_else(|| "?".into(), |c| format!("{c:.2}"));
    println!(
        "{}",
        format!("via {} (confidence {confidence})", result.source).dimmed()
    );
    Ok(())
}

async fn device(cmd: DeviceCommand, runtime: &EdgeRuntime) -> Result<(), CliError> {
    match cmd {
        DeviceCommand::Add(args) => {
            let device = runtime.add_manual_device(args.ip, args.port).await?;
            println!(
                "added {}:{} (quality {:.2})",
                device.ip_address.green(),
                device.port,
                device.quality
            );
        }
        DeviceCommand::Remove { ip } => {
            runtime.remove_device(ip).await?;
            println!("removed {ip}");
        }
        DeviceCommand::Prefer { ip } => {
            runtime.set_preferred_device(ip).await?;
            println!("preferred {} (pinned)", ip.green());
        }
    }
    Ok(())
}
