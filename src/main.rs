use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{info, warn};
use wireprobe::config;
use wireprobe::discovery::DiscoveryCoordinator;
use wireprobe::host::{is_privileged, LinuxHost};
use wireprobe::telemetry::{init_logging, ProbeMetrics};
use wireprobe::transport::{RetrySchedule, Transport, UdpExchange};

#[derive(Parser)]
#[command(name = "wireprobe")]
#[command(about = "Locate the wire server endpoint, gateway and static routes over DHCP")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run one discovery round
    Probe {
        /// Path to config.toml (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the discovered values as TOML
        #[arg(long)]
        print: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate config.toml
    Validate {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Config {
            action: ConfigAction::Validate {
                config: config_path,
            },
        }) => {
            init_logging(None);
            cmd_config_validate(&config_path)
        }
        Some(Commands::Probe {
            config: config_path,
            print,
        }) => cmd_probe(config_path.as_deref(), print),
        None => cmd_probe(None, false),
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn cmd_probe(config_path: Option<&Path>, print: bool) -> Result<(), String> {
    let cfg = config::load_or_default(config_path)
        .map_err(|e| format!("Failed to load config: {}", e))?;

    // RUST_LOG still wins over the [logging] section
    init_logging(Some(&cfg.logging));
    info!("wireprobe starting...");

    let validation = config::validate(&cfg);
    validation.print_diagnostics();
    if validation.has_errors() {
        return Err("Invalid configuration".to_string());
    }

    if !is_privileged() {
        warn!("Not running as root; binding the DHCP client port and editing routes will likely fail");
    }

    let ifname = match cfg.interface.name.clone() {
        Some(name) => name,
        None => LinuxHost::detect_interface()
            .map_err(|e| format!("Failed to detect interface: {}", e))?,
    };
    info!("Using interface {}", ifname);

    let host = LinuxHost::new(ifname, cfg.dhcp_service.name.clone());
    let exchange = UdpExchange::new(cfg.probe.receive_timeout()).with_server(cfg.probe.server_addr);
    let metrics = Arc::new(ProbeMetrics::new());
    let transport = Transport::new(
        exchange,
        RetrySchedule::new(cfg.probe.retry_delays()),
        metrics.clone(),
    );
    let mut coordinator = DiscoveryCoordinator::new(
        host,
        transport,
        cfg.probe.endpoint_path(),
        cfg.probe.link_poll_interval(),
    );

    let rt = Runtime::new().map_err(|e| format!("Failed to create runtime: {}", e))?;

    // The probe blocks (link wait, socket reads), so it runs off the runtime
    // and Ctrl-C can abandon it.
    let outcome = rt.block_on(async move {
        let probe = tokio::task::spawn_blocking(move || coordinator.probe());
        tokio::select! {
            joined = probe => joined.map_err(|e| format!("Probe task failed: {}", e)),
            _ = tokio::signal::ctrl_c() => Err("Interrupted".to_string()),
        }
    });
    rt.shutdown_background();

    for (name, value) in metrics.export() {
        info!("Metric {} = {}", name, value);
    }

    match outcome? {
        Ok(Some(discovery)) => {
            info!(
                "Discovery complete: endpoint={:?}, gateway={:?}, {} routes",
                discovery.endpoint(),
                discovery.gateway(),
                discovery.routes().len()
            );
            if print {
                let rendered = toml::to_string_pretty(&*discovery)
                    .map_err(|e| format!("Failed to render result: {}", e))?;
                println!("{}", rendered);
            }
            Ok(())
        }
        Ok(None) => Err("No usable DHCP response".to_string()),
        Err(e) => Err(format!("Probe failed: {}", e)),
    }
}

fn cmd_config_validate(config_path: &Path) -> Result<(), String> {
    println!("[INFO] Validating {}...", config_path.display());

    let cfg = config::load(config_path).map_err(|e| format!("Failed to parse config: {}", e))?;

    let validation = config::validate(&cfg);
    validation.print_diagnostics();

    if validation.has_errors() {
        Err("Validation failed".to_string())
    } else {
        println!("[INFO] Configuration is valid");
        Ok(())
    }
}
