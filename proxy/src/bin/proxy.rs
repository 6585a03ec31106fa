//! mcproxy binary.

use clap::{CommandFactory, Parser};
use mcproxy::Config;
use mcproxy::config::ConfigError;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mcproxy")]
#[command(about = "Sharding proxy for the memcached binary protocol")]
struct Args {
    /// Path to configuration file
    config: Option<PathBuf>,

    /// Backend server address, `host:port` or a unix socket path (repeatable)
    #[arg(long = "server", value_name = "ADDR")]
    servers: Vec<String>,

    /// Proxy bind address, e.g. `0.0.0.0:11212` or `:11212`
    #[arg(long, value_parser = parse_bind)]
    bind: Option<SocketAddr>,

    /// Maximum idle connections per backend server
    #[arg(long)]
    idle: Option<usize>,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return;
    }

    let mut config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    config.backend.servers.extend(args.servers);
    if let Some(bind) = args.bind {
        config.proxy.listen = bind;
    }
    if let Some(idle) = args.idle {
        config.backend.max_idle = idle;
    }

    match config.validate() {
        Ok(()) => {}
        Err(ConfigError::NoBackends) => {
            eprintln!("No backend servers configured");
            let _ = Args::command().print_help();
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    }

    // Initialize logging
    mcproxy::logging::init(&config.logging);

    // Install signal handler
    let shutdown = match mcproxy::signal::install_signal_handler() {
        Ok(shutdown) => shutdown,
        Err(e) => {
            eprintln!("Failed to set signal handler: {}", e);
            std::process::exit(1);
        }
    };

    // Run the proxy
    if let Err(e) = mcproxy::run(&config, shutdown) {
        tracing::error!(error = %e, "Proxy error");
        std::process::exit(1);
    }
}

/// Accept a bare `:port` as shorthand for all interfaces.
fn parse_bind(s: &str) -> Result<SocketAddr, String> {
    let full = match s.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => s.to_string(),
    };
    full.parse().map_err(|e| format!("invalid bind address {s:?}: {e}"))
}

const DEFAULT_CONFIG: &str = r#"# mcproxy configuration

[proxy]
# Address to listen on for client connections
listen = "0.0.0.0:11212"

[backend]
# Backend memcached servers: "host:port" or a unix socket path
servers = ["127.0.0.1:11211"]

# Idle connections kept per backend server
max_idle = 10

# Connect timeout in milliseconds, also used for health probes
connect_timeout_ms = 100

[selector]
# "ketama": consistent hashing over healthy servers
# "modulo": crc32(key) % servers, no health checks
kind = "ketama"

# Ring points per server (ketama only)
points = 200

# Health probe interval in milliseconds (ketama only)
probe_interval_ms = 1000

[workers]
# Number of runtime worker threads (default: number of CPUs)
# threads = 4

[logging]
# Log level: "error", "warn", "info", "debug", "trace"
level = "info"

# Log format: "pretty", "json", or "compact"
format = "pretty"
"#;

fn print_default_config() {
    print!("{}", DEFAULT_CONFIG);
}
