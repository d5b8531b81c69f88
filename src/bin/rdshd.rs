//! Remote shell server binary
//!
//! Usage: rdshd [-i IFACE] [-p PORT] [-x]

use anyhow::{anyhow, Context, Result};
use rdsh::daemon::{ConcurrencyMode, Server, ServerConfig};
use std::env;
use std::net::IpAddr;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let config = match parse_args(&args[1..]) {
        Ok(Some(config)) => config,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            process::exit(1);
        }
    };

    let server = Server::bind(config)?;
    server.register_signals()?;
    println!("rdshd listening on {}", server.local_addr()?);
    server.run()
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// `Ok(None)` means help was requested.
fn parse_args(args: &[String]) -> Result<Option<ServerConfig>> {
    let mut config = ServerConfig::from_env();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "-i" => {
                let value = args.get(i + 1).ok_or_else(|| anyhow!("-i needs an interface"))?;
                config.iface = value
                    .parse::<IpAddr>()
                    .with_context(|| format!("invalid interface '{}'", value))?;
                i += 2;
            }
            "-p" => {
                let value = args.get(i + 1).ok_or_else(|| anyhow!("-p needs a port"))?;
                config.port = value
                    .parse::<u16>()
                    .with_context(|| format!("invalid port '{}'", value))?;
                i += 2;
            }
            "-x" => {
                config.mode = ConcurrencyMode::MultiThreaded;
                i += 1;
            }
            "-h" | "--help" => return Ok(None),
            other => return Err(anyhow!("unknown option '{}'", other)),
        }
    }

    Ok(Some(config))
}

fn print_usage() {
    println!("rdshd v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: rdshd [-i IFACE] [-p PORT] [-x]");
    println!();
    println!("Options:");
    println!("  -i IFACE    Interface address to bind (default 0.0.0.0)");
    println!("  -p PORT     Port to listen on (default 1234)");
    println!("  -x          Serve each client on its own thread");
    println!("  -h, --help  Show this help message");
    println!();
    println!("Environment:");
    println!("  RDSH_MAX_COMMANDS   Pipeline length limit (default 8)");
    println!("  RDSH_MAX_REQUEST    Request size limit in bytes (default 65536)");
    println!("  RDSH_STATE_SCOPE    connection (default) or process");
    println!("  RUST_LOG            Log filter (default info)");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_all_flags() {
        let config = parse_args(&args(&["-i", "127.0.0.1", "-p", "4321", "-x"]))
            .unwrap()
            .unwrap();
        assert_eq!(config.addr().to_string(), "127.0.0.1:4321");
        assert_eq!(config.mode, ConcurrencyMode::MultiThreaded);
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        assert!(parse_args(&args(&["-p", "http"])).is_err());
        assert!(parse_args(&args(&["-p"])).is_err());
    }

    #[test]
    fn test_help() {
        assert!(parse_args(&args(&["--help"])).unwrap().is_none());
    }
}
