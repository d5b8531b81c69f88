#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{anyhow, Result};
use rdsh::config::Limits;
use rdsh::daemon::RemoteClient;
use rdsh::executor::Endpoints;
use rdsh::shell::{self, LocalShell};
use std::env;
use std::io;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args: Vec<String> = env::args().collect();
    let mut server: Option<String> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" => {
                let addr = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow!("-c needs HOST:PORT"))?;
                server = Some(addr.clone());
                i += 2;
            }
            "-h" | "--help" => {
                print_help();
                return Ok(());
            }
            other => {
                eprintln!("Error: unknown option '{}'", other);
                print_help();
                process::exit(1);
            }
        }
    }

    let stdin = io::stdin();
    let input = stdin.lock();
    let mut stdout = io::stdout();

    match server {
        Some(addr) => {
            let mut client = RemoteClient::connect(addr.as_str())?;
            shell::run_remote(&mut client, input, &mut stdout)
        }
        None => {
            let mut local = LocalShell::new(Limits::from_env());
            let rc = local.run(input, &mut stdout, &Endpoints::terminal())?;
            process::exit(rc);
        }
    }
}

fn print_help() {
    println!("rdsh v{} - local and remote shell", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage:");
    println!("  rdsh                Start the local shell");
    println!("  rdsh -c HOST:PORT   Connect to an rdshd server");
    println!("  rdsh -h, --help     Show this help message");
    println!();
    println!("Built-ins: cd, dragon, exit, rc (stop-server when remote)");
}
