//! Server implementation

#![warn(missing_docs)]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dispatch_core::Config;
use eyre::Result;
use tracing::info;

/// Default port of the fleet service
const FLEET_PORT_DEFAULT: u16 = 8087;

/// Default port of the customer service
const CUSTOMER_PORT_DEFAULT: u16 = 8081;

/// Truck dispatch demo services
#[derive(Parser, Debug)]
#[command(name = "dispatch")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Starts the fleet service answering truck lookups per region
    Fleet {
        #[command(flatten)]
        listen: Listen,
    },
    /// Starts the customer service
    Customer {
        #[command(flatten)]
        listen: Listen,

        /// Let all queries into the record store at once
        #[arg(long)]
        gate_disabled: bool,

        /// Base URL of the fleet service
        #[arg(long)]
        fleet_url: Option<String>,
    },
}

/// Where and how to listen for HTTP requests
#[derive(Args, Debug)]
struct Listen {
    /// Host for the HTTP server to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port for the HTTP server to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of HTTP worker threads
    #[arg(long, default_value_t = 64)]
    threads: usize,
}

impl Listen {
    fn addr(&self, default_port: u16) -> String {
        format!("{}:{}", self.host, self.port.unwrap_or(default_port))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Fleet { listen } => {
            let fleet = dispatch_fleet::launch(&config.fleet)?;
            info!(service = "fleet", "launched");
            dispatch_server::serve(fleet, &listen.addr(FLEET_PORT_DEFAULT), listen.threads)?
                .wait();
        }
        Command::Customer {
            listen,
            gate_disabled,
            fleet_url,
        } => {
            config.customer.gate_disabled |= gate_disabled;
            if let Some(url) = fleet_url {
                config.customer.fleet_url = url;
            }
            let customer = dispatch_customer::launch(&config.customer)?;
            info!(service = "customer", fleet = %config.customer.fleet_url, "launched");
            dispatch_server::serve(
                customer,
                &listen.addr(CUSTOMER_PORT_DEFAULT),
                listen.threads,
            )?
            .wait();
        }
    }

    Ok(())
}
