mod cache;
mod config;
mod dashboard;
mod ons;
mod registry;
mod server;
mod series;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};

use crate::cache::ResponseCache;
use crate::config::DashboardConfig;
use crate::dashboard::Dashboard;
use crate::ons::OnsClient;
use crate::ons::endpoints;

#[derive(Parser)]
#[command(about = "Intraday charts of ONS generation, load and reservoir data")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve chart data over HTTP (default)
    Serve,
    /// Fetch endpoints once and print their groupings as tables
    Show {
        /// Endpoint identifiers, e.g. Geracao_SIN_Eolica_json
        #[arg(short, long = "endpoint", required = true)]
        endpoints: Vec<String>,
    },
    /// List the known endpoints
    Endpoints,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = DashboardConfig::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => server::start_server(config).await,
        Command::Show { endpoints: selection } => show(config, &selection).await,
        Command::Endpoints => {
            for (category, list) in endpoints::by_category() {
                println!("{}:", category);
                for endpoint in list {
                    println!("  - {}: {}", endpoint.name, endpoint.id);
                }
            }
            Ok(())
        }
    }
}

async fn show(config: DashboardConfig, selection: &[String]) -> Result<()> {
    let client = OnsClient::new(config.base_url);
    let mut dashboard = Dashboard::new(ResponseCache::new(config.cache_duration), config.utc_offset);

    for endpoint in selection {
        let landing = dashboard.toggle_on(&client, endpoint, Utc::now()).await?;
        if let Some(notice) = &landing.notice {
            println!("{}: {}", endpoint, notice.message());
        }
        if landing.skipped > 0 {
            println!("{}: {} records skipped", endpoint, landing.skipped);
        }
    }

    if dashboard.registry().is_empty() {
        println!("No series loaded");
    }

    for key in dashboard.registry().grouping_keys() {
        let Some(grouping) = dashboard.registry().grouping(key) else {
            continue;
        };
        let columns = grouping.series();

        println!("\n=== {} ===\n", key);
        print!("{:>5}", "Slot");
        for s in columns {
            print!(" | {:>13}", s.tag.label());
        }
        println!();

        for (idx, slot) in series::grid::grid().iter().enumerate() {
            print!("{:>5}", slot.to_string());
            for s in columns {
                match s.points[idx].value {
                    Some(v) => print!(" | {:>13.2}", v),
                    None => print!(" | {:>13}", "-"),
                }
            }
            println!();
        }

        for s in columns {
            if let Some(stats) = s.stats() {
                println!(
                    "{}: min {:.2} MW, max {:.2} MW, mean {:.2} MW over {} slots",
                    s.tag, stats.min, stats.max, stats.mean, stats.present
                );
            }
        }
    }

    Ok(())
}
