//! Command line access to passes and attendance.

use std::env::args;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use eqr::db::PgStore;
use eqr::{Config, Tracker};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Please use one of `migrate`, `issue-passes <event>`, \
    `pass <event> <member>`, `scan <event> <raw>`, or `summary <event>`.";

#[derive(Debug)]
enum Command {
    Migrate,
    IssuePasses { event_id: i64 },
    Pass { event_id: i64, member_id: String },
    Scan { event_id: i64, raw: String },
    Summary { event_id: i64 },
}

impl Command {
    /// Checks the arguments before anything touches the database.
    fn parse(args: &[String]) -> Result<Self> {
        Ok(match args.first().map(String::as_str) {
            Some("migrate") => Command::Migrate,
            Some("issue-passes") => Command::IssuePasses {
                event_id: event_arg(args)?,
            },
            Some("pass") => Command::Pass {
                event_id: event_arg(args)?,
                member_id: args.get(2).context("No member ID provided.")?.clone(),
            },
            Some("scan") => Command::Scan {
                event_id: event_arg(args)?,
                raw: args.get(2).context("No scan data provided.")?.clone(),
            },
            Some("summary") => Command::Summary {
                event_id: event_arg(args)?,
            },
            Some(other) => bail!("Unexpected command `{other}`. {USAGE}"),
            None => bail!("No command provided. {USAGE}"),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("eqr=info")),
        )
        .init();

    let args: Vec<String> = args().skip(1).collect();
    let command = Command::parse(&args)?;

    let config = Config::from_env()?;
    let store = PgStore::connect(config.database_url()?).await?;
    if let Command::Migrate = command {
        store.run_migrations().await?;
        println!("Migrations are up to date.");
        return Ok(());
    }

    let tracker = Tracker::new(Arc::new(store), &config)?;
    match command {
        Command::Migrate => {}
        Command::IssuePasses { event_id } => {
            let issued = tracker
                .generate_event_passes(&eqr::Actor::Staff, event_id)
                .await?;
            print_json(&serde_json::json!({ "eventId": event_id, "issued": issued }))?;
        }
        Command::Pass {
            event_id,
            member_id,
        } => {
            print_json(&tracker.get_or_issue_pass(&member_id, event_id).await?)?;
        }
        Command::Scan { event_id, raw } => match tracker.ingest_scan(event_id, &raw).await {
            Ok(outcome) => {
                eprintln!("{}", outcome.message());
                print_json(&outcome)?;
            }
            Err(err) => {
                let (_status, body) = err.as_response();
                print_json(&body)?;
                std::process::exit(1);
            }
        },
        Command::Summary { event_id } => {
            print_json(&tracker.event_summary(event_id).await?)?;
        }
    }

    Ok(())
}

fn event_arg(args: &[String]) -> Result<i64> {
    let event_id = args.get(1).context("No event ID provided.")?;
    event_id
        .parse()
        .with_context(|| format!("`{event_id}` is not a valid event ID."))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
