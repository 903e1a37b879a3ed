//! vimview CLI
//!
//! Command-line interface for browsing a virtualization inventory

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use tracing::warn;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use vimview_invoke::ObjectIdentity;
use vimview_inventory::{
    CancelReason, CancelToken, ClientConfig, InventoryClient, ManagedObject, Task, TaskOutcome,
};

mod output;

#[derive(Parser, Debug)]
#[command(name = "vimview", version)]
#[command(about = "Browse a virtualization management inventory", long_about = None)]
struct Cli {
    /// Config file (defaults to $VIMVIEW_CONFIG or the standard locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find objects of one type below a root
    Find {
        /// Entity type (e.g. VirtualMachine, HostSystem)
        entity_type: String,
        /// Search root as TYPE:VALUE (defaults to the root folder)
        #[arg(long)]
        root: Option<ObjectIdentity>,
        /// Only the object with this name
        #[arg(long, conflicts_with = "all")]
        name: Option<String>,
        /// Every match instead of the first
        #[arg(long)]
        all: bool,
    },
    /// Fetch one object by identity
    Get {
        /// Object as TYPE:VALUE
        identity: ObjectIdentity,
    },
    /// Print the server clock
    Time,
    /// Wait for a task to finish
    Wait {
        /// Task as TYPE:VALUE
        task: ObjectIdentity,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::load_default()?,
    };
    init_tracing(&config.log_level);

    let client = InventoryClient::connect(&config).await?;
    let result = run(&client, cli.command, cli.json).await;

    if let Err(e) = client.logout().await {
        warn!(error = %e, "logout failed");
    }
    result
}

async fn run(client: &InventoryClient, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Find {
            entity_type,
            root,
            name,
            all,
        } => {
            let found = if all {
                client.find_all_by_type(&entity_type, root.as_ref()).await?
            } else if let Some(name) = name {
                vec![client.find_by_name(&entity_type, &name, root.as_ref()).await?]
            } else {
                vec![client.find_by_type(&entity_type, root.as_ref()).await?]
            };
            print_objects(&found, json, false);
        }
        Commands::Get { identity } => {
            let object = client.fetch_one(identity).await?;
            print_objects(&[object], json, true);
        }
        Commands::Time => {
            let now = client.current_time().await?;
            if json {
                println!("{}", serde_json::json!({ "time": now }));
            } else {
                println!("{}", now.to_rfc3339());
            }
        }
        Commands::Wait { task, timeout } => {
            let waiter = match timeout {
                Some(secs) => client.waiter().clone().with_timeout(Duration::from_secs(secs)),
                None => client.waiter().clone(),
            };

            let cancel = CancelToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let mut task = Task::fetch(client.session().clone(), task).await?;
            match waiter.await_completion(&mut task, &cancel).await? {
                TaskOutcome::Success(result) => {
                    if json {
                        println!("{}", serde_json::json!({ "state": "success", "result": result }));
                    } else {
                        println!("success: {}", output::describe(&result));
                    }
                }
                TaskOutcome::Failed(fault) => return Err(eyre!("task failed: {fault}")),
                TaskOutcome::Cancelled(CancelReason::Aborted) => return Err(eyre!("wait interrupted")),
                TaskOutcome::Cancelled(CancelReason::TimedOut) => return Err(eyre!("wait timed out")),
            }
        }
    }

    Ok(())
}

fn print_objects(objects: &[ManagedObject], json: bool, detail: bool) {
    if json {
        let values: Vec<_> = objects.iter().map(output::object_json).collect();
        println!("{}", serde_json::Value::Array(values));
        return;
    }
    for object in objects {
        if detail {
            println!("{}", output::detail_text(object));
        } else {
            println!("{}", output::summary_line(object));
        }
    }
}
