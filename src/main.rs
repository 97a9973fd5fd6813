use std::error::Error;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;
use workerbook::clock::{format_date, Clock, FixedClock, SystemClock};
use workerbook::config::{default_storage_root, CONFIG_FILE};
use workerbook::roster::assignable_route_managers;
use workerbook::storage::sanitize_key;
use workerbook::{Config, DailyRollover, KeyValueStore, Records};

#[derive(Parser)]
#[command(name = "workerbook")]
#[command(about = "Workerbook runtime: daily rollover and storage tools", long_about = None)]
struct Cli {
    #[arg(long, value_name = "PATH", env = "WORKERBOOK_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Storage root, overriding the config file")]
    root: Option<PathBuf>,

    #[arg(long, env = "WORKERBOOK_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long, value_name = "RFC3339", help = "Pretend the current instant is this one")]
    now: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the daily rollover once, as the app does on start")]
    Rollover,
    #[command(about = "Show storage location, business zone and last app date")]
    Info,
    #[command(about = "Print the JSON stored under a key")]
    Read {
        #[arg(value_name = "KEY")]
        key: String,
    },
    #[command(about = "Store a value under a key; non-JSON input is stored as a string")]
    Write {
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(value_name = "VALUE")]
        value: String,
    },
    #[command(about = "List route managers the logged-in console admin can assign")]
    Managers,
    #[cfg(feature = "desktop")]
    #[command(about = "Open the desktop app")]
    Desktop,
}

fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(|| {
        cli.root
            .clone()
            .unwrap_or_else(default_storage_root)
            .join(CONFIG_FILE)
    });
    let mut config = Config::load(config_path.as_path())?;
    if let Some(root) = cli.root.clone() {
        config.storage_root = Some(root);
    }
    let calendar = config.business_calendar()?;
    let store = config.open_store(cli.password.as_deref())?;
    let clock: Box<dyn Clock> = match cli.now {
        Some(now) => Box::new(FixedClock(now)),
        None => Box::new(SystemClock),
    };

    match cli.command {
        Commands::Rollover => {
            let rollover = DailyRollover::new(config.keys.clone(), calendar);
            let outcome = rollover.run(&store, clock.as_ref())?;
            print_json(&serde_json::to_value(&outcome)?)?;
        }
        Commands::Info => {
            let records = Records::new(&store, &config.keys);
            let last = records.last_app_date()?;
            print_json(&json!({
                "path": store.path().to_string_lossy(),
                "encrypted": store.is_encrypted(),
                "time_zone": calendar.time_zone().name(),
                "today": format_date(calendar.today(clock.as_ref())),
                "last_app_date": last.map(format_date),
            }))?;
        }
        Commands::Read { key } => {
            let key = sanitize_key(key.as_str())?;
            let value = store.get(key.as_str())?.unwrap_or(Value::Null);
            print_json(&value)?;
        }
        Commands::Write { key, value } => {
            let key = sanitize_key(key.as_str())?;
            let value = serde_json::from_str::<Value>(value.as_str())
                .unwrap_or(Value::String(value));
            store.set(key.as_str(), value)?;
        }
        Commands::Managers => {
            let managers = assignable_route_managers(&store, &config.keys)?;
            print_json(&serde_json::to_value(&managers)?)?;
        }
        #[cfg(feature = "desktop")]
        Commands::Desktop => {
            workerbook::desktop::run(store, config.keys, calendar)?;
        }
    }
    Ok(())
}

fn print_json(value: &Value) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
