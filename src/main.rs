//! Churnsight CLI
//!
//! Runs one analytics request against the configured store and prints the
//! result as JSON on stdout. Failures print a structured error body on stderr
//! and exit non-zero.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use churnsight::{logging, AnalyticsService, AppConfig, ErrorBody, ServiceError};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "churnsight")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Churn prediction and sales analytics for an e-commerce order store", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the SQLite database path
    #[arg(long)]
    database: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train the churn model from the store and replace the saved package
    TrainChurn,
    /// Train the daily sales forecaster and replace the saved model
    TrainForecaster,
    /// Import a CSV upload
    Import { file: PathBuf },
    /// Customers most likely to churn
    Predict {
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },
    /// Predicted churners per month of last purchase
    Trends,
    /// Customers per risk segment
    Segments,
    /// Daily sales forecast
    Forecast {
        /// Days ahead; defaults to the configured forecast horizon
        #[arg(short, long)]
        days: Option<usize>,
        /// Include the recent sales history
        #[arg(long)]
        with_history: bool,
    },
    /// Demand estimates for the best-selling products
    Demand,
    /// Revenue, order and churn KPIs
    Kpis,
    /// Best-selling products by revenue
    TopProducts {
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
    /// Sales and customer breakdowns
    Breakdown {
        #[arg(value_enum)]
        by: Breakdown,
    },
    /// Order counts and cancelled share
    Stats,
    /// Raw order rows
    Orders {
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Breakdown {
    Country,
    Age,
    Month,
    Year,
}

#[derive(Serialize)]
struct Kpis {
    main: churnsight::MainKpis,
    sales: churnsight::SalesKpis,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let body = match err.downcast_ref::<ServiceError>() {
                Some(service_err) => service_err.to_body(),
                None => ErrorBody {
                    kind: "internal".to_string(),
                    message: format!("{err:#}"),
                },
            };
            match serde_json::to_string_pretty(&body) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("{}: {}", body.kind, body.message),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::default(),
    };
    if let Some(database) = cli.database {
        config.database.path = database;
        config.validate()?;
    }

    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    logging::init(level).context("Failed to set tracing subscriber")?;

    info!("Churnsight v{}", env!("CARGO_PKG_VERSION"));
    let default_days = config.data.default_forecast_days;
    let default_top_n = config.api.default_top_n;
    let mut service = AnalyticsService::new(config);

    match cli.command {
        Command::TrainChurn => print_json(&service.train_churn()?),
        Command::TrainForecaster => print_json(&service.train_forecaster()?),
        Command::Import { file } => {
            let reader = File::open(&file)
                .with_context(|| format!("Failed to open {}", file.display()))?;
            print_json(&service.upload_csv(BufReader::new(reader))?)
        }
        Command::Predict { count } => print_json(&service.predict_churn(count)?),
        Command::Trends => print_json(&service.churn_trends()?),
        Command::Segments => print_json(&service.churn_segmentation()?),
        Command::Forecast { days, with_history } => {
            let days = days.unwrap_or(default_days);
            if with_history {
                print_json(&service.full_sales_view(days)?)
            } else {
                print_json(&service.sales_forecast(days)?)
            }
        }
        Command::Demand => print_json(&service.product_demand_forecast()?),
        Command::Kpis => print_json(&Kpis {
            main: service.main_kpis()?,
            sales: service.sales_kpis()?,
        }),
        Command::TopProducts { count } => {
            print_json(&service.top_products(count.unwrap_or(default_top_n))?)
        }
        Command::Breakdown { by } => match by {
            Breakdown::Country => print_json(&service.user_distribution()?),
            Breakdown::Age => print_json(&service.sales_by_age()?),
            Breakdown::Month => print_json(&service.monthly_sales()?),
            Breakdown::Year => print_json(&service.yearly_sales()?),
        },
        Command::Stats => print_json(&service.db_stats()?),
        Command::Orders { limit } => print_json(&service.orders(limit)?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}
