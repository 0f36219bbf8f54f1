use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process;
use taxiload::config::DEFAULT_CHUNK_SIZE;
use taxiload::pipeline::run_pipeline;
use taxiload::readers::{DEFAULT_URL_PREFIX, Source};
use taxiload::{DatabaseConfig, Driver, IngestConfig, ingest};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "taxiload")]
#[command(version, about = "Loads NYC yellow taxi trip data into a database.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download a monthly trip file and load it into a table.
    Ingest(IngestCommand),
    /// Write a small demo table to output_<MONTH>.parquet.
    Pipeline(PipelineCommand),
}

impl Commands {
    async fn execute(&self) -> Result<()> {
        match self {
            Commands::Ingest(args) => {
                let (database, config) = args.configs()?;
                ingest(&database, &config).await?;
            }
            Commands::Pipeline(args) => {
                run_pipeline(args.month, &args.output_dir).await?;
            }
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
struct IngestCommand {
    #[arg(long = "db-user", alias = "pg-user", env = "DB_USER")]
    user: String,

    #[arg(long = "db-pass", alias = "pg-pass", env = "DB_PASS", hide_env_values = true)]
    password: String,

    #[arg(long = "db-host", alias = "pg-host", env = "DB_HOST")]
    host: String,

    #[arg(long = "db-port", alias = "pg-port", env = "DB_PORT")]
    port: Option<u16>,

    #[arg(long = "db-name", alias = "pg-db", env = "DB_NAME")]
    database: String,

    #[arg(long, value_enum, env = "DB_DRIVER", default_value_t = Driver::Postgres)]
    driver: Driver,

    #[arg(long, env = "TARGET_TABLE")]
    target_table: String,

    #[arg(long, env = "TAXI_YEAR", required_unless_present = "url")]
    year: Option<u16>,

    #[arg(long, env = "TAXI_MONTH", required_unless_present = "url",
        value_parser = clap::value_parser!(u8).range(1..=12))]
    month: Option<u8>,

    /// Rows per batch.
    #[arg(long = "chunksize", alias = "chunk-size", env = "CHUNKSIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: NonZeroUsize,

    #[arg(long, env = "URL_PREFIX", default_value = DEFAULT_URL_PREFIX)]
    url_prefix: String,

    /// Read this URL or local file instead of the monthly file.
    #[arg(long, env = "SOURCE_URL")]
    url: Option<String>,
}

impl IngestCommand {
    fn configs(&self) -> Result<(DatabaseConfig, IngestConfig)> {
        let source = match &self.url {
            Some(url) => Source::parse(url)?,
            None => {
                let year = self.year.context("--year is required")?;
                let month = self.month.context("--month is required")?;
                Source::monthly(&self.url_prefix, year, month)?
            }
        };
        let database = DatabaseConfig {
            driver: self.driver,
            user: self.user.clone(),
            password: self.password.clone(),
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
        };
        let config = IngestConfig::build(source, self.target_table.clone(), self.chunk_size)?;
        Ok((database, config))
    }
}

#[derive(Args, Debug)]
struct PipelineCommand {
    #[arg(value_name = "MONTH", allow_negative_numbers = true)]
    month: i64,

    #[arg(long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() {
    //Detect parsing errors in the .env file only.
    if let Err(e @ dotenvy::Error::LineParse(..)) = dotenvy::dotenv() {
        eprintln!("Error parsing .env file\n{e}");
        process::exit(1);
    }

    let cli = Cli::parse();

    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli.command.execute().await {
        eprintln!("{e:#}");
        process::exit(1);
    }
}
