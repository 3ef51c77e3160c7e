use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use movies::config::{DEFAULT_ENDPOINT, DEFAULT_REGION, DEFAULT_TABLE_NAME};
use movies::loader::{DEFAULT_DATA_FILE, load_records, read_records};
use movies::tutorial::{self, QUERY_YEAR, SAMPLE_TITLE, SAMPLE_YEAR};
use movies::{DynamoAgent, MemoryStore, RecordKey, RecordStore, StoreConfig, TableSchema};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Movies tutorial - basic DynamoDB table operations
#[derive(Parser, Debug)]
#[command(name = "movies")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// AWS region of the table
    #[arg(long, global = true, default_value = DEFAULT_REGION, env = "AWS_REGION")]
    region: String,

    /// DynamoDB endpoint; use "aws" to target the managed service
    #[arg(long, global = true, default_value = DEFAULT_ENDPOINT, env = "AWS_ENDPOINT_URL")]
    endpoint_url: String,

    /// Table holding the movies
    #[arg(long, global = true, default_value = DEFAULT_TABLE_NAME, env = "MOVIES_TABLE")]
    table_name: String,

    /// Run against an in-memory table instead of DynamoDB
    #[arg(long, global = true)]
    memory: bool,
}

impl StoreArgs {
    fn config(&self) -> StoreConfig {
        StoreConfig {
            region: self.region.clone(),
            endpoint_url: (self.endpoint_url != "aws").then(|| self.endpoint_url.clone()),
            schema: TableSchema::default().with_table_name(&self.table_name),
        }
    }
}

#[derive(Args, Debug)]
struct MovieArgs {
    #[arg(long, default_value_t = SAMPLE_YEAR)]
    year: i64,

    #[arg(long, default_value = SAMPLE_TITLE)]
    title: String,
}

impl MovieArgs {
    fn key(&self) -> RecordKey {
        RecordKey::new(self.year, &self.title)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the movies table
    CreateTable,
    /// Delete the movies table
    DeleteTable,
    /// Load movies from a JSON file
    Load {
        #[arg(long, default_value = DEFAULT_DATA_FILE)]
        file: PathBuf,
    },
    /// Put a new movie with a plot and a zero rating
    Put(MovieArgs),
    /// Read a movie and print it
    Get(MovieArgs),
    /// Set the rating, plot and actors of a movie
    Update(MovieArgs),
    /// Add one to a movie's rating
    Increment(MovieArgs),
    /// Remove the first actor if the movie has more than three
    ConditionalUpdate(MovieArgs),
    /// Delete a movie if its rating is five or less
    Delete(MovieArgs),
    /// List the movies of one year
    Query {
        #[arg(long, default_value_t = QUERY_YEAR)]
        year: i64,
    },
    /// Load the data file and run every item step in order
    Walkthrough {
        #[arg(long, default_value = DEFAULT_DATA_FILE)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "movies=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = cli.store.config();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if cli.store.memory {
        tracing::info!("using in-memory table");
        let store = MemoryStore::with_schema(config.schema.clone());
        return run_item_command(&store, cli.command, &mut out).await;
    }

    tracing::info!(endpoint = %config.target_display(), table = %config.table_name(), "connecting");
    let agent = DynamoAgent::connect(&config).await;

    match cli.command {
        Command::CreateTable => {
            let status = agent.create_table().await?;
            writeln!(out, "Table status: {status}")?;
        }
        Command::DeleteTable => {
            agent.delete_table().await?;
            writeln!(out, "Table {} deleted.", agent.schema().table_name)?;
        }
        command => run_item_command(&agent, command, &mut out).await?,
    }

    Ok(())
}

async fn run_item_command(
    store: &dyn RecordStore,
    command: Command,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        Command::CreateTable | Command::DeleteTable => {
            writeln!(out, "Table management needs DynamoDB; drop --memory.")?;
        }
        Command::Load { file } => {
            let records = read_records(&file)?;
            let count = load_records(store, &records, out).await?;
            writeln!(out, "Loaded {count} movies.")?;
        }
        Command::Put(movie) => tutorial::put_movie(store, &movie.key(), out).await?,
        Command::Get(movie) => {
            tutorial::get_movie(store, &movie.key(), out).await?;
        }
        Command::Update(movie) => {
            tutorial::update_movie(store, &movie.key(), out).await?;
        }
        Command::Increment(movie) => {
            tutorial::increment_rating(store, &movie.key(), out).await?;
        }
        Command::ConditionalUpdate(movie) => {
            tutorial::remove_first_actor_if_crowded(store, &movie.key(), out).await?;
        }
        Command::Delete(movie) => {
            tutorial::delete_if_poorly_rated(store, &movie.key(), out).await?;
        }
        Command::Query { year } => {
            tutorial::query_movies(store, year, out).await?;
        }
        Command::Walkthrough { file } => {
            let records = read_records(&file)?;
            tutorial::walkthrough(store, &records, out).await?;
        }
    }
    Ok(())
}
