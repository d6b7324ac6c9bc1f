//! # azstore CLI
//!
//! Binary entry point: the book demo plus blob and queue commands.
//!
//! The default `memory` backend lives only for the duration of one command;
//! build with `--features azure` and set `STORAGE_BACKEND=azure` to work
//! against a real account or the emulator.

mod book;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use azstore::{AzureStorage, BackendKind, StorageConfig};

#[derive(Parser, Debug)]
#[command(name = "azstore")]
#[command(about = "Work with Azure Storage tables, blobs and queues")]
struct Cli {
    #[command(flatten)]
    storage: StorageArgs,

    #[command(subcommand)]
    command: Command,
}

/// Flags that override the environment
#[derive(Args, Debug)]
struct StorageArgs {
    /// Storage backend: memory or azure
    #[arg(long, global = true)]
    backend: Option<BackendKind>,

    /// Account connection string
    #[arg(long, global = true)]
    connection_string: Option<String>,

    /// Prefix prepended to every table name
    #[arg(long, global = true)]
    table_prefix: Option<String>,

    /// Concurrency limit for parallel operations
    #[arg(long, global = true)]
    parallelism: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Save a book to the Book table and read it back
    Demo,

    /// Blob operations
    #[command(subcommand)]
    Blob(BlobCommand),

    /// Queue operations
    #[command(subcommand)]
    Queue(QueueCommand),
}

#[derive(Subcommand, Debug)]
enum BlobCommand {
    /// Upload a local file
    Put {
        container: String,
        name: String,
        file: PathBuf,
        /// Fail if the blob already exists
        #[arg(long)]
        no_overwrite: bool,
    },
    /// Download a blob to a file, or stdout when no file is given
    Get {
        container: String,
        name: String,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// List blobs under a prefix
    Ls {
        container: String,
        #[arg(default_value = "")]
        prefix: String,
        /// Only one level below the prefix, folders included
        #[arg(long)]
        single_level: bool,
    },
    /// Delete one or more blobs
    Rm {
        container: String,
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum QueueCommand {
    /// Send a message
    Send { queue: String, body: String },
    /// Show visible messages without hiding them
    Peek {
        queue: String,
        #[arg(short, long, default_value = "32")]
        max: usize,
    },
    /// Receive and delete messages
    Receive {
        queue: String,
        #[arg(short, long, default_value = "32")]
        max: usize,
        /// Visibility timeout in seconds
        #[arg(long, default_value = "30")]
        visibility: u64,
        /// Leave received messages in the queue
        #[arg(long)]
        keep: bool,
    },
}

impl StorageArgs {
    fn apply(self, config: &mut StorageConfig) {
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(connection_string) = self.connection_string {
            config.connection_string = connection_string;
        }
        if let Some(prefix) = self.table_prefix {
            config.table_prefix = prefix;
        }
        if let Some(parallelism) = self.parallelism {
            config.parallelism = parallelism.max(1);
        }
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = StorageConfig::from_env()?;
    cli.storage.apply(&mut config);

    init_tracing(&config.log_level);
    tracing::info!(version = azstore::VERSION, backend = %config.backend, "Starting azstore");

    let storage = AzureStorage::from_config(&config)?;

    match cli.command {
        Command::Demo => run_demo(&storage).await,
        Command::Blob(cmd) => run_blob(&storage, cmd).await,
        Command::Queue(cmd) => run_queue(&storage, cmd).await,
    }
}

async fn run_demo(storage: &AzureStorage) -> anyhow::Result<()> {
    let tables = storage.tables();
    tables.create_table_if_not_exist::<book::Book>().await?;

    let book = book::foundation_and_empire();
    tables.save(&book).await?;

    let stored: book::Book = tables
        .retrieve(&book.partition_key, &book.row_key)
        .await?
        .context("saved book was not found")?;

    println!("{}", serde_json::to_string_pretty(&stored)?);
    Ok(())
}

async fn run_blob(storage: &AzureStorage, cmd: BlobCommand) -> anyhow::Result<()> {
    let blobs = storage.blobs();

    match cmd {
        BlobCommand::Put {
            container,
            name,
            file,
            no_overwrite,
        } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let bytes = data.len();
            blobs.container_create_if_not_exist(&container).await?;
            blobs.store_data(&container, &name, data, !no_overwrite).await?;
            println!("uploaded {container}/{name} ({bytes} bytes)");
        }
        BlobCommand::Get { container, name, out } => {
            let data = blobs.get_data(&container, &name).await?;
            match out {
                Some(path) => tokio::fs::write(&path, &data)
                    .await
                    .with_context(|| format!("writing {}", path.display()))?,
                None => {
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&data).await?;
                    stdout.flush().await?;
                }
            }
        }
        BlobCommand::Ls {
            container,
            prefix,
            single_level,
        } => {
            if single_level {
                let listing = blobs.list_single_level(&container, &prefix).await?;
                for folder in &listing.folders {
                    println!("{folder}");
                }
                for blob in &listing.blobs {
                    println!("{}\t{}", blob.name, blob.content_length);
                }
            } else {
                for blob in blobs.list(&container, &prefix).await? {
                    println!("{}\t{}", blob.name, blob.content_length);
                }
            }
        }
        BlobCommand::Rm { container, names } => {
            blobs.delete_parallel(&container, &names).await?;
            println!("deleted {} blob(s)", names.len());
        }
    }
    Ok(())
}

async fn run_queue(storage: &AzureStorage, cmd: QueueCommand) -> anyhow::Result<()> {
    let queues = storage.queues();

    match cmd {
        QueueCommand::Send { queue, body } => {
            queues.create_queue_if_not_exist(&queue).await?;
            let message = queues.send(&queue, &body).await?;
            println!("{}", message.message_id);
        }
        QueueCommand::Peek { queue, max } => {
            for message in queues.peek(&queue, max).await? {
                println!("{}\t{}", message.message_id, message.body);
            }
        }
        QueueCommand::Receive {
            queue,
            max,
            visibility,
            keep,
        } => {
            let received = queues
                .receive(&queue, max, Duration::from_secs(visibility))
                .await?;
            for message in &received {
                println!("{}\t{}", message.message_id, message.body);
                if !keep {
                    queues.delete_message(&queue, message).await?;
                }
            }
        }
    }
    Ok(())
}
