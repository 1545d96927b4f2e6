use blob_store::config::AppConfig;
use blob_store::service::ContentService;
use blob_store::{logging, ByteStore, StoreError};
use clap::{Parser, Subcommand};
use log::{error, info};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "blobstore", version, about = "Save, fetch, list and delete binary payloads")]
struct Cli {
    /// YAML configuration file (defaults to ./blobstore.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a file and print its identifier
    Put {
        file: PathBuf,
        /// Store under this identifier instead of a generated one
        #[arg(long)]
        id: Option<String>,
    },
    /// Write an entry's bytes to stdout or a file
    Get {
        id: String,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// List live identifiers
    List {
        #[arg(long)]
        json: bool,
    },
    /// Delete an entry
    Delete { id: String },
    /// Print an entry's MD5 checksum
    Checksum { id: String },
}

fn run(command: Command, store: Arc<dyn ByteStore>) -> Result<(), StoreError> {
    match command {
        Command::Put { file, id } => {
            let mut input = File::open(&file)?;
            let id = match id {
                Some(id) => {
                    store.create_with_id(&mut input, &id)?;
                    id
                }
                None => store.create(&mut input)?,
            };
            println!("{}", id);
        }
        Command::Get { id, output } => {
            let mut reader = store.read(&id)?;
            match output {
                Some(path) => {
                    let mut file = File::create(&path)?;
                    io::copy(&mut reader, &mut file)?;
                    file.sync_all()?;
                }
                None => {
                    let stdout = io::stdout();
                    let mut lock = stdout.lock();
                    io::copy(&mut reader, &mut lock)?;
                    lock.flush()?;
                }
            }
        }
        Command::List { json } => {
            let mut ids: Vec<_> = store.list()?.into_iter().collect();
            ids.sort();
            if json {
                let rendered = serde_json::to_string(&ids)
                    .map_err(|e| StoreError::Io(io::Error::new(io::ErrorKind::Other, e)))?;
                println!("{}", rendered);
            } else {
                for id in ids {
                    println!("{}", id);
                }
            }
        }
        Command::Delete { id } => {
            store.delete(&id)?;
        }
        Command::Checksum { id } => {
            let content = ContentService::new(store).load(&id)?;
            println!("{}  {}", content.checksum, content.identifier);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("blobstore: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.logging);
    log_mdc::insert("backend", config.storage.backend.to_string());
    info!("Starting blobstore with {} backend", config.storage.backend);

    let result = config
        .storage
        .create_store()
        .and_then(|store| run(cli.command, store));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("blobstore: {:?}: {}", e.kind(), e);
            ExitCode::FAILURE
        }
    }
}
