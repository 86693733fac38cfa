use std::path::PathBuf;

use anyhow::{anyhow, Result};
use futures::TryStreamExt;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cos_fs::config;
use cos_fs::drivers::cos::{create_client, CosAdapter, CosFilesystem};
use cos_fs::storage::{FilesystemAdapter, MoveOutcome, StorageAttributes, Visibility, WriteOptions};

const USAGE: &str = "Usage: cos-fs [--config FILE] <command> [args]

Commands:
  ls [-r] [PREFIX]          list a directory (-r: recursive)
  stat KEY                  show file metadata
  cat KEY                   write a file to stdout
  put LOCAL KEY             upload a local file
  rm KEY                    delete a file
  cp SRC DST                copy a file
  mv SRC DST                move a file
  url KEY                   print an access URL
  chmod public|private KEY  change visibility";

/// Parsed command line / 命令行参数
struct Cli {
    config: Option<PathBuf>,
    command: String,
    args: Vec<String>,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Option<Cli>> {
    let mut config = None;
    let mut rest = Vec::new();
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = raw.next().ok_or_else(|| anyhow!("--config requires a file"))?;
                config = Some(PathBuf::from(path));
            }
            "--version" | "-V" => {
                println!("cos-fs {} (built {})", env!("CARGO_PKG_VERSION"), env!("BUILD_TIME"));
                return Ok(None);
            }
            "--help" | "-h" => {
                println!("{}", USAGE);
                return Ok(None);
            }
            _ => rest.push(arg),
        }
    }
    if rest.is_empty() {
        return Err(anyhow!("missing command\n\n{}", USAGE));
    }
    let command = rest.remove(0);
    Ok(Some(Cli { config, command, args: rest }))
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing argument <{}>\n\n{}", name, USAGE))
}

fn print_entry(entry: &StorageAttributes) {
    match entry {
        StorageAttributes::Directory(dir) => println!("{:>12}  {:<25}  {}/", "-", "-", dir.path()),
        StorageAttributes::File(file) => {
            let modified = file
                .last_modified()
                .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            let size = file
                .file_size()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("{:>12}  {:<25}  {}", size, modified, file.path());
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let app_config = config::load_config(cli.config.as_deref())?;
    let client = create_client(app_config.cos.clone())?;
    let fs = CosFilesystem::new(CosAdapter::new(client, app_config.cos).with_page_size(app_config.page_size));
    let adapter = fs.adapter();
    let args = &cli.args;

    match cli.command.as_str() {
        "ls" => {
            let deep = args.iter().any(|a| a == "-r");
            let prefix = args.iter().find(|a| *a != "-r").map(String::as_str).unwrap_or("");
            let mut entries = adapter.try_list_contents(prefix, deep);
            while let Some(entry) = entries.try_next().await? {
                print_entry(&entry);
            }
        }
        "stat" => {
            let path = arg(args, 0, "KEY")?;
            let meta = adapter.metadata(path).await?;
            let visibility = adapter.visibility(path).await?;
            println!("path:          {}", meta.path());
            println!("size:          {}", meta.file_size().unwrap_or_default());
            println!("mime_type:     {}", meta.mime_type().unwrap_or("-"));
            println!("last_modified: {}", meta.last_modified().unwrap_or_default());
            if let Some(v) = visibility.visibility() {
                println!("visibility:    {}", v);
            }
        }
        "cat" => {
            let path = arg(args, 0, "KEY")?;
            let mut reader = adapter.read_stream(path).await?;
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut reader, &mut stdout).await?;
            stdout.flush().await?;
        }
        "put" => {
            let local = arg(args, 0, "LOCAL")?;
            let path = arg(args, 1, "KEY")?;
            let file = tokio::fs::File::open(local).await?;
            adapter
                .write_stream(path, Box::new(file), &WriteOptions::default())
                .await?;
            tracing::info!("Uploaded {} -> {}", local, path);
        }
        "rm" => {
            let path = arg(args, 0, "KEY")?;
            adapter.delete(path).await?;
        }
        "cp" => {
            let from = arg(args, 0, "SRC")?;
            let to = arg(args, 1, "DST")?;
            adapter.copy(from, to, &WriteOptions::default()).await?;
        }
        "mv" => {
            let from = arg(args, 0, "SRC")?;
            let to = arg(args, 1, "DST")?;
            if let MoveOutcome::SourceRetained { cause } =
                adapter.move_file(from, to, &WriteOptions::default()).await?
            {
                eprintln!("copied to {} but {} could not be deleted: {}", to, from, cause);
            }
        }
        "url" => {
            let path = arg(args, 0, "KEY")?;
            println!("{}", fs.url(path)?);
        }
        "chmod" => {
            let visibility: Visibility = arg(args, 0, "public|private")?
                .parse()
                .map_err(|e| anyhow!("{}", e))?;
            let path = arg(args, 1, "KEY")?;
            adapter.set_visibility(path, visibility).await?;
        }
        other => return Err(anyhow!("unknown command: {}\n\n{}", other, USAGE)),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cos_fs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match parse_args(std::env::args().skip(1))? {
        Some(cli) => run(cli).await,
        None => Ok(()),
    }
}
