use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use colored::Colorize;
use serde_json::json;
use tracing::debug;

use bucketfs_path::is_folder_marker;
use bucketfs_sdk::{Client, ClientConfig};
use bucketfs_store::{
    FsObjectClient, GetOptions, ObjectInfo, PutOptions, RemoveOptions, StatOptions,
};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = ClientConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let client = connect(config, cli.create_bucket).await?;

    let mut stdout = std::io::stdout().lock();
    execute(&client, cli.command, cli.format, &mut stdout).await
}

/// Build a client over the local backend rooted at `config.endpoint`.
pub async fn connect(config: ClientConfig, create_bucket: bool) -> anyhow::Result<Client> {
    let backend = FsObjectClient::new(&config.endpoint);
    debug!(root = %backend.root().display(), "using local backend");
    if create_bucket {
        backend
            .create_bucket(&config.bucket_name)
            .await
            .with_context(|| format!("creating bucket {}", config.bucket_name))?;
    }
    Ok(Client::new(config, Arc::new(backend)).await?)
}

pub async fn execute(
    client: &Client,
    command: Command,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Command::Put(args) => cmd_put(client, args, format, out).await,
        Command::Get(args) => cmd_get(client, args, out).await,
        Command::Stat(args) => {
            let info = client
                .stat_object(&args.path, &StatOptions::default())
                .await?;
            print_info(&info, format, out)
        }
        Command::Rm(args) => {
            client
                .remove_object(&args.path, &RemoveOptions::default())
                .await?;
            report(out, format, "removed", &args.path)
        }
        Command::Ls(args) => cmd_ls(client, args, format, out).await,
        Command::Mkdir(args) => {
            client.create_folder(&args.path).await?;
            report(out, format, "created", &args.path)
        }
        Command::Rmdir(args) => {
            client.remove_folder(&args.path).await?;
            report(out, format, "removed", &args.path)
        }
        Command::Folders(args) => {
            let folders = client.list_folders(&args.prefix).await?;
            match format {
                OutputFormat::Json => writeln!(out, "{}", json!(folders))?,
                OutputFormat::Text => {
                    for folder in &folders {
                        writeln!(out, "{}/", folder.blue().bold())?;
                    }
                }
            }
            Ok(())
        }
        Command::Exists(args) => {
            let exists = client.folder_exists(&args.path).await?;
            match format {
                OutputFormat::Json => {
                    writeln!(out, "{}", json!({ "path": args.path, "exists": exists }))?
                }
                OutputFormat::Text if exists => writeln!(out, "{} {}", "✓".green(), args.path)?,
                OutputFormat::Text => writeln!(out, "{} {}", "✗".red(), args.path)?,
            }
            Ok(())
        }
        Command::Cp(args) => {
            let upload = client.copy_object(&args.dest, &args.src).await?;
            match format {
                OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(&upload)?)?,
                OutputFormat::Text => writeln!(
                    out,
                    "{} {} → {}",
                    "copied".green(),
                    args.src,
                    upload.key.bold()
                )?,
            }
            Ok(())
        }
        Command::Url(args) => {
            let url = client.public_url(&args.path)?;
            match format {
                OutputFormat::Json => writeln!(out, "{}", json!({ "url": url }))?,
                OutputFormat::Text => writeln!(out, "{url}")?,
            }
            Ok(())
        }
    }
}

async fn cmd_put(
    client: &Client,
    args: PutArgs,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let body = tokio::fs::read(&args.local)
        .await
        .with_context(|| format!("reading {}", args.local.display()))?;
    let opts = PutOptions {
        content_type: args.content_type,
        ..Default::default()
    };
    let upload = client
        .put_object(&args.path, Bytes::from(body), &opts)
        .await?;

    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(&upload)?)?,
        OutputFormat::Text => writeln!(
            out,
            "{} {} ({} bytes, etag {})",
            "uploaded".green(),
            upload.key.bold(),
            upload.size,
            upload.etag.dimmed()
        )?,
    }
    Ok(())
}

async fn cmd_get(client: &Client, args: GetArgs, out: &mut impl Write) -> anyhow::Result<()> {
    let body = client
        .get_object(&args.path, &GetOptions::default())
        .await?;
    match args.output {
        Some(path) => tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("writing {}", path.display()))?,
        None => out.write_all(&body)?,
    }
    Ok(())
}

async fn cmd_ls(
    client: &Client,
    args: LsArgs,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut listing = client.list_objects(&args.prefix, args.recursive)?;
    while let Some(entry) = listing.next().await {
        let info = entry?;
        if !args.all && is_folder_marker(&info.key) {
            continue;
        }
        match format {
            OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(&info)?)?,
            OutputFormat::Text if info.is_prefix() => {
                writeln!(out, "{:>10}  {}", "DIR".dimmed(), info.key.blue().bold())?
            }
            OutputFormat::Text => writeln!(out, "{:>10}  {}", info.size, info.key)?,
        }
    }
    Ok(())
}

fn print_info(info: &ObjectInfo, format: OutputFormat, out: &mut impl Write) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(info)?)?,
        OutputFormat::Text => {
            writeln!(out, "{}", info.key.bold())?;
            writeln!(out, "  Size: {}", info.size)?;
            if let Some(modified) = info.last_modified {
                writeln!(out, "  Modified: {}", modified.to_rfc3339())?;
            }
            if let Some(etag) = &info.etag {
                writeln!(out, "  ETag: {}", etag.yellow())?;
            }
            if let Some(content_type) = &info.content_type {
                writeln!(out, "  Content-Type: {content_type}")?;
            }
        }
    }
    Ok(())
}

fn report(out: &mut impl Write, format: OutputFormat, action: &str, path: &str) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => writeln!(out, "{}", json!({ "action": action, "path": path }))?,
        OutputFormat::Text => writeln!(out, "{} {} {}", "✓".green().bold(), action, path)?,
    }
    Ok(())
}
