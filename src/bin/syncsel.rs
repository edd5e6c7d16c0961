// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use syncsel::{
    config::Settings,
    folder::{ignores::IgnoreList, Folder},
    path::{default_config_path, normalize},
    syncthing::{FolderConfig, SyncthingClient},
    CheckState, Node,
};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use std::{fs::read_to_string, io::ErrorKind, path::PathBuf, process::exit, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "syncsel [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// URL of Syncthing REST interface.
    #[arg(long, global = true, value_name = "url")]
    pub url: Option<String>,

    /// Syncthing API key.
    #[arg(long, global = true, value_name = "key")]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let client = self.client()?;
        match self.command {
            Command::Version => run_version(&client).await,
            Command::Folders => run_folders(&client).await,
            Command::Tree(opts) => run_tree(client, opts).await,
            Command::Info(opts) => run_info(client, opts).await,
            Command::Ignores(opts) => run_ignores(&client, opts).await,
            Command::Select(opts) => run_select(client, opts).await,
        }
    }

    fn client(&self) -> Result<SyncthingClient> {
        let mut settings = load_settings(self.config.as_ref())?;
        if let Some(url) = &self.url {
            settings.api.url = url.clone();
        }
        if let Some(key) = &self.api_key {
            settings.api.key = key.clone();
        }
        if settings.api.key.is_empty() {
            warn!("no API key configured, the daemon will most likely refuse requests");
        }

        Ok(SyncthingClient::from_settings(&settings.api)?)
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Show version of Syncthing daemon.
    #[command(override_usage = "syncsel version")]
    Version,

    /// List folders shared by Syncthing daemon.
    #[command(override_usage = "syncsel folders")]
    Folders,

    /// Show selection state of a folder's entries.
    #[command(override_usage = "syncsel tree [options] <folder_id> [<path>]")]
    Tree(TreeOptions),

    /// Show database record of a folder entry.
    #[command(override_usage = "syncsel info [options] <folder_id> <path>")]
    Info(InfoOptions),

    /// Show current ignore patterns of a folder.
    #[command(override_usage = "syncsel ignores [options] <folder_id>")]
    Ignores(IgnoresOptions),

    /// Include or exclude folder entries from synchronization.
    #[command(override_usage = "syncsel select [options] <folder_id>")]
    Select(SelectOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct TreeOptions {
    /// ID of folder to inspect.
    #[arg(required = true, value_name = "folder_id")]
    pub folder_id: String,

    /// Directory inside folder to list, top-level if omitted.
    #[arg(value_name = "path")]
    pub path: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InfoOptions {
    /// ID of folder to inspect.
    #[arg(required = true, value_name = "folder_id")]
    pub folder_id: String,

    /// Entry inside folder.
    #[arg(required = true, value_name = "path")]
    pub path: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct IgnoresOptions {
    /// ID of folder to inspect.
    #[arg(required = true, value_name = "folder_id")]
    pub folder_id: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SelectOptions {
    /// ID of folder to edit.
    #[arg(required = true, value_name = "folder_id")]
    pub folder_id: String,

    /// Entries to synchronize.
    #[arg(short, long, value_name = "path")]
    pub include: Vec<String>,

    /// Entries to leave out of synchronization.
    #[arg(short, long, value_name = "path")]
    pub exclude: Vec<String>,

    /// Submit without asking for confirmation.
    #[arg(short, long)]
    pub yes: bool,

    /// Only show resulting ignore patterns.
    #[arg(short, long, conflicts_with = "yes")]
    pub dry_run: bool,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    let (path, explicit) = match path {
        Some(path) => (path.clone(), true),
        None => (default_config_path()?, false),
    };

    match read_to_string(&path) {
        Ok(content) => content
            .parse::<Settings>()
            .with_context(|| format!("invalid configuration file {:?}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound && !explicit => Ok(Settings::default()),
        Err(err) => {
            Err(err).with_context(|| format!("cannot read configuration file {:?}", path.display()))
        }
    }
}

fn spinner(message: impl Into<String>) -> Result<ProgressBar> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(100));
    Ok(bar)
}

async fn open_folder(client: SyncthingClient, folder_id: &str) -> Result<Folder> {
    let folders = client.folders().await?;
    let config = folders
        .into_iter()
        .find(|folder| folder.id == folder_id)
        .ok_or_else(|| anyhow!("no folder with ID {folder_id:?}"))?;
    let root = shellexpand::tilde(&config.path).into_owned();

    Ok(Folder::new(config.id, client).with_local_root(root))
}

async fn run_version(client: &SyncthingClient) -> Result<()> {
    let version = client.version().await?;
    if version.long_version.is_empty() {
        println!("{}", version.version);
    } else {
        println!("{}", version.long_version);
    }
    Ok(())
}

async fn run_folders(client: &SyncthingClient) -> Result<()> {
    let folders: Vec<FolderConfig> = client.folders().await?;
    for folder in folders {
        println!("{}\t{}\t{}", folder.id, folder.display_name(), folder.path);
    }

    Ok(())
}

async fn run_tree(client: SyncthingClient, opts: TreeOptions) -> Result<()> {
    let path = normalize(opts.path.as_deref().unwrap_or_default());
    let mut folder = open_folder(client, &opts.folder_id).await?;

    let bar = spinner(format!("reading {:?}", opts.folder_id))?;
    let result = folder.list(&path).await;
    bar.finish_and_clear();

    for node in result? {
        print_node(&folder, &path, &node);
    }

    Ok(())
}

async fn run_info(client: SyncthingClient, opts: InfoOptions) -> Result<()> {
    let path = normalize(&opts.path);
    let mut folder = open_folder(client, &opts.folder_id).await?;

    let bar = spinner(format!("reading {path:?}"))?;
    let result = async {
        let info = folder.file_info(&path).await?;
        folder.expand_to(&path).await?;
        Ok::<_, anyhow::Error>(info)
    }
    .await;
    bar.finish_and_clear();

    match result? {
        Some(info) => println!("{}", serde_json::to_string_pretty(&info)?),
        None => println!("no database record"),
    }

    if let Some(node) = folder.selection().node(&path) {
        println!("state: {}", node.sync_state);
        if let Some(local) = &node.local {
            println!("local size: {}", local.size);
            if let Some(modified) = local.modified {
                println!("local modified: {modified}");
            }
        }
    }

    Ok(())
}

async fn run_ignores(client: &SyncthingClient, opts: IgnoresOptions) -> Result<()> {
    let ignores = client.ignores(&opts.folder_id).await?;
    print!("{ignores}");
    Ok(())
}

async fn run_select(client: SyncthingClient, opts: SelectOptions) -> Result<()> {
    if opts.include.is_empty() && opts.exclude.is_empty() {
        return Err(anyhow!("nothing to select, pass --include or --exclude"));
    }

    let mut folder = open_folder(client, &opts.folder_id).await?;
    let edits = opts
        .include
        .iter()
        .map(|path| (normalize(path), true))
        .chain(opts.exclude.iter().map(|path| (normalize(path), false)))
        .collect::<Vec<_>>();

    let bar = spinner(format!("reading {:?}", opts.folder_id))?;
    let result = async {
        for (path, _) in &edits {
            folder.expand_to(path).await?;
        }
        Ok::<_, anyhow::Error>(())
    }
    .await;
    bar.finish_and_clear();
    result?;

    for (path, checked) in &edits {
        folder.selection_mut().set_checked(path, *checked)?;
    }

    let change_set = folder.change_set().await?;
    if change_set.is_empty() {
        info!("selection unchanged, nothing to submit");
        return Ok(());
    }

    let before = change_set.ignores.clone();
    let after = change_set.synthesize();
    print_diff(&before, &after);

    if opts.dry_run {
        return Ok(());
    }

    if !opts.yes && !Confirm::new("Submit changes?").with_default(false).prompt()? {
        info!("changes rejected");
        return Ok(());
    }

    folder.submit(&after).await?;
    info!("changes accepted");

    Ok(())
}

fn print_node(folder: &Folder, parent: &str, node: &Node) {
    let path = syncsel::path::join(parent, &node.name);
    let state = folder
        .selection()
        .state(&path)
        .unwrap_or(CheckState::Unchecked);
    let suffix = if node.is_dir() { "/" } else { "" };
    let size = node
        .size
        .map(|size| size.to_string())
        .unwrap_or_else(|| "-".into());

    println!(
        "{} {}{suffix}\t{}\t{size}",
        state.marker(),
        node.name,
        node.sync_state
    );
}

fn print_diff(before: &IgnoreList, after: &IgnoreList) {
    for pattern in before.iter().filter(|pattern| !after.contains(pattern)) {
        println!("- {pattern}");
    }
    for pattern in after.iter().filter(|pattern| !before.contains(pattern)) {
        println!("+ {pattern}");
    }
    println!();
    print!("{after}");
}
