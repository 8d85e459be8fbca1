use anyhow::Context;
use clap::{Parser, Subcommand};
use gci::archive::Archiver;
use gci::archive::project::InstanceProjector;
use gci::config::{Overrides, Settings};
use gci::connectors::{HttpGciApi, SessionCookies};
use gci::submit::TaskSubmitter;
use std::path::PathBuf;
use tracing::{Level, info};

/// Archive Google Code-in tasks and instances, or submit tasks
#[derive(Parser, Debug)]
#[command(name = "gci", version)]
struct Cli {
    /// Program API key
    #[arg(long, global = true)]
    apikey: Option<String>,

    /// Service URL
    #[arg(long, global = true)]
    url: Option<String>,

    /// Directory in which to store all downloaded data
    #[arg(long, global = true)]
    datadir: Option<PathBuf>,

    /// File holding the SACSID dashboard session cookie
    #[arg(long, global = true)]
    cookie_file: Option<PathBuf>,

    /// Log requests and other details
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
enum Commands {
    /// Download tasks and task instances into the data directory
    Archive {
        /// Download a single task instance
        #[arg(long)]
        instance: Option<u64>,
    },
    /// Submit the task files found in <datadir>/tasks
    Submit,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            apikey: self.apikey.clone(),
            url: self.url.clone(),
            datadir: self.datadir.clone(),
            cookie_file: self.cookie_file.clone(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let settings = Settings::load(args.overrides())?;
    match args.command {
        Commands::Archive { instance } => archive(&settings, instance).await,
        Commands::Submit => submit(&settings).await,
    }
}

async fn archive(settings: &Settings, instance: Option<u64>) -> anyhow::Result<()> {
    let cookies = SessionCookies::from_file(&settings.cookie_file)
        .await
        .with_context(|| {
            format!("cannot read session cookie from {}", settings.cookie_file.display())
        })?;
    let api = HttpGciApi::new(&settings.url, settings.apikey.clone(), cookies)?;
    let projector = InstanceProjector::new(&api, settings.instances_dir());
    let archiver = Archiver::new(&api, &projector, settings);

    gci::archive::ensure_dir(&settings.datadir)
        .await
        .with_context(|| format!("cannot create {}", settings.datadir.display()))?;
    info!("saving GCI data to [{}]", settings.datadir.display());

    match instance {
        Some(id) => {
            let folder = archiver.save_single_instance(id).await?;
            info!("instance {id} saved to [{}]", folder.display());
        }
        None => {
            archiver.save_tasks().await?;
            archiver.save_instances().await?;
        }
    }
    Ok(())
}

async fn submit(settings: &Settings) -> anyhow::Result<()> {
    let api = HttpGciApi::new(&settings.url, settings.apikey.clone(), SessionCookies::default())?;
    info!("reading GCI task data from [{}]", settings.datadir.display());
    let submitted = TaskSubmitter::new(&api, &settings.datadir).submit_all().await?;
    info!("done! ({submitted} tasks)");
    Ok(())
}
