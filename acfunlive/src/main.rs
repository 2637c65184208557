use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use acfunlive::api;
use acfunlive::commands::{CommandHandler, spawn_stdin_listener};
use acfunlive::config::{AppConfig, AppPaths};
use acfunlive::control::{BusReceiver, ControlMessage};
use acfunlive::logging::{init_logging, start_retention_cleanup};
use acfunlive::scheduler::{
    CycleWorker, Dispatcher, refresh_live_rooms, spawn_live_room_refresher, spawn_roster_sync,
};
use acfunlive::services::{Collaborators, ServiceContainer};
use acfunlive::shutdown::ShutdownCoordinator;
use acfunlive::streamer::StreamerRegistry;

/// AcFun live notifications and automatic recording.
#[derive(Parser, Debug)]
#[command(name = "acfunlive", version, about, long_about = None)]
struct Args {
    /// Watch the configured streamers and accept commands on stdin
    #[arg(long)]
    listen: bool,

    /// Serve status and commands over HTTP
    #[arg(long, requires = "listen")]
    web: bool,

    /// Send live notifications to QQ through Coolq
    #[arg(long, requires = "listen")]
    coolq: bool,

    /// Directory holding config.json, live.json and the logs
    #[arg(long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// List the rooms that are live now
    #[arg(long)]
    listlive: bool,

    /// Notify when <UID> goes live
    #[arg(long, value_name = "UID")]
    addnotify: Option<u64>,

    /// Stop notifying about <UID>
    #[arg(long, value_name = "UID")]
    delnotify: Option<u64>,

    /// Record <UID> whenever it goes live
    #[arg(long, value_name = "UID")]
    addrecord: Option<u64>,

    /// Stop recording <UID> automatically
    #[arg(long, value_name = "UID")]
    delrecord: Option<u64>,

    /// Capture the danmu of <UID> whenever it goes live
    #[arg(long, value_name = "UID")]
    adddanmu: Option<u64>,

    /// Stop capturing the danmu of <UID> automatically
    #[arg(long, value_name = "UID")]
    deldanmu: Option<u64>,

    /// Print the stream URLs of <UID>
    #[arg(long, value_name = "UID")]
    getdlurl: Option<u64>,

    /// Record <UID> now
    #[arg(long, value_name = "UID")]
    startrecord: Option<u64>,

    /// Capture the danmu of <UID> now
    #[arg(long, value_name = "UID")]
    startdanmu: Option<u64>,

    /// Record <UID> and capture its danmu now
    #[arg(long, value_name = "UID")]
    startrecdan: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let paths = AppPaths::discover(args.dir.as_deref())?;
    paths.ensure_dirs()?;
    let (log_tail, _log_guard) = init_logging(&paths.log_dir)?;

    let config = AppConfig::load_or_create(&paths.config_file)
        .with_context(|| format!("Failed to load {}", paths.config_file.display()))?;
    config.validate()?;
    let registry = Arc::new(
        StreamerRegistry::open(&paths.roster_file)
            .with_context(|| format!("Failed to load {}", paths.roster_file.display()))?,
    );
    let output_dir = config.output_dir(&paths.dir);
    std::fs::create_dir_all(&output_dir)?;

    let collaborators = Collaborators::production(&config)?;
    let (services, receiver) =
        ServiceContainer::new(config, output_dir, registry, collaborators, log_tail);
    services.set_listening(args.listen);
    let handler = CommandHandler::new(services.clone());

    let foreground = run_one_shot(&args, &services, &handler).await;

    if args.listen {
        listen(&args, &paths, services, receiver, handler).await
    } else {
        wait_foreground(&services, foreground).await;
        Ok(())
    }
}

/// Run the actions requested by flags. Returns the captures started, which
/// run in the foreground when not listening.
async fn run_one_shot(
    args: &Args,
    services: &Arc<ServiceContainer>,
    handler: &CommandHandler,
) -> Vec<JoinHandle<()>> {
    if args.listlive {
        if let Err(e) = refresh_live_rooms(services).await {
            warn!(error = %e, "Failed to fetch live rooms");
        }
        println!("{}", handler.handle("listlive", &[]).await);
    }

    let uid_commands = [
        ("addnotify", args.addnotify),
        ("delnotify", args.delnotify),
        ("addrecord", args.addrecord),
        ("delrecord", args.delrecord),
        ("adddanmu", args.adddanmu),
        ("deldanmu", args.deldanmu),
        ("getdlurl", args.getdlurl),
    ];
    for (name, uid) in uid_commands {
        if let Some(uid) = uid {
            let uid = uid.to_string();
            let output = handler.handle(name, &[uid.as_str()]).await;
            println!("{output}");
        }
    }

    let mut foreground = Vec::new();
    let record = args.startrecord.into_iter().chain(args.startrecdan);
    for uid in record {
        match services.recorder.start_recording(uid, true).await {
            Ok(handle) => foreground.push(handle),
            Err(e) => warn!(uid, error = %e, "Cannot start recording"),
        }
    }
    let danmu = args.startdanmu.into_iter().chain(args.startrecdan);
    for uid in danmu {
        match services.danmu.start_danmu(uid).await {
            Ok(handle) => foreground.push(handle),
            Err(e) => warn!(uid, error = %e, "Cannot start danmu capture"),
        }
    }
    foreground
}

/// Wait for foreground captures; Ctrl-C stops them gracefully.
async fn wait_foreground(services: &ServiceContainer, foreground: Vec<JoinHandle<()>>) {
    if foreground.is_empty() {
        return;
    }
    tokio::select! {
        _ = join_all(foreground) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping captures");
            ShutdownCoordinator::new(services).run().await;
        }
    }
}

async fn listen(
    args: &Args,
    paths: &AppPaths,
    services: Arc<ServiceContainer>,
    receiver: BusReceiver,
    handler: CommandHandler,
) -> anyhow::Result<()> {
    if services.registry.is_empty() {
        warn!("No streamers configured, add some with the add* commands, run `help` to list them");
    }
    info!("Watching live status");

    for streamer in services.registry.list() {
        CycleWorker::spawn(&services, &streamer);
    }

    let cancel = services.cancellation_token();
    spawn_roster_sync(services.clone());
    spawn_live_room_refresher(services.clone());
    start_retention_cleanup(&paths.log_dir, cancel.clone());

    info!("Commands are accepted now, run `help` to list them");
    spawn_stdin_listener(handler, cancel);

    if args.web
        && let Err(e) = api::start_web(&services).await
    {
        warn!(error = %e, "Failed to start the web server");
    }
    if args.coolq {
        services.notification.start_coolq(&services.config.coolq);
    }

    let bus = services.bus.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            let _ = bus.send(ControlMessage::quit()).await;
        }
    });

    let report = Dispatcher::new(services, receiver).run().await;
    if !report.drained {
        warn!("Exiting before every capture finished");
    }
    info!("acfunlive stopped");
    Ok(())
}
