use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use civ_broker::Broker;
use civ_constants::paths::{CONFIG_DIR_SUFFIX, DEFAULT_LOG_DIR, DEFAULT_MAILBOX_SOCKET, SERVER_LOCK_FILE, SERVICE_LOG_FILE};
use civ_protocol::Request;

#[derive(Parser, Debug)]
#[command(name = "civ-server", about = "CiV guest lifecycle engine service")]
struct Cli {
    /// Start the broker and readiness listener and run until stopped.
    #[arg(long, default_value_t = false)]
    start_server: bool,

    /// Detach from the controlling terminal when starting the server.
    #[arg(long, default_value_t = false)]
    daemon: bool,

    /// Ask a running server to shut down.
    #[arg(long, default_value_t = false)]
    stop_server: bool,

    /// Mailbox socket path override.
    #[arg(long)]
    socket: Option<String>,

    /// Per-guest config directory override.
    #[arg(long)]
    config_dir: Option<String>,

    /// Co-process log directory override.
    #[arg(long)]
    log_dir: Option<String>,

    /// Log format: 'text' or 'json'.
    #[arg(long, default_value = "text")]
    log_format: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_format);

    if cli.stop_server {
        return stop_server(cli.socket.as_deref());
    }
    if cli.start_server {
        return start_server(cli);
    }

    eprintln!("nothing to do: pass --start-server or --stop-server (see --help)");
    std::process::exit(2);
}

fn start_server(cli: Cli) -> anyhow::Result<()> {
    if cli.daemon {
        daemonize()?;
    }

    let socket_path = PathBuf::from(cli.socket.unwrap_or_else(|| DEFAULT_MAILBOX_SOCKET.to_string()));
    let config_dir = PathBuf::from(cli.config_dir.unwrap_or_else(default_config_dir));
    let log_dir = PathBuf::from(cli.log_dir.unwrap_or_else(|| DEFAULT_LOG_DIR.to_string()));
    std::fs::create_dir_all(&config_dir)?;

    write_lock_file(SERVER_LOCK_FILE)?;
    info!(config_dir = %config_dir.display(), log_dir = %log_dir.display(), socket = %socket_path.display(), "starting civ-server");

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(config_dir, log_dir, socket_path));
    let _ = std::fs::remove_file(SERVER_LOCK_FILE);
    result
}

async fn run(config_dir: PathBuf, log_dir: PathBuf, socket_path: PathBuf) -> anyhow::Result<()> {
    let broker = Broker::new(config_dir, log_dir, socket_path);
    let readiness = broker.readiness();

    let readiness_task = tokio::spawn(async move {
        if let Err(e) = readiness.serve().await {
            error!(error = %e, "readiness listener exited");
        }
    });

    broker.serve().await?;
    readiness_task.abort();
    info!("civ-server shut down");
    Ok(())
}

fn stop_server(socket: Option<&str>) -> anyhow::Result<()> {
    let socket_path = socket.unwrap_or(DEFAULT_MAILBOX_SOCKET).to_string();
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let mut stream = tokio::net::UnixStream::connect(&socket_path).await?;
        civ_protocol::write_frame(&mut stream, &Request::StopService).await?;
        let response: civ_protocol::Response = civ_protocol::read_frame(&mut stream).await?;
        if response.is_success() {
            println!("server stopped");
            Ok(())
        } else {
            anyhow::bail!("server reported failure stopping");
        }
    })
}

/// Fork, detach from the controlling terminal, and redirect stdio to the
/// service log file. The parent exits immediately.
fn daemonize() -> anyhow::Result<()> {
    use nix::unistd::{fork, setsid, ForkResult};

    match unsafe { fork() }? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {}
    }
    setsid()?;

    use std::os::fd::AsRawFd;
    let log = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(SERVICE_LOG_FILE)?;
    let fd = log.as_raw_fd();
    unsafe {
        libc::dup2(fd, libc::STDOUT_FILENO);
        libc::dup2(fd, libc::STDERR_FILENO);
    }
    Ok(())
}

fn write_lock_file(path: &str) -> anyhow::Result<()> {
    std::fs::write(path, std::process::id().to_string())?;
    Ok(())
}

/// `<SUDO_USER home>/.intel/.civ`, falling back to the current user's home.
fn default_config_dir() -> String {
    use nix::unistd::User;

    let home = std::env::var("SUDO_USER")
        .ok()
        .and_then(|name| User::from_name(&name).ok().flatten())
        .map(|u| u.dir)
        .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("/root"));
    home.join(CONFIG_DIR_SUFFIX).display().to_string()
}

fn init_tracing(log_format: &str) {
    match log_format {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::level_filters::LevelFilter::INFO.into()),
                )
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::level_filters::LevelFilter::INFO.into()),
                )
                .init();
        }
    }
}
