use std::path::PathBuf;

use clap::{Parser, Subcommand};

use civ_constants::paths::{CONFIG_DIR_SUFFIX, CONFIG_FILE_EXT, DEFAULT_MAILBOX_SOCKET};
use civ_protocol::{Request, Response, ResponseBody};

#[derive(Parser, Debug)]
#[command(name = "civctl", about = "Client for the CiV guest lifecycle engine")]
struct Cli {
    /// Mailbox socket path override.
    #[arg(long, global = true)]
    socket: Option<String>,

    /// Per-guest config directory override (used by `delete` only).
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the server is reachable.
    Ping,
    /// Parse and register a config file as a new guest.
    Import { path: String },
    /// Start a guest and wait for readiness or failure.
    Start {
        name: String,
        /// KEY=VALUE environment entries for the guest's processes.
        #[arg(long = "env")]
        env: Vec<String>,
    },
    /// Stop a running or booting guest.
    Stop { name: String },
    /// Report a guest's current state.
    State { name: String },
    /// List all known guests and their states.
    List,
    /// Remove a guest's config file. Refuses unless the guest is Empty.
    Delete { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let socket = cli.socket.clone().unwrap_or_else(|| DEFAULT_MAILBOX_SOCKET.to_string());

    match cli.command {
        Command::Ping => {
            let resp = send(&socket, Request::Ping).await?;
            report(&resp, "ping")
        }
        Command::Import { path } => {
            let resp = send(&socket, Request::ImportConfig { path }).await?;
            report(&resp, "import")
        }
        Command::Start { name, env } => {
            let resp = send(&socket, Request::StartGuest { name, env }).await?;
            report(&resp, "start")
        }
        Command::Stop { name } => {
            let resp = send(&socket, Request::StopGuest { name }).await?;
            report(&resp, "stop")
        }
        Command::State { name } => {
            let resp = send(&socket, Request::GetState { name }).await?;
            match resp {
                Response::Success(ResponseBody::State(state)) => {
                    println!("{state}");
                    Ok(())
                }
                _ => anyhow::bail!("state query failed"),
            }
        }
        Command::List => {
            let resp = send(&socket, Request::ListGuests).await?;
            match resp {
                Response::Success(ResponseBody::Guests(guests)) => {
                    for g in guests {
                        println!("{}\t{}", g.name, g.state);
                    }
                    Ok(())
                }
                _ => anyhow::bail!("list failed"),
            }
        }
        Command::Delete { name } => delete(&socket, &cli.config_dir, &name).await,
    }
}

async fn send(socket: &str, request: Request) -> anyhow::Result<Response> {
    let mut stream = tokio::net::UnixStream::connect(socket)
        .await
        .map_err(|e| anyhow::anyhow!("failed to connect to {socket}: {e}"))?;
    civ_protocol::write_frame(&mut stream, &request).await?;
    let response = civ_protocol::read_frame(&mut stream).await?;
    Ok(response)
}

fn report(response: &Response, action: &str) -> anyhow::Result<()> {
    if response.is_success() {
        println!("{action}: ok");
        Ok(())
    } else {
        anyhow::bail!("{action}: failed")
    }
}

/// Refuse unless the guest is Empty (same guard `ImportConfig` uses for
/// an overwrite), then remove `<config-dir>/<name>.ini`.
async fn delete(socket: &str, config_dir: &Option<String>, name: &str) -> anyhow::Result<()> {
    let state_resp = send(socket, Request::GetState { name: name.to_string() }).await?;
    if let Response::Success(ResponseBody::State(state)) = &state_resp {
        if state.as_str() != "empty" {
            anyhow::bail!("refusing to delete {name:?}: guest is {state}, not empty");
        }
    }

    let dir = config_dir.clone().unwrap_or_else(default_config_dir);
    let path = PathBuf::from(dir).join(format!("{name}.{CONFIG_FILE_EXT}"));
    std::fs::remove_file(&path).map_err(|e| anyhow::anyhow!("failed to remove {}: {e}", path.display()))?;
    println!("delete: ok");
    Ok(())
}

fn default_config_dir() -> String {
    use nix::unistd::User;

    let home = std::env::var("SUDO_USER")
        .ok()
        .and_then(|user| User::from_name(&user).ok().flatten())
        .map(|u| u.dir)
        .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("/root"));
    home.join(CONFIG_DIR_SUFFIX).display().to_string()
}
