use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use meshroom_client::{
    ClientConfig, GlarePolicy, MeshClient, SessionEvent, SessionView, TransportConfig,
};
use meshroom_core::PeerId;
use meshroom_core::utils::DEFAULT_RELAY_URL;
use meshroom_relay::RelayConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meshroom")]
#[command(about = "Full-mesh WebRTC rooms: relay server and headless participant")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay.
    Relay {
        #[arg(long, env = "MESHROOM_BIND", default_value = "0.0.0.0:8080")]
        bind: SocketAddr,

        #[arg(long, default_value_t = 10_000)]
        heartbeat_ms: u64,
    },

    /// Join a room with synthetic capture and print what happens.
    Join {
        #[arg(long, env = "MESHROOM_RELAY_URL", default_value = DEFAULT_RELAY_URL)]
        url: String,

        #[arg(long, env = "MESHROOM_ROOM")]
        room: String,

        #[arg(long, env = "MESHROOM_MEMBER_ID")]
        member: u64,

        #[arg(long, env = "MESHROOM_TOKEN")]
        token: Option<String>,

        #[arg(long, env = "MESHROOM_GLARE_POLICY", default_value = "inbound-wins")]
        glare_policy: GlarePolicy,

        /// Host candidates only, no STUN.
        #[arg(long)]
        local_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Relay { bind, heartbeat_ms } => {
            println!("{}", format!("Relay starting on {bind}").green().bold());
            let config = RelayConfig {
                bind,
                heartbeat_interval: Duration::from_millis(heartbeat_ms),
            };
            meshroom_relay::run(config, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
            println!("{}", "Relay stopped".yellow());
        }

        Commands::Join {
            url,
            room,
            member,
            token,
            glare_policy,
            local_only,
        } => {
            let mut config = ClientConfig::new(room, PeerId(member));
            config.signaling.url = url;
            config.signaling.auth_token = token;
            config.session.glare_policy = glare_policy;
            if local_only {
                config.transport = TransportConfig::local_only();
            }
            join(config).await?;
        }
    }

    Ok(())
}

async fn join(config: ClientConfig) -> Result<()> {
    println!(
        "{}",
        format!(
            "Joining room {} as member {} via {}",
            config.room, config.session.local_id, config.signaling.url
        )
        .green()
        .bold()
    );

    let client = MeshClient::join(config)
        .await
        .context("Failed to join the room")?;
    let mut view = client.session().view();
    let mut events = client.session().events();

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                print_view(&view.borrow_and_update());
            }

            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    println!("{}", format!("({n} events skipped)").dimmed());
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            _ = tokio::signal::ctrl_c() => {
                println!("{}", "Leaving room...".yellow());
                break;
            }
        }
    }

    client.leave().await;
    println!("{}", "Disconnected".green());
    Ok(())
}

fn print_view(view: &SessionView) {
    let transport = if view.transport_connected {
        "online".green()
    } else {
        "offline".red()
    };
    let media = if view.media_ready {
        "media ready".green()
    } else {
        "no media".yellow()
    };
    let mut line = format!("[{transport}] [{media}]");
    if view.cooling_down {
        line.push_str(&format!(" {}", "connection unstable, retrying".yellow()));
    }
    if view.sharing_screen {
        line.push_str(&format!(" {}", "sharing screen".cyan()));
    }
    if !view.pending_offers.is_empty() {
        line.push_str(&format!(" pending={:?}", view.pending_offers));
    }
    println!("{line}");

    for (peer, link) in &view.links {
        let tracks = view
            .remote_streams
            .get(peer)
            .map(|s| s.tracks.len())
            .unwrap_or(0);
        println!(
            "    {} {:?}/{:?} tracks={}",
            format!("peer {peer}").bold(),
            link.negotiation,
            link.media,
            tracks
        );
    }
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::PeerConnected(peer) => {
            println!("{}", format!("Connected to peer {peer}").green());
        }
        SessionEvent::PeerDisconnected(peer) => {
            println!("{}", format!("Lost peer {peer}").yellow());
        }
        SessionEvent::LinkFailed { peer, reason } => {
            println!("{}", format!("Link to peer {peer} failed: {reason}").red());
        }
        SessionEvent::MediaError(e) => println!("{}", format!("Media error: {e}").red()),
        SessionEvent::ScreenShareEnded => println!("{}", "Screen share ended".cyan()),
        SessionEvent::CooldownStarted => println!("{}", "Cooling down".yellow()),
        SessionEvent::CooldownCleared => println!("{}", "Cooldown cleared".green()),
    }
}
