mod tracing_setup;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use huddle_core::api::EventApi;
use huddle_core::{ChannelTarget, CoreConfig, CoreEvent, RealtimeClient, Session};

#[derive(Parser)]
#[command(name = "huddle")]
#[command(about = "Terminal client for the huddle realtime layer")]
struct Cli {
    /// REST endpoint of the event data provider
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    api_url: String,

    /// Base live (WebSocket) endpoint
    #[arg(long, default_value = "ws://127.0.0.1:8000/ws")]
    live_url: String,

    /// Expiration-alert endpoint
    #[arg(long, default_value = "ws://127.0.0.1:8000/ws/notification")]
    notify_url: String,

    /// User id from the decoded credential
    #[arg(long)]
    user_id: String,

    /// Username from the decoded credential
    #[arg(long)]
    username: String,

    /// Bearer token for the data provider
    #[arg(long, default_value = "")]
    token: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List events with their temporal status
    Events {
        /// Keep running: monitor upcoming events for expiration alerts
        #[arg(long)]
        monitor: bool,
    },

    /// Watch the notification inbox
    Inbox {
        /// Acknowledge every notification as seen on arrival
        #[arg(long)]
        ack: bool,
    },

    /// Join an event's chat room; stdin lines are sent as messages
    Chat {
        /// Event id
        event_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_setup::init();
    let cli = Cli::parse();

    let config = CoreConfig::new(&cli.api_url, &cli.live_url, &cli.notify_url);
    let session = Session::new(&cli.user_id, &cli.username, &cli.token);
    let mut client = RealtimeClient::new(config.clone(), session.clone());
    let api = EventApi::new(&config, &session);

    match cli.command {
        Commands::Events { monitor } => run_events(&mut client, &api, monitor).await,
        Commands::Inbox { ack } => run_inbox(&mut client, ack).await,
        Commands::Chat { event_id } => run_chat(&mut client, &event_id).await,
    }
}

async fn run_events(client: &mut RealtimeClient, api: &EventApi, monitor: bool) -> Result<()> {
    let events = api.get_events().await?;
    let now = Utc::now();
    for event in &events {
        println!(
            "{:10} {}  {} - {}  {}",
            event.status(now).label(),
            event.id,
            event.start_time.format("%Y-%m-%d %H:%M"),
            event.end_time.format("%H:%M"),
            event.title,
        );
    }
    if !monitor {
        return Ok(());
    }

    let (opened, _) = client.sync_alert_subscriptions(&events, now)?;
    println!("monitoring {opened} upcoming event(s), ctrl-c to stop");

    let mut refresh = tokio::time::interval(std::time::Duration::from_secs(30));
    refresh.tick().await; // first tick fires immediately
    loop {
        tokio::select! {
            event = client.next_event() => match event {
                Some(CoreEvent::EventExpired { event_id }) => {
                    println!("!! event {event_id} has expired");
                }
                Some(_) => {}
                None => break,
            },
            _ = refresh.tick() => {
                let events = api.get_events().await?;
                let (opened, closed) = client.sync_alert_subscriptions(&events, Utc::now())?;
                if opened + closed > 0 {
                    tracing::debug!(opened, closed, "alert subscriptions reconciled");
                }
            }
        }
    }
    Ok(())
}

async fn run_inbox(client: &mut RealtimeClient, ack: bool) -> Result<()> {
    client.connect_inbox()?;
    println!("waiting for notifications, ctrl-c to stop");
    while let Some(event) = client.next_event().await {
        match event {
            CoreEvent::NotificationArrived { entry_id } => {
                if let Some(entry) = client.inbox.entries().iter().find(|e| e.id == entry_id) {
                    println!(
                        "[{}] {}: {}",
                        client.inbox.unseen_count(),
                        entry.notification.event_title,
                        entry.notification.reminder_text,
                    );
                }
                if ack {
                    client.mark_seen(entry_id);
                }
            }
            CoreEvent::ConnectionChanged { target, state } => {
                tracing::info!(chan = %target, ?state, "connection changed");
                if let ChannelTarget::User(_) = target {
                    if !client.is_connected(&target) && state.is_terminal() {
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

async fn run_chat(client: &mut RealtimeClient, event_id: &str) -> Result<()> {
    client.open_chat(event_id)?;
    println!("joined chat for {event_id}; type to send, ctrl-d to leave");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = client.next_event() => match event {
                Some(CoreEvent::HistoryLoaded { event_id }) => {
                    for message in client.chat.messages(&event_id) {
                        println!("{}: {}", message.name, message.message);
                    }
                }
                Some(CoreEvent::MessageAppended { message, .. }) => {
                    println!("{}: {}", message.name, message.message);
                }
                Some(CoreEvent::ConnectionChanged { state, .. }) => {
                    tracing::info!(?state, "chat connection changed");
                    if state.is_terminal() {
                        break;
                    }
                }
                Some(_) => {}
                None => break,
            },
            line = lines.next_line() => match line? {
                Some(text) => {
                    if let Err(e) = client.send_chat(event_id, &text) {
                        eprintln!("message not sent: {e}");
                    }
                }
                None => break,
            }
        }
    }

    client.close_chat(event_id);
    Ok(())
}
