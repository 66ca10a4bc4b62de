use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use emberbot_common::models::message::{ActionCallback, MessageRef};
use emberbot_common::models::{CallbackToken, Trigger};
use emberbot_core::cache::SessionTable;
use emberbot_core::repositories::{FileByteStore, PersistentTriggerRepository, TriggerRepository};
use emberbot_core::services::{AdminService, DispatchService, FlowService, MessageService};
use emberbot_core::tasks::session_sweep::spawn_session_sweep_task;
use emberbot_core::ReqwestHttpClient;

mod console_gateway;
use console_gateway::ConsoleGateway;

#[derive(Parser, Debug, Clone)]
#[command(name = "emberbot")]
#[command(author, version, about = "emberbot - chat-triggered webhook bridge")]
struct Args {
    /// Path to the trigger blob
    #[arg(long, default_value = "config/triggers.json")]
    config_file: String,

    /// Upper bound for a single webhook call, in seconds
    #[arg(long, default_value = "10")]
    webhook_timeout_secs: u64,

    /// How often expired sessions are reclaimed, in seconds
    #[arg(long, default_value = "300")]
    sweep_interval_secs: u64,

    /// Channels the console gateway reports to the admin surface
    #[arg(long = "channel", default_values_t = ["general".to_string()])]
    channels: Vec<String>,

    /// Import triggers from a JSON array before starting
    #[arg(long)]
    import: Option<String>,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("emberbot=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    info!(config_file = %args.config_file, "emberbot starting");

    let store = Arc::new(FileByteStore::new(&args.config_file));
    let triggers: Arc<dyn TriggerRepository> =
        Arc::new(PersistentTriggerRepository::new(store));
    let sessions = Arc::new(SessionTable::default());
    let dispatcher = Arc::new(
        DispatchService::new(Arc::new(ReqwestHttpClient::new()))
            .with_timeout(Duration::from_secs(args.webhook_timeout_secs)),
    );
    let gateway = Arc::new(ConsoleGateway::new(args.channels.clone()));

    let admin = AdminService::new(triggers.clone(), gateway.clone());
    if let Some(path) = &args.import {
        import_triggers(&admin, path).await?;
    }
    info!(count = admin.list_triggers().await?.len(), "triggers loaded");

    let messages = Arc::new(MessageService::new(
        triggers.clone(),
        sessions.clone(),
        dispatcher.clone(),
        gateway.clone(),
    ));
    let flow = Arc::new(FlowService::new(
        triggers,
        sessions.clone(),
        dispatcher,
        gateway,
    ));

    let _sweep = spawn_session_sweep_task(
        sessions,
        Duration::from_secs(args.sweep_interval_secs),
    );

    run_event_loop(messages, flow).await
}

/// Drains stdin as the chat event stream. Messages are processed serially in
/// arrival order; action callbacks are handed off to their own tasks, as a
/// real gateway would deliver them concurrently.
///
/// Input format, one event per line:
///   `<channel>\t<text>`                      chat message
///   `/action <token> <name> [value]`         dialog callback
async fn run_event_loop(
    messages: Arc<MessageService>,
    flow: Arc<FlowService>,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("/action ") {
            match parse_action(rest) {
                Ok(callback) => {
                    let flow = flow.clone();
                    tokio::spawn(async move {
                        if let Err(e) = flow.handle_action(callback).await {
                            warn!(error = %e, "action not processed");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "bad action line"),
            }
            continue;
        }
        match line.split_once('\t') {
            Some((channel, text)) => {
                if let Err(e) = messages.process_incoming_message(channel, text).await {
                    error!(error = %e, "event processing failed");
                    return Err(e.into());
                }
            }
            None => warn!(line = %line, "expected '<channel>\\t<text>'"),
        }
    }
    // The event stream closing means the upstream connection is gone; the
    // process restarts rather than limping on without input.
    Err(anyhow::anyhow!("chat event stream closed"))
}

fn parse_action(rest: &str) -> anyhow::Result<ActionCallback> {
    let mut parts = rest.split_whitespace();
    let token = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("missing token"))?;
    let action = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("missing action name"))?;
    let value = parts.next().map(str::to_string);
    let token = CallbackToken::from_str(token)?;
    Ok(ActionCallback {
        token,
        action: action.to_string(),
        value,
        message_ref: MessageRef {
            channel_id: "console".to_string(),
            message_id: "console".to_string(),
        },
        user_name: "console".to_string(),
    })
}

async fn import_triggers(admin: &AdminService, path: &str) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(path).await?;
    let incoming: Vec<Trigger> = serde_json::from_slice(&bytes)?;
    for trigger in incoming {
        let stored = admin.set_trigger(trigger).await?;
        info!(trigger_id = %stored.trigger_id, title = %stored.title, "imported trigger");
    }
    Ok(())
}
