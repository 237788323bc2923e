use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use outreach::config::{LookupFailurePolicy, RunOptions};
use outreach::engine::CampaignEngine;
use outreach::phone::PhoneKey;
use outreach::reply::ChatDbReplySource;
use outreach::send::{DryRunSender, MessageSender, OsaScriptSender};
use outreach::store::StateStore;
use outreach::{contacts, reply};

/// Personalized text campaign over Messages.app: initial message plus
/// scheduled follow-ups, halted automatically once the contact replies.
#[derive(Parser, Debug)]
#[command(name = "outreach", version)]
struct Cli {
    /// Log intended sends without sending or touching the state file.
    #[arg(long)]
    dry_run: bool,

    /// Restrict the run to a single phone number (any common format).
    #[arg(long, value_name = "PHONE")]
    only: Option<String>,

    /// Outbound send rate, messages per minute.
    #[arg(long, default_value_t = 8)]
    rate_per_minute: u32,

    /// Contact list CSV.
    #[arg(long, default_value = "contacts.csv")]
    contacts: PathBuf,

    /// Campaign state file. Delete a contact's key to reset that contact.
    #[arg(long, default_value = "state.json")]
    state: PathBuf,

    /// Messages database used for reply detection.
    /// Defaults to ~/Library/Messages/chat.db.
    #[arg(long, value_name = "PATH")]
    chat_db: Option<PathBuf>,

    /// AppleScript that hands one message to Messages.app.
    #[arg(long, default_value = "send_message.applescript")]
    script: PathBuf,

    /// When the reply lookup is unreachable, skip affected contacts for
    /// this run instead of aborting. Off by default: the engine refuses to
    /// send when it cannot attest "no reply".
    #[arg(long)]
    assume_replied_on_lookup_failure: bool,
}

fn default_chat_db() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join("Library/Messages/chat.db")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let only = match cli.only.as_deref() {
        Some(raw) => match PhoneKey::parse(raw) {
            Some(key) => Some(key),
            None => {
                eprintln!("Error: --only value {raw:?} contains no digits");
                std::process::exit(2);
            }
        },
        None => None,
    };

    let opts = RunOptions {
        dry_run: cli.dry_run,
        only,
        rate_per_minute: cli.rate_per_minute,
        on_lookup_failure: if cli.assume_replied_on_lookup_failure {
            LookupFailurePolicy::AssumeReplied
        } else {
            LookupFailurePolicy::Abort
        },
    };

    let contacts = contacts::load(&cli.contacts)
        .with_context(|| format!("loading contact list {}", cli.contacts.display()))?;
    tracing::info!(
        contacts = contacts.len(),
        list = %cli.contacts.display(),
        "Loaded contact list"
    );

    let chat_db = cli.chat_db.unwrap_or_else(default_chat_db);
    let replies: Arc<dyn reply::ReplySource> = Arc::new(ChatDbReplySource::new(chat_db));
    let sender: Arc<dyn MessageSender> = if cli.dry_run {
        Arc::new(DryRunSender)
    } else {
        Arc::new(OsaScriptSender::new(cli.script))
    };

    let store = StateStore::new(cli.state);
    let mut engine = CampaignEngine::new(store, replies, sender, opts);
    let summary = engine.run(&contacts).await?;

    eprintln!(
        "Done. Sent {} message(s), halted {}, {} error(s).",
        summary.sent, summary.halted, summary.errors
    );
    Ok(())
}
