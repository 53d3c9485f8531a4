//! Console Bot Example
//!
//! Runs the Chorus engine with the built-in modules against the terminal.
//! Every line typed becomes a chat message from one console user; the bot's
//! replies and reactions are printed back.
//!
//! # Input
//!
//! ```text
//! @bot echo hello          mention the bot (`@bot` becomes the mention markup)
//! /dm modules              send the rest of the line by direct message
//! /edit 3 @bot echo bye    edit message #3, re-running or undoing its command
//! /quit                    stop the runtime
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package console-bot -- --config chorus.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use async_trait::async_trait;
use chorus::core::{EventKind, MessageChangedEvent};
use chorus::prelude::*;
use chorus::runtime::ConfigLoader;
use chorus::runtime::config::LogOutput;
use clap::Parser;
use futures::Stream;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};

const CONSOLE_CHANNEL: &str = "CCONSOLE";

#[derive(Parser, Debug)]
#[command(about = "Talk to a Chorus bot from the terminal")]
struct Args {
    /// Configuration file (defaults to chorus.toml in the usual places)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. "production"
    #[arg(short, long)]
    profile: Option<String>,

    /// User id of the console user
    #[arg(long, default_value = "UCONSOLE")]
    user: String,
}

// ============================================================================
// Timestamps
// ============================================================================

/// Hands out strictly increasing message timestamps.
#[derive(Default)]
struct Clock {
    last_micros: AtomicU64,
}

impl Clock {
    fn tick(&self) -> MessageTs {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or_default();
        let mut current = self.last_micros.load(Ordering::Relaxed);
        loop {
            let next = now.max(current + 1);
            match self.last_micros.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    return MessageTs::new(format!(
                        "{}.{:06}",
                        next / 1_000_000,
                        next % 1_000_000
                    ));
                }
                Err(actual) => current = actual,
            }
        }
    }
}

// ============================================================================
// Console Transport
// ============================================================================

/// Prints everything the bot does to stdout.
struct ConsoleTransport {
    me: UserId,
    clock: Arc<Clock>,
}

fn print_block(prefix: &str, text: &str) {
    let mut lines = text.lines();
    println!("{prefix} {}", lines.next().unwrap_or_default());
    for line in lines {
        println!("{:width$} {line}", "", width = prefix.chars().count());
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    fn self_id(&self) -> &UserId {
        &self.me
    }

    async fn send_message(&self, channel: &ChannelId, text: &str) -> TransportResult<MessageId> {
        let ts = self.clock.tick();
        print_block(&format!("[{channel}] bot:"), text);
        Ok(MessageId::new(channel.clone(), ts))
    }

    async fn edit_message(&self, message: &MessageId, text: &str) -> TransportResult<()> {
        print_block(&format!("[{}] bot (edited {}):", message.channel, message.ts), text);
        Ok(())
    }

    async fn add_reaction(&self, message: &MessageId, emoji: &str) -> TransportResult<()> {
        println!("    +:{emoji}: on {}", message.ts);
        Ok(())
    }

    async fn remove_reaction(&self, message: &MessageId, emoji: &str) -> TransportResult<()> {
        println!("    -:{emoji}: on {}", message.ts);
        Ok(())
    }

    async fn open_direct(&self, user: &UserId) -> TransportResult<ChannelId> {
        Ok(ChannelId::new(format!("D{user}")))
    }

    fn archive_link(&self, message: &MessageId) -> String {
        format!("console://{}/{}", message.channel, message.ts)
    }
}

// ============================================================================
// Console Input
// ============================================================================

/// Turns typed lines into chat events.
struct ConsoleInput {
    lines: Lines<BufReader<Stdin>>,
    user: UserId,
    mention: String,
    clock: Arc<Clock>,
    posted: Vec<MessageEvent>,
}

enum Input {
    Event(Event),
    Skip,
    Quit,
}

impl ConsoleInput {
    fn expand(&self, text: &str) -> String {
        text.replace("@bot", &self.mention)
    }

    fn post(&mut self, channel: ChannelId, text: &str) -> Input {
        let message = MessageEvent::new(channel, self.user.clone(), self.clock.tick(), self.expand(text));
        self.posted.push(message.clone());
        println!("    (#{})", self.posted.len());
        Input::Event(Event::message(message))
    }

    fn edit(&mut self, rest: &str) -> Input {
        let (number, text) = rest.split_once(' ').unwrap_or((rest, ""));
        let Some(index) = number.parse::<usize>().ok().and_then(|n| n.checked_sub(1)) else {
            println!("    usage: /edit <number> <new text>");
            return Input::Skip;
        };
        let text = self.expand(text);
        let Some(original) = self.posted.get_mut(index) else {
            println!("    no message #{number}");
            return Input::Skip;
        };
        let previous = original.clone();
        original.text = text;
        Input::Event(Event::new(EventKind::MessageChanged(MessageChangedEvent {
            channel: original.channel.clone(),
            event_ts: self.clock.tick(),
            message: original.clone(),
            previous: Some(previous),
        })))
    }

    fn parse(&mut self, line: &str) -> Input {
        let line = line.trim();
        if line.is_empty() {
            return Input::Skip;
        }
        if line == "/quit" {
            return Input::Quit;
        }
        if let Some(rest) = line.strip_prefix("/edit ") {
            return self.edit(rest.trim());
        }
        if let Some(rest) = line.strip_prefix("/dm ") {
            let channel = ChannelId::new(format!("D{}", self.user));
            return self.post(channel, rest);
        }
        self.post(ChannelId::new(CONSOLE_CHANNEL), line)
    }

    async fn next_event(&mut self) -> Option<Event> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    warn!(error = %e, "Failed to read from stdin");
                    return None;
                }
            };
            match self.parse(&line) {
                Input::Event(event) => return Some(event),
                Input::Skip => continue,
                Input::Quit => return None,
            }
        }
    }

    fn into_stream(self) -> impl Stream<Item = Event> + Send {
        stream::unfold(self, |mut input| async move {
            let event = input.next_event().await?;
            Some((event, input))
        })
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Keep stdout for the conversation; logs go to stderr unless configured.
    let mut console_defaults = ChorusConfig::default();
    console_defaults.logging.output = LogOutput::Stderr;

    let mut loader = ConfigLoader::new().merge(console_defaults);
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    if let Some(profile) = &args.profile {
        loader = loader.profile(profile.clone());
    }
    let config = loader.load()?;

    let clock = Arc::new(Clock::default());
    let bot = UserId::new(config.bot.user_id.clone().unwrap_or_else(|| "UCHORUS".into()));
    let transport = Arc::new(ConsoleTransport {
        me: bot.clone(),
        clock: clock.clone(),
    });

    let runtime = ChorusRuntime::from_config(&config, transport)?;
    runtime.register_modules(|registry| {
        register_builtin(registry);
    })?;

    let input = ConsoleInput {
        lines: BufReader::new(tokio::io::stdin()).lines(),
        user: UserId::new(args.user),
        mention: bot.mention(),
        clock,
        posted: Vec::new(),
    };

    println!("Type `@bot help` to list commands, /quit to exit.");
    runtime.run(input.into_stream()).await?;
    info!("Console session ended");
    Ok(())
}
