//! Live editing and undo of command messages.
//!
//! Every message that addresses the bot gets a [`FinishedCommand`] record in
//! the [`TrackerTable`].  When the user edits the message, the tracker
//! compares the new parse with the recorded one and decides:
//!
//! ```text
//!   recorded \ new     not a command      command
//!   ─────────────────  ─────────────────  ─────────────────
//!   wave / reverted    drop ack           fresh execution
//!   command            undo               edit (re-run)
//! ```
//!
//! Identical parses are ignored.  Whether an edit or undo is honoured is
//! decided by the recorded [`CommandResult`]; refusals get the `denied`
//! reaction and one private notice.
//!
//! A janitor task evicts records older than the retention window.

mod record;
mod table;

pub use record::{FinishedCommand, RecordState};
pub use table::{RecordHandle, TrackerTable};

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chorus_core::{BoxedTransport, MessageChangedEvent, MessageEvent};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::command::{CommandArguments, CommandResult, CommandTree, ResultCode, UndoAction};
use crate::mention::{ParseOutcome, ParsedCommand, parse_message};
use crate::reaction::{Reaction, ReactionEmoji, ReactionSet, reconcile};
use crate::reply::ReplyRouter;

/// Timing and emoji used by the tracker.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    /// Wait before handling an edit, so rapid successive edits settle.
    pub edit_delay: Duration,
    /// Records older than this are evicted; edits of older messages are
    /// answered with a notice.
    pub retention: Duration,
    pub emoji: ReactionEmoji,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            edit_delay: Duration::from_millis(350),
            retention: Duration::from_secs(2 * 60 * 60),
            emoji: ReactionEmoji::default(),
        }
    }
}

/// Runs commands from messages and keeps them in sync with later edits.
pub struct EditTracker {
    transport: BoxedTransport,
    commands: Arc<CommandTree>,
    router: Arc<ReplyRouter>,
    table: TrackerTable,
    settings: TrackerSettings,
}

impl EditTracker {
    pub fn new(
        transport: BoxedTransport,
        commands: Arc<CommandTree>,
        router: Arc<ReplyRouter>,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            transport,
            commands,
            router,
            table: TrackerTable::new(),
            settings,
        }
    }

    pub fn table(&self) -> &TrackerTable {
        &self.table
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    // ─── Inbound ────────────────────────────────────────────────────────

    /// Handles a new message.
    pub async fn handle_message(&self, message: MessageEvent) {
        if message.subtype.is_some() || message.user == *self.transport.self_id() {
            return;
        }
        let parsed = parse_message(&message.text, self.transport.self_id(), message.is_direct());
        self.track(message, parsed).await;
    }

    /// Handles an edit of an earlier message, after the configured delay.
    pub async fn handle_edit(&self, changed: MessageChangedEvent) {
        if !self.settings.edit_delay.is_zero() {
            tokio::time::sleep(self.settings.edit_delay).await;
        }
        let message = changed.message;
        if message.user == *self.transport.self_id() {
            return;
        }
        let parsed = parse_message(&message.text, self.transport.self_id(), message.is_direct());
        match self.table.get(&message.id()) {
            Some(handle) => {
                let mut record = handle.lock().await;
                self.apply_edit(&mut record, message, parsed).await;
            }
            None => {
                let was_command = changed.previous.as_ref().is_some_and(|previous| {
                    parse_message(&previous.text, self.transport.self_id(), previous.is_direct())
                        .is_command()
                });
                self.untracked_edit(message, parsed, was_command).await
            }
        }
    }

    async fn track(&self, message: MessageEvent, parsed: ParseOutcome) {
        if parsed == ParseOutcome::NotCommand {
            return;
        }
        let id = message.id();
        let handle: RecordHandle = Arc::new(tokio::sync::Mutex::new(FinishedCommand::new(
            message, parsed,
        )));
        let mut record = handle.lock().await;
        if !self.table.insert_if_absent(id.clone(), Arc::clone(&handle)) {
            debug!(message = %id, "Message is tracked already; ignored");
            return;
        }
        self.run_fresh(&mut record).await;
    }

    /// `was_command` tells whether the text before the edit was a command,
    /// when the transport reports it.
    async fn untracked_edit(&self, message: MessageEvent, parsed: ParseOutcome, was_command: bool) {
        if !parsed.is_command() && !was_command {
            debug!(message = %message.id(), "Edit of an untracked message that is not a command; ignored");
            return;
        }
        let age = message
            .ts
            .age(SystemTime::now())
            .unwrap_or(Duration::MAX);
        if age >= self.settings.retention {
            info!(message = %message.id(), "Edit of an expired message could not be correlated");
            self.router
                .notify(
                    &message.user,
                    "Sorry, your edit could not be correlated with an earlier command; that message is too old. \
                     Please send the command again as a new message.",
                )
                .await;
            return;
        }
        if !parsed.is_command() {
            debug!(message = %message.id(), "Recent untracked command edited away; nothing to undo");
            return;
        }
        self.track(message, parsed).await;
    }

    async fn apply_edit(
        &self,
        record: &mut FinishedCommand,
        message: MessageEvent,
        parsed: ParseOutcome,
    ) {
        record.latest_edit = Some(message);
        if parsed == record.parsed {
            debug!(message = %record.message_id(), "Edit leaves the command unchanged; ignored");
            return;
        }
        if !record.parsed.is_command() {
            record.parsed = parsed;
            self.run_fresh(record).await;
            return;
        }
        match parsed {
            ParseOutcome::Command(command) => self.edit(record, command).await,
            other => self.undo(record, other).await,
        }
    }

    // ─── Execution ──────────────────────────────────────────────────────

    /// Acts on `record.parsed` as if the message had just arrived.
    async fn run_fresh(&self, record: &mut FinishedCommand) {
        match record.parsed.clone() {
            ParseOutcome::NotCommand => {
                reconcile(&self.transport, &mut record.reactions, ReactionSet::new());
                record.state = RecordState::Reverted;
            }
            ParseOutcome::Wave => {
                let hello = self.hello(record);
                reconcile(&self.transport, &mut record.reactions, hello);
                record.state = RecordState::Acknowledged;
            }
            ParseOutcome::Command(command) => {
                let args = CommandArguments::new(record.source(), command.args.clone());
                let result = self.execute(&command, args.clone()).await;
                debug!(message = %record.message_id(), code = %result.code, "Command executed");
                self.settle(record, args, result).await;
                record.state = RecordState::Executed;
            }
        }
    }

    async fn execute(&self, command: &ParsedCommand, args: CommandArguments) -> CommandResult {
        match &command.error {
            Some(error) if !command.lenient => {
                CommandResult::failure(format!("I couldn't read that command: {error}"))
            }
            _ => self.commands.dispatch(args).await,
        }
    }

    /// Stores `result` and brings reactions and replies in line with it.
    async fn settle(&self, record: &mut FinishedCommand, args: CommandArguments, result: CommandResult) {
        let desired: ReactionSet = [Reaction::new(
            record.message_id(),
            self.settings.emoji.for_code(result.code),
        )]
        .into_iter()
        .collect();
        reconcile(&self.transport, &mut record.reactions, desired);

        let plan = self.router.plan(&result, &args);
        self.router.apply(&mut record.replies, &plan, &args.source).await;

        record.command_found = result.code != ResultCode::NoSuchCommand;
        record.args = Some(args);
        record.result = Some(result);
    }

    async fn edit(&self, record: &mut FinishedCommand, command: ParsedCommand) {
        let allowed = record
            .result
            .as_ref()
            .is_none_or(CommandResult::edit_allowed);
        if !allowed {
            let notice = format!(
                "Sorry, `{}` has already run and can't be changed by editing. Please send a new message instead.",
                record.command_line()
            );
            info!(message = %record.message_id(), "Edit refused");
            self.deny(record, &notice).await;
            return;
        }

        let mut args = CommandArguments::new(record.source(), command.args.clone());
        match record.result.clone() {
            Some(previous) => args = args.edited(previous),
            None => args.is_edit = true,
        }
        let result = self.execute(&command, args.clone()).await;
        info!(message = %record.message_id(), code = %result.code, "Command re-run after edit");
        self.settle(record, args, result).await;
        record.parsed = ParseOutcome::Command(command);
        record.state = RecordState::Edited;
    }

    async fn undo(&self, record: &mut FinishedCommand, parsed: ParseOutcome) {
        if record.undo_failed {
            debug!(message = %record.message_id(), "Undo refused earlier; edit ignored");
            return;
        }
        let action = record
            .result
            .as_ref()
            .map_or(UndoAction::Simple, CommandResult::undo_action);
        let outcome = match action {
            UndoAction::Deny => Err(format!("Sorry, `{}` can't be undone.", record.command_line())),
            UndoAction::Simple => Ok(()),
            UndoAction::Custom => self.custom_undo(record).await,
        };

        match outcome {
            Ok(()) => {
                self.revert(record, &parsed).await;
                record.parsed = parsed;
                record.state = RecordState::Reverted;
                info!(message = %record.message_id(), action = ?action, "Command undone");
            }
            Err(notice) => {
                info!(message = %record.message_id(), action = ?action, "Undo refused");
                record.undo_failed = true;
                record.state = RecordState::UndoFailed;
                self.deny(record, &notice).await;
            }
        }
    }

    /// Runs the command's own undo handler.  `Err` carries the user notice.
    async fn custom_undo(&self, record: &FinishedCommand) -> Result<(), String> {
        let (Some(args), Some(result)) = (&record.args, &record.result) else {
            return Ok(());
        };
        let undo_args = CommandArguments::new(args.source.clone(), args.original().to_vec())
            .undoing(result.clone());
        match self.commands.dispatch_undo(undo_args).await {
            None => Err(format!(
                "Sorry, `{}` does not support undo.",
                args.command_line()
            )),
            Some(undone) if undone.code == ResultCode::Ok => Ok(()),
            Some(undone) => Err(format!(
                "Sorry, undoing `{}` failed: {}",
                args.command_line(),
                undone.error_text().unwrap_or(undone.message)
            )),
        }
    }

    /// Clears reactions (keeping a wave acknowledgement) and blanks replies.
    async fn revert(&self, record: &mut FinishedCommand, parsed: &ParseOutcome) {
        let desired = if *parsed == ParseOutcome::Wave {
            self.hello(record)
        } else {
            ReactionSet::new()
        };
        reconcile(&self.transport, &mut record.reactions, desired);
        self.router.remove_all(&mut record.replies).await;
    }

    async fn deny(&self, record: &mut FinishedCommand, notice: &str) {
        let mut desired = record.reactions.clone();
        desired.insert(Reaction::new(record.message_id(), &self.settings.emoji.denied));
        reconcile(&self.transport, &mut record.reactions, desired);
        self.router.notify(&record.original.user, notice).await;
    }

    fn hello(&self, record: &FinishedCommand) -> ReactionSet {
        [Reaction::new(record.message_id(), &self.settings.emoji.hello)]
            .into_iter()
            .collect()
    }

    // ─── Garbage collection ─────────────────────────────────────────────

    /// Evicts expired records now.  Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        self.table.sweep(Instant::now(), self.settings.retention)
    }

    /// Sweeps every `period` until `shutdown` is cancelled.
    pub fn spawn_janitor(self: &Arc<Self>, period: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let tracker = Arc::clone(self);
        let period = period.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let evicted = tracker.sweep();
                        if evicted > 0 {
                            info!(evicted, remaining = tracker.table.len(), "Expired command records swept");
                        }
                    }
                }
            }
            debug!("Janitor stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, Permission};
    use crate::reply::{REMOVED_PLACEHOLDER, ReplyLimits};
    use crate::testing::{MockTransport, settle};
    use chorus_core::{ChannelId, MessageTs, UserId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        mock: Arc<MockTransport>,
        tracker: Arc<EditTracker>,
        runs: Arc<AtomicUsize>,
        undos: Arc<AtomicUsize>,
    }

    fn fixture() -> Fixture {
        let mock = Arc::new(MockTransport::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let undos = Arc::new(AtomicUsize::new(0));
        let commands = Arc::new(CommandTree::new("root"));

        commands
            .register(
                "echo",
                Command::new("echo", |args: CommandArguments| async move {
                    Ok(CommandResult::ok(args.rest()).omit_username())
                }),
            )
            .unwrap();
        let r = runs.clone();
        commands
            .register(
                "fail",
                Command::new("fail", move |args: CommandArguments| {
                    r.fetch_add(1, Ordering::SeqCst);
                    async move { Ok(CommandResult::failure(format!("cannot {}", args.rest()))) }
                }),
            )
            .unwrap();
        let u = undos.clone();
        commands
            .register(
                "undoable",
                Command::new("undoable", |_args: CommandArguments| async move {
                    Ok(CommandResult::ok("done").with_undo(Permission::Allow))
                })
                .with_undo(move |args: CommandArguments| {
                    u.fetch_add(1, Ordering::SeqCst);
                    let ok = args.is_undo && args.previous_result.is_some();
                    async move {
                        Ok(if ok {
                            CommandResult::ok("undone")
                        } else {
                            CommandResult::failure("bad undo arguments")
                        })
                    }
                }),
            )
            .unwrap();
        commands
            .register(
                "sticky",
                Command::new("sticky", |_args: CommandArguments| async move {
                    Ok(CommandResult::ok("stuck").with_undo(Permission::Allow))
                }),
            )
            .unwrap();

        let router = Arc::new(ReplyRouter::new(
            mock.clone(),
            Some(ChannelId::new("CLOG")),
            Some(ChannelId::new("CPRIVLOG")),
            ReplyLimits::default(),
        ));
        let settings = TrackerSettings {
            edit_delay: Duration::ZERO,
            ..TrackerSettings::default()
        };
        let tracker = Arc::new(EditTracker::new(mock.clone(), commands, router, settings));
        Fixture {
            mock,
            tracker,
            runs,
            undos,
        }
    }

    const TS: &str = "100.000001";

    fn msg(channel: &str, ts: &str, text: &str) -> MessageEvent {
        MessageEvent::new(
            ChannelId::new(channel),
            UserId::new("U1"),
            MessageTs::new(ts),
            text,
        )
    }

    fn edit(channel: &str, ts: &str, text: &str) -> MessageChangedEvent {
        MessageChangedEvent {
            channel: ChannelId::new(channel),
            event_ts: MessageTs::new("999.000001"),
            message: msg(channel, ts, text),
            previous: None,
        }
    }

    impl Fixture {
        async fn send(&self, channel: &str, text: &str) {
            self.tracker.handle_message(msg(channel, TS, text)).await;
            settle().await;
        }

        async fn edit(&self, channel: &str, text: &str) {
            self.tracker.handle_edit(edit(channel, TS, text)).await;
            settle().await;
        }

        async fn record(&self, channel: &str) -> FinishedCommand {
            let id = msg(channel, TS, "").id();
            let handle = self.tracker.table().get(&id).unwrap();
            let record = handle.lock().await;
            record.clone()
        }
    }

    #[tokio::test]
    async fn test_bare_mention_only_waves() {
        let f = fixture();
        f.send("C1", "<@UBOT>").await;

        assert_eq!(f.mock.reactions_added(), vec!["wave".to_string()]);
        assert!(f.mock.sends().is_empty());
        assert_eq!(f.record("C1").await.state, RecordState::Acknowledged);
    }

    #[tokio::test]
    async fn test_plain_chatter_is_not_tracked() {
        let f = fixture();
        f.send("C1", "just talking").await;
        assert!(f.tracker.table().is_empty());
        assert!(f.mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_echo_replies_verbatim() {
        let f = fixture();
        f.send("C1", "<@UBOT> echo hello world").await;

        assert_eq!(f.mock.sends_to("C1"), vec!["hello world".to_string()]);
        assert_eq!(f.mock.reactions_added(), vec!["white_check_mark".to_string()]);
        let record = f.record("C1").await;
        assert_eq!(record.state, RecordState::Executed);
        assert!(record.command_found);
        assert_eq!(record.result.unwrap().code, ResultCode::Ok);
    }

    #[tokio::test]
    async fn test_whitespace_edit_is_ignored() {
        let f = fixture();
        f.send("C1", "<@UBOT> fail now").await;
        let before = f.record("C1").await;
        let calls = f.mock.calls().len();

        f.edit("C1", "<@UBOT>   fail   now ").await;

        assert_eq!(f.mock.calls().len(), calls);
        assert_eq!(f.runs.load(Ordering::SeqCst), 1);
        assert_eq!(f.record("C1").await.reactions, before.reactions);
    }

    #[tokio::test]
    async fn test_editing_ok_command_is_refused() {
        let f = fixture();
        f.send("C1", "<@UBOT> echo one").await;
        f.mock.clear();

        f.edit("C1", "<@UBOT> echo two").await;

        assert_eq!(f.mock.reactions_added(), vec!["x".to_string()]);
        assert!(f.mock.reactions_removed().is_empty());
        let notices = f.mock.sends_to("DU1");
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("echo one"));
        assert!(f.mock.sends_to("C1").is_empty());
        assert!(f.mock.edits().is_empty());
        assert_eq!(f.record("C1").await.result.unwrap().message, "one");
    }

    #[tokio::test]
    async fn test_edit_reruns_and_updates_replies_in_place() {
        let f = fixture();
        f.send("C1", "<@UBOT> fail this").await;
        assert_eq!(f.mock.sends_to("C1"), vec!["<@U1>: cannot this".to_string()]);
        assert_eq!(f.mock.sends_to("CLOG").len(), 1);

        f.edit("C1", "<@UBOT> echo fixed").await;

        assert_eq!(f.mock.sends_to("C1").len(), 1);
        let edits = f.mock.edits();
        assert!(edits.iter().any(|(_, text)| text == "fixed"));
        // OK results do not log, so the audit entry is blanked.
        assert!(edits.iter().any(|(_, text)| text == REMOVED_PLACEHOLDER));
        assert_eq!(f.mock.reactions_removed(), vec!["no_entry_sign".to_string()]);
        assert_eq!(
            f.mock.reactions_added(),
            vec!["no_entry_sign".to_string(), "white_check_mark".to_string()]
        );

        let record = f.record("C1").await;
        assert_eq!(record.state, RecordState::Edited);
        assert!(record.args.unwrap().is_edit);
    }

    #[tokio::test]
    async fn test_simple_undo_blanks_replies() {
        let f = fixture();
        f.send("C1", "<@UBOT> fail this").await;
        f.mock.clear();

        f.edit("C1", "never mind").await;

        assert_eq!(f.mock.reactions_removed(), vec!["no_entry_sign".to_string()]);
        let edits = f.mock.edits();
        assert_eq!(edits.len(), 2);
        assert!(edits.iter().all(|(_, text)| text == REMOVED_PLACEHOLDER));
        assert!(f.mock.sends().is_empty());
        assert_eq!(f.record("C1").await.state, RecordState::Reverted);

        // Editing back runs the command again.
        f.edit("C1", "<@UBOT> fail again").await;
        assert_eq!(f.runs.load(Ordering::SeqCst), 2);
        assert_eq!(f.record("C1").await.state, RecordState::Executed);
    }

    #[tokio::test]
    async fn test_undo_to_wave_keeps_greeting() {
        let f = fixture();
        f.send("C1", "<@UBOT> fail this").await;
        f.edit("C1", "<@UBOT>").await;

        let record = f.record("C1").await;
        assert_eq!(record.state, RecordState::Reverted);
        let emoji: Vec<&str> = record.reactions.iter().map(|r| r.emoji.as_str()).collect();
        assert_eq!(emoji, ["wave"]);
    }

    #[tokio::test]
    async fn test_refused_undo_notifies_once() {
        let f = fixture();
        f.send("C1", "<@UBOT> echo keep").await;
        f.mock.clear();

        f.edit("C1", "oops").await;
        f.edit("C1", "oops again").await;

        assert_eq!(f.mock.reactions_added(), vec!["x".to_string()]);
        assert_eq!(f.mock.sends_to("DU1").len(), 1);
        let record = f.record("C1").await;
        assert!(record.undo_failed);
        assert_eq!(record.state, RecordState::UndoFailed);
    }

    #[tokio::test]
    async fn test_custom_undo_runs_handler() {
        let f = fixture();
        f.send("C1", "<@UBOT> undoable").await;
        f.edit("C1", "gone").await;

        assert_eq!(f.undos.load(Ordering::SeqCst), 1);
        assert_eq!(f.record("C1").await.state, RecordState::Reverted);
        assert!(f.mock.edits().iter().any(|(_, text)| text == REMOVED_PLACEHOLDER));
        assert!(f.mock.sends_to("DU1").is_empty());
    }

    #[tokio::test]
    async fn test_custom_undo_without_handler_is_unsupported() {
        let f = fixture();
        f.send("C1", "<@UBOT> sticky").await;
        f.edit("C1", "gone").await;

        let notices = f.mock.sends_to("DU1");
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("does not support undo"));
        assert!(f.mock.reactions_added().contains(&"x".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_command_in_direct_message() {
        let f = fixture();
        f.send("DU1", "frobnicate now").await;

        let dm = f.mock.sends_to("DU1");
        assert_eq!(dm.len(), 1);
        assert!(dm[0].contains("didn't quite understand"));
        assert_eq!(f.mock.sends_to("CPRIVLOG").len(), 1);
        assert!(f.mock.sends_to("CLOG").is_empty());
        assert_eq!(f.mock.reactions_added(), vec!["question".to_string()]);
        assert!(!f.record("DU1").await.command_found);
    }

    #[tokio::test]
    async fn test_strict_parse_error_is_not_dispatched() {
        let f = fixture();
        f.send("C1", "<@UBOT> fail &3").await;

        assert_eq!(f.runs.load(Ordering::SeqCst), 0);
        let record = f.record("C1").await;
        let result = record.result.unwrap();
        assert_eq!(result.code, ResultCode::Failure);
        assert!(result.message.contains("&3"));
    }

    #[tokio::test]
    async fn test_wave_edited_into_command_runs_it() {
        let f = fixture();
        f.send("C1", "<@UBOT>").await;
        f.edit("C1", "<@UBOT> echo late").await;

        assert_eq!(f.mock.sends_to("C1"), vec!["late".to_string()]);
        assert_eq!(f.mock.reactions_removed(), vec!["wave".to_string()]);
        assert_eq!(f.record("C1").await.state, RecordState::Executed);
    }

    #[tokio::test]
    async fn test_untracked_edits() {
        let f = fixture();

        // Recent message edited into a command: runs it.
        let now = MessageTs::from_system_time(SystemTime::now());
        f.tracker
            .handle_edit(edit("C1", now.as_str(), "<@UBOT> echo fresh"))
            .await;
        assert_eq!(f.mock.sends_to("C1"), vec!["fresh".to_string()]);

        // Not a command: nothing happens.
        f.tracker.handle_edit(edit("C2", now.as_str(), "hello")).await;
        assert_eq!(f.tracker.table().len(), 1);

        // Too old to correlate: private notice only.
        f.tracker
            .handle_edit(edit("C3", "1000.000001", "<@UBOT> echo stale"))
            .await;
        let notices = f.mock.sends_to("DU1");
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("could not be correlated"));
        assert!(f.mock.sends_to("C3").is_empty());
    }

    #[tokio::test]
    async fn test_expired_command_edited_into_chatter_gets_notice() {
        let f = fixture();
        let mut changed = edit("C1", "1000.000001", "never mind");
        changed.previous = Some(msg("C1", "1000.000001", "<@UBOT> echo stale"));
        f.tracker.handle_edit(changed).await;

        let notices = f.mock.sends_to("DU1");
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("could not be correlated"));
        assert!(f.tracker.table().is_empty());

        // Old chatter that never was a command stays quiet.
        f.tracker
            .handle_edit(edit("C2", "1000.000001", "typo fixed"))
            .await;
        assert_eq!(f.mock.sends_to("DU1").len(), 1);
    }

    #[tokio::test]
    async fn test_edit_delivered_before_original_runs_once() {
        let f = fixture();
        let now = MessageTs::from_system_time(SystemTime::now());
        f.tracker
            .handle_edit(edit("C1", now.as_str(), "<@UBOT> echo fresh"))
            .await;
        settle().await;
        f.tracker
            .handle_message(msg("C1", now.as_str(), "<@UBOT> echo fresh"))
            .await;
        settle().await;

        assert_eq!(f.mock.sends_to("C1"), vec!["fresh".to_string()]);
        assert_eq!(f.mock.reactions_added().len(), 1);
        assert_eq!(f.tracker.table().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_sends_leave_record_consistent() {
        let f = fixture();
        f.mock.fail_sends(true);
        f.send("C1", "<@UBOT> fail this").await;

        assert_eq!(f.runs.load(Ordering::SeqCst), 1);
        assert!(f.mock.sends().is_empty());
        assert_eq!(f.mock.reactions_added().len(), 1);
        let record = f.record("C1").await;
        assert_eq!(record.state, RecordState::Executed);
        assert!(record.replies.is_empty());

        // The lost reply is posted fresh once sending works again.
        f.mock.fail_sends(false);
        f.edit("C1", "<@UBOT> fail that").await;
        assert_eq!(f.runs.load(Ordering::SeqCst), 2);
        assert!(f.mock.edits().is_empty());
        assert_eq!(f.mock.sends_to("C1").len(), 1);
        assert!(!f.record("C1").await.replies.is_empty());
    }

    #[tokio::test]
    async fn test_failed_reactions_do_not_block_replies() {
        let f = fixture();
        f.mock.fail_reactions(true);
        f.send("C1", "<@UBOT> echo hi").await;

        assert!(f.mock.reactions_added().is_empty());
        assert_eq!(f.mock.sends_to("C1"), vec!["hi".to_string()]);
        let record = f.record("C1").await;
        assert_eq!(record.state, RecordState::Executed);
        assert_eq!(record.reactions.len(), 1);
    }

    #[tokio::test]
    async fn test_own_messages_are_ignored() {
        let f = fixture();
        let mut own = msg("C1", TS, "<@UBOT> echo loop");
        own.user = UserId::new("UBOT");
        f.tracker.handle_message(own).await;
        assert!(f.tracker.table().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_janitor_evicts_and_stops() {
        let f = fixture();
        f.send("C1", "<@UBOT> echo hi").await;
        let token = CancellationToken::new();
        let janitor = f
            .tracker
            .spawn_janitor(Duration::from_secs(30 * 60), token.clone());

        tokio::time::sleep(Duration::from_secs(60 * 60)).await;
        assert_eq!(f.tracker.table().len(), 1);

        tokio::time::sleep(Duration::from_secs(90 * 60)).await;
        assert!(f.tracker.table().is_empty());

        token.cancel();
        tokio_test::assert_ok!(janitor.await);
    }
}
