//! Hierarchical command registry and dispatch.
//!
//! A [`CommandTree`] maps names to either a leaf [`Command`] or a nested
//! tree.  Dispatch pops one name per level:
//!
//! ```text
//! ["factoid", "remember", "x", "y"]
//!     root ──factoid──▶ subtree ──remember──▶ leaf(args = ["x", "y"])
//! ```
//!
//! An exhausted argument vector, or `help`, lists the current level.  A miss
//! yields [`ResultCode::NoSuchCommand`](super::ResultCode::NoSuchCommand).

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::args::CommandArguments;
use super::result::CommandResult;
use crate::error::{CommandError, CommandTreeResult, Panicked};

/// Name that lists the commands of a level instead of dispatching.
pub const HELP_COMMAND: &str = "help";

/// An async command handler.
///
/// Implemented for every `Fn(CommandArguments) -> impl Future<Output =
/// anyhow::Result<CommandResult>>`.  An `Err` becomes an `Error` result with
/// the error as its cause.
#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    async fn call(&self, args: CommandArguments) -> anyhow::Result<CommandResult>;
}

#[async_trait]
impl<F, Fut> CommandHandler for F
where
    F: Fn(CommandArguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<CommandResult>> + Send + 'static,
{
    async fn call(&self, args: CommandArguments) -> anyhow::Result<CommandResult> {
        (self)(args).await
    }
}

/// A leaf command: handler, help text and an optional undo handler.
#[derive(Clone)]
pub struct Command {
    handler: Arc<dyn CommandHandler>,
    undo: Option<Arc<dyn CommandHandler>>,
    help: String,
}

impl Command {
    /// Creates a leaf from an async closure.
    pub fn new<F, Fut>(help: impl Into<String>, handler: F) -> Self
    where
        F: Fn(CommandArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<CommandResult>> + Send + 'static,
    {
        Self::from_handler(help, handler)
    }

    /// Creates a leaf from any [`CommandHandler`] implementation.
    pub fn from_handler(help: impl Into<String>, handler: impl CommandHandler) -> Self {
        Self {
            handler: Arc::new(handler),
            undo: None,
            help: help.into(),
        }
    }

    /// Attaches a compensating handler, invoked when the triggering message
    /// is undone and the result allows custom undo.
    pub fn with_undo<F, Fut>(mut self, undo: F) -> Self
    where
        F: Fn(CommandArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<CommandResult>> + Send + 'static,
    {
        self.undo = Some(Arc::new(undo));
        self
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn has_undo(&self) -> bool {
        self.undo.is_some()
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("help", &self.help)
            .field("has_undo", &self.undo.is_some())
            .finish()
    }
}

#[derive(Clone)]
enum Node {
    Leaf(Arc<Command>),
    Tree(Arc<CommandTree>),
}

impl Node {
    fn help(&self) -> &str {
        match self {
            Node::Leaf(cmd) => cmd.help(),
            Node::Tree(tree) => tree.help(),
        }
    }
}

enum Resolution {
    Leaf(Arc<Command>),
    Help(String),
    Missing,
}

/// One level of the command hierarchy.
pub struct CommandTree {
    help: String,
    nodes: RwLock<BTreeMap<String, Node>>,
}

impl CommandTree {
    pub fn new(help: impl Into<String>) -> Self {
        Self {
            help: help.into(),
            nodes: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    /// Registers a leaf command under `name`.
    pub fn register(&self, name: &str, command: Command) -> CommandTreeResult<()> {
        self.insert(name, Node::Leaf(Arc::new(command)))
    }

    /// Registers a nested tree under `name`.
    pub fn register_tree(&self, name: &str, tree: Arc<CommandTree>) -> CommandTreeResult<()> {
        self.insert(name, Node::Tree(tree))
    }

    fn insert(&self, name: &str, node: Node) -> CommandTreeResult<()> {
        if name.is_empty() || name.chars().any(char::is_whitespace) || name == HELP_COMMAND {
            return Err(CommandError::InvalidName(name.to_string()));
        }
        let mut nodes = self.nodes.write();
        if nodes.contains_key(name) {
            return Err(CommandError::Duplicate(name.to_string()));
        }
        nodes.insert(name.to_string(), node);
        debug!(command = name, "Command registered");
        Ok(())
    }

    /// Removes `name` from this level.  Returns `false` when it was absent.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.nodes.write().remove(name).is_some();
        if removed {
            debug!(command = name, "Command unregistered");
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.read().contains_key(name)
    }

    /// Names registered at this level, sorted.
    pub fn names(&self) -> Vec<String> {
        self.nodes.read().keys().cloned().collect()
    }

    /// Help listing of this level, headed by `path` (the names popped so far).
    pub fn help_listing(&self, path: &[String]) -> String {
        let nodes = self.nodes.read();
        let mut out = if path.is_empty() {
            "Available commands:".to_string()
        } else {
            format!("`{}`: {}\nSubcommands:", path.join(" "), self.help)
        };
        if nodes.is_empty() {
            out.push_str("\n(none)");
        }
        for (name, node) in nodes.iter() {
            let marker = if matches!(node, Node::Tree(_)) { " …" } else { "" };
            out.push_str(&format!("\n• `{name}{marker}` - {}", node.help()));
        }
        out
    }

    fn resolve(&self, args: &mut CommandArguments) -> Resolution {
        let path = args.consumed().to_vec();
        let Some(name) = args.pop() else {
            return Resolution::Help(self.help_listing(&path));
        };

        if name == HELP_COMMAND {
            // `help <name>` describes one entry of this level.
            if let Some(target) = args.peek() {
                let node = self.nodes.read().get(target).cloned();
                if let Some(node) = node {
                    return match node {
                        Node::Leaf(cmd) => Resolution::Help(format!("`{target}`: {}", cmd.help())),
                        Node::Tree(tree) => {
                            let mut sub = path.clone();
                            sub.push(target.to_string());
                            Resolution::Help(tree.help_listing(&sub))
                        }
                    };
                }
            }
            return Resolution::Help(self.help_listing(&path));
        }

        let node = self.nodes.read().get(&name).cloned();
        match node {
            None => Resolution::Missing,
            Some(Node::Leaf(cmd)) => Resolution::Leaf(cmd),
            Some(Node::Tree(tree)) => tree.resolve(args),
        }
    }

    /// Resolves and runs the command named by `args`.
    pub async fn dispatch(&self, mut args: CommandArguments) -> CommandResult {
        match self.resolve(&mut args) {
            Resolution::Help(text) => CommandResult::help(text),
            Resolution::Missing => CommandResult::no_such_command(),
            Resolution::Leaf(cmd) => invoke(Arc::clone(&cmd.handler), args).await,
        }
    }

    /// Resolves `args` and runs the leaf's undo handler.
    ///
    /// Returns `None` when the command no longer exists or has no undo
    /// handler.
    pub async fn dispatch_undo(&self, mut args: CommandArguments) -> Option<CommandResult> {
        match self.resolve(&mut args) {
            Resolution::Leaf(cmd) => match &cmd.undo {
                Some(undo) => Some(invoke(Arc::clone(undo), args).await),
                None => None,
            },
            _ => None,
        }
    }
}

impl std::fmt::Debug for CommandTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandTree")
            .field("help", &self.help)
            .field("names", &self.names())
            .finish()
    }
}

async fn invoke(handler: Arc<dyn CommandHandler>, args: CommandArguments) -> CommandResult {
    let command = args.consumed().join(" ");
    match AssertUnwindSafe(handler.call(args)).catch_unwind().await {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => {
            let detail = format!("{err:#}");
            debug!(%command, error = %detail, "Command returned an error");
            CommandResult::error(err)
        }
        Err(payload) => {
            let panicked = Panicked::from_payload(payload);
            warn!(%command, error = %panicked, "Command panicked");
            CommandResult::error(panicked)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandSource, ResultCode};
    use chorus_core::{ChannelId, MessageTs, UserId};

    fn args(line: &str) -> CommandArguments {
        CommandArguments::new(
            CommandSource::new(UserId::new("U1"), ChannelId::new("C1"), MessageTs::new("1.0")),
            line.split_whitespace().map(str::to_string).collect(),
        )
    }

    fn echo_tree() -> CommandTree {
        let tree = CommandTree::new("root");
        tree.register(
            "echo",
            Command::new("Repeats its arguments.", |args: CommandArguments| async move {
                Ok(CommandResult::ok(args.rest()))
            }),
        )
        .unwrap();
        tree
    }

    #[tokio::test]
    async fn test_dispatch_leaf() {
        let result = echo_tree().dispatch(args("echo hello world")).await;
        assert_eq!(result.code, ResultCode::Ok);
        assert_eq!(result.message, "hello world");
    }

    #[tokio::test]
    async fn test_nested_dispatch() {
        let root = echo_tree();
        let sub = Arc::new(CommandTree::new("Factoid commands."));
        sub.register(
            "count",
            Command::new("Counts arguments.", |args: CommandArguments| async move {
                Ok(CommandResult::ok(format!("{} after {:?}", args.len(), args.consumed())))
            }),
        )
        .unwrap();
        root.register_tree("factoid", sub).unwrap();

        let result = root.dispatch(args("factoid count a b c")).await;
        assert_eq!(result.message, r#"3 after ["factoid", "count"]"#);
    }

    #[tokio::test]
    async fn test_miss_is_no_such_command() {
        let result = echo_tree().dispatch(args("nope")).await;
        assert_eq!(result.code, ResultCode::NoSuchCommand);
    }

    #[tokio::test]
    async fn test_empty_and_help_list_commands() {
        let tree = echo_tree();
        for line in ["", "help"] {
            let result = tree.dispatch(args(line)).await;
            assert_eq!(result.code, ResultCode::PrintHelp);
            assert!(result.message.contains("`echo`"), "{}", result.message);
        }

        let result = tree.dispatch(args("help echo")).await;
        assert_eq!(result.message, "`echo`: Repeats its arguments.");
    }

    #[tokio::test]
    async fn test_handler_error_becomes_error_result() {
        let tree = CommandTree::new("root");
        tree.register(
            "fail",
            Command::new("Always fails.", |_args: CommandArguments| async move {
                Err(anyhow::anyhow!("database unavailable"))
            }),
        )
        .unwrap();

        let result = tree.dispatch(args("fail")).await;
        assert_eq!(result.code, ResultCode::Error);
        assert_eq!(result.error_text().unwrap(), "database unavailable");
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_error_result() {
        let tree = CommandTree::new("root");
        tree.register(
            "boom",
            Command::new("Panics.", |_args: CommandArguments| async move {
                if true {
                    panic!("index out of range");
                }
                Ok(CommandResult::ok(""))
            }),
        )
        .unwrap();

        let result = tree.dispatch(args("boom")).await;
        assert_eq!(result.code, ResultCode::Error);
        assert!(result.error_text().unwrap().contains("index out of range"));
    }

    #[test]
    fn test_register_rejects_duplicates_and_bad_names() {
        let tree = echo_tree();
        let cmd = || Command::new("", |_a: CommandArguments| async { Ok(CommandResult::ok("")) });
        assert_eq!(
            tree.register("echo", cmd()),
            Err(CommandError::Duplicate("echo".into()))
        );
        assert!(matches!(tree.register("two words", cmd()), Err(CommandError::InvalidName(_))));
        assert!(matches!(tree.register("help", cmd()), Err(CommandError::InvalidName(_))));
        assert!(tree.unregister("echo"));
        assert!(!tree.unregister("echo"));
        assert!(tree.names().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_undo() {
        let tree = echo_tree();
        assert!(tree.dispatch_undo(args("echo x")).await.is_none());

        tree.register(
            "undoable",
            Command::new("Has an undo.", |_a: CommandArguments| async { Ok(CommandResult::ok("done")) })
                .with_undo(|a: CommandArguments| async move {
                    Ok(CommandResult::ok(format!("undone {}", a.is_undo)))
                }),
        )
        .unwrap();
        let mut undo_args = args("undoable");
        undo_args.is_undo = true;
        let result = tree.dispatch_undo(undo_args).await.unwrap();
        assert_eq!(result.message, "undone true");
    }
}
