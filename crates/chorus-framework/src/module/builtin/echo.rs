use async_trait::async_trait;

use crate::command::{Command, CommandArguments, CommandResult};
use crate::module::{Module, ModuleContext};

/// Repeats its arguments verbatim, without the username prefix.
#[derive(Debug, Default)]
pub struct EchoModule;

async fn echo(args: CommandArguments) -> anyhow::Result<CommandResult> {
    if args.is_empty() {
        return Ok(CommandResult::usage("Usage: `echo <text>`"));
    }
    Ok(CommandResult::ok(args.rest()).omit_username())
}

#[async_trait]
impl Module for EchoModule {
    fn identifier(&self) -> &str {
        "echo"
    }

    async fn enable(&self, ctx: &ModuleContext) -> anyhow::Result<()> {
        ctx.register_command("echo", Command::new("Repeats what you say.", echo))?;
        Ok(())
    }
}
