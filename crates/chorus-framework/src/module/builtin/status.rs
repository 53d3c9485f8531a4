use async_trait::async_trait;

use crate::command::{Command, CommandArguments, CommandResult};
use crate::module::{Module, ModuleContext, ModuleStatus};

/// Lists every module with its lifecycle state.
#[derive(Debug, Default)]
pub struct StatusModule;

fn render(statuses: &[ModuleStatus]) -> String {
    if statuses.is_empty() {
        return "No modules are registered.".to_string();
    }
    let mut out = String::from("Modules:");
    for status in statuses {
        out.push_str(&format!("\n• `{}` {}", status.id, status.state));
        if let Some(reason) = &status.reason {
            out.push_str(&format!(" ({reason})"));
        }
    }
    out
}

#[async_trait]
impl Module for StatusModule {
    fn identifier(&self) -> &str {
        "status"
    }

    async fn enable(&self, ctx: &ModuleContext) -> anyhow::Result<()> {
        let handle = ctx.clone();
        ctx.register_command(
            "modules",
            Command::new("Lists modules and their state.", move |_args: CommandArguments| {
                let text = render(&handle.modules());
                async move { Ok(CommandResult::ok(text)) }
            }),
        )?;
        Ok(())
    }
}
