//! Plan command implementation.
//!
//! The `operarius plan` command prints the batches a run would process.

use std::io::Write;

use crate::cli::args::PlanArgs;
use crate::error::Result;
use crate::runner::{RunOptions, RunPlan};
use crate::task::TaskSet;

use super::dispatcher::{Command, CommandResult};
use super::setup::LoadedManifest;

/// The plan command implementation.
pub struct PlanCommand {
    args: PlanArgs,
}

impl PlanCommand {
    /// Create a new plan command.
    pub fn new(args: PlanArgs) -> Self {
        Self { args }
    }
}

/// Render a plan as plain text.
pub fn render_plan(plan: &RunPlan, tasks: &TaskSet, options: &RunOptions) -> String {
    let mut text = format!(
        "Plan for '{}' in '{}' ({} action, {} task(s))\n",
        options.command,
        options.context,
        plan.action,
        plan.task_count()
    );

    for (index, batch) in plan.batches.iter().enumerate() {
        text.push_str(&format!("\nBatch {}\n", index + 1));
        for id in batch {
            let task_type = tasks.get(id).map(|t| t.task_type()).unwrap_or("?");
            let deps: Vec<&str> = plan
                .graph
                .dependencies_of(id)
                .into_iter()
                .chain(plan.graph.external_dependencies_of(id))
                .flatten()
                .map(String::as_str)
                .collect();
            if deps.is_empty() {
                text.push_str(&format!("  {} [{}]\n", id, task_type));
            } else {
                text.push_str(&format!(
                    "  {} [{}] <- {}\n",
                    id,
                    task_type,
                    deps.join(", ")
                ));
            }
        }
    }

    let external = plan.external();
    if !external.is_empty() {
        let ids: Vec<&str> = external.into_iter().collect();
        text.push_str(&format!("\nFrom prior state: {}\n", ids.join(", ")));
    }

    text
}

impl Command for PlanCommand {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult> {
        let loaded = LoadedManifest::load(&self.args.manifest)?;
        let runner = loaded.runner(self.args.state.as_deref())?;
        let options = loaded
            .settings
            .run_options(&self.args.command, &self.args.context);

        let plan = runner.plan(&loaded.tasks, &options)?;
        write!(out, "{}", render_plan(&plan, &loaded.tasks, &options))?;
        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{PassthroughProcessor, ProcessorRegistry};
    use crate::runner::WorkflowRunner;
    use crate::task::Task;
    use serde_yaml::Value;

    #[test]
    fn renders_batches_with_dependencies() {
        let tasks = TaskSet::from_tasks([
            Task::new("app", "passthrough", Value::Null).depends_on(["db", "net"]),
            Task::new("db", "passthrough", Value::Null).depends_on(["net"]),
            Task::new("net", "passthrough", Value::Null),
        ])
        .unwrap();
        let runner = WorkflowRunner::new(
            ProcessorRegistry::new().with("passthrough", PassthroughProcessor),
        );
        let options = RunOptions::new("create");
        let plan = runner.plan(&tasks, &options).unwrap();

        let text = render_plan(&plan, &tasks, &options);
        assert_eq!(
            text,
            "Plan for 'create' in 'default' (create action, 3 task(s))\n\
             \nBatch 1\n  net [passthrough]\n\
             \nBatch 2\n  db [passthrough] <- net\n\
             \nBatch 3\n  app [passthrough] <- db, net\n"
        );
    }
}
