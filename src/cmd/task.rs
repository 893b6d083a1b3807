//! Task commands: `qstrack take`, `qstrack complete`, `qstrack tasks`.

use anyhow::Result;
use dialoguer::Confirm;
use uuid::Uuid;

use qstrack::models::{OperatorId, TrackingId, format_minutes};
use qstrack::tracking::TaskTracker;
use qstrack::ui::icons::CHECK;
use qstrack::ui::render;

use super::{Context, failure};

fn tracker(ctx: &Context) -> TaskTracker {
    TaskTracker::new(ctx.directory.clone()).with_completed_limit(ctx.config.toml.tasks.completed_limit)
}

pub async fn cmd_take(ctx: &Context, part_id: Uuid) -> Result<()> {
    let spinner = render::spinner(format!("Taking part {}", part_id));
    let result = tracker(ctx).take_part(&ctx.session, part_id).await;
    spinner.finish_and_clear();

    let record = result.map_err(failure)?;
    println!(
        "{}Took {} (task #{})",
        CHECK,
        record.name(),
        record.tracking_id
    );
    Ok(())
}

/// What `qstrack complete` identifies the task by.
pub enum CompleteTarget {
    Task(TrackingId),
    Part(Uuid),
}

pub async fn cmd_complete(ctx: &Context, target: CompleteTarget) -> Result<()> {
    if !ctx.config.yes {
        let prompt = match &target {
            CompleteTarget::Task(id) => format!("Mark task #{} as completed?", id),
            CompleteTarget::Part(id) => format!("Mark the task on part {} as completed?", id),
        };
        let confirm = Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false);
        if !confirm {
            println!("Completion cancelled");
            return Ok(());
        }
    }

    let tracker = tracker(ctx);
    let spinner = render::spinner("Completing task");
    let result = match target {
        CompleteTarget::Task(id) => tracker.complete_task(&ctx.session, id).await,
        CompleteTarget::Part(id) => tracker.complete_part(&ctx.session, id).await,
    };
    spinner.finish_and_clear();

    let record = result.map_err(failure)?;
    let duration = record
        .duration()
        .map(|d| format_minutes(d.num_minutes()))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}Completed {} (task #{}) in {}",
        CHECK,
        record.name(),
        record.tracking_id,
        duration
    );
    if let Some(state) = record.part_state {
        println!("  Part is now {}", state.label());
    }
    Ok(())
}

pub async fn cmd_tasks(ctx: &Context, operator: Option<OperatorId>) -> Result<()> {
    let operator_id = operator.unwrap_or(ctx.session.operator_id);
    let tasks = tracker(ctx)
        .get_user_tasks(&ctx.session, operator_id)
        .await
        .map_err(failure)?;
    println!();
    print!("{}", render::user_tasks(&tasks));
    println!();
    Ok(())
}
