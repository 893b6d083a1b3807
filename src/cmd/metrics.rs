//! Operator performance view: `qstrack metrics`.

use anyhow::Result;

use qstrack::models::OperatorId;
use qstrack::tracking::TaskTracker;
use qstrack::ui::render;

use super::{Context, failure};

pub async fn cmd_metrics(ctx: &Context, operator: Option<OperatorId>) -> Result<()> {
    let operator_id = operator.unwrap_or(ctx.session.operator_id);
    let metrics = TaskTracker::new(ctx.directory.clone())
        .get_metrics(&ctx.session, operator_id)
        .await
        .map_err(failure)?;
    println!();
    print!("{}", render::metrics(operator_id, &metrics));
    println!();
    Ok(())
}
