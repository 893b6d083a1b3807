//! State board: `qstrack board`.

use anyhow::Result;
use console::Term;

use qstrack::aggregator::{FeedEvent, PartStateAggregator, PollingFeed, StateBoard, StateGroupFeed};
use qstrack::models::PartState;
use qstrack::ui::render;
use qstrack::view::{Notice, ViewScope};

use super::{Context, failure};

fn render_board(board: &StateBoard, state: Option<PartState>, limit: usize) -> String {
    match state {
        Some(state) => render::state_column(board, state, limit),
        None => render::board_summary(board),
    }
}

pub async fn cmd_board(
    ctx: &Context,
    scope: &ViewScope,
    state: Option<PartState>,
    watch: bool,
) -> Result<()> {
    let aggregator = PartStateAggregator::new(ctx.directory.clone());
    let limit = ctx.config.toml.board.preview_limit;

    if !watch {
        let spinner = render::spinner("Loading state board");
        let result = scope.run(aggregator.board(&ctx.session)).await;
        spinner.finish_and_clear();
        let Some(result) = result else {
            return Ok(());
        };
        let board = result.map_err(failure)?;
        println!();
        print!("{}", render_board(&board, state, limit));
        println!();
        return Ok(());
    }

    let feed = PollingFeed::spawn(aggregator, ctx.session.clone(), ctx.config.poll_interval());
    let mut rx = feed.subscribe();
    let term = Term::stdout();
    while let Some(Ok(())) = scope.run(rx.changed()).await {
        let event = rx.borrow_and_update().clone();
        match event {
            FeedEvent::Pending => {}
            FeedEvent::Updated(board) => {
                let _ = term.clear_screen();
                print!("{}", render_board(&board, state, limit));
                println!("(refreshing every {}s, Ctrl-C to stop)", ctx.config.toml.board.poll_interval_secs);
            }
            FeedEvent::Failed(err) => {
                println!("{}", render::notice(&Notice::from_error(&err)));
            }
        }
    }
    feed.stop();
    Ok(())
}
