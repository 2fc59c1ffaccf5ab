//! Runs the daily digest over the REST client.

use std::sync::Arc;

use serenity::http::Http;
use tokio::sync::watch;
use tracing::info;

use rollup_digest::{RollupRunner, RunOptions};
use rollup_scheduler::DailyTrigger;

use crate::gateway::SerenityGateway;

/// Background task that fires the default run at every scheduled time.
///
/// Spawned once in `adapter.rs` after the first serenity client is built.
/// Runs until `shutdown` flips to `true`.
pub async fn run_scheduled_rollups(
    trigger: DailyTrigger,
    runner: Arc<RollupRunner>,
    http: Arc<Http>,
    shutdown: watch::Receiver<bool>,
) {
    let gateway = Arc::new(SerenityGateway::new(http));
    trigger
        .run(
            move || {
                let runner = Arc::clone(&runner);
                let gateway = Arc::clone(&gateway);
                async move {
                    let report = runner.run(gateway.as_ref(), RunOptions::scheduled()).await;
                    info!(
                        items = report.items,
                        failed = report.failed,
                        batches_failed = report.batches_failed,
                        "scheduled rollup finished"
                    );
                }
            },
            shutdown,
        )
        .await;

    info!("scheduled rollup task exiting");
}
