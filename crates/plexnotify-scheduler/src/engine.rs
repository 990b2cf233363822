//! Run loop: fires a reconciliation run on every interval tick.
//! Uses tokio::interval so the process sleeps between runs.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::reconcile::Reconciler;
use crate::report::RunOutcome;

/// Run `reconciler` every `every` until `shutdown` resolves. The first run
/// starts immediately. Runs never overlap within this loop; a run that
/// outlasts the interval swallows the missed ticks.
///
/// Returns the number of runs started.
pub async fn run_loop<S>(reconciler: Arc<Reconciler>, every: Duration, shutdown: S) -> usize
where
    S: Future<Output = ()>,
{
    tracing::info!("⏰ Reconciler started (every {}s)", every.as_secs());

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut runs = 0usize;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("🛑 Reconciler stopping after {runs} run(s)");
                return runs;
            }
            _ = interval.tick() => {}
        }

        runs += 1;
        match reconciler.run().await {
            Ok(RunOutcome::Completed(report)) => {
                if report.failed() > 0 {
                    tracing::warn!(
                        "⚠️ Run {runs} finished with {} failed record(s)",
                        report.failed()
                    );
                }
            }
            Ok(RunOutcome::Skipped) => {}
            Err(e) => tracing::error!("❌ Run {runs} failed: {e}"),
        }
    }
}
