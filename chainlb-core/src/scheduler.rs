//! 固定周期的后台定时任务
//!
//! 每次触发都会把本轮任务作为独立的tokio任务派发出去（fire-and-forget），
//! 因此单轮出错或panic都不会影响后续调度，耗时较长的轮次之间也可能重叠。

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, trace};

/// 启动一个固定周期的定时任务
///
/// 第一次执行发生在 `first_delay` 之后，此后每隔 `period` 执行一次。
/// 中止返回的 `JoinHandle` 即可停止调度（已派发的轮次会自然结束）。
pub fn spawn_periodic<F, Fut>(
    name: impl Into<String>,
    first_delay: Duration,
    period: Duration,
    task: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let name = name.into();
    // interval 不接受零周期
    let period = period.max(Duration::from_millis(1));

    tokio::spawn(async move {
        debug!(
            "Starting scheduled task '{}' with period {:?} (first delay {:?})",
            name, period, first_delay
        );

        let mut interval = interval_at(Instant::now() + first_delay, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let run = task();
            let run_name = name.clone();
            tokio::spawn(async move {
                let started = Instant::now();
                match tokio::spawn(run).await {
                    Ok(Ok(())) => {
                        trace!(
                            "Scheduled task '{}' finished in {}ms",
                            run_name,
                            started.elapsed().as_millis()
                        );
                    }
                    Ok(Err(e)) => {
                        error!("Scheduled task '{}' failed: {:#}", run_name, e);
                    }
                    Err(e) => {
                        error!("Scheduled task '{}' panicked: {}", run_name, e);
                    }
                }
            });
        }
    })
}
