//! 基于延迟的加权随机选择
//!
//! 设候选中最大延迟为 `max`，则每个候选的权重为 `2 * max - latency`：
//! 延迟越低权重越大，最慢的候选仍保留 `max` 的最小权重。
//! 各候选按列表顺序从0开始分配连续的整数区间，随机数落在哪个区间就选哪个。

use super::NodeStatus;
use rand::Rng;
use std::ops::Range;

/// 计算每个候选的权重区间，返回区间列表与总权重
pub fn weighted_ranges(latencies: &[u64]) -> (Vec<Range<u64>>, u64) {
    let max_latency = latencies.iter().copied().max().unwrap_or(0);
    let mut next_start = 0u64;

    let ranges = latencies
        .iter()
        .map(|latency| {
            let weight = max_latency.saturating_mul(2).saturating_sub(*latency);
            let start = next_start;
            next_start = next_start.saturating_add(weight);
            start..next_start
        })
        .collect();

    (ranges, next_start)
}

/// 从健康端点中按延迟加权随机选择一个
///
/// 只有一个候选时直接返回，不消耗随机数；总权重为0（延迟全为0）时退化为均匀选择。
pub fn pick_weighted<'a, R: Rng + ?Sized>(
    candidates: &'a [NodeStatus],
    rng: &mut R,
) -> Option<&'a NodeStatus> {
    match candidates.len() {
        0 => None,
        1 => candidates.first(),
        len => {
            let latencies: Vec<u64> = candidates.iter().map(|c| c.latency_millis).collect();
            let (ranges, total_weight) = weighted_ranges(&latencies);

            if total_weight == 0 {
                return candidates.get(rng.random_range(0..len));
            }

            let picked = rng.random_range(0..total_weight);
            ranges
                .iter()
                .position(|range| range.contains(&picked))
                .and_then(|index| candidates.get(index))
        }
    }
}

/// 获取当前候选的选择概率（用于监控）
pub fn current_weights(candidates: &[NodeStatus]) -> Vec<(String, f64)> {
    if candidates.len() == 1 {
        return vec![(candidates[0].url.to_string(), 1.0)];
    }

    let latencies: Vec<u64> = candidates.iter().map(|c| c.latency_millis).collect();
    let (ranges, total_weight) = weighted_ranges(&latencies);

    candidates
        .iter()
        .zip(ranges)
        .map(|(candidate, range)| {
            let share = if total_weight == 0 {
                1.0 / candidates.len() as f64
            } else {
                (range.end - range.start) as f64 / total_weight as f64
            };
            (candidate.url.to_string(), share)
        })
        .collect()
}
