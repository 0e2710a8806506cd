use crate::config::EngineConfig;
use crate::domain::schedule::{BuildStats, Interval, QueueEntry};
use crate::engine::calendar::WorkCalendar;
use crate::engine::duration::DurationModel;
use crate::engine::error::{EngineError, EngineResult, RateGateOffender};
use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info, warn};

// ==========================================
// ScheduleBuilder - 排程生成引擎
// ==========================================
pub struct ScheduleBuilder {
    duration_model: DurationModel,
}

/// 一次 build 的完整产出
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub intervals: Vec<Interval>,
    pub stats: BuildStats,
}

impl ScheduleBuilder {
    /// 构造函数
    pub fn new() -> Self {
        Self {
            duration_model: DurationModel::new(),
        }
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 生成排程
    ///
    /// 算法 (全局单遍, 按 (优先级序号升序, 路线序号升序) 严格处理;
    /// 同一工单的队列行因此必然前道先于后道落位, 与机台ID无关):
    /// 1) machine_free_at 按机台跟踪下一可用时刻;
    ///    stage_ready_at 按工单跟踪前道工序的落位结束时刻
    /// 2) 剩余量 <= 0 的工序不产生时间片
    /// 3) 时长 = 剩余量 / 台时产量 (工作小时)
    /// 4) 最早开始 = max(machine_free_at, stage_ready_at);
    ///    无前道工序时 stage_ready_at = 程序排产起点
    /// 5) 沿日历前向消耗时长, 每越过一次班次边界关闭当前时间片并在
    ///    下一工作日班次开始处开新片 (拆分标志 + 递增日序号)
    /// 6) 各时间片数量按时长比例分摊, 末片吸收舍入余量
    ///
    /// # 参数
    /// - `machine_queues`: 机台ID → 队列行 (已过滤完工/取消工序)
    /// - `calendar`: 工作日历
    /// - `program_start`: 程序排产起点 (无前道约束时的 stage_ready_at 初值)
    /// - `config`: 引擎配置 (日历扫描上限)
    ///
    /// # 返回
    /// - `Ok(BuildOutcome)`: 时间片集合 + 统计
    /// - `Err(EngineError::RateGate)`: 任一工序台时产量 <= 0, 全量列出违规项
    /// - `Err(EngineError::CalendarExhausted)`: 有界扫描内找不到工作时间
    pub fn build(
        &self,
        machine_queues: &HashMap<String, Vec<QueueEntry>>,
        calendar: &WorkCalendar,
        program_start: NaiveDateTime,
        config: &EngineConfig,
    ) -> EngineResult<BuildOutcome> {
        let total_entries: usize = machine_queues.values().map(|q| q.len()).sum();
        info!(
            machines = machine_queues.len(),
            entries = total_entries,
            program_start = %program_start,
            "开始生成排程"
        );

        // 全局排序后单遍处理: 确定性全序, 同一工单内前道必先于后道
        let mut queue: Vec<&QueueEntry> = machine_queues.values().flatten().collect();
        queue.sort_by(|a, b| Self::compare(a, b));

        // 1. 台时产量门禁 (全程序级, 全量收集违规项后一次性失败)
        let mut offenders = Vec::new();
        for entry in &queue {
            if !entry.rate.is_finite() || entry.rate <= 0.0 {
                offenders.push(RateGateOffender {
                    order_id: entry.order_id.clone(),
                    step_id: entry.step_id.clone(),
                    machine_id: entry.machine_id.clone(),
                    rate: entry.rate,
                });
            }
        }
        if !offenders.is_empty() {
            warn!(offenders = offenders.len(), "台时产量门禁失败, 排程整体中止");
            return Err(EngineError::RateGate { offenders });
        }

        // 2. 逐行落位
        let mut intervals = Vec::new();
        let mut stats = BuildStats::default();
        // 机台下一可用时刻
        let mut machine_free_at: HashMap<String, NaiveDateTime> = HashMap::new();
        // 同一工单的前道落位结束时刻
        let mut stage_ready_at: HashMap<String, NaiveDateTime> = HashMap::new();

        for entry in queue {
            // 2.1 剩余量判定: 已满足的工序对排程不可见
            let remaining = entry.remaining_quantity();
            if remaining <= 0.0 {
                debug!(
                    step_id = %entry.step_id,
                    remaining = remaining,
                    "剩余量非正, 不产生时间片"
                );
                stats.satisfied_steps += 1;
                continue;
            }

            // 2.2 时长与最早开始
            let total_secs = self.duration_model.working_secs(remaining, entry.rate);
            let machine_free = machine_free_at
                .get(&entry.machine_id)
                .copied()
                .unwrap_or(program_start);
            let stage_ready = stage_ready_at
                .get(&entry.order_id)
                .copied()
                .unwrap_or(program_start);
            let earliest_start = machine_free.max(stage_ready);

            // 2.3 前向日历行走, 越界拆片
            let slices = self.walk_calendar(
                calendar,
                earliest_start,
                total_secs,
                config.max_scan_days,
                &entry.step_id,
                &entry.machine_id,
            )?;

            // 2.4 数量按时长比例分摊
            let slice_secs: Vec<i64> =
                slices.iter().map(|(s, e)| (*e - *s).num_seconds()).collect();
            let quantities = self.duration_model.apportion(remaining, &slice_secs);

            let split = slices.len() > 1;
            let last_end = slices.last().map(|(_, e)| *e).unwrap_or(earliest_start);

            for (idx, ((start, end), qty)) in
                slices.into_iter().zip(quantities.into_iter()).enumerate()
            {
                intervals.push(Interval {
                    interval_id: format!("IV-{}-{:02}", entry.step_id, idx),
                    step_id: entry.step_id.clone(),
                    order_id: entry.order_id.clone(),
                    machine_id: entry.machine_id.clone(),
                    start,
                    end,
                    quantity: qty,
                    continues: idx + 1 < slice_secs.len(),
                    day_index: idx as u32,
                });
                stats.total_intervals += 1;
            }

            debug!(
                step_id = %entry.step_id,
                machine_id = %entry.machine_id,
                remaining = remaining,
                slices = slice_secs.len(),
                last_end = %last_end,
                "工序落位完成"
            );

            stats.scheduled_steps += 1;
            if split {
                stats.split_steps += 1;
            }

            // 2.5 推进游标
            machine_free_at.insert(entry.machine_id.clone(), last_end);
            let cursor = stage_ready_at.entry(entry.order_id.clone()).or_insert(last_end);
            if *cursor < last_end {
                *cursor = last_end;
            }
        }

        info!(
            scheduled = stats.scheduled_steps,
            satisfied = stats.satisfied_steps,
            split = stats.split_steps,
            intervals = stats.total_intervals,
            "排程生成完成"
        );

        Ok(BuildOutcome { intervals, stats })
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 队列比较: 优先级序号升序, 同序号按路线序号升序
    ///
    /// 传递应用后得到确定性全序; 工序ID兜底仅在同优先级同序号
    /// (数据异常) 时生效, 保证排序结果可复现
    fn compare(a: &QueueEntry, b: &QueueEntry) -> Ordering {
        match a.priority_rank.cmp(&b.priority_rank) {
            Ordering::Equal => {}
            other => return other,
        }
        match a.sequence.cmp(&b.sequence) {
            Ordering::Equal => {}
            other => return other,
        }
        a.step_id.cmp(&b.step_id)
    }

    /// 沿日历前向消耗工作秒数, 返回切出的时间片边界
    fn walk_calendar(
        &self,
        calendar: &WorkCalendar,
        earliest_start: NaiveDateTime,
        total_secs: i64,
        max_scan_days: u32,
        step_id: &str,
        machine_id: &str,
    ) -> EngineResult<Vec<(NaiveDateTime, NaiveDateTime)>> {
        let mut slices = Vec::new();
        let mut cursor = earliest_start;
        let mut left = total_secs;

        while left > 0 {
            let (win_start, win_end) =
                calendar
                    .next_window(cursor, max_scan_days)
                    .ok_or_else(|| EngineError::CalendarExhausted {
                        step_id: step_id.to_string(),
                        machine_id: machine_id.to_string(),
                        scanned_days: max_scan_days,
                    })?;

            let available = (win_end - win_start).num_seconds();
            let take = left.min(available);
            let slice_end = win_start + chrono::Duration::seconds(take);
            slices.push((win_start, slice_end));
            left -= take;

            // 班次耗尽, 从班次结束处继续扫描下一工作日
            cursor = win_end;
        }

        Ok(slices)
    }
}

impl Default for ScheduleBuilder {
    fn default() -> Self {
        Self::new()
    }
}
