// ==========================================
// 生产排程与进度对账系统 - 排程领域模型
// ==========================================
// 红线: Interval 是 (优先级, 机台指派, 台时产量, 剩余量, 日历) 的确定性投影,
//       不是持久化权威数据; 一次 build 内由 ScheduleBuilder 独占所有权
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// QueueEntry - 机台队列行 (排程输入)
// ==========================================
// 来源: 编排层按 (工单优先级, 工艺路线, 机台指派) 展开的行数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub order_id: String,       // 工单ID
    pub priority_rank: i32,     // 程序内优先级序号
    pub step_id: String,        // 工序ID
    pub sequence: i32,          // 路线内序号
    pub machine_id: String,     // 机台ID
    pub rate: f64,              // 台时产量 (件/工作小时)
    pub total_quantity: f64,    // 工序总量
    pub completed_quantity: f64, // 工序完成量
}

impl QueueEntry {
    /// 剩余待排数量
    pub fn remaining_quantity(&self) -> f64 {
        self.total_quantity - self.completed_quantity
    }
}

// ==========================================
// Interval - 排程落位时间片 (排程输出)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub interval_id: String,        // 时间片ID (确定性生成: IV-{step_id}-{day_index})
    pub step_id: String,            // 工序ID
    pub order_id: String,           // 工单ID
    pub machine_id: String,         // 机台ID
    pub start: NaiveDateTime,       // 开始时间
    pub end: NaiveDateTime,         // 结束时间
    pub quantity: f64,              // 本时间片承载数量
    pub continues: bool,            // 后续还有同工序时间片 (跨班次拆分)
    pub day_index: u32,             // 拆分日序号 (未拆分为 0)
}

impl Interval {
    /// 判断该时间片是否来自跨班次拆分
    pub fn is_split(&self) -> bool {
        self.continues || self.day_index > 0
    }

    /// 时间片时长 (秒)
    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

// ==========================================
// BuildStats - 排程统计
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildStats {
    pub scheduled_steps: usize,  // 产生时间片的工序数
    pub satisfied_steps: usize,  // 剩余量 <= 0, 不产生时间片的工序数
    pub split_steps: usize,      // 发生跨班次拆分的工序数
    pub total_intervals: usize,  // 时间片总数
}

// ==========================================
// ScheduleSnapshot - 排程快照 (编排层可见结果)
// ==========================================
// 快照ID仅用于编排层标识一次已提交的计算, 不参与 build 的确定性输出
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    pub snapshot_id: String,        // 快照ID (uuid)
    pub generation: u64,            // 输入代次 (用于陈旧结果丢弃)
    pub intervals: Vec<Interval>,   // 时间片集合
    pub stats: BuildStats,          // 统计
}
