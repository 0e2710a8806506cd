// ==========================================
// 生产排程与进度对账系统 - 工单领域模型
// ==========================================
// 实体: Program(排产程序) / Order(工单, OT) / RouteStep(工艺路线工序)
// 红线: 末道工序完成量是工单进度的权威口径 (I1)
// 红线: 同一路线内前道完成量 >= 后道完成量 (I2)
// ==========================================

use crate::domain::types::StepState;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Program - 排产程序
// ==========================================
// 工单引用顺序即排产优先级, 由操作员调整
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub program_id: String,         // 程序ID
    pub program_name: String,       // 程序名称
    pub start_date: NaiveDate,      // 排产起始日期
    pub end_date: NaiveDate,        // 排产结束日期
    pub order_ids: Vec<String>,     // 工单引用 (顺序即优先级)
}

impl Program {
    /// 查询工单在程序内的优先级序号 (0 起)
    pub fn priority_rank_of(&self, order_id: &str) -> Option<usize> {
        self.order_ids.iter().position(|id| id == order_id)
    }
}

// ==========================================
// Order - 工单 (OT)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,           // 工单ID
    pub code: String,               // 工单编号
    pub total_quantity: f64,        // 需求总量
    pub reported_progress: f64,     // 上报进度量
    pub route: Vec<RouteStep>,      // 工艺路线 (按 sequence 定义先后)
    pub priority_rank: i32,         // 程序内优先级序号

    // ===== 对账标志 =====
    pub progress_overridden: bool,  // UPDATE_ORDER_PROGRESS 显式覆写标志 (覆写期间 I1 以上报值为准)
    pub locked: bool,               // 工单锁定 (锁定期间拒绝一切对账动作)
}

impl Order {
    /// 末道工序 (sequence 最大者)
    ///
    /// # 返回
    /// - `Some(&RouteStep)`: 末道工序
    /// - `None`: 路线为空
    pub fn last_step(&self) -> Option<&RouteStep> {
        self.route.iter().max_by_key(|s| s.sequence)
    }

    /// 按 sequence 升序排列的路线视图
    pub fn sorted_route(&self) -> Vec<&RouteStep> {
        let mut steps: Vec<&RouteStep> = self.route.iter().collect();
        steps.sort_by_key(|s| s.sequence);
        steps
    }

    /// 按工序ID查找工序
    pub fn step_by_id(&self, step_id: &str) -> Option<&RouteStep> {
        self.route.iter().find(|s| s.step_id == step_id)
    }

    /// 按工序ID查找工序 (可变)
    pub fn step_by_id_mut(&mut self, step_id: &str) -> Option<&mut RouteStep> {
        self.route.iter_mut().find(|s| s.step_id == step_id)
    }
}

// ==========================================
// RouteStep - 工艺路线工序 (route item)
// ==========================================
// machine_id 为空时不可排程; rate <= 0 时排程整体失败 (门禁)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStep {
    pub step_id: String,                     // 工序ID
    pub sequence: i32,                       // 路线内序号 (严格递增, 定义先后)
    pub process_code: String,                // 工艺代码
    pub process_desc: String,                // 工艺描述
    pub machine_id: Option<String>,          // 机台ID (外部指派, 可空)
    pub rate: f64,                           // 台时产量 (件/工作小时)
    pub total_quantity: f64,                 // 工序总量
    pub completed_quantity: f64,             // 工序完成量
    pub state: StepState,                    // 工序状态
    pub real_start: Option<NaiveDateTime>,   // 实际开工时间 (观测前为空)
    pub real_end: Option<NaiveDateTime>,     // 实际完工时间 (观测前为空)
}

impl RouteStep {
    /// 剩余待排数量
    pub fn remaining_quantity(&self) -> f64 {
        self.total_quantity - self.completed_quantity
    }

    /// 记录实际开工 (状态随之转为生产中)
    pub fn mark_started(&mut self, at: NaiveDateTime) {
        self.real_start = Some(at);
        if self.state == StepState::Pending {
            self.state = StepState::InProgress;
        }
    }

    /// 记录实际完工
    ///
    /// 只改时间与状态, 不改完成量 (完成量由上报/对账路径写入)
    pub fn mark_completed(&mut self, at: NaiveDateTime) {
        self.real_end = Some(at);
        self.state = StepState::Completed;
    }
}
