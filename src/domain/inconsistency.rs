// ==========================================
// 生产排程与进度对账系统 - 不一致与对账动作模型
// ==========================================
// InconsistencyRecord: 每次检查全量新建, 只被取代不被修改
// ReconciliationAction: 封闭和类型, 四种策略各自携带专属载荷
// ==========================================

use crate::domain::types::InconsistencyKind;
use serde::{Deserialize, Serialize};

// ==========================================
// InconsistencyRecord - 不一致记录
// ==========================================
// 检查结论是数据不是错误; 调用方按集合处理, 顺序无语义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InconsistencyRecord {
    pub order_id: String,             // 工单ID
    pub kind: InconsistencyKind,      // 不一致类型
    pub step_id: Option<String>,      // 涉事工序 (I1 无单一工序时为空)
    pub reported_value: f64,          // 实际观测值
    pub expected_value: f64,          // 期望值
    pub description: String,          // 人读描述
}

// ==========================================
// ReconciliationAction - 对账动作
// ==========================================
// 每次 apply 恰好一个动作; 要么全部生效要么原样返回
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationAction {
    /// 人工逐工序改写完成量, 随后按 I1 重算工单上报进度
    Manual {
        entries: Vec<StepQuantity>,
        /// 显式放行超产 (超过 total*(1+超产上限) 的写入)
        allow_overproduction: bool,
    },
    /// 向前级联: 调用方给出触发工序及其之前所有工序的目标分布
    CascadeBackward {
        trigger_step_id: String,
        targets: Vec<StepQuantity>,
    },
    /// 直接覆写工单上报进度, 不触碰任何工序 (唯一允许背离 I1 字面值的动作)
    UpdateOrderProgress { new_progress: f64 },
    /// 回滚: 所有工序完成量清零, 可选同时清零工单进度
    Reset { also_reset_order: bool },
}

impl ReconciliationAction {
    /// 动作类型标签 (日志/审计用)
    pub fn kind_str(&self) -> &'static str {
        match self {
            ReconciliationAction::Manual { .. } => "MANUAL",
            ReconciliationAction::CascadeBackward { .. } => "CASCADE_BACKWARD",
            ReconciliationAction::UpdateOrderProgress { .. } => "UPDATE_ORDER_PROGRESS",
            ReconciliationAction::Reset { .. } => "RESET",
        }
    }
}

// ==========================================
// StepQuantity - 工序目标量
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepQuantity {
    pub step_id: String,            // 工序ID
    pub new_completed_quantity: f64, // 目标完成量
}

impl StepQuantity {
    pub fn new(step_id: &str, new_completed_quantity: f64) -> Self {
        Self {
            step_id: step_id.to_string(),
            new_completed_quantity,
        }
    }
}
