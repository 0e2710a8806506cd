// ==========================================
// 生产排程与进度对账系统 - 领域类型定义
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与外部系统交换格式一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 工序状态 (Step State)
// ==========================================
// 排程口径: COMPLETED / CANCELLED 不进入机台队列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepState {
    Pending,    // 待生产
    InProgress, // 生产中
    Completed,  // 已完工
    Paused,     // 暂停
    Cancelled,  // 已取消
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepState::Pending => write!(f, "PENDING"),
            StepState::InProgress => write!(f, "IN_PROGRESS"),
            StepState::Completed => write!(f, "COMPLETED"),
            StepState::Paused => write!(f, "PAUSED"),
            StepState::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl StepState {
    /// 从字符串解析工序状态
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "IN_PROGRESS" => StepState::InProgress,
            "COMPLETED" => StepState::Completed,
            "PAUSED" => StepState::Paused,
            "CANCELLED" => StepState::Cancelled,
            _ => StepState::Pending, // 默认值
        }
    }

    /// 转换为外部系统交换用的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            StepState::Pending => "PENDING",
            StepState::InProgress => "IN_PROGRESS",
            StepState::Completed => "COMPLETED",
            StepState::Paused => "PAUSED",
            StepState::Cancelled => "CANCELLED",
        }
    }

    /// 判断该状态的工序是否参与排程
    pub fn is_schedulable(&self) -> bool {
        !matches!(self, StepState::Completed | StepState::Cancelled)
    }
}

// ==========================================
// 不一致类型 (Inconsistency Kind)
// ==========================================
// I1: 末道工序权威 (LAST_STEP_IMBALANCE)
// I2: 顺流单调性 (ILLOGICAL_FLOW)
// I3: 状态与数量匹配 (WRONG_STATE)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InconsistencyKind {
    LastStepImbalance, // 工单上报进度 ≠ 末道工序完成量
    IllogicalFlow,     // 后道工序完成量 > 前道工序完成量
    WrongState,        // 状态为完工但完成量 < 总量
}

impl fmt::Display for InconsistencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InconsistencyKind::LastStepImbalance => write!(f, "LAST_STEP_IMBALANCE"),
            InconsistencyKind::IllogicalFlow => write!(f, "ILLOGICAL_FLOW"),
            InconsistencyKind::WrongState => write!(f, "WRONG_STATE"),
        }
    }
}

// ==========================================
// 工单一致性状态 (Consistency Status)
// ==========================================
// 状态机: CONSISTENT ⇄ INCONSISTENT, 无终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsistencyStatus {
    Consistent,   // 无未决不一致, 可参与排程
    Inconsistent, // 存在未决不一致, 工序不进入机台队列
}

impl fmt::Display for ConsistencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyStatus::Consistent => write!(f, "CONSISTENT"),
            ConsistencyStatus::Inconsistent => write!(f, "INCONSISTENT"),
        }
    }
}
