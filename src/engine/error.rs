// ==========================================
// 生产排程与进度对账系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 门禁/校验错误同步上抛, 不降级为警告
// ==========================================

use thiserror::Error;

/// 台时产量门禁的单个违规项
#[derive(Debug, Clone, PartialEq)]
pub struct RateGateOffender {
    pub order_id: String,
    pub step_id: String,
    pub machine_id: String,
    pub rate: f64,
}

impl std::fmt::Display for RateGateOffender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "order={} step={} machine={} rate={}",
            self.order_id, self.step_id, self.machine_id, self.rate
        )
    }
}

fn format_offenders(offenders: &[RateGateOffender]) -> String {
    offenders
        .iter()
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 排程门禁错误 =====
    #[error("台时产量门禁失败 ({}项): {}", offenders.len(), format_offenders(offenders))]
    RateGate { offenders: Vec<RateGateOffender> },

    #[error("日历枯竭: 工序 {step_id} 在机台 {machine_id} 上扫描 {scanned_days} 天未找到工作时间")]
    CalendarExhausted {
        step_id: String,
        machine_id: String,
        scanned_days: u32,
    },

    // ===== 对账校验错误 =====
    #[error("对账校验失败: {0}")]
    ReconciliationValidation(String),

    #[error("级联分布仍违反顺流单调性: 工序 {earlier_step_id}({earlier_qty}) < 工序 {later_step_id}({later_qty})")]
    CascadeStillIllogical {
        earlier_step_id: String,
        earlier_qty: f64,
        later_step_id: String,
        later_qty: f64,
    },

    #[error("工单已锁定, 拒绝对账动作: {order_id}")]
    OrderLocked { order_id: String },

    // ===== 编排层错误 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("内部锁获取失败: {0}")]
    LockError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_gate_error_lists_every_offender() {
        let err = EngineError::RateGate {
            offenders: vec![
                RateGateOffender {
                    order_id: "OT001".to_string(),
                    step_id: "S1".to_string(),
                    machine_id: "M01".to_string(),
                    rate: 0.0,
                },
                RateGateOffender {
                    order_id: "OT002".to_string(),
                    step_id: "S9".to_string(),
                    machine_id: "M02".to_string(),
                    rate: -3.0,
                },
            ],
        };

        let msg = err.to_string();
        assert!(msg.contains("2项"));
        assert!(msg.contains("S1"));
        assert!(msg.contains("S9"));
    }

    #[test]
    fn test_calendar_exhausted_names_step_and_machine() {
        let err = EngineError::CalendarExhausted {
            step_id: "S1".to_string(),
            machine_id: "M01".to_string(),
            scanned_days: 366,
        };
        let msg = err.to_string();
        assert!(msg.contains("S1"));
        assert!(msg.contains("M01"));
    }
}
