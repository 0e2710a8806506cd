// ==========================================
// 生产排程与进度对账系统 - 引擎层
// ==========================================
// 三个无状态引擎 + 一个有状态编排存储:
//   ScheduleBuilder     排程生成 (队列 → 时间片)
//   ConsistencyChecker  一致性检查 (I1/I2/I3)
//   ReconciliationEngine 对账修正 (四种动作)
//   ScheduleStore       编排层 (装载/上报/对账/重算)
// ==========================================

pub mod calendar;
pub mod consistency;
pub mod duration;
pub mod error;
pub mod orchestrator;
pub mod reconciliation;
pub mod schedule_builder;

pub use calendar::{ShiftWindow, WorkCalendar};
pub use consistency::ConsistencyChecker;
pub use duration::DurationModel;
pub use error::{EngineError, EngineResult, RateGateOffender};
pub use orchestrator::ScheduleStore;
pub use reconciliation::ReconciliationEngine;
pub use schedule_builder::{BuildOutcome, ScheduleBuilder};
