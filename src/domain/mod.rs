// ==========================================
// 生产排程与进度对账系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑, 不含引擎逻辑
// ==========================================

pub mod inconsistency;
pub mod order;
pub mod schedule;
pub mod types;

// 重导出核心类型
pub use inconsistency::{InconsistencyRecord, ReconciliationAction, StepQuantity};
pub use order::{Order, Program, RouteStep};
pub use schedule::{BuildStats, Interval, QueueEntry, ScheduleSnapshot};
pub use types::{ConsistencyStatus, InconsistencyKind, StepState};
