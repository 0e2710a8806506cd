// ==========================================
// 车间生产排程与进度对账系统 - 核心库
// ==========================================
// 系统定位: 决策支持系统 (人工最终控制权)
// 两大引擎: 排程生成 (队列 → 机台时间片)
//           进度对账 (不一致检测 + 四种修正策略)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ConsistencyStatus, InconsistencyKind, StepState};

// 领域实体
pub use domain::{
    BuildStats, InconsistencyRecord, Interval, Order, Program, QueueEntry, ReconciliationAction,
    RouteStep, ScheduleSnapshot, StepQuantity,
};

// 引擎
pub use engine::{
    BuildOutcome, ConsistencyChecker, DurationModel, EngineError, EngineResult,
    ReconciliationEngine, ScheduleBuilder, ScheduleStore, ShiftWindow, WorkCalendar,
};

// 配置
pub use config::EngineConfig;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "车间生产排程与进度对账系统";
