// ==========================================
// 生产排程与进度对账系统 - 排程生成引擎
// ==========================================
// 职责: 按优先级队列把工序剩余量落位为机台时间片
// 输入: 机台队列 (工单优先级, 工序) + 工作日历
// 输出: Interval 集合 + 统计
// ==========================================
// 红线: 台时产量门禁是全程序级的, 不产出半套排程
// 红线: 输入不变则输出逐字节一致 (确定性)
// ==========================================

mod core;


pub use core::{BuildOutcome, ScheduleBuilder};
