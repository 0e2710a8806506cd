// ==========================================
// 生产排程与进度对账系统 - 一致性检查引擎
// ==========================================
// 职责: 检查工单三类不变式并产出不一致记录
// I1: 工单上报进度 == 末道工序完成量 (末道工序权威)
// I2: 前道完成量 >= 后道完成量 (顺流单调性)
// I3: 完工状态 ⇒ 完成量 >= 总量 (允许超产, 不允许欠产完工)
// ==========================================
// 红线: 检查结论是数据不是错误, 常规不一致不得抛错
// 红线: 记录每次全量新建, 只被取代不被修改
// ==========================================

use crate::config::EngineConfig;
use crate::domain::inconsistency::InconsistencyRecord;
use crate::domain::order::Order;
use crate::domain::types::{ConsistencyStatus, InconsistencyKind, StepState};
use tracing::{debug, warn};

// ==========================================
// ConsistencyChecker - 一致性检查引擎
// ==========================================
pub struct ConsistencyChecker {
    // 无状态引擎, 所有容差通过配置传入
}

impl ConsistencyChecker {
    /// 构造函数
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 检查单个工单
    ///
    /// 输出顺序无语义, 调用方按集合处理。
    /// 空记录 ⇒ 工单一致, 可参与排程; 任一记录 ⇒ 工单全部工序退出机台队列。
    ///
    /// # 参数
    /// - `order`: 工单 (含工艺路线)
    /// - `config`: 引擎配置 (epsilon 容差)
    ///
    /// # 返回
    /// 不一致记录列表
    pub fn check(&self, order: &Order, config: &EngineConfig) -> Vec<InconsistencyRecord> {
        let mut records = Vec::new();
        let epsilon = config.epsilon;

        debug!(
            order_id = %order.order_id,
            steps = order.route.len(),
            reported_progress = order.reported_progress,
            "开始一致性检查"
        );

        // 1. I1: 末道工序权威
        //    UPDATE_ORDER_PROGRESS 覆写期间以上报值为准, 跳过 I1
        if !order.progress_overridden {
            if let Some(last) = order.last_step() {
                let diff = (order.reported_progress - last.completed_quantity).abs();
                if diff > epsilon {
                    warn!(
                        order_id = %order.order_id,
                        last_step_id = %last.step_id,
                        reported = order.reported_progress,
                        expected = last.completed_quantity,
                        "I1 违例: 工单上报进度与末道工序完成量不符"
                    );
                    records.push(InconsistencyRecord {
                        order_id: order.order_id.clone(),
                        kind: InconsistencyKind::LastStepImbalance,
                        step_id: Some(last.step_id.clone()),
                        reported_value: order.reported_progress,
                        expected_value: last.completed_quantity,
                        description: format!(
                            "工单 {} 上报进度 {} 与末道工序 {} 完成量 {} 不符",
                            order.code, order.reported_progress, last.step_id,
                            last.completed_quantity
                        ),
                    });
                }
            }
        }

        // 2. I2: 顺流单调性, 检查全部 (前, 后) 工序对, 后道工序记为违例方
        let sorted = order.sorted_route();
        for i in 0..sorted.len() {
            for j in (i + 1)..sorted.len() {
                let earlier = sorted[i];
                let later = sorted[j];
                if later.completed_quantity - earlier.completed_quantity > epsilon {
                    warn!(
                        order_id = %order.order_id,
                        earlier_step_id = %earlier.step_id,
                        later_step_id = %later.step_id,
                        earlier_qty = earlier.completed_quantity,
                        later_qty = later.completed_quantity,
                        "I2 违例: 后道工序完成量超过前道"
                    );
                    records.push(InconsistencyRecord {
                        order_id: order.order_id.clone(),
                        kind: InconsistencyKind::IllogicalFlow,
                        step_id: Some(later.step_id.clone()),
                        reported_value: later.completed_quantity,
                        expected_value: earlier.completed_quantity,
                        description: format!(
                            "工序 {} (seq {}) 完成量 {} 超过前道工序 {} (seq {}) 的 {}",
                            later.step_id, later.sequence, later.completed_quantity,
                            earlier.step_id, earlier.sequence, earlier.completed_quantity
                        ),
                    });
                }
            }
        }

        // 3. I3: 完工状态与数量匹配
        for step in &order.route {
            if step.state == StepState::Completed
                && step.total_quantity - step.completed_quantity > epsilon
            {
                warn!(
                    order_id = %order.order_id,
                    step_id = %step.step_id,
                    completed = step.completed_quantity,
                    total = step.total_quantity,
                    "I3 违例: 工序已完工但完成量不足总量"
                );
                records.push(InconsistencyRecord {
                    order_id: order.order_id.clone(),
                    kind: InconsistencyKind::WrongState,
                    step_id: Some(step.step_id.clone()),
                    reported_value: step.completed_quantity,
                    expected_value: step.total_quantity,
                    description: format!(
                        "工序 {} 状态为 COMPLETED 但完成量 {} < 总量 {}",
                        step.step_id, step.completed_quantity, step.total_quantity
                    ),
                });
            }
        }

        debug!(
            order_id = %order.order_id,
            findings = records.len(),
            "一致性检查完成"
        );

        records
    }

    /// 批量检查
    ///
    /// # 返回
    /// (工单ID, 不一致记录列表), 仅包含存在记录的工单
    pub fn check_batch(
        &self,
        orders: &[Order],
        config: &EngineConfig,
    ) -> Vec<(String, Vec<InconsistencyRecord>)> {
        orders
            .iter()
            .filter_map(|order| {
                let records = self.check(order, config);
                if records.is_empty() {
                    None
                } else {
                    Some((order.order_id.clone(), records))
                }
            })
            .collect()
    }

    /// 判断工单是否一致 (可参与排程)
    pub fn is_consistent(&self, order: &Order, config: &EngineConfig) -> bool {
        self.check(order, config).is_empty()
    }

    /// 工单一致性状态 (CONSISTENT ⇄ INCONSISTENT, 无终态)
    pub fn status_of(&self, order: &Order, config: &EngineConfig) -> ConsistencyStatus {
        if self.is_consistent(order, config) {
            ConsistencyStatus::Consistent
        } else {
            ConsistencyStatus::Inconsistent
        }
    }
}

impl Default for ConsistencyChecker {
    fn default() -> Self {
        Self::new()
    }
}

// ==========================================
// 测试模块
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::RouteStep;

    // ==========================================
    // 测试辅助函数
    // ==========================================

    /// 创建测试用工序
    fn create_test_step(step_id: &str, sequence: i32, completed: f64) -> RouteStep {
        RouteStep {
            step_id: step_id.to_string(),
            sequence,
            process_code: "PROC".to_string(),
            process_desc: "测试工艺".to_string(),
            machine_id: Some("M01".to_string()),
            rate: 10.0,
            total_quantity: 100.0,
            completed_quantity: completed,
            state: StepState::InProgress,
            real_start: None,
            real_end: None,
        }
    }

    /// 创建测试用工单
    fn create_test_order(reported_progress: f64, route: Vec<RouteStep>) -> Order {
        Order {
            order_id: "OT001".to_string(),
            code: "OT-001".to_string(),
            total_quantity: 100.0,
            reported_progress,
            route,
            priority_rank: 0,
            progress_overridden: false,
            locked: false,
        }
    }

    #[test]
    fn test_consistent_order_yields_empty_list() {
        let checker = ConsistencyChecker::new();
        let order = create_test_order(
            60.0,
            vec![
                create_test_step("S1", 10, 80.0),
                create_test_step("S2", 20, 60.0),
            ],
        );

        assert!(checker.check(&order, &EngineConfig::default()).is_empty());
        assert!(checker.is_consistent(&order, &EngineConfig::default()));
    }

    #[test]
    fn test_last_step_imbalance_reports_both_values() {
        // 末道完成 120, 上报 100 → 恰好一条 I1
        let checker = ConsistencyChecker::new();
        let order = create_test_order(
            100.0,
            vec![
                create_test_step("S1", 10, 120.0),
                create_test_step("S2", 20, 120.0),
            ],
        );

        let records = checker.check(&order, &EngineConfig::default());
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.kind, InconsistencyKind::LastStepImbalance);
        assert_eq!(rec.step_id.as_deref(), Some("S2"));
        assert_eq!(rec.reported_value, 100.0);
        assert_eq!(rec.expected_value, 120.0);
    }

    #[test]
    fn test_imbalance_within_epsilon_ignored() {
        let checker = ConsistencyChecker::new();
        let config = EngineConfig {
            epsilon: 0.5,
            ..EngineConfig::default()
        };
        let order = create_test_order(99.8, vec![create_test_step("S1", 10, 100.0)]);

        assert!(checker.check(&order, &config).is_empty());
    }

    #[test]
    fn test_illogical_flow_names_later_step() {
        // [50, 80, 60]: S2 超过 S1 → 一条 I2, 违例方为 S2
        let checker = ConsistencyChecker::new();
        let order = create_test_order(
            60.0,
            vec![
                create_test_step("S1", 10, 50.0),
                create_test_step("S2", 20, 80.0),
                create_test_step("S3", 30, 60.0),
            ],
        );

        let records = checker.check(&order, &EngineConfig::default());
        let flows: Vec<&InconsistencyRecord> = records
            .iter()
            .filter(|r| r.kind == InconsistencyKind::IllogicalFlow)
            .collect();
        // S2>S1 与 S3>S1 两对均违例, 违例方都是后道
        assert_eq!(flows.len(), 2);
        assert!(flows.iter().all(|r| {
            let id = r.step_id.as_deref().unwrap();
            id == "S2" || id == "S3"
        }));
    }

    #[test]
    fn test_wrong_state_on_underproduced_completed_step() {
        let checker = ConsistencyChecker::new();
        let mut step = create_test_step("S1", 10, 90.0);
        step.state = StepState::Completed;
        let order = create_test_order(90.0, vec![step]);

        let records = checker.check(&order, &EngineConfig::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, InconsistencyKind::WrongState);
        assert_eq!(records[0].expected_value, 100.0);
    }

    #[test]
    fn test_overproduced_completed_step_is_fine() {
        // I3 允许超产完工
        let checker = ConsistencyChecker::new();
        let mut step = create_test_step("S1", 10, 110.0);
        step.state = StepState::Completed;
        let order = create_test_order(110.0, vec![step]);

        assert!(checker.check(&order, &EngineConfig::default()).is_empty());
    }

    #[test]
    fn test_progress_override_suppresses_i1_only() {
        let checker = ConsistencyChecker::new();
        let mut order = create_test_order(999.0, vec![create_test_step("S1", 10, 50.0)]);
        order.progress_overridden = true;

        // 覆写期间 I1 以上报值为准
        assert!(checker.check(&order, &EngineConfig::default()).is_empty());

        // I2 不受覆写影响
        order.route.push(create_test_step("S2", 20, 70.0));
        let records = checker.check(&order, &EngineConfig::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, InconsistencyKind::IllogicalFlow);
    }

    #[test]
    fn test_status_follows_findings() {
        let checker = ConsistencyChecker::new();
        let mut order = create_test_order(50.0, vec![create_test_step("S1", 10, 50.0)]);
        assert_eq!(
            checker.status_of(&order, &EngineConfig::default()),
            ConsistencyStatus::Consistent
        );

        order.reported_progress = 10.0;
        assert_eq!(
            checker.status_of(&order, &EngineConfig::default()),
            ConsistencyStatus::Inconsistent
        );
    }

    #[test]
    fn test_check_batch_only_returns_inconsistent_orders() {
        let checker = ConsistencyChecker::new();
        let good = create_test_order(50.0, vec![create_test_step("S1", 10, 50.0)]);
        let mut bad = create_test_order(10.0, vec![create_test_step("S1", 10, 50.0)]);
        bad.order_id = "OT002".to_string();

        let result = checker.check_batch(&[good, bad], &EngineConfig::default());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0, "OT002");
    }
}
