// ==========================================
// 生产排程与进度对账系统 - 对账修正引擎
// ==========================================
// 职责: 应用四种修正策略, 把工单拉回一致状态
// 输入: 工单快照 + 对账动作 (封闭和类型)
// 输出: 新工单快照; 失败时原数据原样保留 (无半提交)
// ==========================================
// 红线: 每次 apply 恰好一个动作, 要么全部生效要么整体失败
// 红线: 引擎假定单写者语义, 工单级互斥由调用方保证
// ==========================================

use crate::config::EngineConfig;
use crate::domain::inconsistency::{ReconciliationAction, StepQuantity};
use crate::domain::order::Order;
use crate::engine::error::{EngineError, EngineResult};
use tracing::{debug, info, warn};

// ==========================================
// ReconciliationEngine - 对账修正引擎
// ==========================================
pub struct ReconciliationEngine {
    // 无状态引擎, 所有容差通过配置传入
}

impl ReconciliationEngine {
    /// 构造函数
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 应用对账动作
    ///
    /// 快照进/快照出: 输入工单不被修改; 成功返回新工单, 失败返回错误,
    /// 调用方保留原数据即满足"无半提交"。
    ///
    /// # 参数
    /// - `action`: 对账动作
    /// - `order`: 工单快照
    /// - `config`: 引擎配置 (超产上限)
    ///
    /// # 返回
    /// - `Ok(Order)`: 修正后的工单
    /// - `Err(EngineError)`: 校验失败, 原数据未动
    pub fn apply(
        &self,
        action: &ReconciliationAction,
        order: &Order,
        config: &EngineConfig,
    ) -> EngineResult<Order> {
        info!(
            order_id = %order.order_id,
            action = action.kind_str(),
            "开始应用对账动作"
        );

        // 锁定工单拒绝一切对账动作
        if order.locked {
            warn!(order_id = %order.order_id, "工单已锁定, 拒绝对账");
            return Err(EngineError::OrderLocked {
                order_id: order.order_id.clone(),
            });
        }

        match action {
            ReconciliationAction::Manual {
                entries,
                allow_overproduction,
            } => self.apply_manual(order, entries, *allow_overproduction, config),
            ReconciliationAction::CascadeBackward {
                trigger_step_id,
                targets,
            } => self.apply_cascade_backward(order, trigger_step_id, targets, config),
            ReconciliationAction::UpdateOrderProgress { new_progress } => {
                self.apply_update_order_progress(order, *new_progress)
            }
            ReconciliationAction::Reset { also_reset_order } => {
                Ok(self.apply_reset(order, *also_reset_order))
            }
        }
    }

    // ==========================================
    // MANUAL - 人工逐工序改写
    // ==========================================

    /// 逐工序改写完成量, 随后按 I1 重算工单上报进度
    fn apply_manual(
        &self,
        order: &Order,
        entries: &[StepQuantity],
        allow_overproduction: bool,
        config: &EngineConfig,
    ) -> EngineResult<Order> {
        if entries.is_empty() {
            return Err(EngineError::ReconciliationValidation(
                "MANUAL 动作载荷为空".to_string(),
            ));
        }

        // 先全量校验再写入, 保证原子性
        for entry in entries {
            let step = order.step_by_id(&entry.step_id).ok_or_else(|| {
                EngineError::ReconciliationValidation(format!(
                    "工序不存在: {}",
                    entry.step_id
                ))
            })?;

            let qty = entry.new_completed_quantity;
            if !qty.is_finite() || qty < 0.0 {
                return Err(EngineError::ReconciliationValidation(format!(
                    "工序 {} 目标完成量无效: {}",
                    entry.step_id, qty
                )));
            }

            let ceiling = step.total_quantity * (1.0 + config.overproduction_ceiling_pct);
            if !allow_overproduction && qty > ceiling {
                return Err(EngineError::ReconciliationValidation(format!(
                    "工序 {} 目标完成量 {} 超过超产上限 {:.3} (total {} × (1 + {})), 需显式放行",
                    entry.step_id, qty, ceiling, step.total_quantity,
                    config.overproduction_ceiling_pct
                )));
            }
        }

        let mut updated = order.clone();
        for entry in entries {
            // 存在性已校验, 此处必命中
            if let Some(step) = updated.step_by_id_mut(&entry.step_id) {
                debug!(
                    step_id = %entry.step_id,
                    old = step.completed_quantity,
                    new = entry.new_completed_quantity,
                    "MANUAL 改写工序完成量"
                );
                step.completed_quantity = entry.new_completed_quantity;
            }
        }

        // I1 重算: 上报进度回归末道工序口径, 解除显式覆写
        if let Some(last) = updated.last_step() {
            updated.reported_progress = last.completed_quantity;
        }
        updated.progress_overridden = false;

        Ok(updated)
    }

    // ==========================================
    // CASCADE_BACKWARD - 向前级联
    // ==========================================

    /// 应用调用方给出的目标分布, 整体生效后复检 I2
    fn apply_cascade_backward(
        &self,
        order: &Order,
        trigger_step_id: &str,
        targets: &[StepQuantity],
        config: &EngineConfig,
    ) -> EngineResult<Order> {
        let trigger = order.step_by_id(trigger_step_id).ok_or_else(|| {
            EngineError::ReconciliationValidation(format!(
                "触发工序不存在: {}",
                trigger_step_id
            ))
        })?;
        let trigger_sequence = trigger.sequence;

        // 分布必须覆盖 sequence <= 触发工序 的全部工序
        for step in &order.route {
            if step.sequence <= trigger_sequence
                && !targets.iter().any(|t| t.step_id == step.step_id)
            {
                return Err(EngineError::ReconciliationValidation(format!(
                    "级联分布缺少工序 {} (seq {} <= 触发工序 seq {})",
                    step.step_id, step.sequence, trigger_sequence
                )));
            }
        }

        // 目标只允许指向触发工序及其之前的工序
        for target in targets {
            let step = order.step_by_id(&target.step_id).ok_or_else(|| {
                EngineError::ReconciliationValidation(format!(
                    "工序不存在: {}",
                    target.step_id
                ))
            })?;
            if step.sequence > trigger_sequence {
                return Err(EngineError::ReconciliationValidation(format!(
                    "级联分布包含触发工序之后的工序 {} (seq {} > {})",
                    target.step_id, step.sequence, trigger_sequence
                )));
            }
            let qty = target.new_completed_quantity;
            if !qty.is_finite() || qty < 0.0 {
                return Err(EngineError::ReconciliationValidation(format!(
                    "工序 {} 目标完成量无效: {}",
                    target.step_id, qty
                )));
            }
        }

        // 原子写入副本, 复检通过才算成功
        let mut updated = order.clone();
        for target in targets {
            if let Some(step) = updated.step_by_id_mut(&target.step_id) {
                step.completed_quantity = target.new_completed_quantity;
            }
        }

        // I2 全路线复检: 仍违例则整体失败, 调用方须给出修正后的分布
        let sorted = updated.sorted_route();
        for i in 0..sorted.len() {
            for j in (i + 1)..sorted.len() {
                let earlier = sorted[i];
                let later = sorted[j];
                if later.completed_quantity - earlier.completed_quantity > config.epsilon {
                    warn!(
                        order_id = %order.order_id,
                        earlier_step_id = %earlier.step_id,
                        later_step_id = %later.step_id,
                        "级联分布复检仍违反 I2, 整体回绝"
                    );
                    return Err(EngineError::CascadeStillIllogical {
                        earlier_step_id: earlier.step_id.clone(),
                        earlier_qty: earlier.completed_quantity,
                        later_step_id: later.step_id.clone(),
                        later_qty: later.completed_quantity,
                    });
                }
            }
        }

        // 级联触及末道工序时, 上报进度回归 I1 口径并解除覆写
        let last_touched = updated
            .last_step()
            .map(|last| targets.iter().any(|t| t.step_id == last.step_id))
            .unwrap_or(false);
        if last_touched {
            if let Some(last) = updated.last_step() {
                updated.reported_progress = last.completed_quantity;
            }
            updated.progress_overridden = false;
        }

        Ok(updated)
    }

    // ==========================================
    // UPDATE_ORDER_PROGRESS - 覆写工单进度
    // ==========================================

    /// 直接覆写上报进度, 不触碰工序; 覆写值成为权威口径
    fn apply_update_order_progress(&self, order: &Order, new_progress: f64) -> EngineResult<Order> {
        if !new_progress.is_finite() || new_progress < 0.0 {
            return Err(EngineError::ReconciliationValidation(format!(
                "工单进度覆写值无效: {}",
                new_progress
            )));
        }

        let mut updated = order.clone();
        updated.reported_progress = new_progress;
        // 检查器此后信任覆写值, 直到 MANUAL/CASCADE 再次触及末道工序
        updated.progress_overridden = true;
        Ok(updated)
    }

    // ==========================================
    // RESET - 回滚清零
    // ==========================================

    /// 所有工序完成量清零; 幂等, 对一致工单同样允许 (主动回滚)
    fn apply_reset(&self, order: &Order, also_reset_order: bool) -> Order {
        let mut updated = order.clone();
        for step in &mut updated.route {
            step.completed_quantity = 0.0;
        }
        if also_reset_order {
            updated.reported_progress = 0.0;
            updated.progress_overridden = false;
        }

        debug!(
            order_id = %order.order_id,
            also_reset_order = also_reset_order,
            "RESET 完成"
        );
        updated
    }
}

impl Default for ReconciliationEngine {
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
    use crate::domain::types::StepState;

    // ==========================================
    // 测试辅助函数
    // ==========================================

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

    // ==========================================
    // MANUAL
    // ==========================================

    #[test]
    fn test_manual_overwrites_and_recomputes_reported_progress() {
        let engine = ReconciliationEngine::new();
        let order = create_test_order(
            30.0,
            vec![
                create_test_step("S1", 10, 50.0),
                create_test_step("S2", 20, 30.0),
            ],
        );

        let action = ReconciliationAction::Manual {
            entries: vec![StepQuantity::new("S2", 45.0)],
            allow_overproduction: false,
        };
        let updated = engine.apply(&action, &order, &EngineConfig::default()).unwrap();

        assert_eq!(updated.step_by_id("S2").unwrap().completed_quantity, 45.0);
        assert_eq!(updated.reported_progress, 45.0); // I1 重算
        // 原快照未动
        assert_eq!(order.step_by_id("S2").unwrap().completed_quantity, 30.0);
    }

    #[test]
    fn test_manual_rejects_negative_quantity() {
        let engine = ReconciliationEngine::new();
        let order = create_test_order(0.0, vec![create_test_step("S1", 10, 0.0)]);

        let action = ReconciliationAction::Manual {
            entries: vec![StepQuantity::new("S1", -1.0)],
            allow_overproduction: false,
        };
        assert!(engine.apply(&action, &order, &EngineConfig::default()).is_err());
    }

    #[test]
    fn test_manual_overproduction_ceiling() {
        let engine = ReconciliationEngine::new();
        let config = EngineConfig::default(); // 上限 10%
        let order = create_test_order(0.0, vec![create_test_step("S1", 10, 0.0)]);

        // 115 > 100 × 1.10 → 拒绝
        let action = ReconciliationAction::Manual {
            entries: vec![StepQuantity::new("S1", 115.0)],
            allow_overproduction: false,
        };
        assert!(engine.apply(&action, &order, &config).is_err());

        // 显式放行则接受
        let action = ReconciliationAction::Manual {
            entries: vec![StepQuantity::new("S1", 115.0)],
            allow_overproduction: true,
        };
        let updated = engine.apply(&action, &order, &config).unwrap();
        assert_eq!(updated.step_by_id("S1").unwrap().completed_quantity, 115.0);
    }

    #[test]
    fn test_manual_unknown_step_rejected_atomically() {
        let engine = ReconciliationEngine::new();
        let order = create_test_order(0.0, vec![create_test_step("S1", 10, 0.0)]);

        let action = ReconciliationAction::Manual {
            entries: vec![
                StepQuantity::new("S1", 10.0),
                StepQuantity::new("NO_SUCH", 10.0),
            ],
            allow_overproduction: false,
        };
        assert!(engine.apply(&action, &order, &EngineConfig::default()).is_err());
        // S1 合法项也不得落盘 (整体失败)
        assert_eq!(order.step_by_id("S1").unwrap().completed_quantity, 0.0);
    }

    #[test]
    fn test_manual_clears_progress_override() {
        let engine = ReconciliationEngine::new();
        let mut order = create_test_order(77.0, vec![create_test_step("S1", 10, 50.0)]);
        order.progress_overridden = true;

        let action = ReconciliationAction::Manual {
            entries: vec![StepQuantity::new("S1", 60.0)],
            allow_overproduction: false,
        };
        let updated = engine.apply(&action, &order, &EngineConfig::default()).unwrap();
        assert!(!updated.progress_overridden);
        assert_eq!(updated.reported_progress, 60.0);
    }

    // ==========================================
    // CASCADE_BACKWARD
    // ==========================================

    #[test]
    fn test_cascade_resolves_illogical_flow() {
        // [50, 80, 60]: S2 超前道 → 把 S1 提到 80 即可消解
        let engine = ReconciliationEngine::new();
        let order = create_test_order(
            60.0,
            vec![
                create_test_step("S1", 10, 50.0),
                create_test_step("S2", 20, 80.0),
                create_test_step("S3", 30, 60.0),
            ],
        );

        let action = ReconciliationAction::CascadeBackward {
            trigger_step_id: "S2".to_string(),
            targets: vec![
                StepQuantity::new("S1", 80.0),
                StepQuantity::new("S2", 80.0),
            ],
        };
        let updated = engine.apply(&action, &order, &EngineConfig::default()).unwrap();
        assert_eq!(updated.step_by_id("S1").unwrap().completed_quantity, 80.0);

        // 复检为空
        let checker = crate::engine::consistency::ConsistencyChecker::new();
        assert!(checker.check(&updated, &EngineConfig::default()).is_empty());
    }

    #[test]
    fn test_cascade_missing_coverage_rejected() {
        let engine = ReconciliationEngine::new();
        let order = create_test_order(
            60.0,
            vec![
                create_test_step("S1", 10, 50.0),
                create_test_step("S2", 20, 80.0),
            ],
        );

        // 缺 S1
        let action = ReconciliationAction::CascadeBackward {
            trigger_step_id: "S2".to_string(),
            targets: vec![StepQuantity::new("S2", 80.0)],
        };
        assert!(engine.apply(&action, &order, &EngineConfig::default()).is_err());
    }

    #[test]
    fn test_cascade_still_illogical_fails_whole_action() {
        let engine = ReconciliationEngine::new();
        let order = create_test_order(
            60.0,
            vec![
                create_test_step("S1", 10, 50.0),
                create_test_step("S2", 20, 80.0),
            ],
        );

        // 分布应用后 S2(80) 仍超 S1(70) → 整体失败
        let action = ReconciliationAction::CascadeBackward {
            trigger_step_id: "S2".to_string(),
            targets: vec![
                StepQuantity::new("S1", 70.0),
                StepQuantity::new("S2", 80.0),
            ],
        };
        let err = engine.apply(&action, &order, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::CascadeStillIllogical { .. }));
        // 原数据未动
        assert_eq!(order.step_by_id("S1").unwrap().completed_quantity, 50.0);
    }

    #[test]
    fn test_cascade_beyond_trigger_rejected() {
        let engine = ReconciliationEngine::new();
        let order = create_test_order(
            0.0,
            vec![
                create_test_step("S1", 10, 50.0),
                create_test_step("S2", 20, 40.0),
                create_test_step("S3", 30, 0.0),
            ],
        );

        let action = ReconciliationAction::CascadeBackward {
            trigger_step_id: "S2".to_string(),
            targets: vec![
                StepQuantity::new("S1", 50.0),
                StepQuantity::new("S2", 40.0),
                StepQuantity::new("S3", 40.0), // seq > 触发工序
            ],
        };
        assert!(engine.apply(&action, &order, &EngineConfig::default()).is_err());
    }

    #[test]
    fn test_cascade_touching_last_step_recomputes_progress() {
        let engine = ReconciliationEngine::new();
        let mut order = create_test_order(
            10.0,
            vec![
                create_test_step("S1", 10, 50.0),
                create_test_step("S2", 20, 80.0),
            ],
        );
        order.progress_overridden = true;

        let action = ReconciliationAction::CascadeBackward {
            trigger_step_id: "S2".to_string(),
            targets: vec![
                StepQuantity::new("S1", 80.0),
                StepQuantity::new("S2", 80.0),
            ],
        };
        let updated = engine.apply(&action, &order, &EngineConfig::default()).unwrap();
        assert_eq!(updated.reported_progress, 80.0);
        assert!(!updated.progress_overridden);
    }

    // ==========================================
    // UPDATE_ORDER_PROGRESS
    // ==========================================

    #[test]
    fn test_update_order_progress_sets_override() {
        let engine = ReconciliationEngine::new();
        let order = create_test_order(100.0, vec![create_test_step("S1", 10, 120.0)]);

        let action = ReconciliationAction::UpdateOrderProgress { new_progress: 120.0 };
        let updated = engine.apply(&action, &order, &EngineConfig::default()).unwrap();

        assert_eq!(updated.reported_progress, 120.0);
        assert!(updated.progress_overridden);
        // 工序未被触碰
        assert_eq!(updated.step_by_id("S1").unwrap().completed_quantity, 120.0);
    }

    #[test]
    fn test_update_order_progress_rejects_negative() {
        let engine = ReconciliationEngine::new();
        let order = create_test_order(0.0, vec![create_test_step("S1", 10, 0.0)]);

        let action = ReconciliationAction::UpdateOrderProgress { new_progress: -5.0 };
        assert!(engine.apply(&action, &order, &EngineConfig::default()).is_err());
    }

    // ==========================================
    // RESET
    // ==========================================

    #[test]
    fn test_reset_zeroes_everything_and_is_idempotent() {
        let engine = ReconciliationEngine::new();
        let order = create_test_order(
            60.0,
            vec![
                create_test_step("S1", 10, 80.0),
                create_test_step("S2", 20, 60.0),
            ],
        );

        let action = ReconciliationAction::Reset {
            also_reset_order: true,
        };
        let once = engine.apply(&action, &order, &EngineConfig::default()).unwrap();
        assert!(once.route.iter().all(|s| s.completed_quantity == 0.0));
        assert_eq!(once.reported_progress, 0.0);

        // 连续两次结果一致
        let twice = engine.apply(&action, &once, &EngineConfig::default()).unwrap();
        assert!(twice.route.iter().all(|s| s.completed_quantity == 0.0));
        assert_eq!(twice.reported_progress, 0.0);
    }

    #[test]
    fn test_reset_without_order_flag_keeps_reported_progress() {
        let engine = ReconciliationEngine::new();
        let order = create_test_order(60.0, vec![create_test_step("S1", 10, 60.0)]);

        let action = ReconciliationAction::Reset {
            also_reset_order: false,
        };
        let updated = engine.apply(&action, &order, &EngineConfig::default()).unwrap();
        assert_eq!(updated.step_by_id("S1").unwrap().completed_quantity, 0.0);
        assert_eq!(updated.reported_progress, 60.0); // 保留, 可能再次进入不一致
    }

    #[test]
    fn test_reset_allowed_on_consistent_order() {
        let engine = ReconciliationEngine::new();
        let order = create_test_order(50.0, vec![create_test_step("S1", 10, 50.0)]);
        let checker = crate::engine::consistency::ConsistencyChecker::new();
        assert!(checker.check(&order, &EngineConfig::default()).is_empty());

        // 一致工单上 RESET 仍然允许 (主动回滚)
        let action = ReconciliationAction::Reset {
            also_reset_order: true,
        };
        assert!(engine.apply(&action, &order, &EngineConfig::default()).is_ok());
    }

    // ==========================================
    // 锁定工单
    // ==========================================

    #[test]
    fn test_locked_order_rejects_all_actions() {
        let engine = ReconciliationEngine::new();
        let mut order = create_test_order(0.0, vec![create_test_step("S1", 10, 0.0)]);
        order.locked = true;

        let actions = vec![
            ReconciliationAction::Manual {
                entries: vec![StepQuantity::new("S1", 10.0)],
                allow_overproduction: false,
            },
            ReconciliationAction::UpdateOrderProgress { new_progress: 10.0 },
            ReconciliationAction::Reset {
                also_reset_order: true,
            },
        ];

        for action in actions {
            let err = engine.apply(&action, &order, &EngineConfig::default()).unwrap_err();
            assert!(matches!(err, EngineError::OrderLocked { .. }));
        }
    }
}
