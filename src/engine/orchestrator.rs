// ==========================================
// 生产排程与进度对账系统 - 编排层 (ScheduleStore)
// ==========================================
// 职责: 系统内唯一有状态组件
//   - 持有程序/工单/日历/配置与最近一次已提交排程快照
//   - 进度上报写入 + 一致性复检
//   - 工单级对账串行化 (对账动作经 ReconciliationEngine 应用)
//   - 两阶段重算: 锁内取输入快照, 锁外纯计算, 锁内按代次提交
// ==========================================
// 红线: 代次不匹配的计算结果整体丢弃, 陈旧排程不得进入可见集合
// 红线: 队列构建过滤不一致工单的全部工序 (工单级隔离)
// ==========================================

use crate::config::EngineConfig;
use crate::domain::inconsistency::{InconsistencyRecord, ReconciliationAction};
use crate::domain::order::{Order, Program};
use crate::domain::schedule::{QueueEntry, ScheduleSnapshot};
use crate::domain::types::ConsistencyStatus;
use crate::engine::calendar::WorkCalendar;
use crate::engine::consistency::ConsistencyChecker;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::reconciliation::ReconciliationEngine;
use crate::engine::schedule_builder::ScheduleBuilder;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ==========================================
// 内部可变状态 (Mutex 保护)
// ==========================================
struct StoreState {
    program: Option<Program>,
    orders: HashMap<String, Order>,
    generation: u64,                    // 输入代次, 每次输入变更递增
    snapshot: Option<ScheduleSnapshot>, // 最近一次已提交排程
}

// ==========================================
// ScheduleStore - 排程编排存储
// ==========================================
pub struct ScheduleStore {
    state: Mutex<StoreState>,
    calendar: WorkCalendar,
    config: EngineConfig,
    builder: ScheduleBuilder,
    checker: ConsistencyChecker,
    reconciler: ReconciliationEngine,
}

impl ScheduleStore {
    /// 构造函数
    pub fn new(calendar: WorkCalendar, config: EngineConfig) -> Self {
        Self {
            state: Mutex::new(StoreState {
                program: None,
                orders: HashMap::new(),
                generation: 0,
                snapshot: None,
            }),
            calendar,
            config,
            builder: ScheduleBuilder::new(),
            checker: ConsistencyChecker::new(),
            reconciler: ReconciliationEngine::new(),
        }
    }

    // ==========================================
    // 输入装载
    // ==========================================

    /// 装载排产程序与工单
    ///
    /// 工单优先级序号由程序内引用顺序决定, 覆盖工单自带值。
    /// 程序引用了未提供的工单则整体拒绝。
    pub fn load_program(&self, program: Program, orders: Vec<Order>) -> EngineResult<()> {
        let mut state = self.lock_state()?;

        let mut order_map: HashMap<String, Order> =
            orders.into_iter().map(|o| (o.order_id.clone(), o)).collect();

        for (rank, order_id) in program.order_ids.iter().enumerate() {
            let order = order_map.get_mut(order_id).ok_or_else(|| EngineError::NotFound {
                entity: "Order".to_string(),
                id: order_id.clone(),
            })?;
            order.priority_rank = rank as i32;
        }

        info!(
            program_id = %program.program_id,
            orders = order_map.len(),
            "装载排产程序"
        );

        state.program = Some(program);
        state.orders = order_map;
        state.generation += 1;
        Ok(())
    }

    // ==========================================
    // 进度上报
    // ==========================================

    /// 进度上报写入
    ///
    /// 写入工序完成量 (可携带实际开工时刻), 随后对该工单全量复检。
    /// 返回的记录非空即表示工单进入不一致状态, 下次重算退出机台队列。
    pub fn report_progress(
        &self,
        order_id: &str,
        step_id: &str,
        completed_quantity: f64,
        observed_at: Option<NaiveDateTime>,
    ) -> EngineResult<Vec<InconsistencyRecord>> {
        if !completed_quantity.is_finite() || completed_quantity < 0.0 {
            return Err(EngineError::ReconciliationValidation(format!(
                "上报完成量无效: {}",
                completed_quantity
            )));
        }

        let mut state = self.lock_state()?;
        let order = state.orders.get_mut(order_id).ok_or_else(|| EngineError::NotFound {
            entity: "Order".to_string(),
            id: order_id.to_string(),
        })?;
        let step = order.step_by_id_mut(step_id).ok_or_else(|| EngineError::NotFound {
            entity: "RouteStep".to_string(),
            id: step_id.to_string(),
        })?;

        step.completed_quantity = completed_quantity;
        if let Some(at) = observed_at {
            if step.real_start.is_none() {
                step.mark_started(at);
            }
        }

        let records = self.checker.check(order, &self.config);
        if !records.is_empty() {
            warn!(
                order_id = %order_id,
                step_id = %step_id,
                findings = records.len(),
                "进度上报后工单进入不一致状态"
            );
        } else {
            debug!(order_id = %order_id, step_id = %step_id, "进度上报写入, 工单保持一致");
        }

        state.generation += 1;
        Ok(records)
    }

    // ==========================================
    // 一致性检查
    // ==========================================

    /// 检查单个工单
    pub fn check_order(&self, order_id: &str) -> EngineResult<Vec<InconsistencyRecord>> {
        let state = self.lock_state()?;
        let order = state.orders.get(order_id).ok_or_else(|| EngineError::NotFound {
            entity: "Order".to_string(),
            id: order_id.to_string(),
        })?;
        Ok(self.checker.check(order, &self.config))
    }

    /// 工单一致性状态
    pub fn order_status(&self, order_id: &str) -> EngineResult<ConsistencyStatus> {
        let state = self.lock_state()?;
        let order = state.orders.get(order_id).ok_or_else(|| EngineError::NotFound {
            entity: "Order".to_string(),
            id: order_id.to_string(),
        })?;
        Ok(self.checker.status_of(order, &self.config))
    }

    /// 全量检查, 仅返回存在记录的工单
    pub fn check_all(&self) -> EngineResult<Vec<(String, Vec<InconsistencyRecord>)>> {
        let state = self.lock_state()?;
        let mut orders: Vec<&Order> = state.orders.values().collect();
        orders.sort_by(|a, b| a.order_id.cmp(&b.order_id));
        Ok(orders
            .into_iter()
            .filter_map(|order| {
                let records = self.checker.check(order, &self.config);
                if records.is_empty() {
                    None
                } else {
                    Some((order.order_id.clone(), records))
                }
            })
            .collect())
    }

    // ==========================================
    // 对账
    // ==========================================

    /// 对单个工单应用对账动作
    ///
    /// 动作在全局锁内应用 (工单级串行化), 成功即写回并递增代次。
    /// 返回修正后的残余不一致记录 (空 ⇒ 工单回到一致状态)。
    pub fn reconcile(
        &self,
        order_id: &str,
        action: &ReconciliationAction,
    ) -> EngineResult<Vec<InconsistencyRecord>> {
        let residual = {
            let mut state = self.lock_state()?;
            let order = state.orders.get(order_id).ok_or_else(|| EngineError::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            })?;

            let updated = self.reconciler.apply(action, order, &self.config)?;
            let residual = self.checker.check(&updated, &self.config);

            info!(
                order_id = %order_id,
                action = action.kind_str(),
                residual = residual.len(),
                "对账动作应用成功"
            );

            state.orders.insert(order_id.to_string(), updated);
            state.generation += 1;
            residual
        };

        // 完成量分布已变化, 排程重算 (失败只记录, 不影响对账结论)
        if let Err(err) = self.rebuild() {
            warn!(order_id = %order_id, error = %err, "对账后重算失败");
        }

        Ok(residual)
    }

    /// 设置工单锁定标志
    pub fn set_order_locked(&self, order_id: &str, locked: bool) -> EngineResult<()> {
        let mut state = self.lock_state()?;
        let order = state.orders.get_mut(order_id).ok_or_else(|| EngineError::NotFound {
            entity: "Order".to_string(),
            id: order_id.to_string(),
        })?;
        order.locked = locked;
        Ok(())
    }

    // ==========================================
    // 重算
    // ==========================================

    /// 两阶段重算
    ///
    /// 阶段一 (锁内): 取输入快照与当前代次;
    /// 阶段二 (锁外): 纯计算 build;
    /// 阶段三 (锁内): 代次仍为当前值才提交, 否则整体丢弃。
    ///
    /// # 返回
    /// - `Ok(Some(snapshot))`: 已提交
    /// - `Ok(None)`: 计算期间输入已被取代, 结果丢弃
    pub fn rebuild(&self) -> EngineResult<Option<ScheduleSnapshot>> {
        // 阶段一: 输入快照
        let (queues, program_start, captured_generation) = self.capture_inputs()?;

        // 阶段二: 纯计算 (不持锁)
        let outcome = self
            .builder
            .build(&queues, &self.calendar, program_start, &self.config)?;

        // 阶段三: 按代次提交
        self.commit(outcome, captured_generation)
    }

    /// 锁内取输入快照与当前代次
    fn capture_inputs(
        &self,
    ) -> EngineResult<(HashMap<String, Vec<QueueEntry>>, NaiveDateTime, u64)> {
        let state = self.lock_state()?;
        let program = state.program.as_ref().ok_or_else(|| {
            EngineError::InternalError("尚未装载排产程序".to_string())
        })?;
        let program_start = program
            .start_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| EngineError::InternalError("程序起始日期无效".to_string()))?;
        let queues = self.build_queues(&state.orders);
        Ok((queues, program_start, state.generation))
    }

    /// 按代次提交计算结果; 代次不匹配 ⇒ 结果整体丢弃
    fn commit(
        &self,
        outcome: crate::engine::schedule_builder::BuildOutcome,
        captured_generation: u64,
    ) -> EngineResult<Option<ScheduleSnapshot>> {
        let mut state = self.lock_state()?;
        if state.generation != captured_generation {
            info!(
                captured = captured_generation,
                current = state.generation,
                "重算结果已被取代, 丢弃"
            );
            return Ok(None);
        }

        let snapshot = ScheduleSnapshot {
            snapshot_id: Uuid::new_v4().to_string(),
            generation: captured_generation,
            intervals: outcome.intervals,
            stats: outcome.stats,
        };
        info!(
            snapshot_id = %snapshot.snapshot_id,
            generation = snapshot.generation,
            intervals = snapshot.intervals.len(),
            "排程快照已提交"
        );
        state.snapshot = Some(snapshot.clone());
        Ok(Some(snapshot))
    }

    /// 最近一次已提交排程快照
    pub fn snapshot(&self) -> EngineResult<Option<ScheduleSnapshot>> {
        let state = self.lock_state()?;
        Ok(state.snapshot.clone())
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 队列构建
    ///
    /// 过滤规则:
    /// - 不一致工单的全部工序退出队列 (工单级隔离)
    /// - 完工/取消工序不入队
    /// - 未指派机台的工序不入队
    fn build_queues(&self, orders: &HashMap<String, Order>) -> HashMap<String, Vec<QueueEntry>> {
        let mut queues: HashMap<String, Vec<QueueEntry>> = HashMap::new();

        for order in orders.values() {
            if !self.checker.is_consistent(order, &self.config) {
                debug!(order_id = %order.order_id, "工单不一致, 整体退出机台队列");
                continue;
            }

            for step in &order.route {
                if !step.state.is_schedulable() {
                    continue;
                }
                let machine_id = match &step.machine_id {
                    Some(id) => id.clone(),
                    None => {
                        debug!(step_id = %step.step_id, "工序未指派机台, 不入队");
                        continue;
                    }
                };

                queues.entry(machine_id.clone()).or_default().push(QueueEntry {
                    order_id: order.order_id.clone(),
                    priority_rank: order.priority_rank,
                    step_id: step.step_id.clone(),
                    sequence: step.sequence,
                    machine_id,
                    rate: step.rate,
                    total_quantity: step.total_quantity,
                    completed_quantity: step.completed_quantity,
                });
            }
        }

        queues
    }

    fn lock_state(&self) -> EngineResult<std::sync::MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|e| EngineError::LockError(e.to_string()))
    }
}
