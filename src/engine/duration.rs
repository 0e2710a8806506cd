// ==========================================
// 生产排程与进度对账系统 - 工时模型
// ==========================================
// 职责: 数量×台时产量 → 工作时长; 按时长比例分摊数量
// 红线: 分摊后各时间片数量之和必须精确等于剩余量 (守恒, 末片吸收舍入余量)
// ==========================================

use chrono::Duration;

// ==========================================
// DurationModel - 工时模型
// ==========================================
pub struct DurationModel {
    // 无状态引擎, 不需要注入依赖
}

impl DurationModel {
    /// 构造函数
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 计算剩余量对应的工作秒数
    ///
    /// 前置条件: rate > 0 (由 ScheduleBuilder 门禁保证)
    ///
    /// # 参数
    /// - `remaining_qty`: 剩余待排数量
    /// - `rate`: 台时产量 (件/工作小时)
    ///
    /// # 返回
    /// 工作秒数 (四舍五入到秒; 正剩余量至少 1 秒, 避免零时长时间片)
    pub fn working_secs(&self, remaining_qty: f64, rate: f64) -> i64 {
        debug_assert!(rate > 0.0, "rate 必须为正, 门禁应已拦截");

        if remaining_qty <= 0.0 {
            return 0;
        }

        let secs = (remaining_qty / rate * 3600.0).round() as i64;
        secs.max(1)
    }

    /// 工作秒数转 chrono::Duration
    pub fn as_duration(&self, secs: i64) -> Duration {
        Duration::seconds(secs)
    }

    /// 按时间片时长比例分摊数量
    ///
    /// 前 n-1 片按 (片时长/总时长) 比例取值, 末片取剩余差额,
    /// 保证 sum(各片数量) == total_qty 精确成立。
    ///
    /// # 参数
    /// - `total_qty`: 待分摊总量
    /// - `slice_secs`: 各时间片秒数 (非空)
    ///
    /// # 返回
    /// 各时间片分摊数量 (与 slice_secs 等长)
    pub fn apportion(&self, total_qty: f64, slice_secs: &[i64]) -> Vec<f64> {
        if slice_secs.is_empty() {
            return Vec::new();
        }
        if slice_secs.len() == 1 {
            return vec![total_qty];
        }

        let total_secs: i64 = slice_secs.iter().sum();
        let mut quantities = Vec::with_capacity(slice_secs.len());
        let mut assigned = 0.0;

        for &secs in &slice_secs[..slice_secs.len() - 1] {
            let qty = if total_secs > 0 {
                total_qty * (secs as f64 / total_secs as f64)
            } else {
                0.0
            };
            quantities.push(qty);
            assigned += qty;
        }

        // 末片吸收舍入余量
        quantities.push(total_qty - assigned);
        quantities
    }
}

impl Default for DurationModel {
    fn default() -> Self {
        Self::new()
    }
}
