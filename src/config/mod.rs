// ==========================================
// 生产排程与进度对账系统 - 配置层
// ==========================================
// 职责: 引擎配置项集中定义
// 红线: 引擎内不得硬编码业务常量 (epsilon/超产上限/日历扫描上限)
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// EngineConfig - 引擎配置
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 数量比较容差（工单进度/工序完成量比较时使用）
    pub epsilon: f64,
    /// 超产上限比例（MANUAL 对账写入完成量时, 超过 total*(1+ceiling) 需显式放行）
    pub overproduction_ceiling_pct: f64,
    /// 日历前向扫描上限（天）; 超过即判定日历枯竭, 防止无工作日时死循环
    pub max_scan_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            overproduction_ceiling_pct: 0.10,
            max_scan_days: 366,
        }
    }
}

impl EngineConfig {
    /// 校验配置项取值范围
    ///
    /// # 返回
    /// - `Ok(())`: 配置有效
    /// - `Err(String)`: 配置无效, 返回错误描述
    pub fn validate(&self) -> Result<(), String> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(format!("epsilon 无效: {}", self.epsilon));
        }
        if !self.overproduction_ceiling_pct.is_finite() || self.overproduction_ceiling_pct < 0.0 {
            return Err(format!(
                "超产上限比例无效: {}",
                self.overproduction_ceiling_pct
            ));
        }
        if self.max_scan_days == 0 {
            return Err("日历扫描上限必须大于 0".to_string());
        }
        Ok(())
    }
}
