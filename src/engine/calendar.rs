// ==========================================
// 生产排程与进度对账系统 - 工作日历
// ==========================================
// 职责: 回答"两个时刻之间存在多少工作时间"
// 输入: 每周班次表 (weekday, 班次开始, 班次结束), 允许各 weekday 结束时间不同
// 红线: 前向扫描必须有界, 无工作日时报日历枯竭而不是死循环
// ==========================================
// 无状态: 构造后只读
// ==========================================

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ==========================================
// ShiftWindow - 单个 weekday 的班次定义
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShiftWindow {
    pub weekday: Weekday,         // 周几
    pub shift_start: NaiveTime,   // 班次开始 (例 07:45)
    pub shift_end: NaiveTime,     // 班次结束 (例 17:45)
}

// ==========================================
// WorkCalendar - 工作日历
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkCalendar {
    windows: Vec<ShiftWindow>,
}

impl WorkCalendar {
    /// 从班次表构造工作日历
    ///
    /// # 校验规则
    /// 1. 班次表不能为空 (空表意味着永远没有工作时间)
    /// 2. 每行 shift_start < shift_end
    /// 3. 同一 weekday 不允许重复定义
    ///
    /// # 返回
    /// - `Ok(WorkCalendar)`: 日历有效
    /// - `Err(String)`: 配置无效, 返回错误描述
    pub fn new(windows: Vec<ShiftWindow>) -> Result<Self, String> {
        if windows.is_empty() {
            warn!("班次表为空");
            return Err("班次表不能为空".to_string());
        }

        for w in &windows {
            if w.shift_start >= w.shift_end {
                warn!(
                    weekday = ?w.weekday,
                    shift_start = %w.shift_start,
                    shift_end = %w.shift_end,
                    "班次开始时间不早于结束时间"
                );
                return Err(format!(
                    "{:?} 班次无效: 开始 {} 不早于结束 {}",
                    w.weekday, w.shift_start, w.shift_end
                ));
            }
        }

        for (i, w) in windows.iter().enumerate() {
            if windows[..i].iter().any(|prev| prev.weekday == w.weekday) {
                return Err(format!("{:?} 班次重复定义", w.weekday));
            }
        }

        Ok(Self { windows })
    }

    /// 标准周一至周五 07:45-17:45 日历 (测试与演示用)
    pub fn standard_week() -> Self {
        let start = NaiveTime::from_hms_opt(7, 45, 0).unwrap();
        let end = NaiveTime::from_hms_opt(17, 45, 0).unwrap();
        let weekdays = [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ];
        Self {
            windows: weekdays
                .iter()
                .map(|&weekday| ShiftWindow {
                    weekday,
                    shift_start: start,
                    shift_end: end,
                })
                .collect(),
        }
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 指定日期的工作窗口
    ///
    /// # 返回
    /// - `Some((开始, 结束))`: 该日有班次
    /// - `None`: 非工作日
    pub fn window_on(&self, date: NaiveDate) -> Option<(NaiveDateTime, NaiveDateTime)> {
        self.windows
            .iter()
            .find(|w| w.weekday == date.weekday())
            .map(|w| (date.and_time(w.shift_start), date.and_time(w.shift_end)))
    }

    /// 从指定时刻起的下一个工作窗口 (含当前窗口剩余部分)
    ///
    /// 窗口起点不早于 `from`: 若 `from` 落在班次内, 返回 (from, 班次结束);
    /// 否则返回之后第一个工作日的完整班次。
    ///
    /// # 参数
    /// - `from`: 起始时刻
    /// - `max_scan_days`: 前向扫描上限 (天); 超过即放弃
    ///
    /// # 返回
    /// - `Some((开始, 结束))`: 找到工作窗口
    /// - `None`: 扫描 max_scan_days 天仍无工作时间 (日历枯竭)
    pub fn next_window(
        &self,
        from: NaiveDateTime,
        max_scan_days: u32,
    ) -> Option<(NaiveDateTime, NaiveDateTime)> {
        for offset in 0..=max_scan_days {
            let date = from.date() + Duration::days(offset as i64);
            if let Some((win_start, win_end)) = self.window_on(date) {
                if from >= win_end {
                    // 当日班次已结束, 看下一天
                    continue;
                }
                let start = if from > win_start { from } else { win_start };
                return Some((start, win_end));
            }
        }

        debug!(
            from = %from,
            max_scan_days = max_scan_days,
            "前向扫描未找到工作窗口"
        );
        None
    }

    /// 两个时刻之间的工作秒数 (诊断/测试用)
    pub fn working_secs_between(&self, a: NaiveDateTime, b: NaiveDateTime) -> i64 {
        if b <= a {
            return 0;
        }

        let mut total: i64 = 0;
        let mut date = a.date();
        while date <= b.date() {
            if let Some((win_start, win_end)) = self.window_on(date) {
                let start = win_start.max(a);
                let end = win_end.min(b);
                if end > start {
                    total += (end - start).num_seconds();
                }
            }
            date += Duration::days(1);
        }
        total
    }
}
