//! 访问单元时间与时间基换算.
//!
//! 场景文本中的时间可能以流时间基 (tick) 或秒给出, 秒值在首次读取时原地换算为 tick.

use serde::{Deserialize, Serialize};

/// 访问单元时间
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Timing {
    /// 以流时间基为单位的时间
    Ticks(u64),
    /// 以秒为单位的时间, 尚未换算
    Seconds(f64),
}

impl Timing {
    /// 换算为 tick 并原地替换
    ///
    /// 秒值只换算一次, 之后始终返回同一个 tick 值.
    pub fn resolve(&mut self, timescale: u32) -> u64 {
        match *self {
            Self::Ticks(ticks) => ticks,
            Self::Seconds(secs) => {
                let ticks = if secs > 0.0 {
                    (secs * f64::from(timescale)) as u64
                } else {
                    0
                };
                *self = Self::Ticks(ticks);
                ticks
            }
        }
    }

    /// 已换算的 tick 值
    pub fn ticks(&self) -> Option<u64> {
        match self {
            Self::Ticks(ticks) => Some(*ticks),
            Self::Seconds(_) => None,
        }
    }

    /// 是否为零时刻
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Ticks(ticks) => *ticks == 0,
            Self::Seconds(secs) => *secs == 0.0,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::Ticks(0)
    }
}

/// 将时间值从一个时间基重缩放到另一个时间基
///
/// 使用 128 位中间值避免溢出: value * to / from. `from` 为 0 时返回 0.
pub fn rescale(value: u64, from: u32, to: u32) -> u64 {
    if from == 0 {
        return 0;
    }
    (u128::from(value) * u128::from(to) / u128::from(from)) as u64
}
