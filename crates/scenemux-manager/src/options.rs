//! 封装选项.

use std::path::PathBuf;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// 编码标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct EncodeFlags: u32 {
        /// 周期性随机访问点以内联方式替换普通访问单元
        const RAP_INBAND = 1;
        /// 码流中保留节点名称
        const USE_NAMES = 1 << 1;
    }
}

/// 随机访问点生成方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RapMode {
    /// 不生成周期性随机访问点
    Disabled,
    /// 主样本中内联替换
    Inband,
    /// 写入影子样本表
    Shadow,
}

/// 封装选项
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// 编码标志
    pub flags: EncodeFlags,
    /// 随机访问点间隔 (毫秒, 0 表示关闭)
    pub rap_frequency_ms: u32,
    /// 编码跟踪日志路径 (追加写入)
    pub trace_log: Option<PathBuf>,
    /// 未声明导入指令的流所使用的外部媒体源
    pub media_source: Option<PathBuf>,
}

impl EncodeOptions {
    /// 随机访问点生成方式
    pub fn rap_mode(&self) -> RapMode {
        if self.rap_frequency_ms == 0 {
            RapMode::Disabled
        } else if self.flags.contains(EncodeFlags::RAP_INBAND) {
            RapMode::Inband
        } else {
            RapMode::Shadow
        }
    }

    /// 是否保留节点名称
    pub fn use_names(&self) -> bool {
        self.flags.contains(EncodeFlags::USE_NAMES)
    }

    /// 以流时间基表示的随机访问点间隔
    pub fn rap_delay(&self, timescale: u32) -> u64 {
        u64::from(self.rap_frequency_ms) * u64::from(timescale) / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rap_mode() {
        let mut opts = EncodeOptions::default();
        assert_eq!(opts.rap_mode(), RapMode::Disabled);
        opts.flags = EncodeFlags::RAP_INBAND;
        assert_eq!(opts.rap_mode(), RapMode::Disabled);
        opts.rap_frequency_ms = 500;
        assert_eq!(opts.rap_mode(), RapMode::Inband);
        opts.flags = EncodeFlags::USE_NAMES;
        assert_eq!(opts.rap_mode(), RapMode::Shadow);
        assert!(opts.use_names());
    }

    #[test]
    fn test_rap_delay_in_stream_ticks() {
        let opts = EncodeOptions {
            rap_frequency_ms: 500,
            ..EncodeOptions::default()
        };
        assert_eq!(opts.rap_delay(1000), 500);
        assert_eq!(opts.rap_delay(90000), 45000);
    }

    #[test]
    fn test_options_from_json() {
        let opts: EncodeOptions =
            serde_json::from_str(r#"{"flags":"RAP_INBAND","rap_frequency_ms":1000}"#).unwrap();
        assert_eq!(opts.rap_mode(), RapMode::Inband);
        assert!(opts.trace_log.is_none());
    }
}
