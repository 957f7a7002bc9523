//! 码率统计.
//!
//! 按一秒 (一个时间基) 滑动窗口统计最大码率, 结束时写回解码器配置.

use scenemux_codec::DecoderConfig;

/// 单个流的码率统计
#[derive(Debug, Clone)]
pub struct BitrateStats {
    timescale: u32,
    total_bytes: u64,
    window_start: u64,
    window_bytes: u64,
    window_max: u64,
    max_payload: u32,
    last_dts: u64,
}

impl BitrateStats {
    /// 以流时间基创建统计
    pub fn new(timescale: u32) -> Self {
        Self {
            timescale,
            total_bytes: 0,
            window_start: 0,
            window_bytes: 0,
            window_max: 0,
            max_payload: 0,
            last_dts: 0,
        }
    }

    /// 记录一个访问单元
    ///
    /// 空数据也参与统计, 它会推进时长与窗口边界.
    pub fn record(&mut self, dts: u64, size: usize) {
        if dts.saturating_sub(self.window_start) > u64::from(self.timescale) {
            self.window_max = self.window_max.max(self.window_bytes);
            self.window_bytes = 0;
            self.window_start = dts;
        }
        let size = size as u64;
        self.window_bytes += size;
        self.total_bytes += size;
        self.max_payload = self
            .max_payload
            .max(u32::try_from(size).unwrap_or(u32::MAX));
        self.last_dts = dts;
    }

    /// 平均码率 (bit/s), 时长为 0 时为 0
    pub fn avg_bitrate(&self) -> u32 {
        if self.last_dts == 0 {
            return 0;
        }
        let avg = u128::from(self.total_bytes) * u128::from(self.timescale) * 8
            / u128::from(self.last_dts);
        u32::try_from(avg).unwrap_or(u32::MAX)
    }

    /// 最大码率 (bit/s), 只计已关闭的窗口, 时长为 0 时为 0
    pub fn max_bitrate(&self) -> u32 {
        if self.last_dts == 0 {
            return 0;
        }
        let max = self.window_max * 8;
        u32::try_from(max).unwrap_or(u32::MAX)
    }

    /// 最大单个访问单元大小
    pub fn buffer_size(&self) -> u32 {
        self.max_payload
    }

    /// 写回解码器配置
    pub fn apply(&self, config: &mut DecoderConfig) {
        config.avg_bitrate = self.avg_bitrate();
        config.max_bitrate = self.max_bitrate();
        config.buffer_size_db = self.buffer_size();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenemux_core::StreamType;

    #[test]
    fn test_窗口统计() {
        let mut stats = BitrateStats::new(1000);
        stats.record(0, 10);
        stats.record(1000, 20);
        stats.record(2500, 5);
        assert_eq!(stats.avg_bitrate(), 112);
        assert_eq!(stats.max_bitrate(), 240);
        assert_eq!(stats.buffer_size(), 20);
    }

    #[test]
    fn test_zero_duration_has_no_average() {
        let mut stats = BitrateStats::new(1000);
        stats.record(0, 64);
        assert_eq!(stats.avg_bitrate(), 0);
        assert_eq!(stats.max_bitrate(), 0);
        assert_eq!(stats.buffer_size(), 64);
    }

    #[test]
    fn test_open_window_not_counted() {
        let mut stats = BitrateStats::new(1000);
        stats.record(0, 10);
        stats.record(1500, 50);
        stats.record(1800, 50);
        assert_eq!(stats.max_bitrate(), 80);
    }

    #[test]
    fn test_apply_to_decoder_config() {
        let mut stats = BitrateStats::new(1000);
        stats.record(0, 100);
        stats.record(2000, 0);
        let mut dc = DecoderConfig::new(StreamType::Scene);
        stats.apply(&mut dc);
        assert_eq!(dc.avg_bitrate, 400);
        assert_eq!(dc.max_bitrate, 800);
        assert_eq!(dc.buffer_size_db, 100);
    }
}
