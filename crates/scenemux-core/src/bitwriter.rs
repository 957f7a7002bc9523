//! 比特流写入器.
//!
//! 场景命令编码器与 OD 命令编码器的基础设施, 按大端位序 (MSB first) 写入.

/// 计算表示 `max_value` 所需的最少位数
///
/// 0 需要 0 位, 1 需要 1 位, 2..=3 需要 2 位, 依此类推.
pub fn bit_size(max_value: u32) -> u32 {
    32 - max_value.leading_zeros()
}

/// 比特流写入器
///
/// # 示例
/// ```
/// use scenemux_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_bits(0b1011, 4);
/// bw.write_bits(0b0001, 4);
/// bw.write_bits(0b01010101, 8);
/// assert_eq!(bw.finish(), vec![0b10110001, 0b01010101]);
/// ```
pub struct BitWriter {
    /// 输出缓冲区
    data: Vec<u8>,
    /// 当前字节 (正在填充)
    current_byte: u8,
    /// 当前字节中已填充的位数 (0-7)
    bit_count: u8,
}

impl BitWriter {
    /// 创建新的比特流写入器
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            current_byte: 0,
            bit_count: 0,
        }
    }

    /// 获取已写入的总位数
    pub fn bits_written(&self) -> usize {
        self.data.len() * 8 + self.bit_count as usize
    }

    /// 写入 1 个标志位
    pub fn write_flag(&mut self, flag: bool) {
        self.write_bits(u32::from(flag), 1);
    }

    /// 写入 N 个位 (最多 32 位)
    ///
    /// 值的低 N 位被写入, 高位在前.
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "write_bits: n={} 超过 32 位", n);

        let mut remaining = n;
        while remaining > 0 {
            let available = 8 - self.bit_count as u32;
            let to_write = remaining.min(available);

            let shift = remaining - to_write;
            let mask = if to_write >= 32 {
                u32::MAX
            } else {
                (1u32 << to_write) - 1
            };
            let bits = ((value >> shift) & mask) as u8;

            if to_write >= 8 {
                self.current_byte = bits;
            } else {
                self.current_byte = (self.current_byte << to_write) | bits;
            }
            self.bit_count += to_write as u8;

            if self.bit_count >= 8 {
                self.data.push(self.current_byte);
                self.current_byte = 0;
                self.bit_count = 0;
            }

            remaining -= to_write;
        }
    }

    /// 写入有符号整数 (二进制补码)
    pub fn write_bits_signed(&mut self, value: i32, n: u32) {
        let mask = if n >= 32 { u32::MAX } else { (1u32 << n) - 1 };
        self.write_bits((value as u32) & mask, n);
    }

    /// 写入长度前缀字符串 (8 位长度, 最长 255 字节)
    pub fn write_string(&mut self, value: &str) {
        let bytes = value.as_bytes();
        let len = bytes.len().min(255);
        self.write_bits(len as u32, 8);
        self.write_bytes(&bytes[..len]);
    }

    /// 写入完整字节
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.bit_count == 0 {
            self.data.extend_from_slice(bytes);
        } else {
            for &b in bytes {
                self.write_bits(u32::from(b), 8);
            }
        }
    }

    /// 对齐到字节边界 (用 0 填充)
    pub fn align_to_byte(&mut self) {
        if self.bit_count > 0 {
            let pad = 8 - self.bit_count;
            self.current_byte <<= pad;
            self.data.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// 完成写入, 返回字节数据
    pub fn finish(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.data
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitreader::BitReader;

    #[test]
    fn test_bit_size() {
        assert_eq!(bit_size(0), 0);
        assert_eq!(bit_size(1), 1);
        assert_eq!(bit_size(2), 2);
        assert_eq!(bit_size(3), 2);
        assert_eq!(bit_size(255), 8);
        assert_eq!(bit_size(256), 9);
    }

    #[test]
    fn test_write_bits_cross_byte() {
        let mut bw = BitWriter::new();
        bw.write_bits(0b101, 3);
        bw.write_bits(0b11111, 5);
        bw.write_bits(0b1, 1);
        assert_eq!(bw.bits_written(), 9);
        assert_eq!(bw.finish(), vec![0b1011_1111, 0b1000_0000]);
    }

    #[test]
    fn test_write_string_then_read_back() {
        let mut bw = BitWriter::new();
        bw.write_flag(true);
        bw.align_to_byte();
        bw.write_string("ab");
        let data = bw.finish();
        assert_eq!(data, vec![0x80, 2, b'a', b'b']);

        let mut br = BitReader::new(&data);
        assert!(br.read_flag().unwrap());
    }

    #[test]
    fn test_write_signed() {
        let mut bw = BitWriter::new();
        bw.write_bits_signed(-2, 4);
        bw.write_bits_signed(3, 4);
        assert_eq!(bw.finish(), vec![0b1110_0011]);
    }
}
