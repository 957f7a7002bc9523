//! 比特流读取器.
//!
//! 从解码器专用信息 (DSI) 字节中按位读取配置字段, 如 BIFS/LASeR 配置.
//!
//! 按大端位序读取 (MSB first), 与 MPEG-4 Systems 语法一致.

use crate::{MuxError, MuxResult};

/// 比特流读取器
///
/// # 示例
/// ```
/// use scenemux_core::bitreader::BitReader;
///
/// let data = [0b10110001, 0b01010101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_bits(4).unwrap(), 0b1011);
/// assert_eq!(br.read_bits(4).unwrap(), 0b0001);
/// assert_eq!(br.read_bits(8).unwrap(), 0b01010101);
/// ```
pub struct BitReader<'a> {
    /// 源数据
    data: &'a [u8],
    /// 当前字节索引
    byte_pos: usize,
    /// 当前字节中的位位置 (0-7, 0 表示最高位)
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// 获取剩余可读位数
    pub fn bits_left(&self) -> usize {
        if self.byte_pos >= self.data.len() {
            return 0;
        }
        (self.data.len() - self.byte_pos) * 8 - self.bit_pos as usize
    }

    /// 读取 1 个位并转换为布尔值
    pub fn read_flag(&mut self) -> MuxResult<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    /// 读取 N 个位 (最多 32 位)
    pub fn read_bits(&mut self, n: u32) -> MuxResult<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(MuxError::InvalidArgument(format!(
                "read_bits: n={} 超过 32 位",
                n,
            )));
        }
        if (n as usize) > self.bits_left() {
            return Err(MuxError::Eof);
        }

        let mut result: u32 = 0;
        let mut remaining = n;

        while remaining > 0 {
            let available = 8 - self.bit_pos as u32;
            let to_read = remaining.min(available);

            let shift = available - to_read;
            let mask = ((1u32 << to_read) - 1) as u8;
            let bits = (self.data[self.byte_pos] >> shift) & mask;

            result = (result << to_read) | u32::from(bits);

            self.bit_pos += to_read as u8;
            if self.bit_pos >= 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
            remaining -= to_read;
        }

        Ok(result)
    }

    /// 读取有符号整数 (二进制补码)
    pub fn read_bits_signed(&mut self, n: u32) -> MuxResult<i32> {
        let val = self.read_bits(n)?;
        if n == 0 {
            return Ok(0);
        }
        if n >= 32 {
            return Ok(val as i32);
        }
        if (val >> (n - 1)) & 1 != 0 {
            Ok(val as i32 | !((1i32 << n) - 1))
        } else {
            Ok(val as i32)
        }
    }

    /// 对齐到下一个字节边界
    pub fn align_to_byte(&mut self) {
        if self.bit_pos > 0 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
    }

    /// 读取剩余的全部字节 (先对齐)
    pub fn read_remaining(&mut self) -> &'a [u8] {
        self.align_to_byte();
        let start = self.byte_pos.min(self.data.len());
        self.byte_pos = self.data.len();
        &self.data[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bits_cross_byte() {
        let data = [0b1010_1100, 0b0101_0011];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits(3).unwrap(), 0b101);
        assert_eq!(br.read_bits(10).unwrap(), 0b0_1100_0101_0);
        assert_eq!(br.bits_left(), 3);
    }

    #[test]
    fn test_read_past_end_is_eof() {
        let data = [0xFF];
        let mut br = BitReader::new(&data);
        assert!(br.read_bits(8).is_ok());
        assert!(matches!(br.read_bits(1), Err(MuxError::Eof)));
    }

    #[test]
    fn test_read_signed_and_remaining() {
        let data = [0b1111_0000, 0xAB, 0xCD];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits_signed(4).unwrap(), -1);
        assert_eq!(br.read_remaining(), &[0xAB, 0xCD]);
        assert_eq!(br.bits_left(), 0);
    }
}
