//! 解码器专用信息 (DSI).
//!
//! DSI 在文本场景中可能以结构化配置出现 (BIFS/LASeR/UI 配置), 封装前统一转换为原始字节.

use log::debug;
use scenemux_core::bitreader::BitReader;
use scenemux_core::bitwriter::BitWriter;
use scenemux_core::{MuxError, MuxResult};
use serde::{Deserialize, Serialize};

use crate::scene_family::LASER_OBJECT_TYPE;

/// 解码器专用信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecoderSpecificInfo {
    /// 已编码的原始字节
    Raw(Vec<u8>),
    /// 用户交互 (InputSensor) 配置
    Ui(UiConfig),
    /// 文本流配置 (已编码)
    Text(Vec<u8>),
    /// BIFS 配置
    Bifs(BifsConfig),
    /// LASeR 配置
    Laser(LaserConfig),
}

impl DecoderSpecificInfo {
    /// 编码为最终写入容器的字节
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Raw(data) | Self::Text(data) => data.clone(),
            Self::Ui(cfg) => cfg.encode(),
            Self::Bifs(cfg) => cfg.encode(),
            Self::Laser(cfg) => cfg.encode(),
        }
    }
}

/// 用户交互设备配置
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// 设备名称 (如 "KeySensor", "StringSensor")
    pub device_name: String,
    /// StringSensor 结束字符
    pub term_char: u8,
    /// StringSensor 删除字符
    pub del_char: u8,
    /// 设备私有数据
    pub ui_data: Vec<u8>,
}

impl UiConfig {
    /// 编码为最终二进制形式
    ///
    /// 布局: 设备名长度 (8 位) + 设备名, StringSensor 附加结束/删除字符, 最后是私有数据.
    pub fn encode(&self) -> Vec<u8> {
        let mut bw = BitWriter::new();
        bw.write_string(&self.device_name);
        if self.device_name.eq_ignore_ascii_case("StringSensor")
            && (self.term_char != 0 || self.del_char != 0)
        {
            bw.write_bits(u32::from(self.term_char), 8);
            bw.write_bits(u32::from(self.del_char), 8);
        }
        bw.write_bytes(&self.ui_data);
        bw.finish()
    }
}

/// BIFS 基本掩码 (非命令流使用)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementaryMask {
    /// 节点类型标签
    pub node_tag: u32,
    /// 节点 ID
    pub node_id: u32,
}

/// BIFS 配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BifsConfig {
    /// 版本 (1 或 2, 0 表示由编码器决定)
    pub version: u8,
    /// 节点 ID 位宽
    pub node_id_bits: u32,
    /// 路由 ID 位宽
    pub route_id_bits: u32,
    /// 原型 ID 位宽 (仅版本 2)
    pub proto_id_bits: u32,
    /// 是否为命令流
    pub is_command_stream: bool,
    /// 是否使用像素度量
    pub pixel_metrics: bool,
    /// 场景宽度 (像素)
    pub pixel_width: u16,
    /// 场景高度 (像素)
    pub pixel_height: u16,
    /// 基本掩码 (存在时不携带像素度量与尺寸)
    pub elementary_masks: Vec<ElementaryMask>,
}

impl Default for BifsConfig {
    fn default() -> Self {
        Self {
            version: 0,
            node_id_bits: 0,
            route_id_bits: 0,
            proto_id_bits: 0,
            is_command_stream: true,
            pixel_metrics: false,
            pixel_width: 0,
            pixel_height: 0,
            elementary_masks: Vec::new(),
        }
    }
}

impl BifsConfig {
    /// 实际写出的版本: 未设置时, 使用原型则为 2, 否则为 1
    pub fn effective_version(&self) -> u8 {
        match self.version {
            0 if self.proto_id_bits > 0 => 2,
            0 => 1,
            v => v,
        }
    }

    /// 编码为 DSI 字节
    pub fn encode(&self) -> Vec<u8> {
        let version = self.effective_version();
        let mut bw = BitWriter::new();
        if version == 2 {
            // use3DMeshCoding, usePredictiveMFField
            bw.write_flag(false);
            bw.write_flag(false);
        }
        bw.write_bits(self.node_id_bits, 5);
        bw.write_bits(self.route_id_bits, 5);
        if version == 2 {
            bw.write_bits(self.proto_id_bits, 5);
        }
        let is_command = self.is_command_stream || self.elementary_masks.is_empty();
        bw.write_flag(is_command);
        if is_command {
            bw.write_flag(self.pixel_metrics);
            let has_size = self.pixel_width != 0 && self.pixel_height != 0;
            bw.write_flag(has_size);
            if has_size {
                bw.write_bits(u32::from(self.pixel_width), 16);
                bw.write_bits(u32::from(self.pixel_height), 16);
            }
        } else {
            for mask in &self.elementary_masks {
                bw.write_flag(true);
                bw.write_bits(mask.node_tag, 10);
                bw.write_bits(mask.node_id, self.node_id_bits);
            }
            bw.write_flag(false);
        }
        bw.finish()
    }

    /// 从 DSI 字节解析, 版本由 OTI 决定 (2 为版本 2, 其余为版本 1)
    pub fn parse(data: &[u8], oti: u8) -> MuxResult<Self> {
        let version = if oti == 2 { 2 } else { 1 };
        let mut br = BitReader::new(data);
        let mut cfg = Self {
            version,
            ..Self::default()
        };
        if version == 2 {
            br.read_bits(2)?;
        }
        cfg.node_id_bits = br.read_bits(5)?;
        cfg.route_id_bits = br.read_bits(5)?;
        if version == 2 {
            cfg.proto_id_bits = br.read_bits(5)?;
        }
        cfg.is_command_stream = br.read_flag()?;
        if cfg.is_command_stream {
            cfg.pixel_metrics = br.read_flag()?;
            if br.read_flag()? {
                cfg.pixel_width = br.read_bits(16)? as u16;
                cfg.pixel_height = br.read_bits(16)? as u16;
            }
        } else {
            while br.read_flag()? {
                let node_tag = br.read_bits(10)?;
                let node_id = br.read_bits(cfg.node_id_bits)?;
                cfg.elementary_masks.push(ElementaryMask { node_tag, node_id });
            }
        }
        debug!(
            "BIFS 配置: v{} nodeID={} routeID={} protoID={}",
            cfg.version, cfg.node_id_bits, cfg.route_id_bits, cfg.proto_id_bits
        );
        Ok(cfg)
    }
}

/// LASeR 配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaserConfig {
    /// profile
    pub profile: u8,
    /// level
    pub level: u8,
    /// 点序列编码方式
    pub points_codec: u8,
    /// 路径分量数
    pub path_components: u8,
    /// 是否发送完整请求主机
    pub full_request_host: bool,
    /// 时间分辨率 (0 表示未携带)
    pub time_resolution: u16,
    /// 颜色分量位数
    pub color_component_bits: u8,
    /// 坐标分辨率指数
    pub resolution: i8,
    /// 坐标位数
    pub coord_bits: u8,
    /// 缩放位数与坐标位数之差
    pub scale_bits_minus_coord_bits: u8,
    /// 新场景指示
    pub new_scene_indicator: bool,
    /// 扩展 ID 位数
    pub extension_id_bits: u8,
    /// 是否使用字符串 ID (保留节点名称)
    pub has_string_ids: bool,
}

impl Default for LaserConfig {
    fn default() -> Self {
        Self {
            profile: 0,
            level: 0x10,
            points_codec: 0,
            path_components: 0,
            full_request_host: false,
            time_resolution: 1000,
            color_component_bits: 8,
            resolution: 0,
            coord_bits: 12,
            scale_bits_minus_coord_bits: 0,
            new_scene_indicator: true,
            extension_id_bits: 2,
            has_string_ids: false,
        }
    }
}

impl LaserConfig {
    /// 编码为 DSI 字节
    pub fn encode(&self) -> Vec<u8> {
        let mut bw = BitWriter::new();
        bw.write_bits(u32::from(self.profile), 8);
        bw.write_bits(u32::from(self.level), 8);
        bw.write_bits(u32::from(self.points_codec), 2);
        bw.write_bits(u32::from(self.path_components), 4);
        bw.write_flag(self.full_request_host);
        let has_time_res = self.time_resolution != 0;
        bw.write_flag(has_time_res);
        if has_time_res {
            bw.write_bits(u32::from(self.time_resolution), 16);
        }
        bw.write_bits(u32::from(self.color_component_bits.saturating_sub(1)), 4);
        bw.write_bits_signed(i32::from(self.resolution), 4);
        bw.write_bits(u32::from(self.coord_bits), 5);
        bw.write_bits(u32::from(self.scale_bits_minus_coord_bits), 4);
        bw.write_flag(self.new_scene_indicator);
        bw.write_bits(0, 3);
        bw.write_bits(u32::from(self.extension_id_bits), 4);
        bw.write_flag(self.has_string_ids);
        bw.finish()
    }

    /// 从 DSI 字节解析
    pub fn parse(data: &[u8]) -> MuxResult<Self> {
        let mut br = BitReader::new(data);
        let profile = br.read_bits(8)? as u8;
        let level = br.read_bits(8)? as u8;
        let points_codec = br.read_bits(2)? as u8;
        let path_components = br.read_bits(4)? as u8;
        let full_request_host = br.read_flag()?;
        let time_resolution = if br.read_flag()? {
            br.read_bits(16)? as u16
        } else {
            0
        };
        let color_component_bits = br.read_bits(4)? as u8 + 1;
        let resolution = br.read_bits_signed(4)? as i8;
        let coord_bits = br.read_bits(5)? as u8;
        let scale_bits_minus_coord_bits = br.read_bits(4)? as u8;
        let new_scene_indicator = br.read_flag()?;
        if br.read_bits(3)? != 0 {
            return Err(MuxError::InvalidData("LASeR 配置保留位非零".into()));
        }
        let extension_id_bits = br.read_bits(4)? as u8;
        let has_string_ids = br.read_flag()?;
        Ok(Self {
            profile,
            level,
            points_codec,
            path_components,
            full_request_host,
            time_resolution,
            color_component_bits,
            resolution,
            coord_bits,
            scale_bits_minus_coord_bits,
            new_scene_indicator,
            extension_id_bits,
            has_string_ids,
        })
    }

    /// LASeR 流固定使用的 OTI
    pub const fn object_type() -> u8 {
        LASER_OBJECT_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_config_string_sensor_layout() {
        let cfg = UiConfig {
            device_name: "StringSensor".into(),
            term_char: b'\r',
            del_char: 0x08,
            ui_data: vec![0xAA],
        };
        let data = cfg.encode();
        assert_eq!(data[0] as usize, "StringSensor".len());
        assert_eq!(&data[1..13], b"StringSensor");
        assert_eq!(&data[13..], &[b'\r', 0x08, 0xAA]);
    }

    #[test]
    fn test_ui_config_other_device_has_no_terminators() {
        let cfg = UiConfig {
            device_name: "KeySensor".into(),
            term_char: b'\r',
            ..UiConfig::default()
        };
        assert_eq!(cfg.encode().len(), 1 + "KeySensor".len());
    }

    #[test]
    fn test_bifs_config_parse_v1_with_size() {
        let cfg = BifsConfig {
            version: 1,
            node_id_bits: 4,
            route_id_bits: 2,
            pixel_metrics: true,
            pixel_width: 320,
            pixel_height: 240,
            ..BifsConfig::default()
        };
        let parsed = BifsConfig::parse(&cfg.encode(), 1).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn test_bifs_version_follows_protos() {
        let mut cfg = BifsConfig::default();
        assert_eq!(cfg.effective_version(), 1);
        cfg.proto_id_bits = 3;
        assert_eq!(cfg.effective_version(), 2);
    }

    #[test]
    fn test_laser_config_parse_rejects_truncated() {
        assert!(LaserConfig::parse(&[0x00]).is_err());
    }

    #[test]
    fn test_laser_config_string_ids_survive_parse() {
        let cfg = LaserConfig {
            has_string_ids: true,
            resolution: -2,
            ..LaserConfig::default()
        };
        let parsed = LaserConfig::parse(&cfg.encode()).unwrap();
        assert!(parsed.has_string_ids);
        assert_eq!(parsed.resolution, -2);
        assert_eq!(parsed.coord_bits, 12);
    }
}
