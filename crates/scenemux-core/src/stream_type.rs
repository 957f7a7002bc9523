//! 基本流类型与容器媒体类别定义.
//!
//! `StreamType` 对应 MPEG-4 Systems 解码器配置中的 streamType 字段,
//! `MediaCategory` 对应 ISO 容器中轨道的 handler 类型.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 基本流类型 (decoderConfig.streamType)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamType {
    /// 对象描述符流
    ObjectDescriptor,
    /// 时钟参考流 (OCR)
    ClockReference,
    /// 场景描述流 (BIFS/LASeR)
    Scene,
    /// 视觉流
    Visual,
    /// 音频流
    Audio,
    /// MPEG-7 流
    Mpeg7,
    /// IPMP 流
    Ipmp,
    /// 对象内容信息流
    Oci,
    /// MPEG-J 流
    MpegJ,
    /// 用户交互流 (InputSensor)
    Interact,
    /// 文本流
    Text,
    /// 其他未列出的类型
    Other(u8),
}

impl StreamType {
    /// 从码流中的 6 位数值解析
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x01 => Self::ObjectDescriptor,
            0x02 => Self::ClockReference,
            0x03 => Self::Scene,
            0x04 => Self::Visual,
            0x05 => Self::Audio,
            0x06 => Self::Mpeg7,
            0x07 => Self::Ipmp,
            0x08 => Self::Oci,
            0x09 => Self::MpegJ,
            0x0A => Self::Interact,
            0x0D => Self::Text,
            other => Self::Other(other),
        }
    }

    /// 转换为码流中的数值
    pub fn to_u8(self) -> u8 {
        match self {
            Self::ObjectDescriptor => 0x01,
            Self::ClockReference => 0x02,
            Self::Scene => 0x03,
            Self::Visual => 0x04,
            Self::Audio => 0x05,
            Self::Mpeg7 => 0x06,
            Self::Ipmp => 0x07,
            Self::Oci => 0x08,
            Self::MpegJ => 0x09,
            Self::Interact => 0x0A,
            Self::Text => 0x0D,
            Self::Other(v) => v,
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObjectDescriptor => write!(f, "OD"),
            Self::ClockReference => write!(f, "OCR"),
            Self::Scene => write!(f, "场景"),
            Self::Visual => write!(f, "视觉"),
            Self::Audio => write!(f, "音频"),
            Self::Mpeg7 => write!(f, "MPEG-7"),
            Self::Ipmp => write!(f, "IPMP"),
            Self::Oci => write!(f, "OCI"),
            Self::MpegJ => write!(f, "MPEG-J"),
            Self::Interact => write!(f, "交互"),
            Self::Text => write!(f, "文本"),
            Self::Other(v) => write!(f, "未知(0x{v:02X})"),
        }
    }
}

/// 容器轨道的媒体类别 (handler 类型)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaCategory {
    /// 视觉轨道
    Visual,
    /// 音频轨道
    Audio,
    /// MPEG-7 轨道
    Mpeg7,
    /// IPMP 轨道
    Ipmp,
    /// OCI 轨道
    Oci,
    /// MPEG-J 轨道
    MpegJ,
    /// 场景描述轨道
    Scene,
    /// 文本轨道
    Text,
    /// 对象描述符轨道
    ObjectDescriptor,
    /// 时钟参考轨道
    ClockReference,
}

impl MediaCategory {
    /// 带 URL 的远程引用描述符所使用的映射表
    ///
    /// OD/OCR 及未知类型没有映射, 返回 `None`.
    pub fn for_remote_stream(stream_type: StreamType) -> Option<Self> {
        match stream_type {
            StreamType::Visual => Some(Self::Visual),
            StreamType::Audio => Some(Self::Audio),
            StreamType::Mpeg7 => Some(Self::Mpeg7),
            StreamType::Ipmp => Some(Self::Ipmp),
            StreamType::Oci => Some(Self::Oci),
            StreamType::MpegJ => Some(Self::MpegJ),
            StreamType::Interact | StreamType::Scene => Some(Self::Scene),
            StreamType::Text => Some(Self::Text),
            StreamType::ObjectDescriptor | StreamType::ClockReference | StreamType::Other(_) => {
                None
            }
        }
    }

    /// ISO 容器 handler 四字符码
    pub fn handler(self) -> &'static str {
        match self {
            Self::Visual => "vide",
            Self::Audio => "soun",
            Self::Mpeg7 => "m7sd",
            Self::Ipmp => "ipsm",
            Self::Oci => "ocsm",
            Self::MpegJ => "mjsm",
            Self::Scene => "sdsm",
            Self::Text => "text",
            Self::ObjectDescriptor => "odsm",
            Self::ClockReference => "crsm",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.handler())
    }
}
