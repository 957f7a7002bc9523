//! MPEG-4 对象描述符框架 (ODF) 数据模型.
//!
//! 包括基本流描述符 (ESD) 及其解码器/同步层配置、对象描述符、根描述符,
//! 以及文本场景中附加在 ESD 上的导入指令 (MuxInfo).

pub mod command;
pub mod dsi;
pub mod writer;

use std::fmt;

use bitflags::bitflags;
use scenemux_core::StreamType;
use serde::{Deserialize, Serialize};

pub use command::OdCommand;
pub use dsi::{BifsConfig, DecoderSpecificInfo, ElementaryMask, LaserConfig, UiConfig};

/// 基本流 ID
///
/// 0 表示"待分配", 在创建轨道时解析为稳定值, 之后不再改变.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EsId(u16);

impl EsId {
    /// 待分配的 ID
    pub const PENDING: Self = Self(0);

    /// 由数值创建
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// 数值
    pub const fn get(self) -> u16 {
        self.0
    }

    /// 是否仍待分配
    pub const fn is_pending(self) -> bool {
        self.0 == 0
    }

    /// 仅当仍待分配时绑定为给定 ID
    pub fn bind(&mut self, id: EsId) {
        if self.is_pending() {
            *self = id;
        }
    }
}

impl From<u16> for EsId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for EsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pending() {
            write!(f, "待分配")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// 解码器配置描述符
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// 流类型
    pub stream_type: StreamType,
    /// 对象类型指示 (OTI)
    #[serde(default)]
    pub object_type_indication: u8,
    /// 解码缓冲区大小 (字节)
    #[serde(default)]
    pub buffer_size_db: u32,
    /// 最大码率 (bps)
    #[serde(default)]
    pub max_bitrate: u32,
    /// 平均码率 (bps)
    #[serde(default)]
    pub avg_bitrate: u32,
    /// 解码器专用信息
    #[serde(default)]
    pub decoder_specific_info: Option<DecoderSpecificInfo>,
}

impl DecoderConfig {
    /// 创建指定流类型的空配置
    pub fn new(stream_type: StreamType) -> Self {
        Self {
            stream_type,
            object_type_indication: 0,
            buffer_size_db: 0,
            max_bitrate: 0,
            avg_bitrate: 0,
            decoder_specific_info: None,
        }
    }
}

/// 同步层配置描述符
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SlConfig {
    /// 预定义配置编号 (2 = MP4 文件内使用)
    #[serde(default)]
    pub predefined: u8,
    /// 时间戳分辨率 (0 表示未设置)
    #[serde(default)]
    pub timestamp_resolution: u32,
}

bitflags! {
    /// 外部媒体导入标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ImportFlags: u32 {
        /// 仅引用源文件数据, 不复制
        const USE_DATAREF = 1;
        /// 不丢弃视频帧
        const NO_FRAME_DROP = 1 << 1;
        /// 强制打包码流
        const FORCE_PACKED = 1 << 2;
        /// 隐式 SBR 信令
        const SBR_IMPLICIT = 1 << 3;
        /// 显式 SBR 信令
        const SBR_EXPLICIT = 1 << 4;
        /// 不生成编辑列表
        const NO_EDIT_LIST = 1 << 5;
    }
}

/// 外部媒体导入指令
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxInfo {
    /// 源文件名, 可带 `#id` / `#video` / `#audio` 子流后缀
    pub file_name: Option<String>,
    /// 格式提示
    pub stream_format: Option<String>,
    /// 导入时长 (毫秒, 0 表示全部)
    pub duration_ms: u32,
    /// 起始时间偏移 (毫秒)
    pub start_time_ms: u32,
    /// 交织分组 ID (0 表示不分组)
    pub group_id: u32,
    /// 导入成功后删除源文件
    pub delete_file: bool,
    /// 视频帧率提示
    pub frame_rate: f64,
    /// 导入标志
    pub import_flags: ImportFlags,
    /// 字幕转换的目标文本节点名称
    pub text_node: Option<String>,
    /// 字幕转换的字体节点名称
    pub font_node: Option<String>,
}

/// 基本流描述符
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EsDescriptor {
    /// 基本流 ID
    #[serde(default)]
    pub es_id: EsId,
    /// 依赖的基本流 ID
    #[serde(default)]
    pub depends_on: Option<EsId>,
    /// 远程引用 URL, 存在时该流没有本地样本
    #[serde(default)]
    pub url: Option<String>,
    /// 解码器配置
    #[serde(default)]
    pub decoder_config: Option<DecoderConfig>,
    /// 同步层配置
    #[serde(default)]
    pub sl_config: Option<SlConfig>,
    /// 导入指令扩展
    #[serde(default)]
    pub mux_info: Option<MuxInfo>,
}

impl EsDescriptor {
    /// 合成一个仅含流类型的描述符 (SL 预定义 2, 无 DSI)
    pub fn synthesize(es_id: EsId, stream_type: StreamType) -> Self {
        Self {
            es_id,
            depends_on: None,
            url: None,
            decoder_config: Some(DecoderConfig::new(stream_type)),
            sl_config: Some(SlConfig {
                predefined: 2,
                timestamp_resolution: 0,
            }),
            mux_info: None,
        }
    }

    /// 流类型 (无解码器配置时为 `None`)
    pub fn stream_type(&self) -> Option<StreamType> {
        self.decoder_config.as_ref().map(|dc| dc.stream_type)
    }

    /// 解码器专用信息
    pub fn dsi(&self) -> Option<&DecoderSpecificInfo> {
        self.decoder_config
            .as_ref()
            .and_then(|dc| dc.decoder_specific_info.as_ref())
    }

    /// 取得同步层配置, 不存在时创建默认配置
    pub fn sl_config_mut(&mut self) -> &mut SlConfig {
        self.sl_config.get_or_insert_with(SlConfig::default)
    }

    /// 取得解码器配置, 不存在时按给定流类型创建
    pub fn decoder_config_mut(&mut self, stream_type: StreamType) -> &mut DecoderConfig {
        self.decoder_config
            .get_or_insert_with(|| DecoderConfig::new(stream_type))
    }

    /// 时间戳分辨率 (未设置时为 0)
    pub fn timestamp_resolution(&self) -> u32 {
        self.sl_config
            .as_ref()
            .map_or(0, |sl| sl.timestamp_resolution)
    }

    /// 导入指令
    pub fn mux_info(&self) -> Option<&MuxInfo> {
        self.mux_info.as_ref()
    }

    /// 移除导入指令, 返回被移除的值
    pub fn remove_mux_info(&mut self) -> Option<MuxInfo> {
        self.mux_info.take()
    }
}

/// 对象描述符中的基本流条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EsEntry {
    /// 完整的基本流描述符
    Descriptor(EsDescriptor),
    /// ES_ID 引用占位符
    Reference {
        /// 被引用的基本流 ID
        es_id: EsId,
    },
    /// ES_ID 包含占位符 (引用文件中的轨道)
    Include {
        /// 被包含的轨道 ID
        track_id: u32,
    },
    /// 其他描述符子类型 (不允许出现在此位置)
    Other {
        /// 描述符标签
        tag: u8,
    },
}

impl EsEntry {
    /// 完整描述符的引用
    pub fn descriptor(&self) -> Option<&EsDescriptor> {
        match self {
            Self::Descriptor(esd) => Some(esd),
            _ => None,
        }
    }

    /// 完整描述符的可变引用
    pub fn descriptor_mut(&mut self) -> Option<&mut EsDescriptor> {
        match self {
            Self::Descriptor(esd) => Some(esd),
            _ => None,
        }
    }
}

/// 对象描述符
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    /// 对象描述符 ID
    pub od_id: u16,
    /// 远程对象 URL
    #[serde(default)]
    pub url: Option<String>,
    /// 基本流条目
    #[serde(default)]
    pub es_descriptors: Vec<EsEntry>,
}

/// 不透明的通用描述符 (扩展、IPMP、OCI 等)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericDescriptor {
    /// 描述符标签
    pub tag: u8,
    /// 描述符内容
    #[serde(default)]
    pub data: Vec<u8>,
}

/// 各类别的 profile/level 指示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileLevels {
    /// OD profile/level
    pub od: u8,
    /// 场景 profile/level
    pub scene: u8,
    /// 音频 profile/level
    pub audio: u8,
    /// 视觉 profile/level
    pub visual: u8,
    /// 图形 profile/level
    pub graphics: u8,
}

impl Default for ProfileLevels {
    /// 0xFF 表示"未指定"
    fn default() -> Self {
        Self {
            od: 0xFF,
            scene: 0xFF,
            audio: 0xFF,
            visual: 0xFF,
            graphics: 0xFF,
        }
    }
}

/// 根描述符 (初始对象描述符或普通对象描述符)
///
/// 只有初始对象描述符携带 profile/level 与 IPMP 工具列表.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RootDescriptor {
    /// 对象描述符 ID
    pub od_id: u16,
    /// URL
    pub url: Option<String>,
    /// 绑定的基本流描述符
    pub es_descriptors: Vec<EsDescriptor>,
    /// 扩展描述符
    pub extension_descriptors: Vec<GenericDescriptor>,
    /// IPMP 描述符
    pub ipmp_descriptors: Vec<GenericDescriptor>,
    /// OCI 描述符
    pub oci_descriptors: Vec<GenericDescriptor>,
    /// IPMP 工具列表
    pub ipmp_tool_list: Option<GenericDescriptor>,
    /// profile/level 指示
    pub profiles: Option<ProfileLevels>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_es_id_binds_only_once() {
        let mut id = EsId::PENDING;
        id.bind(EsId::new(5));
        assert_eq!(id.get(), 5);
        id.bind(EsId::new(9));
        assert_eq!(id.get(), 5);
    }

    #[test]
    fn test_synthesized_descriptor_defaults() {
        let esd = EsDescriptor::synthesize(EsId::new(3), StreamType::Scene);
        assert_eq!(esd.stream_type(), Some(StreamType::Scene));
        assert!(esd.dsi().is_none());
        assert_eq!(esd.sl_config.as_ref().map(|sl| sl.predefined), Some(2));
        assert_eq!(esd.timestamp_resolution(), 0);
    }

    #[test]
    fn test_descriptor_deserializes_with_defaults() {
        let json = r#"{
            "es_id": 7,
            "decoder_config": { "stream_type": "Visual" },
            "mux_info": { "file_name": "clip.mp4#2", "start_time_ms": 500 }
        }"#;
        let esd: EsDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(esd.es_id, EsId::new(7));
        assert_eq!(esd.stream_type(), Some(StreamType::Visual));
        let mux = esd.mux_info.as_ref().unwrap();
        assert_eq!(mux.file_name.as_deref(), Some("clip.mp4#2"));
        assert_eq!(mux.start_time_ms, 500);
        assert!(mux.import_flags.is_empty());
    }
}
