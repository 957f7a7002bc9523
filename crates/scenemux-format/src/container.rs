//! 容器 (Container) trait 定义.
//!
//! 封装流程通过此接口创建轨道、写入样本与编辑列表、登记根对象描述符.
//! 所有失败以 `MuxError::ContainerFailure` 返回.

use bytes::Bytes;
use scenemux_codec::{EsDescriptor, EsId, GenericDescriptor};
use scenemux_core::{MediaCategory, MuxError, MuxResult};
use serde::{Deserialize, Serialize};

/// 轨道 ID (与基本流 ID 一致)
pub type TrackId = u32;

/// 轨道 ID 对应的基本流 ID
///
/// 基本流 ID 只有 16 位, 超出范围的轨道 ID 无法写回描述符.
pub fn es_id_of(track: TrackId) -> MuxResult<EsId> {
    u16::try_from(track)
        .map(EsId::new)
        .map_err(|_| MuxError::ContainerFailure(format!("轨道 ID {} 超出基本流 ID 范围", track)))
}

/// 样本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// 解码时间戳 (媒体时间基)
    pub dts: u64,
    /// 样本数据
    pub data: Bytes,
    /// 是否为随机访问点
    pub is_rap: bool,
}

impl Sample {
    /// 创建样本
    pub fn new(dts: u64, data: impl Into<Bytes>, is_rap: bool) -> Self {
        Self {
            dts,
            data: data.into(),
            is_rap,
        }
    }
}

/// 编辑段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditMode {
    /// 空编辑 (不播放媒体, 用于表达起始偏移)
    Empty,
    /// 正常播放
    Normal,
}

/// 编辑段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSegment {
    /// 起始时间 (影片时间基)
    pub start: u64,
    /// 时长 (影片时间基)
    pub duration: u64,
    /// 对应的媒体时间 (媒体时间基)
    pub media_time: u64,
    /// 类型
    pub mode: EditMode,
}

/// profile/level 指示类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlCategory {
    /// 对象描述符
    ObjectDescriptor,
    /// 场景
    Scene,
    /// 音频
    Audio,
    /// 视觉
    Visual,
    /// 图形
    Graphics,
}

/// 容器 trait
///
/// 轨道以轨道 ID 标识. `new_track` 在请求的 ID 为待分配时分配新 ID, 请求的 ID 已被占用时失败.
pub trait Container {
    /// 创建轨道, 返回实际分配的轨道 ID
    fn new_track(
        &mut self,
        es_id: EsId,
        category: MediaCategory,
        timescale: u32,
    ) -> MuxResult<TrackId>;

    /// 是否存在指定 ID 的轨道
    fn has_track(&self, track: TrackId) -> bool;

    /// 启用或禁用轨道
    fn set_track_enabled(&mut self, track: TrackId, enabled: bool) -> MuxResult<()>;

    /// 添加流描述, 返回描述索引 (从 1 开始)
    fn new_description(&mut self, track: TrackId, esd: &EsDescriptor) -> MuxResult<u32>;

    /// 替换流描述
    fn change_description(
        &mut self,
        track: TrackId,
        index: u32,
        esd: &EsDescriptor,
    ) -> MuxResult<()>;

    /// 追加样本
    fn add_sample(&mut self, track: TrackId, description: u32, sample: Sample) -> MuxResult<()>;

    /// 追加影子同步样本
    fn add_shadow_sample(&mut self, track: TrackId, sample: Sample) -> MuxResult<()>;

    /// 设置编辑段, 起始时间相同的编辑段被替换
    fn set_edit_segment(&mut self, track: TrackId, segment: EditSegment) -> MuxResult<()>;

    /// 媒体时长 (媒体时间基)
    fn media_duration(&self, track: TrackId) -> MuxResult<u64>;

    /// 媒体时间基
    fn media_timescale(&self, track: TrackId) -> MuxResult<u32>;

    /// 影片时间基
    fn movie_timescale(&self) -> u32;

    /// 设置最后一个样本的时长
    fn set_last_sample_duration(&mut self, track: TrackId, duration: u32) -> MuxResult<()>;

    /// 将轨道登记到根对象描述符
    fn add_track_to_root_od(&mut self, track: TrackId) -> MuxResult<()>;

    /// 设置视觉尺寸
    fn set_visual_info(
        &mut self,
        track: TrackId,
        description: u32,
        width: u16,
        height: u16,
    ) -> MuxResult<()>;

    /// 设置 profile/level 指示
    fn set_pl_indication(&mut self, category: PlCategory, value: u8);

    /// 设置交织分组
    fn set_track_group(&mut self, track: TrackId, group: u32) -> MuxResult<()>;

    /// 设置根对象描述符 ID
    fn set_root_od_id(&mut self, od_id: u16);

    /// 设置根对象描述符 URL
    fn set_root_od_url(&mut self, url: &str);

    /// 向根对象描述符添加描述符
    fn add_root_od_descriptor(&mut self, descriptor: &GenericDescriptor);
}
