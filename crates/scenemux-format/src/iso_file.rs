//! 内存中的 ISO 媒体文件.
//!
//! 按轨道收集样本、影子样本、编辑段与流描述, 不负责盒结构的序列化.
//! 影片时间基固定为 600.

use std::collections::BTreeMap;

use log::debug;
use scenemux_codec::{EsDescriptor, EsId, GenericDescriptor};
use scenemux_core::{MediaCategory, MuxError, MuxResult};
use serde::Serialize;

use crate::container::{Container, EditSegment, PlCategory, Sample, TrackId};

/// 默认影片时间基
pub const DEFAULT_MOVIE_TIMESCALE: u32 = 600;

/// 轨道
#[derive(Debug, Clone)]
pub struct IsoTrack {
    /// 轨道 ID
    pub id: TrackId,
    /// 媒体类别
    pub category: MediaCategory,
    /// 媒体时间基
    pub timescale: u32,
    /// 是否启用
    pub enabled: bool,
    /// 流描述 (索引从 1 开始)
    pub descriptions: Vec<EsDescriptor>,
    /// 样本
    pub samples: Vec<Sample>,
    /// 影子同步样本
    pub shadow_samples: Vec<Sample>,
    /// 编辑段, 按起始时间排序
    pub edits: Vec<EditSegment>,
    /// 最后一个样本的显式时长
    pub last_sample_duration: Option<u32>,
    /// 交织分组
    pub group: u32,
    /// 视觉尺寸
    pub visual_size: Option<(u16, u16)>,
}

impl IsoTrack {
    fn new(id: TrackId, category: MediaCategory, timescale: u32) -> Self {
        Self {
            id,
            category,
            timescale,
            enabled: false,
            descriptions: Vec::new(),
            samples: Vec::new(),
            shadow_samples: Vec::new(),
            edits: Vec::new(),
            last_sample_duration: None,
            group: 0,
            visual_size: None,
        }
    }

    /// 媒体时长
    ///
    /// 最后一个样本的时长优先使用显式设置值, 否则沿用前一个样本间隔.
    pub fn media_duration(&self) -> u64 {
        let Some(last) = self.samples.last() else {
            return 0;
        };
        let last_duration = match self.last_sample_duration {
            Some(d) => u64::from(d),
            None => match self.samples.len() {
                n if n >= 2 => last.dts.saturating_sub(self.samples[n - 2].dts),
                _ => 0,
            },
        };
        last.dts + last_duration
    }

    /// 当前流描述
    pub fn description(&self) -> Option<&EsDescriptor> {
        self.descriptions.last()
    }

    fn description_slot(&mut self, index: u32) -> MuxResult<&mut EsDescriptor> {
        let id = self.id;
        index
            .checked_sub(1)
            .and_then(|i| self.descriptions.get_mut(i as usize))
            .ok_or_else(|| {
                MuxError::ContainerFailure(format!("轨道 {} 没有描述 {}", id, index))
            })
    }
}

/// 根对象描述符记录
#[derive(Debug, Clone, Default, Serialize)]
pub struct RootOdRecord {
    /// 对象描述符 ID
    pub od_id: u16,
    /// URL
    pub url: Option<String>,
    /// 登记的轨道
    pub tracks: Vec<TrackId>,
    /// 附加描述符
    pub descriptors: Vec<GenericDescriptor>,
}

/// 内存 ISO 媒体文件
#[derive(Debug, Clone)]
pub struct IsoFile {
    tracks: Vec<IsoTrack>,
    movie_timescale: u32,
    root_od: RootOdRecord,
    profiles: BTreeMap<PlCategory, u8>,
}

impl IsoFile {
    /// 创建空文件
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            movie_timescale: DEFAULT_MOVIE_TIMESCALE,
            root_od: RootOdRecord::default(),
            profiles: BTreeMap::new(),
        }
    }

    /// 全部轨道
    pub fn tracks(&self) -> &[IsoTrack] {
        &self.tracks
    }

    /// 按 ID 查找轨道
    pub fn track(&self, id: TrackId) -> Option<&IsoTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// 根对象描述符记录
    pub fn root_od(&self) -> &RootOdRecord {
        &self.root_od
    }

    /// profile/level 指示
    pub fn pl_indication(&self, category: PlCategory) -> Option<u8> {
        self.profiles.get(&category).copied()
    }

    fn track_mut(&mut self, id: TrackId) -> MuxResult<&mut IsoTrack> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| MuxError::ContainerFailure(format!("轨道 {} 不存在", id)))
    }

    fn track_ref(&self, id: TrackId) -> MuxResult<&IsoTrack> {
        self.track(id)
            .ok_or_else(|| MuxError::ContainerFailure(format!("轨道 {} 不存在", id)))
    }

    fn next_track_id(&self) -> TrackId {
        self.tracks.iter().map(|t| t.id).max().unwrap_or(0) + 1
    }

    /// 生成可序列化的报告
    pub fn report(&self) -> ContainerReport {
        ContainerReport {
            movie_timescale: self.movie_timescale,
            root_od: self.root_od.clone(),
            profiles: self.profiles.clone(),
            tracks: self.tracks.iter().map(TrackReport::from_track).collect(),
        }
    }
}

impl Default for IsoFile {
    fn default() -> Self {
        Self::new()
    }
}

impl Container for IsoFile {
    fn new_track(
        &mut self,
        es_id: EsId,
        category: MediaCategory,
        timescale: u32,
    ) -> MuxResult<TrackId> {
        if timescale == 0 {
            return Err(MuxError::ContainerFailure("轨道时间基不能为 0".into()));
        }
        let id = if es_id.is_pending() {
            self.next_track_id()
        } else {
            let requested = TrackId::from(es_id.get());
            if self.has_track(requested) {
                return Err(MuxError::ContainerFailure(format!("轨道 {} 已存在", requested)));
            }
            requested
        };
        debug!("新建轨道 {}: {} @ {}", id, category, timescale);
        self.tracks.push(IsoTrack::new(id, category, timescale));
        Ok(id)
    }

    fn has_track(&self, track: TrackId) -> bool {
        self.track(track).is_some()
    }

    fn set_track_enabled(&mut self, track: TrackId, enabled: bool) -> MuxResult<()> {
        self.track_mut(track)?.enabled = enabled;
        Ok(())
    }

    fn new_description(&mut self, track: TrackId, esd: &EsDescriptor) -> MuxResult<u32> {
        let t = self.track_mut(track)?;
        t.descriptions.push(esd.clone());
        Ok(t.descriptions.len() as u32)
    }

    fn change_description(
        &mut self,
        track: TrackId,
        index: u32,
        esd: &EsDescriptor,
    ) -> MuxResult<()> {
        *self.track_mut(track)?.description_slot(index)? = esd.clone();
        Ok(())
    }

    fn add_sample(&mut self, track: TrackId, description: u32, sample: Sample) -> MuxResult<()> {
        let t = self.track_mut(track)?;
        t.description_slot(description)?;
        if let Some(last) = t.samples.last() {
            if sample.dts <= last.dts {
                return Err(MuxError::ContainerFailure(format!(
                    "轨道 {} 样本 DTS 非递增: {} <= {}",
                    track, sample.dts, last.dts
                )));
            }
        }
        t.samples.push(sample);
        Ok(())
    }

    fn add_shadow_sample(&mut self, track: TrackId, sample: Sample) -> MuxResult<()> {
        let t = self.track_mut(track)?;
        t.shadow_samples.push(sample);
        Ok(())
    }

    fn set_edit_segment(&mut self, track: TrackId, segment: EditSegment) -> MuxResult<()> {
        let t = self.track_mut(track)?;
        match t.edits.iter_mut().find(|e| e.start == segment.start) {
            Some(existing) => *existing = segment,
            None => {
                t.edits.push(segment);
                t.edits.sort_by_key(|e| e.start);
            }
        }
        Ok(())
    }

    fn media_duration(&self, track: TrackId) -> MuxResult<u64> {
        Ok(self.track_ref(track)?.media_duration())
    }

    fn media_timescale(&self, track: TrackId) -> MuxResult<u32> {
        Ok(self.track_ref(track)?.timescale)
    }

    fn movie_timescale(&self) -> u32 {
        self.movie_timescale
    }

    fn set_last_sample_duration(&mut self, track: TrackId, duration: u32) -> MuxResult<()> {
        self.track_mut(track)?.last_sample_duration = Some(duration);
        Ok(())
    }

    fn add_track_to_root_od(&mut self, track: TrackId) -> MuxResult<()> {
        self.track_ref(track)?;
        if !self.root_od.tracks.contains(&track) {
            self.root_od.tracks.push(track);
        }
        Ok(())
    }

    fn set_visual_info(
        &mut self,
        track: TrackId,
        description: u32,
        width: u16,
        height: u16,
    ) -> MuxResult<()> {
        let t = self.track_mut(track)?;
        t.description_slot(description)?;
        t.visual_size = Some((width, height));
        Ok(())
    }

    fn set_pl_indication(&mut self, category: PlCategory, value: u8) {
        self.profiles.insert(category, value);
    }

    fn set_track_group(&mut self, track: TrackId, group: u32) -> MuxResult<()> {
        self.track_mut(track)?.group = group;
        Ok(())
    }

    fn set_root_od_id(&mut self, od_id: u16) {
        self.root_od.od_id = od_id;
    }

    fn set_root_od_url(&mut self, url: &str) {
        self.root_od.url = Some(url.to_owned());
    }

    fn add_root_od_descriptor(&mut self, descriptor: &GenericDescriptor) {
        self.root_od.descriptors.push(descriptor.clone());
    }
}

/// 轨道报告
#[derive(Debug, Clone, Serialize)]
pub struct TrackReport {
    /// 轨道 ID
    pub id: TrackId,
    /// handler 类型
    pub handler: &'static str,
    /// 媒体时间基
    pub timescale: u32,
    /// 是否启用
    pub enabled: bool,
    /// 样本数
    pub samples: usize,
    /// 随机访问样本数
    pub rap_samples: usize,
    /// 影子样本数
    pub shadow_samples: usize,
    /// 样本数据总字节数
    pub total_bytes: usize,
    /// 媒体时长
    pub media_duration: u64,
    /// 编辑段
    pub edits: Vec<EditSegment>,
    /// 交织分组
    pub group: u32,
    /// 依赖的基本流 ID
    pub depends_on: Option<u16>,
    /// 对象类型指示
    pub object_type_indication: Option<u8>,
    /// 平均码率
    pub avg_bitrate: Option<u32>,
    /// 最大码率
    pub max_bitrate: Option<u32>,
    /// 解码缓冲区大小
    pub buffer_size_db: Option<u32>,
    /// 视觉尺寸
    pub visual_size: Option<(u16, u16)>,
}

impl TrackReport {
    fn from_track(t: &IsoTrack) -> Self {
        let dc = t.description().and_then(|d| d.decoder_config.as_ref());
        Self {
            id: t.id,
            handler: t.category.handler(),
            timescale: t.timescale,
            enabled: t.enabled,
            samples: t.samples.len(),
            rap_samples: t.samples.iter().filter(|s| s.is_rap).count(),
            shadow_samples: t.shadow_samples.len(),
            total_bytes: t.samples.iter().map(|s| s.data.len()).sum(),
            media_duration: t.media_duration(),
            edits: t.edits.clone(),
            group: t.group,
            depends_on: t
                .description()
                .and_then(|d| d.depends_on)
                .map(EsId::get),
            object_type_indication: dc.map(|dc| dc.object_type_indication),
            avg_bitrate: dc.map(|dc| dc.avg_bitrate),
            max_bitrate: dc.map(|dc| dc.max_bitrate),
            buffer_size_db: dc.map(|dc| dc.buffer_size_db),
            visual_size: t.visual_size,
        }
    }
}

/// 容器报告
#[derive(Debug, Clone, Serialize)]
pub struct ContainerReport {
    /// 影片时间基
    pub movie_timescale: u32,
    /// 根对象描述符
    pub root_od: RootOdRecord,
    /// profile/level 指示
    pub profiles: BTreeMap<PlCategory, u8>,
    /// 轨道
    pub tracks: Vec<TrackReport>,
}
