//! 描述符解析.
//!
//! 为基本流描述符在容器中找到或创建对应的轨道:
//! - 带 URL 的远程引用只建占位轨道, 不含样本
//! - 交互流与时钟参考流建空轨道
//! - 带导入指令的描述符从外部媒体文件导入
//! - 其余描述符若已有同 ID 轨道则不做处理, 否则可从外部媒体源导入
//!
//! `finalize` 在样本写完之后补充起始偏移编辑段与交织分组.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use scenemux_codec::{
    Command, DecoderSpecificInfo, EsDescriptor, EsId, MuxInfo, OdCommand,
};
use scenemux_core::timing::rescale;
use scenemux_core::{MediaCategory, MuxError, MuxResult, StreamType};
use scenemux_format::{
    Container, EditMode, EditSegment, ImportRequest, MediaImporter, TrackId, TrackSelector,
    es_id_of,
};

use crate::context::StreamContext;

/// 占位轨道与空轨道使用的时间基
const PLACEHOLDER_TIMESCALE: u32 = 1000;

/// 解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundTrack {
    /// 远程引用的占位轨道
    Placeholder(TrackId),
    /// 交互流空轨道
    Interaction(TrackId),
    /// 时钟参考空轨道
    ClockReference(TrackId),
    /// 从外部媒体导入的轨道
    Imported(TrackId),
    /// 容器中已存在同 ID 的轨道
    AlreadyPresent(TrackId),
    /// 没有需要处理的内容
    Unbound,
}

impl BoundTrack {
    /// 关联的轨道
    pub fn track(self) -> Option<TrackId> {
        match self {
            Self::Placeholder(t)
            | Self::Interaction(t)
            | Self::ClockReference(t)
            | Self::Imported(t)
            | Self::AlreadyPresent(t) => Some(t),
            Self::Unbound => None,
        }
    }
}

/// 描述符 ID 对应的轨道 ID
pub(crate) fn track_of(es_id: EsId) -> TrackId {
    TrackId::from(es_id.get())
}

// ============================================================================
// 解析
// ============================================================================

/// 解析描述符, 必要时创建轨道并回填描述符 ID
///
/// `external_source` 只用于既没有导入指令、容器中也没有对应轨道的描述符.
pub fn resolve(
    container: &mut dyn Container,
    importer: &mut dyn MediaImporter,
    esd: &mut EsDescriptor,
    external_source: Option<&Path>,
) -> MuxResult<BoundTrack> {
    if esd.url.is_some() {
        return resolve_remote(container, esd);
    }

    if matches!(esd.dsi(), Some(DecoderSpecificInfo::Ui(_))) {
        if let Some(dc) = esd.decoder_config.as_mut() {
            dc.stream_type = StreamType::Interact;
        }
    }
    match esd.stream_type() {
        Some(StreamType::Interact) => return resolve_interaction(container, esd),
        Some(StreamType::ClockReference) => return resolve_clock(container, esd),
        _ => {}
    }

    let Some(mux) = esd.mux_info().cloned() else {
        return resolve_without_mux(container, importer, esd, external_source);
    };
    let Some(file_name) = mux.file_name.as_deref() else {
        return Ok(BoundTrack::Unbound);
    };
    import_file(container, importer, esd, &mux, file_name)
}

fn resolve_remote(container: &mut dyn Container, esd: &mut EsDescriptor) -> MuxResult<BoundTrack> {
    esd.sl_config_mut();
    let Some(stream_type) = esd.stream_type() else {
        return Err(MuxError::InvalidDescriptor(format!(
            "远程引用 ES {} 缺少解码器配置",
            esd.es_id
        )));
    };
    let category = MediaCategory::for_remote_stream(stream_type).ok_or_else(|| {
        MuxError::UnsupportedStreamType(format!("远程引用不支持 {} 流", stream_type))
    })?;
    let track = container.new_track(esd.es_id, category, PLACEHOLDER_TIMESCALE)?;
    esd.es_id.bind(es_id_of(track)?);
    container.new_description(track, esd)?;
    debug!(
        "远程引用 {} -> 占位轨道 {}",
        esd.url.as_deref().unwrap_or_default(),
        track
    );
    Ok(BoundTrack::Placeholder(track))
}

fn resolve_interaction(
    container: &mut dyn Container,
    esd: &mut EsDescriptor,
) -> MuxResult<BoundTrack> {
    let sl = esd.sl_config_mut();
    sl.predefined = 2;
    sl.timestamp_resolution = PLACEHOLDER_TIMESCALE;

    let es_id = esd.es_id;
    let Some(dc) = esd.decoder_config.as_mut() else {
        return Err(MuxError::InvalidDescriptor(format!(
            "交互流 ES {} 缺少解码器配置",
            es_id
        )));
    };
    match dc.decoder_specific_info.take() {
        Some(DecoderSpecificInfo::Raw(data)) => {
            dc.decoder_specific_info = Some(DecoderSpecificInfo::Raw(data));
        }
        Some(DecoderSpecificInfo::Ui(ui)) => {
            dc.decoder_specific_info = Some(DecoderSpecificInfo::Raw(ui.encode()));
        }
        Some(_) => {
            return Err(MuxError::InvalidDescriptor(format!(
                "交互流 ES {} 的解码器专用信息类型错误",
                es_id
            )));
        }
        None => {
            return Err(MuxError::InvalidDescriptor(format!(
                "交互流 ES {} 缺少解码器专用信息",
                es_id
            )));
        }
    }

    let track = container.new_track(esd.es_id, MediaCategory::Scene, PLACEHOLDER_TIMESCALE)?;
    container.set_track_enabled(track, true)?;
    esd.es_id.bind(es_id_of(track)?);
    container.new_description(track, esd)?;
    debug!("交互流 ES {} -> 轨道 {}", esd.es_id, track);
    Ok(BoundTrack::Interaction(track))
}

fn resolve_clock(container: &mut dyn Container, esd: &mut EsDescriptor) -> MuxResult<BoundTrack> {
    let track = container.new_track(
        esd.es_id,
        MediaCategory::ClockReference,
        PLACEHOLDER_TIMESCALE,
    )?;
    container.set_track_enabled(track, true)?;
    esd.es_id.bind(es_id_of(track)?);
    esd.sl_config_mut().predefined = 2;
    container.new_description(track, esd)?;

    let duration_ms = esd.mux_info().map_or(0, |m| m.duration_ms);
    if duration_ms > 0 {
        let duration = rescale(
            u64::from(duration_ms),
            1000,
            container.movie_timescale(),
        );
        container.set_edit_segment(
            track,
            EditSegment {
                start: 0,
                duration,
                media_time: 0,
                mode: EditMode::Normal,
            },
        )?;
    }
    debug!("时钟参考 ES {} -> 轨道 {}", esd.es_id, track);
    Ok(BoundTrack::ClockReference(track))
}

fn resolve_without_mux(
    container: &mut dyn Container,
    importer: &mut dyn MediaImporter,
    esd: &mut EsDescriptor,
    external_source: Option<&Path>,
) -> MuxResult<BoundTrack> {
    let existing = track_of(esd.es_id);
    if !esd.es_id.is_pending() && container.has_track(existing) {
        return Ok(BoundTrack::AlreadyPresent(existing));
    }
    let Some(path) = external_source else {
        return Ok(BoundTrack::Unbound);
    };

    let mut source = match importer.open(path) {
        Ok(source) => source,
        Err(e) => {
            warn!("无法打开外部媒体源 {}: {}, 跳过 ES {}", path.display(), e, esd.es_id);
            return Ok(BoundTrack::Unbound);
        }
    };
    let request = ImportRequest {
        target_es_id: esd.es_id,
        stream_type: esd.stream_type(),
        esd: Some(esd.clone()),
        ..ImportRequest::default()
    };
    let track = importer.import(container, &mut source, &request)?;
    esd.es_id.bind(es_id_of(track)?);
    info!("ES {} 从外部媒体源 {} 导入", esd.es_id, path.display());
    Ok(BoundTrack::Imported(track))
}

fn import_file(
    container: &mut dyn Container,
    importer: &mut dyn MediaImporter,
    esd: &mut EsDescriptor,
    mux: &MuxInfo,
    file_name: &str,
) -> MuxResult<BoundTrack> {
    let (path, selector) = split_source(file_name, esd.stream_type())?;
    let request = ImportRequest {
        target_es_id: esd.es_id,
        selector,
        format: mux.stream_format.clone(),
        duration_ms: mux.duration_ms,
        flags: mux.import_flags,
        frame_rate: mux.frame_rate,
        stream_type: esd.stream_type(),
        esd: Some(esd.clone()),
    };

    let track = {
        let mut source = importer.open(&path)?;
        importer.import(container, &mut source, &request)?
    };
    esd.es_id.bind(es_id_of(track)?);
    info!(
        "{} 导入为轨道 {} (导入器 {})",
        path.display(),
        track,
        importer.name()
    );

    if mux.delete_file {
        if let Err(e) = std::fs::remove_file(&path) {
            warn!("删除源文件 {} 失败: {}", path.display(), e);
        }
    }
    Ok(BoundTrack::Imported(track))
}

/// 拆分导入文件名中的子流选择后缀
///
/// - `clip.mp4#3`: 选择源文件中的轨道 3
/// - `clip.avi#video` / `clip.avi#audio`: 选择 AVI 中的视频/音频流
/// - 不带后缀的 `clip.avi`: 按声明的流类型选择视频或音频
pub fn split_source(
    file_name: &str,
    stream_type: Option<StreamType>,
) -> MuxResult<(PathBuf, Option<TrackSelector>)> {
    let Some(dot) = file_name.rfind('.') else {
        return Ok((PathBuf::from(file_name), None));
    };
    let ext = &file_name[dot..];
    let (ext_name, suffix) = match ext.find('#') {
        Some(hash) => (&ext[..hash], Some(&ext[hash + 1..])),
        None => (ext, None),
    };
    let path = PathBuf::from(&file_name[..dot + ext_name.len()]);

    if ext_name.eq_ignore_ascii_case(".avi") {
        let selector = match (suffix, stream_type) {
            (Some("video"), _) | (None, Some(StreamType::Visual)) => TrackSelector::Video,
            (Some("audio"), _) | (None, Some(StreamType::Audio)) => TrackSelector::Audio,
            _ => {
                return Err(MuxError::UnsupportedStreamType(format!(
                    "无法确定 {} 中要导入的流",
                    file_name
                )));
            }
        };
        return Ok((path, Some(selector)));
    }

    match suffix {
        None => Ok((path, None)),
        Some(id) => id
            .parse::<u32>()
            .map(|id| (path, Some(TrackSelector::Id(id))))
            .map_err(|_| {
                MuxError::UnsupportedStreamType(format!("无效的子流选择: {}", file_name))
            }),
    }
}

// ============================================================================
// 收尾
// ============================================================================

/// 写入起始偏移编辑段与交织分组
///
/// `extra_offset` 以轨道媒体时间基表示. 编辑段按起始时间覆盖, 重复调用结果相同.
pub fn finalize(
    container: &mut dyn Container,
    esd: &EsDescriptor,
    extra_offset: u64,
) -> MuxResult<()> {
    let mux = esd.mux_info();
    if mux.is_none() && extra_offset == 0 {
        return Ok(());
    }
    let track = track_of(esd.es_id);
    if esd.es_id.is_pending() || !container.has_track(track) {
        return Ok(());
    }

    let media_ts = container.media_timescale(track)?;
    let movie_ts = container.movie_timescale();
    let mut offset = extra_offset;
    if let Some(mux) = mux {
        offset += u64::from(mux.start_time_ms) * u64::from(media_ts) / 1000;
    }

    if offset > 0 {
        let start = rescale(offset, media_ts, movie_ts);
        let duration = rescale(container.media_duration(track)?, media_ts, movie_ts);
        container.set_edit_segment(
            track,
            EditSegment {
                start: 0,
                duration: start,
                media_time: 0,
                mode: EditMode::Empty,
            },
        )?;
        container.set_edit_segment(
            track,
            EditSegment {
                start,
                duration,
                media_time: 0,
                mode: EditMode::Normal,
            },
        )?;
        debug!("轨道 {} 起始偏移 {} (影片时间基)", track, start);
    }

    if let Some(mux) = mux {
        if mux.group_id != 0 {
            container.set_track_group(track, mux.group_id)?;
        }
    }
    Ok(())
}

// ============================================================================
// 定位
// ============================================================================

/// 在 OD 流命令中查找指定 ID 的完整描述符
pub fn locate(streams: &[StreamContext], es_id: EsId) -> Option<&EsDescriptor> {
    if es_id.is_pending() {
        return None;
    }
    streams
        .iter()
        .filter(|s| s.is_od())
        .flat_map(|s| s.access_units.iter())
        .flat_map(|au| au.commands.iter())
        .filter_map(Command::as_od)
        .flat_map(OdCommand::es_descriptors)
        .find(|esd| esd.es_id == es_id)
}

/// 可变版本的 [`locate`]
pub fn locate_mut(streams: &mut [StreamContext], es_id: EsId) -> Option<&mut EsDescriptor> {
    if es_id.is_pending() {
        return None;
    }
    streams
        .iter_mut()
        .filter(|s| s.is_od())
        .flat_map(|s| s.access_units.iter_mut())
        .flat_map(|au| au.commands.iter_mut())
        .filter_map(Command::as_od_mut)
        .flat_map(OdCommand::es_descriptors_mut)
        .find(|esd| esd.es_id == es_id)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::context::AccessUnit;
    use scenemux_codec::{DecoderConfig, EsEntry, ObjectDescriptor, UiConfig};
    use scenemux_core::Timing;
    use scenemux_format::{IsoFile, RawImporter};

    fn esd_of(es_id: u16, stream_type: StreamType) -> EsDescriptor {
        EsDescriptor::synthesize(EsId::new(es_id), stream_type)
    }

    #[test]
    fn test_远程引用建占位轨道() {
        let mut file = IsoFile::new();
        let mut esd = esd_of(0, StreamType::Visual);
        esd.url = Some("http://example.com/video.mp4".into());
        esd.sl_config = None;
        let bound = resolve(&mut file, &mut RawImporter::new(), &mut esd, None).unwrap();
        let BoundTrack::Placeholder(track) = bound else {
            panic!("期望占位轨道, 实际 {:?}", bound);
        };
        let t = file.track(track).unwrap();
        assert_eq!(t.category, MediaCategory::Visual);
        assert_eq!(t.timescale, 1000);
        assert!(t.samples.is_empty());
        assert!(!t.enabled);
        assert_eq!(esd.es_id, EsId::new(track as u16));
        assert!(esd.sl_config.is_some());
    }

    #[test]
    fn test_remote_without_decoder_config() {
        let mut file = IsoFile::new();
        let mut esd = esd_of(3, StreamType::Visual);
        esd.url = Some("rtsp://host/stream".into());
        esd.decoder_config = None;
        let err = resolve(&mut file, &mut RawImporter::new(), &mut esd, None);
        assert!(matches!(err, Err(MuxError::InvalidDescriptor(_))));
    }

    #[test]
    fn test_remote_od_stream_unsupported() {
        let mut file = IsoFile::new();
        let mut esd = esd_of(3, StreamType::ObjectDescriptor);
        esd.url = Some("od.mp4".into());
        let err = resolve(&mut file, &mut RawImporter::new(), &mut esd, None);
        assert!(matches!(err, Err(MuxError::UnsupportedStreamType(_))));
    }

    #[test]
    fn test_ui_config_becomes_interaction_track() {
        let mut file = IsoFile::new();
        let mut esd = esd_of(7, StreamType::Visual);
        esd.decoder_config_mut(StreamType::Visual).decoder_specific_info =
            Some(DecoderSpecificInfo::Ui(UiConfig {
                device_name: "Mouse".into(),
                ..UiConfig::default()
            }));
        let bound = resolve(&mut file, &mut RawImporter::new(), &mut esd, None).unwrap();
        assert_eq!(bound, BoundTrack::Interaction(7));
        assert_eq!(esd.stream_type(), Some(StreamType::Interact));
        assert!(matches!(esd.dsi(), Some(DecoderSpecificInfo::Raw(_))));
        assert_eq!(esd.timestamp_resolution(), 1000);
        assert!(file.track(7).unwrap().enabled);
    }

    #[test]
    fn test_interaction_requires_dsi() {
        let mut file = IsoFile::new();
        let mut esd = esd_of(7, StreamType::Interact);
        let err = resolve(&mut file, &mut RawImporter::new(), &mut esd, None);
        assert!(matches!(err, Err(MuxError::InvalidDescriptor(_))));
        assert!(file.tracks().is_empty());
    }

    #[test]
    fn test_时钟参考带时长编辑段() {
        let mut file = IsoFile::new();
        let mut esd = esd_of(0, StreamType::ClockReference);
        esd.mux_info = Some(MuxInfo {
            duration_ms: 2000,
            ..MuxInfo::default()
        });
        let bound = resolve(&mut file, &mut RawImporter::new(), &mut esd, None).unwrap();
        let track = bound.track().unwrap();
        let t = file.track(track).unwrap();
        assert_eq!(t.category, MediaCategory::ClockReference);
        assert_eq!(t.edits.len(), 1);
        assert_eq!(t.edits[0].duration, 1200);
        assert_eq!(t.edits[0].mode, EditMode::Normal);
    }

    #[test]
    fn test_existing_track_is_noop() {
        let mut file = IsoFile::new();
        file.new_track(EsId::new(4), MediaCategory::Audio, 44100)
            .unwrap();
        let mut esd = esd_of(4, StreamType::Audio);
        let bound = resolve(&mut file, &mut RawImporter::new(), &mut esd, None).unwrap();
        assert_eq!(bound, BoundTrack::AlreadyPresent(4));
        assert_eq!(file.tracks().len(), 1);
    }

    #[test]
    fn test_missing_external_source_is_skipped() {
        let mut file = IsoFile::new();
        let mut esd = esd_of(4, StreamType::Audio);
        let missing = Path::new("/nonexistent/scenemux/source.bin");
        let bound = resolve(&mut file, &mut RawImporter::new(), &mut esd, Some(missing)).unwrap();
        assert_eq!(bound, BoundTrack::Unbound);
    }

    #[test]
    fn test_导入并删除源文件() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"\x89PNG")
            .unwrap();

        let mut file = IsoFile::new();
        let mut esd = esd_of(0, StreamType::Visual);
        esd.mux_info = Some(MuxInfo {
            file_name: Some(format!("{}#1", path.display())),
            delete_file: true,
            ..MuxInfo::default()
        });
        let bound = resolve(&mut file, &mut RawImporter::new(), &mut esd, None).unwrap();
        let track = bound.track().unwrap();
        assert_eq!(esd.es_id, EsId::new(track as u16));
        assert_eq!(file.track(track).unwrap().samples.len(), 1);
        assert!(!path.exists());
    }

    #[test]
    fn test_mux_without_file_name() {
        let mut file = IsoFile::new();
        let mut esd = esd_of(5, StreamType::Visual);
        esd.mux_info = Some(MuxInfo::default());
        let bound = resolve(&mut file, &mut RawImporter::new(), &mut esd, None).unwrap();
        assert_eq!(bound, BoundTrack::Unbound);
    }

    #[test]
    fn test_split_source() {
        assert_eq!(
            split_source("clip.mp4#3", None).unwrap(),
            (PathBuf::from("clip.mp4"), Some(TrackSelector::Id(3)))
        );
        assert_eq!(
            split_source("clip.mp4", None).unwrap(),
            (PathBuf::from("clip.mp4"), None)
        );
        assert_eq!(
            split_source("movie.avi#audio", None).unwrap(),
            (PathBuf::from("movie.avi"), Some(TrackSelector::Audio))
        );
        assert_eq!(
            split_source("movie.avi", Some(StreamType::Visual)).unwrap(),
            (PathBuf::from("movie.avi"), Some(TrackSelector::Video))
        );
        assert!(matches!(
            split_source("movie.avi", Some(StreamType::Text)),
            Err(MuxError::UnsupportedStreamType(_))
        ));
        assert!(matches!(
            split_source("clip.mp4#abc", None),
            Err(MuxError::UnsupportedStreamType(_))
        ));
    }

    #[test]
    fn test_finalize_idempotent() {
        let mut file = IsoFile::new();
        let track = file
            .new_track(EsId::new(1), MediaCategory::Scene, 1000)
            .unwrap();
        let mut esd = esd_of(1, StreamType::Scene);
        let di = file.new_description(track, &esd).unwrap();
        for dts in [0, 1000, 2000] {
            file.add_sample(
                track,
                di,
                scenemux_format::Sample::new(dts, vec![1u8], true),
            )
            .unwrap();
        }
        esd.mux_info = Some(MuxInfo {
            start_time_ms: 500,
            group_id: 3,
            ..MuxInfo::default()
        });
        finalize(&mut file, &esd, 500).unwrap();
        let first = file.track(track).unwrap().edits.clone();
        finalize(&mut file, &esd, 500).unwrap();
        let t = file.track(track).unwrap();
        assert_eq!(t.edits, first);
        assert_eq!(t.edits.len(), 2);
        assert_eq!(t.edits[0].mode, EditMode::Empty);
        assert_eq!(t.edits[0].duration, 600);
        assert_eq!(t.edits[1].start, 600);
        assert_eq!(t.group, 3);
    }

    #[test]
    fn test_finalize_without_offset_is_noop() {
        let mut file = IsoFile::new();
        let track = file
            .new_track(EsId::new(1), MediaCategory::Scene, 1000)
            .unwrap();
        finalize(&mut file, &esd_of(1, StreamType::Scene), 0).unwrap();
        assert!(file.track(track).unwrap().edits.is_empty());
    }

    #[test]
    fn test_locate_descriptor_in_od_update() {
        let mut od_stream = StreamContext::new(EsId::new(2), StreamType::ObjectDescriptor, 1, 0);
        od_stream.access_units.push(AccessUnit::new(
            Timing::Ticks(0),
            true,
            vec![Command::Od(OdCommand::ObjectDescriptorUpdate(vec![
                ObjectDescriptor {
                    od_id: 10,
                    url: None,
                    es_descriptors: vec![
                        EsEntry::Reference {
                            es_id: EsId::new(9),
                        },
                        EsEntry::Descriptor(esd_of(20, StreamType::Audio)),
                    ],
                },
            ]))],
        ));
        let mut streams = vec![od_stream];
        assert!(locate(&streams, EsId::new(20)).is_some());
        assert!(locate(&streams, EsId::new(9)).is_none());
        assert!(locate(&streams, EsId::PENDING).is_none());

        let esd = locate_mut(&mut streams, EsId::new(20)).unwrap();
        esd.decoder_config = Some(DecoderConfig::new(StreamType::Visual));
        assert_eq!(
            locate(&streams, EsId::new(20)).unwrap().stream_type(),
            Some(StreamType::Visual)
        );
    }
}
