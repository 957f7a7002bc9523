//! 整文件导入器.
//!
//! 把源文件的全部内容作为一个随机访问样本导入, 适用于图像、脚本等单帧媒体.
//! 源文件视为只有一条轨道 (ID 1).

use std::io::Read;

use bytes::Bytes;
use log::{debug, info};
use scenemux_codec::{EsDescriptor, ImportFlags};
use scenemux_core::{MediaCategory, MuxError, MuxResult, StreamType};

use crate::container::{Container, Sample, TrackId, es_id_of};
use crate::importer::{ImportRequest, MediaImporter, MediaSource, TrackSelector};

/// 导入轨道的时间基
const RAW_TIMESCALE: u32 = 1000;

/// 整文件导入器
#[derive(Debug, Default)]
pub struct RawImporter;

impl RawImporter {
    /// 创建导入器
    pub fn new() -> Self {
        Self
    }

    fn category_for(request: &ImportRequest) -> MuxResult<MediaCategory> {
        let stream_type = request
            .stream_type
            .or_else(|| request.esd.as_ref().and_then(EsDescriptor::stream_type))
            .unwrap_or(StreamType::Visual);
        let category = MediaCategory::for_remote_stream(stream_type).ok_or_else(|| {
            MuxError::UnsupportedStreamType(format!("无法整文件导入 {} 流", stream_type))
        })?;
        match request.selector {
            None | Some(TrackSelector::Id(1)) => Ok(category),
            Some(TrackSelector::Video) if category == MediaCategory::Visual => Ok(category),
            Some(TrackSelector::Audio) if category == MediaCategory::Audio => Ok(category),
            Some(selector) => Err(MuxError::UnsupportedStreamType(format!(
                "源文件中没有匹配 {:?} 的轨道",
                selector
            ))),
        }
    }
}

impl MediaImporter for RawImporter {
    fn name(&self) -> &str {
        "raw"
    }

    fn import(
        &mut self,
        dest: &mut dyn Container,
        source: &mut MediaSource,
        request: &ImportRequest,
    ) -> MuxResult<TrackId> {
        let category = Self::category_for(request)?;
        let mut data = Vec::new();
        source.file_mut().read_to_end(&mut data)?;
        if data.is_empty() {
            return Err(MuxError::InvalidData(format!(
                "源文件 {} 为空",
                source.path().display()
            )));
        }

        let track = dest.new_track(request.target_es_id, category, RAW_TIMESCALE)?;
        let track_es_id = es_id_of(track)?;
        let mut esd = match &request.esd {
            Some(esd) => esd.clone(),
            None => EsDescriptor::synthesize(
                track_es_id,
                request.stream_type.unwrap_or(StreamType::Visual),
            ),
        };
        esd.es_id = track_es_id;
        esd.mux_info = None;
        esd.sl_config_mut().timestamp_resolution = RAW_TIMESCALE;

        let di = dest.new_description(track, &esd)?;
        if request.flags.contains(ImportFlags::USE_DATAREF) {
            debug!("{}: 数据引用模式, 仍复制数据", source.path().display());
        }
        let size = data.len();
        dest.add_sample(track, di, Sample::new(0, Bytes::from(data), true))?;
        if request.duration_ms > 0 {
            dest.set_last_sample_duration(track, request.duration_ms)?;
        }
        dest.set_track_enabled(track, true)?;
        info!(
            "已导入 {} -> 轨道 {} ({}, {} 字节)",
            source.path().display(),
            track,
            category,
            size
        );
        Ok(track)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::iso_file::IsoFile;
    use scenemux_codec::EsId;

    fn source_with(bytes: &[u8]) -> (tempfile::NamedTempFile, MediaSource) {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(bytes).unwrap();
        let src = MediaSource::open(tmp.path()).unwrap();
        (tmp, src)
    }

    #[test]
    fn test_整文件导入为单个样本() {
        let (_tmp, mut src) = source_with(b"jpegdata");
        let mut file = IsoFile::new();
        let request = ImportRequest {
            target_es_id: EsId::new(12),
            duration_ms: 2000,
            stream_type: Some(StreamType::Visual),
            ..ImportRequest::default()
        };
        let track = RawImporter::new()
            .import(&mut file, &mut src, &request)
            .unwrap();
        assert_eq!(track, 12);
        let t = file.track(track).unwrap();
        assert_eq!(t.samples.len(), 1);
        assert!(t.samples[0].is_rap);
        assert_eq!(t.media_duration(), 2000);
        assert_eq!(t.description().unwrap().es_id, EsId::new(12));
    }

    #[test]
    fn test_selector_mismatch_is_unsupported() {
        let (_tmp, mut src) = source_with(b"pcm");
        let mut file = IsoFile::new();
        let request = ImportRequest {
            selector: Some(TrackSelector::Video),
            stream_type: Some(StreamType::Audio),
            ..ImportRequest::default()
        };
        let err = RawImporter::new().import(&mut file, &mut src, &request);
        assert!(matches!(err, Err(MuxError::UnsupportedStreamType(_))));
        assert!(file.tracks().is_empty());
    }

    #[test]
    fn test_empty_source_rejected() {
        let (_tmp, mut src) = source_with(b"");
        let mut file = IsoFile::new();
        let err = RawImporter::new().import(&mut file, &mut src, &ImportRequest::default());
        assert!(matches!(err, Err(MuxError::InvalidData(_))));
    }
}
