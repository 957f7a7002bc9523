//! OD 流编码.
//!
//! OD 命令中引用的媒体流在编码前逐个解析 (导入外部媒体, 建占位轨道等),
//! 命令随后移交给 OD 编码器, 每个访问单元编码为一个样本.

use std::path::Path;

use log::{debug, info};
use scenemux_codec::{CodecRegistry, Command, EsDescriptor, EsEntry, OdCommand};
use scenemux_core::{MediaCategory, MuxError, MuxResult, StreamType};
use scenemux_format::{Container, MediaImporter, PlCategory, Sample, es_id_of};

use crate::binding::{bind_stream, write_back};
use crate::context::SceneContext;
use crate::options::EncodeOptions;
use crate::resolver;
use crate::stats::BitrateStats;

/// 编码全部 OD 流
pub fn encode_od_streams(
    ctx: &mut SceneContext,
    container: &mut dyn Container,
    importer: &mut dyn MediaImporter,
    codecs: &CodecRegistry,
    options: &EncodeOptions,
) -> MuxResult<()> {
    if ctx.od_stream_count() == 0 {
        return Ok(());
    }
    ctx.check_od_binding()?;

    for index in 0..ctx.streams.len() {
        if ctx.streams[index].is_od() {
            encode_stream(ctx, container, importer, codecs, options, index)?;
        }
    }
    container.set_pl_indication(PlCategory::ObjectDescriptor, 1);
    Ok(())
}

fn encode_stream(
    ctx: &mut SceneContext,
    container: &mut dyn Container,
    importer: &mut dyn MediaImporter,
    codecs: &CodecRegistry,
    options: &EncodeOptions,
    index: usize,
) -> MuxResult<()> {
    let mut binding = bind_stream(ctx, index, StreamType::ObjectDescriptor, false);
    let timescale = ctx.streams[index].effective_timescale();
    let esd = &mut binding.esd;
    esd.sl_config_mut().timestamp_resolution = timescale;

    let stream = &mut ctx.streams[index];
    let track = container.new_track(stream.es_id, MediaCategory::ObjectDescriptor, timescale)?;
    stream.es_id.bind(es_id_of(track)?);
    esd.es_id = stream.es_id;
    container.set_track_enabled(track, true)?;

    let dc = esd.decoder_config_mut(StreamType::ObjectDescriptor);
    dc.avg_bitrate = 0;
    dc.max_bitrate = 0;
    dc.buffer_size_db = 0;

    let di = container.new_description(track, esd)?;
    if binding.root_bound {
        container.add_track_to_root_od(track)?;
    }

    let mut codec = codecs.create_od_encoder()?;
    let source = options.media_source.as_deref();
    let mut stats = BitrateStats::new(timescale);
    let mut init_offset = 0u64;
    let mut samples = 0usize;

    for (j, au) in stream.access_units.iter_mut().enumerate() {
        for mut command in au.commands.drain(..) {
            if let Command::Od(od) = &mut command {
                import_referenced(container, importer, od, source)?;
            }
            codec.add_command(command)?;
        }
        codec.encode()?;

        let timing = au.timing.resolve(timescale);
        if j == 0 {
            init_offset = timing;
        }
        let dts = timing.saturating_sub(init_offset);
        let data = codec.get_au()?;
        stats.record(dts, data.len());
        if !data.is_empty() {
            container.add_sample(track, di, Sample::new(dts, data, au.is_rap))?;
            samples += 1;
        }
    }

    if let Some(dc) = esd.decoder_config.as_mut() {
        stats.apply(dc);
    }
    container.change_description(track, di, esd)?;
    resolver::finalize(container, esd, init_offset)?;
    container.set_last_sample_duration(track, 0)?;
    info!(
        "OD 流 {} 写入 {} 个样本 (编码器 {})",
        esd.es_id,
        samples,
        codec.name()
    );
    write_back(ctx, binding);
    Ok(())
}

/// 解析 OD 命令引用的全部完整描述符
fn import_referenced(
    container: &mut dyn Container,
    importer: &mut dyn MediaImporter,
    command: &mut OdCommand,
    source: Option<&Path>,
) -> MuxResult<()> {
    match command {
        OdCommand::ObjectDescriptorUpdate(ods) => {
            for od in ods.iter_mut() {
                import_entries(container, importer, od.od_id, &mut od.es_descriptors, source)?;
            }
        }
        OdCommand::EsDescriptorUpdate { od_id, descriptors } => {
            import_entries(container, importer, *od_id, descriptors, source)?;
        }
        OdCommand::ObjectDescriptorRemove(_) | OdCommand::EsDescriptorRemove { .. } => {}
    }
    Ok(())
}

fn import_entries(
    container: &mut dyn Container,
    importer: &mut dyn MediaImporter,
    od_id: u16,
    entries: &mut [EsEntry],
    source: Option<&Path>,
) -> MuxResult<()> {
    for entry in entries.iter_mut() {
        match entry {
            EsEntry::Descriptor(esd) => import_descriptor(container, importer, esd, source)?,
            EsEntry::Reference { .. } | EsEntry::Include { .. } => {}
            EsEntry::Other { tag } => {
                return Err(MuxError::StructuralError {
                    od_id,
                    reason: format!("对象描述符中不允许出现标签 0x{:02X} 的描述符", tag),
                });
            }
        }
    }
    Ok(())
}

fn import_descriptor(
    container: &mut dyn Container,
    importer: &mut dyn MediaImporter,
    esd: &mut EsDescriptor,
    source: Option<&Path>,
) -> MuxResult<()> {
    let bound = resolver::resolve(container, importer, esd, source).map_err(|e| {
        MuxError::ImportFailure {
            es_id: esd.es_id.get(),
            reason: e.to_string(),
        }
    })?;
    debug!("OD 引用 ES {}: {:?}", esd.es_id, bound);
    resolver::finalize(container, esd, 0)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::context::{AccessUnit, StreamContext};
    use scenemux_codec::{EsId, MuxInfo, ObjectDescriptor};
    use scenemux_core::Timing;
    use scenemux_format::{IsoFile, RawImporter, TrackId};

    fn registry() -> CodecRegistry {
        let mut reg = CodecRegistry::new();
        scenemux_codec::register_all(&mut reg);
        reg
    }

    fn od_update(od_id: u16, entries: Vec<EsEntry>) -> Command {
        Command::Od(OdCommand::ObjectDescriptorUpdate(vec![ObjectDescriptor {
            od_id,
            url: None,
            es_descriptors: entries,
        }]))
    }

    fn od_stream(commands: Vec<Command>) -> StreamContext {
        let mut s = StreamContext::new(EsId::PENDING, StreamType::ObjectDescriptor, 1, 0);
        s.access_units
            .push(AccessUnit::new(Timing::Ticks(0), true, commands));
        s
    }

    fn encode(ctx: &mut SceneContext, file: &mut IsoFile) -> MuxResult<()> {
        encode_od_streams(
            ctx,
            file,
            &mut RawImporter::new(),
            &registry(),
            &EncodeOptions::default(),
        )
    }

    #[test]
    fn test_od_命令导入媒体() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.jpg");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"\xFF\xD8\xFF")
            .unwrap();
        let mut esd = EsDescriptor::synthesize(EsId::new(20), StreamType::Visual);
        esd.mux_info = Some(MuxInfo {
            file_name: Some(path.display().to_string()),
            ..MuxInfo::default()
        });

        let mut ctx = SceneContext::new();
        ctx.streams
            .push(od_stream(vec![od_update(10, vec![EsEntry::Descriptor(esd)])]));
        let mut file = IsoFile::new();
        encode(&mut ctx, &mut file).unwrap();

        let od_track = TrackId::from(ctx.streams[0].es_id.get());
        let t = file.track(od_track).unwrap();
        assert_eq!(t.samples.len(), 1);
        assert!(ctx.streams[0].access_units[0].commands.is_empty());
        let imported = file.track(20).unwrap();
        assert_eq!(imported.category, MediaCategory::Visual);
        assert_eq!(file.pl_indication(PlCategory::ObjectDescriptor), Some(1));
        assert!(file.root_od().tracks.contains(&od_track));
    }

    #[test]
    fn test_commands_imported_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut commands = Vec::new();
        for (od_id, (name, bytes)) in [("a.jpg", b"\xFF\xD8\xFF"), ("b.png", b"\x89PN")]
            .into_iter()
            .enumerate()
        {
            let path = dir.path().join(name);
            std::fs::File::create(&path).unwrap().write_all(bytes).unwrap();
            let mut esd = EsDescriptor::synthesize(EsId::PENDING, StreamType::Visual);
            esd.mux_info = Some(MuxInfo {
                file_name: Some(path.display().to_string()),
                ..MuxInfo::default()
            });
            commands.push(od_update(od_id as u16 + 1, vec![EsEntry::Descriptor(esd)]));
        }

        let mut ctx = SceneContext::new();
        ctx.streams.push(od_stream(commands));
        let mut file = IsoFile::new();
        encode(&mut ctx, &mut file).unwrap();

        assert!(ctx.streams[0].access_units[0].commands.is_empty());
        let tracks = file.tracks();
        assert_eq!(tracks.len(), 3);
        assert_eq!(tracks[0].category, MediaCategory::ObjectDescriptor);
        assert_eq!(&tracks[1].samples[0].data[..], b"\xFF\xD8\xFF");
        assert_eq!(&tracks[2].samples[0].data[..], b"\x89PN");
    }

    #[test]
    fn test_import_failure_tagged_with_es_id() {
        let mut esd = EsDescriptor::synthesize(EsId::new(21), StreamType::Visual);
        esd.mux_info = Some(MuxInfo {
            file_name: Some("/nonexistent/scenemux/missing.mp4".into()),
            ..MuxInfo::default()
        });
        let mut ctx = SceneContext::new();
        ctx.streams
            .push(od_stream(vec![od_update(10, vec![EsEntry::Descriptor(esd)])]));
        let err = encode(&mut ctx, &mut IsoFile::new());
        assert!(matches!(err, Err(MuxError::ImportFailure { es_id: 21, .. })));
    }

    #[test]
    fn test_structural_error_on_foreign_descriptor() {
        let mut ctx = SceneContext::new();
        ctx.streams.push(od_stream(vec![od_update(
            11,
            vec![EsEntry::Other { tag: 0x0B }],
        )]));
        let err = encode(&mut ctx, &mut IsoFile::new());
        assert!(matches!(err, Err(MuxError::StructuralError { od_id: 11, .. })));
    }

    #[test]
    fn test_references_pass_through() {
        let mut ctx = SceneContext::new();
        ctx.streams.push(od_stream(vec![od_update(
            12,
            vec![EsEntry::Reference {
                es_id: EsId::new(3),
            }],
        )]));
        let mut file = IsoFile::new();
        encode(&mut ctx, &mut file).unwrap();
        assert_eq!(file.tracks().len(), 1);
    }

    #[test]
    fn test_no_od_streams_is_noop() {
        let mut ctx = SceneContext::new();
        let mut file = IsoFile::new();
        encode(&mut ctx, &mut file).unwrap();
        assert!(file.pl_indication(PlCategory::ObjectDescriptor).is_none());
    }

    #[test]
    fn test_多个od流无根描述符() {
        let mut ctx = SceneContext::new();
        ctx.streams.push(od_stream(Vec::new()));
        ctx.streams.push(od_stream(Vec::new()));
        let mut file = IsoFile::new();
        let err = encode(&mut ctx, &mut file);
        assert!(matches!(err, Err(MuxError::AmbiguousBinding(_))));
        assert!(file.tracks().is_empty());
    }

    #[test]
    fn test_empty_au_dropped() {
        let mut ctx = SceneContext::new();
        let mut s = od_stream(vec![od_update(1, Vec::new())]);
        s.access_units
            .push(AccessUnit::new(Timing::Ticks(1000), false, Vec::new()));
        ctx.streams.push(s);
        let mut file = IsoFile::new();
        encode(&mut ctx, &mut file).unwrap();
        let t = file.track(TrackId::from(ctx.streams[0].es_id.get())).unwrap();
        assert_eq!(t.samples.len(), 1);
    }
}
