//! 场景流编码.
//!
//! 一次调用处理一个编码族 (BIFS 或 LASeR) 的全部场景流:
//! 绑定描述符, 协商编码配置, 逐个访问单元编码写入轨道,
//! 按需生成周期性随机访问点, 最后写回码率统计与描述符.

use std::fs::OpenOptions;
use std::io::BufWriter;
use std::path::Path;

use log::{debug, info};
use scenemux_codec::{
    BifsConfig, CodecRegistry, Command, DecoderSpecificInfo, EsDescriptor, EsId, IdBounds,
    LaserConfig, SceneEncoder, SceneFamily, SceneStreamConfig, TraceSink,
};
use scenemux_core::bitwriter::bit_size;
use scenemux_core::{MediaCategory, MuxError, MuxResult, StreamType};
use scenemux_format::{Container, MediaImporter, PlCategory, Sample, TrackId, es_id_of};

use crate::binding::{Binding, bind_stream, write_back};
use crate::context::SceneContext;
use crate::options::{EncodeOptions, RapMode};
use crate::resolver::{self, BoundTrack};
use crate::stats::BitrateStats;

/// 以追加方式打开跟踪日志
pub(crate) fn open_trace(path: Option<&Path>) -> MuxResult<Option<TraceSink>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Some(Box::new(BufWriter::new(file))))
}

/// 编码一个编码族的全部场景流
pub fn encode_scene_streams(
    ctx: &mut SceneContext,
    container: &mut dyn Container,
    importer: &mut dyn MediaImporter,
    codecs: &CodecRegistry,
    family: SceneFamily,
    options: &EncodeOptions,
) -> MuxResult<()> {
    ctx.check_od_binding()?;

    let trace = open_trace(options.trace_log.as_deref())?;
    let mut codec = codecs.create_scene_encoder(family)?;
    if let Some(sink) = trace {
        codec.set_trace(sink);
    }

    let mut pass = ScenePass {
        family,
        options,
        bounds: ctx.observed_id_bounds(),
        first_es_id: None,
        codec,
    };
    for index in 0..ctx.streams.len() {
        let stream = &ctx.streams[index];
        if !stream.is_scene() || !family.accepts(stream.object_type) {
            continue;
        }
        pass.encode_stream(ctx, container, importer, index)?;
    }

    container.set_pl_indication(PlCategory::Scene, 1);
    container.set_pl_indication(PlCategory::Graphics, 1);
    Ok(())
}

struct ScenePass<'a> {
    family: SceneFamily,
    options: &'a EncodeOptions,
    bounds: IdBounds,
    first_es_id: Option<EsId>,
    codec: Box<dyn SceneEncoder>,
}

impl ScenePass<'_> {
    fn encode_stream(
        &mut self,
        ctx: &mut SceneContext,
        container: &mut dyn Container,
        importer: &mut dyn MediaImporter,
        index: usize,
    ) -> MuxResult<()> {
        let mut binding = bind_stream(ctx, index, StreamType::Scene, true);
        normalize_access_units(ctx, index);

        if ctx.streams[index].access_units.is_empty() && binding.esd.url.is_none() {
            return self.pass_through(ctx, container, importer, binding);
        }

        let timescale = ctx.streams[index].effective_timescale();
        let (track, di) = self.setup_track(ctx, container, index, &mut binding, timescale)?;

        if binding.esd.url.is_some() {
            debug!("场景流 {} 为远程引用, 不写入样本", binding.esd.es_id);
            write_back(ctx, binding);
            return Ok(());
        }

        let es_id = binding.esd.es_id;
        let rap_mode = self.options.rap_mode();
        let rap_delay = self.options.rap_delay(timescale);
        let mut stats = BitrateStats::new(timescale);
        let mut init_offset = 0u64;
        let mut last_rap = 0u64;
        let mut samples = 0usize;

        let SceneContext { graph, streams, .. } = &mut *ctx;
        let stream = &mut streams[index];
        for (j, au) in stream.access_units.iter_mut().enumerate() {
            let timing = au.timing.resolve(timescale);
            if j == 0 {
                init_offset = timing;
            }
            let dts = timing.saturating_sub(init_offset);
            let mut is_rap = au.is_rap;
            if is_rap {
                last_rap = dts;
            }

            let data = if rap_mode == RapMode::Inband {
                graph.apply_list(&au.commands);
                if dts.saturating_sub(last_rap) < rap_delay {
                    self.codec.encode_au(es_id, &au.commands)?
                } else {
                    is_rap = true;
                    last_rap = dts;
                    self.codec.get_rap(es_id, graph)?
                }
            } else {
                self.codec.encode_au(es_id, &au.commands)?
            };

            stats.record(dts, data.len());
            if !data.is_empty() {
                container.add_sample(track, di, Sample::new(dts, data, is_rap))?;
                samples += 1;
            }
        }

        if rap_mode == RapMode::Shadow {
            let mut last_rap = 0u64;
            for (j, au) in stream.access_units.iter_mut().enumerate() {
                graph.apply_list(&au.commands);
                let timing = au.timing.resolve(timescale);
                if j == 0 || timing.saturating_sub(last_rap) < rap_delay {
                    continue;
                }
                last_rap = timing;
                let data = self.codec.get_rap(es_id, graph)?;
                let dts = timing.saturating_sub(init_offset);
                container.add_shadow_sample(track, Sample::new(dts, data, true))?;
            }
        }

        if let Some(dc) = binding.esd.decoder_config.as_mut() {
            stats.apply(dc);
        }
        container.change_description(track, di, &binding.esd)?;
        resolver::finalize(container, &binding.esd, init_offset)?;
        container.set_last_sample_duration(track, 0)?;
        info!(
            "{} 场景流 {} 写入 {} 个样本, 平均码率 {} bit/s",
            self.family,
            es_id,
            samples,
            stats.avg_bitrate()
        );
        write_back(ctx, binding);
        Ok(())
    }

    /// 没有访问单元的场景流: 不在根描述符下的交给 OD 阶段, 其余按普通描述符解析
    fn pass_through(
        &mut self,
        ctx: &mut SceneContext,
        container: &mut dyn Container,
        importer: &mut dyn MediaImporter,
        mut binding: Binding,
    ) -> MuxResult<()> {
        if !binding.root_bound {
            debug!("场景流 {} 不在根描述符下, 留给 OD 阶段", binding.esd.es_id);
            return Ok(());
        }
        let bound = resolver::resolve(container, importer, &mut binding.esd, None)?;
        resolver::finalize(container, &binding.esd, 0)?;
        if let Some(track) = bound.track() {
            container.add_track_to_root_od(track)?;
        }
        if bound == BoundTrack::Unbound {
            debug!("场景流 {} 没有可写入的内容", binding.esd.es_id);
        }
        write_back(ctx, binding);
        Ok(())
    }

    fn setup_track(
        &mut self,
        ctx: &mut SceneContext,
        container: &mut dyn Container,
        index: usize,
        binding: &mut Binding,
        timescale: u32,
    ) -> MuxResult<(TrackId, u32)> {
        let esd = &mut binding.esd;
        esd.sl_config_mut().timestamp_resolution = timescale;
        esd.decoder_config_mut(StreamType::Scene).stream_type = StreamType::Scene;

        let stream = &mut ctx.streams[index];
        let track = container.new_track(stream.es_id, MediaCategory::Scene, timescale)?;
        container.set_track_enabled(track, true)?;
        stream.es_id.bind(es_id_of(track)?);
        esd.es_id = stream.es_id;

        match self.first_es_id {
            None => {
                esd.depends_on = None;
                self.first_es_id = Some(esd.es_id);
            }
            Some(first) => esd.depends_on = Some(first),
        }

        let config = self.stream_config(esd, stream.object_type, ctx)?;
        self.codec
            .new_stream(esd.es_id, &config, self.options.use_names())?;
        let (dsi, oti) = self.codec.get_config(esd.es_id)?;
        let dc = esd.decoder_config_mut(StreamType::Scene);
        dc.decoder_specific_info = Some(DecoderSpecificInfo::Raw(dsi));
        dc.object_type_indication = oti;
        dc.avg_bitrate = 0;
        dc.max_bitrate = 0;
        dc.buffer_size_db = 0;

        let di = container.new_description(track, esd)?;
        if binding.root_bound {
            container.add_track_to_root_od(track)?;
            if ctx.scene_width > 0 && ctx.scene_height > 0 {
                container.set_visual_info(track, di, ctx.scene_width, ctx.scene_height)?;
            }
        }
        debug!(
            "{} 场景流 {} -> 轨道 {} (依赖 {:?})",
            self.family, esd.es_id, track, esd.depends_on
        );
        Ok((track, di))
    }

    fn stream_config(
        &self,
        esd: &EsDescriptor,
        object_type: u8,
        ctx: &SceneContext,
    ) -> MuxResult<SceneStreamConfig> {
        match self.family {
            SceneFamily::Bifs => {
                let mut cfg = match esd.dsi() {
                    Some(DecoderSpecificInfo::Bifs(cfg)) => cfg.clone(),
                    Some(DecoderSpecificInfo::Raw(data) | DecoderSpecificInfo::Text(data)) => {
                        BifsConfig::parse(data, object_type).map_err(|e| {
                            MuxError::InvalidDescriptor(format!(
                                "场景流 {} 的 BIFS 配置无法解析: {}",
                                esd.es_id, e
                            ))
                        })?
                    }
                    // 没有 DSI 时 OTI 2 固定为版本 2, 其余由编码器决定
                    _ => BifsConfig {
                        version: if object_type == 2 { 2 } else { 0 },
                        ..BifsConfig::default()
                    },
                };
                let node_bits = bit_size(self.bounds.max_node_id);
                if cfg.node_id_bits < node_bits {
                    cfg.node_id_bits = node_bits;
                }
                if cfg.node_id_bits == 0 {
                    cfg.node_id_bits = 1;
                }
                cfg.route_id_bits = bit_size(self.bounds.max_route_id);
                cfg.proto_id_bits = bit_size(self.bounds.max_proto_id);
                if cfg.elementary_masks.is_empty() {
                    cfg.pixel_metrics = ctx.pixel_metrics;
                    cfg.pixel_width = ctx.scene_width;
                    cfg.pixel_height = ctx.scene_height;
                }
                Ok(SceneStreamConfig::Bifs(cfg))
            }
            SceneFamily::Laser => {
                let mut cfg = match esd.dsi() {
                    Some(DecoderSpecificInfo::Laser(cfg)) => cfg.clone(),
                    Some(DecoderSpecificInfo::Raw(data)) => {
                        LaserConfig::parse(data).map_err(|e| {
                            MuxError::InvalidDescriptor(format!(
                                "场景流 {} 的 LASeR 配置无法解析: {}",
                                esd.es_id, e
                            ))
                        })?
                    }
                    _ => LaserConfig::default(),
                };
                if self.options.use_names() {
                    cfg.has_string_ids = true;
                }
                Ok(SceneStreamConfig::Laser(cfg))
            }
        }
    }
}

/// 规范化访问单元
///
/// - 唯一访问单元中只有一条空场景替换时, 视为没有访问单元
/// - 零时刻的首个访问单元有多条命令且第一条为空场景替换时, 移除这一条
fn normalize_access_units(ctx: &mut SceneContext, index: usize) {
    let aus = &mut ctx.streams[index].access_units;
    let placeholder = aus.len() == 1
        && aus[0].commands.len() == 1
        && aus[0].commands[0].is_null_replace();
    if placeholder {
        aus.clear();
        return;
    }
    if let Some(first) = aus.first_mut() {
        if first.timing.is_zero()
            && first.commands.len() > 1
            && first.commands[0].is_null_replace()
        {
            first.commands.remove(0);
        }
    }
}
