//! 字幕预处理.
//!
//! OD 流中带 `text_node` 导入指令的描述符不会导入为媒体轨道,
//! 而是把字幕文件转换为对场景中文本节点的字段替换命令, 注入目标场景流.
//! 转换完成后描述符上的导入指令被移除.
//!
//! 目标场景流: ID 等于描述符 `depends_on` 的场景流, 否则为第一个场景流.

use std::collections::BTreeMap;

use log::{debug, info};
use scenemux_codec::{
    Command, DecoderSpecificInfo, EsDescriptor, FieldValue, MuxInfo, SceneCommand, SceneGraph,
};
use scenemux_core::{MuxError, MuxResult, Timing};

use crate::context::{AccessUnit, SceneContext, StreamContext};

/// 字幕转换器 trait
pub trait SubtitleImporter {
    /// 转换器名称
    fn name(&self) -> &str;

    /// 把字幕文件转换为场景访问单元
    ///
    /// 返回的访问单元按时间排序, 时间以目标流时间基 tick 表示.
    fn convert(
        &mut self,
        esd: &EsDescriptor,
        mux: &MuxInfo,
        graph: &SceneGraph,
        timescale: u32,
    ) -> MuxResult<Vec<AccessUnit>>;
}

// ============================================================================
// SRT 解析
// ============================================================================

/// 字体样式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CueStyle {
    /// 常规
    #[default]
    Plain,
    /// 粗体
    Bold,
    /// 斜体
    Italic,
    /// 粗斜体
    BoldItalic,
}

impl CueStyle {
    /// FontStyle 节点的 style 字段值
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Bold => "BOLD",
            Self::Italic => "ITALIC",
            Self::BoldItalic => "BOLDITALIC",
        }
    }
}

/// 一条 SRT 字幕
#[derive(Debug, Clone, PartialEq)]
pub struct SrtCue {
    /// 开始时间 (毫秒)
    pub start_ms: u64,
    /// 结束时间 (毫秒)
    pub end_ms: u64,
    /// 去除样式标签后的文本行
    pub lines: Vec<String>,
    /// 样式
    pub style: CueStyle,
}

/// 解析 `HH:MM:SS,mmm` 时间
fn parse_timestamp(s: &str) -> Option<u64> {
    let s = s.trim();
    let (hms, ms) = s.split_once([',', '.'])?;
    let mut parts = hms.split(':');
    let h: u64 = parts.next()?.trim().parse().ok()?;
    let m: u64 = parts.next()?.trim().parse().ok()?;
    let sec: u64 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let ms: u64 = ms.trim().parse().ok()?;
    Some(((h * 60 + m) * 60 + sec) * 1000 + ms)
}

/// 去除 `<b>` `<i>` 等标签, 同时记录样式
fn strip_tags(line: &str, style: &mut (bool, bool)) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let Some(close) = rest[open..].find('>') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let tag = rest[open + 1..open + close].trim().to_ascii_lowercase();
        match tag.as_str() {
            "b" => style.0 = true,
            "i" => style.1 = true,
            _ => {}
        }
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}

/// 解析 SRT 文本
pub fn parse_srt(text: &str) -> MuxResult<Vec<SrtCue>> {
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    let mut cues = Vec::new();
    let mut lines = text.lines().map(str::trim_end).enumerate().peekable();

    loop {
        while lines.peek().is_some_and(|(_, l)| l.trim().is_empty()) {
            lines.next();
        }
        let Some((mut line_no, mut line)) = lines.next() else {
            break;
        };
        if !line.contains("-->") {
            // 序号行
            let Some(next) = lines.next() else {
                break;
            };
            (line_no, line) = next;
        }
        let Some((start, end)) = line.split_once("-->") else {
            return Err(MuxError::InvalidData(format!(
                "SRT 第 {} 行缺少时间范围",
                line_no + 1
            )));
        };
        let (Some(start_ms), Some(end_ms)) = (parse_timestamp(start), parse_timestamp(end)) else {
            return Err(MuxError::InvalidData(format!(
                "SRT 第 {} 行时间格式错误: {}",
                line_no + 1,
                line
            )));
        };

        let mut style = (false, false);
        let mut text_lines = Vec::new();
        while let Some((_, l)) = lines.next_if(|(_, l)| !l.trim().is_empty()) {
            text_lines.push(strip_tags(l, &mut style));
        }
        let style = match style {
            (false, false) => CueStyle::Plain,
            (true, false) => CueStyle::Bold,
            (false, true) => CueStyle::Italic,
            (true, true) => CueStyle::BoldItalic,
        };
        cues.push(SrtCue {
            start_ms,
            end_ms: end_ms.max(start_ms),
            lines: text_lines,
            style,
        });
    }
    Ok(cues)
}

// ============================================================================
// SRT 转换器
// ============================================================================

/// SRT 字幕转换器
///
/// 每条字幕在开始时刻替换文本节点的 `string` 字段, 在结束时刻清空.
/// 指定了字体节点时同时替换其 `style` 字段.
#[derive(Debug, Default)]
pub struct SrtImporter;

impl SrtImporter {
    /// 创建转换器
    pub fn new() -> Self {
        Self
    }
}

fn named_node_id(graph: &SceneGraph, name: &str) -> MuxResult<u32> {
    match graph.find_node_by_name(name) {
        Some(node) if node.id != 0 => Ok(node.id),
        Some(_) => Err(MuxError::InvalidDescriptor(format!(
            "节点 {} 没有 ID, 无法作为字幕目标",
            name
        ))),
        None => Err(MuxError::InvalidDescriptor(format!(
            "场景中找不到节点 {}",
            name
        ))),
    }
}

impl SubtitleImporter for SrtImporter {
    fn name(&self) -> &str {
        "srt"
    }

    fn convert(
        &mut self,
        _esd: &EsDescriptor,
        mux: &MuxInfo,
        graph: &SceneGraph,
        timescale: u32,
    ) -> MuxResult<Vec<AccessUnit>> {
        let (Some(file_name), Some(text_node)) = (&mux.file_name, &mux.text_node) else {
            return Ok(Vec::new());
        };
        let text_id = named_node_id(graph, text_node)?;
        let font_id = mux
            .font_node
            .as_deref()
            .map(|name| named_node_id(graph, name))
            .transpose()?;

        let bytes = std::fs::read(file_name)?;
        let cues = parse_srt(&String::from_utf8_lossy(&bytes))?;

        let to_ticks = |ms: u64| ms * u64::from(timescale) / 1000;
        let set_text = |lines: Vec<String>| {
            Command::Scene(SceneCommand::FieldReplace {
                node_id: text_id,
                field: "string".into(),
                value: FieldValue::StrList(lines),
            })
        };

        // 同一时刻的清空命令先于下一条字幕的设置命令
        let mut timeline: BTreeMap<u64, Vec<Command>> = BTreeMap::new();
        for cue in &cues {
            timeline
                .entry(to_ticks(cue.end_ms))
                .or_default()
                .push(set_text(Vec::new()));
        }
        for cue in cues {
            let start = timeline.entry(to_ticks(cue.start_ms)).or_default();
            start.push(set_text(cue.lines));
            if let Some(font_id) = font_id {
                start.push(Command::Scene(SceneCommand::FieldReplace {
                    node_id: font_id,
                    field: "style".into(),
                    value: FieldValue::Str(cue.style.as_str().into()),
                }));
            }
        }

        debug!("{}: {} 个字幕时刻", file_name, timeline.len());
        Ok(timeline
            .into_iter()
            .map(|(t, commands)| AccessUnit::new(Timing::Ticks(t), true, commands))
            .collect())
    }
}

// ============================================================================
// 预处理
// ============================================================================

fn is_subtitle_source(esd: &EsDescriptor) -> bool {
    let Some(mux) = esd.mux_info() else {
        return false;
    };
    mux.file_name.is_some()
        && mux.text_node.is_some()
        && !matches!(esd.dsi(), Some(DecoderSpecificInfo::Text(_)))
}

fn target_stream(streams: &[StreamContext], esd: &EsDescriptor) -> MuxResult<usize> {
    let by_dependency = esd.depends_on.and_then(|dep| {
        streams
            .iter()
            .position(|s| s.is_scene() && s.es_id == dep)
    });
    by_dependency
        .or_else(|| streams.iter().position(StreamContext::is_scene))
        .ok_or_else(|| {
            MuxError::InvalidDescriptor(format!("ES {} 的字幕没有可注入的场景流", esd.es_id))
        })
}

/// 把访问单元按时间插入流中, 同一时刻的命令合并到已有访问单元之后
fn inject(stream: &mut StreamContext, units: Vec<AccessUnit>) {
    let timescale = stream.effective_timescale();
    for au in &mut stream.access_units {
        au.timing.resolve(timescale);
    }
    for mut unit in units {
        let t = unit.timing.resolve(timescale);
        let aus = &mut stream.access_units;
        let pos = aus.partition_point(|a| a.timing.ticks().unwrap_or(0) < t);
        match aus.get_mut(pos) {
            Some(existing) if existing.timing.ticks() == Some(t) => {
                existing.commands.append(&mut unit.commands);
            }
            _ => aus.insert(pos, unit),
        }
    }
}

/// 转换 OD 流中全部字幕导入指令, 注入目标场景流
pub fn import_subtitles(
    ctx: &mut SceneContext,
    importer: &mut dyn SubtitleImporter,
) -> MuxResult<()> {
    for s in 0..ctx.streams.len() {
        if !ctx.streams[s].is_od() {
            continue;
        }
        for a in 0..ctx.streams[s].access_units.len() {
            for c in 0..ctx.streams[s].access_units[a].commands.len() {
                let jobs: Vec<EsDescriptor> = ctx.streams[s].access_units[a].commands[c]
                    .as_od()
                    .map(|od| {
                        od.es_descriptors()
                            .filter(|esd| is_subtitle_source(esd))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                if jobs.is_empty() {
                    continue;
                }

                for esd in &jobs {
                    let Some(mux) = esd.mux_info() else {
                        continue;
                    };
                    let target = target_stream(&ctx.streams, esd)?;
                    let timescale = ctx.streams[target].effective_timescale();
                    let units = importer.convert(esd, mux, &ctx.graph, timescale)?;
                    info!(
                        "{} 字幕 ES {} -> 场景流 {} ({} 个访问单元)",
                        importer.name(),
                        esd.es_id,
                        ctx.streams[target].es_id,
                        units.len()
                    );
                    inject(&mut ctx.streams[target], units);
                }

                if let Some(od) = ctx.streams[s].access_units[a].commands[c].as_od_mut() {
                    for esd in od.es_descriptors_mut() {
                        if is_subtitle_source(esd) {
                            esd.remove_mux_info();
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use scenemux_codec::{EsEntry, EsId, Node, ObjectDescriptor, OdCommand};
    use scenemux_core::StreamType;

    const SAMPLE: &str = "1\r\n00:00:01,000 --> 00:00:02,500\r\n<i>Hello</i>\r\nworld\r\n\r\n2\r\n00:00:02,500 --> 00:00:04,000\r\nBye\r\n";

    #[test]
    fn test_解析srt() {
        let cues = parse_srt(SAMPLE).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].start_ms, 1000);
        assert_eq!(cues[0].end_ms, 2500);
        assert_eq!(cues[0].lines, vec!["Hello", "world"]);
        assert_eq!(cues[0].style, CueStyle::Italic);
        assert_eq!(cues[1].lines, vec!["Bye"]);
        assert_eq!(cues[1].style, CueStyle::Plain);
    }

    #[test]
    fn test_bad_timestamp_rejected() {
        let err = parse_srt("1\n00:00:xx,000 --> 00:00:02,000\nHi\n");
        assert!(matches!(err, Err(MuxError::InvalidData(_))));
    }

    fn graph() -> SceneGraph {
        SceneGraph {
            root: Some(
                Node::new("OrderedGroup")
                    .with_id(1, None)
                    .with_child(Node::new("Text").with_id(5, Some("subtitle")))
                    .with_child(Node::new("FontStyle").with_id(6, Some("font"))),
            ),
            ..SceneGraph::default()
        }
    }

    fn srt_file() -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(SAMPLE.as_bytes()).unwrap();
        tmp
    }

    #[test]
    fn test_convert_merges_adjacent_cues() {
        let tmp = srt_file();
        let mux = MuxInfo {
            file_name: Some(tmp.path().display().to_string()),
            text_node: Some("subtitle".into()),
            font_node: Some("font".into()),
            ..MuxInfo::default()
        };
        let esd = EsDescriptor::synthesize(EsId::new(30), StreamType::Text);
        let aus = SrtImporter::new()
            .convert(&esd, &mux, &graph(), 1000)
            .unwrap();
        let times: Vec<Option<u64>> = aus.iter().map(|a| a.timing.ticks()).collect();
        assert_eq!(times, vec![Some(1000), Some(2500), Some(4000)]);
        // 2.5 秒处: 清空, 设置文本, 设置字体
        assert_eq!(aus[1].commands.len(), 3);
        assert_eq!(aus[2].commands.len(), 1);
    }

    #[test]
    fn test_missing_text_node() {
        let tmp = srt_file();
        let mux = MuxInfo {
            file_name: Some(tmp.path().display().to_string()),
            text_node: Some("nope".into()),
            ..MuxInfo::default()
        };
        let esd = EsDescriptor::synthesize(EsId::new(30), StreamType::Text);
        let err = SrtImporter::new().convert(&esd, &mux, &graph(), 1000);
        assert!(matches!(err, Err(MuxError::InvalidDescriptor(_))));
    }

    #[test]
    fn test_字幕注入场景流() {
        let tmp = srt_file();
        let mut ctx = SceneContext::new();
        ctx.graph = graph();

        let mut scene = StreamContext::new(EsId::new(1), StreamType::Scene, 1, 1000);
        scene.access_units.push(AccessUnit::new(
            Timing::Seconds(0.0),
            true,
            vec![Command::Scene(SceneCommand::Replace {
                root: None,
                protos: Vec::new(),
                routes: Vec::new(),
            })],
        ));
        scene
            .access_units
            .push(AccessUnit::new(Timing::Seconds(3.0), false, Vec::new()));
        ctx.streams.push(scene);

        let mut esd = EsDescriptor::synthesize(EsId::new(30), StreamType::Text);
        esd.mux_info = Some(MuxInfo {
            file_name: Some(tmp.path().display().to_string()),
            text_node: Some("subtitle".into()),
            ..MuxInfo::default()
        });
        let mut od = StreamContext::new(EsId::new(2), StreamType::ObjectDescriptor, 1, 0);
        od.access_units.push(AccessUnit::new(
            Timing::Ticks(0),
            true,
            vec![Command::Od(OdCommand::ObjectDescriptorUpdate(vec![
                ObjectDescriptor {
                    od_id: 4,
                    url: None,
                    es_descriptors: vec![EsEntry::Descriptor(esd)],
                },
            ]))],
        ));
        ctx.streams.push(od);

        import_subtitles(&mut ctx, &mut SrtImporter::new()).unwrap();

        let times: Vec<Option<u64>> = ctx.streams[0]
            .access_units
            .iter()
            .map(|a| a.timing.ticks())
            .collect();
        assert_eq!(
            times,
            vec![Some(0), Some(1000), Some(2500), Some(3000), Some(4000)]
        );
        let od_cmd = ctx.streams[1].access_units[0].commands[0].as_od().unwrap();
        let esd = od_cmd.es_descriptors().next().unwrap();
        assert!(esd.mux_info().is_none());
    }

    #[test]
    fn test_text_dsi_not_converted() {
        let mut esd = EsDescriptor::synthesize(EsId::new(30), StreamType::Text);
        esd.mux_info = Some(MuxInfo {
            file_name: Some("subs.srt".into()),
            text_node: Some("subtitle".into()),
            ..MuxInfo::default()
        });
        assert!(is_subtitle_source(&esd));
        esd.decoder_config_mut(StreamType::Text).decoder_specific_info =
            Some(DecoderSpecificInfo::Text(vec![0]));
        assert!(!is_subtitle_source(&esd));
    }
}
