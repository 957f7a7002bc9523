//! BIFS 风格场景命令编码器.
//!
//! 命令码: 2 位命令组 (插入/删除/替换/场景替换) + 2 位子类型, 每条命令后跟 1 位续接标志.
//! ID 按配置中的固定位宽写出.

use std::collections::HashMap;

use log::debug;
use scenemux_core::{MuxError, MuxResult};

use super::scene_writer::{IdCoding, SceneWriter};
use crate::command::Command;
use crate::encoder::{SceneEncoder, SceneStreamConfig, TraceSink, write_trace};
use crate::odf::{BifsConfig, EsId};
use crate::scene::{SceneCommand, SceneGraph};
use crate::scene_family::SceneFamily;

/// 单个流的编码状态
struct BifsStream {
    config: BifsConfig,
    use_names: bool,
}

impl BifsStream {
    fn writer(&self) -> SceneWriter {
        let ids = IdCoding::Fixed {
            node: self.config.node_id_bits,
            route: self.config.route_id_bits,
            proto: self.config.proto_id_bits,
        };
        SceneWriter::new(ids, self.use_names)
    }
}

/// BIFS 风格编码器
pub struct BifsEncoder {
    streams: HashMap<EsId, BifsStream>,
    trace: Option<TraceSink>,
}

impl BifsEncoder {
    /// 创建编码器实例 (工厂函数)
    pub fn create() -> MuxResult<Box<dyn SceneEncoder>> {
        Ok(Box::new(Self {
            streams: HashMap::new(),
            trace: None,
        }))
    }

    fn stream(&self, es_id: EsId) -> MuxResult<&BifsStream> {
        self.streams
            .get(&es_id)
            .ok_or_else(|| MuxError::Codec(format!("BIFS 流 {} 未注册", es_id)))
    }

    /// 命令码 (命令组, 子类型)
    fn command_code(cmd: &SceneCommand) -> (u32, u32) {
        match cmd {
            SceneCommand::NodeInsert { .. } => (0, 0),
            SceneCommand::RouteInsert(_) => (0, 3),
            SceneCommand::NodeDelete { .. } => (1, 0),
            SceneCommand::RouteDelete { .. } => (1, 3),
            SceneCommand::NodeReplace { .. } => (2, 0),
            SceneCommand::FieldReplace { .. } => (2, 1),
            SceneCommand::Replace { .. } => (3, 0),
        }
    }

    fn write_commands<'a>(
        stream: &BifsStream,
        commands: impl Iterator<Item = &'a SceneCommand>,
    ) -> (Vec<u8>, usize) {
        let mut writer = stream.writer();
        let mut count = 0;
        for cmd in commands {
            let (group, sub) = Self::command_code(cmd);
            if count > 0 {
                writer.bits().write_flag(true);
            }
            writer.bits().write_bits(group, 2);
            if group != 3 {
                writer.bits().write_bits(sub, 2);
            }
            writer.write_command_body(cmd);
            count += 1;
        }
        if count == 0 {
            return (Vec::new(), 0);
        }
        writer.bits().write_flag(false);
        (writer.finish(), count)
    }
}

impl SceneEncoder for BifsEncoder {
    fn family(&self) -> SceneFamily {
        SceneFamily::Bifs
    }

    fn name(&self) -> &str {
        "bifs"
    }

    fn set_trace(&mut self, sink: TraceSink) {
        self.trace = Some(sink);
    }

    fn new_stream(
        &mut self,
        es_id: EsId,
        config: &SceneStreamConfig,
        use_names: bool,
    ) -> MuxResult<Vec<u8>> {
        let SceneStreamConfig::Bifs(cfg) = config else {
            return Err(MuxError::InvalidArgument(format!(
                "BIFS 编码器收到 {} 配置",
                config.family()
            )));
        };
        debug!(
            "BIFS 新流 {}: nodeID {} 位, routeID {} 位, protoID {} 位",
            es_id, cfg.node_id_bits, cfg.route_id_bits, cfg.proto_id_bits
        );
        let data = cfg.encode();
        self.streams.insert(
            es_id,
            BifsStream {
                config: cfg.clone(),
                use_names,
            },
        );
        Ok(data)
    }

    fn encode_au(&mut self, es_id: EsId, commands: &[Command]) -> MuxResult<Vec<u8>> {
        let stream = self.stream(es_id)?;
        let (data, count) =
            Self::write_commands(stream, commands.iter().filter_map(Command::as_scene));
        write_trace(
            &mut self.trace,
            format_args!("[bifs] ES {} AU: {} 条命令, {} 字节", es_id, count, data.len()),
        );
        Ok(data)
    }

    fn get_rap(&mut self, es_id: EsId, graph: &SceneGraph) -> MuxResult<Vec<u8>> {
        let stream = self.stream(es_id)?;
        let snapshot = SceneCommand::Replace {
            root: graph.root.clone(),
            protos: graph.protos.clone(),
            routes: graph.routes.clone(),
        };
        let (data, _) = Self::write_commands(stream, std::iter::once(&snapshot));
        write_trace(
            &mut self.trace,
            format_args!("[bifs] ES {} RAP: {} 字节", es_id, data.len()),
        );
        Ok(data)
    }

    fn get_config(&self, es_id: EsId) -> MuxResult<(Vec<u8>, u8)> {
        let stream = self.stream(es_id)?;
        Ok((stream.config.encode(), stream.config.effective_version()))
    }
}
