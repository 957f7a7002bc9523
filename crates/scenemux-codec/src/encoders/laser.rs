//! LASeR 风格场景命令编码器.
//!
//! 每个访问单元以 `resetEncodingContext` 标志与 8 位命令数开头, 命令码为 4 位.
//! ID 使用变长编码, 配置中 `has_string_ids` 或调用方要求保留名称时写出节点名.

use std::collections::HashMap;

use log::debug;
use scenemux_core::{MuxError, MuxResult};

use super::scene_writer::{IdCoding, SceneWriter};
use crate::command::Command;
use crate::encoder::{SceneEncoder, SceneStreamConfig, TraceSink, write_trace};
use crate::odf::{EsId, LaserConfig};
use crate::scene::{SceneCommand, SceneGraph};
use crate::scene_family::{LASER_OBJECT_TYPE, SceneFamily};

struct LaserStream {
    config: LaserConfig,
}

/// LASeR 风格编码器
pub struct LaserEncoder {
    streams: HashMap<EsId, LaserStream>,
    trace: Option<TraceSink>,
}

impl LaserEncoder {
    /// 创建编码器实例 (工厂函数)
    pub fn create() -> MuxResult<Box<dyn SceneEncoder>> {
        Ok(Box::new(Self {
            streams: HashMap::new(),
            trace: None,
        }))
    }

    fn stream(&self, es_id: EsId) -> MuxResult<&LaserStream> {
        self.streams
            .get(&es_id)
            .ok_or_else(|| MuxError::Codec(format!("LASeR 流 {} 未注册", es_id)))
    }

    fn command_code(cmd: &SceneCommand) -> u32 {
        match cmd {
            SceneCommand::NodeInsert { .. } => 1,
            SceneCommand::NodeDelete { .. } => 3,
            SceneCommand::NodeReplace { .. } => 4,
            SceneCommand::FieldReplace { .. } => 5,
            SceneCommand::RouteInsert(_) => 6,
            SceneCommand::RouteDelete { .. } => 7,
            SceneCommand::Replace { .. } => 8,
        }
    }

    fn write_unit(stream: &LaserStream, commands: &[&SceneCommand], reset: bool) -> Vec<u8> {
        if commands.is_empty() {
            return Vec::new();
        }
        let mut writer = SceneWriter::new(IdCoding::Variable, stream.config.has_string_ids);
        writer.bits().write_flag(reset);
        writer.bits().write_bits(commands.len().min(255) as u32, 8);
        for cmd in commands.iter().take(255) {
            writer.bits().write_bits(Self::command_code(cmd), 4);
            writer.write_command_body(cmd);
        }
        writer.finish()
    }
}

impl SceneEncoder for LaserEncoder {
    fn family(&self) -> SceneFamily {
        SceneFamily::Laser
    }

    fn name(&self) -> &str {
        "laser"
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
        let SceneStreamConfig::Laser(cfg) = config else {
            return Err(MuxError::InvalidArgument(format!(
                "LASeR 编码器收到 {} 配置",
                config.family()
            )));
        };
        let mut config = cfg.clone();
        config.has_string_ids |= use_names;
        debug!(
            "LASeR 新流 {}: profile {} level {}, 字符串 ID {}",
            es_id, config.profile, config.level, config.has_string_ids
        );
        let data = config.encode();
        self.streams.insert(es_id, LaserStream { config });
        Ok(data)
    }

    fn encode_au(&mut self, es_id: EsId, commands: &[Command]) -> MuxResult<Vec<u8>> {
        let stream = self.stream(es_id)?;
        let scene: Vec<&SceneCommand> = commands.iter().filter_map(Command::as_scene).collect();
        let data = Self::write_unit(stream, &scene, false);
        write_trace(
            &mut self.trace,
            format_args!(
                "[laser] ES {} AU: {} 条命令, {} 字节",
                es_id,
                scene.len(),
                data.len()
            ),
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
        let data = Self::write_unit(stream, &[&snapshot], true);
        write_trace(
            &mut self.trace,
            format_args!("[laser] ES {} RAP: {} 字节", es_id, data.len()),
        );
        Ok(data)
    }

    fn get_config(&self, es_id: EsId) -> MuxResult<(Vec<u8>, u8)> {
        let stream = self.stream(es_id)?;
        Ok((stream.config.encode(), LASER_OBJECT_TYPE))
    }
}
