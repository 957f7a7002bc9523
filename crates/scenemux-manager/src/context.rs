//! 场景上下文模型.
//!
//! 场景上下文由外部解析器构造, 每次封装调用独占使用一次.
//! 封装过程只会填写流的 ES ID、裁剪/规范化访问单元, 以及消耗 OD 流中的命令.

use scenemux_codec::{Command, EsId, IdBounds, RootDescriptor, SceneGraph};
use scenemux_core::{MuxError, MuxResult, StreamType, Timing};
use serde::{Deserialize, Serialize};

/// 未声明时间基时使用的默认值
pub const DEFAULT_TIMESCALE: u32 = 1000;

/// 访问单元
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AccessUnit {
    /// 时间 (流时间基 tick 或秒)
    #[serde(default)]
    pub timing: Timing,
    /// 是否为随机访问点
    #[serde(default)]
    pub is_rap: bool,
    /// 命令列表
    #[serde(default)]
    pub commands: Vec<Command>,
}

impl AccessUnit {
    /// 创建访问单元
    pub fn new(timing: Timing, is_rap: bool, commands: Vec<Command>) -> Self {
        Self {
            timing,
            is_rap,
            commands,
        }
    }
}

/// 流上下文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamContext {
    /// 基本流 ID (0 表示待分配)
    #[serde(default)]
    pub es_id: EsId,
    /// 流类型
    pub stream_type: StreamType,
    /// 对象类型指示, 选择场景编码族
    #[serde(default)]
    pub object_type: u8,
    /// 声明的时间基 (0 表示未设置)
    #[serde(default)]
    pub timescale: u32,
    /// 按解码顺序排列的访问单元
    #[serde(default)]
    pub access_units: Vec<AccessUnit>,
}

impl StreamContext {
    /// 创建不含访问单元的流
    pub fn new(es_id: EsId, stream_type: StreamType, object_type: u8, timescale: u32) -> Self {
        Self {
            es_id,
            stream_type,
            object_type,
            timescale,
            access_units: Vec::new(),
        }
    }

    /// 实际使用的时间基
    pub fn effective_timescale(&self) -> u32 {
        if self.timescale == 0 {
            DEFAULT_TIMESCALE
        } else {
            self.timescale
        }
    }

    /// 是否为 OD 流
    pub fn is_od(&self) -> bool {
        self.stream_type == StreamType::ObjectDescriptor
    }

    /// 是否为场景流
    pub fn is_scene(&self) -> bool {
        self.stream_type == StreamType::Scene
    }
}

/// 场景上下文
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneContext {
    /// 共享的场景图
    pub graph: SceneGraph,
    /// 所有流, 按声明顺序
    pub streams: Vec<StreamContext>,
    /// 根描述符
    pub root: Option<RootDescriptor>,
    /// 场景宽度 (像素, 0 表示未知)
    pub scene_width: u16,
    /// 场景高度 (像素, 0 表示未知)
    pub scene_height: u16,
    /// 是否使用像素度量
    pub pixel_metrics: bool,
}

impl SceneContext {
    /// 创建空上下文
    pub fn new() -> Self {
        Self::default()
    }

    /// OD 流数量
    pub fn od_stream_count(&self) -> usize {
        self.streams.iter().filter(|s| s.is_od()).count()
    }

    /// 没有根描述符时最多允许一个 OD 流
    pub fn check_od_binding(&self) -> MuxResult<()> {
        let count = self.od_stream_count();
        if self.root.is_none() && count > 1 {
            return Err(MuxError::AmbiguousBinding(format!(
                "没有根描述符时存在 {} 个 OD 流",
                count
            )));
        }
        Ok(())
    }

    /// 场景图与所有场景流命令中出现的最大 ID
    pub fn observed_id_bounds(&self) -> IdBounds {
        let mut bounds = self.graph.id_bounds();
        let commands = self
            .streams
            .iter()
            .filter(|s| s.is_scene())
            .flat_map(|s| s.access_units.iter())
            .flat_map(|au| au.commands.iter())
            .filter_map(Command::as_scene);
        for cmd in commands {
            bounds.merge(cmd.id_bounds());
        }
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenemux_codec::{Node, SceneCommand};

    #[test]
    fn test_effective_timescale() {
        let s = StreamContext::new(EsId::PENDING, StreamType::Scene, 1, 0);
        assert_eq!(s.effective_timescale(), 1000);
        let s = StreamContext::new(EsId::PENDING, StreamType::Scene, 1, 90000);
        assert_eq!(s.effective_timescale(), 90000);
    }

    #[test]
    fn test_多个od流且无根描述符() {
        let mut ctx = SceneContext::new();
        ctx.streams
            .push(StreamContext::new(EsId::new(1), StreamType::ObjectDescriptor, 1, 0));
        assert!(ctx.check_od_binding().is_ok());
        ctx.streams
            .push(StreamContext::new(EsId::new(2), StreamType::ObjectDescriptor, 1, 0));
        assert!(matches!(
            ctx.check_od_binding(),
            Err(MuxError::AmbiguousBinding(_))
        ));
        ctx.root = Some(RootDescriptor::default());
        assert!(ctx.check_od_binding().is_ok());
    }

    #[test]
    fn test_observed_bounds_include_commands() {
        let mut ctx = SceneContext::new();
        let mut scene = StreamContext::new(EsId::PENDING, StreamType::Scene, 1, 0);
        scene.access_units.push(AccessUnit::new(
            Timing::Ticks(0),
            true,
            vec![Command::Scene(SceneCommand::NodeInsert {
                parent_id: 1,
                position: None,
                node: Node::new("Shape").with_id(40, None),
            })],
        ));
        ctx.streams.push(scene);
        assert_eq!(ctx.observed_id_bounds().max_node_id, 40);
    }
}
