//! 编码器 trait 定义.
//!
//! 场景编码器 (`SceneEncoder`) 有 BIFS 与 LASeR 两族实现, 接口形状相同;
//! OD 编码器 (`OdEncoder`) 累积一个访问单元内的 OD 命令后统一编码.
//! 编码器实例由调用方独占持有, 释放即 `Drop`.

use std::io::Write;

use log::warn;
use scenemux_core::MuxResult;

use crate::command::Command;
use crate::odf::{BifsConfig, EsId, LaserConfig};
use crate::scene::SceneGraph;
use crate::scene_family::SceneFamily;

/// 编码跟踪日志输出
pub type TraceSink = Box<dyn Write + Send>;

/// 新建场景流时传给编码器的配置
#[derive(Debug, Clone, PartialEq)]
pub enum SceneStreamConfig {
    /// BIFS 配置
    Bifs(BifsConfig),
    /// LASeR 配置
    Laser(LaserConfig),
}

impl SceneStreamConfig {
    /// 配置所属的编码族
    pub fn family(&self) -> SceneFamily {
        match self {
            Self::Bifs(_) => SceneFamily::Bifs,
            Self::Laser(_) => SceneFamily::Laser,
        }
    }
}

/// 场景编码器 trait
///
/// 编码流程:
/// 1. 调用 `new_stream()` 为每个场景流协商配置
/// 2. 按解码顺序对每个访问单元调用 `encode_au()` 生成差分数据
/// 3. 需要随机访问点时调用 `get_rap()` 生成当前场景的完整快照
/// 4. 调用 `get_config()` 取出最终的解码器配置写入描述符
pub trait SceneEncoder: Send {
    /// 编码族
    fn family(&self) -> SceneFamily;

    /// 编码器名称
    fn name(&self) -> &str;

    /// 设置跟踪日志, 之后每个访问单元写入一行可读摘要
    fn set_trace(&mut self, sink: TraceSink);

    /// 注册新场景流, 返回协商后的配置字节
    ///
    /// `use_names` 为真时在码流中保留节点名称.
    fn new_stream(
        &mut self,
        es_id: EsId,
        config: &SceneStreamConfig,
        use_names: bool,
    ) -> MuxResult<Vec<u8>>;

    /// 将一个访问单元的命令编码为差分数据
    ///
    /// 命令列表中没有场景命令时返回空数据.
    fn encode_au(&mut self, es_id: EsId, commands: &[Command]) -> MuxResult<Vec<u8>>;

    /// 以场景图当前状态生成完整快照 (随机访问点)
    fn get_rap(&mut self, es_id: EsId, graph: &SceneGraph) -> MuxResult<Vec<u8>>;

    /// 取出流的解码器配置字节与对象类型指示
    fn get_config(&self, es_id: EsId) -> MuxResult<(Vec<u8>, u8)>;
}

/// OD 编码器 trait
///
/// 每个访问单元: 多次 `add_command()` 累积命令, `encode()` 编码, `get_au()` 取出数据.
pub trait OdEncoder: Send {
    /// 编码器名称
    fn name(&self) -> &str;

    /// 累积一条命令 (所有权转移给编码器)
    fn add_command(&mut self, command: Command) -> MuxResult<()>;

    /// 编码已累积的全部命令
    fn encode(&mut self) -> MuxResult<()>;

    /// 取出编码结果并清空内部状态
    fn get_au(&mut self) -> MuxResult<Vec<u8>>;
}

/// 写入一行跟踪日志, 写入失败只记录警告
pub(crate) fn write_trace(sink: &mut Option<TraceSink>, line: std::fmt::Arguments<'_>) {
    if let Some(out) = sink.as_mut() {
        if let Err(e) = writeln!(out, "{line}") {
            warn!("写入编码跟踪日志失败: {}", e);
        }
    }
}
