//! MPEG-4 OD 命令编码器.
//!
//! 累积一个访问单元内的全部 OD 命令, 按 MPEG-4 Systems 描述符语法依次写出.

use log::trace;
use scenemux_core::{MuxError, MuxResult};

use crate::command::Command;
use crate::encoder::OdEncoder;
use crate::odf::OdCommand;
use crate::odf::writer::write_command;

/// OD 命令编码器
pub struct OdCommandEncoder {
    /// 待编码的命令
    pending: Vec<OdCommand>,
    /// 已编码的访问单元数据
    encoded: Vec<u8>,
}

impl OdCommandEncoder {
    /// 创建编码器实例 (工厂函数)
    pub fn create() -> MuxResult<Box<dyn OdEncoder>> {
        Ok(Box::new(Self {
            pending: Vec::new(),
            encoded: Vec::new(),
        }))
    }
}

impl OdEncoder for OdCommandEncoder {
    fn name(&self) -> &str {
        "mpeg4-od"
    }

    fn add_command(&mut self, command: Command) -> MuxResult<()> {
        match command {
            Command::Od(cmd) => {
                self.pending.push(cmd);
                Ok(())
            }
            Command::Scene(cmd) => Err(MuxError::Codec(format!(
                "OD 流中出现场景命令 {}",
                cmd.name()
            ))),
        }
    }

    fn encode(&mut self) -> MuxResult<()> {
        for cmd in self.pending.drain(..) {
            let data = write_command(&cmd);
            trace!("OD 命令 {}: {} 字节", cmd.name(), data.len());
            self.encoded.extend(data);
        }
        Ok(())
    }

    fn get_au(&mut self) -> MuxResult<Vec<u8>> {
        Ok(std::mem::take(&mut self.encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odf::writer::tags;
    use crate::scene::SceneCommand;

    #[test]
    fn test_accumulate_and_take() {
        let mut enc = OdCommandEncoder::create().unwrap();
        enc.add_command(Command::Od(OdCommand::ObjectDescriptorRemove(vec![1])))
            .unwrap();
        enc.add_command(Command::Od(OdCommand::EsDescriptorRemove {
            od_id: 1,
            es_ids: vec![3],
        }))
        .unwrap();
        enc.encode().unwrap();
        let au = enc.get_au().unwrap();
        assert_eq!(au[0], tags::OD_REMOVE);
        assert!(au.contains(&tags::ESD_REMOVE));
        // 取出后内部状态清空
        enc.encode().unwrap();
        assert!(enc.get_au().unwrap().is_empty());
    }

    #[test]
    fn test_scene_command_rejected() {
        let mut enc = OdCommandEncoder::create().unwrap();
        let err = enc.add_command(Command::Scene(SceneCommand::NodeDelete { node_id: 1 }));
        assert!(err.is_err());
    }
}
