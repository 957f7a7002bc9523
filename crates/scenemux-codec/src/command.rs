//! 访问单元中的命令.
//!
//! 场景流与 OD 流共用同一命令类型, 场景编码器只处理场景命令, OD 编码器只处理 OD 命令.

use serde::{Deserialize, Serialize};

use crate::odf::OdCommand;
use crate::scene::SceneCommand;

/// 访问单元命令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// 场景更新命令
    Scene(SceneCommand),
    /// 对象描述符命令
    Od(OdCommand),
}

impl Command {
    /// 场景命令
    pub fn as_scene(&self) -> Option<&SceneCommand> {
        match self {
            Self::Scene(cmd) => Some(cmd),
            Self::Od(_) => None,
        }
    }

    /// OD 命令
    pub fn as_od(&self) -> Option<&OdCommand> {
        match self {
            Self::Od(cmd) => Some(cmd),
            Self::Scene(_) => None,
        }
    }

    /// OD 命令 (可变)
    pub fn as_od_mut(&mut self) -> Option<&mut OdCommand> {
        match self {
            Self::Od(cmd) => Some(cmd),
            Self::Scene(_) => None,
        }
    }

    /// 是否为空场景替换
    pub fn is_null_replace(&self) -> bool {
        self.as_scene().is_some_and(SceneCommand::is_null_replace)
    }

    /// 命令名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scene(cmd) => cmd.name(),
            Self::Od(cmd) => cmd.name(),
        }
    }
}

impl From<SceneCommand> for Command {
    fn from(cmd: SceneCommand) -> Self {
        Self::Scene(cmd)
    }
}

impl From<OdCommand> for Command {
    fn from(cmd: OdCommand) -> Self {
        Self::Od(cmd)
    }
}
