//! 场景更新命令及其应用.
//!
//! 命令应用是 (场景图状态, 命令列表) 的确定性函数: 同一序列重放两次得到相同的场景轨迹.
//! 目标节点/路由不存在的命令跳过, 不报错.

use log::trace;
use serde::{Deserialize, Serialize};

use super::{FieldValue, IdBounds, Node, Proto, Route, SceneGraph};
use crate::command::Command;

/// 场景更新命令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SceneCommand {
    /// 替换整个场景
    Replace {
        /// 新根节点, `None` 表示空场景
        #[serde(default)]
        root: Option<Node>,
        /// 新原型列表
        #[serde(default)]
        protos: Vec<Proto>,
        /// 新路由列表
        #[serde(default)]
        routes: Vec<Route>,
    },
    /// 插入节点
    NodeInsert {
        /// 父节点 ID
        parent_id: u32,
        /// 插入位置, `None` 表示追加到末尾
        #[serde(default)]
        position: Option<usize>,
        /// 插入的节点
        node: Node,
    },
    /// 删除节点
    NodeDelete {
        /// 节点 ID
        node_id: u32,
    },
    /// 替换节点
    NodeReplace {
        /// 被替换的节点 ID
        node_id: u32,
        /// 新节点
        node: Node,
    },
    /// 替换字段值
    FieldReplace {
        /// 节点 ID
        node_id: u32,
        /// 字段名
        field: String,
        /// 新值
        value: FieldValue,
    },
    /// 插入路由
    RouteInsert(Route),
    /// 删除路由
    RouteDelete {
        /// 路由 ID
        route_id: u32,
    },
}

impl SceneCommand {
    /// 是否为不带节点和原型的空场景替换 (旧版本占位命令)
    pub fn is_null_replace(&self) -> bool {
        matches!(self, Self::Replace { root: None, protos, .. } if protos.is_empty())
    }

    /// 命令名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Replace { .. } => "SceneReplace",
            Self::NodeInsert { .. } => "NodeInsert",
            Self::NodeDelete { .. } => "NodeDelete",
            Self::NodeReplace { .. } => "NodeReplace",
            Self::FieldReplace { .. } => "FieldReplace",
            Self::RouteInsert(_) => "RouteInsert",
            Self::RouteDelete { .. } => "RouteDelete",
        }
    }

    /// 命令中出现的最大 ID
    pub fn id_bounds(&self) -> IdBounds {
        match self {
            Self::Replace {
                root,
                protos,
                routes,
            } => IdBounds::of(root.as_ref(), protos, routes),
            Self::NodeInsert { parent_id, node, .. } => IdBounds {
                max_node_id: node.max_id().max(*parent_id),
                ..IdBounds::default()
            },
            Self::NodeReplace { node_id, node } => IdBounds {
                max_node_id: node.max_id().max(*node_id),
                ..IdBounds::default()
            },
            Self::NodeDelete { node_id } | Self::FieldReplace { node_id, .. } => IdBounds {
                max_node_id: *node_id,
                ..IdBounds::default()
            },
            Self::RouteInsert(route) => IdBounds {
                max_node_id: route.from_node.max(route.to_node),
                max_route_id: route.id,
                max_proto_id: 0,
            },
            Self::RouteDelete { route_id } => IdBounds {
                max_route_id: *route_id,
                ..IdBounds::default()
            },
        }
    }
}

impl SceneGraph {
    /// 应用一条场景命令, 返回是否生效
    pub fn apply(&mut self, cmd: &SceneCommand) -> bool {
        let applied = match cmd {
            SceneCommand::Replace {
                root,
                protos,
                routes,
            } => {
                self.root = root.clone();
                self.protos = protos.clone();
                self.routes = routes.clone();
                true
            }
            SceneCommand::NodeInsert {
                parent_id,
                position,
                node,
            } => match self.find_node_mut(*parent_id) {
                Some(parent) => {
                    let pos = position.map_or(parent.children.len(), |p| {
                        p.min(parent.children.len())
                    });
                    parent.children.insert(pos, node.clone());
                    true
                }
                None => false,
            },
            SceneCommand::NodeDelete { node_id } => {
                let removed = self.remove_node(*node_id);
                if removed {
                    self.routes
                        .retain(|r| r.from_node != *node_id && r.to_node != *node_id);
                }
                removed
            }
            SceneCommand::NodeReplace { node_id, node } => match self.find_node_mut(*node_id) {
                Some(target) => {
                    *target = node.clone();
                    true
                }
                None => false,
            },
            SceneCommand::FieldReplace {
                node_id,
                field,
                value,
            } => match self.find_node_mut(*node_id) {
                Some(target) => {
                    target.set_field(field.as_str(), value.clone());
                    true
                }
                None => false,
            },
            SceneCommand::RouteInsert(route) => {
                self.routes.push(route.clone());
                true
            }
            SceneCommand::RouteDelete { route_id } => {
                let before = self.routes.len();
                self.routes.retain(|r| r.id != *route_id);
                self.routes.len() != before
            }
        };
        if !applied {
            trace!("场景命令 {} 目标不存在, 跳过", cmd.name());
        }
        applied
    }

    /// 按顺序应用命令列表中的场景命令, 返回生效的命令数
    ///
    /// OD 命令不作用于场景图, 直接忽略.
    pub fn apply_list(&mut self, commands: &[Command]) -> usize {
        commands
            .iter()
            .filter_map(Command::as_scene)
            .filter(|cmd| self.apply(cmd))
            .count()
    }
}
