//! 场景图模型.
//!
//! 场景图是场景更新命令作用的可变节点树. 编码过程中命令按解码顺序原地应用,
//! 编码器读取当前状态生成随机访问点 (完整场景快照).

mod command;

use serde::{Deserialize, Serialize};

pub use command::SceneCommand;

/// 字段值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// 布尔
    Bool(bool),
    /// 整数
    Int(i64),
    /// 浮点
    Float(f64),
    /// 字符串
    Str(String),
    /// 字符串列表
    StrList(Vec<String>),
    /// 浮点列表
    FloatList(Vec<f64>),
    /// 节点引用 (节点 ID)
    NodeRef(u32),
}

/// 节点字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// 字段名
    pub name: String,
    /// 字段值
    pub value: FieldValue,
}

/// 场景节点
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    /// 节点 ID (0 表示未命名节点)
    pub id: u32,
    /// 节点名称 (DEF 名)
    pub name: Option<String>,
    /// 节点类型, 如 "Transform2D", "Text"
    pub tag: String,
    /// 字段
    pub fields: Vec<Field>,
    /// 子节点
    pub children: Vec<Node>,
}

impl Node {
    /// 创建指定类型的节点
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// 设置 ID 与名称
    pub fn with_id(mut self, id: u32, name: Option<&str>) -> Self {
        self.id = id;
        self.name = name.map(str::to_owned);
        self
    }

    /// 追加字段
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.set_field(name, value);
        self
    }

    /// 追加子节点
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// 字段值
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// 设置字段值, 字段不存在时追加
    pub fn set_field(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.value = value,
            None => self.fields.push(Field { name, value }),
        }
    }

    /// 深度优先查找节点
    pub fn find(&self, id: u32) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    /// 深度优先查找节点 (可变)
    pub fn find_mut(&mut self, id: u32) -> Option<&mut Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    /// 按名称查找节点
    pub fn find_by_name(&self, name: &str) -> Option<&Node> {
        if self.name.as_deref() == Some(name) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_by_name(name))
    }

    /// 从子树中移除指定 ID 的节点, 返回是否移除
    fn remove_descendant(&mut self, id: u32) -> bool {
        if let Some(pos) = self.children.iter().position(|c| c.id == id) {
            self.children.remove(pos);
            return true;
        }
        self.children.iter_mut().any(|c| c.remove_descendant(id))
    }

    /// 子树中出现的最大节点 ID
    pub fn max_id(&self) -> u32 {
        self.children
            .iter()
            .map(Node::max_id)
            .fold(self.id, u32::max)
    }
}

/// 路由
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// 路由 ID (0 表示未命名路由)
    #[serde(default)]
    pub id: u32,
    /// 路由名称
    #[serde(default)]
    pub name: Option<String>,
    /// 源节点 ID
    pub from_node: u32,
    /// 源字段
    pub from_field: String,
    /// 目标节点 ID
    pub to_node: u32,
    /// 目标字段
    pub to_field: String,
}

/// 原型声明
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proto {
    /// 原型 ID
    pub id: u32,
    /// 原型名称
    pub name: String,
    /// 接口字段
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// 场景中观察到的最大 ID, 决定编码时的 ID 位宽
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IdBounds {
    /// 最大节点 ID
    pub max_node_id: u32,
    /// 最大路由 ID
    pub max_route_id: u32,
    /// 最大原型 ID
    pub max_proto_id: u32,
}

impl IdBounds {
    /// 合并另一组边界, 逐项取最大值
    pub fn merge(&mut self, other: IdBounds) {
        self.max_node_id = self.max_node_id.max(other.max_node_id);
        self.max_route_id = self.max_route_id.max(other.max_route_id);
        self.max_proto_id = self.max_proto_id.max(other.max_proto_id);
    }

    /// 根据节点、原型与路由集合计算边界
    pub(crate) fn of(root: Option<&Node>, protos: &[Proto], routes: &[Route]) -> Self {
        Self {
            max_node_id: root.map_or(0, Node::max_id),
            max_route_id: routes.iter().map(|r| r.id).max().unwrap_or(0),
            max_proto_id: protos.iter().map(|p| p.id).max().unwrap_or(0),
        }
    }
}

/// 场景图
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneGraph {
    /// 根节点
    pub root: Option<Node>,
    /// 原型声明
    pub protos: Vec<Proto>,
    /// 路由
    pub routes: Vec<Route>,
}

impl SceneGraph {
    /// 创建空场景图
    pub fn new() -> Self {
        Self::default()
    }

    /// 按 ID 查找节点
    pub fn find_node(&self, id: u32) -> Option<&Node> {
        if id == 0 {
            return None;
        }
        self.root.as_ref().and_then(|r| r.find(id))
    }

    /// 按名称查找节点
    pub fn find_node_by_name(&self, name: &str) -> Option<&Node> {
        self.root.as_ref().and_then(|r| r.find_by_name(name))
    }

    /// 当前场景图中的最大 ID
    pub fn id_bounds(&self) -> IdBounds {
        IdBounds::of(self.root.as_ref(), &self.protos, &self.routes)
    }

    /// 场景是否为空
    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.protos.is_empty() && self.routes.is_empty()
    }

    pub(crate) fn find_node_mut(&mut self, id: u32) -> Option<&mut Node> {
        if id == 0 {
            return None;
        }
        self.root.as_mut().and_then(|r| r.find_mut(id))
    }

    pub(crate) fn remove_node(&mut self, id: u32) -> bool {
        match self.root.as_mut() {
            Some(root) if root.id == id => {
                self.root = None;
                true
            }
            Some(root) => root.remove_descendant(id),
            None => false,
        }
    }
}
