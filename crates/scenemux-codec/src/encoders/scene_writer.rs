//! 场景命令的公共比特写出逻辑.
//!
//! BIFS 与 LASeR 编码器共用节点/字段/路由的写法, 区别在于 ID 的编码方式
//! (固定位宽或变长) 以及命令码表, 由各自的编码器负责.

use scenemux_core::bitwriter::BitWriter;

use crate::scene::{Field, FieldValue, Node, Proto, Route, SceneCommand};

/// ID 编码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdCoding {
    /// 固定位宽 (节点, 路由, 原型)
    Fixed { node: u32, route: u32, proto: u32 },
    /// 4 位一组的变长编码
    Variable,
}

/// 场景命令写出器
pub(crate) struct SceneWriter {
    bw: BitWriter,
    ids: IdCoding,
    use_names: bool,
}

impl SceneWriter {
    pub(crate) fn new(ids: IdCoding, use_names: bool) -> Self {
        Self {
            bw: BitWriter::new(),
            ids,
            use_names,
        }
    }

    pub(crate) fn bits(&mut self) -> &mut BitWriter {
        &mut self.bw
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.bw.finish()
    }

    fn write_vl(&mut self, value: u32) {
        let mut groups = vec![value & 0xF];
        let mut rest = value >> 4;
        while rest > 0 {
            groups.push(rest & 0xF);
            rest >>= 4;
        }
        for (i, group) in groups.iter().rev().enumerate() {
            self.bw.write_flag(i + 1 < groups.len());
            self.bw.write_bits(*group, 4);
        }
    }

    fn write_node_id(&mut self, id: u32) {
        match self.ids {
            IdCoding::Fixed { node, .. } => self.bw.write_bits(id, node),
            IdCoding::Variable => self.write_vl(id),
        }
    }

    fn write_route_id(&mut self, id: u32) {
        match self.ids {
            IdCoding::Fixed { route, .. } => self.bw.write_bits(id, route),
            IdCoding::Variable => self.write_vl(id),
        }
    }

    fn write_proto_id(&mut self, id: u32) {
        match self.ids {
            IdCoding::Fixed { proto, .. } => self.bw.write_bits(id, proto),
            IdCoding::Variable => self.write_vl(id),
        }
    }

    fn write_count(&mut self, count: usize) {
        self.bw.write_bits(count.min(255) as u32, 8);
    }

    pub(crate) fn write_field_value(&mut self, value: &FieldValue) {
        match value {
            FieldValue::Bool(v) => {
                self.bw.write_bits(0, 3);
                self.bw.write_flag(*v);
            }
            FieldValue::Int(v) => {
                self.bw.write_bits(1, 3);
                self.bw.write_bits(*v as u32, 32);
            }
            FieldValue::Float(v) => {
                self.bw.write_bits(2, 3);
                self.bw.write_bits((*v as f32).to_bits(), 32);
            }
            FieldValue::Str(s) => {
                self.bw.write_bits(3, 3);
                self.bw.write_string(s);
            }
            FieldValue::StrList(list) => {
                self.bw.write_bits(4, 3);
                self.write_count(list.len());
                for s in list.iter().take(255) {
                    self.bw.write_string(s);
                }
            }
            FieldValue::FloatList(list) => {
                self.bw.write_bits(5, 3);
                self.write_count(list.len());
                for v in list.iter().take(255) {
                    self.bw.write_bits((*v as f32).to_bits(), 32);
                }
            }
            FieldValue::NodeRef(id) => {
                self.bw.write_bits(6, 3);
                self.write_node_id(*id);
            }
        }
    }

    fn write_fields(&mut self, fields: &[Field]) {
        self.write_count(fields.len());
        for field in fields.iter().take(255) {
            self.bw.write_string(&field.name);
            self.write_field_value(&field.value);
        }
    }

    /// 写出节点及其子树, `None` 写出空节点标记
    pub(crate) fn write_node(&mut self, node: Option<&Node>) {
        let Some(node) = node else {
            self.bw.write_flag(false);
            return;
        };
        self.bw.write_flag(true);
        let defined = node.id != 0;
        self.bw.write_flag(defined);
        if defined {
            self.write_node_id(node.id);
            if self.use_names {
                self.bw.write_string(node.name.as_deref().unwrap_or(""));
            }
        }
        self.bw.write_string(&node.tag);
        self.write_fields(&node.fields);
        self.write_count(node.children.len());
        for child in node.children.iter().take(255) {
            self.write_node(Some(child));
        }
    }

    pub(crate) fn write_route(&mut self, route: &Route) {
        self.write_route_id(route.id);
        if self.use_names {
            self.bw.write_string(route.name.as_deref().unwrap_or(""));
        }
        self.write_node_id(route.from_node);
        self.bw.write_string(&route.from_field);
        self.write_node_id(route.to_node);
        self.bw.write_string(&route.to_field);
    }

    fn write_proto(&mut self, proto: &Proto) {
        self.write_proto_id(proto.id);
        self.bw.write_string(&proto.name);
        self.write_fields(&proto.fields);
    }

    /// 写出场景替换的内容 (根节点, 原型, 路由)
    pub(crate) fn write_scene(&mut self, root: Option<&Node>, protos: &[Proto], routes: &[Route]) {
        self.write_count(protos.len());
        for proto in protos.iter().take(255) {
            self.write_proto(proto);
        }
        self.write_node(root);
        self.write_count(routes.len());
        for route in routes.iter().take(255) {
            self.write_route(route);
        }
    }

    /// 写出命令内容 (不含命令码)
    pub(crate) fn write_command_body(&mut self, cmd: &SceneCommand) {
        match cmd {
            SceneCommand::Replace {
                root,
                protos,
                routes,
            } => self.write_scene(root.as_ref(), protos, routes),
            SceneCommand::NodeInsert {
                parent_id,
                position,
                node,
            } => {
                self.write_node_id(*parent_id);
                // 位置: 0 = 指定下标, 1 = 末尾
                match position {
                    Some(pos) => {
                        self.bw.write_flag(false);
                        self.bw.write_bits((*pos).min(255) as u32, 8);
                    }
                    None => self.bw.write_flag(true),
                }
                self.write_node(Some(node));
            }
            SceneCommand::NodeDelete { node_id } => self.write_node_id(*node_id),
            SceneCommand::NodeReplace { node_id, node } => {
                self.write_node_id(*node_id);
                self.write_node(Some(node));
            }
            SceneCommand::FieldReplace {
                node_id,
                field,
                value,
            } => {
                self.write_node_id(*node_id);
                self.bw.write_string(field);
                self.write_field_value(value);
            }
            SceneCommand::RouteInsert(route) => self.write_route(route),
            SceneCommand::RouteDelete { route_id } => self.write_route_id(*route_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_length_ids() {
        let mut w = SceneWriter::new(IdCoding::Variable, false);
        w.write_node_id(0x25);
        // 1 0010, 0 0101 + 6 位填充
        assert_eq!(w.finish(), vec![0b1001_0001, 0b0100_0000]);
    }

    #[test]
    fn test_null_node_is_single_bit() {
        let ids = IdCoding::Fixed {
            node: 1,
            route: 0,
            proto: 0,
        };
        let mut w = SceneWriter::new(ids, false);
        w.write_node(None);
        assert_eq!(w.bits().bits_written(), 1);
    }

    #[test]
    fn test_names_only_written_when_requested() {
        let node = Node::new("Text").with_id(1, Some("TXT"));
        let ids = IdCoding::Fixed {
            node: 1,
            route: 0,
            proto: 0,
        };
        let mut plain = SceneWriter::new(ids, false);
        plain.write_node(Some(&node));
        let mut named = SceneWriter::new(ids, true);
        named.write_node(Some(&node));
        assert_eq!(
            named.bits().bits_written() - plain.bits().bits_written(),
            8 * (1 + "TXT".len())
        );
    }
}
