//! OD 命令.

use serde::{Deserialize, Serialize};

use super::{EsEntry, ObjectDescriptor};

/// 对象描述符流中的命令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OdCommand {
    /// 新增或更新对象描述符
    ObjectDescriptorUpdate(Vec<ObjectDescriptor>),
    /// 向已有对象描述符追加基本流描述符
    EsDescriptorUpdate {
        /// 目标对象描述符 ID
        od_id: u16,
        /// 追加的条目
        descriptors: Vec<EsEntry>,
    },
    /// 移除对象描述符
    ObjectDescriptorRemove(Vec<u16>),
    /// 从对象描述符中移除基本流
    EsDescriptorRemove {
        /// 目标对象描述符 ID
        od_id: u16,
        /// 被移除的基本流 ID
        es_ids: Vec<u16>,
    },
}

impl OdCommand {
    /// 命令名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::ObjectDescriptorUpdate(_) => "ODUpdate",
            Self::EsDescriptorUpdate { .. } => "ESDUpdate",
            Self::ObjectDescriptorRemove(_) => "ODRemove",
            Self::EsDescriptorRemove { .. } => "ESDRemove",
        }
    }

    /// 遍历命令携带的全部完整 ESD
    pub fn es_descriptors(&self) -> impl Iterator<Item = &super::EsDescriptor> {
        let entries: Box<dyn Iterator<Item = &EsEntry> + '_> = match self {
            Self::ObjectDescriptorUpdate(ods) => {
                Box::new(ods.iter().flat_map(|od| od.es_descriptors.iter()))
            }
            Self::EsDescriptorUpdate { descriptors, .. } => Box::new(descriptors.iter()),
            Self::ObjectDescriptorRemove(_) | Self::EsDescriptorRemove { .. } => {
                Box::new(std::iter::empty())
            }
        };
        entries.filter_map(EsEntry::descriptor)
    }

    /// 遍历命令携带的全部完整 ESD (可变)
    pub fn es_descriptors_mut(&mut self) -> impl Iterator<Item = &mut super::EsDescriptor> {
        let entries: Box<dyn Iterator<Item = &mut EsEntry> + '_> = match self {
            Self::ObjectDescriptorUpdate(ods) => {
                Box::new(ods.iter_mut().flat_map(|od| od.es_descriptors.iter_mut()))
            }
            Self::EsDescriptorUpdate { descriptors, .. } => Box::new(descriptors.iter_mut()),
            Self::ObjectDescriptorRemove(_) | Self::EsDescriptorRemove { .. } => {
                Box::new(std::iter::empty())
            }
        };
        entries.filter_map(EsEntry::descriptor_mut)
    }
}
