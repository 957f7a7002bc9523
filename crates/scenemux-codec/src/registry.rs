//! 编码器注册表.
//!
//! 按场景编码族登记场景编码器工厂, 另登记 OD 编码器工厂, 编码时按需实例化.

use std::collections::HashMap;

use scenemux_core::{MuxError, MuxResult};

use crate::encoder::{OdEncoder, SceneEncoder};
use crate::scene_family::SceneFamily;

/// 场景编码器工厂函数类型
pub type SceneEncoderFactory = fn() -> MuxResult<Box<dyn SceneEncoder>>;

/// OD 编码器工厂函数类型
pub type OdEncoderFactory = fn() -> MuxResult<Box<dyn OdEncoder>>;

/// 场景编码器注册条目
struct SceneEncoderEntry {
    /// 编码器名称
    name: String,
    /// 工厂函数
    factory: SceneEncoderFactory,
}

/// OD 编码器注册条目
struct OdEncoderEntry {
    /// 编码器名称
    name: String,
    /// 工厂函数
    factory: OdEncoderFactory,
}

/// 编码器注册表
///
/// 同一编码族可注册多个编码器, 创建时使用第一个注册的.
pub struct CodecRegistry {
    /// 场景编码器工厂映射
    scene_encoders: HashMap<SceneFamily, Vec<SceneEncoderEntry>>,
    /// OD 编码器工厂
    od_encoders: Vec<OdEncoderEntry>,
}

impl CodecRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self {
            scene_encoders: HashMap::new(),
            od_encoders: Vec::new(),
        }
    }

    /// 注册一个场景编码器
    pub fn register_scene_encoder(
        &mut self,
        family: SceneFamily,
        name: impl Into<String>,
        factory: SceneEncoderFactory,
    ) {
        self.scene_encoders
            .entry(family)
            .or_default()
            .push(SceneEncoderEntry {
                name: name.into(),
                factory,
            });
    }

    /// 注册一个 OD 编码器
    pub fn register_od_encoder(&mut self, name: impl Into<String>, factory: OdEncoderFactory) {
        self.od_encoders.push(OdEncoderEntry {
            name: name.into(),
            factory,
        });
    }

    /// 创建指定编码族的场景编码器实例
    pub fn create_scene_encoder(&self, family: SceneFamily) -> MuxResult<Box<dyn SceneEncoder>> {
        let entry = self
            .scene_encoders
            .get(&family)
            .and_then(|entries| entries.first())
            .ok_or_else(|| MuxError::Codec(format!("未找到 {} 场景编码器", family)))?;
        (entry.factory)()
    }

    /// 创建 OD 编码器实例
    pub fn create_od_encoder(&self) -> MuxResult<Box<dyn OdEncoder>> {
        let entry = self
            .od_encoders
            .first()
            .ok_or_else(|| MuxError::Codec("未找到 OD 编码器".into()))?;
        (entry.factory)()
    }

    /// 获取所有已注册的场景编码器名称
    pub fn list_scene_encoders(&self) -> Vec<(SceneFamily, &str)> {
        let mut result = Vec::new();
        for (family, entries) in &self.scene_encoders {
            for entry in entries {
                result.push((*family, entry.name.as_str()));
            }
        }
        result
    }

    /// 获取所有已注册的 OD 编码器名称
    pub fn list_od_encoders(&self) -> Vec<&str> {
        self.od_encoders.iter().map(|e| e.name.as_str()).collect()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_注册所有编码器() {
        let mut registry = CodecRegistry::new();
        crate::register_all(&mut registry);

        assert_eq!(registry.list_scene_encoders().len(), 2);
        assert_eq!(registry.list_od_encoders(), vec!["mpeg4-od"]);
    }

    #[test]
    fn test_按编码族创建编码器() {
        let mut registry = CodecRegistry::new();
        crate::register_all(&mut registry);

        for family in SceneFamily::ALL {
            let enc = registry.create_scene_encoder(family);
            assert!(enc.is_ok(), "创建 {} 编码器失败", family);
            assert_eq!(enc.unwrap().family(), family);
        }
        assert!(registry.create_od_encoder().is_ok());
    }

    #[test]
    fn test_未注册的编码器返回错误() {
        let registry = CodecRegistry::new();
        assert!(registry.create_scene_encoder(SceneFamily::Laser).is_err());
        assert!(registry.create_od_encoder().is_err());
    }
}
