//! # scenemux-codec
//!
//! scenemux 场景封装框架的编码层, 定义描述符模型、场景图与命令、编码器抽象.
//!
//! ## 内容
//!
//! - **odf**: 基本流描述符 (ESD)、对象描述符、根描述符、MuxInfo 与 OD 命令
//! - **scene**: 场景图、场景更新命令及其确定性应用
//! - **编码器**: BIFS 风格与 LASeR 风格场景命令编码器, MPEG-4 OD 命令编码器
//!
//! 内置编码器是简化实现, 不产生符合标准的 BIFS/LASeR 码流.
//!
//! ## 使用示例
//!
//! ```rust
//! use scenemux_codec::{CodecRegistry, SceneFamily};
//!
//! let mut reg = CodecRegistry::new();
//! scenemux_codec::register_all(&mut reg);
//!
//! let encoder = reg.create_scene_encoder(SceneFamily::Bifs).unwrap();
//! assert_eq!(encoder.family(), SceneFamily::Bifs);
//! ```

pub mod command;
pub mod encoder;
pub mod encoders;
pub mod odf;
pub mod registry;
pub mod scene;
pub mod scene_family;

// 重导出常用类型
pub use command::Command;
pub use encoder::{OdEncoder, SceneEncoder, SceneStreamConfig, TraceSink};
pub use odf::{
    BifsConfig, DecoderConfig, DecoderSpecificInfo, EsDescriptor, EsEntry, EsId,
    GenericDescriptor, ImportFlags, LaserConfig, MuxInfo, ObjectDescriptor, OdCommand,
    ProfileLevels, RootDescriptor, SlConfig, UiConfig,
};
pub use registry::CodecRegistry;
pub use scene::{FieldValue, IdBounds, Node, Proto, Route, SceneCommand, SceneGraph};
pub use scene_family::SceneFamily;

/// 注册所有内置编码器
pub fn register_all(registry: &mut CodecRegistry) {
    encoders::register_all_encoders(registry);
}
