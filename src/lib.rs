//! # scenemux
//!
//! 纯 Rust 实现的 MPEG-4 场景封装框架.
//!
//! 把解析好的场景上下文 (场景图、场景流与对象描述符流) 编码并写入 ISO 容器:
//! - **场景流**: BIFS/LASeR 风格编码, 支持内联与影子随机访问点
//! - **OD 流**: 对象描述符命令编码, 自动导入命令引用的外部媒体
//! - **字幕**: SRT 字幕转换为场景文本更新
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use scenemux::format::IsoFile;
//! use scenemux::manager::{EncodeOptions, SceneContext};
//!
//! let mut ctx: SceneContext = serde_json::from_str("{}").unwrap();
//! let mut file = IsoFile::new();
//! scenemux::encode_with_defaults(&mut ctx, &mut file, &EncodeOptions::default()).unwrap();
//! println!("{} 条轨道", file.tracks().len());
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `scenemux-core` | 错误类型、流类型、时间换算、位读写 |
//! | `scenemux-codec` | 描述符模型、场景图、编码器框架 |
//! | `scenemux-format` | 容器抽象、内存 ISO 文件、媒体导入 |
//! | `scenemux-manager` | 描述符解析、场景/OD 编码调度 |

use log::debug;

/// 核心类型与工具
pub use scenemux_core as core;

/// 描述符模型与编码器框架
pub use scenemux_codec as codec;

/// 容器与媒体导入
pub use scenemux_format as format;

/// 编码调度
pub use scenemux_manager as manager;

/// 获取版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 创建已注册所有内置编码器的注册表
pub fn default_codec_registry() -> scenemux_codec::CodecRegistry {
    let mut registry = scenemux_codec::CodecRegistry::new();
    scenemux_codec::register_all(&mut registry);
    registry
}

/// 使用内置编码器、整文件导入器与 SRT 字幕转换器封装场景
pub fn encode_with_defaults(
    ctx: &mut scenemux_manager::SceneContext,
    container: &mut dyn scenemux_format::Container,
    options: &scenemux_manager::EncodeOptions,
) -> scenemux_core::MuxResult<()> {
    let codecs = default_codec_registry();
    debug!(
        "内置场景编码器: {:?}, OD 编码器: {:?}",
        codecs.list_scene_encoders(),
        codecs.list_od_encoders()
    );
    let mut importer = scenemux_format::RawImporter::new();
    let mut subtitles = scenemux_manager::SrtImporter::new();
    let mut collaborators = scenemux_manager::Collaborators {
        codecs: &codecs,
        importer: &mut importer,
        subtitles: &mut subtitles,
    };
    scenemux_manager::encode_to_file(ctx, container, &mut collaborators, options)
}
