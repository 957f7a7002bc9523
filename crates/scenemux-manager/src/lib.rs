//! # scenemux-manager
//!
//! scenemux 场景封装框架的调度层, 把解析好的场景上下文封装进 ISO 容器.
//!
//! ## 组成
//!
//! - **resolver**: 描述符解析, 为基本流在容器中找到或创建轨道
//! - **scene_encoder**: BIFS/LASeR 场景流编码, 含内联与影子随机访问点
//! - **od_encoder**: OD 流编码, 编码前导入命令引用的媒体
//! - **subtitle**: SRT 字幕转换为场景命令
//! - **orchestrator**: 按固定阶段顺序调度以上各部分
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use scenemux_codec::CodecRegistry;
//! use scenemux_format::{IsoFile, RawImporter};
//! use scenemux_manager::{Collaborators, EncodeOptions, SceneContext, SrtImporter};
//!
//! let mut codecs = CodecRegistry::new();
//! scenemux_codec::register_all(&mut codecs);
//! let mut importer = RawImporter::new();
//! let mut subtitles = SrtImporter::new();
//! let mut collab = Collaborators {
//!     codecs: &codecs,
//!     importer: &mut importer,
//!     subtitles: &mut subtitles,
//! };
//!
//! let mut ctx = SceneContext::new();
//! let mut file = IsoFile::new();
//! scenemux_manager::encode_to_file(&mut ctx, &mut file, &mut collab, &EncodeOptions::default())
//!     .unwrap();
//! ```

mod binding;
pub mod context;
pub mod od_encoder;
pub mod options;
pub mod orchestrator;
pub mod resolver;
pub mod scene_encoder;
pub mod stats;
pub mod subtitle;

pub use context::{AccessUnit, SceneContext, StreamContext};
pub use od_encoder::encode_od_streams;
pub use options::{EncodeFlags, EncodeOptions, RapMode};
pub use orchestrator::{Collaborators, encode_to_file};
pub use resolver::{BoundTrack, finalize, locate, resolve};
pub use scene_encoder::encode_scene_streams;
pub use stats::BitrateStats;
pub use subtitle::{SrtImporter, SubtitleImporter};
