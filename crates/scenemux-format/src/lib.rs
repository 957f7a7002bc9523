//! # scenemux-format
//!
//! scenemux 场景封装框架的容器层.
//!
//! ## 内容
//!
//! - **Container**: 轨道/样本容器接口, 编码流程只通过它写入结果
//! - **IsoFile**: 内存中的 ISO 媒体文件实现, 可输出可序列化的报告
//! - **MediaImporter**: 外部媒体导入接口, 内置整文件导入器
//!
//! 容器的盒结构与落盘格式不在本库范围内, `IsoFile` 只维护轨道模型.

pub mod container;
pub mod importer;
pub mod importers;
pub mod iso_file;

// 重导出常用类型
pub use container::{Container, EditMode, EditSegment, PlCategory, Sample, TrackId, es_id_of};
pub use importer::{ImportRequest, MediaImporter, MediaSource, TrackSelector};
pub use importers::raw::RawImporter;
pub use iso_file::{ContainerReport, IsoFile};
