//! 统一错误类型定义.
//!
//! 所有 scenemux crate 共用的错误类型, 支持跨模块传播.
//! 编码流程为快速失败: 任一阶段出错即中止整个封装调用, 不做回滚.

use thiserror::Error;

/// scenemux 统一错误类型
#[derive(Debug, Error)]
pub enum MuxError {
    /// 描述符缺失或格式错误 (如缺少解码器配置)
    #[error("无效描述符: {0}")]
    InvalidDescriptor(String),

    /// 流类型/格式组合没有对应的映射
    #[error("不支持的流类型: {0}")]
    UnsupportedStreamType(String),

    /// 没有根描述符时存在多个同族顶层流, 无法确定绑定关系
    #[error("绑定不明确: {0}")]
    AmbiguousBinding(String),

    /// 外部媒体导入失败
    #[error("导入流 {es_id} 失败: {reason}")]
    ImportFailure {
        /// 出错的基本流 ID
        es_id: u16,
        /// 导入器报告的原因
        reason: String,
    },

    /// 容器写入失败
    #[error("容器错误: {0}")]
    ContainerFailure(String),

    /// OD 命令引用了错误的描述符子类型
    #[error("OD {od_id} 结构错误: {reason}")]
    StructuralError {
        /// 所属对象描述符 ID
        od_id: u16,
        /// 错误说明
        reason: String,
    },

    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 编码器错误
    #[error("编码器错误: {0}")]
    Codec(String),

    /// 无效数据 (损坏的配置字节等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 已到达数据末尾
    #[error("已到达数据末尾")]
    Eof,

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// scenemux 统一 Result 类型
pub type MuxResult<T> = Result<T, MuxError>;
