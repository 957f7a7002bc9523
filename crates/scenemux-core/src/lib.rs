//! # scenemux-core
//!
//! scenemux 场景封装框架核心库, 提供基础类型定义、错误处理和工具函数.
//!
//! 为场景编码、描述符解析与容器封装提供共享的底层基础设施.

pub mod bitreader;
pub mod bitwriter;
pub mod error;
pub mod stream_type;
pub mod timing;

// 重导出常用类型
pub use error::{MuxError, MuxResult};
pub use stream_type::{MediaCategory, StreamType};
pub use timing::Timing;
