//! 导入器实现模块.

pub mod raw;
