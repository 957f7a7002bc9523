//! 外部媒体导入接口.
//!
//! 导入器把外部媒体文件解封装为容器中的一条轨道, 并附上流描述.
//! 源文件句柄在导入结束后随 `MediaSource` 的释放关闭.

use std::fs::File;
use std::path::{Path, PathBuf};

use scenemux_codec::{EsDescriptor, EsId, ImportFlags};
use scenemux_core::{MuxResult, StreamType};

use crate::container::{Container, TrackId};

/// 已打开的媒体源
#[derive(Debug)]
pub struct MediaSource {
    path: PathBuf,
    file: File,
}

impl MediaSource {
    /// 打开文件
    pub fn open(path: impl AsRef<Path>) -> MuxResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self { path, file })
    }

    /// 源文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 文件句柄
    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }
}

/// 子流选择
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSelector {
    /// 按源文件中的轨道 ID 选择
    Id(u32),
    /// 第一条视频轨道
    Video,
    /// 第一条音频轨道
    Audio,
}

/// 导入请求
#[derive(Debug, Clone, Default)]
pub struct ImportRequest {
    /// 目标基本流 ID
    pub target_es_id: EsId,
    /// 子流选择, `None` 表示源文件中唯一的流
    pub selector: Option<TrackSelector>,
    /// 格式提示
    pub format: Option<String>,
    /// 导入时长 (毫秒, 0 表示全部)
    pub duration_ms: u32,
    /// 导入标志
    pub flags: ImportFlags,
    /// 视频帧率提示
    pub frame_rate: f64,
    /// 声明的流类型
    pub stream_type: Option<StreamType>,
    /// 目标流描述, 导入器以它作为轨道描述的基础
    pub esd: Option<EsDescriptor>,
}

/// 媒体导入器 trait
pub trait MediaImporter {
    /// 导入器名称
    fn name(&self) -> &str;

    /// 打开媒体源
    fn open(&mut self, path: &Path) -> MuxResult<MediaSource> {
        MediaSource::open(path)
    }

    /// 将媒体源导入容器, 返回新建轨道的 ID
    fn import(
        &mut self,
        dest: &mut dyn Container,
        source: &mut MediaSource,
        request: &ImportRequest,
    ) -> MuxResult<TrackId>;
}
