//! 封装调度.
//!
//! 把一个场景上下文封装进容器, 阶段顺序固定:
//! 1. 字幕预处理
//! 2. BIFS 场景流
//! 3. LASeR 场景流
//! 4. OD 流
//! 5. 根对象描述符与 profile/level 指示
//!
//! 任一阶段失败即中止, 已写入容器的内容不回滚.

use log::{debug, info};
use scenemux_codec::{CodecRegistry, RootDescriptor, SceneFamily};
use scenemux_core::MuxResult;
use scenemux_format::{Container, MediaImporter, PlCategory};

use crate::context::SceneContext;
use crate::od_encoder::encode_od_streams;
use crate::options::EncodeOptions;
use crate::scene_encoder::encode_scene_streams;
use crate::subtitle::{SubtitleImporter, import_subtitles};

/// 封装过程使用的外部协作者
pub struct Collaborators<'a> {
    /// 编码器注册表
    pub codecs: &'a CodecRegistry,
    /// 外部媒体导入器
    pub importer: &'a mut dyn MediaImporter,
    /// 字幕转换器
    pub subtitles: &'a mut dyn SubtitleImporter,
}

/// 把场景上下文封装进容器
pub fn encode_to_file(
    ctx: &mut SceneContext,
    container: &mut dyn Container,
    collaborators: &mut Collaborators<'_>,
    options: &EncodeOptions,
) -> MuxResult<()> {
    info!(
        "开始封装: {} 个流, RAP 间隔 {} ms",
        ctx.streams.len(),
        options.rap_frequency_ms
    );

    import_subtitles(ctx, &mut *collaborators.subtitles)?;

    for family in SceneFamily::ALL {
        encode_scene_streams(
            ctx,
            container,
            &mut *collaborators.importer,
            collaborators.codecs,
            family,
            options,
        )?;
    }

    encode_od_streams(
        ctx,
        container,
        &mut *collaborators.importer,
        collaborators.codecs,
        options,
    )?;

    if let Some(root) = ctx.root.as_ref() {
        write_root(container, root);
    }
    info!("封装完成");
    Ok(())
}

/// 写入根对象描述符的标识与附加描述符
fn write_root(container: &mut dyn Container, root: &RootDescriptor) {
    container.set_root_od_id(root.od_id);
    if let Some(url) = root.url.as_deref() {
        container.set_root_od_url(url);
    }
    let descriptors = root
        .extension_descriptors
        .iter()
        .chain(&root.ipmp_descriptors)
        .chain(&root.oci_descriptors)
        .chain(root.ipmp_tool_list.as_ref());
    for desc in descriptors {
        container.add_root_od_descriptor(desc);
    }

    if let Some(pl) = root.profiles.as_ref() {
        container.set_pl_indication(PlCategory::ObjectDescriptor, pl.od);
        container.set_pl_indication(PlCategory::Scene, pl.scene);
        container.set_pl_indication(PlCategory::Graphics, pl.graphics);
        debug!(
            "profile/level: OD 0x{:02X}, 场景 0x{:02X}, 图形 0x{:02X}",
            pl.od, pl.scene, pl.graphics
        );
    }
}
