//! 编码器实现模块.

pub mod bifs;
pub mod laser;
pub mod od;
mod scene_writer;

use crate::registry::CodecRegistry;
use crate::scene_family::SceneFamily;

/// 注册所有内置编码器
pub fn register_all_encoders(registry: &mut CodecRegistry) {
    registry.register_scene_encoder(SceneFamily::Bifs, "bifs", bifs::BifsEncoder::create);
    registry.register_scene_encoder(SceneFamily::Laser, "laser", laser::LaserEncoder::create);
    registry.register_od_encoder("mpeg4-od", od::OdCommandEncoder::create);
}
