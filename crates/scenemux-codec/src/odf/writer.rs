//! OD 命令与描述符的二进制写出.
//!
//! 使用 MPEG-4 Systems 描述符语法: 每个描述符为 `tag + 可扩展长度 + 内容`,
//! 长度字段每字节 7 位有效, 最高位为续接标志.

use scenemux_core::bitwriter::BitWriter;
use scenemux_core::{MuxError, MuxResult};

use super::{DecoderConfig, EsDescriptor, EsEntry, ObjectDescriptor, OdCommand, SlConfig};

/// 描述符标签
pub mod tags {
    /// 对象描述符
    pub const OBJECT_DESCRIPTOR: u8 = 0x01;
    /// 基本流描述符
    pub const ES_DESCRIPTOR: u8 = 0x03;
    /// 解码器配置
    pub const DECODER_CONFIG: u8 = 0x04;
    /// 解码器专用信息
    pub const DECODER_SPECIFIC_INFO: u8 = 0x05;
    /// 同步层配置
    pub const SL_CONFIG: u8 = 0x06;
    /// ES_ID 包含 (文件内轨道引用)
    pub const ES_ID_INC: u8 = 0x0E;
    /// ES_ID 引用
    pub const ES_ID_REF: u8 = 0x0F;

    /// 对象描述符更新命令
    pub const OD_UPDATE: u8 = 0x01;
    /// 对象描述符移除命令
    pub const OD_REMOVE: u8 = 0x02;
    /// 基本流描述符更新命令
    pub const ESD_UPDATE: u8 = 0x03;
    /// 基本流描述符移除命令
    pub const ESD_REMOVE: u8 = 0x04;
}

/// OD ID 位宽
const OD_ID_BITS: u32 = 10;

/// 写出可扩展长度字段
pub fn write_size(out: &mut Vec<u8>, size: usize) {
    let mut groups = vec![(size & 0x7F) as u8];
    let mut rest = size >> 7;
    while rest > 0 {
        groups.push((rest & 0x7F) as u8 | 0x80);
        rest >>= 7;
    }
    out.extend(groups.iter().rev());
}

/// 读取可扩展长度字段, 返回 (长度, 消耗的字节数)
pub fn read_size(data: &[u8]) -> MuxResult<(usize, usize)> {
    let mut size = 0usize;
    for (i, &b) in data.iter().enumerate().take(4) {
        size = (size << 7) | usize::from(b & 0x7F);
        if b & 0x80 == 0 {
            return Ok((size, i + 1));
        }
    }
    Err(MuxError::InvalidData("描述符长度字段损坏".into()))
}

/// 以 `tag + 长度 + 内容` 形式包装描述符
pub fn write_descriptor(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 5);
    out.push(tag);
    write_size(&mut out, body.len());
    out.extend_from_slice(body);
    out
}

/// 写出解码器配置描述符
pub fn write_decoder_config(dc: &DecoderConfig) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(u32::from(dc.object_type_indication), 8);
    bw.write_bits(u32::from(dc.stream_type.to_u8()), 6);
    // upStream = 0, reserved = 1
    bw.write_flag(false);
    bw.write_flag(true);
    bw.write_bits(dc.buffer_size_db & 0x00FF_FFFF, 24);
    bw.write_bits(dc.max_bitrate, 32);
    bw.write_bits(dc.avg_bitrate, 32);
    let mut body = bw.finish();
    if let Some(dsi) = &dc.decoder_specific_info {
        body.extend(write_descriptor(tags::DECODER_SPECIFIC_INFO, &dsi.to_bytes()));
    }
    write_descriptor(tags::DECODER_CONFIG, &body)
}

/// 写出同步层配置描述符
pub fn write_sl_config(sl: &SlConfig) -> Vec<u8> {
    let mut body = vec![sl.predefined];
    if sl.predefined == 0 {
        body.extend_from_slice(&sl.timestamp_resolution.to_be_bytes());
    }
    write_descriptor(tags::SL_CONFIG, &body)
}

/// 写出基本流描述符
pub fn write_es_descriptor(esd: &EsDescriptor) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(u32::from(esd.es_id.get()), 16);
    bw.write_flag(esd.depends_on.is_some());
    bw.write_flag(esd.url.is_some());
    // OCRstreamFlag = 0, streamPriority = 0
    bw.write_flag(false);
    bw.write_bits(0, 5);
    if let Some(dep) = esd.depends_on {
        bw.write_bits(u32::from(dep.get()), 16);
    }
    if let Some(url) = &esd.url {
        bw.write_string(url);
    }
    let mut body = bw.finish();
    if let Some(dc) = &esd.decoder_config {
        body.extend(write_decoder_config(dc));
    }
    let default_sl = SlConfig {
        predefined: 2,
        timestamp_resolution: 0,
    };
    body.extend(write_sl_config(esd.sl_config.as_ref().unwrap_or(&default_sl)));
    write_descriptor(tags::ES_DESCRIPTOR, &body)
}

/// 写出对象描述符中的一个基本流条目
pub fn write_es_entry(entry: &EsEntry) -> Vec<u8> {
    match entry {
        EsEntry::Descriptor(esd) => write_es_descriptor(esd),
        EsEntry::Reference { es_id } => {
            write_descriptor(tags::ES_ID_REF, &es_id.get().to_be_bytes())
        }
        EsEntry::Include { track_id } => {
            write_descriptor(tags::ES_ID_INC, &track_id.to_be_bytes())
        }
        EsEntry::Other { tag } => write_descriptor(*tag, &[]),
    }
}

/// 写出对象描述符
pub fn write_object_descriptor(od: &ObjectDescriptor) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(u32::from(od.od_id), OD_ID_BITS);
    bw.write_flag(od.url.is_some());
    // includeInlineProfileLevelFlag = 0, reserved = 0b1111
    bw.write_flag(false);
    bw.write_bits(0b1111, 4);
    if let Some(url) = &od.url {
        bw.write_string(url);
    }
    let mut body = bw.finish();
    if od.url.is_none() {
        for entry in &od.es_descriptors {
            body.extend(write_es_entry(entry));
        }
    }
    write_descriptor(tags::OBJECT_DESCRIPTOR, &body)
}

/// 写出一条 OD 命令
pub fn write_command(cmd: &OdCommand) -> Vec<u8> {
    match cmd {
        OdCommand::ObjectDescriptorUpdate(ods) => {
            let body: Vec<u8> = ods.iter().flat_map(write_object_descriptor).collect();
            write_descriptor(tags::OD_UPDATE, &body)
        }
        OdCommand::ObjectDescriptorRemove(ids) => {
            let mut bw = BitWriter::new();
            for id in ids {
                bw.write_bits(u32::from(*id), OD_ID_BITS);
            }
            write_descriptor(tags::OD_REMOVE, &bw.finish())
        }
        OdCommand::EsDescriptorUpdate { od_id, descriptors } => {
            let mut bw = BitWriter::new();
            bw.write_bits(u32::from(*od_id), OD_ID_BITS);
            let mut body = bw.finish();
            for entry in descriptors {
                body.extend(write_es_entry(entry));
            }
            write_descriptor(tags::ESD_UPDATE, &body)
        }
        OdCommand::EsDescriptorRemove { od_id, es_ids } => {
            let mut bw = BitWriter::new();
            bw.write_bits(u32::from(*od_id), OD_ID_BITS);
            bw.align_to_byte();
            for id in es_ids {
                bw.write_bits(u32::from(*id), 16);
            }
            write_descriptor(tags::ESD_REMOVE, &bw.finish())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odf::EsId;
    use scenemux_core::StreamType;

    #[test]
    fn test_expandable_size() {
        let mut out = Vec::new();
        write_size(&mut out, 0x7F);
        assert_eq!(out, vec![0x7F]);

        out.clear();
        write_size(&mut out, 200);
        assert_eq!(out, vec![0x81, 0x48]);
        assert_eq!(read_size(&out).unwrap(), (200, 2));
    }

    #[test]
    fn test_read_size_rejects_endless_continuation() {
        assert!(read_size(&[0x80, 0x80, 0x80, 0x80, 0x01]).is_err());
    }

    #[test]
    fn test_es_descriptor_layout() {
        let mut esd = EsDescriptor::synthesize(EsId::new(0x0102), StreamType::Scene);
        esd.depends_on = Some(EsId::new(7));
        let data = write_es_descriptor(&esd);
        assert_eq!(data[0], tags::ES_DESCRIPTOR);
        let (size, consumed) = read_size(&data[1..]).unwrap();
        assert_eq!(size + consumed + 1, data.len());
        let body = &data[1 + consumed..];
        assert_eq!(&body[..2], &[0x01, 0x02]);
        // streamDependenceFlag 置位
        assert_eq!(body[2] & 0x80, 0x80);
        assert_eq!(&body[3..5], &[0x00, 0x07]);
        assert_eq!(body[5], tags::DECODER_CONFIG);
    }

    #[test]
    fn test_od_remove_packs_ten_bit_ids() {
        let data = write_command(&OdCommand::ObjectDescriptorRemove(vec![1, 2]));
        assert_eq!(data[0], tags::OD_REMOVE);
        assert_eq!(data[1], 3);
        // 0000000001 0000000010 + 4 位填充
        assert_eq!(&data[2..], &[0x00, 0x40, 0x20]);
    }
}
