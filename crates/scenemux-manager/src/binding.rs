//! 流与描述符的绑定.
//!
//! 每个场景流或 OD 流都需要一个描述符: 优先取根描述符中同类型的条目,
//! 其次在 OD 命令中按 ID 查找, 都没有时合成一个.
//! 编码过程中对描述符的修改在流处理结束后写回来源位置.

use log::debug;
use scenemux_codec::{EsDescriptor, EsId};
use scenemux_core::StreamType;

use crate::context::{SceneContext, StreamContext};
use crate::resolver::{locate, locate_mut};

/// 描述符来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    /// 根描述符中的第 N 个条目
    Root(usize),
    /// OD 命令中指定 ID 的描述符
    Located(EsId),
    /// 合成, 不需要写回
    Synthesized,
}

/// 绑定结果
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    /// 工作副本
    pub esd: EsDescriptor,
    /// 来源
    pub origin: Origin,
    /// 是否直接挂在根描述符下
    pub root_bound: bool,
}

/// 为第 `index` 个流找到描述符
///
/// `legacy_single` 为真时, 根描述符只有一个条目即视为匹配, 不检查流类型.
pub(crate) fn bind_stream(
    ctx: &mut SceneContext,
    index: usize,
    stream_type: StreamType,
    legacy_single: bool,
) -> Binding {
    let SceneContext { root, streams, .. } = ctx;
    let stream = &mut streams[index];

    let Some(root) = root.as_ref() else {
        return bind_outside_root(streams, index, stream_type, true);
    };

    let count = root.es_descriptors.len();
    for (i, esd) in root.es_descriptors.iter().enumerate() {
        if esd.stream_type() == Some(stream_type) {
            stream.es_id.bind(esd.es_id);
            if stream.es_id == esd.es_id {
                debug!("流 {} 绑定到根描述符条目 {}", stream.es_id, i);
                return Binding {
                    esd: esd.clone(),
                    origin: Origin::Root(i),
                    root_bound: true,
                };
            }
        } else if legacy_single && count == 1 {
            stream.es_id = esd.es_id;
            debug!("流 {} 按单条目规则绑定到根描述符", stream.es_id);
            return Binding {
                esd: esd.clone(),
                origin: Origin::Root(i),
                root_bound: true,
            };
        }
    }
    bind_outside_root(streams, index, stream_type, false)
}

fn bind_outside_root(
    streams: &[StreamContext],
    index: usize,
    stream_type: StreamType,
    root_bound: bool,
) -> Binding {
    let es_id = streams[index].es_id;
    if let Some(esd) = locate(streams, es_id) {
        return Binding {
            esd: esd.clone(),
            origin: Origin::Located(es_id),
            root_bound,
        };
    }
    let mut esd = EsDescriptor::synthesize(es_id, stream_type);
    if stream_type == StreamType::ObjectDescriptor {
        esd.decoder_config_mut(stream_type).object_type_indication = 1;
    }
    Binding {
        esd,
        origin: Origin::Synthesized,
        root_bound,
    }
}

/// 把工作副本写回来源位置
pub(crate) fn write_back(ctx: &mut SceneContext, binding: Binding) {
    match binding.origin {
        Origin::Root(i) => {
            if let Some(slot) = ctx
                .root
                .as_mut()
                .and_then(|root| root.es_descriptors.get_mut(i))
            {
                *slot = binding.esd;
            }
        }
        Origin::Located(es_id) => {
            if let Some(slot) = locate_mut(&mut ctx.streams, es_id) {
                *slot = binding.esd;
            }
        }
        Origin::Synthesized => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenemux_codec::RootDescriptor;

    fn ctx_with_root(entries: Vec<EsDescriptor>) -> SceneContext {
        let mut ctx = SceneContext::new();
        ctx.root = Some(RootDescriptor {
            es_descriptors: entries,
            ..RootDescriptor::default()
        });
        ctx
    }

    #[test]
    fn test_pending_stream_takes_root_id() {
        let mut ctx = ctx_with_root(vec![
            EsDescriptor::synthesize(EsId::new(3), StreamType::ObjectDescriptor),
            EsDescriptor::synthesize(EsId::new(5), StreamType::Scene),
        ]);
        ctx.streams
            .push(StreamContext::new(EsId::PENDING, StreamType::Scene, 1, 0));
        let binding = bind_stream(&mut ctx, 0, StreamType::Scene, true);
        assert_eq!(binding.origin, Origin::Root(1));
        assert!(binding.root_bound);
        assert_eq!(ctx.streams[0].es_id, EsId::new(5));
    }

    #[test]
    fn test_id_mismatch_is_not_root_bound() {
        let mut ctx = ctx_with_root(vec![
            EsDescriptor::synthesize(EsId::new(5), StreamType::Scene),
            EsDescriptor::synthesize(EsId::new(3), StreamType::ObjectDescriptor),
        ]);
        ctx.streams
            .push(StreamContext::new(EsId::new(9), StreamType::Scene, 1, 0));
        let binding = bind_stream(&mut ctx, 0, StreamType::Scene, true);
        assert_eq!(binding.origin, Origin::Synthesized);
        assert!(!binding.root_bound);
        assert_eq!(binding.esd.es_id, EsId::new(9));
    }

    #[test]
    fn test_单条目规则() {
        let mut ctx = ctx_with_root(vec![EsDescriptor::synthesize(
            EsId::new(4),
            StreamType::Visual,
        )]);
        ctx.streams
            .push(StreamContext::new(EsId::new(2), StreamType::Scene, 1, 0));
        let binding = bind_stream(&mut ctx, 0, StreamType::Scene, true);
        assert_eq!(binding.origin, Origin::Root(0));
        assert_eq!(ctx.streams[0].es_id, EsId::new(4));

        ctx.streams[0].es_id = EsId::new(2);
        let binding = bind_stream(&mut ctx, 0, StreamType::Scene, false);
        assert_eq!(binding.origin, Origin::Synthesized);
    }

    #[test]
    fn test_no_root_synthesizes_od_descriptor() {
        let mut ctx = SceneContext::new();
        ctx.streams.push(StreamContext::new(
            EsId::PENDING,
            StreamType::ObjectDescriptor,
            1,
            0,
        ));
        let binding = bind_stream(&mut ctx, 0, StreamType::ObjectDescriptor, false);
        assert!(binding.root_bound);
        let dc = binding.esd.decoder_config.as_ref().unwrap();
        assert_eq!(dc.object_type_indication, 1);
    }

    #[test]
    fn test_write_back_to_root() {
        let mut ctx = ctx_with_root(vec![EsDescriptor::synthesize(
            EsId::PENDING,
            StreamType::Scene,
        )]);
        ctx.streams
            .push(StreamContext::new(EsId::PENDING, StreamType::Scene, 1, 0));
        let mut binding = bind_stream(&mut ctx, 0, StreamType::Scene, true);
        binding.esd.es_id = EsId::new(1);
        write_back(&mut ctx, binding);
        let root = ctx.root.as_ref().unwrap();
        assert_eq!(root.es_descriptors[0].es_id, EsId::new(1));
    }
}
