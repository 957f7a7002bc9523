//! scenemux 性能基准测试.
//!
//! 覆盖场景流编码 (无 RAP / 内联 RAP / 影子 RAP) 与 OD 命令编码路径.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use scenemux::codec::{
    Command, EsDescriptor, EsEntry, EsId, FieldValue, Node, ObjectDescriptor, OdCommand,
    SceneCommand,
};
use scenemux::core::{StreamType, Timing};
use scenemux::format::IsoFile;
use scenemux::manager::{AccessUnit, EncodeFlags, EncodeOptions, SceneContext, StreamContext};

/// 创建含 `count` 个访问单元的场景: 首个替换场景, 其后逐帧移动节点并更新文本
fn make_scene(count: u64) -> SceneContext {
    let mut root = Node::new("OrderedGroup").with_id(1, Some("root"));
    for i in 0..16u32 {
        root = root.with_child(
            Node::new("Transform2D")
                .with_id(10 + i, None)
                .with_field("translation", FieldValue::FloatList(vec![0.0, 0.0]))
                .with_child(Node::new("Text").with_id(100 + i, None)),
        );
    }

    let mut stream = StreamContext::new(EsId::PENDING, StreamType::Scene, 2, 1000);
    stream.access_units.push(AccessUnit::new(
        Timing::Ticks(0),
        true,
        vec![Command::Scene(SceneCommand::Replace {
            root: Some(root),
            protos: Vec::new(),
            routes: Vec::new(),
        })],
    ));
    for t in 1..count {
        let node = (t % 16) as u32;
        stream.access_units.push(AccessUnit::new(
            Timing::Ticks(t * 40),
            false,
            vec![
                Command::Scene(SceneCommand::FieldReplace {
                    node_id: 10 + node,
                    field: "translation".into(),
                    value: FieldValue::FloatList(vec![t as f64, -(t as f64)]),
                }),
                Command::Scene(SceneCommand::FieldReplace {
                    node_id: 100 + node,
                    field: "string".into(),
                    value: FieldValue::StrList(vec![format!("frame {t}")]),
                }),
            ],
        ));
    }

    let mut ctx = SceneContext::new();
    ctx.scene_width = 640;
    ctx.scene_height = 480;
    ctx.streams.push(stream);
    ctx
}

fn bench_scene(c: &mut Criterion, name: &str, options: EncodeOptions) {
    let scene = make_scene(300);
    c.bench_function(name, |b| {
        b.iter(|| {
            let mut ctx = scene.clone();
            let mut file = IsoFile::new();
            scenemux::encode_with_defaults(&mut ctx, &mut file, black_box(&options)).unwrap();
            black_box(file.tracks().len());
        });
    });
}

fn bench_scene_plain(c: &mut Criterion) {
    bench_scene(c, "scene_encode_300_au", EncodeOptions::default());
}

fn bench_scene_inband(c: &mut Criterion) {
    bench_scene(
        c,
        "scene_encode_300_au_inband_rap",
        EncodeOptions {
            flags: EncodeFlags::RAP_INBAND,
            rap_frequency_ms: 1000,
            ..EncodeOptions::default()
        },
    );
}

fn bench_scene_shadow(c: &mut Criterion) {
    bench_scene(
        c,
        "scene_encode_300_au_shadow_rap",
        EncodeOptions {
            rap_frequency_ms: 1000,
            ..EncodeOptions::default()
        },
    );
}

fn bench_od_encode(c: &mut Criterion) {
    let codecs = scenemux::default_codec_registry();
    let ods: Vec<ObjectDescriptor> = (1..=32u16)
        .map(|id| ObjectDescriptor {
            od_id: id,
            url: None,
            es_descriptors: vec![EsEntry::Descriptor(EsDescriptor::synthesize(
                EsId::new(100 + id),
                StreamType::Visual,
            ))],
        })
        .collect();
    c.bench_function("od_encode_32_descriptors", |b| {
        b.iter(|| {
            let mut enc = codecs.create_od_encoder().unwrap();
            enc.add_command(Command::Od(OdCommand::ObjectDescriptorUpdate(
                black_box(ods.clone()),
            )))
            .unwrap();
            enc.encode().unwrap();
            black_box(enc.get_au().unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_scene_plain,
    bench_scene_inband,
    bench_scene_shadow,
    bench_od_encode,
);
criterion_main!(benches);
