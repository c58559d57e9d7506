use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dwg_svg_renderer::model::{
    Block, BlockId, Circle, ColorSpec, Entity, EntityKind, Insert, Line, Point3,
};
use dwg_svg_renderer::{data_to_svg, Drawing, RenderOptions};

fn synthetic_drawing(entity_count: usize) -> Drawing {
    let mut drawing = Drawing::new();
    drawing.blocks.push(Block {
        handle: 0x40,
        name: "GRID_CELL".to_string(),
        base_pt: Point3::default(),
        entities: vec![Entity {
            index: 0,
            layer: None,
            color: ColorSpec::aci(1),
            line_weight: 0,
            invisible: false,
            kind: EntityKind::Circle(Circle {
                center: Point3::new(0.5, 0.5, 0.0),
                radius: 0.4,
                extrusion: Point3::unit_z(),
            }),
        }],
    });

    let mut entities = Vec::with_capacity(entity_count);
    for i in 0..entity_count {
        let x = (i % 100) as f64;
        let y = (i / 100) as f64;
        let kind = if i % 5 == 0 {
            EntityKind::Insert(Insert {
                ins_pt: Point3::new(x, y, 0.0),
                scale: Point3::new(1.0, 1.0, 1.0),
                rotation: 0.0,
                extrusion: Point3::unit_z(),
                block: Some(BlockId(0)),
            })
        } else {
            EntityKind::Line(Line {
                start: Point3::new(x, y, 0.0),
                end: Point3::new(x + 1.0, y + 1.0, 0.0),
                extrusion: Point3::unit_z(),
            })
        };
        entities.push(Entity {
            index: (i + 1) as u32,
            layer: None,
            color: ColorSpec::aci(7),
            line_weight: 0,
            invisible: false,
            kind,
        });
    }
    drawing.blocks.push(Block {
        handle: 0x1f,
        name: "*Model_Space".to_string(),
        base_pt: Point3::default(),
        entities,
    });
    drawing.model_space = Some(BlockId(1));
    drawing
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    for count in [100usize, 1_000, 10_000] {
        let drawing = synthetic_drawing(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &drawing, |b, data| {
            b.iter(|| {
                let svg = data_to_svg(black_box(data), &RenderOptions::default())
                    .expect("render failed");
                black_box(svg.len());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_render);
criterion_main!(benches);
