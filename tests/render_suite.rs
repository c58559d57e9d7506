use dwg_svg_renderer::model::{
    Block, BlockId, ColorSpec, Entity, EntityKind, Hatch, HatchPath, HatchPolylinePath,
    HatchPolylinePoint, Insert, Layer, LayerId, Line, Point2, Point3, StyleId, Text, TextStyle,
};
use dwg_svg_renderer::{data_to_svg, Drawing, RenderOptions};

fn entity(index: u32, kind: EntityKind) -> Entity {
    Entity {
        index,
        layer: None,
        color: ColorSpec::default(),
        line_weight: 0,
        invisible: false,
        kind,
    }
}

fn model_space_drawing(entities: Vec<Entity>) -> Drawing {
    let mut drawing = Drawing::new();
    drawing.blocks.push(Block {
        handle: 0x1f,
        name: "*Model_Space".to_string(),
        base_pt: Point3::default(),
        entities,
    });
    drawing.model_space = Some(BlockId(0));
    drawing
}

fn render(drawing: &Drawing) -> String {
    let svg = data_to_svg(drawing, &RenderOptions::default()).expect("render failed");
    assert!(svg.starts_with("<?xml"), "missing XML declaration");
    assert!(svg.contains("<svg"), "missing <svg tag");
    assert!(svg.ends_with("</svg>\n"), "missing closing tag");
    svg
}

#[test]
fn single_line_on_white_layer() {
    let mut drawing = model_space_drawing(vec![]);
    drawing.layers.push(Layer {
        name: "0".to_string(),
        off: false,
        frozen: false,
        color: ColorSpec::aci(7),
        line_weight: -1,
    });
    let mut line = entity(
        1,
        EntityKind::Line(Line {
            start: Point3::new(0.0, 0.0, 0.0),
            end: Point3::new(10.0, 10.0, 0.0),
            extrusion: Point3::unit_z(),
        }),
    );
    line.layer = Some(LayerId(0));
    line.color = ColorSpec::by_layer();
    drawing.blocks[0].entities.push(line);

    let svg = render(&drawing);
    assert!(svg.contains("viewBox=\"0.000000 0.000000 10.000000 10.000000\""));
    assert!(svg.contains(
        "<path id=\"dwg-object-1\" d=\"M 0.000000,10.000000 L 10.000000,0.000000\""
    ));
    assert!(svg.contains("style=\"fill:none;stroke:white;stroke-width:0.10px\""));
}

#[test]
fn circle_at_origin() {
    let drawing = model_space_drawing(vec![entity(
        1,
        EntityKind::Circle(dwg_svg_renderer::model::Circle {
            center: Point3::new(0.0, 0.0, 0.0),
            radius: 5.0,
            extrusion: Point3::unit_z(),
        }),
    )]);
    let svg = render(&drawing);
    assert!(svg.contains("viewBox=\"0.000000 0.000000 10.000000 10.000000\""));
    assert!(svg.contains(
        "<circle id=\"dwg-object-1\" cx=\"5.000000\" cy=\"5.000000\" r=\"5.000000\""
    ));
}

#[test]
fn quarter_arc_uses_sweep_zero() {
    let drawing = model_space_drawing(vec![entity(
        1,
        EntityKind::Arc(dwg_svg_renderer::model::Arc {
            center: Point3::new(0.0, 0.0, 0.0),
            radius: 1.0,
            start_angle: 0.0,
            end_angle: std::f64::consts::FRAC_PI_2,
            extrusion: Point3::unit_z(),
        }),
    )]);
    let svg = render(&drawing);
    // Extents are the full circle, so the window is 2x2 around the origin.
    assert!(svg.contains("viewBox=\"0.000000 0.000000 2.000000 2.000000\""));
    assert!(svg.contains(
        "d=\"M 2.000000,1.000000 A 1.000000,1.000000 0 0,0 1.000000,0.000000\""
    ));
}

#[test]
fn insert_references_symbol_definition() {
    let mut drawing = Drawing::new();
    drawing.blocks.push(Block {
        handle: 0x40,
        name: "MY_BLOCK".to_string(),
        base_pt: Point3::default(),
        entities: vec![entity(
            1,
            EntityKind::Line(Line {
                start: Point3::new(0.0, 0.0, 0.0),
                end: Point3::new(1.0, 1.0, 0.0),
                extrusion: Point3::unit_z(),
            }),
        )],
    });
    drawing.blocks.push(Block {
        handle: 0x1f,
        name: "*Model_Space".to_string(),
        base_pt: Point3::default(),
        entities: vec![entity(
            2,
            EntityKind::Insert(Insert {
                ins_pt: Point3::new(10.0, 10.0, 0.0),
                scale: Point3::new(2.0, 2.0, 2.0),
                rotation: 0.0,
                extrusion: Point3::unit_z(),
                block: Some(BlockId(0)),
            }),
        )],
    });
    drawing.model_space = Some(BlockId(1));

    let svg = render(&drawing);
    // Viewport covers the scaled instance: (10,10)..(12,12).
    assert!(svg.contains("viewBox=\"0.000000 0.000000 2.000000 2.000000\""));
    assert!(svg.contains(
        "<use id=\"dwg-object-2\" transform=\"matrix(2.000000 0 0 -2.000000 0.000000 2.000000)\" \
         xlink:href=\"#symbol-64\" />"
    ));
    // The definition holds raw coordinates; the matrix does the flip.
    assert!(svg.contains("<g id=\"symbol-64\" >"));
    assert!(svg.contains("d=\"M 0.000000,0.000000 L 1.000000,1.000000\""));
    // Exactly one definition, one reference.
    assert_eq!(svg.matches("id=\"symbol-64\"").count(), 1);
    assert_eq!(svg.matches("#symbol-64").count(), 1);
}

#[test]
fn centered_text_with_arial_style() {
    let mut drawing = model_space_drawing(vec![]);
    drawing.styles.push(TextStyle {
        name: "TITLES".to_string(),
        font_file: "arial.ttf".to_string(),
        width_factor: 0.0,
    });
    let mut text = entity(
        1,
        EntityKind::Text(Text {
            value: "HELLO".to_string(),
            ins_pt: Point2::new(0.0, 0.0),
            alignment_pt: Point2::new(0.0, 0.0),
            height: 2.5,
            width_factor: 0.0,
            rotation: 0.0,
            horiz_alignment: 1,
            vert_alignment: 0,
            style: Some(StyleId(0)),
            extrusion: Point3::unit_z(),
        }),
    );
    text.color = ColorSpec::aci(7);
    drawing.blocks[0].entities.push(text);

    let svg = render(&drawing);
    assert!(svg.contains("x=\"0.000000\" y=\"2.500000\""));
    assert!(svg.contains("font-family=\"Arial\""));
    // 2.5 / 0.716
    assert!(svg.contains("font-size=\"3.491620\""));
    assert!(svg.contains("text-anchor=\"middle\""));
    assert!(svg.contains("dominant-baseline=\"auto\""));
    assert!(svg.contains(">HELLO</text>"));
}

#[test]
fn solid_fill_hatch_is_a_single_filled_path() {
    let drawing = model_space_drawing(vec![entity(
        1,
        EntityKind::Hatch(Hatch {
            paths: vec![HatchPath::Polyline(HatchPolylinePath {
                points: vec![
                    HatchPolylinePoint {
                        point: Point2::new(0.0, 0.0),
                        bulge: 0.0,
                    },
                    HatchPolylinePoint {
                        point: Point2::new(4.0, 0.0),
                        bulge: 0.0,
                    },
                    HatchPolylinePoint {
                        point: Point2::new(4.0, 4.0),
                        bulge: 0.0,
                    },
                    HatchPolylinePoint {
                        point: Point2::new(0.0, 4.0),
                        bulge: 0.0,
                    },
                ],
                closed: true,
                has_bulges: false,
            })],
            solid_fill: true,
        }),
    )]);
    let svg = render(&drawing);
    assert!(svg.contains(
        "d=\"M 0.000000,4.000000 L 4.000000,4.000000 L 4.000000,0.000000 L 0.000000,0.000000 Z\""
    ));
    assert!(svg.contains("style=\"fill:black;stroke:none;fill-rule:evenodd\""));
}

#[test]
fn empty_model_yields_default_viewport() {
    let drawing = Drawing::new();
    let svg = render(&drawing);
    assert!(svg.contains("viewBox=\"0.000000 0.000000 100.000000 100.000000\""));
    assert!(svg.contains("<defs>"));
}

#[test]
fn empty_paper_space_falls_back_to_model_space() {
    let mut drawing = Drawing::new();
    drawing.blocks.push(Block {
        handle: 0x1e,
        name: "*Paper_Space".to_string(),
        base_pt: Point3::default(),
        entities: vec![],
    });
    drawing.blocks.push(Block {
        handle: 0x1f,
        name: "*Model_Space".to_string(),
        base_pt: Point3::default(),
        entities: vec![entity(
            7,
            EntityKind::Line(Line {
                start: Point3::new(0.0, 0.0, 0.0),
                end: Point3::new(1.0, 0.0, 0.0),
                extrusion: Point3::unit_z(),
            }),
        )],
    });
    drawing.paper_space = Some(BlockId(0));
    drawing.model_space = Some(BlockId(1));

    let svg = render(&drawing);
    assert!(svg.contains("dwg-object-7"));
}

#[test]
fn mspace_only_skips_paper_space() {
    let mut drawing = Drawing::new();
    drawing.blocks.push(Block {
        handle: 0x1e,
        name: "*Paper_Space".to_string(),
        base_pt: Point3::default(),
        entities: vec![entity(
            3,
            EntityKind::Line(Line {
                start: Point3::new(0.0, 0.0, 0.0),
                end: Point3::new(5.0, 0.0, 0.0),
                extrusion: Point3::unit_z(),
            }),
        )],
    });
    drawing.blocks.push(Block {
        handle: 0x1f,
        name: "*Model_Space".to_string(),
        base_pt: Point3::default(),
        entities: vec![entity(
            4,
            EntityKind::Line(Line {
                start: Point3::new(0.0, 0.0, 0.0),
                end: Point3::new(2.0, 2.0, 0.0),
                extrusion: Point3::unit_z(),
            }),
        )],
    });
    drawing.paper_space = Some(BlockId(0));
    drawing.model_space = Some(BlockId(1));

    let options = RenderOptions { mspace_only: true };
    let svg = data_to_svg(&drawing, &options).unwrap();
    assert!(!svg.contains("dwg-object-3"));
    assert!(svg.contains("dwg-object-4"));
}

#[test]
fn rendering_twice_is_byte_identical() {
    let mut drawing = model_space_drawing(vec![entity(
        1,
        EntityKind::Line(Line {
            start: Point3::new(-2.5, 0.0, 0.0),
            end: Point3::new(7.25, 3.5, 0.0),
            extrusion: Point3::unit_z(),
        }),
    )]);
    drawing.blocks.push(Block {
        handle: 0x42,
        name: "DETAIL".to_string(),
        base_pt: Point3::new(1.0, 1.0, 0.0),
        entities: vec![entity(
            2,
            EntityKind::Circle(dwg_svg_renderer::model::Circle {
                center: Point3::new(1.0, 1.0, 0.0),
                radius: 0.5,
                extrusion: Point3::unit_z(),
            }),
        )],
    });
    let first = data_to_svg(&drawing, &RenderOptions::default()).unwrap();
    let second = data_to_svg(&drawing, &RenderOptions::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn hatch_with_no_paths_emits_nothing() {
    let drawing = model_space_drawing(vec![entity(
        1,
        EntityKind::Hatch(Hatch {
            paths: vec![],
            solid_fill: true,
        }),
    )]);
    let svg = render(&drawing);
    assert!(!svg.contains("dwg-object-1\""));
}
