use serde::{Deserialize, Serialize};

/// A 2D point or vector in drawing units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn has_nan(&self) -> bool {
        self.x.is_nan() || self.y.is_nan()
    }
}

/// A 3D point or vector. Extrusion normals use this type as well.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The default extrusion normal (entity lies in the XY plane).
    pub fn unit_z() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }

    pub fn has_nan(&self) -> bool {
        self.x.is_nan() || self.y.is_nan() || self.z.is_nan()
    }
}

impl Default for Point3 {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub usize);
    };
}

id_newtype!(
    /// Index into [`Drawing::layers`].
    LayerId
);
id_newtype!(
    /// Index into [`Drawing::styles`].
    StyleId
);
id_newtype!(
    /// Index into [`Drawing::blocks`].
    BlockId
);
id_newtype!(
    /// Index into [`Drawing::image_defs`].
    ImageDefId
);

/// A DWG color specifier. `index` is the ACI slot (0 = ByBlock, 256 =
/// ByLayer), `rgb` carries a true color in the low 24 bits when `flag`
/// has bit 0x80 set and 0x40 clear.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ColorSpec {
    #[serde(default)]
    pub index: u16,
    #[serde(default)]
    pub rgb: u32,
    #[serde(default)]
    pub flag: u8,
}

impl ColorSpec {
    pub fn aci(index: u16) -> Self {
        Self {
            index,
            rgb: 0,
            flag: 0,
        }
    }

    pub fn by_layer() -> Self {
        Self::aci(256)
    }

    pub fn true_rgb(rgb: u32) -> Self {
        Self {
            index: 0,
            rgb,
            flag: 0x80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    #[serde(default)]
    pub off: bool,
    #[serde(default)]
    pub frozen: bool,
    #[serde(default)]
    pub color: ColorSpec,
    /// Lineweight code (see [`crate::render`]), not millimetres.
    #[serde(default)]
    pub line_weight: i16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextStyle {
    pub name: String,
    #[serde(default)]
    pub font_file: String,
    #[serde(default)]
    pub width_factor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDef {
    pub file_path: String,
}

/// A block definition: a named, reusable group of entities with a base
/// point. Model space and paper space are blocks like any other, they are
/// just never eligible to become `<defs>` symbols.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Stable 64-bit handle; keys the `<g id="symbol-…">` definition.
    pub handle: u64,
    pub name: String,
    #[serde(default)]
    pub base_pt: Point3,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

/// Common entity envelope shared by every renderable kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Object index; becomes the `dwg-object-<index>` SVG id.
    pub index: u32,
    #[serde(default)]
    pub layer: Option<LayerId>,
    #[serde(default)]
    pub color: ColorSpec,
    #[serde(default)]
    pub line_weight: i16,
    #[serde(default)]
    pub invisible: bool,
    pub kind: EntityKind,
}

/// The renderable 2D entity subset. Both rendering passes match on this
/// exhaustively, so a new variant forces extents and emission coverage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EntityKind {
    Line(Line),
    Circle(Circle),
    Arc(Arc),
    Ellipse(Ellipse),
    Point(PointMarker),
    Solid(Solid),
    Face3d(Face3d),
    Polyline2d(Polyline2d),
    LwPolyline(LwPolyline),
    Hatch(Hatch),
    Text(Text),
    AttDef(AttDef),
    Insert(Insert),
    Image(Image),
    Ray(InfiniteLine),
    XLine(InfiniteLine),
}

impl EntityKind {
    /// Lowercase tag used in SVG fragment comments and diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            EntityKind::Line(_) => "line",
            EntityKind::Circle(_) => "circle",
            EntityKind::Arc(_) => "arc",
            EntityKind::Ellipse(_) => "ellipse",
            EntityKind::Point(_) => "point",
            EntityKind::Solid(_) => "solid",
            EntityKind::Face3d(_) => "3dface",
            EntityKind::Polyline2d(_) => "polyline_2d",
            EntityKind::LwPolyline(_) => "lwpolyline",
            EntityKind::Hatch(_) => "hatch",
            EntityKind::Text(_) => "text",
            EntityKind::AttDef(_) => "attdef",
            EntityKind::Insert(_) => "insert",
            EntityKind::Image(_) => "image",
            EntityKind::Ray(_) => "ray",
            EntityKind::XLine(_) => "xline",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub start: Point3,
    pub end: Point3,
    #[serde(default = "Point3::unit_z")]
    pub extrusion: Point3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point3,
    pub radius: f64,
    #[serde(default = "Point3::unit_z")]
    pub extrusion: Point3,
}

/// Angles are CCW radians in the OCS plane, zero on +X; the arc is stored
/// CCW from `start_angle` to `end_angle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arc {
    pub center: Point3,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
    #[serde(default = "Point3::unit_z")]
    pub extrusion: Point3,
}

/// `sm_axis` is the WCS vector from the center to the major-axis endpoint;
/// `axis_ratio` is minor/major.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ellipse {
    pub center: Point3,
    pub sm_axis: Point3,
    pub axis_ratio: f64,
    pub start_angle: f64,
    pub end_angle: f64,
    #[serde(default = "Point3::unit_z")]
    pub extrusion: Point3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointMarker {
    pub position: Point3,
    #[serde(default = "Point3::unit_z")]
    pub extrusion: Point3,
}

/// Corners 3 and 4 are diagonally opposite, per DWG drafting convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solid {
    pub corners: [Point2; 4],
    #[serde(default = "Point3::unit_z")]
    pub extrusion: Point3,
}

/// `invis_flags` bits 1/2/4/8 hide the edges 1→2, 2→3, 3→4, 4→1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Face3d {
    pub corners: [Point3; 4],
    #[serde(default)]
    pub invis_flags: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex2d {
    pub point: Point2,
    /// Bit 16 marks a spline-frame control point, which is never drawn.
    #[serde(default)]
    pub flag: u32,
    #[serde(default)]
    pub bulge: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polyline2d {
    pub vertices: Vec<Vertex2d>,
    /// Bit 1 closes the polyline.
    #[serde(default)]
    pub flag: u32,
    #[serde(default = "Point3::unit_z")]
    pub extrusion: Point3,
}

impl Polyline2d {
    pub fn is_closed(&self) -> bool {
        self.flag & 1 != 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LwPolyline {
    pub points: Vec<Point2>,
    /// Parallel to `points`; empty when no segment has curvature.
    #[serde(default)]
    pub bulges: Vec<f64>,
    /// Bit 512 closes the polyline.
    #[serde(default)]
    pub flag: u32,
    #[serde(default = "Point3::unit_z")]
    pub extrusion: Point3,
}

impl LwPolyline {
    pub fn is_closed(&self) -> bool {
        self.flag & 512 != 0
    }

    pub fn bulge_at(&self, i: usize) -> f64 {
        self.bulges.get(i).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hatch {
    pub paths: Vec<HatchPath>,
    #[serde(default)]
    pub solid_fill: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HatchPath {
    Polyline(HatchPolylinePath),
    Segments(Vec<HatchSegment>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HatchPolylinePath {
    pub points: Vec<HatchPolylinePoint>,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub has_bulges: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HatchPolylinePoint {
    pub point: Point2,
    #[serde(default)]
    pub bulge: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HatchSegment {
    Line {
        start: Point2,
        end: Point2,
    },
    CircularArc {
        center: Point2,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        ccw: bool,
    },
    /// `endpoint` is the major-axis endpoint relative to the center.
    EllipticalArc {
        center: Point2,
        endpoint: Point2,
        minor_major_ratio: f64,
        start_angle: f64,
        end_angle: f64,
        ccw: bool,
    },
    Spline {
        #[serde(default)]
        control_points: Vec<Point2>,
        #[serde(default)]
        fit_points: Vec<Point2>,
    },
}

/// Horizontal alignment codes: 0 left, 1 center, 2 right, 3 aligned,
/// 4 middle, 5 fit. Vertical: 0 baseline, 1 bottom, 2 middle, 3 top.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Text {
    pub value: String,
    pub ins_pt: Point2,
    #[serde(default)]
    pub alignment_pt: Point2,
    pub height: f64,
    #[serde(default)]
    pub width_factor: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub horiz_alignment: u16,
    #[serde(default)]
    pub vert_alignment: u16,
    #[serde(default)]
    pub style: Option<StyleId>,
    #[serde(default = "Point3::unit_z")]
    pub extrusion: Point3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttDef {
    pub tag: String,
    pub ins_pt: Point2,
    #[serde(default)]
    pub alignment_pt: Point2,
    pub height: f64,
    #[serde(default)]
    pub width_factor: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub horiz_alignment: u16,
    #[serde(default)]
    pub vert_alignment: u16,
    #[serde(default)]
    pub style: Option<StyleId>,
    #[serde(default = "Point3::unit_z")]
    pub extrusion: Point3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insert {
    pub ins_pt: Point3,
    pub scale: Point3,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "Point3::unit_z")]
    pub extrusion: Point3,
    pub block: Option<BlockId>,
}

/// `uvec`/`vvec` are per-pixel column and row vectors; `size` is the pixel
/// width and height. `pt0` is the lower-left corner in WCS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub pt0: Point3,
    pub uvec: Point3,
    pub vvec: Point3,
    pub size: Point2,
    #[serde(default)]
    pub image_def: Option<ImageDefId>,
}

/// Shared by RAY (semi-infinite) and XLINE (infinite); both are clipped to
/// the model extents box before emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfiniteLine {
    pub point: Point3,
    pub vector: Point3,
}

/// The loaded drawing document. The renderer borrows it read-only; all
/// cross-record references are indices into the flat stores below.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Drawing {
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub styles: Vec<TextStyle>,
    #[serde(default)]
    pub image_defs: Vec<ImageDef>,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub model_space: Option<BlockId>,
    #[serde(default)]
    pub paper_space: Option<BlockId>,
    /// Extents stored in the drawing header; fallback when no geometry is
    /// found by the extents pass.
    #[serde(default)]
    pub extents_min: Option<Point2>,
    #[serde(default)]
    pub extents_max: Option<Point2>,
}

impl Drawing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id.0)
    }

    pub fn style(&self, id: StyleId) -> Option<&TextStyle> {
        self.styles.get(id.0)
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0)
    }

    pub fn image_def(&self, id: ImageDefId) -> Option<&ImageDef> {
        self.image_defs.get(id.0)
    }

    /// An entity is hidden when its own invisible bit is set or its layer
    /// is off or frozen. A dangling layer index hides nothing.
    pub fn entity_hidden(&self, entity: &Entity) -> bool {
        if entity.invisible {
            return true;
        }
        match entity.layer.and_then(|id| self.layer(id)) {
            Some(layer) => layer.off || layer.frozen,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_entity(kind: EntityKind) -> Entity {
        Entity {
            index: 0,
            layer: None,
            color: ColorSpec::default(),
            line_weight: 0,
            invisible: false,
            kind,
        }
    }

    #[test]
    fn hidden_by_invisible_bit() {
        let drawing = Drawing::new();
        let mut entity = bare_entity(EntityKind::Point(PointMarker {
            position: Point3::default(),
            extrusion: Point3::unit_z(),
        }));
        assert!(!drawing.entity_hidden(&entity));
        entity.invisible = true;
        assert!(drawing.entity_hidden(&entity));
    }

    #[test]
    fn hidden_by_layer_state() {
        let mut drawing = Drawing::new();
        drawing.layers.push(Layer {
            name: "walls".to_string(),
            off: false,
            frozen: true,
            color: ColorSpec::aci(7),
            line_weight: -1,
        });
        let mut entity = bare_entity(EntityKind::Point(PointMarker {
            position: Point3::default(),
            extrusion: Point3::unit_z(),
        }));
        entity.layer = Some(LayerId(0));
        assert!(drawing.entity_hidden(&entity));
        // Dangling layer reference is not treated as hidden.
        entity.layer = Some(LayerId(7));
        assert!(!drawing.entity_hidden(&entity));
    }

    #[test]
    fn serde_round_trip() {
        let mut drawing = Drawing::new();
        drawing.blocks.push(Block {
            handle: 0x1f,
            name: "*Model_Space".to_string(),
            base_pt: Point3::default(),
            entities: vec![bare_entity(EntityKind::Line(Line {
                start: Point3::new(0.0, 0.0, 0.0),
                end: Point3::new(10.0, 10.0, 0.0),
                extrusion: Point3::unit_z(),
            }))],
        });
        drawing.model_space = Some(BlockId(0));
        let json = serde_json::to_string(&drawing).unwrap();
        let back: Drawing = serde_json::from_str(&json).unwrap();
        assert_eq!(back.blocks.len(), 1);
        assert_eq!(back.model_space, Some(BlockId(0)));
        assert_eq!(back.blocks[0].entities.len(), 1);
    }
}
