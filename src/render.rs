use std::f64::consts::{PI, TAU};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::color::entity_color;
use crate::error::RenderError;
use crate::extents::drawing_viewport;
use crate::font::resolve_font;
use crate::model::{
    Arc, AttDef, Block, BlockId, Circle, Drawing, Ellipse, Entity, EntityKind, Face3d, Hatch,
    HatchPath, HatchSegment, Image, InfiniteLine, Insert, Line, LwPolyline, Point2, PointMarker,
    Polyline2d, Solid, Text,
};
use crate::transform::{ocs_to_wcs, ocs_to_wcs_2d, Viewport};

/// Date-coded generator version stamped into the `data-gen-vers` attribute.
const GEN_VERSION: &str = "2026-08-02a";

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Render only model space, even when paper space has content.
    pub mspace_only: bool,
}

/// Render a drawing into any byte sink.
pub fn render_svg<W: Write>(
    drawing: &Drawing,
    options: &RenderOptions,
    out: &mut W,
) -> Result<(), RenderError> {
    let viewport = drawing_viewport(drawing, options.mspace_only);
    let mut renderer = Renderer {
        drawing,
        viewport,
        in_block_definition: false,
        out,
    };
    renderer.emit_document(options.mspace_only)?;
    Ok(())
}

/// Render an already-loaded drawing to an SVG string.
pub fn data_to_svg(drawing: &Drawing, options: &RenderOptions) -> Result<String, RenderError> {
    let mut buf = Vec::new();
    render_svg(drawing, options, &mut buf)?;
    String::from_utf8(buf).map_err(|_| RenderError::InvalidDrawing("non-UTF-8 output"))
}

/// Load a JSON drawing model from disk.
pub fn load_drawing(path: &Path) -> Result<Drawing, RenderError> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Load a JSON drawing model and render it to an SVG string.
pub fn to_svg(path: &Path, options: &RenderOptions) -> Result<String, RenderError> {
    let drawing = load_drawing(path)?;
    data_to_svg(&drawing, options)
}

/// Load a JSON drawing model and write the SVG to a file.
pub fn write_svg(
    model_path: &Path,
    svg_path: &Path,
    options: &RenderOptions,
) -> Result<(), RenderError> {
    let drawing = load_drawing(model_path)?;
    let file = File::create(svg_path)?;
    let mut out = BufWriter::new(file);
    render_svg(&drawing, options, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Lineweight codes 0..=23 in hundredths of a millimetre; 29/30/31 are the
/// ByLayer/ByBlock/Default sentinels.
const LINE_WEIGHTS_MM100: [i32; 32] = [
    0, 5, 9, 13, 15, 18, 20, 25, 30, 35, 40, 50, 53, 60, 70, 80, 90, 100, 106, 120, 140, 158,
    200, 211, 0, 0, 0, 0, 0, -1, -2, -3,
];

fn lweight_mm100(code: i16) -> i32 {
    if !(0..32).contains(&code) {
        return 0;
    }
    LINE_WEIGHTS_MM100[code as usize]
}

/// Stroke width in px: the lineweight in millimetres, with ByLayer
/// resolved against the layer and everything non-positive floored at the
/// minimum visible width.
fn entity_stroke_width(drawing: &Drawing, entity: &Entity) -> f64 {
    let mut lw = lweight_mm100(entity.line_weight);
    if lw == -1 {
        if let Some(layer) = entity.layer.and_then(|id| drawing.layer(id)) {
            lw = lweight_mm100(layer.line_weight);
        }
    }
    if lw <= 0 {
        return 0.1;
    }
    (f64::from(lw) / 100.0).max(0.1)
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Escape a block name for use inside an XML comment; "--" is not
/// permitted within comments.
fn escape_block_name(name: &str) -> String {
    escape_xml(name).replace("--", "__")
}

/// Model space and the paper spaces stream inline; everything else becomes
/// a `<defs>` symbol.
fn is_symbol_name(name: &str) -> bool {
    !name.eq_ignore_ascii_case("*Model_Space")
        && !name
            .get(..12)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("*Paper_Space"))
}

fn text_anchor(horiz_alignment: u16) -> &'static str {
    match horiz_alignment {
        // Center, Middle (fit)
        1 | 4 => "middle",
        // Right
        2 => "end",
        // Left, Aligned, Fit
        _ => "start",
    }
}

fn dominant_baseline(vert_alignment: u16) -> &'static str {
    match vert_alignment {
        1 => "text-after-edge",
        2 => "central",
        3 => "text-before-edge",
        _ => "auto",
    }
}

struct Renderer<'a, W: Write> {
    drawing: &'a Drawing,
    viewport: Viewport,
    /// While emitting a symbol's interior the viewport transform is the
    /// identity; the `<use>` site applies it.
    in_block_definition: bool,
    out: &'a mut W,
}

impl<'a, W: Write> Renderer<'a, W> {
    fn tx(&self, x: f64) -> f64 {
        if self.in_block_definition {
            x
        } else {
            self.viewport.x(x)
        }
    }

    fn ty(&self, y: f64) -> f64 {
        if self.in_block_definition {
            y
        } else {
            self.viewport.y(y)
        }
    }

    fn emit_document(&mut self, mspace_only: bool) -> io::Result<()> {
        write!(
            self.out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n\
             <svg\n\
             \x20  xmlns:svg=\"http://www.w3.org/2000/svg\"\n\
             \x20  xmlns=\"http://www.w3.org/2000/svg\"\n\
             \x20  xmlns:xlink=\"http://www.w3.org/1999/xlink\"\n\
             \x20  data-gen-vers=\"{}\"\n\
             \x20  version=\"1.1\" baseProfile=\"basic\"\n\
             \x20  width=\"100%\" height=\"100%\"\n\
             \x20  viewBox=\"0.000000 0.000000 {:.6} {:.6}\">\n",
            GEN_VERSION, self.viewport.width, self.viewport.height
        )?;

        let mut num = 0;
        if !mspace_only {
            if let Some(id) = self.drawing.paper_space {
                num = self.emit_block(id)?;
            }
        }
        if num == 0 {
            if let Some(id) = self.drawing.model_space {
                self.emit_block(id)?;
            }
        }

        write!(self.out, "\t<defs>\n")?;
        for idx in 0..self.drawing.blocks.len() {
            let id = BlockId(idx);
            if Some(id) == self.drawing.model_space || Some(id) == self.drawing.paper_space {
                continue;
            }
            self.emit_block(id)?;
        }
        write!(self.out, "\t</defs>\n</svg>\n")?;
        self.out.flush()
    }

    /// Emit one block's entities, wrapped in a `<g id="symbol-…">` when the
    /// block is eligible as an INSERT target. Returns how many entities
    /// were dispatched to a geometry emitter.
    fn emit_block(&mut self, id: BlockId) -> io::Result<usize> {
        let drawing = self.drawing;
        let Some(block) = drawing.block(id) else {
            return Ok(0);
        };
        let escaped = escape_block_name(&block.name);
        let is_symbol = is_symbol_name(&escaped);
        if is_symbol {
            write!(
                self.out,
                "\t<g id=\"symbol-{}\" >\n\t\t<!-- {} -->\n",
                block.handle, escaped
            )?;
            self.in_block_definition = true;
        } else {
            write!(self.out, "\t<!-- {} -->\n", escaped)?;
        }
        let mut num = 0;
        for entity in &block.entities {
            num += self.emit_entity(entity)?;
        }
        if is_symbol {
            write!(self.out, "\t</g>\n")?;
            self.in_block_definition = false;
        }
        Ok(num)
    }

    fn emit_entity(&mut self, entity: &Entity) -> io::Result<usize> {
        if self.drawing.entity_hidden(entity) {
            debug!(
                index = entity.index,
                kind = entity.kind.tag(),
                "skipping hidden entity"
            );
            return Ok(1);
        }
        match &entity.kind {
            EntityKind::Line(line) => self.emit_line(entity, line)?,
            EntityKind::Circle(circle) => self.emit_circle(entity, circle)?,
            EntityKind::Arc(arc) => self.emit_arc(entity, arc)?,
            EntityKind::Ellipse(ell) => self.emit_ellipse(entity, ell)?,
            EntityKind::Point(point) => self.emit_point(entity, point)?,
            EntityKind::Solid(solid) => self.emit_solid(entity, solid)?,
            EntityKind::Face3d(face) => self.emit_face3d(entity, face)?,
            EntityKind::Polyline2d(pline) => self.emit_polyline_2d(entity, pline)?,
            EntityKind::LwPolyline(pline) => self.emit_lwpolyline(entity, pline)?,
            EntityKind::Hatch(hatch) => self.emit_hatch(entity, hatch)?,
            EntityKind::Text(text) => self.emit_text(entity, text)?,
            EntityKind::AttDef(attdef) => self.emit_attdef(entity, attdef)?,
            EntityKind::Insert(insert) => self.emit_insert(entity, insert)?,
            EntityKind::Image(image) => self.emit_image(entity, image)?,
            EntityKind::Ray(ray) => self.emit_infinite_line(entity, ray, true)?,
            EntityKind::XLine(xline) => self.emit_infinite_line(entity, xline, false)?,
        }
        Ok(1)
    }

    fn skip(&self, entity: &Entity, reason: &'static str) {
        debug!(
            index = entity.index,
            kind = entity.kind.tag(),
            reason,
            "skipping entity"
        );
    }

    /// The shared trailing style of stroked fragments.
    fn common_style(&mut self, entity: &Entity) -> io::Result<()> {
        let width = entity_stroke_width(self.drawing, entity);
        let color = entity_color(self.drawing, entity);
        write!(
            self.out,
            "\n\t      style=\"fill:none;stroke:{};stroke-width:{:.2}px\" />\n",
            color, width
        )
    }

    fn fragment_comment(&mut self, entity: &Entity) -> io::Result<()> {
        write!(self.out, "\t<!-- {}-{} -->\n", entity.kind.tag(), entity.index)
    }

    fn emit_line(&mut self, entity: &Entity, line: &Line) -> io::Result<()> {
        if line.start.has_nan() || line.end.has_nan() || line.extrusion.has_nan() {
            return Ok(self.skip(entity, "nan attribute"));
        }
        let start = ocs_to_wcs(line.start, line.extrusion);
        let end = ocs_to_wcs(line.end, line.extrusion);
        self.fragment_comment(entity)?;
        write!(
            self.out,
            "\t<path id=\"dwg-object-{}\" d=\"M {:.6},{:.6} L {:.6},{:.6}\"",
            entity.index,
            self.tx(start.x),
            self.ty(start.y),
            self.tx(end.x),
            self.ty(end.y)
        )?;
        self.common_style(entity)
    }

    fn emit_circle(&mut self, entity: &Entity, circle: &Circle) -> io::Result<()> {
        if circle.center.has_nan() || circle.extrusion.has_nan() || !(circle.radius > 0.0) {
            return Ok(self.skip(entity, "nan attribute or degenerate radius"));
        }
        let center = ocs_to_wcs(circle.center, circle.extrusion);
        self.fragment_comment(entity)?;
        write!(
            self.out,
            "\t<circle id=\"dwg-object-{}\" cx=\"{:.6}\" cy=\"{:.6}\" r=\"{:.6}\"",
            entity.index,
            self.tx(center.x),
            self.ty(center.y),
            circle.radius
        )?;
        self.common_style(entity)
    }

    /// A POINT renders as a minimal dot.
    fn emit_point(&mut self, entity: &Entity, point: &PointMarker) -> io::Result<()> {
        if point.position.has_nan() || point.extrusion.has_nan() {
            return Ok(self.skip(entity, "nan attribute"));
        }
        let pt = ocs_to_wcs(point.position, point.extrusion);
        self.fragment_comment(entity)?;
        write!(
            self.out,
            "\t<circle id=\"dwg-object-{}\" cx=\"{:.6}\" cy=\"{:.6}\" r=\"0.1\"",
            entity.index,
            self.tx(pt.x),
            self.ty(pt.y)
        )?;
        self.common_style(entity)
    }

    fn emit_arc(&mut self, entity: &Entity, arc: &Arc) -> io::Result<()> {
        if arc.center.has_nan()
            || arc.extrusion.has_nan()
            || arc.radius.is_nan()
            || arc.start_angle.is_nan()
            || arc.end_angle.is_nan()
        {
            return Ok(self.skip(entity, "nan attribute"));
        }
        let center = ocs_to_wcs(arc.center, arc.extrusion);
        let x_start = center.x + arc.radius * arc.start_angle.cos();
        let y_start = center.y + arc.radius * arc.start_angle.sin();
        let x_end = center.x + arc.radius * arc.end_angle.cos();
        let y_end = center.y + arc.radius * arc.end_angle.sin();
        // DWG arcs run CCW from start to end; the Y flip renders them CW,
        // hence sweep flag 0.
        let large_arc = i32::from(arc.end_angle - arc.start_angle >= PI);
        self.fragment_comment(entity)?;
        write!(
            self.out,
            "\t<path id=\"dwg-object-{}\" d=\"M {:.6},{:.6} A {:.6},{:.6} 0 {},0 {:.6},{:.6}\"",
            entity.index,
            self.tx(x_start),
            self.ty(y_start),
            arc.radius,
            arc.radius,
            large_arc,
            self.tx(x_end),
            self.ty(y_end)
        )?;
        self.common_style(entity)
    }

    fn emit_ellipse(&mut self, entity: &Entity, ell: &Ellipse) -> io::Result<()> {
        if ell.center.has_nan()
            || ell.extrusion.has_nan()
            || ell.sm_axis.has_nan()
            || ell.axis_ratio.is_nan()
            || ell.start_angle.is_nan()
            || ell.end_angle.is_nan()
        {
            return Ok(self.skip(entity, "nan attribute"));
        }
        // Center and major axis are already WCS.
        let rx = (ell.sm_axis.x * ell.sm_axis.x + ell.sm_axis.y * ell.sm_axis.y).sqrt();
        let ry = rx * ell.axis_ratio;
        let theta = ell.sm_axis.y.atan2(ell.sm_axis.x);
        let theta_deg = theta.to_degrees();
        let sweep = (ell.end_angle - ell.start_angle).rem_euclid(TAU);

        self.fragment_comment(entity)?;
        if sweep.abs() < 1e-9 {
            // Full ellipse.
            write!(
                self.out,
                "\t<ellipse id=\"dwg-object-{}\" cx=\"{:.6}\" cy=\"{:.6}\" rx=\"{:.6}\" \
                 ry=\"{:.6}\" transform=\"rotate({:.6} {:.6} {:.6})\"",
                entity.index,
                self.tx(ell.center.x),
                self.ty(ell.center.y),
                rx,
                ry,
                180.0 - theta_deg,
                self.tx(ell.center.x),
                self.ty(ell.center.y)
            )?;
        } else {
            // Partial arc: parametric endpoints rotated into place. CCW in
            // CAD becomes CW after the Y flip, so the sweep flag stays 0.
            let point_at = |t: f64| {
                let (sin_t, cos_t) = t.sin_cos();
                let (sin_th, cos_th) = theta.sin_cos();
                (
                    ell.center.x + rx * cos_t * cos_th - ry * sin_t * sin_th,
                    ell.center.y + rx * cos_t * sin_th + ry * sin_t * cos_th,
                )
            };
            let (xs, ys) = point_at(ell.start_angle);
            let (xe, ye) = point_at(ell.end_angle);
            let large_arc = i32::from(sweep > PI);
            write!(
                self.out,
                "\t<path id=\"dwg-object-{}\" d=\"M {:.6},{:.6} A {:.6},{:.6} {:.6} {},0 \
                 {:.6},{:.6}\"",
                entity.index,
                self.tx(xs),
                self.ty(ys),
                rx,
                ry,
                -theta_deg,
                large_arc,
                self.tx(xe),
                self.ty(ye)
            )?;
        }
        self.common_style(entity)
    }

    /// Corner order 1,2,4,3: corners 3 and 4 are stored diagonally
    /// opposite, so the swap yields a simple quadrilateral.
    fn emit_solid(&mut self, entity: &Entity, solid: &Solid) -> io::Result<()> {
        if solid.corners.iter().any(Point2::has_nan) {
            return Ok(self.skip(entity, "nan corner"));
        }
        let c: Vec<Point2> = solid
            .corners
            .iter()
            .map(|&p| ocs_to_wcs_2d(p, solid.extrusion))
            .collect();
        self.fragment_comment(entity)?;
        write!(
            self.out,
            "\t<polygon id=\"dwg-object-{}\" points=\"{:.6},{:.6} {:.6},{:.6} {:.6},{:.6} {:.6},{:.6}\"",
            entity.index,
            self.tx(c[0].x),
            self.ty(c[0].y),
            self.tx(c[1].x),
            self.ty(c[1].y),
            self.tx(c[3].x),
            self.ty(c[3].y),
            self.tx(c[2].x),
            self.ty(c[2].y)
        )?;
        self.common_style(entity)
    }

    fn emit_face3d(&mut self, entity: &Entity, face: &Face3d) -> io::Result<()> {
        if face.corners.iter().any(|c| c.has_nan()) {
            return Ok(self.skip(entity, "nan corner"));
        }
        let c = &face.corners;
        self.fragment_comment(entity)?;
        if face.invis_flags != 0 {
            // Invisible edges break the outline: M instead of L.
            write!(
                self.out,
                "\t<path id=\"dwg-object-{}\" d=\"M {:.6},{:.6}",
                entity.index,
                self.tx(c[0].x),
                self.ty(c[0].y)
            )?;
            for (corner, bit) in [(&c[1], 1u8), (&c[2], 2), (&c[3], 4), (&c[0], 8)] {
                write!(
                    self.out,
                    " {} {:.6},{:.6}",
                    if face.invis_flags & bit != 0 { "M" } else { "L" },
                    self.tx(corner.x),
                    self.ty(corner.y)
                )?;
            }
            write!(self.out, "\"")?;
        } else {
            write!(
                self.out,
                "\t<polygon id=\"dwg-object-{}\" points=\"{:.6},{:.6} {:.6},{:.6} {:.6},{:.6} {:.6},{:.6}\"",
                entity.index,
                self.tx(c[0].x),
                self.ty(c[0].y),
                self.tx(c[1].x),
                self.ty(c[1].y),
                self.tx(c[3].x),
                self.ty(c[3].y),
                self.tx(c[2].x),
                self.ty(c[2].y)
            )?;
        }
        self.common_style(entity)
    }

    fn emit_polyline_2d(&mut self, entity: &Entity, pline: &Polyline2d) -> io::Result<()> {
        if pline.extrusion.has_nan() {
            return Ok(self.skip(entity, "nan extrusion"));
        }
        if pline.vertices.is_empty() {
            return Ok(self.skip(entity, "no vertices"));
        }
        self.fragment_comment(entity)?;
        write!(self.out, "\t<path id=\"dwg-object-{}\" d=\"", entity.index)?;
        let mut first = true;
        for vertex in &pline.vertices {
            // Spline frame control points are scaffolding, never geometry.
            if vertex.flag & 16 != 0 || vertex.point.has_nan() {
                continue;
            }
            let pt = ocs_to_wcs_2d(vertex.point, pline.extrusion);
            if first {
                write!(self.out, "M {:.6},{:.6}", self.tx(pt.x), self.ty(pt.y))?;
                first = false;
            } else {
                write!(self.out, " L {:.6},{:.6}", self.tx(pt.x), self.ty(pt.y))?;
            }
        }
        if pline.is_closed() {
            write!(self.out, " Z")?;
        }
        write!(self.out, "\"")?;
        self.common_style(entity)
    }

    fn emit_lwpolyline(&mut self, entity: &Entity, pline: &LwPolyline) -> io::Result<()> {
        if pline.extrusion.has_nan() {
            return Ok(self.skip(entity, "nan extrusion"));
        }
        if pline.points.is_empty() || pline.points[0].has_nan() {
            return Ok(self.skip(entity, "no points"));
        }
        self.fragment_comment(entity)?;
        write!(self.out, "\t<path id=\"dwg-object-{}\" d=\"", entity.index)?;
        let mut first_wcs: Option<Point2> = None;
        let mut prev: Option<(Point2, f64)> = None;
        for (i, point) in pline.points.iter().enumerate() {
            if point.has_nan() {
                continue;
            }
            let pt = ocs_to_wcs_2d(*point, pline.extrusion);
            match prev {
                None => {
                    write!(self.out, "M {:.6},{:.6}", self.tx(pt.x), self.ty(pt.y))?;
                    first_wcs = Some(pt);
                }
                Some((prev_pt, bulge)) if bulge.abs() > 1e-6 => {
                    self.emit_bulge_arc(prev_pt, pt, bulge)?;
                }
                Some(_) => {
                    write!(self.out, " L {:.6},{:.6}", self.tx(pt.x), self.ty(pt.y))?;
                }
            }
            prev = Some((pt, pline.bulge_at(i)));
        }
        if pline.is_closed() {
            match (prev, first_wcs) {
                (Some((last, bulge)), Some(first)) if bulge.abs() > 1e-6 => {
                    self.emit_bulge_arc(last, first, bulge)?;
                }
                _ => write!(self.out, " Z")?,
            }
        }
        write!(self.out, "\"")?;
        self.common_style(entity)
    }

    /// One SVG arc for a polyline segment with bulge. The bulge is
    /// tan(included_angle/4); positive is CCW in DWG, which the Y flip
    /// turns into sweep=1 in SVG.
    fn emit_bulge_arc(&mut self, p1: Point2, p2: Point2, bulge: f64) -> io::Result<()> {
        let dx = p2.x - p1.x;
        let dy = p2.y - p1.y;
        let chord = dx.hypot(dy);
        let sagitta = bulge.abs() * chord / 2.0;
        if sagitta == 0.0 {
            // Coincident endpoints: nothing to curve through.
            return write!(self.out, " L {:.6},{:.6}", self.tx(p2.x), self.ty(p2.y));
        }
        let radius = (chord * chord / 4.0 + sagitta * sagitta) / (2.0 * sagitta);
        let large_arc = i32::from(bulge.abs() > 1.0);
        let sweep = i32::from(bulge > 0.0);
        write!(
            self.out,
            " A {:.6},{:.6} 0 {},{} {:.6},{:.6}",
            radius,
            radius,
            large_arc,
            sweep,
            self.tx(p2.x),
            self.ty(p2.y)
        )
    }

    fn emit_hatch(&mut self, entity: &Entity, hatch: &Hatch) -> io::Result<()> {
        if hatch.paths.is_empty() {
            return Ok(self.skip(entity, "no paths"));
        }
        let color = entity_color(self.drawing, entity);
        self.fragment_comment(entity)?;
        if hatch.solid_fill {
            write!(self.out, "\t<path id=\"dwg-object-{}\" d=\"", entity.index)?;
            for (i, path) in hatch.paths.iter().enumerate() {
                self.emit_hatch_path_data(path)?;
                if i + 1 < hatch.paths.len() {
                    write!(self.out, " ")?;
                }
            }
            write!(
                self.out,
                "\"\n\t      style=\"fill:{};stroke:none;fill-rule:evenodd\" />\n",
                color
            )?;
        } else {
            let width = entity_stroke_width(self.drawing, entity);
            for (i, path) in hatch.paths.iter().enumerate() {
                write!(
                    self.out,
                    "\t<path id=\"dwg-object-{}-path-{}\" d=\"",
                    entity.index, i
                )?;
                self.emit_hatch_path_data(path)?;
                write!(
                    self.out,
                    "\"\n\t      style=\"fill:none;stroke:{};stroke-width:{:.1}px\" />\n",
                    color, width
                )?;
            }
        }
        Ok(())
    }

    fn emit_hatch_path_data(&mut self, path: &HatchPath) -> io::Result<()> {
        match path {
            HatchPath::Polyline(pp) => {
                for (j, p) in pp.points.iter().enumerate() {
                    if p.point.has_nan() {
                        continue;
                    }
                    if j == 0 {
                        write!(
                            self.out,
                            "M {:.6},{:.6}",
                            self.tx(p.point.x),
                            self.ty(p.point.y)
                        )?;
                    } else {
                        let prev = &pp.points[j - 1];
                        if pp.has_bulges && prev.bulge.abs() > 1e-6 {
                            self.emit_bulge_arc(prev.point, p.point, prev.bulge)?;
                        } else {
                            write!(
                                self.out,
                                " L {:.6},{:.6}",
                                self.tx(p.point.x),
                                self.ty(p.point.y)
                            )?;
                        }
                    }
                }
                if pp.closed && !pp.points.is_empty() {
                    let last = &pp.points[pp.points.len() - 1];
                    let first = &pp.points[0];
                    if pp.has_bulges && last.bulge.abs() > 1e-6 {
                        self.emit_bulge_arc(last.point, first.point, last.bulge)?;
                    } else {
                        write!(self.out, " Z")?;
                    }
                }
                Ok(())
            }
            HatchPath::Segments(segs) => {
                let mut first_point = true;
                for seg in segs {
                    match seg {
                        HatchSegment::Line { start, end } => {
                            if start.has_nan() || end.has_nan() {
                                continue;
                            }
                            if first_point {
                                write!(
                                    self.out,
                                    "M {:.6},{:.6}",
                                    self.tx(start.x),
                                    self.ty(start.y)
                                )?;
                                first_point = false;
                            }
                            write!(self.out, " L {:.6},{:.6}", self.tx(end.x), self.ty(end.y))?;
                        }
                        HatchSegment::CircularArc {
                            center,
                            radius,
                            start_angle,
                            end_angle,
                            ccw,
                        } => {
                            if center.has_nan()
                                || radius.is_nan()
                                || start_angle.is_nan()
                                || end_angle.is_nan()
                            {
                                continue;
                            }
                            let x1 = center.x + radius * start_angle.cos();
                            let y1 = center.y + radius * start_angle.sin();
                            let x2 = center.x + radius * end_angle.cos();
                            let y2 = center.y + radius * end_angle.sin();
                            let large_arc = i32::from((end_angle - start_angle).abs() > PI);
                            let sweep = i32::from(*ccw);
                            if first_point {
                                write!(self.out, "M {:.6},{:.6}", self.tx(x1), self.ty(y1))?;
                                first_point = false;
                            }
                            write!(
                                self.out,
                                " A {:.6},{:.6} 0 {},{} {:.6},{:.6}",
                                radius,
                                radius,
                                large_arc,
                                sweep,
                                self.tx(x2),
                                self.ty(y2)
                            )?;
                        }
                        HatchSegment::EllipticalArc {
                            center,
                            endpoint,
                            minor_major_ratio,
                            start_angle,
                            end_angle,
                            ccw,
                        } => {
                            let rx = (endpoint.x * endpoint.x + endpoint.y * endpoint.y).sqrt();
                            let ry = rx * minor_major_ratio;
                            if center.has_nan()
                                || rx.is_nan()
                                || ry.is_nan()
                                || start_angle.is_nan()
                                || end_angle.is_nan()
                            {
                                continue;
                            }
                            let rot = endpoint.y.atan2(endpoint.x).to_degrees();
                            let x1 = center.x + rx * start_angle.cos();
                            let y1 = center.y + ry * start_angle.sin();
                            let x2 = center.x + rx * end_angle.cos();
                            let y2 = center.y + ry * end_angle.sin();
                            let large_arc = i32::from((end_angle - start_angle).abs() > PI);
                            let sweep = i32::from(*ccw);
                            if first_point {
                                write!(self.out, "M {:.6},{:.6}", self.tx(x1), self.ty(y1))?;
                                first_point = false;
                            }
                            write!(
                                self.out,
                                " A {:.6},{:.6} {:.6} {},{} {:.6},{:.6}",
                                rx,
                                ry,
                                rot,
                                large_arc,
                                sweep,
                                self.tx(x2),
                                self.ty(y2)
                            )?;
                        }
                        HatchSegment::Spline {
                            control_points,
                            fit_points,
                        } => {
                            // Polyline approximation through whichever point
                            // set the path carries.
                            let points = if !control_points.is_empty() {
                                control_points
                            } else {
                                fit_points
                            };
                            for p in points {
                                if p.has_nan() {
                                    continue;
                                }
                                if first_point {
                                    write!(
                                        self.out,
                                        "M {:.6},{:.6}",
                                        self.tx(p.x),
                                        self.ty(p.y)
                                    )?;
                                    first_point = false;
                                } else {
                                    write!(
                                        self.out,
                                        " L {:.6},{:.6}",
                                        self.tx(p.x),
                                        self.ty(p.y)
                                    )?;
                                }
                            }
                        }
                    }
                }
                write!(self.out, " Z")
            }
        }
    }

    fn emit_text(&mut self, entity: &Entity, text: &Text) -> io::Result<()> {
        if text.ins_pt.has_nan() || text.extrusion.has_nan() {
            return Ok(self.skip(entity, "nan attribute"));
        }
        let style = text.style.and_then(|id| self.drawing.style(id));
        let font = resolve_font(style);
        let anchor_pt = if text.horiz_alignment != 0 || text.vert_alignment != 0 {
            text.alignment_pt
        } else {
            text.ins_pt
        };
        if anchor_pt.has_nan() {
            return Ok(self.skip(entity, "nan alignment point"));
        }
        let pt = ocs_to_wcs_2d(anchor_pt, text.extrusion);
        let mut wf = text.width_factor;
        if wf == 0.0 {
            wf = style.map(|s| s.width_factor).unwrap_or(0.0);
        }
        if wf == 0.0 {
            wf = 1.0;
        }
        // TEXT rotation is never applied; ATTDEF is the rotated variant.
        self.emit_text_element(
            entity,
            self.tx(pt.x),
            self.ty(pt.y),
            font.family,
            text.height / font.cap_height_ratio,
            text_anchor(text.horiz_alignment),
            dominant_baseline(text.vert_alignment),
            0.0,
            wf,
            &escape_xml(&text.value),
        )
    }

    fn emit_attdef(&mut self, entity: &Entity, attdef: &AttDef) -> io::Result<()> {
        if attdef.ins_pt.has_nan() || attdef.extrusion.has_nan() || attdef.rotation.is_nan() {
            return Ok(self.skip(entity, "nan attribute"));
        }
        let style = attdef.style.and_then(|id| self.drawing.style(id));
        let font = resolve_font(style);
        let anchor_pt = if attdef.horiz_alignment != 0 || attdef.vert_alignment != 0 {
            attdef.alignment_pt
        } else {
            attdef.ins_pt
        };
        if anchor_pt.has_nan() {
            return Ok(self.skip(entity, "nan alignment point"));
        }
        let pt = ocs_to_wcs_2d(anchor_pt, attdef.extrusion);
        let mut wf = attdef.width_factor;
        if wf == 0.0 {
            wf = style.map(|s| s.width_factor).unwrap_or(0.0);
        }
        if wf == 0.0 {
            wf = 1.0;
        }
        self.emit_text_element(
            entity,
            self.tx(pt.x),
            self.ty(pt.y),
            font.family,
            attdef.height / font.cap_height_ratio,
            text_anchor(attdef.horiz_alignment),
            dominant_baseline(attdef.vert_alignment),
            attdef.rotation.to_degrees(),
            wf,
            &escape_xml(&attdef.tag),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_text_element(
        &mut self,
        entity: &Entity,
        x: f64,
        y: f64,
        family: &str,
        font_size: f64,
        anchor: &str,
        baseline: &str,
        rotation_deg: f64,
        width_factor: f64,
        escaped: &str,
    ) -> io::Result<()> {
        let color = entity_color(self.drawing, entity);
        let has_rotation = rotation_deg.abs() > 0.001;
        let has_scale = (width_factor - 1.0).abs() > 0.001;
        // The scale transform multiplies x, so the anchor is pre-divided to
        // stay put.
        let tx = if has_scale { x / width_factor } else { x };

        write!(
            self.out,
            "\t<text id=\"dwg-object-{}\" x=\"{:.6}\" y=\"{:.6}\" \
             font-family=\"{}\" font-size=\"{:.6}\" fill=\"{}\" \
             text-anchor=\"{}\" dominant-baseline=\"{}\"",
            entity.index, tx, y, family, font_size, color, anchor, baseline
        )?;

        if has_rotation && has_scale {
            write!(
                self.out,
                " transform=\"rotate({:.6} {:.6} {:.6}) scale({:.6} 1)\"",
                -rotation_deg, tx, y, width_factor
            )?;
        } else if has_rotation {
            write!(
                self.out,
                " transform=\"rotate({:.6} {:.6} {:.6})\"",
                -rotation_deg, tx, y
            )?;
        } else if has_scale {
            write!(self.out, " transform=\"scale({:.6} 1)\"", width_factor)?;
        }

        write!(self.out, ">{}</text>\n", escaped)
    }

    fn emit_insert(&mut self, entity: &Entity, insert: &Insert) -> io::Result<()> {
        let block: Option<&Block> = insert.block.and_then(|id| self.drawing.block(id));
        let Some(block) = block else {
            return write!(self.out, "\t<!-- WRONG INSERT({}) -->\n", entity.index);
        };
        if insert.ins_pt.has_nan()
            || insert.extrusion.has_nan()
            || insert.rotation.is_nan()
            || insert.scale.has_nan()
        {
            return Ok(self.skip(entity, "nan attribute"));
        }
        let ins_pt = ocs_to_wcs(insert.ins_pt, insert.extrusion);

        // The symbol stores raw coordinates; this transform moves the base
        // point to the insertion point, applies the scale, and folds in the
        // viewport translate and Y flip:
        //   X' = sx * geom.x + (ins.x - sx * base.x - xmin)
        //   Y' = -sy * geom.y + (page_height - ins.y + sy * base.y + ymin)
        let sx = insert.scale.x;
        let sy = insert.scale.y;
        let tx = ins_pt.x - sx * block.base_pt.x - self.viewport.xmin;
        let ty = self.viewport.height - ins_pt.y + sy * block.base_pt.y + self.viewport.ymin;

        self.fragment_comment(entity)?;
        if insert.rotation.abs() < 0.0001 {
            write!(
                self.out,
                "\t<use id=\"dwg-object-{}\" transform=\"matrix({:.6} 0 0 {:.6} {:.6} {:.6})\" \
                 xlink:href=\"#symbol-{}\" />\n",
                entity.index, sx, -sy, tx, ty, block.handle
            )
        } else {
            // Rotation negated: CAD CCW reads as CW once Y is flipped.
            write!(
                self.out,
                "\t<use id=\"dwg-object-{}\" transform=\"translate({:.6} {:.6}) rotate({:.6}) \
                 scale({:.6} {:.6})\" xlink:href=\"#symbol-{}\" />\n",
                entity.index,
                tx,
                ty,
                -insert.rotation.to_degrees(),
                sx,
                -sy,
                block.handle
            )
        }
    }

    fn emit_image(&mut self, entity: &Entity, img: &Image) -> io::Result<()> {
        if img.pt0.has_nan() || img.uvec.has_nan() || img.vvec.has_nan() || img.size.has_nan() {
            return Ok(self.skip(entity, "nan attribute"));
        }
        let file_path = img
            .image_def
            .and_then(|id| self.drawing.image_def(id))
            .map(|def| escape_xml(&def.file_path))
            .unwrap_or_default();

        let width = img.size.x;
        let height = img.size.y;
        // uvec/vvec are per-pixel; the full-extent v vector locates the
        // upper-left corner, which is where SVG anchors an <image>.
        let vx = img.vvec.x * height;
        let vy = img.vvec.y * height;
        let x = img.pt0.x + vx;
        let y = img.pt0.y + vy;

        // Per-pixel basis with the Y flip folded in.
        let a = img.uvec.x;
        let b = -img.uvec.y;
        let c = -img.vvec.x;
        let d = img.vvec.y;
        let e = self.tx(x);
        let f = self.ty(y);

        self.fragment_comment(entity)?;
        write!(
            self.out,
            "\t<image id=\"dwg-object-{}\" width=\"{:.6}\" height=\"{:.6}\" \
             transform=\"matrix({:.6} {:.6} {:.6} {:.6} {:.6} {:.6})\" \
             xlink:href=\"{}\" preserveAspectRatio=\"none\" />\n",
            entity.index, width, height, a, b, c, d, e, f, file_path
        )
    }

    /// RAY and XLINE are unbounded; only the part crossing the model
    /// extents box is drawn. Reciprocal-direction slab intersection.
    fn emit_infinite_line(
        &mut self,
        entity: &Entity,
        line: &InfiniteLine,
        semi_infinite: bool,
    ) -> io::Result<()> {
        if line.point.has_nan() || line.vector.has_nan() {
            return Ok(self.skip(entity, "nan attribute"));
        }
        if line.vector.x == 0.0 && line.vector.y == 0.0 {
            return Ok(self.skip(entity, "degenerate direction"));
        }
        let mut tmin = f64::NEG_INFINITY;
        let mut tmax = f64::INFINITY;
        let slabs = [
            (
                line.point.x,
                line.vector.x,
                self.viewport.xmin,
                self.viewport.xmax,
            ),
            (
                line.point.y,
                line.vector.y,
                self.viewport.ymin,
                self.viewport.ymax,
            ),
        ];
        for (origin, dir, lo, hi) in slabs {
            if dir == 0.0 {
                if origin < lo || origin > hi {
                    return Ok(self.skip(entity, "outside extents"));
                }
                continue;
            }
            let inv = 1.0 / dir;
            let t1 = (lo - origin) * inv;
            let t2 = (hi - origin) * inv;
            tmin = tmin.max(t1.min(t2));
            tmax = tmax.min(t1.max(t2));
        }
        if semi_infinite {
            tmin = tmin.max(0.0);
        }
        if tmax < tmin || !tmin.is_finite() || !tmax.is_finite() {
            return Ok(self.skip(entity, "outside extents"));
        }
        let x1 = line.point.x + tmin * line.vector.x;
        let y1 = line.point.y + tmin * line.vector.y;
        let x2 = line.point.x + tmax * line.vector.x;
        let y2 = line.point.y + tmax * line.vector.y;
        self.fragment_comment(entity)?;
        write!(
            self.out,
            "\t<path id=\"dwg-object-{}\" d=\"M {:.6},{:.6} L {:.6},{:.6}\"",
            entity.index,
            self.tx(x1),
            self.ty(y1),
            self.tx(x2),
            self.ty(y2)
        )?;
        self.common_style(entity)
    }
}
