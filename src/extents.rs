use std::collections::HashSet;

use crate::model::{BlockId, Drawing, Entity, EntityKind, HatchPath, HatchSegment, Point2};
use crate::transform::{ocs_to_wcs, ocs_to_wcs_2d, Viewport};

/// Axis-aligned bounding box accumulator. NaN inputs are ignored so a
/// single bad coordinate cannot poison the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extents {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    pub initialized: bool,
}

impl Extents {
    pub fn new() -> Self {
        Self {
            xmin: f64::INFINITY,
            ymin: f64::INFINITY,
            xmax: f64::NEG_INFINITY,
            ymax: f64::NEG_INFINITY,
            initialized: false,
        }
    }

    pub fn add_point(&mut self, x: f64, y: f64) {
        if x.is_nan() || y.is_nan() {
            return;
        }
        if x < self.xmin {
            self.xmin = x;
        }
        if x > self.xmax {
            self.xmax = x;
        }
        if y < self.ymin {
            self.ymin = y;
        }
        if y > self.ymax {
            self.ymax = y;
        }
        self.initialized = true;
    }

    pub fn add_circle(&mut self, cx: f64, cy: f64, radius: f64) {
        if cx.is_nan() || cy.is_nan() || radius.is_nan() {
            return;
        }
        self.add_point(cx - radius, cy - radius);
        self.add_point(cx + radius, cy + radius);
    }
}

impl Default for Extents {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounds of every renderable entity in the spaces the render pass will
/// visit: paper space (unless `mspace_only`) plus model space.
pub fn drawing_extents(drawing: &Drawing, mspace_only: bool) -> Extents {
    let mut ext = Extents::new();
    let mut visiting = HashSet::new();
    if !mspace_only {
        if let Some(id) = drawing.paper_space {
            block_extents(drawing, id, &mut ext, &mut visiting);
        }
    }
    if let Some(id) = drawing.model_space {
        block_extents(drawing, id, &mut ext, &mut visiting);
    }
    ext
}

/// The SVG viewport for a drawing: computed extents, falling back to the
/// header-stored extents, falling back to a 100×100 window at the origin.
pub fn drawing_viewport(drawing: &Drawing, mspace_only: bool) -> Viewport {
    let ext = drawing_extents(drawing, mspace_only);
    if ext.initialized {
        return Viewport::new(ext.xmin, ext.ymin, ext.xmax, ext.ymax);
    }
    if let (Some(min), Some(max)) = (drawing.extents_min, drawing.extents_max) {
        if !min.has_nan() && !max.has_nan() {
            return Viewport::new(min.x, min.y, max.x, max.y);
        }
    }
    Viewport::new(0.0, 0.0, 100.0, 100.0)
}

fn block_extents(
    drawing: &Drawing,
    id: BlockId,
    ext: &mut Extents,
    visiting: &mut HashSet<BlockId>,
) {
    let Some(block) = drawing.block(id) else {
        return;
    };
    for entity in &block.entities {
        entity_extents(drawing, entity, ext, visiting);
    }
}

fn entity_extents(
    drawing: &Drawing,
    entity: &Entity,
    ext: &mut Extents,
    visiting: &mut HashSet<BlockId>,
) {
    if drawing.entity_hidden(entity) {
        return;
    }
    match &entity.kind {
        EntityKind::Line(line) => {
            if line.start.has_nan() || line.end.has_nan() || line.extrusion.has_nan() {
                return;
            }
            let start = ocs_to_wcs(line.start, line.extrusion);
            let end = ocs_to_wcs(line.end, line.extrusion);
            ext.add_point(start.x, start.y);
            ext.add_point(end.x, end.y);
        }
        EntityKind::Circle(circle) => {
            if circle.center.has_nan() || circle.extrusion.has_nan() || circle.radius.is_nan() {
                return;
            }
            let center = ocs_to_wcs(circle.center, circle.extrusion);
            ext.add_circle(center.x, center.y, circle.radius);
        }
        EntityKind::Arc(arc) => {
            if arc.center.has_nan() || arc.extrusion.has_nan() || arc.radius.is_nan() {
                return;
            }
            // Conservative: full-circle bounds.
            let center = ocs_to_wcs(arc.center, arc.extrusion);
            ext.add_circle(center.x, center.y, arc.radius);
        }
        EntityKind::Ellipse(ell) => {
            if ell.center.has_nan() || ell.sm_axis.has_nan() || ell.axis_ratio.is_nan() {
                return;
            }
            let rx = (ell.sm_axis.x * ell.sm_axis.x + ell.sm_axis.y * ell.sm_axis.y).sqrt();
            let ry = rx * ell.axis_ratio;
            // Conservative: ignores the major-axis rotation.
            ext.add_circle(ell.center.x, ell.center.y, rx.max(ry));
        }
        EntityKind::Point(point) => {
            if point.position.has_nan() || point.extrusion.has_nan() {
                return;
            }
            let pt = ocs_to_wcs(point.position, point.extrusion);
            ext.add_point(pt.x, pt.y);
        }
        EntityKind::Solid(solid) => {
            if solid.corners.iter().any(Point2::has_nan) {
                return;
            }
            for corner in solid.corners {
                let pt = ocs_to_wcs_2d(corner, solid.extrusion);
                ext.add_point(pt.x, pt.y);
            }
        }
        EntityKind::Face3d(face) => {
            if face.corners.iter().any(|c| c.has_nan()) {
                return;
            }
            for corner in face.corners {
                ext.add_point(corner.x, corner.y);
            }
        }
        EntityKind::Polyline2d(pline) => {
            if pline.extrusion.has_nan() {
                return;
            }
            for vertex in &pline.vertices {
                if vertex.point.has_nan() {
                    continue;
                }
                let pt = ocs_to_wcs_2d(vertex.point, pline.extrusion);
                ext.add_point(pt.x, pt.y);
            }
        }
        EntityKind::LwPolyline(pline) => {
            if pline.extrusion.has_nan() {
                return;
            }
            for point in &pline.points {
                if point.has_nan() {
                    continue;
                }
                let pt = ocs_to_wcs_2d(*point, pline.extrusion);
                ext.add_point(pt.x, pt.y);
            }
        }
        EntityKind::Text(text) => {
            if text.ins_pt.has_nan() || text.extrusion.has_nan() {
                return;
            }
            let pt = ocs_to_wcs_2d(text.ins_pt, text.extrusion);
            ext.add_point(pt.x, pt.y);
            // Heuristic width: five capital heights.
            ext.add_point(pt.x + text.height * 5.0, pt.y + text.height);
        }
        EntityKind::AttDef(attdef) => {
            if attdef.ins_pt.has_nan() || attdef.extrusion.has_nan() {
                return;
            }
            let pt = ocs_to_wcs_2d(attdef.ins_pt, attdef.extrusion);
            ext.add_point(pt.x, pt.y);
            ext.add_point(pt.x + attdef.height * 5.0, pt.y + attdef.height);
        }
        EntityKind::Hatch(hatch) => {
            for path in &hatch.paths {
                hatch_path_extents(path, ext);
            }
        }
        EntityKind::Insert(insert) => {
            insert_extents(drawing, insert, ext, visiting);
        }
        EntityKind::Image(img) => {
            if img.pt0.has_nan()
                || img.uvec.has_nan()
                || img.vvec.has_nan()
                || img.size.has_nan()
            {
                return;
            }
            let ux = img.uvec.x * img.size.x;
            let uy = img.uvec.y * img.size.x;
            let vx = img.vvec.x * img.size.y;
            let vy = img.vvec.y * img.size.y;
            ext.add_point(img.pt0.x, img.pt0.y);
            ext.add_point(img.pt0.x + ux, img.pt0.y + uy);
            ext.add_point(img.pt0.x + ux + vx, img.pt0.y + uy + vy);
            ext.add_point(img.pt0.x + vx, img.pt0.y + vy);
        }
        // Clipped to the extents of everything else, so they contribute
        // nothing themselves.
        EntityKind::Ray(_) | EntityKind::XLine(_) => {}
    }
}

fn hatch_path_extents(path: &HatchPath, ext: &mut Extents) {
    match path {
        HatchPath::Polyline(pp) => {
            for p in &pp.points {
                ext.add_point(p.point.x, p.point.y);
            }
        }
        HatchPath::Segments(segs) => {
            for seg in segs {
                match seg {
                    HatchSegment::Line { start, end } => {
                        ext.add_point(start.x, start.y);
                        ext.add_point(end.x, end.y);
                    }
                    HatchSegment::CircularArc { center, radius, .. } => {
                        ext.add_circle(center.x, center.y, *radius);
                    }
                    HatchSegment::EllipticalArc {
                        center,
                        endpoint,
                        minor_major_ratio,
                        ..
                    } => {
                        let rx = (endpoint.x * endpoint.x + endpoint.y * endpoint.y).sqrt();
                        let ry = rx * minor_major_ratio;
                        ext.add_circle(center.x, center.y, rx.max(ry));
                    }
                    HatchSegment::Spline {
                        control_points,
                        fit_points,
                    } => {
                        for p in control_points.iter().chain(fit_points.iter()) {
                            ext.add_point(p.x, p.y);
                        }
                    }
                }
            }
        }
    }
}

fn insert_extents(
    drawing: &Drawing,
    insert: &crate::model::Insert,
    ext: &mut Extents,
    visiting: &mut HashSet<BlockId>,
) {
    let Some(block_id) = insert.block else {
        return;
    };
    let Some(block) = drawing.block(block_id) else {
        return;
    };
    if insert.ins_pt.has_nan()
        || insert.extrusion.has_nan()
        || insert.scale.has_nan()
        || insert.rotation.is_nan()
    {
        return;
    }
    let ins_pt = ocs_to_wcs(insert.ins_pt, insert.extrusion);

    // A block that inserts itself (directly or through a chain) would
    // recurse forever; the visiting set cuts the cycle.
    if !visiting.insert(block_id) {
        ext.add_point(ins_pt.x, ins_pt.y);
        return;
    }
    let mut block_ext = Extents::new();
    block_extents(drawing, block_id, &mut block_ext, visiting);
    visiting.remove(&block_id);

    if !block_ext.initialized {
        // Empty block: the insertion point still counts.
        ext.add_point(ins_pt.x, ins_pt.y);
        return;
    }

    let (sx, sy) = (insert.scale.x, insert.scale.y);
    let (base_x, base_y) = (block.base_pt.x, block.base_pt.y);
    let (sin_r, cos_r) = insert.rotation.sin_cos();
    let corners = [
        (block_ext.xmin - base_x, block_ext.ymin - base_y),
        (block_ext.xmax - base_x, block_ext.ymin - base_y),
        (block_ext.xmax - base_x, block_ext.ymax - base_y),
        (block_ext.xmin - base_x, block_ext.ymax - base_y),
    ];
    for (cx, cy) in corners {
        let lx = cx * sx;
        let ly = cy * sy;
        let rx = lx * cos_r - ly * sin_r;
        let ry = lx * sin_r + ly * cos_r;
        ext.add_point(ins_pt.x + rx, ins_pt.y + ry);
    }
}
