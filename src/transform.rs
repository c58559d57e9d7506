use crate::model::{Point2, Point3};

/// Threshold of the arbitrary-axis algorithm: below this the extrusion is
/// considered close enough to the world Z axis that the world Y axis seeds
/// the basis instead.
const ARBITRARY_AXIS_LIMIT: f64 = 1.0 / 64.0;

fn cross(a: Point3, b: Point3) -> Point3 {
    Point3::new(
        a.y * b.z - a.z * b.y,
        a.z * b.x - a.x * b.z,
        a.x * b.y - a.y * b.x,
    )
}

fn normalize(v: Point3) -> Point3 {
    let len = (v.x * v.x + v.y * v.y + v.z * v.z).sqrt();
    if len == 0.0 {
        return v;
    }
    Point3::new(v.x / len, v.y / len, v.z / len)
}

fn ocs_basis(extrusion: Point3) -> (Point3, Point3, Point3) {
    let az = normalize(extrusion);
    let seed = if az.x.abs() < ARBITRARY_AXIS_LIMIT && az.y.abs() < ARBITRARY_AXIS_LIMIT {
        Point3::new(0.0, 1.0, 0.0)
    } else {
        Point3::new(0.0, 0.0, 1.0)
    };
    let ax = normalize(cross(seed, az));
    let ay = normalize(cross(az, ax));
    (ax, ay, az)
}

/// Project an OCS point into WCS along the entity's extrusion normal,
/// using the DWG arbitrary-axis algorithm.
pub fn ocs_to_wcs(pt: Point3, extrusion: Point3) -> Point3 {
    if extrusion.x == 0.0 && extrusion.y == 0.0 && extrusion.z == 1.0 {
        return pt;
    }
    if extrusion.x == 0.0 && extrusion.y == 0.0 && extrusion.z == -1.0 {
        return Point3::new(-pt.x, pt.y, pt.z);
    }
    let (ax, ay, az) = ocs_basis(extrusion);
    Point3::new(
        pt.x * ax.x + pt.y * ay.x + pt.z * az.x,
        pt.x * ax.y + pt.y * ay.y + pt.z * az.y,
        pt.x * ax.z + pt.y * ay.z + pt.z * az.z,
    )
}

/// 2D variant for entities whose geometry is planar in the OCS.
pub fn ocs_to_wcs_2d(pt: Point2, extrusion: Point3) -> Point2 {
    if extrusion.x == 0.0 && extrusion.y == 0.0 && extrusion.z == 1.0 {
        return pt;
    }
    if extrusion.x == 0.0 && extrusion.y == 0.0 && extrusion.z == -1.0 {
        return Point2::new(-pt.x, pt.y);
    }
    let (ax, ay, _) = ocs_basis(extrusion);
    Point2::new(pt.x * ax.x + pt.y * ay.x, pt.x * ax.y + pt.y * ay.y)
}

/// The WCS window mapped onto the SVG viewport. `width`/`height` are
/// always strictly positive (100.0 fallback for degenerate drawings).
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        let mut width = xmax - xmin;
        let mut height = ymax - ymin;
        if width.is_nan() || width <= 0.0 {
            width = 100.0;
        }
        if height.is_nan() || height <= 0.0 {
            height = 100.0;
        }
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
            width,
            height,
        }
    }

    /// WCS x to SVG user-space x.
    pub fn x(&self, x: f64) -> f64 {
        x - self.xmin
    }

    /// WCS y to SVG user-space y (flips the axis).
    pub fn y(&self, y: f64) -> f64 {
        self.height - (y - self.ymin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn identity_extrusion_is_passthrough() {
        let pt = Point3::new(3.0, 4.0, 5.0);
        let out = ocs_to_wcs(pt, Point3::unit_z());
        assert_eq!(out, pt);
    }

    #[test]
    fn negative_z_extrusion_mirrors_x() {
        let out = ocs_to_wcs(Point3::new(3.0, 4.0, 0.0), Point3::new(0.0, 0.0, -1.0));
        assert!((out.x + 3.0).abs() < EPS);
        assert!((out.y - 4.0).abs() < EPS);
    }

    #[test]
    fn tilted_extrusion_builds_orthonormal_basis() {
        // Extrusion along +X: Ax = Z x N = (0,1,0).
        let n = Point3::new(1.0, 0.0, 0.0);
        let out = ocs_to_wcs(Point3::new(1.0, 0.0, 0.0), n);
        assert!((out.x).abs() < EPS);
        assert!((out.y - 1.0).abs() < EPS);
        assert!((out.z).abs() < EPS);
    }

    #[test]
    fn viewport_flips_y() {
        let vp = Viewport::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(vp.x(0.0), 0.0);
        assert_eq!(vp.y(0.0), 10.0);
        assert_eq!(vp.y(10.0), 0.0);
    }

    #[test]
    fn degenerate_viewport_defaults_to_100() {
        let vp = Viewport::new(5.0, 5.0, 5.0, 5.0);
        assert_eq!(vp.width, 100.0);
        assert_eq!(vp.height, 100.0);
        let vp = Viewport::new(0.0, 0.0, f64::NAN, 10.0);
        assert_eq!(vp.width, 100.0);
    }
}
