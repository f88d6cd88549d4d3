//! Vector and spherical helpers shared across the engine.

/// A 3-component double-precision vector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// The zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    /// Construct from components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Component-wise sum.
    pub fn add(self, o: Self) -> Self {
        Self::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }

    /// Component-wise difference.
    pub fn sub(self, o: Self) -> Self {
        Self::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }

    /// Scalar multiply.
    pub fn scale(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }

    /// Dot product.
    pub fn dot(self, o: Self) -> f64 {
        self.x * o.x + self.y * o.y + self.z * o.z
    }

    /// Cross product.
    pub fn cross(self, o: Self) -> Self {
        Self::new(
            self.y * o.z - self.z * o.y,
            self.z * o.x - self.x * o.z,
            self.x * o.y - self.y * o.x,
        )
    }

    /// Euclidean length.
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit-length copy; the zero vector is returned unchanged.
    pub fn normalized(self) -> Self {
        let l = self.length();
        if l == 0.0 {
            self
        } else {
            self.scale(1.0 / l)
        }
    }
}

/// Local east/north tangent basis at a unit-sphere point `p`.
/// Degenerates gracefully at the poles (east falls back to +X).
pub fn local_basis(p: Vec3) -> (Vec3, Vec3) {
    let up = Vec3::new(0.0, 0.0, 1.0);
    let mut east = up.cross(p);
    if east.length() < 1e-12 {
        east = Vec3::new(1.0, 0.0, 0.0);
    }
    let east = east.normalized();
    let north = p.cross(east).normalized();
    (east, north)
}

/// Rotate unit vector `r` about unit `axis` by `theta` radians (Rodrigues).
/// The result is renormalized to suppress floating-point drift.
pub fn rotate_about_axis(r: Vec3, axis: Vec3, theta: f64) -> Vec3 {
    let ct = theta.cos();
    let st = theta.sin();
    let kxr = axis.cross(r);
    let kdr = axis.dot(r);
    let out = r.scale(ct).add(kxr.scale(st)).add(axis.scale(kdr * (1.0 - ct)));
    let n = out.length();
    if n > 0.0 {
        out.scale(1.0 / n)
    } else {
        Vec3::new(0.0, 0.0, 1.0)
    }
}

/// Great-circle distance between two unit vectors, in radians.
pub fn geodesic_distance(a: Vec3, b: Vec3) -> f64 {
    a.dot(b).clamp(-1.0, 1.0).acos()
}

/// Spherically normalized mean of a set of unit vectors.
/// Returns `None` when the accumulated vector is degenerate.
pub fn spherical_mean<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Vec3> {
    let mut acc = Vec3::ZERO;
    let mut count = 0usize;
    for p in points {
        acc = acc.add(p);
        count += 1;
    }
    if count == 0 || acc.length() < 1e-12 {
        return None;
    }
    Some(acc.normalized())
}

/// Spherical triangle area on the unit sphere using the robust vector formula.
pub fn spherical_triangle_area(a: Vec3, b: Vec3, c: Vec3) -> f64 {
    let numerator = a.cross(b).dot(c).abs();
    let denom = 1.0 + a.dot(b) + b.dot(c) + c.dot(a);
    2.0 * numerator.atan2(denom)
}
