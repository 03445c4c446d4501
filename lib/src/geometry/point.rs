//! Vector types for 2D and 3D geometry.
//!
//! Support planning works entirely in floating-point millimetres, so unlike
//! a slicing core there is no scaled-integer representation here: [`Vec2`]
//! and [`Vec3`] are plain `f64` vectors. [`Rotation3`] provides the one
//! rotation the planner needs, the shortest rotation taking one direction
//! onto another (used to aim pinheads and bridge cylinders).

use crate::CoordF;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// A 2D vector (mm).
#[derive(Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: CoordF,
    pub y: CoordF,
}

impl Vec2 {
    /// Create a new vector from its components.
    #[inline]
    pub const fn new(x: CoordF, y: CoordF) -> Self {
        Self { x, y }
    }

    /// The zero vector.
    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    /// Dot product.
    #[inline]
    pub fn dot(&self, other: &Self) -> CoordF {
        self.x * other.x + self.y * other.y
    }

    /// 2D pseudo-cross product. Positive if `other` is counter-clockwise
    /// from `self`.
    #[inline]
    pub fn cross(&self, other: &Self) -> CoordF {
        self.x * other.y - self.y * other.x
    }

    /// Squared length.
    #[inline]
    pub fn length_squared(&self) -> CoordF {
        self.x * self.x + self.y * self.y
    }

    /// Length.
    #[inline]
    pub fn length(&self) -> CoordF {
        self.length_squared().sqrt()
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(&self, other: &Self) -> CoordF {
        (*other - *self).length()
    }
}

impl fmt::Debug for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec2({:.6}, {:.6})", self.x, self.y)
    }
}

impl Add for Vec2 {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<CoordF> for Vec2 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: CoordF) -> Self {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

/// A 3D vector (mm).
#[derive(Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: CoordF,
    pub y: CoordF,
    pub z: CoordF,
}

impl Vec3 {
    /// Create a new vector from its components.
    #[inline]
    pub const fn new(x: CoordF, y: CoordF, z: CoordF) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    #[inline]
    pub const fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    /// Dot product.
    #[inline]
    pub fn dot(&self, other: &Self) -> CoordF {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product.
    #[inline]
    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Squared length.
    #[inline]
    pub fn length_squared(&self) -> CoordF {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Length.
    #[inline]
    pub fn length(&self) -> CoordF {
        self.length_squared().sqrt()
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(&self, other: &Self) -> CoordF {
        (*other - *self).length()
    }

    /// Unit vector with the same direction. The zero vector is returned
    /// unchanged.
    pub fn normalized(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            *self / len
        } else {
            *self
        }
    }

    /// Projection onto the XY plane.
    #[inline]
    pub fn xy(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Component-wise minimum.
    #[inline]
    pub fn min(&self, other: &Self) -> Self {
        Self::new(
            self.x.min(other.x),
            self.y.min(other.y),
            self.z.min(other.z),
        )
    }

    /// Component-wise maximum.
    #[inline]
    pub fn max(&self, other: &Self) -> Self {
        Self::new(
            self.x.max(other.x),
            self.y.max(other.y),
            self.z.max(other.z),
        )
    }

    /// Get component by axis index (0 = x, 1 = y, 2 = z).
    #[inline]
    pub fn component(&self, idx: usize) -> CoordF {
        match idx {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Spherical coordinates of the vector's direction: `(polar, azimuth)`
    /// with the polar angle measured from +z and the azimuth from +x in the
    /// XY plane.
    pub fn spherical(&self) -> (CoordF, CoordF) {
        let polar = (self.z / self.length()).clamp(-1.0, 1.0).acos();
        let azimuth = self.y.atan2(self.x);
        (polar, azimuth)
    }

    /// Unit vector from spherical coordinates (see [`Vec3::spherical`]).
    pub fn from_spherical(polar: CoordF, azimuth: CoordF) -> Self {
        Self::new(
            azimuth.cos() * polar.sin(),
            azimuth.sin() * polar.sin(),
            polar.cos(),
        )
    }
}

impl fmt::Debug for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec3({:.6}, {:.6}, {:.6})", self.x, self.y, self.z)
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl AddAssign for Vec3 {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl SubAssign for Vec3 {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.x -= other.x;
        self.y -= other.y;
        self.z -= other.z;
    }
}

impl Neg for Vec3 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<CoordF> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: CoordF) -> Self {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl Div<CoordF> for Vec3 {
    type Output = Self;

    #[inline]
    fn div(self, scalar: CoordF) -> Self {
        Self::new(self.x / scalar, self.y / scalar, self.z / scalar)
    }
}

/// A 3x3 rotation matrix.
///
/// Only the operations the planner needs are provided: construction from a
/// pair of directions and application to a vector.
#[derive(Debug, Clone, Copy)]
pub struct Rotation3 {
    m: [[CoordF; 3]; 3],
}

impl Rotation3 {
    /// The identity rotation.
    pub fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// The shortest rotation taking direction `from` onto direction `to`
    /// (inputs need not be unit length).
    ///
    /// Antiparallel inputs rotate by pi about a stable axis orthogonal to
    /// `from`.
    pub fn from_two_vectors(from: Vec3, to: Vec3) -> Self {
        let f = from.normalized();
        let t = to.normalized();
        let v = f.cross(&t);
        let c = f.dot(&t);

        if v.length_squared() < 1e-18 {
            if c > 0.0 {
                return Self::identity();
            }
            // Antiparallel: half-turn about an axis orthogonal to `from`.
            let reference = if f.y.abs() < 0.9 {
                Vec3::new(0.0, 1.0, 0.0)
            } else {
                Vec3::new(1.0, 0.0, 0.0)
            };
            let a = f.cross(&reference).normalized();
            let axis = [a.x, a.y, a.z];
            let mut m = [[0.0; 3]; 3];
            for (i, row) in m.iter_mut().enumerate() {
                for (j, entry) in row.iter_mut().enumerate() {
                    *entry = 2.0 * axis[i] * axis[j] - if i == j { 1.0 } else { 0.0 };
                }
            }
            return Self { m };
        }

        // Rodrigues' formula, R = I + [v]x + [v]x^2 / (1 + c).
        let k = 1.0 / (1.0 + c);
        let vx = [[0.0, -v.z, v.y], [v.z, 0.0, -v.x], [-v.y, v.x, 0.0]];
        let mut m = [[0.0; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                let mut vx2 = 0.0;
                for (l, row) in vx.iter().enumerate() {
                    vx2 += vx[i][l] * row[j];
                }
                m[i][j] = if i == j { 1.0 } else { 0.0 } + vx[i][j] + vx2 * k;
            }
        }
        Self { m }
    }

    /// Apply the rotation to a vector.
    pub fn apply(&self, v: Vec3) -> Vec3 {
        Vec3::new(
            self.m[0][0] * v.x + self.m[0][1] * v.y + self.m[0][2] * v.z,
            self.m[1][0] * v.x + self.m[1][1] * v.y + self.m[1][2] * v.z,
            self.m[2][0] * v.x + self.m[2][1] * v.y + self.m[2][2] * v.z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_vec3_basic_ops() {
        let a = Vec3::new(1.0, 0.0, 0.0);
        let b = Vec3::new(0.0, 1.0, 0.0);

        assert!((a.dot(&b)).abs() < 1e-12);
        let c = a.cross(&b);
        assert!((c.z - 1.0).abs() < 1e-12);
        assert!(((a + b).length() - 2.0f64.sqrt()).abs() < 1e-12);
        assert!(((a * 3.0).length() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_vec3_normalized() {
        let v = Vec3::new(3.0, 4.0, 0.0).normalized();
        assert!((v.length() - 1.0).abs() < 1e-12);
        assert!((v.x - 0.6).abs() < 1e-12);

        // Zero vector stays zero instead of producing NaN.
        let z = Vec3::zero().normalized();
        assert_eq!(z, Vec3::zero());
    }

    #[test]
    fn test_spherical_roundtrip() {
        let n = Vec3::new(0.3, -0.4, -0.6).normalized();
        let (polar, azimuth) = n.spherical();
        let back = Vec3::from_spherical(polar, azimuth);
        assert!((n - back).length() < 1e-12);
    }

    #[test]
    fn test_spherical_reference_directions() {
        let (polar, _) = Vec3::new(0.0, 0.0, -1.0).spherical();
        assert!((polar - PI).abs() < 1e-12);
        let (polar, _) = Vec3::new(1.0, 0.0, 0.0).spherical();
        assert!((polar - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_rotation_aligns_directions() {
        let from = Vec3::new(0.0, 0.0, -1.0);
        let to = Vec3::new(1.0, 1.0, -1.0).normalized();
        let rot = Rotation3::from_two_vectors(from, to);
        let rotated = rot.apply(from);
        assert!((rotated - to).length() < 1e-12);
    }

    #[test]
    fn test_rotation_identity_for_parallel() {
        let d = Vec3::new(0.2, -0.3, -0.9).normalized();
        let rot = Rotation3::from_two_vectors(d, d);
        let p = Vec3::new(1.5, -2.0, 0.25);
        assert!((rot.apply(p) - p).length() < 1e-12);
    }

    #[test]
    fn test_rotation_antiparallel() {
        let from = Vec3::new(0.0, 0.0, -1.0);
        let to = Vec3::new(0.0, 0.0, 1.0);
        let rot = Rotation3::from_two_vectors(from, to);
        assert!((rot.apply(from) - to).length() < 1e-12);

        // A half turn applied twice is the identity.
        let p = Vec3::new(0.7, 0.1, -0.4);
        assert!((rot.apply(rot.apply(p)) - p).length() < 1e-12);
    }

    #[test]
    fn test_rotation_preserves_length() {
        let rot = Rotation3::from_two_vectors(
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.5, -0.5, 0.3).normalized(),
        );
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert!((rot.apply(p).length() - p.length()).abs() < 1e-12);
    }

    #[test]
    fn test_vec2_cross_orientation() {
        let a = Vec2::new(1.0, 0.0);
        let b = Vec2::new(0.0, 1.0);
        assert!(a.cross(&b) > 0.0);
        assert!(b.cross(&a) < 0.0);
    }
}
