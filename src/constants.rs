use nalgebra::{
    Scalar,
    Vector3,
};
use num::{
    One,
    Zero,
};
use serde::{
    Deserialize,
    Serialize,
};
use strum::EnumIter;

/// Vacuum permittivity in the normalized unit system used throughout.
pub const EPSILON0: f64 = 1.0;

/// Vacuum permeability in the normalized unit system used throughout.
pub const MU0: f64 = 1.0;

/// Speed of light in vacuum.
pub const C0: f64 = 1.0;

/// Vacuum impedance.
pub const Z0: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Position of this axis in x, y, z storage order.
    pub fn index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// A unit step along this axis, used to move between neighboring
    /// staggered samples.
    pub fn unit<T>(&self) -> Vector3<T>
    where
        T: Scalar + Zero + One,
    {
        let (x, y, z) = match self {
            Axis::X => (T::one(), T::zero(), T::zero()),
            Axis::Y => (T::zero(), T::one(), T::zero()),
            Axis::Z => (T::zero(), T::zero(), T::one()),
        };
        Vector3::new(x, y, z)
    }

    /// The next axis in cyclic x, y, z order.
    pub fn cyclic_next(&self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::Z,
            Axis::Z => Axis::X,
        }
    }
}

/// Identity of one of the six staggered field components.
///
/// The discriminant doubles as a message tag for the halo exchange and as an
/// index into per-component storage.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, Serialize, Deserialize,
)]
pub enum Component {
    Ex,
    Ey,
    Ez,
    Hx,
    Hy,
    Hz,
}

impl Component {
    pub const ALL: [Component; 6] = [
        Component::Ex,
        Component::Ey,
        Component::Ez,
        Component::Hx,
        Component::Hy,
        Component::Hz,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Message tag used by the halo exchange.
    pub fn tag(&self) -> u32 {
        *self as u32
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Component::Ex => "ex",
            Component::Ey => "ey",
            Component::Ez => "ez",
            Component::Hx => "hx",
            Component::Hy => "hy",
            Component::Hz => "hz",
        }
    }

    pub fn is_electric(&self) -> bool {
        matches!(self, Component::Ex | Component::Ey | Component::Ez)
    }

    pub fn is_magnetic(&self) -> bool {
        !self.is_electric()
    }

    /// The axis along which this component points.
    pub fn normal(&self) -> Axis {
        match self {
            Component::Ex | Component::Hx => Axis::X,
            Component::Ey | Component::Hy => Axis::Y,
            Component::Ez | Component::Hz => Axis::Z,
        }
    }

    /// The two axes along which the curl derivatives of this component are
    /// taken, in update order.
    pub fn tangential(&self) -> (Axis, Axis) {
        let normal = self.normal();
        (normal.cyclic_next(), normal.cyclic_next().cyclic_next())
    }

    /// The pair of opposite-type components read by this component's update,
    /// in the order their derivatives enter the curl.
    pub fn curl_sources(&self) -> (Component, Component) {
        let (a, b) = self.tangential();
        if self.is_electric() {
            (Component::magnetic(b), Component::magnetic(a))
        }
        else {
            (Component::electric(b), Component::electric(a))
        }
    }

    pub fn electric(normal: Axis) -> Component {
        match normal {
            Axis::X => Component::Ex,
            Axis::Y => Component::Ey,
            Axis::Z => Component::Ez,
        }
    }

    pub fn magnetic(normal: Axis) -> Component {
        match normal {
            Axis::X => Component::Hx,
            Axis::Y => Component::Hy,
            Axis::Z => Component::Hz,
        }
    }

    /// Offset of this component's sample from the integer lattice point with
    /// the same index, in units of cells.
    ///
    /// Magnetic components are stored shifted by one along their tangential
    /// axes so that index 0 is the low halo row, hence the negative halves.
    pub fn stagger(&self) -> Vector3<f64> {
        match self {
            Component::Ex => Vector3::new(0.5, 0.0, 0.0),
            Component::Ey => Vector3::new(0.0, 0.5, 0.0),
            Component::Ez => Vector3::new(0.0, 0.0, 0.5),
            Component::Hx => Vector3::new(0.0, -0.5, -0.5),
            Component::Hy => Vector3::new(-0.5, 0.0, -0.5),
            Component::Hz => Vector3::new(-0.5, -0.5, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::{
        Axis,
        Component,
    };

    #[test]
    fn curl_sources_match_the_yee_stencil() {
        assert_eq!(
            Component::Ex.curl_sources(),
            (Component::Hz, Component::Hy)
        );
        assert_eq!(
            Component::Ey.curl_sources(),
            (Component::Hx, Component::Hz)
        );
        assert_eq!(
            Component::Ez.curl_sources(),
            (Component::Hy, Component::Hx)
        );
        assert_eq!(
            Component::Hx.curl_sources(),
            (Component::Ez, Component::Ey)
        );
        assert_eq!(
            Component::Hy.curl_sources(),
            (Component::Ex, Component::Ez)
        );
        assert_eq!(
            Component::Hz.curl_sources(),
            (Component::Ey, Component::Ex)
        );
    }

    #[test]
    fn tangential_axes_are_cyclic() {
        assert_eq!(Component::Ex.tangential(), (Axis::Y, Axis::Z));
        assert_eq!(Component::Hy.tangential(), (Axis::Z, Axis::X));
        assert_eq!(Component::Hz.tangential(), (Axis::X, Axis::Y));
    }

    #[test]
    fn tags_are_unique() {
        let mut tags: Vec<u32> = Component::iter().map(|c| c.tag()).collect();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), 6);
    }
}
