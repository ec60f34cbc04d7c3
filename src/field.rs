use std::{
    fmt::Debug,
    io,
    ops::{
        Add,
        AddAssign,
        Mul,
        MulAssign,
        Sub,
        SubAssign,
    },
};

use num::{
    Complex,
    Zero,
    complex::Complex64,
};

/// Element type of a field buffer.
///
/// Real storage is used for ordinary runs, complex storage when a Bloch
/// wavevector forces phase factors across periodic boundaries. The choice is
/// made once at engine construction and is uniform across all fields and
/// material state.
pub trait FieldScalar:
    Copy
    + Debug
    + PartialEq
    + Send
    + Sync
    + Zero
    + Add<Output = Self>
    + AddAssign
    + Sub<Output = Self>
    + SubAssign
    + Mul<Output = Self>
    + MulAssign
    + 'static
{
    const COMPLEX: bool;

    fn from_real(value: f64) -> Self;

    fn real(self) -> f64;

    fn norm_sqr(self) -> f64;

    fn scale(self, factor: f64) -> Self;

    /// Factor applied to a halo slab received from a neighbor.
    ///
    /// Complex storage turns this into the Bloch phase `exp(i * angle)`.
    /// Real storage returns zero: the boundary decouples entirely, a
    /// PEC-like truncation behind whatever absorber the scene placed inside
    /// the domain. Do not change the zero to an identity.
    fn bloch_phase(angle: f64) -> Self;

    /// Unit phasor `exp(i * angle)`, projected onto the representable part
    /// for real storage.
    fn cis(angle: f64) -> Self;

    fn write_sample(&self, out: &mut dyn io::Write) -> io::Result<()>;
}

impl FieldScalar for f64 {
    const COMPLEX: bool = false;

    fn from_real(value: f64) -> Self {
        value
    }

    fn real(self) -> f64 {
        self
    }

    fn norm_sqr(self) -> f64 {
        self * self
    }

    fn scale(self, factor: f64) -> Self {
        self * factor
    }

    fn bloch_phase(_angle: f64) -> Self {
        0.0
    }

    fn cis(angle: f64) -> Self {
        angle.cos()
    }

    fn write_sample(&self, out: &mut dyn io::Write) -> io::Result<()> {
        write!(out, "{self:e}")
    }
}

impl FieldScalar for Complex64 {
    const COMPLEX: bool = true;

    fn from_real(value: f64) -> Self {
        Complex::new(value, 0.0)
    }

    fn real(self) -> f64 {
        self.re
    }

    fn norm_sqr(self) -> f64 {
        Complex::norm_sqr(&self)
    }

    fn scale(self, factor: f64) -> Self {
        self * factor
    }

    fn bloch_phase(angle: f64) -> Self {
        Complex::cis(angle)
    }

    fn cis(angle: f64) -> Self {
        Complex::cis(angle)
    }

    fn write_sample(&self, out: &mut dyn io::Write) -> io::Result<()> {
        write!(out, "{:e} {:e}", self.re, self.im)
    }
}

#[cfg(test)]
mod tests {
    use num::complex::Complex64;

    use super::FieldScalar;

    #[test]
    fn real_bloch_phase_decouples() {
        assert_eq!(f64::bloch_phase(1.25), 0.0);
        assert_eq!(f64::bloch_phase(0.0), 0.0);
    }

    #[test]
    fn complex_bloch_phase_is_a_unit_phasor() {
        let phase = Complex64::bloch_phase(0.75);
        assert!((phase.norm() - 1.0).abs() < 1e-15);
        assert!((phase.arg() - 0.75).abs() < 1e-15);
    }
}
