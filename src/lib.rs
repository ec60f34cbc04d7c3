//! Three dimensional electromagnetic field solver on a staggered Yee grid.
//!
//! The engine advances the six components of Maxwell's curl equations with
//! the half-step leapfrog scheme, over a rectangular volume described by a
//! scene of material-carrying objects and driven by pointwise sources.
//! Subdomains are distributed over a periodic Cartesian process topology
//! with halo exchange between neighbors; supplying a Bloch wavevector
//! switches all storage to complex and phases the exchanged halos.

pub mod comm;
pub mod constants;
pub mod fdtd;
pub mod field;
pub mod geometry;
pub mod lattice;
pub mod material;
pub mod probe;
pub mod source;
pub mod space;

use nalgebra::Point3;
pub use crate::{
    comm::{
        CartComm,
        ProcessGroup,
    },
    constants::{
        Axis,
        Component,
    },
    fdtd::{
        BlochFdtd,
        Fdtd,
        Mode,
        RealFdtd,
        Setup,
        TimeStep,
    },
    field::FieldScalar,
    geometry::{
        GeomObject,
        GeomTree,
    },
    material::{
        Cpml,
        Dielectric,
        Drude,
        Medium,
    },
    source::{
        Continuous,
        GaussianPulse,
        PlaneWave,
        PointSource,
        Source,
        Waveform,
    },
    space::{
        Cartesian,
        Space,
    },
};

/// Fatal failures of engine construction and stepping.
///
/// There is no retry policy; everything propagates to the driver. The one
/// deliberate soft spot is probe placement on a rank that does not own the
/// cell, which is skipped silently.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("time step {dt} exceeds the Courant bound {bound}")]
    CourantViolation { dt: f64, bound: f64 },

    #[error("a Bloch wavevector requires complex field storage and vice versa")]
    WavevectorStorageMismatch,

    #[error("the full 3D scheme needs a finite extent along {axis:?}")]
    ZeroExtent { axis: Axis },

    #[error("{cells} cells along {axis:?} cannot be split over {procs} processes")]
    Decomposition {
        axis: Axis,
        cells: usize,
        procs: usize,
    },

    #[error("no material at point {point}")]
    NoMaterial { point: Point3<f64> },

    #[error("halo exchange with rank {rank} failed: {reason}")]
    Exchange { rank: usize, reason: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
