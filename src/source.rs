use std::f64::consts::TAU;

use nalgebra::{
    Point3,
    Vector3,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    constants::{
        Axis,
        Component,
    },
    field::FieldScalar,
    lattice::{
        Lattice,
        iter_indices,
    },
    material::PwTable,
    space::Cartesian,
};

/// Time dependence of a source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Waveform {
    Continuous(Continuous),
    Gaussian(GaussianPulse),
}

impl Waveform {
    pub fn value(&self, time: f64) -> f64 {
        match self {
            Waveform::Continuous(continuous) => continuous.value(time),
            Waveform::Gaussian(gaussian) => gaussian.value(time),
        }
    }
}

impl From<Continuous> for Waveform {
    fn from(value: Continuous) -> Self {
        Self::Continuous(value)
    }
}

impl From<GaussianPulse> for Waveform {
    fn from(value: GaussianPulse) -> Self {
        Self::Gaussian(value)
    }
}

/// Sinusoid with a linear turn-on ramp.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Continuous {
    pub frequency: f64,
    pub phase: f64,
    pub ramp: f64,
}

impl Continuous {
    pub fn new(frequency: f64) -> Self {
        Self {
            frequency,
            phase: 0.0,
            ramp: 1.0 / frequency,
        }
    }

    pub fn value(&self, time: f64) -> f64 {
        let envelope = if self.ramp > 0.0 {
            (time / self.ramp).clamp(0.0, 1.0)
        }
        else {
            1.0
        };
        envelope * (TAU * self.frequency * time + self.phase).sin()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianPulse {
    pub peak_time: f64,
    pub duration: f64,
}

impl GaussianPulse {
    pub fn new(peak_time: f64, duration: f64) -> Self {
        Self {
            peak_time,
            duration,
        }
    }

    pub fn value(&self, time: f64) -> f64 {
        (-((time - self.peak_time) / self.duration).powi(2)).exp()
    }
}

/// A source descriptor. Sources do not own cells; at engine construction
/// they wrap the pointwise operators at their support (the
/// `set_pointwise_source_F` step) and the wrapped cells inject the
/// contribution after the material update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Source {
    Point(PointSource),
    Plane(PlaneWave),
}

impl Source {
    pub fn component(&self) -> Component {
        match self {
            Source::Point(point) => point.component,
            Source::Plane(plane) => plane.component,
        }
    }

    /// Advance auxiliary state by one step. The built-in waveforms are
    /// closed-form in time and carry none.
    pub fn step(&mut self) {}

    /// Wrap the table's operators at this source's support. Cells that fall
    /// outside the rank's subdomain are skipped.
    pub(crate) fn attach<S: FieldScalar>(
        &self,
        table: &mut PwTable<S>,
        space: &Cartesian,
        dt: f64,
    ) {
        if self.component() != table.component() {
            return;
        }

        match self {
            Source::Point(point) => point.attach(table, space, dt),
            Source::Plane(plane) => plane.attach(table, space, dt),
        }
    }
}

impl From<PointSource> for Source {
    fn from(value: PointSource) -> Self {
        Self::Point(value)
    }
}

impl From<PlaneWave> for Source {
    fn from(value: PlaneWave) -> Self {
        Self::Plane(value)
    }
}

/// Point source on a single staggered cell.
///
/// A soft source adds its contribution on top of the regular update, scaled
/// like a current density; a hard source overrides the field value at the
/// cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointSource {
    pub waveform: Waveform,
    pub component: Component,
    pub center: Point3<f64>,
    pub amplitude: f64,
    pub hard: bool,
}

impl PointSource {
    pub fn soft(
        waveform: impl Into<Waveform>,
        component: Component,
        center: impl Into<Point3<f64>>,
    ) -> Self {
        Self {
            waveform: waveform.into(),
            component,
            center: center.into(),
            amplitude: 1.0,
            hard: false,
        }
    }

    pub fn hard(
        waveform: impl Into<Waveform>,
        component: Component,
        center: impl Into<Point3<f64>>,
    ) -> Self {
        Self {
            hard: true,
            ..Self::soft(waveform, component, center)
        }
    }

    fn attach<S: FieldScalar>(&self, table: &mut PwTable<S>, space: &Cartesian, dt: f64) {
        let index = space.world_to_index(self.component, &self.center);
        let Some(index) = space.interior_index(self.component, &index) else {
            // correct under domain decomposition: some ranks do not own the cell
            tracing::debug!(component = ?self.component, center = ?self.center, "source cell not owned by this rank");
            return;
        };

        table.attach_source(SourceAttachment {
            index,
            waveform: self.waveform.clone(),
            amplitude: self.amplitude,
            phase: S::from_real(1.0),
            factor: if self.hard { 1.0 } else { dt / table.perm(&index) },
            hard: self.hard,
        });
    }
}

/// Source spread over a full cross-section plane of the domain, with each
/// cell phased by `exp(i k . r)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaneWave {
    pub waveform: Waveform,
    pub component: Component,
    /// axis the source plane is normal to
    pub normal: Axis,
    /// position of the plane along the normal axis
    pub cut: f64,
    pub amplitude: f64,
    pub wavevector: Vector3<f64>,
}

impl PlaneWave {
    fn attach<S: FieldScalar>(&self, table: &mut PwTable<S>, space: &Cartesian, dt: f64) {
        let axis = self.normal.index();

        let mut probe = Point3::origin();
        probe[axis] = self.cut;
        let cut_index = space.world_to_index(self.component, &probe)[axis];

        for index in iter_indices(space.shape_of(self.component)) {
            if index[axis] as isize != cut_index {
                continue;
            }
            let Some(index) =
                space.interior_index(self.component, &index.map(|value| value as isize))
            else {
                continue;
            };

            let world = space.index_to_world(self.component, &index);
            table.attach_source(SourceAttachment {
                index,
                waveform: self.waveform.clone(),
                amplitude: self.amplitude,
                phase: S::cis(self.wavevector.dot(&world.coords)),
                factor: dt / table.perm(&index),
                hard: false,
            });
        }
    }
}

/// A pointwise source wrapped around one cell of a table, applied after the
/// material sweep for that component.
#[derive(Clone, Debug)]
pub(crate) struct SourceAttachment<S> {
    index: Point3<usize>,
    waveform: Waveform,
    amplitude: f64,
    phase: S,
    factor: f64,
    hard: bool,
}

impl<S: FieldScalar> SourceAttachment<S> {
    pub fn apply(&mut self, field: &mut Lattice<S>, time: f64) {
        let value = self
            .phase
            .scale(self.amplitude * self.factor * self.waveform.value(time));
        if self.hard {
            field[self.index] = value;
        }
        else {
            field[self.index] += value;
        }
    }
}
