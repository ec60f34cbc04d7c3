mod mode;

pub use mode::{
    Mode,
    Schedule,
};
use nalgebra::{
    Point3,
    Vector3,
};
use num::complex::Complex64;
use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    Error,
    comm::CartComm,
    constants::{
        Axis,
        Component,
    },
    field::FieldScalar,
    geometry::{
        GeomObject,
        GeomTree,
    },
    lattice::Lattice,
    material::{
        PwKind,
        PwTable,
    },
    probe::{
        ProbeAttachment,
        ProbeStream,
    },
    source::Source,
    space::{
        Cartesian,
        Space,
    },
};

/// Half-integer step counter and the simulated time.
///
/// `n` advances by one half before each of the two phases of a step, so a
/// full `step` moves it by exactly one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeStep {
    pub n: f64,
    pub t: f64,
}

impl TimeStep {
    fn advance_half(&mut self, dt: f64) {
        self.n += 0.5;
        self.t = self.n * dt;
    }
}

/// Everything the engine is built from.
///
/// The engine takes the setup by value, so the scene and source lists it
/// runs with cannot be mutated behind its back afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Setup {
    pub space: Space,
    pub scene: Vec<GeomObject>,
    pub sources: Vec<Source>,
    pub mode: Mode,
    /// ratio of `dt` to the Courant stability bound when `dt` is not given
    pub courant_ratio: f64,
    /// explicit time step; rejected at construction if it exceeds the bound
    pub dt: Option<f64>,
    /// Bloch wavevector; supplying one requires complex field storage
    pub wavevector: Option<Vector3<f64>>,
}

impl Setup {
    pub fn new(space: Space, mode: Mode) -> Self {
        Self {
            space,
            scene: Vec::new(),
            sources: Vec::new(),
            mode,
            courant_ratio: 0.99,
            dt: None,
            wavevector: None,
        }
    }
}

pub type RealFdtd = Fdtd<f64>;
pub type BlochFdtd = Fdtd<Complex64>;

/// The time-stepping engine.
///
/// Owns the six field buffers and the pointwise operator tables of the
/// active components, and drives the half-step leapfrog: exchange magnetic
/// halos, update electric interiors, tick sources, exchange electric halos,
/// update magnetic interiors. Inactive components keep zeroed buffers so the
/// stencils can read them unconditionally.
#[derive(derive_more::Debug)]
pub struct Fdtd<S: FieldScalar> {
    space: Cartesian,
    #[debug(ignore)]
    geom_tree: GeomTree,
    mode: Mode,
    dt: f64,
    courant_ratio: f64,
    wavevector: Vector3<f64>,
    time_step: TimeStep,
    #[debug(ignore)]
    fields: [Lattice<S>; 6],
    #[debug(ignore)]
    tables: [Option<PwTable<S>>; 6],
    #[debug(ignore)]
    sources: Vec<Source>,
}

impl<S: FieldScalar> Fdtd<S> {
    /// Build the engine for one rank of `comm`'s topology.
    pub fn new(setup: Setup, comm: CartComm) -> Result<Self, Error> {
        let Setup {
            space,
            scene,
            sources,
            mode,
            courant_ratio,
            dt,
            wavevector,
        } = setup;

        if S::COMPLEX != wavevector.is_some() {
            return Err(Error::WavevectorStorageMismatch);
        }

        if mode == Mode::Full {
            for axis in Axis::ALL {
                if space.size[axis.index()] <= 0.0 {
                    return Err(Error::ZeroExtent { axis });
                }
            }
        }

        let space = Cartesian::new(space, comm)?;

        let bound = space.stable_limit(mode.axes());
        let (dt, courant_ratio) = match dt {
            None => (courant_ratio * bound, courant_ratio),
            Some(dt) => {
                if dt > bound {
                    return Err(Error::CourantViolation { dt, bound });
                }
                (dt, dt / bound)
            }
        };
        tracing::info!(dt, courant_ratio, "resolved time step");

        let geom_tree = GeomTree::new(space.space(), &scene);

        let fields = Component::ALL.map(|component| space.alloc_field(component));

        let mut tables: [Option<PwTable<S>>; 6] = std::array::from_fn(|_| None);
        for component in mode.active_components() {
            let mut table = PwTable::build(component, &space, &geom_tree, dt)?;
            for source in &sources {
                source.attach(&mut table, &space, dt);
            }
            tables[component.index()] = Some(table);
        }

        Ok(Self {
            space,
            geom_tree,
            mode,
            dt,
            courant_ratio,
            wavevector: wavevector.unwrap_or_else(Vector3::zeros),
            time_step: TimeStep::default(),
            fields,
            tables,
            sources,
        })
    }

    /// Build a single-process engine.
    pub fn single(setup: Setup) -> Result<Self, Error> {
        Self::new(setup, crate::comm::ProcessGroup::single())
    }

    /// Advance the fields by one full time step.
    pub fn step(&mut self) -> Result<(), Error> {
        let schedule = self.mode.schedule();

        self.time_step.advance_half(self.dt);

        for &component in schedule.magnetic {
            self.exchange(component)?;
        }
        for &component in schedule.electric {
            self.update_component(component);
        }

        self.time_step.advance_half(self.dt);

        for source in &mut self.sources {
            source.step();
        }

        for &component in schedule.electric {
            self.exchange(component)?;
        }
        for &component in schedule.magnetic {
            self.update_component(component);
        }

        Ok(())
    }

    /// Step until the simulated time reaches `time`.
    pub fn step_until_t(&mut self, time: f64) -> Result<(), Error> {
        while self.time_step.t < time {
            self.step()?;
        }
        Ok(())
    }

    fn update_component(&mut self, component: Component) {
        let Some(table) = self.tables[component.index()].as_mut() else {
            return;
        };

        let (read_a, read_b) = component.curl_sources();
        let [field, field_a, field_b] = self
            .fields
            .get_disjoint_mut([component.index(), read_a.index(), read_b.index()])
            .expect("curl source components are distinct from the updated one");

        table.update(field, field_a, field_b, self.time_step.t);
    }

    /// Synchronize one component's halo rows with both neighbors along each
    /// of its tangential axes.
    ///
    /// Electric components send their low face toward the low neighbor and
    /// fill their trailing halo row from the high neighbor; magnetic
    /// components do the opposite. The received slab is scaled by the Bloch
    /// phase over the world displacement between the sender's samples and
    /// the local halo slots, which is zero displacement (unit phase) between
    /// ranks of the same domain and the full domain extent across the
    /// periodic wrap. Real storage scales by zero instead, decoupling the
    /// boundary.
    fn exchange(&mut self, component: Component) -> Result<(), Error> {
        let (axis_a, axis_b) = component.tangential();
        self.exchange_axis(component, axis_a)?;
        self.exchange_axis(component, axis_b)
    }

    fn exchange_axis(&mut self, component: Component, axis: Axis) -> Result<(), Error> {
        let axis_index = axis.index();
        let delta = if component.is_electric() { -1 } else { 1 };
        let (source, destination) = self.space.comm().shift(axis, delta);
        let tag = component.tag();

        let extent = self.fields[component.index()].dimensions()[axis_index];
        let (send_layer, recv_layer) = if component.is_electric() {
            (0, extent - 1)
        }
        else {
            (extent - 1, 0)
        };

        let phase = if S::COMPLEX {
            // the sender transmits the world coordinate of its face so the
            // receiver can phase the data over the actual displacement
            let mut send_point = Point3::new(0, 0, 0);
            send_point[axis_index] = send_layer;
            let send_coordinate = self.space.index_to_world(component, &send_point)[axis_index];
            let source_coordinate: f64 = self.space.comm().sendrecv(
                send_coordinate,
                destination,
                tag,
                source,
                tag,
            )?;

            let mut recv_point = Point3::new(0, 0, 0);
            recv_point[axis_index] = recv_layer;
            let recv_coordinate = self.space.index_to_world(component, &recv_point)[axis_index];

            S::bloch_phase(self.wavevector[axis_index] * (recv_coordinate - source_coordinate))
        }
        else {
            S::bloch_phase(0.0)
        };

        let slab = self.fields[component.index()].copy_face(axis, send_layer);
        let slab: Vec<S> = self
            .space
            .comm()
            .sendrecv(slab, destination, tag, source, tag)?;

        self.fields[component.index()].fill_face(
            axis,
            recv_layer,
            slab.into_iter().map(|value| value * phase),
        );

        Ok(())
    }

    /// Wrap the operators owning the cell nearest to `point` with probes,
    /// one stream per active component, named `<prefix>_<component>.dat`.
    /// Ranks that do not own the cell skip it; under domain decomposition
    /// that is the correct behavior, not an error.
    pub fn set_probe(&mut self, point: impl Into<Point3<f64>>, prefix: &str) -> Result<(), Error> {
        let point = point.into();

        for component in Component::ALL {
            let Some(table) = self.tables[component.index()].as_mut() else {
                continue;
            };

            let index = self.space.world_to_index(component, &point);
            let Some(index) = self.space.interior_index(component, &index) else {
                tracing::debug!(?component, %point, "probe cell not owned by this rank");
                continue;
            };

            let location = self.space.index_to_world(component, &index);
            let path = format!("{prefix}_{}.dat", component.short_name());
            let stream = ProbeStream::create(&path, &location, self.dt)?;
            table.attach_probe(ProbeAttachment::new(index, stream));
        }

        Ok(())
    }

    /// Zero the fields and all per-cell auxiliary state and rewind the
    /// clock.
    pub fn reset(&mut self) {
        for field in &mut self.fields {
            field.fill(S::zero());
        }
        for table in self.tables.iter_mut().flatten() {
            table.reset();
        }
        self.time_step = TimeStep::default();
    }

    /// Total field energy on this rank,
    /// `1/2 * sum(eps |E|^2 + mu |H|^2) * cell volume` over interior cells.
    pub fn total_energy(&self) -> f64 {
        let cell_volume = self.space.delta().product();
        let sum: f64 = Component::ALL
            .iter()
            .filter_map(|component| {
                self.tables[component.index()]
                    .as_ref()
                    .map(|table| table.interior_energy(&self.fields[component.index()]))
            })
            .sum();
        0.5 * sum * cell_volume
    }

    pub fn space(&self) -> &Cartesian {
        &self.space
    }

    pub fn geom_tree(&self) -> &GeomTree {
        &self.geom_tree
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn courant_ratio(&self) -> f64 {
        self.courant_ratio
    }

    pub fn wavevector(&self) -> Vector3<f64> {
        self.wavevector
    }

    pub fn time_step(&self) -> TimeStep {
        self.time_step
    }

    pub fn field(&self, component: Component) -> &Lattice<S> {
        &self.fields[component.index()]
    }

    pub fn field_mut(&mut self, component: Component) -> &mut Lattice<S> {
        &mut self.fields[component.index()]
    }

    /// The update operator kind stored for a cell, if the component is
    /// active.
    pub fn pw_kind(&self, component: Component, index: &Point3<usize>) -> Option<PwKind> {
        self.tables[component.index()]
            .as_ref()
            .map(|table| table.kind(index))
    }

    /// The permittivity or permeability recorded for a cell, if the
    /// component is active.
    pub fn pw_perm(&self, component: Component, index: &Point3<usize>) -> Option<f64> {
        self.tables[component.index()]
            .as_ref()
            .map(|table| table.perm(index))
    }
}
