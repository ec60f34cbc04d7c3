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
        Component,
        EPSILON0,
    },
    field::FieldScalar,
    lattice::{
        Lattice,
        offset_point,
    },
    probe::ProbeAttachment,
    source::SourceAttachment,
    space::Cartesian,
};

/// A material description attached to geometry.
///
/// Each variant knows how to produce the pointwise update operator for one
/// staggered cell of one field component. The set is closed on purpose: the
/// per-cell operators are tagged variants dispatched in kind-sorted loops, so
/// the hot path never goes through dynamic dispatch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Medium {
    Dielectric(Dielectric),
    Drude(Drude),
    Cpml(Cpml),
}

impl Medium {
    pub fn epsilon(&self) -> f64 {
        match self {
            Medium::Dielectric(dielectric) => dielectric.epsilon,
            Medium::Drude(drude) => drude.epsilon_inf,
            Medium::Cpml(_) => 1.0,
        }
    }

    pub fn mu(&self) -> f64 {
        match self {
            Medium::Dielectric(dielectric) => dielectric.mu,
            Medium::Drude(drude) => drude.mu,
            Medium::Cpml(_) => 1.0,
        }
    }

    /// Effective permittivity (electric components) or permeability
    /// (magnetic components) of a staggered cell, averaged against the
    /// material underneath per the sub-cell interface scheme.
    fn effective_perm(&self, component: Component, below: &Medium) -> f64 {
        match self {
            // the absorber adopts whatever it was laid over
            Medium::Cpml(_) => {
                if component.is_electric() {
                    below.epsilon()
                }
                else {
                    below.mu()
                }
            }
            _ => {
                if component.is_electric() {
                    0.5 * (self.epsilon() + below.epsilon())
                }
                else {
                    0.5 * (self.mu() + below.mu())
                }
            }
        }
    }

    /// Build the pointwise update operator for one cell (the
    /// `pw_material_F` capability).
    pub(crate) fn pw_cell<S: FieldScalar>(
        &self,
        component: Component,
        index: Point3<usize>,
        world: Point3<f64>,
        below: &Medium,
        space: &Cartesian,
        dt: f64,
    ) -> PwEntry<S> {
        let perm = self.effective_perm(component, below);
        let sign = if component.is_electric() { 1.0 } else { -1.0 };
        let factor = sign * dt / perm;

        match self {
            Medium::Dielectric(_) => PwEntry::Dielectric(DielectricCell { index, factor }),
            Medium::Drude(drude) => {
                if component.is_electric() {
                    PwEntry::Drude(drude.pw_cell(index, factor, perm, dt))
                }
                else {
                    PwEntry::Dielectric(DielectricCell { index, factor })
                }
            }
            Medium::Cpml(cpml) => {
                PwEntry::Cpml(cpml.pw_cell(component, index, world, below, space, factor, dt))
            }
        }
    }
}

impl From<Dielectric> for Medium {
    fn from(value: Dielectric) -> Self {
        Self::Dielectric(value)
    }
}

impl From<Drude> for Medium {
    fn from(value: Drude) -> Self {
        Self::Drude(value)
    }
}

impl From<Cpml> for Medium {
    fn from(value: Cpml) -> Self {
        Self::Cpml(value)
    }
}

/// Lossless dielectric; the default instance is vacuum.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dielectric {
    pub epsilon: f64,
    pub mu: f64,
}

impl Dielectric {
    pub const VACUUM: Self = Self {
        epsilon: 1.0,
        mu: 1.0,
    };

    pub fn new(epsilon: f64) -> Self {
        Self { epsilon, mu: 1.0 }
    }
}

impl Default for Dielectric {
    fn default() -> Self {
        Self::VACUUM
    }
}

/// Single-pole Drude medium with an auxiliary polarization current per cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Drude {
    pub epsilon_inf: f64,
    pub mu: f64,
    /// plasma frequency
    pub omega_p: f64,
    /// collision rate
    pub gamma: f64,
}

impl Drude {
    fn pw_cell<S: FieldScalar>(
        &self,
        index: Point3<usize>,
        factor: f64,
        perm: f64,
        dt: f64,
    ) -> DrudeCell<S> {
        let half_gamma_dt = 0.5 * self.gamma * dt;
        DrudeCell {
            index,
            factor,
            decay: (1.0 - half_gamma_dt) / (1.0 + half_gamma_dt),
            drive: EPSILON0 * self.omega_p.powi(2) * dt / (1.0 + half_gamma_dt),
            current_factor: dt / perm,
            current: S::zero(),
        }
    }
}

/// Convolutional PML with the graded profile
/// `sigma = sigma_max * d^m`, `kappa = 1 + (kappa_max - 1) * d^m`,
/// `a = a_max * (1 - d)^m_a` over the normalized depth `d` into the layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cpml {
    pub m: f64,
    pub m_a: f64,
    pub kappa_max: f64,
    pub a_max: f64,
    /// scale on the textbook optimal conductivity `0.8 * (m + 1) / (eta * delta)`
    pub sigma_max_ratio: f64,
    /// resolved when the boundary geometry is bound to a space
    bounds: Option<PmlBounds>,
}

impl Default for Cpml {
    fn default() -> Self {
        Self {
            m: 3.5,
            m_a: 1.0,
            kappa_max: 4.0,
            a_max: 0.1,
            sigma_max_ratio: 1.0,
            bounds: None,
        }
    }
}

impl Cpml {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bind(&mut self, bounds: PmlBounds) {
        self.bounds = Some(bounds);
    }

    /// Normalized depth into the layer along `axis`, zero outside it.
    fn depth(&self, bounds: &PmlBounds, axis: usize, position: f64) -> f64 {
        if !bounds.active[axis] {
            return 0.0;
        }
        let from_low = (bounds.low[axis] + bounds.thickness - position) / bounds.thickness;
        let from_high = (position - (bounds.high[axis] - bounds.thickness)) / bounds.thickness;
        from_low.max(from_high).clamp(0.0, 1.0)
    }

    #[allow(clippy::too_many_arguments)]
    fn pw_cell<S: FieldScalar>(
        &self,
        component: Component,
        index: Point3<usize>,
        world: Point3<f64>,
        below: &Medium,
        space: &Cartesian,
        factor: f64,
        dt: f64,
    ) -> CpmlCell<S> {
        let bounds = self.bounds.clone().unwrap_or(PmlBounds {
            low: Point3::from(-0.5 * space.space().size),
            high: Point3::from(0.5 * space.space().size),
            thickness: 0.0,
            active: [false; 3],
        });

        let eta = (below.mu() / below.epsilon()).sqrt();
        let (a, b) = component.tangential();

        let stretch = |axis: crate::constants::Axis| {
            let i = axis.index();
            let depth = self.depth(&bounds, i, world[i]);
            if depth == 0.0 {
                return Stretching {
                    kappa: 1.0,
                    b: 0.0,
                    c: 0.0,
                };
            }

            let sigma_max =
                self.sigma_max_ratio * 0.8 * (self.m + 1.0) / (eta * space.delta()[i]);
            let g1 = depth.powf(self.m);
            let sigma = sigma_max * g1;
            let kappa = 1.0 + (self.kappa_max - 1.0) * g1;
            let alpha = self.a_max * (1.0 - depth).powf(self.m_a);

            let b = (-(sigma / kappa + alpha) * dt / EPSILON0).exp();
            let denominator = sigma * kappa + kappa.powi(2) * alpha;
            let c = if denominator > 0.0 {
                sigma * (b - 1.0) / denominator
            }
            else {
                0.0
            };

            Stretching { kappa, b, c }
        };

        CpmlCell {
            index,
            factor,
            stretch: [stretch(a), stretch(b)],
            psi: [S::zero(), S::zero()],
        }
    }
}

/// Extent of the absorbing shell, resolved from the boundary geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PmlBounds {
    pub low: Point3<f64>,
    pub high: Point3<f64>,
    pub thickness: f64,
    /// absorbing faces exist only on axes with a finite extent
    pub active: [bool; 3],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PwKind {
    Dummy,
    Dielectric,
    Cpml,
    Drude,
}

pub(crate) enum PwEntry<S> {
    Dielectric(DielectricCell),
    Cpml(CpmlCell<S>),
    Drude(DrudeCell<S>),
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct DielectricCell {
    index: Point3<usize>,
    factor: f64,
}

#[derive(Clone, Copy, Debug)]
struct Stretching {
    kappa: f64,
    b: f64,
    c: f64,
}

#[derive(Clone, Debug)]
pub(crate) struct CpmlCell<S> {
    index: Point3<usize>,
    factor: f64,
    stretch: [Stretching; 2],
    psi: [S; 2],
}

#[derive(Clone, Debug)]
pub(crate) struct DrudeCell<S> {
    index: Point3<usize>,
    factor: f64,
    decay: f64,
    drive: f64,
    current_factor: f64,
    current: S,
}

/// Pointwise update operators for one field component, stratified by kind so
/// each sweep runs over contiguous coefficient arrays.
///
/// Dummy cells occupy the halo/boundary rows; they carry the neighboring
/// permittivity or permeability for bookkeeping but have no update entry, so
/// the sweeps never touch them. Sources and probes are decorator passes
/// applied after the material sweeps.
#[derive(derive_more::Debug)]
pub(crate) struct PwTable<S: FieldScalar> {
    component: Component,
    base_offset: Vector3<isize>,
    step_a: Vector3<isize>,
    step_b: Vector3<isize>,
    inv_delta_a: f64,
    inv_delta_b: f64,
    #[debug(ignore)]
    perm: Lattice<f64>,
    #[debug(ignore)]
    kind: Lattice<PwKind>,
    #[debug(ignore)]
    dielectric: Vec<DielectricCell>,
    #[debug(ignore)]
    cpml: Vec<CpmlCell<S>>,
    #[debug(ignore)]
    drude: Vec<DrudeCell<S>>,
    #[debug(ignore)]
    sources: Vec<SourceAttachment<S>>,
    #[debug(ignore)]
    probes: Vec<ProbeAttachment>,
}

impl<S: FieldScalar> PwTable<S> {
    /// Build the operator table for `component` by querying the geometry at
    /// every staggered sample (the material-table build of the engine
    /// constructor).
    pub fn build(
        component: Component,
        space: &Cartesian,
        tree: &crate::geometry::GeomTree,
        dt: f64,
    ) -> Result<Self, crate::Error> {
        let shape = space.shape_of(component);
        let (axis_a, axis_b) = component.tangential();

        let entries = Self::classify_cells(component, space, tree, dt, shape)?;

        let mut perm = Lattice::from_elem(shape, 1.0);
        let mut kind = Lattice::from_elem(shape, PwKind::Dummy);
        let mut dielectric = Vec::new();
        let mut cpml = Vec::new();
        let mut drude = Vec::new();

        for (index, cell_perm, entry) in entries {
            perm[index] = cell_perm;
            match entry {
                None => {}
                Some(PwEntry::Dielectric(cell)) => {
                    kind[index] = PwKind::Dielectric;
                    dielectric.push(cell);
                }
                Some(PwEntry::Cpml(cell)) => {
                    kind[index] = PwKind::Cpml;
                    cpml.push(cell);
                }
                Some(PwEntry::Drude(cell)) => {
                    kind[index] = PwKind::Drude;
                    drude.push(cell);
                }
            }
        }

        tracing::debug!(
            ?component,
            dielectric = dielectric.len(),
            cpml = cpml.len(),
            drude = drude.len(),
            "built pointwise material table"
        );

        let normal = component.normal().unit::<isize>();
        let step_a = axis_a.unit::<isize>();
        let step_b = axis_b.unit::<isize>();
        let base_offset = if component.is_electric() {
            normal
        }
        else {
            -step_a - step_b
        };

        Ok(Self {
            component,
            base_offset,
            step_a,
            step_b,
            inv_delta_a: space.delta()[axis_a.index()].recip(),
            inv_delta_b: space.delta()[axis_b.index()].recip(),
            perm,
            kind,
            dielectric,
            cpml,
            drude,
            sources: Vec::new(),
            probes: Vec::new(),
        })
    }

    #[allow(clippy::type_complexity)]
    fn classify_cells(
        component: Component,
        space: &Cartesian,
        tree: &crate::geometry::GeomTree,
        dt: f64,
        shape: Vector3<usize>,
    ) -> Result<Vec<(Point3<usize>, f64, Option<PwEntry<S>>)>, crate::Error> {
        let classify = |index: Point3<usize>| {
            let world = space.index_to_world(component, &index);
            let (medium, below) = tree.material_of_point(&world)?;

            let cell_perm = if component.is_electric() {
                medium.epsilon()
            }
            else {
                medium.mu()
            };

            // halo and trailing boundary rows get no update operator; the
            // exchange owns them
            let entry = if space.is_boundary_row(component, &index) {
                None
            }
            else {
                Some(medium.pw_cell(component, index, world, below, space, dt))
            };

            Ok((index, cell_perm, entry))
        };

        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            let indices: Vec<Point3<usize>> = crate::lattice::iter_indices(shape).collect();
            indices.into_par_iter().map(classify).collect()
        }
        #[cfg(not(feature = "rayon"))]
        {
            crate::lattice::iter_indices(shape).map(classify).collect()
        }
    }

    pub fn component(&self) -> Component {
        self.component
    }

    pub fn kind(&self, index: &Point3<usize>) -> PwKind {
        self.kind[*index]
    }

    /// Permittivity (electric components) or permeability (magnetic
    /// components) recorded for a cell. Dummy rows carry their neighbor's
    /// value.
    pub fn perm(&self, index: &Point3<usize>) -> f64 {
        self.perm[*index]
    }

    /// Sum of `perm * |field|^2` over all non-dummy cells.
    pub fn interior_energy(&self, field: &Lattice<S>) -> f64 {
        self.kind
            .iter()
            .filter(|(_, kind)| **kind != PwKind::Dummy)
            .map(|(point, _)| self.perm[point] * field[point].norm_sqr())
            .sum()
    }

    pub fn attach_source(&mut self, attachment: SourceAttachment<S>) {
        self.sources.push(attachment);
    }

    pub fn attach_probe(&mut self, attachment: ProbeAttachment) {
        self.probes.push(attachment);
    }

    /// Clear all per-cell auxiliary state (CPML psi, polarization currents).
    pub fn reset(&mut self) {
        for cell in &mut self.cpml {
            cell.psi = [S::zero(), S::zero()];
        }
        for cell in &mut self.drude {
            cell.current = S::zero();
        }
    }

    /// One sweep over the component: kind-sorted material updates, then the
    /// source and probe decorator passes.
    pub fn update(
        &mut self,
        field: &mut Lattice<S>,
        field_a: &Lattice<S>,
        field_b: &Lattice<S>,
        time: f64,
    ) {
        let base_offset = self.base_offset;
        let step_a = self.step_a;
        let step_b = self.step_b;
        let inv_delta_a = self.inv_delta_a;
        let inv_delta_b = self.inv_delta_b;

        let diffs = |index: &Point3<usize>| {
            let base = offset_point(index, &base_offset);
            let da = (field_a[offset_point(&base, &step_a)] - field_a[base]).scale(inv_delta_a);
            let db = (field_b[offset_point(&base, &step_b)] - field_b[base]).scale(inv_delta_b);
            (da, db)
        };

        for cell in &self.dielectric {
            let (da, db) = diffs(&cell.index);
            field[cell.index] += (da - db).scale(cell.factor);
        }

        for cell in &mut self.cpml {
            let (da, db) = diffs(&cell.index);
            let [sa, sb] = cell.stretch;
            cell.psi[0] = cell.psi[0].scale(sa.b) + da.scale(sa.c);
            cell.psi[1] = cell.psi[1].scale(sb.b) + db.scale(sb.c);
            let curl_a = da.scale(sa.kappa.recip()) + cell.psi[0];
            let curl_b = db.scale(sb.kappa.recip()) + cell.psi[1];
            field[cell.index] += (curl_a - curl_b).scale(cell.factor);
        }

        for cell in &mut self.drude {
            let (da, db) = diffs(&cell.index);
            cell.current = cell.current.scale(cell.decay) + field[cell.index].scale(cell.drive);
            field[cell.index] +=
                (da - db).scale(cell.factor) - cell.current.scale(cell.current_factor);
        }

        for source in &mut self.sources {
            source.apply(field, time);
        }

        for probe in &self.probes {
            probe.record(time, &field[*probe.index()]);
        }
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Point3;

    use super::{
        Cpml,
        Dielectric,
        Medium,
        PmlBounds,
    };
    use crate::constants::Component;

    #[test]
    fn effective_perm_averages_against_below() {
        let medium = Medium::from(Dielectric::new(12.0));
        let below = Medium::from(Dielectric::VACUUM);
        assert_eq!(medium.effective_perm(Component::Ez, &below), 6.5);
        assert_eq!(medium.effective_perm(Component::Hx, &below), 1.0);
    }

    #[test]
    fn cpml_adopts_the_material_underneath() {
        let medium = Medium::from(Cpml::new());
        let below = Medium::from(Dielectric::new(12.0));
        assert_eq!(medium.effective_perm(Component::Ez, &below), 12.0);
    }

    #[test]
    fn cpml_depth_is_zero_outside_the_layer() {
        let cpml = Cpml::new();
        let bounds = PmlBounds {
            low: Point3::new(-8.0, -4.0, 0.0),
            high: Point3::new(8.0, 4.0, 0.0),
            thickness: 1.0,
            active: [true, true, false],
        };
        assert_eq!(cpml.depth(&bounds, 0, 0.0), 0.0);
        assert_eq!(cpml.depth(&bounds, 0, -7.5), 0.5);
        assert_eq!(cpml.depth(&bounds, 0, 7.75), 0.75);
        assert!((cpml.depth(&bounds, 1, 3.9) - 0.9).abs() < 1e-12);
        assert_eq!(cpml.depth(&bounds, 2, 0.3), 0.0);
    }
}
