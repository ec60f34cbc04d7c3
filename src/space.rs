use nalgebra::{
    Point3,
    Vector3,
};
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
    lattice::Lattice,
};

/// User-facing description of the computational volume.
///
/// `size` is the extent of the domain in world units, centered on the origin.
/// A zero extent along an axis means the problem is uniform there: the grid
/// keeps a single cell of thickness `1 / resolution` and the reduced-mode
/// engines rely on it. `resolution` is the cell count per unit length.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Space {
    pub size: Vector3<f64>,
    pub resolution: f64,
}

impl Space {
    pub fn new(size: impl Into<Vector3<f64>>, resolution: f64) -> Self {
        Self {
            size: size.into(),
            resolution,
        }
    }
}

/// The resolved Yee grid owned by one rank: cell counts, spacings, staggered
/// index to world mapping and field allocation.
#[derive(Clone, Debug)]
pub struct Cartesian {
    space: Space,
    comm: CartComm,
    delta: Vector3<f64>,
    global_cells: Vector3<usize>,
    local_cells: Vector3<usize>,
    /// first global cell index owned by this rank
    cell_offset: Vector3<usize>,
    /// world coordinate of this rank's low corner
    origin: Point3<f64>,
}

impl Cartesian {
    pub fn new(space: Space, comm: CartComm) -> Result<Self, Error> {
        let delta = Vector3::repeat(1.0 / space.resolution);
        let global_cells = space.size.map(|extent| {
            if extent <= 0.0 {
                1
            }
            else {
                ((extent * space.resolution).round() as usize).max(1)
            }
        });

        let topology = comm.topology();
        let coords = comm.coords();

        let mut local_cells = Vector3::zeros();
        let mut cell_offset = Vector3::zeros();
        for axis in Axis::ALL {
            let index = axis.index();
            let cells = global_cells[index];
            let procs = topology[index];
            if procs > cells {
                return Err(Error::Decomposition { axis, cells, procs });
            }

            let base = cells / procs;
            let remainder = cells % procs;
            let coord = coords[index];
            local_cells[index] = base + usize::from(coord < remainder);
            cell_offset[index] = coord * base + coord.min(remainder);
        }

        // a zero-extent axis keeps its single cell centered on the origin
        let global_low = Point3::from(
            space
                .size
                .zip_map(&delta, |extent, d| {
                    if extent <= 0.0 { -0.5 * d } else { -0.5 * extent }
                }),
        );
        let origin = global_low + cell_offset.cast::<f64>().component_mul(&delta);

        tracing::debug!(
            rank = comm.my_id(),
            ?global_cells,
            ?local_cells,
            ?cell_offset,
            "resolved subdomain"
        );

        Ok(Self {
            space,
            comm,
            delta,
            global_cells,
            local_cells,
            cell_offset,
            origin,
        })
    }

    pub fn comm(&self) -> &CartComm {
        &self.comm
    }

    pub fn space(&self) -> &Space {
        &self.space
    }

    pub fn delta(&self) -> Vector3<f64> {
        self.delta
    }

    pub fn global_cells(&self) -> Vector3<usize> {
        self.global_cells
    }

    pub fn local_cells(&self) -> Vector3<usize> {
        self.local_cells
    }

    pub fn cell_offset(&self) -> Vector3<usize> {
        self.cell_offset
    }

    pub fn origin(&self) -> Point3<f64> {
        self.origin
    }

    /// Storage shape of a component: one row beyond the cell count along both
    /// tangential axes, holding the halo and boundary samples.
    pub fn shape_of(&self, component: Component) -> Vector3<usize> {
        let mut shape = self.local_cells;
        let (a, b) = component.tangential();
        shape[a.index()] += 1;
        shape[b.index()] += 1;
        shape
    }

    /// World coordinate of the staggered sample stored at `index`.
    pub fn index_to_world(&self, component: Component, index: &Point3<usize>) -> Point3<f64> {
        let staggered = index.coords.cast::<f64>() + component.stagger();
        self.origin + staggered.component_mul(&self.delta)
    }

    /// Index of the stored sample nearest to a world coordinate. The result
    /// may lie outside this rank's storage; see [`Self::interior_index`].
    ///
    /// A point exactly between two samples resolves to the lower one, so
    /// queries on the center plane of a zero-extent axis land on the interior
    /// row rather than the halo.
    pub fn world_to_index(&self, component: Component, point: &Point3<f64>) -> Point3<isize> {
        let staggered = (point - self.origin).component_div(&self.delta) - component.stagger();
        Point3::from(staggered.map(|value| (value - 0.5).ceil() as isize))
    }

    /// Restrict an index to the rows this rank updates, excluding the
    /// halo/boundary rows that carry Dummy operators.
    pub fn interior_index(
        &self,
        component: Component,
        index: &Point3<isize>,
    ) -> Option<Point3<usize>> {
        let shape = self.shape_of(component);
        let (a, b) = component.tangential();

        let mut low = Vector3::repeat(0isize);
        let mut high = shape.map(|extent| extent as isize);
        for axis in [a, b] {
            let i = axis.index();
            if component.is_electric() {
                high[i] -= 1;
            }
            else {
                low[i] += 1;
            }
        }

        (0..3)
            .all(|i| index[i] >= low[i] && index[i] < high[i])
            .then(|| Point3::new(index.x as usize, index.y as usize, index.z as usize))
    }

    /// Whether `index` is a halo/boundary row of the component, i.e. one of
    /// the rows that holds a Dummy operator.
    pub fn is_boundary_row(&self, component: Component, index: &Point3<usize>) -> bool {
        let shape = self.shape_of(component);
        let (a, b) = component.tangential();
        [a, b].into_iter().any(|axis| {
            let i = axis.index();
            if component.is_electric() {
                index[i] == shape[i] - 1
            }
            else {
                index[i] == 0
            }
        })
    }

    pub fn alloc_field<S: FieldScalar>(&self, component: Component) -> Lattice<S> {
        Lattice::from_elem(self.shape_of(component), S::zero())
    }

    /// Courant stability bound for a scheme coupling the given axes.
    pub fn stable_limit(&self, axes: &[Axis]) -> f64 {
        let sum: f64 = axes
            .iter()
            .map(|axis| self.delta[axis.index()].powi(-2))
            .sum();
        sum.sqrt().recip()
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{
        Point3,
        Vector3,
    };

    use super::{
        Cartesian,
        Space,
    };
    use crate::{
        comm::ProcessGroup,
        constants::{
            Axis,
            Component,
        },
    };

    fn single_rank(size: [f64; 3], resolution: f64) -> Cartesian {
        Cartesian::new(Space::new(size, resolution), ProcessGroup::single()).unwrap()
    }

    #[test]
    fn zero_extent_keeps_one_cell() {
        let space = single_rank([16.0, 8.0, 0.0], 10.0);
        assert_eq!(space.global_cells(), Vector3::new(160, 80, 1));
        assert_eq!(space.shape_of(Component::Ez), Vector3::new(161, 81, 1));
        assert_eq!(space.shape_of(Component::Hx), Vector3::new(160, 81, 2));
    }

    #[test]
    fn index_world_round_trip_hits_the_nearest_sample() {
        let space = single_rank([4.0, 4.0, 4.0], 5.0);
        for component in Component::ALL {
            let index = Point3::new(3, 2, 4);
            let world = space.index_to_world(component, &index);
            let back = space.world_to_index(component, &world);
            assert_eq!(back, Point3::new(3, 2, 4), "{component:?}");

            // a point halfway into the next cell still rounds to a stored sample
            let nudged = world + Vector3::repeat(0.4 * space.delta().x);
            let nearest = space.world_to_index(component, &nudged);
            assert_eq!(nearest, Point3::new(3, 2, 4), "{component:?}");
        }
    }

    #[test]
    fn staggering_is_half_a_cell() {
        let space = single_rank([2.0, 2.0, 2.0], 1.0);
        let ex = space.index_to_world(Component::Ex, &Point3::new(0, 0, 0));
        assert_eq!(ex, Point3::new(-0.5, -1.0, -1.0));
        let hx = space.index_to_world(Component::Hx, &Point3::new(0, 1, 1));
        assert_eq!(hx, Point3::new(-1.0, -0.5, -0.5));
    }

    #[test]
    fn decomposition_splits_cells_and_origins() {
        let comms = ProcessGroup::new(Vector3::new(4, 1, 1));
        let space = Space::new([4.0, 2.0, 2.0], 2.0);
        let parts: Vec<Cartesian> = comms
            .into_iter()
            .map(|comm| Cartesian::new(space, comm).unwrap())
            .collect();

        for (rank, part) in parts.iter().enumerate() {
            assert_eq!(part.local_cells(), Vector3::new(2, 4, 4));
            assert_eq!(part.cell_offset().x, rank * 2);
            assert_eq!(part.origin().x, -2.0 + rank as f64);
        }
    }

    #[test]
    fn refuses_more_ranks_than_cells() {
        let comms = ProcessGroup::new(Vector3::new(1, 1, 3));
        let space = Space::new([1.0, 1.0, 0.0], 1.0);
        assert!(Cartesian::new(space, comms.into_iter().next().unwrap()).is_err());
    }

    #[test]
    fn stable_limit_drops_absent_axes() {
        let space = single_rank([1.0, 1.0, 1.0], 10.0);
        let full = space.stable_limit(&[Axis::X, Axis::Y, Axis::Z]);
        assert!((full - 0.1 / 3.0f64.sqrt()).abs() < 1e-12);
        let tem = space.stable_limit(&[Axis::Z]);
        assert!((tem - 0.1).abs() < 1e-12);
    }
}
