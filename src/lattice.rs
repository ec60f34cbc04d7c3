use std::ops::{
    Index,
    IndexMut,
};

use nalgebra::{
    Point3,
    Vector3,
};

use crate::constants::Axis;

/// Iterate all points of a `dimensions`-shaped grid, x varying fastest.
///
/// The order matches the memory layout of [`Lattice`], so zipping this with
/// a lattice's data visits samples in storage order.
pub fn iter_indices(dimensions: Vector3<usize>) -> impl Iterator<Item = Point3<usize>> {
    (0..dimensions.z).flat_map(move |z| {
        (0..dimensions.y)
            .flat_map(move |y| (0..dimensions.x).map(move |x| Point3::new(x, y, z)))
    })
}

/// Apply a signed offset to a grid point.
///
/// Callers are responsible for only offsetting points where the result stays
/// inside the grid.
pub fn offset_point(point: &Point3<usize>, offset: &Vector3<isize>) -> Point3<usize> {
    Point3::new(
        point.x.wrapping_add_signed(offset.x),
        point.y.wrapping_add_signed(offset.y),
        point.z.wrapping_add_signed(offset.z),
    )
}

/// Dense 3D storage for field samples and per-cell operators, row-major with
/// x fastest.
#[derive(Clone, Debug, PartialEq)]
pub struct Lattice<T> {
    dimensions: Vector3<usize>,
    data: Vec<T>,
}

impl<T> Lattice<T> {
    pub fn new(dimensions: Vector3<usize>, init: impl FnMut(Point3<usize>) -> T) -> Self {
        Self {
            dimensions,
            data: iter_indices(dimensions).map(init).collect(),
        }
    }

    pub fn from_elem(dimensions: Vector3<usize>, value: T) -> Self
    where
        T: Clone,
    {
        Self {
            dimensions,
            data: vec![value; dimensions.product()],
        }
    }

    pub fn dimensions(&self) -> Vector3<usize> {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat offset of a point, `None` outside the grid. Bounds check and
    /// address computation live together so every access goes through one
    /// place.
    fn flat_index(&self, point: &Point3<usize>) -> Option<usize> {
        let extents = self.dimensions;
        (point.x < extents.x && point.y < extents.y && point.z < extents.z)
            .then(|| (point.z * extents.y + point.y) * extents.x + point.x)
    }

    pub fn get(&self, point: &Point3<usize>) -> Option<&T> {
        self.flat_index(point).map(|flat| &self.data[flat])
    }

    pub fn get_mut(&mut self, point: &Point3<usize>) -> Option<&mut T> {
        self.flat_index(point).map(|flat| &mut self.data[flat])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Point3<usize>, &T)> {
        iter_indices(self.dimensions).zip(&self.data)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Point3<usize>, &mut T)> {
        iter_indices(self.dimensions).zip(&mut self.data)
    }

    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        self.data.fill(value);
    }

    /// Points of the slab at `layer` along `axis`, in a fixed order shared by
    /// [`Self::copy_face`] and [`Self::fill_face`].
    pub fn face_points(
        &self,
        axis: Axis,
        layer: usize,
    ) -> impl Iterator<Item = Point3<usize>> + use<T> {
        let mut slab = self.dimensions;
        slab[axis.index()] = 1;
        let step = axis.unit::<usize>() * layer;
        iter_indices(slab).map(move |point| point + step)
    }

    /// Copy out the slab at `layer` along `axis`.
    pub fn copy_face(&self, axis: Axis, layer: usize) -> Vec<T>
    where
        T: Copy,
    {
        self.face_points(axis, layer)
            .map(|point| self[point])
            .collect()
    }

    /// Overwrite the slab at `layer` along `axis` with `values`, which must
    /// come from [`Self::copy_face`] of an identically shaped lattice.
    pub fn fill_face(&mut self, axis: Axis, layer: usize, values: impl IntoIterator<Item = T>) {
        let points: Vec<Point3<usize>> = self.face_points(axis, layer).collect();
        let mut values = values.into_iter();
        for point in points {
            let value = values
                .next()
                .unwrap_or_else(|| panic!("face slab shorter than the {axis:?} face"));
            self[point] = value;
        }
    }
}

impl<T> Index<Point3<usize>> for Lattice<T> {
    type Output = T;

    fn index(&self, point: Point3<usize>) -> &Self::Output {
        self.get(&point)
            .unwrap_or_else(|| panic!("point outside lattice: {point:?}"))
    }
}

impl<T> IndexMut<Point3<usize>> for Lattice<T> {
    fn index_mut(&mut self, point: Point3<usize>) -> &mut Self::Output {
        let dimensions = self.dimensions;
        self.get_mut(&point)
            .unwrap_or_else(|| panic!("point outside lattice: {point:?} (shape {dimensions:?})"))
    }
}
