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
    material::{
        Medium,
        PmlBounds,
    },
    space::Space,
};

/// A geometric object carrying a material.
///
/// Objects later in a scene list take precedence where they overlap, so the
/// usual layering is default medium first, structures next, absorbing
/// boundary last.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GeomObject {
    /// Fills all of space.
    DefaultMedium { medium: Medium },
    /// Axis-aligned box; an infinite extent makes it a slab.
    Block {
        medium: Medium,
        center: Point3<f64>,
        size: Vector3<f64>,
    },
    /// Shell of the given thickness on every face of the domain that has a
    /// finite extent.
    Boundary { medium: Medium, thickness: f64 },
}

impl GeomObject {
    pub fn default_medium(medium: impl Into<Medium>) -> Self {
        Self::DefaultMedium {
            medium: medium.into(),
        }
    }

    pub fn block(medium: impl Into<Medium>, size: impl Into<Vector3<f64>>) -> Self {
        Self::Block {
            medium: medium.into(),
            center: Point3::origin(),
            size: size.into(),
        }
    }

    pub fn block_at(
        medium: impl Into<Medium>,
        center: impl Into<Point3<f64>>,
        size: impl Into<Vector3<f64>>,
    ) -> Self {
        Self::Block {
            medium: medium.into(),
            center: center.into(),
            size: size.into(),
        }
    }

    pub fn boundary(medium: impl Into<Medium>, thickness: f64) -> Self {
        Self::Boundary {
            medium: medium.into(),
            thickness,
        }
    }

    pub fn medium(&self) -> &Medium {
        match self {
            GeomObject::DefaultMedium { medium } => medium,
            GeomObject::Block { medium, .. } => medium,
            GeomObject::Boundary { medium, .. } => medium,
        }
    }

    fn contains(&self, space: &Space, point: &Point3<f64>) -> bool {
        match self {
            GeomObject::DefaultMedium { .. } => true,
            GeomObject::Block { center, size, .. } => {
                (0..3).all(|i| (point[i] - center[i]).abs() <= 0.5 * size[i])
            }
            GeomObject::Boundary { thickness, .. } => {
                (0..3).any(|i| {
                    let extent = space.size[i];
                    extent > 0.0
                        && (point[i] <= -0.5 * extent + thickness
                            || point[i] >= 0.5 * extent - thickness)
                })
            }
        }
    }
}

/// Point to material lookup over a scene list, bound to a resolved space.
///
/// `material_of_point` returns the topmost material at the point together
/// with the one underneath it, which the pointwise operators use for
/// sub-cell averaging at interfaces.
#[derive(Clone, Debug)]
pub struct GeomTree {
    space: Space,
    objects: Vec<GeomObject>,
}

impl GeomTree {
    pub fn new(space: &Space, scene: &[GeomObject]) -> Self {
        let mut objects = scene.to_vec();

        // bind absorbing boundaries to the domain they enclose
        for object in &mut objects {
            if let GeomObject::Boundary { medium, thickness } = object
                && let Medium::Cpml(cpml) = medium
            {
                cpml.bind(PmlBounds {
                    low: Point3::from(-0.5 * space.size),
                    high: Point3::from(0.5 * space.size),
                    thickness: *thickness,
                    active: [space.size.x > 0.0, space.size.y > 0.0, space.size.z > 0.0],
                });
            }
        }

        Self {
            space: *space,
            objects,
        }
    }

    /// The material at a point and the material underneath it.
    pub fn material_of_point(&self, point: &Point3<f64>) -> Result<(&Medium, &Medium), Error> {
        let mut hits = self
            .objects
            .iter()
            .rev()
            .filter(|object| object.contains(&self.space, point));

        let top = hits
            .next()
            .ok_or(Error::NoMaterial { point: *point })?
            .medium();
        let below = hits.next().map(GeomObject::medium).unwrap_or(top);
        Ok((top, below))
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Point3;

    use super::{
        GeomObject,
        GeomTree,
    };
    use crate::{
        material::{
            Cpml,
            Dielectric,
            Medium,
        },
        space::Space,
    };

    fn waveguide_scene() -> (Space, Vec<GeomObject>) {
        let space = Space::new([16.0, 8.0, 0.0], 10.0);
        let scene = vec![
            GeomObject::default_medium(Dielectric::VACUUM),
            GeomObject::block(Dielectric::new(12.0), [f64::INFINITY, 1.0, f64::INFINITY]),
            GeomObject::boundary(Cpml::new(), 1.0),
        ];
        (space, scene)
    }

    #[test]
    fn later_objects_take_precedence() {
        let (space, scene) = waveguide_scene();
        let tree = GeomTree::new(&space, &scene);

        let (top, below) = tree.material_of_point(&Point3::new(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(top.epsilon(), 12.0);
        assert_eq!(below.epsilon(), 1.0);

        let (top, _) = tree.material_of_point(&Point3::new(0.0, 2.0, 0.0)).unwrap();
        assert_eq!(top, &Medium::from(Dielectric::VACUUM));
    }

    #[test]
    fn boundary_shell_wins_over_the_guide() {
        let (space, scene) = waveguide_scene();
        let tree = GeomTree::new(&space, &scene);

        let (top, below) = tree
            .material_of_point(&Point3::new(-7.6, 0.0, 0.0))
            .unwrap();
        assert!(matches!(top, Medium::Cpml(_)));
        // the absorber overlaps the guide there, so the guide sits underneath
        assert_eq!(below.epsilon(), 12.0);
    }

    #[test]
    fn boundary_ignores_zero_extent_axes() {
        let (space, scene) = waveguide_scene();
        let tree = GeomTree::new(&space, &scene);

        // z is the uniform axis; staggered samples sit at +-dz/2 and must not
        // land in the absorber
        let (top, _) = tree
            .material_of_point(&Point3::new(0.0, 0.0, 0.05))
            .unwrap();
        assert_eq!(top.epsilon(), 12.0);
    }

    #[test]
    fn missing_material_is_an_error() {
        let space = Space::new([2.0, 2.0, 2.0], 1.0);
        let scene = vec![GeomObject::block(Dielectric::VACUUM, [1.0, 1.0, 1.0])];
        let tree = GeomTree::new(&space, &scene);
        assert!(tree.material_of_point(&Point3::new(0.9, 0.9, 0.9)).is_err());
    }
}
