use serde::{
    Deserialize,
    Serialize,
};

use crate::constants::{
    Axis,
    Component,
};

/// Which symmetry reduction the engine runs under.
///
/// The seven schedules differ only in which components exist, the order of
/// the two exchange/update phases over them, and which axes enter the
/// Courant bound, so each variant is described by data rather than its own
/// engine. A reduced mode retains exactly the components whose updates
/// involve only the two transverse spatial derivatives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Full three dimensional scheme with all six components.
    Full,
    /// Transverse electric with respect to the axis: one magnetic component
    /// plus its two transverse electric ones.
    Te(Axis),
    /// Transverse magnetic with respect to the axis.
    Tm(Axis),
    /// One dimensional transverse electromagnetic propagation along the
    /// axis.
    Tem(Axis),
}

/// Component sets of the two phases of a step, in update order.
#[derive(Clone, Copy, Debug)]
pub struct Schedule {
    pub electric: &'static [Component],
    pub magnetic: &'static [Component],
}

impl Mode {
    pub fn schedule(&self) -> Schedule {
        use Component::*;

        match self {
            Mode::Full => {
                Schedule {
                    electric: &[Ex, Ey, Ez],
                    magnetic: &[Hx, Hy, Hz],
                }
            }
            Mode::Te(Axis::X) => {
                Schedule {
                    electric: &[Ey, Ez],
                    magnetic: &[Hx],
                }
            }
            Mode::Te(Axis::Y) => {
                Schedule {
                    electric: &[Ez, Ex],
                    magnetic: &[Hy],
                }
            }
            Mode::Te(Axis::Z) => {
                Schedule {
                    electric: &[Ex, Ey],
                    magnetic: &[Hz],
                }
            }
            Mode::Tm(Axis::X) => {
                Schedule {
                    electric: &[Ex],
                    magnetic: &[Hy, Hz],
                }
            }
            Mode::Tm(Axis::Y) => {
                Schedule {
                    electric: &[Ey],
                    magnetic: &[Hz, Hx],
                }
            }
            Mode::Tm(Axis::Z) => {
                Schedule {
                    electric: &[Ez],
                    magnetic: &[Hx, Hy],
                }
            }
            Mode::Tem(Axis::X) => {
                Schedule {
                    electric: &[Ey],
                    magnetic: &[Hz],
                }
            }
            Mode::Tem(Axis::Y) => {
                Schedule {
                    electric: &[Ez],
                    magnetic: &[Hx],
                }
            }
            Mode::Tem(Axis::Z) => {
                Schedule {
                    electric: &[Ex],
                    magnetic: &[Hy],
                }
            }
        }
    }

    /// All components this mode advances.
    pub fn active_components(&self) -> impl Iterator<Item = Component> {
        let schedule = self.schedule();
        schedule
            .electric
            .iter()
            .chain(schedule.magnetic)
            .copied()
    }

    /// Axes entering the Courant bound; reduced modes drop the axes their
    /// fields do not vary along.
    pub fn axes(&self) -> &'static [Axis] {
        match self {
            Mode::Full => &[Axis::X, Axis::Y, Axis::Z],
            Mode::Te(Axis::X) | Mode::Tm(Axis::X) => &[Axis::Y, Axis::Z],
            Mode::Te(Axis::Y) | Mode::Tm(Axis::Y) => &[Axis::Z, Axis::X],
            Mode::Te(Axis::Z) | Mode::Tm(Axis::Z) => &[Axis::X, Axis::Y],
            Mode::Tem(Axis::X) => &[Axis::X],
            Mode::Tem(Axis::Y) => &[Axis::Y],
            Mode::Tem(Axis::Z) => &[Axis::Z],
        }
    }
}
