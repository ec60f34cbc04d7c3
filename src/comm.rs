use std::{
    any::Any,
    collections::{
        HashMap,
        VecDeque,
    },
    sync::Arc,
    time::Duration,
};

use nalgebra::Vector3;
use parking_lot::{
    Condvar,
    Mutex,
};

use crate::{
    Error,
    constants::Axis,
};

pub type Rank = usize;

const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// A group of ranks arranged on a periodic Cartesian topology, exchanging
/// messages through in-process mailboxes.
///
/// Every axis is periodic, so `shift` always resolves to a rank; on an axis
/// with a single rank the exchange wraps back to the sender. This mirrors the
/// messaging substrate the engine was written against: symmetric object
/// exchange, in-order delivery per (peer, tag) channel, no thread safety
/// assumed beyond one in-flight `sendrecv` per rank.
pub struct ProcessGroup;

impl ProcessGroup {
    /// Create communicator handles for every rank of a `topology`-shaped
    /// group. Each handle is meant to be moved onto the thread driving that
    /// rank's subdomain.
    pub fn new(topology: Vector3<usize>) -> Vec<CartComm> {
        assert!(topology.product() > 0, "empty process topology");

        let shared = Arc::new(Shared {
            topology,
            mailboxes: Mutex::new(HashMap::new()),
            delivered: Condvar::new(),
        });

        (0..topology.product())
            .map(|rank| {
                CartComm {
                    shared: shared.clone(),
                    rank,
                }
            })
            .collect()
    }

    /// The trivial 1x1x1 group for single-process runs.
    pub fn single() -> CartComm {
        Self::new(Vector3::new(1, 1, 1)).remove(0)
    }
}

struct Shared {
    topology: Vector3<usize>,
    mailboxes: Mutex<HashMap<MailboxKey, VecDeque<Box<dyn Any + Send>>>>,
    delivered: Condvar,
}

/// (receiver, sender, tag)
type MailboxKey = (Rank, Rank, u32);

#[derive(Clone)]
pub struct CartComm {
    shared: Arc<Shared>,
    rank: Rank,
}

impl std::fmt::Debug for CartComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartComm")
            .field("rank", &self.rank)
            .field("topology", &self.shared.topology)
            .finish()
    }
}

impl CartComm {
    pub fn my_id(&self) -> Rank {
        self.rank
    }

    pub fn num_procs(&self) -> usize {
        self.shared.topology.product()
    }

    pub fn topology(&self) -> Vector3<usize> {
        self.shared.topology
    }

    /// This rank's coordinates on the Cartesian topology.
    pub fn coords(&self) -> Vector3<usize> {
        let topology = self.shared.topology;
        let mut rank = self.rank;
        let x = rank % topology.x;
        rank /= topology.x;
        let y = rank % topology.y;
        rank /= topology.y;
        Vector3::new(x, y, rank)
    }

    fn rank_of(&self, coords: &Vector3<usize>) -> Rank {
        let topology = self.shared.topology;
        coords.x + topology.x * (coords.y + topology.y * coords.z)
    }

    /// Ranks of the communication partners for a displacement of `delta`
    /// along `axis`, as `(source, destination)`: data sent by this rank goes
    /// to `destination`, data received comes from `source`.
    pub fn shift(&self, axis: Axis, delta: isize) -> (Rank, Rank) {
        let index = axis.index();
        let extent = self.shared.topology[index] as isize;
        let here = self.coords()[index] as isize;

        let wrap = |value: isize| value.rem_euclid(extent) as usize;

        let mut source = self.coords();
        source[index] = wrap(here - delta);
        let mut destination = self.coords();
        destination[index] = wrap(here + delta);

        (self.rank_of(&source), self.rank_of(&destination))
    }

    /// Symmetric object exchange: send `send` to `destination` under
    /// `send_tag` and block until a message from `source` under `recv_tag`
    /// arrives.
    pub fn sendrecv<T: Send + 'static>(
        &self,
        send: T,
        destination: Rank,
        send_tag: u32,
        source: Rank,
        recv_tag: u32,
    ) -> Result<T, Error> {
        let mut mailboxes = self.shared.mailboxes.lock();
        mailboxes
            .entry((destination, self.rank, send_tag))
            .or_default()
            .push_back(Box::new(send));
        self.shared.delivered.notify_all();

        let key = (self.rank, source, recv_tag);
        loop {
            if let Some(message) = mailboxes.get_mut(&key).and_then(VecDeque::pop_front) {
                return message.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
                    Error::Exchange {
                        rank: source,
                        reason: "message payload has an unexpected type",
                    }
                });
            }

            if self
                .shared
                .delivered
                .wait_for(&mut mailboxes, EXCHANGE_TIMEOUT)
                .timed_out()
            {
                return Err(Error::Exchange {
                    rank: source,
                    reason: "timed out waiting for the neighbor",
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;

    use super::ProcessGroup;
    use crate::constants::Axis;

    #[test]
    fn single_rank_shifts_to_itself() {
        let comm = ProcessGroup::single();
        assert_eq!(comm.shift(Axis::X, 1), (0, 0));
        assert_eq!(comm.shift(Axis::Z, -1), (0, 0));
    }

    #[test]
    fn shift_wraps_periodically() {
        let comms = ProcessGroup::new(Vector3::new(4, 1, 1));
        // rank 0 sending low: destination wraps to rank 3
        assert_eq!(comms[0].shift(Axis::X, -1), (1, 3));
        assert_eq!(comms[3].shift(Axis::X, 1), (2, 0));
        assert_eq!(comms[2].coords(), Vector3::new(2, 0, 0));
    }

    #[test]
    fn self_exchange_round_trips() {
        let comm = ProcessGroup::single();
        let sent = vec![1.0f64, 2.0, 3.0];
        let received = comm.sendrecv(sent.clone(), 0, 7, 0, 7).unwrap();
        assert_eq!(received, sent);
    }

    #[test]
    fn pairwise_exchange_crosses_ranks() {
        let mut comms = ProcessGroup::new(Vector3::new(2, 1, 1));
        let right = comms.pop().unwrap();
        let left = comms.pop().unwrap();

        let handle = std::thread::spawn(move || right.sendrecv(1u32, 0, 3, 0, 3).unwrap());
        let from_right = left.sendrecv(0u32, 1, 3, 1, 3).unwrap();

        assert_eq!(from_right, 1);
        assert_eq!(handle.join().unwrap(), 0);
    }
}
