//! Thin façade over in-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! All handles are **waitable**; a backend may complete them eagerly.
//! Callers must `.wait()` a receive before trusting its buffer.
//! Messages between one `(src, dst, tag)` triple arrive in send order.

use bytes::Bytes;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Barrier};

/// Point-to-point communication plus the collective bits the export path needs.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// This process's rank.
    fn rank(&self) -> usize;
    /// Number of ranks.
    fn size(&self) -> usize;
    /// Block until every rank has reached the barrier.
    fn barrier(&self);
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Single-rank communicator: rank 0 of 1, every operation a no-op.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn barrier(&self) {}
}

// --- ThreadComm: several ranks inside one process, one thread each ---
type Key = (usize, usize, u16); // (src, dst, tag)

struct LocalUniverse {
    mailbox: DashMap<Key, VecDeque<Bytes>>,
    barrier: Barrier,
    size: usize,
}

/// In-process communicator; build a set of ranks with [`ThreadComm::universe`]
/// and move each into its own thread.
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    shared: Arc<LocalUniverse>,
}

impl ThreadComm {
    /// Communicators for ranks `0..size` sharing one mailbox.
    pub fn universe(size: usize) -> Vec<ThreadComm> {
        let shared = Arc::new(LocalUniverse {
            mailbox: DashMap::new(),
            barrier: Barrier::new(size),
            size,
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                shared: shared.clone(),
            })
            .collect()
    }
}

impl std::fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadComm")
            .field("rank", &self.rank)
            .field("size", &self.shared.size)
            .finish()
    }
}

pub struct LocalHandle {
    key: Key,
    len: usize,
    shared: Arc<LocalUniverse>,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            let msg = self
                .shared
                .mailbox
                .get_mut(&self.key)
                .and_then(|mut queue| queue.pop_front());
            if let Some(bytes) = msg {
                let n = bytes.len().min(self.len);
                return Some(bytes[..n].to_vec());
            }
            std::thread::yield_now();
        }
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, tag);
        self.shared
            .mailbox
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        LocalHandle {
            key: (peer, self.rank, tag),
            len: buf.len(),
            shared: self.shared.clone(),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.shared.size
    }
    fn barrier(&self) {
        self.shared.barrier.wait();
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// MPI communicator. The caller keeps the `mpi::environment::Universe`
    /// alive for as long as this value is in use.
    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new(world: SimpleCommunicator) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self { world, rank, size }
        }
    }

    /// Receives complete inside `irecv`; the handle only carries the data.
    pub struct MpiRecv(Option<Vec<u8>>);

    impl Wait for MpiRecv {
        fn wait(self) -> Option<Vec<u8>> {
            self.0
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = ();
        type RecvHandle = MpiRecv;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, i32::from(tag));
        }

        fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> MpiRecv {
            let (data, _status) = self
                .world
                .process_at_rank(peer as i32)
                .receive_vec_with_tag::<u8>(i32::from(tag));
            MpiRecv(Some(data))
        }

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }
        fn barrier(&self) {
            self.world.barrier();
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_roundtrip_two_ranks() {
        let mut comms = ThreadComm::universe(2);
        let comm1 = comms.pop().unwrap();
        let comm0 = comms.pop().unwrap();

        let mut recv_buf = [0u8; 4];
        let recv_handle = comm1.irecv(0, 7, &mut recv_buf);
        comm0.isend(1, 7, &[1, 2, 3, 4]).wait();

        let data = recv_handle
            .wait()
            .expect("Expected to receive data from rank 0");
        recv_buf.copy_from_slice(&data);
        assert_eq!(&recv_buf, &[1, 2, 3, 4]);
    }

    #[test]
    fn same_tag_messages_arrive_in_order() {
        let comms = ThreadComm::universe(2);
        comms[0].isend(1, 3, &[1]);
        comms[0].isend(1, 3, &[2]);
        let mut b = [0u8; 1];
        assert_eq!(comms[1].irecv(0, 3, &mut b).wait(), Some(vec![1]));
        assert_eq!(comms[1].irecv(0, 3, &mut b).wait(), Some(vec![2]));
    }

    #[test]
    fn barrier_releases_all_ranks() {
        let handles: Vec<_> = ThreadComm::universe(3)
            .into_iter()
            .map(|c| std::thread::spawn(move || c.barrier()))
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn no_comm_is_single_rank() {
        let c = NoComm;
        assert_eq!((c.rank(), c.size()), (0, 1));
        let mut b = [0u8; 2];
        assert!(c.irecv(0, 1, &mut b).wait().is_none());
    }
}
