//! Gather one byte payload per rank onto a root rank.
//!
//! Every message is a frame: a fixed [`WireHdr`] (kind + length) on `tag` and
//! the body on `tag + 1`. Each non-root rank sends one frame to the root,
//! which receives peers in rank order, so the result is indexed by rank. The
//! root then answers every peer with a verdict frame on `tag + 2`.
//!
//! A rank that failed locally still takes part: it sends a
//! [`kind::FAILED`] frame with the error text instead of its payload. The
//! root receives from every peer before it decides, so nothing of one
//! exchange is left queued for the next, and when any rank failed every rank
//! returns an error.

use crate::algs::communicator::{Communicator, Wait};
use crate::algs::wire::{WireHdr, kind};
use crate::export_error::ExportError;

/// Gather `payload` from every rank onto `root`.
///
/// Returns `Some(per_rank_payloads)` on the root and `None` elsewhere.
pub fn gather_to_root<C: Communicator>(
    comm: &C,
    root: usize,
    tag: u16,
    msg_kind: u16,
    payload: &[u8],
) -> Result<Option<Vec<Vec<u8>>>, ExportError> {
    gather_with(comm, root, tag, msg_kind, Ok(payload), Ok)
}

/// Gather this rank's outcome onto `root` and fold the payloads there.
///
/// `local` is either this rank's payload or the error that kept it from
/// producing one. `on_root` runs on the root only, and only when every rank
/// contributed; its error counts as a failure of the root. A rank returns
/// its own local error first, otherwise the failure of the rank that failed
/// first, as [`ExportError::RankFailed`].
pub fn gather_with<C, T, F>(
    comm: &C,
    root: usize,
    tag: u16,
    msg_kind: u16,
    local: Result<&[u8], &ExportError>,
    on_root: F,
) -> Result<Option<T>, ExportError>
where
    C: Communicator,
    F: FnOnce(Vec<Vec<u8>>) -> Result<T, ExportError>,
{
    let rank = comm.rank();
    let size = comm.size();
    if root >= size {
        return Err(ExportError::Communication(format!(
            "gather root {root} outside communicator of size {size}"
        )));
    }
    let verdict_tag = tag.wrapping_add(2);

    if rank != root {
        match local {
            Ok(payload) => send_frame(comm, root, tag, msg_kind, payload),
            Err(e) => send_frame(comm, root, tag, kind::FAILED, e.to_string().as_bytes()),
        }
        let verdict = recv_frame(comm, root, verdict_tag);
        if let Err(e) = local {
            return Err(e.clone());
        }
        let (verdict_kind, body) = verdict?;
        return match verdict_kind {
            kind::ACCEPTED => Ok(None),
            kind::FAILED => {
                let (origin, reason): (usize, String) = bincode::deserialize(&body)?;
                Err(ExportError::RankFailed {
                    rank: origin,
                    reason,
                })
            }
            other => Err(ExportError::Communication(format!(
                "root sent verdict kind {other}"
            ))),
        };
    }

    let mut pieces = Vec::with_capacity(size);
    let mut peer_failure: Option<(usize, String)> = None;
    for peer in 0..size {
        if peer == root {
            pieces.push(local.map(<[u8]>::to_vec).unwrap_or_default());
            continue;
        }
        match recv_piece(comm, peer, tag, msg_kind) {
            Ok(body) => pieces.push(body),
            Err(reason) => {
                peer_failure.get_or_insert((peer, reason));
                pieces.push(Vec::new());
            }
        }
    }
    let received = pieces.iter().map(Vec::len).sum::<usize>();

    let outcome = match (local, peer_failure) {
        (Err(e), _) => Err(e.clone()),
        (Ok(_), Some((peer, reason))) => Err(ExportError::RankFailed { rank: peer, reason }),
        (Ok(_), None) => on_root(pieces),
    };

    let verdict = match &outcome {
        Ok(_) => None,
        Err(ExportError::RankFailed { rank, reason }) => Some((*rank, reason.clone())),
        Err(e) => Some((root, e.to_string())),
    };
    // An unencodable verdict still reaches the peers; they fail to decode it.
    let failed_body = verdict
        .as_ref()
        .map(|v| bincode::serialize(v).unwrap_or_default());
    for peer in (0..size).filter(|&p| p != root) {
        match &failed_body {
            Some(body) => send_frame(comm, peer, verdict_tag, kind::FAILED, body),
            None => send_frame(comm, peer, verdict_tag, kind::ACCEPTED, &[]),
        }
    }

    match outcome {
        Ok(value) => {
            log::debug!("gathered {received} bytes from {size} ranks (kind {msg_kind})");
            Ok(Some(value))
        }
        Err(e) => {
            log::warn!("gather of kind {msg_kind} failed: {e}");
            Err(e)
        }
    }
}

fn send_frame<C: Communicator>(comm: &C, peer: usize, tag: u16, msg_kind: u16, body: &[u8]) {
    let hdr = WireHdr::new(msg_kind, body.len());
    let _ = comm.isend(peer, tag, hdr.as_bytes()).wait();
    let _ = comm.isend(peer, tag.wrapping_add(1), body).wait();
}

fn recv_frame<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: u16,
) -> Result<(u16, Vec<u8>), ExportError> {
    let mut hdr_buf = [0u8; std::mem::size_of::<WireHdr>()];
    let raw = comm
        .irecv(peer, tag, &mut hdr_buf)
        .wait()
        .ok_or_else(|| ExportError::Communication(format!("no header from rank {peer}")))?;
    let hdr = WireHdr::decode(&raw)
        .map_err(|e| ExportError::Communication(format!("rank {peer}: {e}")))?;

    let mut data_buf = vec![0u8; hdr.len()];
    let data = comm
        .irecv(peer, tag.wrapping_add(1), &mut data_buf)
        .wait()
        .ok_or_else(|| ExportError::Communication(format!("no payload from rank {peer}")))?;
    if data.len() != hdr.len() {
        return Err(ExportError::Communication(format!(
            "rank {peer} payload length mismatch: header {} bytes, received {}",
            hdr.len(),
            data.len()
        )));
    }
    Ok((hdr.kind(), data))
}

/// One peer's contribution, or the reason it has none.
fn recv_piece<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: u16,
    msg_kind: u16,
) -> Result<Vec<u8>, String> {
    let (got, body) = recv_frame(comm, peer, tag).map_err(|e| e.to_string())?;
    if got == msg_kind {
        Ok(body)
    } else if got == kind::FAILED {
        Err(String::from_utf8_lossy(&body).into_owned())
    } else {
        Err(format!("sent message kind {got}, expected {msg_kind}"))
    }
}
