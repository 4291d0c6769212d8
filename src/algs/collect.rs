//! Fold per-rank output buffers onto the I/O rank.
//!
//! Every rank owns a slice of the cells (its *interior* elements) plus ghost
//! copies of neighbouring cells. [`CollectToIoRank`] gathers interior values
//! of every named cell array, the block observations and the well results,
//! and scatters them into rank-global buffers that exist only on the I/O
//! rank. On a single rank all of this degenerates to a copy.
//!
//! A rank that fails locally still completes the exchange, so the error
//! reaches every rank instead of leaving the others blocked.

use crate::algs::communicator::{Communicator, NoComm};
use crate::algs::gather::gather_with;
use crate::algs::wire::kind;
use crate::data::block::BlockData;
use crate::data::field::{CellData, FieldTable, check_field_lengths};
use crate::data::wells::WellData;
use crate::export_error::ExportError;
use serde::{Deserialize, Serialize};

const CELL_MAP_TAG: u16 = 100;
const STEP_TAG: u16 = 110;

/// The rank that consolidates and persists output.
pub const IO_RANK: usize = 0;

/// Contract of the distributed data collector used by the export writer.
pub trait DataCollector {
    fn is_io_rank(&self) -> bool;
    fn is_parallel(&self) -> bool;

    /// Gather local buffers onto the I/O rank.
    ///
    /// Collective: every rank must call it, and no rank returns before all
    /// have contributed.
    fn collect(
        &mut self,
        fields: &FieldTable,
        block: &BlockData,
        wells: &WellData,
    ) -> Result<(), ExportError>;

    /// Take part in a collection for a rank that has no data because of
    /// `err`. The collection then fails on every rank; returns the error
    /// this rank should report.
    fn abort_collect(&mut self, err: ExportError) -> ExportError;

    /// Whether local element `local` is owned by this rank (not a ghost).
    fn is_interior(&self, local: usize) -> bool;

    /// Rank-global buffers; only valid on the I/O rank after [`collect`](Self::collect).
    fn global_field_table(&self) -> Result<&FieldTable, ExportError>;
    fn global_well_data(&self) -> Result<&WellData, ExportError>;
    fn global_block_data(&self) -> Result<&BlockData, ExportError>;

    /// Number of local elements (interior and ghost).
    fn num_local_cells(&self) -> usize;
    /// Size of the global active-cell index space.
    fn num_global_cells(&self) -> usize;
    fn local_to_global(&self, local: usize) -> Result<usize, ExportError>;
    /// Owning rank of every global cell; I/O rank only.
    fn global_ranks(&self) -> Result<&[i32], ExportError>;
}

#[derive(Serialize, Deserialize)]
struct StepPayload {
    cells: Vec<usize>,
    fields: FieldTable,
    block: BlockData,
    wells: WellData,
}

/// [`DataCollector`] over any [`Communicator`].
pub struct CollectToIoRank<C: Communicator> {
    comm: C,
    local_to_global: Vec<usize>,
    interior: Vec<bool>,
    num_global_cells: usize,
    global_ranks: Vec<i32>,
    global_fields: FieldTable,
    global_wells: WellData,
    global_block: BlockData,
}

impl CollectToIoRank<NoComm> {
    /// Single-rank collector over `num_cells` cells numbered identically
    /// locally and globally.
    pub fn serial(num_cells: usize) -> Self {
        Self {
            comm: NoComm,
            local_to_global: (0..num_cells).collect(),
            interior: vec![true; num_cells],
            num_global_cells: num_cells,
            global_ranks: vec![0; num_cells],
            global_fields: FieldTable::new(),
            global_wells: WellData::new(),
            global_block: BlockData::new(),
        }
    }
}

impl<C: Communicator> CollectToIoRank<C> {
    /// Build a collector from this rank's local-to-global map and interior mask.
    ///
    /// Collective: ownership is gathered so the I/O rank can check that every
    /// global cell has exactly one owner and report `MPI_RANK`.
    pub fn new(
        comm: C,
        local_to_global: Vec<usize>,
        interior: Vec<bool>,
        num_global_cells: usize,
    ) -> Result<Self, ExportError> {
        // A bad layout on one rank must still take part in the exchange.
        let owned = owned_cells(&local_to_global, &interior, num_global_cells)
            .and_then(|owned| Ok(bincode::serialize(&owned)?));
        let owners = gather_with(
            &comm,
            IO_RANK,
            CELL_MAP_TAG,
            kind::CELL_MAP,
            owned.as_deref(),
            |pieces| owner_map(&pieces, num_global_cells),
        );
        comm.barrier();
        let global_ranks = owners?.unwrap_or_default();

        Ok(Self {
            comm,
            local_to_global,
            interior,
            num_global_cells,
            global_ranks,
            global_fields: FieldTable::new(),
            global_wells: WellData::new(),
            global_block: BlockData::new(),
        })
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    fn local_payload(
        &self,
        fields: &FieldTable,
        block: &BlockData,
        wells: &WellData,
    ) -> Result<StepPayload, ExportError> {
        check_field_lengths(fields, self.local_to_global.len())?;
        let mut restricted = FieldTable::new();
        for (name, cell) in fields {
            let data = cell
                .data
                .iter()
                .zip(&self.interior)
                .filter_map(|(&v, &own)| own.then_some(v))
                .collect();
            restricted.insert(name.clone(), CellData::new(cell.measure, data, cell.target));
        }
        Ok(StepPayload {
            cells: self
                .local_to_global
                .iter()
                .zip(&self.interior)
                .filter_map(|(&g, &own)| own.then_some(g))
                .collect(),
            fields: restricted,
            block: block.clone(),
            wells: wells.clone(),
        })
    }

    /// Run one step exchange and keep the assembled buffers on the I/O rank.
    fn exchange(&mut self, local: Result<&[u8], &ExportError>) -> Result<(), ExportError> {
        let n = self.num_global_cells;
        let gathered = gather_with(
            &self.comm,
            IO_RANK,
            STEP_TAG,
            kind::STEP_PAYLOAD,
            local,
            |pieces| assemble(pieces, n),
        );
        self.comm.barrier();
        if let Some(assembled) = gathered? {
            self.global_fields = assembled.fields;
            self.global_wells = assembled.wells;
            self.global_block = assembled.block;
        }
        Ok(())
    }

    fn io_only<'a, T>(&self, what: &'static str, value: &'a T) -> Result<&'a T, ExportError> {
        if self.is_io_rank() {
            Ok(value)
        } else {
            Err(ExportError::NotIoRank(what))
        }
    }
}

/// Rank-global buffers folded from every rank's payload.
struct Assembled {
    fields: FieldTable,
    wells: WellData,
    block: BlockData,
}

fn assemble(pieces: Vec<Vec<u8>>, n: usize) -> Result<Assembled, ExportError> {
    let mut fields = FieldTable::new();
    let mut wells = WellData::new();
    let mut block = BlockData::new();
    for piece in pieces {
        let payload: StepPayload = bincode::deserialize(&piece)?;
        for (name, cell) in payload.fields {
            let global = fields
                .entry(name)
                .or_insert_with(|| CellData::zeros(cell.measure, n, cell.target));
            for (&g, v) in payload.cells.iter().zip(cell.data) {
                global.data[g] = v;
            }
        }
        wells.merge_from(&payload.wells);
        block.merge_from(&payload.block);
    }
    Ok(Assembled {
        fields,
        wells,
        block,
    })
}

/// Global indices of this rank's interior cells, after checking the layout.
fn owned_cells(
    local_to_global: &[usize],
    interior: &[bool],
    num_global_cells: usize,
) -> Result<Vec<usize>, ExportError> {
    if interior.len() != local_to_global.len() {
        return Err(ExportError::BufferSizeMismatch {
            name: "interior".into(),
            expected: local_to_global.len(),
            found: interior.len(),
        });
    }
    if let Some(&bad) = local_to_global.iter().find(|&&g| g >= num_global_cells) {
        return Err(ExportError::CellOutOfRange {
            cell: bad,
            size: num_global_cells,
        });
    }
    Ok(local_to_global
        .iter()
        .zip(interior)
        .filter_map(|(&g, &own)| own.then_some(g))
        .collect())
}

/// Owning rank per global cell from the gathered interior cell lists.
fn owner_map(pieces: &[Vec<u8>], num_global_cells: usize) -> Result<Vec<i32>, ExportError> {
    let mut owners = vec![-1; num_global_cells];
    for (rank, piece) in pieces.iter().enumerate() {
        let cells: Vec<usize> = bincode::deserialize(piece)?;
        for g in cells {
            let slot = owners.get_mut(g).ok_or(ExportError::CellOutOfRange {
                cell: g,
                size: num_global_cells,
            })?;
            if *slot >= 0 {
                return Err(ExportError::InvalidGrid(format!(
                    "global cell {g} owned by ranks {} and {rank}",
                    *slot
                )));
            }
            *slot = rank as i32;
        }
    }
    if let Some(orphan) = owners.iter().position(|&r| r < 0) {
        return Err(ExportError::InvalidGrid(format!(
            "global cell {orphan} is not owned by any rank"
        )));
    }
    Ok(owners)
}

impl<C: Communicator> DataCollector for CollectToIoRank<C> {
    fn is_io_rank(&self) -> bool {
        self.comm.rank() == IO_RANK
    }

    fn is_parallel(&self) -> bool {
        self.comm.size() > 1
    }

    fn collect(
        &mut self,
        fields: &FieldTable,
        block: &BlockData,
        wells: &WellData,
    ) -> Result<(), ExportError> {
        let bytes = self
            .local_payload(fields, block, wells)
            .and_then(|payload| Ok(bincode::serialize(&payload)?));
        self.exchange(bytes.as_deref())
    }

    fn abort_collect(&mut self, err: ExportError) -> ExportError {
        match self.exchange(Err(&err)) {
            Err(reported) => reported,
            Ok(()) => err,
        }
    }

    fn is_interior(&self, local: usize) -> bool {
        self.interior.get(local).copied().unwrap_or(false)
    }

    fn global_field_table(&self) -> Result<&FieldTable, ExportError> {
        self.io_only("global_field_table", &self.global_fields)
    }

    fn global_well_data(&self) -> Result<&WellData, ExportError> {
        self.io_only("global_well_data", &self.global_wells)
    }

    fn global_block_data(&self) -> Result<&BlockData, ExportError> {
        self.io_only("global_block_data", &self.global_block)
    }

    fn num_local_cells(&self) -> usize {
        self.local_to_global.len()
    }

    fn num_global_cells(&self) -> usize {
        self.num_global_cells
    }

    fn local_to_global(&self, local: usize) -> Result<usize, ExportError> {
        self.local_to_global
            .get(local)
            .copied()
            .ok_or(ExportError::CellOutOfRange {
                cell: local,
                size: self.local_to_global.len(),
            })
    }

    fn global_ranks(&self) -> Result<&[i32], ExportError> {
        self.io_only("global_ranks", &self.global_ranks)
            .map(Vec::as_slice)
    }
}
