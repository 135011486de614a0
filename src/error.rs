use thiserror::Error;

#[derive(Debug, Error)]
pub enum CellflowError {
    /// The box cannot be tiled with cells of at least the requested size,
    /// or the process count is unusable. Fatal at construction.
    #[error("Config error: {0}")]
    Config(String),

    /// A subdomain ended up with zero local cells after decomposition.
    /// Fatal; indicates a partitioning bug or a pathological metric.
    #[error("Empty subdomain on rank {0}")]
    EmptySubdomain(usize),

    /// A rank appears in the topology neighbor list but shares no ghost
    /// cell with this subdomain. Fatal invariant violation.
    #[error("Inconsistent neighbor: rank {0} shares no ghost cell")]
    InconsistentNeighbor(usize),

    /// A position could not be resolved to this rank or any of its 26
    /// neighbors. Typically a particle moved more than one subdomain per
    /// step.
    #[error("Position ({0}, {1}, {2}) outside of this rank's neighborhood")]
    OutOfNeighborhood(f64, f64, f64),

    /// A local cell index was requested for a position this rank does not
    /// own (ghost layer or beyond). Caller's bug.
    #[error("Position ({0}, {1}, {2}) is not local to this rank")]
    NotLocal(f64, f64, f64),
}

pub type Result<T> = std::result::Result<T, CellflowError>;
