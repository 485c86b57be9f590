use crate::models::lane::Connectivity;

/// Reports the current network class, implemented by the embedder.
///
/// The dispatcher consults this before running a lane: the light lane
/// needs any connectivity, the heavy lane an unmetered link. An unmet
/// precondition leaves rows PENDING for a later activation.
pub trait ConnectivityProbe: Send + Sync {
    fn current(&self) -> Connectivity;
}

/// Probe that always reports unmetered connectivity, for embedders that
/// do not gate on network class (and for tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysUnmetered;

impl ConnectivityProbe for AlwaysUnmetered {
    fn current(&self) -> Connectivity {
        Connectivity::Unmetered
    }
}
