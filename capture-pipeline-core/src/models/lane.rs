use super::queue_item::FileType;

/// Network class reported by the embedder's connectivity probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Offline,
    /// Metered link (cellular, hotspot). Fine for small log artifacts.
    Metered,
    Unmetered,
}

/// One of the two independent upload pipelines.
///
/// The light lane carries cheap, frequent log artifacts and favors low
/// latency; the heavy lane carries bandwidth-heavy audio that tolerates
/// staleness and must not hammer metered or battery-constrained links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Light,
    Heavy,
}

impl Lane {
    pub const ALL: [Lane; 2] = [Lane::Light, Lane::Heavy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::Light => "light",
            Lane::Heavy => "heavy",
        }
    }

    /// Artifact types this lane drains.
    pub fn file_types(&self) -> &'static [FileType] {
        match self {
            Lane::Light => &[FileType::PhysLog, FileType::ScreenLog],
            Lane::Heavy => &[FileType::Audio],
        }
    }

    pub fn for_file_type(file_type: FileType) -> Lane {
        match file_type {
            FileType::PhysLog | FileType::ScreenLog => Lane::Light,
            FileType::Audio => Lane::Heavy,
        }
    }

    /// Network precondition: the light lane runs on any connectivity, the
    /// heavy lane only on unmetered links.
    pub fn admits(&self, connectivity: Connectivity) -> bool {
        match self {
            Lane::Light => connectivity != Connectivity::Offline,
            Lane::Heavy => connectivity == Connectivity::Unmetered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lanes_partition_the_file_types() {
        for ft in FileType::ALL {
            let lane = Lane::for_file_type(ft);
            assert!(lane.file_types().contains(&ft));
            let other = match lane {
                Lane::Light => Lane::Heavy,
                Lane::Heavy => Lane::Light,
            };
            assert!(!other.file_types().contains(&ft));
        }
    }

    #[test]
    fn network_preconditions() {
        assert!(!Lane::Light.admits(Connectivity::Offline));
        assert!(Lane::Light.admits(Connectivity::Metered));
        assert!(Lane::Light.admits(Connectivity::Unmetered));
        assert!(!Lane::Heavy.admits(Connectivity::Offline));
        assert!(!Lane::Heavy.admits(Connectivity::Metered));
        assert!(Lane::Heavy.admits(Connectivity::Unmetered));
    }
}
