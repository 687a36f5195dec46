//! Choosing between the primary and backup copy of a redundant structure.

use log::debug;
use serde::Serialize;

use crate::block::BlockStore;
use crate::checksum;
use crate::error::{Error, Result, Warning, WarningKind};
use crate::layout::{ChecksumSpec, Endian, Region};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Primary,
    Backup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selected<T> {
    pub value: T,
    pub source: Source,
}

/// A structure that records how recently it was written.
pub trait Versioned {
    fn update_counter(&self) -> Option<i16>;
}

/// The raw bytes of one copy together with its update counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub bytes: Vec<u8>,
    pub counter: Option<i16>,
}

impl Versioned for Candidate {
    fn update_counter(&self) -> Option<i16> {
        self.counter
    }
}

/// Picks the authoritative copy. `None` stands for a copy that failed verification.
///
/// With both copies valid the strictly larger update counter wins and ties go to the primary.
pub fn select<T: Versioned>(
    primary: Option<T>,
    backup: Option<T>,
    structure: &'static str,
) -> Result<Selected<T>> {
    let selected = match (primary, backup) {
        (Some(primary), Some(backup)) => {
            let newer_backup = match (primary.update_counter(), backup.update_counter()) {
                (Some(p), Some(b)) => b > p,
                _ => false,
            };
            if newer_backup {
                Selected {
                    value: backup,
                    source: Source::Backup,
                }
            } else {
                Selected {
                    value: primary,
                    source: Source::Primary,
                }
            }
        }
        (Some(primary), None) => Selected {
            value: primary,
            source: Source::Primary,
        },
        (None, Some(backup)) => Selected {
            value: backup,
            source: Source::Backup,
        },
        (None, None) => return Err(Error::VolumeCorrupted { structure }),
    };
    debug!("{structure}: using {:?} copy", selected.source);
    Ok(selected)
}

/// Reads one copy of a structure. A critical checksum failure yields `None`; a non-critical one is
/// recorded as a warning and the copy is kept.
pub fn read_copy(
    store: &BlockStore,
    region: &Region,
    checksum: Option<ChecksumSpec>,
    counter_at: Option<usize>,
    endian: Endian,
    name: String,
    warnings: &mut Vec<Warning>,
) -> Option<Candidate> {
    let bytes = store.read_region(region);
    if let Some(spec) = checksum {
        if !checksum::verify(&spec, &bytes, endian) {
            if spec.critical {
                debug!("{name}: checksum mismatch, copy rejected");
                return None;
            }
            warnings.push(Warning::new(name, WarningKind::ChecksumMismatch));
        }
    }
    let counter = counter_at.map(|at| endian.read_i16(&bytes[at..]));
    Some(Candidate { bytes, counter })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn copy(counter: i16) -> Candidate {
        Candidate {
            bytes: vec![counter as u8],
            counter: Some(counter),
        }
    }

    #[test]
    fn larger_counter_wins_and_ties_go_to_primary() {
        let chosen = select(Some(copy(3)), Some(copy(4)), "directory").expect("valid");
        assert_eq!(chosen.source, Source::Backup);
        let chosen = select(Some(copy(4)), Some(copy(4)), "directory").expect("valid");
        assert_eq!(chosen.source, Source::Primary, "ties favor the primary");
        let chosen = select(Some(copy(5)), Some(copy(-2)), "directory").expect("valid");
        assert_eq!(chosen.value, copy(5));
    }

    #[test]
    fn single_valid_copy_is_used() {
        let chosen = select(None, Some(copy(1)), "allocation table").expect("valid");
        assert_eq!(chosen.source, Source::Backup);
        assert!(matches!(
            select::<Candidate>(None, None, "allocation table"),
            Err(Error::VolumeCorrupted {
                structure: "allocation table"
            })
        ));
    }
}
