//! Format registry and dispatcher (spec.md §4.1).
//!
//! A small, static, ordered table of handlers: `detect` is pure and
//! cheap; wrappers are listed before archives so that an archive
//! signature embedded in a transport encoding's payload is not mistaken
//! for the outer format. `peel` walks the table repeatedly, replacing
//! the working buffer on each wrapper hit, until it lands on an archive
//! or on no match at all.

use crate::{Entry, FileMetadata, ParseError, PeelLimits};

pub mod bin;
pub mod cpt;
pub mod hqx;
pub mod pull;
pub mod sit;

/// A supported format tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Hqx,
    Bin,
    Sit,
    Cpt,
}

/// Whether a format carries exactly one file (`Wrapper`) or many
/// (`Archive`) — spec.md GLOSSARY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Wrapper,
    Archive,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Format::Hqx => "hqx",
            Format::Bin => "bin",
            Format::Sit => "sit",
            Format::Cpt => "cpt",
        }
    }

    pub fn kind(self) -> FormatKind {
        match self {
            Format::Hqx | Format::Bin => FormatKind::Wrapper,
            Format::Sit | Format::Cpt => FormatKind::Archive,
        }
    }
}

struct Handler {
    format: Format,
    detect: fn(&[u8]) -> bool,
}

/// Declared order: wrappers before archives.
static HANDLERS: &[Handler] = &[
    Handler {
        format: Format::Hqx,
        detect: hqx::detect,
    },
    Handler {
        format: Format::Bin,
        detect: bin::detect,
    },
    Handler {
        format: Format::Sit,
        detect: sit::detect,
    },
    Handler {
        format: Format::Cpt,
        detect: cpt::detect,
    },
];

pub fn detect(data: &[u8]) -> Option<Format> {
    HANDLERS.iter().find(|h| (h.detect)(data)).map(|h| h.format)
}

/// Repeatedly peels wrapper layers, then (if an archive is found) peels
/// it and recursively re-probes each entry's data fork.
///
/// Implemented iteratively with an explicit loop rather than recursion,
/// so that wrapper-unwrap depth never grows the call stack (spec.md §9).
pub fn peel(data: &[u8], limits: &PeelLimits) -> Result<Vec<Entry>, ParseError> {
    let mut buf = data.to_vec();
    let mut depth = 0u32;

    loop {
        match detect(&buf) {
            Some(fmt) if fmt.kind() == FormatKind::Wrapper => {
                if depth >= limits.max_unwrap_depth {
                    log::debug!(
                        "peel: hit max_unwrap_depth={}, wrapping remainder as a single entry",
                        limits.max_unwrap_depth
                    );
                    return Ok(vec![single_entry(buf)]);
                }
                log::trace!("peel: stripping {} wrapper at depth {}", fmt.name(), depth);
                buf = match fmt {
                    Format::Hqx => hqx::peel_wrapper(&buf)?,
                    Format::Bin => bin::peel_wrapper(&buf)?,
                    _ => unreachable!("wrapper kind guaranteed above"),
                };
                depth += 1;
            }
            Some(Format::Sit) => {
                log::debug!("peel: dispatching to SIT archive decoder");
                let entries = sit::peel(&buf, limits)?;
                return Ok(repeel_entries(entries, limits));
            }
            Some(Format::Cpt) => {
                log::debug!("peel: dispatching to CPT archive decoder");
                let entries = cpt::peel(&buf, limits)?;
                return Ok(repeel_entries(entries, limits));
            }
            None => return Ok(vec![single_entry(buf)]),
            _ => unreachable!("every Format is Wrapper or Archive"),
        }
    }
}

fn single_entry(data: Vec<u8>) -> Entry {
    Entry {
        metadata: FileMetadata::default(),
        data_fork: data,
        resource_fork: Vec::new(),
    }
}

/// Recursively re-invokes `peel` on each extracted entry's data fork,
/// but only when that fork is itself detected as a *wrapper* format —
/// recursing through archive detections is forbidden (spec.md §4.1) to
/// avoid false positives against raw binary payloads. Failure is
/// non-fatal: the original entry is kept unchanged.
fn repeel_entries(entries: Vec<Entry>, limits: &PeelLimits) -> Vec<Entry> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        match detect(&entry.data_fork) {
            Some(fmt) if fmt.kind() == FormatKind::Wrapper => match peel(&entry.data_fork, limits)
            {
                Ok(sub_entries) => out.extend(sub_entries),
                Err(err) => {
                    log::debug!("peel: recursive re-peel failed ({err}), keeping entry as-is");
                    out.push(entry);
                }
            },
            _ => out.push(entry),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_input_wraps_as_single_entry() {
        let entries = peel(b"not an archive", &PeelLimits::default()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].data_fork, b"not an archive");
        assert!(entries[0].resource_fork.is_empty());
    }
}
