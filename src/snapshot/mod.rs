//! Source snapshotting from embedded debug information.
//!
//! Walks the DWARF line-number programs of a workload binary and resolves
//! every referenced file name to an absolute path, then keeps the paths
//! that still exist on the local filesystem. The result is "local sources
//! still present that contributed to this binary", used for archival; it
//! is not a claim that every debug-referenced file exists.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use gimli::{EndianSlice, RunTimeEndian};
use log::debug;
use object::{Object, ObjectSection};

use crate::error::{Error, Result};

/// Recovers the set of existing local source files referenced by the
/// binary's debug info.
///
/// A missing binary yields an empty set rather than an error; workloads
/// built without debug info simply contribute nothing.
pub fn snapshot_sources(binary: &Path) -> Result<HashSet<PathBuf>> {
    if !binary.is_file() {
        debug!("Workload {} not present, empty snapshot", binary.display());
        return Ok(HashSet::new());
    }

    let data = fs::read(binary)?;
    let file = object::File::parse(&*data)
        .map_err(|e| Error::Snapshot(format!("cannot parse {}: {}", binary.display(), e)))?;
    let endian = if file.is_little_endian() {
        RunTimeEndian::Little
    } else {
        RunTimeEndian::Big
    };

    let load_section = |id: gimli::SectionId| -> std::result::Result<Cow<[u8]>, gimli::Error> {
        Ok(file
            .section_by_name(id.name())
            .and_then(|section| section.uncompressed_data().ok())
            .unwrap_or(Cow::Borrowed(&[][..])))
    };
    let dwarf_cow = gimli::Dwarf::load(&load_section)
        .map_err(|e| Error::Snapshot(format!("cannot load debug info: {}", e)))?;
    let dwarf = dwarf_cow.borrow(|section| EndianSlice::new(section, endian));

    let referenced = referenced_sources(&dwarf)
        .map_err(|e| Error::Snapshot(format!("cannot read debug info: {}", e)))?;

    let existing: HashSet<PathBuf> = referenced.into_iter().filter(|p| p.exists()).collect();
    debug!(
        "Snapshot of {}: {} existing source files",
        binary.display(),
        existing.len()
    );
    Ok(existing)
}

/// Collects every source path referenced by the line-number programs.
///
/// Duplicates across compilation units collapse into the set; order is
/// not significant.
pub(crate) fn referenced_sources<R: gimli::Reader>(
    dwarf: &gimli::Dwarf<R>,
) -> std::result::Result<HashSet<PathBuf>, gimli::Error> {
    let mut sources = HashSet::new();

    let mut units = dwarf.units();
    while let Some(header) = units.next()? {
        let unit = dwarf.unit(header)?;
        let program = match unit.line_program.clone() {
            Some(program) => program,
            None => continue,
        };

        let comp_dir = match unit.comp_dir.as_ref() {
            Some(dir) => Some(PathBuf::from(dir.to_string_lossy()?.into_owned())),
            None => None,
        };

        let header = program.header();
        for file_entry in header.file_names() {
            let name = dwarf
                .attr_string(&unit, file_entry.path_name())?
                .to_string_lossy()?
                .into_owned();

            // The directory table is joined cumulatively from index 0 up
            // through the entry's index; an absolute segment restarts the
            // joined path.
            let mut directory = None;
            let dir_index = file_entry.directory_index();
            if dir_index > 0 {
                let mut joined = PathBuf::new();
                for index in 0..=dir_index {
                    if let Some(attr) = header.directory(index) {
                        let segment = dwarf.attr_string(&unit, attr)?.to_string_lossy()?.into_owned();
                        joined.push(segment);
                    }
                }
                if !joined.as_os_str().is_empty() {
                    directory = Some(joined);
                }
            }

            sources.insert(compose_path(comp_dir.as_deref(), directory.as_deref(), &name));
        }
    }

    Ok(sources)
}

/// Composes the absolute path of a file entry.
///
/// Priority: an absolute directory stands alone; a relative directory is
/// anchored at the compilation directory when one is known; with no
/// directory at all the file name is anchored at the compilation
/// directory, or used bare as a last resort.
fn compose_path(comp_dir: Option<&Path>, directory: Option<&Path>, name: &str) -> PathBuf {
    match directory {
        Some(dir) if dir.is_absolute() => dir.join(name),
        Some(dir) => match comp_dir {
            Some(comp) => comp.join(dir).join(name),
            None => dir.join(name),
        },
        None => match comp_dir {
            Some(comp) => comp.join(name),
            None => PathBuf::from(name),
        },
    }
}
