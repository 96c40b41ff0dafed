//! CLI entry point for the `peel` tool.
//!
//! Usage: `peel <archive> [<output-dir>]`
//!
//! Reads the archive, peels every wrapper and archive layer, and writes
//! each extracted file to the output directory. Non-empty resource
//! forks are emitted as `._name` sidecar files (spec.md §6 "Sidecar
//! format").

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let mut args = env::args().skip(1);
    let archive = match args.next() {
        Some(path) => path,
        None => {
            eprintln!("usage: peel <archive> [<output-dir>]");
            return ExitCode::FAILURE;
        }
    };
    let out_dir = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

    match run(&archive, &out_dir) {
        Ok(count) => {
            println!("extracted {count} file(s) to {}", out_dir.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("peel: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(archive: &str, out_dir: &Path) -> Result<usize, Box<dyn std::error::Error>> {
    let data = fs::read(archive)?;
    let entries = peeler::peel(&data)?;

    fs::create_dir_all(out_dir)?;
    for (i, entry) in entries.iter().enumerate() {
        let name = if entry.metadata.filename.is_empty() {
            format!("entry-{i}")
        } else {
            entry.metadata.filename.clone()
        };
        let path = out_dir.join(&name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &entry.data_fork)?;

        if !entry.resource_fork.is_empty() {
            let sidecar_name = match path.file_name() {
                Some(n) => format!("._{}", n.to_string_lossy()),
                None => format!("._{name}"),
            };
            let sidecar_path = path.with_file_name(sidecar_name);
            let bytes = peeler::sidecar::build(&entry.metadata, &entry.resource_fork);
            fs::write(sidecar_path, bytes)?;
        }
    }

    Ok(entries.len())
}
