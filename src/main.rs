use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use chunkparts::chunk_set::ChunkSet;
use chunkparts::common::{PartsResult, DEFAULT_CHUNK_SIZE};
use chunkparts::manifest::Manifest;
use chunkparts::part_name::manifest_path;
use chunkparts::reassembler::{Reassembler, SizeCheck};
use chunkparts::splitter::Splitter;
use chunkparts::verifier::{PartProblem, Verifier};

#[derive(Parser, Debug)]
#[clap(name = "chunkparts-cli")]
#[clap(
    about = "Split large binaries into mail-sized parts and put them back together",
    long_about = None
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split a file into <name>.partNN.zip parts
    Split {
        input: PathBuf,
        /// Size of every part but the last, in bytes
        #[clap(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: u64,
        #[clap(long, default_value = ".")]
        output_dir: PathBuf,
        /// Do not write the <name>.parts manifest
        #[clap(long)]
        no_manifest: bool,
    },
    /// Concatenate the parts of <BASENAME> back into one file
    Reassemble {
        basename: String,
        #[clap(long, default_value = ".")]
        dir: PathBuf,
        /// Expected number of parts; read from the manifest when omitted
        #[clap(long, requires = "expected_size")]
        parts: Option<u32>,
        /// Expected size of the reassembled file in bytes
        #[clap(long, requires = "parts")]
        expected_size: Option<u64>,
        /// Destination file, defaults to <BASENAME> in the parts directory
        #[clap(long)]
        output: Option<PathBuf>,
        /// Fail instead of warning when the size check does not pass
        #[clap(long)]
        strict: bool,
    },
    /// Check the parts of <BASENAME> against their manifest
    Verify {
        basename: String,
        #[clap(long, default_value = ".")]
        dir: PathBuf,
    },
    /// List the parts of <BASENAME> found in a directory
    Inspect {
        basename: String,
        #[clap(long, default_value = ".")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> PartsResult<bool> {
    match command {
        Command::Split {
            input,
            chunk_size,
            output_dir,
            no_manifest,
        } => {
            let report = Splitter::new(chunk_size)
                .with_manifest(!no_manifest)
                .split(&input, &output_dir)?;
            for (path, chunk) in &report.chunks {
                println!("{}\t{}", path.display(), chunk.size);
            }
            println!(
                "{} parts, {} bytes, sha1 {}",
                report.part_count(),
                report.total_size,
                report.content_hash
            );
            Ok(true)
        }
        Command::Reassemble {
            basename,
            dir,
            parts,
            expected_size,
            output,
            strict,
        } => {
            let destination = output.unwrap_or_else(|| dir.join(&basename));
            let reassembler = Reassembler::new(&dir, &basename).strict(strict);
            let report = match (parts, expected_size) {
                (Some(parts), Some(expected_size)) => {
                    reassembler.reassemble(parts, expected_size, &destination)?
                }
                _ => reassembler.reassemble_with_manifest(&destination)?,
            };
            println!(
                "{}: {} parts, {} bytes",
                report.output.display(),
                report.parts,
                report.bytes_written
            );
            if let SizeCheck::Mismatch { expected, actual } = report.size_check {
                println!("warning: expected {expected} bytes, wrote {actual}");
            }
            if report.digests_verified {
                println!("digests verified");
            }
            Ok(true)
        }
        Command::Verify { basename, dir } => {
            let report = Verifier::new(&dir, &basename).verify()?;
            for problem in &report.problems {
                match problem {
                    PartProblem::Missing { index } => println!("part {index}: missing"),
                    PartProblem::WrongSize {
                        index,
                        expected,
                        actual,
                    } => println!("part {index}: {actual} bytes, expected {expected}"),
                    PartProblem::WrongDigest {
                        index,
                        expected,
                        actual,
                    } => println!("part {index}: sha1 {actual}, expected {expected}"),
                    PartProblem::Unexpected { path } => {
                        println!("{}: not part of the set", path.display())
                    }
                }
            }
            match report.content_hash_matches {
                Some(true) => println!("{}: whole-file digest matches", report.basename),
                Some(false) => println!("{}: whole-file digest differs", report.basename),
                None => println!("{}: whole-file digest not checked", report.basename),
            }
            Ok(report.is_ok())
        }
        Command::Inspect { basename, dir } => {
            inspect(&dir, &basename)?;
            Ok(true)
        }
    }
}

fn inspect(dir: &Path, basename: &str) -> PartsResult<()> {
    let set = ChunkSet::discover(dir, basename)?;
    for part in set.parts() {
        println!("{:>6}\t{:>12}\t{}", part.name.index, part.size, part.path.display());
    }
    println!("{} parts, widths {:?}", set.len(), set.widths());
    let gaps = set.gaps();
    if !gaps.is_empty() {
        println!("gaps: {gaps:?}");
    }
    match Manifest::load(&manifest_path(dir, basename)) {
        Ok(manifest) => println!(
            "manifest: {} bytes in {} parts of {}, width {}, sha1 {}, created {}",
            manifest.total_size,
            manifest.part_count,
            manifest.chunk_size,
            manifest.width,
            manifest.content_hash,
            manifest.created
        ),
        Err(e) => log::info!("No usable manifest: {e}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_size_and_parts_come_together() {
        let parse = |args: &[&str]| Cli::try_parse_from(args);
        assert!(
            parse(&["chunkparts-cli", "reassemble", "m.gguf", "--expected-size", "45"]).is_err()
        );
        assert!(parse(&["chunkparts-cli", "reassemble", "m.gguf", "--parts", "3"]).is_err());
        let cli = parse(&[
            "chunkparts-cli",
            "reassemble",
            "m.gguf",
            "--parts",
            "3",
            "--expected-size",
            "45",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Reassemble {
                parts: Some(3),
                expected_size: Some(45),
                ..
            }
        ));
        assert!(parse(&["chunkparts-cli", "reassemble", "m.gguf"]).is_ok());
    }
}
