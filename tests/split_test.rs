mod common;

use std::fs;

use chunkparts::chunk_set::ChunkSet;
use chunkparts::common::{PartsError, PartsResult};
use chunkparts::manifest::Manifest;
use chunkparts::splitter::Splitter;
use tempfile::tempdir;

use common::{random_bytes, write_source};

#[test]
fn test_forty_five_bytes_in_parts_of_twenty() -> PartsResult<()> {
    let source_dir = tempdir()?;
    let parts_dir = tempdir()?;
    let bytes = random_bytes(45);
    let input = write_source(source_dir.path(), "phi-2.Q4_K_M.gguf", &bytes);

    let report = Splitter::new(20).split(&input, parts_dir.path())?;

    assert_eq!(3, report.part_count());
    assert_eq!(2, report.width);
    let sizes: Vec<u64> = report.chunks.iter().map(|(_, chunk)| chunk.size).collect();
    assert_eq!(vec![20, 20, 5], sizes);
    for (name, range) in [
        ("phi-2.Q4_K_M.gguf.part01.zip", 0..20),
        ("phi-2.Q4_K_M.gguf.part02.zip", 20..40),
        ("phi-2.Q4_K_M.gguf.part03.zip", 40..45),
    ] {
        assert_eq!(bytes[range], fs::read(parts_dir.path().join(name))?[..]);
    }
    assert!(parts_dir.path().join("phi-2.Q4_K_M.gguf.parts").is_file());
    assert_eq!(bytes, fs::read(&input)?);
    Ok(())
}

#[test]
fn test_part_count_and_sizes() -> PartsResult<()> {
    for size in [1usize, 19, 20, 21, 40, 41, 99] {
        let dir = tempdir()?;
        let input = write_source(dir.path(), "blob.bin", &random_bytes(size));
        let report = Splitter::new(20).with_manifest(false).split(&input, dir.path())?;

        assert_eq!(size.div_ceil(20), report.part_count(), "size {size}");
        let (last, full) = report.chunks.split_last().expect("at least one part");
        assert!(full.iter().all(|(_, chunk)| chunk.size == 20));
        let remainder = if size % 20 == 0 { 20 } else { size % 20 };
        assert_eq!(remainder as u64, last.1.size);
        assert_eq!(size as u64, report.total_size);
    }
    Ok(())
}

#[test]
fn test_offsets_are_contiguous() -> PartsResult<()> {
    let dir = tempdir()?;
    let input = write_source(dir.path(), "blob.bin", &random_bytes(77));
    let report = Splitter::new(10).split(&input, dir.path())?;
    let mut expected_offset = 0;
    for (position, (_, chunk)) in report.chunks.iter().enumerate() {
        assert_eq!(position as u32 + 1, chunk.index);
        assert_eq!(expected_offset, chunk.offset);
        expected_offset += chunk.size;
    }
    assert_eq!(77, expected_offset);
    Ok(())
}

#[test]
fn test_empty_source_produces_no_parts() -> PartsResult<()> {
    let dir = tempdir()?;
    let input = write_source(dir.path(), "empty.bin", &[]);
    let report = Splitter::new(20).split(&input, dir.path())?;

    assert_eq!(0, report.part_count());
    assert!(!dir.path().join("empty.bin.part01.zip").exists());
    let manifest = Manifest::load(&dir.path().join("empty.bin.parts"))?;
    assert_eq!(0, manifest.part_count);
    assert_eq!(0, manifest.total_size);
    Ok(())
}

#[test]
fn test_more_than_ninety_nine_parts_widen_the_index() -> PartsResult<()> {
    let dir = tempdir()?;
    let input = write_source(dir.path(), "big.bin", &random_bytes(150));
    let report = Splitter::new(1).split(&input, dir.path())?;

    assert_eq!(150, report.part_count());
    assert_eq!(3, report.width);
    assert!(dir.path().join("big.bin.part001.zip").is_file());
    assert!(dir.path().join("big.bin.part150.zip").is_file());
    assert!(!dir.path().join("big.bin.part01.zip").exists());
    assert_eq!(3, Manifest::load(&dir.path().join("big.bin.parts"))?.width);
    Ok(())
}

#[test]
fn test_manifest_records_digests() -> PartsResult<()> {
    let dir = tempdir()?;
    let input = write_source(dir.path(), "model.gguf", b"hello world, this is a tiny model");
    let report = Splitter::new(8).split(&input, dir.path())?;
    let manifest = Manifest::load(report.manifest.as_deref().expect("manifest written"))?;

    assert_eq!("model.gguf", manifest.source_name);
    assert_eq!(33, manifest.total_size);
    assert_eq!(8, manifest.chunk_size);
    assert_eq!(5, manifest.part_count);
    assert_eq!("7ead97222f7f264f6b9479c1339cccb955260556", manifest.content_hash);
    assert_eq!(report.content_hash, manifest.content_hash);
    let recorded: Vec<_> = manifest.chunks.iter().map(|c| c.content_hash.clone()).collect();
    let written: Vec<_> = report.chunks.iter().map(|(_, c)| c.content_hash.clone()).collect();
    assert_eq!(written, recorded);
    Ok(())
}

#[test]
fn test_missing_source_is_not_found() -> PartsResult<()> {
    let dir = tempdir()?;
    let input = dir.path().join("absent.gguf");
    assert_eq!(
        Err(PartsError::NotFound(input.clone())),
        Splitter::new(20).split(&input, dir.path()).map(|_| ())
    );
    Ok(())
}

#[test]
fn test_zero_chunk_size_is_rejected() -> PartsResult<()> {
    let dir = tempdir()?;
    let input = write_source(dir.path(), "blob.bin", &random_bytes(10));
    assert_eq!(
        Err(PartsError::InvalidChunkSize),
        Splitter::new(0).split(&input, dir.path()).map(|_| ())
    );
    assert!(!dir.path().join("blob.bin.part01.zip").exists());
    Ok(())
}

#[test]
fn test_missing_output_directory_is_not_found() -> PartsResult<()> {
    let dir = tempdir()?;
    let input = write_source(dir.path(), "blob.bin", &random_bytes(10));
    let output = dir.path().join("nowhere");
    assert_eq!(
        Err(PartsError::NotFound(output.clone())),
        Splitter::new(4).split(&input, &output).map(|_| ())
    );
    Ok(())
}

#[test]
fn test_oversized_chunk_size_yields_one_part() -> PartsResult<()> {
    let dir = tempdir()?;
    let bytes = random_bytes(45);
    let input = write_source(dir.path(), "blob.bin", &bytes);

    let report = Splitter::new(u64::MAX / 2).split(&input, dir.path())?;

    assert_eq!(1, report.part_count());
    assert_eq!(45, report.chunks[0].1.size);
    assert_eq!(bytes, fs::read(dir.path().join("blob.bin.part01.zip"))?);
    Ok(())
}

#[test]
fn test_resplit_removes_stale_parts() -> PartsResult<()> {
    let dir = tempdir()?;
    let input = write_source(dir.path(), "blob.bin", &random_bytes(45));
    Splitter::new(10).split(&input, dir.path())?;
    // A hand-made part with another width is stale as well.
    fs::write(dir.path().join("blob.bin.part003.zip"), b"old")?;

    Splitter::new(20).split(&input, dir.path())?;

    let set = ChunkSet::discover(dir.path(), "blob.bin")?;
    let names: Vec<String> = set.parts().iter().map(|part| part.name.file_name()).collect();
    assert_eq!(
        vec![
            "blob.bin.part01.zip",
            "blob.bin.part02.zip",
            "blob.bin.part03.zip"
        ],
        names
    );
    Ok(())
}

#[test]
fn test_resplit_without_manifest_removes_old_manifest() -> PartsResult<()> {
    let dir = tempdir()?;
    let input = write_source(dir.path(), "blob.bin", &random_bytes(45));
    Splitter::new(10).split(&input, dir.path())?;
    assert!(dir.path().join("blob.bin.parts").is_file());

    Splitter::new(20).with_manifest(false).split(&input, dir.path())?;

    assert!(!dir.path().join("blob.bin.parts").exists());
    Ok(())
}

#[test]
fn test_failed_part_write_names_the_part() -> PartsResult<()> {
    let dir = tempdir()?;
    let input = write_source(dir.path(), "blob.bin", &random_bytes(45));
    let blocked = dir.path().join("blob.bin.part02.zip");
    fs::create_dir(&blocked)?;

    let result = Splitter::new(20).split(&input, dir.path());

    match result {
        Err(PartsError::IO { path, .. }) => assert_eq!(blocked, path),
        other => panic!("expected an IO error, got {other:?}"),
    }
    // Parts written before the failure stay on disk.
    assert!(dir.path().join("blob.bin.part01.zip").is_file());
    assert!(!dir.path().join("blob.bin.part03.zip").exists());
    Ok(())
}
