use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::common::{index_width, part_count, PartsError, PartsResult};
use crate::signed_file::SignedFile;

/// A single part of a source file
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 1-based position in the set.
    pub index: u32,
    /// Offset of the first byte in the source file.
    pub offset: u64,
    pub size: u64,
    /// SHA-1 hex digest of the part content.
    pub content_hash: String,
}

/// Wraps the information stored in `<basename>.parts`
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub source_name: String,
    pub total_size: u64,
    pub chunk_size: u64,
    pub part_count: u32,
    pub width: usize,
    pub content_hash: String,
    pub created: DateTime<Utc>,
    pub chunks: Vec<Chunk>,
}

impl Manifest {
    pub fn new(
        source_name: &str,
        total_size: u64,
        chunk_size: u64,
        content_hash: String,
        chunks: Vec<Chunk>,
    ) -> PartsResult<Self> {
        let part_count = part_count(total_size, chunk_size)?;
        Ok(Self {
            source_name: source_name.into(),
            total_size,
            chunk_size,
            part_count,
            width: index_width(part_count),
            content_hash,
            created: Utc::now(),
            chunks,
        })
    }

    pub fn chunk(&self, index: u32) -> Option<&Chunk> {
        self.chunks.iter().find(|chunk| chunk.index == index)
    }

    pub fn load(path: &Path) -> PartsResult<Self> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PartsError::ManifestNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(PartsError::io_at(path)(e)),
        };
        Self::from_signed_file(&SignedFile::read(file)?)
    }

    pub fn save(&self, path: &Path) -> PartsResult<()> {
        let file = File::create(path).map_err(PartsError::io_at(path))?;
        self.to_signed_file()
            .write(BufWriter::new(file))
            .map_err(PartsError::io_at(path))
    }

    fn to_signed_file(&self) -> SignedFile {
        let header = [
            ('N', self.source_name.clone()),
            ('S', self.total_size.to_string()),
            ('C', self.chunk_size.to_string()),
            ('P', self.part_count.to_string()),
            ('W', self.width.to_string()),
            ('H', self.content_hash.clone()),
            ('T', self.created.timestamp_millis().to_string()),
        ];
        let chunk_lines = self.chunks.iter().map(|chunk| {
            (
                'K',
                format!("{} {} {}", chunk.index, chunk.size, chunk.content_hash),
            )
        });
        let lines: Vec<(char, String)> = header.into_iter().chain(chunk_lines).collect();
        SignedFile::from_entries(lines.iter().map(|(key, value)| (*key, value.as_str())))
    }

    fn from_signed_file(file: &SignedFile) -> PartsResult<Self> {
        let mut source_name: Option<String> = None;
        let mut total_size: Option<u64> = None;
        let mut chunk_size: Option<u64> = None;
        let mut part_count: Option<u32> = None;
        let mut width: Option<usize> = None;
        let mut content_hash = String::new();
        let mut created = DateTime::default();
        let mut chunks = Vec::new();

        for (key, value) in file.entries() {
            match key {
                'N' => source_name = Some(value.to_string()),
                'S' => total_size = Some(parse_number(key, value)?),
                'C' => chunk_size = Some(parse_number(key, value)?),
                'P' => part_count = Some(parse_number(key, value)?),
                'W' => width = Some(parse_number(key, value)?),
                'H' => content_hash = value.to_ascii_lowercase(),
                'T' => {
                    let millis = parse_number(key, value)?;
                    created = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                        PartsError::ParseError(format!("invalid timestamp {value}"))
                    })?
                }
                'K' => chunks.push(parse_chunk(value)?),
                _ => log::debug!("Ignoring unknown manifest key '{key}'"),
            }
        }

        let missing = |name: &str| PartsError::ParseError(format!("manifest lacks {name}"));
        let source_name = source_name.ok_or_else(|| missing("source name"))?;
        let total_size = total_size.ok_or_else(|| missing("total size"))?;
        let chunk_size = chunk_size.ok_or_else(|| missing("chunk size"))?;
        let part_count = part_count.ok_or_else(|| missing("part count"))?;
        let width = width.unwrap_or_else(|| index_width(part_count));

        if part_count != crate::common::part_count(total_size, chunk_size)? {
            return Err(PartsError::ParseError(format!(
                "part count {part_count} does not match {total_size} bytes in parts of {chunk_size}"
            )));
        }

        let mut offset = 0;
        chunks.sort_by_key(|chunk| chunk.index);
        for chunk in chunks.iter_mut() {
            chunk.offset = offset;
            offset += chunk.size;
        }

        Ok(Self {
            source_name,
            total_size,
            chunk_size,
            part_count,
            width,
            content_hash,
            created,
            chunks,
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: char, value: &str) -> PartsResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PartsError::ParseError(format!("invalid value '{value}' for key '{key}'")))
}

fn parse_chunk(value: &str) -> PartsResult<Chunk> {
    let mut fields = value.split_whitespace();
    let mut next = |name: &str| {
        fields
            .next()
            .ok_or_else(|| PartsError::ParseError(format!("chunk line '{value}' lacks {name}")))
    };
    let index = parse_number('K', next("index")?)?;
    let size = parse_number('K', next("size")?)?;
    let content_hash = next("digest")?.to_ascii_lowercase();
    Ok(Chunk {
        index,
        offset: 0,
        size,
        content_hash,
    })
}
