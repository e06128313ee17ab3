//! Sharded on-disk cache of an ingested lexicon.
//!
//! Layout of a cache directory:
//!   metadata.json        format version and totals (written last)
//!   chunk_0000.bin ...   bounded batches of entries
//!   synonyms.bin         word → [(synonym, weight)]
//!   indices.bin          reading → [word], pos → [word]
//!
//! Every `.bin` shard is `KTCH` + version + 3 reserved bytes + CRC32 of the
//! body (LE) + bincode body, so a damaged shard is detected on its own.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::Path;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use super::entry::{DictionaryEntry, PartOfSpeech};
use super::graph::SynonymGraph;
use super::LoadError;
use crate::clock::now_epoch;

const MAGIC: &[u8; 4] = b"KTCH";
const VERSION: u8 = 1;
const HEADER_SIZE: usize = 12;

pub const CACHE_FORMAT_VERSION: u32 = 1;
const METADATA_FILE: &str = "metadata.json";
const SYNONYMS_FILE: &str = "synonyms.bin";
const INDICES_FILE: &str = "indices.bin";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub format_version: u32,
    pub entry_count: usize,
    /// Directed synonym edges.
    pub synonym_count: usize,
    pub chunk_count: usize,
    pub enhanced: bool,
    pub created_at: u64,
}

#[derive(Serialize, Deserialize)]
struct IndicesShard {
    by_reading: Vec<(String, Vec<String>)>,
    by_pos: Vec<(PartOfSpeech, Vec<String>)>,
}

pub(crate) struct CacheContents {
    pub metadata: CacheMetadata,
    pub entries: Vec<DictionaryEntry>,
    pub graph: SynonymGraph,
    pub by_reading: HashMap<String, Vec<String>>,
    pub by_pos: HashMap<PartOfSpeech, Vec<String>>,
}

pub(crate) struct CacheInput<'a> {
    pub entries: Vec<&'a DictionaryEntry>,
    pub graph: &'a SynonymGraph,
    pub by_reading: &'a HashMap<String, Vec<String>>,
    pub by_pos: &'a HashMap<PartOfSpeech, Vec<String>>,
    pub enhanced: bool,
}

fn chunk_name(index: usize) -> String {
    format!("chunk_{index:04}.bin")
}

fn encode_shard<T: Serialize>(value: &T) -> Result<Vec<u8>, LoadError> {
    let body = bincode::serialize(value).map_err(LoadError::Serialize)?;
    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(MAGIC);
    buf.push(VERSION);
    buf.extend_from_slice(&[0u8; 3]); // reserved
    buf.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());
    buf.extend_from_slice(&body);
    Ok(buf)
}

fn decode_shard<T: for<'de> Deserialize<'de>>(name: &str, data: &[u8]) -> Result<T, LoadError> {
    if data.len() < HEADER_SIZE {
        return Err(LoadError::CorruptShard {
            shard: name.to_string(),
            reason: "too short".to_string(),
        });
    }
    if &data[..4] != MAGIC {
        return Err(LoadError::InvalidMagic);
    }
    if data[4] != VERSION {
        return Err(LoadError::UnsupportedVersion(data[4]));
    }
    let mut crc = [0u8; 4];
    crc.copy_from_slice(&data[8..12]);
    let body = &data[HEADER_SIZE..];
    if crc32fast::hash(body) != u32::from_le_bytes(crc) {
        return Err(LoadError::Checksum {
            shard: name.to_string(),
        });
    }
    bincode::deserialize(body).map_err(|e| LoadError::CorruptShard {
        shard: name.to_string(),
        reason: e.to_string(),
    })
}

fn read_shard<T: for<'de> Deserialize<'de>>(dir: &Path, name: &str) -> Result<T, LoadError> {
    let file = File::open(dir.join(name))?;
    // SAFETY: The file is opened read-only, the mapping is immutable and is
    // dropped before this function returns.
    let mmap = unsafe { Mmap::map(&file)? };
    decode_shard(name, &mmap)
}

/// Atomic write: write to .tmp then rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), LoadError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn read_metadata(dir: &Path) -> Result<CacheMetadata, LoadError> {
    let text = fs::read_to_string(dir.join(METADATA_FILE))?;
    let metadata: CacheMetadata = serde_json::from_str(&text).map_err(LoadError::Metadata)?;
    if metadata.format_version != CACHE_FORMAT_VERSION {
        return Err(LoadError::UnsupportedVersion(
            metadata.format_version.min(u8::MAX as u32) as u8,
        ));
    }
    Ok(metadata)
}

pub(crate) fn write_cache(
    dir: &Path,
    input: CacheInput<'_>,
    chunk_size: usize,
) -> Result<CacheMetadata, LoadError> {
    let _span = debug_span!("write_cache", dir = %dir.display()).entered();
    fs::create_dir_all(dir)?;

    // Metadata goes first out and last in: a cache without it is "missing".
    let _ = fs::remove_file(dir.join(METADATA_FILE));
    for stale in fs::read_dir(dir)? {
        let path = stale?.path();
        let is_chunk = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("chunk_") && n.ends_with(".bin"));
        if is_chunk {
            fs::remove_file(&path)?;
        }
    }

    let chunk_size = chunk_size.max(1);
    let mut chunk_count = 0;
    for chunk in input.entries.chunks(chunk_size) {
        write_atomic(&dir.join(chunk_name(chunk_count)), &encode_shard(&chunk)?)?;
        chunk_count += 1;
    }

    write_atomic(
        &dir.join(SYNONYMS_FILE),
        &encode_shard(&input.graph.to_lists())?,
    )?;

    let mut by_reading: Vec<(String, Vec<String>)> = input
        .by_reading
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    by_reading.sort();
    let mut by_pos: Vec<(PartOfSpeech, Vec<String>)> = input
        .by_pos
        .iter()
        .map(|(k, v)| (*k, v.clone()))
        .collect();
    by_pos.sort_by_key(|(pos, _)| *pos);
    write_atomic(
        &dir.join(INDICES_FILE),
        &encode_shard(&IndicesShard { by_reading, by_pos })?,
    )?;

    let metadata = CacheMetadata {
        format_version: CACHE_FORMAT_VERSION,
        entry_count: input.entries.len(),
        synonym_count: input.graph.edge_count(),
        chunk_count,
        enhanced: input.enhanced,
        created_at: now_epoch(),
    };
    let json = serde_json::to_string_pretty(&metadata).map_err(LoadError::Metadata)?;
    write_atomic(&dir.join(METADATA_FILE), json.as_bytes())?;
    debug!(entries = metadata.entry_count, chunks = chunk_count, "cache written");
    Ok(metadata)
}

pub(crate) fn read_cache(dir: &Path) -> Result<CacheContents, LoadError> {
    let _span = debug_span!("read_cache", dir = %dir.display()).entered();
    let metadata = read_metadata(dir)?;

    let mut entries = Vec::with_capacity(metadata.entry_count);
    for index in 0..metadata.chunk_count {
        let name = chunk_name(index);
        let chunk: Vec<DictionaryEntry> = read_shard(dir, &name)?;
        entries.extend(chunk);
    }
    if entries.len() != metadata.entry_count {
        return Err(LoadError::CorruptShard {
            shard: METADATA_FILE.to_string(),
            reason: format!(
                "expected {} entries, chunks hold {}",
                metadata.entry_count,
                entries.len()
            ),
        });
    }

    let lists: Vec<(String, Vec<(String, f32)>)> = read_shard(dir, SYNONYMS_FILE)?;
    let graph = SynonymGraph::from_lists(lists);
    if graph.edge_count() != metadata.synonym_count {
        return Err(LoadError::CorruptShard {
            shard: SYNONYMS_FILE.to_string(),
            reason: format!(
                "expected {} edges, found {}",
                metadata.synonym_count,
                graph.edge_count()
            ),
        });
    }

    let indices: IndicesShard = read_shard(dir, INDICES_FILE)?;
    Ok(CacheContents {
        metadata,
        entries,
        graph,
        by_reading: indices.by_reading.into_iter().collect(),
        by_pos: indices.by_pos.into_iter().collect(),
    })
}
