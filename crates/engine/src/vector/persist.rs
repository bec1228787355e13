//! Vector index persistence
//!
//! Each collective's index is a sidecar pair under `pulse.db.hnsw/`:
//! `<name>.hnsw` holds the graph and vectors in a hand-rolled
//! little-endian format, `<name>.hnsw.meta` is a small bincode record
//! describing it. The KV store is the source of truth — a sidecar that
//! fails to load, carries the wrong dimension, or lags the database CSN
//! is reconciled or rebuilt from the embeddings table, never trusted.
//!
//! Writes go through a temp file and rename so a crash mid-persist
//! leaves the previous intact sidecar in place.

use crate::vector::distance::DistanceMetric;
use crate::vector::hnsw::{HnswParams, Node, VectorIndex};
use pulse_core::{Csn, PulseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use uuid::Uuid;

/// File magic + format version
const MAGIC: &[u8; 8] = b"PHNSW\x00\x00\x01";

/// Sidecar metadata record (`<name>.hnsw.meta`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Vector dimension
    pub dimension: usize,
    /// Max connections parameter
    pub m: usize,
    /// Build-time beam width
    pub ef_construction: usize,
    /// Search-time beam width
    pub ef_search: usize,
    /// Live element count at save time
    pub element_count: usize,
    /// Database CSN the index was consistent with at save time
    pub built_at_csn: Csn,
}

fn corrupt(msg: impl Into<String>) -> PulseError {
    PulseError::IndexCorrupt(msg.into())
}

fn write_u64(w: &mut impl Write, v: u64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn read_u64(r: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)
        .map_err(|_| corrupt("unexpected end of index file"))?;
    Ok(u64::from_le_bytes(buf))
}

fn read_u8(r: &mut impl Read) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)
        .map_err(|_| corrupt("unexpected end of index file"))?;
    Ok(buf[0])
}

fn read_uuid(r: &mut impl Read) -> Result<Uuid> {
    let mut buf = [0u8; 16];
    r.read_exact(&mut buf)
        .map_err(|_| corrupt("unexpected end of index file"))?;
    Ok(Uuid::from_bytes(buf))
}

/// Save an index and its meta sidecar
pub fn save(index: &VectorIndex, path: &Path, built_at_csn: Csn) -> Result<()> {
    let tmp = path.with_extension("hnsw.tmp");
    {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)?;
        let mut w = BufWriter::new(file);

        w.write_all(MAGIC)?;
        write_u64(&mut w, index.dim as u64)?;
        w.write_all(&[match index.metric {
            DistanceMetric::Cosine => 0u8,
            DistanceMetric::Euclidean => 1u8,
        }])?;
        write_u64(&mut w, index.params.m as u64)?;
        write_u64(&mut w, index.params.ef_construction as u64)?;
        write_u64(&mut w, index.params.ef_search as u64)?;

        match index.entry_point {
            Some(id) => {
                w.write_all(&[1u8])?;
                w.write_all(id.as_bytes())?;
            }
            None => w.write_all(&[0u8])?,
        }
        write_u64(&mut w, index.max_level as u64)?;
        write_u64(&mut w, index.rng_seed)?;
        write_u64(&mut w, index.rng_counter)?;

        // Graph nodes, in BTreeMap order
        write_u64(&mut w, index.nodes.len() as u64)?;
        for (id, node) in &index.nodes {
            w.write_all(id.as_bytes())?;
            write_u64(&mut w, node.max_layer as u64)?;
            w.write_all(&[node.deleted as u8])?;
            write_u64(&mut w, node.neighbors.len() as u64)?;
            for layer in &node.neighbors {
                write_u64(&mut w, layer.len() as u64)?;
                for neighbor in layer {
                    w.write_all(neighbor.as_bytes())?;
                }
            }
        }

        // Vectors
        write_u64(&mut w, index.embeddings.len() as u64)?;
        for (id, embedding) in &index.embeddings {
            w.write_all(id.as_bytes())?;
            for v in embedding {
                w.write_all(&v.to_le_bytes())?;
            }
        }

        w.flush()?;
        w.get_ref().sync_all()?;
    }
    std::fs::rename(&tmp, path)?;

    let meta = IndexMeta {
        dimension: index.dim,
        m: index.params.m,
        ef_construction: index.params.ef_construction,
        ef_search: index.params.ef_search,
        element_count: index.len(),
        built_at_csn,
    };
    let meta_tmp = path.with_extension("hnsw.meta.tmp");
    std::fs::write(&meta_tmp, bincode::serialize(&meta)?)?;
    std::fs::rename(&meta_tmp, meta_path(path))?;
    Ok(())
}

/// The meta sidecar path for an index file
pub fn meta_path(path: &Path) -> std::path::PathBuf {
    path.with_extension("hnsw.meta")
}

/// Load the meta sidecar for an index file
pub fn load_meta(path: &Path) -> Result<IndexMeta> {
    let bytes = std::fs::read(meta_path(path))?;
    bincode::deserialize(&bytes).map_err(|e| corrupt(format!("bad index meta: {e}")))
}

/// Load an index, verifying the expected dimension
pub fn load(path: &Path, expected_dim: usize) -> Result<VectorIndex> {
    let file = File::open(path)?;
    let mut r = BufReader::new(file);

    let mut magic = [0u8; 8];
    r.read_exact(&mut magic)
        .map_err(|_| corrupt("index file too short"))?;
    if &magic != MAGIC {
        return Err(corrupt("bad index file magic"));
    }

    let dim = read_u64(&mut r)? as usize;
    if dim != expected_dim {
        return Err(PulseError::DimensionMismatch {
            expected: expected_dim,
            actual: dim,
        });
    }
    let metric = match read_u8(&mut r)? {
        0 => DistanceMetric::Cosine,
        1 => DistanceMetric::Euclidean,
        other => return Err(corrupt(format!("unknown metric tag {other}"))),
    };
    let params = HnswParams {
        m: read_u64(&mut r)? as usize,
        ef_construction: read_u64(&mut r)? as usize,
        ef_search: read_u64(&mut r)? as usize,
    };
    if params.m == 0 {
        return Err(corrupt("zero M parameter"));
    }

    let entry_point = match read_u8(&mut r)? {
        0 => None,
        1 => Some(read_uuid(&mut r)?),
        other => return Err(corrupt(format!("bad entry point flag {other}"))),
    };
    let max_level = read_u64(&mut r)? as usize;
    let rng_seed = read_u64(&mut r)?;
    let rng_counter = read_u64(&mut r)?;

    let node_count = read_u64(&mut r)? as usize;
    let mut nodes = BTreeMap::new();
    for _ in 0..node_count {
        let id = read_uuid(&mut r)?;
        let max_layer = read_u64(&mut r)? as usize;
        let deleted = match read_u8(&mut r)? {
            0 => false,
            1 => true,
            other => return Err(corrupt(format!("bad tombstone flag {other}"))),
        };
        let layer_count = read_u64(&mut r)? as usize;
        if layer_count != max_layer + 1 {
            return Err(corrupt("layer count does not match node level"));
        }
        let mut neighbors = Vec::with_capacity(layer_count);
        for _ in 0..layer_count {
            let n = read_u64(&mut r)? as usize;
            let mut layer = BTreeSet::new();
            for _ in 0..n {
                layer.insert(read_uuid(&mut r)?);
            }
            neighbors.push(layer);
        }
        nodes.insert(
            id,
            Node {
                neighbors,
                max_layer,
                deleted,
            },
        );
    }

    let embedding_count = read_u64(&mut r)? as usize;
    let mut embeddings = BTreeMap::new();
    let mut buf = vec![0u8; dim * 4];
    for _ in 0..embedding_count {
        let id = read_uuid(&mut r)?;
        r.read_exact(&mut buf)
            .map_err(|_| corrupt("truncated embedding block"))?;
        let embedding: Vec<f32> = buf
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        embeddings.insert(id, embedding);
    }

    if let Some(ep) = entry_point {
        if !nodes.contains_key(&ep) {
            return Err(corrupt("entry point references a missing node"));
        }
    }

    let live = nodes.values().filter(|n| !n.deleted).count();
    Ok(VectorIndex {
        dim,
        metric,
        params,
        nodes,
        embeddings,
        entry_point,
        max_level,
        rng_seed,
        rng_counter,
        live,
    })
}
