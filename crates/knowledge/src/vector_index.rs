//! Flat vector index with exact squared-L2 nearest-neighbor search.
//!
//! Vectors are stored row-major in one contiguous buffer. Position `i` in
//! the index corresponds to chunk `id = i` in the paired chunk store.
//!
//! On-disk layout (all integers little-endian):
//!
//! ```text
//! magic      [u8; 4]   "DQVX"
//! version    u16       1
//! reserved   u16       0
//! dimensions u32
//! count      u64
//! count x { len u32, len x f32 }
//! ```

use docqa_core::{AppError, AppResult};
use std::cmp::Ordering;
use std::fs;
use std::io::Write;
use std::path::Path;

const MAGIC: [u8; 4] = *b"DQVX";
const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = 4 + 2 + 2 + 4 + 8;

/// One search hit: a vector position and its squared L2 distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Immutable collection of equal-length embedding vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimensions: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Build an index from vectors that must all share the first one's length.
    pub fn build(vectors: Vec<Vec<f32>>) -> AppResult<Self> {
        let dimensions = match vectors.first() {
            Some(first) => first.len(),
            None => {
                return Err(AppError::EmptyIndex(
                    "cannot build a vector index from zero vectors".to_string(),
                ))
            }
        };

        if dimensions == 0 {
            return Err(AppError::DimensionMismatch {
                expected: 1,
                actual: 0,
                context: "vector 0 is empty".to_string(),
            });
        }

        let mut data = Vec::with_capacity(vectors.len() * dimensions);
        for (position, vector) in vectors.iter().enumerate() {
            if vector.len() != dimensions {
                return Err(AppError::DimensionMismatch {
                    expected: dimensions,
                    actual: vector.len(),
                    context: format!("vector {} of {}", position, vectors.len()),
                });
            }
            data.extend_from_slice(vector);
        }

        tracing::debug!(
            "Built vector index: {} vectors of dimension {}",
            vectors.len(),
            dimensions
        );

        Ok(Self { dimensions, data })
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dimensions
    }

    /// Always false for an index produced by `build` or `load`.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        if position >= self.len() {
            return None;
        }
        let start = position * self.dimensions;
        Some(&self.data[start..start + self.dimensions])
    }

    /// Return the `k` nearest vectors to `query`, nearest first.
    ///
    /// `k` larger than the index is clamped. Equal distances are ordered by
    /// ascending position, so the output is fully determined by the inputs.
    pub fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<Neighbor>> {
        if query.len() != self.dimensions {
            return Err(AppError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
                context: "search query".to_string(),
            });
        }
        if k == 0 {
            return Err(AppError::InvalidQuery("k must be at least 1".to_string()));
        }

        let k = k.min(self.len());

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimensions)
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                distance: squared_l2(query, vector),
            })
            .collect();

        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, rank);
            neighbors.truncate(k);
        }
        neighbors.sort_unstable_by(rank);

        Ok(neighbors)
    }

    /// Write the index to `path` and fsync it.
    pub fn save(&self, path: &Path) -> AppResult<()> {
        let dimensions = u32::try_from(self.dimensions).map_err(|_| {
            AppError::Other(format!("dimension {} does not fit the index format", self.dimensions))
        })?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + self.len() * (4 + self.dimensions * 4));
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&dimensions.to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());

        for vector in self.data.chunks_exact(self.dimensions) {
            bytes.extend_from_slice(&dimensions.to_le_bytes());
            for value in vector {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }

        let mut file = fs::File::create(path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;

        tracing::debug!("Saved {} vectors ({} bytes) to {:?}", self.len(), bytes.len(), path);
        Ok(())
    }

    /// Read an index written by [`VectorIndex::save`].
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::NotFound {
                what: "vector index",
                path: path.to_path_buf(),
            });
        }

        let bytes = fs::read(path)?;
        let mut reader = ByteReader::new(&bytes, path);

        if reader.take(4)? != MAGIC {
            return Err(AppError::corrupt(path, "not a vector index file (bad magic)"));
        }
        let version = reader.u16()?;
        if version != FORMAT_VERSION {
            return Err(AppError::corrupt(
                path,
                format!("unsupported format version {} (expected {})", version, FORMAT_VERSION),
            ));
        }
        let _reserved = reader.u16()?;
        let dimensions = reader.u32()? as usize;
        let count = usize::try_from(reader.u64()?)
            .map_err(|_| AppError::corrupt(path, "vector count overflows usize"))?;

        if dimensions == 0 {
            return Err(AppError::corrupt(path, "dimension is zero"));
        }
        if count == 0 {
            return Err(AppError::corrupt(path, "index declares zero vectors"));
        }

        // Guard the allocation against a forged count.
        let expected_len = count
            .checked_mul(4 + dimensions * 4)
            .and_then(|body| body.checked_add(HEADER_LEN));
        if expected_len.map_or(true, |len| len > bytes.len()) {
            return Err(AppError::corrupt(
                path,
                format!(
                    "truncated: header declares {} vectors of dimension {} but file has {} bytes",
                    count,
                    dimensions,
                    bytes.len()
                ),
            ));
        }

        let mut data = Vec::with_capacity(count * dimensions);
        for position in 0..count {
            let len = reader.u32()? as usize;
            if len != dimensions {
                return Err(AppError::DimensionMismatch {
                    expected: dimensions,
                    actual: len,
                    context: format!("vector {} in {}", position, path.display()),
                });
            }
            for _ in 0..dimensions {
                data.push(reader.f32()?);
            }
        }

        if reader.remaining() != 0 {
            return Err(AppError::corrupt(
                path,
                format!("{} trailing bytes after {} vectors", reader.remaining(), count),
            ));
        }

        tracing::debug!("Loaded {} vectors of dimension {} from {:?}", count, dimensions, path);
        Ok(Self { dimensions, data })
    }
}

/// Ascending distance, then ascending position.
fn rank(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.position.cmp(&b.position))
}

/// Squared Euclidean distance between equal-length vectors.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Bounds-checked little-endian reader over an index file.
struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
    path: &'a Path,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8], path: &'a Path) -> Self {
        Self {
            bytes,
            offset: 0,
            path,
        }
    }

    fn take(&mut self, n: usize) -> AppResult<&'a [u8]> {
        let end = self.offset + n;
        if end > self.bytes.len() {
            return Err(AppError::corrupt(
                self.path,
                format!("truncated at byte {} (needed {} more)", self.offset, n),
            ));
        }
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> AppResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u16(&mut self) -> AppResult<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> AppResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> AppResult<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn f32(&mut self) -> AppResult<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }
}
