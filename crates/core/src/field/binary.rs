//! Binary snapshot codec for [`FieldArray`].
//!
//! Full snapshots are `[nx][ny][nz][nt]` as native `u64` followed by the raw
//! payload in native order. Producers running on a domain-decomposed grid
//! write one such file per sub-window, including their halo; the partial
//! readers here stitch the interior rows of those files into a larger local
//! array at a caller-given offset.

use super::array::FieldArray;
use super::element::Element;
use crate::error::Result;
use std::io::{Read, Write};
use tracing::{debug, warn};

/// Bytes taken by the four extents at the head of a snapshot
pub const HEADER_BYTES: usize = 4 * std::mem::size_of::<u64>();

/// Boundary elements skipped at the end of each stitched row.
const ROW_TRAILER: usize = 3;

/// Outcome of a snapshot read that is allowed to be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Payload copied into the array
    Loaded,
    /// Stored x/y extents differ from the destination; array unchanged
    ExtentMismatch { stored: [usize; 4] },
    /// Size hint too small to hold a header and any payload; nothing read
    Empty,
    /// Element count implied by the size hint disagrees with the header
    ElementCountMismatch { declared: usize, available: usize },
}

impl LoadStatus {
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadStatus::Loaded)
    }
}

fn read_header(reader: &mut impl Read) -> Result<[usize; 4]> {
    let mut raw = [0u8; HEADER_BYTES];
    reader.read_exact(&mut raw)?;
    let mut extents = [0usize; 4];
    for (axis, chunk) in raw.chunks_exact(8).enumerate() {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        extents[axis] = u64::from_ne_bytes(word) as usize;
    }
    Ok(extents)
}

fn read_payload<T: Element>(reader: &mut impl Read, count: usize) -> Result<Vec<T>> {
    let mut raw = vec![0u8; count * T::SIZE];
    reader.read_exact(&mut raw)?;
    Ok(raw.chunks_exact(T::SIZE).map(T::read_ne).collect())
}

/// Encode `values` as raw native-order bytes.
pub(crate) fn encode_payload<T: Element>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::SIZE);
    for &v in values {
        v.write_ne(&mut out);
    }
    out
}

impl<T: Element> FieldArray<T> {
    /// Write the four extents and the native-order payload.
    ///
    /// # Errors
    ///
    /// Propagates any write failure.
    pub fn dump_binary(&self, writer: &mut impl Write) -> Result<()> {
        for extent in self.extents() {
            writer.write_all(&(extent as u64).to_ne_bytes())?;
        }
        writer.write_all(&encode_payload(self.data()))?;
        Ok(())
    }

    /// Read a full snapshot written by [`FieldArray::dump_binary`].
    ///
    /// When the stored x or y extent differs from this array's, the read is
    /// abandoned after the header, a warning is logged, and the array is left
    /// unchanged. Differing z/t extents reshape the array to the stored ones.
    ///
    /// # Errors
    ///
    /// Propagates read failures, including a truncated payload (the array
    /// is left unchanged in that case too).
    pub fn load_binary(&mut self, reader: &mut impl Read) -> Result<LoadStatus> {
        let stored = read_header(reader)?;
        if stored[0] != self.nx() || stored[1] != self.ny() {
            warn!(
                "Not loading {}: stored size {}x{} differs from {}x{}",
                self.name(),
                stored[0],
                stored[1],
                self.nx(),
                self.ny()
            );
            return Ok(LoadStatus::ExtentMismatch { stored });
        }
        let payload = read_payload::<T>(reader, stored.iter().product())?;
        if stored != self.extents() {
            self.resize(stored);
        }
        self.copy_from(&payload)?;
        Ok(LoadStatus::Loaded)
    }

    /// Stitch a producer's sub-window snapshot into this array.
    ///
    /// `byte_size` is the size of the whole snapshot file. The producer's
    /// extents `(nnx, nny, ..)` are read from the header and must satisfy
    /// `nnx*nny*nnz*nnt + header == byte_size / size_of::<T>()`, where the
    /// header counts as `HEADER_BYTES / size_of::<T>()` elements. The
    /// producer's first halo row is skipped, then each of the following
    /// `nnx - 1` rows contributes its `nny - 3` inner elements to row
    /// `start_i + 1 + r` of this array starting at column `start_j + 2`.
    ///
    /// # Errors
    ///
    /// Propagates read failures. Rejections (empty file, inconsistent
    /// header) are reported through [`LoadStatus`] and leave the array
    /// unchanged.
    pub fn load_binary_at(
        &mut self,
        reader: &mut impl Read,
        start_i: usize,
        start_j: usize,
        byte_size: usize,
    ) -> Result<LoadStatus> {
        if byte_size <= HEADER_BYTES + std::mem::size_of::<u64>() {
            warn!(
                "Not stitching {}: snapshot of {} bytes is empty",
                self.name(),
                byte_size
            );
            return Ok(LoadStatus::Empty);
        }
        let stored = read_header(reader)?;
        let declared: usize = stored.iter().product();
        let available = byte_size / T::SIZE;
        if declared + HEADER_BYTES / T::SIZE != available {
            warn!(
                "Not stitching {}: header {:?} inconsistent with {} elements on file",
                self.name(),
                stored,
                available
            );
            return Ok(LoadStatus::ElementCountMismatch {
                declared,
                available,
            });
        }
        let payload = read_payload::<T>(reader, declared)?;
        self.stitch_rows(&payload, stored[0], stored[1], start_i, start_j);
        Ok(LoadStatus::Loaded)
    }

    /// In-memory counterpart of [`FieldArray::load_binary_at`]: `payload` is
    /// a producer's `nnx x nny` sub-window without header.
    pub fn set_data_at_location(
        &mut self,
        payload: &[T],
        nnx: usize,
        nny: usize,
        start_i: usize,
        start_j: usize,
    ) {
        self.stitch_rows(payload, nnx, nny, start_i, start_j);
    }

    fn stitch_rows(&mut self, payload: &[T], nnx: usize, nny: usize, start_i: usize, start_j: usize) {
        if nnx < 2 || nny <= ROW_TRAILER {
            warn!(
                "Not stitching {}: sub-window {}x{} has no interior",
                self.name(),
                nnx,
                nny
            );
            return;
        }
        let [nx, ny, nz, nt] = self.extents();
        let row_len = nny - ROW_TRAILER;
        let mut source = nny + 2;
        let mut dropped = 0usize;
        for i in start_i + 1..start_i + nnx {
            for j in 0..row_len {
                let col = start_j + 2 + j;
                let Some(&value) = payload.get(source + j) else {
                    dropped += 1;
                    continue;
                };
                if i < nx && col < ny {
                    let idx = i * ny * nz * nt + col * nz * nt;
                    self.data_mut()[idx] = value;
                } else {
                    dropped += 1;
                }
            }
            source += nny;
        }
        if dropped > 0 {
            warn!(
                "Stitching {} at ({},{}) dropped {} elements outside the array",
                self.name(),
                start_i,
                start_j,
                dropped
            );
        } else {
            debug!(
                "Stitched {}x{} sub-window into {} at ({},{})",
                nnx,
                nny,
                self.name(),
                start_i,
                start_j
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn snapshot_bytes(array: &FieldArray<f64>) -> Vec<u8> {
        let mut bytes = Vec::new();
        array.dump_binary(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_dump_load_round_trip() {
        let mut source = FieldArray::new("src", 0.0_f64, [3, 2, 2, 1]);
        for (n, v) in source.data_mut().iter_mut().enumerate() {
            *v = n as f64 * 0.25 - 1.0;
        }
        let bytes = snapshot_bytes(&source);
        assert_eq!(bytes.len(), HEADER_BYTES + 12 * 8);

        let mut dest = FieldArray::new("dst", 9.0_f64, [3, 2, 2, 1]);
        let status = dest.load_binary(&mut Cursor::new(bytes)).unwrap();
        assert!(status.is_loaded());
        assert_eq!(dest.extents(), source.extents());
        assert_eq!(dest.data(), source.data());
    }

    #[test]
    fn test_load_mismatched_extents_leaves_array() {
        let source = FieldArray::new_2d("src", 1.0_f64, 4, 2);
        let mut dest = FieldArray::new_2d("dst", 5.0_f64, 3, 2);
        let status = dest.load_binary(&mut Cursor::new(snapshot_bytes(&source))).unwrap();
        assert_eq!(status, LoadStatus::ExtentMismatch { stored: [4, 2, 1, 1] });
        assert!(dest.data().iter().all(|&v| v == 5.0));
    }

    #[test]
    fn test_truncated_payload_is_an_error() {
        let source = FieldArray::new_2d("src", 1.0_f64, 2, 2);
        let mut bytes = snapshot_bytes(&source);
        bytes.truncate(bytes.len() - 4);
        let mut dest = FieldArray::new_2d("dst", 5.0_f64, 2, 2);
        assert!(dest.load_binary(&mut Cursor::new(bytes)).is_err());
        assert!(dest.data().iter().all(|&v| v == 5.0));
    }

    /// Producer sub-window whose value encodes its own (row, column).
    fn producer(nnx: usize, nny: usize) -> FieldArray<f64> {
        let mut array = FieldArray::new_2d("producer", 0.0_f64, nnx, nny);
        for i in 0..nnx {
            for j in 0..nny {
                array.set_2d(i, j, (100 * i + j) as f64);
            }
        }
        array
    }

    #[test]
    fn test_partial_load_copies_interior_rows() {
        let part = producer(4, 6);
        let bytes = snapshot_bytes(&part);
        let size = bytes.len();
        let mut dest = FieldArray::new_2d("local", -1.0_f64, 10, 10);
        let status = dest.load_binary_at(&mut Cursor::new(bytes), 2, 3, size).unwrap();
        assert!(status.is_loaded());

        // Row r of the stitch starts at stream offset nny + 2 + r*nny.
        for r in 0..3 {
            for c in 0..3 {
                let flat = 6 + 2 + r * 6 + c;
                let expected = part.data()[flat];
                assert_eq!(dest.get_2d(2 + 1 + r, 3 + 2 + c), expected);
            }
        }
        // Halo untouched
        assert_eq!(dest.get_2d(2, 5), -1.0);
        assert_eq!(dest.get_2d(3, 4), -1.0);
        assert_eq!(dest.get_2d(3, 8), -1.0);
    }

    #[test]
    fn test_partial_load_matches_in_memory_stitch() {
        let part = producer(5, 7);
        let bytes = snapshot_bytes(&part);
        let size = bytes.len();
        let mut from_file = FieldArray::new_2d("a", 0.0_f64, 12, 12);
        from_file.load_binary_at(&mut Cursor::new(bytes), 1, 1, size).unwrap();
        let mut from_memory = FieldArray::new_2d("b", 0.0_f64, 12, 12);
        from_memory.set_data_at_location(part.data(), 5, 7, 1, 1);
        assert_eq!(from_file.data(), from_memory.data());
    }

    #[test]
    fn test_partial_load_rejects_empty_and_inconsistent() {
        let mut dest = FieldArray::new_2d("local", 0.0_f64, 8, 8);
        let status = dest
            .load_binary_at(&mut Cursor::new(vec![0u8; 16]), 0, 0, 16)
            .unwrap();
        assert_eq!(status, LoadStatus::Empty);

        let bytes = snapshot_bytes(&producer(4, 5));
        let wrong_size = bytes.len() + 8;
        let status = dest
            .load_binary_at(&mut Cursor::new(bytes), 0, 0, wrong_size)
            .unwrap();
        assert_eq!(
            status,
            LoadStatus::ElementCountMismatch {
                declared: 20,
                available: 25
            }
        );
        assert!(dest.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_stitch_outside_array_is_dropped() {
        let part = producer(4, 6);
        let mut dest = FieldArray::new_2d("small", 0.0_f64, 4, 4);
        dest.set_data_at_location(part.data(), 4, 6, 2, 0);
        // Row 3 exists, rows 4 and 5 do not; columns 2 and 3 exist, 4 does not.
        assert_eq!(dest.get_2d(3, 2), part.data()[8]);
        assert_eq!(dest.get_2d(3, 3), part.data()[9]);
    }
}
