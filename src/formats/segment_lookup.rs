//! Edge-segment-lookup stream: per expanded edge, the individual
//! segments of its source road, so external tools can update expanded
//! weights by edge id.
//!
//! Layout per expanded edge, in emission order (little-endian):
//! - `u32` node count (segments + 1)
//! - `u64` external id of the first node
//! - per segment: `u64` external id of the segment end, `f64` segment
//!   length in meters, `u32` segment weight

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

pub struct SegmentLookupWriter {
    writer: BufWriter<File>,
}

impl SegmentLookupWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(&path)
            .with_context(|| format!("creating {}", path.as_ref().display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn begin_edge(&mut self, node_count: u32, first_node: u64) -> Result<()> {
        self.writer.write_all(&node_count.to_le_bytes())?;
        self.writer.write_all(&first_node.to_le_bytes())?;
        Ok(())
    }

    pub fn push_segment(&mut self, to_node: u64, length_m: f64, weight: u32) -> Result<()> {
        self.writer.write_all(&to_node.to_le_bytes())?;
        self.writer.write_all(&length_m.to_le_bytes())?;
        self.writer.write_all(&weight.to_le_bytes())?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Segment records of one expanded edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSegments {
    pub first_node: u64,
    pub segments: Vec<SegmentRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentRecord {
    pub to_node: u64,
    pub length_m: f64,
    pub weight: u32,
}

pub fn read_all<P: AsRef<Path>>(path: P) -> Result<Vec<EdgeSegments>> {
    let file =
        File::open(&path).with_context(|| format!("opening {}", path.as_ref().display()))?;
    let mut reader = BufReader::new(file);
    let mut edges = Vec::new();

    loop {
        let mut count_bytes = [0u8; 4];
        match reader.read_exact(&mut count_bytes) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err.into()),
        }
        let node_count = u32::from_le_bytes(count_bytes);

        let mut first_bytes = [0u8; 8];
        reader.read_exact(&mut first_bytes)?;
        let first_node = u64::from_le_bytes(first_bytes);

        let mut segments = Vec::with_capacity(node_count.saturating_sub(1) as usize);
        for _ in 1..node_count {
            let mut record = [0u8; 20];
            reader.read_exact(&mut record)?;
            segments.push(SegmentRecord {
                to_node: u64::from_le_bytes(record[0..8].try_into()?),
                length_m: f64::from_le_bytes(record[8..16].try_into()?),
                weight: u32::from_le_bytes(record[16..20].try_into()?),
            });
        }
        edges.push(EdgeSegments {
            first_node,
            segments,
        });
    }

    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_roundtrip() -> Result<()> {
        let tmp = NamedTempFile::new()?;

        let mut writer = SegmentLookupWriter::create(tmp.path())?;
        writer.begin_edge(3, 1001)?;
        writer.push_segment(1002, 52.5, 7)?;
        writer.push_segment(1003, 14.25, 3)?;
        writer.begin_edge(2, 1003)?;
        writer.push_segment(1001, 110.0, 12)?;
        writer.finish()?;

        let edges = read_all(tmp.path())?;
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].first_node, 1001);
        assert_eq!(edges[0].segments.len(), 2);
        assert_eq!(edges[0].segments[1].to_node, 1003);
        assert_eq!(edges[0].segments[1].length_m, 14.25);
        assert_eq!(edges[1].segments[0].weight, 12);
        Ok(())
    }
}
