//! Original-edge-data stream.
//!
//! Layout (little-endian, packed):
//! - offset 0: `u32` record count, written last over a reserved slot
//! - records of 12 bytes each: `u32` via geometry position, `u32` name
//!   id, `u8` turn type, `u8` direction modifier, `u8` travel mode,
//!   one zero pad byte

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::graph::TravelMode;
use crate::guidance::{DirectionModifier, TurnInstruction, TurnType};

pub const RECORD_SIZE: usize = 12;
/// Buffered records are flushed to disk beyond this bound.
pub const FLUSH_THRESHOLD: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalEdgeData {
    pub via_geometry_position: u32,
    pub name_id: u32,
    pub instruction: TurnInstruction,
    pub travel_mode: TravelMode,
}

pub struct OriginalEdgeWriter {
    writer: BufWriter<File>,
    buffer: Vec<OriginalEdgeData>,
    count: u32,
}

impl OriginalEdgeWriter {
    /// Opens the stream and reserves the four count bytes at the front.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(&path)
            .with_context(|| format!("creating {}", path.as_ref().display()))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&0u32.to_le_bytes())?;
        Ok(Self {
            writer,
            buffer: Vec::with_capacity(1024 * 1024),
            count: 0,
        })
    }

    pub fn push(&mut self, record: OriginalEdgeData) -> Result<()> {
        self.buffer.push(record);
        self.count += 1;
        if self.buffer.len() > FLUSH_THRESHOLD {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn flush_buffer(&mut self) -> Result<()> {
        for record in &self.buffer {
            self.writer
                .write_all(&record.via_geometry_position.to_le_bytes())?;
            self.writer.write_all(&record.name_id.to_le_bytes())?;
            self.writer
                .write_all(&[record.instruction.turn_type as u8])?;
            self.writer
                .write_all(&[record.instruction.direction_modifier as u8])?;
            self.writer.write_all(&[record.travel_mode as u8])?;
            self.writer.write_all(&[0u8])?;
        }
        self.buffer.clear();
        Ok(())
    }

    /// Flushes remaining records and patches the count at offset 0.
    pub fn finish(mut self) -> Result<u32> {
        self.flush_buffer()?;
        self.writer.seek(SeekFrom::Start(0))?;
        self.writer.write_all(&self.count.to_le_bytes())?;
        self.writer.flush()?;
        Ok(self.count)
    }
}

/// Reads the whole stream back; the counterpart of [`OriginalEdgeWriter`].
pub fn read_all<P: AsRef<Path>>(path: P) -> Result<Vec<OriginalEdgeData>> {
    let file =
        File::open(&path).with_context(|| format!("opening {}", path.as_ref().display()))?;
    let mut reader = BufReader::new(file);

    let mut count_bytes = [0u8; 4];
    reader.read_exact(&mut count_bytes)?;
    let count = u32::from_le_bytes(count_bytes);

    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut record = [0u8; RECORD_SIZE];
        reader.read_exact(&mut record)?;
        records.push(OriginalEdgeData {
            via_geometry_position: u32::from_le_bytes(record[0..4].try_into()?),
            name_id: u32::from_le_bytes(record[4..8].try_into()?),
            instruction: TurnInstruction::new(
                TurnType::from(record[8]),
                DirectionModifier::from(record[9]),
            ),
            travel_mode: TravelMode::from(record[10]),
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_roundtrip_and_count_patch() -> Result<()> {
        let tmp = NamedTempFile::new()?;

        let mut writer = OriginalEdgeWriter::create(tmp.path())?;
        for i in 0..5u32 {
            writer.push(OriginalEdgeData {
                via_geometry_position: i,
                name_id: 100 + i,
                instruction: TurnInstruction::new(TurnType::Turn, DirectionModifier::Right),
                travel_mode: TravelMode::Driving,
            })?;
        }
        let count = writer.finish()?;
        assert_eq!(count, 5);

        // header count equals the number of body records
        let raw = std::fs::read(tmp.path())?;
        assert_eq!(raw.len(), 4 + 5 * RECORD_SIZE);
        assert_eq!(u32::from_le_bytes(raw[0..4].try_into().unwrap()), 5);

        let records = read_all(tmp.path())?;
        assert_eq!(records.len(), 5);
        assert_eq!(records[3].via_geometry_position, 3);
        assert_eq!(records[3].name_id, 103);
        assert_eq!(
            records[3].instruction,
            TurnInstruction::new(TurnType::Turn, DirectionModifier::Right)
        );
        Ok(())
    }
}
