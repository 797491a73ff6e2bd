//! Fixed-penalty stream: one `u32` per expanded edge, in emission
//! order, holding the weight share that is not road traversal (turn,
//! signal and U-turn penalties).

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

pub struct EdgePenaltyWriter {
    writer: BufWriter<File>,
}

impl EdgePenaltyWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(&path)
            .with_context(|| format!("creating {}", path.as_ref().display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn push(&mut self, fixed_penalty: u32) -> Result<()> {
        self.writer.write_all(&fixed_penalty.to_le_bytes())?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

pub fn read_all<P: AsRef<Path>>(path: P) -> Result<Vec<u32>> {
    let file =
        File::open(&path).with_context(|| format!("opening {}", path.as_ref().display()))?;
    let mut reader = BufReader::new(file);
    let mut penalties = Vec::new();

    loop {
        let mut bytes = [0u8; 4];
        match reader.read_exact(&mut bytes) {
            Ok(()) => penalties.push(u32::from_le_bytes(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err.into()),
        }
    }

    Ok(penalties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_roundtrip() -> Result<()> {
        let tmp = NamedTempFile::new()?;

        let mut writer = EdgePenaltyWriter::create(tmp.path())?;
        writer.push(0)?;
        writer.push(270)?;
        writer.push(42)?;
        writer.finish()?;

        assert_eq!(read_all(tmp.path())?, vec![0, 270, 42]);
        Ok(())
    }
}
