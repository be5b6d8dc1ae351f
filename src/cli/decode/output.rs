use ac3::process::decode::FrameCoefficients;
use ac3::utils::tables::BLOCK_LEN;
use anyhow::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Raw little-endian `f32` coefficient sink.
///
/// Every block is written as one run of 256 coefficients per full-bandwidth
/// channel in bitstream order, followed by the LFE run when present.
pub struct CoefficientWriter<W: Write> {
    writer: W,
    scratch: Vec<u8>,
    blocks_written: u64,
}

impl CoefficientWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> CoefficientWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            scratch: Vec::with_capacity(BLOCK_LEN * 4 * 6),
            blocks_written: 0,
        }
    }

    pub fn write_frame(&mut self, frame: &FrameCoefficients) -> Result<()> {
        for block in &frame.blocks {
            self.scratch.clear();
            for run in block.channels.iter().chain(block.lfe.iter()) {
                for coefficient in run {
                    self.scratch.extend_from_slice(&coefficient.to_le_bytes());
                }
            }

            self.writer.write_all(&self.scratch)?;
            self.blocks_written += 1;
        }

        Ok(())
    }

    pub fn blocks_written(&self) -> u64 {
        self.blocks_written
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac3::process::decode::FrameCoefficients;
    use ac3::structs::audio_block::BlockCoefficients;
    use ac3::structs::bsi::BitstreamInfo;
    use ac3::structs::sync::SyncInfo;

    #[test]
    fn channels_then_lfe_per_block() -> Result<()> {
        let mut left = [0.0f32; BLOCK_LEN];
        left[0] = 0.5;
        let mut right = [0.0f32; BLOCK_LEN];
        right[255] = -1.0;
        let mut lfe = [0.0f32; BLOCK_LEN];
        lfe[1] = 0.25;

        let block = BlockCoefficients {
            channels: vec![left, right],
            lfe: Some(lfe),
            coupling: None,
            block_switch: vec![false; 2],
            dither: vec![false; 2],
            dynamic_range: [1.0; 2],
        };
        let frame = FrameCoefficients {
            sync_info: SyncInfo::from_codes(0, 2, 8)?,
            bsi: BitstreamInfo {
                lfe_on: true,
                ..Default::default()
            },
            blocks: vec![block.clone(), block],
        };

        let mut writer = CoefficientWriter::new(Vec::new());
        writer.write_frame(&frame)?;
        assert_eq!(writer.blocks_written(), 2);
        let bytes = writer.finish()?;

        let values = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect::<Vec<_>>();

        assert_eq!(values.len(), 2 * 3 * BLOCK_LEN);
        assert_eq!(values[0], 0.5);
        assert_eq!(values[2 * BLOCK_LEN - 1], -1.0);
        assert_eq!(values[2 * BLOCK_LEN + 1], 0.25);
        assert_eq!(values[3 * BLOCK_LEN], 0.5);
        Ok(())
    }
}
