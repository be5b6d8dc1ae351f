use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use anyhow::Result;

/// Chunk size for streaming input into the extractor.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Reads a bitstream from a file or, for `-`, from stdin.
pub struct InputReader {
    reader: Box<dyn Read>,
}

impl InputReader {
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let reader: Box<dyn Read> = if is_pipe(input_path.as_ref()) {
            Box::new(io::stdin().lock())
        } else {
            Box::new(BufReader::new(File::open(input_path)?))
        };

        Ok(Self { reader })
    }

    #[cfg(test)]
    fn from_reader(reader: impl Read + 'static) -> Self {
        Self {
            reader: Box::new(reader),
        }
    }

    /// Feeds the input to `callback` in chunks of at most `chunk_size` bytes.
    ///
    /// The callback returns `Ok(false)` to stop early.
    pub fn process_chunks<F>(&mut self, chunk_size: usize, mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<bool>,
    {
        let mut buffer = vec![0u8; chunk_size];

        loop {
            let bytes_read = match self.reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            if !callback(&buffer[..bytes_read])? {
                break;
            }
        }

        Ok(())
    }
}

pub fn is_pipe(path: &Path) -> bool {
    path.as_os_str() == "-"
}
