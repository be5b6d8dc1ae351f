use crate::log_or_err;
use crate::structs::sync::{SYNC_INFO_LEN, SYNC_WORD, SyncInfo};
use crate::utils::errors::ExtractError;
use log::{debug, trace};
use std::collections::VecDeque;
use std::sync::Arc;

const SYNC_BYTES: [u8; 2] = SYNC_WORD.to_be_bytes();

/// Returns the offset of the first sync word in `buf`.
pub fn find_sync(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|pair| pair == SYNC_BYTES)
}

/// Splits a continuous bitstream into syncframes.
///
/// Data is fed with [`push_bytes`](Extractor::push_bytes) and whole frames
/// are pulled through the [`Iterator`] implementation. Every push yields at
/// most one [`ExtractError::InsufficientData`]; after that the iterator ends
/// until more data arrives.
///
/// # Example
///
/// ```rust,no_run
/// use ac3::process::extract::Extractor;
///
/// let mut extractor = Extractor::default();
/// extractor.push_bytes(&std::fs::read("stream.ac3")?);
///
/// for frame in &mut extractor {
///     match frame {
///         Ok(frame) => println!("{} byte frame at {} Hz", frame.as_ref().len(), frame.sync_info.sample_rate),
///         Err(err) => eprintln!("{err}"),
///     }
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Extractor {
    buffer: VecDeque<u8>,
    locked: bool,
    io_counter: usize,
    error_count: usize,
    frames_processed: usize,
    fail_level: log::Level,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            buffer: VecDeque::with_capacity(8 * 3840),
            locked: false,
            io_counter: 0,
            error_count: 0,
            frames_processed: 0,
            fail_level: log::Level::Error,
        }
    }
}

impl Extractor {
    /// Appends raw bitstream data to the internal buffer.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend(data);
        self.io_counter += 1;
    }

    /// Sets the failure level for stream errors.
    ///
    /// With `log::Level::Warn` a lost sync or a corrupt header on a locked
    /// stream is yielded as an error instead of being logged.
    pub fn set_fail_level(&mut self, level: log::Level) {
        self.fail_level = level;
    }

    pub fn frames_processed(&self) -> usize {
        self.frames_processed
    }

    /// Number of resynchronizations after the stream was first locked.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Drops data up to the next sync word with a valid header.
    fn resync(&mut self) -> Result<SyncInfo, ExtractError> {
        self.locked = false;

        loop {
            let (front, back) = self.buffer.as_slices();
            let offset = if front.last() == Some(&SYNC_BYTES[0]) && back.first() == Some(&SYNC_BYTES[1]) {
                find_sync(front).or(Some(front.len() - 1))
            } else {
                find_sync(front).or_else(|| find_sync(back).map(|pos| front.len() + pos))
            };

            let Some(offset) = offset else {
                // keep a trailing 0x0B, it may start the next sync word
                let keep = usize::from(self.buffer.back() == Some(&SYNC_BYTES[0]));
                self.consume_front(self.buffer.len() - keep);
                return Err(ExtractError::InsufficientData);
            };

            if offset > 0 {
                trace!("Skipping {offset} bytes before sync word");
                self.consume_front(offset);
            }

            let Some(header) = self.header() else {
                return Err(ExtractError::InsufficientData);
            };

            match SyncInfo::from_bytes(&header) {
                Ok(sync_info) => {
                    self.locked = true;
                    return Ok(sync_info);
                }
                Err(err) => {
                    debug!("Rejected sync candidate: {err}");
                    self.consume_front(1);
                }
            }
        }
    }

    fn header(&self) -> Option<[u8; SYNC_INFO_LEN]> {
        if self.buffer.len() < SYNC_INFO_LEN {
            return None;
        }

        let mut header = [0u8; SYNC_INFO_LEN];
        for (dst, src) in header.iter_mut().zip(self.buffer.iter()) {
            *dst = *src;
        }

        Some(header)
    }

    /// Unlocks after a broken frame and reports it at warning level.
    fn lose_sync(&mut self, error: ExtractError) -> Result<(), ExtractError> {
        self.locked = false;
        self.error_count += 1;
        self.consume_front(1);

        log_or_err!(self, log::Level::Warn, error);
        Ok(())
    }

    fn consume_front(&mut self, cnt: usize) {
        self.buffer.drain(..cnt);
    }

    fn iter_insufficient(&mut self) -> Option<Result<Frame, ExtractError>> {
        self.io_counter -= 1;
        Some(Err(ExtractError::InsufficientData))
    }
}

impl Iterator for Extractor {
    type Item = Result<Frame, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.io_counter == 0 {
            return None;
        }

        loop {
            let sync_info = if self.locked {
                let Some(header) = self.header() else {
                    return self.iter_insufficient();
                };

                let word = u16::from_be_bytes([header[0], header[1]]);
                if word != SYNC_WORD {
                    if let Err(err) = self.lose_sync(ExtractError::SyncLost(word)) {
                        return Some(Err(err));
                    }
                    continue;
                }

                match SyncInfo::from_bytes(&header) {
                    Ok(sync_info) => sync_info,
                    Err(err) => {
                        if let Err(err) = self.lose_sync(ExtractError::InvalidHeader(err)) {
                            return Some(Err(err));
                        }
                        continue;
                    }
                }
            } else {
                match self.resync() {
                    Ok(sync_info) => sync_info,
                    Err(_) => return self.iter_insufficient(),
                }
            };

            let frame_len = sync_info.frame_len();
            if self.buffer.len() < frame_len {
                return self.iter_insufficient();
            }

            let data = self.buffer.drain(..frame_len).collect::<Arc<[u8]>>();
            self.frames_processed += 1;

            return Some(Ok(Frame { sync_info, data }));
        }
    }
}

/// A single syncframe extracted from a bitstream.
#[derive(Debug, Clone)]
pub struct Frame {
    pub sync_info: SyncInfo,
    pub data: Arc<[u8]>,
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
