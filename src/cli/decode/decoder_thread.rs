use crate::input::{CHUNK_SIZE, InputReader};
use ac3::process::decode::{Decoder, DecoderStats, FrameCoefficients};
use ac3::process::extract::Extractor;
use ac3::utils::errors::ExtractError;
use anyhow::Result;
use indicatif::ProgressBar;
use std::sync::mpsc;
use std::thread;

pub struct DecoderThreadConfig {
    pub input_path: std::path::PathBuf,
    pub strict_mode: bool,
    pub tx: mpsc::Sender<Result<FrameCoefficients>>,
    pub pb: Option<ProgressBar>,
    pub extractor: Extractor,
    pub decoder: Decoder,
}

/// Reads, splits and decodes the input on a worker thread.
///
/// Decoded frames are sent over `tx` in stream order. The thread stops once
/// the receiver hangs up or, in strict mode, after sending the first error.
pub fn spawn_decoder_thread(config: DecoderThreadConfig) -> thread::JoinHandle<Result<DecoderStats>> {
    thread::spawn(move || -> Result<DecoderStats> {
        let DecoderThreadConfig {
            input_path,
            strict_mode,
            tx,
            pb,
            mut extractor,
            mut decoder,
        } = config;

        let mut input_reader = InputReader::new(&input_path)?;
        let mut worker = FrameWorker {
            extractor: &mut extractor,
            decoder: &mut decoder,
            strict_mode,
            tx: &tx,
            pb: &pb,
            frame_count: 0,
        };

        input_reader.process_chunks(CHUNK_SIZE, |chunk| {
            worker.extractor.push_bytes(chunk);
            Ok(worker.drain())
        })?;

        let stats = decoder.stats();
        log::info!(
            "Processing complete: {} frames, {} blocks, {} extraction errors",
            stats.frames_decoded,
            stats.blocks_decoded,
            extractor.error_count()
        );

        Ok(stats)
    })
}

struct FrameWorker<'a> {
    extractor: &'a mut Extractor,
    decoder: &'a mut Decoder,
    strict_mode: bool,
    tx: &'a mpsc::Sender<Result<FrameCoefficients>>,
    pb: &'a Option<ProgressBar>,
    frame_count: u64,
}

impl FrameWorker<'_> {
    /// Decodes every complete frame in the extractor. Returns `false` once
    /// the worker should stop reading.
    fn drain(&mut self) -> bool {
        loop {
            match self.extractor.next() {
                Some(Ok(frame)) => {
                    self.frame_count += 1;
                    if let Some(pb) = self.pb {
                        pb.set_position(self.frame_count);
                    }

                    match self.decoder.decode(frame.as_ref()) {
                        Ok(coefficients) => {
                            if self.tx.send(Ok(coefficients)).is_err() {
                                return false;
                            }
                        }
                        Err(e) => {
                            log::error!("Decode error at frame {}: {e}", self.frame_count);
                            if self.strict_mode {
                                let _ = self.tx.send(Err(e.into()));
                                return false;
                            }
                        }
                    }
                }
                Some(Err(ExtractError::InsufficientData)) | None => return true,
                Some(Err(e)) => {
                    if self.strict_mode {
                        let _ = self.tx.send(Err(e.into()));
                        return false;
                    }
                    if let Some(pb) = self.pb {
                        pb.set_message("decoding (some extraction errors)");
                    }
                }
            }
        }
    }
}
