pub mod decoder_thread;
pub mod output;
pub mod progress;

use decoder_thread::{DecoderThreadConfig, spawn_decoder_thread};
use output::CoefficientWriter;
use progress::{create_progress_bar, estimate_total_frames, finish_progress_bar};

use crate::cli::command::{Cli, DecodeArgs};
use crate::input::is_pipe;
use ac3::process::{decode::Decoder, extract::Extractor};
use ac3::utils::tables::{BLOCK_LEN, BLOCKS_PER_FRAME};
use anyhow::Result;
use indicatif::MultiProgress;
use std::sync::mpsc;

pub fn cmd_decode(args: &DecodeArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!(
        "Decoding AC-3 stream: {} (strict mode: {}, dither seed: {})",
        args.input.display(),
        cli.strict,
        args.dither_seed
    );

    let is_pipe = is_pipe(&args.input);
    let mut writer = match &args.output_path {
        Some(path) => {
            log::info!("Output path specified: {}", path.display());
            Some(CoefficientWriter::create(path)?)
        }
        None => None,
    };

    let should_estimate = !args.no_estimate_progress && !is_pipe && multi.is_some();
    let total_frames = if should_estimate {
        Some(estimate_total_frames(&args.input)?)
    } else {
        if is_pipe {
            log::debug!("Skipping progress estimation for pipe input");
        } else if args.no_estimate_progress {
            log::debug!("Progress estimation disabled by --no-estimate-progress flag");
        }
        None
    };

    let pb = match multi {
        Some(multi) => Some(create_progress_bar(multi, total_frames)?),
        None => None,
    };

    let mut extractor = Extractor::default();
    let mut decoder = Decoder::with_dither_seed(args.dither_seed);
    extractor.set_fail_level(cli.fail_level());
    decoder.set_fail_level(cli.fail_level());

    let (tx, rx) = mpsc::channel();
    let decode_thread = spawn_decoder_thread(DecoderThreadConfig {
        input_path: args.input.clone(),
        strict_mode: cli.strict,
        tx,
        pb: pb.clone(),
        extractor,
        decoder,
    });

    let start_time = std::time::Instant::now();
    let mut decoded_seconds = 0.0f64;
    let mut current_format = None;

    while let Ok(result) = rx.recv() {
        let frame = match result {
            Ok(frame) => frame,
            Err(e) => {
                if let Some(pb) = &pb {
                    pb.finish_with_message("decode failed");
                }
                return Err(e);
            }
        };

        let format = (
            frame.sync_info.sample_rate,
            frame.bsi.channel_mode,
            frame.bsi.lfe_on,
        );
        if current_format != Some(format) {
            log::info!(
                "Output format: {} Hz, {}{}",
                format.0,
                format.1,
                if format.2 { " + LFE" } else { "" }
            );
            current_format = Some(format);
        }

        decoded_seconds +=
            (BLOCKS_PER_FRAME * BLOCK_LEN) as f64 / frame.sync_info.sample_rate as f64;

        if let Some(writer) = writer.as_mut() {
            writer.write_frame(&frame)?;
        }
    }

    let stats = match decode_thread.join() {
        Ok(Ok(stats)) => stats,
        Ok(Err(e)) => {
            if let Some(pb) = &pb {
                pb.finish_with_message("decode failed");
            }
            return Err(e);
        }
        Err(_) => {
            if let Some(pb) = &pb {
                pb.finish_with_message("decode thread panicked");
            }
            return Err(anyhow::anyhow!("Decode thread panicked"));
        }
    };

    if let Some(writer) = writer {
        log::info!("Wrote {} blocks of coefficients", writer.blocks_written());
        writer.finish()?;
    }

    if let Some(pb) = &pb {
        finish_progress_bar(pb, total_frames.is_some(), decoded_seconds, start_time);
    }

    log::info!(
        "Decoding completed: {} frames, {} bit allocations, {} mute shortcuts",
        stats.frames_decoded,
        stats.bit_allocations,
        stats.mute_shortcuts
    );

    Ok(())
}
