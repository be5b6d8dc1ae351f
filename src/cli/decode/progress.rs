use crate::cli::info::time_str;
use crate::input::{CHUNK_SIZE, InputReader};
use ac3::process::extract::Extractor;
use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::Path;

const BAR_TEMPLATE: &str =
    "{bar:40.cyan/blue} {pos}/{len} frames ({percent}%)\n{msg} | elapsed: {elapsed_precise}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {pos} frames\n{msg} | elapsed: {elapsed_precise}";

/// Counts the extractable frames of a file ahead of decoding.
pub fn estimate_total_frames(input_path: &Path) -> Result<u64> {
    log::info!("Counting frames for progress estimation");
    let count_start = std::time::Instant::now();

    let mut input_reader = InputReader::new(input_path)?;
    let mut extractor = Extractor::default();
    let mut frames = 0u64;
    let mut bytes_read = 0u64;

    input_reader.process_chunks(CHUNK_SIZE, |chunk| {
        bytes_read += chunk.len() as u64;
        extractor.push_bytes(chunk);
        frames += extractor.by_ref().filter(Result::is_ok).count() as u64;
        Ok(true)
    })?;

    let elapsed = count_start.elapsed().as_secs_f64();
    let read_speed = if elapsed > 0.0 {
        bytes_read as f64 / 1_000_000.0 / elapsed
    } else {
        0.0
    };

    log::info!(
        "Found {frames} extractable frames in {elapsed:.3}s ({read_speed:.1} MB/s, {bytes_read} bytes)"
    );

    Ok(frames)
}

pub fn create_progress_bar(multi: &MultiProgress, total_frames: Option<u64>) -> Result<ProgressBar> {
    let pb = match total_frames {
        Some(total) => {
            let pb = multi.add(ProgressBar::new(total));
            pb.set_style(ProgressStyle::with_template(&format!(
                "{BAR_TEMPLATE} | ETA: {{eta_precise}}"
            ))?);
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            pb
        }
        None => {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(ProgressStyle::with_template(SPINNER_TEMPLATE)?);
            pb
        }
    };

    pb.set_message("initializing decoder");
    Ok(pb)
}

/// Replaces the ETA with the decode speed relative to real time.
pub fn finish_progress_bar(
    pb: &ProgressBar,
    estimated: bool,
    decoded_seconds: f64,
    start_time: std::time::Instant,
) {
    let template = if estimated { BAR_TEMPLATE } else { SPINNER_TEMPLATE };
    if let Ok(style) = ProgressStyle::with_template(template) {
        pb.set_style(style);
    }

    let realtime = decoded_seconds / start_time.elapsed().as_secs_f64().max(f64::EPSILON);
    pb.finish_with_message(format!(
        "speed: {realtime:.1}x | timestamp: {}",
        time_str(decoded_seconds)
    ));
}
