use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;

use super::command::{Cli, InfoArgs};
use crate::input::{CHUNK_SIZE, InputReader};
use ac3::process::extract::{Extractor, Frame};
use ac3::structs::bsi::BitstreamInfo;
use ac3::structs::sync::SyncInfo;
use ac3::utils::bitstream_io::BsIoSliceReader;
use ac3::utils::errors::ExtractError;
use ac3::utils::tables::{BLOCK_LEN, BLOCKS_PER_FRAME};

const SAMPLES_PER_FRAME: u64 = (BLOCKS_PER_FRAME * BLOCK_LEN) as u64;

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing AC-3 stream: {}", args.input.display());

    let mut input_reader = InputReader::new(&args.input)?;
    let mut extractor = Extractor::default();
    extractor.set_fail_level(cli.fail_level());

    let mut context = AnalysisContext::default();
    if let Some(multi) = multi {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb.set_message("Analyzing frames...");
        context.pb = Some(pb);
    }

    input_reader.process_chunks(CHUNK_SIZE, |chunk| {
        context.total_bytes += chunk.len() as u64;
        extractor.push_bytes(chunk);

        for frame_result in extractor.by_ref() {
            match frame_result {
                Ok(frame) => context.process_frame(&frame, cli)?,
                Err(ExtractError::InsufficientData) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(true)
    })?;

    if let Some(ref pb) = context.pb {
        pb.finish_and_clear();
    }

    let Some(summary) = context.into_summary() else {
        println!("No AC-3 syncframe found in the input.");
        return Ok(());
    };

    if args.yaml {
        print!("{}", serde_yaml_ng::to_string(&summary)?);
    } else {
        display_summary(&summary);
    }

    Ok(())
}

#[derive(Default)]
struct AnalysisContext {
    first: Option<(SyncInfo, BitstreamInfo)>,
    frame_count: u64,
    frame_bytes: u64,
    total_bytes: u64,
    configuration_changes: u64,
    pb: Option<ProgressBar>,
}

impl AnalysisContext {
    fn process_frame(&mut self, frame: &Frame, cli: &Cli) -> Result<()> {
        match read_bsi(frame) {
            Ok(bsi) => self.track_configuration(frame.sync_info, bsi),
            Err(e) => {
                if cli.strict {
                    return Err(e);
                }
                log::warn!("BSI error at frame {}: {e}", self.frame_count);
            }
        }

        self.frame_count += 1;
        self.frame_bytes += frame.as_ref().len() as u64;

        if self.frame_count.is_multiple_of(100) {
            if let Some(ref pb) = self.pb {
                pb.set_message(format!("Analyzing frames...       {}", self.frame_count));
            }
        }

        Ok(())
    }

    fn track_configuration(&mut self, sync_info: SyncInfo, bsi: BitstreamInfo) {
        let Some((first_sync, first_bsi)) = &self.first else {
            self.first = Some((sync_info, bsi));
            return;
        };

        if first_sync.sample_rate != sync_info.sample_rate
            || first_bsi.channel_mode != bsi.channel_mode
            || first_bsi.lfe_on != bsi.lfe_on
        {
            log::warn!(
                "Stream configuration changed at frame {}: {} Hz {}{}",
                self.frame_count,
                sync_info.sample_rate,
                bsi.channel_mode,
                if bsi.lfe_on { " + LFE" } else { "" }
            );
            self.configuration_changes += 1;
        }
    }

    fn into_summary(self) -> Option<StreamSummary> {
        let (sync_info, bsi) = self.first?;

        let duration_seconds =
            (self.frame_count * SAMPLES_PER_FRAME) as f64 / sync_info.sample_rate as f64;
        let average_bit_rate = if duration_seconds > 0.0 {
            self.frame_bytes as f64 * 8.0 / (duration_seconds * 1000.0)
        } else {
            0.0
        };

        let channels = bsi
            .channel_labels()
            .iter()
            .map(|label| format!("{label:?}"))
            .collect::<Vec<_>>();

        Some(StreamSummary {
            sample_rate: sync_info.sample_rate,
            bit_rate: sync_info.bit_rate,
            frame_size: sync_info.frame_len(),
            bsid: bsi.bsid,
            bsmod: bsi.bsmod,
            channel_mode: bsi.channel_mode.to_string(),
            lfe: bsi.lfe_on,
            channels,
            dialogue_level: bsi.program.dialogue_level(),
            dialogue_level2: bsi.program2.map(|program| program.dialogue_level()),
            frames: self.frame_count,
            configuration_changes: self.configuration_changes,
            size: self.total_bytes,
            duration: time_str(duration_seconds),
            average_bit_rate: (average_bit_rate * 10.0).round() / 10.0,
        })
    }
}

/// Parses the bit stream information of an extracted frame.
fn read_bsi(frame: &Frame) -> Result<BitstreamInfo> {
    let mut reader = BsIoSliceReader::from_slice(frame.as_ref());
    SyncInfo::read(&mut reader)?;
    Ok(BitstreamInfo::read(&mut reader)?)
}

#[derive(Debug, Serialize)]
struct StreamSummary {
    /// Hz.
    sample_rate: u32,
    /// kbit/s.
    bit_rate: u16,
    /// Bytes.
    frame_size: usize,
    bsid: u8,
    bsmod: u8,
    channel_mode: String,
    lfe: bool,
    channels: Vec<String>,
    /// dBFS.
    dialogue_level: i8,
    #[serde(skip_serializing_if = "Option::is_none")]
    dialogue_level2: Option<i8>,
    frames: u64,
    configuration_changes: u64,
    /// Bytes read from the input.
    size: u64,
    duration: String,
    /// kbit/s over whole frames.
    average_bit_rate: f64,
}

fn display_summary(summary: &StreamSummary) {
    println!();
    println!("AC-3 Stream Information");
    println!("=======================");
    println!();
    println!("Stream Information");
    println!("  Sampling rate             {} Hz", summary.sample_rate);
    println!("  Bit rate                  {} kbps", summary.bit_rate);
    println!("  Frame size                {} bytes", summary.frame_size);
    println!("  Bitstream id              {}", summary.bsid);
    println!("  Bitstream mode            {}", summary.bsmod);
    println!();
    println!("Channel Information");
    println!("  Channel mode              {}", summary.channel_mode);
    println!("  LFE                       {}", summary.lfe);
    println!("  Channels                  {}", summary.channels.join(" "));
    println!("  Dialogue level            {} dBFS", summary.dialogue_level);
    if let Some(level) = summary.dialogue_level2 {
        println!("  Dialogue level (ch2)      {level} dBFS");
    }
    println!();
    println!("Analysis Summary");
    println!("  Frames processed          {}", summary.frames);
    if summary.configuration_changes > 0 {
        println!("  Configuration changes     {}", summary.configuration_changes);
    }
    let size_mb = summary.size as f64 / 1_000_000.0;
    println!("  Size                      {size_mb:.2} MB ({} bytes)", summary.size);
    println!("  Duration                  {}", summary.duration);
    println!("  Average data rate         {:.1} kbps", summary.average_bit_rate);
    println!();
}

/// Formats seconds as `HH:MM:SS.mmm`.
pub fn time_str(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0).round() as u64;
    let (hours, rest) = (total_ms / 3_600_000, total_ms % 3_600_000);
    let (minutes, rest) = (rest / 60_000, rest % 60_000);
    let (secs, ms) = (rest / 1000, rest % 1000);

    format!("{hours:02}:{minutes:02}:{secs:02}.{ms:03}")
}
