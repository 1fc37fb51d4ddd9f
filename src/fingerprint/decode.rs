//! Container decoding and sample-rate conversion.
//!
//! Everything downstream assumes mono f32 PCM at [`SAMPLE_RATE`]; this is
//! the only module that deals with codecs, channel layouts and foreign
//! sample rates.

use std::io::Cursor;

use rayon::{iter::ParallelIterator, slice::ParallelSlice};
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, WindowFunction};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{Decoder, DecoderOptions},
    formats::{FormatOptions, FormatReader},
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};

use crate::error::EngineError;
use crate::fingerprint::SAMPLE_RATE;

/// Decode container bytes into mono PCM at the pipeline sample rate.
pub fn decode(bytes: &[u8]) -> Result<Vec<f32>, EngineError> {
    let (samples, rate, channels) = decode_audio(bytes)?;

    resample(&to_mono(&samples, channels), rate, SAMPLE_RATE)
}

fn decode_audio(bytes: &[u8]) -> Result<(Vec<f32>, u32, usize), EngineError> {
    let cursor = Cursor::new(bytes.to_vec());
    let media_source_stream = MediaSourceStream::new(Box::new(cursor), Default::default());

    let probed = symphonia::default::get_probe().format(
        &Hint::new(),
        media_source_stream,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format.default_track().ok_or(EngineError::NoAudioTrack)?;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(EngineError::NoAudioTrack)?;
    let channels = track
        .codec_params
        .channels
        .ok_or(EngineError::NoAudioTrack)?
        .count();
    let track_id = track.id;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    if channels == 0 {
        return Err(EngineError::NoAudioTrack);
    }

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(_) => break,
        };

        if packet.track_id() != track_id {
            continue;
        }

        // Corrupt packets are skipped rather than failing the whole clip.
        let Ok(decoded) = decoder.decode(&packet) else {
            continue;
        };

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    Ok((samples, sample_rate, channels))
}

fn to_mono(input: &[f32], channels: usize) -> Vec<f32> {
    input
        .par_chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn resample(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>, EngineError> {
    if input_rate == output_rate {
        return Ok(input.to_vec());
    }

    let chunk_size = 1024;
    process(chunk_size, input, input_rate, output_rate)
}

fn process(
    chunk_size: usize,
    input: &[f32],
    input_rate: u32,
    output_rate: u32,
) -> Result<Vec<f32>, EngineError> {
    let thread_batch_size = chunk_size * 100;

    let segments: Vec<Vec<f32>> = input
        .par_chunks(thread_batch_size)
        .map(|segment| -> Result<Vec<f32>, EngineError> {
            let params = SincInterpolationParameters {
                sinc_len: 128,
                f_cutoff: 0.95,
                oversampling_factor: 64,
                interpolation: rubato::SincInterpolationType::Linear,
                window: WindowFunction::BlackmanHarris2,
            };

            let mut resampler = SincFixedIn::<f32>::new(
                output_rate as f64 / input_rate as f64,
                2.0,
                params,
                chunk_size,
                1,
            )?;

            let mut local_output = Vec::new();
            let mut position = 0;

            while position + chunk_size <= segment.len() {
                let chunk = vec![segment[position..position + chunk_size].to_vec()];
                let result = resampler.process(&chunk, None)?;

                local_output.extend_from_slice(&result[0]);
                position += chunk_size;
            }

            let remaining = segment.len() - position;
            if remaining > 0 {
                let mut padded = vec![0.0; chunk_size];
                padded[..remaining].copy_from_slice(&segment[position..]);

                let result = resampler.process(&[padded], None)?;
                local_output.extend_from_slice(&result[0]);
            }

            Ok(local_output)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(segments.into_iter().flatten().collect())
}
