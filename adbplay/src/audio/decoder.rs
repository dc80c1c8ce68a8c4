//! Streaming audio decoder using symphonia
//!
//! Decodes one packet at a time into interleaved f32 so the prefetch thread
//! can fill the ring buffer incrementally instead of decoding the whole file.

use crate::subsystem::{ResultCode, SlResult};
use std::fs::File;
use std::io;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Status for a file that could not be opened
pub fn open_error_code(err: &io::Error) -> ResultCode {
    match err.kind() {
        io::ErrorKind::NotFound => ResultCode::ContentNotFound,
        io::ErrorKind::PermissionDenied => ResultCode::PermissionDenied,
        _ => ResultCode::IoError,
    }
}

pub struct StreamDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    buffer: Option<SampleBuffer<f32>>,
}

impl StreamDecoder {
    /// Open and probe `path`; the container is detected from the content, with
    /// the file extension as a hint.
    pub fn open(path: &Path) -> SlResult<Self> {
        let file = File::open(path).map_err(|e| {
            warn!("Failed to open {}: {}", path.display(), e);
            open_error_code(&e)
        })?;
        if file.metadata().map(|m| m.is_dir()).unwrap_or(false) {
            warn!("{} is a directory", path.display());
            return Err(ResultCode::ContentUnsupported);
        }

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                warn!("Failed to probe {}: {}", path.display(), e);
                match e {
                    SymphoniaError::IoError(ref io_err)
                        if io_err.kind() != io::ErrorKind::UnexpectedEof =>
                    {
                        ResultCode::IoError
                    }
                    _ => ResultCode::ContentUnsupported,
                }
            })?;

        let format = probed.format;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                warn!("No audio track in {}", path.display());
                ResultCode::ContentUnsupported
            })?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.ok_or_else(|| {
            warn!("Sample rate not found in {}", path.display());
            ResultCode::ContentUnsupported
        })?;
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count())
            .unwrap_or(0);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| {
                warn!("No decoder for {}: {}", path.display(), e);
                ResultCode::ContentUnsupported
            })?;

        debug!(
            "Opened {}: sample_rate={}, channels={}",
            path.display(),
            sample_rate,
            channels
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
            buffer: None,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count; 0 until known when the container does not declare it
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Decode the next packet of the selected track.
    ///
    /// `Ok(None)` at end of content. Recoverable decode errors skip the packet.
    pub fn next_chunk(&mut self) -> SlResult<Option<Vec<f32>>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!("Reached end of file");
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    debug!("Stream reset required, treating as end of content");
                    return Ok(None);
                }
                Err(e) => {
                    warn!("Error reading packet: {}", e);
                    return Err(ResultCode::ContentCorrupted);
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Decode error: {}", e);
                    continue;
                }
                Err(e) => {
                    warn!("Fatal decode error: {}", e);
                    return Err(ResultCode::ContentCorrupted);
                }
            };

            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            self.channels = spec.channels.count();

            let needed = decoded.capacity() * self.channels;
            if self.buffer.as_ref().map_or(false, |b| b.capacity() < needed) {
                self.buffer = None;
            }
            let buffer = self
                .buffer
                .get_or_insert_with(|| SampleBuffer::new(decoded.capacity() as u64, spec));
            buffer.copy_interleaved_ref(decoded);
            return Ok(Some(buffer.samples().to_vec()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_error_codes() {
        assert_eq!(
            open_error_code(&io::Error::from(io::ErrorKind::NotFound)),
            ResultCode::ContentNotFound
        );
        assert_eq!(
            open_error_code(&io::Error::from(io::ErrorKind::PermissionDenied)),
            ResultCode::PermissionDenied
        );
        assert_eq!(
            open_error_code(&io::Error::from(io::ErrorKind::Interrupted)),
            ResultCode::IoError
        );
    }

    #[test]
    fn test_missing_file_is_content_not_found() {
        let result = StreamDecoder::open(Path::new("/nonexistent/adbplay/missing.wav"));
        assert!(matches!(result, Err(ResultCode::ContentNotFound)));
    }

    #[test]
    fn test_garbage_is_content_unsupported() {
        let mut file = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
        file.write_all(&[0x13u8; 4096]).unwrap();
        let result = StreamDecoder::open(file.path());
        assert!(matches!(result, Err(ResultCode::ContentUnsupported)));
    }

    #[test]
    fn test_decodes_pcm_wav() {
        let file = crate::audio::test_support::write_wav(8000, 1, &[0i16; 800]);
        let mut decoder = StreamDecoder::open(file.path()).unwrap();
        assert_eq!(decoder.sample_rate(), 8000);

        let mut total = 0;
        while let Some(chunk) = decoder.next_chunk().unwrap() {
            total += chunk.len();
        }
        assert_eq!(decoder.channels(), 1);
        assert_eq!(total, 800);
    }
}
