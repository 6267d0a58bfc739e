// Sample rate used on both sides of the pipeline: room audio is read at this
// rate and the synthesis endpoint returns PCM at this rate.
pub const PIPELINE_SAMPLE_RATE: u32 = 24_000;

/// Duration of one avatar audio chunk in milliseconds.
pub const AVATAR_CHUNK_MS: u32 = 100;

/// Interprets little-endian PCM16 bytes as samples. A trailing odd byte is ignored.
pub fn bytes_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect()
}

/// Serializes samples as little-endian PCM16 bytes.
pub fn i16_to_bytes(pcm16: &[i16]) -> Vec<u8> {
    pcm16
        .iter()
        .flat_map(|&sample| sample.to_le_bytes())
        .collect()
}

/// Root-mean-square level of a frame on the i16 scale.
pub fn rms(pcm16: &[i16]) -> f32 {
    if pcm16.is_empty() {
        return 0.0;
    }
    let sum: f64 = pcm16.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / pcm16.len() as f64).sqrt() as f32
}

/// Number of samples in `ms` milliseconds of mono audio at `sample_rate`.
pub fn samples_for_ms(sample_rate: u32, ms: u32) -> usize {
    (sample_rate as u64 * ms as u64 / 1000) as usize
}

/// Splits PCM into fixed-duration chunks; the last chunk may be shorter.
pub fn chunk_pcm(pcm16: &[i16], sample_rate: u32, chunk_ms: u32) -> Vec<&[i16]> {
    let size = samples_for_ms(sample_rate, chunk_ms).max(1);
    pcm16.chunks(size).collect()
}
