#![no_main]

use arbitrary::Arbitrary;
use clarion::Resampler;
use libfuzzer_sys::fuzz_target;

const RATES: [u32; 6] = [8000, 16000, 22050, 32000, 44100, 48000];

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    input_rate_idx: u8,
    output_rate_idx: u8,
    stereo: bool,
    /// Input split into pushes of arbitrary length.
    chunks: Vec<Vec<i16>>,
}

fuzz_target!(|input: FuzzInput| {
    let from = RATES[usize::from(input.input_rate_idx) % RATES.len()];
    let to = RATES[usize::from(input.output_rate_idx) % RATES.len()];
    let channels = if input.stereo { 2 } else { 1 };
    let mut resampler = Resampler::new(from, to, channels).expect("supported rates");

    for chunk in &input.chunks {
        let whole = chunk.len() / channels * channels;
        let out = resampler.process(&chunk[..whole]).expect("aligned input");
        assert!(out.len() <= resampler.output_len(whole));
    }
});
