//! New-order chime.
//!
//! Three short sine tones, rising then falling back, synthesized on the fly so there is no media
//! file to load or go missing.

use std::f32::consts::TAU;

pub const SAMPLE_RATE: u32 = 22_050;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency: f32,
    pub duration_ms: u32,
}

/// Ascending to the middle tone, then descending.
pub const CHIME: [Tone; 3] = [
    Tone {
        frequency: 659.25,
        duration_ms: 150,
    },
    Tone {
        frequency: 880.0,
        duration_ms: 150,
    },
    Tone {
        frequency: 659.25,
        duration_ms: 220,
    },
];

const GAP_MS: u32 = 60;
const FADE_MS: u32 = 10;
const AMPLITUDE: f32 = 0.35;

fn samples_for(ms: u32) -> usize {
    (SAMPLE_RATE as usize * ms as usize) / 1000
}

fn render_tone(tone: Tone, out: &mut Vec<i16>) {
    let total = samples_for(tone.duration_ms);
    let fade = samples_for(FADE_MS).max(1);
    for n in 0..total {
        let t = n as f32 / SAMPLE_RATE as f32;
        // short linear fade on both ends to avoid clicks
        let envelope = (n.min(total - 1 - n) as f32 / fade as f32).min(1.0);
        let value = (TAU * tone.frequency * t).sin() * AMPLITUDE * envelope;
        out.push((value * i16::MAX as f32) as i16);
    }
}

/// Mono 16-bit PCM samples for the given tones, separated by short silences.
pub fn synthesize(tones: &[Tone]) -> Vec<i16> {
    let mut samples = Vec::new();
    for (index, tone) in tones.iter().enumerate() {
        if index > 0 {
            samples.extend(std::iter::repeat_n(0, samples_for(GAP_MS)));
        }
        render_tone(*tone, &mut samples);
    }
    samples
}

/// Wraps mono 16-bit samples in a RIFF/WAVE container.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut wav = Vec::with_capacity(44 + data_len as usize);

    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        wav.extend_from_slice(&sample.to_le_bytes());
    }
    wav
}

pub fn chime_wav() -> Vec<u8> {
    encode_wav(&synthesize(&CHIME), SAMPLE_RATE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chime_rises_then_falls() {
        assert!(CHIME[0].frequency < CHIME[1].frequency);
        assert!(CHIME[1].frequency > CHIME[2].frequency);
    }

    #[test]
    fn synthesized_length_matches_tones_and_gaps() {
        let samples = synthesize(&CHIME);
        let expected = samples_for(150) + samples_for(150) + samples_for(220) + 2 * samples_for(GAP_MS);
        assert_eq!(samples.len(), expected);
        // starts and ends silent thanks to the fade
        assert_eq!(samples[0], 0);
        assert!(samples.last().unwrap().abs() < 200);
        assert!(samples.iter().any(|s| s.abs() > 5_000));
    }

    #[test]
    fn wav_header_is_well_formed() {
        let wav = chime_wav();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[36..40], b"data");
        let data_len = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]) as usize;
        assert_eq!(wav.len(), 44 + data_len);
        let riff_len = u32::from_le_bytes([wav[4], wav[5], wav[6], wav[7]]) as usize;
        assert_eq!(riff_len, wav.len() - 8);
    }
}
