//! Sensor value to pitch mapping. Everything here is pure so the same
//! readings always produce the same notes.

use once_cell::sync::Lazy;

pub const ADC_MAX: i32 = 1023;

/// Semitone degrees of the major scale inside one octave.
pub const MAJOR_DEGREES: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Major-scale offsets over three octaves, the default ambient range.
pub static MAJOR_OFFSETS_3_OCTAVES: Lazy<Vec<u8>> = Lazy::new(|| build_major_offsets(36));

pub fn note_to_frequency(note: u8) -> f32 {
    440.0 * 2f32.powf((note as f32 - 69.0) / 12.0)
}

/// Scale a raw ADC reading to a semitone offset in `[0, max_semitones]`.
pub fn adc_to_semitones(adc: i32, max_semitones: u8) -> u8 {
    let adc = adc.clamp(0, ADC_MAX);
    let x = adc as f64 / ADC_MAX as f64;
    (x * max_semitones as f64).round_ties_even() as u8
}

pub fn pulse_note_from_adc(adc: i32, base_note: u8, max_semitones: u8) -> u8 {
    base_note.saturating_add(adc_to_semitones(adc, max_semitones))
}

/// Snap a semitone offset to the nearest major-scale degree of its octave.
///
/// When two degrees are equally close the lower one wins. That rule has no
/// musical meaning; it only keeps the mapping stable.
pub fn quantize_to_major_scale(semitone_offset: i32, max_semitones: u8) -> u8 {
    let semis = semitone_offset.clamp(0, max_semitones as i32) as u8;
    let octave = semis / 12;
    let degree = semis % 12;
    let nearest = nearest_of(&MAJOR_DEGREES, degree);
    (octave * 12 + nearest).min(max_semitones)
}

/// All major-scale offsets from zero up to and including `max_semitones`.
pub fn build_major_offsets(max_semitones: u8) -> Vec<u8> {
    let mut offs: Vec<u8> = (0..=max_semitones / 12)
        .flat_map(|octave| MAJOR_DEGREES.iter().map(move |d| octave as u16 * 12 + *d as u16))
        .filter(|s| *s <= max_semitones as u16)
        .map(|s| s as u8)
        .collect();
    offs.sort_unstable();
    offs.dedup();
    offs
}

pub fn humidity_to_offset(h: f64, h_min: f64, h_max: f64, max_semitones: u8) -> u8 {
    let semis = if h <= h_min {
        0
    } else if h >= h_max {
        max_semitones
    } else {
        let x = (h - h_min) / (h_max - h_min);
        (x * max_semitones as f64).round_ties_even() as u8
    };
    if max_semitones == 36 {
        nearest_of(&MAJOR_OFFSETS_3_OCTAVES, semis)
    } else {
        nearest_of(&build_major_offsets(max_semitones), semis)
    }
}

/// Returns `(note, offset)` for a humidity reading above `base_root`.
pub fn humidity_to_note(h: f64, base_root: u8, h_min: f64, h_max: f64, max_semitones: u8) -> (u8, u8) {
    let offset = humidity_to_offset(h, h_min, h_max, max_semitones);
    (base_root.saturating_add(offset), offset)
}

fn nearest_of(table: &[u8], value: u8) -> u8 {
    table
        .iter()
        .copied()
        .min_by_key(|d| (*d as i32 - value as i32).abs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concert_a() {
        assert!((note_to_frequency(69) - 440.0).abs() < 1e-3);
        assert!((note_to_frequency(81) - 880.0).abs() < 1e-2);
        assert!((note_to_frequency(60) - 261.6256).abs() < 1e-2);
    }

    #[test]
    fn adc_is_clamped() {
        assert_eq!(pulse_note_from_adc(-50, 24, 60), 24);
        assert_eq!(pulse_note_from_adc(5000, 24, 60), 84);
        assert_eq!(pulse_note_from_adc(1023, 24, 60), 84);
        assert_eq!(pulse_note_from_adc(0, 24, 60), 24);
    }

    #[test]
    fn quantize_exact_and_ties() {
        assert_eq!(quantize_to_major_scale(14, 60), 14);
        assert_eq!(quantize_to_major_scale(13, 60), 12);
        assert_eq!(quantize_to_major_scale(3, 60), 2);
        assert_eq!(quantize_to_major_scale(6, 60), 5);
        assert_eq!(quantize_to_major_scale(10, 60), 9);
        assert_eq!(quantize_to_major_scale(11, 60), 11);
        assert_eq!(quantize_to_major_scale(-4, 60), 0);
        assert_eq!(quantize_to_major_scale(99, 60), 60);
    }

    #[test]
    fn quantized_pulse_is_on_scale_and_monotonic() {
        let offsets = build_major_offsets(60);
        let mut prev = 0u8;
        for adc in 0..=ADC_MAX {
            let note = pulse_note_from_adc(adc, 24, 60);
            let q = quantize_to_major_scale(note as i32 - 24, 60);
            assert!(offsets.contains(&q), "adc {adc} gave off-scale {q}");
            assert!(q >= prev, "adc {adc} went down from {prev} to {q}");
            prev = q;
        }
        assert_eq!(prev, 60);
    }

    #[test]
    fn offsets_table() {
        let t = build_major_offsets(36);
        assert_eq!(t.first(), Some(&0));
        assert_eq!(t.last(), Some(&36));
        assert_eq!(t.len(), 22);
        assert_eq!(*MAJOR_OFFSETS_3_OCTAVES, t);
        assert_eq!(build_major_offsets(13), vec![0, 2, 4, 5, 7, 9, 11, 12]);
    }

    #[test]
    fn humidity_window_edges() {
        assert_eq!(humidity_to_offset(200.0, 200.0, 400.0, 36), 0);
        assert_eq!(humidity_to_offset(150.0, 200.0, 400.0, 36), 0);
        assert_eq!(humidity_to_offset(401.0, 200.0, 400.0, 36), 36);
        // 300 -> 18 semitones -> nearest scale offset 17 (F of the second octave)
        assert_eq!(humidity_to_offset(300.0, 200.0, 400.0, 36), 17);
        assert_eq!(humidity_to_note(300.0, 36, 200.0, 400.0, 36), (53, 17));
        assert_eq!(humidity_to_offset(300.0, 200.0, 400.0, 24), 12);
    }
}
