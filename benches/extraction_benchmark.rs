//! Benchmark of per-syllable feature extraction on synthetic songs.
//!
//! Builds songs of increasing length from harmonic tone bursts and times the
//! full SVM and k-NN feature sets over every syllable.

use song_features::features::expand_feature_groups;
use song_features::{
    DecodedRecording, FeatureExtractor, LabelSelection, Recording, SpectParams,
};
use std::f64::consts::PI;
use std::time::Instant;

const SAMPLE_RATE: u32 = 32000;
const SYLLABLE_S: f64 = 0.08;
const GAP_S: f64 = 0.03;

/// Song with `n_syllables` harmonic bursts separated by silence.
fn generate_song(n_syllables: usize) -> DecodedRecording {
    let sr = f64::from(SAMPLE_RATE);
    let syl_len = (SYLLABLE_S * sr) as usize;
    let gap_len = (GAP_S * sr) as usize;

    let mut waveform = vec![0.0; gap_len];
    let mut onsets_s = Vec::with_capacity(n_syllables);
    let mut offsets_s = Vec::with_capacity(n_syllables);
    let mut labels = Vec::with_capacity(n_syllables);

    for i in 0..n_syllables {
        let f0 = 800.0 + 150.0 * (i % 7) as f64;
        onsets_s.push(waveform.len() as f64 / sr);
        waveform.extend((0..syl_len).map(|n| {
            let t = n as f64 / sr;
            (1..=4)
                .map(|h| 0.4 / h as f64 * (2.0 * PI * f0 * h as f64 * t).sin())
                .sum::<f64>()
        }));
        offsets_s.push(waveform.len() as f64 / sr);
        labels.push(char::from(b'a' + (i % 7) as u8));
        waveform.extend(std::iter::repeat_n(0.0, gap_len));
    }

    DecodedRecording {
        waveform,
        sample_rate: SAMPLE_RATE,
        onsets_s,
        offsets_s,
        labels,
    }
}

fn benchmark_extraction(n_syllables: usize, label: &str) {
    println!("🐦 Benchmarking {label} song ({n_syllables} syllables)");

    let song = generate_song(n_syllables);
    let feature_names = expand_feature_groups(&["svm", "knn"]);
    let spect_params = SpectParams::default();
    let extractor = FeatureExtractor::new();

    let run = || {
        let mut recording = Recording::from_decoded("bench.wav", song.clone())?;
        extractor.extract_recording(
            &mut recording,
            feature_names.as_slice(),
            &spect_params,
            &LabelSelection::All,
        )
    };

    // Warm up
    for _ in 0..3 {
        let _ = run();
    }

    let num_runs = 10;
    let mut times = Vec::with_capacity(num_runs);
    let mut n_columns = 0;

    for _ in 0..num_runs {
        let start = Instant::now();
        let result = run();
        let elapsed = start.elapsed();

        match result {
            Ok(Some(output)) => n_columns = output.n_columns(),
            Ok(None) => panic!("No syllable was included"),
            Err(e) => panic!("Feature extraction failed: {e}"),
        }
        times.push(elapsed.as_secs_f64() * 1000.0);
    }

    times.sort_by(f64::total_cmp);
    let mean = times.iter().sum::<f64>() / times.len() as f64;
    let median = times[times.len() / 2];
    let min = times[0];
    let max = times[times.len() - 1];

    println!(
        "Results: {:.2}ms ± {:.2}ms (median: {:.2}ms, range: {:.2}-{:.2}ms)",
        mean,
        (times.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / times.len() as f64).sqrt(),
        median,
        min,
        max
    );
    println!(
        "   {:.3}ms per syllable, {} columns",
        mean / n_syllables as f64,
        n_columns
    );
    println!();
}

fn main() {
    println!("🎵 Song Features Extraction Benchmark");
    println!("=====================================");

    println!("Features enabled:");
    if cfg!(feature = "parallel-processing") {
        println!("  ✅ Parallel batch processing");
    } else {
        println!("  ❌ Parallel batch processing (not compiled in)");
    }
    println!();

    let test_cases = vec![
        (10, "Short"),
        (50, "Typical"),
        (200, "Long"),
        (500, "Very Long"),
    ];

    for (n_syllables, label) in test_cases {
        benchmark_extraction(n_syllables, label);
    }

    println!("🏁 Benchmark Complete!");
}
