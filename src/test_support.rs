//! Synthetic recordings and log capture shared by the unit tests.

use crate::config::SpectParams;
use crate::decode::{DecodedRecording, annotation_path};
use crate::recording::{Recording, Syllable};
use crate::types::LabelSelection;
use std::f64::consts::PI;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

pub const TEST_SAMPLE_RATE: u32 = 32_000;
pub const GAP_S: f64 = 0.025;

#[derive(Debug, Clone, Copy)]
pub struct SyllableSpec {
    pub label: char,
    pub duration_s: f64,
    pub freq_hz: f64,
}

pub fn syllable_spec(label: char, duration_s: f64) -> SyllableSpec {
    SyllableSpec {
        label,
        duration_s,
        freq_hz: 2_000.0,
    }
}

pub fn tone_spec(label: char, duration_s: f64, freq_hz: f64) -> SyllableSpec {
    SyllableSpec {
        label,
        duration_s,
        freq_hz,
    }
}

/// Lays the syllables out as 0.5-amplitude tone bursts separated by `GAP_S` of silence.
pub fn decoded_with(specs: &[SyllableSpec]) -> DecodedRecording {
    let fs = TEST_SAMPLE_RATE as f64;
    let mut waveform = vec![0.0; (GAP_S * fs).round() as usize];
    let mut onsets_s = Vec::with_capacity(specs.len());
    let mut offsets_s = Vec::with_capacity(specs.len());

    for spec in specs {
        let onset = waveform.len();
        let n = (spec.duration_s * fs).round() as usize;
        waveform.extend((0..n).map(|i| 0.5 * (2.0 * PI * spec.freq_hz * i as f64 / fs).sin()));
        onsets_s.push(onset as f64 / fs);
        offsets_s.push((onset + n) as f64 / fs);
        waveform.extend(std::iter::repeat_n(0.0, (GAP_S * fs).round() as usize));
    }

    DecodedRecording {
        waveform,
        sample_rate: TEST_SAMPLE_RATE,
        onsets_s,
        offsets_s,
        labels: specs.iter().map(|spec| spec.label).collect(),
    }
}

pub fn recording_with(specs: &[SyllableSpec]) -> Recording {
    Recording::from_decoded("synthetic.wav", decoded_with(specs))
        .unwrap_or_else(|e| panic!("synthetic recording rejected: {e}"))
}

/// Writes `decoded` as a 16-bit WAV file at `path` plus its JSON annotation sidecar.
pub fn write_annotated_wav(path: &Path, decoded: &DecodedRecording) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: decoded.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .unwrap_or_else(|e| panic!("cannot create {}: {e}", path.display()));
    for &x in &decoded.waveform {
        writer
            .write_sample((x * 32767.0).round() as i16)
            .unwrap_or_else(|e| panic!("write failed: {e}"));
    }
    writer
        .finalize()
        .unwrap_or_else(|e| panic!("finalize failed: {e}"));

    let annotation = serde_json::json!({
        "onsets_s": decoded.onsets_s,
        "offsets_s": decoded.offsets_s,
        "labels": decoded.labels.iter().collect::<String>(),
    });
    std::fs::write(annotation_path(path), annotation.to_string())
        .unwrap_or_else(|e| panic!("cannot write annotation: {e}"));
}

/// Every syllable of a synthetic recording, with spectrograms computed.
pub fn analysed(specs: &[SyllableSpec], params: &SpectParams) -> Vec<Syllable> {
    let mut recording = recording_with(specs);
    recording.set_inclusion_mask(&LabelSelection::All);
    recording
        .ensure_spectrograms(params)
        .unwrap_or_else(|e| panic!("spectrograms failed: {e}"));
    recording.syllables().map(<[Syllable]>::to_vec).unwrap_or_default()
}

pub fn analysed_one(spec: SyllableSpec) -> Syllable {
    analysed(&[spec], &SpectParams::default()).remove(0)
}

/// Counts `WARN` events emitted while it is installed.
#[derive(Debug, Clone, Default)]
pub struct WarningCounter {
    count: Arc<AtomicUsize>,
}

impl WarningCounter {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for WarningCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Runs `f` with a thread-local subscriber and returns its result with the number of warnings.
pub fn count_warnings<T>(f: impl FnOnce() -> T) -> (T, usize) {
    let counter = WarningCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, counter.count())
}
