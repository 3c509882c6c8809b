use gnoise::audio_io::AudioSink;
use gnoise::config::Config;
use gnoise::filter::{FilterSpec, OverlapNorm, SpectralFilter};
use gnoise::noise::{NoiseRange, NoiseSource, NoiseWindow};
use gnoise::pipeline::BlockPipeline;
use gnoise::OutputBlock;
use rustfft::{num_complex::Complex, FftPlanner};

/// Hann-windowed magnitude-squared spectrum of one frame.
fn analyze(frame: &[f64]) -> Vec<f64> {
    let size = frame.len();
    let mut buffer: Vec<Complex<f64>> = frame
        .iter()
        .enumerate()
        .map(|(n, &s)| {
            let w = 0.5 - 0.5 * (2.0 * std::f64::consts::PI * n as f64 / size as f64).cos();
            Complex::new(s * w, 0.0)
        })
        .collect();
    FftPlanner::new().plan_fft_forward(size).process(&mut buffer);
    buffer.iter().map(|c| c.norm_sqr()).collect()
}

#[test]
fn reference_scenario_produces_shaped_blocks() {
    // segment_size=1024, 4-segment window, alpha=0.1, cutoff=5, gain=1.0:
    // one block of 3072 stereo frames whose spectrum is empty below bin 6.
    let segment_size = 1024;
    let spec = FilterSpec {
        alpha: 0.1,
        cutoff: 5,
        gain: 1.0,
        overlap_norm: OverlapNorm::Sum,
        zero_nyquist: true,
    };

    let mut source = NoiseSource::new(NoiseRange::Symmetric, Some(1234));
    let mut window = NoiseWindow::new(4, segment_size);
    source.fill(&mut window);

    let mut filter = SpectralFilter::new(spec, segment_size);
    let mut block = OutputBlock::new(3, segment_size);
    filter.apply(&window, &mut block);
    block.scale(1.0);

    assert_eq!(block.frames(), 3072);

    for channel in [&block.left, &block.right] {
        for frame in channel.chunks_exact(segment_size) {
            let spectrum = analyze(frame);
            let total: f64 = spectrum.iter().sum();
            let low: f64 = spectrum[..=5]
                .iter()
                .chain(&spectrum[segment_size - 5..])
                .sum();
            assert!(total > 0.0, "filtered output is silent");
            assert!(
                low / total < 0.05,
                "cut bins carry {:.3}% of frame energy",
                100.0 * low / total
            );
        }
    }
}

#[test]
fn pipeline_delivers_the_reference_scenario_end_to_end() {
    let config = Config {
        sample_rate: 44_100,
        buffer_count: 3,
        segment_size: 1024,
        segment_count: 3,
        alpha: 0.1,
        cutoff: 5,
        gain: 1.0,
        volume: 1.0,
        seed: Some(77),
        noise_range: NoiseRange::Symmetric,
        overlap_norm: OverlapNorm::Sum,
        ..Config::default()
    };
    config.validate().unwrap();
    assert_eq!(config.frames_per_block(), 3072);

    let mut sink = AudioSink::new(BlockPipeline::start(&config));
    let mut out = vec![0.0f32; config.frames_per_block() * 2];
    sink.fill(&mut out);

    assert!(out.iter().any(|&s| s != 0.0));
    // Volume 1.0 with the default gain curve keeps samples well inside the
    // valid amplitude range for uniform input noise.
    assert!(out.iter().all(|&s| s.is_finite()));

    // The left channel of the interleaved stream still has its low bins cut.
    let left: Vec<f64> = out.chunks_exact(2).map(|f| f[0] as f64).collect();
    let spectrum = analyze(&left[..1024]);
    let total: f64 = spectrum.iter().sum();
    let low: f64 = spectrum[..=5].iter().chain(&spectrum[1024 - 5..]).sum();
    assert!(low / total < 0.05);
}

#[test]
fn streaming_blocks_join_without_spectral_artifacts() {
    // Two consecutive blocks from a shift_and_fill-advanced window: the
    // frame straddling the seam must show the same low-bin suppression as
    // the block interiors.
    let segment_size = 1024;
    let spec = FilterSpec {
        alpha: 0.1,
        cutoff: 5,
        gain: 1.0,
        overlap_norm: OverlapNorm::Sum,
        zero_nyquist: true,
    };

    let mut source = NoiseSource::new(NoiseRange::Symmetric, Some(4321));
    let mut window = NoiseWindow::new(3, segment_size);
    let mut filter = SpectralFilter::new(spec, segment_size);
    source.fill(&mut window);

    let mut stream = Vec::new();
    for _ in 0..2 {
        source.shift_and_fill(&mut window);
        let mut block = OutputBlock::new(2, segment_size);
        filter.apply(&window, &mut block);
        stream.extend_from_slice(&block.left);
    }

    let seam = stream.len() / 2;
    let straddle = &stream[seam - segment_size / 2..seam + segment_size / 2];
    let spectrum = analyze(straddle);
    let total: f64 = spectrum.iter().sum();
    let low: f64 = spectrum[..=5].iter().chain(&spectrum[segment_size - 5..]).sum();
    assert!(
        low / total < 0.05,
        "seam frame carries {:.3}% low-bin energy",
        100.0 * low / total
    );
}
