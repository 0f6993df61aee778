/// Linear-interpolation resampler.
///
/// Deliberately simple: one output allocation, no iterative filter state, and
/// a deterministic output length of `round(len * target_rate / source_rate)`.
/// Good enough for speech headed into a recognition model; not meant for
/// playback-quality conversion.
pub fn resample_linear(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if samples.is_empty() || source_rate == 0 || target_rate == 0 || source_rate == target_rate {
        return samples.to_vec();
    }

    let new_len =
        (samples.len() as f64 * target_rate as f64 / source_rate as f64).round() as usize;
    if new_len == 0 {
        return Vec::new();
    }
    if samples.len() == 1 {
        return vec![samples[0]; new_len];
    }

    // Evenly spaced index grid over [0, len-1], interpolated onto new_len points.
    let span = (samples.len() - 1) as f64;
    let step = if new_len > 1 {
        span / (new_len - 1) as f64
    } else {
        0.0
    };

    let mut out = Vec::with_capacity(new_len);
    for i in 0..new_len {
        let pos = i as f64 * step;
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;
        let a = samples[idx];
        let b = samples[(idx + 1).min(samples.len() - 1)];
        out.push(a + (b - a) * frac);
    }
    out
}

/// Average interleaved frames down to a single mono channel.
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
