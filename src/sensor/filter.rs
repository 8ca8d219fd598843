// src/sensor/filter.rs - Statistical outlier rejection for raw samples

/// Z-scores of `samples` against `mean` using the population standard
/// deviation. `None` when the deviation is zero (all samples identical).
pub fn z_scores(samples: &[f64], mean: f64) -> Option<Vec<f64>> {
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;
    let sd = variance.sqrt();
    if sd == 0.0 {
        return None;
    }
    Some(samples.iter().map(|x| (x - mean) / sd).collect())
}

/// Mean of `samples` with outliers rejected.
///
/// Samples with |z| >= 2.0 against the window mean are dropped before
/// re-averaging; a spike from a noisy SPI read gets excluded instead of
/// dragging the control temperature. Identical samples (zero deviation)
/// average as-is, and an empty window reads 0.
pub fn filtered_mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let Some(scores) = z_scores(samples, mean) else {
        return mean;
    };

    const MAX_Z: f64 = 2.0;
    let kept: Vec<f64> = samples
        .iter()
        .zip(scores.iter())
        .filter(|(_, z)| z.abs() < MAX_Z)
        .map(|(x, _)| *x)
        .collect();
    kept.iter().sum::<f64>() / kept.len() as f64
}
