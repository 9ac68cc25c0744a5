/// Default tolerance, in output quantization steps, for declaring the
/// quantized pipeline close enough to the float reference. Slightly above
/// half a step to absorb zero-point nudging at the range extremes.
pub const DEFAULT_TOL_STEPS: f32 = 0.53;

/// Quantization step implied by a reference output: the 8-bit step of the
/// zero-widened value range, `(max(ref, 0) - min(ref, 0)) / 255`.
pub fn output_step(reference: &[f32]) -> f32 {
    let mut min = 0.0f32;
    let mut max = 0.0f32;
    for &v in reference {
        min = min.min(v);
        max = max.max(v);
    }
    (max - min) / 255.0
}

/// Largest per-element absolute difference between two result buffers.
///
/// Buffers of different lengths compare as infinitely far apart.
pub fn max_abs_diff(actual: &[f32], expected: &[f32]) -> f32 {
    if actual.len() != expected.len() {
        return f32::INFINITY;
    }
    actual
        .iter()
        .zip(expected)
        .map(|(a, e)| (a - e).abs())
        .fold(0.0, f32::max)
}

/// Tolerance-based closeness check between a quantized pipeline's output
/// and the float reference: every element must fall within `tol_steps`
/// quantization steps of the reference. Never a bit-exact comparison.
pub fn results_close(actual: &[f32], expected: &[f32], tol_steps: f32) -> bool {
    max_abs_diff(actual, expected) <= output_step(expected) * tol_steps
}
