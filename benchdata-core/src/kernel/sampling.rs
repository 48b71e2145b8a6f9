//! Random sampling helpers for the host kernel.

use std::f32::consts::PI;

use rand::{Rng, rngs::SmallRng};

use super::KernelError;

#[expect(
    clippy::float_arithmetic,
    reason = "Box-Muller transform requires floating-point arithmetic"
)]
pub(super) fn standard_normal_sample(rng: &mut SmallRng) -> Result<f32, KernelError> {
    let mut u1 = rng.gen_range(0.0_f32..1.0_f32);
    if u1 <= f32::EPSILON {
        u1 = f32::EPSILON;
    }
    let u2 = rng.gen_range(0.0_f32..1.0_f32);
    let radius = (-2.0_f32 * u1.ln()).sqrt();
    let sample = radius * (2.0_f32 * PI * u2).cos();
    if sample.is_finite() {
        Ok(sample)
    } else {
        Err(KernelError::InvalidFloatParameter {
            parameter: "standard_normal_sample",
        })
    }
}

#[expect(
    clippy::float_arithmetic,
    reason = "the box width must be finite for uniform sampling"
)]
pub(super) fn uniform_sample(rng: &mut SmallRng, min: f32, max: f32) -> Result<f32, KernelError> {
    if !(min.is_finite() && max.is_finite() && (max - min).is_finite()) {
        return Err(KernelError::InvalidFloatParameter {
            parameter: "center_box",
        });
    }
    if min >= max {
        return Err(KernelError::EmptyCenterBox { min, max });
    }
    Ok(rng.gen_range(min..max))
}

#[cfg(test)]
#[expect(
    clippy::float_arithmetic,
    reason = "moment checks require floating-point arithmetic"
)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rstest::rstest;

    #[rstest]
    fn normal_samples_have_unit_moments() {
        let mut rng = SmallRng::seed_from_u64(7);
        let samples: Vec<f32> = (0..20_000)
            .map(|_| standard_normal_sample(&mut rng).expect("finite sample"))
            .collect();
        let count = 20_000.0_f32;
        let mean = samples.iter().sum::<f32>() / count;
        let variance = samples.iter().map(|s| (s - mean) * (s - mean)).sum::<f32>() / count;
        assert!(mean.abs() < 0.05, "mean too far from zero: {mean}");
        assert!((variance - 1.0).abs() < 0.05, "variance too far from one: {variance}");
    }

    #[rstest]
    #[case(1.0, 1.0)]
    #[case(2.0, -2.0)]
    fn empty_boxes_are_rejected(#[case] min: f32, #[case] max: f32) {
        let mut rng = SmallRng::seed_from_u64(1);
        let err = uniform_sample(&mut rng, min, max).expect_err("empty box must fail");
        assert_eq!(err, KernelError::EmptyCenterBox { min, max });
    }

    #[rstest]
    #[case::infinite_bound(f32::NEG_INFINITY, 1.0)]
    #[case::nan_bound(0.0, f32::NAN)]
    #[case::overflowing_width(-3.0e38, 3.0e38)]
    fn non_finite_boxes_are_rejected(#[case] min: f32, #[case] max: f32) {
        let mut rng = SmallRng::seed_from_u64(1);
        let err = uniform_sample(&mut rng, min, max).expect_err("non-finite box must fail");
        assert_eq!(
            err,
            KernelError::InvalidFloatParameter {
                parameter: "center_box"
            }
        );
    }
}
