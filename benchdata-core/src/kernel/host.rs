//! Reference blob kernel computing on the host and staging through the device.

use rand::{SeedableRng, rngs::SmallRng, seq::SliceRandom};
use tracing::instrument;

use super::{
    BlobParams, KernelError, SyntheticKernel,
    sampling::{standard_normal_sample, uniform_sample},
};
use crate::device::{DeviceBuffer, StreamHandle, copy_to_device};

/// Generates Gaussian blobs on the host and enqueues copies to the device.
///
/// Centres are drawn uniformly from the centre box (unless supplied), rows are
/// assigned to clusters round-robin, each feature is the centre coordinate
/// plus a Gaussian sample scaled by the cluster deviation, and rows are
/// optionally permuted. All randomness comes from one `SmallRng` seeded with
/// `params.seed`, so equal parameters always produce equal output.
///
/// # Examples
/// ```
/// use benchdata_core::{BlobParams, Dataset, HostBlobKernel, HostDevice, Shape, SyntheticKernel};
///
/// let device = HostDevice::new();
/// let mut dataset = Dataset::with_shape(Shape::new(6, 2, 3))?;
/// dataset.allocate(&device)?;
/// let params = BlobParams {
///     nrows: 6,
///     ncols: 2,
///     n_clusters: 3,
///     centers: None,
///     cluster_std_list: None,
///     cluster_std: 1.0,
///     shuffle: false,
///     center_box_min: -10.0,
///     center_box_max: 10.0,
///     seed: 1234,
/// };
/// let stream = dataset.stream().expect("allocated");
/// let (features, labels) = dataset.buffers_mut()?;
/// HostBlobKernel.make_blobs(features, labels, &params, stream)?;
/// assert_eq!(dataset.labels_to_host()?, vec![0, 1, 2, 0, 1, 2]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct HostBlobKernel;

impl SyntheticKernel for HostBlobKernel {
    #[instrument(
        name = "kernel.make_blobs",
        err,
        skip_all,
        fields(nrows = params.nrows, ncols = params.ncols, clusters = params.n_clusters),
    )]
    fn make_blobs(
        &self,
        features: &mut DeviceBuffer<'_, f32>,
        labels: &mut DeviceBuffer<'_, i32>,
        params: &BlobParams,
        stream: StreamHandle,
    ) -> Result<(), KernelError> {
        validate_params(params)?;
        let expected = params
            .nrows
            .checked_mul(params.ncols)
            .ok_or(KernelError::Overflow)?;
        check_buffer("features", expected, features.len())?;
        check_buffer("labels", params.nrows, labels.len())?;

        let (data, classes) = generate_blobs(params)?;
        copy_to_device(features, &data, data.len(), stream)?;
        copy_to_device(labels, &classes, classes.len(), stream)?;
        Ok(())
    }
}

/// Generates blob features and labels on the host.
///
/// # Errors
/// Returns [`KernelError`] when the parameters are invalid.
pub(crate) fn generate_blobs(params: &BlobParams) -> Result<(Vec<f32>, Vec<i32>), KernelError> {
    validate_params(params)?;
    let total = params
        .nrows
        .checked_mul(params.ncols)
        .ok_or(KernelError::Overflow)?;
    let mut rng = SmallRng::seed_from_u64(params.seed);
    let centers = resolve_centers(params, &mut rng)?;
    let deviations = resolve_deviations(params)?;

    let mut order: Vec<usize> = (0..params.n_clusters)
        .cycle()
        .take(params.nrows)
        .collect();
    if params.shuffle {
        order.shuffle(&mut rng);
    }

    let mut data = Vec::with_capacity(total);
    let mut labels = Vec::with_capacity(params.nrows);
    for cluster in order {
        labels.push(i32::try_from(cluster).map_err(|_| KernelError::LabelOverflow { cluster })?);
        let (Some(center), Some(deviation)) = (centers.get(cluster), deviations.get(cluster))
        else {
            return Err(KernelError::LabelOverflow { cluster });
        };
        for coordinate in center {
            data.push(offset_sample(*coordinate, *deviation, &mut rng)?);
        }
    }
    Ok((data, labels))
}

#[expect(
    clippy::float_arithmetic,
    reason = "blob samples are centre plus scaled Gaussian noise"
)]
fn offset_sample(center: f32, deviation: f32, rng: &mut SmallRng) -> Result<f32, KernelError> {
    Ok(center + deviation * standard_normal_sample(rng)?)
}

fn validate_params(params: &BlobParams) -> Result<(), KernelError> {
    if params.nrows == 0 {
        return Err(KernelError::ZeroRows);
    }
    if params.ncols == 0 {
        return Err(KernelError::ZeroColumns);
    }
    if params.n_clusters == 0 {
        return Err(KernelError::ZeroClusters);
    }
    let highest = params.n_clusters.saturating_sub(1);
    if i32::try_from(highest).is_err() {
        return Err(KernelError::LabelOverflow { cluster: highest });
    }
    Ok(())
}

const fn check_buffer(
    buffer: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), KernelError> {
    if expected == actual {
        Ok(())
    } else {
        Err(KernelError::BufferSizeMismatch {
            buffer,
            expected,
            actual,
        })
    }
}

fn resolve_centers(params: &BlobParams, rng: &mut SmallRng) -> Result<Vec<Vec<f32>>, KernelError> {
    let expected = params
        .n_clusters
        .checked_mul(params.ncols)
        .ok_or(KernelError::Overflow)?;
    match &params.centers {
        Some(centers) => {
            if centers.len() != expected {
                return Err(KernelError::CentersLengthMismatch {
                    expected,
                    actual: centers.len(),
                });
            }
            if centers.iter().any(|value| !value.is_finite()) {
                return Err(KernelError::InvalidFloatParameter {
                    parameter: "centers",
                });
            }
            Ok(centers.chunks(params.ncols).map(<[f32]>::to_vec).collect())
        }
        None => (0..params.n_clusters)
            .map(|_| {
                (0..params.ncols)
                    .map(|_| uniform_sample(rng, params.center_box_min, params.center_box_max))
                    .collect::<Result<Vec<f32>, KernelError>>()
            })
            .collect(),
    }
}

fn resolve_deviations(params: &BlobParams) -> Result<Vec<f32>, KernelError> {
    let deviations = match &params.cluster_std_list {
        Some(list) => {
            if list.len() != params.n_clusters {
                return Err(KernelError::ClusterStdLengthMismatch {
                    expected: params.n_clusters,
                    actual: list.len(),
                });
            }
            list.clone()
        }
        None => vec![params.cluster_std; params.n_clusters],
    };
    if deviations
        .iter()
        .any(|value| !value.is_finite() || *value < 0.0)
    {
        return Err(KernelError::InvalidFloatParameter {
            parameter: "cluster_std",
        });
    }
    Ok(deviations)
}

#[cfg(test)]
#[expect(
    clippy::float_arithmetic,
    reason = "cluster spread assertions require floating-point arithmetic"
)]
mod tests {
    use super::*;
    use crate::device::{DeviceContext, HostDevice};
    use rstest::{fixture, rstest};

    fn base_params() -> BlobParams {
        BlobParams {
            nrows: 90,
            ncols: 3,
            n_clusters: 3,
            centers: None,
            cluster_std_list: None,
            cluster_std: 1.0,
            shuffle: false,
            center_box_min: -10.0,
            center_box_max: 10.0,
            seed: 1234,
        }
    }

    #[fixture]
    fn params() -> BlobParams {
        base_params()
    }

    #[rstest]
    fn unshuffled_labels_cycle_through_clusters(params: BlobParams) {
        let (data, labels) = generate_blobs(&params).expect("generation must succeed");
        assert_eq!(data.len(), 270);
        assert_eq!(labels.len(), 90);
        for (row, label) in labels.iter().enumerate() {
            assert_eq!(usize::try_from(*label).expect("non-negative"), row % 3);
        }
    }

    #[rstest]
    fn identical_seeds_are_bit_identical(params: BlobParams) {
        let (first_data, first_labels) = generate_blobs(&params).expect("generation");
        let (second_data, second_labels) = generate_blobs(&params).expect("generation");
        assert_eq!(first_labels, second_labels);
        let first_bits: Vec<u32> = first_data.iter().map(|v| v.to_bits()).collect();
        let second_bits: Vec<u32> = second_data.iter().map(|v| v.to_bits()).collect();
        assert_eq!(first_bits, second_bits);
    }

    #[rstest]
    fn different_seeds_change_features(params: BlobParams) {
        let (first, _) = generate_blobs(&params).expect("generation");
        let reseeded = BlobParams { seed: 4321, ..params };
        let (second, _) = generate_blobs(&reseeded).expect("generation");
        assert_ne!(first, second);
    }

    #[rstest]
    fn shuffle_permutes_rows_but_keeps_label_counts(params: BlobParams) {
        let shuffled = BlobParams {
            shuffle: true,
            ..params.clone()
        };
        let (_, plain) = generate_blobs(&params).expect("generation");
        let (_, permuted) = generate_blobs(&shuffled).expect("generation");
        assert_ne!(plain, permuted);
        let mut sorted_plain = plain;
        let mut sorted_permuted = permuted;
        sorted_plain.sort_unstable();
        sorted_permuted.sort_unstable();
        assert_eq!(sorted_plain, sorted_permuted);
    }

    #[rstest]
    fn explicit_centres_and_zero_deviation_are_reproduced(params: BlobParams) {
        let explicit = BlobParams {
            nrows: 4,
            ncols: 2,
            n_clusters: 2,
            centers: Some(vec![1.0, 2.0, -3.0, -4.0]),
            cluster_std_list: Some(vec![0.0, 0.0]),
            ..params
        };
        let (data, labels) = generate_blobs(&explicit).expect("generation");
        assert_eq!(labels, vec![0, 1, 0, 1]);
        assert_eq!(data, vec![1.0, 2.0, -3.0, -4.0, 1.0, 2.0, -3.0, -4.0]);
    }

    #[rstest]
    fn samples_stay_near_their_centres(params: BlobParams) {
        let tight = BlobParams {
            centers: Some(vec![0.0, 0.0, 0.0, 50.0, 50.0, 50.0, -50.0, -50.0, -50.0]),
            cluster_std: 0.5,
            ..params
        };
        let (data, labels) = generate_blobs(&tight).expect("generation");
        for (row, label) in data.chunks(3).zip(&labels) {
            let expected = match *label {
                0 => 0.0,
                1 => 50.0,
                _ => -50.0,
            };
            for value in row {
                assert!((value - expected).abs() < 5.0, "{value} strays from {expected}");
            }
        }
    }

    #[rstest]
    #[case::zero_rows(BlobParams { nrows: 0, ..base_params() }, KernelError::ZeroRows)]
    #[case::zero_columns(BlobParams { ncols: 0, ..base_params() }, KernelError::ZeroColumns)]
    #[case::zero_clusters(BlobParams { n_clusters: 0, ..base_params() }, KernelError::ZeroClusters)]
    #[case::negative_std(
        BlobParams { cluster_std: -1.0, ..base_params() },
        KernelError::InvalidFloatParameter { parameter: "cluster_std" },
    )]
    #[case::empty_box(
        BlobParams { center_box_min: 5.0, center_box_max: 5.0, ..base_params() },
        KernelError::EmptyCenterBox { min: 5.0, max: 5.0 },
    )]
    #[case::centre_count(
        BlobParams { centers: Some(vec![0.0; 4]), ..base_params() },
        KernelError::CentersLengthMismatch { expected: 9, actual: 4 },
    )]
    #[case::std_count(
        BlobParams { cluster_std_list: Some(vec![1.0]), ..base_params() },
        KernelError::ClusterStdLengthMismatch { expected: 3, actual: 1 },
    )]
    #[case::label_overflow(
        BlobParams { nrows: 10, ncols: 1, n_clusters: 3_000_000_000, ..base_params() },
        KernelError::LabelOverflow { cluster: 2_999_999_999 },
    )]
    fn invalid_parameters_are_rejected(#[case] invalid: BlobParams, #[case] expected: KernelError) {
        let err = generate_blobs(&invalid).expect_err("invalid parameters must fail");
        assert_eq!(err, expected);
    }

    #[rstest]
    fn mis_sized_buffers_are_rejected(params: BlobParams) {
        let device = HostDevice::new();
        let stream = device.stream();
        let mut features =
            DeviceBuffer::<f32>::allocate(&device, 10, stream).expect("allocation must succeed");
        let mut labels =
            DeviceBuffer::<i32>::allocate(&device, 90, stream).expect("allocation must succeed");
        let err = HostBlobKernel
            .make_blobs(&mut features, &mut labels, &params, stream)
            .expect_err("mis-sized buffer must fail");
        assert_eq!(
            err,
            KernelError::BufferSizeMismatch {
                buffer: "features",
                expected: 270,
                actual: 10,
            }
        );
        assert_eq!(device.stats().expect("stats").pending_operations, 0);
    }

    #[rstest]
    fn kernel_leaves_copies_pending(params: BlobParams) {
        let device = HostDevice::new();
        let stream = device.stream();
        let mut features =
            DeviceBuffer::<f32>::allocate(&device, 270, stream).expect("allocation must succeed");
        let mut labels =
            DeviceBuffer::<i32>::allocate(&device, 90, stream).expect("allocation must succeed");
        HostBlobKernel
            .make_blobs(&mut features, &mut labels, &params, stream)
            .expect("generation must succeed");
        assert_eq!(device.stats().expect("stats").pending_operations, 2);
    }
}
