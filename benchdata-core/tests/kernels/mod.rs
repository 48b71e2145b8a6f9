//! Test kernels standing in for the reference blob kernel.

use std::cell::Cell;

use benchdata_core::{
    BlobParams, DeviceBuffer, KernelError, StreamHandle, SyntheticKernel, copy_to_device,
};

/// Fills every feature with `value` and labels rows round-robin.
#[derive(Debug, Default)]
pub struct ConstantKernel {
    pub value: f32,
    pub calls: Cell<usize>,
    pub last_params: Cell<Option<(usize, usize, usize, u64)>>,
}

impl ConstantKernel {
    #[must_use]
    pub fn new(value: f32) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }
}

impl SyntheticKernel for ConstantKernel {
    fn make_blobs(
        &self,
        features: &mut DeviceBuffer<'_, f32>,
        labels: &mut DeviceBuffer<'_, i32>,
        params: &BlobParams,
        stream: StreamHandle,
    ) -> Result<(), KernelError> {
        self.calls.set(self.calls.get() + 1);
        self.last_params.set(Some((
            params.nrows,
            params.ncols,
            params.n_clusters,
            params.seed,
        )));
        let data = vec![self.value; features.len()];
        let classes: Vec<i32> = (0..params.n_clusters)
            .map(|cluster| i32::try_from(cluster).map_err(|_| KernelError::LabelOverflow { cluster }))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .cycle()
            .take(labels.len())
            .collect();
        copy_to_device(features, &data, data.len(), stream)?;
        copy_to_device(labels, &classes, classes.len(), stream)?;
        Ok(())
    }
}
