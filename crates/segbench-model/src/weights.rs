//! Loading trained weights into the models.
//!
//! Burn MessagePack records (`.mpk`) are always supported. PyTorch pickles
//! (`.pt`, `.pth`) and safetensors files need the `pretrained` feature.

use std::path::Path;

use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::backend::Backend,
};
#[cfg(feature = "pretrained")]
use burn::record::Recorder;
#[cfg(feature = "pretrained")]
use burn_import::{
    pytorch::{LoadArgs as PyTorchLoadArgs, PyTorchFileRecorder},
    safetensors::{LoadArgs as SafetensorsLoadArgs, SafetensorsFileRecorder},
};

use crate::error::{ModelError, ModelResult};

/// Loads the record stored at `path` into `module`, chosen by file extension.
///
/// # Errors
///
/// Returns [`ModelError::WeightLoadingFailed`] for unknown extensions, for
/// formats that need the `pretrained` feature when it is disabled and when the
/// recorder cannot read the file.
pub fn load_weights<B: Backend, M: Module<B>>(
    module: M,
    path: &Path,
    device: &B::Device,
) -> ModelResult<M> {
    let failed = |reason: String| ModelError::WeightLoadingFailed {
        path: path.to_path_buf(),
        reason,
    };
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    tracing::info!(path = %path.display(), format = %extension, "loading weights");

    match extension.as_str() {
        "mpk" => {
            let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
            module
                .load_file(path.to_path_buf(), &recorder, device)
                .map_err(|e| failed(format!("MessagePack record loading failed: {e}")))
        }
        #[cfg(feature = "pretrained")]
        "pt" | "pth" => {
            let recorder = PyTorchFileRecorder::<FullPrecisionSettings>::default();
            let record = recorder
                .load(PyTorchLoadArgs::new(path.to_path_buf()), device)
                .map_err(|e| failed(format!("PyTorch record loading failed: {e}")))?;
            Ok(module.load_record(record))
        }
        #[cfg(feature = "pretrained")]
        "safetensors" => {
            let recorder = SafetensorsFileRecorder::<FullPrecisionSettings>::default();
            let record = recorder
                .load(SafetensorsLoadArgs::new(path.to_path_buf()), device)
                .map_err(|e| failed(format!("Safetensors record loading failed: {e}")))?;
            Ok(module.load_record(record))
        }
        #[cfg(not(feature = "pretrained"))]
        "pt" | "pth" | "safetensors" => Err(failed(
            "loading PyTorch or safetensors weights requires the `pretrained` feature".to_string(),
        )),
        other => Err(failed(format!("unsupported weight file extension '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use burn::{
        nn::conv::{Conv2d, Conv2dConfig},
        prelude::*,
    };

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn mpk_weights_round_trip() {
        let device = Default::default();
        let path = std::env::temp_dir().join(format!("segbench-weights-{}", std::process::id()));
        let saved: Conv2d<TestBackend> = Conv2dConfig::new([2, 3], [3, 3]).init(&device);
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        saved
            .clone()
            .save_file(path.clone(), &recorder)
            .unwrap();

        let fresh: Conv2d<TestBackend> = Conv2dConfig::new([2, 3], [3, 3]).init(&device);
        let loaded = load_weights(fresh, &path.with_extension("mpk"), &device).unwrap();

        assert_eq!(
            loaded.weight.val().into_data().to_vec::<f32>().unwrap(),
            saved.weight.val().into_data().to_vec::<f32>().unwrap()
        );
        let _ = std::fs::remove_file(path.with_extension("mpk"));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let device = Default::default();
        let conv: Conv2d<TestBackend> = Conv2dConfig::new([1, 1], [1, 1]).init(&device);

        let result = load_weights(conv, Path::new("weights.onnx"), &device);

        assert!(matches!(
            result,
            Err(ModelError::WeightLoadingFailed { .. })
        ));
    }
}
