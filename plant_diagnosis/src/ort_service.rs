use crate::{
    classifier::{ClassProbabilities, ClassifierError, ClassifierPort},
    preprocess::Tensor,
    settings::{ExecutionProvider, ModelSettings},
};
use ndarray::Axis;
use ort::{
    execution_providers::CUDAExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

/// ONNX Runtime backed classifier. Loaded once at startup; a load that fails
/// for any reason is returned as an error and no instance exists.
pub struct OrtClassifier {
    sessions: Vec<Mutex<Session>>,
    counter: AtomicUsize,
    output_name: String,
}

impl OrtClassifier {
    pub fn new(
        model_config: &ModelSettings,
        img_size: usize,
        class_count: usize,
    ) -> Result<Self, ClassifierError> {
        let model_path = model_config.get_model_path();
        if !model_path.exists() {
            return Err(ClassifierError::ModelNotFound(format!("{:?}", model_path)));
        }

        let providers = match model_config.execution_provider {
            ExecutionProvider::Cuda => vec![CUDAExecutionProvider::default().build()],
            ExecutionProvider::Cpu => vec![],
        };
        tracing::info!(
            "Requested {:?} execution provider, CPU remains the fallback",
            model_config.execution_provider
        );

        let num_instances = model_config.num_instances.max(1);
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_execution_providers(providers.clone())?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(&model_path)?;
                Ok(session)
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        let declared = sessions
            .first()
            .map(|session| {
                session
                    .outputs
                    .iter()
                    .map(|output| output.name.clone())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let output_name = resolve_output_name(&declared, &model_config.output_name)
            .ok_or_else(|| ClassifierError::MissingOutput(model_config.output_name.clone()))?;

        tracing::info!(
            "Created {} ONNX sessions from {:?}, reading output '{}'",
            num_instances,
            model_path,
            output_name
        );

        let classifier = Self {
            sessions: sessions.into_iter().map(Mutex::new).collect(),
            counter: AtomicUsize::new(0),
            output_name,
        };

        let warmup = classifier.classify(&Tensor::zeros(img_size))?;
        if warmup.len() != class_count {
            return Err(ClassifierError::OutputShapeMismatch {
                expected: class_count,
                got: warmup.len(),
            });
        }

        Ok(classifier)
    }
}

impl ClassifierPort for OrtClassifier {
    fn classify(&self, tensor: &Tensor) -> Result<ClassProbabilities, ClassifierError> {
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| ClassifierError::SessionPoisoned(e.to_string()))?;

        tracing::debug!("Handling request with session {}", index);
        let batch = tensor.view().insert_axis(Axis(0));
        let owned_buffer;
        let batch = if batch.is_standard_layout() {
            batch
        } else {
            owned_buffer = batch.to_owned();
            owned_buffer.view()
        };

        let input = TensorRef::from_array_view(batch)?;
        let outputs = session.run(ort::inputs![input])?;
        // The name was resolved against the graph's declared outputs at load time.
        let (_, logits) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
        if logits.is_empty() {
            return Err(ClassifierError::EmptyOutput);
        }

        Ok(ClassProbabilities::from_logits(logits))
    }
}

/// Logits live either under a named output or as the graph's only output.
fn resolve_output_name(declared: &[String], preferred: &str) -> Option<String> {
    declared
        .iter()
        .find(|name| name.as_str() == preferred)
        .or_else(|| declared.first())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ModelSettings;
    use std::path::PathBuf;

    #[test]
    fn test_resolve_named_output() {
        let declared = vec!["features".to_string(), "logits".to_string()];
        assert_eq!(
            resolve_output_name(&declared, "logits"),
            Some("logits".to_string())
        );
    }

    #[test]
    fn test_resolve_plain_output() {
        let declared = vec!["output0".to_string()];
        assert_eq!(
            resolve_output_name(&declared, "logits"),
            Some("output0".to_string())
        );
        assert_eq!(resolve_output_name(&[], "logits"), None);
    }

    #[test]
    fn test_missing_checkpoint_fails_fast() {
        let settings = ModelSettings {
            onnx_file: "model_best.onnx".to_string(),
            model_dir: PathBuf::from("./no_such_checkpoints"),
            num_instances: 1,
            output_name: "logits".to_string(),
            execution_provider: ExecutionProvider::Cpu,
        };

        let result = OrtClassifier::new(&settings, 224, 15);
        assert!(matches!(result, Err(ClassifierError::ModelNotFound(_))));
    }
}
