//! Data Pipeline: pipeline definitions.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::ProviderError;
use crate::retry::{retry, RetryError, RetryPolicy};

/// Time allowed for a definition to pass validation.
pub const DEFINITION_OPERATION_TIMEOUT: Duration = Duration::from_secs(4 * 60);

/// Error code for a transient service failure.
pub const ERR_INTERNAL_SERVICE_ERROR: &str = "InternalServiceError";
/// Error code for a pipeline that does not exist.
pub const ERR_PIPELINE_NOT_FOUND: &str = "PipelineNotFoundException";
/// Error code for a pipeline that has been deleted.
pub const ERR_PIPELINE_DELETED: &str = "PipelineDeletedException";

/// A key/value field of a pipeline object. Exactly one of the values is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineField {
    pub key: String,
    #[serde(default)]
    pub string_value: Option<String>,
    #[serde(default)]
    pub ref_value: Option<String>,
}

/// An object in a pipeline definition, such as an activity or schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<PipelineField>,
}

/// An attribute of a parameter object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterAttribute {
    pub key: String,
    pub string_value: String,
}

/// A parameter declared by a definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterObject {
    pub id: String,
    #[serde(default)]
    pub attributes: Vec<ParameterAttribute>,
}

/// A value bound to a declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterValue {
    pub id: String,
    pub string_value: String,
}

/// The objects and parameters making up a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub pipeline_objects: Vec<PipelineObject>,
    #[serde(default)]
    pub parameter_objects: Vec<ParameterObject>,
    #[serde(default)]
    pub parameter_values: Vec<ParameterValue>,
}

impl PipelineDefinition {
    /// Check the definition locally before sending it.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.pipeline_objects.is_empty() {
            return Err(ProviderError::Validation(
                "pipeline_objects must contain at least one object".to_string(),
            ));
        }
        for field in self.pipeline_objects.iter().flat_map(|o| &o.fields) {
            if field.string_value.is_some() == field.ref_value.is_some() {
                return Err(ProviderError::Validation(format!(
                    "field {:?} must set exactly one of string_value and ref_value",
                    field.key
                )));
            }
        }
        Ok(())
    }
}

/// Validation problems the service found in one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub id: String,
    pub errors: Vec<String>,
}

/// Result of submitting a definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutPipelineDefinitionOutput {
    pub errored: bool,
    #[serde(default)]
    pub validation_errors: Vec<ValidationError>,
}

/// The Data Pipeline calls used by this module.
#[async_trait]
pub trait DataPipelineApi: Send + Sync {
    /// Submit a definition. Validation failures are reported in the output,
    /// not as an error.
    async fn put_pipeline_definition(
        &self,
        pipeline_id: &str,
        definition: &PipelineDefinition,
    ) -> Result<PutPipelineDefinitionOutput, ProviderError>;

    /// Get the current definition.
    async fn get_pipeline_definition(
        &self,
        pipeline_id: &str,
    ) -> Result<PipelineDefinition, ProviderError>;

    /// Activate a pipeline.
    async fn activate_pipeline(&self, pipeline_id: &str) -> Result<(), ProviderError>;
}

/// Render validation errors as one message.
pub fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("id: {}, error: {:?}", e.id, e.errors))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Submit a definition and activate the pipeline.
///
/// Retries while the service fails internally and while validation
/// complains about the pipeline's IAM role, which may still be
/// propagating. Any other validation error fails the call.
#[instrument(skip(api, definition))]
pub async fn put_pipeline_definition(
    api: &dyn DataPipelineApi,
    pipeline_id: &str,
    definition: &PipelineDefinition,
) -> Result<(), ProviderError> {
    definition.validate()?;

    let output = retry(RetryPolicy::new(DEFINITION_OPERATION_TIMEOUT), move || async move {
        let output = api
            .put_pipeline_definition(pipeline_id, definition)
            .await
            .map_err(|e| RetryError::on_code(e, ERR_INTERNAL_SERVICE_ERROR))?;

        if output.errored {
            let errors = format_validation_errors(&output.validation_errors);
            if errors.contains("role") {
                return Err(RetryError::Retryable(ProviderError::Validation(format!(
                    "error validating after creation DataPipeline Definition ({}): {}",
                    pipeline_id, errors
                ))));
            }
        }
        Ok(output)
    })
    .await?;

    if output.errored {
        return Err(ProviderError::Validation(format!(
            "error validating after creation DataPipeline Definition ({}): {}",
            pipeline_id,
            format_validation_errors(&output.validation_errors)
        )));
    }

    api.activate_pipeline(pipeline_id).await?;
    info!(pipeline_id = %pipeline_id, "pipeline definition applied and activated");
    Ok(())
}

/// Read a pipeline's definition; `None` when the pipeline is gone.
#[instrument(skip(api))]
pub async fn read_pipeline_definition(
    api: &dyn DataPipelineApi,
    pipeline_id: &str,
) -> Result<Option<PipelineDefinition>, ProviderError> {
    match api.get_pipeline_definition(pipeline_id).await {
        Ok(definition) => Ok(Some(definition)),
        Err(err) if err.is_code(ERR_PIPELINE_NOT_FOUND) || err.is_code(ERR_PIPELINE_DELETED) => {
            warn!(pipeline_id = %pipeline_id, "DataPipeline Definition not found, removing from state");
            Ok(None)
        },
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeDataPipeline {
        puts: Mutex<VecDeque<Result<PutPipelineDefinitionOutput, ProviderError>>>,
        put_calls: Mutex<u32>,
        activated: Mutex<bool>,
        stored: Mutex<Option<PipelineDefinition>>,
    }

    #[async_trait]
    impl DataPipelineApi for FakeDataPipeline {
        async fn put_pipeline_definition(
            &self,
            _pipeline_id: &str,
            definition: &PipelineDefinition,
        ) -> Result<PutPipelineDefinitionOutput, ProviderError> {
            *self.put_calls.lock().unwrap() += 1;
            let output = self
                .puts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(PutPipelineDefinitionOutput::default()))?;
            if !output.errored {
                *self.stored.lock().unwrap() = Some(definition.clone());
            }
            Ok(output)
        }

        async fn get_pipeline_definition(
            &self,
            _pipeline_id: &str,
        ) -> Result<PipelineDefinition, ProviderError> {
            self.stored
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| ProviderError::api(ERR_PIPELINE_NOT_FOUND, "no pipeline"))
        }

        async fn activate_pipeline(&self, _pipeline_id: &str) -> Result<(), ProviderError> {
            *self.activated.lock().unwrap() = true;
            Ok(())
        }
    }

    fn definition() -> PipelineDefinition {
        serde_json::from_value(serde_json::json!({
            "pipeline_objects": [
                {
                    "id": "Default",
                    "name": "Default",
                    "fields": [
                        {"key": "workerGroup", "string_value": "workerGroup"},
                        {"key": "role", "string_value": "DataPipelineDefaultRole"}
                    ]
                },
                {
                    "id": "Schedule",
                    "name": "Schedule",
                    "fields": [{"key": "startAt", "string_value": "FIRST_ACTIVATION_DATE_TIME"}]
                }
            ],
            "parameter_values": [{"id": "myS3Bucket", "string_value": "bucket"}]
        }))
        .unwrap()
    }

    fn errored(message: &str) -> Result<PutPipelineDefinitionOutput, ProviderError> {
        Ok(PutPipelineDefinitionOutput {
            errored: true,
            validation_errors: vec![ValidationError {
                id: "Default".to_string(),
                errors: vec![message.to_string()],
            }],
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_and_activate() {
        let api = FakeDataPipeline::default();

        put_pipeline_definition(&api, "df-1234", &definition()).await.unwrap();

        assert!(*api.activated.lock().unwrap());
        let stored = read_pipeline_definition(&api, "df-1234").await.unwrap().unwrap();
        assert_eq!(stored, definition());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_internal_errors_and_role_propagation() {
        let api = FakeDataPipeline::default();
        api.puts.lock().unwrap().extend([
            Err(ProviderError::api(ERR_INTERNAL_SERVICE_ERROR, "try again")),
            errored("'role' does not have sufficient permissions"),
        ]);

        put_pipeline_definition(&api, "df-1234", &definition()).await.unwrap();

        assert_eq!(*api.put_calls.lock().unwrap(), 3);
        assert!(*api.activated.lock().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_validation_errors_fail() {
        let api = FakeDataPipeline::default();
        api.puts
            .lock()
            .unwrap()
            .push_back(errored("missing required field 'schedule'"));

        let err = put_pipeline_definition(&api, "df-1234", &definition())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(err.to_string().contains("missing required field"));
        assert_eq!(*api.put_calls.lock().unwrap(), 1);
        assert!(!*api.activated.lock().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_role_never_propagates() {
        let api = FakeDataPipeline::default();
        *api.puts.lock().unwrap() = std::iter::repeat_with(|| errored("invalid role"))
            .take(1000)
            .collect();

        let err = put_pipeline_definition(&api, "df-1234", &definition())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(err.to_string().contains("invalid role"));
        assert!(!*api.activated.lock().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_missing_pipeline() {
        let api = FakeDataPipeline::default();
        assert_eq!(read_pipeline_definition(&api, "df-404").await.unwrap(), None);
    }

    #[test]
    fn test_definition_validation() {
        assert!(definition().validate().is_ok());
        assert!(PipelineDefinition::default().validate().is_err());

        let mut bad = definition();
        bad.pipeline_objects[0].fields[0].ref_value = Some("Schedule".to_string());
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_format_validation_errors() {
        let errors = vec![
            ValidationError {
                id: "Default".to_string(),
                errors: vec!["a".to_string(), "b".to_string()],
            },
            ValidationError {
                id: "Schedule".to_string(),
                errors: vec!["c".to_string()],
            },
        ];
        assert_eq!(
            format_validation_errors(&errors),
            r#"id: Default, error: ["a", "b"]; id: Schedule, error: ["c"]"#
        );
    }
}
