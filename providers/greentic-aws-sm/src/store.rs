use async_trait::async_trait;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use aws_sdk_secretsmanager::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_secretsmanager::operation::get_secret_value::{
    GetSecretValueError, GetSecretValueOutput,
};
use greentic_secrets_gateway::store::{
    GetSecretRequest, GetSecretResponse, SecretPayload, SecretStore, StoreError,
};

/// [`SecretStore`] backed by one region-bound Secrets Manager client.
#[derive(Clone, Debug)]
pub struct AwsSecretStore {
    client: SecretsManagerClient,
}

impl AwsSecretStore {
    pub fn new(client: SecretsManagerClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &SecretsManagerClient {
        &self.client
    }
}

#[async_trait]
impl SecretStore for AwsSecretStore {
    async fn get_secret_value(
        &self,
        request: &GetSecretRequest,
    ) -> Result<GetSecretResponse, StoreError> {
        let call = self
            .client
            .get_secret_value()
            .secret_id(&request.secret_id)
            .set_version_id(request.version_id.clone())
            .set_version_stage(request.version_stage.clone());
        match call.send().await {
            Ok(output) => Ok(response_from(output)),
            Err(SdkError::ServiceError(context)) => Err(classify_service_error(context.err())),
            Err(err) => Err(StoreError::Other(DisplayErrorContext(&err).to_string())),
        }
    }
}

fn response_from(output: GetSecretValueOutput) -> GetSecretResponse {
    let payload = match (output.secret_string(), output.secret_binary()) {
        (Some(text), _) => Some(SecretPayload::Text(text.to_string())),
        (None, Some(blob)) => Some(SecretPayload::Binary(blob.as_ref().to_vec())),
        (None, None) => None,
    };
    GetSecretResponse {
        payload,
        arn: output.arn().map(str::to_string),
        name: output.name().map(str::to_string),
        version_id: output.version_id().map(str::to_string),
        version_stages: output.version_stages().to_vec(),
    }
}

/// Map a service error onto the closed store failure set.
pub fn classify_service_error(err: &GetSecretValueError) -> StoreError {
    let message = err
        .message()
        .map(str::to_string)
        .or_else(|| err.code().map(str::to_string))
        .unwrap_or_else(|| err.to_string());
    match err {
        GetSecretValueError::ResourceNotFoundException(_) => StoreError::ResourceNotFound(message),
        GetSecretValueError::InvalidRequestException(_) => StoreError::InvalidRequest(message),
        GetSecretValueError::InvalidParameterException(_) => StoreError::InvalidParameter(message),
        GetSecretValueError::DecryptionFailure(_) => StoreError::DecryptionFailure(message),
        GetSecretValueError::InternalServiceError(_) => StoreError::InternalServiceError(message),
        _ => StoreError::Other(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_secretsmanager::error::ErrorMetadata;
    use aws_sdk_secretsmanager::primitives::Blob;
    use aws_sdk_secretsmanager::types::error::{
        DecryptionFailure, InternalServiceError, InvalidParameterException,
        InvalidRequestException, ResourceNotFoundException,
    };
    use greentic_secrets_gateway::store::Disposition;

    #[test]
    fn service_errors_map_to_store_kinds() {
        let not_found = GetSecretValueError::ResourceNotFoundException(
            ResourceNotFoundException::builder()
                .message("Secrets Manager can't find the specified secret.")
                .build(),
        );
        assert_eq!(
            classify_service_error(&not_found),
            StoreError::ResourceNotFound("Secrets Manager can't find the specified secret.".into())
        );

        let invalid = GetSecretValueError::InvalidRequestException(
            InvalidRequestException::builder().message("marked for deletion").build(),
        );
        assert_eq!(
            classify_service_error(&invalid),
            StoreError::InvalidRequest("marked for deletion".into())
        );

        let parameter = GetSecretValueError::InvalidParameterException(
            InvalidParameterException::builder().message("bad stage").build(),
        );
        assert_eq!(
            classify_service_error(&parameter).disposition(),
            Disposition::Permanent
        );

        let decrypt = GetSecretValueError::DecryptionFailure(
            DecryptionFailure::builder().message("kms denied").build(),
        );
        assert_eq!(
            classify_service_error(&decrypt),
            StoreError::DecryptionFailure("kms denied".into())
        );

        let internal = GetSecretValueError::InternalServiceError(
            InternalServiceError::builder().message("try again").build(),
        );
        assert_eq!(
            classify_service_error(&internal).disposition(),
            Disposition::Transient
        );
    }

    #[test]
    fn unmodelled_errors_are_transient() {
        let throttled = GetSecretValueError::generic(
            ErrorMetadata::builder()
                .code("ThrottlingException")
                .message("Rate exceeded")
                .build(),
        );
        assert_eq!(
            classify_service_error(&throttled),
            StoreError::Other("Rate exceeded".into())
        );
    }

    #[test]
    fn output_prefers_string_and_keeps_metadata() {
        let output = GetSecretValueOutput::builder()
            .secret_string("pw")
            .secret_binary(Blob::new(vec![1, 2]))
            .arn("arn:aws:secretsmanager:us-east-1:000000000000:secret:db-AbCdEf")
            .name("db")
            .version_id("v-1")
            .version_stages("AWSCURRENT")
            .version_stages("blue")
            .build();
        let response = response_from(output);

        assert_eq!(response.payload, Some(SecretPayload::Text("pw".into())));
        assert_eq!(response.name.as_deref(), Some("db"));
        assert_eq!(response.version_stages, vec!["AWSCURRENT", "blue"]);

        let binary = response_from(
            GetSecretValueOutput::builder()
                .secret_binary(Blob::new(vec![0xff, 0x00]))
                .build(),
        );
        assert_eq!(binary.payload, Some(SecretPayload::Binary(vec![0xff, 0x00])));
        assert_eq!(binary.arn, None);
        assert!(binary.version_stages.is_empty());
    }
}
