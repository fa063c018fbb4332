//! AWS SDK implementation of [`CloudFormation`].
//!
//! The workflow is strictly sequential, so the async SDK is driven from a private
//! current-thread runtime and every call blocks until the provider answers.

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_sdk_cloudformation::Client;
use aws_sdk_cloudformation::config::{Credentials, Region};
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudformation::types::{
    Capability as SdkCapability, OnFailure as SdkOnFailure, Parameter, Stack, Tag,
};
use tokio::runtime::Runtime;
use tracing::{debug, instrument};

use crate::core::types::{
    Capability, OnFailure, StackDescription, StackStatus, TagSet, TemplateSummary,
};
use crate::io::cloudformation::{
    CloudFormation, CreateStackRequest, ProviderError, UpdateStackRequest, UpdateTagsRequest,
};
use crate::io::config::{AwsCredentials, StackTarget};

const CREDENTIALS_PROVIDER_NAME: &str = "cfn-provision-environment";

/// CloudFormation client bound to one region and one set of static credentials.
pub struct AwsCloudFormation {
    runtime: Runtime,
    client: Client,
}

impl AwsCloudFormation {
    pub fn connect(target: &StackTarget, credentials: &AwsCredentials) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("build provider runtime")?;
        let static_credentials = Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER_NAME,
        );
        let sdk_config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(target.region.clone()))
                .credentials_provider(static_credentials)
                .load(),
        );
        debug!(region = %target.region, "created cloudformation client");
        Ok(Self {
            runtime,
            client: Client::new(&sdk_config),
        })
    }
}

impl CloudFormation for AwsCloudFormation {
    #[instrument(skip_all)]
    fn validate_template(&self, template_body: &str) -> Result<TemplateSummary, ProviderError> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .validate_template()
                    .template_body(template_body)
                    .send(),
            )
            .map_err(|err| provider_error("ValidateTemplate", err))?;
        debug!(?output, "validate template response");

        Ok(TemplateSummary {
            description: output.description().map(str::to_string),
            parameter_keys: output
                .parameters()
                .iter()
                .filter_map(|param| param.parameter_key().map(str::to_string))
                .collect(),
            capabilities: output
                .capabilities()
                .iter()
                .map(|capability| capability.as_str().to_string())
                .collect(),
        })
    }

    #[instrument(skip(self))]
    fn describe_stacks(&self, stack_name: &str) -> Result<Vec<StackDescription>, ProviderError> {
        let output = self
            .runtime
            .block_on(self.client.describe_stacks().stack_name(stack_name).send())
            .map_err(|err| provider_error("DescribeStacks", err))?;
        debug!(?output, "describe stacks response");
        Ok(output.stacks().iter().map(describe).collect())
    }

    #[instrument(skip_all, fields(stack_name = %request.stack_name))]
    fn create_stack(&self, request: &CreateStackRequest) -> Result<String, ProviderError> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .create_stack()
                    .stack_name(&request.stack_name)
                    .template_body(&request.template_body)
                    .set_capabilities(Some(sdk_capabilities(&request.capabilities)))
                    .on_failure(sdk_on_failure(request.on_failure))
                    .send(),
            )
            .map_err(|err| provider_error("CreateStack", err))?;
        debug!(?output, "create stack response");
        Ok(output.stack_id().unwrap_or(&request.stack_name).to_string())
    }

    #[instrument(skip_all, fields(stack_name = %request.stack_name))]
    fn update_stack(&self, request: &UpdateStackRequest) -> Result<String, ProviderError> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .update_stack()
                    .stack_name(&request.stack_name)
                    .template_body(&request.template_body)
                    .set_capabilities(Some(sdk_capabilities(&request.capabilities)))
                    .send(),
            )
            .map_err(|err| provider_error("UpdateStack", err))?;
        debug!(?output, "update stack response");
        Ok(output.stack_id().unwrap_or(&request.stack_name).to_string())
    }

    #[instrument(skip_all, fields(stack_name = %request.stack_name))]
    fn update_stack_tags(&self, request: &UpdateTagsRequest) -> Result<String, ProviderError> {
        let tags = sdk_tags(&request.tags)?;
        let parameters = request
            .previous_parameter_keys
            .iter()
            .map(|key| {
                Parameter::builder()
                    .parameter_key(key)
                    .use_previous_value(true)
                    .build()
            })
            .collect();
        let output = self
            .runtime
            .block_on(
                self.client
                    .update_stack()
                    .stack_name(&request.stack_name)
                    .use_previous_template(true)
                    .set_capabilities(Some(sdk_capabilities(&request.capabilities)))
                    .set_parameters(Some(parameters))
                    .set_tags(Some(tags))
                    .send(),
            )
            .map_err(|err| provider_error("UpdateStack", err))?;
        debug!(?output, "update stack tags response");
        Ok(output.stack_id().unwrap_or(&request.stack_name).to_string())
    }
}

fn describe(stack: &Stack) -> StackDescription {
    StackDescription {
        stack_id: stack.stack_id().map(str::to_string),
        stack_name: stack.stack_name().unwrap_or_default().to_string(),
        status: stack
            .stack_status()
            .map(|status| StackStatus::parse(status.as_str()))
            .unwrap_or_else(|| StackStatus::Unknown(String::new())),
        status_reason: stack.stack_status_reason().map(str::to_string),
        tags: stack
            .tags()
            .iter()
            .map(|tag| (tag.key().unwrap_or_default(), tag.value().unwrap_or_default()))
            .collect::<TagSet>(),
        parameter_keys: stack
            .parameters()
            .iter()
            .filter_map(|param| param.parameter_key().map(str::to_string))
            .collect(),
    }
}

fn sdk_capabilities(capabilities: &[Capability]) -> Vec<SdkCapability> {
    capabilities
        .iter()
        .map(|capability| match capability {
            Capability::CapabilityIam => SdkCapability::CapabilityIam,
            Capability::CapabilityNamedIam => SdkCapability::CapabilityNamedIam,
            Capability::CapabilityAutoExpand => SdkCapability::CapabilityAutoExpand,
        })
        .collect()
}

fn sdk_on_failure(on_failure: OnFailure) -> SdkOnFailure {
    match on_failure {
        OnFailure::DoNothing => SdkOnFailure::DoNothing,
        OnFailure::Rollback => SdkOnFailure::Rollback,
        OnFailure::Delete => SdkOnFailure::Delete,
    }
}

fn sdk_tags(tags: &TagSet) -> Result<Vec<Tag>, ProviderError> {
    tags.iter()
        .map(|(key, value)| {
            Ok(Tag::builder().key(key).value(value).build())
        })
        .collect()
}

/// Convert an SDK error, keeping the structured code and the provider's message.
fn provider_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
    let provider_err = ProviderError::new(operation, message);
    match err.code() {
        Some(code) => provider_err.with_code(code),
        None => provider_err,
    }
}
