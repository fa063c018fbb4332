//! Remote template check, the gate before any stack mutation.

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::types::{CAPABILITY_GRANT, TemplateSummary};
use crate::io::clock::Clock;
use crate::io::cloudformation::CloudFormation;
use crate::io::template::Template;
use crate::progress::ProvisionEvent;
use crate::session::Session;

/// Submit `template` to the provider's validation endpoint.
///
/// Any rejection is returned as an error carrying the provider's message; a template
/// cannot be repaired programmatically, so callers abort.
#[instrument(skip_all, fields(template = %template.source.display()))]
pub fn validate_template<C: CloudFormation, K: Clock>(
    session: &Session<'_, C, K>,
    template: &Template,
) -> Result<TemplateSummary> {
    session.emit(ProvisionEvent::ValidatingTemplate);
    let summary = session
        .cfn
        .validate_template(&template.body)
        .with_context(|| {
            format!(
                "malformed or invalid template or properties in {}",
                template.source.display()
            )
        })?;

    for required in &summary.capabilities {
        if !CAPABILITY_GRANT
            .iter()
            .any(|granted| granted.as_str() == required.as_str())
        {
            warn!(capability = %required, "template requires a capability that is not granted");
        }
    }

    info!(parameters = summary.parameter_keys.len(), "template validated");
    session.emit(ProvisionEvent::TemplateValidated);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::cloudformation::ProviderError;
    use crate::test_support::{Call, EventLog, FakeClock, ScriptedCloudFormation, template_error};

    fn template() -> Template {
        Template::from_body("stack.template", "Resources: {}\n").expect("template")
    }

    #[test]
    fn valid_template_passes_gate() {
        let cfn = ScriptedCloudFormation::new().validate_ok();
        let clock = FakeClock::new();
        let log = EventLog::default();
        let sink = |event: &ProvisionEvent| log.record(event);
        let session = Session::new(&cfn, &clock).with_events(&sink);

        validate_template(&session, &template()).expect("valid");

        assert_eq!(
            cfn.calls(),
            vec![Call::ValidateTemplate("Resources: {}\n".to_string())]
        );
        assert_eq!(
            log.events(),
            vec![
                ProvisionEvent::ValidatingTemplate,
                ProvisionEvent::TemplateValidated
            ]
        );
    }

    #[test]
    fn rejected_template_surfaces_provider_message() {
        let cfn = ScriptedCloudFormation::new().validate_err(template_error());
        let clock = FakeClock::new();
        let session = Session::new(&cfn, &clock);

        let err = validate_template(&session, &template()).expect_err("invalid");

        let rendered = format!("{err:#}");
        assert!(rendered.contains("malformed or invalid template"));
        assert!(rendered.contains("Unresolved resource dependencies [Bucket]"));
        let provider = err.downcast_ref::<ProviderError>().expect("provider error");
        assert_eq!(provider.operation, "ValidateTemplate");
        assert_eq!(cfn.calls().len(), 1);
    }
}
