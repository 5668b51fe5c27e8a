//! Plain-text mail templates.
//!
//! Each template is a Handlebars layout filled with translated fragments.
//! The registry is fixed at construction; rendering does no I/O.

use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::debug;

use crate::error::RenderError;
use crate::localizer::Translator;

/// Templates known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumIter, EnumString)]
pub enum TemplateName {
    #[strum(serialize = "email_verification_text")]
    EmailVerificationText,
    #[strum(serialize = "email_passwordReset_text")]
    PasswordResetText,
}

impl TemplateName {
    /// Catalog section holding the template's fragments.
    fn section(&self) -> &'static str {
        match self {
            TemplateName::EmailVerificationText => "emails.registerMail",
            TemplateName::PasswordResetText => "emails.passwordReset",
        }
    }

    fn layout(&self) -> &'static str {
        match self {
            TemplateName::EmailVerificationText => EMAIL_VERIFICATION_TEXT_TEMPLATE,
            TemplateName::PasswordResetText => PASSWORD_RESET_TEXT_TEMPLATE,
        }
    }
}

/// Params shared by link mails (verification and password reset).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkMailParams {
    pub username: String,
    #[serde(alias = "regUrl")]
    pub registration_url: String,
    pub company_name: String,
}

/// Template engine for mail bodies.
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    /// Create an engine with every [`TemplateName`] registered.
    pub fn new() -> Result<Self, RenderError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);

        for name in TemplateName::iter() {
            handlebars
                .register_template_string(name.as_ref(), name.layout())
                .map_err(|e| {
                    RenderError::InvalidTemplateParams(format!(
                        "Failed to register {}: {}",
                        name, e
                    ))
                })?;
        }

        Ok(Self { handlebars })
    }

    /// Render template `name` in the translator's language.
    pub fn render(
        &self,
        name: &str,
        t: &Translator<'_>,
        params: &Value,
    ) -> Result<String, RenderError> {
        let template = TemplateName::from_str(name)
            .map_err(|_| RenderError::UnknownTemplate(name.to_string()))?;
        self.render_template(template, t, params)
    }

    pub fn render_template(
        &self,
        template: TemplateName,
        t: &Translator<'_>,
        params: &Value,
    ) -> Result<String, RenderError> {
        debug!(template = %template, language = t.language(), "Rendering mail body");

        let params: LinkMailParams = serde_json::from_value(params.clone())
            .map_err(|e| RenderError::InvalidTemplateParams(format!("{}: {}", template, e)))?;
        let vars = json!({
            "username": params.username,
            "companyName": params.company_name,
        });

        let section = template.section();
        let context = json!({
            "greeting": t.t(&format!("{section}.greeting"), &vars)?,
            "intro": t.t(&format!("{section}.intro"), &vars)?,
            "action": t.t(&format!("{section}.action"), &vars)?,
            "url": params.registration_url,
            "ignore": t.t(&format!("{section}.ignore"), &vars)?,
            "closing": t.t("emails.closing", &vars)?,
            "signature": t.t("emails.signature", &vars)?,
        });

        Ok(self.handlebars.render(template.as_ref(), &context)?)
    }
}

// ============================================================================
// Layouts
// ============================================================================

const EMAIL_VERIFICATION_TEXT_TEMPLATE: &str = r#"{{greeting}}

{{intro}}

{{action}}
{{url}}

{{ignore}}

{{closing}}
{{signature}}
"#;

const PASSWORD_RESET_TEXT_TEMPLATE: &str = r#"{{greeting}}

{{intro}}

{{action}}
{{url}}

{{ignore}}

{{closing}}
{{signature}}
"#;
