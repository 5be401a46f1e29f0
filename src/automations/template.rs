// Message templates and personalization
//
// Placeholders are replaced by literal substring substitution. Anything the
// recipient or context cannot supply is left exactly as written.

use std::borrow::Cow;

use serde::Serialize;
use utoipa::ToSchema;

use crate::automations::models::{ActionConfig, ActionType, Automation, ContextEntity, Recipient};

/// Used for `{{name}}` and `{{customer_name}}` when the recipient has no name
const ANONYMOUS_NAME: &str = "there";

const GENERIC_TEMPLATE: &str = "Hi {{name}}, thank you for being a valued client!";

/// Messages used when an automation has no template, keyed by lowercase automation name
const FALLBACK_TEMPLATES: &[(&str, &str)] = &[
    (
        "appointment reminder",
        "Hi {{name}}, this is a reminder of your appointment on {{appointment_date}} at {{appointment_time}}.",
    ),
    (
        "thank you",
        "Hi {{name}}, thank you for visiting us! We hope to see you again soon.",
    ),
    (
        "no-show follow up",
        "Hi {{name}}, we missed you today. Would you like to rebook your appointment?",
    ),
    (
        "win back",
        "Hi {{name}}, it's been a while! We'd love to see you again.",
    ),
    (
        "birthday",
        "Happy birthday, {{name}}! Treat yourself to something special this month.",
    ),
    (
        "rescheduled",
        "Hi {{name}}, your appointment has been moved to {{appointment_date}} at {{appointment_time}}.",
    ),
    (
        "welcome",
        "Welcome, {{name}}! We're glad to have you as a client.",
    ),
    (
        "package expiring",
        "Hi {{name}}, your package expires on {{package_expiry_date}}. Book now to use your remaining sessions.",
    ),
    (
        "visit milestone",
        "Hi {{name}}, thank you for another milestone visit with us!",
    ),
    (
        "client anniversary",
        "Hi {{name}}, happy anniversary! Thank you for another year with us.",
    ),
    (
        "referral thank you",
        "Hi {{name}}, thank you for referring a friend to us!",
    ),
];

/// Subject and body ready to dispatch
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RenderedMessage {
    pub subject: Option<String>,
    pub body: String,
}

/// Template for an automation: its configured one, the fallback for its name, or the generic greeting
pub fn template_for<'a>(automation: &Automation, config: &'a ActionConfig) -> Cow<'a, str> {
    if let Some(template) = config
        .message_template
        .as_deref()
        .filter(|t| !t.trim().is_empty())
    {
        return template.into();
    }

    let name = automation.name.trim().to_lowercase();
    let fallback = FALLBACK_TEMPLATES
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, template)| *template)
        .unwrap_or(GENERIC_TEMPLATE);

    fallback.into()
}

/// First context entity that belongs to the recipient
pub fn context_for<'a>(recipient: &Recipient, context: &'a [ContextEntity]) -> Option<&'a ContextEntity> {
    context
        .iter()
        .find(|entity| entity.customer_id() == recipient.customer_id)
}

/// Replace placeholders in `template` from the recipient and their context entity
pub fn personalize(template: &str, recipient: &Recipient, entity: Option<&ContextEntity>) -> String {
    let name = recipient.name.as_deref().unwrap_or(ANONYMOUS_NAME);

    let mut out = template
        .replace("{{name}}", name)
        .replace("{{customer_name}}", name);

    match entity {
        Some(ContextEntity::Booking(booking)) => {
            out = out
                .replace("{{booking_number}}", &booking.booking_number)
                .replace(
                    "{{appointment_date}}",
                    &booking.scheduled_at.format("%Y-%m-%d").to_string(),
                )
                .replace(
                    "{{appointment_time}}",
                    &booking.scheduled_at.format("%H:%M").to_string(),
                );
        }
        Some(ContextEntity::Package(package)) => {
            out = out
                .replace(
                    "{{package_expiry_date}}",
                    &package.expires_at.format("%Y-%m-%d").to_string(),
                )
                .replace("{{package_name}}", &package.name);
        }
        Some(ContextEntity::Client(_)) | Some(ContextEntity::Referral(_)) | None => {}
    }

    out
}

/// Render subject and body for one recipient
pub fn render_message(
    automation: &Automation,
    action: ActionType,
    config: &ActionConfig,
    recipient: &Recipient,
    context: &[ContextEntity],
) -> RenderedMessage {
    let entity = context_for(recipient, context);
    let body = personalize(&template_for(automation, config), recipient, entity);

    let subject = match config.subject.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(subject) => Some(personalize(subject, recipient, entity)),
        None if action == ActionType::Email => Some(automation.name.clone()),
        None => None,
    };

    RenderedMessage { subject, body }
}
