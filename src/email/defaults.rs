use crate::error::PortalError;
use crate::store::db_interfaces::PortalDb;
use crate::store::models::{EmailTemplate, EMAIL_TEMPLATES, GLOBAL_SCOPE};
use crate::templating::{MergeData, TemplateString};
use log::info;
use serde::{Deserialize, Serialize};

pub const LOCATION_WELCOME: &str = "location_welcome";
pub const USER_INVITE: &str = "user_invite";
pub const CUSTOMER_ASSESSMENT_BOOKED: &str = "customer_assessment_booked";
pub const PARTNER_BOOKING_CONFIRMATION: &str = "partner_booking_confirmation";
pub const PARTNER_NEW_LEAD: &str = "partner_new_lead";
pub const PARTNER_VIP_LIST_ENQUIRY: &str = "partner_vip_list_enquiry";
pub const CUSTOMER_VIP_LIST_CONFIRMATION: &str = "customer_vip_list_confirmation";
pub const PARTNER_COMING_SOON_ENQUIRY: &str = "partner_coming_soon_enquiry";
pub const CUSTOMER_COMING_SOON_CONFIRMATION: &str = "customer_coming_soon_confirmation";
pub const PARTNER_TEMPORARY_CLOSED_ENQUIRY: &str = "partner_temporary_closed_enquiry";
pub const PARTNER_GENERAL_ENQUIRY: &str = "partner_general_enquiry";
pub const CUSTOMER_ENQUIRY_CONFIRMATION: &str = "customer_enquiry_confirmation";
pub const SESSION_RESCHEDULED: &str = "session_rescheduled";
pub const SESSION_CANCELLED: &str = "session_cancelled";

struct DefaultTemplate {
    key: &'static str,
    category: &'static str,
    subject: &'static str,
    header_title: &'static str,
    header_subtitle: &'static str,
    body: &'static str,
}

const DEFAULT_TEMPLATES: &[DefaultTemplate] = &[
    DefaultTemplate {
        key: LOCATION_WELCOME,
        category: "onboarding",
        subject: "Welcome to the portal, {{locationName}}!",
        header_title: "Welcome aboard",
        header_subtitle: "{{locationName}}",
        body: "<p>Hi {{name}},</p>\
<p>Your location <strong>{{locationName}}</strong> is now set up in the franchise portal.</p>\
<p>Sign in at <a href=\"{{portalUrl}}\">{{portalUrl}}</a> to finish your profile and connect payments.</p>",
    },
    DefaultTemplate {
        key: USER_INVITE,
        category: "onboarding",
        subject: "You've been invited to join {{locationName}}",
        header_title: "You're invited",
        header_subtitle: "",
        body: "<p>Hi {{name}},</p>\
<p>{{inviterName}} has invited you to the franchise portal as <strong>{{role}}</strong>.</p>\
<p><a href=\"{{inviteLink}}\">Accept your invitation</a></p>",
    },
    DefaultTemplate {
        key: CUSTOMER_ASSESSMENT_BOOKED,
        category: "bookings",
        subject: "Your assessment at {{locationName}} is booked (Ref {{bookingReference}})",
        header_title: "Booking confirmed",
        header_subtitle: "{{bookingDate}} at {{bookingTime}}",
        body: "<p>Hi {{customerName}},</p>\
<p>Thanks for booking an assessment for {{childName}} at <strong>{{locationName}}</strong>.</p>\
<p>Reference: <strong>{{bookingReference}}</strong><br>Date: {{bookingDate}}<br>Time: {{bookingTime}}<br>Address: {{locationAddress}}</p>\
<p>Questions? Call us on {{locationPhone}}.</p>",
    },
    DefaultTemplate {
        key: PARTNER_BOOKING_CONFIRMATION,
        category: "bookings",
        subject: "New assessment booking {{bookingReference}}",
        header_title: "New booking",
        header_subtitle: "{{bookingDate}} at {{bookingTime}}",
        body: "<p>{{customerName}} booked an assessment for {{childName}} ({{childAge}}).</p>\
<p>Email: {{customerEmail}}<br>Phone: {{customerPhone}}<br>Notes: {{notes}}</p>",
    },
    DefaultTemplate {
        key: PARTNER_NEW_LEAD,
        category: "leads",
        subject: "New lead: {{customerName}}",
        header_title: "New lead",
        header_subtitle: "{{locationName}}",
        body: "<p>A new lead came in through an assessment booking.</p>\
<p>Name: {{customerName}}<br>Email: {{customerEmail}}<br>Phone: {{customerPhone}}<br>Child: {{childName}}</p>",
    },
    DefaultTemplate {
        key: PARTNER_VIP_LIST_ENQUIRY,
        category: "enquiries",
        subject: "New {{formType}} sign-up: {{name}}",
        header_title: "{{formType}}",
        header_subtitle: "{{locationName}}",
        body: "<p>{{name}} joined the VIP list.</p><p>Email: {{email}}<br>Phone: {{phone}}</p><p>{{enquiryMessage}}</p>",
    },
    DefaultTemplate {
        key: CUSTOMER_VIP_LIST_CONFIRMATION,
        category: "enquiries",
        subject: "You're on the VIP list for {{locationName}}",
        header_title: "You're on the list",
        header_subtitle: "",
        body: "<p>Hi {{name}},</p><p>Thanks for joining the VIP list for {{locationName}}. We'll be in touch soon.</p>",
    },
    DefaultTemplate {
        key: PARTNER_COMING_SOON_ENQUIRY,
        category: "enquiries",
        subject: "New {{formType}} enquiry: {{name}}",
        header_title: "{{formType}}",
        header_subtitle: "{{locationName}}",
        body: "<p>{{name}} registered interest before opening.</p><p>Email: {{email}}<br>Phone: {{phone}}</p><p>{{enquiryMessage}}</p>",
    },
    DefaultTemplate {
        key: CUSTOMER_COMING_SOON_CONFIRMATION,
        category: "enquiries",
        subject: "{{locationName}} is coming soon",
        header_title: "Thanks for your interest",
        header_subtitle: "",
        body: "<p>Hi {{name}},</p><p>We'll let you know as soon as {{locationName}} opens.</p>",
    },
    DefaultTemplate {
        key: PARTNER_TEMPORARY_CLOSED_ENQUIRY,
        category: "enquiries",
        subject: "New {{formType}} enquiry: {{name}}",
        header_title: "{{formType}}",
        header_subtitle: "{{locationName}}",
        body: "<p>{{name}} enquired while the location is temporarily closed.</p><p>Email: {{email}}<br>Phone: {{phone}}</p><p>{{enquiryMessage}}</p>",
    },
    DefaultTemplate {
        key: PARTNER_GENERAL_ENQUIRY,
        category: "enquiries",
        subject: "New {{formType}}: {{name}}",
        header_title: "{{formType}}",
        header_subtitle: "{{locationName}}",
        body: "<p>{{name}} sent an enquiry.</p><p>Email: {{email}}<br>Phone: {{phone}}</p><p>{{enquiryMessage}}</p>",
    },
    DefaultTemplate {
        key: CUSTOMER_ENQUIRY_CONFIRMATION,
        category: "enquiries",
        subject: "We received your enquiry",
        header_title: "Thanks for getting in touch",
        header_subtitle: "",
        body: "<p>Hi {{name}},</p><p>{{locationName}} has received your enquiry and will reply shortly.</p>",
    },
    DefaultTemplate {
        key: SESSION_RESCHEDULED,
        category: "sessions",
        subject: "{{className}} has moved to {{sessionDate}}",
        header_title: "Session rescheduled",
        header_subtitle: "{{locationName}}",
        body: "<p>Hi {{name}},</p><p>{{className}} previously on {{previousDate}} at {{previousTime}} is now on <strong>{{sessionDate}} at {{sessionTime}}</strong>.</p>",
    },
    DefaultTemplate {
        key: SESSION_CANCELLED,
        category: "sessions",
        subject: "{{className}} on {{sessionDate}} is cancelled",
        header_title: "Session cancelled",
        header_subtitle: "{{locationName}}",
        body: "<p>Hi {{name}},</p><p>Unfortunately {{className}} on {{sessionDate}} at {{sessionTime}} has been cancelled.</p>",
    },
];

pub fn default_template_keys() -> Vec<&'static str> {
    DEFAULT_TEMPLATES.iter().map(|t| t.key).collect()
}

fn build_template(default: &DefaultTemplate, now: &str) -> EmailTemplate {
    let subject = TemplateString::from(default.subject);
    let body = TemplateString::from(default.body);
    let mut merge_tags = subject.merge_tags();
    for tag in body.merge_tags() {
        if !merge_tags.contains(&tag) {
            merge_tags.push(tag);
        }
    }
    EmailTemplate {
        key: default.key.to_string(),
        scope: GLOBAL_SCOPE.to_string(),
        enabled: true,
        subject,
        body,
        header_title: default.header_title.to_string(),
        header_subtitle: default.header_subtitle.to_string(),
        header_bg: String::new(),
        merge_tags,
        category: default.category.to_string(),
        created_at: Some(now.to_string()),
        updated_at: Some(now.to_string()),
    }
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SeedReport {
    pub created: Vec<String>,
    pub overwritten: Vec<String>,
    pub skipped: Vec<String>,
}

pub async fn seed_default_templates(
    db: &dyn PortalDb,
    overwrite: bool,
) -> Result<SeedReport, PortalError> {
    let now = chrono::Utc::now().to_rfc3339();
    let mut report = SeedReport::default();

    for default in DEFAULT_TEMPLATES {
        let exists = db.get_document(EMAIL_TEMPLATES, default.key).await?.is_some();
        if exists && !overwrite {
            report.skipped.push(default.key.to_string());
            continue;
        }
        let template = build_template(default, &now);
        db.set_document(EMAIL_TEMPLATES, default.key, &serde_json::to_value(&template)?)
            .await?;
        if exists {
            report.overwritten.push(default.key.to_string());
        } else {
            report.created.push(default.key.to_string());
        }
    }

    info!(
        "Seeded email templates: {} created, {} overwritten, {} skipped",
        report.created.len(),
        report.overwritten.len(),
        report.skipped.len()
    );
    Ok(report)
}

/// Placeholder values for operator test sends. Values supplied by the
/// operator take precedence.
pub fn sample_merge_data(overrides: &serde_json::Value) -> MergeData {
    let mut data = MergeData::new()
        .with("name", "Sam Sample")
        .with("firstName", "Sam")
        .with("lastName", "Sample")
        .with("email", "sam@example.com")
        .with("phone", "0400 000 000")
        .with("customerName", "Sam Sample")
        .with("customerEmail", "sam@example.com")
        .with("customerPhone", "0400 000 000")
        .with("parentName", "Sam Sample")
        .with("childName", "Riley")
        .with("childAge", "6")
        .with("locationName", "Sample Location")
        .with("locationEmail", "location@example.com")
        .with("locationPhone", "02 9000 0000")
        .with("locationAddress", "1 Sample Street")
        .with("bookingReference", "SAMPLE01")
        .with("bookingDate", "Monday, 1 January 2024")
        .with("bookingTime", "9:30 AM")
        .with("className", "Beginners")
        .with("sessionDate", "Monday, 8 January 2024")
        .with("sessionTime", "4:00 PM")
        .with("previousDate", "Monday, 1 January 2024")
        .with("previousTime", "4:00 PM")
        .with("formType", "General Enquiry")
        .with("role", "franchise partner")
        .with("inviterName", "Head Office");
    data.extend(&MergeData::for_test_send(overrides));
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryDb;

    #[tokio::test]
    async fn seeds_every_default_once() {
        let db = MemoryDb::new();
        let first = seed_default_templates(&db, false).await.unwrap();
        assert_eq!(first.created.len(), DEFAULT_TEMPLATES.len());

        let second = seed_default_templates(&db, false).await.unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.skipped.len(), DEFAULT_TEMPLATES.len());
    }

    #[tokio::test]
    async fn overwrite_replaces_existing_templates() {
        let db = MemoryDb::new();
        db.set_document(
            EMAIL_TEMPLATES,
            LOCATION_WELCOME,
            &serde_json::json!({"subject": "custom"}),
        )
        .await
        .unwrap();
        let report = seed_default_templates(&db, true).await.unwrap();
        assert_eq!(report.overwritten, vec![LOCATION_WELCOME.to_string()]);

        let doc = db
            .get_document(EMAIL_TEMPLATES, LOCATION_WELCOME)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(doc["subject"], "custom");
    }

    #[test]
    fn defaults_only_use_recognized_tags() {
        for default in DEFAULT_TEMPLATES {
            for text in [default.subject, default.body, default.header_title, default.header_subtitle] {
                let rendered = crate::templating::render(text, &MergeData::new());
                assert!(!rendered.contains("{{"), "{} has an unknown tag", default.key);
            }
        }
    }

    #[test]
    fn merge_tags_are_collected() {
        let template = build_template(&DEFAULT_TEMPLATES[0], "now");
        assert!(template.merge_tags.contains(&"locationName".to_string()));
        assert!(template.merge_tags.contains(&"portalUrl".to_string()));
    }
}
