use crate::email::defaults::{
    CUSTOMER_COMING_SOON_CONFIRMATION, CUSTOMER_ENQUIRY_CONFIRMATION,
    CUSTOMER_VIP_LIST_CONFIRMATION, PARTNER_COMING_SOON_ENQUIRY, PARTNER_GENERAL_ENQUIRY,
    PARTNER_TEMPORARY_CLOSED_ENQUIRY, PARTNER_VIP_LIST_ENQUIRY,
};
use crate::email::EmailRequest;
use crate::notifications::{json_text, location_merge_data, present, Notifier, TriggerOutcome};
use crate::store::models::{Enquiry, EnquiryType, ENQUIRIES};
use log::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnquiryRouting {
    pub partner_template: &'static str,
    pub customer_template: Option<&'static str>,
    pub form_type: &'static str,
}

pub fn enquiry_routing(enquiry_type: EnquiryType) -> EnquiryRouting {
    match enquiry_type {
        EnquiryType::VipList => EnquiryRouting {
            partner_template: PARTNER_VIP_LIST_ENQUIRY,
            customer_template: Some(CUSTOMER_VIP_LIST_CONFIRMATION),
            form_type: "VIP List",
        },
        EnquiryType::ComingSoon => EnquiryRouting {
            partner_template: PARTNER_COMING_SOON_ENQUIRY,
            customer_template: Some(CUSTOMER_COMING_SOON_CONFIRMATION),
            form_type: "Coming Soon",
        },
        EnquiryType::TemporaryClosed => EnquiryRouting {
            partner_template: PARTNER_TEMPORARY_CLOSED_ENQUIRY,
            customer_template: None,
            form_type: "Temporarily Closed",
        },
        EnquiryType::Generic => EnquiryRouting {
            partner_template: PARTNER_GENERAL_ENQUIRY,
            customer_template: Some(CUSTOMER_ENQUIRY_CONFIRMATION),
            form_type: "General Enquiry",
        },
    }
}

impl Notifier {
    pub async fn on_enquiry_created(&self, id: &str, enquiry: &Enquiry) -> TriggerOutcome {
        let routing = enquiry_routing(enquiry.enquiry_type);
        let location = self.load_location(enquiry.location_id.as_deref()).await;
        let partner_email = location.as_ref().and_then(|l| present(l.email.as_deref()));
        let customer_email = present(enquiry.email.as_deref());

        if partner_email.is_none() && customer_email.is_none() {
            warn!("Enquiry {id} has no location or customer email address");
            return TriggerOutcome::skipped("enquiry has no recipients");
        }

        let mut data = location.as_ref().map(location_merge_data).unwrap_or_default();
        data.insert_opt("name", enquiry.name.as_deref());
        data.insert_opt("customerName", enquiry.name.as_deref());
        data.insert_opt("email", customer_email);
        data.insert_opt("customerEmail", customer_email);
        data.insert_opt("phone", enquiry.phone.as_deref());
        data.insert_opt("customerPhone", enquiry.phone.as_deref());
        data.insert_opt("childName", enquiry.child_name.as_deref());
        data.insert("childAge", json_text(&enquiry.child_age));
        data.insert_opt("enquiryMessage", enquiry.message.as_deref());
        data.insert("formType", routing.form_type);

        let country = enquiry
            .country
            .as_deref()
            .or(location.as_ref().and_then(|l| l.country.as_deref()));
        let mut outcome = TriggerOutcome::default();

        match partner_email {
            Some(partner_email) => {
                let sent = self
                    .dispatcher
                    .send(
                        EmailRequest::new(partner_email, routing.partner_template, data.clone())
                            .country(country)
                            .reply_to(customer_email),
                    )
                    .await;
                outcome.record(sent);
            }
            None => warn!("Enquiry {id} has no location email; partner not notified"),
        }

        if let (Some(customer_email), Some(template_key)) = (customer_email, routing.customer_template)
        {
            let sent = self
                .dispatcher
                .send(
                    EmailRequest::new(customer_email, template_key, data.clone())
                        .country(country)
                        .reply_to(partner_email)
                        .from_name(
                            location
                                .as_ref()
                                .map(|l| l.name.as_str())
                                .filter(|n| !n.is_empty()),
                        ),
                )
                .await;
            outcome.record(sent);
        }

        if outcome.attempted > 0 {
            self.mark_sent(ENQUIRIES, id, "notificationSentAt").await;
        } else {
            outcome.skipped = Some("no email defined for this enquiry".to_string());
        }
        outcome
    }
}
