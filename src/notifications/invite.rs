use crate::email::defaults::USER_INVITE;
use crate::email::EmailRequest;
use crate::notifications::{location_merge_data, present, Notifier, TriggerOutcome};
use crate::store::models::{Invite, INVITES};
use crate::templating::MergeData;
use log::warn;

impl Notifier {
    pub(crate) async fn invite_email(&self, id: &str, invite: &Invite) -> Option<EmailRequest> {
        let email = present(invite.email.as_deref())?;
        let location = self.load_location(invite.location_id.as_deref()).await;

        let mut data = match &location {
            Some(location) => location_merge_data(location),
            None => MergeData::new(),
        };
        data.insert("name", invite.name.as_deref().unwrap_or(email));
        data.insert("email", email);
        data.insert("role", invite.role.as_deref().unwrap_or_default().replace('_', " "));
        data.insert_opt("inviterName", invite.invited_by_name.as_deref());
        data.insert("portalUrl", self.portal_url());
        data.insert(
            "inviteLink",
            match present(invite.invite_link.as_deref()) {
                Some(link) => link.to_string(),
                None => format!("{}/accept-invite?invite={id}", self.portal_url()),
            },
        );

        let country = invite
            .country
            .as_deref()
            .or(location.as_ref().and_then(|l| l.country.as_deref()));
        Some(EmailRequest::new(email, USER_INVITE, data).country(country))
    }

    pub async fn on_invite_created(&self, id: &str, invite: &Invite) -> TriggerOutcome {
        let Some(request) = self.invite_email(id, invite).await else {
            warn!("Invite {id} has no email address; skipping invite email");
            return TriggerOutcome::skipped("invite has no email address");
        };

        let mut outcome = TriggerOutcome::default();
        outcome.record(self.dispatcher.send(request).await);
        self.mark_sent(INVITES, id, "inviteEmailSentAt").await;
        outcome
    }
}
