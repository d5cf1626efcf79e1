use crate::store::db_interfaces::PortalDb;
use crate::store::get_record;
use crate::store::models::{template_document_id, EmailTemplate, EMAIL_TEMPLATES};
use log::{debug, warn};

/// Picks the stored template variant for a logical key: the country
/// override when present and not disabled, otherwise the global template.
///
/// A missing template is an ordinary outcome, so store failures are logged
/// and reported as absent rather than raised.
pub struct TemplateResolver<'a> {
    db: &'a dyn PortalDb,
}

impl<'a> TemplateResolver<'a> {
    pub fn new(db: &'a dyn PortalDb) -> Self {
        Self { db }
    }

    pub async fn resolve(&self, template_key: &str, country: Option<&str>) -> Option<EmailTemplate> {
        let country = country.map(str::trim).filter(|c| !c.is_empty());

        if let Some(country) = country {
            let id = template_document_id(template_key, Some(country));
            match self.load(&id, template_key).await {
                Some(template) if template.enabled => {
                    debug!("Using country template {id}");
                    return Some(template);
                }
                Some(_) => debug!("Country template {id} is disabled, trying global"),
                None => {}
            }
        }

        // The global template is used regardless of its `enabled` flag.
        self.load(template_key, template_key).await
    }

    async fn load(&self, id: &str, template_key: &str) -> Option<EmailTemplate> {
        match get_record::<EmailTemplate>(self.db, EMAIL_TEMPLATES, id).await {
            Ok(Some(mut template)) => {
                if template.key.is_empty() {
                    template.key = template_key.to_string();
                }
                Some(template)
            }
            Ok(None) => None,
            Err(err) => {
                warn!("Could not read email template {id}: {err}");
                None
            }
        }
    }
}
