use portal_notify::email::backend::EmailEntry;
use portal_notify::email::defaults::seed_default_templates;
use portal_notify::server::config::{
    PortalConfig, PortalConfigCors, PortalConfigEmail, PortalConfigEmailFile,
};
use portal_notify::server::server_runner::PortalState;
use portal_notify::server::tokens::issue_api_token;
use portal_notify::store::memory::MemoryDb;
use portal_notify::store::models::Role;
use std::path::{Path, PathBuf};

pub fn parse_email_file<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<EmailEntry>, Box<dyn std::error::Error>> {
    if !path.as_ref().exists() {
        return Ok(vec![]);
    }
    let content = std::fs::read_to_string(path)?;
    let mut emails = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if !line.is_empty() {
            emails.push(serde_json::from_str(line)?);
        }
    }

    Ok(emails)
}

pub fn test_config(email_path: &Path) -> PortalConfig {
    PortalConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: "memory://".to_string(),
        portal_url: None,
        cors: PortalConfigCors {
            origin: "*".to_string(),
        },
        email: PortalConfigEmail {
            from_email: "noreply@portal.test".to_string(),
            from_name: "Portal".to_string(),
            reply_to: None,
            brand_gradient: None,
            sendgrid: None,
            smtp: None,
            file: Some(PortalConfigEmailFile {
                path: email_path.display().to_string(),
            }),
        },
        stripe: None,
        push: None,
    }
}

pub struct TestPortal {
    pub db: MemoryDb,
    pub state: PortalState,
    pub admin_token: String,
    pub partner_token: String,
    pub email_path: PathBuf,
    // Holds the scratch directory open for the test's duration.
    _dir: tempfile::TempDir,
}

pub async fn test_portal() -> TestPortal {
    let dir = tempfile::tempdir().unwrap();
    let email_path = dir.path().join("emails.jsonl");
    let db = MemoryDb::new();
    seed_default_templates(&db, false).await.unwrap();
    let admin_token = issue_api_token(&db, "ops", Role::Admin, None).await.unwrap();
    let partner_token = issue_api_token(&db, "partner", Role::FranchisePartner, None)
        .await
        .unwrap();
    let state = PortalState::new(Box::new(db.clone()), test_config(&email_path));
    TestPortal {
        db,
        state,
        admin_token,
        partner_token,
        email_path,
        _dir: dir,
    }
}
