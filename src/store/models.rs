use crate::templating::TemplateString;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const API_TOKENS: &str = "apiTokens";
pub const BOOKINGS: &str = "bookings";
pub const EMAIL_TEMPLATES: &str = "emailTemplates";
pub const ENQUIRIES: &str = "enquiries";
pub const INVITES: &str = "invites";
pub const LOCATIONS: &str = "locations";
pub const PARENTS: &str = "parents";
pub const SALES: &str = "sales";
pub const SESSIONS: &str = "sessions";
pub const TRANSACTIONS: &str = "transactions";

pub const GLOBAL_SCOPE: &str = "global";

fn default_enabled() -> bool {
    true
}

fn default_scope() -> String {
    GLOBAL_SCOPE.to_string()
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplate {
    #[serde(default)]
    pub key: String,
    /// `global`, or the country code of a `${key}_${COUNTRY}` override.
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub subject: TemplateString,
    #[serde(default)]
    pub body: TemplateString,
    #[serde(default)]
    pub header_title: String,
    #[serde(default)]
    pub header_subtitle: String,
    #[serde(default)]
    pub header_bg: String,
    #[serde(default)]
    pub merge_tags: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

pub fn template_document_id(key: &str, country: Option<&str>) -> String {
    match country {
        Some(country) => format!("{}_{}", key, country.trim().to_uppercase()),
        None => key.to_string(),
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStatus {
    NoAccount,
    PendingOnboarding,
    Onboarded,
}

impl fmt::Display for OnboardingStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            OnboardingStatus::NoAccount => "no_account",
            OnboardingStatus::PendingOnboarding => "pending_onboarding",
            OnboardingStatus::Onboarded => "onboarded",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default)]
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub suburb: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub stripe_account_id: Option<String>,
    pub stripe_onboarding_status: Option<OnboardingStatus>,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub payouts_enabled: bool,
    pub confirmation_email_sent_at: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invite {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub location_id: Option<String>,
    pub invited_by_name: Option<String>,
    pub invite_link: Option<String>,
    pub country: Option<String>,
    pub invite_email_sent_at: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub location_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub parent_name: Option<String>,
    pub parent_email: Option<String>,
    pub child_name: Option<String>,
    pub child_age: Option<serde_json::Value>,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    /// `HH:MM`, 24-hour
    pub time: Option<String>,
    pub booking_type: Option<String>,
    pub notes: Option<String>,
    pub confirmation_email_sent_at: Option<String>,
    pub partner_email_sent_at: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnquiryType {
    VipList,
    ComingSoon,
    TemporaryClosed,
    #[default]
    #[serde(other)]
    Generic,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Enquiry {
    #[serde(rename = "type", default)]
    pub enquiry_type: EnquiryType,
    pub location_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub child_name: Option<String>,
    pub child_age: Option<serde_json::Value>,
    pub message: Option<String>,
    pub country: Option<String>,
    pub notification_sent_at: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Scheduled,
    Cancelled,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub location_id: Option<String>,
    pub class_name: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    pub recurrence_id: Option<String>,
    pub rescheduled_email_sent_at: Option<String>,
    pub cancelled_email_sent_at: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Parent {
    pub name: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    #[serde(default)]
    pub fcm_tokens: Vec<String>,
    pub stripe_customer_id: Option<String>,
    pub payment_method: Option<PaymentMethodInfo>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodType {
    Card,
    AuBecsDebit,
}

impl PaymentMethodType {
    /// Resolution order when a customer has more than one kind on file.
    pub const PREFERENCE: [PaymentMethodType; 2] =
        [PaymentMethodType::Card, PaymentMethodType::AuBecsDebit];

    pub fn to_str(&self) -> &'static str {
        match self {
            PaymentMethodType::Card => "card",
            PaymentMethodType::AuBecsDebit => "au_becs_debit",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: PaymentMethodType,
    pub brand: String,
    pub last4: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp_month: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp_year: Option<u32>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Active,
    Pending,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Processed,
    Recorded,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefundRecord {
    pub amount: f64,
    pub reason: String,
    pub processed_at: String,
    pub status: RefundStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_refund_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub location_id: String,
    pub parent_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: String,
    pub membership_name: String,
    pub base_price: f64,
    pub weekly_amount: f64,
    pub fee_amount: f64,
    pub joining_fee: f64,
    pub first_payment_total: f64,
    pub status: SaleStatus,
    pub stripe_status: String,
    pub stripe_subscription_id: String,
    pub stripe_customer_id: String,
    pub stripe_price_id: String,
    pub stripe_product_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_payment_method_id: Option<String>,
    #[serde(default)]
    pub refunds: Vec<RefundRecord>,
    pub created_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub sale_id: String,
    pub location_id: String,
    pub customer_email: String,
    pub amount: f64,
    pub kind: String,
    pub status: String,
    pub stripe_subscription_id: String,
    pub created_at: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    MasterAdmin,
    Admin,
    FranchisePartner,
    Service,
}

/// Stored under `apiTokens/{blake3(token)}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiToken {
    pub uid: String,
    pub role: Role,
    pub display_name: Option<String>,
}
