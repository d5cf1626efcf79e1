use crate::server::config::PortalConfigEmail;
use crate::templating::MergeData;
use chrono::Datelike;

pub const BRAND_GRADIENT: &str = "linear-gradient(135deg, #0f4c81 0%, #1e88e5 100%)";

const HEAD: &str = r#"<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<style>
  body { margin: 0; padding: 0; background: #f4f6f8; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Helvetica, Arial, sans-serif; color: #1f2933; }
  .wrapper { max-width: 600px; margin: 0 auto; padding: 24px 12px; }
  .card { background: #ffffff; border-radius: 12px; overflow: hidden; box-shadow: 0 2px 8px rgba(15, 76, 129, 0.08); }
  .header { padding: 32px 24px; color: #ffffff; text-align: center; }
  .header h1 { margin: 0; font-size: 24px; }
  .header p { margin: 8px 0 0; font-size: 15px; opacity: 0.9; }
  .content { padding: 24px; font-size: 15px; line-height: 1.6; }
  .footer { padding: 16px 24px; text-align: center; font-size: 12px; color: #7b8794; }
</style>
</head>"#;

/// Outer document for templates resolved from the store. Only assembles
/// already-rendered fragments.
#[derive(Clone, Debug)]
pub struct DynamicLayout {
    default_header_bg: String,
}

impl Default for DynamicLayout {
    fn default() -> Self {
        Self {
            default_header_bg: BRAND_GRADIENT.to_string(),
        }
    }
}

impl DynamicLayout {
    pub fn from_config(config: &PortalConfigEmail) -> Self {
        match config.brand_gradient.as_deref().map(str::trim) {
            Some(bg) if !bg.is_empty() => Self {
                default_header_bg: bg.to_string(),
            },
            _ => Self::default(),
        }
    }

    pub fn wrap(
        &self,
        body_html: &str,
        header_title: &str,
        header_subtitle: &str,
        header_bg: &str,
    ) -> String {
        let header_bg = match header_bg.trim() {
            "" => self.default_header_bg.as_str(),
            bg => bg,
        };
        let subtitle = if header_subtitle.is_empty() {
            String::new()
        } else {
            format!("<p>{header_subtitle}</p>")
        };
        let year = chrono::Local::now().year();
        format!(
            r#"<!DOCTYPE html>
<html>
{HEAD}
<body>
<div class="wrapper">
  <div class="card">
    <div class="header" style="background: {header_bg};">
      <h1>{header_title}</h1>
      {subtitle}
    </div>
    <div class="content">
{body_html}
    </div>
    <div class="footer">&copy; {year} Franchise Portal. All rights reserved.</div>
  </div>
</div>
</body>
</html>"#
        )
    }
}

/// Code-embedded templates used when a stored template could not be sent.
/// These never touch the template store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LegacyFixedLayout {
    LocationWelcome,
    BookingConfirmation,
}

impl LegacyFixedLayout {
    pub fn subject(&self, data: &MergeData) -> String {
        match self {
            LegacyFixedLayout::LocationWelcome => {
                format!("Welcome to the portal, {}!", data.get("locationName"))
            }
            LegacyFixedLayout::BookingConfirmation => format!(
                "Your assessment at {} is booked (Ref {})",
                data.get("locationName"),
                data.get("bookingReference")
            ),
        }
    }

    pub fn html(&self, data: &MergeData) -> String {
        let (title, body) = match self {
            LegacyFixedLayout::LocationWelcome => (
                "Welcome aboard",
                format!(
                    "<p>Hi {name},</p>\
<p>Your location <strong>{location}</strong> has been set up in the franchise portal.</p>\
<p>You can sign in at <a href=\"{portal}\">{portal}</a> to complete your profile and connect payments.</p>",
                    name = data.get("name"),
                    location = data.get("locationName"),
                    portal = data.get("portalUrl"),
                ),
            ),
            LegacyFixedLayout::BookingConfirmation => (
                "Booking confirmed",
                format!(
                    "<p>Hi {customer},</p>\
<p>Thanks for booking an assessment for {child} at <strong>{location}</strong>.</p>\
<table cellpadding=\"4\">\
<tr><td>Reference</td><td><strong>{reference}</strong></td></tr>\
<tr><td>Date</td><td>{date}</td></tr>\
<tr><td>Time</td><td>{time}</td></tr>\
<tr><td>Address</td><td>{address}</td></tr>\
</table>\
<p>If you need to change your booking, reply to this email or call {phone}.</p>",
                    customer = data.get("customerName"),
                    child = data.get("childName"),
                    location = data.get("locationName"),
                    reference = data.get("bookingReference"),
                    date = data.get("bookingDate"),
                    time = data.get("bookingTime"),
                    address = data.get("locationAddress"),
                    phone = data.get("locationPhone"),
                ),
            ),
        };
        let year = chrono::Local::now().year();
        format!(
            r#"<!DOCTYPE html>
<html>
{HEAD}
<body>
<div class="wrapper">
  <div class="card">
    <div class="header" style="background: {BRAND_GRADIENT};">
      <h1>{title}</h1>
    </div>
    <div class="content">
{body}
    </div>
    <div class="footer">&copy; {year} Franchise Portal. All rights reserved.</div>
  </div>
</div>
</body>
</html>"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_body_untouched() {
        let html = DynamicLayout::default().wrap("<p>{{name}}</p>", "Title", "Sub", "#ff0000");
        assert!(html.contains("<p>{{name}}</p>"));
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<p>Sub</p>"));
        assert!(html.contains("background: #ff0000;"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn empty_header_background_uses_brand_gradient() {
        let html = DynamicLayout::default().wrap("<p>x</p>", "Title", "", "  ");
        assert!(html.contains(BRAND_GRADIENT));
    }

    #[test]
    fn footer_shows_current_year() {
        let year = chrono::Local::now().year().to_string();
        let html = DynamicLayout::default().wrap("", "", "", "");
        assert!(html.contains(&format!("&copy; {year}")));
    }

    #[test]
    fn legacy_location_welcome_mentions_location() {
        let data = MergeData::new()
            .with("locationName", "X")
            .with("name", "Pat");
        let legacy = LegacyFixedLayout::LocationWelcome;
        assert!(legacy.subject(&data).contains('X'));
        assert!(legacy.html(&data).contains("<strong>X</strong>"));
    }

    #[test]
    fn legacy_booking_confirmation_shows_reference() {
        let data = MergeData::new()
            .with("bookingReference", "ABCDEFGH")
            .with("locationName", "Bondi");
        let legacy = LegacyFixedLayout::BookingConfirmation;
        assert!(legacy.subject(&data).contains("ABCDEFGH"));
        assert!(legacy.html(&data).contains("<strong>ABCDEFGH</strong>"));
    }
}
