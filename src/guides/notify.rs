use html_escape::encode_text;
use tracing::{debug, warn};

use crate::{
    guides::{otp::otp_message, repo_types::Guide},
    mailer::{Email, MailBody, Mailer},
};

pub const TRAVELER_FALLBACK: &str = "A traveler";
const PHONE_FALLBACK: &str = "Not Provided";

/// Who booked or reviewed a guide, as shown in outgoing mail.
#[derive(Debug, Clone)]
pub struct Traveler {
    pub name: String,
    pub email: String,
}

impl Traveler {
    pub fn new(name: Option<&str>, email: &str) -> Self {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(TRAVELER_FALLBACK);
        Self {
            name: name.to_string(),
            email: email.to_string(),
        }
    }
}

pub fn guide_booked(guide: &Guide, traveler: &Traveler, start: &str, end: &str) -> Email {
    let html = format!(
        r##"<div style="font-family: Arial, sans-serif; background:#f7f7f7; padding:20px;">
  <div style="max-width:600px; margin:auto; background:white; padding:25px; border-radius:10px;">
    <h2 style="color:#2b6cb0;">📌 You've Been Booked!</h2>
    <p>Hello <strong>{guide_name}</strong>,</p>
    <p>You have been booked by <strong>{traveler_name}</strong> for a guided trip.</p>
    <h3 style="color:#2f855a;">📅 Trip Details</h3>
    <p><strong>Start:</strong> {start}</p>
    <p><strong>End:</strong> {end}</p>
    <h3 style="color:#d69e2e;">👤 Traveler Contact</h3>
    <p>Email: <strong>{traveler_email}</strong></p>
    <p>Kindly prepare for the trip and ensure communication with the traveler.</p>
    <p style="margin-top:25px;">– <strong>Churuli Team</strong></p>
  </div>
</div>"##,
        guide_name = encode_text(&guide.name),
        traveler_name = encode_text(&traveler.name),
        traveler_email = encode_text(&traveler.email),
        start = encode_text(start),
        end = encode_text(end),
    );
    Email {
        to: guide.email.clone(),
        subject: "📌 You Have Been Booked as a Guide!".into(),
        body: MailBody::Html(html),
    }
}

pub fn traveler_confirmation(guide: &Guide, traveler: &Traveler, start: &str, end: &str) -> Email {
    let phone = match guide.phone.trim() {
        "" => PHONE_FALLBACK,
        phone => phone,
    };
    let html = format!(
        r##"<div style="font-family: Arial, sans-serif; background:#f9fafb; padding:20px;">
  <div style="max-width:600px; margin:auto; background:white; padding:25px; border-radius:10px;">
    <h2 style="color:#2f855a;">🎉 Your Guide Booking is Confirmed!</h2>
    <p>Hello <strong>{traveler_name}</strong>,</p>
    <p>Your guide has been successfully booked. Below are the details.</p>
    <h3 style="color:#3182ce;">🧑‍✈️ Guide Details</h3>
    <p><strong>Name:</strong> {guide_name}</p>
    <p><strong>Email:</strong> {guide_email}</p>
    <p><strong>Phone:</strong> {phone}</p>
    <h3 style="color:#d69e2e;">📅 Trip Dates</h3>
    <p><strong>Start:</strong> {start}</p>
    <p><strong>End:</strong> {end}</p>
    <p>Please contact your guide to discuss meeting point, itinerary, and any preparations.</p>
    <p style="margin-top:25px;">– <strong>Churuli Team</strong></p>
  </div>
</div>"##,
        traveler_name = encode_text(&traveler.name),
        guide_name = encode_text(&guide.name),
        guide_email = encode_text(&guide.email),
        phone = encode_text(phone),
        start = encode_text(start),
        end = encode_text(end),
    );
    Email {
        to: traveler.email.clone(),
        subject: "🎉 Guide Booking Confirmed!".into(),
        body: MailBody::Html(html),
    }
}

pub fn new_review(guide: &Guide, traveler_name: &str, rating: i32, review: &str) -> Email {
    let text = format!(
        "Hello {},\n\n{} has cancelled the booking and left a review.\n\n\
         ⭐ Rating: {}/5\n📝 Review: {}\n\nThank you!\n",
        guide.name, traveler_name, rating, review
    );
    Email {
        to: guide.email.clone(),
        subject: "You received a new review".into(),
        body: MailBody::Text(text),
    }
}

pub fn otp_code(to: &str, code: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: "Your OTP Code".into(),
        body: MailBody::Text(otp_message(code)),
    }
}

/// Send after the state change has been committed. Failures are only logged.
pub async fn deliver(mailer: Option<&dyn Mailer>, email: Email) {
    let Some(mailer) = mailer else {
        debug!(to = %email.to, subject = %email.subject, "mail disabled; skipping");
        return;
    };
    let to = email.to.clone();
    if let Err(e) = mailer.send(email).await {
        warn!(error = %e, %to, "notification email failed");
    }
}
