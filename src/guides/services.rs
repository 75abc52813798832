use std::collections::HashMap;

use anyhow::Context;
use serde_json::Value;
use sqlx::PgPool;
use time::{Date, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        repo_types::User,
        services::{is_valid_email, normalize_email},
    },
    dates::parse_date,
    guides::{
        dto::{ActiveBooking, BookRequest, CancelRequest, Languages, RegisterGuideRequest},
        notify::{self, Traveler},
        otp::{self, OtpCheck, OtpError, OTP_TTL},
        repo_types::{Booking, BookingStatus, EmailOtp, Guide, GuideStatus, NewGuide},
    },
    mailer::Mailer,
};

#[derive(Debug, thiserror::Error)]
pub enum GuideError {
    #[error("Missing booking fields")]
    MissingBookingFields,
    #[error("Invalid booking dates")]
    InvalidDates,
    #[error("End date must be after start date")]
    EndNotAfterStart,
    #[error("Guide not found")]
    GuideNotFound,
    #[error("Guide is already booked")]
    GuideAlreadyBooked,
    #[error("Missing cancellation fields")]
    MissingCancelFields,
    #[error("Rating must be between 1 and 5")]
    RatingOutOfRange,
    #[error("Booking not found")]
    BookingNotFound,
    #[error("Booking already cancelled")]
    AlreadyCancelled,
    #[error("Missing required fields")]
    MissingProfileFields,
    #[error("Email required")]
    MissingEmail,
    #[error("Invalid email")]
    InvalidEmail,
    #[error("Email not verified")]
    EmailNotVerified,
    #[error("Already registered as a guide")]
    AlreadyGuide,
    #[error("User not found")]
    UnknownUser,
    #[error("Failed to send OTP")]
    OtpDelivery,
    #[error(transparent)]
    Otp(#[from] OtpError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Running mean of all ratings a guide has received.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub value: f64,
    pub count: i32,
}

impl RatingSummary {
    pub fn of(guide: &Guide) -> Self {
        Self {
            value: guide.rating_value,
            count: guide.rating_count,
        }
    }

    pub fn record(self, rating: i32) -> Self {
        let count = self.count + 1;
        let value = (self.value * f64::from(self.count) + f64::from(rating)) / f64::from(count);
        Self { value, count }
    }
}

/// State written back to a guide when a traveler closes their booking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuideRelease {
    pub status: GuideStatus,
    pub rating: RatingSummary,
}

impl GuideRelease {
    pub fn after_review(guide: &Guide, rating: i32) -> Self {
        Self {
            status: GuideStatus::Available,
            rating: RatingSummary::of(guide).record(rating),
        }
    }
}

pub fn ensure_bookable(guide: &Guide) -> Result<(), GuideError> {
    match guide.status {
        GuideStatus::Available => Ok(()),
        GuideStatus::Booked => Err(GuideError::GuideAlreadyBooked),
    }
}

/// Registration needs a verified OTP for the profile's email.
pub fn ensure_verified(otp: Option<&EmailOtp>) -> Result<(), GuideError> {
    match otp {
        Some(otp) if otp.verified => Ok(()),
        _ => Err(GuideError::EmailNotVerified),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingPlan {
    pub guide_id: Uuid,
    pub start_date: Date,
    pub end_date: Date,
    pub start_raw: String,
    pub end_raw: String,
}

impl BookingPlan {
    /// Label stored on the guide while booked.
    pub fn trip_label(&self) -> String {
        format!("{} to {}", self.start_raw, self.end_raw)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CancelPlan {
    pub booking_id: Uuid,
    pub rating: i32,
    pub review: String,
}

fn required(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn validate_booking(req: &BookRequest) -> Result<BookingPlan, GuideError> {
    let (Some(guide_id), Some(start_raw), Some(end_raw)) = (
        required(&req.guide_id),
        required(&req.start_date),
        required(&req.end_date),
    ) else {
        return Err(GuideError::MissingBookingFields);
    };

    let start_date = parse_date(start_raw).ok_or(GuideError::InvalidDates)?;
    let end_date = parse_date(end_raw).ok_or(GuideError::InvalidDates)?;
    if end_date <= start_date {
        return Err(GuideError::EndNotAfterStart);
    }
    // A malformed id cannot name an existing guide.
    let guide_id = Uuid::parse_str(guide_id).map_err(|_| GuideError::GuideNotFound)?;

    Ok(BookingPlan {
        guide_id,
        start_date,
        end_date,
        start_raw: start_raw.to_string(),
        end_raw: end_raw.to_string(),
    })
}

pub async fn book(
    db: &PgPool,
    mailer: Option<&dyn Mailer>,
    user_id: Uuid,
    plan: BookingPlan,
) -> Result<(Guide, Booking), GuideError> {
    let user = User::find_by_id(db, user_id)
        .await?
        .ok_or(GuideError::UnknownUser)?;

    let mut tx = db.begin().await.context("begin tx")?;
    let guide = Guide::lock_tx(&mut tx, plan.guide_id)
        .await?
        .ok_or(GuideError::GuideNotFound)?;
    ensure_bookable(&guide)?;

    let guide = Guide::mark_booked_tx(&mut tx, guide.id, &plan.trip_label()).await?;
    let booking =
        Booking::create_tx(&mut tx, user_id, guide.id, plan.start_date, plan.end_date).await?;
    tx.commit().await.context("commit booking")?;
    info!(booking_id = %booking.id, guide_id = %guide.id, %user_id, "guide booked");

    let traveler = Traveler::new(user.name.as_deref(), &user.email);
    notify::deliver(
        mailer,
        notify::guide_booked(&guide, &traveler, &plan.start_raw, &plan.end_raw),
    )
    .await;
    notify::deliver(
        mailer,
        notify::traveler_confirmation(&guide, &traveler, &plan.start_raw, &plan.end_raw),
    )
    .await;

    Ok((guide, booking))
}

pub fn validate_cancel(req: &CancelRequest) -> Result<CancelPlan, GuideError> {
    let (Some(booking_id), Some(rating), Some(review)) =
        (required(&req.booking_id), req.rating, required(&req.review))
    else {
        return Err(GuideError::MissingCancelFields);
    };
    let rating = i32::try_from(rating)
        .ok()
        .filter(|r| (1..=5).contains(r))
        .ok_or(GuideError::RatingOutOfRange)?;
    let booking_id = Uuid::parse_str(booking_id).map_err(|_| GuideError::BookingNotFound)?;

    Ok(CancelPlan {
        booking_id,
        rating,
        review: review.to_string(),
    })
}

/// Close the caller's booking, store the review and fold the rating into the guide.
pub async fn cancel_and_review(
    db: &PgPool,
    mailer: Option<&dyn Mailer>,
    user_id: Uuid,
    plan: CancelPlan,
) -> Result<Guide, GuideError> {
    let traveler_name = User::find_by_id(db, user_id)
        .await?
        .and_then(|u| u.name)
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| notify::TRAVELER_FALLBACK.to_string());

    let mut tx = db.begin().await.context("begin tx")?;
    let booking = Booking::lock_for_user_tx(&mut tx, plan.booking_id, user_id)
        .await?
        .ok_or(GuideError::BookingNotFound)?;
    if booking.status == BookingStatus::Cancelled {
        return Err(GuideError::AlreadyCancelled);
    }
    Booking::cancel_tx(&mut tx, booking.id, plan.rating, &plan.review).await?;

    let guide = Guide::lock_tx(&mut tx, booking.guide_id)
        .await?
        .ok_or(GuideError::GuideNotFound)?;
    let release = GuideRelease::after_review(&guide, plan.rating);
    let guide = Guide::release_tx(
        &mut tx,
        guide.id,
        release.status,
        release.rating.value,
        release.rating.count,
    )
    .await?;
    tx.commit().await.context("commit cancellation")?;
    info!(
        booking_id = %booking.id,
        guide_id = %guide.id,
        rating = plan.rating,
        rating_value = release.rating.value,
        "booking cancelled"
    );

    notify::deliver(
        mailer,
        notify::new_review(&guide, &traveler_name, plan.rating, &plan.review),
    )
    .await;
    Ok(guide)
}

/// Pair bookings with their guides; a booking whose guide is gone is dropped.
pub fn attach_guides(bookings: Vec<Booking>, guides: Vec<Guide>) -> Vec<ActiveBooking> {
    let by_id: HashMap<Uuid, Guide> = guides.into_iter().map(|g| (g.id, g)).collect();
    bookings
        .into_iter()
        .filter_map(|booking| {
            let guide = by_id.get(&booking.guide_id)?.clone();
            Some(ActiveBooking { booking, guide })
        })
        .collect()
}

pub async fn list_guides(
    db: &PgPool,
    location: Option<&str>,
    requester: Option<Uuid>,
) -> Result<(Vec<Guide>, Vec<ActiveBooking>), GuideError> {
    let filter = location.map(str::trim).filter(|l| !l.is_empty());
    let guides = Guide::list(db, filter).await?;

    let active = match requester {
        Some(user_id) => {
            let bookings = Booking::active_for_user(db, user_id).await?;
            let ids: Vec<Uuid> = bookings.iter().map(|b| b.guide_id).collect();
            let booked = if ids.is_empty() {
                Vec::new()
            } else {
                Guide::find_many(db, &ids).await?
            };
            attach_guides(bookings, booked)
        }
        None => Vec::new(),
    };
    Ok((guides, active))
}

/// Years of experience from a number or numeric string; anything else is 0.
pub fn experience_years(raw: Option<&Value>) -> i32 {
    let years = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match years {
        Some(y) if y.is_finite() => y.clamp(0.0, f64::from(i32::MAX)) as i32,
        _ => 0,
    }
}

pub fn language_list(raw: Option<Languages>) -> Vec<String> {
    let entries: Vec<String> = match raw {
        Some(Languages::List(list)) => list,
        Some(Languages::Csv(csv)) => csv.split(',').map(str::to_string).collect(),
        None => Vec::new(),
    };
    entries
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

pub fn validate_registration(req: RegisterGuideRequest) -> Result<NewGuide, GuideError> {
    let (Some(name), Some(email), Some(phone), Some(location)) = (
        required(&req.name),
        required(&req.email),
        required(&req.phone),
        required(&req.location),
    ) else {
        return Err(GuideError::MissingProfileFields);
    };

    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(GuideError::InvalidEmail);
    }

    Ok(NewGuide {
        name: name.to_string(),
        email,
        phone: phone.to_string(),
        location: location.to_string(),
        bio: required(&req.bio).map(str::to_string),
        experience: experience_years(req.experience.as_ref()),
        languages: language_list(req.languages),
    })
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|e| e.is_unique_violation())
}

pub async fn register_guide(
    db: &PgPool,
    user_id: Uuid,
    new: NewGuide,
) -> Result<Guide, GuideError> {
    let otp = EmailOtp::find(db, &new.email).await?;
    ensure_verified(otp.as_ref())?;
    if Guide::find_by_user(db, user_id).await?.is_some() {
        return Err(GuideError::AlreadyGuide);
    }

    match Guide::create(db, user_id, &new).await {
        Ok(guide) => {
            info!(guide_id = %guide.id, %user_id, location = %guide.location, "guide registered");
            Ok(guide)
        }
        Err(e) if is_unique_violation(&e) => Err(GuideError::AlreadyGuide),
        Err(e) => Err(e.into()),
    }
}

pub fn otp_email(raw: &Option<String>) -> Result<String, GuideError> {
    let email = required(raw).ok_or(GuideError::MissingEmail)?;
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(GuideError::InvalidEmail);
    }
    Ok(email)
}

pub async fn send_otp(
    db: &PgPool,
    mailer: Option<&dyn Mailer>,
    email: &str,
) -> Result<(), GuideError> {
    let code = otp::generate_code();
    EmailOtp::upsert(db, email, &code, OffsetDateTime::now_utc() + OTP_TTL).await?;

    let Some(mailer) = mailer else {
        warn!(%email, "mail not configured; cannot deliver otp");
        return Err(GuideError::OtpDelivery);
    };
    mailer
        .send(notify::otp_code(email, &code))
        .await
        .map_err(|e| {
            warn!(error = %e, %email, "otp email failed");
            GuideError::OtpDelivery
        })?;
    info!(%email, "otp sent");
    Ok(())
}

/// Submitted codes may arrive as strings or numbers; surrounding whitespace is dropped here.
pub fn submitted_code(raw: Option<&Value>) -> String {
    match raw {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

pub async fn verify_otp(db: &PgPool, email: &str, code: &str) -> Result<OtpCheck, GuideError> {
    let record = EmailOtp::find(db, email).await?;
    let outcome = otp::check(record.as_ref(), code, OffsetDateTime::now_utc())?;
    if outcome == OtpCheck::Verified {
        EmailOtp::mark_verified(db, email).await?;
        info!(%email, "email verified");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guides::notify::tests::guide;
    use serde_json::json;
    use time::macros::date;

    fn book_req(guide_id: &str, start: &str, end: &str) -> BookRequest {
        BookRequest {
            guide_id: Some(guide_id.into()),
            start_date: Some(start.into()),
            end_date: Some(end.into()),
        }
    }

    #[test]
    fn running_mean_matches_plain_mean() {
        let ratings = [5, 3, 4, 1, 5, 2];
        let summary = ratings
            .iter()
            .fold(RatingSummary { value: 0.0, count: 0 }, |acc, &r| acc.record(r));
        let mean = ratings.iter().sum::<i32>() as f64 / ratings.len() as f64;
        assert_eq!(summary.count, 6);
        assert!((summary.value - mean).abs() < 1e-9);
    }

    #[test]
    fn first_rating_becomes_the_mean() {
        let summary = RatingSummary { value: 0.0, count: 0 }.record(4);
        assert_eq!(summary, RatingSummary { value: 4.0, count: 1 });
        let summary = summary.record(5);
        assert_eq!(summary, RatingSummary { value: 4.5, count: 2 });
    }

    #[test]
    fn only_available_guides_can_be_booked() {
        let mut g = guide("1");
        assert!(ensure_bookable(&g).is_ok());
        g.status = GuideStatus::Booked;
        assert!(matches!(
            ensure_bookable(&g),
            Err(GuideError::GuideAlreadyBooked)
        ));
    }

    #[test]
    fn closing_a_booking_frees_the_guide_and_records_the_rating() {
        let mut g = guide("1");
        g.status = GuideStatus::Booked;
        g.rating_value = 4.0;
        g.rating_count = 1;
        let release = GuideRelease::after_review(&g, 2);
        assert_eq!(release.status, GuideStatus::Available);
        assert_eq!(release.rating, RatingSummary { value: 3.0, count: 2 });
        assert!(ensure_bookable(&Guide {
            status: release.status,
            ..g
        })
        .is_ok());
    }

    #[test]
    fn registration_needs_a_verified_email() {
        let otp = |verified| EmailOtp {
            email: "ravi@example.com".into(),
            otp: "123456".into(),
            expires_at: OffsetDateTime::now_utc(),
            verified,
            created_at: OffsetDateTime::now_utc(),
        };
        assert!(matches!(
            ensure_verified(None),
            Err(GuideError::EmailNotVerified)
        ));
        assert!(matches!(
            ensure_verified(Some(&otp(false))),
            Err(GuideError::EmailNotVerified)
        ));
        assert!(ensure_verified(Some(&otp(true))).is_ok());
    }

    #[test]
    fn booking_requires_all_fields() {
        let id = Uuid::new_v4().to_string();
        for req in [
            BookRequest::default(),
            book_req("", "2025-03-01", "2025-03-04"),
            book_req(&id, " ", "2025-03-04"),
            BookRequest {
                end_date: None,
                ..book_req(&id, "2025-03-01", "2025-03-04")
            },
        ] {
            assert!(matches!(
                validate_booking(&req),
                Err(GuideError::MissingBookingFields)
            ));
        }
    }

    #[test]
    fn booking_dates_must_parse_and_be_ordered() {
        let id = Uuid::new_v4().to_string();
        assert!(matches!(
            validate_booking(&book_req(&id, "next week", "2025-03-04")),
            Err(GuideError::InvalidDates)
        ));
        assert!(matches!(
            validate_booking(&book_req(&id, "2025-03-04", "2025-03-04")),
            Err(GuideError::EndNotAfterStart)
        ));
        assert!(matches!(
            validate_booking(&book_req(&id, "2025-03-05", "2025-03-04")),
            Err(GuideError::EndNotAfterStart)
        ));
    }

    #[test]
    fn booking_plan_keeps_submitted_strings_for_label() {
        let id = Uuid::new_v4();
        let plan = validate_booking(&book_req(
            &id.to_string(),
            "2025-03-01T09:00:00Z",
            "2025-03-04",
        ))
        .unwrap();
        assert_eq!(plan.guide_id, id);
        assert_eq!(plan.start_date, date!(2025 - 03 - 01));
        assert_eq!(plan.end_date, date!(2025 - 03 - 04));
        assert_eq!(plan.trip_label(), "2025-03-01T09:00:00Z to 2025-03-04");
    }

    #[test]
    fn malformed_guide_id_is_not_found() {
        assert!(matches!(
            validate_booking(&book_req("guide-7", "2025-03-01", "2025-03-04")),
            Err(GuideError::GuideNotFound)
        ));
    }

    #[test]
    fn cancel_validation() {
        let id = Uuid::new_v4();
        let req = |rating: Option<i64>, review: Option<&str>| CancelRequest {
            booking_id: Some(id.to_string()),
            rating,
            review: review.map(str::to_string),
        };
        assert!(matches!(
            validate_cancel(&req(None, Some("great"))),
            Err(GuideError::MissingCancelFields)
        ));
        assert!(matches!(
            validate_cancel(&req(Some(4), Some("  "))),
            Err(GuideError::MissingCancelFields)
        ));
        assert!(matches!(
            validate_cancel(&req(Some(0), Some("meh"))),
            Err(GuideError::RatingOutOfRange)
        ));
        assert!(matches!(
            validate_cancel(&req(Some(6), Some("wow"))),
            Err(GuideError::RatingOutOfRange)
        ));
        assert!(matches!(
            validate_cancel(&req(Some(i64::from(i32::MAX) + 3), Some("wow"))),
            Err(GuideError::RatingOutOfRange)
        ));
        assert!(matches!(
            validate_cancel(&req(Some(i64::MIN), Some("wow"))),
            Err(GuideError::RatingOutOfRange)
        ));
        assert_eq!(
            validate_cancel(&req(Some(5), Some(" Superb "))).unwrap(),
            CancelPlan {
                booking_id: id,
                rating: 5,
                review: "Superb".into()
            }
        );
    }

    #[test]
    fn experience_accepts_numbers_and_numeric_strings() {
        assert_eq!(experience_years(Some(&json!(7))), 7);
        assert_eq!(experience_years(Some(&json!(" 3 "))), 3);
        assert_eq!(experience_years(Some(&json!(2.9))), 2);
        assert_eq!(experience_years(Some(&json!("lots"))), 0);
        assert_eq!(experience_years(Some(&json!(-4))), 0);
        assert_eq!(experience_years(Some(&json!(null))), 0);
        assert_eq!(experience_years(None), 0);
    }

    #[test]
    fn languages_accept_list_or_csv() {
        assert_eq!(
            language_list(Some(Languages::Csv("English, Hindi,,Tamil ".into()))),
            vec!["English", "Hindi", "Tamil"]
        );
        assert_eq!(
            language_list(Some(Languages::List(vec![" French".into(), "".into()]))),
            vec!["French"]
        );
        assert!(language_list(None).is_empty());

        let parsed: RegisterGuideRequest =
            serde_json::from_value(json!({"languages": "English,Hindi"})).unwrap();
        assert_eq!(language_list(parsed.languages), vec!["English", "Hindi"]);
        let parsed: RegisterGuideRequest =
            serde_json::from_value(json!({"languages": ["Malayalam"]})).unwrap();
        assert_eq!(language_list(parsed.languages), vec!["Malayalam"]);
    }

    #[test]
    fn registration_requires_contact_fields() {
        let full = || RegisterGuideRequest {
            name: Some("Ravi".into()),
            email: Some(" Ravi@Example.com ".into()),
            phone: Some("+91 98".into()),
            location: Some("Kochi".into()),
            bio: Some("  ".into()),
            experience: Some(json!("5")),
            languages: Some(Languages::Csv("English,Malayalam".into())),
        };

        let new = validate_registration(full()).unwrap();
        assert_eq!(new.email, "ravi@example.com");
        assert_eq!(new.bio, None);
        assert_eq!(new.experience, 5);
        assert_eq!(new.languages, vec!["English", "Malayalam"]);

        for strip in 0..4 {
            let mut req = full();
            match strip {
                0 => req.name = None,
                1 => req.email = Some(" ".into()),
                2 => req.phone = None,
                _ => req.location = None,
            }
            assert!(matches!(
                validate_registration(req),
                Err(GuideError::MissingProfileFields)
            ));
        }

        let mut req = full();
        req.email = Some("not-an-email".into());
        assert!(matches!(validate_registration(req), Err(GuideError::InvalidEmail)));
    }

    #[test]
    fn active_bookings_embed_their_guide() {
        let g = guide("1");
        let booking = |guide_id| Booking {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            guide_id,
            start_date: date!(2025 - 03 - 01),
            end_date: date!(2025 - 03 - 04),
            status: BookingStatus::Active,
            rating: None,
            review: None,
            created_at: OffsetDateTime::now_utc(),
        };
        let active = attach_guides(
            vec![booking(g.id), booking(Uuid::new_v4())],
            vec![g.clone()],
        );
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].guide.id, g.id);

        let json = serde_json::to_value(&active[0]).unwrap();
        assert_eq!(json["guideId"], json!(g.id));
        assert_eq!(json["startDate"], "2025-03-01");
        assert_eq!(json["status"], "active");
        assert_eq!(json["guide"]["ratingCount"], 0);
    }

    #[test]
    fn otp_email_is_required_and_normalized() {
        assert!(matches!(otp_email(&None), Err(GuideError::MissingEmail)));
        assert!(matches!(
            otp_email(&Some("nope".into())),
            Err(GuideError::InvalidEmail)
        ));
        assert_eq!(
            otp_email(&Some(" Guide@Example.COM".into())).unwrap(),
            "guide@example.com"
        );
    }

    #[test]
    fn submitted_codes_accept_numbers() {
        assert_eq!(submitted_code(Some(&json!(123456))), "123456");
        assert_eq!(submitted_code(Some(&json!(" 123456 "))), "123456");
        assert_eq!(submitted_code(None), "");
    }
}
