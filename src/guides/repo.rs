use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::guides::repo_types::{Booking, EmailOtp, Guide, GuideStatus, NewGuide};

const GUIDE_COLUMNS: &str = "id, user_id, name, email, phone, location, bio, experience, languages, \
     status, current_trip_id, rating_value, rating_count, created_at";

const BOOKING_COLUMNS: &str =
    "id, user_id, guide_id, start_date, end_date, status, rating, review, created_at";

impl Guide {
    pub async fn find_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<Guide>> {
        let guide = sqlx::query_as::<_, Guide>(&format!(
            "SELECT {GUIDE_COLUMNS} FROM local_guides WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("find guide by user")?;
        Ok(guide)
    }

    /// All guides, or those whose location contains `location` ignoring case.
    pub async fn list(db: &PgPool, location: Option<&str>) -> anyhow::Result<Vec<Guide>> {
        let guides = sqlx::query_as::<_, Guide>(&format!(
            r#"
            SELECT {GUIDE_COLUMNS}
            FROM local_guides
            WHERE $1::text IS NULL OR position(lower($1) in lower(location)) > 0
            ORDER BY created_at DESC
            "#
        ))
        .bind(location)
        .fetch_all(db)
        .await
        .context("list guides")?;
        Ok(guides)
    }

    pub async fn find_many(db: &PgPool, ids: &[Uuid]) -> anyhow::Result<Vec<Guide>> {
        let guides = sqlx::query_as::<_, Guide>(&format!(
            "SELECT {GUIDE_COLUMNS} FROM local_guides WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(db)
        .await
        .context("find guides by id")?;
        Ok(guides)
    }

    pub async fn create(db: &PgPool, user_id: Uuid, new: &NewGuide) -> anyhow::Result<Guide> {
        let guide = sqlx::query_as::<_, Guide>(&format!(
            r#"
            INSERT INTO local_guides (user_id, name, email, phone, location, bio, experience, languages)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {GUIDE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(&new.location)
        .bind(new.bio.as_deref())
        .bind(new.experience)
        .bind(&new.languages)
        .fetch_one(db)
        .await
        .context("insert guide")?;
        Ok(guide)
    }

    /// Lock the guide row for the rest of the transaction.
    pub async fn lock_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> anyhow::Result<Option<Guide>> {
        let guide = sqlx::query_as::<_, Guide>(&format!(
            "SELECT {GUIDE_COLUMNS} FROM local_guides WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .context("lock guide")?;
        Ok(guide)
    }

    pub async fn mark_booked_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        trip_label: &str,
    ) -> anyhow::Result<Guide> {
        let guide = sqlx::query_as::<_, Guide>(&format!(
            r#"
            UPDATE local_guides
               SET status = 'booked', current_trip_id = $2
             WHERE id = $1
            RETURNING {GUIDE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(trip_label)
        .fetch_one(&mut **tx)
        .await
        .context("mark guide booked")?;
        Ok(guide)
    }

    /// Store the new rating aggregate and make the guide available again.
    pub async fn release_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: GuideStatus,
        rating_value: f64,
        rating_count: i32,
    ) -> anyhow::Result<Guide> {
        let guide = sqlx::query_as::<_, Guide>(&format!(
            r#"
            UPDATE local_guides
               SET status = $2, rating_value = $3, rating_count = $4
             WHERE id = $1
            RETURNING {GUIDE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .bind(rating_value)
        .bind(rating_count)
        .fetch_one(&mut **tx)
        .await
        .context("release guide")?;
        Ok(guide)
    }
}

impl Booking {
    pub async fn create_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        guide_id: Uuid,
        start_date: Date,
        end_date: Date,
    ) -> anyhow::Result<Booking> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            r#"
            INSERT INTO bookings (user_id, guide_id, start_date, end_date)
            VALUES ($1, $2, $3, $4)
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(guide_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_one(&mut **tx)
        .await
        .context("insert booking")?;
        Ok(booking)
    }

    /// Lock a booking owned by `user_id`. Foreign bookings are reported as missing.
    pub async fn lock_for_user_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 AND user_id = $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await
        .context("lock booking")?;
        Ok(booking)
    }

    pub async fn cancel_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        rating: i32,
        review: &str,
    ) -> anyhow::Result<Booking> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            r#"
            UPDATE bookings
               SET status = 'cancelled', rating = $2, review = $3
             WHERE id = $1
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(rating)
        .bind(review)
        .fetch_one(&mut **tx)
        .await
        .context("cancel booking")?;
        Ok(booking)
    }

    pub async fn active_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE user_id = $1 AND status = 'active'
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(db)
        .await
        .context("list active bookings")?;
        Ok(bookings)
    }
}

impl EmailOtp {
    /// Insert or overwrite the code for `email`; a resend clears `verified`.
    pub async fn upsert(
        db: &PgPool,
        email: &str,
        otp: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO email_otps (email, otp, expires_at, verified)
            VALUES ($1, $2, $3, false)
            ON CONFLICT (email)
            DO UPDATE SET otp = EXCLUDED.otp, expires_at = EXCLUDED.expires_at, verified = false
            "#,
        )
        .bind(email)
        .bind(otp)
        .bind(expires_at)
        .execute(db)
        .await
        .context("upsert otp")?;
        Ok(())
    }

    pub async fn find(db: &PgPool, email: &str) -> anyhow::Result<Option<EmailOtp>> {
        let otp = sqlx::query_as::<_, EmailOtp>(
            r#"
            SELECT email, otp, expires_at, verified, created_at
            FROM email_otps
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find otp")?;
        Ok(otp)
    }

    pub async fn mark_verified(db: &PgPool, email: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE email_otps SET verified = true WHERE email = $1")
            .bind(email)
            .execute(db)
            .await
            .context("mark otp verified")?;
        Ok(())
    }
}
