use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    geocode::GeoPoint,
    trips::repo_types::{Location, NewTrip, Trip},
};

const TRIP_COLUMNS: &str =
    "id, user_id, title, description, image_url, start_date, end_date, created_at";

const LOCATION_COLUMNS: &str = "id, trip_id, location_title, lat, lng, sort_order, created_at";

impl Trip {
    pub async fn create(db: &PgPool, user_id: Uuid, new: &NewTrip) -> anyhow::Result<Trip> {
        let trip = sqlx::query_as::<_, Trip>(&format!(
            r#"
            INSERT INTO trips (user_id, title, description, image_url, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TRIP_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&new.title)
        .bind(new.description.as_deref())
        .bind(new.image_url.as_deref())
        .bind(new.start_date)
        .bind(new.end_date)
        .fetch_one(db)
        .await
        .context("insert trip")?;
        Ok(trip)
    }

    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Trip>> {
        let trips = sqlx::query_as::<_, Trip>(&format!(
            r#"
            SELECT {TRIP_COLUMNS}
            FROM trips
            WHERE user_id = $1
            ORDER BY start_date DESC, created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(db)
        .await
        .context("list trips")?;
        Ok(trips)
    }

    pub async fn find_for_user(
        db: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Trip>> {
        let trip = sqlx::query_as::<_, Trip>(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("find trip")?;
        Ok(trip)
    }

    /// Lock the caller's trip so its itinerary can be changed atomically.
    pub async fn lock_for_user_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Trip>> {
        let trip = sqlx::query_as::<_, Trip>(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1 AND user_id = $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await
        .context("lock trip")?;
        Ok(trip)
    }
}

impl Location {
    pub async fn list_by_trip(db: &PgPool, trip_id: Uuid) -> anyhow::Result<Vec<Location>> {
        let locations = sqlx::query_as::<_, Location>(&format!(
            r#"
            SELECT {LOCATION_COLUMNS}
            FROM locations
            WHERE trip_id = $1
            ORDER BY sort_order ASC, created_at ASC
            "#
        ))
        .bind(trip_id)
        .fetch_all(db)
        .await
        .context("list locations")?;
        Ok(locations)
    }

    pub async fn ids_by_trip_tx(
        tx: &mut Transaction<'_, Postgres>,
        trip_id: Uuid,
    ) -> anyhow::Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM locations WHERE trip_id = $1 ORDER BY sort_order ASC",
        )
        .bind(trip_id)
        .fetch_all(&mut **tx)
        .await
        .context("list location ids")?;
        Ok(ids)
    }

    /// Append a stop at the end of the itinerary.
    pub async fn append_tx(
        tx: &mut Transaction<'_, Postgres>,
        trip_id: Uuid,
        point: &GeoPoint,
    ) -> anyhow::Result<Location> {
        let location = sqlx::query_as::<_, Location>(&format!(
            r#"
            INSERT INTO locations (trip_id, location_title, lat, lng, sort_order)
            SELECT $1, $2, $3, $4, COUNT(*)::int FROM locations WHERE trip_id = $1
            RETURNING {LOCATION_COLUMNS}
            "#
        ))
        .bind(trip_id)
        .bind(&point.formatted_address)
        .bind(point.lat)
        .bind(point.lng)
        .fetch_one(&mut **tx)
        .await
        .context("insert location")?;
        Ok(location)
    }

    /// Give each listed location the position of its id in `ordered_ids`.
    pub async fn reorder_tx(
        tx: &mut Transaction<'_, Postgres>,
        trip_id: Uuid,
        ordered_ids: &[Uuid],
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE locations AS l
               SET sort_order = (v.ord - 1)::int
              FROM UNNEST($2::uuid[]) WITH ORDINALITY AS v(id, ord)
             WHERE l.id = v.id AND l.trip_id = $1
            "#,
        )
        .bind(trip_id)
        .bind(ordered_ids)
        .execute(&mut **tx)
        .await
        .context("reorder locations")?;
        Ok(())
    }
}
