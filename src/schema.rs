//! Database schema management for `fieldsense`.
//!
//! Ensures the sensor tables and their indexes exist before serving requests.
//! Applied once on startup from `main.rs`.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create the database schema (idempotent).
///
/// Creates `sensors` and `sensor_readings`. Safe to call on every startup;
/// no-op if the objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensors (
            sensor_id    UUID             PRIMARY KEY,
            farm_id      TEXT             NOT NULL,
            name         TEXT             NOT NULL,
            latitude     DOUBLE PRECISION NOT NULL,
            longitude    DOUBLE PRECISION NOT NULL,
            type         INTEGER          NOT NULL,
            external_id  TEXT,
            depth        DOUBLE PRECISION,
            elevation    DOUBLE PRECISION
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_readings (
            reading_id     BIGSERIAL        PRIMARY KEY,
            read_time      TIMESTAMPTZ      NOT NULL DEFAULT now(),
            transmit_time  TIMESTAMPTZ      NOT NULL,
            sensor_id      UUID             NOT NULL REFERENCES sensors (sensor_id),
            reading_type   TEXT             NOT NULL,
            value          DOUBLE PRECISION NOT NULL,
            unit           TEXT             NOT NULL,
            valid          BOOLEAN          NOT NULL DEFAULT TRUE
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensors_farm_id
            ON sensors (farm_id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Visualization queries filter by sensor and type over a time range
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_readings_sensor_type_time
            ON sensor_readings (sensor_id, reading_type, read_time);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
