//! SQL schema for the Roost warehouse.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Calendar dimension. date_key is a YYYYMMDD surrogate.
CREATE TABLE IF NOT EXISTS dim_date (
    date_key            INTEGER PRIMARY KEY,
    full_date           TEXT    NOT NULL UNIQUE,   -- ISO 8601 date
    day_of_week         INTEGER NOT NULL,          -- 1 = Monday
    day_name            TEXT    NOT NULL,
    month_name          TEXT    NOT NULL,
    month               INTEGER NOT NULL,
    quarter             INTEGER NOT NULL,
    year                INTEGER NOT NULL,
    is_post_regulation  INTEGER NOT NULL,
    is_covid_period     INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS dim_hosts (
    host_id                    BIGINT PRIMARY KEY,
    host_since                 TEXT,              -- ISO 8601 date
    host_location              TEXT,
    host_response_time         TEXT,              -- response-time bucket
    host_response_rate         REAL,              -- fraction in [0, 1]
    host_acceptance_rate       REAL,              -- fraction in [0, 1]
    host_is_superhost          INTEGER,
    host_has_profile_pic       INTEGER,
    host_identity_verified     INTEGER,
    host_total_listings_count  INTEGER
);

CREATE TABLE IF NOT EXISTS dim_listings (
    listing_id            BIGINT PRIMARY KEY,
    host_id               BIGINT NOT NULL REFERENCES dim_hosts(host_id),
    name                  TEXT,
    neighbourhood         TEXT,
    city                  TEXT,
    latitude              TEXT,                   -- DECIMAL(9,6)
    longitude             TEXT,                   -- DECIMAL(9,6)
    property_type         TEXT,
    room_type             TEXT,
    analytical_room_type  TEXT,
    accommodates          INTEGER,
    bedrooms              INTEGER,
    price                 TEXT,                   -- DECIMAL(10,2)
    minimum_nights        INTEGER,
    maximum_nights        INTEGER,
    review_scores_rating  INTEGER,
    review_scores_value   INTEGER,
    instant_bookable      INTEGER
);

-- Fact table. reviewer_id is a degenerate dimension: no table, no FK.
CREATE TABLE IF NOT EXISTS fact_reviews (
    review_id    BIGINT  PRIMARY KEY,
    listing_id   BIGINT  NOT NULL REFERENCES dim_listings(listing_id),
    host_id      BIGINT  NOT NULL REFERENCES dim_hosts(host_id),
    date_key     INTEGER NOT NULL REFERENCES dim_date(date_key),
    reviewer_id  BIGINT
);

CREATE INDEX IF NOT EXISTS listings_host_idx    ON dim_listings(host_id);
CREATE INDEX IF NOT EXISTS reviews_listing_idx  ON fact_reviews(listing_id);
CREATE INDEX IF NOT EXISTS reviews_host_idx     ON fact_reviews(host_id);
CREATE INDEX IF NOT EXISTS reviews_date_idx     ON fact_reviews(date_key);

PRAGMA user_version = 1;
";
