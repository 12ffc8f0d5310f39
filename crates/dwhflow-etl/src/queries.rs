//! SQL statement catalog for the song-play star schema
//!
//! Two staging tables receive the raw JSON logs via `COPY`; the fact table
//! `songplays` and the dimensions `users`, `songs`, `artists` and `time`
//! are filled from them with `INSERT ... SELECT`.

use crate::error::Result;
use dwhflow_config::{ConfigStore, S3Sources, schema, section};

/// A named SQL statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub name: String,
    pub sql: String,
}

impl Statement {
    fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// Table names in creation order
pub const STAGING_TABLES: [&str; 2] = ["staging_events", "staging_songs"];
pub const TARGET_TABLES: [&str; 5] = ["songplays", "users", "songs", "artists", "time"];

const CREATE_STAGING_EVENTS: &str = "\
CREATE TABLE IF NOT EXISTS staging_events (
    artist          VARCHAR,
    auth            VARCHAR,
    firstName       VARCHAR,
    gender          CHAR(1),
    itemInSession   INTEGER,
    lastName        VARCHAR,
    length          FLOAT,
    level           VARCHAR,
    location        VARCHAR,
    method          VARCHAR,
    page            VARCHAR,
    registration    BIGINT,
    sessionId       INTEGER,
    song            VARCHAR,
    status          INTEGER,
    ts              BIGINT,
    userAgent       VARCHAR,
    userId          INTEGER
)";

const CREATE_STAGING_SONGS: &str = "\
CREATE TABLE IF NOT EXISTS staging_songs (
    num_songs        INTEGER,
    artist_id        VARCHAR,
    artist_latitude  FLOAT,
    artist_longitude FLOAT,
    artist_location  VARCHAR,
    artist_name      VARCHAR,
    song_id          VARCHAR,
    title            VARCHAR,
    duration         FLOAT,
    year             INTEGER
)";

const CREATE_SONGPLAYS: &str = "\
CREATE TABLE IF NOT EXISTS songplays (
    songplay_id INTEGER IDENTITY(0,1) PRIMARY KEY,
    start_time  TIMESTAMP NOT NULL SORTKEY DISTKEY,
    user_id     INTEGER NOT NULL,
    level       VARCHAR,
    song_id     VARCHAR,
    artist_id   VARCHAR,
    session_id  INTEGER,
    location    VARCHAR,
    user_agent  VARCHAR
)";

const CREATE_USERS: &str = "\
CREATE TABLE IF NOT EXISTS users (
    user_id    INTEGER NOT NULL SORTKEY PRIMARY KEY,
    first_name VARCHAR NOT NULL,
    last_name  VARCHAR NOT NULL,
    gender     VARCHAR NOT NULL,
    level      VARCHAR NOT NULL
) DISTSTYLE ALL";

const CREATE_SONGS: &str = "\
CREATE TABLE IF NOT EXISTS songs (
    song_id   VARCHAR NOT NULL SORTKEY PRIMARY KEY,
    title     VARCHAR NOT NULL,
    artist_id VARCHAR NOT NULL,
    year      INTEGER NOT NULL,
    duration  FLOAT
) DISTSTYLE ALL";

const CREATE_ARTISTS: &str = "\
CREATE TABLE IF NOT EXISTS artists (
    artist_id VARCHAR NOT NULL SORTKEY PRIMARY KEY,
    name      VARCHAR NOT NULL,
    location  VARCHAR,
    latitude  FLOAT,
    longitude FLOAT
) DISTSTYLE ALL";

const CREATE_TIME: &str = "\
CREATE TABLE IF NOT EXISTS time (
    start_time TIMESTAMP NOT NULL DISTKEY SORTKEY PRIMARY KEY,
    hour       INTEGER NOT NULL,
    day        INTEGER NOT NULL,
    week       INTEGER NOT NULL,
    month      INTEGER NOT NULL,
    year       INTEGER NOT NULL,
    weekday    VARCHAR(20) NOT NULL
)";

const INSERT_SONGPLAYS: &str = "\
INSERT INTO songplays (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
SELECT DISTINCT TIMESTAMP 'epoch' + e.ts / 1000 * INTERVAL '1 second',
       e.userId, e.level, s.song_id, s.artist_id, e.sessionId, e.location, e.userAgent
FROM staging_events e
JOIN staging_songs s ON e.song = s.title AND e.artist = s.artist_name
WHERE e.page = 'NextSong'";

const INSERT_USERS: &str = "\
INSERT INTO users (user_id, first_name, last_name, gender, level)
SELECT DISTINCT userId, firstName, lastName, gender, level
FROM staging_events
WHERE page = 'NextSong' AND userId IS NOT NULL";

const INSERT_SONGS: &str = "\
INSERT INTO songs (song_id, title, artist_id, year, duration)
SELECT DISTINCT song_id, title, artist_id, year, duration
FROM staging_songs
WHERE song_id IS NOT NULL";

const INSERT_ARTISTS: &str = "\
INSERT INTO artists (artist_id, name, location, latitude, longitude)
SELECT DISTINCT artist_id, artist_name, artist_location, artist_latitude, artist_longitude
FROM staging_songs
WHERE artist_id IS NOT NULL";

const INSERT_TIME: &str = "\
INSERT INTO time (start_time, hour, day, week, month, year, weekday)
SELECT DISTINCT start_time,
       EXTRACT(hour FROM start_time), EXTRACT(day FROM start_time),
       EXTRACT(week FROM start_time), EXTRACT(month FROM start_time),
       EXTRACT(year FROM start_time), EXTRACT(dayofweek FROM start_time)
FROM songplays";

/// Ordered statement lists for every ETL phase
#[derive(Debug, Clone)]
pub struct SqlCatalog {
    pub drop: Vec<Statement>,
    pub create: Vec<Statement>,
    pub copy: Vec<Statement>,
    pub insert: Vec<Statement>,
}

impl SqlCatalog {
    /// Render the catalog with the S3 locations, role and region from the store
    pub fn from_store(store: &ConfigStore) -> Result<Self> {
        let sources = S3Sources::from_store(store)?;
        let role_arn = store.get(section::IAM_ROLE, "arn")?;
        let region = schema::region(store)?;
        Ok(Self::new(&sources, &role_arn, &region))
    }

    pub fn new(sources: &S3Sources, role_arn: &str, region: &str) -> Self {
        let drop = STAGING_TABLES
            .iter()
            .chain(TARGET_TABLES.iter())
            .map(|table| {
                Statement::new(
                    format!("drop {}", table),
                    format!("DROP TABLE IF EXISTS {}", table),
                )
            })
            .collect();

        let create = [
            ("staging_events", CREATE_STAGING_EVENTS),
            ("staging_songs", CREATE_STAGING_SONGS),
            ("songplays", CREATE_SONGPLAYS),
            ("users", CREATE_USERS),
            ("songs", CREATE_SONGS),
            ("artists", CREATE_ARTISTS),
            ("time", CREATE_TIME),
        ]
        .into_iter()
        .map(|(table, sql)| Statement::new(format!("create {}", table), sql))
        .collect();

        let copy = vec![
            Statement::new(
                "copy staging_events",
                format!(
                    "COPY staging_events FROM {} IAM_ROLE {} REGION {} FORMAT AS JSON {}",
                    quote(&sources.log_data),
                    quote(role_arn),
                    quote(region),
                    quote(&sources.log_jsonpath)
                ),
            ),
            Statement::new(
                "copy staging_songs",
                format!(
                    "COPY staging_songs FROM {} IAM_ROLE {} REGION {} FORMAT AS JSON 'auto'",
                    quote(&sources.song_data),
                    quote(role_arn),
                    quote(region)
                ),
            ),
        ];

        let insert = [
            ("songplays", INSERT_SONGPLAYS),
            ("users", INSERT_USERS),
            ("songs", INSERT_SONGS),
            ("artists", INSERT_ARTISTS),
            ("time", INSERT_TIME),
        ]
        .into_iter()
        .map(|(table, sql)| Statement::new(format!("insert {}", table), sql))
        .collect();

        Self {
            drop,
            create,
            copy,
            insert,
        }
    }
}

/// SQL string literal
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
