use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                email         TEXT PRIMARY KEY,
                display_name  TEXT NOT NULL,
                created_at    TEXT NOT NULL
            );

            -- One row per friendship, spelled with the smaller email first.
            CREATE TABLE friendships (
                user_low    TEXT NOT NULL REFERENCES users(email),
                user_high   TEXT NOT NULL REFERENCES users(email),
                created_at  TEXT NOT NULL,
                PRIMARY KEY (user_low, user_high),
                CHECK (user_low < user_high)
            );

            CREATE INDEX idx_friendships_high
                ON friendships(user_high);

            CREATE TABLE markers (
                id              TEXT PRIMARY KEY,
                owner_email     TEXT NOT NULL REFERENCES users(email),
                lat             REAL NOT NULL,
                lng             REAL NOT NULL,
                title           TEXT NOT NULL,
                location_label  TEXT NOT NULL,
                color           TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_markers_owner
                ON markers(owner_email, created_at);

            CREATE TABLE photos (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                marker_id    TEXT NOT NULL REFERENCES markers(id) ON DELETE CASCADE,
                file_name    TEXT NOT NULL UNIQUE,
                image_url    TEXT NOT NULL,
                uploaded_by  TEXT NOT NULL,
                uploaded_at  TEXT NOT NULL
            );

            CREATE INDEX idx_photos_marker
                ON photos(marker_id, id);

            CREATE TABLE photo_shares (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                photo_id         INTEGER NOT NULL REFERENCES photos(id) ON DELETE CASCADE,
                recipient_email  TEXT NOT NULL REFERENCES users(email),
                granted_by       TEXT NOT NULL REFERENCES users(email),
                granted_at       TEXT NOT NULL,
                UNIQUE (photo_id, recipient_email)
            );

            CREATE INDEX idx_shares_recipient
                ON photo_shares(recipient_email);

            CREATE INDEX idx_shares_grantor
                ON photo_shares(granted_by);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_rerunnable() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn friendship_rows_must_be_ordered() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO users VALUES ('a@x.com', 'A', '2024-01-01T00:00:00Z');
             INSERT INTO users VALUES ('b@x.com', 'B', '2024-01-01T00:00:00Z');",
        )
        .unwrap();

        let reversed = conn.execute(
            "INSERT INTO friendships VALUES ('b@x.com', 'a@x.com', '2024-01-01T00:00:00Z')",
            [],
        );
        assert!(reversed.is_err());
    }
}
