use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, attentions, messages)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                is_staff    INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE attentions (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                staff_id    INTEGER NOT NULL REFERENCES users(id),
                status      TEXT NOT NULL DEFAULT 'abierta'
                            CHECK (status IN ('abierta', 'cerrada')),
                created_at  TEXT NOT NULL
            );

            -- At most one open attention per requester
            CREATE UNIQUE INDEX idx_attentions_one_open
                ON attentions(user_id) WHERE status = 'abierta';

            CREATE INDEX idx_attentions_created
                ON attentions(created_at);

            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                attention_id    INTEGER NOT NULL REFERENCES attentions(id),
                author_id       INTEGER NOT NULL REFERENCES users(id),
                body            TEXT,
                attachment      TEXT,
                is_staff        INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_messages_attention
                ON messages(attention_id, id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
