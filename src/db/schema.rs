//! Database schema and migrations.
//!
//! Migrations are applied in order; `schema_version` records which ones ran.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: users
    r#"
CREATE TABLE users (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    email          TEXT NOT NULL COLLATE NOCASE UNIQUE,
    password       TEXT NOT NULL,           -- Argon2 hash
    first_name     TEXT NOT NULL,
    last_name      TEXT NOT NULL,
    role           TEXT NOT NULL DEFAULT 'user'
                   CHECK (role IN ('admin', 'lecturer', 'user')),
    otp_hash       TEXT,                    -- SHA-256 of the pending reset code
    otp_issued_at  INTEGER,                 -- unix seconds
    created_at     TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_users_role ON users(role);
"#,
    // v2: bookings and attendees
    r#"
CREATE TABLE bookings (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    resource     TEXT NOT NULL,
    title        TEXT NOT NULL,
    description  TEXT,
    start_time   INTEGER NOT NULL,          -- unix seconds, inclusive
    end_time     INTEGER NOT NULL,          -- unix seconds, exclusive
    status       TEXT NOT NULL DEFAULT 'confirmed'
                 CHECK (status IN ('confirmed', 'cancelled')),
    owner_id     INTEGER NOT NULL REFERENCES users(id),
    created_at   TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at   TEXT NOT NULL DEFAULT (datetime('now')),
    CHECK (start_time < end_time)
);

CREATE INDEX idx_bookings_schedule ON bookings(resource, status, start_time);
CREATE INDEX idx_bookings_owner ON bookings(owner_id);

CREATE TABLE booking_attendees (
    booking_id  INTEGER NOT NULL REFERENCES bookings(id) ON DELETE CASCADE,
    user_id     INTEGER NOT NULL REFERENCES users(id),
    PRIMARY KEY (booking_id, user_id)
);

CREATE INDEX idx_booking_attendees_user ON booking_attendees(user_id);
"#,
    // v3: wrong reset code guesses against the pending code
    r#"
ALTER TABLE users ADD COLUMN otp_attempts INTEGER NOT NULL DEFAULT 0;
"#,
];
