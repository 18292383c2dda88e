//! SQL schema for the docket SQLite store.
//!
//! Executed once at connection startup. Timestamps are INTEGER milliseconds
//! since the Unix epoch so range and order queries compare numerically.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS cases (
    case_id     TEXT PRIMARY KEY,
    community   TEXT NOT NULL,
    cycle_key   TEXT NOT NULL,    -- yyyymmdd-HHMM
    date_key    TEXT NOT NULL,    -- yyyymmdd
    title       TEXT NOT NULL,
    body        TEXT NOT NULL,
    labels      TEXT NOT NULL,    -- JSON array of exactly 4 strings
    open_ts     INTEGER NOT NULL,
    close_ts    INTEGER NOT NULL,
    reveal_ts   INTEGER NOT NULL,
    status      TEXT NOT NULL,    -- 'open' | 'closed' | 'revealed'
    source      TEXT NOT NULL,    -- 'seed' | 'user'
    created_by  TEXT NOT NULL,
    post_id     TEXT,
    UNIQUE (community, cycle_key),
    CHECK  (open_ts <= close_ts AND close_ts <= reveal_ts)
);

-- One row per (case, user). Never updated except first_comment_ts,
-- which is written at most once.
CREATE TABLE IF NOT EXISTS votes (
    case_id          TEXT NOT NULL REFERENCES cases(case_id),
    user_id          TEXT NOT NULL,
    verdict          INTEGER NOT NULL CHECK (verdict BETWEEN 0 AND 3),
    prediction       INTEGER NOT NULL CHECK (prediction BETWEEN 0 AND 3),
    vote_ts          INTEGER NOT NULL,
    first_comment_ts INTEGER,
    PRIMARY KEY (case_id, user_id)
);

-- Only ever incremented, in the same transaction as a vote insert.
CREATE TABLE IF NOT EXISTS aggregates (
    case_id         TEXT PRIMARY KEY REFERENCES cases(case_id),
    count_0         INTEGER NOT NULL DEFAULT 0,
    count_1         INTEGER NOT NULL DEFAULT 0,
    count_2         INTEGER NOT NULL DEFAULT 0,
    count_3         INTEGER NOT NULL DEFAULT 0,
    voters          INTEGER NOT NULL DEFAULT 0,
    last_updated_ts INTEGER NOT NULL
);

-- Append-only.
CREATE TABLE IF NOT EXISTS snapshots (
    case_id TEXT NOT NULL REFERENCES cases(case_id),
    ts      INTEGER NOT NULL,
    count_0 INTEGER NOT NULL,
    count_1 INTEGER NOT NULL,
    count_2 INTEGER NOT NULL,
    count_3 INTEGER NOT NULL,
    voters  INTEGER NOT NULL,
    PRIMARY KEY (case_id, ts)
);

-- Written once per (case, user); the row is the case leaderboard entry.
CREATE TABLE IF NOT EXISTS scores (
    case_id          TEXT NOT NULL REFERENCES cases(case_id),
    user_id          TEXT NOT NULL,
    prediction_match INTEGER NOT NULL,
    verdict_match    INTEGER NOT NULL,
    timing_bonus     INTEGER NOT NULL,
    influence_bonus  INTEGER NOT NULL,
    streak_bonus     INTEGER NOT NULL,
    mini_game_bonus  INTEGER NOT NULL,
    total            INTEGER NOT NULL,
    saved_at         INTEGER NOT NULL,
    PRIMARY KEY (case_id, user_id)
);

CREATE TABLE IF NOT EXISTS weekly_points (
    community TEXT NOT NULL,
    week_key  TEXT NOT NULL,      -- YYYY-Www
    user_id   TEXT NOT NULL,
    points    INTEGER NOT NULL,
    first_at  INTEGER NOT NULL,
    PRIMARY KEY (community, week_key, user_id)
);

CREATE TABLE IF NOT EXISTS streaks (
    community        TEXT NOT NULL,
    user_id          TEXT NOT NULL,
    current          INTEGER NOT NULL,
    best             INTEGER NOT NULL,
    last_played_date TEXT,
    PRIMARY KEY (community, user_id)
);

CREATE TABLE IF NOT EXISTS minigame_scores (
    case_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    best    INTEGER NOT NULL,
    PRIMARY KEY (case_id, user_id)
);

CREATE TABLE IF NOT EXISTS submissions (
    submission_id   TEXT PRIMARY KEY,
    community       TEXT NOT NULL,
    user_id         TEXT NOT NULL,
    username        TEXT NOT NULL,
    body            TEXT NOT NULL,
    title           TEXT,
    labels_override TEXT,         -- JSON array of 4 strings or NULL
    status          TEXT NOT NULL, -- 'pending' | 'approved' | 'rejected'
    submitted_at    INTEGER NOT NULL,
    submitted_date  TEXT NOT NULL, -- yyyymmdd of submitted_at
    reviewed_at     INTEGER,
    reviewed_by     TEXT,
    reject_reason   TEXT,
    assigned_date   TEXT,
    used_by_case    TEXT
);

CREATE TABLE IF NOT EXISTS usernames (
    user_id  TEXT PRIMARY KEY,
    username TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS cases_status_idx       ON cases(status);
CREATE INDEX IF NOT EXISTS cases_community_idx    ON cases(community, open_ts);
CREATE INDEX IF NOT EXISTS scores_rank_idx        ON scores(case_id, total DESC, saved_at);
CREATE INDEX IF NOT EXISTS weekly_rank_idx        ON weekly_points(community, week_key, points DESC, first_at);
CREATE INDEX IF NOT EXISTS submissions_user_idx   ON submissions(community, user_id, submitted_date);
CREATE INDEX IF NOT EXISTS submissions_status_idx ON submissions(community, status, assigned_date);

PRAGMA user_version = 1;
";
