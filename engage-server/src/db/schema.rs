/// SQL schema for the Engage database
/// Every relation a decision touches is keyed by the post's social_id
pub const SCHEMA: &str = r#"
-- Targets table (people from the saved search)
CREATE TABLE IF NOT EXISTS targets (
    canonical_url TEXT PRIMARY KEY,
    raw_lead_reference TEXT,
    resolved_identifier TEXT,
    display_name TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_targets_resolved ON targets(resolved_identifier);

-- Post pool (posts seen in target feeds)
CREATE TABLE IF NOT EXISTS post_pool (
    social_id TEXT PRIMARY KEY,
    target_identifier TEXT NOT NULL,
    text TEXT NOT NULL DEFAULT '',
    created_at TEXT,
    last_seen_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_post_pool_target ON post_pool(target_identifier);

-- Drafts awaiting a human decision
CREATE TABLE IF NOT EXISTS pending_reviews (
    social_id TEXT PRIMARY KEY,
    profile_name TEXT NOT NULL,
    post_text TEXT NOT NULL,
    generated_text TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('pending')),
    created_at TEXT NOT NULL,
    slack_channel TEXT,
    slack_ts TEXT
);

-- Published comments
CREATE TABLE IF NOT EXISTS comments (
    social_id TEXT PRIMARY KEY,
    comment_text TEXT NOT NULL,
    commented_at TEXT NOT NULL,
    edited INTEGER NOT NULL DEFAULT 0
);

-- Audit trail of decided posts
CREATE TABLE IF NOT EXISTS handled_posts (
    social_id TEXT PRIMARY KEY,
    disposition TEXT NOT NULL CHECK(disposition IN ('posted', 'skipped')),
    handled_at TEXT NOT NULL
);
"#;
