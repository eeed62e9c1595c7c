//! SQLite persistence for curriculum, responses, sessions, and the user
//! data read by connection adapters.
//!
//! The curriculum table is authored content, read-only at runtime. Progress
//! is never stored — it is always derived from the join of curriculum and
//! responses, so there is no counter to drift.

use rusqlite::types::Type;
use rusqlite::{params, Connection, Result as SqliteResult};
use std::path::Path;

use waybook_types::{
    now_millis, Block, BlockContent, BlockKind, ExerciseRef, Response, ResponseId, ResponseTarget,
    SessionId, UserId,
};

/// Database handle for workbook persistence.
pub struct WorkbookDb {
    conn: Connection,
}

/// A connection row as stored. Type and method stay raw strings here;
/// the resolver parses them leniently (unknown values resolve as custom).
#[derive(Debug, Clone)]
pub struct ConnectionRow {
    pub id: i64,
    pub name: String,
    pub connection_type: String,
    pub method: String,
    pub params: String,
}

const SCHEMA: &str = r#"
-- Curriculum (authored, read-only at runtime)
CREATE TABLE IF NOT EXISTS curriculum (
    id INTEGER PRIMARY KEY,
    part INTEGER NOT NULL,
    module INTEGER NOT NULL,
    exercise INTEGER NOT NULL,
    activity INTEGER NOT NULL DEFAULT 1,
    sequence INTEGER NOT NULL UNIQUE,
    block_type TEXT NOT NULL,
    content_id INTEGER NOT NULL,
    connection_id INTEGER,
    content_json TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_curriculum_exercise
    ON curriculum(part, module, exercise, sequence);

-- User responses (prompt XOR tool, enforced at the row level too)
CREATE TABLE IF NOT EXISTS responses (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    prompt_id INTEGER,
    tool_id INTEGER,
    exercise_id TEXT NOT NULL,
    activity_id INTEGER,
    response_text TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    CHECK ((prompt_id IS NULL) <> (tool_id IS NULL))
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_responses_prompt
    ON responses(user_id, prompt_id, exercise_id, COALESCE(activity_id, -1))
    WHERE prompt_id IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS idx_responses_tool
    ON responses(user_id, tool_id, exercise_id, COALESCE(activity_id, -1))
    WHERE tool_id IS NOT NULL;

-- Connection declarations
CREATE TABLE IF NOT EXISTS connections (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    connection_type TEXT NOT NULL,
    method TEXT NOT NULL,
    params TEXT NOT NULL DEFAULT '{}'
);

-- Sessions
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

-- Shared reference material
CREATE TABLE IF NOT EXISTS skills (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    is_custom INTEGER NOT NULL DEFAULT 0,
    review_status TEXT NOT NULL DEFAULT 'approved'
);

-- User data read by connection adapters
CREATE TABLE IF NOT EXISTS user_skills (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    skill_type TEXT NOT NULL,
    mastery INTEGER NOT NULL DEFAULT 0,
    rank INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS user_stories (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    text TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS user_experiences (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL,
    employer TEXT NOT NULL,
    role TEXT NOT NULL,
    start_year INTEGER,
    end_year INTEGER
);
CREATE TABLE IF NOT EXISTS user_education (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL,
    institution TEXT NOT NULL,
    credential TEXT,
    year INTEGER
);
CREATE TABLE IF NOT EXISTS user_flow_logs (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL,
    activity TEXT NOT NULL,
    energy INTEGER NOT NULL,
    focus INTEGER NOT NULL,
    logged_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS user_values (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    name TEXT NOT NULL,
    rank INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS user_career_options (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    notes TEXT
);
CREATE TABLE IF NOT EXISTS user_budget_items (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL,
    category TEXT NOT NULL,
    amount REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS user_locations (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    notes TEXT
);
CREATE TABLE IF NOT EXISTS user_idea_trees (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    nodes_json TEXT NOT NULL DEFAULT '[]'
);
CREATE TABLE IF NOT EXISTS user_lists (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    items_json TEXT NOT NULL DEFAULT '[]'
);
CREATE TABLE IF NOT EXISTS user_profile (
    user_id TEXT PRIMARY KEY,
    personality_code TEXT,
    profile_text TEXT,
    dashboard_json TEXT
);
"#;

const BLOCK_COLUMNS: &str =
    "id, part, module, exercise, activity, sequence, block_type, content_id, connection_id, content_json";

const RESPONSE_COLUMNS: &str =
    "id, user_id, prompt_id, tool_id, exercise_id, activity_id, response_text, created_at, updated_at";

impl WorkbookDb {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Run raw SQL. Schema maintenance and fixture loading only.
    pub fn execute_batch(&self, sql: &str) -> SqliteResult<()> {
        self.conn.execute_batch(sql)
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Create a session for a user and return its id.
    pub fn create_session(&self, user: UserId) -> SqliteResult<SessionId> {
        let session = SessionId::new();
        self.conn.execute(
            "INSERT INTO sessions (id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![session.to_string(), user.to_string(), now_millis() as i64],
        )?;
        Ok(session)
    }

    /// Resolve a session to its user, if the session exists.
    pub fn session_user(&self, session: SessionId) -> SqliteResult<Option<UserId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM sessions WHERE id = ?1")?;
        let mut rows = stmt.query(params![session.to_string()])?;
        if let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            let user = UserId::parse(&raw)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    // =========================================================================
    // Curriculum
    // =========================================================================

    /// Insert one curriculum block (seeding and fixtures).
    pub fn insert_block(&self, block: &Block) -> SqliteResult<()> {
        let content_json = serde_json::to_string(&block.content).unwrap_or_else(|_| "{}".into());
        self.conn.execute(
            "INSERT INTO curriculum
                 (id, part, module, exercise, activity, sequence, block_type,
                  content_id, connection_id, content_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                block.id,
                block.exercise.part,
                block.exercise.module,
                block.exercise.exercise,
                block.activity,
                block.sequence as i64,
                block.kind.as_str(),
                block.content.content_id().unwrap_or(0),
                block.connection_id,
                content_json,
            ],
        )?;
        Ok(())
    }

    /// Insert a connection declaration (seeding and fixtures).
    pub fn insert_connection(&self, row: &ConnectionRow) -> SqliteResult<()> {
        self.conn.execute(
            "INSERT INTO connections (id, name, connection_type, method, params)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![row.id, row.name, row.connection_type, row.method, row.params],
        )?;
        Ok(())
    }

    /// Published blocks with `from <= sequence <= to`, in sequence order.
    pub fn fetch_range(&self, from: u64, to: u64, published_max_part: u32) -> SqliteResult<Vec<Block>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BLOCK_COLUMNS} FROM curriculum
             WHERE sequence >= ?1 AND sequence <= ?2 AND part <= ?3
             ORDER BY sequence"
        ))?;
        let rows = stmt.query_map(params![from as i64, to as i64, published_max_part], row_to_block)?;
        rows.collect()
    }

    /// The published block at an exact sequence position.
    pub fn block_at(&self, sequence: u64, published_max_part: u32) -> SqliteResult<Option<Block>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BLOCK_COLUMNS} FROM curriculum
             WHERE sequence = ?1 AND part <= ?2"
        ))?;
        let mut rows = stmt.query_map(params![sequence as i64, published_max_part], row_to_block)?;
        rows.next().transpose()
    }

    /// Highest published sequence; 0 for an empty curriculum.
    pub fn max_sequence(&self, published_max_part: u32) -> SqliteResult<u64> {
        let max: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(sequence), 0) FROM curriculum WHERE part <= ?1",
            params![published_max_part],
            |row| row.get(0),
        )?;
        Ok(max as u64)
    }

    /// Number of blocks at or below a sequence position.
    pub fn count_up_to(&self, sequence: u64) -> SqliteResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM curriculum WHERE sequence <= ?1",
            params![sequence as i64],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Point lookup of the block a response answers.
    pub fn find_block(
        &self,
        kind: BlockKind,
        content_id: i64,
        exercise: ExerciseRef,
        activity: Option<i64>,
    ) -> SqliteResult<Option<Block>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BLOCK_COLUMNS} FROM curriculum
             WHERE block_type = ?1 AND content_id = ?2
               AND part = ?3 AND module = ?4 AND exercise = ?5
               AND (?6 IS NULL OR activity = ?6)
             ORDER BY sequence"
        ))?;
        let mut rows = stmt.query_map(
            params![
                kind.as_str(),
                content_id,
                exercise.part,
                exercise.module,
                exercise.exercise,
                activity,
            ],
            row_to_block,
        )?;
        rows.next().transpose()
    }

    // =========================================================================
    // Responses & progress
    // =========================================================================

    /// Derived progress: the highest sequence whose prompt/tool content id
    /// has a matching response for this user. 0 when nothing is answered.
    pub fn compute_progress(&self, user: UserId) -> SqliteResult<u64> {
        let max: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(c.sequence), 0)
             FROM curriculum c
             JOIN responses r ON r.user_id = ?1
              AND ((c.block_type = 'prompt' AND r.prompt_id = c.content_id)
                OR (c.block_type = 'tool' AND r.tool_id = c.content_id))",
            params![user.to_string()],
            |row| row.get(0),
        )?;
        Ok(max as u64)
    }

    /// All stored responses for a user, optionally scoped to one exercise.
    pub fn list_responses(
        &self,
        user: UserId,
        exercise: Option<ExerciseRef>,
    ) -> SqliteResult<Vec<Response>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RESPONSE_COLUMNS} FROM responses
             WHERE user_id = ?1 AND (?2 IS NULL OR exercise_id = ?2)
             ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map(
            params![user.to_string(), exercise.map(|e| e.to_string())],
            row_to_response,
        )?;
        rows.collect()
    }

    /// The existing response id for an upsert key, if one exists.
    pub fn find_response_id(
        &self,
        user: UserId,
        target: ResponseTarget,
        exercise: ExerciseRef,
        activity: Option<i64>,
    ) -> SqliteResult<Option<ResponseId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM responses
             WHERE user_id = ?1 AND exercise_id = ?2
               AND COALESCE(activity_id, -1) = COALESCE(?3, -1)
               AND ((?4 IS NOT NULL AND prompt_id = ?4)
                 OR (?5 IS NOT NULL AND tool_id = ?5))",
        )?;
        let mut rows = stmt.query(params![
            user.to_string(),
            exercise.to_string(),
            activity,
            target.prompt_id(),
            target.tool_id(),
        ])?;
        if let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            let id = ResponseId::parse(&raw)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
            Ok(Some(id))
        } else {
            Ok(None)
        }
    }

    /// Overwrite an existing response's text.
    pub fn update_response(&self, id: ResponseId, text: &str) -> SqliteResult<()> {
        self.conn.execute(
            "UPDATE responses SET response_text = ?1, updated_at = ?2 WHERE id = ?3",
            params![text, now_millis() as i64, id.to_string()],
        )?;
        Ok(())
    }

    /// Insert a new response and return its id.
    pub fn insert_response(
        &self,
        user: UserId,
        target: ResponseTarget,
        exercise: ExerciseRef,
        activity: Option<i64>,
        text: &str,
    ) -> SqliteResult<ResponseId> {
        let id = ResponseId::new();
        let now = now_millis() as i64;
        self.conn.execute(
            "INSERT INTO responses
                 (id, user_id, prompt_id, tool_id, exercise_id, activity_id,
                  response_text, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                id.to_string(),
                user.to_string(),
                target.prompt_id(),
                target.tool_id(),
                exercise.to_string(),
                activity,
                text,
                now,
            ],
        )?;
        Ok(id)
    }

    // =========================================================================
    // Connections
    // =========================================================================

    /// A connection declaration by id.
    pub fn connection(&self, id: i64) -> SqliteResult<Option<ConnectionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, connection_type, method, params FROM connections WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], |row| {
            Ok(ConnectionRow {
                id: row.get(0)?,
                name: row.get(1)?,
                connection_type: row.get(2)?,
                method: row.get(3)?,
                params: row.get(4)?,
            })
        })?;
        rows.next().transpose()
    }
}

/// Map a curriculum row (BLOCK_COLUMNS order) to a typed block.
fn row_to_block(row: &rusqlite::Row<'_>) -> SqliteResult<Block> {
    let kind_str: String = row.get(6)?;
    let kind = BlockKind::from_str(&kind_str).unwrap_or_default();
    let content_json: String = row.get(9)?;
    Ok(Block {
        id: row.get(0)?,
        sequence: row.get::<_, i64>(5)? as u64,
        exercise: ExerciseRef::new(
            row.get::<_, i64>(1)? as u32,
            row.get::<_, i64>(2)? as u32,
            row.get::<_, i64>(3)? as u32,
        ),
        activity: row.get(4)?,
        kind,
        connection_id: row.get(8)?,
        content: BlockContent::from_json(kind, &content_json),
    })
}

/// Map a responses row (RESPONSE_COLUMNS order) to a typed response.
fn row_to_response(row: &rusqlite::Row<'_>) -> SqliteResult<Response> {
    let id_raw: String = row.get(0)?;
    let user_raw: String = row.get(1)?;
    let exercise_raw: String = row.get(4)?;
    let target = ResponseTarget::from_parts(row.get(2)?, row.get(3)?)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Integer, Box::new(e)))?;
    Ok(Response {
        id: ResponseId::parse(&id_raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
        user_id: UserId::parse(&user_raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?,
        target,
        exercise_id: exercise_raw
            .parse()
            .map_err(|e: waybook_types::ExerciseRefError| {
                rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e))
            })?,
        activity_id: row.get(5)?,
        response_text: row.get(6)?,
        created_at: row.get::<_, i64>(7)? as u64,
        updated_at: row.get::<_, i64>(8)? as u64,
    })
}

// ============================================================================
// Tests
// ============================================================================
