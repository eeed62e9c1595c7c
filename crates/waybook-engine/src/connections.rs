//! Connection resolution: turning a connection id into the data it promises.
//!
//! Resolution is deliberately soft. A block that references a broken
//! connection still renders; the result carries `is_empty` and an optional
//! `error` string instead of failing the request. Only genuine storage
//! faults propagate as errors.
//!
//! Dispatch is a finite registry, not string-keyed lookups: `params.source`
//! parses into [`DataSource`], and each variant maps to one adapter query.
//! An unknown source resolves to no data.

use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use serde_json::{json, Value};
use strum::EnumString;
use tracing::debug;

use crate::db::WorkbookDb;
use crate::error::Result;
use waybook_types::{ConnectionMethod, ConnectionResult, ConnectionType, TransformParams, UserId};

/// Registry of user-data sources an auto-populate connection can name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DataSource {
    TransferableSkills,
    SoftSkills,
    AllSkills,
    KnowledgeSkills,
    SoaredStories,
    #[strum(serialize = "employment_history", serialize = "experiences")]
    EmploymentHistory,
    EducationHistory,
    FlowTracking,
    ValuesCompass,
    WorkLifeValues,
    CareerOptions,
    Budget,
    #[strum(serialize = "personality_code", serialize = "mbti_code")]
    PersonalityCode,
    LifeDashboard,
    Locations,
    IdeaTrees,
    UserLists,
    ProfileText,
}

impl DataSource {
    /// Parse from string (case-insensitive, with legacy aliases).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }
}

/// Resolve a connection for a user.
///
/// Missing connection, unknown source, unknown reference target, and
/// malformed params are all soft results. Resolution is read-only and
/// idempotent.
pub fn resolve(db: &WorkbookDb, user: UserId, connection_id: i64) -> Result<ConnectionResult> {
    let Some(row) = db.connection(connection_id)? else {
        debug!(connection_id, "connection not found");
        return Ok(ConnectionResult::not_found(connection_id));
    };
    let transform = TransformParams::parse(&row.params);

    let result = match ConnectionType::from_str(&row.connection_type) {
        Some(t) if t.is_auto_populate_direction() => {
            auto_populate(db, user, connection_id, &transform)?
        }
        Some(ConnectionType::Resource) => reference_link(db, connection_id, &transform)?,
        // Framework links and unknown types carry no fetch; the parsed
        // params are the payload.
        _ => custom(connection_id, &transform),
    };
    Ok(result)
}

fn auto_populate(
    db: &WorkbookDb,
    user: UserId,
    connection_id: i64,
    transform: &TransformParams,
) -> Result<ConnectionResult> {
    let source = transform.source.as_deref().and_then(DataSource::from_str);
    let data = match source {
        Some(source) => fetch_source(db.conn(), user, source, transform.filter.as_deref())?,
        None => {
            debug!(connection_id, source = ?transform.source, "unknown data source");
            None
        }
    };
    Ok(ConnectionResult {
        connection_id,
        method: ConnectionMethod::AutoPopulate,
        is_empty: is_empty_value(&data),
        data,
        source_exercise: transform.source_exercise(),
        error: None,
    })
}

fn reference_link(
    db: &WorkbookDb,
    connection_id: i64,
    transform: &TransformParams,
) -> Result<ConnectionResult> {
    let data = match transform.target.as_deref() {
        Some("skills_master") => Some(skills_master(db.conn())?),
        // Unknown reference targets are empty results, not errors.
        other => {
            debug!(connection_id, target = ?other, "unknown reference target");
            None
        }
    };
    Ok(ConnectionResult {
        connection_id,
        method: ConnectionMethod::ReferenceLink,
        is_empty: is_empty_value(&data),
        data,
        source_exercise: None,
        error: None,
    })
}

fn custom(connection_id: i64, transform: &TransformParams) -> ConnectionResult {
    let data = serde_json::to_value(transform).ok();
    ConnectionResult {
        connection_id,
        method: ConnectionMethod::Custom,
        is_empty: is_empty_value(&data),
        data,
        source_exercise: transform.source_exercise(),
        error: None,
    }
}

/// Empty means no data at all or an empty array. Objects and strings count
/// as data even when small.
fn is_empty_value(data: &Option<Value>) -> bool {
    match data {
        None | Some(Value::Null) => true,
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

// =========================================================================
// Source adapters
// =========================================================================

fn fetch_source(
    conn: &Connection,
    user: UserId,
    source: DataSource,
    filter: Option<&str>,
) -> SqliteResult<Option<Value>> {
    let data = match source {
        DataSource::TransferableSkills => Some(user_skills(conn, user, Some("transferable"), filter)?),
        DataSource::SoftSkills => Some(user_skills(conn, user, Some("soft"), None)?),
        DataSource::KnowledgeSkills => Some(user_skills(conn, user, Some("knowledge"), None)?),
        DataSource::AllSkills => Some(user_skills(conn, user, None, None)?),
        DataSource::SoaredStories => Some(soared_stories(conn, user)?),
        DataSource::EmploymentHistory => Some(employment_history(conn, user)?),
        DataSource::EducationHistory => Some(education_history(conn, user)?),
        DataSource::FlowTracking => Some(flow_tracking(conn, user, filter)?),
        DataSource::ValuesCompass => Some(user_values(conn, user, "compass")?),
        DataSource::WorkLifeValues => Some(user_values(conn, user, "work_life")?),
        DataSource::CareerOptions => Some(career_options(conn, user)?),
        DataSource::Budget => Some(budget(conn, user)?),
        DataSource::PersonalityCode => profile_field(conn, user, "personality_code")?.map(Value::String),
        DataSource::ProfileText => profile_field(conn, user, "profile_text")?.map(Value::String),
        DataSource::LifeDashboard => profile_field(conn, user, "dashboard_json")?
            .and_then(|raw| serde_json::from_str(&raw).ok()),
        DataSource::Locations => Some(locations(conn, user)?),
        DataSource::IdeaTrees => Some(idea_trees(conn, user)?),
        DataSource::UserLists => Some(user_lists(conn, user)?),
    };
    Ok(data)
}

fn user_skills(
    conn: &Connection,
    user: UserId,
    skill_type: Option<&str>,
    filter: Option<&str>,
) -> SqliteResult<Value> {
    // top_10_by_mastery: strongest first, rank breaks ties.
    let order = match filter {
        Some("top_10_by_mastery") => "ORDER BY mastery DESC, rank ASC LIMIT 10",
        _ => "ORDER BY rank, name",
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT name, mastery, rank FROM user_skills
         WHERE user_id = ?1 AND (?2 IS NULL OR skill_type = ?2) {order}"
    ))?;
    let rows = stmt.query_map(params![user.to_string(), skill_type], |row| {
        Ok(json!({
            "name": row.get::<_, String>(0)?,
            "mastery": row.get::<_, i64>(1)?,
            "rank": row.get::<_, i64>(2)?,
        }))
    })?;
    rows.collect::<SqliteResult<Vec<_>>>().map(Value::Array)
}

fn soared_stories(conn: &Connection, user: UserId) -> SqliteResult<Value> {
    let mut stmt =
        conn.prepare("SELECT title, text FROM user_stories WHERE user_id = ?1 ORDER BY id")?;
    let rows = stmt.query_map(params![user.to_string()], |row| {
        Ok(json!({
            "title": row.get::<_, String>(0)?,
            "text": row.get::<_, String>(1)?,
        }))
    })?;
    rows.collect::<SqliteResult<Vec<_>>>().map(Value::Array)
}

fn employment_history(conn: &Connection, user: UserId) -> SqliteResult<Value> {
    let mut stmt = conn.prepare(
        "SELECT employer, role, start_year, end_year FROM user_experiences
         WHERE user_id = ?1 ORDER BY start_year, id",
    )?;
    let rows = stmt.query_map(params![user.to_string()], |row| {
        Ok(json!({
            "employer": row.get::<_, String>(0)?,
            "role": row.get::<_, String>(1)?,
            "startYear": row.get::<_, Option<i64>>(2)?,
            "endYear": row.get::<_, Option<i64>>(3)?,
        }))
    })?;
    rows.collect::<SqliteResult<Vec<_>>>().map(Value::Array)
}

fn education_history(conn: &Connection, user: UserId) -> SqliteResult<Value> {
    let mut stmt = conn.prepare(
        "SELECT institution, credential, year FROM user_education
         WHERE user_id = ?1 ORDER BY year, id",
    )?;
    let rows = stmt.query_map(params![user.to_string()], |row| {
        Ok(json!({
            "institution": row.get::<_, String>(0)?,
            "credential": row.get::<_, Option<String>>(1)?,
            "year": row.get::<_, Option<i64>>(2)?,
        }))
    })?;
    rows.collect::<SqliteResult<Vec<_>>>().map(Value::Array)
}

fn flow_tracking(conn: &Connection, user: UserId, filter: Option<&str>) -> SqliteResult<Value> {
    let predicate = match filter {
        Some("high_energy_high_captivation") => "AND energy >= 1 AND focus >= 4",
        _ => "",
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT activity, energy, focus, logged_at FROM user_flow_logs
         WHERE user_id = ?1 {predicate} ORDER BY logged_at"
    ))?;
    let rows = stmt.query_map(params![user.to_string()], |row| {
        Ok(json!({
            "activity": row.get::<_, String>(0)?,
            "energy": row.get::<_, i64>(1)?,
            "focus": row.get::<_, i64>(2)?,
            "loggedAt": row.get::<_, i64>(3)?,
        }))
    })?;
    rows.collect::<SqliteResult<Vec<_>>>().map(Value::Array)
}

fn user_values(conn: &Connection, user: UserId, kind: &str) -> SqliteResult<Value> {
    let mut stmt = conn.prepare(
        "SELECT name, rank FROM user_values
         WHERE user_id = ?1 AND kind = ?2 ORDER BY rank, name",
    )?;
    let rows = stmt.query_map(params![user.to_string(), kind], |row| {
        Ok(json!({
            "name": row.get::<_, String>(0)?,
            "rank": row.get::<_, i64>(1)?,
        }))
    })?;
    rows.collect::<SqliteResult<Vec<_>>>().map(Value::Array)
}

fn career_options(conn: &Connection, user: UserId) -> SqliteResult<Value> {
    let mut stmt = conn
        .prepare("SELECT title, notes FROM user_career_options WHERE user_id = ?1 ORDER BY id")?;
    let rows = stmt.query_map(params![user.to_string()], |row| {
        Ok(json!({
            "title": row.get::<_, String>(0)?,
            "notes": row.get::<_, Option<String>>(1)?,
        }))
    })?;
    rows.collect::<SqliteResult<Vec<_>>>().map(Value::Array)
}

fn budget(conn: &Connection, user: UserId) -> SqliteResult<Value> {
    let mut stmt = conn
        .prepare("SELECT category, amount FROM user_budget_items WHERE user_id = ?1 ORDER BY id")?;
    let rows = stmt.query_map(params![user.to_string()], |row| {
        Ok(json!({
            "category": row.get::<_, String>(0)?,
            "amount": row.get::<_, f64>(1)?,
        }))
    })?;
    rows.collect::<SqliteResult<Vec<_>>>().map(Value::Array)
}

fn locations(conn: &Connection, user: UserId) -> SqliteResult<Value> {
    let mut stmt =
        conn.prepare("SELECT name, notes FROM user_locations WHERE user_id = ?1 ORDER BY id")?;
    let rows = stmt.query_map(params![user.to_string()], |row| {
        Ok(json!({
            "name": row.get::<_, String>(0)?,
            "notes": row.get::<_, Option<String>>(1)?,
        }))
    })?;
    rows.collect::<SqliteResult<Vec<_>>>().map(Value::Array)
}

fn idea_trees(conn: &Connection, user: UserId) -> SqliteResult<Value> {
    let mut stmt = conn
        .prepare("SELECT title, nodes_json FROM user_idea_trees WHERE user_id = ?1 ORDER BY id")?;
    let rows = stmt.query_map(params![user.to_string()], |row| {
        let nodes_raw: String = row.get(1)?;
        Ok(json!({
            "title": row.get::<_, String>(0)?,
            "nodes": serde_json::from_str::<Value>(&nodes_raw).unwrap_or(Value::Array(vec![])),
        }))
    })?;
    rows.collect::<SqliteResult<Vec<_>>>().map(Value::Array)
}

fn user_lists(conn: &Connection, user: UserId) -> SqliteResult<Value> {
    let mut stmt =
        conn.prepare("SELECT name, items_json FROM user_lists WHERE user_id = ?1 ORDER BY id")?;
    let rows = stmt.query_map(params![user.to_string()], |row| {
        let items_raw: String = row.get(1)?;
        Ok(json!({
            "name": row.get::<_, String>(0)?,
            "items": serde_json::from_str::<Value>(&items_raw).unwrap_or(Value::Array(vec![])),
        }))
    })?;
    rows.collect::<SqliteResult<Vec<_>>>().map(Value::Array)
}

/// One nullable column from the user's profile row.
fn profile_field(conn: &Connection, user: UserId, column: &str) -> SqliteResult<Option<String>> {
    // `column` is a fixed identifier chosen by the caller, never user input.
    let value: Option<Option<String>> = conn
        .query_row(
            &format!("SELECT {column} FROM user_profile WHERE user_id = ?1"),
            params![user.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.flatten())
}

/// The approved master skill list (shared reference material).
fn skills_master(conn: &Connection) -> SqliteResult<Value> {
    let mut stmt = conn.prepare(
        "SELECT name, category FROM skills
         WHERE is_custom = 0 AND review_status = 'approved'
         ORDER BY category, name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(json!({
            "name": row.get::<_, String>(0)?,
            "category": row.get::<_, String>(1)?,
        }))
    })?;
    rows.collect::<SqliteResult<Vec<_>>>().map(Value::Array)
}

// ============================================================================
// Tests
// ============================================================================
