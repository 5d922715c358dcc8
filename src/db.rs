use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "straxian.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS plans(
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL DEFAULT '',
            difficulty TEXT NOT NULL DEFAULT '',
            due_date TEXT,
            created_at TEXT NOT NULL,
            archived INTEGER NOT NULL DEFAULT 0,
            warning TEXT,
            category_mismatch TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_plans_owner ON plans(owner_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS plan_phases(
            id TEXT PRIMARY KEY,
            plan_id TEXT NOT NULL,
            name TEXT NOT NULL,
            date TEXT NOT NULL DEFAULT '',
            detail TEXT NOT NULL DEFAULT '',
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(plan_id) REFERENCES plans(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_plan_phases_plan ON plan_phases(plan_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS plan_habits(
            plan_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            habit TEXT NOT NULL,
            PRIMARY KEY(plan_id, sort_order),
            FOREIGN KEY(plan_id) REFERENCES plans(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS plan_hurdles(
            plan_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            issue TEXT NOT NULL,
            solution TEXT NOT NULL DEFAULT '',
            PRIMARY KEY(plan_id, sort_order),
            FOREIGN KEY(plan_id) REFERENCES plans(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS plan_resources(
            plan_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            kind TEXT NOT NULL DEFAULT '',
            price TEXT NOT NULL DEFAULT '',
            name TEXT NOT NULL,
            detail TEXT NOT NULL DEFAULT '',
            link TEXT,
            PRIMARY KEY(plan_id, sort_order),
            FOREIGN KEY(plan_id) REFERENCES plans(id)
        )",
        [],
    )?;

    // sort_order holds the normalized position (ascending parsed time,
    // stable ties); it is rewritten wholesale on every timetable mutation.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable_slots(
            plan_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            time_label TEXT NOT NULL,
            task TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY(plan_id, sort_order),
            FOREIGN KEY(plan_id) REFERENCES plans(id)
        )",
        [],
    )?;
    ensure_timetable_completed(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS notes(
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT 'Untitled',
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_notes_owner ON notes(owner_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS progress_days(
            plan_id TEXT NOT NULL,
            day TEXT NOT NULL,
            status TEXT NOT NULL,
            PRIMARY KEY(plan_id, day),
            FOREIGN KEY(plan_id) REFERENCES plans(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS chat_sessions(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            user_message TEXT NOT NULL,
            ai_response TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_chat_sessions_user ON chat_sessions(user_id, created_at)",
        [],
    )?;

    ensure_plans_due_date(&conn)?;

    Ok(conn)
}

// Workspaces created before completion tracking lack the column.
fn ensure_timetable_completed(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "timetable_slots", "completed")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE timetable_slots ADD COLUMN completed INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    Ok(())
}

fn ensure_plans_due_date(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "plans", "due_date")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE plans ADD COLUMN due_date TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
