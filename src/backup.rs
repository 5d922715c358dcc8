//! Workspace backup bundles: a zip carrying a manifest that describes the
//! workspace contents plus the database file itself. Import stages the
//! incoming database and verifies its schema before the live file is
//! replaced, so a bad backup can never brick a workspace.

use anyhow::{bail, Context};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::db::DB_FILE_NAME;

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/straxian.sqlite3";
const STAGED_DB_NAME: &str = "straxian.sqlite3.importing";
pub const BUNDLE_FORMAT_V1: &str = "straxian-workspace-v1";

// Tables a restorable workspace database must carry. Checked on both the
// bundle and raw-sqlite import paths.
const REQUIRED_TABLES: [&str; 6] = [
    "plans",
    "plan_phases",
    "timetable_slots",
    "notes",
    "progress_days",
    "chat_sessions",
];

/// Row counts for the content tables a user would ask about.
#[derive(Debug, Clone)]
pub struct WorkspaceStats {
    pub plans: i64,
    pub notes: i64,
    pub chat_sessions: i64,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub stats: WorkspaceStats,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub stats: WorkspaceStats,
}

pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(DB_FILE_NAME);
    if !db_path.is_file() {
        bail!("workspace has no database at {}", db_path.display());
    }

    // The manifest describes what is inside, not just the format tag, so a
    // user can tell backups apart without restoring them.
    let stats = {
        let conn = Connection::open(&db_path)
            .with_context(|| format!("cannot open workspace database {}", db_path.display()))?;
        workspace_stats(&conn)?
    };
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": unix_now(),
        "counts": {
            "plans": stats.plans,
            "notes": stats.notes,
            "chatSessions": stats.chat_sessions,
        },
    });

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create directory {}", parent.display()))?;
    }
    let out_file = File::create(out_path)
        .with_context(|| format!("cannot create bundle {}", out_path.display()))?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(MANIFEST_ENTRY, opts)
        .context("cannot start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("cannot serialize manifest")?
            .as_bytes(),
    )
    .context("cannot write manifest entry")?;

    zip.start_file(DB_ENTRY, opts)
        .context("cannot start database entry")?;
    let mut db_file = File::open(&db_path)
        .with_context(|| format!("cannot read workspace database {}", db_path.display()))?;
    std::io::copy(&mut db_file, &mut zip).context("cannot write database entry")?;

    zip.finish().context("cannot finalize bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 2,
        stats,
    })
}

pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace_path)
        .with_context(|| format!("cannot create workspace {}", workspace_path.display()))?;
    let staged = workspace_path.join(STAGED_DB_NAME);

    let detected = if is_zip_file(in_path)? {
        if let Err(e) = extract_bundle_db(in_path, &staged) {
            let _ = std::fs::remove_file(&staged);
            return Err(e);
        }
        BUNDLE_FORMAT_V1
    } else {
        // A bare sqlite copy is accepted too, subject to the same schema
        // check as a bundle.
        std::fs::copy(in_path, &staged)
            .with_context(|| format!("cannot stage raw backup {}", in_path.display()))?;
        "raw-sqlite3"
    };

    let stats = match verify_workspace_db(&staged) {
        Ok(s) => s,
        Err(e) => {
            let _ = std::fs::remove_file(&staged);
            return Err(e);
        }
    };

    let dst = workspace_path.join(DB_FILE_NAME);
    if dst.exists() {
        std::fs::remove_file(&dst)
            .with_context(|| format!("cannot replace live database {}", dst.display()))?;
    }
    std::fs::rename(&staged, &dst)
        .with_context(|| format!("cannot move staged database to {}", dst.display()))?;

    Ok(ImportSummary {
        bundle_format_detected: detected.to_string(),
        stats,
    })
}

fn extract_bundle_db(in_path: &Path, staged: &Path) -> anyhow::Result<()> {
    let in_file = File::open(in_path)
        .with_context(|| format!("cannot open bundle {}", in_path.display()))?;
    let mut archive = ZipArchive::new(in_file).context("bundle is not a valid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle has no manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("cannot read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is not valid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    if format != BUNDLE_FORMAT_V1 {
        bail!("unrecognized bundle format {:?}", format);
    }

    let mut out = File::create(staged)
        .with_context(|| format!("cannot stage database at {}", staged.display()))?;
    let mut entry = archive
        .by_name(DB_ENTRY)
        .with_context(|| format!("bundle has no {} entry", DB_ENTRY))?;
    std::io::copy(&mut entry, &mut out).context("cannot extract database entry")?;
    out.flush().context("cannot flush staged database")?;
    Ok(())
}

/// Open the staged file as SQLite and require the workspace tables; anything
/// else is rejected before it can touch the live database.
fn verify_workspace_db(path: &Path) -> anyhow::Result<WorkspaceStats> {
    let conn = Connection::open(path).context("staged file cannot be opened as a database")?;
    for table in REQUIRED_TABLES {
        let found: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
                [table],
                |r| r.get(0),
            )
            .optional()
            .context("staged file is not a workspace database")?;
        if found.is_none() {
            bail!("staged database is missing the {} table", table);
        }
    }
    workspace_stats(&conn)
}

fn workspace_stats(conn: &Connection) -> anyhow::Result<WorkspaceStats> {
    let count = |table: &str| -> anyhow::Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        Ok(conn.query_row(&sql, [], |r| r.get(0))?)
    };
    Ok(WorkspaceStats {
        plans: count("plans")?,
        notes: count("notes")?,
        chat_sessions: count("chat_sessions")?,
    })
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("cannot open input file {}", path.display()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("cannot read file signature")?;
    Ok(read == 4 && sig == [0x50, 0x4B, 0x03, 0x04])
}
