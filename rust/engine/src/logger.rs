use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::PlayerId;

/// Record of one finished game, serialized as a single JSONL line for
/// archival and replay (the seed reproduces every shuffle).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Unique identifier (format: YYYYMMDD-NNNNNN)
    pub game_id: String,
    /// RNG seed, when the game was seeded
    pub seed: Option<u64>,
    /// Finish order per round, winner first, loser last
    pub rounds: Vec<Vec<PlayerId>>,
    /// Aggregate points per player
    pub scores: HashMap<PlayerId, u32>,
    /// Wall time from start to the terminal round signal
    pub elapsed_ms: i64,
    /// RFC3339 timestamp, injected on write when missing
    #[serde(default)]
    pub ts: Option<String>,
    /// Extensible metadata
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

pub fn format_game_id(yyyymmdd: &str, seq: u32) -> String {
    format!("{}-{:06}", yyyymmdd, seq)
}

/// Appends [`GameRecord`]s to a JSONL file, one line per finished game.
#[derive(Debug)]
pub struct GameLogger {
    writer: Option<BufWriter<File>>,
    date: String,
    seq: u32,
}

impl GameLogger {
    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                let _ = create_dir_all(parent);
            }
        }
        let f = File::create(path)?;
        Ok(Self {
            writer: Some(BufWriter::new(f)),
            date: Utc::now().format("%Y%m%d").to_string(),
            seq: 0,
        })
    }

    pub fn with_seq_for_test(date: &str) -> Self {
        Self {
            writer: None,
            date: date.to_string(),
            seq: 0,
        }
    }

    pub fn next_id(&mut self) -> String {
        self.seq += 1;
        format_game_id(&self.date, self.seq)
    }

    pub fn write(&mut self, record: &GameRecord) -> std::io::Result<()> {
        let mut rec = record.clone();
        if rec.ts.is_none() {
            rec.ts = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        let line = serde_json::to_string(&rec).map_err(std::io::Error::other)?;
        if let Some(w) = &mut self.writer {
            w.write_all(line.as_bytes())?;
            w.write_all(b"\n")?;
            w.flush()?;
        }
        Ok(())
    }
}
