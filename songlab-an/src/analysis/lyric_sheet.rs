//! Plain-text lyric sheet
//!
//! Aligned lines render as a chord line over the lyric text; plain lines
//! render as timestamped text only.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::models::{LyricsData, NO_CHORD};

pub const LYRIC_SHEET_FILE_NAME: &str = "lyrics.txt";

fn timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Render the sheet as a string
pub fn render_lyric_sheet(title: &str, lyrics: &LyricsData) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "=".repeat(title.chars().count().max(1)));

    match lyrics {
        LyricsData::Aligned(lines) => {
            for line in lines {
                out.push('\n');
                if line.chord_name != NO_CHORD {
                    let _ = writeln!(out, "        {}", line.chord_name);
                }
                let _ = writeln!(out, "[{}]  {}", timestamp(line.start), line.text);
            }
        }
        LyricsData::Plain(lines) => {
            for line in lines {
                let _ = writeln!(out, "\n[{}]  {}", timestamp(line.start), line.text);
            }
        }
    }

    out
}

/// Write the sheet into `dir`, returning its path
pub async fn write_lyric_sheet(
    dir: &Path,
    title: &str,
    lyrics: &LyricsData,
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(LYRIC_SHEET_FILE_NAME);
    tokio::fs::write(&path, render_lyric_sheet(title, lyrics)).await?;
    Ok(path)
}
