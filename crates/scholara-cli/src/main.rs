use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use scholara_core::{SortOption, Subject, config_file, rank_contributors};
use scholara_store::Store;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

/// Scholara Collective - tools for the study resource store
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract plain text from a PDF, DOCX, or text file
    Extract {
        /// File to extract
        file_path: PathBuf,

        /// MIME type to use instead of detecting one
        #[arg(long)]
        mime: Option<String>,
    },

    /// Insert subjects from a TOML file (`[[subjects]]` tables); existing values are skipped
    SeedSubjects {
        /// Path to the SQLite database
        db: PathBuf,

        /// TOML file with `[[subjects]]` entries of value, label, category
        file: PathBuf,
    },

    /// List subjects in insertion order
    Subjects {
        /// Path to the SQLite database
        db: PathBuf,
    },

    /// List contributors ranked by uploads
    Contributors {
        /// Path to the SQLite database
        db: PathBuf,

        /// contributions-desc, contributions-asc, name-asc, or name-desc
        #[arg(long, default_value = "contributions-desc")]
        sort: String,

        /// Case-insensitive match on name or e-mail
        #[arg(long)]
        search: Option<String>,
    },

    /// Print the merged configuration file
    Config,
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    subjects: Vec<Subject>,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let color = ColorMode(!cli.no_color);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Extract { file_path, mime } => extract(&mut out, &file_path, mime.as_deref()),
        Command::SeedSubjects { db, file } => seed_subjects(&mut out, &db, &file, color),
        Command::Subjects { db } => {
            let store = open_store(&db)?;
            output::print_subjects(&mut out, &store.subjects()?, color)?;
            Ok(())
        }
        Command::Contributors { db, sort, search } => {
            let sort: SortOption = sort.parse()?;
            let store = open_store(&db)?;
            let ranked = rank_contributors(store.contributors()?, search.as_deref(), sort);
            output::print_contributors(&mut out, &ranked, color)?;
            Ok(())
        }
        Command::Config => {
            let config = config_file::load_config();
            write!(out, "{}", toml::to_string_pretty(&config)?)?;
            Ok(())
        }
    }
}

fn open_store(path: &Path) -> anyhow::Result<Store> {
    Store::open(path).with_context(|| format!("failed to open database {}", path.display()))
}

fn extract(w: &mut dyn Write, path: &Path, mime: Option<&str>) -> anyhow::Result<()> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mime = scholara_ingest::effective_mime(mime, &filename, &data)
        .with_context(|| format!("cannot determine the type of {filename}; pass --mime"))?;
    let extracted = scholara_ingest::extract_text(&data, &mime)?;
    writeln!(w, "{}", extracted.text)?;
    Ok(())
}

fn load_seed_file(path: &Path) -> anyhow::Result<Vec<Subject>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let seed: SeedFile =
        toml::from_str(&content).with_context(|| format!("invalid seed file {}", path.display()))?;
    seed.subjects
        .into_iter()
        .map(|s| s.normalized().map_err(anyhow::Error::from))
        .collect()
}

fn seed_subjects(
    w: &mut dyn Write,
    db: &Path,
    file: &Path,
    color: ColorMode,
) -> anyhow::Result<()> {
    let subjects = load_seed_file(file)?;
    let store = open_store(db)?;
    let inserted = store.seed_subjects(&subjects)?;
    let skipped = subjects.len() - inserted;
    if color.enabled() {
        writeln!(
            w,
            "{} {} subjects ({} already present)",
            "Seeded".green().bold(),
            inserted,
            skipped
        )?;
    } else {
        writeln!(w, "Seeded {inserted} subjects ({skipped} already present)")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_file_round_trip_into_store() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("subjects.toml");
        std::fs::write(
            &seed,
            r#"
[[subjects]]
value = "physics"
label = "Physics"
category = "Science"

[[subjects]]
value = " history "
label = "History"
category = "Humanities"
"#,
        )
        .unwrap();
        let db = dir.path().join("scholara.db");

        let mut out = Vec::new();
        seed_subjects(&mut out, &db, &seed, ColorMode(false)).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Seeded 2 subjects (0 already present)\n"
        );

        let mut out = Vec::new();
        seed_subjects(&mut out, &db, &seed, ColorMode(false)).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("(2 already present)"));

        let store = Store::open(&db).unwrap();
        let values: Vec<String> = store.subjects().unwrap().into_iter().map(|s| s.value).collect();
        assert_eq!(values, ["physics", "history"]);
    }

    #[test]
    fn seed_file_rejects_blank_fields() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("bad.toml");
        std::fs::write(
            &seed,
            "[[subjects]]\nvalue = \"\"\nlabel = \"X\"\ncategory = \"Y\"\n",
        )
        .unwrap();
        assert!(load_seed_file(&seed).is_err());
    }

    #[test]
    fn extract_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Week 3\nVectors").unwrap();
        let mut out = Vec::new();
        extract(&mut out, &path, None).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "# Week 3\nVectors\n");
    }

    #[test]
    fn extract_unknown_type_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, [0u8, 1, 2, 3]).unwrap();
        let mut out = Vec::new();
        assert!(extract(&mut out, &path, None).is_err());
    }

    #[test]
    fn cli_parses_contributors_flags() {
        let cli = Cli::try_parse_from([
            "scholara",
            "contributors",
            "store.db",
            "--sort",
            "name-asc",
            "--search",
            "ada",
        ])
        .unwrap();
        match cli.command {
            Command::Contributors { sort, search, .. } => {
                assert_eq!(sort, "name-asc");
                assert_eq!(search.as_deref(), Some("ada"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
