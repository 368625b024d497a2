//! JSON backups of the collections read before anything is overwritten

use crate::config::SyncSettings;
use anyhow::{Context, Result};
use ccaction_shared::{updates_to_json, Updates};
use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};
use std::io::{self, Write};
use std::path::PathBuf;

/// Which collection of which server a backup holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupRole {
    SourceTemplates,
    DestTemplates,
    SourceActionBundles,
    DestActionBundles,
}

impl BackupRole {
    pub fn as_str(self) -> &'static str {
        match self {
            BackupRole::SourceTemplates => "source-cvp-tmpl",
            BackupRole::DestTemplates => "dest-cvp-tmpl",
            BackupRole::SourceActionBundles => "source-cvp-ab",
            BackupRole::DestActionBundles => "dest-cvp-ab",
        }
    }
}

/// Pretty printer that escapes everything outside printable ASCII as `\uXXXX`
struct AsciiPrettyFormatter<'a> {
    pretty: PrettyFormatter<'a>,
}

impl<'a> AsciiPrettyFormatter<'a> {
    fn with_indent(indent: &'a [u8]) -> Self {
        Self {
            pretty: PrettyFormatter::with_indent(indent),
        }
    }
}

impl Formatter for AsciiPrettyFormatter<'_> {
    fn begin_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_array(writer)
    }

    fn end_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.pretty.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object(writer)
    }

    fn end_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.pretty.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object_value(writer)
    }

    fn write_string_fragment<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() && ch != '\x7f' {
                writer.write_all(&[ch as u8])?;
            } else {
                // astral characters become a surrogate pair
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

/// Write `records` as 4-space indented ASCII JSON, replacing any earlier backup
pub async fn write_backup(
    settings: &SyncSettings,
    role: BackupRole,
    records: &Updates,
) -> Result<PathBuf> {
    let path = settings.backup_path(role.as_str());
    let mut buf = Vec::new();
    let formatter = AsciiPrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    updates_to_json(records).serialize(&mut serializer)?;

    tokio::fs::write(&path, &buf)
        .await
        .with_context(|| format!("writing backup {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::records::single;
    use ccaction_shared::StoreValue;

    #[tokio::test]
    async fn test_backup_is_indented_and_overwritten() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let settings = SyncSettings {
            work_dir: dir.path().to_path_buf(),
            ..Default::default()
        };

        let mut inner = Updates::new();
        inner.insert("name".into(), "upgrade".into());
        let records = single("t1", StoreValue::Map(inner));
        let path = write_backup(&settings, BackupRole::SourceTemplates, &records)
            .await
            .expect("backup failed");

        assert_eq!(path, dir.path().join("backupsource-cvp-tmpl.json"));
        let text = std::fs::read_to_string(&path).expect("read failed");
        assert_eq!(text, "{\n    \"t1\": {\n        \"name\": \"upgrade\"\n    }\n}");

        write_backup(&settings, BackupRole::SourceTemplates, &Updates::new())
            .await
            .expect("second backup failed");
        assert_eq!(std::fs::read_to_string(&path).expect("read failed"), "{}");
    }

    #[tokio::test]
    async fn test_non_ascii_is_escaped() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let settings = SyncSettings {
            work_dir: dir.path().to_path_buf(),
            ..Default::default()
        };

        let records = single("Größe", "déjà vu 😀".into());
        let path = write_backup(&settings, BackupRole::DestTemplates, &records)
            .await
            .expect("backup failed");

        let text = std::fs::read_to_string(&path).expect("read failed");
        assert!(text.is_ascii());
        assert_eq!(
            text,
            "{\n    \"Gr\\u00f6\\u00dfe\": \"d\\u00e9j\\u00e0 vu \\ud83d\\ude00\"\n}"
        );
        let parsed: serde_json::Value = serde_json::from_str(&text).expect("parse failed");
        assert_eq!(parsed["Größe"], "déjà vu 😀");
    }

    #[tokio::test]
    async fn test_unwritable_dir_is_fatal() {
        let settings = SyncSettings {
            work_dir: PathBuf::from("/nonexistent/ccaction"),
            ..Default::default()
        };
        let err = write_backup(&settings, BackupRole::DestActionBundles, &Updates::new())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("backupdest-cvp-ab.json"));
    }
}
