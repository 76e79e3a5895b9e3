use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::loader::LineStore;

/// Write `lines` to `path` as UTF-8, one per line with no trailing newline
pub fn export_lines(lines: &LineStore, path: &Path) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            writer.write_all(b"\n")?;
        }
        writer.write_all(line.as_bytes())?;
    }
    writer.flush()?;
    info!(path = %path.display(), lines = lines.len(), "exported lines");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grep::GrepView;
    use crate::loader::ChunkedLoader;

    #[test]
    fn test_export_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let store = LineStore::from_lines(vec!["first".into(), "".into(), "日志 third".into()]);
        export_lines(&store, &path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\n\n日志 third");
        let loaded = ChunkedLoader::default().load(&path, |_, _| {}).unwrap();
        assert_eq!(loaded.lines.lines(), store.lines());
    }

    #[test]
    fn test_export_grep_view() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grep.log");
        let source = LineStore::from_lines(vec!["a ERROR".into(), "b".into(), "c ERROR".into()]);
        export_lines(GrepView::new(&source, "ERROR").lines(), &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a ERROR\nc ERROR");
    }

    #[test]
    fn test_export_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.log");
        export_lines(&LineStore::new(), &path).unwrap();
        assert!(std::fs::read(&path).unwrap().is_empty());
    }
}
