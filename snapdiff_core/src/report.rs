//! Diff output formatting.

use crate::diff::ChangeRecord;
use std::io::{self, Write};

/// Width of the marker column. Paths start one column after it.
pub const MARKER_WIDTH: usize = 4;

/// Render one change as an output line (without the newline).
///
/// ```
/// use snapdiff_core::{ChangeKind, ChangeRecord, format_record};
///
/// let record = ChangeRecord {
///     path: "/etc".to_string(),
///     kind: ChangeKind::Removed,
///     is_dir: true,
/// };
/// assert_eq!(format_record(&record), "-    /etc/");
/// ```
pub fn format_record(record: &ChangeRecord) -> String {
    format!(
        "{:<width$} {}",
        record.kind.marker(),
        record.display_path(),
        width = MARKER_WIDTH
    )
}

/// Writes one line per change to a sink.
pub struct DiffReporter<W: Write> {
    out: W,
}

impl<W: Write> DiffReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Write the line for `record`.
    pub fn report(&mut self, record: &ChangeRecord) -> io::Result<()> {
        writeln!(self.out, "{}", format_record(record))
    }

    /// Write a free-form line, such as the summary before a diff.
    pub fn note(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{}", line)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Get the sink back.
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{ChangeFlags, ChangeKind};

    fn record(path: &str, kind: ChangeKind, is_dir: bool) -> ChangeRecord {
        ChangeRecord {
            path: path.to_string(),
            kind,
            is_dir,
        }
    }

    #[test]
    fn test_format_markers_align_paths() {
        let content = ChangeFlags {
            content_changed: true,
            metadata_changed: true,
            ..ChangeFlags::default()
        };
        let all = ChangeFlags {
            type_changed: true,
            ..content
        };

        assert_eq!(format_record(&record("/c", ChangeKind::Added, false)), "+    /c");
        assert_eq!(format_record(&record("/b", ChangeKind::Removed, true)), "-    /b/");
        assert_eq!(
            format_record(&record("/a", ChangeKind::Modified(content), false)),
            "CM   /a"
        );
        assert_eq!(
            format_record(&record("/x", ChangeKind::Modified(all), true)),
            "TCM  /x/"
        );
    }

    #[test]
    fn test_reporter_writes_lines_in_order() {
        let mut reporter = DiffReporter::new(Vec::new());
        reporter.note("comparing snapshot aaaa to bbbb:").unwrap();
        reporter
            .report(&record("/a", ChangeKind::Added, false))
            .unwrap();
        reporter
            .report(&record("/b", ChangeKind::Removed, false))
            .unwrap();

        let output = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(output, "comparing snapshot aaaa to bbbb:\n+    /a\n-    /b\n");
    }
}
