//! Workload sources: entities that create the initial stream of job
//! arrival events, either from a trace file or synthetically.

pub mod random;
pub mod swf;

pub use random::RandomWorkloadGenerator;
pub use swf::SwfWorkloadReader;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Result;

/// Symbol starting a comment line in event files.
const COMMENT: &str = "#";

/// Reads a line-oriented event file, skipping comment and empty lines,
/// and hands the fields of each remaining line to `handler` together with
/// the 1-based line number. Fields are split on `delimiter`, or on any
/// whitespace when no delimiter is given.
pub fn read_event_file(
    path: &Path,
    delimiter: Option<char>,
    mut handler: impl FnMut(usize, &[&str]),
) -> Result<()> {
    log::info!("Loading events from file: {}", path.display());
    let reader = BufReader::new(File::open(path)?);

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with(COMMENT) {
            continue;
        }
        let fields: Vec<&str> = match delimiter {
            Some(delim) => line.split(delim).map(str::trim).collect(),
            None => line.split_whitespace().collect(),
        };
        handler(index + 1, &fields);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let mut path = std::env::temp_dir();
        path.push(format!("clustersim-events-{}.txt", std::process::id()));
        let mut file = File::create(&path).unwrap();
        writeln!(file, "# header").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "1 0 0 10 4").unwrap();
        writeln!(file, "  2 5 0 20 2").unwrap();
        drop(file);

        let mut seen = Vec::new();
        read_event_file(&path, None, |line, fields| {
            seen.push((line, fields.iter().map(|s| s.to_string()).collect::<Vec<_>>()));
        })
        .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, 3);
        assert_eq!(seen[0].1, vec!["1", "0", "0", "10", "4"]);
        assert_eq!(seen[1].1[0], "2");
    }
}
