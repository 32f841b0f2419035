// A minimal, concrete `SourceStream`: newline-delimited JSON, one
// externally-tagged `OsmRecord` per line (`{"node": {...}}`,
// `{"way": {...}}`, `{"relation": {...}}`). This is *not* the production
// PBF/XML parser spec.md treats as external (§1, §6) — it exists so the
// pipeline has a runnable, testable concrete stream without a native
// libosmium binding. A real deployment swaps this for a genuine decoder
// behind the same `SourceStream` trait.

use crate::record::OsmRecord;
use osm_hist_base::Error;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

pub struct JsonlSourceStream {
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl JsonlSourceStream {
    pub fn open(path: impl AsRef<Path>) -> osm_hist_base::Result<Self> {
        let file = File::open(path)?;
        Ok(JsonlSourceStream {
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }
}

impl Iterator for JsonlSourceStream {
    type Item = osm_hist_base::Result<OsmRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(Error::Io(e))),
            };
            self.line_no += 1;
            if raw.trim().is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str::<OsmRecord>(&raw)
                    .map_err(|e| Error::source_read("jsonl", e)),
            );
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_tagged_records_in_order() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            r#"{{"node":{{"meta":{{"id":1,"version":1,"timestamp":10,"visible":true,"tags":[],"user":"a","uid":1,"changeset":1}},"lon":0.0,"lat":0.0}}}}"#
        )
        .unwrap();
        writeln!(
            tmp,
            r#"{{"way":{{"meta":{{"id":9,"version":1,"timestamp":20,"visible":true,"tags":[],"user":"a","uid":1,"changeset":1}},"nodes":[1,2]}}}}"#
        )
        .unwrap();
        let stream = JsonlSourceStream::open(tmp.path()).unwrap();
        let records: Vec<_> = stream.collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id(), 1);
        assert_eq!(records[1].id(), 9);
    }
}
