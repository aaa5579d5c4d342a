//! Offline provider reading recorded payloads from disk.
//!
//! `{dir}/{slug}.json` where slug is the lowercased id with every
//! non-alphanumeric run collapsed to `_` ("LeBron James" → `lebron_james.json`).
//! Files use the same shape as the HTTP payload.

use chrono::Utc;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::payload::PlayerPayload;
use super::provider::{RetrievalError, StatsProvider};
use crate::domain::{DataSource, RawRecord, SubjectId};

pub struct FixtureProvider {
    dir: PathBuf,
}

impl FixtureProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, subject: &SubjectId) -> PathBuf {
        self.dir.join(format!("{}.json", slug(subject.as_str())))
    }
}

pub fn slug(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    let mut pending_sep = false;
    for c in id.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

impl StatsProvider for FixtureProvider {
    fn name(&self) -> &str {
        "fixture"
    }

    fn fetch(&self, subject: &SubjectId) -> Result<RawRecord, RetrievalError> {
        let path = self.path_for(subject);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RetrievalError::NotFound {
                    subject: subject.to_string(),
                })
            }
            Err(e) => {
                return Err(RetrievalError::NetworkUnreachable(format!(
                    "read {}: {e}",
                    path.display()
                )))
            }
        };
        PlayerPayload::from_slice(&bytes, subject)?.into_record(subject, Utc::now(), DataSource::Fixture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        assert_eq!(slug("LeBron James"), "lebron_james");
        assert_eq!(slug("  Shai Gilgeous-Alexander "), "shai_gilgeous_alexander");
        assert_eq!(slug("D'Angelo Russell"), "d_angelo_russell");
    }

    #[test]
    fn reads_fixture_payload() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("lebron_james.json"),
            r#"{"name":"LeBron James","ppg":25.7,"rpg":7.3,"game_log":[{"pts":28},{"pts":31}]}"#,
        )
        .unwrap();

        let provider = FixtureProvider::new(dir.path());
        let record = provider.fetch(&SubjectId::new("LeBron James")).unwrap();
        assert_eq!(record.source, DataSource::Fixture);
        assert_eq!(record.metric("points_per_game"), Some(25.7));
        assert_eq!(record.series["points_per_game"], vec![28.0, 31.0]);
    }

    #[test]
    fn missing_and_corrupt_fixtures() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), "{").unwrap();
        let provider = FixtureProvider::new(dir.path());

        assert!(matches!(
            provider.fetch(&SubjectId::new("Ghost")),
            Err(RetrievalError::NotFound { .. })
        ));
        assert!(matches!(
            provider.fetch(&SubjectId::new("bad")),
            Err(RetrievalError::MalformedResponse(_))
        ));
    }
}
