//! One edit run against one property file: validate, load, apply, persist.
//!
//! Everything that can be rejected is rejected before the file is opened.
//! The new content is rendered into memory first and written with a single
//! call, so a failed run leaves the previous file in place. The one
//! exception is a write that fails halfway, in which case the truncated file
//! is removed rather than left behind.

use std::fmt;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::crypto::{Algorithm, PbeCodec};
use crate::editor::{EntryEditor, RunMode};
use crate::entry::{Entry, EntrySpec};
use crate::error::{EditError, EditResult};
use crate::properties::{self, PropertyMap};

/// Header timestamp layout, matching `java.util.Date#toString` minus the zone.
const TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// Outcome of a successful run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub path: PathBuf,
    /// The file did not exist and was created by this run.
    pub created: bool,
    pub entries_applied: usize,
    pub properties_written: usize,
}

/// Configuration of a single run.
pub struct PropertyFileEdit {
    path: PathBuf,
    mode: RunMode,
    algorithm: Algorithm,
    password: Option<String>,
    comment: Option<String>,
    entries: Vec<EntrySpec>,
    skip_empty_values: bool,
    clock: Option<NaiveDateTime>,
}

impl fmt::Debug for PropertyFileEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyFileEdit")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("algorithm", &self.algorithm)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("comment", &self.comment)
            .field("entries", &self.entries.len())
            .field("skip_empty_values", &self.skip_empty_values)
            .finish()
    }
}

impl Drop for PropertyFileEdit {
    fn drop(&mut self) {
        if let Some(password) = self.password.as_mut() {
            password.zeroize();
        }
    }
}

impl PropertyFileEdit {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: RunMode::default(),
            algorithm: Algorithm::default(),
            password: None,
            comment: None,
            entries: Vec::new(),
            skip_empty_values: false,
            clock: None,
        }
    }

    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn entry(mut self, entry: EntrySpec) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn entries(mut self, entries: impl IntoIterator<Item = EntrySpec>) -> Self {
        self.entries.extend(entries);
        self
    }

    pub fn skip_empty_values(mut self, allowed: bool) -> Self {
        self.skip_empty_values = allowed;
        self
    }

    /// Pins "now" for date arithmetic and the header timestamp.
    pub fn clock(mut self, now: NaiveDateTime) -> Self {
        self.clock = Some(now);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_mode(&self) -> RunMode {
        self.mode
    }

    pub fn entry_specs(&self) -> &[EntrySpec] {
        &self.entries
    }

    /// Executes the run.
    pub fn run(&self) -> EditResult<RunSummary> {
        let entries = self.validate()?;
        let codec = self.build_codec()?;
        let now = self.clock.unwrap_or_else(|| Local::now().naive_local());

        let (mut props, created) = self.load()?;
        let editor = EntryEditor::new(codec.as_ref(), self.mode, self.skip_empty_values, now);
        for entry in &entries {
            editor.apply(entry, &mut props)?;
        }

        let mut buffer = Vec::new();
        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
        properties::write(&mut buffer, &props, self.comment.as_deref(), &timestamp)
            .map_err(|e| EditError::io(&self.path, e))?;
        self.persist(&buffer)?;

        info!(
            path = %self.path.display(),
            mode = %self.mode,
            entries = entries.len(),
            properties = props.len(),
            "{} property file",
            if created { "created" } else { "updated" }
        );
        Ok(RunSummary {
            path: self.path.clone(),
            created,
            entries_applied: entries.len(),
            properties_written: props.len(),
        })
    }

    fn validate(&self) -> EditResult<Vec<Entry>> {
        if self.path.as_os_str().is_empty() {
            return Err(EditError::Validation("file is mandatory".to_string()));
        }
        if self.mode != RunMode::None && self.password.as_deref().map_or(true, str::is_empty) {
            return Err(EditError::Validation(format!(
                "a password is required for mode {}",
                self.mode
            )));
        }
        self.entries.iter().map(EntrySpec::validate).collect()
    }

    fn build_codec(&self) -> EditResult<Option<PbeCodec>> {
        match (&self.mode, self.password.as_deref()) {
            (RunMode::None, _) | (_, None) => Ok(None),
            (_, Some(password)) => PbeCodec::new(password, self.algorithm)
                .map(Some)
                .map_err(|e| EditError::Configuration(format!("{e}"))),
        }
    }

    fn load(&self) -> EditResult<(PropertyMap, bool)> {
        match fs::read(&self.path) {
            Ok(bytes) => {
                let props = properties::parse(&bytes).map_err(|e| EditError::Malformed {
                    path: self.path.display().to_string(),
                    reason: format!("{e}"),
                })?;
                debug!(path = %self.path.display(), properties = props.len(), "loaded property file");
                Ok((props, false))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "property file missing, creating it");
                File::create(&self.path).map_err(|e| EditError::io(&self.path, e))?;
                Ok((PropertyMap::new(), true))
            }
            Err(err) => Err(EditError::io(&self.path, err)),
        }
    }

    fn persist(&self, content: &[u8]) -> EditResult<()> {
        let mut file = File::create(&self.path).map_err(|e| EditError::io(&self.path, e))?;
        // write-back errors must reach the cleanup branch, not be lost on drop
        if let Err(err) = file.write_all(content).and_then(|()| file.sync_all()) {
            drop(file);
            if let Err(cleanup) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %cleanup, "could not remove partial file");
            }
            return Err(EditError::io(&self.path, err));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::open_envelope;
    use crate::entry::{EntryType, Operation};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .and_then(|d| d.and_hms_opt(8, 30, 0))
            .unwrap()
    }

    fn read(path: &Path) -> PropertyMap {
        properties::parse(&fs::read(path).expect("file readable")).expect("parsable")
    }

    #[test]
    fn creates_missing_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("new.properties");
        let summary = PropertyFileEdit::new(&path)
            .skip_empty_values(true)
            .entry(EntrySpec::new("GREETING").value("hello"))
            .clock(fixed_now())
            .run()
            .expect("run succeeds");

        assert!(summary.created);
        assert_eq!(summary.properties_written, 1);
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "#Mon Jan 15 08:30:00 2024\nGREETING=hello\n");
    }

    #[test]
    fn writes_comment_header() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("c.properties");
        fs::write(&path, "A=1\n").unwrap();
        PropertyFileEdit::new(&path)
            .comment("managed by secprop")
            .clock(fixed_now())
            .run()
            .expect("run succeeds");
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "#managed by secprop\n#Mon Jan 15 08:30:00 2024\nA=1\n");
    }

    #[test]
    fn validation_happens_before_io() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("untouched.properties");

        let no_password = PropertyFileEdit::new(&path)
            .mode(RunMode::Encrypt)
            .entry(EntrySpec::new("A").value("x"));
        assert!(matches!(no_password.run(), Err(EditError::Validation(_))));

        let bad_entry = PropertyFileEdit::new(&path)
            .entry(EntrySpec::new("NAME").value("x").operation(Operation::Decrement));
        assert!(matches!(bad_entry.run(), Err(EditError::Validation(_))));

        let no_path = PropertyFileEdit::new("");
        assert!(matches!(no_path.run(), Err(EditError::Validation(_))));

        let non_ascii = PropertyFileEdit::new(&path)
            .mode(RunMode::Encrypt)
            .password("pässword");
        assert!(matches!(non_ascii.run(), Err(EditError::Configuration(_))));

        assert!(!path.exists());
    }

    #[test]
    fn failed_entry_leaves_file_unchanged() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("keep.properties");
        let original = "# hand written\nA=1\nB = two\n";
        fs::write(&path, original).unwrap();

        let err = PropertyFileEdit::new(&path)
            .entry(EntrySpec::new("A").value("2"))
            .entry(EntrySpec::new("MISSING").value("x"))
            .run()
            .unwrap_err();
        assert!(matches!(err, EditError::EmptyValue(key) if key == "MISSING"));
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("bad.properties");
        fs::write(&path, "A=\\u12\n").unwrap();
        let err = PropertyFileEdit::new(&path).run().unwrap_err();
        assert!(matches!(err, EditError::Malformed { .. }));
    }

    // Failures of write_all or sync_all after the file was created take the
    // remove-and-fail branch of `persist`; that needs fault injection (a full
    // disk or a failing NFS mount), so only the open failure is covered here.
    #[test]
    fn unwritable_destination_is_an_io_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("missing-dir").join("x.properties");
        let err = PropertyFileEdit::new(&path).run().unwrap_err();
        assert!(matches!(err, EditError::Io { .. }));
    }

    #[test]
    fn encrypts_values_in_place() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("secret.properties");
        fs::write(&path, "DB_USER=app\nDB_PASSWORD=changeme\n").unwrap();

        PropertyFileEdit::new(&path)
            .mode(RunMode::Encrypt)
            .algorithm(Algorithm::Sha1AndRc2_40)
            .password("XFb3T4Zy")
            .entry(EntrySpec::new("DB_PASSWORD").value("secret"))
            .clock(fixed_now())
            .run()
            .expect("run succeeds");

        let props = read(&path);
        assert_eq!(props.keys().collect::<Vec<_>>(), ["DB_USER", "DB_PASSWORD"]);
        assert_eq!(props["DB_USER"], "app");
        let codec = PbeCodec::new("XFb3T4Zy", Algorithm::Sha1AndRc2_40).unwrap();
        let ciphertext = open_envelope(&props["DB_PASSWORD"]).expect("wrapped");
        assert_eq!(codec.decrypt(ciphertext).unwrap(), "secret");
    }

    #[test]
    fn date_entry_uses_pinned_clock() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("dates.properties");
        PropertyFileEdit::new(&path)
            .skip_empty_values(true)
            .entry(
                EntrySpec::new("BUILT_AT")
                    .value("now")
                    .kind(EntryType::Date)
                    .pattern("yyyy-MM-dd'T'HH:mm"),
            )
            .clock(fixed_now())
            .run()
            .expect("run succeeds");
        assert_eq!(read(&path)["BUILT_AT"], "2024-01-15T08:30");
    }

    #[test]
    fn debug_output_hides_password() {
        let edit = PropertyFileEdit::new("x.properties").password("hunter2");
        assert!(!format!("{edit:?}").contains("hunter2"));
    }
}
