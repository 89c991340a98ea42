//! Saving a session to disk.
//!
//! A [`SessionFile`] owns one session's state and the path it lives at.
//! Every full save goes through a sibling temp file (see
//! [`temp_version_of()`]): the state is written there first and then renamed
//! over the target, so a save that fails part-way never leaves a truncated
//! session behind. The same temp file doubles as the autosave written by
//! [`SessionFile::save_temp_version()`].

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::cache::{SessionCache, SessionData};
use crate::error::SessionError;
use crate::format::{self, SessionFormat};
use crate::load::load_session;
use crate::prompt::{CloseChoice, SavePrompt};
use crate::state::{PropertyValue, SESSION_ID_PROPERTY, SessionState};
use crate::writer::FileWriter;

/// Prefix of the temp file kept next to every session file.
pub const TEMP_FILE_PREFIX: &str = ".tmp_";

/// Returns the temp file used while saving `path`: a hidden sibling named
/// after the file's stem. `song.tdm` becomes `.tmp_song`.
pub fn temp_version_of(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{TEMP_FILE_PREFIX}{stem}"))
}

/// Process-wide services shared by every [`SessionFile`].
///
/// Cloning the context shares the cache and the writer thread.
#[derive(Clone)]
pub struct SessionContext {
    cache: SessionCache,
    writer: Arc<FileWriter>,
}

impl SessionContext {
    /// Creates a context with an empty cache and its own writer thread.
    pub fn new() -> Result<Self, SessionError> {
        Ok(Self {
            cache: SessionCache::new(),
            writer: Arc::new(FileWriter::new()?),
        })
    }

    /// Returns the shared per-session cache.
    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Returns the background writer.
    pub fn writer(&self) -> &FileWriter {
        &self.writer
    }
}

/// Flags for [`SessionFile::save()`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Ask the prompt whether to carry on when the save fails.
    pub warn_of_failure: bool,
    /// Replace the file even if nothing changed since the last save.
    pub force: bool,
    /// Ask whether to save or discard the changes, as when closing.
    pub offer_to_discard: bool,
}

/// What a successful [`SessionFile::save()`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The session file was replaced.
    Saved,
    /// Nothing had changed, the file was left alone.
    Unchanged,
    /// The user chose to throw the changes away.
    Discarded,
    /// The save failed and the user chose to carry on anyway.
    ProceededDespiteError,
}

/// An open session and the file it is saved to.
pub struct SessionFile {
    ctx: SessionContext,
    path: Option<PathBuf>,
    state: SessionState,
    dirty: bool,
    data: Option<Arc<SessionData>>,
}

impl SessionFile {
    /// Creates a new, empty session.
    ///
    /// Nothing is written until the session is saved.
    pub fn new(ctx: &SessionContext, session_id: &str, path: Option<PathBuf>) -> Self {
        let state = SessionState::new_session().with_property(SESSION_ID_PROPERTY, session_id);
        Self::with_state(ctx, session_id, state, path)
    }

    /// Opens the session at `path`. See [`load_session()`].
    pub fn open(
        ctx: &SessionContext,
        path: impl Into<PathBuf>,
        session_id: &str,
    ) -> Result<Self, SessionError> {
        let path = path.into();
        let state = load_session(&path, session_id)?;
        Ok(Self::with_state(ctx, session_id, state, Some(path)))
    }

    fn with_state(
        ctx: &SessionContext,
        session_id: &str,
        state: SessionState,
        path: Option<PathBuf>,
    ) -> Self {
        let data = ctx.cache.get(session_id, path.as_deref());
        Self {
            ctx: ctx.clone(),
            path,
            state,
            dirty: false,
            data: Some(data),
        }
    }

    /// Returns the session state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Returns the session state for editing and marks the session changed.
    pub fn state_mut(&mut self) -> &mut SessionState {
        self.dirty = true;
        &mut self.state
    }

    /// Sets a root property and marks the session changed.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.state_mut().set_property(key, value);
    }

    /// Returns true if the state changed since the last save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns the session's file, if it has one.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Display name: the file stem, or "Untitled".
    pub fn name(&self) -> String {
        self.path
            .as_deref()
            .and_then(Path::file_stem)
            .map_or_else(|| "Untitled".to_string(), |s| s.to_string_lossy().into_owned())
    }

    /// Returns the temp file of the current path.
    pub fn temp_version_path(&self) -> Option<PathBuf> {
        self.path.as_deref().map(temp_version_of)
    }

    /// Returns when the session was last written in full by any handle.
    pub fn time_of_last_save(&self) -> Option<SystemTime> {
        self.data.as_ref().map(|d| d.time_of_last_save())
    }

    /// Returns the state as of the last full save by any handle.
    pub fn last_saved_snapshot(&self) -> Option<Arc<SessionState>> {
        self.data.as_ref().and_then(|d| d.snapshot())
    }

    /// Writes the state to `path`.
    ///
    /// With `quick_binary` the state is queued to the background writer as a
    /// snapshot and this returns at once. Otherwise pending background writes
    /// are flushed first and the full document is written before returning.
    /// Only a full write to the session's own file counts as a save.
    pub fn write_to_file(&self, path: &Path, quick_binary: bool) -> Result<(), SessionError> {
        if !quick_binary && let Err(e) = self.ctx.writer.flush_all() {
            tracing::warn!("earlier background write failed: {e}");
        }

        if path.is_dir() {
            return Err(SessionError::write_file(
                path,
                io::Error::new(ErrorKind::IsADirectory, "path is a directory"),
            ));
        }
        if is_read_only(path) {
            return Err(SessionError::ReadOnly(path.to_path_buf()));
        }

        if quick_binary {
            self.ctx
                .writer
                .write_async(self.state.clone(), path, SessionFormat::Snapshot);
            return Ok(());
        }

        format::write_file(&self.state, path, SessionFormat::Document)?;
        if self.path.as_deref() == Some(path) {
            self.record_save();
        }
        tracing::debug!(path = %path.display(), "session document written");
        Ok(())
    }

    /// Writes the temp file if forced or the session changed.
    ///
    /// Unforced writes are quick background snapshots, suitable for a
    /// periodic autosave. Forced writes are full documents.
    pub fn save_temp_version(&self, force: bool) -> Result<(), SessionError> {
        if !(force || self.dirty) {
            return Ok(());
        }
        let temp = self.temp_version_path().ok_or(SessionError::NoFile)?;
        self.write_to_file(&temp, !force)
    }

    /// Deletes the temp file, if there is one.
    pub fn delete_temp_version(&self) {
        if let Some(temp) = self.temp_version_path() {
            remove_if_present(&temp);
        }
    }

    /// Saves the session to its file.
    ///
    /// The state goes to the temp file first and is then renamed over the
    /// session file, so on failure the session file is untouched. When
    /// `options.warn_of_failure` is set, a failure is passed to
    /// [`SavePrompt::proceed_after_error()`], which may turn it into
    /// [`SaveOutcome::ProceededDespiteError`].
    pub fn save(
        &mut self,
        options: SaveOptions,
        prompt: &mut dyn SavePrompt,
    ) -> Result<SaveOutcome, SessionError> {
        let path = self.path.clone().ok_or(SessionError::NoFile)?;
        match self.save_via_temp(&path, options, prompt) {
            Err(e) if !matches!(e, SessionError::Cancelled) => {
                tracing::error!("can't write session file: {e}");
                if options.warn_of_failure && prompt.proceed_after_error(&e) {
                    Ok(SaveOutcome::ProceededDespiteError)
                } else {
                    Err(e)
                }
            }
            other => other,
        }
    }

    fn save_via_temp(
        &mut self,
        path: &Path,
        options: SaveOptions,
        prompt: &mut dyn SavePrompt,
    ) -> Result<SaveOutcome, SessionError> {
        let temp = temp_version_of(path);
        self.save_temp_version(true)?;

        let changed = options.force || self.dirty;
        if changed {
            if options.offer_to_discard {
                match prompt.save_before_close(&self.name()) {
                    CloseChoice::Save => {}
                    CloseChoice::Discard => {
                        remove_if_present(&temp);
                        return Ok(SaveOutcome::Discarded);
                    }
                    CloseChoice::Cancel => {
                        remove_if_present(&temp);
                        return Err(SessionError::Cancelled);
                    }
                }
            }
            fs::rename(&temp, path).map_err(|e| SessionError::rename(&temp, path, e))?;
            self.record_save();
            tracing::info!(path = %path.display(), "session saved");
        }

        remove_if_present(&temp);
        self.dirty = false;
        Ok(if changed {
            SaveOutcome::Saved
        } else {
            SaveOutcome::Unchanged
        })
    }

    /// Saves the session to a new file and makes that its path.
    ///
    /// Saving to the current path is a plain [`save()`](Self::save). An
    /// existing file is only replaced if `force_overwrite` is set or
    /// [`SavePrompt::confirm_overwrite()`] agrees; otherwise this returns
    /// [`SessionError::Cancelled`].
    pub fn save_as(
        &mut self,
        path: impl Into<PathBuf>,
        force_overwrite: bool,
        prompt: &mut dyn SavePrompt,
    ) -> Result<SaveOutcome, SessionError> {
        let path = path.into();
        if self.path.as_deref() == Some(path.as_path()) {
            let options = SaveOptions {
                warn_of_failure: true,
                ..SaveOptions::default()
            };
            return self.save(options, prompt);
        }

        if path.is_file() && !force_overwrite && !prompt.confirm_overwrite(&path) {
            return Err(SessionError::Cancelled);
        }

        let temp = temp_version_of(&path);
        let written = self.write_to_file(&temp, false).and_then(|()| {
            fs::rename(&temp, &path).map_err(|e| SessionError::rename(&temp, &path, e))
        });
        if let Err(e) = written {
            tracing::error!("can't write session file: {e}");
            return if prompt.proceed_after_error(&e) {
                Ok(SaveOutcome::ProceededDespiteError)
            } else {
                Err(e)
            };
        }

        self.delete_temp_version();
        tracing::info!(path = %path.display(), "session saved under new name");
        if let Some(data) = &self.data {
            data.set_path(Some(path.clone()));
        }
        self.path = Some(path);
        self.dirty = false;
        self.record_save();
        Ok(SaveOutcome::Saved)
    }

    fn record_save(&self) {
        if let Some(data) = &self.data {
            data.record_save(&self.state);
        }
    }
}

impl Drop for SessionFile {
    fn drop(&mut self) {
        // Release our reference first so cleanup can see the entry is unused.
        self.data = None;
        self.ctx.cache.cleanup();
    }
}

fn is_read_only(path: &Path) -> bool {
    let target = if path.exists() {
        Some(path)
    } else {
        path.parent().filter(|p| !p.as_os_str().is_empty())
    };
    target
        .and_then(|p| fs::metadata(p).ok())
        .is_some_and(|m| m.permissions().readonly())
}

fn remove_if_present(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "could not remove temp file: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_version_is_hidden_sibling() {
        assert_eq!(
            temp_version_of(Path::new("/a/b/song.tdm")),
            PathBuf::from("/a/b/.tmp_song")
        );
        assert_eq!(
            temp_version_of(Path::new("song")),
            PathBuf::from(".tmp_song")
        );
    }

    #[test]
    fn test_state_mut_marks_dirty() {
        let ctx = SessionContext::new().unwrap();
        let mut file = SessionFile::new(&ctx, "s", None);
        assert!(!file.is_dirty());
        let _ = file.state();
        assert!(!file.is_dirty());
        file.set_property("tempo", 120i64);
        assert!(file.is_dirty());
    }

    #[test]
    fn test_name_falls_back_to_untitled() {
        let ctx = SessionContext::new().unwrap();
        assert_eq!(SessionFile::new(&ctx, "s", None).name(), "Untitled");
        let named = SessionFile::new(&ctx, "t", Some(PathBuf::from("/x/My Song.tdm")));
        assert_eq!(named.name(), "My Song");
    }

    #[test]
    fn test_unforced_temp_save_skips_clean_session() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = SessionContext::new().unwrap();
        let file = SessionFile::new(&ctx, "s", Some(dir.path().join("a.tdm")));
        file.save_temp_version(false).unwrap();
        ctx.writer().flush_all().unwrap();
        assert!(!dir.path().join(".tmp_a").exists());
    }

    #[test]
    fn test_handles_share_last_save() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = SessionContext::new().unwrap();
        let path = dir.path().join("a.tdm");
        let writer = SessionFile::new(&ctx, "shared", Some(path.clone()));
        let reader = SessionFile::new(&ctx, "shared", Some(path.clone()));
        assert!(reader.last_saved_snapshot().is_none());
        writer.write_to_file(&path, false).unwrap();
        assert!(reader.last_saved_snapshot().is_some());
    }

    #[test]
    fn test_save_without_path_is_an_error() {
        let ctx = SessionContext::new().unwrap();
        let mut file = SessionFile::new(&ctx, "s", None);
        let err = file
            .save(SaveOptions::default(), &mut crate::NonInteractive)
            .unwrap_err();
        assert!(matches!(err, SessionError::NoFile));
    }
}
