//! Decisions a save may need from the user.

use std::path::Path;

use crate::error::SessionError;

/// Answer to "save changes before closing?".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseChoice {
    /// Save, then close.
    Save,
    /// Close without saving.
    Discard,
    /// Keep the session open.
    Cancel,
}

/// Asks the user about a save in progress.
///
/// GUIs implement this with dialogs; batch tools use [`NonInteractive`].
pub trait SavePrompt {
    /// A save failed. Returns true to carry on as if it had succeeded.
    fn proceed_after_error(&mut self, error: &SessionError) -> bool;

    /// The session is being closed with unsaved changes.
    fn save_before_close(&mut self, session_name: &str) -> CloseChoice;

    /// `path` already exists. Returns true to overwrite it.
    fn confirm_overwrite(&mut self, path: &Path) -> bool;
}

/// Answers every question in the way that loses nothing: errors are
/// reported, changes are saved, existing files are kept.
#[derive(Clone, Copy, Debug, Default)]
pub struct NonInteractive;

impl SavePrompt for NonInteractive {
    fn proceed_after_error(&mut self, _error: &SessionError) -> bool {
        false
    }

    fn save_before_close(&mut self, _session_name: &str) -> CloseChoice {
        CloseChoice::Save
    }

    fn confirm_overwrite(&mut self, _path: &Path) -> bool {
        false
    }
}
