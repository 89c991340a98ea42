//! Session persistence for tandem.
//!
//! A session is a tree of typed properties ([`SessionState`]) stored either
//! as a pretty JSON document or as a compact binary snapshot. Saving is
//! atomic: the state is written to a hidden sibling temp file and renamed
//! over the session file, so an interrupted save never corrupts it.
//!
//! # Example
//!
//! ```no_run
//! use tandem_session::{NonInteractive, SaveOptions, SessionContext, SessionFile};
//!
//! # fn main() -> Result<(), tandem_session::SessionError> {
//! let ctx = SessionContext::new()?;
//! let mut session = SessionFile::open(&ctx, "song.tdm", "session-1")?;
//! session.set_property("tempo", 128.0);
//!
//! // Periodic autosave: a quick binary snapshot written in the background.
//! session.save_temp_version(false)?;
//!
//! // Full save: temp document, then rename over song.tdm.
//! session.save(SaveOptions::default(), &mut NonInteractive)?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod file;
pub mod format;
pub mod load;
pub mod prompt;
pub mod state;
pub mod writer;

pub use cache::{SessionCache, SessionData};
pub use error::SessionError;
pub use file::{
    SaveOptions, SaveOutcome, SessionContext, SessionFile, TEMP_FILE_PREFIX, temp_version_of,
};
pub use format::{SNAPSHOT_MAGIC, SNAPSHOT_VERSION, SessionFormat};
pub use load::load_session;
pub use prompt::{CloseChoice, NonInteractive, SavePrompt};
pub use state::{
    APP_VERSION, APP_VERSION_PROPERTY, PropertyValue, SESSION_ID_PROPERTY, SESSION_KIND,
    SessionState,
};
pub use writer::FileWriter;
