//! Fatal error reporting at the process boundary.

use std::path::Path;

use tracing::error;

/// Title of the fatal error dialog.
pub const DIALOG_TITLE: &str = "Framework information";

/// Short user-facing message pointing at the log file.
pub fn fatal_message(log_file: &Path) -> String {
    format!(
        "An error occurred. See {} for more information",
        log_file.display()
    )
}

/// Text written to stderr for a fatal error.
///
/// When logging is not running the log file holds nothing from this run, so
/// the full chain is printed instead of the pointer to it.
pub fn console_message(err: &anyhow::Error, log_file: &Path, logged: bool) -> String {
    if logged {
        fatal_message(log_file)
    } else {
        format!("An error occurred: {:#}", err)
    }
}

/// Logs the full error chain and tells the user.
///
/// `logged` says whether the log subscriber is installed. With `show_dialog` a
/// blocking native message box is shown (when built with the `dialog`
/// feature).
pub fn report_fatal(err: &anyhow::Error, log_file: &Path, logged: bool, show_dialog: bool) {
    error!("{:#}", err);

    let message = console_message(err, log_file, logged);
    eprintln!("{}", message);

    if show_dialog {
        show_message_box(&message);
    }
}

#[cfg(feature = "dialog")]
fn show_message_box(message: &str) {
    rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Error)
        .set_title(DIALOG_TITLE)
        .set_description(message)
        .set_buttons(rfd::MessageButtons::Ok)
        .show();
}

#[cfg(not(feature = "dialog"))]
fn show_message_box(_message: &str) {}
