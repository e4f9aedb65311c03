//! Preparing the producing application before tailing starts.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Overwrite the producer's logging config so each requested category is
/// printed to its log file.
pub fn write_log_config(path: &Path, categories: &[String]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut contents = String::new();
    for category in categories {
        contents.push_str(&format!(
            "[{}]\nLogLevel=1\nFilePrinting=false\nConsolePrinting=true\nScreenPrinting=true\n",
            category
        ));
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(contents.as_bytes())?;
    file.flush()
}

/// Create the log file if it does not exist. Existing content is untouched.
///
/// The producer never recreates a log file that is already there, so the
/// tailer can always open the path afterwards.
pub fn touch_log_file(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().append(true).create(true).open(path)?;
    Ok(())
}
