//! Small filesystem helpers shared by the executor and restore driver:
//! rename-into-place temp files, and best-effort permission/mtime copying.

use std::fs;
use std::io;
use std::time::SystemTime;

use camino::Utf8Path;
use rustix::fs::{AtFlags, CWD, Timespec, Timestamps, utimensat};
use tracing::*;

use crate::error::{IoContext, Result};

/// Copy `from` to `to` by way of a sibling temp file, then rename into
/// place, so a partial write never clobbers `to`.
///
/// This mirrors the classic "write to `foo.part`, then rename to `foo`"
/// dance: a reader can never observe a half-written `to`.
pub fn safe_copy(from: &Utf8Path, to: &Utf8Path) -> Result<()> {
    let tmp = sibling_tmp(to, "copy");
    fs::copy(from, &tmp).io_at(from)?;
    fs::rename(&tmp, to).io_at(to)?;
    Ok(())
}

/// A sibling path of `target` named `target.tmp_<tag>_<pid>`, used as the
/// staging location for a rename-into-place write.
pub fn sibling_tmp(target: &Utf8Path, tag: &str) -> camino::Utf8PathBuf {
    let file_name = target.file_name().unwrap_or("out");
    target.with_file_name(format!(".tmp_{tag}_{}_{}", std::process::id(), file_name))
}

/// Best-effort: copy `from`'s permission bits and mtime onto `to`.
/// Failures are logged, never fatal — §4.4 and §4.7 both specify this.
pub fn copy_metadata(from: &Utf8Path, to: &Utf8Path) {
    match fs::metadata(from) {
        Ok(meta) => {
            if let Err(e) = fs::set_permissions(to, meta.permissions()) {
                warn!("Couldn't copy permissions from {from} to {to}: {e}");
            }
            if let Ok(mtime) = meta.modified() {
                if let Err(e) = set_mtime(to, mtime) {
                    warn!("Couldn't copy mtime from {from} to {to}: {e}");
                }
            }
        }
        Err(e) => warn!("Couldn't stat {from} to copy its metadata: {e}"),
    }
}

/// Set `path`'s mtime (and touch its atime to the same value).
pub fn set_mtime(path: &Utf8Path, mtime: SystemTime) -> io::Result<()> {
    let ts = to_timespec(mtime);
    let times = Timestamps {
        last_access: ts,
        last_modification: ts,
    };
    utimensat(CWD, path.as_std_path(), &times, AtFlags::empty())
        .map_err(std::io::Error::from)
}

fn to_timespec(t: SystemTime) -> Timespec {
    let dur = t
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    Timespec {
        tv_sec: dur.as_secs() as i64,
        tv_nsec: dur.subsec_nanos() as i64,
    }
}
