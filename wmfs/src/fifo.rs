//! The command FIFO external tools write command lines into.

use std::ffi::CString;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::io::Read;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::path::PathBuf;

use log::debug;
use log::info;
use log::warn;

/// Longest command line read in one go.
pub const MAX_LINE: usize = 255;

const FIFO_MODE: libc::mode_t = 0o644;

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum ChannelRead {
    /// Raw bytes read, up to the first NUL; may still hold a newline.
    Line(String),
    /// The writer went away; the descriptor was closed and opened again.
    Reopened,
    /// Nothing to read, or a read error.
    Nothing,
}

#[derive(Debug)]
pub struct CommandChannel {
    path: PathBuf,
    file: Option<File>,
    touched: bool,
}

/// `<tmp>/wmfs-<display>.fifo`
pub fn fifo_path(display_name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("wmfs-{}.fifo", display_name))
}

impl CommandChannel {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: None,
            touched: false,
        }
    }

    pub fn for_display(display_name: &str) -> Self {
        Self::new(fifo_path(display_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` while there is no usable descriptor.
    pub fn raw_fd(&self) -> Option<RawFd> {
        self.file.as_ref().map(|f| f.as_raw_fd())
    }

    /// Creates the FIFO if needed and opens it for non-blocking reads.
    /// Failures are logged; the window manager carries on without a
    /// channel.
    pub fn open(&mut self) {
        let c_path = match CString::new(self.path.as_os_str().as_bytes()) {
            Ok(p) => p,
            Err(_) => {
                warn!("bad fifo path {}", self.path.display());
                return;
            }
        };
        if unsafe { libc::mkfifo(c_path.as_ptr(), FIFO_MODE) } == 0 {
            self.touched = true;
            info!("created fifo {}", self.path.display());
        } else {
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::AlreadyExists {
                info!("reusing fifo {}", self.path.display());
            } else {
                warn!("can't create fifo {}: {}", self.path.display(), err);
            }
        }
        self.open_read();
    }

    fn open_read(&mut self) {
        match std::fs::metadata(&self.path) {
            Ok(md) if !md.file_type().is_fifo() => {
                warn!("{} exists and is not a fifo", self.path.display());
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("can't open fifo {}: {}", self.path.display(), e);
                return;
            }
        }
        match OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&self.path)
        {
            Ok(f) => {
                self.file = Some(f);
                self.touched = true;
            }
            Err(e) => warn!("can't open fifo {}: {}", self.path.display(), e),
        }
    }

    /// One bounded read. Called when the descriptor is ready.
    pub fn read(&mut self) -> ChannelRead {
        let file = match self.file.as_mut() {
            Some(f) => f,
            None => return ChannelRead::Nothing,
        };
        let mut buf = [0u8; MAX_LINE];
        match file.read(&mut buf) {
            Ok(0) => {
                debug!("fifo writer closed, reopening");
                self.file = None;
                self.open_read();
                ChannelRead::Reopened
            }
            Ok(n) => {
                let bytes = &buf[..n];
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(n);
                ChannelRead::Line(String::from_utf8_lossy(&bytes[..end]).into_owned())
            }
            Err(_) => ChannelRead::Nothing,
        }
    }

    /// Closes the descriptor and removes the FIFO, if it was ever created
    /// or opened. Safe to call more than once; also runs on drop.
    pub fn close(&mut self) {
        self.file = None;
        if !self.touched {
            return;
        }
        self.touched = false;
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("removed fifo {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("can't remove fifo {}: {}", self.path.display(), e),
        }
    }
}

impl Drop for CommandChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn unique_path() -> PathBuf {
        std::env::temp_dir().join(format!(
            "wmfs-test-{}-{}.fifo",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::SeqCst)
        ))
    }

    fn opened() -> CommandChannel {
        let mut ch = CommandChannel::new(unique_path());
        ch.open();
        assert!(ch.raw_fd().is_some());
        ch
    }

    // The read end is open, so a blocking write-open returns at once.
    fn write_line(path: &Path, line: &str) {
        let mut w = OpenOptions::new().write(true).open(path).unwrap();
        w.write_all(line.as_bytes()).unwrap();
    }

    #[test]
    fn path_names_the_display() {
        let p = fifo_path(":0.0");
        assert_eq!(p.file_name().unwrap(), "wmfs-:0.0.fifo");
        assert_eq!(p.parent().unwrap(), std::env::temp_dir());
        assert_eq!(p, fifo_path(":0.0"));
    }

    #[test]
    fn open_creates_a_fifo() {
        let mut ch = opened();
        let md = std::fs::metadata(ch.path()).unwrap();
        assert!(md.file_type().is_fifo());
        ch.close();
    }

    #[test]
    fn reads_a_line() {
        let mut ch = opened();
        write_line(ch.path(), "spawn xterm\n");
        assert_eq!(ch.read(), ChannelRead::Line("spawn xterm\n".to_string()));
        ch.close();
    }

    #[test]
    fn line_stops_at_nul() {
        let mut ch = opened();
        write_line(ch.path(), "quit\0garbage");
        assert_eq!(ch.read(), ChannelRead::Line("quit".to_string()));
        ch.close();
    }

    #[test]
    fn long_writes_are_bounded() {
        let mut ch = opened();
        write_line(ch.path(), &"x".repeat(MAX_LINE + 40));
        match ch.read() {
            ChannelRead::Line(l) => assert_eq!(l.len(), MAX_LINE),
            other => panic!("unexpected {:?}", other),
        }
        ch.close();
    }

    #[test]
    fn end_of_stream_reopens_once_and_keeps_listening() {
        let mut ch = opened();
        write_line(ch.path(), "reload\n");
        assert_eq!(ch.read(), ChannelRead::Line("reload\n".to_string()));
        // Writer is gone now.
        assert_eq!(ch.read(), ChannelRead::Reopened);
        assert!(ch.raw_fd().is_some());

        write_line(ch.path(), "quit\n");
        assert_eq!(ch.read(), ChannelRead::Line("quit\n".to_string()));
        ch.close();
    }

    #[test]
    fn read_without_descriptor_is_a_no_op() {
        let mut ch = CommandChannel::new(unique_path());
        assert_eq!(ch.read(), ChannelRead::Nothing);
    }

    #[test]
    fn reuses_an_existing_fifo() {
        let mut first = opened();
        let mut second = CommandChannel::new(first.path().to_path_buf());
        second.open();
        assert!(second.raw_fd().is_some());
        second.close();
        first.close();
    }

    #[test]
    fn regular_file_is_not_opened() {
        let path = unique_path();
        std::fs::write(&path, b"not a fifo").unwrap();
        let mut ch = CommandChannel::new(path.clone());
        ch.open();
        assert_eq!(ch.raw_fd(), None);
        ch.close();
        assert!(path.exists());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn dropping_an_opened_channel_removes_the_fifo() {
        let ch = opened();
        let path = ch.path().to_path_buf();
        assert!(path.exists());
        drop(ch);
        assert!(!path.exists());
    }

    #[test]
    fn close_unlinks_and_is_idempotent() {
        let mut ch = opened();
        let path = ch.path().to_path_buf();
        ch.close();
        assert!(!path.exists());
        assert_eq!(ch.raw_fd(), None);
        ch.close();
        assert!(!path.exists());
    }
}
