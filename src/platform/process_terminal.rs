//! Process terminal: raw mode over termios, poll-based input and buffered output.

use std::cell::Cell;
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use libc::{self, c_int};
use signal_hook::consts::{SIGINT, SIGTERM, SIGWINCH};
use signal_hook::SigId;
use tracing::{debug, warn};

use crate::config::env_config;
use crate::core::capabilities::Capabilities;
use crate::core::input::{CharSource, ReadResult};
use crate::core::terminal::{Size, Terminal};
use crate::error::ReadError;
use crate::platform::stdin_buffer::StdinBuffer;

const DEFAULT_SIZE: Size = Size {
    rows: 24,
    columns: 80,
};
/// Longest single poll, so interrupt flags are noticed while waiting indefinitely.
const POLL_SLICE_MS: i32 = 100;
const UTF8_TAIL_TIMEOUT_MS: u64 = 10;

fn wait_writable(fd: c_int) -> io::Result<()> {
    let mut fds = libc::pollfd {
        fd,
        events: libc::POLLOUT,
        revents: 0,
    };
    loop {
        let result = unsafe { libc::poll(&mut fds, 1, -1) };
        if result < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if result == 0 {
            continue;
        }
        if (fds.revents & libc::POLLOUT) != 0 {
            return Ok(());
        }
        return Err(io::Error::other(format!(
            "poll(POLLOUT) returned revents=0x{:x}",
            fds.revents
        )));
    }
}

fn write_all_fd_with<FWrite, FWait>(
    fd: c_int,
    bytes: &[u8],
    mut write_once: FWrite,
    mut wait_writable: FWait,
) -> io::Result<()>
where
    FWrite: FnMut(c_int, &[u8]) -> io::Result<usize>,
    FWait: FnMut(c_int) -> io::Result<()>,
{
    let mut written = 0;
    while written < bytes.len() {
        match write_once(fd, &bytes[written..]) {
            Ok(0) => {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"));
            }
            Ok(count) => {
                if count > bytes.len() - written {
                    return Err(io::Error::other("write returned more bytes than requested"));
                }
                written += count;
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => wait_writable(fd)?,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn write_fd(fd: c_int, data: &[u8]) -> io::Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    write_all_fd_with(
        fd,
        data,
        |fd, buf| {
            let result = unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
            if result < 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok(result as usize)
            }
        },
        wait_writable,
    )
}

fn read_winsize(fd: c_int) -> Option<Size> {
    let mut size = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut size) };
    if result == 0 && size.ws_col > 0 && size.ws_row > 0 {
        Some(Size::new(size.ws_row, size.ws_col))
    } else {
        None
    }
}

fn poll_readable(fd: c_int, timeout_ms: i32) -> bool {
    let mut fds = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let result = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
    result > 0 && (fds.revents & (libc::POLLIN | libc::POLLHUP)) != 0
}

fn get_termios(fd: c_int) -> io::Result<libc::termios> {
    let mut termios = unsafe { std::mem::zeroed::<libc::termios>() };
    let result = unsafe { libc::tcgetattr(fd, &mut termios) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(termios)
}

fn set_termios(fd: c_int, termios: &libc::termios) -> io::Result<()> {
    let result = unsafe { libc::tcsetattr(fd, libc::TCSANOW, termios) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Terminal attached to the process's stdin/stdout.
///
/// Output is buffered until [`Terminal::flush`]. SIGWINCH invalidates the cached size;
/// SIGINT/SIGTERM delivered while raw set the interrupt flag shared with every
/// [`TtyReader`] created by [`ProcessTerminal::reader`].
pub struct ProcessTerminal {
    stdin_fd: c_int,
    stdout_fd: c_int,
    original_termios: Option<libc::termios>,
    raw: bool,
    caps: Capabilities,
    out: String,
    write_log_path: Option<PathBuf>,
    write_log_failed: bool,
    interrupted: Arc<AtomicBool>,
    resized: Arc<AtomicBool>,
    size: Cell<Option<Size>>,
    resize_signal: Option<SigId>,
    interrupt_signals: Vec<SigId>,
}

impl ProcessTerminal {
    pub fn new() -> io::Result<Self> {
        Self::with_fds(libc::STDIN_FILENO, libc::STDOUT_FILENO, Capabilities::from_env())
    }

    /// Terminal over explicit descriptors, which stay owned by the caller.
    pub fn with_fds(stdin_fd: c_int, stdout_fd: c_int, caps: Capabilities) -> io::Result<Self> {
        let resized = Arc::new(AtomicBool::new(false));
        let resize_signal = signal_hook::flag::register(SIGWINCH, Arc::clone(&resized))?;
        let write_log_path = env_config().write_log.as_ref().map(PathBuf::from);
        debug!(term = caps.name(), "opened process terminal");
        Ok(Self {
            stdin_fd,
            stdout_fd,
            original_termios: None,
            raw: false,
            caps,
            out: String::new(),
            write_log_path,
            write_log_failed: false,
            interrupted: Arc::new(AtomicBool::new(false)),
            resized,
            size: Cell::new(None),
            resize_signal: Some(resize_signal),
            interrupt_signals: Vec::new(),
        })
    }

    /// Input source over the terminal's stdin.
    pub fn reader(&self) -> TtyReader {
        TtyReader::new(self.stdin_fd, Arc::clone(&self.interrupted))
    }

    /// Flag raised by SIGINT/SIGTERM while raw.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    fn append_write_log(&mut self, data: &str) {
        if self.write_log_failed {
            return;
        }
        if let Some(path) = self.write_log_path.as_ref() {
            let result = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .and_then(|mut file| file.write_all(data.as_bytes()));
            if let Err(err) = result {
                warn!(%err, path = %path.display(), "disabling terminal write log");
                self.write_log_failed = true;
            }
        }
    }

    fn unregister_interrupts(&mut self) {
        for id in self.interrupt_signals.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

impl Terminal for ProcessTerminal {
    fn enter_raw_mode(&mut self) -> io::Result<()> {
        if self.raw {
            return Ok(());
        }
        let original = get_termios(self.stdin_fd)?;
        let mut raw = original;
        unsafe {
            libc::cfmakeraw(&mut raw);
        }
        set_termios(self.stdin_fd, &raw)?;
        self.original_termios = Some(original);
        self.raw = true;
        for signal in [SIGINT, SIGTERM] {
            self.interrupt_signals
                .push(signal_hook::flag::register(signal, Arc::clone(&self.interrupted))?);
        }
        debug!("entered raw mode");
        Ok(())
    }

    fn restore(&mut self) -> io::Result<()> {
        if !self.raw {
            return Ok(());
        }
        let flushed = self.flush();
        self.unregister_interrupts();
        self.raw = false;
        if let Some(original) = self.original_termios.take() {
            set_termios(self.stdin_fd, &original)?;
        }
        debug!("restored terminal mode");
        flushed
    }

    fn is_raw(&self) -> bool {
        self.raw
    }

    fn write(&mut self, data: &str) -> io::Result<()> {
        self.out.push_str(data);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.out.is_empty() {
            return Ok(());
        }
        let data = std::mem::take(&mut self.out);
        write_fd(self.stdout_fd, data.as_bytes())?;
        self.append_write_log(&data);
        Ok(())
    }

    fn size(&self) -> Size {
        let stale = self.resized.swap(false, Ordering::SeqCst);
        match self.size.get() {
            Some(size) if !stale => size,
            _ => {
                let size = read_winsize(self.stdout_fd).unwrap_or(DEFAULT_SIZE);
                self.size.set(Some(size));
                size
            }
        }
    }

    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }
}

impl Drop for ProcessTerminal {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            debug!(%err, "failed to restore terminal on drop");
        }
        if let Some(id) = self.resize_signal.take() {
            signal_hook::low_level::unregister(id);
        }
    }
}

/// [`CharSource`] over a raw tty descriptor.
pub struct TtyReader {
    fd: c_int,
    buffer: StdinBuffer,
    pending: VecDeque<char>,
    interrupted: Arc<AtomicBool>,
}

impl TtyReader {
    pub fn new(fd: c_int, interrupted: Arc<AtomicBool>) -> Self {
        Self {
            fd,
            buffer: StdinBuffer::new(UTF8_TAIL_TIMEOUT_MS),
            pending: VecDeque::new(),
            interrupted,
        }
    }

    fn fill(&mut self, wait_ms: i32) -> Result<bool, ReadError> {
        if !poll_readable(self.fd, wait_ms) {
            return Ok(true);
        }
        let mut buf = [0u8; 1024];
        let read_len = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut _, buf.len()) };
        if read_len < 0 {
            let err = io::Error::last_os_error();
            return match err.kind() {
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => Ok(true),
                _ => Err(ReadError::Io(err)),
            };
        }
        if read_len == 0 {
            self.pending.extend(self.buffer.flush());
            return Ok(false);
        }
        let chars = self.buffer.process(&buf[..read_len as usize]);
        self.pending.extend(chars);
        Ok(true)
    }
}

impl CharSource for TtyReader {
    fn read(&mut self, timeout: Option<Duration>) -> Result<ReadResult, ReadError> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            if let Some(ch) = self.pending.pop_front() {
                return Ok(ReadResult::Char(ch));
            }
            if self.interrupted.swap(false, Ordering::SeqCst) {
                return Err(ReadError::Interrupted);
            }
            let now = Instant::now();
            let flushed = self.buffer.flush_due(now);
            if !flushed.is_empty() {
                self.pending.extend(flushed);
                continue;
            }
            let mut wait_ms = POLL_SLICE_MS;
            if let Some(deadline) = deadline {
                if now >= deadline {
                    return Ok(ReadResult::Timeout);
                }
                let remaining = deadline.saturating_duration_since(now).as_millis();
                wait_ms = wait_ms.min(remaining.max(1).min(i32::MAX as u128) as i32);
            }
            wait_ms = self.buffer.next_timeout_ms(now, wait_ms);
            if !self.fill(wait_ms)? && self.pending.is_empty() {
                return Ok(ReadResult::Eof);
            }
        }
    }

    fn peek(&mut self, timeout: Duration) -> Result<ReadResult, ReadError> {
        let result = self.read(Some(timeout))?;
        if let ReadResult::Char(ch) = result {
            self.pending.push_front(ch);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::Ordering;
    use std::time::{Duration, Instant};

    use libc::{self, c_int};
    use pretty_assertions::assert_eq;

    use super::{get_termios, poll_readable, write_all_fd_with, ProcessTerminal};
    use crate::core::capabilities::Capabilities;
    use crate::core::input::{CharSource, ReadResult};
    use crate::core::terminal::Terminal;
    use crate::error::ReadError;

    struct Pty {
        master: c_int,
        slave: c_int,
    }

    impl Drop for Pty {
        fn drop(&mut self) {
            unsafe {
                libc::close(self.master);
                libc::close(self.slave);
            }
        }
    }

    fn open_pty() -> Pty {
        let mut master: c_int = 0;
        let mut slave: c_int = 0;
        let result = unsafe {
            libc::openpty(
                &mut master,
                &mut slave,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };
        assert_eq!(result, 0, "openpty failed");
        Pty { master, slave }
    }

    fn read_available(fd: c_int, timeout: Duration) -> Vec<u8> {
        let end = Instant::now() + timeout;
        let mut out = Vec::new();
        while Instant::now() < end {
            let remaining = end.saturating_duration_since(Instant::now());
            let timeout_ms = remaining.as_millis().min(i32::MAX as u128) as i32;
            if timeout_ms == 0 || !poll_readable(fd, timeout_ms) {
                break;
            }
            let mut buf = [0u8; 1024];
            let read_len = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut _, buf.len()) };
            if read_len <= 0 {
                break;
            }
            out.extend_from_slice(&buf[..read_len as usize]);
        }
        out
    }

    fn write_master(fd: c_int, data: &[u8]) {
        let written = unsafe { libc::write(fd, data.as_ptr() as *const _, data.len()) };
        assert_eq!(written, data.len() as isize);
    }

    #[test]
    fn raw_mode_is_idempotent_and_restored() {
        let pty = open_pty();
        let mut term =
            ProcessTerminal::with_fds(pty.slave, pty.slave, Capabilities::xterm()).unwrap();
        let before = get_termios(pty.slave).unwrap();
        assert!(before.c_lflag & libc::ICANON != 0);

        term.enter_raw_mode().unwrap();
        term.enter_raw_mode().unwrap();
        assert!(term.is_raw());
        let raw = get_termios(pty.slave).unwrap();
        assert_eq!(raw.c_lflag & libc::ICANON, 0);

        term.restore().unwrap();
        assert!(!term.is_raw());
        let after = get_termios(pty.slave).unwrap();
        assert!(after.c_lflag & libc::ICANON != 0);
        term.restore().unwrap();
    }

    #[test]
    fn writes_are_buffered_until_flush() {
        let pty = open_pty();
        let mut term =
            ProcessTerminal::with_fds(pty.slave, pty.slave, Capabilities::xterm()).unwrap();
        term.enter_raw_mode().unwrap();
        term.write("hello").unwrap();
        assert!(read_available(pty.master, Duration::from_millis(20)).is_empty());
        term.flush().unwrap();
        assert_eq!(
            read_available(pty.master, Duration::from_millis(200)),
            b"hello".to_vec()
        );
    }

    #[test]
    fn reader_decodes_utf8_and_times_out() {
        let pty = open_pty();
        let mut term =
            ProcessTerminal::with_fds(pty.slave, pty.slave, Capabilities::xterm()).unwrap();
        term.enter_raw_mode().unwrap();
        let mut reader = term.reader();

        assert_eq!(
            reader.read(Some(Duration::from_millis(20))).unwrap(),
            ReadResult::Timeout
        );

        write_master(pty.master, "é\x1b".as_bytes());
        assert_eq!(
            reader.read(Some(Duration::from_millis(500))).unwrap(),
            ReadResult::Char('é')
        );
        assert_eq!(
            reader.peek(Duration::from_millis(500)).unwrap(),
            ReadResult::Char('\x1b')
        );
        assert_eq!(reader.read(None).unwrap(), ReadResult::Char('\x1b'));
    }

    #[test]
    fn interrupt_flag_aborts_reads() {
        let pty = open_pty();
        let term =
            ProcessTerminal::with_fds(pty.slave, pty.slave, Capabilities::xterm()).unwrap();
        let mut reader = term.reader();
        term.interrupt_flag().store(true, Ordering::SeqCst);
        assert!(matches!(reader.read(None), Err(ReadError::Interrupted)));
        assert_eq!(
            reader.read(Some(Duration::from_millis(10))).unwrap(),
            ReadResult::Timeout
        );
    }

    #[test]
    fn size_falls_back_when_winsize_is_unset() {
        let pty = open_pty();
        let term =
            ProcessTerminal::with_fds(pty.slave, pty.slave, Capabilities::xterm()).unwrap();
        let size = term.size();
        assert!(size.rows > 0 && size.columns > 0);
    }

    #[test]
    fn write_all_fd_retries_partial_and_interrupted_writes() {
        let mut calls = 0;
        let mut seen = Vec::new();
        let result = write_all_fd_with(
            1,
            b"abcdef",
            |_fd, buf| {
                calls += 1;
                match calls {
                    1 => Err(io::Error::from(io::ErrorKind::Interrupted)),
                    2 => Err(io::Error::from(io::ErrorKind::WouldBlock)),
                    _ => {
                        let take = buf.len().min(4);
                        seen.extend_from_slice(&buf[..take]);
                        Ok(take)
                    }
                }
            },
            |_fd| Ok(()),
        );
        assert!(result.is_ok());
        assert_eq!(seen, b"abcdef".to_vec());
    }

    #[test]
    fn write_all_fd_rejects_zero_length_writes() {
        let result = write_all_fd_with(1, b"x", |_fd, _buf| Ok(0), |_fd| Ok(()));
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::WriteZero);
    }
}
