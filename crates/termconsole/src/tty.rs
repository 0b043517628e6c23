//! Saving and restoring the terminal mode of stdin.
//!
//! rustyline switches stdin to raw mode for the duration of a read and
//! restores it when the read returns. A process that exits while a read
//! is still blocked never gets there, so the console keeps its own copy of
//! the mode it found at attach time.

#[cfg(unix)]
mod imp {
    use std::io::{self, IsTerminal};
    use std::mem::MaybeUninit;
    use std::os::fd::AsRawFd;

    #[derive(Clone, Copy)]
    pub(crate) struct SavedMode {
        termios: libc::termios,
    }

    impl std::fmt::Debug for SavedMode {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("SavedMode")
                .field("lflag", &self.termios.c_lflag)
                .finish_non_exhaustive()
        }
    }

    impl SavedMode {
        /// Reads the current mode of stdin. `None` if stdin is not a tty.
        pub(crate) fn capture() -> Option<Self> {
            let stdin = io::stdin();
            if !stdin.is_terminal() {
                return None;
            }
            let mut termios = MaybeUninit::<libc::termios>::uninit();
            // SAFETY: the fd belongs to stdin and stays open for the life of
            // the process; `termios` is a valid out-pointer.
            let rc = unsafe { libc::tcgetattr(stdin.as_raw_fd(), termios.as_mut_ptr()) };
            if rc != 0 {
                tracing::debug!(
                    "Cannot read terminal mode: {}",
                    io::Error::last_os_error()
                );
                return None;
            }
            // SAFETY: tcgetattr returned 0, so the struct is initialized.
            let termios = unsafe { termios.assume_init() };
            Some(Self { termios })
        }

        /// Applies the saved mode to stdin immediately.
        pub(crate) fn restore(&self) -> io::Result<()> {
            // SAFETY: see `capture`; `self.termios` came from tcgetattr.
            let rc = unsafe {
                libc::tcsetattr(io::stdin().as_raw_fd(), libc::TCSANOW, &self.termios)
            };
            if rc == 0 {
                Ok(())
            } else {
                Err(io::Error::last_os_error())
            }
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use std::io;

    #[derive(Debug, Clone, Copy)]
    pub(crate) struct SavedMode;

    impl SavedMode {
        pub(crate) fn capture() -> Option<Self> {
            None
        }

        pub(crate) fn restore(&self) -> io::Result<()> {
            Ok(())
        }
    }
}

pub(crate) use imp::SavedMode;
