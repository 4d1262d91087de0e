//! External pak decoder (UnrealPak) integration.
//!
//! The decoder is only ever driven through its text output:
//!
//! - List contents: `UnrealPak <pak> -list -cryptokeys=<crypto.json>`
//! - Extract:       `UnrealPak <pak> -extract <dest> -cryptokeys=<crypto.json>`
//!
//! On Linux the Windows build is normally run through Wine, so an optional
//! wrapper program is placed in front of the decoder (and `WINEPREFIX` can
//! be set for the child).
//!
//! Output is read line by line while the decoder runs. Listing a big pak
//! prints hundreds of thousands of lines, and extraction can take a long
//! time, so nothing is buffered in full and no timeout is applied.

pub mod protocol;

use crate::error::{IoContext, PakError, Result};
use crate::mapping::{PakMapping, PathNormalizer};
use crate::pakfile::Pakfile;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default decoder executable name.
pub const DEFAULT_DECODER: &str = "UnrealPak.exe";

/// Lines of decoder stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 8;

/// How to launch the decoder.
#[derive(Debug, Clone)]
pub struct Decoder {
    program: PathBuf,
    wrapper: Option<PathBuf>,
    wineprefix: Option<PathBuf>,
    crypto_config: PathBuf,
    show_progress: bool,
}

impl Decoder {
    pub fn new(program: impl Into<PathBuf>, crypto_config: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            wrapper: None,
            wineprefix: None,
            crypto_config: crypto_config.into(),
            show_progress: true,
        }
    }

    /// Run the decoder through another program (usually `wine64`).
    pub fn with_wrapper(mut self, wrapper: impl Into<PathBuf>) -> Self {
        self.wrapper = Some(wrapper.into());
        self
    }

    pub fn with_wineprefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.wineprefix = Some(prefix.into());
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn wrapper(&self) -> Option<&Path> {
        self.wrapper.as_deref()
    }

    pub fn crypto_config(&self) -> &Path {
        &self.crypto_config
    }

    /// Locate a decoder executable.
    ///
    /// Looks in the following locations:
    /// 1. `name` itself, if it points at an existing file
    /// 2. next to the running executable, directly or under `bin/`
    /// 3. `bin/` under the current directory
    /// 4. System PATH
    pub fn locate(name: &str) -> Option<PathBuf> {
        let direct = PathBuf::from(name);
        if direct.is_file() {
            return Some(direct);
        }

        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                for candidate in [exe_dir.join(name), exe_dir.join("bin").join(name)] {
                    if candidate.is_file() {
                        return Some(candidate);
                    }
                }
            }
        }

        let cwd_path = PathBuf::from("bin").join(name);
        if cwd_path.is_file() {
            return Some(cwd_path);
        }

        which::which(name).ok()
    }

    /// Read the pak's listing and build its raw → canonical mapping.
    pub fn build_mapping(&self, pak: &Pakfile, normalizer: &PathNormalizer) -> Result<PakMapping> {
        info!("Getting contents of {}", pak);

        let mut process = self.spawn(pak.path(), &[OsStr::new("-list")])?;
        let pb = self.spinner("Getting pakfile contents");

        let parsed = protocol::parse_listing(&mut process.stdout, pak.path(), normalizer, |n| {
            pb.set_position(n as u64);
        });
        pb.finish_and_clear();

        let mapping = match parsed {
            Ok(mapping) => mapping,
            Err(e) => {
                process.abort();
                return Err(e);
            }
        };
        process.finish(pak.path())?;

        debug!("{}: {} entries listed", pak, mapping.len());
        Ok(mapping)
    }

    /// Extract `pak` into `destination`, verifying against `expected`.
    ///
    /// Returns the number of files the decoder reported as extracted.
    pub fn extract(
        &self,
        pak: &Pakfile,
        destination: &Path,
        expected: Option<&PakMapping>,
    ) -> Result<usize> {
        let destination = absolute(destination)?;
        fs::create_dir_all(&destination).at(&destination)?;

        let mut process = self.spawn(
            pak.path(),
            &[OsStr::new("-extract"), destination.as_os_str()],
        )?;

        let pb = match expected {
            Some(expected) => self.bar(expected.len() as u64, "Unpacking files"),
            None => self.spinner("Unpacking files"),
        };

        let scanned = protocol::scan_extraction(&mut process.stdout, pak.path(), expected, |n| {
            pb.set_position(n as u64);
        });
        pb.finish_and_clear();

        let extracted = match scanned {
            Ok(count) => count,
            Err(e) => {
                process.abort();
                return Err(e);
            }
        };
        process.finish(pak.path())?;

        match expected {
            Some(expected) => info!("  Unpacked files: {}/{}", extracted, expected.len()),
            None => info!("  Unpacked files: {}", extracted),
        }
        protocol::check_extracted_count(pak.path(), expected, extracted)?;

        Ok(extracted)
    }

    /// Every path handed to the decoder is made absolute first: UnrealPak
    /// resolves relative paths against its own directory, not ours.
    fn command(&self, pak: &Path, mode_args: &[&OsStr]) -> Result<Command> {
        let mut cmd = match &self.wrapper {
            Some(wrapper) => {
                let mut cmd = Command::new(wrapper);
                cmd.arg(&self.program);
                cmd
            }
            None => Command::new(&self.program),
        };

        let mut crypto_arg = OsString::from("-cryptokeys=");
        crypto_arg.push(absolute(&self.crypto_config)?);

        cmd.arg(absolute(pak)?).args(mode_args).arg(crypto_arg);
        if let Some(prefix) = &self.wineprefix {
            cmd.env("WINEPREFIX", prefix);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Ok(cmd)
    }

    fn spawn(&self, pak: &Path, mode_args: &[&OsStr]) -> Result<DecoderProcess> {
        let mut cmd = self.command(pak, mode_args)?;
        debug!("Launching decoder: {:?}", cmd);

        let mut child = cmd.spawn().map_err(|e| self.launch_error(e))?;

        let stdout = match child.stdout.take() {
            Some(stdout) => BufReader::new(stdout),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(PakError::io(
                    &self.program,
                    std::io::Error::other("decoder stdout was not captured"),
                ));
            }
        };
        let stderr = child.stderr.take().map(drain_stderr);

        Ok(DecoderProcess {
            child,
            stdout,
            stderr,
        })
    }

    fn launch_error(&self, source: std::io::Error) -> PakError {
        if source.kind() != std::io::ErrorKind::NotFound {
            return PakError::io(self.wrapper.as_ref().unwrap_or(&self.program), source);
        }
        match &self.wrapper {
            Some(wrapper) => PakError::DecoderNotFound {
                program: wrapper.clone(),
                hint: format!(
                    "Install it, or point the wrapper setting at the right binary to run {}.",
                    self.program.display()
                ),
                source,
            },
            None => PakError::DecoderNotFound {
                program: self.program.clone(),
                hint: "Pass --unrealpak or set `decoder` in settings.json to the UnrealPak executable."
                    .to_string(),
                source,
            },
        }
    }

    fn spinner(&self, message: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.green} {msg}: {pos} [{elapsed}]")
                .unwrap(),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    fn bar(&self, total: u64, message: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {msg}: [{bar:40.cyan/blue}] {pos}/{len} [{elapsed}]")
                .unwrap()
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(250));
        pb
    }
}

/// A running decoder, with stdout ready to be streamed.
struct DecoderProcess {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
}

impl DecoderProcess {
    /// Wait for a clean exit, turning a failure status into an error.
    fn finish(mut self, pak: &Path) -> Result<()> {
        let status: ExitStatus = self.child.wait().at(pak)?;
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(PakError::DecoderFailed {
                pak: pak.to_path_buf(),
                status,
                stderr,
            });
        }
        if !stderr.is_empty() {
            debug!("Decoder stderr for {}: {}", pak.display(), stderr);
        }
        Ok(())
    }

    /// Stop the decoder early; we've already decided the run has failed.
    fn abort(mut self) {
        if let Err(e) = self.child.kill() {
            warn!("Failed to kill decoder: {}", e);
        }
        let _ = self.child.wait();
        if let Some(handle) = self.stderr.take() {
            let _ = handle.join();
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).at(path)
}

/// Read stderr on its own thread so the decoder never blocks on a full pipe.
/// Returns the last few lines for error reporting.
fn drain_stderr(stderr: std::process::ChildStderr) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut reader = BufReader::new(stderr);
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = String::from_utf8_lossy(&buf).trim().to_string();
            if line.is_empty() {
                continue;
            }
            debug!("[decoder] {}", line);
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        Vec::from(tail).join("\n")
    })
}
