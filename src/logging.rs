use crate::config::MonitorConfig;
use env_logger::{Builder, Env, Target};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Installs the global logger.
///
/// Output goes to stderr, filtered by `RUST_LOG` (default `info`). When a log file is
/// configured, every line is also appended to it, and the file rolls over
/// to numbered backups once it passes `log_max_bytes`. If the file cannot
/// be opened the logger still starts on stderr alone and the error is
/// returned.
pub fn init(config: &MonitorConfig) -> io::Result<()> {
    let mut builder = builder();

    let result = match open_log_file(config) {
        Ok(Some(file)) => {
            builder.target(Target::Pipe(Box::new(Tee { file })));
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => Err(e),
    };

    builder.init();
    result
}

/// Installs the stderr logger alone, for errors raised before the config is known
pub fn init_stderr() {
    builder().init();
}

fn builder() -> Builder {
    Builder::from_env(Env::default().default_filter_or("info"))
}

fn open_log_file(config: &MonitorConfig) -> io::Result<Option<RotatingFile>> {
    config
        .log_file
        .as_ref()
        .map(|path| RotatingFile::open(path, config.log_max_bytes, config.log_backups))
        .transpose()
}

/// Log file capped by size, with a bounded number of rolled-over copies
///
/// `monitor.log` rolls to `monitor.log.1`, which shifts to `monitor.log.2`
/// and so on; the copy past `backups` is deleted.
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    file: File,
    written: u64,
}

impl RotatingFile {
    pub fn open<P: AsRef<Path>>(path: P, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let file = append_to(&path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            path,
            max_bytes,
            backups,
            file,
            written,
        })
    }

    fn backup_path(&self, n: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.backups == 0 {
            self.file = OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&self.path)?;
        } else {
            let oldest = self.backup_path(self.backups);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for n in (1..self.backups).rev() {
                let from = self.backup_path(n);
                if from.exists() {
                    fs::rename(&from, self.backup_path(n + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
            self.file = append_to(&self.path)?;
        }

        self.written = 0;
        Ok(())
    }
}

fn append_to(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // a single oversized record still lands in one file
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }

        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Copies each record to stderr and to a second writer
struct Tee<W> {
    file: W,
}

impl<W: Write> Write for Tee<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_small_writes_stay_in_one_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("monitor.log");

        let mut log = RotatingFile::open(&path, 64, 3).unwrap();
        log.write_all(b"page 241 checked\n").unwrap();
        log.write_all(b"page 242 checked\n").unwrap();
        log.flush().unwrap();

        assert_eq!(read(&path), "page 241 checked\npage 242 checked\n");
        assert!(!dir.path().join("monitor.log.1").exists());
    }

    #[test]
    fn test_rolls_over_past_size_cap() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("monitor.log");

        let mut log = RotatingFile::open(&path, 20, 3).unwrap();
        log.write_all(b"first record here\n").unwrap();
        log.write_all(b"second record\n").unwrap();
        log.flush().unwrap();

        assert_eq!(read(&dir.path().join("monitor.log.1")), "first record here\n");
        assert_eq!(read(&path), "second record\n");
    }

    #[test]
    fn test_backup_count_is_bounded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("monitor.log");

        let mut log = RotatingFile::open(&path, 8, 2).unwrap();
        for n in 1..=5 {
            log.write_all(format!("record {}\n", n).as_bytes()).unwrap();
        }
        log.flush().unwrap();

        assert_eq!(read(&path), "record 5\n");
        assert_eq!(read(&dir.path().join("monitor.log.1")), "record 4\n");
        assert_eq!(read(&dir.path().join("monitor.log.2")), "record 3\n");
        assert!(!dir.path().join("monitor.log.3").exists());
    }

    #[test]
    fn test_reopen_counts_existing_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("monitor.log");
        fs::write(&path, "left from last run\n").unwrap();

        let mut log = RotatingFile::open(&path, 24, 1).unwrap();
        log.write_all(b"new run\n").unwrap();
        log.flush().unwrap();

        assert_eq!(read(&dir.path().join("monitor.log.1")), "left from last run\n");
        assert_eq!(read(&path), "new run\n");
    }

    #[test]
    fn test_no_backups_truncates_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("monitor.log");

        let mut log = RotatingFile::open(&path, 10, 0).unwrap();
        log.write_all(b"old line\n").unwrap();
        log.write_all(b"new line\n").unwrap();
        log.flush().unwrap();

        assert_eq!(read(&path), "new line\n");
        assert!(!dir.path().join("monitor.log.1").exists());
    }

    #[test]
    fn test_missing_directories_are_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("monitor.log");

        let mut log = RotatingFile::open(&path, 1024, 3).unwrap();
        log.write_all(b"started\n").unwrap();
        log.flush().unwrap();

        assert_eq!(read(&path), "started\n");
    }

    #[test]
    fn test_tee_forwards_whole_records() {
        let mut tee = Tee { file: Vec::new() };
        tee.write_all(b"INFO new comment 9001\n").unwrap();
        tee.flush().unwrap();

        assert_eq!(tee.file, b"INFO new comment 9001\n");
    }

    #[test]
    fn test_log_file_is_optional() {
        assert!(open_log_file(&MonitorConfig::default()).unwrap().is_none());

        let dir = TempDir::new().unwrap();
        let config = MonitorConfig {
            log_file: Some(dir.path().join("monitor.log")),
            ..MonitorConfig::default()
        };
        assert!(open_log_file(&config).unwrap().is_some());
    }
}
