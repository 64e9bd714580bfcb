//! The `uos` module
//!
//! Filesystem calls on top of `std::fs`. NuttX keeps no per-task working
//! directory that the runtime can rely on, so [`Uos`] tracks its own and
//! resolves every relative path against it.

use std::fs;
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use spresense_hal_nuttx::Errno;

use crate::args::{check_arg_count, Args};
use crate::error::{MachineError, MachineResult};
use crate::value::Value;

/// Directory scripts start in
pub const DEFAULT_CWD: &str = "/mnt/spif";

const SYSNAME: &str = "nuttx";

/// `uos.uname()` fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uname {
    pub sysname: heapless::String<16>,
    pub nodename: heapless::String<16>,
    pub release: heapless::String<16>,
    pub version: heapless::String<64>,
    pub machine: heapless::String<64>,
}

impl Uname {
    fn to_value(&self) -> Value {
        Value::Tuple(
            [
                self.sysname.as_str(),
                self.nodename.as_str(),
                self.release.as_str(),
                self.version.as_str(),
                self.machine.as_str(),
            ]
            .into_iter()
            .map(Value::from)
            .collect(),
        )
    }
}

/// Copy as much of `s` as fits
fn field<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// `uos.stat()` result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub mode: u32,
    pub size: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

impl Stat {
    /// `(mode, ino, dev, nlink, uid, gid, size, atime, mtime, ctime)`
    pub fn to_tuple(&self) -> [i64; 10] {
        [
            self.mode as i64,
            0,
            0,
            1,
            0,
            0,
            self.size as i64,
            self.atime,
            self.mtime,
            self.ctime,
        ]
    }
}

fn seconds(time: io::Result<SystemTime>) -> i64 {
    time.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs() as i64)
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    meta.mode()
}

#[cfg(not(unix))]
fn mode_of(meta: &fs::Metadata) -> u32 {
    const S_IFDIR: u32 = 0o040000;
    const S_IFREG: u32 = 0o100000;
    let perm = if meta.permissions().readonly() { 0o444 } else { 0o666 };
    if meta.is_dir() {
        S_IFDIR | perm | 0o111
    } else {
        S_IFREG | perm
    }
}

fn os_error(err: io::Error, msg: &str) -> MachineError {
    MachineError::os(err.raw_os_error().map(Errno), msg)
}

/// `uos` module state
#[derive(Debug, Clone)]
pub struct Uos {
    cwd: String,
    machine: heapless::String<64>,
}

impl Default for Uos {
    fn default() -> Self {
        Self::new(DEFAULT_CWD)
    }
}

impl Uos {
    pub fn new(cwd: &str) -> Self {
        Self {
            cwd: cwd.into(),
            machine: field("SPRESENSE with cxd56"),
        }
    }

    /// Set the `machine` field of `uname()` from the board and MCU names
    pub fn with_machine(mut self, board: &str, mcu: &str) -> Self {
        self.machine = field(&format!("{} with {}", board, mcu));
        self
    }

    /// Absolute path for `path`, resolved against the working directory
    pub fn full_path(&self, path: Option<&str>) -> String {
        match path {
            None => self.cwd.clone(),
            Some(p) if p.starts_with('/') => p.into(),
            Some(p) => format!("{}/{}", self.cwd.trim_end_matches('/'), p),
        }
    }

    pub fn uname(&self) -> Uname {
        let version = env!("CARGO_PKG_VERSION");
        Uname {
            sysname: field(SYSNAME),
            nodename: field(SYSNAME),
            release: field(version),
            version: field(&format!("v{} on spresense", version)),
            machine: self.machine.clone(),
        }
    }

    /// Entries of a directory, or `[path]` for a file
    pub fn listdir(&self, path: Option<&str>) -> MachineResult<Vec<String>> {
        let full = self.full_path(path);
        let meta = fs::metadata(&full).map_err(|e| os_error(e, "File does not exist"))?;
        if !meta.is_dir() {
            return Ok(vec![path.unwrap_or(&full).into()]);
        }
        let mut names = fs::read_dir(&full)
            .map_err(|e| os_error(e, "File does not exist"))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    pub fn mkdir(&self, path: &str) -> MachineResult<()> {
        fs::create_dir(self.full_path(Some(path))).map_err(|e| os_error(e, "Cannot create directory"))
    }

    pub fn rmdir(&self, path: &str) -> MachineResult<()> {
        fs::remove_dir(self.full_path(Some(path))).map_err(|e| os_error(e, "Cannot remove directory"))
    }

    pub fn chdir(&mut self, path: &str) -> MachineResult<()> {
        let full = self.full_path(Some(path));
        match fs::metadata(&full) {
            Ok(meta) if meta.is_dir() => {
                debug!("chdir");
                self.cwd = full;
                Ok(())
            }
            Ok(_) => Err(MachineError::os(Some(Errno::ENOTDIR), "Cannot change directory")),
            Err(e) => Err(os_error(e, "Cannot change directory")),
        }
    }

    pub fn getcwd(&self) -> &str {
        &self.cwd
    }

    pub fn remove(&self, path: &str) -> MachineResult<()> {
        fs::remove_file(self.full_path(Some(path))).map_err(|e| os_error(e, "Cannot remove file"))
    }

    pub fn rename(&self, old: &str, new: &str) -> MachineResult<()> {
        fs::rename(self.full_path(Some(old)), self.full_path(Some(new)))
            .map_err(|e| os_error(e, "Cannot change file name"))
    }

    pub fn stat(&self, path: &str) -> MachineResult<Stat> {
        let meta = fs::metadata(self.full_path(Some(path))).map_err(|e| os_error(e, "Cannot find file"))?;
        Ok(Stat {
            mode: mode_of(&meta),
            size: meta.len(),
            atime: seconds(meta.accessed()),
            mtime: seconds(meta.modified()),
            ctime: seconds(meta.created().or_else(|_| meta.modified())),
        })
    }

    /// Call `uos.<name>(args)`
    pub fn call(&mut self, name: &str, args: &Args) -> MachineResult<Value> {
        let str_arg = |i: usize| -> MachineResult<&str> { args.positional[i].as_str() };
        match name {
            "uname" => {
                check_arg_count(args, 0, 0, false)?;
                Ok(self.uname().to_value())
            }
            "listdir" => {
                check_arg_count(args, 0, 1, false)?;
                let path = match args.positional.first() {
                    Some(v) => Some(v.as_str()?),
                    None => None,
                };
                let names = self.listdir(path)?;
                Ok(Value::List(names.iter().map(|n| Value::from(n.as_str())).collect()))
            }
            "getcwd" => {
                check_arg_count(args, 0, 0, false)?;
                Ok(Value::from(self.getcwd()))
            }
            "rename" => {
                check_arg_count(args, 2, 2, false)?;
                self.rename(str_arg(0)?, str_arg(1)?)?;
                Ok(Value::None)
            }
            "stat" => {
                check_arg_count(args, 1, 1, false)?;
                let stat = self.stat(str_arg(0)?)?;
                Ok(Value::Tuple(stat.to_tuple().into_iter().map(Value::Int).collect()))
            }
            "mkdir" | "rmdir" | "chdir" | "remove" => {
                check_arg_count(args, 1, 1, false)?;
                let path = str_arg(0)?;
                match name {
                    "mkdir" => self.mkdir(path)?,
                    "rmdir" => self.rmdir(path)?,
                    "chdir" => self.chdir(path)?,
                    _ => self.remove(path)?,
                }
                Ok(Value::None)
            }
            _ => Err(MachineError::Attribute(name.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExceptionKind;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("uos-{}-{}", std::process::id(), name));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn uos_in(dir: &PathBuf) -> Uos {
        Uos::new(dir.to_str().unwrap())
    }

    #[test]
    fn test_full_path() {
        let uos = Uos::default();
        assert_eq!(uos.full_path(None), "/mnt/spif");
        assert_eq!(uos.full_path(Some("main.py")), "/mnt/spif/main.py");
        assert_eq!(uos.full_path(Some("/mnt/sd0/a")), "/mnt/sd0/a");
        assert_eq!(Uos::new("/").full_path(Some("x")), "/x");
    }

    #[test]
    fn test_uname() {
        let uos = Uos::default().with_machine("SPRESENSE", "cxd56");
        let info = uos.uname();
        assert_eq!(info.sysname, "nuttx");
        assert_eq!(info.machine, "SPRESENSE with cxd56");
        match info.to_value() {
            Value::Tuple(fields) => assert_eq!(fields.len(), 5),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_directory_lifecycle() {
        let dir = scratch("lifecycle");
        let mut uos = uos_in(&dir);

        uos.call("mkdir", &Args::new().arg("sub")).unwrap();
        fs::write(dir.join("a.py"), b"print(1)").unwrap();
        let listing = uos.call("listdir", &Args::new()).unwrap();
        assert_eq!(listing, Value::List(vec!["a.py".into(), "sub".into()]));

        uos.call("chdir", &Args::new().arg("sub")).unwrap();
        assert!(uos.getcwd().ends_with("/sub"));
        let err = uos.call("chdir", &Args::new().arg("../a.py")).unwrap_err();
        assert_eq!(err.to_string(), "Cannot change directory");

        uos.call("chdir", &Args::new().arg(dir.to_str().unwrap())).unwrap();
        uos.call("rmdir", &Args::new().arg("sub")).unwrap();
        assert_eq!(uos.listdir(Some("a.py")).unwrap(), vec!["a.py".to_string()]);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_stat_rename_remove() {
        let dir = scratch("files");
        let uos = uos_in(&dir);
        fs::write(dir.join("data.bin"), [0u8; 12]).unwrap();

        let stat = uos.stat("data.bin").unwrap();
        let fields = stat.to_tuple();
        assert_eq!(fields[6], 12);
        assert_eq!(fields[3], 1);

        uos.rename("data.bin", "moved.bin").unwrap();
        assert!(uos.stat("data.bin").is_err());
        uos.remove("moved.bin").unwrap();

        let err = uos.remove("moved.bin").unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::OSError);
        assert_eq!(err.to_string(), "Cannot remove file");
        assert_eq!(err.errno(), Some(Errno::ENOENT));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_paths() {
        let uos = Uos::new("/nonexistent-uos-test");
        let err = uos.listdir(None).unwrap_err();
        assert_eq!(err.to_string(), "File does not exist");
        let err = uos.stat("x").unwrap_err();
        assert_eq!(err.to_string(), "Cannot find file");
    }
}
