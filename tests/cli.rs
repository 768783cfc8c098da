//! End-to-end runs of the `binstage` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use binstage::config::SHM_DIR_ENV;
use binstage::table::reader::load_table;
use tempfile::{tempdir, TempDir};

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Workspace {
            dir: tempdir().unwrap(),
        }
    }

    fn shm_dir(&self) -> PathBuf {
        self.dir.path().join("shm")
    }

    fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write_f64(&self, name: &str, count: usize) -> PathBuf {
        let bytes: Vec<u8> = (0..count).flat_map(|i| (i as f64).to_ne_bytes()).collect();
        let path = self.file(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_binstage"))
            .args(args)
            .current_dir(self.dir.path())
            .env(SHM_DIR_ENV, self.shm_dir())
            .output()
            .unwrap()
    }

    fn no_segments_left(&self) -> bool {
        let shm = self.shm_dir();
        !shm.exists() || fs::read_dir(shm).unwrap().next().is_none()
    }
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn two_float64_values_become_value_column() {
    let ws = Workspace::new();
    ws.write_f64("pair.bin", 2);

    let out = ws.run(&["pair.bin", "pair.parquet"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(
        stdout(&out).trim(),
        "Successfully wrote 2 float64 values from buffer 'pair' to 'pair.parquet'"
    );

    let table = load_table(&ws.file("pair.parquet")).unwrap();
    assert_eq!(table.column_names(), ["value"]);
    assert_eq!(table.num_rows(), 2);
    assert_eq!(table.column_f64("value").unwrap(), vec![0.0, 1.0]);
    assert!(ws.no_segments_left());
}

#[test]
fn matrix_shape_gives_five_columns_two_rows() {
    let ws = Workspace::new();
    ws.write_f64("grid.bin", 10);

    let out = ws.run(&["grid.bin", "grid.parquet", "2,5", "float64"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let table = load_table(&ws.file("grid.parquet")).unwrap();
    assert_eq!(table.num_rows(), 2);
    assert_eq!(table.column_names(), ["0", "1", "2", "3", "4"]);
    assert_eq!(table.column_f64("4").unwrap(), vec![4.0, 9.0]);
    assert!(ws.no_segments_left());
}

#[test]
fn shape_mismatch_exits_one_without_output() {
    let ws = Workspace::new();
    ws.write_f64("short.bin", 2);

    let out = ws.run(&["short.bin", "short.parquet", "3"]);
    assert_eq!(out.status.code(), Some(1));
    let err = stderr(&out);
    assert!(err.starts_with("Error: "), "{err}");
    assert!(err.contains("needs 24 bytes but the segment holds 16"), "{err}");
    assert!(!ws.file("short.parquet").exists());
    assert!(ws.no_segments_left());
}

#[test]
fn existing_segment_name_exits_one() {
    let ws = Workspace::new();
    ws.write_f64("taken.bin", 2);
    fs::create_dir_all(ws.shm_dir()).unwrap();
    fs::write(ws.shm_dir().join("taken"), b"stale").unwrap();

    let out = ws.run(&["taken.bin", "taken.parquet"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("'taken' already exists"), "{}", stderr(&out));
    assert!(!ws.file("taken.parquet").exists());
    // The stale segment belongs to someone else and stays.
    assert_eq!(fs::read(ws.shm_dir().join("taken")).unwrap(), b"stale");
}

#[test]
fn malformed_shape_is_reported_before_staging() {
    let ws = Workspace::new();
    ws.write_f64("bad.bin", 2);

    let out = ws.run(&["bad.bin", "bad.parquet", "2,x"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("invalid shape format '2,x'"), "{}", stderr(&out));
    assert!(!ws.shm_dir().exists());
}

#[test]
fn unknown_dtype_is_rejected() {
    let ws = Workspace::new();
    ws.write_f64("dt.bin", 2);

    let out = ws.run(&["dt.bin", "dt.parquet", "", "complex128"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("unsupported data type: complex128"));
    assert!(!ws.shm_dir().exists());
}

#[test]
fn remote_destination_writes_local_file_name() {
    let ws = Workspace::new();
    let bytes: Vec<u8> = [1i32, 2, 3, 4, 5, 6].iter().flat_map(|v| v.to_ne_bytes()).collect();
    fs::write(ws.file("ints.bin"), &bytes).unwrap();

    let out = ws.run(&["ints.bin", "s3://bucket/prefix/ints.parquet", "3,2", "int32"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(
        stdout(&out).trim(),
        "Successfully wrote 6 int32 values from buffer 'ints' to 's3://bucket/prefix/ints.parquet'"
    );

    let table = load_table(&ws.file("ints.parquet")).unwrap();
    assert_eq!(table.to_row_major_bytes().unwrap(), bytes);
    assert!(ws.no_segments_left());
}

#[test]
fn wrong_argument_count_prints_usage() {
    let ws = Workspace::new();
    let out = ws.run(&["only-one-arg"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("Usage:"));
}

#[test]
fn missing_input_exits_one() {
    let ws = Workspace::new();
    let out = ws.run(&["absent.bin", "absent.parquet"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("cannot read input file"));
    assert!(!Path::new(&ws.file("absent.parquet")).exists());
}

#[cfg(unix)]
#[test]
fn interrupt_releases_segment_and_exits_130() {
    let ws = Workspace::new();
    // 64 MiB laid out as 8192 x 1024, so building and writing the table
    // keeps the segment alive long enough to interrupt.
    fs::write(ws.file("big.bin"), vec![0u8; 8192 * 1024 * 8]).unwrap();
    let segment = ws.shm_dir().join("big");

    let mut child = Command::new(env!("CARGO_BIN_EXE_binstage"))
        .args(["big.bin", "big.parquet", "8192,1024", "float64"])
        .current_dir(ws.dir.path())
        .env(SHM_DIR_ENV, ws.shm_dir())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(30);
    while !segment.exists() {
        assert!(child.try_wait().unwrap().is_none(), "binstage exited before staging");
        assert!(Instant::now() < deadline, "segment never appeared");
        thread::sleep(Duration::from_millis(1));
    }

    let kill = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(kill.success());

    let out = child.wait_with_output().unwrap();
    assert_eq!(out.status.code(), Some(130), "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("Interrupted; removed"), "{}", stderr(&out));
    assert!(ws.no_segments_left());
    assert!(!ws.file("big.parquet").exists());
    let leftovers: Vec<_> = fs::read_dir(ws.dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}
