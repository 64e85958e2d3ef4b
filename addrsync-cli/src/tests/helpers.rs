//! Test helpers for laying out unit input directories.

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

/// Temporary input and output directories.
pub(super) struct Workspace {
    _dir: TempDir,
    pub(super) root: Utf8PathBuf,
    pub(super) input: Utf8PathBuf,
    pub(super) output: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        let input = root.join("units");
        fs::create_dir_all(input.as_std_path()).expect("create input dir");
        Self {
            _dir: dir,
            output: root.join("changes"),
            input,
            root,
        }
    }

    /// Write a registry extract listing `count` numbers on one street.
    pub(super) fn write_registry(&self, unit: &str, street: &str, count: usize) {
        let rows: Vec<_> = (1..=count)
            .map(|number| {
                json!({
                    "name": street,
                    "number": number.to_string(),
                    "postcode": "0155",
                    "city": "Oslo",
                    "lon": 10.742,
                    "lat": 59.911,
                })
            })
            .collect();
        write_utf8(
            &self.input.join(format!("{unit}.registry.json")),
            serde_json::Value::Array(rows).to_string().as_bytes(),
        );
    }

    pub(super) fn output_file(&self, name: &str) -> Utf8PathBuf {
        self.output.join(name)
    }
}

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    fs::write(path.as_std_path(), contents).expect("write file");
}
