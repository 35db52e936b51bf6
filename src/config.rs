use std::path::{Path, PathBuf};

pub struct Config {
    anno_file: PathBuf,
    reads_file: PathBuf,
    // Per-read relative offset output; always <reads_file>.relative
    relative_file: PathBuf,
    output_file: Option<PathBuf>,
}

impl Config {
    pub fn new(anno_file: PathBuf, reads_file: PathBuf, output_file: Option<PathBuf>) -> Self {
        let mut s = reads_file.clone().into_os_string();
        s.push(".relative");
        let relative_file = PathBuf::from(s);
        Self {
            anno_file,
            reads_file,
            relative_file,
            output_file,
        }
    }

    pub fn anno_file(&self) -> &Path {
        &self.anno_file
    }

    pub fn reads_file(&self) -> &Path {
        &self.reads_file
    }

    pub fn relative_file(&self) -> &Path {
        &self.relative_file
    }

    pub fn output_file(&self) -> Option<&Path> {
        self.output_file.as_deref()
    }
}
