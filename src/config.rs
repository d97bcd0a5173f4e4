/// Options recognized by the processing stages, passed into each of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Pass external tool output through and log per-file progress.
    pub verbose: bool,
    /// Compare page filenames byte-for-byte instead of lowercased.
    pub case_sensitive_sort: bool,
    /// Keep the extraction directory after the run.
    pub retain_temp_dir: bool,
    /// Convert PNG/JPEG comic pages to WebP.
    pub convert_images: bool,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_case_sensitive_sort(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive_sort = case_sensitive;
        self
    }

    pub fn with_retain_temp_dir(mut self, retain: bool) -> Self {
        self.retain_temp_dir = retain;
        self
    }

    pub fn with_convert_images(mut self, convert: bool) -> Self {
        self.convert_images = convert;
        self
    }
}
