/*Results of a volume check. Each section has its own flag so the report can
say which part of the layout is damaged; `errors` holds one line per finding. */

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsckReport {
    pub header_ok: bool,
    pub allocation_ok: bool,
    pub files_ok: bool,
    pub files_in_use: usize,
    pub tombstones: usize,
    pub errors: Vec<String>,
}

impl FsckReport {
    pub fn new() -> Self {
        Self {
            header_ok: true,
            allocation_ok: true,
            files_ok: true,
            files_in_use: 0,
            tombstones: 0,
            errors: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Default for FsckReport {
    fn default() -> Self {
        Self::new()
    }
}
