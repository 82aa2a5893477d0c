//! Archive engine (C8): zip creation and extraction with the rebase +
//! basename-rename algebra from spec §4.4, grounded on the original
//! `hilvlimpl/unzip.go` for the extraction side (the original's zip
//! creation side, `generic/zip.go`, was an unfinished stub, so creation
//! follows spec.md §4.4's prose directly).

mod zip_engine;

pub use zip_engine::{create_zip, extract_zip};
