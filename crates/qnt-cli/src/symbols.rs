//! Symbol file loading.

use std::fs;
use std::path::Path;

use qnt_core::SymbolSpec;

use crate::error::CliError;

/// Reads a YAML mapping of source class to identifiers:
///
/// ```yaml
/// tsetmc:
///   - فولاد
///   - وبصادر
/// crypto:
///   - BTC/USDT
/// ```
///
/// A class with no entries (`crypto:`) is allowed as long as some other
/// class lists at least one identifier.
pub fn load(path: &Path) -> Result<SymbolSpec, CliError> {
    let contents = fs::read_to_string(path)?;
    parse(&contents).map_err(|source| CliError::SymbolFile {
        path: path.to_path_buf(),
        source,
    })
}

fn parse(contents: &str) -> Result<SymbolSpec, serde_yaml::Error> {
    serde_yaml::from_str(contents)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use qnt_core::SourceClass;
    use tempfile::NamedTempFile;

    use super::*;

    fn file_with(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn loads_both_source_classes() {
        let file = file_with("tsetmc:\n  - فولاد\n  - وبصادر\ncrypto:\n  - btc/usdt\n");

        let spec = load(file.path()).expect("valid file");

        let instruments = spec.instruments();
        assert_eq!(spec.len(), 3);
        assert!(instruments
            .iter()
            .any(|i| i.ticker() == "BTC/USDT" && i.source == SourceClass::Crypto));
        assert!(instruments
            .iter()
            .any(|i| i.ticker() == "فولاد" && i.source == SourceClass::Equity));
    }

    #[test]
    fn empty_class_is_allowed_when_another_has_symbols() {
        let file = file_with("tsetmc:\ncrypto: [ETH/USDT]\n");

        let spec = load(file.path()).expect("valid file");

        assert_eq!(spec.len(), 1);
    }

    #[test]
    fn unknown_source_class_is_a_validation_failure() {
        let file = file_with("nasdaq: [AAPL]\n");

        let err = load(file.path()).expect_err("unknown class");

        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("nasdaq"));
    }

    #[test]
    fn file_without_symbols_is_rejected() {
        let file = file_with("tsetmc: []\n");

        let err = load(file.path()).expect_err("empty request");

        assert!(matches!(err, CliError::SymbolFile { .. }));
    }

    #[test]
    fn missing_file_is_an_io_failure() {
        let dir = tempfile::tempdir().expect("temp dir");

        let err = load(&dir.path().join("absent.yaml")).expect_err("no file");

        assert_eq!(err.exit_code(), 10);
    }
}
