//! Company registry reader.
//!
//! The registry is a CSV export of the accounting spreadsheet: one row per
//! company, with the name and the state registration number somewhere in
//! the columns. A missing or unreadable file means "nothing to process
//! this run", never a crash. Registration validation is not done here —
//! that is the validator's job.

use std::path::{Path, PathBuf};

use log::{error, info, warn};
use thiserror::Error;

/// One raw registry row, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub raw_id: String,
    pub name: String,
}

#[derive(Error, Debug)]
enum RegistryReadError {
    #[error("registry file not found: {0}")]
    Missing(PathBuf),

    #[error("failed to read registry: {0}")]
    Read(#[from] csv::Error),
}

/// Header names accepted for the registration-number column.
const ID_HEADERS: &[&str] = &["ie", "inscricao", "inscricao_estadual", "inscrição estadual"];
/// Header names accepted for the company-name column.
const NAME_HEADERS: &[&str] = &["nome", "name", "empresa", "razao social", "razão social"];

/// Positional fallback matching the original spreadsheet layout:
/// name in the first column, registration in the third.
const FALLBACK_NAME_COLUMN: usize = 0;
const FALLBACK_ID_COLUMN: usize = 2;

pub struct CompanyRegistry {
    path: PathBuf,
}

impl CompanyRegistry {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads all registry rows. Failures are logged and yield an empty
    /// list.
    pub fn load(&self) -> Vec<RegistryEntry> {
        match self.read() {
            Ok(entries) => {
                info!("Loaded {} companies from registry", entries.len());
                entries
            }
            Err(e) => {
                error!("Could not load company registry: {}", e);
                Vec::new()
            }
        }
    }

    fn read(&self) -> Result<Vec<RegistryEntry>, RegistryReadError> {
        if !self.path.exists() {
            return Err(RegistryReadError::Missing(self.path.clone()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let headers = reader.headers()?.clone();
        let (name_idx, id_idx) = column_indices(&headers);

        let mut entries = Vec::new();
        for result in reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping malformed registry row: {}", e);
                    continue;
                }
            };

            let raw_id = record.get(id_idx).unwrap_or("").trim().to_string();
            if raw_id.is_empty() {
                continue;
            }

            let name = record
                .get(name_idx)
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Empresa_{}", raw_id));

            entries.push(RegistryEntry { raw_id, name });
        }

        Ok(entries)
    }
}

/// Finds the (name, id) column pair by header name, falling back to the
/// original spreadsheet's fixed positions.
fn column_indices(headers: &csv::StringRecord) -> (usize, usize) {
    let find = |candidates: &[&str]| {
        headers
            .iter()
            .position(|h| candidates.contains(&h.trim().to_lowercase().as_str()))
    };

    let name_idx = find(NAME_HEADERS);
    let id_idx = find(ID_HEADERS);

    match (name_idx, id_idx) {
        (Some(name), Some(id)) => (name, id),
        _ => {
            let last = headers.len().saturating_sub(1);
            (
                FALLBACK_NAME_COLUMN,
                if headers.len() > FALLBACK_ID_COLUMN {
                    FALLBACK_ID_COLUMN
                } else {
                    last
                },
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_registry(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("empresas.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_with_named_headers() {
        let tmp = TempDir::new().unwrap();
        let path = write_registry(
            &tmp,
            "ie,nome\n10.383.278-9,Acme Ltda\n11.222.333-4,Beta SA\n",
        );

        let entries = CompanyRegistry::new(&path).load();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].raw_id, "10.383.278-9");
        assert_eq!(entries[0].name, "Acme Ltda");
    }

    #[test]
    fn test_load_with_positional_fallback() {
        let tmp = TempDir::new().unwrap();
        let path = write_registry(
            &tmp,
            "empresa_nome,cnpj,registro\nAcme Ltda,123,10.383.278-9\n",
        );

        let entries = CompanyRegistry::new(&path).load();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Acme Ltda");
        assert_eq!(entries[0].raw_id, "10.383.278-9");
    }

    #[test]
    fn test_missing_file_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let registry = CompanyRegistry::new(tmp.path().join("nope.csv"));
        assert!(registry.load().is_empty());
    }

    #[test]
    fn test_blank_id_rows_skipped_and_name_defaulted() {
        let tmp = TempDir::new().unwrap();
        let path = write_registry(&tmp, "ie,nome\n,No Id Corp\n103832789,\n");

        let entries = CompanyRegistry::new(&path).load();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].raw_id, "103832789");
        assert_eq!(entries[0].name, "Empresa_103832789");
    }

    #[test]
    fn test_sentinel_ids_pass_through_for_validator() {
        let tmp = TempDir::new().unwrap();
        let path = write_registry(&tmp, "ie,nome\nNÃO TEM,Semregistro ME\n103832789,Acme\n");

        let entries = CompanyRegistry::new(&path).load();
        // The reader does not validate; the sentinel reaches the validator.
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].raw_id, "NÃO TEM");
    }

    #[test]
    fn test_order_preserved() {
        let tmp = TempDir::new().unwrap();
        let path = write_registry(
            &tmp,
            "ie,nome\n333333333,C\n111111111,A\n222222222,B\n",
        );

        let entries = CompanyRegistry::new(&path).load();
        let ids: Vec<&str> = entries.iter().map(|e| e.raw_id.as_str()).collect();
        assert_eq!(ids, vec!["333333333", "111111111", "222222222"]);
    }
}
