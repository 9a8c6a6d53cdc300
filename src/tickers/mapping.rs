//! Description → ticker store backed by a flat `key=value` properties file.

use anyhow::{Context, Result};
use encoding_rs::ISO_8859_15;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Header written at the top of the main mapping file.
pub const MAPPING_HEADER: &[&str] = &[
    "# Mapeamento de Descrições de Ativos para Tickers B3",
    "# Formato: DESCRICAO_DO_ATIVO=TICKER",
    "#",
    "# Este arquivo é gerado/atualizado automaticamente pelo comando `corretagem mapping generate`",
    "# Você pode editar manualmente para corrigir mapeamentos incorretos",
    "# Nota: Opções são armazenadas em tickerMapping_options.properties",
];

/// Header written at the top of the option-contract store.
pub const OPTIONS_HEADER: &[&str] = &[
    "# Mapeamento de Opções (códigos de contratos de opções)",
    "# Formato: CODIGO_DA_OPCAO=CODIGO_DA_OPCAO",
    "#",
    "# Estes códigos não entram no mapeamento principal de tickers",
];

/// Header written at the top of the unmapped store.
pub const UNMAPPED_HEADER: &[&str] = &[
    "# Descrições não mapeadas - PARA REVISÃO MANUAL",
    "# Formato: DESCRICAO_DO_ATIVO=TICKER_DESEJADO",
    "#",
    "# Instruções:",
    "# 1. Preencha o TICKER_DESEJADO para as descrições que você conhece",
    "# 2. Deixe em branco (ou comente com #) as que você não conhece",
    "# 3. Execute: corretagem mapping review",
    "# 4. Os mapeamentos preenchidos serão movidos para o arquivo principal",
    "# 5. Este arquivo será regenerado na próxima execução com novos não mapeados",
];

/// Typed description → ticker dictionary.
///
/// Keys are normalized asset descriptions, values are B3 symbols. Iteration
/// and persistence are always in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickerMapping {
    entries: BTreeMap<String, String>,
}

impl TickerMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a mapping file; a missing file yields an empty mapping.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Mapping file {:?} not found, starting empty", path);
            return Ok(Self::new());
        }

        let bytes =
            fs::read(path).with_context(|| format!("Failed to read mapping file {:?}", path))?;
        let mapping = Self::parse(&decode_properties(&bytes));

        info!("Loaded {} ticker mapping(s) from {:?}", mapping.len(), path);
        Ok(mapping)
    }

    /// Parse properties text. Blank and `#` lines are skipped, each line is
    /// split on its first `=`, and later keys override earlier ones.
    pub fn parse(content: &str) -> Self {
        let mut entries = BTreeMap::new();
        for (key, value) in property_lines(content) {
            entries.insert(key, value);
        }
        Self { entries }
    }

    pub fn get(&self, description: &str) -> Option<&str> {
        self.entries.get(description).map(String::as_str)
    }

    pub fn contains(&self, description: &str) -> bool {
        self.entries.contains_key(description)
    }

    /// Insert or replace an entry, returning the previous ticker.
    pub fn insert(&mut self, description: impl Into<String>, ticker: impl Into<String>) -> Option<String> {
        self.entries.insert(description.into(), ticker.into())
    }

    pub fn remove(&mut self, description: &str) -> Option<String> {
        self.entries.remove(description)
    }

    /// Merge another mapping into this one; entries of `other` win.
    pub fn merge(&mut self, other: TickerMapping) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the full file: header comments, a blank line, sorted entries.
    pub fn to_properties(&self, header: &[&str]) -> String {
        let mut out = String::new();
        for line in header {
            out.push_str(line);
            out.push('\n');
        }
        if !header.is_empty() {
            out.push('\n');
        }
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Rewrite the whole file at `path`, creating parent directories.
    pub fn persist<P: AsRef<Path>>(&self, path: P, header: &[&str]) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        fs::write(path, self.to_properties(header))
            .with_context(|| format!("Failed to write mapping file {:?}", path))?;
        info!("Saved {} mapping(s) to {:?}", self.len(), path);
        Ok(())
    }
}

impl FromIterator<(String, String)> for TickerMapping {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Decode a properties file, falling back to ISO-8859-15 for legacy files.
pub fn decode_properties(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (decoded, _, _) = ISO_8859_15.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Key/value pairs of every non-comment line holding a `=`.
pub fn property_lines(content: &str) -> impl Iterator<Item = (String, String)> + '_ {
    content.lines().filter_map(|raw| {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let (key, value) = line.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some((key.to_string(), value.trim().to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse_skips_comments_and_splits_on_first_equals() {
        let content = "# comentario\n\nEMBRAER ON NM = EMBR3\nA=B=C\nsem separador\n";
        let mapping = TickerMapping::parse(content);
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get("EMBRAER ON NM"), Some("EMBR3"));
        assert_eq!(mapping.get("A"), Some("B=C"));
    }

    #[test]
    fn parse_last_write_wins() {
        let mapping = TickerMapping::parse("VALE ON=VALE5\nVALE ON=VALE3\n");
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get("VALE ON"), Some("VALE3"));
    }

    #[test]
    fn merge_overrides_with_other() {
        let mut base = TickerMapping::parse("A=1\nB=2\n");
        base.merge(TickerMapping::parse("B=3\nC=4\n"));
        assert_eq!(base.get("A"), Some("1"));
        assert_eq!(base.get("B"), Some("3"));
        assert_eq!(base.get("C"), Some("4"));
    }

    #[test]
    fn persist_writes_header_and_sorted_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("tickerMapping.properties");

        let mut mapping = TickerMapping::new();
        mapping.insert("WEG ON NM", "WEGE3");
        mapping.insert("AMBEV S/A ON", "ABEV3");
        mapping.persist(&path, MAPPING_HEADER).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Mapeamento de Descrições de Ativos para Tickers B3\n"));
        let entries: Vec<&str> = content
            .lines()
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect();
        assert_eq!(entries, vec!["AMBEV S/A ON=ABEV3", "WEG ON NM=WEGE3"]);

        let reloaded = TickerMapping::load(&path).unwrap();
        assert_eq!(reloaded, mapping);
    }

    #[test]
    fn load_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let mapping = TickerMapping::load(temp.path().join("nada.properties")).unwrap();
        assert!(mapping.is_empty());
    }

    #[test]
    fn load_decodes_latin_files() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("latin.properties");
        // "SÃO MARTINHO ON=SMTO3" in ISO-8859-15
        let mut bytes = b"S".to_vec();
        bytes.push(0xC3);
        bytes.extend_from_slice(b"O MARTINHO ON=SMTO3\n");
        std::fs::write(&path, bytes).unwrap();

        let mapping = TickerMapping::load(&path).unwrap();
        assert_eq!(mapping.get("SÃO MARTINHO ON"), Some("SMTO3"));
    }
}
