//! Mapping maintenance on disk: generate, sanitize, review.

use corretagem::mapping::generator::{generate, MappingStores};
use corretagem::mapping::review::review;
use corretagem::mapping::sanitizer::{apply_fixes, TickerSanitizer};
use corretagem::mapping::{normalize_description, MappingFiles, OfflineLookup, TickerLookup};
use corretagem::tickers::{FallbackTable, TickerMapping, TickerResolver};
use std::fs;
use tempfile::TempDir;

struct ItausaLookup;

impl TickerLookup for ItausaLookup {
    fn lookup(&self, company: &str, suffix_digit: Option<u8>) -> Option<String> {
        (company == "ITAUSA").then(|| format!("ITSA{}", suffix_digit.unwrap_or(4)))
    }
}

fn workspace() -> (TempDir, MappingFiles) {
    let dir = TempDir::new().unwrap();
    let files = MappingFiles::beside(dir.path().join("resources").join("tickerMapping.properties"));
    fs::create_dir_all(files.mapping.parent().unwrap()).unwrap();
    fs::write(&files.mapping, "ITAUSA PN N1=ITSA3\nVALE ON NM=VALE3\n").unwrap();
    (dir, files)
}

#[test]
fn generate_then_review_fills_the_mapping() {
    let (_dir, files) = workspace();

    let descriptions = ["1 C VISTA LOCALIZA ON NM", "AMAZON DR", "ABEVA135", "VALE ON NM"]
        .iter()
        .map(|raw| normalize_description(raw))
        .collect::<Vec<_>>();
    let mut stores = MappingStores::load(&files).unwrap();
    let summary = generate(&descriptions, &mut stores, &OfflineLookup);
    stores.persist(&files).unwrap();

    assert_eq!(summary.existing, 1);
    assert_eq!(summary.from_heuristic, 1);
    assert_eq!(summary.options, 1);
    assert_eq!(summary.unmapped, 1);

    let mapping = TickerMapping::load(&files.mapping).unwrap();
    assert_eq!(mapping.get("LOCALIZA ON NM"), Some("LOCA3"));
    assert_eq!(mapping.get("ITAUSA PN N1"), Some("ITSA3"));
    assert!(!mapping.contains("ABEVA135"));

    // Someone fills in the pending line by hand
    let unmapped = fs::read_to_string(&files.unmapped).unwrap();
    fs::write(&files.unmapped, unmapped.replace("AMAZON DR=", "AMAZON DR=amzo34")).unwrap();

    let reviewed = review(&files).unwrap();
    assert_eq!(reviewed.imported, 1);
    assert_eq!(reviewed.pending, 0);

    let mapping = TickerMapping::load(&files.mapping).unwrap();
    assert_eq!(mapping.get("AMAZON DR"), Some("AMZO34"));
    assert!(TickerMapping::load(&files.unmapped).unwrap().is_empty());

    // The extractor picks the new entries up
    let resolver = TickerResolver::new(FallbackTable::default(), Some(&mapping));
    assert_eq!(resolver.resolve(&["AMAZON DR"]).as_deref(), Some("AMZO34"));
}

#[test]
fn sanitize_fix_rewrites_only_changed_lines() {
    let (_dir, files) = workspace();
    let original = "# comentário preservado\nITAUSA PN N1=ITSA3\nVALE ON NM=VALE3\n";
    fs::write(&files.mapping, original).unwrap();

    let mapping = TickerMapping::load(&files.mapping).unwrap();
    let lookup = ItausaLookup;
    let report = TickerSanitizer::new(&lookup).sanitize(&mapping, true);

    assert_eq!(report.checked, 2);
    assert_eq!(report.issue_count(), 1);
    assert_eq!(
        report.fixes.get("ITAUSA PN N1"),
        Some(&("ITSA3".to_string(), "ITSA4".to_string()))
    );

    assert_eq!(apply_fixes(&files.mapping, &report.fixes).unwrap(), 1);
    assert_eq!(
        fs::read_to_string(&files.mapping).unwrap(),
        "# comentário preservado\nITAUSA PN N1=ITSA4\nVALE ON NM=VALE3\n"
    );

    let csv_path = files.mapping.with_file_name("report.csv");
    assert_eq!(report.write_csv(&csv_path).unwrap(), 1);
    let csv = fs::read_to_string(&csv_path).unwrap();
    assert!(csv.starts_with("Descrição,Ticker Atual,Tipo de Problema,Sugestão"));
    assert!(csv.contains("ITAUSA PN N1,ITSA3"));
    assert!(csv.contains("ITSA4"));
}

#[test]
fn offline_sanitize_reports_without_fixing() {
    let (_dir, files) = workspace();
    let mapping = TickerMapping::load(&files.mapping).unwrap();
    let report = TickerSanitizer::new(&OfflineLookup).sanitize(&mapping, true);

    assert_eq!(report.issue_count(), 1);
    assert!(report.fixes.is_empty());
    let csv_path = files.mapping.with_file_name("report.csv");
    report.write_csv(&csv_path).unwrap();
    assert!(fs::read_to_string(&csv_path).unwrap().contains("Revisão Manual"));
}

#[test]
fn description_normalization_is_idempotent() {
    let samples = [
        "1 C VISTA EMBRAER ON NM 100 24,20",
        "RV LISTADO V VISTA VALE ON NM",
        "BOVESPA VISTA C/V ITAUSA PN N1 @",
        "  WEG   ON   NM  ",
        "",
    ];
    for raw in samples {
        let once = normalize_description(raw);
        assert_eq!(normalize_description(&once), once, "{raw:?}");
    }
}
