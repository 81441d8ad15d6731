use anyhow::Result;
use std::collections::BTreeMap;
use std::time::Duration;

use moral_bell::analysis::{self, FailureKind};
use moral_bell::design::{DesignGenerator, DesignParams, MeasurementSetting, Party, ScenarioCatalog};
use moral_bell::oracle::{collect_batch, ReplayOracle};
use moral_bell::{BellError, ChshCalculator, EngineConfig, Manifest, Report, ResultSet, Resolver, VerdictExtractor};

const CATALOG: &str = r#"
scenarios:
  - id: lifeboat
    texts:
      en: { present: "Six people share a lifeboat built for five." }
axes:
  en: { primary: "Judge the act by its outcomes.", secondary: "Judge the act by the duties involved." }
"#;

fn config() -> EngineConfig {
    EngineConfig {
        seed: Some(42),
        ..EngineConfig::default()
    }
}

fn design(trials: u32) -> Result<(Vec<moral_bell::oracle::OracleRequest>, Manifest)> {
    let catalog: ScenarioCatalog = serde_yaml::from_str(CATALOG)?;
    let mut generator = DesignGenerator::new(catalog, &config())?;
    let out = generator.generate(&DesignParams {
        trials,
        ..Default::default()
    })?;
    Ok((out.requests, out.manifest))
}

/// Party A always answers NTA. Party B agrees except under PS, and disagrees
/// once under SS (trial 0). One PS answer is unreadable and one PP answer
/// never arrives.
fn scripted_responses(manifest: &Manifest) -> BTreeMap<String, String> {
    let mut responses = BTreeMap::new();
    for (id, c) in &manifest.conditions {
        let text = match (c.subject, c.setting, c.trial_index) {
            (Party::A, _, _) => r#"{"verdict": "NTA", "reason": "understandable"}"#.to_string(),
            (Party::B, MeasurementSetting::PP, 5) => continue,
            (Party::B, MeasurementSetting::PS, 3) => "I'd rather not say.".to_string(),
            (Party::B, MeasurementSetting::PS, _) => "Verdict: YTA".to_string(),
            (Party::B, MeasurementSetting::SS, 0) => "Honestly? YTA.".to_string(),
            (Party::B, _, _) => "**Final verdict:** NTA".to_string(),
        };
        responses.insert(id.clone(), text);
    }
    responses
}

#[tokio::test]
async fn test_replayed_batch_end_to_end() -> Result<()> {
    let (requests, manifest) = design(20)?;
    assert_eq!(requests.len(), 20 * 4 * 2);

    let oracle = ReplayOracle::new(scripted_responses(&manifest));
    let outcomes = collect_batch(&oracle, requests, Duration::from_millis(1)).await?;
    let results = ResultSet::from_outcomes(outcomes);

    let config = config();
    let extractor = VerdictExtractor::new(config.labels.clone(), config.excerpt_chars)?;
    let resolver = Resolver::new(&extractor).with_manifest(Some(&manifest));
    let calculator = ChshCalculator::new(config.classical_bound);
    let analysis = analysis::analyze(&resolver, &results, &calculator)?;

    assert_eq!(analysis.results.len(), 1);
    let r = &analysis.results[0];
    assert_eq!(r.key.scenario, "lifeboat");
    assert_eq!(r.pp.n, 19);
    assert_eq!(r.ps.n, 19);
    assert!((r.pp.mean - 1.0).abs() < 1e-9);
    assert!((r.ps.mean + 1.0).abs() < 1e-9);
    assert!((r.ss.mean - 0.9).abs() < 1e-9);
    assert!((r.s - 3.9).abs() < 1e-9);
    assert!((r.std_err - 0.1).abs() < 1e-9);
    assert!(r.violation);
    assert!((r.significance - 19.0).abs() < 1e-6);

    assert_eq!(analysis.ledger.count(FailureKind::Oracle), 1);
    assert_eq!(analysis.ledger.count(FailureKind::Parse), 1);
    assert_eq!(analysis.ledger.count(FailureKind::Unmatched), 2);

    let report = Report::from_analysis(analysis, Some("replay".into()), &config);
    assert_eq!(report.flagged().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_reanalysis_is_idempotent() -> Result<()> {
    let (requests, manifest) = design(10)?;
    let oracle = ReplayOracle::new(scripted_responses(&manifest));
    let results = ResultSet::from_outcomes(collect_batch(&oracle, requests, Duration::from_millis(1)).await?);

    let extractor = VerdictExtractor::new(config().labels, 160)?;
    let resolver = Resolver::new(&extractor).with_manifest(Some(&manifest));
    let calculator = ChshCalculator::default();

    let first = analysis::analyze(&resolver, &results, &calculator)?;
    let second = analysis::analyze(&resolver, &results, &calculator)?;
    assert_eq!(first.results, second.results);
    assert_eq!(first.ledger.counts, second.ledger.counts);
    Ok(())
}

#[tokio::test]
async fn test_report_survives_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (requests, manifest) = design(8)?;
    let oracle = ReplayOracle::new(scripted_responses(&manifest));
    let results = ResultSet::from_outcomes(collect_batch(&oracle, requests, Duration::from_millis(1)).await?);

    // Results and manifest written out, then analysis from the files alone
    let results_path = dir.path().join("results.json");
    let manifest_path = dir.path().join("manifest.json");
    results.save(&results_path)?;
    manifest.save(&manifest_path)?;

    let reloaded = ResultSet::load(&results_path)?;
    let manifest = Manifest::load(&manifest_path)?;
    assert_eq!(reloaded.len(), results.len());

    let config = config();
    let extractor = VerdictExtractor::new(config.labels.clone(), config.excerpt_chars)?;
    let resolver = Resolver::new(&extractor).with_manifest(Some(&manifest));
    let analysis = analysis::analyze(&resolver, &reloaded, &ChshCalculator::default())?;
    let report = Report::from_analysis(analysis, Some("replay".into()), &config);

    let report_path = dir.path().join("report.json");
    report.save(&report_path)?;
    let back = Report::load(&report_path)?;

    assert_eq!(back.results.len(), report.results.len());
    assert_eq!(back.results[0].key, report.results[0].key);
    assert!((back.results[0].s - report.results[0].s).abs() < 1e-12);
    assert_eq!(back.failures.total(), report.failures.total());
    assert_eq!(back.summary.len(), 1);
    assert_eq!(back.summary[0].key, report.results[0].key);
    assert_eq!(back.summary[0].n, report.results[0].n);
    assert_eq!(back.summary[0].flagged, report.is_flagged(&report.results[0]));
    Ok(())
}

#[tokio::test]
async fn test_without_manifest_nothing_resolves() -> Result<()> {
    let (requests, manifest) = design(4)?;
    let oracle = ReplayOracle::new(scripted_responses(&manifest));
    let results = ResultSet::from_outcomes(collect_batch(&oracle, requests, Duration::from_millis(1)).await?);

    let extractor = VerdictExtractor::new(config().labels, 160)?;
    let resolver = Resolver::new(&extractor);
    match analysis::analyze(&resolver, &results, &ChshCalculator::default()) {
        Err(BellError::NoConfigurations { records }) => assert_eq!(records, results.len()),
        other => panic!("expected NoConfigurations, got {:?}", other.map(|a| a.results.len())),
    }
    Ok(())
}

#[test]
fn test_embedded_conditions_stand_in_for_manifest() -> Result<()> {
    let raw = r#"[
        {"custom_id": "mono_lifeboat_en-present_en-present_000_PP_A_x1", "verdict": 1,
         "condition": {"scenario": "lifeboat", "frame_a": {"language": "en", "tense": "present"}, "frame_b": {"language": "en", "tense": "present"}}},
        {"custom_id": "mono_lifeboat_en-present_en-present_000_PP_B_x2", "verdict": "NTA",
         "condition": {"scenario": "lifeboat", "frame_a": {"language": "en", "tense": "present"}, "frame_b": {"language": "en", "tense": "present"}}},
        {"custom_id": "mono_lifeboat_en-present_en-present_000_PS_A_x3", "verdict": -1,
         "condition": {"scenario": "lifeboat", "frame_a": {"language": "en", "tense": "present"}, "frame_b": {"language": "en", "tense": "present"}}},
        {"custom_id": "mono_lifeboat_en-present_en-present_000_PS_B_x4", "text": "{\"verdict\": \"NTA\"}",
         "condition": {"scenario": "lifeboat", "frame_a": {"language": "en", "tense": "present"}, "frame_b": {"language": "en", "tense": "present"}}}
    ]"#;
    let results = ResultSet::parse(raw)?;
    let extractor = VerdictExtractor::new(config().labels, 160)?;
    let resolution = Resolver::new(&extractor).resolve(&results);
    assert_eq!(resolution.embedded_fallbacks, 4);

    let analysis = analysis::analyze_observations(
        &resolution.observations,
        resolution.ledger,
        resolution.records,
        &ChshCalculator::default(),
    )?;
    let r = &analysis.results[0];
    assert_eq!(r.pp.n, 1);
    assert_eq!(r.ps.n, 1);
    assert!(r.sp.std_err.is_infinite());
    // pp = +1, ps = -1, sp = ss = 0 -> S = 2, not above the bound
    assert!((r.s - 2.0).abs() < 1e-9);
    assert!(!r.violation);
    assert_eq!(r.significance, 0.0);
    Ok(())
}

#[test]
fn test_empty_result_files_are_rejected() {
    assert!(matches!(ResultSet::parse("[]"), Err(BellError::NoResults)));
    assert!(matches!(ResultSet::parse("{}"), Err(BellError::NoResults)));
    assert!(ResultSet::parse("not json at all").is_err());
}
