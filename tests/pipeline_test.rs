use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use exam_insight::analysis::aggregate::{GroupKey, Grouping};
use exam_insight::analysis::correlation::{OrdinalMapping, Sign};
use exam_insight::analysis::outlier::FilterStatus;
use exam_insight::config::PipelineConfig;
use exam_insight::data::filter::is_valid;
use exam_insight::data::loader::load_bytes;
use exam_insight::data::model::{IncomeBracket, ScoreColumn};
use exam_insight::error::StatError;
use exam_insight::pipeline::{prepare, Session};
use exam_insight::report::Report;
use tempfile::NamedTempFile;

const HEADER: &str =
    "NU_INSCRICAO;CO_MUNICIPIO_PROVA;NU_NOTA_CN;NU_NOTA_CH;NU_NOTA_LC;NU_NOTA_MT;NU_NOTA_REDACAO;Q006";

const MUNICIPALITIES: [u32; 5] = [1_302_603, 2_927_408, 3_550_308, 4_106_902, 5_300_108];

/// A deterministic population of `n` ordinary participants followed by a few
/// extreme ones.
fn population(n: usize) -> Vec<u8> {
    let mut text = HEADER.to_string();
    for i in 0..n {
        let income = (b'A' + (i % 17) as u8) as char;
        let municipality = MUNICIPALITIES[i % 5];
        let base = 450.0 + 5.0 * (i % 17) as f64 + ((i * 31) % 23) as f64;
        text.push_str(&format!(
            "\n{i};{municipality};{:.1};{:.1};{:.1};{:.1};{};{income}",
            base,
            base + 12.0 + ((i * 7) % 11) as f64,
            base + 4.0 - ((i * 13) % 9) as f64,
            base + 20.0 + ((i * 17) % 13) as f64,
            560 + (i % 10) * 20,
        ));
    }
    for (j, scores) in [
        [980.0, 120.0, 975.0, 110.0],
        [90.0, 960.0, 85.0, 990.0],
        [995.0, 990.0, 985.0, 999.0],
    ]
    .iter()
    .enumerate()
    {
        text.push_str(&format!(
            "\nX{j};3550308;{};{};{};{};600;C",
            scores[0], scores[1], scores[2], scores[3]
        ));
    }
    text.into_bytes()
}

#[test]
fn clean_dataset_is_valid_subset_of_loaded() -> Result<()> {
    let data = population(397);
    let loaded = load_bytes(&data)?;
    let prepared = prepare(&data, &PipelineConfig::default())?;

    assert_eq!(prepared.summary.original, 400);
    assert_eq!(prepared.summary.filter_status, FilterStatus::Applied);
    assert_eq!(prepared.summary.outliers_removed, 20);
    assert_eq!(prepared.clean.len(), 380);
    assert!((prepared.summary.percent_removed - 5.0).abs() < 1e-9);

    assert!(prepared.clean.iter().all(is_valid));
    assert!(prepared
        .clean
        .iter()
        .all(|r| loaded.dataset.records().contains(r)));
    // The three extreme participants are gone.
    assert!(!prepared
        .clean
        .iter()
        .any(|r| r.objective_scores()[0] > 900.0 || r.objective_scores()[0] < 100.0));
    Ok(())
}

#[test]
fn identical_input_gives_identical_clean_dataset() -> Result<()> {
    let data = population(300);
    let a = prepare(&data, &PipelineConfig::default())?;
    let b = prepare(&data, &PipelineConfig::default())?;
    assert_eq!(a.clean, b.clean);
    assert_eq!(a.summary, b.summary);
    Ok(())
}

#[test]
fn group_statistics_are_ordered_and_counted() -> Result<()> {
    let prepared = prepare(&population(500), &PipelineConfig::default())?;
    for grouping in [Grouping::Income, Grouping::Region] {
        for column in ScoreColumn::ALL {
            let stats = prepared.group_statistics(grouping, column);
            for (key, s) in &stats {
                assert!(s.min <= s.p25 && s.p25 <= s.p50 && s.p50 <= s.p75 && s.p75 <= s.max);
                let expected = prepared
                    .clean
                    .iter()
                    .filter(|r| grouping.key_of(r) == Some(*key))
                    .count();
                assert_eq!(s.count, expected);
            }
        }
    }
    Ok(())
}

#[test]
fn worked_example_ten_rows_two_incomplete() -> Result<()> {
    let rows = [
        "0;3550308;500;500;500;500;600;A",
        "1;3550308;520;500;500;500;600;A",
        "2;3550308;600;500;500;500;600;B",
        "3;3550308;510;510;510;510;;C",
        "4;3550308;530;530;530;530;;C",
        "5;3550308;540;540;540;540;600;D",
        "6;3550308;550;550;550;550;600;D",
        "7;3550308;560;560;560;560;600;E",
        "8;3550308;570;570;570;570;600;E",
        "9;3550308;580;580;580;580;600;F",
    ];
    let data = format!("{HEADER}\n{}", rows.join("\n")).into_bytes();
    let config = PipelineConfig {
        min_records: 1,
        ..PipelineConfig::default()
    };

    let prepared = prepare(&data, &config)?;
    assert_eq!(prepared.summary.raw_rows, 10);
    assert_eq!(prepared.summary.parse_dropped.missing_field, 2);
    assert_eq!(prepared.summary.original, 8);
    assert_eq!(prepared.summary.outliers_removed, 0);

    let stats = prepared.group_statistics(Grouping::Income, ScoreColumn::NaturalSciences);
    let a = &stats[&GroupKey::Income(IncomeBracket::A)];
    assert_eq!((a.count, a.mean, a.min, a.max), (2, 510.0, 500.0, 520.0));
    let b = &stats[&GroupKey::Income(IncomeBracket::B)];
    assert_eq!((b.count, b.mean, b.min, b.max), (1, 600.0, 600.0, 600.0));
    assert!(!stats.contains_key(&GroupKey::Income(IncomeBracket::C)));

    // Every essay is 600: no variance, no coefficient.
    let essay = prepared.correlations(OrdinalMapping::IncomeRank, &[ScoreColumn::Essay]);
    assert_eq!(essay[0].1, Err(StatError::UndefinedCorrelation));
    Ok(())
}

#[test]
fn income_correlation_is_positive_and_region_is_magnitude() -> Result<()> {
    let prepared = prepare(&population(600), &PipelineConfig::default())?;
    let income = prepared.correlations(OrdinalMapping::IncomeRank, &[ScoreColumn::NaturalSciences]);
    let r = income[0].1?;
    assert!(r.coefficient > 0.3, "r = {}", r.coefficient);
    assert_eq!(r.sign, Sign::Positive);

    let region = prepared.correlations(
        OrdinalMapping::RegionByPerformance(ScoreColumn::Mathematics),
        &ScoreColumn::ALL,
    );
    for (_, result) in region {
        if let Ok(r) = result {
            assert!((0.0..=1.0).contains(&r.coefficient));
            assert_eq!(r.sign, Sign::None);
        }
    }
    Ok(())
}

#[test]
fn session_prepares_file_once() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    file.write_all(&population(100))?;

    let session = Session::default();
    let first = session.prepared_file(file.path())?;
    let second = session.prepared_file(file.path())?;
    assert!(Arc::ptr_eq(&first, &second));
    Ok(())
}

#[test]
fn report_marks_undefined_instead_of_zero() -> Result<()> {
    let prepared = prepare(&population(50), &PipelineConfig::default())?;
    let report = Report::build(&prepared, Grouping::Region, ScoreColumn::Languages);
    assert_eq!(report.groups.len(), 5);

    let text = report.to_string();
    assert!(text.contains("Processing summary"));
    assert!(text.contains("Southeast"));

    let json: serde_json::Value = serde_json::from_str(&report.to_json()?)?;
    assert_eq!(json["summary"]["original"], 53);
    assert_eq!(json["groups"][0]["group"], "North");
    Ok(())
}
