use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const PARTICIPANTS: usize = 2000;

/// Capital municipality codes, one or two per region.
const MUNICIPALITIES: [u32; 8] = [
    1_302_603, // Manaus
    1_501_402, // Belém
    2_927_408, // Salvador
    2_304_400, // Fortaleza
    3_550_308, // São Paulo
    3_304_557, // Rio de Janeiro
    4_106_902, // Curitiba
    5_300_108, // Brasília
];

/// Per-region shift applied to every score, indexed by leading digit - 1.
const REGION_SHIFT: [f64; 5] = [-25.0, -30.0, 20.0, 15.0, 10.0];

const INCOME_CODES: &str = "ABCDEFGHIJKLMNOPQ";

/// Box-Muller transform for normal distribution
fn gauss(rng: &mut ChaCha8Rng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

/// Skewed towards the lower brackets, like the real distribution.
fn income_index(rng: &mut ChaCha8Rng) -> usize {
    let u: f64 = rng.gen();
    ((u * u) * INCOME_CODES.len() as f64) as usize
}

fn fmt_score(v: f64) -> String {
    format!("{:.1}", v.clamp(1.0, 1000.0))
}

fn main() -> Result<()> {
    let output_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_enem.csv".to_string());

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(&output_path)
        .with_context(|| format!("creating {output_path}"))?;

    writer.write_record([
        "NU_INSCRICAO",
        "CO_MUNICIPIO_PROVA",
        "NU_NOTA_CN",
        "NU_NOTA_CH",
        "NU_NOTA_LC",
        "NU_NOTA_MT",
        "NU_NOTA_REDACAO",
        "Q006",
    ])?;

    let (mut incomplete, mut absent, mut extreme) = (0, 0, 0);
    for id in 0..PARTICIPANTS {
        let income = income_index(&mut rng);
        let municipality = MUNICIPALITIES[rng.gen_range(0..MUNICIPALITIES.len())];
        let region = (municipality / 1_000_000) as usize - 1;

        let ability = 440.0 + 9.0 * income as f64 + REGION_SHIFT[region] + gauss(&mut rng, 0.0, 45.0);
        let offsets = [0.0, 20.0, 15.0, 25.0];
        let mut scores: Vec<String> = offsets
            .iter()
            .map(|off| fmt_score(ability + off + gauss(&mut rng, 0.0, 30.0)))
            .collect();
        let essay = ((ability + gauss(&mut rng, 80.0, 90.0)) / 20.0).round() * 20.0;
        let mut essay = format!("{:.0}", essay.clamp(0.0, 1000.0));

        let roll: f64 = rng.gen();
        if roll < 0.02 {
            essay.clear();
            incomplete += 1;
        } else if roll < 0.04 {
            let subject = rng.gen_range(0..scores.len());
            scores[subject] = "0.0".to_string();
            absent += 1;
        } else if roll < 0.05 {
            scores = vec![
                fmt_score(gauss(&mut rng, 900.0, 30.0)),
                fmt_score(gauss(&mut rng, 250.0, 30.0)),
                fmt_score(gauss(&mut rng, 900.0, 30.0)),
                fmt_score(gauss(&mut rng, 250.0, 30.0)),
            ];
            extreme += 1;
        }

        let code = &INCOME_CODES[income..income + 1];
        let mut row = vec![format!("{:012}", 210_000_000_000u64 + id as u64), municipality.to_string()];
        row.extend(scores);
        row.push(essay);
        row.push(code.to_string());
        writer.write_record(&row)?;
    }
    writer.flush().context("flushing sample file")?;

    println!(
        "Wrote {PARTICIPANTS} participants to {output_path} \
         ({incomplete} incomplete, {absent} absent, {extreme} injected outliers)"
    );
    Ok(())
}
