use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;

use exam_insight::analysis::aggregate::Grouping;
use exam_insight::data::model::ScoreColumn;
use exam_insight::pipeline::Session;
use exam_insight::report::Report;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColumnArg {
    NaturalSciences,
    HumanSciences,
    Languages,
    Mathematics,
    Essay,
}

impl From<ColumnArg> for ScoreColumn {
    fn from(arg: ColumnArg) -> Self {
        match arg {
            ColumnArg::NaturalSciences => ScoreColumn::NaturalSciences,
            ColumnArg::HumanSciences => ScoreColumn::HumanSciences,
            ColumnArg::Languages => ScoreColumn::Languages,
            ColumnArg::Mathematics => ScoreColumn::Mathematics,
            ColumnArg::Essay => ScoreColumn::Essay,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GroupArg {
    Income,
    Region,
}

impl From<GroupArg> for Grouping {
    fn from(arg: GroupArg) -> Self {
        match arg {
            GroupArg::Income => Grouping::Income,
            GroupArg::Region => Grouping::Region,
        }
    }
}

/// Summarise exam scores by income bracket or region after removing outliers.
#[derive(Debug, Parser)]
#[command(name = "exam-insight", version)]
struct Cli {
    /// ';'-separated, Latin-1 encoded participant file
    file: PathBuf,

    /// Score column to aggregate
    #[arg(long, value_enum, default_value = "natural-sciences")]
    column: ColumnArg,

    /// Category to group by
    #[arg(long, value_enum, default_value = "income")]
    group_by: GroupArg,

    /// Emit the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let session = Session::default();
    let prepared = session.prepared_file(&cli.file)?;
    info!("{} clean records ready", prepared.clean.len());

    let report = Report::build(&prepared, cli.group_by.into(), cli.column.into());
    if cli.json {
        println!("{}", report.to_json().context("serialising report")?);
    } else {
        print!("{report}");
    }
    Ok(())
}
