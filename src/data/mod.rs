/// Data layer: core types, loading, and validity filtering.
///
/// Architecture:
/// ```text
///  enem.csv (';'-separated, Latin-1)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse rows → Dataset, count dropped rows
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Dataset  │  Vec<Record>, typed fields
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  drop records with non-positive scores
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod filter;
