/// Analysis layer over a loaded dataset.
///
/// ```text
///   Dataset (valid records)
///        │
///        ▼
///   ┌──────────┐
///   │ outlier   │  isolation forest → Clean Dataset
///   └──────────┘
///        │
///        ├──────────────┐
///        ▼              ▼
///   ┌──────────┐  ┌─────────────┐
///   │ aggregate │  │ correlation  │
///   └──────────┘  └─────────────┘
/// ```

pub mod aggregate;
pub mod correlation;
pub mod outlier;
