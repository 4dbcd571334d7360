#[cfg(feature = "cli")]
pub mod cli;

#[cfg(feature = "lambda")]
pub mod lambda;

/// Public endpoint of the canonical facility directory feed.
pub const DEFAULT_FACILITY_FEED_URL: &str =
    "https://dati.veneto.it/SpodCkanApi/api/1/rest/dataset/progetto_avatar_palestre_digitali.csv";
