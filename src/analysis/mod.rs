/// Deterministic analysis over resolved and raw readings.
///
/// Everything in this module tree is pure: no I/O, no clock reads, no
/// hidden state. The pipeline and the forecast layer feed inputs in and
/// consume structured outputs.
///
/// Submodules:
/// - `intelligence` — rule-based risk/exposure/regulatory derivation.
/// - `interpolate` — inverse-distance-weighted ward estimation.
/// - `trend` — least-squares slope and synthesized hourly context.

pub mod intelligence;
pub mod interpolate;
pub mod trend;
