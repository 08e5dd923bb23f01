//! Primitive data types.

/// Data type for timestamps in milliseconds since the Unix epoch.
pub type Timestamp = i64;
/// Data type for event severities. 0 is the most critical, 5 is informational.
pub type Severity = u8;
/// Data type for demand, capacity and flow quantities.
pub type Load = f64;
/// Data type for utilization ratios (demand / capacity).
pub type Utilization = f64;

/// Highest (least critical) severity an event may carry.
pub const MAX_SEVERITY: Severity = 5;
/// Utilization is multiplied by this factor and rounded to obtain the integer index key.
pub const UTILIZATION_SCALE: f64 = 10000.0;
