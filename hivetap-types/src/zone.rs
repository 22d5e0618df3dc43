//! Wall-clock zone rules for legacy date/timestamp decoding.
//!
//! The legacy deserializer is zone-blind: it always interprets date and
//! timestamp text in the process-default zone, while a table declares the
//! zone its files were actually written in. Undoing that requires two
//! offset lookups, one keyed by UTC instant and one keyed by wall-clock
//! time. [`ZoneRules`] exposes both; [`FixedOffset`] covers tables with a
//! constant offset, and a DST-aware implementation can be supplied by the
//! embedding engine through the same trait.

pub const MILLIS_PER_SECOND: i64 = 1_000;
pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Offset rules for one time zone.
pub trait ZoneRules: Send + Sync {
    /// Offset from UTC, in milliseconds, in effect at a UTC instant.
    fn offset_millis_at_instant(&self, utc_millis: i64) -> i64;

    /// Offset from UTC, in milliseconds, in effect at a local wall-clock
    /// time. For fixed offsets this equals the instant-keyed lookup.
    fn offset_millis_at_wall(&self, wall_millis: i64) -> i64;
}

/// A zone with a constant UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedOffset {
    millis: i64,
}

impl FixedOffset {
    pub const UTC: FixedOffset = FixedOffset { millis: 0 };

    pub fn from_millis(millis: i64) -> Self {
        Self { millis }
    }

    pub fn from_hms(hours: i64, minutes: i64, seconds: i64) -> Self {
        Self {
            millis: ((hours * 60 + minutes) * 60 + seconds) * MILLIS_PER_SECOND,
        }
    }

    pub fn offset_millis(&self) -> i64 {
        self.millis
    }
}

impl ZoneRules for FixedOffset {
    fn offset_millis_at_instant(&self, _utc_millis: i64) -> i64 {
        self.millis
    }

    fn offset_millis_at_wall(&self, _wall_millis: i64) -> i64 {
        self.millis
    }
}

/// Convert a wall-clock millisecond value in `zone` to a UTC instant.
pub fn wall_to_utc(zone: &dyn ZoneRules, wall_millis: i64) -> i64 {
    wall_millis - zone.offset_millis_at_wall(wall_millis)
}

/// Convert a UTC instant to the wall-clock millisecond value in `zone`.
pub fn utc_to_wall(zone: &dyn ZoneRules, utc_millis: i64) -> i64 {
    utc_millis + zone.offset_millis_at_instant(utc_millis)
}
