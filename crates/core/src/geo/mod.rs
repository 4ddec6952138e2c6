//! Coordinate and calendar helpers used while ingesting external fields.

mod dates;
mod utm;

pub use dates::{format_iso_date, is_leap_year, seconds_between, IsoDate};
pub use utm::{lonlat_to_utm, utm_to_lonlat, LonLatBox, UtmZone};
