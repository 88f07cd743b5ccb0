//! IFCB permanent identifiers (PIDs).
//!
//! Two grammars name a bin:
//!
//! - schema 1: `IFCB<n>_<YYYY>_<DDD>_<HHMMSS>` (instrument, year, day of year, time)
//! - schema 2: `D<YYYYMMDD>T<HHMMSS>_IFCB<nnn>` (date, time, instrument)
//!
//! Either may be preceded by a path ending in `/` or `\` and followed by
//! `_<target>` (five digits), `_<product>` and `.<extension>`, in that order,
//! each at most once.

use std::{cell::OnceCell, fmt, hash::Hash, str::FromStr};

use chrono::{DateTime, Days, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::{error::IfcbError, IfcbResult};

const V1_BASE: &str = r"IFCB(?P<instrument>[0-9])_(?P<year>[0-9]{4})_(?P<yearday>[0-9]{3})_(?P<hour>[0-9]{2})(?P<minute>[0-9]{2})(?P<second>[0-9]{2})";
const V2_BASE: &str = r"D(?P<year>[0-9]{4})(?P<month>[0-9]{2})(?P<day>[0-9]{2})T(?P<hour>[0-9]{2})(?P<minute>[0-9]{2})(?P<second>[0-9]{2})_IFCB(?P<instrument>[0-9]{3})";
const PRODUCT: &str = r"[A-Za-z][A-Za-z0-9-]*";
const EXTENSION: &str = r"[A-Za-z0-9]+";
const MAX_TARGET: u32 = 99_999;

fn full_pattern(base: &str) -> String {
    format!(
        r"^(?P<prefix>(?:.*[/\\])?)(?P<lid>{base})(?:_(?P<target>[0-9]{{5}}))?(?:_(?P<product>{PRODUCT}))?(?:\.(?P<extension>{EXTENSION}))?$"
    )
}

lazy_static! {
    static ref V1: Regex = Regex::new(&full_pattern(V1_BASE)).unwrap();
    static ref V2: Regex = Regex::new(&full_pattern(V2_BASE)).unwrap();
    static ref PRODUCT_TOKEN: Regex = Regex::new(&format!("^{PRODUCT}$")).unwrap();
    static ref EXTENSION_TOKEN: Regex = Regex::new(&format!("^{EXTENSION}$")).unwrap();
}

/// The fields of a validated PID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPid {
    /// Path prefix including its trailing separator, empty if there was none.
    pub prefix: String,
    pub schema_version: u32,
    /// The bin name: the base triple without prefix or suffixes.
    pub lid: String,
    pub instrument: u32,
    pub timestamp: DateTime<Utc>,
    pub day_prefix: String,
    pub target: Option<u32>,
    pub product: Option<String>,
    pub extension: Option<String>,
}

fn number<T: FromStr>(captures: &Captures, name: &str) -> T
where
    T::Err: fmt::Debug,
{
    // only reached for groups the grammar restricts to ascii digits
    captures[name].parse().unwrap()
}

fn check_range(pid: &str, field: &str, value: u32, min: u32, max: u32) -> IfcbResult<()> {
    if value < min || value > max {
        return Err(IfcbError::invalid_pid(
            pid,
            format!("{field} {value} outside {min}..={max}"),
        ));
    }
    Ok(())
}

fn time_of_day(pid: &str, captures: &Captures, date: NaiveDate) -> IfcbResult<DateTime<Utc>> {
    let hour = number(captures, "hour");
    let minute = number(captures, "minute");
    let second = number(captures, "second");
    check_range(pid, "hour", hour, 0, 23)?;
    check_range(pid, "minute", minute, 0, 59)?;
    check_range(pid, "second", second, 0, 59)?;
    date.and_hms_opt(hour, minute, second)
        .map(|timestamp| timestamp.and_utc())
        .ok_or_else(|| IfcbError::invalid_pid(pid, "invalid time of day"))
}

/// Adds `offset` days to the first of the month, so day numbers past the end
/// of a month roll over instead of failing.
fn lenient_date(pid: &str, year: i32, month: u32, offset: u32) -> IfcbResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.checked_add_days(Days::new(offset as u64)))
        .ok_or_else(|| IfcbError::invalid_pid(pid, "date out of range"))
}

fn parse_v1(pid: &str, captures: &Captures) -> IfcbResult<ParsedPid> {
    let year: i32 = number(captures, "year");
    let yearday: u32 = number(captures, "yearday");
    check_range(pid, "day of year", yearday, 1, 366)?;
    let date = lenient_date(pid, year, 1, yearday - 1)?;
    let timestamp = time_of_day(pid, captures, date)?;
    let lid = &captures["lid"];
    Ok(ParsedPid {
        prefix: captures["prefix"].to_string(),
        schema_version: 1,
        lid: lid.to_string(),
        instrument: number(captures, "instrument"),
        timestamp,
        // IFCB<n>_<YYYY>_<DDD>
        day_prefix: lid[..lid.len() - 7].to_string(),
        target: None,
        product: None,
        extension: None,
    })
}

fn parse_v2(pid: &str, captures: &Captures) -> IfcbResult<ParsedPid> {
    let year: i32 = number(captures, "year");
    let month: u32 = number(captures, "month");
    let day: u32 = number(captures, "day");
    check_range(pid, "month", month, 1, 12)?;
    check_range(pid, "day", day, 1, 31)?;
    let date = lenient_date(pid, year, month, day - 1)?;
    let timestamp = time_of_day(pid, captures, date)?;
    let lid = &captures["lid"];
    Ok(ParsedPid {
        prefix: captures["prefix"].to_string(),
        schema_version: 2,
        lid: lid.to_string(),
        instrument: number(captures, "instrument"),
        timestamp,
        // D<YYYYMMDD>
        day_prefix: lid[..9].to_string(),
        target: None,
        product: None,
        extension: None,
    })
}

/// Parses a PID. Exactly one grammar has to match the whole string.
pub fn parse(pid: &str) -> IfcbResult<ParsedPid> {
    let v1 = V1.captures(pid);
    let v2 = V2.captures(pid);
    let (mut parsed, captures) = match (&v1, &v2) {
        (Some(captures), None) => (parse_v1(pid, captures)?, captures),
        (None, Some(captures)) => (parse_v2(pid, captures)?, captures),
        (Some(_), Some(_)) => return Err(IfcbError::invalid_pid(pid, "matches both grammars")),
        (None, None) => {
            return Err(IfcbError::invalid_pid(
                pid,
                "does not match either identifier grammar",
            ))
        }
    };
    parsed.target = captures.name("target").map(|_| number(captures, "target"));
    parsed.product = captures.name("product").map(|m| m.as_str().to_string());
    parsed.extension = captures.name("extension").map(|m| m.as_str().to_string());
    Ok(parsed)
}

/// Inverse of [`parse`].
pub fn unparse(parsed: &ParsedPid) -> String {
    let mut pid = format!("{}{}", parsed.prefix, parsed.lid);
    if let Some(target) = parsed.target {
        pid.push_str(&format!("_{target:05}"));
    }
    if let Some(product) = &parsed.product {
        pid.push('_');
        pid.push_str(product);
    }
    if let Some(extension) = &parsed.extension {
        pid.push('.');
        pid.push_str(extension);
    }
    pid
}

/// A PID string, validated on construction or on first use.
///
/// Equality, ordering and hashing go by the serialized string.
#[derive(Debug, Clone)]
pub struct Pid {
    pid: String,
    parsed: OnceCell<ParsedPid>,
}

impl Pid {
    pub fn new(pid: impl Into<String>) -> IfcbResult<Self> {
        let pid = Self::deferred(pid);
        pid.parsed()?;
        Ok(pid)
    }

    /// Defers validation until a parsed field is requested.
    pub fn deferred(pid: impl Into<String>) -> Self {
        Self {
            pid: pid.into(),
            parsed: OnceCell::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.pid
    }

    pub fn parsed(&self) -> IfcbResult<&ParsedPid> {
        if let Some(parsed) = self.parsed.get() {
            return Ok(parsed);
        }
        let parsed = parse(&self.pid)?;
        Ok(self.parsed.get_or_init(|| parsed))
    }

    pub fn is_valid(&self) -> bool {
        self.parsed().is_ok()
    }

    pub fn schema_version(&self) -> IfcbResult<u32> {
        Ok(self.parsed()?.schema_version)
    }

    pub fn timestamp(&self) -> IfcbResult<DateTime<Utc>> {
        Ok(self.parsed()?.timestamp)
    }

    pub fn instrument(&self) -> IfcbResult<u32> {
        Ok(self.parsed()?.instrument)
    }

    pub fn day_prefix(&self) -> IfcbResult<&str> {
        Ok(&self.parsed()?.day_prefix)
    }

    pub fn bin_lid(&self) -> IfcbResult<&str> {
        Ok(&self.parsed()?.lid)
    }

    pub fn target(&self) -> IfcbResult<Option<u32>> {
        Ok(self.parsed()?.target)
    }

    pub fn product(&self) -> IfcbResult<Option<&str>> {
        Ok(self.parsed()?.product.as_deref())
    }

    pub fn extension(&self) -> IfcbResult<Option<&str>> {
        Ok(self.parsed()?.extension.as_deref())
    }

    /// The PID with its target replaced, leaving `self` untouched.
    pub fn with_target(&self, target: u32) -> IfcbResult<String> {
        let mut pid = self.clone();
        pid.set_target(target)?;
        Ok(pid.pid)
    }

    pub fn set_target(&mut self, target: u32) -> IfcbResult<()> {
        if target > MAX_TARGET {
            return Err(IfcbError::invalid_pid(
                &self.pid,
                format!("target {target} does not fit in five digits"),
            ));
        }
        self.update(|parsed| parsed.target = Some(target))
    }

    pub fn set_product(&mut self, product: &str) -> IfcbResult<()> {
        if !PRODUCT_TOKEN.is_match(product) {
            return Err(IfcbError::invalid_pid(
                &self.pid,
                format!("invalid product {product:?}"),
            ));
        }
        self.update(|parsed| parsed.product = Some(product.to_string()))
    }

    pub fn set_extension(&mut self, extension: &str) -> IfcbResult<()> {
        if !EXTENSION_TOKEN.is_match(extension) {
            return Err(IfcbError::invalid_pid(
                &self.pid,
                format!("invalid extension {extension:?}"),
            ));
        }
        self.update(|parsed| parsed.extension = Some(extension.to_string()))
    }

    fn update(&mut self, change: impl FnOnce(&mut ParsedPid)) -> IfcbResult<()> {
        let mut parsed = self.parsed()?.clone();
        change(&mut parsed);
        self.pid = unparse(&parsed);
        self.parsed = OnceCell::from(parsed);
        Ok(())
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pid)
    }
}

impl FromStr for Pid {
    type Err = IfcbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pid::new(s)
    }
}

impl AsRef<str> for Pid {
    fn as_ref(&self) -> &str {
        &self.pid
    }
}

impl PartialEq for Pid {
    fn eq(&self, other: &Self) -> bool {
        self.pid == other.pid
    }
}

impl Eq for Pid {}

impl PartialEq<str> for Pid {
    fn eq(&self, other: &str) -> bool {
        self.pid == other
    }
}

impl PartialEq<&str> for Pid {
    fn eq(&self, other: &&str) -> bool {
        self.pid == *other
    }
}

impl PartialEq<String> for Pid {
    fn eq(&self, other: &String) -> bool {
        &self.pid == other
    }
}

impl Hash for Pid {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.pid.hash(state);
    }
}

impl PartialOrd for Pid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.pid.cmp(&other.pid)
    }
}
