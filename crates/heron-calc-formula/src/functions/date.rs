//! Date/time functions
//!
//! Excel stores dates as serial numbers: whole days since a fixed epoch
//! plus a day-fraction in [0,1) for the time of day. Day 0 is 1899-12-31
//! and all arithmetic happens in UTC.
//!
//! The 1900 leap-year bug is reproduced deliberately: serial 60 is the
//! fictional 1900-02-29, so serials 1-59 map one-to-one onto the first 59
//! days of 1900 and serials >= 61 are offset by one. Every function that
//! converts between serials and calendar dates applies the same asymmetric
//! correction.

use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use heron_calc_core::{flatten_values, to_number, to_text, CellError, FormulaValue};
use chrono::{Datelike, Duration, NaiveDate, Timelike};

/// Seconds per day, for the TIME fraction
const SECS_PER_DAY: i64 = 86_400;

/// The serial occupied by the fictional 1900-02-29
const LEAP_BUG_SERIAL: i64 = 60;

fn epoch_base() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 31).unwrap()
}

fn is_leap_gregorian(year: i32) -> bool {
    (year % 4 == 0) && ((year % 100 != 0) || (year % 400 == 0))
}

fn days_in_month(year: i32, month: u32) -> i64 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            // 1900 gets its fictional 29th here
            if year == 1900 || is_leap_gregorian(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

fn days_in_year(year: i32) -> i64 {
    if year == 1900 || is_leap_gregorian(year) {
        366
    } else {
        365
    }
}

/// Serial of the first day of the given month, in the buggy 1900 calendar
fn month_start_serial(year: i32, month: u32) -> i64 {
    if year >= 1900 {
        let mut days: i64 = 0;
        for y in 1900..year {
            days += days_in_year(y);
        }
        for m in 1..month {
            days += days_in_month(year, m);
        }
        1 + days
    } else {
        // The bug does not apply before 1900
        let d = match NaiveDate::from_ymd_opt(year, month, 1) {
            Some(d) => d,
            None => return 0,
        };
        (d - epoch_base()).num_days()
    }
}

/// Calendar date to Excel serial; day overflow/underflow carries in serial space
pub fn ymd_to_serial(year: i32, month: u32, day: i64) -> i64 {
    month_start_serial(year, month) + day - 1
}

/// Excel serial to calendar date
///
/// Serial 60 yields the fictional (1900, 2, 29). Serials that land outside
/// chrono's representable range return `None`.
pub fn serial_to_ymd(serial: i64) -> Option<(i32, u32, u32)> {
    if serial == LEAP_BUG_SERIAL {
        return Some((1900, 2, 29));
    }
    let adjusted = if serial > LEAP_BUG_SERIAL {
        serial - 1
    } else {
        serial
    };
    let date = epoch_base().checked_add_signed(Duration::days(adjusted))?;
    Some((date.year(), date.month(), date.day()))
}

/// Serial for a real (post-bug-aware) chrono date
fn serial_from_date(date: NaiveDate) -> i64 {
    let days = (date - epoch_base()).num_days();
    // Dates after 1900-02-28 skip over the fictional serial 60
    if days >= LEAP_BUG_SERIAL {
        days + 1
    } else {
        days
    }
}

/// Day-of-week helpers operate directly on the serial so the deliberate
/// 1900 shift (serial 1 is treated as a Sunday) carries through.
fn weekday_sun1(serial: i64) -> i64 {
    (serial - 1).rem_euclid(7) + 1
}

fn weekday_mon1(serial: i64) -> i64 {
    (serial - 2).rem_euclid(7) + 1
}

fn is_weekend(serial: i64) -> bool {
    let wd = weekday_sun1(serial);
    wd == 1 || wd == 7
}

fn scalar_number(v: &FormulaValue) -> Result<f64, CellError> {
    if v.is_array() {
        return Err(CellError::Value);
    }
    to_number(v)
}

fn serial_arg(v: &FormulaValue) -> Result<i64, CellError> {
    let n = scalar_number(v)?;
    if n < 0.0 {
        return Err(CellError::Num);
    }
    Ok(n.floor() as i64)
}

fn holiday_set(arg: Option<&FormulaValue>) -> Result<Vec<i64>, CellError> {
    let mut holidays = Vec::new();
    if let Some(v) = arg {
        for item in flatten_values(std::slice::from_ref(v)) {
            match item {
                FormulaValue::Empty => {}
                FormulaValue::Error(e) => return Err(e),
                other => holidays.push(scalar_number(&other)?.floor() as i64),
            }
        }
    }
    Ok(holidays)
}

/// DATE(year, month, day)
///
/// Years 0..=1899 are shifted up by 1900; month overflow/underflow rolls
/// the year; day overflow/underflow carries in serial space.
pub fn fn_date(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    for v in args {
        if let FormulaValue::Error(e) = v {
            return Ok(FormulaValue::Error(*e));
        }
        if v.is_array() {
            return Ok(FormulaValue::Error(CellError::Value));
        }
    }

    let mut year = match scalar_number(args.get(0).unwrap()) {
        Ok(n) => n.trunc() as i32,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    let month = match scalar_number(args.get(1).unwrap()) {
        Ok(n) => n.trunc() as i64,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    let day = match scalar_number(args.get(2).unwrap()) {
        Ok(n) => n.trunc() as i64,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };

    if (0..1900).contains(&year) {
        year += 1900;
    }
    if !(0..=9999).contains(&year) {
        return Ok(FormulaValue::Error(CellError::Num));
    }

    // Normalize month overflow/underflow with 0-based month arithmetic
    let total_months = (year as i64) * 12 + (month - 1);
    let norm_year = total_months.div_euclid(12) as i32;
    let norm_month = total_months.rem_euclid(12) as u32 + 1;

    let serial = ymd_to_serial(norm_year, norm_month, day);
    if serial < 0 {
        return Ok(FormulaValue::Error(CellError::Num));
    }
    Ok(FormulaValue::Number(serial as f64))
}

/// TIME(hour, minute, second)
///
/// Returns the day fraction in [0,1). Totals outside one day wrap with a
/// true modulo, so negative inputs wrap backwards instead of producing a
/// negative fraction.
pub fn fn_time(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut parts = [0i64; 3];
    for (i, slot) in parts.iter_mut().enumerate() {
        match scalar_number(args.get(i).unwrap()) {
            Ok(n) => *slot = n.trunc() as i64,
            Err(e) => return Ok(FormulaValue::Error(e)),
        }
    }
    let total = parts[0] * 3600 + parts[1] * 60 + parts[2];
    let wrapped = ((total % SECS_PER_DAY) + SECS_PER_DAY) % SECS_PER_DAY;
    Ok(FormulaValue::Number(wrapped as f64 / SECS_PER_DAY as f64))
}

fn date_part<F>(args: &[FormulaValue], extract: F) -> FormulaResult<FormulaValue>
where
    F: Fn(i32, u32, u32) -> f64,
{
    let serial = match serial_arg(args.get(0).unwrap()) {
        Ok(s) => s,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    match serial_to_ymd(serial) {
        Some((y, m, d)) => Ok(FormulaValue::Number(extract(y, m, d))),
        None => Ok(FormulaValue::Error(CellError::Num)),
    }
}

/// YEAR(serial)
pub fn fn_year(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    date_part(args, |y, _m, _d| y as f64)
}

/// MONTH(serial)
pub fn fn_month(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    date_part(args, |_y, m, _d| m as f64)
}

/// DAY(serial)
pub fn fn_day(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    date_part(args, |_y, _m, d| d as f64)
}

fn time_part(args: &[FormulaValue]) -> Result<i64, CellError> {
    let n = scalar_number(args.get(0).unwrap())?;
    if n < 0.0 {
        return Err(CellError::Num);
    }
    let frac = n.fract();
    Ok(((frac * SECS_PER_DAY as f64).round() as i64).rem_euclid(SECS_PER_DAY))
}

/// HOUR(serial)
pub fn fn_hour(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match time_part(args) {
        Ok(secs) => Ok(FormulaValue::Number((secs / 3600) as f64)),
        Err(e) => Ok(FormulaValue::Error(e)),
    }
}

/// MINUTE(serial)
pub fn fn_minute(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match time_part(args) {
        Ok(secs) => Ok(FormulaValue::Number((secs % 3600 / 60) as f64)),
        Err(e) => Ok(FormulaValue::Error(e)),
    }
}

/// SECOND(serial)
pub fn fn_second(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match time_part(args) {
        Ok(secs) => Ok(FormulaValue::Number((secs % 60) as f64)),
        Err(e) => Ok(FormulaValue::Error(e)),
    }
}

/// WEEKDAY(serial, [return_type])
///
/// return_type 1: Sunday=1..Saturday=7 (default); 2: Monday=1..Sunday=7;
/// 3: Monday=0..Sunday=6. Anything else is #NUM!.
pub fn fn_weekday(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let serial = match serial_arg(args.get(0).unwrap()) {
        Ok(s) => s,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    let return_type = match args.get(1) {
        None | Some(FormulaValue::Empty) => 1,
        Some(v) => match scalar_number(v) {
            Ok(n) => n.trunc() as i64,
            Err(e) => return Ok(FormulaValue::Error(e)),
        },
    };
    let wd = match return_type {
        1 => weekday_sun1(serial),
        2 => weekday_mon1(serial),
        3 => weekday_mon1(serial) - 1,
        _ => return Ok(FormulaValue::Error(CellError::Num)),
    };
    Ok(FormulaValue::Number(wd as f64))
}

/// WEEKNUM(serial, [return_type])
///
/// Week 1 contains January 1. return_type 1 starts weeks on Sunday
/// (default), 2 on Monday.
pub fn fn_weeknum(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let serial = match serial_arg(args.get(0).unwrap()) {
        Ok(s) => s,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    let return_type = match args.get(1) {
        None | Some(FormulaValue::Empty) => 1,
        Some(v) => match scalar_number(v) {
            Ok(n) => n.trunc() as i64,
            Err(e) => return Ok(FormulaValue::Error(e)),
        },
    };

    let (year, _m, _d) = match serial_to_ymd(serial) {
        Some(parts) => parts,
        None => return Ok(FormulaValue::Error(CellError::Num)),
    };
    let jan1 = ymd_to_serial(year, 1, 1);
    let offset = match return_type {
        1 => weekday_sun1(jan1) - 1,
        2 => weekday_mon1(jan1) - 1,
        _ => return Ok(FormulaValue::Error(CellError::Num)),
    };
    Ok(FormulaValue::Number(
        ((serial - jan1 + offset) / 7 + 1) as f64,
    ))
}

/// Shift a serial by whole months, clamping the day to the target month end
fn shift_months(serial: i64, months: i64, to_month_end: bool) -> Option<i64> {
    let (y, m, d) = serial_to_ymd(serial)?;
    let total = (y as i64) * 12 + (m as i64 - 1) + months;
    let year = total.div_euclid(12) as i32;
    let month = total.rem_euclid(12) as u32 + 1;
    let last = days_in_month(year, month);
    let day = if to_month_end {
        last
    } else {
        (d as i64).min(last)
    };
    Some(ymd_to_serial(year, month, day))
}

/// EDATE(start_date, months)
pub fn fn_edate(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let serial = match serial_arg(args.get(0).unwrap()) {
        Ok(s) => s,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    let months = match scalar_number(args.get(1).unwrap()) {
        Ok(n) => n.trunc() as i64,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    match shift_months(serial, months, false) {
        Some(s) if s >= 0 => Ok(FormulaValue::Number(s as f64)),
        _ => Ok(FormulaValue::Error(CellError::Num)),
    }
}

/// EOMONTH(start_date, months)
pub fn fn_eomonth(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let serial = match serial_arg(args.get(0).unwrap()) {
        Ok(s) => s,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    let months = match scalar_number(args.get(1).unwrap()) {
        Ok(n) => n.trunc() as i64,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    match shift_months(serial, months, true) {
        Some(s) if s >= 0 => Ok(FormulaValue::Number(s as f64)),
        _ => Ok(FormulaValue::Error(CellError::Num)),
    }
}

/// DATEDIF(start_date, end_date, unit)
///
/// unit "Y" = whole years, "M" = whole months (calendar year/month
/// difference, day ignored), "D" = days. start must not exceed end (#NUM!);
/// unknown units are #VALUE!.
pub fn fn_datedif(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let start = match serial_arg(args.get(0).unwrap()) {
        Ok(s) => s,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    let end = match serial_arg(args.get(1).unwrap()) {
        Ok(s) => s,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    if start > end {
        return Ok(FormulaValue::Error(CellError::Num));
    }
    let unit = match to_text(args.get(2).unwrap()) {
        Ok(s) => s,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };

    let (sy, sm, sd) = match serial_to_ymd(start) {
        Some(p) => p,
        None => return Ok(FormulaValue::Error(CellError::Num)),
    };
    let (ey, em, ed) = match serial_to_ymd(end) {
        Some(p) => p,
        None => return Ok(FormulaValue::Error(CellError::Num)),
    };

    let result = match unit.to_uppercase().as_str() {
        "Y" => {
            let mut years = (ey - sy) as i64;
            if (em, ed) < (sm, sd) {
                years -= 1;
            }
            years
        }
        "M" => (ey as i64 - sy as i64) * 12 + (em as i64 - sm as i64),
        "D" => end - start,
        _ => return Ok(FormulaValue::Error(CellError::Value)),
    };
    Ok(FormulaValue::Number(result as f64))
}

/// NETWORKDAYS(start_date, end_date, [holidays])
///
/// Counts business days between the two dates, inclusive, excluding
/// Saturdays, Sundays, and any listed holidays. A start after the end
/// counts backwards (negative result).
pub fn fn_networkdays(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let start = match serial_arg(args.get(0).unwrap()) {
        Ok(s) => s,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    let end = match serial_arg(args.get(1).unwrap()) {
        Ok(s) => s,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    let holidays = match holiday_set(args.get(2)) {
        Ok(h) => h,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };

    let (lo, hi, sign) = if start <= end {
        (start, end, 1.0)
    } else {
        (end, start, -1.0)
    };

    let mut count = 0i64;
    for serial in lo..=hi {
        if !is_weekend(serial) && !holidays.contains(&serial) {
            count += 1;
        }
    }
    Ok(FormulaValue::Number(count as f64 * sign))
}

/// WORKDAY(start_date, days, [holidays])
///
/// Walks forward (or backward for negative day counts) from the start
/// date, counting only business days toward the target.
pub fn fn_workday(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let start = match serial_arg(args.get(0).unwrap()) {
        Ok(s) => s,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    let days = match scalar_number(args.get(1).unwrap()) {
        Ok(n) => n.trunc() as i64,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    let holidays = match holiday_set(args.get(2)) {
        Ok(h) => h,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };

    let step = if days < 0 { -1 } else { 1 };
    let mut remaining = days.abs();
    let mut serial = start;
    while remaining > 0 {
        serial += step;
        if serial < 0 {
            return Ok(FormulaValue::Error(CellError::Num));
        }
        if !is_weekend(serial) && !holidays.contains(&serial) {
            remaining -= 1;
        }
    }
    Ok(FormulaValue::Number(serial as f64))
}

/// DATEVALUE(date_text)
///
/// Accepts ISO "2024-03-15", US "3/15/2024", and "15-Mar-2024" forms.
pub fn fn_datevalue(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let text = match args.get(0).unwrap() {
        FormulaValue::Text(s) => s.trim().to_string(),
        FormulaValue::Error(e) => return Ok(FormulaValue::Error(*e)),
        _ => return Ok(FormulaValue::Error(CellError::Value)),
    };

    for format in ["%Y-%m-%d", "%m/%d/%Y", "%d-%b-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(&text, format) {
            let serial = serial_from_date(date);
            if serial < 0 {
                return Ok(FormulaValue::Error(CellError::Value));
            }
            return Ok(FormulaValue::Number(serial as f64));
        }
    }
    Ok(FormulaValue::Error(CellError::Value))
}

/// TIMEVALUE(time_text)
///
/// Accepts "H:MM", "H:MM:SS", each with an optional AM/PM suffix; returns
/// the day fraction.
pub fn fn_timevalue(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let text = match args.get(0).unwrap() {
        FormulaValue::Text(s) => s.trim().to_string(),
        FormulaValue::Error(e) => return Ok(FormulaValue::Error(*e)),
        _ => return Ok(FormulaValue::Error(CellError::Value)),
    };

    match parse_time_text(&text) {
        Some(fraction) => Ok(FormulaValue::Number(fraction)),
        None => Ok(FormulaValue::Error(CellError::Value)),
    }
}

fn parse_time_text(text: &str) -> Option<f64> {
    let upper = text.to_uppercase();
    let (body, meridiem) = if let Some(stripped) = upper.strip_suffix("AM") {
        (stripped.trim_end(), Some(false))
    } else if let Some(stripped) = upper.strip_suffix("PM") {
        (stripped.trim_end(), Some(true))
    } else {
        (upper.as_str(), None)
    };

    let parts: Vec<&str> = body.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }
    let mut hour: i64 = parts[0].trim().parse().ok()?;
    let minute: i64 = parts[1].trim().parse().ok()?;
    let second: i64 = match parts.get(2) {
        Some(p) => p.trim().parse().ok()?,
        None => 0,
    };
    if !(0..60).contains(&minute) || !(0..60).contains(&second) {
        return None;
    }

    match meridiem {
        Some(pm) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            hour %= 12;
            if pm {
                hour += 12;
            }
        }
        None => {
            if !(0..24).contains(&hour) {
                return None;
            }
        }
    }

    Some((hour * 3600 + minute * 60 + second) as f64 / SECS_PER_DAY as f64)
}

/// TODAY() - current date as a serial, volatile
pub fn fn_today(_args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let now = ctx.current_time();
    let serial = serial_from_date(now.date_naive());
    Ok(FormulaValue::Number(serial as f64))
}

/// NOW() - current date and time as a serial, volatile
pub fn fn_now(_args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let now = ctx.current_time();
    let serial = serial_from_date(now.date_naive());
    let fraction = (now.hour() as f64 * 3600.0 + now.minute() as f64 * 60.0
        + now.second() as f64)
        / SECS_PER_DAY as f64;
    Ok(FormulaValue::Number(serial as f64 + fraction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ctx() -> EvaluationContext {
        EvaluationContext::new()
    }

    fn date(y: f64, m: f64, d: f64) -> f64 {
        match fn_date(
            &[
                FormulaValue::Number(y),
                FormulaValue::Number(m),
                FormulaValue::Number(d),
            ],
            &ctx(),
        )
        .unwrap()
        {
            FormulaValue::Number(n) => n,
            other => panic!("expected serial, got {:?}", other),
        }
    }

    #[test]
    fn test_leap_year_bug() {
        assert_eq!(date(1900.0, 2.0, 28.0), 59.0);
        assert_eq!(date(1900.0, 2.0, 29.0), 60.0);
        assert_eq!(date(1900.0, 3.0, 1.0), 61.0);
        assert_eq!(serial_to_ymd(60), Some((1900, 2, 29)));
        assert_eq!(serial_to_ymd(59), Some((1900, 2, 28)));
        assert_eq!(serial_to_ymd(61), Some((1900, 3, 1)));
    }

    #[test]
    fn test_serial_round_trip_past_1901() {
        for serial in [367, 1000, 36526, 44927, 73050] {
            let (y, m, d) = serial_to_ymd(serial).unwrap();
            assert!(y >= 1901);
            assert_eq!(ymd_to_serial(y, m, d as i64), serial, "serial {}", serial);
        }
    }

    #[test]
    fn test_known_serials() {
        assert_eq!(date(1900.0, 1.0, 1.0), 1.0);
        assert_eq!(date(2000.0, 1.0, 1.0), 36526.0);
        assert_eq!(date(2023.0, 1.0, 1.0), 44927.0);
    }

    #[test]
    fn test_date_year_shift_and_month_rollover() {
        // Years 0..1899 are shifted up by 1900
        assert_eq!(date(108.0, 1.0, 2.0), date(2008.0, 1.0, 2.0));
        // Month 13 rolls into the next year
        assert_eq!(date(2020.0, 13.0, 1.0), date(2021.0, 1.0, 1.0));
        // Day 0 is the last day of the previous month
        assert_eq!(date(1900.0, 3.0, 0.0), 60.0);
    }

    #[test]
    fn test_time_wrapping() {
        let t = |h: f64, m: f64, s: f64| {
            match fn_time(
                &[
                    FormulaValue::Number(h),
                    FormulaValue::Number(m),
                    FormulaValue::Number(s),
                ],
                &ctx(),
            )
            .unwrap()
            {
                FormulaValue::Number(n) => n,
                other => panic!("expected fraction, got {:?}", other),
            }
        };
        assert_eq!(t(25.0, 0.0, 0.0), t(1.0, 0.0, 0.0));
        assert_eq!(t(-1.0, 0.0, 0.0), t(23.0, 0.0, 0.0));
        assert_eq!(t(12.0, 0.0, 0.0), 0.5);
        assert!(t(0.0, 0.0, -1.0) > 0.99);
    }

    #[test]
    fn test_date_parts() {
        let serial = FormulaValue::Number(date(2024.0, 3.0, 15.0));
        assert_eq!(
            fn_year(&[serial.clone()], &ctx()).unwrap(),
            FormulaValue::Number(2024.0)
        );
        assert_eq!(
            fn_month(&[serial.clone()], &ctx()).unwrap(),
            FormulaValue::Number(3.0)
        );
        assert_eq!(
            fn_day(&[serial], &ctx()).unwrap(),
            FormulaValue::Number(15.0)
        );
    }

    #[test]
    fn test_time_parts() {
        let serial = FormulaValue::Number(45000.0 + 0.5 + 3661.0 / 86400.0);
        assert_eq!(
            fn_hour(&[serial.clone()], &ctx()).unwrap(),
            FormulaValue::Number(13.0)
        );
        assert_eq!(
            fn_minute(&[serial.clone()], &ctx()).unwrap(),
            FormulaValue::Number(1.0)
        );
        assert_eq!(
            fn_second(&[serial], &ctx()).unwrap(),
            FormulaValue::Number(1.0)
        );
    }

    #[test]
    fn test_weekday_conventions() {
        // Serial 1 is treated as a Sunday (the 1900 shift)
        let wd = |serial: f64, rt: f64| {
            fn_weekday(
                &[FormulaValue::Number(serial), FormulaValue::Number(rt)],
                &ctx(),
            )
            .unwrap()
        };
        assert_eq!(wd(1.0, 1.0), FormulaValue::Number(1.0));
        assert_eq!(wd(7.0, 1.0), FormulaValue::Number(7.0));
        assert_eq!(wd(2.0, 2.0), FormulaValue::Number(1.0));
        assert_eq!(wd(2.0, 3.0), FormulaValue::Number(0.0));
        assert_eq!(wd(1.0, 4.0), FormulaValue::Error(CellError::Num));
    }

    #[test]
    fn test_weeknum() {
        // 2024-01-01 is week 1; 2024-01-07 (Sunday) starts week 2
        let jan1 = date(2024.0, 1.0, 1.0);
        let got = fn_weeknum(&[FormulaValue::Number(jan1)], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Number(1.0));
        let jan7 = date(2024.0, 1.0, 7.0);
        let got = fn_weeknum(&[FormulaValue::Number(jan7)], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Number(2.0));
    }

    #[test]
    fn test_edate_eomonth() {
        let jan31 = date(2023.0, 1.0, 31.0);
        let got = fn_edate(
            &[FormulaValue::Number(jan31), FormulaValue::Number(1.0)],
            &ctx(),
        )
        .unwrap();
        // Day clamps to February's end
        assert_eq!(got, FormulaValue::Number(date(2023.0, 2.0, 28.0)));

        let got = fn_eomonth(
            &[
                FormulaValue::Number(date(2024.0, 2.0, 5.0)),
                FormulaValue::Number(0.0),
            ],
            &ctx(),
        )
        .unwrap();
        assert_eq!(got, FormulaValue::Number(date(2024.0, 2.0, 29.0)));

        let back = fn_edate(
            &[FormulaValue::Number(jan31), FormulaValue::Number(-2.0)],
            &ctx(),
        )
        .unwrap();
        assert_eq!(back, FormulaValue::Number(date(2022.0, 11.0, 30.0)));
    }

    #[test]
    fn test_datedif() {
        let d = |s: f64, e: f64, u: &str| {
            fn_datedif(
                &[
                    FormulaValue::Number(s),
                    FormulaValue::Number(e),
                    FormulaValue::text(u),
                ],
                &ctx(),
            )
            .unwrap()
        };
        let start = date(2020.0, 3.0, 15.0);
        assert_eq!(
            d(start, date(2023.0, 3.0, 14.0), "Y"),
            FormulaValue::Number(2.0)
        );
        assert_eq!(
            d(start, date(2023.0, 3.0, 15.0), "Y"),
            FormulaValue::Number(3.0)
        );
        // "M" ignores the day component entirely
        assert_eq!(
            d(start, date(2020.0, 5.0, 1.0), "M"),
            FormulaValue::Number(2.0)
        );
        assert_eq!(d(start, start + 10.0, "D"), FormulaValue::Number(10.0));
        assert_eq!(
            d(start + 1.0, start, "D"),
            FormulaValue::Error(CellError::Num)
        );
        assert_eq!(d(start, start, "Q"), FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_networkdays_and_workday() {
        // 2024-01-01 is a Monday; the first full week has 5 business days
        let mon = date(2024.0, 1.0, 1.0);
        let sun = date(2024.0, 1.0, 7.0);
        let got = fn_networkdays(
            &[FormulaValue::Number(mon), FormulaValue::Number(sun)],
            &ctx(),
        )
        .unwrap();
        assert_eq!(got, FormulaValue::Number(5.0));

        // Reversed order counts negative
        let got = fn_networkdays(
            &[FormulaValue::Number(sun), FormulaValue::Number(mon)],
            &ctx(),
        )
        .unwrap();
        assert_eq!(got, FormulaValue::Number(-5.0));

        // A holiday on Tuesday removes one business day
        let got = fn_networkdays(
            &[
                FormulaValue::Number(mon),
                FormulaValue::Number(sun),
                FormulaValue::Number(mon + 1.0),
            ],
            &ctx(),
        )
        .unwrap();
        assert_eq!(got, FormulaValue::Number(4.0));

        // Friday + 1 business day lands on Monday
        let fri = date(2024.0, 1.0, 5.0);
        let got = fn_workday(
            &[FormulaValue::Number(fri), FormulaValue::Number(1.0)],
            &ctx(),
        )
        .unwrap();
        assert_eq!(got, FormulaValue::Number(date(2024.0, 1.0, 8.0)));

        // Backward over a weekend
        let got = fn_workday(
            &[
                FormulaValue::Number(date(2024.0, 1.0, 8.0)),
                FormulaValue::Number(-1.0),
            ],
            &ctx(),
        )
        .unwrap();
        assert_eq!(got, FormulaValue::Number(fri));
    }

    #[test]
    fn test_datevalue_applies_bug_correction() {
        let got = fn_datevalue(&[FormulaValue::text("2023-01-01")], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Number(date(2023.0, 1.0, 1.0)));

        let got = fn_datevalue(&[FormulaValue::text("3/15/2024")], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Number(date(2024.0, 3.0, 15.0)));

        let got = fn_datevalue(&[FormulaValue::text("15-Mar-2024")], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Number(date(2024.0, 3.0, 15.0)));

        // Pre-bug dates get no +1
        let got = fn_datevalue(&[FormulaValue::text("1900-01-01")], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Number(1.0));

        let got = fn_datevalue(&[FormulaValue::text("not a date")], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_timevalue() {
        let got = fn_timevalue(&[FormulaValue::text("12:00")], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Number(0.5));
        let got = fn_timevalue(&[FormulaValue::text("1:30:00 PM")], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Number(0.5625));
        let got = fn_timevalue(&[FormulaValue::text("12:00 AM")], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Number(0.0));
        let got = fn_timevalue(&[FormulaValue::text("25:00")], &ctx()).unwrap();
        assert_eq!(got, FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_today_now_with_fixed_clock() {
        let fixed = Utc.with_ymd_and_hms(2024, 3, 15, 6, 0, 0).unwrap();
        let ctx = EvaluationContext::with_now(fixed);
        let today = fn_today(&[], &ctx).unwrap();
        assert_eq!(today, FormulaValue::Number(date(2024.0, 3.0, 15.0)));

        let now = fn_now(&[], &ctx).unwrap();
        assert_eq!(
            now,
            FormulaValue::Number(date(2024.0, 3.0, 15.0) + 0.25)
        );
    }
}
