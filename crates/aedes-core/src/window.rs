//! Epidemiological-week window resolution.
//!
//! A sync run always covers an inclusive range of ISO weeks, expressed the way
//! the InfoDengue API expects it (`ew_start`, `ey_start`, `ew_end`, `ey_end`).
//!
//! Callers may pass an explicit window, but only as a whole: if any of the four
//! fields is missing (or zero) the explicit values are ignored and the default
//! trailing window is used instead.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Number of weeks covered by the default window.
pub const DEFAULT_TRAILING_WEEKS: i64 = 8;

/// Optional window fields as received from a trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowParams {
    pub week_start: Option<u32>,
    pub year_start: Option<i32>,
    pub week_end: Option<u32>,
    pub year_end: Option<i32>,
}

impl WindowParams {
    /// Parameters with all four fields set.
    pub fn explicit(week_start: u32, year_start: i32, week_end: u32, year_end: i32) -> Self {
        Self {
            week_start: Some(week_start),
            year_start: Some(year_start),
            week_end: Some(week_end),
            year_end: Some(year_end),
        }
    }

    /// Returns the explicit window if every field is present and non-zero.
    fn complete(&self) -> Option<SyncWindow> {
        match (self.week_start, self.year_start, self.week_end, self.year_end) {
            (Some(ws), Some(ys), Some(we), Some(ye))
                if ws != 0 && ys != 0 && we != 0 && ye != 0 =>
            {
                Some(SyncWindow {
                    week_start: ws,
                    year_start: ys,
                    week_end: we,
                    year_end: ye,
                })
            }
            _ => None,
        }
    }
}

/// A resolved, inclusive range of epidemiological weeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWindow {
    pub week_start: u32,
    pub year_start: i32,
    pub week_end: u32,
    pub year_end: i32,
}

impl SyncWindow {
    /// Resolves trigger parameters against the given current date.
    ///
    /// All-or-nothing: a partially specified window falls back to
    /// [`SyncWindow::trailing`] and the supplied fields are discarded.
    pub fn resolve(params: &WindowParams, today: NaiveDate) -> Self {
        match params.complete() {
            Some(window) => window,
            None => {
                if *params != WindowParams::default() {
                    tracing::debug!(
                        ?params,
                        "Incomplete sync window ignored, using default trailing window"
                    );
                }
                Self::trailing(today, DEFAULT_TRAILING_WEEKS)
            }
        }
    }

    /// Window covering `weeks` calendar weeks ending at `today`.
    pub fn trailing(today: NaiveDate, weeks: i64) -> Self {
        let start = today - Duration::weeks(weeks);
        let (week_start, year_start) = iso_week_of(start);
        let (week_end, year_end) = iso_week_of(today);
        Self {
            week_start,
            year_start,
            week_end,
            year_end,
        }
    }

    /// Window from a fixed starting week up to the week containing `today`.
    pub fn since(week_start: u32, year_start: i32, today: NaiveDate) -> Self {
        let (week_end, year_end) = iso_week_of(today);
        Self {
            week_start,
            year_start,
            week_end,
            year_end,
        }
    }

    /// Query parameters for the InfoDengue API.
    pub fn query_pairs(&self) -> [(&'static str, String); 4] {
        [
            ("ew_start", self.week_start.to_string()),
            ("ey_start", self.year_start.to_string()),
            ("ew_end", self.week_end.to_string()),
            ("ey_end", self.year_end.to_string()),
        ]
    }
}

impl std::fmt::Display for SyncWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} to {}/{}",
            self.week_start, self.year_start, self.week_end, self.year_end
        )
    }
}

/// ISO week number paired with its ISO week-based year.
fn iso_week_of(date: NaiveDate) -> (u32, i32) {
    let iso = date.iso_week();
    (iso.week(), iso.year())
}
