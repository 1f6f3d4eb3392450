// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Metadata-based message filtering.
//!
//! A filter is a set of predicates over [`MessageMetadata`]. Each predicate
//! kind registers once, no matter how often its configuration methods are
//! called, and predicates run in registration order; a message is admitted
//! only if every registered predicate admits it. Unknown-format messages
//! are always dropped, and NMEA messages are dropped unless opted in.

use crate::core::{HeaderFormat, MeasurementSource, MessageMetadata, TimeStatus};

/// Predicate kinds, evaluated in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PredicateKind {
    Time,
    Decimation,
    TimeStatus,
    MessageId,
    MessageName,
}

/// Configurable metadata predicate pipeline.
#[derive(Debug, Default, Clone)]
pub struct Filter {
    predicates: Vec<PredicateKind>,

    lower_week: u32,
    lower_msec: u32,
    upper_week: u32,
    upper_msec: u32,
    filter_lower_time: bool,
    filter_upper_time: bool,
    invert_time: bool,

    decimation_period_msec: u32,
    decimate: bool,
    invert_decimation: bool,

    time_statuses: Vec<TimeStatus>,
    invert_time_status: bool,

    id_filters: Vec<(u32, HeaderFormat, MeasurementSource)>,
    invert_message_id: bool,

    name_filters: Vec<(String, HeaderFormat, MeasurementSource)>,
    invert_message_name: bool,

    include_nmea: bool,
}

impl Filter {
    /// Create an empty filter that admits everything except NMEA and
    /// unknown-format messages.
    pub fn new() -> Self {
        Self::default()
    }

    fn push_unique(&mut self, kind: PredicateKind) {
        if !self.predicates.contains(&kind) {
            self.predicates.push(kind);
        }
    }

    /// Admit only messages at or after `(week, seconds)`.
    pub fn set_include_lower_time_bound(&mut self, week: u32, seconds: f64) {
        self.filter_lower_time = true;
        self.lower_week = week;
        self.lower_msec = (seconds * 1000.0) as u32;
        self.push_unique(PredicateKind::Time);
    }

    /// Admit only messages at or before `(week, seconds)`.
    pub fn set_include_upper_time_bound(&mut self, week: u32, seconds: f64) {
        self.filter_upper_time = true;
        self.upper_week = week;
        self.upper_msec = (seconds * 1000.0) as u32;
        self.push_unique(PredicateKind::Time);
    }

    /// Admit the complement of the configured time window instead.
    pub fn invert_time_filter(&mut self, invert: bool) {
        self.invert_time = invert;
    }

    /// Admit only messages whose millisecond-of-week is a multiple of the
    /// period. Applied to ms-of-week directly; periods that do not divide
    /// the week length skew at rollover.
    pub fn set_include_decimation(&mut self, period_seconds: f64) {
        let period_msec = (period_seconds * 1000.0) as u32;
        if period_msec == 0 {
            return;
        }
        self.decimate = true;
        self.decimation_period_msec = period_msec;
        self.push_unique(PredicateKind::Decimation);
    }

    /// Admit only off-period messages instead.
    pub fn invert_decimation_filter(&mut self, invert: bool) {
        self.invert_decimation = invert;
    }

    /// Add a time status to the allow-list.
    pub fn include_time_status(&mut self, status: TimeStatus) {
        self.time_statuses.push(status);
        self.push_unique(PredicateKind::TimeStatus);
    }

    /// Add several time statuses to the allow-list.
    pub fn include_time_statuses(&mut self, statuses: impl IntoIterator<Item = TimeStatus>) {
        self.time_statuses.extend(statuses);
        self.push_unique(PredicateKind::TimeStatus);
    }

    /// Admit only statuses outside the allow-list instead.
    pub fn invert_time_status_filter(&mut self, invert: bool) {
        self.invert_time_status = invert;
    }

    /// Add a message-ID triple to the allow-list.
    pub fn include_message_id(
        &mut self,
        id: u32,
        format: HeaderFormat,
        source: MeasurementSource,
    ) {
        self.id_filters.push((id, format, source));
        self.push_unique(PredicateKind::MessageId);
    }

    /// Add several message-ID triples to the allow-list.
    pub fn include_message_ids(
        &mut self,
        ids: impl IntoIterator<Item = (u32, HeaderFormat, MeasurementSource)>,
    ) {
        self.id_filters.extend(ids);
        self.push_unique(PredicateKind::MessageId);
    }

    /// Admit only IDs outside the allow-list instead.
    pub fn invert_message_id_filter(&mut self, invert: bool) {
        self.invert_message_id = invert;
    }

    /// Add a message-name triple to the allow-list.
    pub fn include_message_name(
        &mut self,
        name: impl Into<String>,
        format: HeaderFormat,
        source: MeasurementSource,
    ) {
        self.name_filters.push((name.into(), format, source));
        self.push_unique(PredicateKind::MessageName);
    }

    /// Add several message-name triples to the allow-list.
    pub fn include_message_names(
        &mut self,
        names: impl IntoIterator<Item = (String, HeaderFormat, MeasurementSource)>,
    ) {
        self.name_filters.extend(names);
        self.push_unique(PredicateKind::MessageName);
    }

    /// Admit only names outside the allow-list instead.
    pub fn invert_message_name_filter(&mut self, invert: bool) {
        self.invert_message_name = invert;
    }

    /// Admit NMEA messages (dropped by default).
    pub fn include_nmea_messages(&mut self, include: bool) {
        self.include_nmea = include;
    }

    /// Reset every predicate and option.
    pub fn clear_filters(&mut self) {
        *self = Self::default();
    }

    /// Evaluate the filter against a metadata record.
    pub fn do_filtering(&self, meta: &MessageMetadata) -> bool {
        if meta.format == HeaderFormat::Unknown {
            return false;
        }
        if meta.format == HeaderFormat::Nmea {
            return self.include_nmea;
        }

        self.predicates.iter().all(|kind| match kind {
            PredicateKind::Time => self.filter_time(meta),
            PredicateKind::Decimation => self.filter_decimation(meta),
            PredicateKind::TimeStatus => self.filter_time_status(meta),
            PredicateKind::MessageId => self.filter_message_id(meta),
            PredicateKind::MessageName => self.filter_message_name(meta),
        })
    }

    fn filter_time(&self, meta: &MessageMetadata) -> bool {
        let week = meta.gps_week as u32;
        let msec = meta.milliseconds as u32;

        if self.invert_time {
            let above_lower = week > self.lower_week
                || (week == self.lower_week && msec >= self.lower_msec);
            let below_upper = week < self.upper_week
                || (week == self.upper_week && msec <= self.upper_msec);

            return if self.filter_lower_time && self.filter_upper_time {
                !(above_lower && below_upper)
            } else {
                !((above_lower && self.filter_lower_time)
                    || (below_upper && self.filter_upper_time))
            };
        }

        let below_lower =
            week < self.lower_week || (week == self.lower_week && msec < self.lower_msec);
        let above_upper =
            week > self.upper_week || (week == self.upper_week && msec > self.upper_msec);

        !((self.filter_lower_time && below_lower) || (self.filter_upper_time && above_upper))
    }

    fn filter_decimation(&self, meta: &MessageMetadata) -> bool {
        !self.decimate
            || self.invert_decimation
                == (meta.milliseconds as u32 % self.decimation_period_msec != 0)
    }

    fn filter_time_status(&self, meta: &MessageMetadata) -> bool {
        self.time_statuses.is_empty()
            || self.invert_time_status == !self.time_statuses.contains(&meta.time_status)
    }

    // A triple with format ALL matches on id and source only; a triple with
    // a concrete format must match all three. ALL does not imply "any
    // source".
    fn filter_message_id(&self, meta: &MessageMetadata) -> bool {
        if self.id_filters.is_empty() {
            return true;
        }
        let id = meta.message_id as u32;
        let all_match = self.id_filters.iter().any(|(fid, fformat, fsource)| {
            *fid == id && *fformat == HeaderFormat::All && *fsource == meta.measurement_source
        });
        let exact_match = self
            .id_filters
            .contains(&(id, meta.format, meta.measurement_source));
        self.invert_message_id == !(all_match || exact_match)
    }

    fn filter_message_name(&self, meta: &MessageMetadata) -> bool {
        if self.name_filters.is_empty() {
            return true;
        }
        let all_match = self.name_filters.iter().any(|(fname, fformat, fsource)| {
            *fname == meta.message_name
                && *fformat == HeaderFormat::All
                && *fsource == meta.measurement_source
        });
        let exact_match = self.name_filters.iter().any(|(fname, fformat, fsource)| {
            *fname == meta.message_name
                && *fformat == meta.format
                && *fsource == meta.measurement_source
        });
        self.invert_message_name == !(all_match || exact_match)
    }
}
