use std::time::{Duration, Instant};

use tokio::io::AsyncWrite;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::{
    archive::ArchiveSource,
    config::PipelineConfig,
    error::{GhPushError, ParseError, Result},
    filter::{EventFilter, parse_event},
    geocode::Geocoder,
    paths::get_output_path,
    types::{Event, GeoFields, HourId},
    writer::EventWriter,
};

/// Counters for one archive hour; also used for run totals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HourSummary {
    pub lines: usize,
    pub parse_errors: usize,
    pub kept: usize,
    pub rejected: usize,
    pub geocode_attempts: usize,
    pub geocoded: usize,
    pub geocode_failures: usize,
}

impl HourSummary {
    fn absorb(&mut self, other: &HourSummary) {
        self.lines += other.lines;
        self.parse_errors += other.parse_errors;
        self.kept += other.kept;
        self.rejected += other.rejected;
        self.geocode_attempts += other.geocode_attempts;
        self.geocoded += other.geocoded;
        self.geocode_failures += other.geocode_failures;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedHour {
    pub hour: HourId,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub hours_total: usize,
    pub hours_ok: usize,
    pub failed_hours: Vec<FailedHour>,
    pub totals: HourSummary,
    pub elapsed: Duration,
}

impl RunSummary {
    fn new(run_id: Uuid, hours_total: usize) -> Self {
        Self {
            run_id,
            hours_total,
            hours_ok: 0,
            failed_hours: Vec::new(),
            totals: HourSummary::default(),
            elapsed: Duration::ZERO,
        }
    }
}

/// Per-hour progress notifications for UIs
pub enum Progress<'a> {
    HourStarted {
        hour: &'a HourId,
        location: String,
        index: usize,
        total: usize,
    },
    HourFinished {
        hour: &'a HourId,
        summary: &'a HourSummary,
        elapsed: Duration,
    },
    HourFailed {
        hour: &'a HourId,
        error: &'a GhPushError,
        elapsed: Duration,
    },
}

/// Fetch -> filter -> (enrich) -> write, one hour after another
pub struct Pipeline<'a> {
    source: &'a dyn ArchiveSource,
    geocoder: Option<&'a dyn Geocoder>,
    filter: EventFilter,
    strict: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        source: &'a dyn ArchiveSource,
        geocoder: Option<&'a dyn Geocoder>,
        filter: EventFilter,
        strict: bool,
    ) -> Self {
        Self {
            source,
            geocoder,
            filter,
            strict,
        }
    }

    /// Returns the event to write, or `None` when its type is not accepted.
    /// Accepted events always carry geo fields, real or sentinel.
    pub async fn process_line(
        &self,
        line: &str,
        summary: &mut HourSummary,
    ) -> std::result::Result<Option<Event>, ParseError> {
        summary.lines += 1;
        let mut event = parse_event(line)?;
        if !self.filter.accepts(&event) {
            summary.rejected += 1;
            return Ok(None);
        }

        event.set_geo(GeoFields::unknown());
        self.enrich(&mut event, summary).await;
        summary.kept += 1;
        Ok(Some(event))
    }

    async fn enrich(&self, event: &mut Event, summary: &mut HourSummary) {
        let Some(geocoder) = self.geocoder else {
            return;
        };
        let Some(place) = event.location().map(str::to_owned) else {
            return;
        };

        summary.geocode_attempts += 1;
        match geocoder.geocode(&place).await {
            Ok(centroid) => {
                event.set_geo(centroid.into());
                summary.geocoded += 1;
            }
            // Enrichment is best effort: keep the event with sentinel geo fields
            Err(error) => {
                summary.geocode_failures += 1;
                debug!(%place, %error, "geocoding failed");
            }
        }
    }

    /// Fetch one hour and write every accepted event. The writer is flushed
    /// once the hour completes.
    pub async fn process_hour<W: AsyncWrite + Unpin>(
        &self,
        hour: &HourId,
        writer: &mut EventWriter<W>,
    ) -> Result<HourSummary> {
        let lines = self.source.fetch(hour).await?;
        let mut summary = HourSummary::default();

        for (index, line) in lines.iter().enumerate() {
            match self.process_line(line, &mut summary).await {
                Ok(Some(event)) => writer.write(&event).await?,
                Ok(None) => {}
                Err(error) if !self.strict => {
                    summary.parse_errors += 1;
                    debug!(%hour, line = index + 1, %error, "skipping malformed line");
                }
                Err(error) => return Err(error.into()),
            }
        }

        writer.flush().await?;
        Ok(summary)
    }

    /// Process every hour in order. Outside strict mode a failed hour is
    /// recorded and the run moves on.
    pub async fn run<W, F>(
        &self,
        hours: &[HourId],
        writer: &mut EventWriter<W>,
        mut on_progress: F,
    ) -> Result<RunSummary>
    where
        W: AsyncWrite + Unpin,
        F: FnMut(Progress<'_>),
    {
        let run_id = Uuid::new_v4();
        self.run_hours(run_id, hours, writer, &mut on_progress)
            .instrument(info_span!("run", %run_id))
            .await
    }

    async fn run_hours<W, F>(
        &self,
        run_id: Uuid,
        hours: &[HourId],
        writer: &mut EventWriter<W>,
        on_progress: &mut F,
    ) -> Result<RunSummary>
    where
        W: AsyncWrite + Unpin,
        F: FnMut(Progress<'_>),
    {
        let started = Instant::now();
        let mut run = RunSummary::new(run_id, hours.len());

        for (index, hour) in hours.iter().enumerate() {
            let hour_started = Instant::now();
            on_progress(Progress::HourStarted {
                hour,
                location: self.source.locate(hour),
                index,
                total: hours.len(),
            });

            match self.process_hour(hour, writer).await {
                Ok(summary) => {
                    info!(
                        %hour,
                        lines = summary.lines,
                        kept = summary.kept,
                        parse_errors = summary.parse_errors,
                        geocoded = summary.geocoded,
                        "hour processed"
                    );
                    on_progress(Progress::HourFinished {
                        hour,
                        summary: &summary,
                        elapsed: hour_started.elapsed(),
                    });
                    run.hours_ok += 1;
                    run.totals.absorb(&summary);
                }
                Err(error) => {
                    on_progress(Progress::HourFailed {
                        hour,
                        error: &error,
                        elapsed: hour_started.elapsed(),
                    });
                    if self.strict || !error.is_hour_local() {
                        return Err(error);
                    }
                    warn!(%hour, %error, "hour failed, continuing with the next one");
                    run.failed_hours.push(FailedHour {
                        hour: *hour,
                        error: error.to_string(),
                    });
                }
            }
        }

        run.elapsed = started.elapsed();
        Ok(run)
    }
}

/// Run the configured hours into the configured output file.
///
/// The output file is opened here and flushed on every exit path, success or
/// failure. A run error takes precedence over a flush error.
pub async fn run_to_file<F>(
    config: &PipelineConfig,
    source: &dyn ArchiveSource,
    geocoder: Option<&dyn Geocoder>,
    on_progress: F,
) -> Result<RunSummary>
where
    F: FnMut(Progress<'_>),
{
    config.validate()?;

    let output = get_output_path(config);
    let mut writer = EventWriter::create(&output).await?;

    let geocoder = geocoder.filter(|_| config.enrichment_enabled);
    let filter = EventFilter::new(config.accepted_event_types.iter().cloned());
    let pipeline = Pipeline::new(source, geocoder, filter, config.strict);

    let outcome = pipeline
        .run(&config.hour_ids(), &mut writer, on_progress)
        .await;
    let flushed = writer.finish().await;

    let summary = outcome?;
    flushed?;
    info!(
        output = %output.display(),
        kept = summary.totals.kept,
        failed_hours = summary.failed_hours.len(),
        "run finished"
    );
    Ok(summary)
}
