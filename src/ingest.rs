/*!
Decodes one dump file into a [RouteSink].
*/
use crate::error::ReplayError;
use crate::extractor::DumpKind;
use crate::models::{EventRow, RibRow, RouteFlag};
use crate::parser::MrtParser;
use crate::state::RouteSink;
use log::{debug, info};
use std::io::Read;

/// What one ingest run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IngestSummary {
    /// MRT records decoded.
    pub records: u64,
    /// Rows handed to the sink.
    pub routes: u64,
    /// MRT records that failed to decode and were skipped.
    pub skipped: u64,
    /// Session state changes seen. They carry no prefix and are not stored.
    pub state_changes: u64,
    /// Whether reading stopped early on an I/O error.
    pub truncated: bool,
}

/// Feeds every route of one dump to `sink`, with a fresh extraction session.
///
/// An undecodable record is skipped. A route that references an undefined peer aborts the file
/// with [ReplayError::DataIntegrity]; rows already handed to the sink stay there.
pub fn ingest_reader<R, S>(
    reader: R,
    kind: DumpKind,
    sink: &mut S,
) -> Result<IngestSummary, ReplayError>
where
    R: Read,
    S: RouteSink + ?Sized,
{
    let mut summary = IngestSummary::default();
    let mut routes = MrtParser::from_reader(reader).into_route_iter(kind);
    for route in &mut routes {
        let route = route?;
        if route.flag == RouteFlag::StateChange {
            debug!("{} at {}", route, route.timestamp);
            summary.state_changes += 1;
            continue;
        }
        match kind {
            DumpKind::Rib => sink.insert_rib(RibRow::try_from(&route)?)?,
            DumpKind::Updates => sink.insert_event(EventRow::try_from(&route)?)?,
        }
        summary.routes += 1;
    }
    summary.records = routes.records().decoded();
    summary.skipped = routes.records().skipped();
    summary.truncated = routes.records().failed();
    Ok(summary)
}

/// [ingest_reader] on a local file; gzip and bzip2 files are decompressed on the fly.
pub fn ingest_file<S>(
    path: &str,
    kind: DumpKind,
    sink: &mut S,
) -> Result<IngestSummary, ReplayError>
where
    S: RouteSink + ?Sized,
{
    let reader = oneio::get_reader(path).map_err(crate::error::ParserError::from)?;
    let summary = ingest_reader(reader, kind, sink)?;
    info!(
        "ingested {} ({:?}): {} records, {} routes, {} skipped, {} state changes",
        path, kind, summary.records, summary.routes, summary.skipped, summary.state_changes
    );
    Ok(summary)
}
