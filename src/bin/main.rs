use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{Datelike, TimeDelta};
use clap::{Parser, Subcommand, ValueEnum};
use ipnet::IpNet;
use itertools::Itertools;
use log::{info, warn};
use rib_replay::archive::parse_dump_file_name;
use rib_replay::border::{BorderConfig, HopDistances, PrefixAsnMapping};
use rib_replay::state::{parse_query_time, BaselineSchedule, WithdrawPolicy};
use rib_replay::{
    ingest_file, DumpKind, HistoricalStore, InMemoryStore, MrtParser, NetworkState, ParserError,
    ReplayError, SnapshotConfig,
};
use serde_json::json;

/// rib-replay extracts route events from MRT dumps and rebuilds routing state at a point in time.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Opts {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the canonical route records of one MRT file.
    Extract {
        /// File path to a MRT file, plain, gzip or bzip2.
        #[clap(name = "FILE")]
        file_path: PathBuf,

        /// Dump kind; guessed from the file name when omitted.
        #[clap(short, long, value_enum)]
        kind: Option<Kind>,

        /// Output as JSON objects
        #[clap(long)]
        json: bool,

        /// Pretty-print JSON output
        #[clap(long)]
        pretty: bool,

        /// Only count records and routes
        #[clap(short, long)]
        count: bool,
    },
    /// Rebuild the routing table at a given time from a RIB dump and the following update dumps.
    State {
        /// Target time, RFC 3339 with an explicit offset, e.g. 2018-09-25T23:45:00Z
        #[clap(short, long)]
        time: String,

        /// Only reconstruct this prefix
        #[clap(short, long)]
        prefix: Option<IpNet>,

        /// What a withdrawal clears
        #[clap(short, long, value_enum, default_value = "clear-peer")]
        withdraw_policy: Policy,

        /// Hours between two baseline table dumps
        #[clap(long, default_value_t = 24)]
        interval_hours: i64,

        /// Output as JSON
        #[clap(long)]
        json: bool,

        /// Archive files named like rib.YYYYMMDD.HHMM.bz2 or updates.YYYYMMDD.HHMM.bz2
        #[clap(name = "FILES", required = true)]
        files: Vec<PathBuf>,
    },
    /// Infer hop distances to the border of destination networks from traceroute dumps.
    Border {
        /// Prefix to AS mapping file (`addr len asn[_asn]` lines)
        #[clap(short, long, conflicts_with = "rib")]
        mapping: Option<PathBuf>,

        /// RIB dump to build the prefix to AS mapping from
        #[clap(short, long)]
        rib: Option<PathBuf>,

        /// Shortest prefix length kept in the mapping
        #[clap(long, default_value_t = 16)]
        min_prefix_len: u8,

        /// Longest prefix length kept in the mapping
        #[clap(long, default_value_t = 64)]
        max_prefix_len: u8,

        /// sc_analysis_dump output files
        #[clap(name = "TRACES", required = true)]
        traces: Vec<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Rib,
    Updates,
}

impl From<Kind> for DumpKind {
    fn from(value: Kind) -> Self {
        match value {
            Kind::Rib => DumpKind::Rib,
            Kind::Updates => DumpKind::Updates,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Policy {
    ClearPeer,
    ClearPrefix,
}

impl From<Policy> for WithdrawPolicy {
    fn from(value: Policy) -> Self {
        match value {
            Policy::ClearPeer => WithdrawPolicy::ClearPeer,
            Policy::ClearPrefix => WithdrawPolicy::ClearPrefix,
        }
    }
}

fn path_str(path: &Path) -> Result<&str, ReplayError> {
    path.to_str()
        .ok_or_else(|| ReplayError::NotFound(format!("non UTF-8 path {}", path.display())))
}

fn dump_kind(path: &str, kind: Option<Kind>) -> Result<DumpKind, ReplayError> {
    match kind {
        Some(kind) => Ok(kind.into()),
        None => DumpKind::from_file_name(path).ok_or_else(|| {
            ReplayError::NotFound(format!("cannot tell the dump kind of {}, use --kind", path))
        }),
    }
}

/// Writes one output line; a closed pipe ends the program quietly.
fn emit(stdout: &mut std::io::Stdout, line: &str) {
    if let Err(e) = writeln!(stdout, "{}", line) {
        if e.kind() != std::io::ErrorKind::BrokenPipe {
            eprintln!("{}", e);
        }
        std::process::exit(1);
    }
}

fn extract(
    file_path: &Path,
    kind: Option<Kind>,
    json: bool,
    pretty: bool,
    count: bool,
) -> Result<(), ReplayError> {
    let file_path = path_str(file_path)?;
    let kind = dump_kind(file_path, kind)?;
    let parser = MrtParser::new(file_path)?;
    let mut routes = parser.into_route_iter(kind);
    let mut stdout = std::io::stdout();

    let mut total = 0u64;
    for route in &mut routes {
        let route = route?;
        total += 1;
        if count {
            continue;
        }
        let line = match json {
            true => {
                let val = json!(route);
                match pretty {
                    true => format!("{:#}", val),
                    false => val.to_string(),
                }
            }
            false => route.to_string(),
        };
        emit(&mut stdout, &line);
    }
    if count {
        println!("total records: {}", routes.records().decoded());
        println!("skipped:       {}", routes.records().skipped());
        println!("total routes:  {}", total);
    }
    Ok(())
}

fn state(
    time: &str,
    prefix: Option<IpNet>,
    policy: Policy,
    interval_hours: i64,
    json: bool,
    files: &[PathBuf],
) -> Result<(), ReplayError> {
    // reject a bad time before reading any dump
    let time = parse_query_time(time)?;
    let config = SnapshotConfig {
        schedule: BaselineSchedule {
            interval: TimeDelta::hours(interval_hours),
            offset: TimeDelta::zero(),
        },
        withdraw_policy: policy.into(),
    };

    let mut store = InMemoryStore::new();
    for file in files {
        let file = path_str(file)?;
        let Some(dump) = parse_dump_file_name(file) else {
            warn!("skipping {}: not a rib or updates dump", file);
            continue;
        };
        if dump.time > time {
            info!("skipping {}: dumped after {}", file, time);
            continue;
        }
        if dump.kind == DumpKind::Rib && !config.schedule.is_boundary(dump.time) {
            info!("skipping {}: not a baseline dump", file);
            continue;
        }
        ingest_file(file, dump.kind, &mut store)?;
    }

    let state = NetworkState::build(&store, time, prefix, &config)?;
    let mut stdout = std::io::stdout();
    if json {
        let prefixes: Vec<_> = state
            .prefixes()
            .iter()
            .map(|(prefix, origins)| json!({"prefix": prefix, "origins": origins}))
            .collect();
        let peers: Vec<_> = state
            .peers()
            .flat_map(|peer| peer.aliases())
            .map(|peer| {
                json!({
                    "peer": peer,
                    "active": state.is_active(peer),
                    "path": state.advertised_path(peer).map(|p| p.to_string()),
                    "ases": state.advertised_ases(peer),
                })
            })
            .collect();
        let val = json!({
            "time": state.time(),
            "baseline": state.baseline(),
            "events": state.events_applied(),
            "prefixes": prefixes,
            "peers": peers,
        });
        emit(&mut stdout, &format!("{:#}", val));
        return Ok(());
    }

    emit(&mut stdout, &format!("# time {} baseline {}", state.time(), state.baseline()));
    for (prefix, origins) in state.prefixes().iter() {
        emit(&mut stdout, &format!("{}|{}", prefix, origins.iter().join(" ")));
    }
    for peer in state.active_peers() {
        let path = state
            .advertised_path(&peer)
            .map(|p| p.to_string())
            .unwrap_or_default();
        emit(&mut stdout, &format!("peer|{}|{}", peer, path));
    }
    Ok(())
}

fn border(
    mapping: Option<&PathBuf>,
    rib: Option<&PathBuf>,
    config: &BorderConfig,
    traces: &[PathBuf],
) -> Result<(), ReplayError> {
    let mapping = match (mapping, rib) {
        (Some(mapping), None) => PrefixAsnMapping::from_mapping_file(path_str(mapping)?, config)?,
        (None, Some(rib)) => {
            let mut store = InMemoryStore::new();
            ingest_file(path_str(rib)?, DumpKind::Rib, &mut store)?;
            let mut rows = vec![];
            for snapshot in store.snapshots() {
                rows.extend(store.select_rib(snapshot.year(), snapshot, None)?);
            }
            PrefixAsnMapping::from_rib_rows(&rows, config)
        }
        _ => {
            return Err(ReplayError::NotFound(
                "either --mapping or --rib is required".to_string(),
            ))
        }
    };

    let mut distances = HopDistances::new();
    for trace in traces {
        let trace = path_str(trace)?;
        let reader = oneio::get_reader(trace).map_err(ParserError::from)?;
        let summary = distances.process_reader(BufReader::new(reader), &mapping, config)?;
        info!(
            "{}: {} traces, {} used, {} skipped, {} malformed",
            trace, summary.traces, summary.used, summary.skipped, summary.malformed
        );
    }

    let mut stdout = std::io::stdout();
    let mut current = None;
    for (addr, prefix, distance) in distances.iter() {
        let Some(hops) = distance.best() else {
            continue;
        };
        if current != Some(addr) {
            emit(&mut stdout, &addr.to_string());
            current = Some(addr);
        }
        emit(&mut stdout, &format!("\t{} {}", prefix, hops));
    }
    Ok(())
}

fn main() {
    let opts: Opts = Opts::parse();

    env_logger::init();

    let result = match &opts.command {
        Command::Extract {
            file_path,
            kind,
            json,
            pretty,
            count,
        } => extract(file_path, *kind, *json, *pretty, *count),
        Command::State {
            time,
            prefix,
            withdraw_policy,
            interval_hours,
            json,
            files,
        } => state(time, *prefix, *withdraw_policy, *interval_hours, *json, files),
        Command::Border {
            mapping,
            rib,
            min_prefix_len,
            max_prefix_len,
            traces,
        } => {
            let config = BorderConfig {
                prefix_lengths: *min_prefix_len..=*max_prefix_len,
                ..Default::default()
            };
            border(mapping.as_ref(), rib.as_ref(), &config, traces)
        }
    };

    if let Err(err) = result {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
