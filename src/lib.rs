/*!
rib-replay turns MRT routing dumps into canonical route records and rebuilds the routing table as
it looked at any point in time.

- [parser] decodes MRT files (TABLE_DUMP, TABLE_DUMP_V2, BGP4MP), plain or compressed.
- [extractor] turns decoded records into [RouteRecord]s, one per prefix, next hop and event.
- [ingest] drives both over one file and hands the rows to a [RouteSink].
- [state] replays a baseline table dump plus the following updates into a [NetworkState].
- [lpm] is the longest-prefix-match trie used throughout.
- [border] infers how far traceroute hops are from the border of a destination AS.

Extracting the routes of an update dump:

```no_run
use rib_replay::{DumpKind, MrtParser};

let parser = MrtParser::new("updates.20180901.0000.bz2").unwrap();
for route in parser.into_route_iter(DumpKind::Updates) {
    match route {
        Ok(route) => println!("{}", route),
        Err(e) => eprintln!("{}", e),
    }
}
```
*/
pub mod archive;
pub mod border;
pub mod error;
pub mod extractor;
pub mod lpm;
pub mod models;
pub mod state;

#[cfg(feature = "parser")]
pub mod ingest;
#[cfg(feature = "parser")]
pub mod parser;

pub use error::{ParserError, ReplayError};
pub use extractor::{DumpKind, RouteExtractor, SequenceGenerator};
pub use models::{EventRow, RibRow, RouteFlag, RouteRecord};
pub use state::{HistoricalStore, InMemoryStore, NetworkState, RouteSink, SnapshotConfig};

#[cfg(feature = "parser")]
pub use ingest::{ingest_file, ingest_reader, IngestSummary};
#[cfg(feature = "parser")]
pub use parser::MrtParser;
