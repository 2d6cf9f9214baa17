/*!
Data structures shared by the MRT decoder, the route extractor and the replay engine.

The network and BGP types mirror the on-wire vocabulary (ASNs, prefixes, AS paths, attributes).
The MRT types mirror the dump record structure. The route types are the canonical records and
the row shapes that go in and out of the historical store.
*/
mod bgp;
mod mrt;
mod network;
mod route;

pub use bgp::*;
pub use mrt::*;
pub use network::*;
pub use route::*;
