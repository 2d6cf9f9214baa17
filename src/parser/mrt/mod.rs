pub mod messages;
pub mod mrt_header;
pub mod mrt_record;

pub use messages::{parse_bgp4mp, parse_table_dump_message, parse_table_dump_v2_message};
pub use mrt_header::parse_common_header;
pub use mrt_record::{parse_mrt_body, parse_mrt_record};
