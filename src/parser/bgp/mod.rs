/*!
Provides parsing of the BGP messages carried in MRT records.
*/
pub mod attributes;
pub mod messages;

pub use attributes::parse_attributes;
pub use messages::parse_bgp_message;
