pub mod config;
pub mod departures;
pub mod error;
pub mod fetch;
pub mod merge;
pub mod parser;
pub mod poll;
pub mod realtime;
pub mod schedule;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
