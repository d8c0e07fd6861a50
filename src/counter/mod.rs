//! Export contents of `counter` folder
pub mod counter_errors;
mod roi;
mod counting_line;
mod detector;
mod background_subtractor;
mod tracker;
mod template_tracker;
mod tracked_blob;
mod blob_registry;
mod association;
mod crossing;
mod config;
mod vehicle_counter;
mod visualize;
mod count_log;
mod frame_stream;

#[cfg(test)]
mod test_data;

pub use self::{
    counter_errors::{CounterError, Result},
    roi::*,
    counting_line::*,
    detector::*,
    background_subtractor::*,
    tracker::*,
    template_tracker::*,
    tracked_blob::*,
    blob_registry::*,
    association::*,
    crossing::*,
    config::*,
    vehicle_counter::*,
    visualize::*,
    count_log::*,
    frame_stream::*,
};
