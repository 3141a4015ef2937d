// Jobs module - Scheduled housekeeping

pub mod token_sweeper;
